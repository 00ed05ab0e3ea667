//! Ruby dialect: call-site scanning, literal rendering, payload template,
//! and top-level procedure extraction.
//!
//! The scanner is a tokenizer, not a full parser: it skips strings and
//! comments and records identifiers in call position (`foo(...)`) or bare
//! expression position (a potential vcall). Dynamically-constructed call
//! targets are invisible to it; unresolvable names are skipped later by the
//! resolver, so over-collection here is harmless.

use crate::core::types::{SlotKind, StateSnapshot};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashSet;

const KEYWORDS: &[&str] = &[
    "def", "end", "if", "elsif", "else", "unless", "while", "until", "for", "in", "do", "then",
    "begin", "rescue", "ensure", "return", "yield", "case", "when", "break", "next", "redo",
    "retry", "true", "false", "nil", "self", "super", "and", "or", "not", "module", "class",
    "alias", "require", "require_relative", "raise", "lambda", "proc", "loop", "puts", "print",
    "p", "new", "attr_accessor", "attr_reader", "attr_writer",
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_lowercase() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Scan source text for unqualified call targets, in discovery order.
pub fn call_sites(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    let mut prev_significant: Option<char> = None;
    let mut after_def = false;
    let mut locals: HashSet<String> = HashSet::new();

    while i < chars.len() {
        let c = chars[i];

        // comments run to end of line
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        // string and command literals
        if c == '"' || c == '\'' || c == '`' {
            let quote = c;
            i += 1;
            while i < chars.len() {
                if chars[i] == '\\' {
                    i += 2;
                    continue;
                }
                if chars[i] == quote {
                    i += 1;
                    break;
                }
                i += 1;
            }
            prev_significant = Some(quote);
            continue;
        }

        // sigil-prefixed variables are state slots, not calls
        if c == '@' || c == '$' {
            i += 1;
            if i < chars.len() && chars[i] == '@' {
                i += 1;
            }
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            prev_significant = Some('_');
            continue;
        }

        // symbols (:foo) and scope resolution (Foo::bar) disqualify the
        // following identifier
        if c == ':' {
            i += 1;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            prev_significant = Some(':');
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            // predicate names end in ? (bang names are left alone so `!=`
            // still reads as an operator)
            if i < chars.len() && chars[i] == '?' {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();

            let qualified = prev_significant == Some('.');
            prev_significant = Some('_');

            if after_def {
                after_def = false;
                continue;
            }
            if ident == "def" {
                after_def = true;
                continue;
            }
            if qualified || KEYWORDS.contains(&ident.as_str()) {
                continue;
            }

            // peek at the next significant char on the same line
            let mut j = i;
            while j < chars.len() && (chars[j] == ' ' || chars[j] == '\t') {
                j += 1;
            }
            let next = chars.get(j).copied();

            // plain assignment shadows the name for the rest of the scan,
            // the way a Ruby local does (== / =~ / => still read as operators)
            if next == Some('=')
                && !matches!(chars.get(j + 1), Some('=') | Some('~') | Some('>'))
            {
                locals.insert(ident);
                continue;
            }

            let is_call = match next {
                Some('(') => true,
                // hash label `foo: 1`
                Some(':') => false,
                // bare identifier in expression position — potential vcall,
                // unless a local of that name shadows it
                _ => !locals.contains(&ident),
            };

            if is_call && !out.contains(&ident) {
                out.push(ident);
            }
            continue;
        }

        if !c.is_whitespace() {
            prev_significant = Some(c);
        }
        i += 1;
    }

    out
}

/// Render a wire value as a Ruby literal. Hash keys use `=>` so string keys
/// stay strings rather than becoming symbols.
pub fn literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "nil".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => string_literal(s),
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", parts.join(", "))
        }
        serde_json::Value::Object(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{} => {}", string_literal(k), literal(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// Double-quoted Ruby string with interpolation disabled.
fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '#' => out.push_str("\\#"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn assignment(name: &str, value: &serde_json::Value) -> String {
    match SlotKind::classify(name) {
        // toplevel class-variable access is an error on modern interpreters;
        // pin shared slots to Object explicitly
        SlotKind::Shared => format!(
            "Object.class_variable_set(:{}, {})",
            name,
            literal(value)
        ),
        _ => format!("{} = {}", name, literal(value)),
    }
}

fn resnapshot(name: &str) -> String {
    let key = string_literal(name);
    match SlotKind::classify(name) {
        SlotKind::Instance => format!(
            "__lf_vars[{key}] = instance_variable_defined?(:{name}) ? instance_variable_get(:{name}) : nil"
        ),
        SlotKind::Global => format!("__lf_vars[{key}] = {name}"),
        SlotKind::Shared => format!(
            "__lf_vars[{key}] = Object.class_variable_defined?(:{name}) ? Object.class_variable_get(:{name}) : nil"
        ),
        _ => format!("__lf_vars[{key}] = defined?({name}) ? {name} : nil"),
    }
}

/// Assemble the self-contained Ruby program for one remote invocation.
pub fn build_payload(
    target: &str,
    arg_literals: &[String],
    snapshot: &StateSnapshot,
    definitions: &[String],
) -> String {
    let mut assignments = String::new();
    for (name, value) in snapshot.iter() {
        assignments.push_str(&assignment(name, value));
        assignments.push('\n');
    }

    let mut resnapshots = String::new();
    for (name, _) in snapshot.iter() {
        resnapshots.push_str(&resnapshot(name));
        resnapshots.push('\n');
    }

    let defs = definitions.join("\n");
    let call = format!("{}({})", target, arg_literals.join(", "));

    format!(
        r#"# landfall payload v1 (ruby)
require 'json'
require 'stringio'

{assignments}
{defs}

__lf_buffer = StringIO.new
__lf_stdout = $stdout
__lf_stderr = $stderr
$stdout = __lf_buffer
$stderr = __lf_buffer

__lf_result = nil
begin
  __lf_result = {call}
rescue Exception => __lf_err
  __lf_buffer.write("\n[REMOTE FAULT] " + __lf_err.class.to_s + ": " + __lf_err.message.to_s)
ensure
  $stdout = __lf_stdout
  $stderr = __lf_stderr
end

__lf_vars = {{}}
{resnapshots}
puts JSON.generate({{ "variables" => __lf_vars, "output" => __lf_buffer.string.strip, "result" => __lf_result }})
"#
    )
}

/// Split a script into its top-level procedure definitions. Line-based and
/// best-effort: a definition runs from `def name` to the `end` at the same
/// indentation.
pub fn extract_procedures(script: &str) -> IndexMap<String, String> {
    let def_re = Regex::new(r"^([ \t]*)def\s+([a-zA-Z_]\w*[?!]?)").unwrap();
    let lines: Vec<&str> = script.lines().collect();
    let mut out: IndexMap<String, String> = IndexMap::new();

    let mut i = 0;
    while i < lines.len() {
        if let Some(caps) = def_re.captures(lines[i]) {
            let indent = caps.get(1).map_or("", |m| m.as_str());
            let name = caps[2].to_string();
            let closer = format!("{}end", indent);
            let start = i;
            let mut j = i + 1;
            while j < lines.len() {
                let line = lines[j];
                if line == closer || line.trim_end() == closer {
                    break;
                }
                j += 1;
            }
            if j < lines.len() {
                let body = lines[start..=j].join("\n");
                out.entry(name).or_insert(body);
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }

    out
}
