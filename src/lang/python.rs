//! Python dialect. The original project carried a Python engine next to the
//! Ruby one; here it is a second payload dialect behind the same interface.
//!
//! Wire slot names keep their sigils; the payload maps them to plain
//! module-level identifiers by stripping the sigil (the legacy engine used
//! function globals, which amounts to the same thing). When two slots strip
//! to the same identifier the first one wins and later ones are skipped.

use crate::core::types::{SlotKind, StateSnapshot};
use indexmap::IndexMap;
use regex::Regex;
use tracing::warn;

const KEYWORDS: &[&str] = &[
    "def", "return", "if", "elif", "else", "for", "while", "in", "not", "and", "or", "import",
    "from", "as", "pass", "break", "continue", "try", "except", "finally", "raise", "with",
    "lambda", "yield", "global", "nonlocal", "class", "assert", "del", "is", "print", "len",
    "range", "str", "int", "float", "open", "isinstance", "super",
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Scan source text for unqualified call targets (`name(...)`), in
/// discovery order. Python has no bare-call form, so only identifiers
/// directly applied to an argument list count.
pub fn call_sites(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    let mut prev_significant: Option<char> = None;
    let mut after_def = false;

    while i < chars.len() {
        let c = chars[i];

        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            // triple-quoted?
            let triple = chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote);
            i += if triple { 3 } else { 1 };
            loop {
                if i >= chars.len() {
                    break;
                }
                if chars[i] == '\\' {
                    i += 2;
                    continue;
                }
                if chars[i] == quote {
                    if !triple {
                        i += 1;
                        break;
                    }
                    if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                        i += 3;
                        break;
                    }
                }
                i += 1;
            }
            prev_significant = Some(quote);
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
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

            let mut j = i;
            while j < chars.len() && (chars[j] == ' ' || chars[j] == '\t') {
                j += 1;
            }
            if chars.get(j) == Some(&'(') && !out.contains(&ident) {
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

/// Render a wire value as a Python literal.
pub fn literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "None".to_string(),
        serde_json::Value::Bool(true) => "True".to_string(),
        serde_json::Value::Bool(false) => "False".to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => string_literal(s),
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", parts.join(", "))
        }
        serde_json::Value::Object(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", string_literal(k), literal(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
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

/// Assemble the self-contained Python program for one remote invocation.
pub fn build_payload(
    target: &str,
    arg_literals: &[String],
    snapshot: &StateSnapshot,
    definitions: &[String],
) -> String {
    let mut kept: IndexMap<String, &String> = IndexMap::new();
    let mut assignments = String::new();
    for (name, value) in snapshot.iter() {
        let bare = SlotKind::bare_name(name).to_string();
        if let Some(prior) = kept.get(&bare) {
            warn!(slot = %name, shadowed_by = %prior, "slot collides after sigil strip, skipping");
            continue;
        }
        assignments.push_str(&format!("{} = {}\n", bare, literal(value)));
        kept.insert(bare, name);
    }

    let mut resnapshots = String::new();
    for (bare, name) in &kept {
        resnapshots.push_str(&format!(
            "__lf_vars[{}] = __lf_safe(globals().get({}))\n",
            string_literal(name),
            string_literal(bare)
        ));
    }

    let defs = definitions.join("\n\n");
    let call = format!("{}({})", target, arg_literals.join(", "));

    format!(
        r#"# landfall payload v1 (python)
import json
import sys
import traceback
from io import StringIO

{assignments}
{defs}

def __lf_safe(v):
    try:
        json.dumps(v)
        return v
    except TypeError:
        return None

__lf_buffer = StringIO()
__lf_stdout = sys.stdout
__lf_stderr = sys.stderr
sys.stdout = __lf_buffer
sys.stderr = __lf_buffer

__lf_result = None
try:
    __lf_result = {call}
except BaseException:
    __lf_buffer.write("\n[REMOTE FAULT] " + traceback.format_exc())
finally:
    sys.stdout = __lf_stdout
    sys.stderr = __lf_stderr

__lf_vars = {{}}
{resnapshots}
print(json.dumps({{"variables": __lf_vars, "output": __lf_buffer.getvalue().strip(), "result": __lf_safe(__lf_result)}}))
"#
    )
}

/// Split a script into its top-level procedure definitions: a `def` line
/// plus every following line that is blank or more deeply indented.
pub fn extract_procedures(script: &str) -> IndexMap<String, String> {
    let def_re = Regex::new(r"^def\s+([a-zA-Z_]\w*)\s*\(").unwrap();
    let lines: Vec<&str> = script.lines().collect();
    let mut out: IndexMap<String, String> = IndexMap::new();

    let mut i = 0;
    while i < lines.len() {
        if let Some(caps) = def_re.captures(lines[i]) {
            let name = caps[1].to_string();
            let start = i;
            let mut j = i + 1;
            while j < lines.len() {
                let line = lines[j];
                if !line.trim().is_empty() && !line.starts_with(' ') && !line.starts_with('\t') {
                    break;
                }
                j += 1;
            }
            let mut end = j;
            while end > start + 1 && lines[end - 1].trim().is_empty() {
                end -= 1;
            }
            let body = lines[start..end].join("\n");
            out.entry(name).or_insert(body);
            i = j;
            continue;
        }
        i += 1;
    }

    out
}
