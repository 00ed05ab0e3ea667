//! CLI subcommands — init, validate, hosts, resolve, payload, run.

use crate::core::config;
use crate::core::context::{capture, Context};
use crate::core::error::Error;
use crate::core::hub::Hub;
use crate::core::registry::Registry;
use crate::core::types::Value;
use crate::core::{payload, resolver};
use crate::lang::Dialect;
use crate::transport::SystemTransport;
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new landfall project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate landfall.yaml without connecting to hosts
    Validate {
        /// Path to landfall.yaml
        #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },

    /// List the hosts procedures can land on
    Hosts {
        /// Path to landfall.yaml
        #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },

    /// Show the dependency closure of a procedure in a script
    Resolve {
        /// Script containing the procedure definitions
        script: PathBuf,

        /// Procedure to resolve
        procedure: String,

        /// Payload dialect (overrides landfall.yaml)
        #[arg(short, long)]
        dialect: Option<Dialect>,

        /// Path to landfall.yaml
        #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },

    /// Print the payload that would be shipped, without executing it
    Payload {
        /// Script containing the procedure definitions
        script: PathBuf,

        /// Procedure to invoke
        procedure: String,

        /// Arguments as JSON values
        args: Vec<String>,

        /// Seed a state slot, e.g. --set @y=3
        #[arg(short, long, value_name = "SLOT=JSON")]
        set: Vec<String>,

        /// Payload dialect (overrides landfall.yaml)
        #[arg(short, long)]
        dialect: Option<Dialect>,

        /// Path to landfall.yaml
        #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },

    /// Land a procedure on a host and invoke it
    Run {
        /// Script containing the procedure definitions
        script: PathBuf,

        /// Procedure to invoke
        procedure: String,

        /// Arguments as JSON values
        args: Vec<String>,

        /// Host to land on (name from landfall.yaml, default localhost)
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Seed a state slot, e.g. --set @y=3
        #[arg(short, long, value_name = "SLOT=JSON")]
        set: Vec<String>,

        /// Payload dialect (overrides landfall.yaml)
        #[arg(short, long)]
        dialect: Option<Dialect>,

        /// Path to landfall.yaml
        #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), Error> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Hosts { file } => cmd_hosts(&file),
        Commands::Resolve {
            script,
            procedure,
            dialect,
            file,
        } => cmd_resolve(&script, &procedure, dialect, &file),
        Commands::Payload {
            script,
            procedure,
            args,
            set,
            dialect,
            file,
        } => cmd_payload(&script, &procedure, &args, &set, dialect, &file),
        Commands::Run {
            script,
            procedure,
            args,
            host,
            set,
            dialect,
            file,
        } => cmd_run(&script, &procedure, &args, &host, &set, dialect, &file),
    }
}

fn cmd_init(path: &Path) -> Result<(), Error> {
    let config_path = path.join(config::DEFAULT_CONFIG_FILE);
    if config_path.exists() {
        return Err(Error::Config(format!(
            "{} already exists",
            config_path.display()
        )));
    }

    std::fs::write(&config_path, config::starter_config())
        .map_err(|e| Error::Config(format!("cannot write {}: {}", config_path.display(), e)))?;

    println!("Initialized landfall project at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), Error> {
    let inventory = config::parse_file(file)?;
    let errors = config::validate(&inventory);

    if errors.is_empty() {
        println!(
            "OK: {} host(s), dialect {}",
            inventory.hosts.len(),
            inventory.dialect
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(Error::Config(format!(
            "{} validation error(s)",
            errors.len()
        )))
    }
}

fn cmd_hosts(file: &Path) -> Result<(), Error> {
    let inventory = load_inventory(file)?;
    println!("localhost -> 127.0.0.1 (built-in)");
    for (name, entry) in &inventory.hosts {
        println!("{} -> {}@{}", name, entry.user, entry.addr);
    }
    Ok(())
}

fn cmd_resolve(
    script: &Path,
    procedure: &str,
    dialect: Option<Dialect>,
    file: &Path,
) -> Result<(), Error> {
    let inventory = load_inventory(file)?;
    let dialect = dialect.unwrap_or(inventory.dialect);
    let ctx = load_script(script, dialect, &[])?;

    let mut registry = Registry::new();
    let closure = resolver::resolve(&mut registry, &ctx, dialect, procedure)?;
    for name in &closure {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_payload(
    script: &Path,
    procedure: &str,
    args: &[String],
    set: &[String],
    dialect: Option<Dialect>,
    file: &Path,
) -> Result<(), Error> {
    let inventory = load_inventory(file)?;
    let dialect = dialect.unwrap_or(inventory.dialect);
    let ctx = load_script(script, dialect, set)?;

    let mut registry = Registry::new();
    let closure = resolver::resolve(&mut registry, &ctx, dialect, procedure)?;
    let definitions: Vec<String> = closure
        .iter()
        .filter_map(|dep| registry.get(dep).ok())
        .map(|d| d.source_text.clone())
        .collect();

    let arg_values = parse_args(args);
    let snapshot = capture(&ctx);
    let payload = payload::build(dialect, procedure, &arg_values, &snapshot, &definitions)?;
    print!("{}", payload);
    Ok(())
}

fn cmd_run(
    script: &Path,
    procedure: &str,
    args: &[String],
    host_name: &str,
    set: &[String],
    dialect: Option<Dialect>,
    file: &Path,
) -> Result<(), Error> {
    let inventory = load_inventory(file)?;
    let dialect = dialect.unwrap_or(inventory.dialect);
    let host = inventory.host(host_name)?;
    let mut ctx = load_script(script, dialect, set)?;

    let hub = Hub::new(dialect, Box::new(SystemTransport::new(dialect)));
    let value = hub.run(procedure, &host, &parse_args(args), &mut ctx)?;

    println!("=> {}", value);
    for (name, slot) in ctx.slots() {
        println!("   {} = {}", name, slot);
    }
    Ok(())
}

/// Read the inventory, tolerating a missing file only at the default path.
fn load_inventory(file: &Path) -> Result<config::Inventory, Error> {
    if file == Path::new(config::DEFAULT_CONFIG_FILE) {
        config::load_or_default(file)
    } else {
        config::parse_file(file)
    }
}

/// Build a context from a script's procedure definitions plus --set slots.
fn load_script(script: &Path, dialect: Dialect, set: &[String]) -> Result<Context, Error> {
    let source = std::fs::read_to_string(script)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", script.display(), e)))?;

    let mut ctx = Context::new();
    for (name, body) in dialect.extract_procedures(&source) {
        ctx.define_procedure(name, body);
    }

    for entry in set {
        let (name, raw) = entry.split_once('=').ok_or_else(|| {
            Error::Config(format!("--set expects SLOT=JSON, got '{}'", entry))
        })?;
        ctx.set(name.to_string(), parse_value(raw));
    }
    Ok(ctx)
}

/// Parse a CLI value: JSON when it is JSON, bare string otherwise.
fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from_wire(&json),
        Err(_) => Value::Str(raw.to_string()),
    }
}

fn parse_args(args: &[String]) -> Vec<Value> {
    args.iter().map(|a| parse_value(a)).collect()
}
