//! landfall.yaml parsing and validation.
//!
//! The inventory names the hosts procedures can land on and picks the
//! payload dialect. `localhost` is always available even when the file
//! does not declare it (or does not exist at all).

use super::error::Error;
use super::types::Host;
use crate::lang::Dialect;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "landfall.yaml";

/// Host entry as written in landfall.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEntry {
    pub addr: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub ssh_key: Option<String>,
}

fn default_user() -> String {
    "root".to_string()
}

/// Parsed inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub hosts: IndexMap<String, HostEntry>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            version: default_version(),
            dialect: Dialect::default(),
            hosts: IndexMap::new(),
        }
    }
}

impl Inventory {
    /// Look up a host by name. `localhost` resolves even without an entry.
    pub fn host(&self, name: &str) -> Result<Host, Error> {
        if let Some(entry) = self.hosts.get(name) {
            return Ok(Host {
                name: name.to_string(),
                addr: entry.addr.clone(),
                user: entry.user.clone(),
                ssh_key: entry.ssh_key.clone(),
            });
        }
        if name == "localhost" {
            return Ok(Host::localhost());
        }
        Err(Error::Config(format!("unknown host '{}'", name)))
    }

    pub fn host_names(&self) -> Vec<&str> {
        self.hosts.keys().map(String::as_str).collect()
    }

    /// Register a host programmatically (library embedders; the CLI only
    /// reads landfall.yaml).
    pub fn add_host(&mut self, name: impl Into<String>, entry: HostEntry) {
        self.hosts.insert(name.into(), entry);
    }
}

/// Parse a landfall.yaml file from disk.
pub fn parse_file(path: &Path) -> Result<Inventory, Error> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
    parse(&content)
}

/// Parse a landfall.yaml from a string.
pub fn parse(yaml: &str) -> Result<Inventory, Error> {
    serde_yaml_ng::from_str(yaml).map_err(|e| Error::Config(format!("YAML parse error: {}", e)))
}

/// Load the inventory, falling back to the built-in default when the file
/// is absent.
pub fn load_or_default(path: &Path) -> Result<Inventory, Error> {
    if path.exists() {
        parse_file(path)
    } else {
        Ok(Inventory::default())
    }
}

/// Validate a parsed inventory. Returns a list of errors (empty = valid).
pub fn validate(inventory: &Inventory) -> Vec<String> {
    let mut errors = Vec::new();

    if inventory.version != "1.0" {
        errors.push(format!(
            "version must be \"1.0\", got \"{}\"",
            inventory.version
        ));
    }

    for (name, entry) in &inventory.hosts {
        if name.is_empty() {
            errors.push("host name must not be empty".to_string());
        }
        if entry.addr.is_empty() {
            errors.push(format!("host '{}' has an empty addr", name));
        }
        if entry.user.is_empty() {
            errors.push(format!("host '{}' has an empty user", name));
        }
    }

    errors
}

/// Render a starter landfall.yaml.
pub fn starter_config() -> String {
    "version: \"1.0\"\n\
     dialect: ruby\n\
     hosts:\n\
     \x20 worker:\n\
     \x20   addr: 192.168.1.100\n\
     \x20   user: root\n\
     \x20   ssh_key: ~/.ssh/id_ed25519\n"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
version: "1.0"
dialect: python
hosts:
  alpha:
    addr: 10.0.0.10
  beta:
    addr: 10.0.0.11
    user: deploy
    ssh_key: ~/.ssh/beta_key
"#;

    #[test]
    fn test_parse_sample() {
        let inv = parse(SAMPLE).unwrap();
        assert_eq!(inv.version, "1.0");
        assert_eq!(inv.dialect, Dialect::Python);
        assert_eq!(inv.hosts.len(), 2);
        assert_eq!(inv.hosts["alpha"].user, "root");
        assert_eq!(inv.hosts["beta"].user, "deploy");
        assert!(validate(&inv).is_empty());
    }

    #[test]
    fn test_host_lookup() {
        let inv = parse(SAMPLE).unwrap();
        let beta = inv.host("beta").unwrap();
        assert_eq!(beta.addr, "10.0.0.11");
        assert_eq!(beta.ssh_key.as_deref(), Some("~/.ssh/beta_key"));

        let local = inv.host("localhost").unwrap();
        assert_eq!(local.addr, "127.0.0.1");

        assert!(matches!(inv.host("gamma"), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_inventory_has_localhost_only() {
        let inv = Inventory::default();
        assert_eq!(inv.dialect, Dialect::Ruby);
        assert!(inv.host_names().is_empty());
        assert!(inv.host("localhost").is_ok());
    }

    #[test]
    fn test_add_host() {
        let mut inv = Inventory::default();
        inv.add_host(
            "worker",
            HostEntry {
                addr: "10.0.0.9".to_string(),
                user: "deploy".to_string(),
                ssh_key: None,
            },
        );
        assert_eq!(inv.host("worker").unwrap().user, "deploy");
    }

    #[test]
    fn test_validate_reports_problems() {
        let inv = parse(
            r#"
version: "2.0"
hosts:
  bad:
    addr: ""
"#,
        )
        .unwrap();
        let errors = validate(&inv);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("version"));
        assert!(errors[1].contains("empty addr"));
    }

    #[test]
    fn test_parse_file_roundtrip() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(SAMPLE.as_bytes()).unwrap();
        let inv = parse_file(f.path()).unwrap();
        assert_eq!(inv.hosts.len(), 2);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let inv = load_or_default(Path::new("/nonexistent/landfall.yaml")).unwrap();
        assert!(inv.hosts.is_empty());
    }

    #[test]
    fn test_starter_config_parses_clean() {
        let inv = parse(&starter_config()).unwrap();
        assert!(validate(&inv).is_empty());
        assert_eq!(inv.dialect, Dialect::Ruby);
        assert_eq!(inv.host("worker").unwrap().addr, "192.168.1.100");
    }

    #[test]
    fn test_parse_garbage_is_config_error() {
        assert!(matches!(parse("hosts: [not a map"), Err(Error::Config(_))));
    }
}
