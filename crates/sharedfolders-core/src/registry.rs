use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::SharedFoldersError;
use crate::qube::QubeName;

/// Answers whether a qube exists on this system.
pub trait QubeRegistry {
    fn exists(&self, name: &QubeName) -> Result<bool, SharedFoldersError>;
}

/// Registry backed by `qvm-ls --raw-list`.
///
/// dom0 itself is never a valid share endpoint, so it is filtered out of the
/// listing.
#[derive(Debug, Clone)]
pub struct QvmLsRegistry {
    command: PathBuf,
    args: Vec<String>,
}

impl QvmLsRegistry {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }

    pub fn list(&self) -> Result<BTreeSet<String>, SharedFoldersError> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .output()
            .map_err(|e| {
                SharedFoldersError::Registry(format!("run {}: {e}", self.command.display()))
            })?;
        if !output.status.success() {
            return Err(SharedFoldersError::Registry(format!(
                "{} exited with {}",
                self.command.display(),
                output.status
            )));
        }
        let listing = String::from_utf8_lossy(&output.stdout);
        Ok(parse_listing(&listing))
    }
}

fn parse_listing(listing: &str) -> BTreeSet<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "dom0")
        .map(str::to_string)
        .collect()
}

impl QubeRegistry for QvmLsRegistry {
    fn exists(&self, name: &QubeName) -> Result<bool, SharedFoldersError> {
        let known = self.list()?.contains(name.as_str());
        debug!(qube = %name, known, "checked qube registry");
        Ok(known)
    }
}

/// Fixed in-memory registry.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    names: BTreeSet<String>,
}

impl StaticRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl QubeRegistry for StaticRegistry {
    fn exists(&self, name: &QubeName) -> Result<bool, SharedFoldersError> {
        Ok(self.names.contains(name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_drops_dom0_and_blanks() {
        let names = parse_listing("dom0\nwork\n\nsys-usb\n  vault  \n");
        let expected: BTreeSet<String> = ["work", "sys-usb", "vault"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_static_registry() {
        let registry = StaticRegistry::new(["work", "vault"]);
        assert!(registry.exists(&QubeName::new("work").unwrap()).unwrap());
        assert!(!registry.exists(&QubeName::new("social").unwrap()).unwrap());
    }

    #[test]
    fn test_missing_listing_command_is_an_error() {
        let registry = QvmLsRegistry::new(&RegistryConfig {
            command: PathBuf::from("/nonexistent/qvm-ls"),
            args: vec!["--raw-list".to_string()],
        });
        let err = registry.exists(&QubeName::new("work").unwrap()).unwrap_err();
        assert!(matches!(err, SharedFoldersError::Registry(_)));
    }
}
