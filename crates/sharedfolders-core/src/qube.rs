//! Validated qube names.
//!
//! A qube name must:
//! - start with an ASCII letter
//! - continue with ASCII letters, digits, `_` or `-`
//! - be at most 31 characters long

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SharedFoldersError;

/// Longest name dom0 accepts for a qube.
pub const QUBE_NAME_MAX: usize = 31;

/// Upper bound used when sizing request buffers that carry a qube name.
pub const VM_NAME_MAX: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QubeName(String);

impl QubeName {
    pub fn new(name: impl Into<String>) -> Result<Self, SharedFoldersError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(SharedFoldersError::InvalidQubeName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Disposable qubes carry generated `dispNNNN` names and must never
    /// accrue durable trust.
    pub fn is_disposable(&self) -> bool {
        self.0
            .strip_prefix("disp")
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= QUBE_NAME_MAX
        && first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl FromStr for QubeName {
    type Err = SharedFoldersError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for QubeName {
    type Error = SharedFoldersError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QubeName> for String {
    fn from(name: QubeName) -> Self {
        name.0
    }
}

impl fmt::Display for QubeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["work", "sys-usb", "a", "Personal_2", "disp1234"] {
            assert!(QubeName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_names() {
        let too_long = "a".repeat(QUBE_NAME_MAX + 1);
        for name in ["", "1work", "-work", "work vm", "work/..", "wörk", "work\n", too_long.as_str()] {
            assert!(QubeName::new(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_disposable_detection() {
        assert!(QubeName::new("disp1").unwrap().is_disposable());
        assert!(QubeName::new("disp9042").unwrap().is_disposable());
        assert!(!QubeName::new("disp").unwrap().is_disposable());
        assert!(!QubeName::new("disposable").unwrap().is_disposable());
        assert!(!QubeName::new("disp12a").unwrap().is_disposable());
        assert!(!QubeName::new("work").unwrap().is_disposable());
    }
}
