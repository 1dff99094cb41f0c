use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SharedFoldersError;

/// Paths must be strictly shorter than this.
pub const PATH_MAX: usize = 4096;

/// An absolute, normalized folder path.
///
/// Normalization is purely lexical: no `.` or `..` components, no empty
/// components, no trailing separator except on the root itself. Symlinks are
/// never resolved, so containment is decided on the string alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FolderPath(String);

impl FolderPath {
    pub fn new(path: impl Into<String>) -> Result<Self, SharedFoldersError> {
        let path = path.into();
        if !is_canonical(&path) {
            return Err(SharedFoldersError::InvalidPath(path));
        }
        Ok(Self(path))
    }

    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// True when `other` is this folder or lies anywhere beneath it.
    ///
    /// `/home` contains `/home/user` but not `/homework`.
    pub fn contains(&self, other: &FolderPath) -> bool {
        if self.is_root() {
            return true;
        }
        match other.0.strip_prefix(self.0.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

fn is_canonical(path: &str) -> bool {
    if path.len() >= PATH_MAX || path.contains('\0') {
        return false;
    }
    if path == "/" {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    rest.split('/')
        .all(|component| !component.is_empty() && component != "." && component != "..")
}

impl FromStr for FolderPath {
    type Err = SharedFoldersError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for FolderPath {
    type Error = SharedFoldersError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FolderPath> for String {
    fn from(path: FolderPath) -> Self {
        path.0
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(value: &str) -> FolderPath {
        FolderPath::new(value).unwrap()
    }

    #[test]
    fn test_canonical_paths_accepted() {
        for path in ["/", "/home", "/home/user", "/var/lib/.hidden", "/a..b/c.d"] {
            assert!(FolderPath::new(path).is_ok(), "{path} should be accepted");
        }
    }

    #[test]
    fn test_non_canonical_paths_rejected() {
        let long = format!("/{}", "x".repeat(PATH_MAX));
        for path in [
            "",
            "home",
            "./home",
            "/home/",
            "//home",
            "/home//user",
            "/home/./user",
            "/home/../etc",
            "/..",
            "/home\0/user",
            long.as_str(),
        ] {
            assert!(FolderPath::new(path).is_err(), "{path:?} should be rejected");
        }
    }

    #[test]
    fn test_length_bound_is_exclusive() {
        let at_limit = format!("/{}", "x".repeat(PATH_MAX - 1));
        assert_eq!(at_limit.len(), PATH_MAX);
        assert!(FolderPath::new(at_limit).is_err());
        let below = format!("/{}", "x".repeat(PATH_MAX - 2));
        assert!(FolderPath::new(below).is_ok());
    }

    #[test]
    fn test_contains_self_and_descendants() {
        assert!(folder("/home").contains(&folder("/home")));
        assert!(folder("/home").contains(&folder("/home/user")));
        assert!(folder("/home").contains(&folder("/home/user/subfolder")));
        assert!(folder("/").contains(&folder("/anything/at/all")));
        assert!(folder("/").contains(&folder("/")));
    }

    #[test]
    fn test_contains_rejects_basename_collisions() {
        assert!(!folder("/home").contains(&folder("/homework")));
        assert!(!folder("/home").contains(&folder("/hom")));
        assert!(!folder("/home/user").contains(&folder("/home")));
        assert!(!folder("/home/user").contains(&folder("/home/user2")));
    }
}
