use std::fs::{self, File, Permissions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

/// Mode for files shared between dom0 tools: group-writable, world-readable.
pub const SHARED_FILE_MODE: u32 = 0o664;

/// Writes `contents` beside `path` and renames it into place, so readers see
/// either the old file or the new one and never a partial write.
pub fn write_atomically(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let temp = temp_path_for(path);
    let result = write_temp(&temp, contents, mode).and_then(|()| {
        fs::rename(&temp, path)
            .with_context(|| format!("rename {} to {}", temp.display(), path.display()))
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn write_temp(temp: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut file =
        File::create(temp).with_context(|| format!("create {}", temp.display()))?;
    file.write_all(contents)
        .with_context(|| format!("write {}", temp.display()))?;
    file.set_permissions(Permissions::from_mode(mode))
        .with_context(|| format!("set permissions on {}", temp.display()))?;
    file.sync_all()
        .with_context(|| format!("sync {}", temp.display()))?;
    Ok(())
}

/// Unique per writer, so concurrent service calls never share a temp file.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_replaces_and_sets_mode() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("policy.db");
        fs::write(&path, "old").unwrap();

        write_atomically(&path, b"new", SHARED_FILE_MODE).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);
        let leftovers: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing/policy.db");
        assert!(write_atomically(&path, b"{}", SHARED_FILE_MODE).is_err());
    }
}
