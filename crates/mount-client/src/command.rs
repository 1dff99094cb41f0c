use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use nix::unistd::{getgid, getuid, User};

use sharedfolders_core::config::ClientConfig;
use sharedfolders_core::{FolderPath, QubeName};

/// Who the mounted files should appear to belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountIdentity {
    pub uid: u32,
    pub gid: u32,
    pub user: String,
}

impl MountIdentity {
    pub fn current() -> Result<Self> {
        let uid = getuid();
        let user = User::from_uid(uid)
            .context("look up current user")?
            .ok_or_else(|| anyhow!("no passwd entry for uid {uid}"))?;
        Ok(Self {
            uid: uid.as_raw(),
            gid: getgid().as_raw(),
            user: user.name,
        })
    }
}

/// The privileged `mount` invocation that attaches a 9P stream, read from
/// stdin and written to stdout, to a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountCommand {
    pub executable: PathBuf,
    pub args: Vec<String>,
}

impl MountCommand {
    pub fn new(executable: PathBuf, args: Vec<String>) -> Self {
        Self { executable, args }
    }

    pub fn for_share(
        config: &ClientConfig,
        identity: &MountIdentity,
        vm: &QubeName,
        folder: &FolderPath,
        mountpoint: &Path,
    ) -> Self {
        let options = format!(
            "trans=fd,rfdno=0,wfdno=1,version=9p2000.L,dfltuid={},dfltgid={},uname={},aname={}",
            identity.uid, identity.gid, identity.user, folder
        );
        let args = vec![
            config.mount.display().to_string(),
            "-t".to_string(),
            "9p".to_string(),
            "-o".to_string(),
            options,
            format!("qvm://{vm}{folder}"),
            mountpoint.display().to_string(),
        ];
        Self::new(config.sudo.clone(), args)
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.executable);
        command.args(&self.args);
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_command_line() {
        let identity = MountIdentity {
            uid: 1000,
            gid: 1000,
            user: "user".to_string(),
        };
        let command = MountCommand::for_share(
            &ClientConfig::default(),
            &identity,
            &QubeName::new("vault").unwrap(),
            &FolderPath::new("/home/user/docs").unwrap(),
            Path::new("/mnt/docs"),
        );
        assert_eq!(command.executable, PathBuf::from("/usr/bin/sudo"));
        assert_eq!(
            command.args,
            vec![
                "/usr/bin/mount",
                "-t",
                "9p",
                "-o",
                "trans=fd,rfdno=0,wfdno=1,version=9p2000.L,dfltuid=1000,dfltgid=1000,uname=user,aname=/home/user/docs",
                "qvm://vault/home/user/docs",
                "/mnt/docs",
            ]
        );
    }
}
