use anyhow::{anyhow, Context, Result};

use policy_engine::{Decision, PolicyStore};
use sharedfolders_core::config::Config;
use sharedfolders_core::Fingerprint;

#[derive(Debug)]
pub enum PolicyAction {
    List { json: bool },
    Show { fingerprint: Fingerprint },
    Revoke { fingerprint: Fingerprint },
    Sync,
}

pub fn execute(config: &Config, action: PolicyAction) -> Result<()> {
    let store = PolicyStore::new(&config.policy);
    match action {
        PolicyAction::List { json } => {
            let matrix = store.load();
            if json {
                let rendered = matrix.to_json().context("render policy")?;
                println!("{}", String::from_utf8_lossy(&rendered));
            } else if matrix.is_empty() {
                println!("No decisions recorded in {}", store.db_path().display());
            } else {
                for (fingerprint, decision) in matrix.iter() {
                    println!("{}", list_line(fingerprint, decision));
                }
            }
        }
        PolicyAction::Show { fingerprint } => {
            let matrix = store.load();
            let decision = matrix
                .get(&fingerprint)
                .ok_or_else(|| anyhow!("no decision recorded for {fingerprint}"))?;
            let rendered = serde_json::to_string_pretty(decision).context("render decision")?;
            println!("{rendered}");
        }
        PolicyAction::Revoke { fingerprint } => match store.revoke(&fingerprint)? {
            Some(decision) => println!("Revoked {}", list_line(&fingerprint, &decision)),
            None => return Err(anyhow!("no decision recorded for {fingerprint}")),
        },
        PolicyAction::Sync => {
            let matrix = store.sync()?;
            let granted = matrix.iter().filter(|(_, d)| d.response.is_allow()).count();
            println!(
                "Synced {} grants from {} decisions into {}",
                granted,
                matrix.len(),
                config.policy.grant_dir.display()
            );
        }
    }
    Ok(())
}

fn list_line(fingerprint: &Fingerprint, decision: &Decision) -> String {
    format!(
        "{}  {} -> {}:{}  {}",
        fingerprint, decision.source, decision.target, decision.folder, decision.response
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharedfolders_core::{FolderPath, QubeName, Response, StaticRegistry};
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> Config {
        let mut config = Config::default_config();
        config.policy.db_path = temp.path().join("policy.db");
        config.policy.grant_dir = temp.path().join("policy");
        config
    }

    fn record(config: &Config) -> Fingerprint {
        PolicyStore::new(&config.policy)
            .record_decision(
                &StaticRegistry::new(["work", "vault"]),
                &QubeName::new("work").unwrap(),
                &QubeName::new("vault").unwrap(),
                &FolderPath::new("/srv").unwrap(),
                Response::AllowAlways,
            )
            .unwrap()
    }

    #[test]
    fn test_list_line() {
        let decision = Decision::new(
            QubeName::new("work").unwrap(),
            QubeName::new("vault").unwrap(),
            FolderPath::new("/srv").unwrap(),
            Response::DenyOnce,
        )
        .unwrap();
        let fp = decision.fingerprint();
        assert_eq!(
            list_line(&fp, &decision),
            format!("{fp}  work -> vault:/srv  DENY_ONETIME")
        );
    }

    #[test]
    fn test_revoke_removes_decision() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let fp = record(&config);

        execute(&config, PolicyAction::Show { fingerprint: fp.clone() }).unwrap();
        execute(&config, PolicyAction::Revoke { fingerprint: fp.clone() }).unwrap();
        assert!(PolicyStore::new(&config.policy).load().is_empty());
        assert!(execute(&config, PolicyAction::Revoke { fingerprint: fp.clone() }).is_err());
        assert!(execute(&config, PolicyAction::Show { fingerprint: fp }).is_err());
    }

    #[test]
    fn test_sync_restores_grants() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let fp = record(&config);
        let store = PolicyStore::new(&config.policy);
        std::fs::remove_file(store.grants().grant_path(&fp)).unwrap();

        execute(&config, PolicyAction::Sync).unwrap();
        assert!(store.grants().grant_path(&fp).exists());
        execute(&config, PolicyAction::List { json: false }).unwrap();
    }
}
