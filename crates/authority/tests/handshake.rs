use std::fs;

use authority::{AuthorizeFolderAccess, FixedConsent, QueryFolderForAuthorization, ServiceError};
use policy_engine::PolicyStore;
use sharedfolders_core::config::PolicyConfig;
use sharedfolders_core::wire::{encode_folder_line, AuthorizationRequest};
use sharedfolders_core::{Fingerprint, QrexecContext, Response, StaticRegistry};
use tempfile::TempDir;

struct Dom0 {
    _temp: TempDir,
    store: PolicyStore,
    registry: StaticRegistry,
}

impl Dom0 {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let store = PolicyStore::new(&PolicyConfig {
            db_path: temp.path().join("shared-folders/policy.db"),
            grant_dir: temp.path().join("qubes-rpc/policy"),
            ..PolicyConfig::default()
        });
        Self {
            _temp: temp,
            store,
            registry: StaticRegistry::new(["work", "vault", "personal"]),
        }
    }

    fn authorize(&self, source: &str, target: &str, folder: &str, answer: Response) -> Result<Fingerprint, ServiceError> {
        let consent = FixedConsent(answer);
        let service = AuthorizeFolderAccess::new(&self.store, &self.registry, &consent);
        let mut output = Vec::new();
        let fp = service.serve(
            &QrexecContext::dom0_call(source),
            &AuthorizationRequest::encode(target, folder)[..],
            &mut output,
        )?;
        assert_eq!(output, fp.as_str().as_bytes());
        Ok(fp)
    }

    fn query(&self, exporter: &str, fp: &Fingerprint, folder: &str) -> Result<Vec<u8>, ServiceError> {
        let service = QueryFolderForAuthorization::new(&self.store);
        let mut output = Vec::new();
        service.serve(
            &QrexecContext::dom0_call(exporter).with_argument(fp.as_str()),
            &encode_folder_line(folder)[..],
            &mut output,
        )?;
        Ok(output)
    }
}

#[test]
fn test_durable_grant_covers_subfolders() {
    let dom0 = Dom0::new();
    let fp = dom0.authorize("work", "vault", "/home/user", Response::AllowAlways).unwrap();

    let grant = dom0.store.grants().grant_path(&fp);
    assert_eq!(fs::read_to_string(grant).unwrap(), "work vault allow");

    assert_eq!(dom0.query("vault", &fp, "/home/user/docs").unwrap(), b"/home/user/docs\n");
    assert_eq!(dom0.query("vault", &fp, "/home/user").unwrap(), b"/home/user\n");
    assert!(matches!(dom0.query("vault", &fp, "/home/username"), Err(ServiceError::Refused)));

    // a later request for a subfolder reuses the stored answer
    let again = dom0.authorize("work", "vault", "/home/user/music", Response::DenyAlways).unwrap();
    assert_eq!(again, fp);
}

#[test]
fn test_onetime_grant_is_used_by_query() {
    let dom0 = Dom0::new();
    let fp = dom0.authorize("work", "vault", "/srv", Response::AllowOnce).unwrap();
    assert!(dom0.store.grants().grant_path(&fp).exists());

    dom0.query("vault", &fp, "/srv").unwrap();
    assert!(!dom0.store.grants().grant_path(&fp).exists());
    assert!(matches!(dom0.query("vault", &fp, "/srv"), Err(ServiceError::Refused)));
}

#[test]
fn test_narrow_allow_inside_broad_deny() {
    let dom0 = Dom0::new();
    let fp = dom0.authorize("work", "vault", "/home/user", Response::AllowAlways).unwrap();
    assert!(matches!(
        dom0.authorize("work", "vault", "/home", Response::DenyAlways),
        Err(ServiceError::Refused)
    ));

    let inner = dom0.authorize("work", "vault", "/home/user/subfolder", Response::DenyOnce).unwrap();
    assert_eq!(inner, fp);
    assert!(matches!(
        dom0.authorize("work", "vault", "/home", Response::AllowAlways),
        Err(ServiceError::Refused)
    ));
}

#[test]
fn test_block_denies_everything_for_the_pair_only() {
    let dom0 = Dom0::new();
    assert!(dom0.authorize("work", "vault", "/tmp", Response::Block).is_err());
    assert!(matches!(
        dom0.authorize("work", "vault", "/etc", Response::AllowAlways),
        Err(ServiceError::Refused)
    ));
    assert!(dom0.authorize("personal", "vault", "/etc", Response::AllowAlways).is_ok());
}

#[test]
fn test_fingerprint_is_not_transferable() {
    let dom0 = Dom0::new();
    let fp = dom0.authorize("work", "vault", "/srv", Response::AllowAlways).unwrap();
    let forged = sharedfolders_core::fingerprint("personal", "vault", "/srv");
    assert_ne!(fp, forged);
    assert!(matches!(dom0.query("vault", &forged, "/srv"), Err(ServiceError::Refused)));
}
