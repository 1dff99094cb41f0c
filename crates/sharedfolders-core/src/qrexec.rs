//! The qrexec service environment.
//!
//! qrexec starts one process per service call and describes the call through
//! environment variables. The remote domain is attested by qrexec itself;
//! everything arriving on stdin is not.

use std::fmt;

pub const REMOTE_DOMAIN: &str = "QREXEC_REMOTE_DOMAIN";
pub const SERVICE_ARGUMENT: &str = "QREXEC_SERVICE_ARGUMENT";
pub const REQUESTED_TARGET_TYPE: &str = "QREXEC_REQUESTED_TARGET_TYPE";
pub const REQUESTED_TARGET: &str = "QREXEC_REQUESTED_TARGET";
pub const REQUESTED_TARGET_KEYWORD: &str = "QREXEC_REQUESTED_TARGET_KEYWORD";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QrexecContext {
    pub remote_domain: Option<String>,
    pub service_argument: Option<String>,
    pub requested_target_type: Option<String>,
    pub requested_target: Option<String>,
    pub requested_target_keyword: Option<String>,
}

impl QrexecContext {
    pub fn from_env() -> Self {
        Self {
            remote_domain: non_empty_var(REMOTE_DOMAIN),
            service_argument: non_empty_var(SERVICE_ARGUMENT),
            requested_target_type: non_empty_var(REQUESTED_TARGET_TYPE),
            requested_target: non_empty_var(REQUESTED_TARGET),
            requested_target_keyword: non_empty_var(REQUESTED_TARGET_KEYWORD),
        }
    }

    /// Test helper: context of a call from `caller` addressed to dom0 by
    /// name. Services build theirs with [`QrexecContext::from_env`].
    pub fn dom0_call(caller: &str) -> Self {
        Self {
            remote_domain: Some(caller.to_string()),
            requested_target_type: Some("name".to_string()),
            requested_target: Some("dom0".to_string()),
            ..Self::default()
        }
    }

    /// Test helper, paired with [`QrexecContext::dom0_call`].
    pub fn with_argument(mut self, argument: &str) -> Self {
        self.service_argument = Some(argument.to_string());
        self
    }

    /// dom0 may be addressed by name or through the `@adminvm` keyword.
    pub fn targets_admin_vm(&self) -> bool {
        match self.requested_target_type.as_deref() {
            Some("name") => self.requested_target.as_deref() == Some("dom0"),
            Some("keyword") => self.requested_target_keyword.as_deref() == Some("adminvm"),
            _ => false,
        }
    }

    pub fn requested_target(&self) -> RequestedTarget<'_> {
        RequestedTarget(self)
    }
}

/// Display helper describing where a call was addressed.
pub struct RequestedTarget<'a>(&'a QrexecContext);

impl fmt::Display for RequestedTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "target type {}, target {}, target keyword {}",
            show(&self.0.requested_target_type),
            show(&self.0.requested_target),
            show(&self.0.requested_target_keyword)
        )
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
