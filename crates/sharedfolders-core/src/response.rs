use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SharedFoldersError;

/// Outcome of a folder share request, as decided by the user.
///
/// `Block` only ever comes out of the consent prompt; the decision matrix
/// rewrites it before storing anything.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Response {
    #[serde(rename = "ALLOW_ONETIME")]
    AllowOnce,
    #[serde(rename = "DENY_ONETIME")]
    DenyOnce,
    #[serde(rename = "ALLOW_ALWAYS")]
    AllowAlways,
    #[serde(rename = "DENY_ALWAYS")]
    DenyAlways,
    #[serde(rename = "BLOCK")]
    Block,
}

impl Response {
    pub const ALL: [Response; 5] = [
        Response::AllowOnce,
        Response::DenyOnce,
        Response::AllowAlways,
        Response::DenyAlways,
        Response::Block,
    ];

    pub fn is_allow(&self) -> bool {
        match self {
            Response::AllowOnce | Response::AllowAlways => true,
            Response::DenyOnce | Response::DenyAlways | Response::Block => false,
        }
    }

    pub fn is_onetime(&self) -> bool {
        match self {
            Response::AllowOnce | Response::DenyOnce => true,
            Response::AllowAlways | Response::DenyAlways | Response::Block => false,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Response::Block)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Response::AllowOnce => "ALLOW_ONETIME",
            Response::DenyOnce => "DENY_ONETIME",
            Response::AllowAlways => "ALLOW_ALWAYS",
            Response::DenyAlways => "DENY_ALWAYS",
            Response::Block => "BLOCK",
        }
    }
}

impl FromStr for Response {
    type Err = SharedFoldersError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Response::ALL
            .into_iter()
            .find(|response| response.as_str() == value)
            .ok_or_else(|| SharedFoldersError::UnknownResponse(value.to_string()))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(Response::AllowOnce.is_allow());
        assert!(Response::AllowAlways.is_allow());
        assert!(!Response::DenyOnce.is_allow());
        assert!(!Response::Block.is_allow());

        assert!(Response::AllowOnce.is_onetime());
        assert!(Response::DenyOnce.is_onetime());
        assert!(!Response::DenyAlways.is_onetime());
        assert!(!Response::Block.is_onetime());

        assert!(Response::Block.is_block());
        assert!(!Response::DenyAlways.is_block());
    }

    #[test]
    fn test_parse_exact_names_only() {
        for response in Response::ALL {
            assert_eq!(response.as_str().parse::<Response>().unwrap(), response);
        }
        assert!("allow_always".parse::<Response>().is_err());
        assert!("ALLOW".parse::<Response>().is_err());
        assert!("ALLOW_ALWAYS\n".parse::<Response>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&Response::DenyOnce).unwrap();
        assert_eq!(json, "\"DENY_ONETIME\"");
        let parsed: Response = serde_json::from_str("\"BLOCK\"").unwrap();
        assert_eq!(parsed, Response::Block);
    }
}
