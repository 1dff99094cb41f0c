//! Request bodies exchanged over qrexec.
//!
//! Untrusted strings always travel base64-encoded, one field per line, so a
//! name or path can never smuggle in a line break of its own.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::SharedFoldersError;
use crate::folder::PATH_MAX;
use crate::qube::VM_NAME_MAX;

/// Acknowledgment sent by the exporting qube once it is ready to stream.
pub const ACK: &[u8; 3] = b"ok\n";

const fn encoded_len(len: usize) -> usize {
    len.div_ceil(3) * 4
}

/// Upper bound on an `AuthorizeFolderAccess` request body.
pub const MAX_AUTHORIZATION_REQUEST: usize = encoded_len(VM_NAME_MAX) + encoded_len(PATH_MAX) + 2;

/// Upper bound on a body carrying a single encoded folder line.
pub const MAX_FOLDER_REQUEST: usize = encoded_len(PATH_MAX) + 1;

pub fn encode_field(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Decodes one base64 field, ignoring surrounding whitespace.
pub fn decode_field(field: &[u8]) -> Result<String, SharedFoldersError> {
    let bytes = STANDARD
        .decode(field.trim_ascii())
        .map_err(|e| SharedFoldersError::MalformedRequest(format!("invalid base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|_| SharedFoldersError::MalformedRequest("field is not valid UTF-8".to_string()))
}

pub fn encode_folder_line(folder: &str) -> Vec<u8> {
    let mut line = encode_field(folder).into_bytes();
    line.push(b'\n');
    line
}

/// The two still-encoded fields of an `AuthorizeFolderAccess` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationRequest<'a> {
    pub target: &'a [u8],
    pub folder: &'a [u8],
}

impl<'a> AuthorizationRequest<'a> {
    pub fn encode(target: &str, folder: &str) -> Vec<u8> {
        let mut body = encode_field(target).into_bytes();
        body.push(b'\n');
        body.extend(encode_folder_line(folder));
        body
    }

    /// Splits a body into its first two lines. Anything after the second
    /// line is ignored.
    pub fn split(body: &'a [u8]) -> Result<Self, SharedFoldersError> {
        let mut lines = body.split(|b| *b == b'\n');
        match (lines.next(), lines.next()) {
            (Some(target), Some(folder)) => Ok(Self { target, folder }),
            _ => Err(SharedFoldersError::MalformedRequest(
                "the arguments were malformed".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_request_layout() {
        let body = AuthorizationRequest::encode("vault", "/home/user");
        assert_eq!(body, b"dmF1bHQ=\nL2hvbWUvdXNlcg==\n".to_vec());

        let request = AuthorizationRequest::split(&body).unwrap();
        assert_eq!(decode_field(request.target).unwrap(), "vault");
        assert_eq!(decode_field(request.folder).unwrap(), "/home/user");
    }

    #[test]
    fn test_split_requires_two_lines() {
        assert!(AuthorizationRequest::split(b"dmF1bHQ=").is_err());
        assert!(AuthorizationRequest::split(b"").is_err());
        let request = AuthorizationRequest::split(b"dmF1bHQ=\nL2hvbWU=").unwrap();
        assert_eq!(decode_field(request.folder).unwrap(), "/home");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_field(b"not base64!").is_err());
        // 0xff 0xfe is not UTF-8
        assert!(decode_field(b"//4=").is_err());
    }

    #[test]
    fn test_bounds_fit_largest_fields() {
        let folder = format!("/{}", "x".repeat(PATH_MAX - 2));
        let target = "q".repeat(VM_NAME_MAX);
        assert!(AuthorizationRequest::encode(&target, &folder).len() <= MAX_AUTHORIZATION_REQUEST);
        assert!(encode_folder_line(&folder).len() <= MAX_FOLDER_REQUEST);
    }
}
