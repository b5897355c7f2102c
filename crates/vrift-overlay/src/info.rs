//! The `info` record at the overlay root: a 4-byte magic followed by the
//! overlay format version as a big-endian u32.

use crate::header::HeaderError;

/// File name of the info record.
pub const INFO_FILE: &str = "info";

/// Identifies an overlay info file.
pub const INFO_MAGIC: [u8; 4] = [0xed, 0xe0, 0x00, 0x01];

/// Overlay directory format version.
pub const OVERLAY_VERSION: u32 = 1;

pub const INFO_LENGTH: usize = INFO_MAGIC.len() + 4;

/// Directory whose presence marks a pre-versioning overlay.
pub const LEGACY_TREE_DIR: &str = "tree";

/// Info record for `version`.
pub fn encode_info(version: u32) -> [u8; INFO_LENGTH] {
    let mut buf = [0u8; INFO_LENGTH];
    buf[..4].copy_from_slice(&INFO_MAGIC);
    buf[4..].copy_from_slice(&version.to_be_bytes());
    buf
}

/// Check magic and version, returning the version on success.
pub fn validate_info(bytes: &[u8]) -> Result<u32, HeaderError> {
    if bytes.len() < INFO_LENGTH {
        return Err(HeaderError::Truncated { len: bytes.len() });
    }
    if bytes[..4] != INFO_MAGIC {
        return Err(HeaderError::BadIdentifier {
            found: hex::encode(&bytes[..4]),
        });
    }
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[4..INFO_LENGTH]);
    let version = u32::from_be_bytes(raw);
    if version != OVERLAY_VERSION {
        return Err(HeaderError::UnsupportedVersion { found: version });
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_layout() {
        assert_eq!(encode_info(1), [0xed, 0xe0, 0x00, 0x01, 0, 0, 0, 1]);
        assert_eq!(validate_info(&encode_info(OVERLAY_VERSION)), Ok(1));
    }

    #[test]
    fn test_info_rejections() {
        assert_eq!(
            validate_info(&encode_info(2)),
            Err(HeaderError::UnsupportedVersion { found: 2 })
        );
        assert_eq!(
            validate_info(&[0xed, 0xe0]),
            Err(HeaderError::Truncated { len: 2 })
        );
        let mut bad = encode_info(1);
        bad[0] = 0;
        assert!(matches!(
            validate_info(&bad),
            Err(HeaderError::BadIdentifier { .. })
        ));
    }
}
