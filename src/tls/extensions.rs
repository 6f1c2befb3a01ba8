//! ClientHello extension parsing
//!
//! OpenSSL hands out extension bodies without their type/length header. Each
//! body is framed again and decoded with `tls-parser`, then the matching
//! [`TlsExtension`] variant is flattened into plain identifiers.

use thiserror::Error;
use tls_parser::nom::multi::many0;
use tls_parser::nom::number::complete::be_u16;
use tls_parser::nom::IResult;
use tls_parser::{parse_tls_extensions, SNIType, TlsExtension};

/// server_name
pub const EXT_SERVER_NAME: u16 = 0x0000;
/// supported_groups (formerly elliptic_curves)
pub const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
/// ec_point_formats
pub const EXT_EC_POINT_FORMATS: u16 = 0x000b;
/// signature_algorithms
pub const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000d;
/// application_layer_protocol_negotiation
pub const EXT_ALPN: u16 = 0x0010;
/// supported_versions
pub const EXT_SUPPORTED_VERSIONS: u16 = 0x002b;

/// Versions a client without the supported_versions extension may imply
const LEGACY_VERSIONS: [u16; 4] = [0x0304, 0x0303, 0x0302, 0x0301];

/// Malformed extension body
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtensionError {
    #[error("extension {ext_type:#06x}: {reason}")]
    Malformed { ext_type: u16, reason: String },

    #[error("extension {0:#06x} body longer than 65535 bytes")]
    TooLong(u16),

    #[error("extension {0:#06x} decoded as a different extension")]
    Unexpected(u16),

    #[error("list of 16-bit values has odd length {0}")]
    OddLength(usize),
}

type Result<T> = std::result::Result<T, ExtensionError>;

/// Prefix a bare body with its type and length
fn frame(ext_type: u16, body: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(body.len()).map_err(|_| ExtensionError::TooLong(ext_type))?;
    let mut framed = Vec::with_capacity(body.len() + 4);
    framed.extend_from_slice(&ext_type.to_be_bytes());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(body);
    Ok(framed)
}

/// Decode one framed extension and hand its variant to `map`
fn decode<T>(ext_type: u16, body: &[u8], map: impl FnOnce(TlsExtension<'_>) -> Option<T>) -> Result<T> {
    let framed = frame(ext_type, body)?;
    let (_, extensions) = parse_tls_extensions(&framed).map_err(|e| ExtensionError::Malformed {
        ext_type,
        reason: e.to_string(),
    })?;
    let extension = extensions.into_iter().next().ok_or_else(|| ExtensionError::Malformed {
        ext_type,
        reason: "body does not decode".to_string(),
    })?;
    map(extension).ok_or(ExtensionError::Unexpected(ext_type))
}

/// Split a raw cipher list (two bytes per suite) into identifiers
pub fn parse_cipher_list(raw: &[u8]) -> Result<Vec<u16>> {
    let parsed: IResult<&[u8], Vec<u16>> = many0(be_u16)(raw);
    match parsed {
        Ok((rest, ids)) if rest.is_empty() => Ok(ids),
        _ => Err(ExtensionError::OddLength(raw.len())),
    }
}

/// First host_name entry of a server_name extension
pub fn parse_server_name(body: &[u8]) -> Result<Option<String>> {
    decode(EXT_SERVER_NAME, body, |ext| match ext {
        TlsExtension::SNI(names) => Some(
            names
                .into_iter()
                .find(|(name_type, _)| *name_type == SNIType::HostName)
                .map(|(_, name)| String::from_utf8_lossy(name).into_owned()),
        ),
        _ => None,
    })
}

/// supported_groups, GREASE values included
pub fn parse_supported_groups(body: &[u8]) -> Result<Vec<u16>> {
    decode(EXT_SUPPORTED_GROUPS, body, |ext| match ext {
        TlsExtension::EllipticCurves(groups) => Some(groups.iter().map(|g| g.0).collect()),
        _ => None,
    })
}

pub fn parse_ec_point_formats(body: &[u8]) -> Result<Vec<u8>> {
    decode(EXT_EC_POINT_FORMATS, body, |ext| match ext {
        TlsExtension::EcPointFormats(formats) => Some(formats.to_vec()),
        _ => None,
    })
}

pub fn parse_signature_algorithms(body: &[u8]) -> Result<Vec<u16>> {
    decode(EXT_SIGNATURE_ALGORITHMS, body, |ext| match ext {
        TlsExtension::SignatureAlgorithms(schemes) => Some(schemes.to_vec()),
        _ => None,
    })
}

/// ALPN protocol names in offer order
pub fn parse_alpn(body: &[u8]) -> Result<Vec<String>> {
    decode(EXT_ALPN, body, |ext| match ext {
        TlsExtension::ALPN(protocols) => Some(
            protocols
                .iter()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .collect(),
        ),
        _ => None,
    })
}

/// supported_versions as sent in a ClientHello
pub fn parse_supported_versions(body: &[u8]) -> Result<Vec<u16>> {
    decode(EXT_SUPPORTED_VERSIONS, body, |ext| match ext {
        TlsExtension::SupportedVersions(versions) => Some(versions.iter().map(|v| v.0).collect()),
        _ => None,
    })
}

/// Versions implied by the legacy `client_version` field
///
/// Used when the client did not send supported_versions: every version from
/// TLS 1.0 up to the legacy version, highest first.
pub fn versions_from_legacy(legacy_version: u16) -> Vec<u16> {
    LEGACY_VERSIONS
        .iter()
        .copied()
        .filter(|v| *v <= legacy_version)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_name() {
        // list len 12, type 0, name len 9, "localhost"
        let body = [0x00, 0x0c, 0x00, 0x00, 0x09, b'l', b'o', b'c', b'a', b'l', b'h', b'o', b's', b't'];
        assert_eq!(parse_server_name(&body), Ok(Some("localhost".to_string())));
    }

    #[test]
    fn test_server_name_truncated() {
        let body = [0x00, 0x0c, 0x00, 0x00, 0x09, b'l', b'o'];
        assert!(parse_server_name(&body).is_err());
    }

    #[test]
    fn test_supported_groups_with_grease() {
        let body = [0x00, 0x06, 0x3a, 0x3a, 0x00, 0x1d, 0x00, 0x17];
        assert_eq!(parse_supported_groups(&body), Ok(vec![0x3a3a, 0x001d, 0x0017]));
    }

    #[test]
    fn test_truncated_signature_algorithms() {
        let body = [0x00, 0x04, 0x04, 0x03];
        assert!(parse_signature_algorithms(&body).is_err());
    }

    #[test]
    fn test_signature_algorithms() {
        let body = [0x00, 0x04, 0x04, 0x03, 0x08, 0x04];
        assert_eq!(parse_signature_algorithms(&body), Ok(vec![0x0403, 0x0804]));
    }

    #[test]
    fn test_point_formats() {
        assert_eq!(parse_ec_point_formats(&[0x01, 0x00]), Ok(vec![0x00]));
    }

    #[test]
    fn test_alpn() {
        let body = [0x00, 0x0c, 0x02, b'h', b'2', 0x08, b'h', b't', b't', b'p', b'/', b'1', b'.', b'1'];
        assert_eq!(parse_alpn(&body), Ok(vec!["h2".to_string(), "http/1.1".to_string()]));
    }

    #[test]
    fn test_supported_versions() {
        let body = [0x06, 0x5a, 0x5a, 0x03, 0x04, 0x03, 0x03];
        assert_eq!(parse_supported_versions(&body), Ok(vec![0x5a5a, 0x0304, 0x0303]));
    }

    #[test]
    fn test_cipher_list() {
        assert_eq!(parse_cipher_list(&[0x13, 0x01, 0xc0, 0x2b]), Ok(vec![0x1301, 0xc02b]));
        assert_eq!(parse_cipher_list(&[]), Ok(vec![]));
        assert_eq!(parse_cipher_list(&[0x13]), Err(ExtensionError::OddLength(1)));
    }

    #[test]
    fn test_versions_from_legacy() {
        assert_eq!(versions_from_legacy(0x0303), vec![0x0303, 0x0302, 0x0301]);
        assert_eq!(versions_from_legacy(0x0301), vec![0x0301]);
        assert!(versions_from_legacy(0x0300).is_empty());
    }
}
