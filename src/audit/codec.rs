//! Audit record JSON codec
//!
//! Every numeric list is written as zero-padded lowercase hex strings
//! (`0xNNNN` for 16-bit fields, `0xNN` for 8-bit ones). Decoding is the
//! inverse, with one strictness policy everywhere:
//!
//! - unknown fields are ignored,
//! - `Agent` and `HelloInfo` are required,
//! - missing lists decode as empty and `null` is accepted for a list,
//! - a known field with the wrong JSON type is an error.
//!
//! The persisted log is a plain concatenation of records; [`RecordStream`]
//! reads it back one value at a time.

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::io::{self, Read};
use thiserror::Error;

use crate::fingerprint::{
    hex16, hex8, AuditRecord, CapabilityNames, ClientDescription, EnrichedAuditRecord,
    HandshakeFingerprint,
};

/// Error decoding an audit record
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or a field of the wrong type
    #[error("invalid record JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A list element that is neither hex nor decimal
    #[error("{field}: {value:?} is not a number")]
    InvalidHex { field: &'static str, value: String },

    /// A number wider than the field
    #[error("{field}: {value} does not fit in {width} bits")]
    OutOfRange { field: &'static str, value: String, width: u8 },
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// `HelloInfo` object of the external schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelloInfoJson {
    #[serde(rename = "ServerName", skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    #[serde(rename = "SupportedProtos", deserialize_with = "null_as_empty")]
    pub supported_protos: Vec<String>,

    #[serde(rename = "CipherSuites", deserialize_with = "null_as_empty")]
    pub cipher_suites: Vec<String>,

    #[serde(rename = "SupportedCurves", deserialize_with = "null_as_empty")]
    pub supported_curves: Vec<String>,

    #[serde(rename = "SupportedPoints", deserialize_with = "null_as_empty")]
    pub supported_points: Vec<String>,

    #[serde(rename = "SupportedSchemes", deserialize_with = "null_as_empty")]
    pub supported_schemes: Vec<String>,

    #[serde(rename = "SupportedVersions", deserialize_with = "null_as_empty")]
    pub supported_versions: Vec<String>,
}

/// Raw audit record as persisted in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecordJson {
    #[serde(rename = "Agent")]
    pub agent: String,

    #[serde(rename = "HelloInfo")]
    pub hello_info: HelloInfoJson,
}

/// `HelloInfo` with the parallel name lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedHelloInfoJson {
    #[serde(flatten)]
    pub raw: HelloInfoJson,

    #[serde(rename = "CipherSuiteNames", default)]
    pub cipher_suite_names: Vec<String>,

    #[serde(rename = "SupportedCurveNames", default)]
    pub supported_curve_names: Vec<String>,

    #[serde(rename = "SupportedSchemeNames", default)]
    pub supported_scheme_names: Vec<String>,

    #[serde(rename = "SupportedVersionNames", default)]
    pub supported_version_names: Vec<String>,
}

/// Browser descriptor attached to enriched records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDescriptionJson {
    #[serde(rename = "Browser")]
    pub browser: String,

    #[serde(rename = "BrowserVersion")]
    pub browser_version: String,

    #[serde(rename = "OS")]
    pub os: String,
}

/// The externally served record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedAuditRecordJson {
    #[serde(rename = "Agent")]
    pub agent: String,

    #[serde(rename = "HelloInfo")]
    pub hello_info: EnrichedHelloInfoJson,

    #[serde(rename = "ClientDescription", default, skip_serializing_if = "Option::is_none")]
    pub client_description: Option<ClientDescriptionJson>,
}

impl From<&HandshakeFingerprint> for HelloInfoJson {
    fn from(fp: &HandshakeFingerprint) -> Self {
        Self {
            server_name: fp.server_name.clone(),
            supported_protos: fp.supported_protos.clone(),
            cipher_suites: fp.cipher_suites.iter().copied().map(hex16).collect(),
            supported_curves: fp.supported_curves.iter().copied().map(hex16).collect(),
            supported_points: fp.supported_points.iter().copied().map(hex8).collect(),
            supported_schemes: fp.signature_schemes.iter().copied().map(hex16).collect(),
            supported_versions: fp.supported_versions.iter().copied().map(hex16).collect(),
        }
    }
}

impl From<&AuditRecord> for AuditRecordJson {
    fn from(record: &AuditRecord) -> Self {
        Self {
            agent: record.user_agent.clone(),
            hello_info: HelloInfoJson::from(&record.fingerprint),
        }
    }
}

impl From<&ClientDescription> for ClientDescriptionJson {
    fn from(client: &ClientDescription) -> Self {
        Self {
            browser: client.browser.clone(),
            browser_version: client.browser_version.clone(),
            os: client.os.clone(),
        }
    }
}

impl From<&EnrichedAuditRecord> for EnrichedAuditRecordJson {
    fn from(record: &EnrichedAuditRecord) -> Self {
        let CapabilityNames {
            cipher_suites,
            supported_curves,
            signature_schemes,
            supported_versions,
        } = record.names.clone();

        Self {
            agent: record.user_agent.clone(),
            hello_info: EnrichedHelloInfoJson {
                raw: HelloInfoJson::from(&record.fingerprint),
                cipher_suite_names: cipher_suites,
                supported_curve_names: supported_curves,
                supported_scheme_names: signature_schemes,
                supported_version_names: supported_versions,
            },
            client_description: record.client.as_ref().map(ClientDescriptionJson::from),
        }
    }
}

fn parse_number(field: &'static str, value: &str, width: u8) -> Result<u64, DecodeError> {
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    let number = parsed.map_err(|_| DecodeError::InvalidHex {
        field,
        value: value.to_string(),
    })?;

    if number >= 1u64 << width {
        return Err(DecodeError::OutOfRange {
            field,
            value: value.to_string(),
            width,
        });
    }
    Ok(number)
}

fn parse_u16_list(field: &'static str, values: &[String]) -> Result<Vec<u16>, DecodeError> {
    values
        .iter()
        .map(|v| parse_number(field, v, 16).map(|n| n as u16))
        .collect()
}

fn parse_u8_list(field: &'static str, values: &[String]) -> Result<Vec<u8>, DecodeError> {
    values
        .iter()
        .map(|v| parse_number(field, v, 8).map(|n| n as u8))
        .collect()
}

impl TryFrom<HelloInfoJson> for HandshakeFingerprint {
    type Error = DecodeError;

    fn try_from(hello: HelloInfoJson) -> Result<Self, Self::Error> {
        Ok(Self {
            supported_versions: parse_u16_list("SupportedVersions", &hello.supported_versions)?,
            cipher_suites: parse_u16_list("CipherSuites", &hello.cipher_suites)?,
            supported_curves: parse_u16_list("SupportedCurves", &hello.supported_curves)?,
            supported_points: parse_u8_list("SupportedPoints", &hello.supported_points)?,
            signature_schemes: parse_u16_list("SupportedSchemes", &hello.supported_schemes)?,
            server_name: hello.server_name.filter(|name| !name.is_empty()),
            supported_protos: hello.supported_protos,
        })
    }
}

impl TryFrom<AuditRecordJson> for AuditRecord {
    type Error = DecodeError;

    fn try_from(json: AuditRecordJson) -> Result<Self, Self::Error> {
        Ok(Self {
            user_agent: json.agent,
            fingerprint: HandshakeFingerprint::try_from(json.hello_info)?,
        })
    }
}

impl From<ClientDescriptionJson> for ClientDescription {
    fn from(json: ClientDescriptionJson) -> Self {
        Self {
            browser: json.browser,
            browser_version: json.browser_version,
            os: json.os,
        }
    }
}

impl TryFrom<EnrichedAuditRecordJson> for EnrichedAuditRecord {
    type Error = DecodeError;

    fn try_from(json: EnrichedAuditRecordJson) -> Result<Self, Self::Error> {
        let EnrichedHelloInfoJson {
            raw,
            cipher_suite_names,
            supported_curve_names,
            supported_scheme_names,
            supported_version_names,
        } = json.hello_info;

        Ok(Self {
            user_agent: json.agent,
            fingerprint: HandshakeFingerprint::try_from(raw)?,
            names: CapabilityNames {
                cipher_suites: cipher_suite_names,
                supported_curves: supported_curve_names,
                signature_schemes: supported_scheme_names,
                supported_versions: supported_version_names,
            },
            client: json.client_description.map(ClientDescription::from),
        })
    }
}

/// Serialize a record to its compact persisted form
pub fn encode_record(record: &AuditRecord) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&AuditRecordJson::from(record))
}

/// Decode one record from JSON bytes
pub fn decode_record(bytes: &[u8]) -> Result<AuditRecord, DecodeError> {
    let json: AuditRecordJson = serde_json::from_slice(bytes)?;
    AuditRecord::try_from(json)
}

/// Serialize an enriched record in the served shape
pub fn encode_enriched(record: &EnrichedAuditRecord) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&EnrichedAuditRecordJson::from(record))
}

/// Decode an enriched record, name lists and client description included
pub fn decode_enriched(bytes: &[u8]) -> Result<EnrichedAuditRecord, DecodeError> {
    let json: EnrichedAuditRecordJson = serde_json::from_slice(bytes)?;
    EnrichedAuditRecord::try_from(json)
}

/// Decode one record from an already parsed JSON value
pub fn decode_value(value: Value) -> Result<AuditRecord, DecodeError> {
    let json: AuditRecordJson = serde_json::from_value(value)?;
    AuditRecord::try_from(json)
}

/// Bytes requested from the reader per refill
const READ_CHUNK: usize = 64 * 1024;

/// Streaming decoder for a concatenation of JSON records
///
/// Records that fail to decode are skipped with a warning. Data that is not
/// JSON at all, or a record cut short by a crash, is skipped up to the next
/// `{`. A truncated tail with nothing after it ends the stream cleanly.
pub struct RecordStream<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
    skipped: usize,
}

impl<R: Read> RecordStream<R> {
    /// Wrap a reader
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            pos: 0,
            eof: false,
            skipped: 0,
        }
    }

    /// Number of malformed records skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn fill(&mut self) -> io::Result<()> {
        self.buf.drain(..self.pos);
        self.pos = 0;

        let start = self.buf.len();
        self.buf.resize(start + READ_CHUNK, 0);
        let read = loop {
            match self.reader.read(&mut self.buf[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(e);
                }
            }
        };
        self.buf.truncate(start + read);
        if read == 0 {
            self.eof = true;
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.buf.len() && self.buf[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// Move past the current position to the next candidate record start
    fn resync(&mut self) {
        let from = self.pos + 1;
        self.pos = match self.buf.get(from..).and_then(|rest| rest.iter().position(|b| *b == b'{')) {
            Some(offset) => from + offset,
            None => self.buf.len(),
        };
    }

    /// Decode the next well-formed record
    ///
    /// # Returns
    ///
    /// `Ok(None)` at the end of the input
    pub fn next_record(&mut self) -> io::Result<Option<AuditRecord>> {
        loop {
            self.skip_whitespace();
            if self.pos >= self.buf.len() {
                if self.eof {
                    return Ok(None);
                }
                self.fill()?;
                continue;
            }

            let mut values = serde_json::Deserializer::from_slice(&self.buf[self.pos..]).into_iter::<Value>();
            let next = values.next();
            let consumed = values.byte_offset();

            match next {
                Some(Ok(value)) => {
                    self.pos += consumed;
                    match decode_value(value) {
                        Ok(record) => return Ok(Some(record)),
                        Err(e) => {
                            self.skipped += 1;
                            warn!("Skipping malformed audit record: {}", e);
                        }
                    }
                }
                Some(Err(e)) if e.is_eof() => {
                    if !self.eof {
                        self.fill()?;
                        continue;
                    }
                    // Crash-truncated record: a complete one may still follow it
                    self.skipped += 1;
                    warn!("Skipping truncated audit record");
                    self.resync();
                }
                Some(Err(e)) => {
                    self.skipped += 1;
                    warn!("Skipping unreadable audit log data: {}", e);
                    self.resync();
                }
                None => self.pos = self.buf.len(),
            }
        }
    }
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = io::Result<AuditRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
