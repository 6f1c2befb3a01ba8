//! Certificate handling module
//!
//! The server either loads a certificate/key pair from PEM files or, when
//! none is configured, generates a throwaway self-signed certificate for the
//! served domains.

use log::{debug, info, warn};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptorBuilder, SslFiletype};
use openssl::x509::extension::{BasicConstraints, ExtendedKeyUsage, SubjectAlternativeName};
use openssl::x509::{X509NameBuilder, X509};
use std::path::PathBuf;

use crate::common::{AuditError, Result};

/// Validity of generated certificates, in days
const SELF_SIGNED_DAYS: u32 = 90;

/// Where the server certificate comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource {
    /// PEM certificate chain and private key on disk
    Static { cert: PathBuf, key: PathBuf },
    /// In-memory self-signed certificate covering these names
    SelfSigned { domains: Vec<String> },
}

impl CertificateSource {
    /// Apply the certificate to the acceptor builder
    pub fn apply(&self, builder: &mut SslAcceptorBuilder) -> Result<()> {
        match self {
            CertificateSource::Static { cert, key } => {
                debug!("Loading certificate {:?} with key {:?}", cert, key);
                builder
                    .set_certificate_chain_file(cert)
                    .map_err(|e| AuditError::Certificate(format!("{}: {}", cert.display(), e)))?;
                builder
                    .set_private_key_file(key, SslFiletype::PEM)
                    .map_err(|e| AuditError::Certificate(format!("{}: {}", key.display(), e)))?;
            }
            CertificateSource::SelfSigned { domains } => {
                warn!(
                    "No certificate configured, automatic acquisition is not provided; \
                     serving a self-signed certificate for {}",
                    domains.join(", ")
                );
                let (cert, key) = generate_self_signed(domains)?;
                builder.set_certificate(&cert)?;
                builder.set_private_key(&key)?;
            }
        }
        builder
            .check_private_key()
            .map_err(|e| AuditError::Certificate(format!("certificate and key do not match: {}", e)))?;
        info!("Server certificate ready");
        Ok(())
    }
}

/// Generate a P-256 self-signed certificate with the given subject alternative names
pub fn generate_self_signed(domains: &[String]) -> Result<(X509, PKey<Private>)> {
    let primary = domains
        .first()
        .ok_or_else(|| AuditError::Certificate("no domain to issue a certificate for".to_string()))?;

    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
    let key = PKey::from_ec_key(EcKey::generate(&group)?)?;

    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_nid(Nid::COMMONNAME, primary)?;
    let name = name.build();

    let mut serial = BigNum::new()?;
    serial.rand(128, MsbOption::MAYBE_ZERO, false)?;

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    let serial = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&key)?;
    let not_before = Asn1Time::days_from_now(0)?;
    builder.set_not_before(&not_before)?;
    let not_after = Asn1Time::days_from_now(SELF_SIGNED_DAYS)?;
    builder.set_not_after(&not_after)?;
    builder.append_extension(BasicConstraints::new().critical().build()?)?;
    builder.append_extension(ExtendedKeyUsage::new().server_auth().build()?)?;

    let mut san = SubjectAlternativeName::new();
    for domain in domains {
        match domain.parse::<std::net::IpAddr>() {
            Ok(_) => san.ip(domain),
            Err(_) => san.dns(domain),
        };
    }
    let san = san.build(&builder.x509v3_context(None, None))?;
    builder.append_extension(san)?;

    builder.sign(&key, MessageDigest::sha256())?;
    Ok((builder.build(), key))
}
