//! Signing certificate extraction.
//!
//! The certificates are taken from the first signature scheme that has any, in the order
//! v2, v3 and v1. Every certificate is decoded on its own, so a corrupt one only affects its own
//! entry in the resulting list.

use crate::{apk::ApkFile, error::ErrorKind};
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use x509_parser::{
    der_parser::oid::Oid, num_bigint::BigInt, objects::oid_registry, prelude::*,
};

/// Decoded identity and validity of a signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateInfo {
    subject: String,
    issuer: String,
    serial_number: String,
    not_before: String,
    not_after: String,
    signature_algorithm: String,
}

impl CertificateInfo {
    /// Gets the subject, as an RFC 4514 string.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Gets the issuer, as an RFC 4514 string.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Gets the serial number in decimal.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Gets the start of the validity period, `YYYY-MM-DDTHH:MM:SS` in UTC.
    pub fn not_before(&self) -> &str {
        &self.not_before
    }

    /// Gets the end of the validity period, `YYYY-MM-DDTHH:MM:SS` in UTC.
    pub fn not_after(&self) -> &str {
        &self.not_after
    }

    /// Gets the short name of the signature algorithm.
    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }
}

/// One position of the certificate list of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CertificateEntry {
    /// The certificate was decoded.
    Parsed(CertificateInfo),
    /// The certificate could not be decoded.
    Failed {
        /// Decoding error.
        error: String,
    },
}

impl CertificateEntry {
    /// Checks whether the certificate could be decoded.
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}

/// APK signature schemes that carry certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningScheme {
    /// APK Signature Scheme v2.
    V2,
    /// APK Signature Scheme v3.
    V3,
    /// JAR signing.
    V1,
}

impl SigningScheme {
    /// Order in which the schemes are looked at.
    pub const PRIORITY: [Self; 3] = [Self::V2, Self::V3, Self::V1];
}

/// Source of raw DER certificates per signature scheme.
pub trait CertificateSource {
    /// Gets the DER encoded certificates of the given scheme.
    fn certificates_der(&self, scheme: SigningScheme) -> Result<Vec<Vec<u8>>>;
}

impl CertificateSource for ApkFile {
    fn certificates_der(&self, scheme: SigningScheme) -> Result<Vec<Vec<u8>>> {
        match scheme {
            SigningScheme::V2 => self.certificates_der_v2(),
            SigningScheme::V3 => self.certificates_der_v3(),
            SigningScheme::V1 => self.certificates_der_v1(),
        }
    }
}

/// Extracts the certificates of the first scheme that has any.
///
/// Schemes are never merged. If reading a scheme fails, it is treated as having no
/// certificates.
pub fn extract<S: CertificateSource + ?Sized>(source: &S) -> Vec<CertificateEntry> {
    for scheme in SigningScheme::PRIORITY.iter() {
        let blobs = match source.certificates_der(*scheme) {
            Ok(blobs) => blobs,
            Err(e) => {
                debug!("Could not read the {:?} signature: {:#}", scheme, e);
                continue;
            }
        };
        if blobs.is_empty() {
            continue;
        }

        debug!("Found {} certificate(s) in the {:?} signature", blobs.len(), scheme);
        return blobs
            .iter()
            .map(|der| match decode_certificate(der) {
                Ok(info) => CertificateEntry::Parsed(info),
                Err(e) => CertificateEntry::Failed {
                    error: e.to_string(),
                },
            })
            .collect();
    }

    debug!("No signing certificates found");
    Vec::new()
}

/// Decodes one DER certificate.
pub fn decode_certificate(der: &[u8]) -> Result<CertificateInfo, ErrorKind> {
    let (_, certificate) = X509Certificate::from_der(der).map_err(|e| {
        ErrorKind::CertificateDecode {
            message: e.to_string(),
        }
    })?;

    let validity = certificate.validity();
    Ok(CertificateInfo {
        subject: rfc4514_name(certificate.subject()),
        issuer: rfc4514_name(certificate.issuer()),
        serial_number: serial_number(certificate.tbs_certificate.raw_serial()),
        not_before: format_time(&validity.not_before)?,
        not_after: format_time(&validity.not_after)?,
        signature_algorithm: algorithm_name(&certificate.signature_algorithm.algorithm),
    })
}

/// DER integers are signed, so legacy certificates may carry negative serials.
fn serial_number(raw: &[u8]) -> String {
    BigInt::from_signed_bytes_be(raw).to_string()
}

fn format_time(time: &ASN1Time) -> Result<String, ErrorKind> {
    DateTime::<Utc>::from_timestamp(time.timestamp(), 0)
        .map(|date| date.format("%Y-%m-%dT%H:%M:%S").to_string())
        .ok_or_else(|| ErrorKind::CertificateDecode {
            message: format!("validity date {} out of range", time),
        })
}

fn algorithm_name(oid: &Oid<'_>) -> String {
    oid_registry()
        .get(oid)
        .map(|entry| entry.sn().to_owned())
        .unwrap_or_else(|| oid.to_id_string())
}

/// Formats a distinguished name as RFC 4514 does: last RDN first.
pub(crate) fn rfc4514_name(name: &X509Name<'_>) -> String {
    let rdns: Vec<String> = name
        .iter()
        .map(|rdn| {
            rdn.iter()
                .map(rfc4514_attribute)
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect();

    rdns.into_iter().rev().collect::<Vec<_>>().join(",")
}

fn rfc4514_attribute(attribute: &AttributeTypeAndValue<'_>) -> String {
    let oid = attribute.attr_type().to_id_string();
    let key = attribute_short_name(&oid).map_or(oid.clone(), str::to_owned);
    let value = match attribute.as_str() {
        Ok(value) => escape_value(value),
        Err(_) => format!("#{}", hex::encode(attribute.attr_value().data)),
    };
    format!("{}={}", key, value)
}

fn attribute_short_name(oid: &str) -> Option<&'static str> {
    let name = match oid {
        "2.5.4.3" => "CN",
        "2.5.4.6" => "C",
        "2.5.4.7" => "L",
        "2.5.4.8" => "ST",
        "2.5.4.9" => "STREET",
        "2.5.4.10" => "O",
        "2.5.4.11" => "OU",
        "0.9.2342.19200300.100.1.1" => "UID",
        "0.9.2342.19200300.100.1.25" => "DC",
        _ => return None,
    };
    Some(name)
}

pub(crate) fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '"' | '+' | ',' | ';' | '<' | '>' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }

    if escaped.starts_with('#') || escaped.starts_with(' ') {
        escaped.insert(0, '\\');
    }
    if escaped.ends_with(' ') {
        let _ = escaped.pop();
        escaped.push_str("\\ ");
    }
    escaped
}
