//! Certificate extraction from JAR (v1) signature files.
//!
//! `META-INF/*.RSA`, `*.DSA` and `*.EC` files hold a DER encoded PKCS#7 `ContentInfo` wrapping a
//! `SignedData` structure. Only the `certificates` field is of interest here; the certificates
//! are returned still DER encoded, so that each of them can be decoded independently.

use anyhow::{anyhow, bail, Context, Result};
use x509_parser::der_parser::asn1_rs::{Any, Class, FromDer, Tag};

/// `1.2.840.113549.1.7.2`, PKCS#7 signed data.
const SIGNED_DATA_OID: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02];

/// Checks whether the given archive entry name is a JAR signature block file.
pub fn is_signature_file(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    upper.starts_with("META-INF/")
        && !upper["META-INF/".len()..].contains('/')
        && (upper.ends_with(".RSA") || upper.ends_with(".DSA") || upper.ends_with(".EC"))
}

/// Gets the DER encoded certificates embedded in a PKCS#7 signed data structure.
pub fn certificates(der: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut input = der;
    let content_info =
        universal(&mut input, Tag::Sequence).context("invalid ContentInfo")?;

    let mut content_info = content_info.data;
    let content_type =
        universal(&mut content_info, Tag::Oid).context("missing content type")?;
    if content_type.data != SIGNED_DATA_OID {
        bail!("content type is not PKCS#7 signed data");
    }
    let explicit = next(&mut content_info).context("missing signed data content")?;
    if !is_context_tag(&explicit, 0) {
        bail!("missing signed data content");
    }
    let mut explicit = explicit.data;
    let mut signed_data = universal(&mut explicit, Tag::Sequence)
        .context("invalid SignedData")?
        .data;

    let _version = universal(&mut signed_data, Tag::Integer).context("missing version")?;
    let _digest_algorithms =
        universal(&mut signed_data, Tag::Set).context("missing digest algorithms")?;
    let _encapsulated =
        universal(&mut signed_data, Tag::Sequence).context("missing content info")?;

    if signed_data.is_empty() {
        return Ok(Vec::new());
    }
    let tagged = next(&mut signed_data)?;
    if !is_context_tag(&tagged, 0) {
        return Ok(Vec::new());
    }

    let mut encoded = tagged.data;
    let mut certificates = Vec::new();
    while !encoded.is_empty() {
        let start = encoded;
        let certificate = next(&mut encoded).context("truncated certificate")?;
        if certificate.class() == Class::Universal && certificate.tag() == Tag::Sequence {
            let raw = &start[..start.len() - encoded.len()];
            certificates.push(raw.to_vec());
        }
    }
    Ok(certificates)
}

fn is_context_tag(any: &Any<'_>, tag: u32) -> bool {
    any.class() == Class::ContextSpecific && any.tag() == Tag(tag)
}

/// Reads the next DER object, advancing the input past it.
fn next<'a>(input: &mut &'a [u8]) -> Result<Any<'a>> {
    let data: &'a [u8] = *input;
    let (rest, any) = Any::from_der(data).map_err(|e| anyhow!("malformed DER: {}", e))?;
    *input = rest;
    Ok(any)
}

fn universal<'a>(input: &mut &'a [u8], tag: Tag) -> Result<Any<'a>> {
    let any = next(input)?;
    if any.class() != Class::Universal || any.tag() != tag {
        bail!(
            "expected {:?}, found {:?} {:?}",
            tag,
            any.class(),
            any.tag()
        );
    }
    Ok(any)
}
