//! Package builder shared by the integration tests.

#![allow(dead_code)]

use rcgen::{Certificate, CertificateParams, DistinguishedName, DnType};
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;
use zip::{write::FileOptions, ZipWriter};

pub const V2_BLOCK_ID: u32 = 0x7109_871a;
pub const V3_BLOCK_ID: u32 = 0xf053_68c0;

/// Model with a single tree whose only leaf votes 1 to 3 for the fake class.
pub const FAKE_MODEL: &str = r#"{
    "schema_version": 1,
    "n_features": 470,
    "classes": [0, 1],
    "trees": [{ "nodes": [{ "value": [1.0, 3.0] }] }]
}"#;

/// Self signed DER certificate with the given common name.
pub fn certificate(common_name: &str) -> Vec<u8> {
    let mut params = CertificateParams::new(vec![]);
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    name.push(DnType::CountryName, "ES");
    params.distinguished_name = name;
    Certificate::from_params(params)
        .unwrap()
        .serialize_der()
        .unwrap()
}

#[derive(Debug, Default)]
pub struct ApkBuilder {
    manifest: Option<String>,
    permissions: Vec<String>,
    v1: Vec<Vec<u8>>,
    blocks: Vec<(u32, Vec<Vec<u8>>)>,
}

impl ApkBuilder {
    pub fn new(package: &str) -> Self {
        Self {
            manifest: Some(package.to_owned()),
            ..Self::default()
        }
    }

    pub fn permission(mut self, name: &str) -> Self {
        self.permissions.push(name.to_owned());
        self
    }

    pub fn v1_certificate(mut self, der: Vec<u8>) -> Self {
        self.v1.push(der);
        self
    }

    pub fn scheme_certificates(mut self, id: u32, certificates: Vec<Vec<u8>>) -> Self {
        self.blocks.push((id, certificates));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        if let Some(package) = &self.manifest {
            zip.start_file("AndroidManifest.xml", FileOptions::default())
                .unwrap();
            zip.write_all(self.manifest_xml(package).as_bytes()).unwrap();
        }
        zip.start_file("classes.dex", FileOptions::default()).unwrap();
        zip.write_all(b"dex\n035\0").unwrap();
        if !self.v1.is_empty() {
            zip.start_file("META-INF/CERT.RSA", FileOptions::default())
                .unwrap();
            zip.write_all(&pkcs7(&self.v1)).unwrap();
        }
        let bytes = zip.finish().unwrap().into_inner();

        if self.blocks.is_empty() {
            bytes
        } else {
            splice_signing_block(bytes, &self.blocks)
        }
    }

    pub fn write(&self) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".apk").tempfile().unwrap();
        file.write_all(&self.build()).unwrap();
        file.flush().unwrap();
        file
    }

    fn manifest_xml(&self, package: &str) -> String {
        let permissions: String = self
            .permissions
            .iter()
            .map(|p| format!("<uses-permission android:name=\"{}\"/>", p))
            .collect();
        format!(
            "<manifest xmlns:android=\"http://schemas.android.com/apk/res/android\" \
             package=\"{}\" android:versionCode=\"42\" android:versionName=\"4.2.0\">{}\
             </manifest>",
            package, permissions
        )
    }
}

fn length_prefixed(bytes: &[u8]) -> Vec<u8> {
    let mut out = (bytes.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(bytes);
    out
}

fn scheme_value(certificates: &[Vec<u8>]) -> Vec<u8> {
    let encoded: Vec<u8> = certificates.iter().flat_map(|c| length_prefixed(c)).collect();
    let mut signed_data = length_prefixed(&[]);
    signed_data.extend(length_prefixed(&encoded));
    signed_data.extend(length_prefixed(&[]));

    let mut signer = length_prefixed(&signed_data);
    signer.extend(length_prefixed(&[]));
    signer.extend(length_prefixed(&[]));

    length_prefixed(&length_prefixed(&signer))
}

/// Inserts the signing block right before the central directory and fixes its offset.
fn splice_signing_block(zip: Vec<u8>, blocks: &[(u32, Vec<Vec<u8>>)]) -> Vec<u8> {
    let eocd = (0..=zip.len() - 22)
        .rev()
        .find(|&i| zip[i..i + 4] == [0x50, 0x4b, 0x05, 0x06])
        .unwrap();
    let mut offset = [0_u8; 4];
    offset.copy_from_slice(&zip[eocd + 16..eocd + 20]);
    let central_directory = u32::from_le_bytes(offset) as usize;

    let mut body = Vec::new();
    for (id, certificates) in blocks {
        let value = scheme_value(certificates);
        body.extend_from_slice(&(value.len() as u64 + 4).to_le_bytes());
        body.extend_from_slice(&id.to_le_bytes());
        body.extend_from_slice(&value);
    }
    let size = (body.len() + 24) as u64;
    let mut block = size.to_le_bytes().to_vec();
    block.extend(body);
    block.extend_from_slice(&size.to_le_bytes());
    block.extend_from_slice(b"APK Sig Block 42");

    let mut out = zip[..central_directory].to_vec();
    out.extend_from_slice(&block);
    out.extend_from_slice(&zip[central_directory..]);

    let new_offset = (central_directory + block.len()) as u32;
    let eocd = eocd + block.len();
    out[eocd + 16..eocd + 20].copy_from_slice(&new_offset.to_le_bytes());
    out
}

fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    match content.len() {
        len if len < 0x80 => out.push(len as u8),
        len if len < 0x100 => out.extend_from_slice(&[0x81, len as u8]),
        len => {
            out.push(0x82);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
    }
    out.extend_from_slice(content);
    out
}

/// Minimal PKCS#7 signed data carrying only the certificates.
fn pkcs7(certificates: &[Vec<u8>]) -> Vec<u8> {
    const DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x01];
    const SIGNED_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02];

    let mut body = der(0x02, &[0x01]);
    body.extend(der(0x31, &[]));
    body.extend(der(0x30, &der(0x06, DATA)));
    body.extend(der(0xA0, &certificates.concat()));
    body.extend(der(0x31, &[]));

    let mut info = der(0x06, SIGNED_DATA);
    info.extend(der(0xA0, &der(0x30, &body)));
    der(0x30, &info)
}
