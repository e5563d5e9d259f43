//! Package container reader.
//!
//! Opens the APK as a ZIP archive, decodes its manifest and gives access to the raw signing
//! certificates stored by each of the signature schemes.

pub mod pkcs7;
pub mod signing_block;

use crate::{error::ErrorKind, static_analysis::manifest::Manifest};
use anyhow::{Context, Result};
use log::debug;
use std::{
    collections::BTreeSet,
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};
use zip::ZipArchive;

/// Name of the manifest entry inside the package.
pub const MANIFEST_ENTRY: &str = "AndroidManifest.xml";
/// Upper bound for any single archive entry read in memory.
const MAX_ENTRY_SIZE: u64 = 16 * 1024 * 1024;

/// An opened Android package.
#[derive(Debug, Clone)]
pub struct ApkFile {
    path: PathBuf,
    manifest: Manifest,
    signature_files: Vec<String>,
}

impl ApkFile {
    /// Opens the package at the given path and decodes its manifest.
    ///
    /// Fails with [`ErrorKind::ContainerParse`] if the file is not a valid package.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut archive = open_archive(path)?;

        let manifest_bytes = read_entry(&mut archive, MANIFEST_ENTRY).map_err(|e| {
            ErrorKind::container_parse(format!("could not read {}: {}", MANIFEST_ENTRY, e))
        })?;
        let manifest = Manifest::load(&manifest_bytes).map_err(|e| {
            ErrorKind::container_parse(format!("invalid {}: {:#}", MANIFEST_ENTRY, e))
        })?;

        let mut signature_files: Vec<String> = archive
            .file_names()
            .filter(|name| pkcs7::is_signature_file(name))
            .map(str::to_owned)
            .collect();
        signature_files.sort();

        debug!(
            "Opened package {} ({} entries, {} JAR signature files)",
            manifest.package(),
            archive.len(),
            signature_files.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            manifest,
            signature_files,
        })
    }

    /// Gets the path of the package file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the decoded manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Gets the application package identifier.
    pub fn package(&self) -> &str {
        self.manifest.package()
    }

    /// Gets the human readable version name.
    pub fn version_name(&self) -> &str {
        self.manifest.version_name()
    }

    /// Gets the version code, if the manifest declares one.
    pub fn version_code(&self) -> Option<&str> {
        self.manifest.version_code()
    }

    /// Gets the set of requested permissions.
    pub fn permissions(&self) -> &BTreeSet<String> {
        self.manifest.permissions()
    }

    /// Gets the DER encoded certificates of the APK Signature Scheme v2 block.
    pub fn certificates_der_v2(&self) -> Result<Vec<Vec<u8>>> {
        self.signing_block_certificates(signing_block::SIGNATURE_SCHEME_V2_BLOCK_ID)
    }

    /// Gets the DER encoded certificates of the APK Signature Scheme v3 block.
    pub fn certificates_der_v3(&self) -> Result<Vec<Vec<u8>>> {
        self.signing_block_certificates(signing_block::SIGNATURE_SCHEME_V3_BLOCK_ID)
    }

    /// Gets the DER encoded certificates of every JAR signature file, in entry name order.
    pub fn certificates_der_v1(&self) -> Result<Vec<Vec<u8>>> {
        if self.signature_files.is_empty() {
            return Ok(Vec::new());
        }

        let mut archive = open_archive(&self.path)?;
        let mut certificates = Vec::new();
        for name in &self.signature_files {
            let der = read_entry(&mut archive, name)?;
            certificates.extend(
                pkcs7::certificates(&der)
                    .with_context(|| format!("invalid signature file {}", name))?,
            );
        }
        Ok(certificates)
    }

    fn signing_block_certificates(&self, id: u32) -> Result<Vec<Vec<u8>>> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("could not open {}", self.path.display()))?;
        signing_block::certificates(&mut file, id)
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path).map_err(|e| {
        ErrorKind::container_parse(format!("could not open {}: {}", path.display(), e))
    })?;
    let archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| ErrorKind::container_parse(format!("not a valid package archive: {}", e)))?;
    Ok(archive)
}

fn read_entry(archive: &mut ZipArchive<BufReader<File>>, name: &str) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .with_context(|| format!("missing entry {}", name))?;
    let mut bytes = Vec::with_capacity(entry.size().min(MAX_ENTRY_SIZE) as usize);
    let _ = entry
        .take(MAX_ENTRY_SIZE)
        .read_to_end(&mut bytes)
        .with_context(|| format!("could not decompress entry {}", name))?;
    Ok(bytes)
}
