use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::{
    fs::File,
    io::{ErrorKind as IoErrorKind, Read},
    path::Path,
};

/// Size of the chunks the package is hashed in.
const CHUNK_SIZE: usize = 4096;

/// Digest and size of a package file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerPrint {
    sha256: [u8; 32],
    size: u64,
}

impl FingerPrint {
    /// Fingerprints the file at the given path.
    pub fn new<P: AsRef<Path>>(package: P) -> Result<Self> {
        let package = package.as_ref();
        let f = File::open(package)
            .with_context(|| format!("could not open {}", package.display()))?;
        Self::from_reader(f).with_context(|| format!("could not read {}", package.display()))
    }

    /// Fingerprints everything the reader yields, without holding more than a chunk in memory.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut hasher = Sha256::new();
        let mut buffer = [0_u8; CHUNK_SIZE];
        let mut size = 0_u64;

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(ref e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buffer[..read]);
            size += read as u64;
        }

        Ok(Self {
            sha256: hasher.finalize().into(),
            size,
        })
    }

    /// Gets the lowercase hexadecimal SHA-256 digest.
    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }

    /// Gets the number of bytes that were hashed.
    pub fn size(&self) -> u64 {
        self.size
    }
}
