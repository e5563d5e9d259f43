//! APK Signing Block reader.
//!
//! Signature schemes v2 and v3 store their data in a block placed right before the ZIP central
//! directory. The block is a list of ID-value pairs; each scheme owns one ID and stores a
//! sequence of length-prefixed signers, each one carrying the DER encoded certificate chain.

use anyhow::{bail, Context, Result};
use std::io::{Read, Seek, SeekFrom};

/// ID of the APK Signature Scheme v2 block.
pub const SIGNATURE_SCHEME_V2_BLOCK_ID: u32 = 0x7109_871a;
/// ID of the APK Signature Scheme v3 block.
pub const SIGNATURE_SCHEME_V3_BLOCK_ID: u32 = 0xf053_68c0;

const APK_SIG_BLOCK_MAGIC: &[u8; 16] = b"APK Sig Block 42";
const APK_SIG_BLOCK_FOOTER_SIZE: u64 = 24;
const APK_SIG_BLOCK_MIN_SIZE: u64 = 32;
const APK_SIG_BLOCK_MAX_SIZE: u64 = 64 * 1024 * 1024;

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const EOCD_MIN_SIZE: u64 = 22;
const EOCD_MAX_COMMENT_SIZE: u64 = 0xFFFF;

/// Parsed APK Signing Block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningBlock {
    pairs: Vec<(u32, Vec<u8>)>,
}

impl SigningBlock {
    /// Locates and reads the signing block of the given package.
    ///
    /// Returns `None` if the package has no signing block, which is the case for packages only
    /// signed with the JAR (v1) scheme.
    pub fn find<R: Read + Seek>(reader: &mut R) -> Result<Option<Self>> {
        let central_directory = match find_central_directory_offset(reader)? {
            Some(offset) => offset,
            None => bail!("end of central directory record not found"),
        };
        if central_directory < APK_SIG_BLOCK_MIN_SIZE {
            return Ok(None);
        }

        let _ = reader.seek(SeekFrom::Start(central_directory - APK_SIG_BLOCK_FOOTER_SIZE))?;
        let mut footer = [0_u8; APK_SIG_BLOCK_FOOTER_SIZE as usize];
        reader.read_exact(&mut footer)?;
        if &footer[8..] != APK_SIG_BLOCK_MAGIC {
            return Ok(None);
        }

        let block_size = read_u64(&footer, 0)?;
        if block_size < APK_SIG_BLOCK_FOOTER_SIZE
            || block_size > APK_SIG_BLOCK_MAX_SIZE
            || block_size + 8 > central_directory
        {
            bail!("invalid APK Signing Block size {}", block_size);
        }

        let total_size = block_size + 8;
        let _ = reader.seek(SeekFrom::Start(central_directory - total_size))?;
        let mut block = vec![0_u8; total_size as usize];
        reader.read_exact(&mut block)?;
        if read_u64(&block, 0)? != block_size {
            bail!("APK Signing Block sizes in header and footer do not match");
        }

        let pairs_end = block.len() - APK_SIG_BLOCK_FOOTER_SIZE as usize;
        Ok(Some(Self {
            pairs: parse_pairs(&block[8..pairs_end])?,
        }))
    }

    /// Gets the value stored under the given ID, if present.
    pub fn value(&self, id: u32) -> Option<&[u8]> {
        self.pairs
            .iter()
            .find(|(pair_id, _)| *pair_id == id)
            .map(|(_, value)| value.as_slice())
    }

    /// Gets the DER encoded certificates of all the signers of the given scheme block.
    ///
    /// An absent scheme block yields an empty list.
    pub fn certificates(&self, id: u32) -> Result<Vec<Vec<u8>>> {
        match self.value(id) {
            Some(value) => signer_certificates(value)
                .with_context(|| format!("malformed signature scheme block {:#010x}", id)),
            None => Ok(Vec::new()),
        }
    }
}

/// Reads the certificates of the given scheme block, straight from the package.
pub fn certificates<R: Read + Seek>(reader: &mut R, id: u32) -> Result<Vec<Vec<u8>>> {
    match SigningBlock::find(reader)? {
        Some(block) => block.certificates(id),
        None => Ok(Vec::new()),
    }
}

fn find_central_directory_offset<R: Read + Seek>(reader: &mut R) -> Result<Option<u64>> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    if file_size < EOCD_MIN_SIZE {
        return Ok(None);
    }

    let tail_size = file_size.min(EOCD_MIN_SIZE + EOCD_MAX_COMMENT_SIZE);
    let tail_start = file_size - tail_size;
    let _ = reader.seek(SeekFrom::Start(tail_start))?;
    let mut tail = vec![0_u8; tail_size as usize];
    reader.read_exact(&mut tail)?;

    let last = tail.len() - EOCD_MIN_SIZE as usize;
    for position in (0..=last).rev() {
        if read_u32(&tail, position)? != EOCD_SIGNATURE {
            continue;
        }
        let comment_size = read_u16(&tail, position + 20)? as usize;
        if comment_size != last - position {
            continue;
        }

        let central_directory = u64::from(read_u32(&tail, position + 16)?);
        if central_directory > tail_start + position as u64 {
            bail!("central directory offset points past the end of central directory record");
        }
        return Ok(Some(central_directory));
    }

    Ok(None)
}

fn parse_pairs(mut pairs: &[u8]) -> Result<Vec<(u32, Vec<u8>)>> {
    let mut result = Vec::new();
    while !pairs.is_empty() {
        let length = read_u64(pairs, 0).context("truncated ID-value pair length")?;
        let remaining = (pairs.len() - 8) as u64;
        if length < 4 || length > remaining {
            bail!("invalid ID-value pair length {}", length);
        }
        let id = read_u32(pairs, 8)?;
        let end = 8 + length as usize;
        result.push((id, pairs[12..end].to_vec()));
        pairs = &pairs[end..];
    }
    Ok(result)
}

/// Walks `signers -> signer -> signed data -> certificates`.
///
/// Both v2 and v3 signed data start with the digests followed by the certificates, so the same
/// walk works for both schemes.
fn signer_certificates(value: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut value = value;
    let mut signers = length_prefixed(&mut value).context("missing signer sequence")?;

    let mut certificates = Vec::new();
    while !signers.is_empty() {
        let mut signer = length_prefixed(&mut signers).context("truncated signer")?;
        let mut signed_data = length_prefixed(&mut signer).context("missing signed data")?;
        let _digests = length_prefixed(&mut signed_data).context("missing digests")?;
        let mut encoded = length_prefixed(&mut signed_data).context("missing certificates")?;
        while !encoded.is_empty() {
            certificates.push(
                length_prefixed(&mut encoded)
                    .context("truncated certificate")?
                    .to_vec(),
            );
        }
    }

    Ok(certificates)
}

fn length_prefixed<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
    let current: &'a [u8] = *input;
    let length = read_u32(current, 0)? as usize;
    let rest = &current[4..];
    if length > rest.len() {
        bail!(
            "length prefix {} exceeds the {} remaining bytes",
            length,
            rest.len()
        );
    }
    let (value, tail) = rest.split_at(length);
    *input = tail;
    Ok(value)
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16> {
    match bytes.get(offset..offset + 2) {
        Some(b) => Ok(u16::from_le_bytes([b[0], b[1]])),
        None => bail!("unexpected end of data at offset {}", offset),
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    match bytes.get(offset..offset + 4) {
        Some(b) => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        None => bail!("unexpected end of data at offset {}", offset),
    }
}

fn read_u64(bytes: &[u8], offset: usize) -> Result<u64> {
    match bytes.get(offset..offset + 8) {
        Some(b) => {
            let mut buf = [0_u8; 8];
            buf.copy_from_slice(b);
            Ok(u64::from_le_bytes(buf))
        }
        None => bail!("unexpected end of data at offset {}", offset),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        certificates, SigningBlock, APK_SIG_BLOCK_MAGIC, SIGNATURE_SCHEME_V2_BLOCK_ID,
        SIGNATURE_SCHEME_V3_BLOCK_ID,
    };
    use std::io::Cursor;

    fn length_prefixed(bytes: &[u8]) -> Vec<u8> {
        let mut out = (bytes.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(bytes);
        out
    }

    fn scheme_value(certs: &[&[u8]]) -> Vec<u8> {
        let encoded: Vec<u8> = certs.iter().flat_map(|c| length_prefixed(c)).collect();
        let mut signed_data = length_prefixed(&[]);
        signed_data.extend(length_prefixed(&encoded));
        signed_data.extend(length_prefixed(&[]));

        let mut signer = length_prefixed(&signed_data);
        signer.extend(length_prefixed(&[]));
        signer.extend(length_prefixed(&[]));

        length_prefixed(&length_prefixed(&signer))
    }

    /// Lays out `<entries><signing block><central directory><EOCD>`.
    fn package(pairs: &[(u32, Vec<u8>)]) -> Vec<u8> {
        let mut out = b"PK\x03\x04local entries".to_vec();

        if !pairs.is_empty() {
            let mut body = Vec::new();
            for (id, value) in pairs {
                body.extend_from_slice(&(value.len() as u64 + 4).to_le_bytes());
                body.extend_from_slice(&id.to_le_bytes());
                body.extend_from_slice(value);
            }
            let size = (body.len() + 24) as u64;
            out.extend_from_slice(&size.to_le_bytes());
            out.extend(body);
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(APK_SIG_BLOCK_MAGIC);
        }

        let central_directory = out.len() as u32;
        out.extend_from_slice(b"PK\x01\x02central directory");
        let cd_size = out.len() as u32 - central_directory;

        out.extend_from_slice(&0x0605_4b50_u32.to_le_bytes());
        out.extend_from_slice(&[0; 6]);
        out.extend_from_slice(&1_u16.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&central_directory.to_le_bytes());
        out.extend_from_slice(&0_u16.to_le_bytes());
        out
    }

    #[test]
    fn it_reads_scheme_certificates() {
        let pairs = vec![
            (SIGNATURE_SCHEME_V2_BLOCK_ID, scheme_value(&[&b"first"[..], &b"second"[..]])),
            (SIGNATURE_SCHEME_V3_BLOCK_ID, scheme_value(&[&b"third"[..]])),
        ];
        let mut reader = Cursor::new(package(&pairs));

        let block = SigningBlock::find(&mut reader).unwrap().unwrap();
        assert_eq!(
            block.certificates(SIGNATURE_SCHEME_V2_BLOCK_ID).unwrap(),
            vec![b"first".to_vec(), b"second".to_vec()]
        );
        assert_eq!(
            block.certificates(SIGNATURE_SCHEME_V3_BLOCK_ID).unwrap(),
            vec![b"third".to_vec()]
        );
        assert!(block.certificates(0x4272_7ab7).unwrap().is_empty());
    }

    #[test]
    fn it_handles_missing_block() {
        let mut reader = Cursor::new(package(&[]));
        assert!(SigningBlock::find(&mut reader).unwrap().is_none());
        assert!(certificates(&mut reader, SIGNATURE_SCHEME_V2_BLOCK_ID)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn it_rejects_truncated_signers() {
        let mut value = scheme_value(&[&b"certificate"[..]]);
        let truncated = value.len() - 6;
        value.truncate(truncated);
        let mut reader = Cursor::new(package(&[(SIGNATURE_SCHEME_V2_BLOCK_ID, value)]));

        let block = SigningBlock::find(&mut reader).unwrap().unwrap();
        assert!(block.certificates(SIGNATURE_SCHEME_V2_BLOCK_ID).is_err());
    }

    #[test]
    fn it_rejects_non_zip_data() {
        let mut reader = Cursor::new(vec![0_u8; 100]);
        assert!(SigningBlock::find(&mut reader).is_err());
    }
}
