//! Shareable link parsing and key material for MEGA file links.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use url::Url;

use crate::{Result, TransferError};

/// AES-128-CTR key and initial counter block of a shared file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeKey {
    pub aes: [u8; 16],
    pub iv: [u8; 16],
}

impl NodeKey {
    /// Derive the content key from the 256-bit key carried in a link.
    ///
    /// The first and second halves are XORed to form the AES key; bytes
    /// 16..24 are the CTR nonce, the counter starts at zero.
    pub fn from_link_key(raw: &[u8]) -> Result<Self> {
        if raw.len() != 32 {
            return Err(TransferError::InvalidLink(format!(
                "file key must be 32 bytes, got {}",
                raw.len()
            )));
        }

        let mut aes = [0u8; 16];
        for (i, byte) in aes.iter_mut().enumerate() {
            *byte = raw[i] ^ raw[i + 16];
        }

        let mut iv = [0u8; 16];
        iv[..8].copy_from_slice(&raw[16..24]);

        Ok(Self { aes, iv })
    }
}

/// A parsed public file link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLink {
    pub handle: String,
    pub key: NodeKey,
}

/// Parse `https://mega.nz/file/<handle>#<key>` or the legacy
/// `https://mega.nz/#!<handle>!<key>` form.
pub fn parse_file_link(link: &str) -> Result<FileLink> {
    let url = Url::parse(link).map_err(|e| TransferError::InvalidLink(format!("{}: {}", link, e)))?;
    let fragment = url.fragment().unwrap_or_default();
    let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());

    let (handle, key) = match segments.next() {
        Some("file") => {
            let handle = segments.next().unwrap_or_default();
            // Newer links may append "/folder/..." style suffixes after the key
            let key = fragment.split('/').next().unwrap_or_default();
            (handle.to_string(), key.to_string())
        }
        Some("folder") => {
            return Err(TransferError::InvalidLink(format!(
                "folder links are not supported: {}",
                link
            )))
        }
        None if fragment.starts_with('!') => {
            let mut parts = fragment[1..].splitn(2, '!');
            let handle = parts.next().unwrap_or_default();
            let key = parts.next().unwrap_or_default();
            (handle.to_string(), key.to_string())
        }
        _ => {
            return Err(TransferError::InvalidLink(format!(
                "not a shareable file link: {}",
                link
            )))
        }
    };

    if handle.is_empty() || key.is_empty() {
        return Err(TransferError::InvalidLink(format!(
            "missing handle or key: {}",
            link
        )));
    }

    let raw = decode_base64(&key)?;
    Ok(FileLink {
        handle,
        key: NodeKey::from_link_key(&raw)?,
    })
}

pub(crate) fn decode_base64(value: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| TransferError::InvalidLink(format!("bad base64 '{}': {}", value, e)))
}

pub(crate) fn encode_base64(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub(crate) fn encrypt_block(key: &[u8; 16], data: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut block = GenericArray::clone_from_slice(data);
    cipher.encrypt_block(&mut block);

    let mut out = [0u8; 16];
    out.copy_from_slice(&block);
    out
}

pub(crate) fn decrypt_block(key: &[u8; 16], data: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut block = GenericArray::clone_from_slice(data);
    cipher.decrypt_block(&mut block);

    let mut out = [0u8; 16];
    out.copy_from_slice(&block);
    out
}
