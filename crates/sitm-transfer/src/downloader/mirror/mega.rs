//! MEGA API client for public file links.

use std::path::Path;
use std::sync::Arc;

use aes::cipher::generic_array::GenericArray;
use aes::Aes128;
use async_trait::async_trait;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngExt;
use serde_json::{json, Value};
use url::Url;

use crate::http::HttpClient;
use crate::progress::ProgressTracker;
use crate::{Result, TransferError};

use super::link::{decode_base64, decrypt_block, encode_base64, encrypt_block, parse_file_link};
use super::{MirrorNode, MirrorService, MirrorSession};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Talks to the MEGA command API (`/cs`) over the shared HTTP client.
pub struct MegaService {
    http_client: Arc<HttpClient>,
    api_url: String,
}

impl MegaService {
    pub fn new(http_client: Arc<HttpClient>, api_url: impl Into<String>) -> Self {
        Self {
            http_client,
            api_url: api_url.into(),
        }
    }

    /// Send a single command and return its result element.
    ///
    /// The API answers with either a bare negative error code or an array
    /// holding one result per command; negative numbers are errors.
    async fn command(&self, session: Option<&MirrorSession>, command: Value) -> Result<Value> {
        let mut url = Url::parse(&self.api_url).map_err(|e| {
            TransferError::Mirror(format!("invalid API URL {}: {}", self.api_url, e))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("id", &rand::rng().random::<u32>().to_string());
            if let Some(session) = session {
                query.append_pair("sid", &session.id);
            }
        }

        let reply: Value = self.http_client.post_json(url.as_str(), &[command]).await?;
        match reply {
            Value::Number(code) => Err(api_error(code.as_i64().unwrap_or_default())),
            Value::Array(mut items) if !items.is_empty() => {
                let first = items.swap_remove(0);
                match first.as_i64() {
                    Some(code) if code < 0 => Err(api_error(code)),
                    _ => Ok(first),
                }
            }
            other => Err(TransferError::Mirror(format!("unexpected API response: {}", other))),
        }
    }
}

fn api_error(code: i64) -> TransferError {
    let reason = match code {
        -2 => "bad arguments",
        -3 => "try again",
        -4 => "rate limited",
        -9 => "not found",
        -11 => "access denied",
        -15 => "session expired",
        -16 => "blocked",
        -17 => "quota exceeded",
        -18 => "temporarily unavailable",
        _ => "request failed",
    };
    TransferError::Mirror(format!("API error {} ({})", code, reason))
}

fn to_block(bytes: &[u8]) -> Option<[u8; 16]> {
    bytes.get(..16)?.try_into().ok()
}

#[async_trait]
impl MirrorService for MegaService {
    /// Create an ephemeral account and log into it.
    ///
    /// The master key is wrapped with a random password key; the server
    /// proves the session by returning a `tsid` whose tail is the encryption
    /// of its head under the master key.
    async fn login_anonymous(&self) -> Result<MirrorSession> {
        // ThreadRng is not Send, keep it out of the future's state
        let (master_key, password_key, challenge): ([u8; 16], [u8; 16], [u8; 16]) = {
            let mut rng = rand::rng();
            (rng.random(), rng.random(), rng.random())
        };

        let mut ts = challenge.to_vec();
        ts.extend_from_slice(&encrypt_block(&master_key, &challenge));

        let user = self
            .command(
                None,
                json!({
                    "a": "up",
                    "k": encode_base64(&encrypt_block(&password_key, &master_key)),
                    "ts": encode_base64(&ts),
                }),
            )
            .await
            .map_err(|e| TransferError::MirrorLogin(e.to_string()))?;

        let user = user
            .as_str()
            .ok_or_else(|| TransferError::MirrorLogin("no user handle returned".to_string()))?;

        let login = self
            .command(None, json!({ "a": "us", "user": user }))
            .await
            .map_err(|e| TransferError::MirrorLogin(e.to_string()))?;

        let tsid = login
            .get("tsid")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TransferError::MirrorLogin("no temporary session returned".to_string())
            })?;

        let wrapped = login
            .get("k")
            .and_then(Value::as_str)
            .map(decode_base64)
            .transpose()?
            .and_then(|k| to_block(&k))
            .ok_or_else(|| TransferError::MirrorLogin("no master key returned".to_string()))?;

        let server_master = decrypt_block(&password_key, &wrapped);
        let tsid_bytes = decode_base64(tsid)?;
        let valid = tsid_bytes.len() >= 32
            && to_block(&tsid_bytes).map(|head| encrypt_block(&server_master, &head))
                == to_block(&tsid_bytes[tsid_bytes.len() - 16..]);

        if !valid {
            return Err(TransferError::MirrorLogin(
                "session verification failed".to_string(),
            ));
        }

        log::debug!("Anonymous cloud mirror session established");
        Ok(MirrorSession {
            id: tsid.to_string(),
        })
    }

    async fn resolve_link(&self, session: &MirrorSession, link: &str) -> Result<MirrorNode> {
        let link = parse_file_link(link)?;

        let info = self
            .command(Some(session), json!({ "a": "g", "p": link.handle }))
            .await?;

        let size = info
            .get("s")
            .and_then(Value::as_u64)
            .ok_or_else(|| TransferError::Mirror(format!("no size for node {}", link.handle)))?;

        Ok(MirrorNode {
            handle: link.handle,
            size,
            key: Some(link.key),
        })
    }

    async fn download_node(
        &self,
        session: &MirrorSession,
        node: &MirrorNode,
        dest: &Path,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        let key = node
            .key
            .as_ref()
            .ok_or_else(|| TransferError::Mirror(format!("node {} has no key", node.handle)))?;

        let info = self
            .command(Some(session), json!({ "a": "g", "g": 1, "p": node.handle }))
            .await?;

        let download_url = info
            .get("g")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TransferError::Mirror(format!("no download URL for node {}", node.handle))
            })?;

        let mut cipher = Aes128Ctr::new(
            GenericArray::from_slice(&key.aes),
            GenericArray::from_slice(&key.iv),
        );
        let total = node.size;

        let received = self
            .http_client
            .download_with(
                download_url,
                dest,
                |received, length| progress.report_bytes(received, length.unwrap_or(total)),
                move |mut chunk| {
                    cipher.apply_keystream(&mut chunk);
                    chunk
                },
            )
            .await?;

        if received != total {
            return Err(TransferError::Mirror(format!(
                "expected {} bytes for node {}, received {}",
                total, node.handle, received
            )));
        }

        Ok(())
    }
}
