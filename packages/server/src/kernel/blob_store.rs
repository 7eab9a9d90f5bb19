//! Blob storage for raw photo bytes.
//!
//! Keys are relative paths such as `jobs/{job_id}/raw/...jpg`. Read access
//! goes through presigned URLs served by `GET /uploads/*key`, which checks
//! the signature and expiry before streaming the bytes.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::RwLock;
use tracing::debug;

use crate::kernel::BaseBlobStore;

type HmacSha256 = Hmac<Sha256>;

/// Signs blob URLs with hex `HMAC-SHA256(secret, key \n expires)`.
#[derive(Debug, Clone)]
pub struct UrlSigner {
    public_base_url: String,
    secret: String,
}

impl UrlSigner {
    pub fn new(public_base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        }
    }

    fn mac(&self, key: &str, expires: i64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .context("invalid URL signing secret")?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    pub fn sign(&self, key: &str, ttl: Duration) -> Result<String> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let signature = hex::encode(self.mac(key, expires)?.finalize().into_bytes());
        Ok(format!(
            "{}/uploads/{}?expires={}&sig={}",
            self.public_base_url, key, expires, signature
        ))
    }

    pub fn verify_at(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        let (Ok(signature), Ok(mac)) = (hex::decode(signature), self.mac(key, expires)) else {
            return false;
        };
        mac.verify_slice(&signature).is_ok()
    }

    pub fn verify(&self, key: &str, expires: i64, signature: &str) -> bool {
        self.verify_at(key, expires, signature, Utc::now().timestamp())
    }
}

/// Reject keys that could escape the storage root.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        anyhow::bail!("blob key is empty");
    }
    let path = Path::new(key);
    let safe = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        anyhow::bail!("blob key {:?} is not a plain relative path", key);
    }
    Ok(())
}

/// Files under a local directory.
pub struct LocalBlobStore {
    root: PathBuf,
    signer: UrlSigner,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, signer: UrlSigner) -> Self {
        Self {
            root: root.into(),
            signer,
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BaseBlobStore for LocalBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(key = %key, size = bytes.len(), "Stored blob");
        Ok(format!("file://{}", path.display()))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    fn presign(&self, key: &str, ttl: Duration) -> Result<String> {
        validate_key(key)?;
        self.signer.sign(key, ttl)
    }

    fn verify_presigned(&self, key: &str, expires: i64, signature: &str) -> bool {
        validate_key(key).is_ok() && self.signer.verify(key, expires, signature)
    }
}

/// Process-local blob store for tests.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    signer: UrlSigner,
    fail_puts: bool,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            signer: UrlSigner::new("http://localhost", "memory-blob-store"),
            fail_puts: false,
        }
    }

    /// A store whose `put` always fails, for exercising save-failure paths.
    pub fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Self::new()
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BaseBlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        validate_key(key)?;
        if self.fail_puts {
            anyhow::bail!("blob store unavailable");
        }
        self.blobs
            .write()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(format!("memory://{}", key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .with_context(|| format!("no blob stored under {}", key))
    }

    fn presign(&self, key: &str, ttl: Duration) -> Result<String> {
        validate_key(key)?;
        self.signer.sign(key, ttl)
    }

    fn verify_presigned(&self, key: &str, expires: i64, signature: &str) -> bool {
        self.signer.verify(key, expires, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        let query = url.split_once('?').unwrap().1;
        query
            .split('&')
            .find_map(|kv| kv.strip_prefix(&format!("{}=", name)))
            .unwrap()
    }

    #[test]
    fn signed_url_verifies_until_expiry() {
        let signer = UrlSigner::new("https://photos.example.com/", "s3cret");
        let url = signer.sign("jobs/a/raw/x.jpg", Duration::from_secs(60)).unwrap();
        assert!(url.starts_with("https://photos.example.com/uploads/jobs/a/raw/x.jpg?expires="));

        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let sig = query_param(&url, "sig");
        assert!(signer.verify("jobs/a/raw/x.jpg", expires, sig));
        assert!(!signer.verify("jobs/b/raw/x.jpg", expires, sig));
        assert!(!signer.verify_at("jobs/a/raw/x.jpg", expires, sig, expires + 1));
        assert!(!UrlSigner::new("https://photos.example.com", "other").verify(
            "jobs/a/raw/x.jpg",
            expires,
            sig
        ));
    }

    #[test]
    fn signature_is_hmac_sha256_of_key_and_expiry() {
        let signer = UrlSigner::new("http://localhost", "s3cret");
        let url = signer.sign("jobs/a/raw/x.jpg", Duration::from_secs(60)).unwrap();
        let expires = query_param(&url, "expires");
        let sig = query_param(&url, "sig");

        let mut mac = HmacSha256::new_from_slice(b"s3cret").unwrap();
        mac.update(format!("jobs/a/raw/x.jpg\n{}", expires).as_bytes());
        assert_eq!(sig, hex::encode(mac.finalize().into_bytes()));

        // Plain keyed hash of the same fields is not a valid signature.
        use sha2::Digest;
        let prefix_hash = hex::encode(Sha256::digest(
            format!("s3cret\njobs/a/raw/x.jpg\n{}", expires).as_bytes(),
        ));
        let expires: i64 = expires.parse().unwrap();
        assert!(!signer.verify("jobs/a/raw/x.jpg", expires, &prefix_hash));
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        let signer = UrlSigner::new("http://localhost", "s3cret");
        let url = signer.sign("jobs/a/raw/x.jpg", Duration::from_secs(60)).unwrap();
        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let sig = query_param(&url, "sig");

        assert!(!signer.verify("jobs/a/raw/x.jpg", expires, "not-hex"));
        assert!(!signer.verify("jobs/a/raw/x.jpg", expires, &sig[..sig.len() - 2]));
        assert!(!signer.verify("jobs/a/raw/x.jpg", expires, ""));
    }

    #[test]
    fn traversal_keys_are_rejected() {
        assert!(validate_key("jobs/a/raw/x.jpg").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("jobs/../../x").is_err());
        assert!(validate_key("/abs/path").is_err());
        assert!(validate_key("").is_err());
    }

    #[tokio::test]
    async fn local_store_writes_nested_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), UrlSigner::new("http://localhost:8080", "k"));

        let locator = store.put("jobs/j1/raw/a.jpg", b"bytes").await.unwrap();
        assert!(locator.starts_with("file://"));
        assert_eq!(store.get("jobs/j1/raw/a.jpg").await.unwrap(), b"bytes");
        assert!(store.put("../escape.jpg", b"x").await.is_err());
    }

    #[tokio::test]
    async fn failing_memory_store_rejects_puts() {
        let store = MemoryBlobStore::failing();
        assert!(store.put("jobs/a.jpg", b"x").await.is_err());
        assert!(store.keys().await.is_empty());
    }
}
