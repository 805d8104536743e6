//! Signed avatar upload grants and the local avatar store.
//!
//! Issuing an upload URL reserves a fresh storage path and signs a
//! short-lived grant over exactly that path. The PUT side verifies the
//! grant before any bytes touch disk; reads are public.

use std::path::PathBuf;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::storage::unix_timestamp;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid upload token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("token does not grant this path")]
    PathMismatch,

    #[error("invalid storage path")]
    InvalidPath,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Claims embedded in an upload grant.
#[derive(Debug, Serialize, Deserialize)]
struct UploadClaims {
    /// Storage path the grant is valid for.
    sub: String,
    exp: i64,
}

/// A reserved path and the token that authorizes writing to it.
#[derive(Debug, Clone, Serialize)]
pub struct UploadGrant {
    pub path: String,
    pub token: String,
}

pub struct AvatarStore {
    root: PathBuf,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl AvatarStore {
    pub fn new(root: PathBuf, secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            root,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// Reserve a fresh path for `filename` and issue its signed grant.
    ///
    /// Only the extension of the original filename survives; the path
    /// itself is unguessable.
    pub fn issue(&self, filename: &str) -> Result<UploadGrant, UploadError> {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 8 && ext.chars().all(char::is_alphanumeric)
            })
            .map_or_else(|| "jpg".to_string(), str::to_lowercase);

        let path = format!(
            "u/{}_{}.{ext}",
            unix_timestamp(),
            Uuid::new_v4().simple()
        );
        let claims = UploadClaims {
            sub: path.clone(),
            exp: unix_timestamp() + self.ttl_secs,
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)?;

        debug!(path = %path, "issued upload grant");
        Ok(UploadGrant { path, token })
    }

    /// Verify a grant and persist the uploaded bytes under its path.
    pub async fn store(&self, path: &str, token: &str, bytes: &[u8]) -> Result<(), UploadError> {
        let data = jsonwebtoken::decode::<UploadClaims>(
            token,
            &self.decoding_key,
            &Validation::default(),
        )?;
        if data.claims.sub != path {
            return Err(UploadError::PathMismatch);
        }

        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(())
    }

    /// Read a stored avatar for public serving.
    pub async fn read(&self, path: &str) -> Result<Vec<u8>, UploadError> {
        let target = self.resolve(path)?;
        Ok(tokio::fs::read(&target).await?)
    }

    /// Map a storage path onto the data directory, refusing traversal.
    fn resolve(&self, path: &str) -> Result<PathBuf, UploadError> {
        let clean = !path.is_empty()
            && path
                .split('/')
                .all(|seg| !seg.is_empty() && seg != "." && seg != ".." && !seg.contains('\\'));
        if !clean {
            return Err(UploadError::InvalidPath);
        }
        Ok(self.root.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::{AvatarStore, UploadError};

    fn store(dir: &std::path::Path) -> AvatarStore {
        AvatarStore::new(dir.to_path_buf(), b"test-secret", 600)
    }

    #[tokio::test]
    async fn issue_store_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let grant = store.issue("me.PNG").unwrap();
        assert!(grant.path.starts_with("u/"));
        assert!(grant.path.ends_with(".png"));

        store.store(&grant.path, &grant.token, b"pixels").await.unwrap();
        assert_eq!(store.read(&grant.path).await.unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn grant_is_bound_to_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let grant = store.issue("a.png").unwrap();
        let other = store.issue("b.png").unwrap();

        let err = store
            .store(&other.path, &grant.token, b"pixels")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::PathMismatch));
    }

    #[tokio::test]
    async fn garbage_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let grant = store.issue("a.png").unwrap();

        let err = store
            .store(&grant.path, "not-a-token", b"pixels")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Token(_)));
    }

    #[tokio::test]
    async fn traversal_paths_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        for path in ["../etc/passwd", "u/../../x", "", "u//x", "."] {
            assert!(matches!(
                store.read(path).await.unwrap_err(),
                UploadError::InvalidPath
            ));
        }
    }

    #[test]
    fn extension_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert!(store.issue("noext").unwrap().path.ends_with(".jpg"));
        assert!(store.issue("weird.p/ng").unwrap().path.ends_with(".jpg"));
        assert!(store.issue("ok.WebP").unwrap().path.ends_with(".webp"));
    }
}
