//! User key resolution: flag or environment, then the key file, then a
//! freshly issued key cached to the key file.

use std::path::Path;

use anyhow::Context;
use mercury_client::ApiClient;
use tracing::{debug, info};

/// Read a cached key; `None` when the file is missing or blank.
pub async fn read_key_file(path: &Path) -> anyhow::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            let key = text.trim();
            Ok((!key.is_empty()).then(|| key.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading key file {}", path.display())),
    }
}

/// Attach a user key to `client`, issuing and caching one if none is known.
pub async fn with_user_key(
    client: ApiClient,
    explicit: Option<String>,
    key_file: &Path,
) -> anyhow::Result<ApiClient> {
    if let Some(key) = explicit {
        return Ok(client.with_user_key(key));
    }
    if let Some(key) = read_key_file(key_file).await? {
        debug!(path = %key_file.display(), "using cached user key");
        return Ok(client.with_user_key(key));
    }
    let key = client
        .new_user_key()
        .await
        .context("requesting a new user key")?;
    tokio::fs::write(key_file, format!("{key}\n"))
        .await
        .with_context(|| format!("writing key file {}", key_file.display()))?;
    info!(path = %key_file.display(), "cached new user key");
    Ok(client.with_user_key(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn client() -> ApiClient {
        ApiClient::new("http://localhost:1".into())
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".mercury-key");
        assert_eq!(read_key_file(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn blank_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".mercury-key");
        tokio::fs::write(&path, " \n").await.unwrap();
        assert_eq!(read_key_file(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cached_key_is_trimmed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".mercury-key");
        tokio::fs::write(&path, "  abc123\n").await.unwrap();
        assert_eq!(read_key_file(&path).await.unwrap().as_deref(), Some("abc123"));

        let client = with_user_key(client(), None, &path).await.unwrap();
        assert_eq!(client.user_key(), Some("abc123"));
    }

    #[tokio::test]
    async fn explicit_key_wins() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".mercury-key");
        tokio::fs::write(&path, "cached\n").await.unwrap();
        let client = with_user_key(client(), Some("flag-key".into()), &path)
            .await
            .unwrap();
        assert_eq!(client.user_key(), Some("flag-key"));
    }
}
