use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory and an initial `config.json` pointing at `base_url`.
///
/// # Arguments
/// - `viccoin_home` - The directory that will be the root of data directory, e.g. `$HOME/viccoin`
/// - `base_url` - The backend's base URL, e.g. `https://viccoin.onrender.com`
///
/// # Errors
/// - Returns an error if any file operations fail or if `base_url` is not an http(s) URL.
pub async fn init(viccoin_home: &Path, base_url: &str) -> Result<Out<()>> {
    let config = Config::create(viccoin_home, base_url)
        .await
        .context("Unable to create the data directory and configs")?;
    Ok(format!(
        "Successfully created the viccoin directory at '{}'",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("viccoin");
        let out = init(&home, "http://localhost:8000").await.unwrap();
        assert!(out.message().contains("Successfully created"));
        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_init_rejects_bad_url() {
        let dir = TempDir::new().unwrap();
        assert!(init(dir.path(), "ftp://nope").await.is_err());
    }
}
