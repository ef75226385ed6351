use std::path::{Path, PathBuf};

/// API keys live in `~/.confide/credentials/<provider>.key`, written with
/// 0600/0700 permissions. Resolution order (env var first, then this
/// store) is handled by config loading.

fn state_dir() -> PathBuf {
    if let Ok(path) = std::env::var("CONFIDE_CONFIG") {
        let config_path = PathBuf::from(path);
        if let Some(parent) = config_path.parent() {
            return parent.to_path_buf();
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".confide")
}

fn normalize_provider(provider: &str) -> anyhow::Result<String> {
    let provider = provider.trim().to_ascii_lowercase();
    match provider.as_str() {
        "openai" | "telegram" => Ok(provider),
        _ => anyhow::bail!("unsupported provider for key store: {provider}"),
    }
}

fn key_file_path_for(state_dir: &Path, provider: &str) -> anyhow::Result<PathBuf> {
    let provider = normalize_provider(provider)?;
    Ok(state_dir.join("credentials").join(format!("{provider}.key")))
}

pub fn write_key_to(state_dir: &Path, provider: &str, api_key: &str) -> anyhow::Result<PathBuf> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        anyhow::bail!("API key cannot be empty");
    }

    let path = key_file_path_for(state_dir, provider)?;
    let dir = path.parent().expect("key path always has a parent");
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow::anyhow!("failed to create {}: {e}", dir.display()))?;
    set_mode(dir, 0o700)?;

    std::fs::write(&path, api_key)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
    set_mode(&path, 0o600)?;
    Ok(path)
}

pub fn read_key_from(state_dir: &Path, provider: &str) -> Option<String> {
    let path = key_file_path_for(state_dir, provider).ok()?;
    let value = std::fs::read_to_string(path).ok()?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Store a provider key under the confide state directory.
pub fn store_api_key(provider: &str, api_key: &str) -> anyhow::Result<PathBuf> {
    write_key_to(&state_dir(), provider, api_key)
}

/// Load a provider key from the confide state directory.
pub fn load_api_key(provider: &str) -> Option<String> {
    read_key_from(&state_dir(), provider)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| anyhow::anyhow!("failed to chmod {mode:o} {}: {e}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{read_key_from, write_key_to};
    use std::path::PathBuf;

    fn tmp_dir() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("confide-secrets-test-{nanos}"));
        std::fs::create_dir_all(&path).expect("create temp dir");
        path
    }

    #[test]
    fn writes_and_reads_provider_key() {
        let dir = tmp_dir();
        let path = write_key_to(&dir, "openai", "sk-test").expect("write key");
        assert!(path.exists());
        let loaded = read_key_from(&dir, "openai");
        assert_eq!(loaded.as_deref(), Some("sk-test"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn rejects_unknown_provider() {
        let dir = tmp_dir();
        let err = write_key_to(&dir, "bad/../../provider", "x").expect_err("should fail");
        assert!(err.to_string().contains("unsupported provider"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn rejects_empty_key() {
        let dir = tmp_dir();
        assert!(write_key_to(&dir, "telegram", "   ").is_err());
        std::fs::remove_dir_all(dir).ok();
    }
}
