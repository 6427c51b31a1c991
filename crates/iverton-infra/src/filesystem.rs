//! Data directory layout.

use std::path::{Path, PathBuf};

pub const ENV_DATA_DIR: &str = "IVERTON_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `IVERTON_DATA_DIR` environment variable
/// 2. `~/.iverton`
/// 3. `.iverton` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".iverton");
    }

    PathBuf::from(".iverton")
}

/// Create the data directory if needed.
pub async fn ensure_data_dir(data_dir: &Path) -> Result<(), std::io::Error> {
    tokio::fs::create_dir_all(data_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is the only one touching IVERTON_DATA_DIR and restores it immediately.
        unsafe {
            std::env::set_var(ENV_DATA_DIR, "/tmp/test-iverton");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-iverton"));
        unsafe {
            std::env::remove_var(ENV_DATA_DIR);
        }
    }

    #[tokio::test]
    async fn test_ensure_data_dir_creates_nested() {
        let tmp = tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_data_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        ensure_data_dir(&nested).await.unwrap();
    }
}
