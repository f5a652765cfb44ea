use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

use nibble_core::users::UserMap;

pub struct Config {
    pub data_dir: PathBuf,
    pub users_path: PathBuf,
}

impl Config {
    /// Resolve the data directory (platform default unless overridden) and
    /// make sure it exists.
    pub fn load(data_dir: Option<PathBuf>, users_path: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("", "", "nibble")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let users_path = users_path.unwrap_or_else(|| data_dir.join("users.json"));

        Ok(Config {
            data_dir,
            users_path,
        })
    }

    pub fn load_users(&self) -> Result<UserMap> {
        let users = UserMap::load(&self.users_path)?;
        if users.is_empty() {
            tracing::warn!(
                path = %self.users_path.display(),
                "no users configured; every token will be rejected"
            );
        }
        Ok(users)
    }
}
