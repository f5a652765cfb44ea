use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::db::Database;
use crate::error::NibbleError;

/// Maps an external per-user token to a display name.
///
/// The web server, the CLI, and tests all inject one of these.
pub trait UserResolver: Send + Sync {
    fn resolve_user(&self, token: &str) -> Option<String>;
}

/// Token-to-name table read from a JSON object such as
/// `{"s3cr3t": "alice"}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct UserMap {
    users: HashMap<String, String>,
}

impl UserMap {
    /// Load the table from `path`. A missing file means nobody is a valid user.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read users file: {}", path.display()))?;
        let map: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid users file: {}", path.display()))?;
        Ok(map)
    }

    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            users: pairs
                .into_iter()
                .map(|(token, name)| (token.to_string(), name.to_string()))
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserResolver for UserMap {
    fn resolve_user(&self, token: &str) -> Option<String> {
        self.users.get(token).cloned()
    }
}

/// Resolve `token` or fail with `InvalidUser`.
pub fn require_user(resolver: &dyn UserResolver, token: Option<&str>) -> Result<String, NibbleError> {
    token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .and_then(|t| resolver.resolve_user(t))
        .ok_or(NibbleError::InvalidUser)
}

/// `<data_dir>/data/<name>/food.db`, refusing names that would leave `data_dir`.
pub fn user_db_path(data_dir: &Path, name: &str) -> Result<PathBuf, NibbleError> {
    let safe = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0');
    if !safe {
        return Err(NibbleError::InvalidUser);
    }
    Ok(data_dir.join("data").join(name).join("food.db"))
}

/// Open (creating if needed) the store belonging to `name`.
pub fn open_user_database(data_dir: &Path, name: &str) -> Result<Database> {
    let path = user_db_path(data_dir, name)?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| NibbleError::storage(dir, e))?;
    }
    let db = Database::open(&path)?;
    info!(user = name, path = %path.display(), "opened user store");
    Ok(db)
}
