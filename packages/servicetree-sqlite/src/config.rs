//! Process-startup configuration. Resolution is a pure search over an
//! ordered candidate list (an explicit `-f`-style path simply goes first);
//! parsing is plain TOML.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use servicetree_core::{Error, Result};

/// Default candidate paths, most specific first.
pub const DEFAULT_CONFIG_CANDIDATES: &[&str] =
    &["etc/servicetree.local.toml", "etc/servicetree.toml"];

/// First existing candidate wins; `NotFound` when none exists.
pub fn resolve_config_path<P: AsRef<Path>>(candidates: &[P]) -> Result<PathBuf> {
    for candidate in candidates {
        let candidate = candidate.as_ref();
        if candidate.exists() {
            return Ok(candidate.to_path_buf());
        }
    }
    Err(Error::NotFound("no configuration file found".into()))
}

fn default_db_path() -> PathBuf {
    PathBuf::from("servicetree.db")
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    /// SQLite database file backing the tree store.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| Error::InvalidArgument(format!("parse {}: {e}", path.display())))
    }

    /// Resolve and load in one step: `explicit` first, then the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(p) = explicit {
            candidates.push(p.to_path_buf());
        }
        candidates.extend(DEFAULT_CONFIG_CANDIDATES.iter().map(PathBuf::from));
        let path = resolve_config_path(&candidates)?;
        Self::load(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("present.toml");
        std::fs::write(&present, "db_path = \"tree.db\"\n").unwrap();

        let resolved = resolve_config_path(&[missing.clone(), present.clone()]).unwrap();
        assert_eq!(resolved, present);

        let err = resolve_config_path(&[missing]).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {err}");
    }

    #[test]
    fn load_parses_toml_and_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("servicetree.toml");
        std::fs::write(&file, "db_path = \"var/tree.db\"\n").unwrap();
        let settings = Settings::load(&file).unwrap();
        assert_eq!(settings.db_path, PathBuf::from("var/tree.db"));

        std::fs::write(&file, "").unwrap();
        let settings = Settings::load(&file).unwrap();
        assert_eq!(settings.db_path, PathBuf::from("servicetree.db"));
    }

    #[test]
    fn malformed_toml_is_invalid_argument() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("servicetree.toml");
        std::fs::write(&file, "db_path = [not toml").unwrap();
        let err = Settings::load(&file).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "got {err}");
    }
}
