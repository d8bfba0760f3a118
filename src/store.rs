use anyhow::{Context, Result};
use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

const APP_DIR: &str = "airtune";

pub mod keys {
    pub const CURRENT_SONG: &str = "current_song";
    pub const QUEUE: &str = "queue";
    pub const PLAY_MODE: &str = "play_mode";
    pub const AUDIO_QUALITY: &str = "audio_quality";
    pub const FAVORITES: &str = "favorites";
    pub const PLAYLISTS: &str = "playlists";
    pub const SEARCH_HISTORY: &str = "search_history";
}

#[derive(Debug, Clone)]
pub struct StoreError {
    pub key: String,
    pub message: String,
}

/// Per-key JSON persistence. Every key lives in its own file so state
/// slices stay independently readable and writable.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    error_tap: Option<Sender<StoreError>>,
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("AIRTUNE_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

impl Store {
    pub fn open() -> Result<Self> {
        Ok(Self::at(config_root()?))
    }

    pub fn at(root: PathBuf) -> Self {
        Self {
            root,
            error_tap: None,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Optional subscriber for write failures (storage-quota style
    /// warnings). The store never depends on a subscriber existing.
    pub fn set_error_tap(&mut self, tap: Sender<StoreError>) {
        self.error_tap = Some(tap);
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Reads one key, falling back to `default` when the file is missing
    /// or unreadable. A corrupt file never takes the app down.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let path = self.key_path(key);
        if !path.exists() {
            return default;
        }

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("failed to read {}: {err}", path.display());
                return default;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!("failed to parse {}: {err}", path.display());
                default
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let path = self.key_path(key);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Fire-and-forget write: failures are logged and forwarded to the
    /// error tap, never surfaced to the caller.
    pub fn set_best_effort<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(err) = self.set(key, value) {
            warn!("persistence failed for {key}: {err:#}");
            if let Some(tap) = &self.error_tap {
                let _ = tap.send(StoreError {
                    key: key.to_string(),
                    message: format!("{err:#}"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::tempdir;

    #[test]
    fn missing_key_returns_default() {
        let dir = tempdir().expect("tempdir");
        let store = Store::at(dir.path().to_path_buf());
        let value: Vec<String> = store.get("nothing_here", vec![String::from("fallback")]);
        assert_eq!(value, vec![String::from("fallback")]);
    }

    #[test]
    fn set_and_get_round_trip() {
        let dir = tempdir().expect("tempdir");
        let store = Store::at(dir.path().to_path_buf());
        store
            .set(keys::SEARCH_HISTORY, &vec![String::from("hello")])
            .expect("set");
        let value: Vec<String> = store.get(keys::SEARCH_HISTORY, Vec::new());
        assert_eq!(value, vec![String::from("hello")]);
    }

    #[test]
    fn keys_are_independent_files() {
        let dir = tempdir().expect("tempdir");
        let store = Store::at(dir.path().to_path_buf());
        store.set(keys::PLAY_MODE, &"loop").expect("set mode");
        store.set(keys::AUDIO_QUALITY, &"flac").expect("set quality");

        assert!(dir.path().join("play_mode.json").exists());
        assert!(dir.path().join("audio_quality.json").exists());

        // Corrupting one key must not affect the other.
        fs::write(dir.path().join("play_mode.json"), "not json").expect("corrupt");
        let mode: String = store.get(keys::PLAY_MODE, String::from("sequence"));
        let quality: String = store.get(keys::AUDIO_QUALITY, String::from("320k"));
        assert_eq!(mode, "sequence");
        assert_eq!(quality, "flac");
    }

    #[test]
    fn failed_write_reports_to_error_tap() {
        let dir = tempdir().expect("tempdir");
        // A file where the store expects a directory makes writes fail.
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, b"").expect("block");

        let mut store = Store::at(blocked);
        let (tx, rx) = mpsc::channel();
        store.set_error_tap(tx);
        store.set_best_effort(keys::QUEUE, &Vec::<String>::new());

        let error = rx.try_recv().expect("error should be forwarded");
        assert_eq!(error.key, keys::QUEUE);
    }
}
