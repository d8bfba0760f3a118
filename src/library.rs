use crate::model::{Playlist, Track};
use crate::store::{Store, keys};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const PLAYLIST_ID_LEN: usize = 8;

/// Favorites and named playlists, loaded once at startup and written back
/// on every mutating operation.
pub struct Library {
    favorites: Vec<Track>,
    playlists: Vec<Playlist>,
    store: Store,
}

/// On-disk artifact for export/import of the whole library.
#[derive(Debug, Serialize, Deserialize)]
pub struct LibraryExport {
    pub favorites: Vec<Track>,
    pub playlists: Vec<Playlist>,
}

impl Library {
    pub fn load(store: Store) -> Self {
        let favorites = store.get(keys::FAVORITES, Vec::new());
        let playlists = store.get(keys::PLAYLISTS, Vec::new());
        Self {
            favorites,
            playlists,
            store,
        }
    }

    pub fn favorites(&self) -> &[Track] {
        &self.favorites
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn playlist(&self, id: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|playlist| playlist.id == id)
    }

    pub fn is_favorite(&self, key: &str) -> bool {
        self.favorites.iter().any(|track| track.key() == key)
    }

    /// Returns true when the track is a favorite after the call.
    pub fn toggle_favorite(&mut self, track: &Track) -> bool {
        let key = track.key();
        let was_favorite = self.is_favorite(&key);
        if was_favorite {
            self.favorites.retain(|entry| entry.key() != key);
        } else {
            self.favorites.push(track.clone());
        }
        self.store.set_best_effort(keys::FAVORITES, &self.favorites);
        !was_favorite
    }

    pub fn create_playlist(&mut self, name: &str, initial_songs: Vec<Track>) -> String {
        let mut songs: Vec<Track> = Vec::with_capacity(initial_songs.len());
        for song in initial_songs {
            if !songs.iter().any(|existing| existing.same_song(&song)) {
                songs.push(song);
            }
        }

        let id = generate_playlist_id();
        self.playlists.push(Playlist {
            id: id.clone(),
            name: name.to_string(),
            create_time: unix_seconds(),
            songs,
        });
        self.persist_playlists();
        id
    }

    pub fn delete_playlist(&mut self, id: &str) -> bool {
        let before = self.playlists.len();
        self.playlists.retain(|playlist| playlist.id != id);
        let removed = self.playlists.len() != before;
        if removed {
            self.persist_playlists();
        }
        removed
    }

    pub fn rename_playlist(&mut self, id: &str, name: &str) -> bool {
        let Some(playlist) = self.playlists.iter_mut().find(|playlist| playlist.id == id) else {
            return false;
        };
        playlist.name = name.to_string();
        self.persist_playlists();
        true
    }

    /// Adds a track to a playlist, refusing duplicates of the same song.
    pub fn add_to_playlist(&mut self, id: &str, track: &Track) -> bool {
        let Some(playlist) = self.playlists.iter_mut().find(|playlist| playlist.id == id) else {
            return false;
        };
        if playlist.songs.iter().any(|song| song.same_song(track)) {
            return false;
        }
        playlist.songs.push(track.clone());
        self.persist_playlists();
        true
    }

    pub fn remove_from_playlist(&mut self, id: &str, track_key: &str) -> bool {
        let Some(playlist) = self.playlists.iter_mut().find(|playlist| playlist.id == id) else {
            return false;
        };
        let before = playlist.songs.len();
        playlist.songs.retain(|song| song.key() != track_key);
        let removed = playlist.songs.len() != before;
        if removed {
            self.persist_playlists();
        }
        removed
    }

    /// Bulk create from an externally fetched playlist.
    pub fn import_playlist(&mut self, name: &str, songs: Vec<Track>) -> String {
        self.create_playlist(name, songs)
    }

    pub fn export_data(&self) -> Result<String> {
        let artifact = LibraryExport {
            favorites: self.favorites.clone(),
            playlists: self.playlists.clone(),
        };
        serde_json::to_string_pretty(&artifact).context("failed to serialize library export")
    }

    pub fn export_to_file(&self, path: &Path) -> Result<()> {
        let json = self.export_data()?;
        fs::write(path, json)
            .with_context(|| format!("failed to write export {}", path.display()))?;
        Ok(())
    }

    /// Validates the artifact shape, then replaces the local state. A
    /// malformed payload leaves the library untouched.
    pub fn import_data(&mut self, raw: &str) -> Result<()> {
        let artifact: LibraryExport =
            serde_json::from_str(raw).context("export artifact has an unexpected shape")?;
        self.favorites = artifact.favorites;
        self.playlists = artifact.playlists;
        self.store.set_best_effort(keys::FAVORITES, &self.favorites);
        self.persist_playlists();
        Ok(())
    }

    fn persist_playlists(&self) {
        self.store.set_best_effort(keys::PLAYLISTS, &self.playlists);
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

fn generate_playlist_id() -> String {
    use rand::Rng;
    const CHARS: &[u8] = b"abcdefghjklmnpqrstuvwxyz23456789";
    let mut rng = rand::rng();
    let mut out = String::with_capacity(3 + PLAYLIST_ID_LEN);
    out.push_str("pl-");
    for _ in 0..PLAYLIST_ID_LEN {
        let idx = rng.random_range(0..CHARS.len());
        out.push(char::from(CHARS[idx]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("song {id}"),
            artist: String::from("artist"),
            album: String::from("album"),
            source: String::from("qq"),
            pic: None,
            url: None,
            lrc: None,
            duration: None,
            types: Vec::new(),
        }
    }

    fn library_in(dir: &Path) -> Library {
        Library::load(Store::at(dir.to_path_buf()))
    }

    #[test]
    fn toggle_favorite_adds_then_removes() {
        let dir = tempdir().expect("tempdir");
        let mut library = library_in(dir.path());

        assert!(library.toggle_favorite(&track("a")));
        assert!(library.is_favorite("qq:a"));
        assert!(!library.toggle_favorite(&track("a")));
        assert!(!library.is_favorite("qq:a"));
    }

    #[test]
    fn favorites_survive_reload() {
        let dir = tempdir().expect("tempdir");
        let mut library = library_in(dir.path());
        library.toggle_favorite(&track("a"));

        let reloaded = library_in(dir.path());
        assert!(reloaded.is_favorite("qq:a"));
    }

    #[test]
    fn playlist_crud_flow() {
        let dir = tempdir().expect("tempdir");
        let mut library = library_in(dir.path());

        let id = library.create_playlist("mix", vec![track("a")]);
        assert!(library.add_to_playlist(&id, &track("b")));
        assert!(
            !library.add_to_playlist(&id, &track("b")),
            "same song must not be added twice"
        );
        assert_eq!(library.playlist(&id).expect("playlist").songs.len(), 2);

        assert!(library.rename_playlist(&id, "evening mix"));
        assert_eq!(library.playlist(&id).expect("playlist").name, "evening mix");

        assert!(library.remove_from_playlist(&id, "qq:a"));
        assert_eq!(library.playlist(&id).expect("playlist").songs.len(), 1);

        assert!(library.delete_playlist(&id));
        assert!(library.playlist(&id).is_none());
        assert!(!library.delete_playlist(&id));
    }

    #[test]
    fn create_playlist_dedups_initial_songs() {
        let dir = tempdir().expect("tempdir");
        let mut library = library_in(dir.path());
        let id = library.create_playlist("mix", vec![track("a"), track("a"), track("b")]);
        assert_eq!(library.playlist(&id).expect("playlist").songs.len(), 2);
    }

    #[test]
    fn export_import_round_trip() {
        let source_dir = tempdir().expect("tempdir");
        let mut source = library_in(source_dir.path());
        source.toggle_favorite(&track("fav"));
        let id = source.create_playlist("mix", vec![track("a"), track("b")]);
        let artifact = source.export_data().expect("export");

        let target_dir = tempdir().expect("tempdir");
        let mut target = library_in(target_dir.path());
        target.import_data(&artifact).expect("import");

        assert!(target.is_favorite("qq:fav"));
        let playlist = target.playlist(&id).expect("playlist");
        assert_eq!(playlist.name, "mix");
        assert_eq!(playlist.songs.len(), 2);
    }

    #[test]
    fn import_rejects_malformed_artifacts() {
        let dir = tempdir().expect("tempdir");
        let mut library = library_in(dir.path());
        library.toggle_favorite(&track("keep"));

        assert!(library.import_data("not json at all").is_err());
        assert!(library.import_data("{\"favorites\": 3}").is_err());
        // Failed imports leave existing state alone.
        assert!(library.is_favorite("qq:keep"));
    }
}
