use serde::{Deserialize, Serialize};

const SEARCH_HISTORY_CAP: usize = 20;

/// Navigation policy applied by next/prev.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlayMode {
    #[default]
    Sequence,
    Loop,
    Shuffle,
}

impl PlayMode {
    pub fn next(self) -> Self {
        match self {
            Self::Sequence => Self::Loop,
            Self::Loop => Self::Shuffle,
            Self::Shuffle => Self::Sequence,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Loop => "loop",
            Self::Shuffle => "shuffle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AudioQuality {
    Br128,
    #[default]
    Br320,
    Flac,
    Flac24,
}

impl AudioQuality {
    pub const LOWEST: Self = Self::Br128;

    pub fn next(self) -> Self {
        match self {
            Self::Br128 => Self::Br320,
            Self::Br320 => Self::Flac,
            Self::Flac => Self::Flac24,
            Self::Flac24 => Self::Br128,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Br128 => "128k",
            Self::Br320 => "320k",
            Self::Flac => "flac",
            Self::Flac24 => "flac24bit",
        }
    }

    /// Wire form expected by the aggregation API (`320k` becomes `320`).
    pub fn wire_param(self) -> &'static str {
        match self {
            Self::Br128 => "128",
            Self::Br320 => "320",
            Self::Flac => "flac",
            Self::Flac24 => "flac24bit",
        }
    }

    pub fn is_lowest(self) -> bool {
        self == Self::LOWEST
    }
}

/// A playable song from one source platform. Tracks are value objects:
/// enrichment produces a new value that replaces the old one wherever it
/// is held (queue, current song, playlists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub source: String,
    #[serde(default)]
    pub pic: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub lrc: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub types: Vec<String>,
}

impl Track {
    /// Composite identity. Ids are only unique within a source platform,
    /// so equality anywhere in the player compares source and id together.
    pub fn key(&self) -> String {
        format!("{}:{}", self.source, self.id)
    }

    pub fn same_song(&self, other: &Track) -> bool {
        self.id == other.id && self.source == other.source
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub create_time: u64,
    pub songs: Vec<Track>,
}

/// Most-recent-first search history with dedup and a fixed cap.
pub fn remember_search(history: &mut Vec<String>, keyword: &str) {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return;
    }
    history.retain(|entry| entry != keyword);
    history.insert(0, keyword.to_string());
    history.truncate(SEARCH_HISTORY_CAP);
}
