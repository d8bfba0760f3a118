use crate::model::{AudioQuality, Track};
use log::warn;
use serde_json::Value;
use std::time::{Duration, Instant};

pub const DEFAULT_API_BASE: &str = "https://music-api.chenghua.site";
const COVER_CDN: &str = "https://y.gtimg.cn/music/photo_new";
const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackInfo {
    pub pic: Option<String>,
    pub url: Option<String>,
    pub lrc: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchedPlaylist {
    pub name: String,
    pub songs: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopList {
    pub id: String,
    pub name: String,
    pub update_frequency: String,
}

/// Narrow contract against the remote aggregation service. Every call may
/// fail; failures collapse to "no data" so callers apply their own policy
/// instead of seeing transport errors.
pub trait MusicApi: Send + Sync {
    fn resolve_play_url(&self, id: &str, source: &str, quality: AudioQuality) -> Option<String>;
    fn fetch_track_info(&self, id: &str, source: &str) -> Option<TrackInfo>;
    fn fetch_lyrics(&self, id: &str, source: &str) -> String;
    fn search(&self, keyword: &str, source: &str, page: u32) -> Vec<Track>;
    fn fetch_playlist(&self, external_id: &str, source: &str) -> Option<FetchedPlaylist>;
    fn fetch_top_lists(&self, source: &str) -> Vec<TopList>;
    fn fetch_top_list_detail(&self, id: &str, source: &str) -> Vec<Track>;
}

/// HTTP client for the aggregation API backed by `ureq`.
pub struct HttpMusicApi {
    agent: ureq::Agent,
    probe_agent: ureq::Agent,
    base: String,
}

impl HttpMusicApi {
    pub fn new(base: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(15))
            .build();
        let probe_agent = ureq::AgentBuilder::new()
            .timeout(PROBE_TIMEOUT)
            .build();
        Self {
            agent,
            probe_agent,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn api_url(&self, endpoint: &str, params: &[(&str, &str)]) -> String {
        let query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect();
        if query.is_empty() {
            format!("{}{endpoint}", self.base)
        } else {
            format!("{}{endpoint}?{}", self.base, query.join("&"))
        }
    }

    /// GET an endpoint and unwrap the `{ code: 0, data: ... }` envelope.
    fn request_data(&self, endpoint: &str, params: &[(&str, &str)]) -> Option<Value> {
        let url = self.api_url(endpoint, params);
        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(err) => {
                warn!("request failed for {endpoint}: {err}");
                return None;
            }
        };
        let parsed: Value = match response.into_json() {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("malformed response from {endpoint}: {err}");
                return None;
            }
        };
        if parsed.get("code").and_then(Value::as_i64) != Some(0) {
            return None;
        }
        parsed.get("data").cloned()
    }

    /// Round-trip time to the API, used purely as a liveness probe. The
    /// short timeout is deliberate: an unreachable service is reported,
    /// never waited on.
    pub fn check_latency(&self) -> Option<Duration> {
        let start = Instant::now();
        let url = self.api_url("/api/top", &[]);
        self.probe_agent.get(&url).call().ok()?;
        Some(start.elapsed())
    }
}

impl MusicApi for HttpMusicApi {
    fn resolve_play_url(&self, id: &str, _source: &str, quality: AudioQuality) -> Option<String> {
        let data = self.request_data(
            "/api/song/url",
            &[("mid", id), ("quality", quality.wire_param())],
        )?;
        data.get("data")
            .and_then(|map| map.get(id))
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(ToOwned::to_owned)
    }

    fn fetch_track_info(&self, id: &str, _source: &str) -> Option<TrackInfo> {
        let data = self.request_data("/api/song/detail", &[("mid", id)])?;
        let track = data.get("track_info").unwrap_or(&data);
        let pic = track
            .get("album")
            .and_then(|album| album.get("mid"))
            .and_then(Value::as_str)
            .map(|mid| cover_url(mid, 300));
        Some(TrackInfo {
            pic,
            url: None,
            lrc: None,
        })
    }

    fn fetch_lyrics(&self, id: &str, _source: &str) -> String {
        self.request_data("/api/lyric", &[("mid", id)])
            .and_then(|data| {
                data.get("lyric")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned)
            })
            .unwrap_or_default()
    }

    fn search(&self, keyword: &str, _source: &str, page: u32) -> Vec<Track> {
        let page = page.to_string();
        let Some(data) = self.request_data(
            "/api/search",
            &[
                ("keyword", keyword),
                ("type", "song"),
                ("num", "60"),
                ("page", &page),
            ],
        ) else {
            return Vec::new();
        };
        parse_song_array(data.get("list"))
    }

    fn fetch_playlist(&self, external_id: &str, _source: &str) -> Option<FetchedPlaylist> {
        let data = self.request_data("/api/playlist", &[("id", external_id)])?;
        let name = data
            .get("dirinfo")
            .and_then(|info| {
                info.get("title")
                    .or_else(|| info.get("name"))
                    .and_then(Value::as_str)
            })
            .unwrap_or("Imported Playlist")
            .to_string();
        Some(FetchedPlaylist {
            name,
            songs: parse_song_array(data.get("songlist")),
        })
    }

    fn fetch_top_lists(&self, _source: &str) -> Vec<TopList> {
        let Some(data) = self.request_data("/api/top", &[]) else {
            return Vec::new();
        };
        parse_top_lists(&data)
    }

    fn fetch_top_list_detail(&self, id: &str, _source: &str) -> Vec<Track> {
        let Some(data) = self.request_data("/api/top", &[("id", id), ("num", "100")]) else {
            return Vec::new();
        };
        parse_song_array(data.get("songInfoList").or_else(|| data.get("songlist")))
    }
}

/// Cover art straight from the CDN, keyed by album mid.
pub fn cover_url(album_mid: &str, size: u32) -> String {
    format!("{COVER_CDN}/T002R{size}x{size}M000{album_mid}.jpg")
}

fn string_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Parses one song object, tolerating the field-name drift between the
/// search, playlist and toplist payload shapes.
pub fn parse_song(item: &Value) -> Option<Track> {
    let id = string_field(item.get("mid"))
        .or_else(|| string_field(item.get("songmid")))
        .or_else(|| string_field(item.get("id")))?;

    let name = string_field(item.get("name"))
        .or_else(|| string_field(item.get("title")))
        .or_else(|| string_field(item.get("songname")))
        .unwrap_or_default();

    let singers = match item.get("singer") {
        Some(Value::Array(singers)) => singers
            .iter()
            .filter_map(|singer| {
                string_field(singer.get("name")).or_else(|| string_field(singer.get("title")))
            })
            .collect::<Vec<_>>()
            .join("/"),
        _ => String::new(),
    };
    let artist = if singers.is_empty() {
        String::from("Unknown")
    } else {
        singers
    };

    let album = item
        .get("album")
        .and_then(|album| {
            string_field(album.get("name")).or_else(|| string_field(album.get("title")))
        })
        .or_else(|| string_field(item.get("albumname")))
        .unwrap_or_default();

    let album_mid = item.get("album").and_then(|album| {
        string_field(album.get("mid")).or_else(|| string_field(album.get("pmid")))
    });

    Some(Track {
        id,
        name,
        artist,
        album,
        source: String::from("qq"),
        pic: album_mid
            .filter(|mid| !mid.is_empty())
            .map(|mid| cover_url(&mid, 300)),
        url: None,
        lrc: None,
        duration: item.get("interval").and_then(Value::as_f64),
        types: Vec::new(),
    })
}

fn parse_song_array(value: Option<&Value>) -> Vec<Track> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(parse_song).collect(),
        _ => Vec::new(),
    }
}

/// Toplists arrive grouped; flatten every group into one list.
pub fn parse_top_lists(data: &Value) -> Vec<TopList> {
    let mut out = Vec::new();
    let Some(Value::Array(groups)) = data.get("group") else {
        return out;
    };
    for group in groups {
        let Some(Value::Array(lists)) = group.get("toplist") else {
            continue;
        };
        for item in lists {
            let Some(id) =
                string_field(item.get("topId")).or_else(|| string_field(item.get("id")))
            else {
                continue;
            };
            let Some(name) =
                string_field(item.get("title")).or_else(|| string_field(item.get("name")))
            else {
                continue;
            };
            out.push(TopList {
                id,
                name,
                update_frequency: string_field(item.get("updateTime")).unwrap_or_default(),
            });
        }
    }
    out
}

/// Resolves nothing. Used for offline mode and fuzzing.
pub struct NullApi;

impl MusicApi for NullApi {
    fn resolve_play_url(&self, _id: &str, _source: &str, _quality: AudioQuality) -> Option<String> {
        None
    }

    fn fetch_track_info(&self, _id: &str, _source: &str) -> Option<TrackInfo> {
        None
    }

    fn fetch_lyrics(&self, _id: &str, _source: &str) -> String {
        String::new()
    }

    fn search(&self, _keyword: &str, _source: &str, _page: u32) -> Vec<Track> {
        Vec::new()
    }

    fn fetch_playlist(&self, _external_id: &str, _source: &str) -> Option<FetchedPlaylist> {
        None
    }

    fn fetch_top_lists(&self, _source: &str) -> Vec<TopList> {
        Vec::new()
    }

    fn fetch_top_list_detail(&self, _id: &str, _source: &str) -> Vec<Track> {
        Vec::new()
    }
}
