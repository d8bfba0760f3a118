use crate::api::{MusicApi, TrackInfo};
use crate::audio::{AudioSink, SinkError};
use crate::media::{MediaBridge, MediaCommand};
use crate::model::{AudioQuality, PlayMode, Track};
use crate::store::{Store, keys};
use log::{error, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::Duration;

/// One in-flight resolution attempt. Carrying the quality and attempt
/// count per attempt (instead of a shared counter) means a fallback can
/// never loop and a stale attempt can never advance a newer one.
#[derive(Debug, Clone)]
struct PendingResolve {
    key: String,
    quality: AudioQuality,
    attempt: u8,
    resume_at: Option<Duration>,
}

/// Results delivered by resolver threads. Application is race-guarded:
/// whatever arrives is checked against the live current track first.
enum EngineEvent {
    Resolved {
        key: String,
        quality: AudioQuality,
        attempt: u8,
        url: Option<String>,
    },
    InfoFetched {
        key: String,
        info: TrackInfo,
    },
}

/// The playback engine. Owns the one audio sink, the play queue and the
/// session state; every operation funnels through this struct.
pub struct Player {
    queue: Vec<Track>,
    current: Option<Track>,
    is_playing: bool,
    is_loading: bool,
    play_mode: PlayMode,
    quality: AudioQuality,
    pending: Option<PendingResolve>,
    sink: Box<dyn AudioSink>,
    api: Arc<dyn MusicApi>,
    store: Store,
    media: Option<MediaBridge>,
    events_tx: Sender<EngineEvent>,
    events_rx: Receiver<EngineEvent>,
    rng: SmallRng,
}

impl Player {
    /// Restores queue, current song, play mode and quality from the store
    /// before any interaction; everything else starts fresh.
    pub fn new(
        sink: Box<dyn AudioSink>,
        api: Arc<dyn MusicApi>,
        store: Store,
        media: Option<MediaBridge>,
    ) -> Self {
        let queue = store.get(keys::QUEUE, Vec::new());
        let current = store.get(keys::CURRENT_SONG, None);
        let play_mode = store.get(keys::PLAY_MODE, PlayMode::default());
        let quality = store.get(keys::AUDIO_QUALITY, AudioQuality::default());
        let (events_tx, events_rx) = channel();

        Self {
            queue,
            current,
            is_playing: false,
            is_loading: false,
            play_mode,
            quality,
            pending: None,
            sink,
            api,
            store,
            media,
            events_tx,
            events_rx,
            rng: SmallRng::from_os_rng(),
        }
    }

    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn play_mode(&self) -> PlayMode {
        self.play_mode
    }

    pub fn quality(&self) -> AudioQuality {
        self.quality
    }

    pub fn position(&self) -> Duration {
        self.sink.position().unwrap_or(Duration::ZERO)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.sink.duration()
    }

    pub fn volume(&self) -> f32 {
        self.sink.volume()
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume);
    }

    /// True when the sink ran off the end of the current track; the app
    /// loop answers with `play_next(false)`.
    pub fn sink_finished(&self) -> bool {
        self.sink.is_finished()
    }

    /// Starts (or toggles) playback of a track.
    ///
    /// Re-clicking the already-loaded current track with no quality
    /// override degrades to `toggle_play` so no redundant resolution is
    /// fired. Otherwise the track becomes current immediately, is added
    /// to the queue if absent, and URL resolution starts in the
    /// background.
    pub fn play_song(&mut self, track: Track, force_quality: Option<AudioQuality>) {
        let same_as_current = self
            .current
            .as_ref()
            .is_some_and(|current| current.same_song(&track));
        if same_as_current && force_quality.is_none() && self.sink.current_url().is_some() {
            self.toggle_play();
            return;
        }

        let quality = force_quality.unwrap_or(self.quality);
        // Position survives only a quality switch of the same track.
        let resume_at = if same_as_current && force_quality.is_some() {
            self.sink.position()
        } else {
            None
        };

        self.current = Some(track.clone());
        if !self.queue.iter().any(|entry| entry.same_song(&track)) {
            self.queue.push(track.clone());
            self.persist_queue();
        }
        self.persist_current();
        self.publish_media_metadata();

        if track.pic.is_none() {
            self.spawn_info_fetch(&track);
        }
        self.start_resolve(&track, quality, 0, resume_at);
    }

    fn start_resolve(
        &mut self,
        track: &Track,
        quality: AudioQuality,
        attempt: u8,
        resume_at: Option<Duration>,
    ) {
        let key = track.key();
        self.pending = Some(PendingResolve {
            key: key.clone(),
            quality,
            attempt,
            resume_at,
        });
        self.is_loading = true;

        let api = Arc::clone(&self.api);
        let tx = self.events_tx.clone();
        let id = track.id.clone();
        let source = track.source.clone();
        thread::spawn(move || {
            let url = api.resolve_play_url(&id, &source, quality);
            let _ = tx.send(EngineEvent::Resolved {
                key,
                quality,
                attempt,
                url,
            });
        });
    }

    /// Opportunistic cover-art enrichment; never blocks playback.
    fn spawn_info_fetch(&self, track: &Track) {
        let api = Arc::clone(&self.api);
        let tx = self.events_tx.clone();
        let key = track.key();
        let id = track.id.clone();
        let source = track.source.clone();
        thread::spawn(move || {
            if let Some(info) = api.fetch_track_info(&id, &source) {
                let _ = tx.send(EngineEvent::InfoFetched { key, info });
            }
        });
    }

    /// Applies buffered resolver results. Called from the app loop tick.
    pub fn pump(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                EngineEvent::Resolved {
                    key,
                    quality,
                    attempt,
                    url,
                } => self.apply_resolved(key, quality, attempt, url),
                EngineEvent::InfoFetched { key, info } => self.apply_track_info(key, info),
            }
        }
    }

    fn apply_resolved(
        &mut self,
        key: String,
        quality: AudioQuality,
        attempt: u8,
        url: Option<String>,
    ) {
        // Race guard: only the live pending attempt for the live current
        // track may touch the sink. Anything else lost to a newer
        // selection and is dropped without a trace.
        let current_matches = self
            .current
            .as_ref()
            .is_some_and(|current| current.key() == key);
        let pending_matches = self.pending.as_ref().is_some_and(|pending| {
            pending.key == key && pending.attempt == attempt && pending.quality == quality
        });
        if !current_matches || !pending_matches {
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };

        let Some(url) = url else {
            self.handle_failed_attempt(pending);
            return;
        };

        match self.sink.play_url(&url) {
            Ok(()) => {
                if let Some(resume_at) = pending.resume_at
                    && let Err(err) = self.sink.seek_to(resume_at)
                {
                    warn!("could not restore position after quality switch: {err:#}");
                }
                self.is_loading = false;
                self.is_playing = true;
                self.set_current_url(url);
                self.publish_media_metadata();
                self.publish_media_playback();
            }
            Err(SinkError::Unsupported(msg)) => {
                warn!(
                    "source not playable at {}: {msg}",
                    pending.quality.label()
                );
                self.handle_failed_attempt(pending);
            }
            Err(SinkError::OutputUnavailable(msg)) => {
                // Track stays loaded and paused; a later explicit gesture
                // can start it.
                warn!("playback start blocked: {msg}");
                self.is_loading = false;
                self.is_playing = false;
                self.publish_media_playback();
            }
            Err(SinkError::Other(msg)) => {
                error!("playback failed: {msg}");
                self.is_loading = false;
                self.is_playing = false;
                self.publish_media_playback();
            }
        }
    }

    /// One automatic downgrade to the lowest tier, then give up quietly.
    fn handle_failed_attempt(&mut self, pending: PendingResolve) {
        if pending.attempt == 0
            && !pending.quality.is_lowest()
            && let Some(track) = self.current.clone()
            && track.key() == pending.key
        {
            warn!(
                "no playable stream at {}, retrying {} at {}",
                pending.quality.label(),
                track.name,
                AudioQuality::LOWEST.label()
            );
            self.start_resolve(&track, AudioQuality::LOWEST, 1, pending.resume_at);
            return;
        }

        self.is_loading = false;
        self.is_playing = false;
        self.publish_media_playback();
    }

    /// Tracks are value objects: a resolved URL produces an updated value
    /// in both the current slot and the matching queue entry.
    fn set_current_url(&mut self, url: String) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        current.url = Some(url.clone());
        let key = current.key();
        if let Some(entry) = self.queue.iter_mut().find(|entry| entry.key() == key) {
            entry.url = Some(url);
        }
        self.persist_current();
        self.persist_queue();
    }

    fn apply_track_info(&mut self, key: String, info: TrackInfo) {
        let Some(pic) = info.pic else {
            return;
        };

        let mut touched_current = false;
        if let Some(current) = self.current.as_mut()
            && current.key() == key
        {
            current.pic = Some(pic.clone());
            touched_current = true;
        }
        if touched_current {
            self.persist_current();
            self.publish_media_metadata();
        }

        if let Some(entry) = self.queue.iter_mut().find(|entry| entry.key() == key) {
            entry.pic = Some(pic);
            self.persist_queue();
        }
    }

    pub fn toggle_play(&mut self) {
        let Some(current) = self.current.clone() else {
            return;
        };
        // State restored from disk has a current song but nothing loaded
        // into the sink yet; a toggle then means "start it".
        if self.sink.current_url().is_none() {
            self.play_song(current, None);
            return;
        }

        if self.is_playing {
            self.sink.pause();
            self.is_playing = false;
        } else {
            self.sink.resume();
            self.is_playing = true;
        }
        self.publish_media_playback();
    }

    pub fn seek(&mut self, position: Duration) {
        let clamped = match self.sink.duration() {
            Some(total) => position.min(total),
            None => position,
        };
        if let Err(err) = self.sink.seek_to(clamped) {
            warn!("seek failed: {err:#}");
            return;
        }
        self.publish_media_position();
    }

    /// Advances playback. `force` distinguishes an explicit skip from the
    /// natural end of a track: in loop mode the natural end restarts the
    /// current track instead of advancing.
    pub fn play_next(&mut self, force: bool) {
        if self.queue.is_empty() || self.current.is_none() {
            return;
        }

        if !force && self.play_mode == PlayMode::Loop {
            match self.sink.seek_to(Duration::ZERO) {
                Ok(()) => {
                    self.sink.resume();
                    self.is_playing = true;
                    self.publish_media_playback();
                }
                Err(err) => warn!("loop restart failed: {err:#}"),
            }
            return;
        }

        let len = self.queue.len();
        let current_index = self.current_queue_index();
        let next_index = if self.play_mode == PlayMode::Shuffle {
            self.random_other_index(current_index)
        } else {
            match current_index {
                Some(idx) => (idx + 1) % len,
                None => 0,
            }
        };
        let track = self.queue[next_index].clone();
        self.play_song(track, None);
    }

    pub fn play_prev(&mut self) {
        if self.queue.is_empty() || self.current.is_none() {
            return;
        }

        let len = self.queue.len();
        let prev_index = if self.play_mode == PlayMode::Shuffle {
            // No history stack: previous in shuffle is an independent pick.
            self.rng.random_range(0..len)
        } else {
            match self.current_queue_index() {
                Some(idx) => (idx + len - 1) % len,
                None => 0,
            }
        };
        let track = self.queue[prev_index].clone();
        self.play_song(track, None);
    }

    fn current_queue_index(&self) -> Option<usize> {
        let key = self.current.as_ref()?.key();
        self.queue.iter().position(|entry| entry.key() == key)
    }

    /// Uniform pick that never lands on the current index when there is
    /// more than one entry to choose from.
    fn random_other_index(&mut self, current: Option<usize>) -> usize {
        let len = self.queue.len();
        let mut idx = self.rng.random_range(0..len);
        if len > 1 {
            while Some(idx) == current {
                idx = self.rng.random_range(0..len);
            }
        }
        idx
    }

    pub fn toggle_play_mode(&mut self) {
        self.play_mode = self.play_mode.next();
        self.store.set_best_effort(keys::PLAY_MODE, &self.play_mode);
    }

    pub fn add_to_queue(&mut self, track: Track) {
        if self.queue.iter().any(|entry| entry.same_song(&track)) {
            return;
        }
        self.queue.push(track);
        self.persist_queue();
    }

    pub fn remove_from_queue(&mut self, key: &str) {
        let before = self.queue.len();
        self.queue.retain(|entry| entry.key() != key);
        if self.queue.len() != before {
            self.persist_queue();
        }
    }

    /// Empties the queue without stopping whatever is playing.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.persist_queue();
    }

    /// Back to idle: sink silenced, current slot cleared.
    pub fn stop(&mut self) {
        self.sink.stop();
        self.pending = None;
        self.is_playing = false;
        self.is_loading = false;
        self.current = None;
        self.persist_current();
        self.publish_media_metadata();
        self.publish_media_playback();
    }

    /// Persists the new default and live-switches the current track,
    /// keeping its position.
    pub fn set_audio_quality(&mut self, quality: AudioQuality) {
        self.quality = quality;
        self.store.set_best_effort(keys::AUDIO_QUALITY, &quality);
        if self.sink.current_url().is_some()
            && let Some(current) = self.current.clone()
        {
            self.play_song(current, Some(quality));
        }
    }

    /// Routes buffered OS transport events onto the current operations.
    pub fn handle_media_commands(&mut self) {
        let commands = match self.media.as_mut() {
            Some(bridge) => bridge.drain_commands(),
            None => return,
        };
        for command in commands {
            match command {
                MediaCommand::Toggle => self.toggle_play(),
                MediaCommand::Next => self.play_next(true),
                MediaCommand::Previous => self.play_prev(),
                MediaCommand::SeekTo(position) => self.seek(position),
            }
        }
    }

    fn publish_media_metadata(&mut self) {
        let duration = self.sink.duration();
        let Some(bridge) = self.media.as_mut() else {
            return;
        };
        bridge.publish_metadata(self.current.as_ref(), duration);
    }

    fn publish_media_playback(&mut self) {
        let has_track = self.current.is_some();
        let is_playing = self.is_playing;
        let position = self.sink.position().unwrap_or(Duration::ZERO);
        let Some(bridge) = self.media.as_mut() else {
            return;
        };
        bridge.publish_playback(has_track, is_playing, position);
    }

    /// Position/duration push for the external scrubber; the app loop
    /// calls this every tick while something is loaded.
    pub fn publish_media_position(&mut self) {
        let elapsed = self.sink.position().unwrap_or(Duration::ZERO);
        let total = self.sink.duration();
        let Some(bridge) = self.media.as_mut() else {
            return;
        };
        bridge.publish_position(elapsed, total);
    }

    fn persist_queue(&self) {
        self.store.set_best_effort(keys::QUEUE, &self.queue);
    }

    fn persist_current(&self) {
        self.store.set_best_effort(keys::CURRENT_SONG, &self.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FetchedPlaylist, NullApi, TopList};
    use crate::audio::NullSink;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Instant;
    use tempfile::tempdir;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("song {id}"),
            artist: String::from("artist"),
            album: String::from("album"),
            source: String::from("qq"),
            pic: Some(String::from("https://cdn.example/cover.jpg")),
            url: None,
            lrc: None,
            duration: None,
            types: Vec::new(),
        }
    }

    /// Scripted remote service: URLs keyed by `<track key>@<quality>`,
    /// optional per-track response delay, and a call log.
    #[derive(Default)]
    struct FakeApi {
        urls: Mutex<HashMap<String, String>>,
        delays_ms: Mutex<HashMap<String, u64>>,
        calls: Mutex<Vec<(String, &'static str)>>,
        info_pic: Mutex<HashMap<String, String>>,
    }

    impl FakeApi {
        fn with_url(self, key: &str, quality: AudioQuality, url: &str) -> Self {
            self.urls
                .lock()
                .unwrap()
                .insert(format!("{key}@{}", quality.label()), url.to_string());
            self
        }

        fn with_delay(self, key: &str, delay_ms: u64) -> Self {
            self.delays_ms
                .lock()
                .unwrap()
                .insert(key.to_string(), delay_ms);
            self
        }

        fn resolve_calls(&self) -> Vec<(String, &'static str)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MusicApi for FakeApi {
        fn resolve_play_url(&self, id: &str, source: &str, quality: AudioQuality) -> Option<String> {
            let key = format!("{source}:{id}");
            let delay = self.delays_ms.lock().unwrap().get(&key).copied();
            if let Some(delay) = delay {
                thread::sleep(Duration::from_millis(delay));
            }
            self.calls.lock().unwrap().push((key.clone(), quality.label()));
            self.urls
                .lock()
                .unwrap()
                .get(&format!("{key}@{}", quality.label()))
                .cloned()
        }

        fn fetch_track_info(&self, id: &str, source: &str) -> Option<TrackInfo> {
            let key = format!("{source}:{id}");
            let pic = self.info_pic.lock().unwrap().get(&key).cloned()?;
            Some(TrackInfo {
                pic: Some(pic),
                url: None,
                lrc: None,
            })
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

    /// Sink whose first play attempts fail with scripted errors before it
    /// behaves like a normal clock sink.
    struct FlakySink {
        failures: VecDeque<SinkError>,
        inner: NullSink,
    }

    impl FlakySink {
        fn failing_with(failures: Vec<SinkError>) -> Self {
            Self {
                failures: failures.into(),
                inner: NullSink::new(),
            }
        }
    }

    impl AudioSink for FlakySink {
        fn play_url(&mut self, url: &str) -> Result<(), SinkError> {
            if let Some(err) = self.failures.pop_front() {
                return Err(err);
            }
            self.inner.play_url(url)
        }

        fn pause(&mut self) {
            self.inner.pause();
        }

        fn resume(&mut self) {
            self.inner.resume();
        }

        fn stop(&mut self) {
            self.inner.stop();
        }

        fn is_paused(&self) -> bool {
            self.inner.is_paused()
        }

        fn current_url(&self) -> Option<&str> {
            self.inner.current_url()
        }

        fn position(&self) -> Option<Duration> {
            self.inner.position()
        }

        fn duration(&self) -> Option<Duration> {
            self.inner.duration()
        }

        fn seek_to(&mut self, position: Duration) -> anyhow::Result<()> {
            self.inner.seek_to(position)
        }

        fn volume(&self) -> f32 {
            self.inner.volume()
        }

        fn set_volume(&mut self, volume: f32) {
            self.inner.set_volume(volume);
        }

        fn is_finished(&self) -> bool {
            self.inner.is_finished()
        }
    }

    fn player_with(api: Arc<dyn MusicApi>, dir: &std::path::Path) -> Player {
        player_with_sink(api, Box::new(NullSink::new()), dir)
    }

    fn player_with_sink(
        api: Arc<dyn MusicApi>,
        sink: Box<dyn AudioSink>,
        dir: &std::path::Path,
    ) -> Player {
        Player::new(sink, api, Store::at(dir.to_path_buf()), None)
    }

    fn pump_until(player: &mut Player, mut done: impl FnMut(&Player) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            player.pump();
            if done(player) {
                return;
            }
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn undecodable_stream_falls_back_to_the_lowest_tier() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(
            FakeApi::default()
                .with_url("qq:a", AudioQuality::Br320, "https://cdn.example/a-320")
                .with_url("qq:a", AudioQuality::Br128, "https://cdn.example/a-128"),
        );
        let sink = FlakySink::failing_with(vec![SinkError::Unsupported(String::from(
            "bad codec",
        ))]);
        let mut player = player_with_sink(api.clone(), Box::new(sink), dir.path());

        player.play_song(track("a"), None);
        pump_until(&mut player, |player| player.is_playing());

        let qualities: Vec<&str> = api.resolve_calls().iter().map(|(_, q)| *q).collect();
        assert_eq!(qualities, vec!["320k", "128k"]);
        assert_eq!(
            player.current().expect("current").url.as_deref(),
            Some("https://cdn.example/a-128")
        );
    }

    #[test]
    fn undecodable_fallback_attempt_gives_up_quietly() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(
            FakeApi::default()
                .with_url("qq:a", AudioQuality::Br320, "https://cdn.example/a-320")
                .with_url("qq:a", AudioQuality::Br128, "https://cdn.example/a-128"),
        );
        let sink = FlakySink::failing_with(vec![
            SinkError::Unsupported(String::from("bad codec")),
            SinkError::Unsupported(String::from("still bad")),
        ]);
        let mut player = player_with_sink(api.clone(), Box::new(sink), dir.path());

        player.play_song(track("a"), None);
        pump_until(&mut player, |player| !player.is_loading());

        assert!(!player.is_playing());
        assert_eq!(player.current().expect("current").id, "a");
        assert_eq!(api.resolve_calls().len(), 2);

        thread::sleep(Duration::from_millis(50));
        player.pump();
        assert_eq!(api.resolve_calls().len(), 2, "exactly one downgrade, ever");
    }

    #[test]
    fn unavailable_output_leaves_the_track_loaded_and_paused() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(FakeApi::default().with_url(
            "qq:a",
            AudioQuality::Br320,
            "https://cdn.example/a-320",
        ));
        let sink = FlakySink::failing_with(vec![SinkError::OutputUnavailable(String::from(
            "no device",
        ))]);
        let mut player = player_with_sink(api.clone(), Box::new(sink), dir.path());

        player.play_song(track("a"), None);
        pump_until(&mut player, |player| !player.is_loading());

        assert!(!player.is_playing());
        assert_eq!(player.current().expect("current").id, "a");
        assert_eq!(
            api.resolve_calls().len(),
            1,
            "a missing output device is no reason to downgrade quality"
        );

        // The next explicit gesture starts it once the device is back.
        player.toggle_play();
        pump_until(&mut player, |player| player.is_playing());
        assert_eq!(api.resolve_calls().len(), 2);
    }

    #[test]
    fn unclassified_start_failure_clears_flags_and_keeps_current() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(FakeApi::default().with_url(
            "qq:a",
            AudioQuality::Br320,
            "https://cdn.example/a-320",
        ));
        let sink = FlakySink::failing_with(vec![SinkError::Other(String::from("disk full"))]);
        let mut player = player_with_sink(api.clone(), Box::new(sink), dir.path());

        player.play_song(track("a"), None);
        pump_until(&mut player, |player| !player.is_loading());

        assert!(!player.is_playing());
        assert_eq!(player.current().expect("current").id, "a");
        assert_eq!(api.resolve_calls().len(), 1, "no downgrade for plain failures");
    }

    #[test]
    fn queue_never_holds_the_same_song_twice() {
        let dir = tempdir().expect("tempdir");
        let mut player = player_with(Arc::new(NullApi), dir.path());

        player.add_to_queue(track("a"));
        player.add_to_queue(track("a"));
        player.play_song(track("a"), None);
        player.play_song(track("b"), None);
        player.add_to_queue(track("b"));

        let keys: Vec<String> = player.queue().iter().map(Track::key).collect();
        assert_eq!(keys, vec![String::from("qq:a"), String::from("qq:b")]);
    }

    #[test]
    fn sequence_mode_wraps_both_directions() {
        let dir = tempdir().expect("tempdir");
        let mut player = player_with(Arc::new(NullApi), dir.path());
        player.queue = vec![track("a"), track("b"), track("c")];
        player.current = Some(track("c"));

        player.play_next(true);
        assert_eq!(player.current().expect("current").id, "a");

        player.current = Some(track("a"));
        player.play_prev();
        assert_eq!(player.current().expect("current").id, "c");
    }

    #[test]
    fn single_entry_queue_reselects_itself() {
        let dir = tempdir().expect("tempdir");
        let mut player = player_with(Arc::new(NullApi), dir.path());
        player.queue = vec![track("a")];
        player.current = Some(track("a"));

        player.play_next(true);
        assert_eq!(player.current().expect("current").id, "a");
        player.play_prev();
        assert_eq!(player.current().expect("current").id, "a");
    }

    #[test]
    fn loop_mode_restarts_on_natural_end_without_advancing() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(FakeApi::default().with_url(
            "qq:a",
            AudioQuality::Br320,
            "https://cdn.example/a",
        ));
        let mut player = player_with(api.clone(), dir.path());
        player.queue = vec![track("a"), track("b")];
        player.play_mode = PlayMode::Loop;

        player.play_song(track("a"), None);
        pump_until(&mut player, |player| player.is_playing());
        let calls_before = api.resolve_calls().len();

        player.play_next(false);
        assert_eq!(player.current().expect("current").id, "a");
        assert!(player.is_playing());
        assert!(player.position() < Duration::from_secs(1));
        assert_eq!(
            api.resolve_calls().len(),
            calls_before,
            "a loop restart must not re-resolve"
        );
    }

    #[test]
    fn loop_mode_advances_on_explicit_skip() {
        let dir = tempdir().expect("tempdir");
        let mut player = player_with(Arc::new(NullApi), dir.path());
        player.queue = vec![track("a"), track("b")];
        player.current = Some(track("a"));
        player.play_mode = PlayMode::Loop;

        player.play_next(true);
        assert_eq!(player.current().expect("current").id, "b");
    }

    #[test]
    fn shuffle_never_repeats_the_current_index() {
        let dir = tempdir().expect("tempdir");
        let mut player = player_with(Arc::new(NullApi), dir.path());
        player.queue = (0..5).map(|n| track(&n.to_string())).collect();

        for _ in 0..200 {
            assert_ne!(player.random_other_index(Some(2)), 2);
        }
    }

    #[test]
    fn shuffle_next_switches_track_every_step() {
        let dir = tempdir().expect("tempdir");
        let mut player = player_with(Arc::new(NullApi), dir.path());
        player.queue = (0..4).map(|n| track(&n.to_string())).collect();
        player.current = Some(player.queue[0].clone());
        player.play_mode = PlayMode::Shuffle;

        for _ in 0..50 {
            let before = player.current().expect("current").key();
            player.play_next(true);
            let after = player.current().expect("current").key();
            assert_ne!(before, after);
        }
    }

    #[test]
    fn resolution_failure_falls_back_to_lowest_tier_once() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(FakeApi::default().with_url(
            "qq:a",
            AudioQuality::Br128,
            "https://cdn.example/a-128",
        ));
        let mut player = player_with(api.clone(), dir.path());

        player.play_song(track("a"), None);
        pump_until(&mut player, |player| player.is_playing());

        assert_eq!(
            api.resolve_calls(),
            vec![
                (String::from("qq:a"), "320k"),
                (String::from("qq:a"), "128k")
            ]
        );
        assert_eq!(
            player.current().expect("current").url.as_deref(),
            Some("https://cdn.example/a-128")
        );
    }

    #[test]
    fn exhausted_retry_budget_fails_quietly() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(FakeApi::default());
        let mut player = player_with(api.clone(), dir.path());

        player.play_song(track("a"), None);
        pump_until(&mut player, |player| {
            !player.is_loading() && !player.is_playing()
        });

        // Give any runaway retry a chance to show up.
        thread::sleep(Duration::from_millis(30));
        player.pump();
        assert_eq!(api.resolve_calls().len(), 2, "exactly one fallback, ever");
        assert!(player.current().is_some(), "track stays current for retry");
    }

    #[test]
    fn stale_resolution_cannot_overwrite_a_newer_selection() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(
            FakeApi::default()
                .with_url("qq:a", AudioQuality::Br320, "https://cdn.example/a")
                .with_url("qq:b", AudioQuality::Br320, "https://cdn.example/b")
                .with_delay("qq:a", 80),
        );
        let mut player = player_with(api, dir.path());

        player.play_song(track("a"), None);
        player.play_song(track("b"), None);
        pump_until(&mut player, |player| {
            player
                .current()
                .is_some_and(|current| current.url.is_some())
        });
        assert_eq!(player.current().expect("current").id, "b");

        // Let the stale resolution for A arrive, then confirm it changed
        // nothing.
        thread::sleep(Duration::from_millis(120));
        player.pump();
        assert_eq!(player.current().expect("current").id, "b");
        assert_eq!(
            player.sink.current_url(),
            Some("https://cdn.example/b"),
            "stale URL must never reach the sink"
        );
    }

    #[test]
    fn reclicking_the_loaded_track_toggles_instead_of_resolving() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(FakeApi::default().with_url(
            "qq:a",
            AudioQuality::Br320,
            "https://cdn.example/a",
        ));
        let mut player = player_with(api.clone(), dir.path());

        player.play_song(track("a"), None);
        pump_until(&mut player, |player| player.is_playing());
        assert_eq!(api.resolve_calls().len(), 1);

        player.play_song(track("a"), None);
        assert!(!player.is_playing(), "second click pauses");
        player.play_song(track("a"), None);
        assert!(player.is_playing(), "third click resumes");
        assert_eq!(api.resolve_calls().len(), 1, "no new resolution fired");
    }

    #[test]
    fn quality_switch_reloads_in_place_and_keeps_position() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(
            FakeApi::default()
                .with_url("qq:a", AudioQuality::Br320, "https://cdn.example/a-320")
                .with_url("qq:a", AudioQuality::Flac, "https://cdn.example/a-flac"),
        );
        let mut player = player_with(api.clone(), dir.path());

        player.play_song(track("a"), None);
        pump_until(&mut player, |player| player.is_playing());
        player.seek(Duration::from_secs(30));

        player.set_audio_quality(AudioQuality::Flac);
        pump_until(&mut player, |player| {
            player.sink.current_url() == Some("https://cdn.example/a-flac")
        });

        assert_eq!(player.quality(), AudioQuality::Flac);
        assert!(
            player.position() >= Duration::from_secs(30),
            "position should survive the quality switch"
        );
        assert_eq!(
            api.resolve_calls(),
            vec![
                (String::from("qq:a"), "320k"),
                (String::from("qq:a"), "flac")
            ]
        );
    }

    #[test]
    fn background_info_fetch_merges_cover_art_into_current_and_queue() {
        let dir = tempdir().expect("tempdir");
        let api = FakeApi::default().with_url("qq:a", AudioQuality::Br320, "https://cdn.example/a");
        api.info_pic.lock().unwrap().insert(
            String::from("qq:a"),
            String::from("https://cdn.example/art.jpg"),
        );
        let mut player = player_with(Arc::new(api), dir.path());

        let mut bare = track("a");
        bare.pic = None;
        player.play_song(bare, None);
        pump_until(&mut player, |player| {
            player.current().is_some_and(|current| current.pic.is_some())
        });

        assert_eq!(
            player.queue()[0].pic.as_deref(),
            Some("https://cdn.example/art.jpg")
        );
    }

    #[test]
    fn session_state_survives_a_restart() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(FakeApi::default().with_url(
            "qq:a",
            AudioQuality::Br320,
            "https://cdn.example/a",
        ));
        {
            let mut player = player_with(api.clone(), dir.path());
            player.play_song(track("a"), None);
            player.add_to_queue(track("b"));
            player.toggle_play_mode();
            pump_until(&mut player, |player| player.is_playing());
            player.set_audio_quality(AudioQuality::Flac);
        }

        let restored = player_with(api, dir.path());
        let keys: Vec<String> = restored.queue().iter().map(Track::key).collect();
        assert_eq!(keys, vec![String::from("qq:a"), String::from("qq:b")]);
        assert_eq!(restored.current().expect("current").id, "a");
        assert_eq!(restored.play_mode(), PlayMode::Loop);
        assert_eq!(restored.quality(), AudioQuality::Flac);
        assert!(!restored.is_playing(), "playback never auto-starts");
    }

    #[test]
    fn toggle_on_restored_state_starts_resolution() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(FakeApi::default().with_url(
            "qq:a",
            AudioQuality::Br320,
            "https://cdn.example/a",
        ));
        let mut player = player_with(api.clone(), dir.path());
        player.current = Some(track("a"));

        player.toggle_play();
        pump_until(&mut player, |player| player.is_playing());
        assert_eq!(api.resolve_calls().len(), 1);
    }

    #[test]
    fn toggle_without_current_is_a_noop() {
        let dir = tempdir().expect("tempdir");
        let mut player = player_with(Arc::new(NullApi), dir.path());
        player.toggle_play();
        assert!(!player.is_playing());
        assert!(!player.is_loading());
    }

    #[test]
    fn clearing_the_queue_does_not_stop_playback() {
        let dir = tempdir().expect("tempdir");
        let api = Arc::new(FakeApi::default().with_url(
            "qq:a",
            AudioQuality::Br320,
            "https://cdn.example/a",
        ));
        let mut player = player_with(api, dir.path());
        player.play_song(track("a"), None);
        pump_until(&mut player, |player| player.is_playing());

        player.clear_queue();
        assert!(player.queue().is_empty());
        assert!(player.is_playing());
    }

    #[test]
    fn remove_from_queue_filters_by_composite_key() {
        let dir = tempdir().expect("tempdir");
        let mut player = player_with(Arc::new(NullApi), dir.path());
        let mut other_source = track("a");
        other_source.source = String::from("netease");
        player.add_to_queue(track("a"));
        player.add_to_queue(other_source);

        player.remove_from_queue("qq:a");
        assert_eq!(player.queue().len(), 1);
        assert_eq!(player.queue()[0].source, "netease");
    }

    #[test]
    fn empty_queue_navigation_is_a_noop() {
        let dir = tempdir().expect("tempdir");
        let mut player = player_with(Arc::new(NullApi), dir.path());
        player.play_next(true);
        player.play_prev();
        assert!(player.current().is_none());
    }

    proptest::proptest! {
        #[test]
        fn queue_invariants_hold_under_random_ops(ops in proptest::collection::vec(0u8..7, 1..60)) {
            let dir = tempdir().expect("tempdir");
            let mut player = player_with(Arc::new(NullApi), dir.path());
            let pool: Vec<Track> = (0..5).map(|n| track(&n.to_string())).collect();

            for (step, op) in ops.iter().enumerate() {
                let pick = pool[step % pool.len()].clone();
                match op {
                    0 => player.add_to_queue(pick),
                    1 => player.play_song(pick, None),
                    2 => player.play_next(true),
                    3 => player.play_prev(),
                    4 => player.toggle_play_mode(),
                    5 => player.remove_from_queue(&pick.key()),
                    _ => player.clear_queue(),
                }

                let mut seen = std::collections::HashSet::new();
                for entry in player.queue() {
                    proptest::prop_assert!(seen.insert(entry.key()), "duplicate queue entry");
                }
            }
        }
    }
}
