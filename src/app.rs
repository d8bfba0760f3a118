use crate::api::{FetchedPlaylist, HttpMusicApi, MusicApi, NullApi, TopList};
use crate::audio::{AudioSink, NullSink, RodioSink};
use crate::library::Library;
use crate::lyrics::{LyricLine, parse_lrc};
use crate::media::MediaBridge;
use crate::model::{Track, remember_search};
use crate::player::Player;
use crate::store::{Store, StoreError, keys};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use log::warn;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::{Duration, Instant};

const SEEK_STEP: Duration = Duration::from_secs(5);
const EXPORT_FILE: &str = "library-export.json";

#[derive(Debug, Default)]
pub struct AppOptions {
    pub api_base: Option<String>,
    pub offline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Search,
    Queue,
    Library,
    Lyrics,
}

impl Section {
    pub fn next(self) -> Self {
        match self {
            Section::Search => Section::Queue,
            Section::Queue => Section::Library,
            Section::Library => Section::Lyrics,
            Section::Lyrics => Section::Search,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Section::Search => "Search",
            Section::Queue => "Queue",
            Section::Library => "Library",
            Section::Lyrics => "Lyrics",
        }
    }
}

/// What the library pane is currently looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryView {
    Favorites,
    Playlist(String),
}

#[derive(Debug, Clone)]
pub enum LibraryRow {
    Back,
    Favorites(usize),
    Playlist { id: String, name: String, count: usize },
    Song(Track),
}

/// Results produced by worker threads, applied on the app loop tick.
pub enum BackgroundEvent {
    SearchDone {
        keyword: String,
        results: Vec<Track>,
    },
    LyricsDone {
        key: String,
        lines: Vec<LyricLine>,
    },
    TopListsDone(Vec<TopList>),
    TopDetailDone {
        name: String,
        results: Vec<Track>,
    },
    PlaylistFetched(Option<FetchedPlaylist>),
}

pub struct App {
    pub player: Player,
    pub library: Library,
    pub section: Section,
    pub status: String,
    pub dirty: bool,
    pub search_results: Vec<Track>,
    pub search_history: Vec<String>,
    pub search_in_flight: bool,
    pub top_lists: Vec<TopList>,
    pub browsing_top: bool,
    pub selected_search: usize,
    pub selected_queue: usize,
    pub selected_library: usize,
    pub library_view: Option<LibraryView>,
    pub lyric_lines: Vec<LyricLine>,
    lyric_track: Option<String>,
    api: Arc<dyn MusicApi>,
    store: Store,
    background_tx: Sender<BackgroundEvent>,
    background_rx: Receiver<BackgroundEvent>,
    store_errors: Option<Receiver<StoreError>>,
}

impl App {
    pub fn new(player: Player, library: Library, api: Arc<dyn MusicApi>, store: Store) -> Self {
        let search_history = store.get(keys::SEARCH_HISTORY, Vec::new());
        let (background_tx, background_rx) = channel();
        Self {
            player,
            library,
            section: Section::Search,
            status: String::from("Press / to search, Tab to switch panes"),
            dirty: true,
            search_results: Vec::new(),
            search_history,
            search_in_flight: false,
            top_lists: Vec::new(),
            browsing_top: false,
            selected_search: 0,
            selected_queue: 0,
            selected_library: 0,
            library_view: None,
            lyric_lines: Vec::new(),
            lyric_track: None,
            api,
            store,
            background_tx,
            background_rx,
            store_errors: None,
        }
    }

    /// Subscribes the status line to persistence failures. Writes are
    /// best-effort everywhere; this is how the user finds out.
    pub fn watch_store_errors(&mut self, errors: Receiver<StoreError>) {
        self.store_errors = Some(errors);
    }

    /// One loop iteration worth of non-input work: resolver results,
    /// transport commands, auto-advance and lyric refresh.
    pub fn tick(&mut self) {
        self.player.pump();
        self.player.handle_media_commands();
        self.maybe_auto_advance();
        self.refresh_lyrics();
        while let Ok(background) = self.background_rx.try_recv() {
            self.apply_background(background);
        }
        if let Some(errors) = &self.store_errors {
            while let Ok(error) = errors.try_recv() {
                self.status = format!("storage warning: could not save {}", error.key);
                self.dirty = true;
            }
        }
        self.player.publish_media_position();
        self.clamp_selection();
    }

    fn maybe_auto_advance(&mut self) {
        if !self.player.is_playing() || !self.player.sink_finished() {
            return;
        }
        self.player.play_next(false);
        self.dirty = true;
    }

    pub fn start_search(&mut self, keyword: &str) {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            self.status = String::from("Nothing to search for");
            self.dirty = true;
            return;
        }

        remember_search(&mut self.search_history, keyword);
        self.store
            .set_best_effort(keys::SEARCH_HISTORY, &self.search_history);

        self.search_in_flight = true;
        self.status = format!("Searching \"{keyword}\"...");
        self.dirty = true;

        let api = Arc::clone(&self.api);
        let tx = self.background_tx.clone();
        let keyword = keyword.to_string();
        thread::spawn(move || {
            let results = api.search(&keyword, "qq", 1);
            let _ = tx.send(BackgroundEvent::SearchDone { keyword, results });
        });
    }

    /// Switches the search pane to the chart index.
    pub fn browse_top_lists(&mut self) {
        self.section = Section::Search;
        self.search_in_flight = true;
        self.status = String::from("Loading charts...");
        self.dirty = true;

        let api = Arc::clone(&self.api);
        let tx = self.background_tx.clone();
        thread::spawn(move || {
            let lists = api.fetch_top_lists("qq");
            let _ = tx.send(BackgroundEvent::TopListsDone(lists));
        });
    }

    fn open_top_list(&mut self, list: TopList) {
        self.search_in_flight = true;
        self.status = format!("Loading {}...", list.name);
        self.dirty = true;

        let api = Arc::clone(&self.api);
        let tx = self.background_tx.clone();
        thread::spawn(move || {
            let results = api.fetch_top_list_detail(&list.id, "qq");
            let _ = tx.send(BackgroundEvent::TopDetailDone {
                name: list.name,
                results,
            });
        });
    }

    /// Pulls a platform playlist by its external id and saves it as a
    /// local playlist.
    pub fn import_remote_playlist(&mut self, external_id: &str) {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            self.status = String::from("Playlist id required");
            self.dirty = true;
            return;
        }
        self.status = format!("Fetching playlist {external_id}...");
        self.dirty = true;

        let api = Arc::clone(&self.api);
        let tx = self.background_tx.clone();
        let external_id = external_id.to_string();
        thread::spawn(move || {
            let fetched = api.fetch_playlist(&external_id, "qq");
            let _ = tx.send(BackgroundEvent::PlaylistFetched(fetched));
        });
    }

    /// Keeps the lyric pane following the current track; fetch and parse
    /// run off-loop and stale payloads are dropped on arrival.
    fn refresh_lyrics(&mut self) {
        let current_key = self.player.current().map(Track::key);
        if current_key == self.lyric_track {
            return;
        }
        self.lyric_track = current_key.clone();
        self.lyric_lines.clear();
        self.dirty = true;

        let Some(key) = current_key else {
            return;
        };
        let Some(track) = self.player.current().cloned() else {
            return;
        };
        let api = Arc::clone(&self.api);
        let tx = self.background_tx.clone();
        thread::spawn(move || {
            let raw = match &track.lrc {
                Some(embedded) if !embedded.is_empty() => embedded.clone(),
                _ => api.fetch_lyrics(&track.id, &track.source),
            };
            let lines = parse_lrc(&raw);
            let _ = tx.send(BackgroundEvent::LyricsDone { key, lines });
        });
    }

    pub fn apply_background(&mut self, background: BackgroundEvent) {
        match background {
            BackgroundEvent::SearchDone { keyword, results } => {
                self.search_in_flight = false;
                self.status = if results.is_empty() {
                    format!("No results for \"{keyword}\"")
                } else {
                    format!("{} results for \"{keyword}\"", results.len())
                };
                self.search_results = results;
                self.browsing_top = false;
                self.selected_search = 0;
                self.dirty = true;
            }
            BackgroundEvent::LyricsDone { key, lines } => {
                if self.lyric_track.as_deref() == Some(key.as_str()) {
                    self.lyric_lines = lines;
                    self.dirty = true;
                }
            }
            BackgroundEvent::TopListsDone(lists) => {
                self.search_in_flight = false;
                self.status = if lists.is_empty() {
                    String::from("No charts available")
                } else {
                    format!("{} charts", lists.len())
                };
                self.top_lists = lists;
                self.browsing_top = true;
                self.selected_search = 0;
                self.dirty = true;
            }
            BackgroundEvent::TopDetailDone { name, results } => {
                self.search_in_flight = false;
                self.status = format!("{}: {} songs", name, results.len());
                self.search_results = results;
                self.browsing_top = false;
                self.selected_search = 0;
                self.dirty = true;
            }
            BackgroundEvent::PlaylistFetched(fetched) => {
                match fetched {
                    Some(playlist) if !playlist.songs.is_empty() => {
                        let count = playlist.songs.len();
                        self.library.import_playlist(&playlist.name, playlist.songs);
                        self.status = format!("Imported {} ({count} songs)", playlist.name);
                    }
                    _ => self.status = String::from("Playlist not found or empty"),
                }
                self.dirty = true;
            }
        }
    }

    pub fn library_rows(&self) -> Vec<LibraryRow> {
        match &self.library_view {
            None => {
                let mut rows = vec![LibraryRow::Favorites(self.library.favorites().len())];
                rows.extend(self.library.playlists().iter().map(|playlist| {
                    LibraryRow::Playlist {
                        id: playlist.id.clone(),
                        name: playlist.name.clone(),
                        count: playlist.songs.len(),
                    }
                }));
                rows
            }
            Some(LibraryView::Favorites) => {
                let mut rows = vec![LibraryRow::Back];
                rows.extend(
                    self.library
                        .favorites()
                        .iter()
                        .cloned()
                        .map(LibraryRow::Song),
                );
                rows
            }
            Some(LibraryView::Playlist(id)) => {
                let mut rows = vec![LibraryRow::Back];
                if let Some(playlist) = self.library.playlist(id) {
                    rows.extend(playlist.songs.iter().cloned().map(LibraryRow::Song));
                }
                rows
            }
        }
    }

    fn section_len(&self) -> usize {
        match self.section {
            Section::Search if self.browsing_top => self.top_lists.len(),
            Section::Search => self.search_results.len(),
            Section::Queue => self.player.queue().len(),
            Section::Library => self.library_rows().len(),
            Section::Lyrics => 0,
        }
    }

    fn selected_mut(&mut self) -> &mut usize {
        match self.section {
            Section::Search => &mut self.selected_search,
            Section::Queue => &mut self.selected_queue,
            Section::Library | Section::Lyrics => &mut self.selected_library,
        }
    }

    pub fn selected(&self) -> usize {
        match self.section {
            Section::Search => self.selected_search,
            Section::Queue => self.selected_queue,
            Section::Library | Section::Lyrics => self.selected_library,
        }
    }

    pub fn select_next(&mut self) {
        let len = self.section_len();
        if len == 0 {
            return;
        }
        let selected = self.selected_mut();
        *selected = (*selected + 1) % len;
        self.dirty = true;
    }

    pub fn select_prev(&mut self) {
        let len = self.section_len();
        if len == 0 {
            return;
        }
        let selected = self.selected_mut();
        *selected = (*selected + len - 1) % len;
        self.dirty = true;
    }

    fn clamp_selection(&mut self) {
        let len = self.section_len();
        let selected = self.selected_mut();
        if len == 0 {
            *selected = 0;
        } else if *selected >= len {
            *selected = len - 1;
        }
    }

    /// The track the cursor is on, whichever pane owns the cursor.
    pub fn selected_track(&self) -> Option<Track> {
        match self.section {
            Section::Search if self.browsing_top => None,
            Section::Search => self.search_results.get(self.selected_search).cloned(),
            Section::Queue => self.player.queue().get(self.selected_queue).cloned(),
            Section::Library => match self.library_rows().get(self.selected_library) {
                Some(LibraryRow::Song(track)) => Some(track.clone()),
                _ => None,
            },
            Section::Lyrics => self.player.current().cloned(),
        }
    }

    pub fn activate_selected(&mut self) {
        match self.section {
            Section::Search if self.browsing_top => {
                if let Some(list) = self.top_lists.get(self.selected_search).cloned() {
                    self.open_top_list(list);
                }
            }
            Section::Search | Section::Queue | Section::Lyrics => {
                if let Some(track) = self.selected_track() {
                    self.status = format!("Playing {}", track.name);
                    self.player.play_song(track, None);
                    self.dirty = true;
                }
            }
            Section::Library => {
                let row = self.library_rows().get(self.selected_library).cloned();
                match row {
                    Some(LibraryRow::Back) => self.navigate_back(),
                    Some(LibraryRow::Favorites(_)) => {
                        self.library_view = Some(LibraryView::Favorites);
                        self.selected_library = 0;
                        self.dirty = true;
                    }
                    Some(LibraryRow::Playlist { id, .. }) => {
                        self.library_view = Some(LibraryView::Playlist(id));
                        self.selected_library = 0;
                        self.dirty = true;
                    }
                    Some(LibraryRow::Song(track)) => {
                        self.status = format!("Playing {}", track.name);
                        self.player.play_song(track, None);
                        self.dirty = true;
                    }
                    None => {}
                }
            }
        }
    }

    pub fn navigate_back(&mut self) {
        if self.library_view.take().is_some() {
            self.selected_library = 0;
            self.dirty = true;
        }
    }

    pub fn add_selected_to_queue(&mut self) {
        let Some(track) = self.selected_track() else {
            return;
        };
        self.status = format!("Queued {}", track.name);
        self.player.add_to_queue(track);
        self.dirty = true;
    }

    pub fn toggle_selected_favorite(&mut self) {
        let track = self.selected_track().or_else(|| self.player.current().cloned());
        let Some(track) = track else {
            return;
        };
        let added = self.library.toggle_favorite(&track);
        self.status = if added {
            format!("Added {} to favorites", track.name)
        } else {
            format!("Removed {} from favorites", track.name)
        };
        self.dirty = true;
    }

    /// Removes the cursor row from whatever owns it: queue entry,
    /// favorite, or playlist membership.
    pub fn remove_selected(&mut self) {
        match self.section {
            Section::Queue => {
                if let Some(track) = self.selected_track() {
                    self.player.remove_from_queue(&track.key());
                    self.status = format!("Removed {} from queue", track.name);
                    self.dirty = true;
                }
            }
            Section::Library => {
                match self.library_view.clone() {
                    Some(LibraryView::Favorites) => {
                        if let Some(track) = self.selected_track() {
                            self.library.toggle_favorite(&track);
                            self.status = format!("Removed {} from favorites", track.name);
                            self.dirty = true;
                        }
                    }
                    Some(LibraryView::Playlist(id)) => {
                        if let Some(track) = self.selected_track() {
                            self.library.remove_from_playlist(&id, &track.key());
                            self.status = format!("Removed {} from playlist", track.name);
                            self.dirty = true;
                        }
                    }
                    None => {
                        // Top level: the cursor row is a playlist, not a song.
                        if let Some(LibraryRow::Playlist { id, name, .. }) =
                            self.library_rows().get(self.selected_library).cloned()
                            && self.library.delete_playlist(&id)
                        {
                            self.status = format!("Deleted playlist {name}");
                            self.dirty = true;
                        }
                    }
                }
            }
            Section::Search | Section::Lyrics => {}
        }
    }

    /// Queues every song in the open view (or the playlist under the
    /// cursor) and starts from the first one.
    pub fn play_all(&mut self) {
        let songs: Vec<Track> = match &self.library_view {
            Some(LibraryView::Favorites) => self.library.favorites().to_vec(),
            Some(LibraryView::Playlist(id)) => self
                .library
                .playlist(id)
                .map(|playlist| playlist.songs.clone())
                .unwrap_or_default(),
            None => match self.library_rows().get(self.selected_library) {
                Some(LibraryRow::Playlist { id, .. }) => self
                    .library
                    .playlist(id)
                    .map(|playlist| playlist.songs.clone())
                    .unwrap_or_default(),
                Some(LibraryRow::Favorites(_)) => self.library.favorites().to_vec(),
                _ => Vec::new(),
            },
        };

        let Some(first) = songs.first().cloned() else {
            self.status = String::from("Nothing to play");
            self.dirty = true;
            return;
        };
        for song in songs {
            self.player.add_to_queue(song);
        }
        self.status = format!("Playing {}", first.name);
        self.player.play_song(first, None);
        self.dirty = true;
    }

    pub fn create_playlist_from_input(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            self.status = String::from("Playlist needs a name");
            self.dirty = true;
            return;
        }
        self.library.create_playlist(name, Vec::new());
        self.status = format!("Created playlist {name}");
        self.dirty = true;
    }

    pub fn add_selected_to_playlist(&mut self, name: &str) {
        let Some(track) = self.selected_track() else {
            self.status = String::from("No song selected");
            self.dirty = true;
            return;
        };
        let Some(id) = self
            .library
            .playlists()
            .iter()
            .find(|playlist| playlist.name == name)
            .map(|playlist| playlist.id.clone())
        else {
            self.status = format!("No playlist named {name}");
            self.dirty = true;
            return;
        };
        if self.library.add_to_playlist(&id, &track) {
            self.status = format!("Added {} to {name}", track.name);
        } else {
            self.status = format!("{} is already in {name}", track.name);
        }
        self.dirty = true;
    }

    /// Renames the open playlist, or the playlist under the cursor.
    pub fn rename_playlist_from_input(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            self.status = String::from("Playlist needs a name");
            self.dirty = true;
            return;
        }
        let target = match &self.library_view {
            Some(LibraryView::Playlist(id)) => Some(id.clone()),
            _ => match self.library_rows().get(self.selected_library) {
                Some(LibraryRow::Playlist { id, .. }) => Some(id.clone()),
                _ => None,
            },
        };
        let Some(id) = target else {
            self.status = String::from("No playlist selected");
            self.dirty = true;
            return;
        };
        if self.library.rename_playlist(&id, name) {
            self.status = format!("Renamed playlist to {name}");
        } else {
            self.status = String::from("No playlist selected");
        }
        self.dirty = true;
    }

    pub fn cycle_quality(&mut self) {
        let next = self.player.quality().next();
        self.player.set_audio_quality(next);
        self.status = format!("Audio quality: {}", next.label());
        self.dirty = true;
    }

    pub fn export_library(&mut self) {
        let path = self.store.root().join(EXPORT_FILE);
        match self.library.export_to_file(&path) {
            Ok(()) => self.status = format!("Library exported to {}", path.display()),
            Err(err) => self.status = format!("export error: {err:#}"),
        }
        self.dirty = true;
    }

    pub fn import_library(&mut self) {
        let path = self.store.root().join(EXPORT_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                self.status = format!("import error: cannot read {}: {err}", path.display());
                self.dirty = true;
                return;
            }
        };
        match self.library.import_data(&raw) {
            Ok(()) => self.status = String::from("Library imported"),
            Err(err) => self.status = format!("import error: {err:#}"),
        }
        self.dirty = true;
    }

    pub fn adjust_volume(&mut self, delta: f32) {
        let next = (self.player.volume() + delta).clamp(0.0, 2.0);
        self.player.set_volume(next);
        self.status = format!("Volume: {}%", (next * 100.0).round() as u16);
        self.dirty = true;
    }

    pub fn seek_by(&mut self, forward: bool) {
        let position = self.player.position();
        let target = if forward {
            position.saturating_add(SEEK_STEP)
        } else {
            position.saturating_sub(SEEK_STEP)
        };
        self.player.seek(target);
        self.dirty = true;
    }
}

pub fn run(options: AppOptions) -> Result<()> {
    let mut store = Store::open()?;
    let (store_error_tx, store_error_rx) = channel();
    store.set_error_tap(store_error_tx);
    let api: Arc<dyn MusicApi> = if options.offline {
        Arc::new(NullApi)
    } else {
        let http = HttpMusicApi::new(
            options
                .api_base
                .as_deref()
                .unwrap_or(crate::api::DEFAULT_API_BASE),
        );
        match http.check_latency() {
            Some(latency) => log::info!("aggregation API reachable in {latency:?}"),
            None => warn!("aggregation API did not answer the startup probe"),
        }
        Arc::new(http)
    };

    let sink: Box<dyn AudioSink> = match RodioSink::new() {
        Ok(sink) => Box::new(sink),
        Err(err) => {
            warn!("audio output unavailable, running silent: {err:#}");
            Box::new(NullSink::new())
        }
    };
    let media = MediaBridge::new();

    let player = Player::new(sink, Arc::clone(&api), store.clone(), media);
    let library = Library::load(store.clone());
    let mut app = App::new(player, library, api, store);
    app.watch_store_errors(store_error_rx);

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut input_mode: Option<InputMode> = None;
    let mut input_buffer = String::new();
    let mut last_tick = Instant::now();

    let result: Result<()> = loop {
        app.tick();

        if app.dirty || last_tick.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| {
                crate::ui::draw(frame, &app, input_mode.map(|mode| (mode, input_buffer.as_str())))
            })?;
            app.dirty = false;
            last_tick = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if let Some(mode) = input_mode {
            match key.code {
                KeyCode::Esc => {
                    input_mode = None;
                    input_buffer.clear();
                    app.dirty = true;
                }
                KeyCode::Enter => {
                    match mode {
                        InputMode::Search => app.start_search(&input_buffer),
                        InputMode::NewPlaylist => app.create_playlist_from_input(&input_buffer),
                        InputMode::AddToPlaylist => {
                            app.add_selected_to_playlist(input_buffer.trim())
                        }
                        InputMode::ImportPlaylist => app.import_remote_playlist(&input_buffer),
                        InputMode::RenamePlaylist => {
                            app.rename_playlist_from_input(&input_buffer)
                        }
                    }
                    input_mode = None;
                    input_buffer.clear();
                }
                KeyCode::Backspace => {
                    input_buffer.pop();
                    app.dirty = true;
                }
                KeyCode::Char(ch) => {
                    input_buffer.push(ch);
                    app.dirty = true;
                }
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break Ok(()),
            KeyCode::Tab => {
                app.section = app.section.next();
                app.dirty = true;
            }
            KeyCode::Down => app.select_next(),
            KeyCode::Up => app.select_prev(),
            KeyCode::Enter => app.activate_selected(),
            KeyCode::Left if app.section == Section::Library => app.navigate_back(),
            KeyCode::Backspace if app.section == Section::Library => app.navigate_back(),
            KeyCode::Left => app.seek_by(false),
            KeyCode::Right => app.seek_by(true),
            KeyCode::Char(' ') => {
                app.player.toggle_play();
                app.dirty = true;
            }
            KeyCode::Char('n') => {
                app.player.play_next(true);
                app.dirty = true;
            }
            KeyCode::Char('b') => {
                app.player.play_prev();
                app.dirty = true;
            }
            KeyCode::Char('m') => {
                app.player.toggle_play_mode();
                app.status = format!("Play mode: {}", app.player.play_mode().label());
                app.dirty = true;
            }
            KeyCode::Char('q') => app.cycle_quality(),
            KeyCode::Char('t') => app.browse_top_lists(),
            KeyCode::Char('a') => app.add_selected_to_queue(),
            KeyCode::Char('f') => app.toggle_selected_favorite(),
            KeyCode::Char('d') => app.remove_selected(),
            KeyCode::Char('p') => app.play_all(),
            KeyCode::Char('x') => {
                app.player.stop();
                app.status = String::from("Stopped");
                app.dirty = true;
            }
            KeyCode::Char('C') => {
                app.player.clear_queue();
                app.status = String::from("Queue cleared");
                app.dirty = true;
            }
            KeyCode::Char('o') => app.export_library(),
            KeyCode::Char('i') => app.import_library(),
            KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_volume(0.05),
            KeyCode::Char('-') => app.adjust_volume(-0.05),
            KeyCode::Char('/') => {
                input_mode = Some(InputMode::Search);
                input_buffer.clear();
                app.dirty = true;
            }
            KeyCode::Char('N') => {
                input_mode = Some(InputMode::NewPlaylist);
                input_buffer.clear();
                app.dirty = true;
            }
            KeyCode::Char('A') => {
                input_mode = Some(InputMode::AddToPlaylist);
                input_buffer.clear();
                app.dirty = true;
            }
            KeyCode::Char('I') => {
                input_mode = Some(InputMode::ImportPlaylist);
                input_buffer.clear();
                app.dirty = true;
            }
            KeyCode::Char('R') if app.section == Section::Library => {
                input_mode = Some(InputMode::RenamePlaylist);
                input_buffer.clear();
                app.dirty = true;
            }
            _ => {}
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Search,
    NewPlaylist,
    AddToPlaylist,
    ImportPlaylist,
    RenamePlaylist,
}

impl InputMode {
    pub fn prompt(self) -> &'static str {
        match self {
            InputMode::Search => "Search",
            InputMode::NewPlaylist => "New playlist",
            InputMode::AddToPlaylist => "Add to playlist",
            InputMode::ImportPlaylist => "Import playlist id",
            InputMode::RenamePlaylist => "Rename playlist",
        }
    }
}
