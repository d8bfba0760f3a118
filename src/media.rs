//! OS media controls bridge (MPRIS/SMTC/Now Playing) over `souvlaki`.
//!
//! Transport events from the lock-screen surface are mapped to commands
//! the app loop routes onto the player's current operations, so handlers
//! always act on live state instead of captured snapshots.

use crate::model::Track;
use log::warn;
use souvlaki::{
    MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, MediaPosition, PlatformConfig,
    SeekDirection,
};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DISPLAY_NAME: &str = "Airtune";
const DBUS_NAME: &str = "airtune";
const SEEK_STEP: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaCommand {
    Toggle,
    Next,
    Previous,
    SeekTo(Duration),
}

/// Snapshot the event handler maps relative seeks against.
#[derive(Debug, Clone, Copy, Default)]
struct ControlState {
    elapsed: Duration,
    total: Option<Duration>,
}

pub struct MediaBridge {
    controls: MediaControls,
    control_state: Arc<Mutex<ControlState>>,
    commands: Receiver<MediaCommand>,
}

impl MediaBridge {
    /// Attaches to the platform media-control backend. Returns None when
    /// the platform refuses; playback works fine without the surface.
    pub fn new() -> Option<Self> {
        let control_state = Arc::new(Mutex::new(ControlState::default()));
        let (tx, rx) = channel();
        let controls = Self::create_controls(tx, Arc::clone(&control_state))?;
        Some(Self {
            controls,
            control_state,
            commands: rx,
        })
    }

    #[cfg(not(target_os = "windows"))]
    fn create_controls(
        commands: Sender<MediaCommand>,
        control_state: Arc<Mutex<ControlState>>,
    ) -> Option<MediaControls> {
        let mut controls = match MediaControls::new(PlatformConfig {
            display_name: DISPLAY_NAME,
            dbus_name: DBUS_NAME,
            hwnd: None,
        }) {
            Ok(controls) => controls,
            Err(err) => {
                warn!("failed to create media controls backend: {err:?}");
                return None;
            }
        };

        if let Err(err) = controls.attach(move |event| {
            let snapshot = match control_state.lock() {
                Ok(state) => *state,
                Err(poisoned) => *poisoned.into_inner(),
            };
            if let Some(command) = map_control_event(event, snapshot) {
                let _ = commands.send(command);
            }
        }) {
            warn!("failed to attach media controls handler: {err:?}");
            return None;
        }

        Some(controls)
    }

    #[cfg(target_os = "windows")]
    fn create_controls(
        _commands: Sender<MediaCommand>,
        _control_state: Arc<Mutex<ControlState>>,
    ) -> Option<MediaControls> {
        // Souvlaki needs an HWND on Windows, which a terminal app has no
        // window to provide.
        warn!("Windows media controls are disabled: no HWND available");
        None
    }

    pub fn drain_commands(&mut self) -> Vec<MediaCommand> {
        let mut out = Vec::new();
        while let Ok(command) = self.commands.try_recv() {
            out.push(command);
        }
        out
    }

    pub fn publish_metadata(&mut self, track: Option<&Track>, duration: Option<Duration>) {
        let result = match track {
            Some(track) => self.controls.set_metadata(MediaMetadata {
                title: Some(&track.name),
                artist: Some(&track.artist),
                album: Some(&track.album),
                cover_url: track.pic.as_deref(),
                duration,
            }),
            None => self.controls.set_metadata(MediaMetadata::default()),
        };
        if let Err(err) = result {
            warn!("failed to publish media metadata: {err:?}");
        }
    }

    pub fn publish_playback(&mut self, has_track: bool, is_playing: bool, position: Duration) {
        let progress = Some(MediaPosition(position));
        let playback = if !has_track {
            MediaPlayback::Stopped
        } else if is_playing {
            MediaPlayback::Playing { progress }
        } else {
            MediaPlayback::Paused { progress }
        };
        if let Err(err) = self.controls.set_playback(playback) {
            warn!("failed to publish playback state: {err:?}");
        }
    }

    /// Keeps the event-mapping snapshot current so relative seeks from the
    /// OS surface land at the right absolute position.
    pub fn publish_position(&mut self, elapsed: Duration, total: Option<Duration>) {
        self.update_state(|state| {
            state.elapsed = elapsed;
            state.total = total;
        });
    }

    fn update_state<F: FnOnce(&mut ControlState)>(&self, update: F) {
        match self.control_state.lock() {
            Ok(mut state) => update(&mut state),
            Err(poisoned) => update(&mut poisoned.into_inner()),
        }
    }
}

fn map_control_event(event: MediaControlEvent, state: ControlState) -> Option<MediaCommand> {
    match event {
        // The transport's play and pause both route through toggle so the
        // surface can never fight the engine's own idea of its state.
        MediaControlEvent::Play | MediaControlEvent::Pause | MediaControlEvent::Toggle => {
            Some(MediaCommand::Toggle)
        }
        MediaControlEvent::Next => Some(MediaCommand::Next),
        MediaControlEvent::Previous => Some(MediaCommand::Previous),
        MediaControlEvent::SetPosition(position) => Some(seek_to(state, position.0)),
        MediaControlEvent::SeekBy(direction, delta) => {
            Some(seek_to(state, shifted(state.elapsed, direction, delta)))
        }
        MediaControlEvent::Seek(direction) => {
            Some(seek_to(state, shifted(state.elapsed, direction, SEEK_STEP)))
        }
        MediaControlEvent::Stop
        | MediaControlEvent::SetVolume(_)
        | MediaControlEvent::OpenUri(_)
        | MediaControlEvent::Raise
        | MediaControlEvent::Quit => None,
    }
}

fn shifted(elapsed: Duration, direction: SeekDirection, delta: Duration) -> Duration {
    match direction {
        SeekDirection::Forward => elapsed.saturating_add(delta),
        SeekDirection::Backward => elapsed.saturating_sub(delta),
    }
}

fn seek_to(state: ControlState, target: Duration) -> MediaCommand {
    let clamped = match state.total {
        Some(total) => target.min(total),
        None => target,
    };
    MediaCommand::SeekTo(clamped)
}
