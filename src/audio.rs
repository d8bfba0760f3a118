use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::HostTrait;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const MAX_VOLUME: f32 = 2.5;
const STREAM_CACHE_FILE: &str = "stream_cache.dat";

/// Why a play attempt could not start. The player picks its recovery
/// strategy from the class, not the message.
#[derive(Debug)]
pub enum SinkError {
    /// The fetched bytes could not be decoded (format/source problem).
    Unsupported(String),
    /// No usable audio output path right now.
    OutputUnavailable(String),
    Other(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(msg) => write!(f, "unsupported source: {msg}"),
            Self::OutputUnavailable(msg) => write!(f, "audio output unavailable: {msg}"),
            Self::Other(msg) => write!(f, "playback failed: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// The one shared audio output. Exactly one track is current at a time;
/// all playback operations serialize through the owning player.
pub trait AudioSink {
    fn play_url(&mut self, url: &str) -> Result<(), SinkError>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn is_paused(&self) -> bool;
    fn current_url(&self) -> Option<&str>;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn seek_to(&mut self, position: Duration) -> Result<()>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn is_finished(&self) -> bool;
}

pub struct RodioSink {
    stream: OutputStream,
    sink: Sink,
    agent: ureq::Agent,
    current: Option<String>,
    track_duration: Option<Duration>,
    volume: f32,
}

impl RodioSink {
    pub fn new() -> Result<Self> {
        let mut stream = open_output_stream()?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(30))
            .build();
        Ok(Self {
            stream,
            sink,
            agent,
            current: None,
            track_duration: None,
            volume: 1.0,
        })
    }

    fn cache_path(&self) -> Result<PathBuf> {
        let root = crate::store::config_root()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create {}", root.display()))?;
        Ok(root.join(STREAM_CACHE_FILE))
    }

    /// rodio needs a seekable source, so the resolved URL is spooled to a
    /// single reusable cache file before decoding.
    fn download_to_cache(&self, url: &str) -> Result<PathBuf, SinkError> {
        let path = self
            .cache_path()
            .map_err(|err| SinkError::Other(format!("{err:#}")))?;
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|err| SinkError::Other(format!("fetch failed: {err}")))?;
        let mut file =
            File::create(&path).map_err(|err| SinkError::Other(format!("cache file: {err}")))?;
        io::copy(&mut response.into_reader(), &mut file)
            .map_err(|err| SinkError::Other(format!("stream copy: {err}")))?;
        Ok(path)
    }
}

impl AudioSink for RodioSink {
    fn play_url(&mut self, url: &str) -> Result<(), SinkError> {
        let path = self.download_to_cache(url)?;

        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());

        let file =
            File::open(&path).map_err(|err| SinkError::Other(format!("cache read: {err}")))?;
        let source =
            Decoder::try_from(file).map_err(|err| SinkError::Unsupported(format!("{err}")))?;
        self.track_duration = source.total_duration();
        self.sink.append(source);
        self.sink.set_volume(self.volume);
        self.current = Some(url.to_string());
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn resume(&mut self) {
        self.sink.play();
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.current = None;
        self.track_duration = None;
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn current_url(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }
        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))?;
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
        self.sink.set_volume(self.volume);
    }

    fn is_finished(&self) -> bool {
        self.current.is_some() && !self.sink.is_paused() && self.sink.empty()
    }
}

fn open_output_stream() -> Result<OutputStream> {
    with_silenced_stderr(|| {
        let default = OutputStreamBuilder::from_default_device()
            .context("failed to open default system output stream")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start default output stream")
            });
        let default_err = match default {
            Ok(stream) => return Ok(stream),
            Err(err) => err,
        };

        // Default device refused; take the first other output that opens.
        let host = rodio::cpal::default_host();
        for device in host.output_devices().ok().into_iter().flatten() {
            let opened = OutputStreamBuilder::from_device(device)
                .and_then(|builder| builder.with_error_callback(|_| {}).open_stream_or_fallback());
            if let Ok(stream) = opened {
                return Ok(stream);
            }
        }

        Err(anyhow::anyhow!(
            "unable to start any audio output stream after default failed: {default_err:#}"
        ))
    })
}

// Device probing writes driver noise straight to fd 2; point it at
// /dev/null for the duration.
#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    use std::os::fd::AsRawFd;

    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = File::options().write(true).open("/dev/null");
    if let Ok(devnull) = &devnull {
        unsafe { libc::dup2(devnull.as_raw_fd(), libc::STDERR_FILENO) };
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Clock-only sink: tracks a logical position without touching any audio
/// device. Used in tests and when no output device can be opened.
pub struct NullSink {
    paused: bool,
    current: Option<String>,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    fixed_duration: Option<Duration>,
}

impl NullSink {
    pub fn new() -> Self {
        Self {
            paused: false,
            current: None,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            fixed_duration: None,
        }
    }

    /// Pretend every played URL has this duration.
    pub fn with_duration(duration: Duration) -> Self {
        let mut sink = Self::new();
        sink.fixed_duration = Some(duration);
        sink
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for NullSink {
    fn play_url(&mut self, url: &str) -> Result<(), SinkError> {
        self.paused = false;
        self.current = Some(url.to_string());
        self.started_at = Some(Instant::now());
        self.position_offset = Duration::ZERO;
        self.track_duration = self.fixed_duration;
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn resume(&mut self) {
        if self.current.is_some() {
            self.started_at = Some(Instant::now());
        }
        self.paused = false;
    }

    fn stop(&mut self) {
        self.current = None;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn current_url(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }
        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = if self.paused {
            None
        } else {
            Some(Instant::now())
        };
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    fn is_finished(&self) -> bool {
        let Some(duration) = self.track_duration else {
            return false;
        };
        self.current.is_some() && !self.paused && self.current_position() >= duration
    }
}
