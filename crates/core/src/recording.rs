//! Microphone lifecycle for the play view.
//!
//! The controller owns a single [`RecordingState`]. Everything the UI shows
//! about recording is derived from it, never from separate flags.
//!
//! ```text
//! Idle --toggle--> Starting --Started--> Running --toggle--> Stopping
//!  ^                                                           |
//!  +------------- Stopped / grace delay (flush once) ----------+
//! ```
//!
//! Any capture error drops straight back to `Idle`.
use crate::{Command, Input, Notice};
#[cfg(test)]
use mockall::automock;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How long to wait for the backend to acknowledge a stop before flushing
/// anyway.
pub const STOP_GRACE: Duration = Duration::from_millis(500);

/// Delay before re-flushing what was captured when a transient error hit.
pub const RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Error kinds reported asynchronously by a running capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureErrorKind {
    Aborted,
    AudioCapture,
    NoSpeech,
    Network,
    NotAllowed,
    Other,
}

impl CaptureErrorKind {
    /// Kinds after which the already captured input is still worth sending.
    pub fn is_transient(self) -> bool {
        matches!(self, CaptureErrorKind::Aborted | CaptureErrorKind::AudioCapture)
    }
}

/// Callbacks from the capture backend, delivered over a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Started,
    /// Speech recognition output. Interim text is replaced by the next
    /// result; final text accumulates.
    Transcript { text: String, is_final: bool },
    /// Encoded audio, appended to the recording as is.
    Audio(Vec<u8>),
    /// Input level in `0..=255`, for diagnostics.
    Level(u8),
    Stopped,
    Error(CaptureErrorKind),
}

/// Errors raised synchronously by [`AudioCapture`] calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("no input device available")]
    DeviceUnavailable,
    #[error("capture backend is in an invalid state")]
    InvalidState,
    #[error("capture backend failed: {0}")]
    Backend(String),
}

/// A microphone plus whatever turns it into transcript or audio.
///
/// Implementations report progress as [`CaptureEvent`]s on the channel they
/// were built with; the calls here only request transitions.
#[cfg_attr(test, automock)]
pub trait AudioCapture {
    /// Acquires the microphone. Must be a no-op when it is already held.
    fn open(&mut self) -> Result<(), CaptureError>;

    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Releases the microphone.
    fn close(&mut self);

    /// MIME type of the bytes sent as [`CaptureEvent::Audio`].
    fn mime_type(&self) -> String;
}

/// A finished recording, handed to the upload step.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub audio: Vec<u8>,
    pub mime_type: String,
    pub transcript: String,
}

impl Recording {
    pub fn file_name(&self) -> String {
        let extension = match self.mime_type.split(';').next().unwrap_or_default() {
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/webm" => "webm",
            "audio/ogg" => "ogg",
            "audio/mpeg" => "mp3",
            _ => "bin",
        };
        format!("recording.{extension}")
    }
}

/// The input gathered while the microphone is live.
#[derive(Debug, Default)]
pub struct RecordingSession {
    final_transcript: String,
    interim_transcript: String,
    audio: Vec<u8>,
    started_at: Option<Instant>,
}

impl RecordingSession {
    fn push_transcript(&mut self, text: &str, is_final: bool) {
        if is_final {
            self.final_transcript.push_str(text);
            self.interim_transcript.clear();
        } else {
            self.interim_transcript = text.to_string();
        }
    }

    pub fn transcript(&self) -> String {
        format!("{}{}", self.final_transcript, self.interim_transcript)
    }

    /// `None` when nothing worth uploading was captured.
    fn into_recording(self, mime_type: String) -> Option<Recording> {
        let transcript = self.transcript().trim().to_string();
        if transcript.is_empty() && self.audio.is_empty() {
            return None;
        }
        Some(Recording {
            audio: self.audio,
            mime_type,
            transcript,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Starting,
    StopRequested,
    /// A stop is already in flight.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordingDiagnostics {
    pub elapsed: Duration,
    pub audio_level: u8,
}

pub struct RecordingController<C: AudioCapture> {
    capture: C,
    state: RecordingState,
    session: Option<RecordingSession>,
    stop_deadline: Option<Instant>,
    retry: Option<(Instant, Recording)>,
    audio_level: u8,
    stop_grace: Duration,
    retry_delay: Duration,
    generation: u64,
}

impl<C: AudioCapture> RecordingController<C> {
    pub fn new(capture: C) -> Self {
        Self {
            capture,
            state: RecordingState::Idle,
            session: None,
            stop_deadline: None,
            retry: None,
            audio_level: 0,
            stop_grace: STOP_GRACE,
            retry_delay: RETRY_DELAY,
            generation: 0,
        }
    }

    /// Tags every upload this controller emits.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn with_timings(mut self, stop_grace: Duration, retry_delay: Duration) -> Self {
        self.stop_grace = stop_grace;
        self.retry_delay = retry_delay;
        self
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// What the microphone button shows. Turns false as soon as a stop is
    /// requested, before the backend confirms.
    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Running
    }

    /// Transcript captured so far in the current recording.
    pub fn transcript(&self) -> Option<String> {
        self.session.as_ref().map(RecordingSession::transcript)
    }

    pub fn diagnostics(&self, now: Instant) -> RecordingDiagnostics {
        if !self.is_recording() {
            return RecordingDiagnostics::default();
        }
        let elapsed = self
            .session
            .as_ref()
            .and_then(|s| s.started_at)
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        RecordingDiagnostics {
            elapsed,
            audio_level: self.audio_level,
        }
    }

    pub fn toggle(&mut self) -> Result<ToggleOutcome, CaptureError> {
        match self.state {
            RecordingState::Idle => self.start(),
            RecordingState::Starting | RecordingState::Running => {
                self.request_stop();
                Ok(ToggleOutcome::StopRequested)
            }
            RecordingState::Stopping => {
                tracing::debug!("stop already in flight, ignoring toggle");
                Ok(ToggleOutcome::Ignored)
            }
        }
    }

    fn start(&mut self) -> Result<ToggleOutcome, CaptureError> {
        if let Err(e) = self.capture.open() {
            tracing::warn!("could not open microphone: {}", e);
            return Err(e);
        }

        tracing::debug!("recording: idle -> starting");
        self.state = RecordingState::Starting;
        self.session = Some(RecordingSession::default());

        if let Err(e) = self.capture.start() {
            tracing::warn!("capture start failed: {}", e);
            if e == CaptureError::InvalidState {
                // The backend thinks it is still running; stop it so the next
                // toggle starts clean.
                if let Err(stop_error) = self.capture.stop() {
                    tracing::debug!("forced stop failed: {}", stop_error);
                }
            }
            self.session = None;
            self.reset();
            return Err(e);
        }
        Ok(ToggleOutcome::Starting)
    }

    fn request_stop(&mut self) {
        tracing::debug!("recording: {:?} -> stopping", self.state);
        self.state = RecordingState::Stopping;
        self.stop_deadline = Some(Instant::now() + self.stop_grace);
        self.audio_level = 0;

        // A failed stop is covered by the grace deadline.
        if let Err(e) = self.capture.stop() {
            tracing::warn!("capture stop failed: {}", e);
        }
    }

    /// Applies one backend callback. Returns the recording when this event
    /// completed it.
    pub fn handle_event(&mut self, event: CaptureEvent) -> Option<Recording> {
        match event {
            CaptureEvent::Started => {
                if self.state == RecordingState::Starting {
                    tracing::debug!("recording: starting -> running");
                    self.state = RecordingState::Running;
                    if let Some(session) = self.session.as_mut() {
                        session.started_at = Some(Instant::now());
                    }
                } else {
                    tracing::debug!("late start acknowledgement in {:?}", self.state);
                }
                None
            }
            CaptureEvent::Transcript { text, is_final } => {
                if let Some(session) = self.session.as_mut() {
                    session.push_transcript(&text, is_final);
                }
                None
            }
            CaptureEvent::Audio(bytes) => {
                if let Some(session) = self.session.as_mut() {
                    session.audio.extend_from_slice(&bytes);
                }
                None
            }
            CaptureEvent::Level(level) => {
                if self.state == RecordingState::Running {
                    self.audio_level = level;
                }
                None
            }
            CaptureEvent::Stopped => match self.state {
                RecordingState::Idle => {
                    tracing::debug!("stop acknowledgement after reset, ignoring");
                    None
                }
                _ => {
                    tracing::debug!("recording: {:?} -> idle (acknowledged)", self.state);
                    self.finish()
                }
            },
            CaptureEvent::Error(kind) => {
                tracing::warn!("capture error {:?} in {:?}, resetting", kind, self.state);
                if self.state != RecordingState::Idle {
                    // Leave the backend stopped so the next toggle can start it.
                    if let Err(e) = self.capture.stop() {
                        tracing::debug!("stop after capture error failed: {}", e);
                    }
                }
                let partial = self.session.take();
                self.reset();
                if kind.is_transient() {
                    let mime_type = self.capture.mime_type();
                    if let Some(recording) = partial.and_then(|s| s.into_recording(mime_type)) {
                        tracing::info!("retrying flush of captured input in {:?}", self.retry_delay);
                        self.retry = Some((Instant::now() + self.retry_delay, recording));
                    }
                }
                None
            }
        }
    }

    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        let retry = self.retry.as_ref().map(|(at, _)| *at);
        match (self.stop_deadline, retry) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fires the timers that are due at `now`.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<Recording> {
        let mut flushed = Vec::new();

        if self.state == RecordingState::Stopping
            && self.stop_deadline.is_some_and(|deadline| now >= deadline)
        {
            tracing::debug!("no stop acknowledgement within {:?}, flushing", self.stop_grace);
            flushed.extend(self.finish());
        }

        if self.retry.as_ref().is_some_and(|(at, _)| now >= *at) {
            if let Some((_, recording)) = self.retry.take() {
                flushed.push(recording);
            }
        }
        flushed
    }

    /// Releases the microphone and drops everything pending.
    pub fn teardown(&mut self) {
        tracing::debug!("tearing down recording controller in {:?}", self.state);
        self.capture.close();
        self.session = None;
        self.retry = None;
        self.reset();
    }

    fn finish(&mut self) -> Option<Recording> {
        let session = self.session.take();
        self.reset();
        let mime_type = self.capture.mime_type();
        session.and_then(|s| s.into_recording(mime_type))
    }

    fn reset(&mut self) {
        self.state = RecordingState::Idle;
        self.stop_deadline = None;
        self.audio_level = 0;
    }

    /// Drives the controller until [`Input::Unmount`] arrives or the input
    /// channel closes.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<Input>,
        mut events: mpsc::UnboundedReceiver<CaptureEvent>,
        commands: mpsc::Sender<Command>,
    ) {
        loop {
            let deadline = self.next_deadline();
            let generation = self.generation;
            let upload = move |recording: Recording| Command::Upload { generation, recording };
            let mut outgoing = Vec::new();

            tokio::select! {
                input = inputs.recv() => match input {
                    Some(Input::Toggle) => {
                        if let Err(e) = self.toggle() {
                            let notice = match e {
                                CaptureError::PermissionDenied => Notice::MicrophoneDenied,
                                other => Notice::CaptureUnavailable(other.to_string()),
                            };
                            outgoing.push(Command::Notify(notice));
                        }
                    }
                    Some(Input::Unmount) | None => {
                        self.teardown();
                        break;
                    }
                },
                Some(event) = events.recv() => {
                    outgoing.extend(self.handle_event(event).map(upload));
                }
                _ = sleep_until(deadline) => {
                    outgoing.extend(self.poll_timers(Instant::now()).into_iter().map(upload));
                }
            }

            for command in outgoing {
                if commands.send(command).await.is_err() {
                    tracing::warn!("command receiver dropped, stopping recording controller");
                    self.teardown();
                    return;
                }
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
