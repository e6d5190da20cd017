use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::Error;
use crate::backend::Backend;
use crate::classify::{ErrorContext, classify_error, udp_timeout_kind};
use crate::config::SessionConfig;
use crate::duration::DurationPoller;
use crate::error::{MediaError, MediaErrorKind};
use crate::message::{
    BusMessage, BusMessageKind, ErrorDomain, MessageSource, NativeError, SessionMessage,
    StreamErrorCode, UDP_TIMEOUT_STRUCTURE,
};
use crate::output::VideoOutput;
use crate::probe::BufferProbe;
use crate::request::MediaRequest;
use crate::sink_switch::{SwitchOutcome, SwitchRequest, VideoSinkSwitcher};
use crate::source::{SourceInfo, SourceKind};
use crate::state::{PipelineState, PlaybackState};
use crate::streams::{StreamInventory, StreamType};
use crate::tags::TagMap;

/// Notifications for the front end, drained with [`PlayerSession::drain_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(PlaybackState),
    DurationChanged(Duration),
    PositionChanged(Duration),
    SeekableChanged(bool),
    TagsChanged,
    StreamsChanged,
    AudioAvailableChanged(bool),
    VideoAvailableChanged(bool),
    BufferingProgress(i32),
    VolumeChanged(f64),
    MutedChanged(bool),
    PlaybackRateChanged(f64),
    /// The stream reached its end.
    PlaybackFinished,
    /// A different pipeline was installed.
    PipelineChanged,
    /// The media failed; a `Error` event follows.
    InvalidMedia,
    Error(MediaError),
    Warning(MediaError),
}

fn fuzzy_eq(a: f64, b: f64) -> bool {
    (a - b).abs() * 1_000_000_000_000.0 <= a.abs().min(b.abs())
}

/// Playback controller for one media at a time.
///
/// The session is single threaded: every state change goes through
/// [`dispatch`](Self::dispatch), fed by [`pump`](Self::pump) from the
/// backend's queue.
pub struct PlayerSession<B: Backend> {
    backend: B,
    config: SessionConfig,
    request: Option<MediaRequest>,

    state: PlaybackState,
    pending_state: PlaybackState,
    last_position: Duration,
    duration: Duration,
    playback_rate: f64,
    seekable: bool,
    volume: f64,
    muted: bool,
    audio_available: bool,
    video_available: bool,
    live_source: bool,
    source_kind: SourceKind,
    ever_played: bool,
    show_preroll_frame: bool,

    tags: TagMap,
    streams: StreamInventory,

    sinks: VideoSinkSwitcher<B::Sink>,
    video_output: Option<Box<dyn VideoOutput<B::Sink>>>,
    video_probe: Option<Arc<dyn BufferProbe>>,
    audio_probe: Option<Arc<dyn BufferProbe>>,

    duration_poller: DurationPoller,
    duration_deadline: Option<Instant>,

    last_error: Option<MediaError>,
    events: VecDeque<SessionEvent>,
}

impl<B: Backend> PlayerSession<B> {
    /// Create a stopped session on top of `backend`.
    pub fn new(backend: B, config: SessionConfig) -> Self {
        let null_sink = backend.null_video_sink();
        Self {
            backend,
            request: None,

            state: PlaybackState::Stopped,
            pending_state: PlaybackState::Stopped,
            last_position: Duration::ZERO,
            duration: Duration::ZERO,
            playback_rate: 1.0,
            seekable: false,
            volume: 1.0,
            muted: false,
            audio_available: false,
            video_available: false,
            live_source: false,
            source_kind: SourceKind::Unknown,
            ever_played: false,
            show_preroll_frame: config.show_preroll_frame,

            tags: TagMap::new(),
            streams: StreamInventory::default(),

            sinks: VideoSinkSwitcher::new(null_sink),
            video_output: None,
            video_probe: None,
            audio_probe: None,

            duration_poller: DurationPoller::new(),
            duration_deadline: None,

            last_error: None,
            events: VecDeque::new(),
            config,
        }
    }

    /// Get the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get the backend mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Get the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get the last loaded request.
    pub fn request(&self) -> Option<&MediaRequest> {
        self.request.as_ref()
    }

    /// Get the reported playback state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Get the state the session is heading to.
    pub fn pending_state(&self) -> PlaybackState {
        self.pending_state
    }

    /// Get the media duration, zero while unknown.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Get the playback rate.
    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Check if the media is seekable.
    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    /// Get the volume multiplier.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Check if audio is muted.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Check if the media has an audio stream.
    pub fn is_audio_available(&self) -> bool {
        self.audio_available
    }

    /// Check if the media has a video stream.
    pub fn is_video_available(&self) -> bool {
        self.video_available
    }

    /// Check if the source is live.
    pub fn is_live_source(&self) -> bool {
        self.live_source
    }

    /// Get the kind of the configured source element.
    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    /// Get the merged media tags.
    pub fn tags(&self) -> &TagMap {
        &self.tags
    }

    /// Get the stream inventory of the current media.
    pub fn streams(&self) -> &StreamInventory {
        &self.streams
    }

    /// Get the video sink linked into the pipeline.
    pub fn current_video_sink(&self) -> &B::Sink {
        self.sinks.current()
    }

    /// Get the video sink waiting for the pad block, if any.
    pub fn pending_video_sink(&self) -> Option<&B::Sink> {
        self.sinks.pending()
    }

    /// Get the last reported error.
    pub fn last_error(&self) -> Option<&MediaError> {
        self.last_error.as_ref()
    }

    /// Take the events emitted since the last call.
    pub fn drain_events(&mut self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.events.drain(..)
    }

    fn emit(&mut self, event: SessionEvent) {
        self.events.push_back(event);
    }

    // Loading

    /// Loads new media. A `gst-pipeline:` URL installs a custom pipeline.
    pub fn load(&mut self, request: MediaRequest) -> Result<(), Error> {
        log::debug!("loading {}", request.url());
        self.duration = Duration::ZERO;
        self.last_position = Duration::ZERO;

        if let Some(description) = request.pipeline_description() {
            self.request = Some(request);
            self.install_custom_pipeline(&description);
            return Ok(());
        }

        if !self.backend.has_playbin() {
            self.backend.rebuild_playbin()?;
            self.sinks.reset(self.backend.null_video_sink());
            self.attach_video_probe();
            if let Some(probe) = self.audio_probe.clone() {
                self.backend.attach_audio_probe(probe);
            }
            self.emit(SessionEvent::PipelineChanged);
            self.update_video_output();
        }

        self.backend.load(&request);
        self.request = Some(request);
        self.clear_media_info();
        Ok(())
    }

    fn clear_media_info(&mut self) {
        self.tags.clear();
        self.emit(SessionEvent::TagsChanged);
        if !self.streams.is_empty() {
            self.streams.clear();
            self.emit(SessionEvent::StreamsChanged);
        }
    }

    fn install_custom_pipeline(&mut self, description: &str) {
        let sink_name = self.config.video_sink_name.clone();
        match self.backend.use_custom_pipeline(description, &sink_name) {
            Ok(video_sink) => {
                self.pending_state = PlaybackState::Stopped;
                self.set_state(PlaybackState::Stopped);
                self.sinks.reset(self.backend.null_video_sink());
                if let (Some(sink), Some(output)) = (video_sink, &self.video_output) {
                    if !output.adopt_sink(&sink) {
                        log::debug!("video output declined custom sink {sink:?}");
                    }
                }
                self.emit(SessionEvent::PipelineChanged);

                // Nothing carries over from the previous media.
                self.clear_media_info();
                self.cancel_duration_polling();
                self.set_seekable(false);
                self.set_audio_available(false);
                self.set_video_available(false);
                self.live_source = false;
                self.source_kind = SourceKind::Unknown;
            }
            Err(err) => {
                log::warn!("failed to parse pipeline {description:?}: {err}");
                self.emit(SessionEvent::Error(MediaError::new(
                    MediaErrorKind::Format,
                    err.to_string(),
                )));
            }
        }
    }

    // Playback control

    /// Starts playback. Returns `false` if the pipeline refused.
    pub fn play(&mut self) -> bool {
        self.ever_played = false;
        self.request_state(PlaybackState::Playing)
    }

    /// Pauses playback. Returns `false` if the pipeline refused.
    pub fn pause(&mut self) -> bool {
        self.request_state(PlaybackState::Paused)
    }

    fn request_state(&mut self, target: PlaybackState) -> bool {
        if !self.backend.has_pipeline() {
            return false;
        }
        self.pending_state = target;
        if self.sinks.is_pending() {
            log::debug!("video sink change in flight, deferring {target:?}");
            return true;
        }

        match self.backend.set_state(target.pipeline_state()) {
            Ok(()) => {
                self.resume_video_probe();
                true
            }
            Err(err) => {
                log::warn!("unable to switch to {target:?}: {err}");
                self.pending_state = PlaybackState::Stopped;
                self.set_state(PlaybackState::Stopped);
                false
            }
        }
    }

    /// Stop playback and tear the pipeline down to Null.
    pub fn stop(&mut self) {
        self.ever_played = false;
        if !self.backend.has_pipeline() {
            return;
        }
        if let Some(output) = &self.video_output {
            output.stop_renderer();
        }
        self.flush_video_probe();
        if let Err(err) = self.backend.set_state(PipelineState::Null) {
            log::warn!("failed to stop pipeline: {err}");
        }

        self.last_position = Duration::ZERO;
        self.pending_state = PlaybackState::Stopped;
        let changed = self.state != PlaybackState::Stopped;
        self.state = PlaybackState::Stopped;

        self.finish_video_output_change();

        // No more bus messages arrive in the null state.
        self.set_seekable(false);
        self.cancel_duration_polling();
        if changed {
            self.emit(SessionEvent::StateChanged(PlaybackState::Stopped));
        }
    }

    /// Returns to Stopped after end of stream while keeping the pipeline prerolled.
    pub fn end_of_media_reset(&mut self) {
        if let Some(output) = &self.video_output {
            output.stop_renderer();
        }
        self.flush_video_probe();
        if let Err(err) = self.backend.set_state(PipelineState::Paused) {
            log::warn!("failed to pause pipeline at end of media: {err}");
        }

        self.pending_state = PlaybackState::Stopped;
        let changed = self.state != PlaybackState::Stopped;
        self.state = PlaybackState::Stopped;

        self.finish_video_output_change();

        if changed {
            self.emit(SessionEvent::StateChanged(PlaybackState::Stopped));
        }
    }

    /// Seeks to `position`. Returns whether the seek was issued.
    pub fn seek(&mut self, position: Duration) -> bool {
        // A blocked video pad would stall the flushing seek.
        if !self.backend.has_pipeline()
            || self.sinks.is_pending()
            || self.state == PlaybackState::Stopped
            || !self.seekable
        {
            return false;
        }

        let (start, stop) = if self.playback_rate > 0.0 {
            (position, self.duration)
        } else {
            (Duration::ZERO, position)
        };
        let seeking = self.backend.seek(self.playback_rate, start, stop);
        if seeking {
            self.last_position = position;
        }
        seeking
    }

    /// Set the playback rate; negative rates play backwards.
    pub fn set_playback_rate(&mut self, rate: f64) {
        if fuzzy_eq(self.playback_rate, rate) {
            return;
        }
        self.playback_rate = rate;
        if self.backend.has_pipeline() && self.seekable {
            let position = self.position();
            let (start, stop) = if rate > 0.0 {
                (position, self.duration)
            } else {
                (Duration::ZERO, position)
            };
            if !self.backend.seek(rate, start, stop) {
                log::warn!("pipeline refused playback rate {rate}");
            }
        }
        self.emit(SessionEvent::PlaybackRateChanged(rate));
    }

    /// Current position, falling back to the last known one.
    pub fn position(&mut self) -> Duration {
        if self.backend.has_pipeline() {
            if let Some(position) = self.backend.position() {
                self.last_position = position;
            }
        }
        self.last_position
    }

    /// Time ranges that can be played without further buffering.
    pub fn available_playback_ranges(&self) -> Vec<Range<Duration>> {
        if self.duration.is_zero() {
            return Vec::new();
        }

        let duration = self.duration;
        let scale = |percent: i64| -> Duration {
            let percent = percent.clamp(0, 100) as u32;
            duration * percent / 100
        };
        let mut ranges: Vec<_> = self
            .backend
            .buffered_ranges()
            .unwrap_or_default()
            .into_iter()
            .map(|(start, stop)| scale(start)..scale(stop))
            .filter(|r| !r.is_empty())
            .collect();

        if ranges.is_empty() && !self.live_source && self.seekable {
            ranges.push(Duration::ZERO..duration);
        }
        ranges
    }

    /// Active stream of `stream_type`, as a flat index.
    pub fn active_stream(&self, stream_type: StreamType) -> Option<usize> {
        if !self.backend.has_playbin() {
            return None;
        }
        self.backend
            .current_stream(stream_type)
            .map(|index| self.streams.to_flat(stream_type, index))
    }

    /// Selects a stream by flat index; `None` deselects the type.
    pub fn set_active_stream(&mut self, stream_type: StreamType, stream: Option<usize>) {
        if !self.backend.has_playbin() {
            return;
        }
        let native = match stream {
            Some(flat) => match self.streams.to_native(stream_type, flat) {
                Some(index) => Some(index),
                None => {
                    log::warn!("stream {flat} is not a {stream_type:?} stream");
                    return;
                }
            },
            None => None,
        };
        self.backend.set_current_stream(stream_type, native);
    }

    /// Set the volume multiplier. Negative values clamp to 0.
    pub fn set_volume(&mut self, volume: f64) {
        let volume = volume.max(0.0);
        if fuzzy_eq(self.volume, volume) {
            return;
        }
        self.volume = volume;
        self.backend.set_volume(volume);
        self.emit(SessionEvent::VolumeChanged(volume));
    }

    /// Set if audio is muted.
    pub fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        self.muted = muted;
        self.backend.set_muted(muted);
        self.emit(SessionEvent::MutedChanged(muted));
    }

    /// Set if the video sink renders the preroll frame while paused.
    pub fn show_preroll_frames(&mut self, enabled: bool) {
        if enabled != self.show_preroll_frame
            && self
                .backend
                .set_show_preroll_frame(self.sinks.current(), enabled)
        {
            self.show_preroll_frame = enabled;
        }
    }

    // Probes

    /// Attach a probe to the video sink, replacing any previous one.
    pub fn add_video_probe(&mut self, probe: Arc<dyn BufferProbe>) {
        if self.video_probe.is_some() {
            log::warn!("replacing existing video probe");
            self.backend.detach_video_probe();
        }
        self.backend
            .attach_video_probe(self.sinks.current(), probe.clone());
        self.video_probe = Some(probe);
    }

    /// Detach the video probe.
    pub fn remove_video_probe(&mut self) {
        if self.video_probe.take().is_some() {
            self.backend.detach_video_probe();
        }
    }

    /// Attach a probe to the audio path, replacing any previous one.
    pub fn add_audio_probe(&mut self, probe: Arc<dyn BufferProbe>) {
        if self.audio_probe.is_some() {
            log::warn!("replacing existing audio probe");
            self.backend.detach_audio_probe();
        }
        self.backend.attach_audio_probe(probe.clone());
        self.audio_probe = Some(probe);
    }

    /// Detach the audio probe.
    pub fn remove_audio_probe(&mut self) {
        if self.audio_probe.take().is_some() {
            self.backend.detach_audio_probe();
        }
    }

    fn flush_video_probe(&self) {
        if let Some(probe) = &self.video_probe {
            probe.start_flushing();
        }
    }

    fn resume_video_probe(&self) {
        if let Some(probe) = &self.video_probe {
            probe.stop_flushing();
        }
    }

    fn detach_video_probe(&mut self) {
        if self.video_probe.is_some() {
            self.backend.detach_video_probe();
        }
    }

    fn attach_video_probe(&mut self) {
        if let Some(probe) = self.video_probe.clone() {
            self.backend.attach_video_probe(self.sinks.current(), probe);
        }
    }

    // Video output

    /// Set the video output and switch to its sink.
    pub fn set_video_output(&mut self, output: Option<Box<dyn VideoOutput<B::Sink>>>) {
        self.video_output = output;
        self.update_video_output();
    }

    /// Re-reads the video output and swaps the pipeline's sink if it changed.
    pub fn update_video_output(&mut self) {
        // Custom pipelines bring their own sink.
        if !self.backend.has_playbin() {
            return;
        }

        let target = self
            .video_output
            .as_ref()
            .filter(|output| output.is_ready())
            .and_then(|output| output.video_sink())
            .unwrap_or_else(|| self.backend.null_video_sink());

        let running = self.state != PlaybackState::Stopped;
        match self.sinks.request(target, running) {
            SwitchRequest::Unchanged => {
                log::trace!("video sink unchanged");
            }
            SwitchRequest::Immediate { previous } => {
                log::debug!("pipeline not started, switching video sink now");
                self.flush_video_probe();
                self.backend
                    .set_video_sink_state(&previous, PipelineState::Null);
                if let Err(err) = self.backend.set_state(PipelineState::Null) {
                    log::warn!("failed to reset pipeline for sink switch: {err}");
                }
                if self.backend.is_video_pad_blocked() {
                    self.backend.unblock_video_pad();
                }
                self.detach_video_probe();
                self.relink_video_sink(&previous);
                self.attach_video_probe();

                let state = self.pending_state;
                if state != PlaybackState::Stopped {
                    if let Err(err) = self.backend.set_state(state.pipeline_state()) {
                        log::warn!("failed to restore {state:?} after sink switch: {err}");
                    }
                }
                self.resume_video_probe();
            }
            SwitchRequest::Deferred => {
                log::debug!("blocking video pad for sink switch");
                self.backend.block_video_pad();
                // A paused sink holds its buffer and the pad never blocks.
                if self.state == PlaybackState::Paused {
                    let current = self.sinks.current().clone();
                    self.backend
                        .set_video_sink_state(&current, PipelineState::Playing);
                }
            }
            SwitchRequest::Coalesced => {
                log::debug!("video pad block already pending, retargeted");
            }
        }
    }

    fn relink_video_sink(&mut self, previous: &B::Sink) {
        let next = self.sinks.current().clone();
        if let Err(err) = self.backend.replace_video_sink(previous, &next) {
            log::warn!("linking video output failed: {err}");
        }
        if !self.backend.set_show_preroll_frame(&next, self.show_preroll_frame) {
            log::trace!("{next:?} has no show-preroll-frame property");
        }
        self.backend.set_sink_sync(&next, !self.live_source);
    }

    /// Completes a deferred sink switch once the video pad is blocked.
    pub fn finish_video_output_change(&mut self) {
        if !self.backend.has_playbin() || !self.sinks.is_pending() {
            return;
        }

        if !self.backend.is_video_pad_blocked() {
            // Without a block only a stopped converter can be relinked.
            log::warn!("video pad not blocked yet, cannot switch video sink");
            if self.backend.video_converter_state() != PipelineState::Null {
                return;
            }
        }

        match self.sinks.finish() {
            SwitchOutcome::Idle => {}
            SwitchOutcome::Aborted => {
                log::debug!("video sink switched back, nothing to relink");
                if self.backend.is_video_pad_blocked() {
                    self.backend.unblock_video_pad();
                }
                let state = self.pending_state.pipeline_state();
                if let Err(err) = self.backend.set_state(state) {
                    log::warn!("failed to apply deferred {state:?}: {err}");
                }
            }
            SwitchOutcome::Commit { previous, next } => {
                log::debug!("relinking video sink {previous:?} -> {next:?}");
                self.backend
                    .set_video_sink_state(&previous, PipelineState::Null);
                self.detach_video_probe();
                self.relink_video_sink(&previous);
                self.attach_video_probe();

                let state = self.pending_state.pipeline_state();
                self.backend.set_video_sink_state(&next, state);
                if state == PipelineState::Null {
                    self.flush_video_probe();
                }
                // Apply the state change deferred while the switch was pending.
                if let Err(err) = self.backend.set_state(state) {
                    log::warn!("failed to apply deferred {state:?}: {err}");
                }
                if state != PipelineState::Null {
                    self.resume_video_probe();
                }

                if self.backend.is_video_pad_blocked() {
                    self.backend.unblock_video_pad();
                }
            }
        }
    }

    // Dispatch

    /// Drains the backend's queue and fires due timers.
    pub fn pump(&mut self) {
        while let Some(msg) = self.backend.next_message() {
            self.dispatch(msg);
        }
        self.fire_due_timers(Instant::now());
    }

    /// When the next timer is due, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.duration_deadline
    }

    /// Whether the session can go without [`pump`](Self::pump) until the
    /// caller acts: not playing, no state change or sink switch in flight and
    /// no timer armed.
    pub fn is_idle(&self) -> bool {
        self.state != PlaybackState::Playing
            && self.pending_state == self.state
            && !self.sinks.is_pending()
            && self.duration_deadline.is_none()
    }

    /// Run the timers due at `now`.
    pub fn fire_due_timers(&mut self, now: Instant) {
        if self.duration_deadline.is_some_and(|deadline| deadline <= now) {
            self.duration_deadline = None;
            self.update_duration();
        }
    }

    /// Handle one message from the backend.
    pub fn dispatch(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Bus(msg) => self.handle_bus_message(msg),
            SessionMessage::VideoPadBlocked => self.finish_video_output_change(),
            SessionMessage::StreamsChanged => self.refresh_streams(),
            SessionMessage::VolumeNotify(volume) => {
                if !fuzzy_eq(self.volume, volume) {
                    self.volume = volume;
                    self.emit(SessionEvent::VolumeChanged(volume));
                }
            }
            SessionMessage::MuteNotify(muted) => {
                if self.muted != muted {
                    self.muted = muted;
                    self.emit(SessionEvent::MutedChanged(muted));
                }
            }
            SessionMessage::SourceConfigured(info) => self.apply_source_info(info),
            SessionMessage::VideoOutputChanged => self.update_video_output(),
        }
    }

    fn apply_source_info(&mut self, info: SourceInfo) {
        log::debug!(
            "source {:?} is {}",
            info.kind,
            if info.live { "live" } else { "not live" }
        );
        self.source_kind = info.kind;
        self.live_source = info.live;
        let sink = self.sinks.current().clone();
        self.backend.set_sink_sync(&sink, !info.live);
    }

    fn handle_bus_message(&mut self, msg: BusMessage) {
        let BusMessage { source, kind } = msg;
        log::trace!("bus message from {source:?}: {kind:?}");

        match &kind {
            BusMessageKind::Tag(tags) => {
                self.tags.merge(tags.clone());
                self.emit(SessionEvent::TagsChanged);
            }
            BusMessageKind::DurationChanged => self.update_duration(),
            BusMessageKind::Buffering(percent) => {
                self.emit(SessionEvent::BufferingProgress(*percent))
            }
            _ => {}
        }

        match source {
            MessageSource::Pipeline => self.handle_pipeline_message(kind),
            source => self.handle_element_message(&source, kind),
        }
    }

    fn handle_pipeline_message(&mut self, kind: BusMessageKind) {
        match kind {
            BusMessageKind::StateChanged {
                old,
                current,
                pending,
            } => {
                log::debug!("pipeline state {old:?} -> {current:?} (pending {pending:?})");
                self.on_pipeline_state(old, current);
            }
            BusMessageKind::Eos => self.emit(SessionEvent::PlaybackFinished),
            BusMessageKind::Error(err) => {
                log::warn!("pipeline error: {} ({:?})", err.message, err.debug);
                let error = classify_error(&MessageSource::Pipeline, &err, self.error_context());
                self.process_invalid_media(error);
            }
            BusMessageKind::Warning(err) => self.handle_warning(&err),
            BusMessageKind::Info(info) => log::debug!("pipeline info: {}", info.message),
            BusMessageKind::SegmentStart(position) => {
                self.last_position = position;
                self.emit(SessionEvent::PositionChanged(position));
            }
            BusMessageKind::AsyncDone => {
                if let Some(position) = self.backend.position() {
                    self.last_position = position;
                    self.emit(SessionEvent::PositionChanged(position));
                }
            }
            _ => {}
        }
    }

    fn handle_element_message(&mut self, source: &MessageSource, kind: BusMessageKind) {
        match kind {
            BusMessageKind::Error(err) => {
                log::warn!("error from {source:?}: {} ({:?})", err.message, err.debug);
                let error = classify_error(source, &err, self.error_context());
                self.process_invalid_media(error);
            }
            BusMessageKind::Warning(err) => self.handle_warning(&err),
            BusMessageKind::Element(name)
                if source.is_source_element()
                    && self.source_kind == SourceKind::Udp
                    && name == UDP_TIMEOUT_STRUCTURE =>
            {
                // udpsrc reports its timeout as an element message, not an error.
                let kind = udp_timeout_kind(self.ever_played);
                self.process_invalid_media(MediaError::new(kind, "UDP source timeout"));
            }
            _ => {}
        }
    }

    fn handle_warning(&mut self, warning: &NativeError) {
        log::warn!("pipeline warning: {}", warning.message);
        if warning.domain == ErrorDomain::Stream(StreamErrorCode::CodecNotFound) {
            self.emit(SessionEvent::Warning(MediaError::new(
                MediaErrorKind::Format,
                format!("cannot play stream of unknown type: {}", warning.message),
            )));
        }
    }

    fn error_context(&self) -> ErrorContext {
        ErrorContext {
            remote: self.request.as_ref().is_some_and(MediaRequest::is_remote),
            ever_played: self.ever_played,
        }
    }

    /// Stops and reports a classified error.
    fn process_invalid_media(&mut self, error: MediaError) {
        log::error!("{error}");
        self.emit(SessionEvent::InvalidMedia);
        self.stop();
        self.last_error = Some(error.clone());
        self.emit(SessionEvent::Error(error));
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    fn on_pipeline_state(&mut self, old: PipelineState, current: PipelineState) {
        match current {
            PipelineState::VoidPending | PipelineState::Null => {
                self.set_seekable(false);
                self.finish_video_output_change();
                self.set_state(PlaybackState::Stopped);
            }
            PipelineState::Ready => {
                self.set_seekable(false);
                self.set_state(PlaybackState::Stopped);
            }
            PipelineState::Paused => {
                self.enter_paused(old == PipelineState::Ready);
            }
            PipelineState::Playing => {
                self.ever_played = true;
                if self.state == PlaybackState::Stopped {
                    // Playing is only reported after a preroll.
                    self.enter_paused(true);
                }
                if self.state != PlaybackState::Playing {
                    self.set_state(PlaybackState::Playing);
                    // Some live sources only know their duration once playing.
                    if self.duration.is_zero() {
                        self.duration_poller.restart();
                        self.update_duration();
                    }
                }
            }
        }
    }

    fn enter_paused(&mut self, first_preroll: bool) {
        let previous = self.state;
        self.state = PlaybackState::Paused;

        if first_preroll {
            if self.source_kind.counts_preroll_as_played() {
                self.ever_played = true;
            }
            self.refresh_streams();
            self.update_resolution_tag();

            self.duration_poller.restart();
            self.update_duration();

            if !fuzzy_eq(self.playback_rate, 1.0) {
                let rate = self.playback_rate;
                self.playback_rate = 1.0;
                self.set_playback_rate(rate);
            }
        }

        if self.state != previous {
            self.emit(SessionEvent::StateChanged(self.state));
        }
    }

    fn set_seekable(&mut self, seekable: bool) {
        if self.seekable != seekable {
            self.seekable = seekable;
            self.emit(SessionEvent::SeekableChanged(seekable));
        }
    }

    fn cancel_duration_polling(&mut self) {
        self.duration_poller.cancel();
        self.duration_deadline = None;
    }

    /// Queries duration and seekability, scheduling a retry while unknown.
    fn update_duration(&mut self) {
        let duration = if self.backend.has_pipeline() {
            self.backend.duration().unwrap_or_default()
        } else {
            Duration::ZERO
        };

        if self.duration != duration {
            self.duration = duration;
            self.emit(SessionEvent::DurationChanged(duration));
        }

        let seekable = !duration.is_zero() && self.backend.is_seekable();
        self.set_seekable(seekable);

        self.duration_deadline = self
            .duration_poller
            .observe(duration)
            .map(|delay| Instant::now() + delay);
        log::trace!("duration {duration:?}, next query {:?}", self.duration_deadline);
    }

    fn refresh_streams(&mut self) {
        if !self.backend.has_playbin() {
            return;
        }

        let backend = &self.backend;
        let streams = StreamInventory::build(
            |stream_type| backend.stream_count(stream_type),
            |stream_type, index| backend.stream_tags(stream_type, index),
        );

        let have_audio = streams.has_audio();
        let have_video = streams.has_video();
        let changed = streams != self.streams;
        self.streams = streams;

        self.set_audio_available(have_audio);
        self.set_video_available(have_video);
        if changed {
            self.emit(SessionEvent::StreamsChanged);
        }
    }

    fn set_audio_available(&mut self, available: bool) {
        if self.audio_available != available {
            self.audio_available = available;
            self.emit(SessionEvent::AudioAvailableChanged(available));
        }
    }

    fn set_video_available(&mut self, available: bool) {
        if self.video_available != available {
            self.video_available = available;
            self.emit(SessionEvent::VideoAvailableChanged(available));
        }
    }

    fn update_resolution_tag(&mut self) {
        let resolution = self.backend.negotiated_resolution();
        if let Some(index) = self.backend.current_stream(StreamType::Video) {
            self.streams.set_video_resolution(index, resolution);
        }
        if self.tags.set_resolution(resolution) {
            self.emit(SessionEvent::TagsChanged);
        }
    }
}

impl<B: Backend> Drop for PlayerSession<B> {
    fn drop(&mut self) {
        if self.backend.has_pipeline() {
            self.stop();
            self.remove_video_probe();
            self.remove_audio_probe();
        }
    }
}
