#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use gst_player_session::{
    Backend, BufferProbe, BusMessage, BusMessageKind, Error, MediaRequest, MessageSource,
    PipelineState, PlaybackState, PlayerSession, SessionConfig, SessionEvent, SessionMessage,
    StreamType, TagMap, Url, VideoOutput, VideoResolution,
};

pub const NULL_SINK: &str = "null";

/// In-memory pipeline recording every call the session makes.
#[derive(Default)]
pub struct MockBackend {
    pub custom: bool,
    pub custom_fails: bool,
    pub custom_descriptions: Vec<String>,
    pub rebuilds: usize,
    pub loaded: Vec<Url>,

    pub states: Vec<PipelineState>,
    pub refuse_states: bool,
    pub position: Option<Duration>,
    pub duration: Option<Duration>,
    pub seekable: bool,
    pub seeks: Vec<(f64, Duration, Duration)>,
    pub ranges: Option<Vec<(i64, i64)>>,

    pub volume: Option<f64>,
    pub muted: Option<bool>,

    pub counts: HashMap<StreamType, usize>,
    pub stream_tags: HashMap<(StreamType, usize), TagMap>,
    pub current: HashMap<StreamType, Option<usize>>,
    pub resolution: Option<VideoResolution>,

    pub replacements: Vec<(String, String)>,
    pub sink_states: Vec<(String, PipelineState)>,
    pub sync: Vec<(String, bool)>,
    pub block_requests: usize,
    pub pad_blocked: bool,
    /// Post `VideoPadBlocked` as soon as a block is requested.
    pub auto_block: bool,

    pub preroll_frames: Vec<(String, bool)>,
    /// Sinks report no `show-preroll-frame` property.
    pub preroll_unsupported: bool,

    pub video_probe: Option<String>,
    pub audio_probe: bool,

    pub queue: VecDeque<SessionMessage>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            auto_block: true,
            duration: Some(Duration::from_secs(10)),
            seekable: true,
            ..Default::default()
        }
    }

    pub fn last_state(&self) -> Option<PipelineState> {
        self.states.last().copied()
    }

    /// A fresh graph carries none of the old pad probes.
    fn drop_probes(&mut self) {
        self.video_probe = None;
        self.audio_probe = false;
    }

    pub fn push(&mut self, msg: impl Into<SessionMessage>) {
        self.queue.push_back(msg.into());
    }
}

impl Backend for MockBackend {
    type Sink = String;

    fn has_pipeline(&self) -> bool {
        true
    }

    fn has_playbin(&self) -> bool {
        !self.custom
    }

    fn rebuild_playbin(&mut self) -> Result<(), Error> {
        self.custom = false;
        self.rebuilds += 1;
        self.drop_probes();
        Ok(())
    }

    fn use_custom_pipeline(
        &mut self,
        description: &str,
        video_sink_name: &str,
    ) -> Result<Option<String>, Error> {
        if self.custom_fails {
            return Err(Error::PipelineDescription(description.to_string()));
        }
        self.custom = true;
        self.drop_probes();
        self.custom_descriptions.push(description.to_string());
        Ok(description
            .contains(video_sink_name)
            .then(|| video_sink_name.to_string()))
    }

    fn load(&mut self, request: &MediaRequest) {
        self.loaded.push(request.url().clone());
    }

    fn set_state(&mut self, state: PipelineState) -> Result<(), Error> {
        if self.refuse_states {
            return Err(Error::NoPipeline);
        }
        self.states.push(state);
        Ok(())
    }

    fn position(&self) -> Option<Duration> {
        self.position
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn seek(&mut self, rate: f64, start: Duration, stop: Duration) -> bool {
        self.seeks.push((rate, start, stop));
        true
    }

    fn buffered_ranges(&self) -> Option<Vec<(i64, i64)>> {
        self.ranges.clone()
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = Some(volume);
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = Some(muted);
    }

    fn stream_count(&self, stream_type: StreamType) -> usize {
        self.counts.get(&stream_type).copied().unwrap_or(0)
    }

    fn stream_tags(&self, stream_type: StreamType, index: usize) -> Option<TagMap> {
        self.stream_tags.get(&(stream_type, index)).cloned()
    }

    fn current_stream(&self, stream_type: StreamType) -> Option<usize> {
        self.current.get(&stream_type).copied().flatten()
    }

    fn set_current_stream(&mut self, stream_type: StreamType, index: Option<usize>) {
        self.current.insert(stream_type, index);
    }

    fn negotiated_resolution(&self) -> Option<VideoResolution> {
        self.resolution
    }

    fn null_video_sink(&self) -> String {
        NULL_SINK.to_string()
    }

    fn replace_video_sink(&mut self, old: &String, new: &String) -> Result<(), Error> {
        self.replacements.push((old.clone(), new.clone()));
        Ok(())
    }

    fn set_video_sink_state(&mut self, sink: &String, state: PipelineState) {
        self.sink_states.push((sink.clone(), state));
    }

    fn block_video_pad(&mut self) {
        self.block_requests += 1;
        if self.auto_block {
            self.pad_blocked = true;
            self.queue.push_back(SessionMessage::VideoPadBlocked);
        }
    }

    fn is_video_pad_blocked(&self) -> bool {
        self.pad_blocked
    }

    fn unblock_video_pad(&mut self) {
        self.pad_blocked = false;
    }

    fn video_converter_state(&self) -> PipelineState {
        self.last_state().unwrap_or_default()
    }

    fn set_sink_sync(&mut self, sink: &String, sync: bool) {
        self.sync.push((sink.clone(), sync));
    }

    fn set_show_preroll_frame(&mut self, sink: &String, show: bool) -> bool {
        self.preroll_frames.push((sink.clone(), show));
        !self.preroll_unsupported
    }

    fn attach_video_probe(&mut self, sink: &String, _probe: Arc<dyn BufferProbe>) {
        self.video_probe = Some(sink.clone());
    }

    fn detach_video_probe(&mut self) {
        self.video_probe = None;
    }

    fn attach_audio_probe(&mut self, _probe: Arc<dyn BufferProbe>) {
        self.audio_probe = true;
    }

    fn detach_audio_probe(&mut self) {
        self.audio_probe = false;
    }

    fn next_message(&mut self) -> Option<SessionMessage> {
        self.queue.pop_front()
    }
}

/// Video output whose sink and readiness the test flips at will.
#[derive(Debug, Clone, Default)]
pub struct MockOutput(pub Rc<RefCell<OutputState>>);

#[derive(Debug, Default)]
pub struct OutputState {
    pub sink: Option<String>,
    pub ready: bool,
    pub stops: usize,
}

impl MockOutput {
    pub fn ready(sink: &str) -> Self {
        let output = Self::default();
        output.set_sink(sink);
        output
    }

    pub fn set_sink(&self, sink: &str) {
        let mut state = self.0.borrow_mut();
        state.sink = Some(sink.to_string());
        state.ready = true;
    }

    pub fn stops(&self) -> usize {
        self.0.borrow().stops
    }
}

impl VideoOutput<String> for MockOutput {
    fn video_sink(&self) -> Option<String> {
        self.0.borrow().sink.clone()
    }

    fn is_ready(&self) -> bool {
        self.0.borrow().ready
    }

    fn stop_renderer(&self) {
        self.0.borrow_mut().stops += 1;
    }
}

pub type Session = PlayerSession<MockBackend>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn session() -> Session {
    init_logger();
    PlayerSession::new(MockBackend::new(), SessionConfig::default())
}

pub fn request(url: &str) -> MediaRequest {
    MediaRequest::new(Url::parse(url).expect("valid test url"))
}

pub fn state_changed(old: PipelineState, current: PipelineState) -> SessionMessage {
    BusMessage::from_pipeline(BusMessageKind::StateChanged {
        old,
        current,
        pending: PipelineState::VoidPending,
    })
    .into()
}

pub fn element_message(element: &str, kind: BusMessageKind) -> SessionMessage {
    BusMessage::new(MessageSource::element(element), kind).into()
}

/// Drives the session through the usual Null -> Ready -> Paused preroll.
pub fn preroll(session: &mut Session) {
    session.dispatch(state_changed(PipelineState::Null, PipelineState::Ready));
    session.dispatch(state_changed(PipelineState::Ready, PipelineState::Paused));
}

/// Loads a file, starts playback and walks the pipeline up to Playing.
pub fn playing(session: &mut Session) {
    session.load(request("file:///media/clip.mkv")).expect("load");
    assert!(session.play());
    preroll(session);
    session.dispatch(state_changed(PipelineState::Paused, PipelineState::Playing));
    assert_eq!(session.state(), PlaybackState::Playing);
}

pub fn events(session: &mut Session) -> Vec<SessionEvent> {
    session.drain_events().collect()
}

pub fn state_events(events: &[SessionEvent]) -> Vec<PlaybackState> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged(state) => Some(*state),
            _ => None,
        })
        .collect()
}
