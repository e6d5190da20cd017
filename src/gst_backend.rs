use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_base as gst_base;
use gstreamer_base::prelude::*;
use gstreamer_video as gst_video;
use parking_lot::Mutex;

use crate::Error;
use crate::backend::Backend;
use crate::config::SessionConfig;
use crate::message::{
    BusMessage, MessageReceiver, MessageSender, SessionMessage, message_channel,
};
use crate::probe::{BufferInfo, BufferProbe};
use crate::request::MediaRequest;
use crate::source::{SourceInfo, SourceKind, SourceSettings, SourceTimeout};
use crate::state::PipelineState;
use crate::streams::StreamType;
use crate::tags::{TagMap, VideoResolution};

/// `GST_FORMAT_PERCENT_MAX`: buffering ranges are scaled to this.
const PERCENT_MAX: i64 = 1_000_000;

#[derive(Debug)]
struct PlaybinGraph {
    playbin: gst::Element,
    bus: gst::Bus,
    video_bin: gst::Bin,
    converter: gst::Element,
    audio_sink: gst::Element,
    volume: Option<gst::Element>,
}

#[derive(Debug)]
enum Graph {
    Playbin(PlaybinGraph),
    Custom { pipeline: gst::Element, bus: gst::Bus },
}

impl Graph {
    fn pipeline(&self) -> &gst::Element {
        match self {
            Graph::Playbin(g) => &g.playbin,
            Graph::Custom { pipeline, .. } => pipeline,
        }
    }

    fn bus(&self) -> &gst::Bus {
        match self {
            Graph::Playbin(g) => &g.bus,
            Graph::Custom { bus, .. } => bus,
        }
    }
}

/// [`Backend`] over a GStreamer `playbin`, or a pipeline parsed from a description.
#[derive(Debug)]
pub struct GstBackend {
    config: Arc<SessionConfig>,
    graph: Option<Graph>,
    null_sink: gst::Element,
    tx: MessageSender,
    rx: MessageReceiver,
    /// Read by `source-setup` on a streaming thread.
    request: Arc<Mutex<Option<MediaRequest>>>,
    block_probe: Option<gst::PadProbeId>,
    video_probe: Option<(gst::Pad, gst::PadProbeId)>,
    audio_probe: Option<(gst::Pad, gst::PadProbeId)>,
}

impl GstBackend {
    /// Initializes GStreamer and builds the default playbin graph.
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        gst::init()?;

        let null_sink = gst::ElementFactory::make("fakesink")
            .property("sync", true)
            .build()?;
        let (tx, rx) = message_channel();

        let mut backend = Self {
            config: Arc::new(config),
            graph: None,
            null_sink,
            tx,
            rx,
            request: Arc::new(Mutex::new(None)),
            block_probe: None,
            video_probe: None,
            audio_probe: None,
        };
        backend.rebuild_playbin()?;
        Ok(backend)
    }

    /// Sender for notifications that should reach the session, e.g. from a video output.
    pub fn sender(&self) -> MessageSender {
        self.tx.clone()
    }

    /// The pipeline currently installed.
    pub fn pipeline(&self) -> Option<&gst::Element> {
        self.graph.as_ref().map(Graph::pipeline)
    }

    fn playbin(&self) -> Option<&PlaybinGraph> {
        match &self.graph {
            Some(Graph::Playbin(g)) => Some(g),
            _ => None,
        }
    }

    fn converter_src(&self) -> Option<gst::Pad> {
        self.playbin().and_then(|g| g.converter.static_pad("src"))
    }

    fn teardown(&mut self) {
        self.detach_video_probe();
        self.detach_audio_probe();
        self.unblock_video_pad();

        if let Some(graph) = self.graph.take() {
            if let Err(err) = graph.pipeline().set_state(gst::State::Null) {
                log::warn!("failed to shut down pipeline: {err}");
            }
            if let Graph::Playbin(g) = &graph {
                // The null sink outlives the graph.
                if self.null_sink.parent().as_ref() == Some(g.video_bin.upcast_ref()) {
                    if let Err(err) = g.video_bin.remove(&self.null_sink) {
                        log::warn!("failed to detach null video sink: {err}");
                    }
                }
            }
        }
    }

    fn build_playbin(&self) -> Result<PlaybinGraph, Error> {
        let config = &self.config;
        let playbin = gst::ElementFactory::make("playbin")
            .name("mediaplayer")
            .build()?;
        playbin.set_property_from_str("flags", &config.playbin_flags());

        let converter = match &config.video_convert {
            Some(description) => gst::parse::bin_from_description(description, true)
                .map_err(|err| Error::PipelineDescription(err.to_string()))?
                .upcast(),
            None => gst::ElementFactory::make("identity").build()?,
        };

        let video_bin = gst::Bin::builder().name("video-output-bin").build();
        video_bin.add_many([&converter, &self.null_sink])?;
        converter
            .link(&self.null_sink)
            .map_err(|_| Error::Link("video converter to sink"))?;
        let pad = converter
            .static_pad("sink")
            .ok_or(Error::Link("video converter"))?;
        let ghost = gst::GhostPad::with_target(&pad)?;
        ghost.set_active(true)?;
        video_bin.add_pad(&ghost)?;
        playbin.set_property("video-sink", &video_bin);

        let factory = config.audio_sink.as_deref().unwrap_or("autoaudiosink");
        let sink = gst::ElementFactory::make(factory).build()?;
        let (audio_sink, volume) = if config.use_playbin_volume {
            (sink, None)
        } else {
            let volume = gst::ElementFactory::make("volume").build()?;
            let audio_bin = gst::Bin::builder().name("audio-output-bin").build();
            audio_bin.add_many([&volume, &sink])?;
            volume
                .link(&sink)
                .map_err(|_| Error::Link("volume to audio sink"))?;
            let pad = volume.static_pad("sink").ok_or(Error::Link("volume"))?;
            let ghost = gst::GhostPad::with_target(&pad)?;
            ghost.set_active(true)?;
            audio_bin.add_pad(&ghost)?;
            (audio_bin.upcast(), Some(volume))
        };
        playbin.set_property("audio-sink", &audio_sink);

        self.connect_signals(&playbin, volume.as_ref());

        let bus = playbin.bus().ok_or(Error::Bus)?;
        Ok(PlaybinGraph {
            playbin,
            bus,
            video_bin,
            converter,
            audio_sink,
            volume,
        })
    }

    fn connect_signals(&self, playbin: &gst::Element, volume: Option<&gst::Element>) {
        let tx = self.tx.clone();
        let config = self.config.clone();
        let request = self.request.clone();
        playbin.connect("source-setup", false, move |values| {
            let source = values.get(1)?.get::<gst::Element>().ok()?;
            let info = configure_source(&source, request.lock().as_ref(), &config);
            tx.send(SessionMessage::SourceConfigured(info));
            None
        });

        for signal in ["video-changed", "audio-changed", "text-changed"] {
            let tx = self.tx.clone();
            playbin.connect(signal, false, move |_| {
                tx.send(SessionMessage::StreamsChanged);
                None
            });
        }

        if let Some(bin) = playbin.downcast_ref::<gst::Bin>() {
            bin.connect_deep_element_added(|_, _, element| {
                let is_queue2 = element
                    .factory()
                    .is_some_and(|factory| factory.name() == "queue2");
                if is_queue2 && element.has_property("temp-template") {
                    // No on-disk buffering.
                    element.set_property("temp-template", None::<&str>);
                }
            });
        }

        let volume_owner = volume.unwrap_or(playbin);
        let tx = self.tx.clone();
        volume_owner.connect_notify(Some("volume"), move |element, _| {
            tx.send(SessionMessage::VolumeNotify(element.property::<f64>("volume")));
        });
        let tx = self.tx.clone();
        volume_owner.connect_notify(Some("mute"), move |element, _| {
            tx.send(SessionMessage::MuteNotify(element.property::<bool>("mute")));
        });
    }

    fn stream_prefix(stream_type: StreamType) -> &'static str {
        match stream_type {
            StreamType::Audio => "audio",
            StreamType::Video => "video",
            StreamType::Subtitle => "text",
        }
    }
}

/// Applies the planned settings to playbin's new source element.
fn configure_source(
    source: &gst::Element,
    request: Option<&MediaRequest>,
    config: &SessionConfig,
) -> SourceInfo {
    let kind = source
        .factory()
        .map(|factory| SourceKind::from_factory_name(factory.name().as_str()))
        .unwrap_or_default();
    let settings = SourceSettings::plan(kind, request, config);
    log::debug!("configuring {kind:?} source: {settings:?}");

    if let Some(agent) = &settings.user_agent {
        if source.has_property("user-agent") {
            source.set_property("user-agent", agent.as_str());
        }
    }
    if !settings.extra_headers.is_empty() && source.has_property("extra-headers") {
        let mut extras = gst::Structure::new_empty("extras");
        for (name, value) in &settings.extra_headers {
            extras.set(name.as_str(), value.as_str());
        }
        source.set_property("extra-headers", extras);
    }
    if let Some(timeout) = settings.timeout {
        let property = timeout.property();
        if source.has_property(property) {
            match timeout {
                SourceTimeout::Nanos(v) | SourceTimeout::TcpMicros(v) => {
                    source.set_property(property, v)
                }
                SourceTimeout::Secs(v) => source.set_property(property, v),
            }
        }
    }
    if let Some(caps) = &settings.udp_caps {
        match caps.parse::<gst::Caps>() {
            Ok(caps) => source.set_property("caps", caps),
            Err(err) => log::warn!("ignoring invalid udpsrc caps {caps:?}: {err}"),
        }
    }
    if let Some(mode) = settings.buffer_mode {
        if source.has_property("buffer-mode") {
            source.set_property_from_str("buffer-mode", mode);
        }
    }

    let live = if kind.always_live() {
        true
    } else if kind == SourceKind::Http && source.has_property("is-live") {
        source.property::<bool>("is-live")
    } else {
        source
            .downcast_ref::<gst_base::BaseSrc>()
            .is_some_and(|src| src.is_live())
    };
    SourceInfo { kind, live }
}

fn clock_time(d: Duration) -> gst::ClockTime {
    gst::ClockTime::from_nseconds(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

impl Backend for GstBackend {
    type Sink = gst::Element;

    fn has_pipeline(&self) -> bool {
        self.graph.is_some()
    }

    fn has_playbin(&self) -> bool {
        matches!(self.graph, Some(Graph::Playbin(_)))
    }

    fn rebuild_playbin(&mut self) -> Result<(), Error> {
        self.teardown();
        let graph = self.build_playbin()?;
        self.graph = Some(Graph::Playbin(graph));
        Ok(())
    }

    fn use_custom_pipeline(
        &mut self,
        description: &str,
        video_sink_name: &str,
    ) -> Result<Option<gst::Element>, Error> {
        let pipeline = gst::parse::launch(description)
            .map_err(|err| Error::PipelineDescription(err.to_string()))?;
        let bus = pipeline.bus().ok_or(Error::Bus)?;
        let sink = pipeline
            .downcast_ref::<gst::Bin>()
            .and_then(|bin| bin.by_name(video_sink_name));

        self.teardown();
        self.graph = Some(Graph::Custom { pipeline, bus });
        Ok(sink)
    }

    fn load(&mut self, request: &MediaRequest) {
        *self.request.lock() = Some(request.clone());
        if let Some(g) = self.playbin() {
            g.playbin.set_property("uri", request.url().as_str());
        }
    }

    fn set_state(&mut self, state: PipelineState) -> Result<(), Error> {
        let pipeline = self.pipeline().ok_or(Error::NoPipeline)?;
        pipeline.set_state(state.into())?;
        Ok(())
    }

    fn position(&self) -> Option<Duration> {
        self.pipeline()?
            .query_position::<gst::ClockTime>()
            .map(|t| Duration::from_nanos(t.nseconds()))
    }

    fn duration(&self) -> Option<Duration> {
        self.pipeline()?
            .query_duration::<gst::ClockTime>()
            .map(|t| Duration::from_nanos(t.nseconds()))
    }

    fn is_seekable(&self) -> bool {
        let Some(pipeline) = self.pipeline() else {
            return false;
        };
        let mut query = gst::query::Seeking::new(gst::Format::Time);
        pipeline.query(&mut query) && query.result().0
    }

    fn seek(&mut self, rate: f64, start: Duration, stop: Duration) -> bool {
        let Some(pipeline) = self.pipeline() else {
            return false;
        };
        let stop = (!stop.is_zero()).then(|| clock_time(stop));
        match pipeline.seek(
            rate,
            gst::SeekFlags::FLUSH,
            gst::SeekType::Set,
            clock_time(start),
            gst::SeekType::Set,
            stop,
        ) {
            Ok(()) => true,
            Err(err) => {
                log::debug!("seek rejected: {err}");
                false
            }
        }
    }

    fn buffered_ranges(&self) -> Option<Vec<(i64, i64)>> {
        let pipeline = self.pipeline()?;
        let mut query = gst::query::Buffering::new(gst::Format::Percent);
        if !pipeline.query(&mut query) {
            return None;
        }
        let to_percent = |v: gst::GenericFormattedValue| v.value() * 100 / PERCENT_MAX;
        Some(
            query
                .ranges()
                .into_iter()
                .map(|(start, stop)| (to_percent(start), to_percent(stop)))
                .collect(),
        )
    }

    fn set_volume(&mut self, volume: f64) {
        if let Some(g) = self.playbin() {
            g.volume
                .as_ref()
                .unwrap_or(&g.playbin)
                .set_property("volume", volume);
        }
    }

    fn set_muted(&mut self, muted: bool) {
        if let Some(g) = self.playbin() {
            g.volume
                .as_ref()
                .unwrap_or(&g.playbin)
                .set_property("mute", muted);
        }
    }

    fn stream_count(&self, stream_type: StreamType) -> usize {
        let Some(g) = self.playbin() else {
            return 0;
        };
        let property = format!("n-{}", Self::stream_prefix(stream_type));
        usize::try_from(g.playbin.property::<i32>(&property)).unwrap_or(0)
    }

    fn stream_tags(&self, stream_type: StreamType, index: usize) -> Option<TagMap> {
        let g = self.playbin()?;
        let signal = format!("get-{}-tags", Self::stream_prefix(stream_type));
        let index = i32::try_from(index).ok()?;
        g.playbin
            .emit_by_name::<Option<gst::TagList>>(&signal, &[&index])
            .map(|tags| TagMap::from(&*tags))
    }

    fn current_stream(&self, stream_type: StreamType) -> Option<usize> {
        let g = self.playbin()?;
        let property = format!("current-{}", Self::stream_prefix(stream_type));
        usize::try_from(g.playbin.property::<i32>(&property)).ok()
    }

    fn set_current_stream(&mut self, stream_type: StreamType, index: Option<usize>) {
        let Some(g) = self.playbin() else {
            return;
        };
        let property = format!("current-{}", Self::stream_prefix(stream_type));
        let value = index.and_then(|i| i32::try_from(i).ok()).unwrap_or(-1);
        g.playbin.set_property(&property, value);
    }

    fn negotiated_resolution(&self) -> Option<VideoResolution> {
        let caps = self.converter_src()?.current_caps()?;
        let info = gst_video::VideoInfo::from_caps(&caps).ok()?;
        let par = info.par();
        Some(VideoResolution {
            width: info.width(),
            height: info.height(),
            pixel_aspect_ratio: Some((par.numer(), par.denom())),
        })
    }

    fn null_video_sink(&self) -> gst::Element {
        self.null_sink.clone()
    }

    fn replace_video_sink(&mut self, old: &gst::Element, new: &gst::Element) -> Result<(), Error> {
        let g = self.playbin().ok_or(Error::NoPipeline)?;
        if old.parent().as_ref() == Some(g.video_bin.upcast_ref()) {
            g.converter.unlink(old);
            g.video_bin.remove(old)?;
        }
        g.video_bin.add(new)?;
        g.converter
            .link(new)
            .map_err(|_| Error::Link("video converter to sink"))?;
        Ok(())
    }

    fn set_video_sink_state(&mut self, sink: &gst::Element, state: PipelineState) {
        if let Err(err) = sink.set_state(state.into()) {
            log::warn!("failed to set {} to {state:?}: {err}", sink.name());
        }
    }

    fn block_video_pad(&mut self) {
        if self.block_probe.is_some() {
            return;
        }
        let Some(pad) = self.converter_src() else {
            return;
        };
        let tx = self.tx.clone();
        let notified = AtomicBool::new(false);
        self.block_probe = pad.add_probe(gst::PadProbeType::BLOCK_DOWNSTREAM, move |_, _| {
            if !notified.swap(true, Ordering::SeqCst) {
                tx.send(SessionMessage::VideoPadBlocked);
            }
            gst::PadProbeReturn::Ok
        });
    }

    fn is_video_pad_blocked(&self) -> bool {
        self.converter_src().is_some_and(|pad| pad.is_blocked())
    }

    fn unblock_video_pad(&mut self) {
        if let Some(id) = self.block_probe.take() {
            if let Some(pad) = self.converter_src() {
                pad.remove_probe(id);
            }
        }
    }

    fn video_converter_state(&self) -> PipelineState {
        self.playbin()
            .map(|g| g.converter.current_state().into())
            .unwrap_or_default()
    }

    fn set_sink_sync(&mut self, sink: &gst::Element, sync: bool) {
        if sink.has_property("sync") {
            sink.set_property("sync", sync);
        }
    }

    fn set_show_preroll_frame(&mut self, sink: &gst::Element, show: bool) -> bool {
        if sink.has_property("show-preroll-frame") {
            sink.set_property("show-preroll-frame", show);
            true
        } else {
            false
        }
    }

    fn attach_video_probe(&mut self, sink: &gst::Element, probe: Arc<dyn BufferProbe>) {
        self.detach_video_probe();
        if let Some(pad) = sink.static_pad("sink") {
            self.video_probe = add_buffer_probe(pad, probe);
        }
    }

    fn detach_video_probe(&mut self) {
        if let Some((pad, id)) = self.video_probe.take() {
            pad.remove_probe(id);
        }
    }

    fn attach_audio_probe(&mut self, probe: Arc<dyn BufferProbe>) {
        self.detach_audio_probe();
        let pad = self.playbin().and_then(|g| g.audio_sink.static_pad("sink"));
        if let Some(pad) = pad {
            self.audio_probe = add_buffer_probe(pad, probe);
        }
    }

    fn detach_audio_probe(&mut self) {
        if let Some((pad, id)) = self.audio_probe.take() {
            pad.remove_probe(id);
        }
    }

    fn next_message(&mut self) -> Option<SessionMessage> {
        if let Some(msg) = self.rx.try_recv() {
            return Some(msg);
        }
        let graph = self.graph.as_ref()?;
        while let Some(msg) = graph.bus().pop() {
            if let Some(msg) = BusMessage::from_gst(&msg, graph.pipeline()) {
                return Some(msg.into());
            }
        }
        None
    }
}

fn add_buffer_probe(
    pad: gst::Pad,
    probe: Arc<dyn BufferProbe>,
) -> Option<(gst::Pad, gst::PadProbeId)> {
    let id = pad.add_probe(gst::PadProbeType::BUFFER, move |_, info| {
        if let Some(buffer) = info.buffer() {
            probe.on_buffer(&BufferInfo {
                pts: buffer.pts().map(|t| Duration::from_nanos(t.nseconds())),
                duration: buffer.duration().map(|t| Duration::from_nanos(t.nseconds())),
                size: buffer.size(),
            });
        }
        gst::PadProbeReturn::Ok
    })?;
    Some((pad, id))
}

impl Drop for GstBackend {
    fn drop(&mut self) {
        self.teardown();
    }
}
