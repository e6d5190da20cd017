use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::Error;
use crate::message::SessionMessage;
use crate::probe::BufferProbe;
use crate::request::MediaRequest;
use crate::state::PipelineState;
use crate::streams::StreamType;
use crate::tags::{TagMap, VideoResolution};

/// The native pipeline a [`PlayerSession`](crate::PlayerSession) drives.
///
/// A backend owns at most one pipeline at a time: either the default playbin
/// graph or a custom parsed one. Every call happens on the session's thread;
/// notifications from streaming threads come back through
/// [`Backend::next_message`].
pub trait Backend {
    type Sink: Clone + PartialEq + fmt::Debug;

    fn has_pipeline(&self) -> bool;

    /// Whether the current pipeline is the default playbin graph.
    fn has_playbin(&self) -> bool;

    /// Tears down whatever is loaded and builds a fresh playbin graph.
    fn rebuild_playbin(&mut self) -> Result<(), Error>;

    /// Parses `description`, tears down the current pipeline and installs the
    /// parsed one. Returns the sink named `video_sink_name`, if present.
    ///
    /// On parse failure the current pipeline is left untouched.
    fn use_custom_pipeline(
        &mut self,
        description: &str,
        video_sink_name: &str,
    ) -> Result<Option<Self::Sink>, Error>;

    /// Points playbin at the request's URL.
    fn load(&mut self, request: &MediaRequest);

    fn set_state(&mut self, state: PipelineState) -> Result<(), Error>;

    fn position(&self) -> Option<Duration>;

    fn duration(&self) -> Option<Duration>;

    fn is_seekable(&self) -> bool;

    /// Flushing time seek with the given rate; returns whether it was accepted.
    fn seek(&mut self, rate: f64, start: Duration, stop: Duration) -> bool;

    /// Buffered ranges in percent of the media, or `None` if not answered.
    fn buffered_ranges(&self) -> Option<Vec<(i64, i64)>>;

    fn set_volume(&mut self, volume: f64);

    fn set_muted(&mut self, muted: bool);

    fn stream_count(&self, stream_type: StreamType) -> usize;

    fn stream_tags(&self, stream_type: StreamType, index: usize) -> Option<TagMap>;

    fn current_stream(&self, stream_type: StreamType) -> Option<usize>;

    /// Selects a stream by per-type index; `None` deselects.
    fn set_current_stream(&mut self, stream_type: StreamType, index: Option<usize>);

    /// Geometry negotiated on the video converter's output.
    fn negotiated_resolution(&self) -> Option<VideoResolution>;

    /// Sink used when no video output is ready.
    fn null_video_sink(&self) -> Self::Sink;

    /// Unlinks and removes `old`, then adds and links `new`.
    fn replace_video_sink(&mut self, old: &Self::Sink, new: &Self::Sink) -> Result<(), Error>;

    fn set_video_sink_state(&mut self, sink: &Self::Sink, state: PipelineState);

    /// Asynchronously blocks the video converter's src pad.
    ///
    /// The backend posts [`SessionMessage::VideoPadBlocked`] once the block is in place.
    fn block_video_pad(&mut self);

    fn is_video_pad_blocked(&self) -> bool;

    fn unblock_video_pad(&mut self);

    fn video_converter_state(&self) -> PipelineState;

    fn set_sink_sync(&mut self, sink: &Self::Sink, sync: bool);

    /// Returns `false` if the sink has no such property.
    fn set_show_preroll_frame(&mut self, sink: &Self::Sink, show: bool) -> bool;

    fn attach_video_probe(&mut self, sink: &Self::Sink, probe: Arc<dyn BufferProbe>);

    fn detach_video_probe(&mut self);

    fn attach_audio_probe(&mut self, probe: Arc<dyn BufferProbe>);

    fn detach_audio_probe(&mut self);

    /// Next pending notification, marshaled onto the caller's thread.
    fn next_message(&mut self) -> Option<SessionMessage>;
}
