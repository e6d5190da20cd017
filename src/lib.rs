//! # GStreamer Player Session
//!
//! A media player session built on GStreamer `playbin`.
//!
//! ## Features
//!
//! - Stopped / Paused / Playing state machine driven by bus messages
//! - Playback control (play, pause, stop, seek, rate)
//! - Stream inventory with flat indices across audio, video and subtitles
//! - Video output switching without stopping playback
//! - Native errors classified into format, network, resource and access errors
//! - Custom pipelines through `gst-pipeline:` URLs
//! - Audio control (volume, muting) and buffer probes
//! - Optional GPUI view rendering NV12 frames
//!
//! ## Example
//!
//! ```no_run
//! use gst_player_session::{GstBackend, MediaRequest, PlayerSession, SessionConfig, Url};
//!
//! let config = SessionConfig::from_env();
//! let backend = GstBackend::new(config.clone()).unwrap();
//! let mut session = PlayerSession::new(backend, config);
//!
//! let url = Url::parse("file:///path/to/video.mp4").unwrap();
//! session.load(MediaRequest::new(url)).unwrap();
//! session.play();
//!
//! loop {
//!     session.pump();
//!     for event in session.drain_events() {
//!         println!("{event:?}");
//!     }
//!     # break;
//! }
//! ```

mod backend;
mod classify;
mod config;
mod duration;
mod error;
mod message;
mod output;
mod probe;
mod request;
mod session;
mod sink_switch;
mod source;
mod state;
mod streams;
mod tags;

#[cfg(feature = "gstreamer")]
mod frame_output;
#[cfg(feature = "gstreamer")]
mod gst_backend;

#[cfg(feature = "gpui")]
mod element;
#[cfg(feature = "gpui")]
mod video_player;

pub use backend::Backend;
pub use classify::{ErrorContext, classify_error, udp_timeout_kind};
pub use config::SessionConfig;
pub use duration::{BASE_RETRY_DELAY, DurationPoller, MAX_DURATION_RETRIES};
pub use error::{Error, MediaError, MediaErrorKind};
pub use message::{
    BusMessage, BusMessageKind, ErrorDomain, MessageReceiver, MessageSender, MessageSource,
    NativeError, ResourceErrorCode, SessionMessage, StreamErrorCode, message_channel,
};
pub use output::VideoOutput;
pub use probe::{BufferInfo, BufferProbe};
pub use request::{MediaRequest, PIPELINE_SCHEME};
pub use session::{PlayerSession, SessionEvent};
pub use sink_switch::{SwitchOutcome, SwitchRequest, VideoSinkSwitcher};
pub use source::{SourceInfo, SourceKind, SourceSettings, SourceTimeout};
pub use state::{PipelineState, PlaybackState};
pub use streams::{StreamDescriptor, StreamInventory, StreamType};
pub use tags::{TagMap, TagValue, VideoResolution};

#[cfg(feature = "gstreamer")]
pub use frame_output::{FrameOutput, Nv12Frame};
#[cfg(feature = "gstreamer")]
pub use gst_backend::GstBackend;

#[cfg(feature = "gpui")]
pub use element::{VideoElement, video};
#[cfg(feature = "gpui")]
pub use video_player::PlayerView;

// Re-export commonly used types
pub use url::Url;
#[cfg(feature = "gstreamer")]
pub use gstreamer as gst;
