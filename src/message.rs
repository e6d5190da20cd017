use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

#[cfg(feature = "gstreamer")]
use gstreamer as gst;

use crate::source::SourceInfo;
use crate::state::PipelineState;
use crate::tags::TagMap;

/// Name playbin gives the source element it creates for the URI.
pub const SOURCE_ELEMENT: &str = "source";
/// Structure name of the element message `udpsrc` posts on timeout.
pub const UDP_TIMEOUT_STRUCTURE: &str = "GstUDPSrcTimeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceErrorCode {
    Busy,
    NotFound,
    OpenRead,
    Read,
    Seek,
    Sync,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamErrorCode {
    CodecNotFound,
    Decrypt,
    DecryptNoKey,
    Other,
}

/// Error domain and code of a native error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    Core,
    Library,
    Resource(ResourceErrorCode),
    Stream(StreamErrorCode),
    Other,
}

/// Error, warning or info payload carried by a bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub domain: ErrorDomain,
    pub message: String,
    pub debug: Option<String>,
}

impl NativeError {
    pub fn new(domain: ErrorDomain, message: impl Into<String>) -> Self {
        Self {
            domain,
            message: message.into(),
            debug: None,
        }
    }
}

#[cfg(feature = "gstreamer")]
impl From<&glib::Error> for NativeError {
    fn from(err: &glib::Error) -> Self {
        let domain = if let Some(code) = err.kind::<gst::ResourceError>() {
            ErrorDomain::Resource(match code {
                gst::ResourceError::Busy => ResourceErrorCode::Busy,
                gst::ResourceError::NotFound => ResourceErrorCode::NotFound,
                gst::ResourceError::OpenRead => ResourceErrorCode::OpenRead,
                gst::ResourceError::Read => ResourceErrorCode::Read,
                gst::ResourceError::Seek => ResourceErrorCode::Seek,
                gst::ResourceError::Sync => ResourceErrorCode::Sync,
                _ => ResourceErrorCode::Other,
            })
        } else if let Some(code) = err.kind::<gst::StreamError>() {
            ErrorDomain::Stream(match code {
                gst::StreamError::CodecNotFound => StreamErrorCode::CodecNotFound,
                gst::StreamError::Decrypt => StreamErrorCode::Decrypt,
                gst::StreamError::DecryptNokey => StreamErrorCode::DecryptNoKey,
                _ => StreamErrorCode::Other,
            })
        } else if err.kind::<gst::CoreError>().is_some() {
            ErrorDomain::Core
        } else if err.kind::<gst::LibraryError>().is_some() {
            ErrorDomain::Library
        } else {
            ErrorDomain::Other
        };
        Self::new(domain, err.message())
    }
}

/// Object that posted a bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSource {
    /// The top-level pipeline.
    Pipeline,
    /// A child element, by object name.
    Element(String),
}

impl MessageSource {
    pub fn element(name: impl Into<String>) -> Self {
        MessageSource::Element(name.into())
    }

    /// Whether the message came from playbin's source element.
    pub fn is_source_element(&self) -> bool {
        matches!(self, MessageSource::Element(name) if name == SOURCE_ELEMENT)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BusMessageKind {
    StateChanged {
        old: PipelineState,
        current: PipelineState,
        pending: PipelineState,
    },
    Eos,
    Tag(TagMap),
    DurationChanged,
    Buffering(i32),
    Error(NativeError),
    Warning(NativeError),
    Info(NativeError),
    SegmentStart(Duration),
    AsyncDone,
    /// Element-specific message, by structure name.
    Element(String),
}

/// A pipeline bus message, reduced to what the session acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub source: MessageSource,
    pub kind: BusMessageKind,
}

impl BusMessage {
    pub fn new(source: MessageSource, kind: BusMessageKind) -> Self {
        Self { source, kind }
    }

    pub fn from_pipeline(kind: BusMessageKind) -> Self {
        Self::new(MessageSource::Pipeline, kind)
    }

    /// Translates a GStreamer message; `pipeline` decides which messages count as root ones.
    #[cfg(feature = "gstreamer")]
    pub fn from_gst(msg: &gst::Message, pipeline: &gst::Element) -> Option<Self> {
        use gst::MessageView;
        use gst::prelude::*;

        let source = match msg.src() {
            Some(src) if src == pipeline.upcast_ref::<gst::Object>() => MessageSource::Pipeline,
            Some(src) => MessageSource::Element(src.name().to_string()),
            None => MessageSource::Element(String::new()),
        };

        let kind = match msg.view() {
            MessageView::StateChanged(s) => BusMessageKind::StateChanged {
                old: s.old().into(),
                current: s.current().into(),
                pending: s.pending().into(),
            },
            MessageView::Eos(_) => BusMessageKind::Eos,
            MessageView::Tag(t) => BusMessageKind::Tag(TagMap::from(&*t.tags())),
            MessageView::DurationChanged(_) => BusMessageKind::DurationChanged,
            MessageView::Buffering(b) => BusMessageKind::Buffering(b.percent()),
            MessageView::Error(e) => {
                let mut err = NativeError::from(&e.error());
                err.debug = e.debug().map(|d| d.to_string());
                BusMessageKind::Error(err)
            }
            MessageView::Warning(w) => {
                let mut err = NativeError::from(&w.error());
                err.debug = w.debug().map(|d| d.to_string());
                BusMessageKind::Warning(err)
            }
            MessageView::Info(i) => BusMessageKind::Info(NativeError::from(&i.error())),
            MessageView::SegmentStart(s) => match s.get() {
                gst::GenericFormattedValue::Time(Some(t)) => {
                    BusMessageKind::SegmentStart(Duration::from_nanos(t.nseconds()))
                }
                _ => return None,
            },
            MessageView::AsyncDone(_) => BusMessageKind::AsyncDone,
            MessageView::Element(e) => BusMessageKind::Element(e.structure()?.name().to_string()),
            _ => return None,
        };

        Some(Self { source, kind })
    }
}

/// Everything that can drive the session, funneled through one dispatch point.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    Bus(BusMessage),
    /// The video converter's src pad reported the requested block.
    VideoPadBlocked,
    /// The pipeline's audio, video or text stream set changed.
    StreamsChanged,
    /// Playbin's own volume property changed.
    VolumeNotify(f64),
    /// Playbin's own mute property changed.
    MuteNotify(bool),
    /// Playbin created and configured its source element.
    SourceConfigured(SourceInfo),
    /// The video output's sink or readiness changed.
    VideoOutputChanged,
}

impl From<BusMessage> for SessionMessage {
    fn from(msg: BusMessage) -> Self {
        SessionMessage::Bus(msg)
    }
}

/// Sending half of a session's message queue. Cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct MessageSender(Sender<SessionMessage>);

impl MessageSender {
    pub fn send(&self, msg: SessionMessage) {
        if self.0.send(msg).is_err() {
            log::trace!("session is gone, dropping message");
        }
    }
}

/// Receiving half of a session's message queue, drained on the session's thread.
#[derive(Debug)]
pub struct MessageReceiver(Receiver<SessionMessage>);

impl MessageReceiver {
    pub fn try_recv(&self) -> Option<SessionMessage> {
        match self.0.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

pub fn message_channel() -> (MessageSender, MessageReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (MessageSender(tx), MessageReceiver(rx))
}
