use std::fmt;

#[cfg(feature = "gstreamer")]
use gstreamer as gst;
use thiserror::Error;

/// Errors returned by fallible session and backend operations.
#[derive(Debug, Error)]
pub enum Error {
    #[cfg(feature = "gstreamer")]
    #[error("{0}")]
    Glib(#[from] glib::Error),
    #[cfg(feature = "gstreamer")]
    #[error("{0}")]
    Bool(#[from] glib::BoolError),
    #[cfg(feature = "gstreamer")]
    #[error("{0}")]
    StateChange(#[from] gst::StateChangeError),
    #[error("failed to get the gstreamer bus")]
    Bus,
    #[error("failed to cast gstreamer element")]
    Cast,
    #[error("failed to link {0}")]
    Link(&'static str),
    #[error("no pipeline is loaded")]
    NoPipeline,
    #[error("invalid pipeline description: {0}")]
    PipelineDescription(String),
    #[error("{0}")]
    Config(#[from] toml::de::Error),
}

/// Category a native pipeline error is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaErrorKind {
    /// The media format is not supported, typically a missing codec.
    Format,
    /// A remote resource failed.
    Network,
    /// A local resource failed, or a remote one failed before playback started.
    Resource,
    /// The stream could not be decrypted.
    AccessDenied,
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaErrorKind::Format => "format error",
            MediaErrorKind::Network => "network error",
            MediaErrorKind::Resource => "resource error",
            MediaErrorKind::AccessDenied => "access denied",
        };
        f.write_str(name)
    }
}

/// A classified playback error, as surfaced to the front end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct MediaError {
    pub kind: MediaErrorKind,
    pub message: String,
}

impl MediaError {
    pub fn new(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
