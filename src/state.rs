#[cfg(feature = "gstreamer")]
use gstreamer as gst;

/// Playback state as seen by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

impl PlaybackState {
    /// The pipeline state that realizes this playback state.
    pub fn pipeline_state(self) -> PipelineState {
        match self {
            PlaybackState::Stopped => PipelineState::Null,
            PlaybackState::Paused => PipelineState::Paused,
            PlaybackState::Playing => PipelineState::Playing,
        }
    }
}

/// State of the native pipeline or one of its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineState {
    VoidPending,
    #[default]
    Null,
    Ready,
    Paused,
    Playing,
}

#[cfg(feature = "gstreamer")]
impl From<gst::State> for PipelineState {
    fn from(state: gst::State) -> Self {
        match state {
            gst::State::Null => PipelineState::Null,
            gst::State::Ready => PipelineState::Ready,
            gst::State::Paused => PipelineState::Paused,
            gst::State::Playing => PipelineState::Playing,
            _ => PipelineState::VoidPending,
        }
    }
}

#[cfg(feature = "gstreamer")]
impl From<PipelineState> for gst::State {
    fn from(state: PipelineState) -> Self {
        match state {
            PipelineState::VoidPending => gst::State::VoidPending,
            PipelineState::Null => gst::State::Null,
            PipelineState::Ready => gst::State::Ready,
            PipelineState::Paused => gst::State::Paused,
            PipelineState::Playing => gst::State::Playing,
        }
    }
}
