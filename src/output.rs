/// Front-end video output the session renders into.
///
/// When its sink or readiness changes, the output (or whoever owns it) posts
/// [`SessionMessage::VideoOutputChanged`](crate::SessionMessage::VideoOutputChanged).
pub trait VideoOutput<S> {
    /// Sink element to link into the pipeline, if any.
    fn video_sink(&self) -> Option<S>;

    fn is_ready(&self) -> bool;

    /// Called when playback stops so the output can drop the last frame.
    fn stop_renderer(&self) {}

    /// Offers the video sink found in a custom pipeline.
    ///
    /// Returns `true` if the output will render from it.
    fn adopt_sink(&self, _sink: &S) -> bool {
        false
    }
}

impl<S, T: VideoOutput<S> + ?Sized> VideoOutput<S> for std::sync::Arc<T> {
    fn video_sink(&self) -> Option<S> {
        (**self).video_sink()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn stop_renderer(&self) {
        (**self).stop_renderer()
    }

    fn adopt_sink(&self, sink: &S) -> bool {
        (**self).adopt_sink(sink)
    }
}
