use std::sync::Arc;

use gpui::{Context, EventEmitter, IntoElement, ParentElement, Render, Styled, Window, div};

use crate::element::video;
use crate::frame_output::FrameOutput;
use crate::gst_backend::GstBackend;
use crate::session::{PlayerSession, SessionEvent};
use crate::{Error, MediaRequest, SessionConfig};

/// GPUI view that owns a session and renders its frames.
///
/// Each render pumps the session and re-emits its [`SessionEvent`]s.
pub struct PlayerView {
    session: PlayerSession<GstBackend>,
    output: Arc<FrameOutput>,
}

impl PlayerView {
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        let backend = GstBackend::new(config.clone())?;
        let output = Arc::new(FrameOutput::new()?);
        let mut session = PlayerSession::new(backend, config);
        session.set_video_output(Some(Box::new(Arc::clone(&output))));
        Ok(Self { session, output })
    }

    /// Creates a view and starts playing `request`.
    pub fn open(request: MediaRequest) -> Result<Self, Error> {
        let mut view = Self::new(SessionConfig::from_env())?;
        view.session.load(request)?;
        view.session.play();
        Ok(view)
    }

    pub fn session(&self) -> &PlayerSession<GstBackend> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PlayerSession<GstBackend> {
        &mut self.session
    }

    fn pump(&mut self, cx: &mut Context<Self>) {
        self.session.pump();
        let mut changed = false;
        for event in self.session.drain_events() {
            if let SessionEvent::Error(err) = &event {
                log::error!("playback failed: {err}");
            }
            cx.emit(event);
            changed = true;
        }
        if changed {
            cx.notify();
        }
    }
}

impl EventEmitter<SessionEvent> for PlayerView {}

impl Render for PlayerView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        self.pump(cx);

        // Bus messages and duration retries only get handled from here.
        let active = !self.session.is_idle();
        div()
            .size_full()
            .flex()
            .items_center()
            .justify_center()
            .child(video(Arc::clone(&self.output)).active(active))
    }
}
