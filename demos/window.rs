use gpui::{App, Application, WindowOptions, prelude::*};
use gst_player_session::{MediaRequest, PlayerView, Url};
use std::path::PathBuf;

fn main() {
    env_logger::init();
    Application::new().run(|cx: &mut App| {
        let uri = Url::from_file_path(
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("./assets/test.mp4"),
        )
        .expect("invalid file path");

        cx.open_window(
            WindowOptions {
                focus: true,
                ..Default::default()
            },
            |_, cx| {
                let view = PlayerView::open(MediaRequest::new(uri)).expect("failed to open media");
                cx.new(|_| view)
            },
        )
        .unwrap();
        cx.activate(true);
    });
}
