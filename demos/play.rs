use std::path::PathBuf;
use std::time::{Duration, Instant};

use gst_player_session::{
    GstBackend, MediaRequest, PlaybackState, PlayerSession, SessionConfig, SessionEvent, Url,
};

const TICK: Duration = Duration::from_millis(50);

fn main() {
    env_logger::init();

    let uri = match std::env::args().nth(1) {
        Some(arg) => Url::parse(&arg)
            .or_else(|_| Url::from_file_path(std::fs::canonicalize(&arg).expect("no such file")))
            .expect("invalid uri"),
        None => Url::from_file_path(
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("./assets/test.mp4"),
        )
        .expect("invalid file path"),
    };

    let config = SessionConfig::from_env();
    let backend = GstBackend::new(config.clone()).expect("failed to create backend");
    let mut session = PlayerSession::new(backend, config);

    session
        .load(MediaRequest::new(uri).header("User-Agent", "gst-player-session demo"))
        .expect("failed to load media");
    session.play();

    let mut last_report = Instant::now();
    loop {
        session.pump();
        for event in session.drain_events().collect::<Vec<_>>() {
            match event {
                SessionEvent::PlaybackFinished => {
                    session.end_of_media_reset();
                    return;
                }
                SessionEvent::Error(err) => {
                    eprintln!("{err}");
                    return;
                }
                event => println!("{event:?}"),
            }
        }

        if session.state() == PlaybackState::Playing
            && last_report.elapsed() >= Duration::from_secs(1)
        {
            println!("{:?} / {:?}", session.position(), session.duration());
            last_report = Instant::now();
        }

        let wake = session.next_deadline().map_or(TICK, |deadline| {
            deadline.saturating_duration_since(Instant::now()).min(TICK)
        });
        std::thread::sleep(wake);
    }
}
