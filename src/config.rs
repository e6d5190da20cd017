use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::Error;

const ENV_USE_PLAYBIN_VOLUME: &str = "GST_PLAYER_USE_PLAYBIN_VOLUME";
const ENV_PLAYBIN_FLAGS: &str = "GST_PLAYER_PLAYBIN_FLAGS";
const ENV_AUDIO_SINK: &str = "GST_PLAYER_AUDIOSINK";
const ENV_VIDEO_CONVERT: &str = "GST_PLAYER_VIDEO_CONVERT";
const ENV_SOURCE_TIMEOUT: &str = "GST_PLAYER_SOURCE_TIMEOUT";
const ENV_VIDEO_SINK_NAME: &str = "GST_PLAYER_VIDEO_SINK_NAME";

/// Tunables for the default pipeline and its sources.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    /// Control volume through playbin's own `volume`/`mute` instead of a volume element.
    pub use_playbin_volume: bool,
    /// Extra playbin flags, e.g. `"text+buffering"`. Video and audio are always on.
    pub playbin_flags: Option<String>,
    /// Audio sink factory name; `autoaudiosink` when unset.
    pub audio_sink: Option<String>,
    /// Bin description placed in front of the video sink; `identity` when unset.
    pub video_convert: Option<String>,
    /// Network timeout applied to known source elements, in seconds.
    pub source_timeout_secs: u64,
    /// Name of the video sink to hand to the video output in custom pipelines.
    pub video_sink_name: String,
    pub show_preroll_frame: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            use_playbin_volume: false,
            playbin_flags: None,
            audio_sink: None,
            video_convert: None,
            source_timeout_secs: 30,
            video_sink_name: "videosink".to_string(),
            show_preroll_frame: false,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    /// Defaults overridden by `GST_PLAYER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = non_empty(ENV_USE_PLAYBIN_VOLUME) {
            config.use_playbin_volume = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        config.playbin_flags = non_empty(ENV_PLAYBIN_FLAGS);
        config.audio_sink = non_empty(ENV_AUDIO_SINK);
        config.video_convert = non_empty(ENV_VIDEO_CONVERT);
        if let Some(v) = non_empty(ENV_SOURCE_TIMEOUT) {
            match v.parse() {
                Ok(secs) => config.source_timeout_secs = secs,
                Err(_) => log::warn!("ignoring invalid {ENV_SOURCE_TIMEOUT}={v}"),
            }
        }
        if let Some(v) = non_empty(ENV_VIDEO_SINK_NAME) {
            config.video_sink_name = v;
        }
        config
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    /// Value for playbin's `flags` property.
    pub fn playbin_flags(&self) -> String {
        match &self.playbin_flags {
            Some(extra) => format!("video+audio+{extra}"),
            None => "video+audio".to_string(),
        }
    }
}
