use std::time::Duration;

use crate::config::SessionConfig;
use crate::request::MediaRequest;

/// Query item of a `udp://` URL holding caps for `udpsrc`.
pub const UDP_CAPS_QUERY: &str = "udpsrc.caps";

/// Source element families that need special handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceKind {
    #[default]
    Unknown,
    Udp,
    Http,
    Mms,
    Rtsp,
}

impl SourceKind {
    pub fn from_factory_name(name: &str) -> Self {
        match name {
            "udpsrc" => SourceKind::Udp,
            "souphttpsrc" => SourceKind::Http,
            "mmssrc" => SourceKind::Mms,
            "rtspsrc" => SourceKind::Rtsp,
            _ => SourceKind::Unknown,
        }
    }

    /// Sources that only produce data while playing.
    pub fn always_live(self) -> bool {
        matches!(self, SourceKind::Udp | SourceKind::Rtsp)
    }

    /// Reaching preroll on these sources already proves the server answered.
    pub fn counts_preroll_as_played(self) -> bool {
        matches!(self, SourceKind::Http | SourceKind::Mms)
    }
}

/// What the session learns about the source once it is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceInfo {
    pub kind: SourceKind,
    pub live: bool,
}

/// Timeout property and value, in the unit each element expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTimeout {
    /// `udpsrc` `timeout`, nanoseconds.
    Nanos(u64),
    /// `souphttpsrc` `timeout`, seconds.
    Secs(u32),
    /// `mmssrc` `tcp-timeout`, microseconds.
    TcpMicros(u64),
}

impl SourceTimeout {
    pub fn property(self) -> &'static str {
        match self {
            SourceTimeout::Nanos(_) | SourceTimeout::Secs(_) => "timeout",
            SourceTimeout::TcpMicros(_) => "tcp-timeout",
        }
    }
}

/// Properties to set on a freshly created source element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceSettings {
    pub user_agent: Option<String>,
    pub extra_headers: Vec<(String, String)>,
    pub timeout: Option<SourceTimeout>,
    pub udp_caps: Option<String>,
    /// `rtspsrc` `buffer-mode` nick.
    pub buffer_mode: Option<&'static str>,
}

impl SourceSettings {
    pub fn plan(kind: SourceKind, request: Option<&MediaRequest>, config: &SessionConfig) -> Self {
        let timeout = config.source_timeout();
        let mut settings = SourceSettings {
            user_agent: request.and_then(|r| r.user_agent()).map(str::to_owned),
            extra_headers: request
                .map(|r| {
                    r.extra_headers()
                        .map(|(k, v)| (k.to_owned(), v.to_owned()))
                        .collect()
                })
                .unwrap_or_default(),
            ..Default::default()
        };

        match kind {
            SourceKind::Udp => {
                settings.timeout = Some(SourceTimeout::Nanos(saturating_nanos(timeout)));
                settings.udp_caps = request.and_then(|r| r.query_value(UDP_CAPS_QUERY));
            }
            SourceKind::Http => {
                let secs = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);
                settings.timeout = Some(SourceTimeout::Secs(secs));
            }
            SourceKind::Mms => {
                let micros = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);
                settings.timeout = Some(SourceTimeout::TcpMicros(micros));
            }
            SourceKind::Rtsp => settings.buffer_mode = Some("slave"),
            SourceKind::Unknown => {}
        }
        settings
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(url: &str) -> MediaRequest {
        MediaRequest::new(Url::parse(url).unwrap())
            .header("User-Agent", "test-agent")
            .header("Cookie", "a=b")
    }

    #[test]
    fn http_gets_headers_and_second_timeout() {
        let req = request("https://example.com/movie.mkv");
        let settings =
            SourceSettings::plan(SourceKind::Http, Some(&req), &SessionConfig::default());
        assert_eq!(settings.user_agent.as_deref(), Some("test-agent"));
        assert_eq!(
            settings.extra_headers,
            [("Cookie".to_string(), "a=b".to_string())]
        );
        assert_eq!(settings.timeout, Some(SourceTimeout::Secs(30)));
        assert_eq!(settings.buffer_mode, None);
    }

    #[test]
    fn udp_timeout_in_nanos_with_caps_from_query() {
        let req = request("udp://239.0.0.1:5004?udpsrc.caps=application/x-rtp");
        let settings = SourceSettings::plan(SourceKind::Udp, Some(&req), &SessionConfig::default());
        assert_eq!(settings.timeout, Some(SourceTimeout::Nanos(30_000_000_000)));
        assert_eq!(settings.udp_caps.as_deref(), Some("application/x-rtp"));
        assert!(SourceKind::Udp.always_live());
    }

    #[test]
    fn mms_and_rtsp_specifics() {
        let config = SessionConfig::default();
        let mms = SourceSettings::plan(SourceKind::Mms, None, &config);
        assert_eq!(mms.timeout, Some(SourceTimeout::TcpMicros(30_000_000)));
        assert_eq!(mms.timeout.map(SourceTimeout::property), Some("tcp-timeout"));

        let rtsp = SourceSettings::plan(SourceKind::Rtsp, None, &config);
        assert_eq!(rtsp.buffer_mode, Some("slave"));
        assert_eq!(rtsp.timeout, None);
    }

    #[test]
    fn factory_names() {
        assert_eq!(SourceKind::from_factory_name("rtspsrc"), SourceKind::Rtsp);
        assert_eq!(SourceKind::from_factory_name("filesrc"), SourceKind::Unknown);
    }
}
