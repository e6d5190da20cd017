use percent_encoding::percent_decode_str;
use url::Url;

/// URL scheme that carries a custom pipeline description instead of a media location.
pub const PIPELINE_SCHEME: &str = "gst-pipeline";

const USER_AGENT: &str = "User-Agent";

/// What to play, plus the headers to send when fetching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    url: Url,
    headers: Vec<(String, String)>,
}

impl MediaRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
        }
    }

    /// Adds a header. Headers are sent in insertion order.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(USER_AGENT))
            .map(|(_, value)| value.as_str())
    }

    /// Every header except `User-Agent`, which sources take as a property of its own.
    pub fn extra_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case(USER_AGENT))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Whether the media is fetched from somewhere other than the local file system.
    pub fn is_remote(&self) -> bool {
        !self.url.scheme().eq_ignore_ascii_case("file")
    }

    /// The decoded pipeline description of a `gst-pipeline:` request.
    pub fn pipeline_description(&self) -> Option<String> {
        if self.url.scheme() != PIPELINE_SCHEME {
            return None;
        }
        let raw = &self.url.as_str()[PIPELINE_SCHEME.len() + 1..];
        Some(percent_decode_str(raw).decode_utf8_lossy().into_owned())
    }

    /// Value of a query item of the URL, e.g. `udpsrc.caps`.
    pub fn query_value(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

impl From<Url> for MediaRequest {
    fn from(url: Url) -> Self {
        Self::new(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_description_is_percent_decoded() {
        let url = Url::parse("gst-pipeline:videotestsrc%20!%20autovideosink").unwrap();
        let request = MediaRequest::new(url);
        assert_eq!(
            request.pipeline_description().as_deref(),
            Some("videotestsrc ! autovideosink")
        );
        assert!(request.is_remote());
    }

    #[test]
    fn file_urls_are_local_and_not_pipelines() {
        let request = MediaRequest::new(Url::parse("file:///tmp/clip.mp4").unwrap());
        assert!(!request.is_remote());
        assert_eq!(request.pipeline_description(), None);
    }

    #[test]
    fn user_agent_is_split_from_extra_headers() {
        let request = MediaRequest::new(Url::parse("http://example.com/a.mp4").unwrap())
            .header("user-agent", "player/1.0")
            .header("Authorization", "Bearer x");
        assert_eq!(request.user_agent(), Some("player/1.0"));
        let extras: Vec<_> = request.extra_headers().collect();
        assert_eq!(extras, [("Authorization", "Bearer x")]);
    }

    #[test]
    fn query_values_are_decoded() {
        let request = MediaRequest::new(
            Url::parse("udp://0.0.0.0:5000?udpsrc.caps=application%2Fx-rtp").unwrap(),
        );
        assert_eq!(
            request.query_value("udpsrc.caps").as_deref(),
            Some("application/x-rtp")
        );
    }
}
