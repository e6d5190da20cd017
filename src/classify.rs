use crate::error::{MediaError, MediaErrorKind};
use crate::message::{ErrorDomain, MessageSource, NativeError, ResourceErrorCode, StreamErrorCode};

/// Session facts that decide how a native error is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// The media is not a local file.
    pub remote: bool,
    /// Playback reached the playing state at least once.
    pub ever_played: bool,
}

/// Maps a native error onto a [`MediaError`].
///
/// Checked in order: failures of playbin's source element, decryption failures,
/// missing codecs, then everything else as a resource error.
pub fn classify_error(source: &MessageSource, error: &NativeError, ctx: ErrorContext) -> MediaError {
    let kind = if source.is_source_element() {
        classify_source_error(error, ctx)
    } else {
        match error.domain {
            ErrorDomain::Stream(StreamErrorCode::Decrypt | StreamErrorCode::DecryptNoKey) => {
                MediaErrorKind::AccessDenied
            }
            ErrorDomain::Stream(StreamErrorCode::CodecNotFound) => MediaErrorKind::Format,
            _ => MediaErrorKind::Resource,
        }
    };

    let message = match kind {
        MediaErrorKind::Format => format!("cannot play stream of unknown type: {}", error.message),
        _ => error.message.clone(),
    };
    MediaError::new(kind, message)
}

fn classify_source_error(error: &NativeError, ctx: ErrorContext) -> MediaErrorKind {
    if !ctx.remote {
        return MediaErrorKind::Resource;
    }
    let network_code = matches!(
        error.domain,
        ErrorDomain::Resource(
            ResourceErrorCode::Busy
                | ResourceErrorCode::OpenRead
                | ResourceErrorCode::Read
                | ResourceErrorCode::Seek
                | ResourceErrorCode::Sync
        )
    );
    if ctx.ever_played || network_code {
        MediaErrorKind::Network
    } else {
        MediaErrorKind::Resource
    }
}

/// Kind reported for a `udpsrc` timeout, which is posted as an element message.
pub fn udp_timeout_kind(ever_played: bool) -> MediaErrorKind {
    if ever_played {
        MediaErrorKind::Network
    } else {
        MediaErrorKind::Resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(domain: ErrorDomain) -> NativeError {
        NativeError::new(domain, "boom")
    }

    const REMOTE: ErrorContext = ErrorContext {
        remote: true,
        ever_played: false,
    };

    #[test]
    fn source_errors_split_network_from_resource() {
        let source = MessageSource::element("source");
        let read = err(ErrorDomain::Resource(ResourceErrorCode::Read));
        let not_found = err(ErrorDomain::Resource(ResourceErrorCode::NotFound));

        assert_eq!(classify_error(&source, &read, REMOTE).kind, MediaErrorKind::Network);
        assert_eq!(
            classify_error(&source, &not_found, REMOTE).kind,
            MediaErrorKind::Resource
        );
        let played = ErrorContext {
            ever_played: true,
            ..REMOTE
        };
        assert_eq!(
            classify_error(&source, &not_found, played).kind,
            MediaErrorKind::Network
        );
        assert_eq!(
            classify_error(&source, &read, ErrorContext::default()).kind,
            MediaErrorKind::Resource
        );
    }

    #[test]
    fn decrypt_failures_are_access_denied_anywhere_but_the_source() {
        let decrypt = err(ErrorDomain::Stream(StreamErrorCode::DecryptNoKey));
        for source in [MessageSource::Pipeline, MessageSource::element("decodebin0")] {
            assert_eq!(
                classify_error(&source, &decrypt, REMOTE).kind,
                MediaErrorKind::AccessDenied
            );
        }
    }

    #[test]
    fn missing_codec_is_format_other_errors_resource() {
        let codec = err(ErrorDomain::Stream(StreamErrorCode::CodecNotFound));
        let failed = classify_error(&MessageSource::Pipeline, &codec, REMOTE);
        assert_eq!(failed.kind, MediaErrorKind::Format);
        assert!(failed.message.contains("boom"));

        let core = err(ErrorDomain::Core);
        assert_eq!(
            classify_error(&MessageSource::Pipeline, &core, REMOTE).kind,
            MediaErrorKind::Resource
        );
    }

    #[test]
    fn udp_timeout() {
        assert_eq!(udp_timeout_kind(true), MediaErrorKind::Network);
        assert_eq!(udp_timeout_kind(false), MediaErrorKind::Resource);
    }
}
