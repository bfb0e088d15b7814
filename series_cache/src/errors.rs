//! Error taxonomy surfaced to query callers.
//!
//! Internal layers keep their own error types with sources attached
//! ([`ProviderError`], [`CodecError`], [`StoreError`]). Each maps into exactly
//! one [`SyncError`] kind at the synchronizer boundary. `SyncError` is `Clone`
//! so a single fetch outcome can be handed to every caller that joined it.

use std::fmt;

use esett_ingestor::{
    codec::CodecError, models::range::InvertedRangeError, providers::ProviderError,
};
use thiserror::Error;

use crate::store::StoreError;

/// Failure of a cache query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Malformed request: inverted range, unknown zone or series, bad page
    /// size or page token. Raised before any store or upstream interaction.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Upstream answered with a non-retryable client error.
    #[error("upstream rejected request with status {status}: {message}")]
    UpstreamRejected {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// Retries exhausted, deadline exceeded, or the owning fetch vanished.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream payload could not be decoded into rows.
    #[error("decode error: {0}")]
    Decode(String),

    /// The time-series store failed to read or write.
    #[error("store error: {0}")]
    Store(String),
}

/// Discriminant of [`SyncError`], used for matching and as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`SyncError::InvalidRange`].
    InvalidRange,
    /// See [`SyncError::UpstreamRejected`].
    UpstreamRejected,
    /// See [`SyncError::UpstreamUnavailable`].
    UpstreamUnavailable,
    /// See [`SyncError::Decode`].
    Decode,
    /// See [`SyncError::Store`].
    Store,
}

impl ErrorKind {
    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidRange => "invalid_range",
            ErrorKind::UpstreamRejected => "upstream_rejected",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::Decode => "decode",
            ErrorKind::Store => "store",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SyncError {
    /// Kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::InvalidRange(_) => ErrorKind::InvalidRange,
            SyncError::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            SyncError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            SyncError::Decode(_) => ErrorKind::Decode,
            SyncError::Store(_) => ErrorKind::Store,
        }
    }
}

impl From<ProviderError> for SyncError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected {
                status, message, ..
            } => SyncError::UpstreamRejected { status, message },
            ProviderError::Payload { .. } => SyncError::Decode(err.to_string()),
            ProviderError::Exhausted { .. } | ProviderError::Transport { .. } => {
                SyncError::UpstreamUnavailable(err.to_string())
            }
        }
    }
}

impl From<CodecError> for SyncError {
    fn from(err: CodecError) -> Self {
        SyncError::Decode(err.to_string())
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Store(err.to_string())
    }
}

impl From<InvertedRangeError> for SyncError {
    fn from(err: InvertedRangeError) -> Self {
        SyncError::InvalidRange(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use esett_ingestor::providers::{ExhaustedSnafu, PayloadSnafu, RejectedSnafu, TransportSnafu};

    use super::*;

    #[test]
    fn provider_errors_map_to_one_kind_each() {
        let rejected: SyncError = RejectedSnafu {
            status: 404u16,
            message: "no such mba",
        }
        .build()
        .into();
        assert_eq!(
            rejected,
            SyncError::UpstreamRejected {
                status: 404,
                message: "no such mba".into()
            }
        );

        let exhausted: SyncError = ExhaustedSnafu {
            attempts: 4u32,
            message: "503",
        }
        .build()
        .into();
        assert_eq!(exhausted.kind(), ErrorKind::UpstreamUnavailable);

        let payload: SyncError = PayloadSnafu { message: "not json" }.build().into();
        assert_eq!(payload.kind(), ErrorKind::Decode);

        let transport: SyncError = TransportSnafu { message: "bad url" }.build().into();
        assert_eq!(transport.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[test]
    fn codec_errors_are_decode_errors() {
        let err: SyncError = CodecError::MissingField { field: "total" }.into();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.kind().to_string(), "decode");
    }
}
