//! The error taxonomy shared by every verification step.
//!
//! Errors are distinguished by discriminant, not by type: each variant carries a
//! human readable message and, where one exists, the underlying cause.

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed envelope, expired or invalid nonce, bad JWE.
    #[error("invalid DC API response: {message}")]
    InvalidDcApiResponse {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// Issuer or device signature mismatch, expired validity window, docType
    /// mismatch, unsupported key type.
    #[error("mdoc verification failed: {message}")]
    MdocVerification {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// Malformed JWT or disclosure, failed signature, claim assertion or
    /// key-binding failure.
    #[error("SD-JWT verification failed: {message}")]
    SdJwtVerification {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// An underlying cryptographic primitive failed, e.g. a key could not be imported.
    #[error("crypto primitive failure: {message}")]
    SubtleCrypto {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// The caller asked for an unsupported format or protocol when building a request.
    #[error("invalid presentation options: {message}")]
    InvalidPresentationOptions {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

/// Stable discriminant of an [Error].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum ErrorKind {
    #[strum(serialize = "InvalidDCAPIResponse")]
    InvalidDcApiResponse,
    #[strum(serialize = "MdocVerificationError")]
    MdocVerification,
    #[strum(serialize = "SDJWTVerificationError")]
    SdJwtVerification,
    #[strum(serialize = "SubtleCryptoError")]
    SubtleCrypto,
    #[strum(serialize = "InvalidPresentationOptions")]
    InvalidPresentationOptions,
}

impl Error {
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidDcApiResponse {
            message: message.into(),
            source: None,
        }
    }

    pub fn mdoc(message: impl Into<String>) -> Self {
        Self::MdocVerification {
            message: message.into(),
            source: None,
        }
    }

    pub fn sd_jwt(message: impl Into<String>) -> Self {
        Self::SdJwtVerification {
            message: message.into(),
            source: None,
        }
    }

    pub fn crypto(message: impl Into<String>) -> Self {
        Self::SubtleCrypto {
            message: message.into(),
            source: None,
        }
    }

    pub fn presentation_options(message: impl Into<String>) -> Self {
        Self::InvalidPresentationOptions {
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying cause, replacing any previous one.
    pub fn with_source<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let slot = match &mut self {
            Self::InvalidDcApiResponse { source, .. }
            | Self::MdocVerification { source, .. }
            | Self::SdJwtVerification { source, .. }
            | Self::SubtleCrypto { source, .. }
            | Self::InvalidPresentationOptions { source, .. } => source,
        };
        *slot = Some(Box::new(cause));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDcApiResponse { .. } => ErrorKind::InvalidDcApiResponse,
            Self::MdocVerification { .. } => ErrorKind::MdocVerification,
            Self::SdJwtVerification { .. } => ErrorKind::SdJwtVerification,
            Self::SubtleCrypto { .. } => ErrorKind::SubtleCrypto,
            Self::InvalidPresentationOptions { .. } => ErrorKind::InvalidPresentationOptions,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidDcApiResponse { message, .. }
            | Self::MdocVerification { message, .. }
            | Self::SdJwtVerification { message, .. }
            | Self::SubtleCrypto { message, .. }
            | Self::InvalidPresentationOptions { message, .. } => message,
        }
    }

    /// Re-home a lower level failure under the discriminant of the pipeline that
    /// observed it. Errors that already belong to the taxonomy of a different
    /// pipeline keep their own message as context.
    pub(crate) fn rebrand(self, kind: ErrorKind) -> Self {
        if self.kind() == kind {
            return self;
        }
        let message = self.message().to_string();
        let rebranded = match kind {
            ErrorKind::InvalidDcApiResponse => Self::invalid_response(message),
            ErrorKind::MdocVerification => Self::mdoc(message),
            ErrorKind::SdJwtVerification => Self::sd_jwt(message),
            ErrorKind::SubtleCrypto => Self::crypto(message),
            ErrorKind::InvalidPresentationOptions => Self::presentation_options(message),
        };
        rebranded.with_source(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn discriminants_are_stable() {
        assert_eq!(
            Error::invalid_response("x").kind().to_string(),
            "InvalidDCAPIResponse"
        );
        assert_eq!(
            Error::sd_jwt("x").kind().to_string(),
            "SDJWTVerificationError"
        );
        assert_eq!(Error::mdoc("x").kind().to_string(), "MdocVerificationError");
    }

    #[test]
    fn rebrand_keeps_cause() {
        let err = Error::crypto("bad key import").rebrand(ErrorKind::MdocVerification);
        assert_eq!(err.kind(), ErrorKind::MdocVerification);
        assert_eq!(err.message(), "bad key import");
        assert!(err.source().is_some());
    }
}
