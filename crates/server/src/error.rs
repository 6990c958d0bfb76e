use axum::http::StatusCode;
use thiserror::Error;

/// Failures of the identity store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("credential hashing failed: {0}")]
    Hashing(String),
    #[error("random source unavailable: {0}")]
    Random(String),
}

/// Failures talking to the external identity provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{endpoint} request timed out")]
    Timeout { endpoint: &'static str },
    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("{endpoint} reported error {code}")]
    Rejected { endpoint: &'static str, code: String },
    #[error("malformed {endpoint} response: {reason}")]
    Malformed {
        endpoint: &'static str,
        reason: String,
    },
}

/// Every way the sign-in handshake can end without issuing a key.
///
/// The `Display` text is for logs. Browsers only ever see
/// [`HandshakeError::public_message`].
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("unknown identity provider")]
    UnknownProvider,
    #[error("identity provider credentials are not configured")]
    NotConfigured,
    #[error("could not determine the public host for the callback URL")]
    MissingHost,
    #[error("provider reported {code}")]
    Denied { code: String },
    #[error("callback is missing code or state")]
    MissingParams,
    #[error("state cookie missing or mismatched")]
    StateMismatch,
    #[error("PKCE verifier cookie missing")]
    MissingVerifier,
    #[error("callback exceeded its time budget")]
    Timeout,
    #[error(transparent)]
    Upstream(#[from] ProviderError),
    #[error(transparent)]
    Persistence(#[from] StoreError),
    #[error("random source unavailable: {0}")]
    Random(String),
}

impl HandshakeError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandshakeError::UnknownProvider => StatusCode::NOT_FOUND,
            HandshakeError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            HandshakeError::MissingHost
            | HandshakeError::Denied { .. }
            | HandshakeError::MissingParams
            | HandshakeError::StateMismatch
            | HandshakeError::MissingVerifier
            | HandshakeError::Timeout
            | HandshakeError::Upstream(_) => StatusCode::BAD_REQUEST,
            HandshakeError::Persistence(_) | HandshakeError::Random(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Fixed, non-sensitive text shown to the user.
    pub fn public_message(&self) -> &'static str {
        match self {
            HandshakeError::UnknownProvider => "This sign-in provider is not supported.",
            HandshakeError::NotConfigured => "Sign-in is not available right now.",
            HandshakeError::MissingHost => "Sign-in could not be started for this address.",
            HandshakeError::Denied { .. } => "Sign-in was cancelled.",
            HandshakeError::MissingParams => "The sign-in response was incomplete.",
            HandshakeError::StateMismatch | HandshakeError::MissingVerifier => {
                "Your sign-in session expired. Please try again."
            }
            HandshakeError::Timeout | HandshakeError::Upstream(_) => {
                "We could not verify your account with the provider. Please try again."
            }
            HandshakeError::Persistence(_) | HandshakeError::Random(_) => {
                "Something went wrong while signing you in. Please try again later."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(
            HandshakeError::NotConfigured.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(HandshakeError::StateMismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            HandshakeError::Upstream(ProviderError::Status {
                endpoint: "token",
                status: 502
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HandshakeError::Persistence(StoreError::Hashing("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn state_mismatch_and_expiry_read_the_same() {
        assert_eq!(
            HandshakeError::StateMismatch.public_message(),
            HandshakeError::MissingVerifier.public_message()
        );
    }

    #[test]
    fn public_messages_never_include_detail() {
        let err = HandshakeError::Denied {
            code: "access_denied <script>".into(),
        };
        assert!(!err.public_message().contains("access_denied"));
        let err = HandshakeError::Upstream(ProviderError::Rejected {
            endpoint: "token",
            code: "bad_verification_code".into(),
        });
        assert!(!err.public_message().contains("bad_verification_code"));
    }
}
