//! # Webhook Signature Verification
//!
//! This module provides signature verification for provider webhooks using
//! HMAC-SHA256 with constant-time comparison to prevent timing attacks.
//!
//! The provider signs the raw request body with the secret agreed at
//! webhook registration and sends the hex digest in `X-Signature-256`,
//! prefixed with `sha256=`. Verification happens before any event is
//! applied; the body bytes must be the exact bytes received on the wire.

use axum::http::StatusCode;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Errors that can occur during webhook signature verification
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("Missing required signature header: {header}")]
    MissingSignature { header: String },

    #[error("Invalid signature format: {header}")]
    InvalidSignatureFormat { header: String },

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("No webhook secret configured for repository")]
    NotConfigured,
}

impl VerificationError {
    /// Returns the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            VerificationError::MissingSignature { .. } => StatusCode::UNAUTHORIZED,
            VerificationError::InvalidSignatureFormat { .. } => StatusCode::UNAUTHORIZED,
            VerificationError::VerificationFailed => StatusCode::UNAUTHORIZED,
            VerificationError::NotConfigured => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Result type for webhook verification
pub type VerificationResult<T> = Result<T, VerificationError>;

/// Verifies a webhook signature using HMAC-SHA256 over the raw body bytes
pub fn verify_signature(body: &[u8], signature_header: &str, secret: &str) -> VerificationResult<()> {
    debug!(body_size = body.len(), "Starting signature verification");

    if signature_header.is_empty() {
        return Err(VerificationError::MissingSignature {
            header: "X-Signature-256".to_string(),
        });
    }

    let signature_prefix = "sha256=";
    if !signature_header.starts_with(signature_prefix) {
        return Err(VerificationError::InvalidSignatureFormat {
            header: "X-Signature-256 must start with 'sha256='".to_string(),
        });
    }

    let expected_hex = &signature_header[signature_prefix.len()..];

    // Compute HMAC-SHA256 of the body
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VerificationError::VerificationFailed)?;
    mac.update(body);
    let expected_bytes = mac.finalize().into_bytes();

    // Decode the provided signature
    let provided_bytes =
        hex::decode(expected_hex).map_err(|_| VerificationError::InvalidSignatureFormat {
            header: "X-Signature-256 contains invalid hex".to_string(),
        })?;

    // Compare signatures using constant-time comparison to prevent timing attacks
    let expected_bytes_array: &[u8] = expected_bytes.as_ref();
    if subtle::ConstantTimeEq::ct_eq(expected_bytes_array, &provided_bytes[..]).into() {
        Ok(())
    } else {
        Err(VerificationError::VerificationFailed)
    }
}

/// Computes the `sha256=<hex>` signature header value for a body and secret.
///
/// Used by tests and by webhook registration smoke checks.
pub fn sign_body(body: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_verification_success() {
        let secret = "test_secret";
        let body = b"test payload";

        let signature_header = sign_body(body, secret);

        assert!(verify_signature(body, &signature_header, secret).is_ok());
    }

    #[test]
    fn test_signature_verification_invalid_signature() {
        let secret = "test_secret";
        let body = b"test payload";
        let signature_header = "sha256=invalid_signature";

        assert!(verify_signature(body, signature_header, secret).is_err());
    }

    #[test]
    fn test_signature_verification_missing_signature() {
        let secret = "test_secret";
        let body = b"test payload";
        let signature_header = "";

        assert!(matches!(
            verify_signature(body, signature_header, secret),
            Err(VerificationError::MissingSignature { .. })
        ));
    }

    #[test]
    fn test_signature_verification_invalid_format() {
        let secret = "test_secret";
        let body = b"test payload";
        let signature_header = "invalid_format";

        assert!(matches!(
            verify_signature(body, signature_header, secret),
            Err(VerificationError::InvalidSignatureFormat { .. })
        ));
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let secret = "test_secret";
        let body = br#"{"action":"opened","issue":{"number":42}}"#;

        let signature_header = sign_body(body, secret);

        let tampered = br#"{"action":"opened","issue":{"number":43}}"#;
        assert!(matches!(
            verify_signature(tampered, &signature_header, secret),
            Err(VerificationError::VerificationFailed)
        ));
    }

    #[test]
    fn test_wrong_secret_fails_verification() {
        let body = b"test payload";
        let signature_header = sign_body(body, "secret_a");

        assert!(verify_signature(body, &signature_header, "secret_b").is_err());
    }

    #[test]
    fn test_all_errors_map_to_unauthorized() {
        let errors = [
            VerificationError::MissingSignature {
                header: "X-Signature-256".to_string(),
            },
            VerificationError::InvalidSignatureFormat {
                header: "bad".to_string(),
            },
            VerificationError::VerificationFailed,
            VerificationError::NotConfigured,
        ];

        for error in errors {
            assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        }
    }
}
