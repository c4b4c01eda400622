//! Webhook signature verification.
//!
//! The vendor signs the raw request body with HMAC-SHA256 over a shared
//! secret and sends the hex digest in a header. Verification happens on the
//! exact bytes received, before any JSON parsing, and compares digests in
//! constant time. Sandbox mode bypasses verification entirely so local
//! simulators can post unsigned payloads.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No shared secret configured; all non-sandbox deliveries are refused.
    NotConfigured,
    MissingSignature,
    BadSignature,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "webhook secret not configured"),
            Self::MissingSignature => write!(f, "missing webhook signature"),
            Self::BadSignature => write!(f, "webhook signature mismatch"),
        }
    }
}

impl std::error::Error for AuthError {}

#[derive(Clone)]
pub struct WebhookAuthenticator {
    secret: Option<String>,
    sandbox: bool,
}

impl WebhookAuthenticator {
    pub fn new(secret: Option<String>, sandbox: bool) -> Self {
        let secret = secret.filter(|s| !s.is_empty());
        Self { secret, sandbox }
    }

    /// Compute the hex signature for a body. Used by the simulator and tests.
    pub fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify a delivery against its signature header.
    ///
    /// Accepts the bare hex digest or the `sha256=<hex>` header form.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), AuthError> {
        if self.sandbox {
            return Ok(());
        }
        let Some(secret) = self.secret.as_deref() else {
            return Err(AuthError::NotConfigured);
        };
        let provided = signature.ok_or(AuthError::MissingSignature)?;
        let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
        let provided = hex::decode(provided).map_err(|_| AuthError::BadSignature)?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| AuthError::NotConfigured)?;
        mac.update(body);
        let expected = mac.finalize().into_bytes();

        if expected.ct_eq(&provided).into() {
            Ok(())
        } else {
            Err(AuthError::BadSignature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn auth() -> WebhookAuthenticator {
        WebhookAuthenticator::new(Some(SECRET.to_string()), false)
    }

    #[test]
    fn valid_signature_accepted() {
        let body = br#"{"event_type":"measurement"}"#;
        let sig = WebhookAuthenticator::sign(SECRET, body);
        assert!(auth().verify(body, Some(&sig)).is_ok());
        assert!(auth().verify(body, Some(&format!("sha256={sig}"))).is_ok());
    }

    #[test]
    fn tampered_body_rejected() {
        let sig = WebhookAuthenticator::sign(SECRET, b"original");
        assert_eq!(
            auth().verify(b"tampered", Some(&sig)),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn missing_signature_rejected() {
        assert_eq!(auth().verify(b"x", None), Err(AuthError::MissingSignature));
    }

    #[test]
    fn garbage_signature_rejected_not_panicked() {
        assert_eq!(
            auth().verify(b"x", Some("not-hex!")),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn sandbox_bypasses_verification() {
        let auth = WebhookAuthenticator::new(None, true);
        assert!(auth.verify(b"anything", None).is_ok());
    }

    #[test]
    fn unconfigured_secret_refuses_everything() {
        let auth = WebhookAuthenticator::new(None, false);
        assert_eq!(auth.verify(b"x", Some("00")), Err(AuthError::NotConfigured));
    }
}
