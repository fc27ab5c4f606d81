//! Webhook authentication.
//!
//! Graph signs every notification with the app secret and sends the digest
//! as `X-Hub-Signature-256: sha256=<hex>` (and, for older apps,
//! `X-Hub-Signature: sha1=<hex>`). Direct lead pushes authenticate with a
//! shared secret instead. Every check here fails closed: a missing secret,
//! body or credential is a rejection.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde_json::json;
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, instrument, warn};

use crate::diagnostics::DiagnosticLog;
use crate::settings::SecretString;

/// Header carrying the HMAC-SHA256 signature
pub const SIGNATURE_256_HEADER: &str = "X-Hub-Signature-256";

/// Legacy header carrying the HMAC-SHA1 signature
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// Header carrying the direct push shared secret
pub const SHARED_SECRET_HEADER: &str = "X-Facebook-Secret";

/// Query parameter carrying the direct push shared secret
pub const SHARED_SECRET_QUERY_PARAM: &str = "secret";

/// HMAC digest algorithm named by the signature prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha256,
    Sha1,
}

impl SignatureAlgorithm {
    /// Prefix before `=` in the header value
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha1 => "sha1",
        }
    }

    /// Split a header value into algorithm and hex digest.
    pub fn parse_header(header: &str) -> Option<(Self, &str)> {
        let (prefix, digest) = header.trim().split_once('=')?;
        let algorithm = if prefix.eq_ignore_ascii_case("sha256") {
            Self::Sha256
        } else if prefix.eq_ignore_ascii_case("sha1") {
            Self::Sha1
        } else {
            return None;
        };
        Some((algorithm, digest))
    }
}

/// Why a signature check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureFailure {
    #[error("no signing secret configured")]
    MissingSecret,

    #[error("request body is empty")]
    MissingBody,

    #[error("signature header is missing")]
    MissingHeader,

    #[error("signature header is not in algorithm=hex form")]
    MalformedHeader,

    #[error("signature does not match")]
    Mismatch,
}

/// Compute the signature header value for `body`.
///
/// ```
/// use lead_relay_core::signature::{sign, SignatureAlgorithm};
///
/// let header = sign(b"test", b"s", SignatureAlgorithm::Sha256);
/// assert!(header.starts_with("sha256="));
/// assert_eq!(header.len(), "sha256=".len() + 64);
/// ```
pub fn sign(body: &[u8], secret: &[u8], algorithm: SignatureAlgorithm) -> String {
    let digest = compute_digest(body, secret, algorithm).unwrap_or_default();
    format!("{}={}", algorithm.prefix(), hex::encode(digest))
}

fn compute_digest(body: &[u8], secret: &[u8], algorithm: SignatureAlgorithm) -> Option<Vec<u8>> {
    type HmacSha256 = Hmac<Sha256>;
    type HmacSha1 = Hmac<Sha1>;

    match algorithm {
        SignatureAlgorithm::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(secret).ok()?;
            mac.update(body);
            Some(mac.finalize().into_bytes().to_vec())
        }
        SignatureAlgorithm::Sha1 => {
            let mut mac = HmacSha1::new_from_slice(secret).ok()?;
            mac.update(body);
            Some(mac.finalize().into_bytes().to_vec())
        }
    }
}

/// Check a signature header against `body` without side effects.
///
/// Hex digests are accepted in either case; the digest comparison is
/// constant-time.
pub fn check_signature(
    body: &[u8],
    header: Option<&str>,
    secret: &[u8],
) -> Result<SignatureAlgorithm, SignatureFailure> {
    if secret.is_empty() {
        return Err(SignatureFailure::MissingSecret);
    }
    if body.is_empty() {
        return Err(SignatureFailure::MissingBody);
    }
    let header = header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(SignatureFailure::MissingHeader)?;

    let (algorithm, digest) =
        SignatureAlgorithm::parse_header(header).ok_or(SignatureFailure::MalformedHeader)?;
    let expected = hex::decode(digest).map_err(|_| SignatureFailure::MalformedHeader)?;

    let computed =
        compute_digest(body, secret, algorithm).ok_or(SignatureFailure::MissingSecret)?;

    if bool::from(computed.as_slice().ct_eq(expected.as_slice())) {
        Ok(algorithm)
    } else {
        Err(SignatureFailure::Mismatch)
    }
}

/// Pick the signature header to verify, preferring SHA-256.
pub fn select_signature_header<'a>(
    sha256_header: Option<&'a str>,
    sha1_header: Option<&'a str>,
) -> Option<&'a str> {
    sha256_header
        .filter(|h| !h.trim().is_empty())
        .or(sha1_header.filter(|h| !h.trim().is_empty()))
}

/// Verifies Graph webhook signatures and records failures.
#[derive(Clone)]
pub struct SignatureVerifier {
    diagnostics: Arc<dyn DiagnosticLog>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(diagnostics: Arc<dyn DiagnosticLog>) -> Self {
        Self { diagnostics }
    }

    /// Verify `header` against `body` with the shared `secret`.
    ///
    /// Returns `false` on any failure; the reason goes to the diagnostic log.
    #[instrument(skip(self, body, header, secret), fields(body_len = body.len()))]
    pub async fn verify(&self, body: &[u8], header: Option<&str>, secret: &SecretString) -> bool {
        match check_signature(body, header, secret.expose_secret().as_bytes()) {
            Ok(algorithm) => {
                debug!(algorithm = algorithm.prefix(), "Webhook signature verified");
                true
            }
            Err(failure) => {
                warn!(reason = %failure, "Webhook signature rejected");
                self.diagnostics
                    .log(
                        "Webhook signature rejected",
                        json!({"reason": failure.to_string(), "body_length": body.len()}),
                    )
                    .await;
                false
            }
        }
    }
}

/// Authenticates direct lead pushes with a shared secret.
#[derive(Clone)]
pub struct SharedSecretAuthenticator {
    secret: SecretString,
}

impl std::fmt::Debug for SharedSecretAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecretAuthenticator")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

impl SharedSecretAuthenticator {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Check a provided credential against the configured secret.
    ///
    /// Rejects when either side is empty. The comparison is constant-time
    /// for equal-length inputs.
    pub fn authorize(&self, provided: Option<&str>) -> bool {
        let configured = self.secret.expose_secret().as_bytes();
        match provided {
            Some(provided) if !configured.is_empty() && !provided.is_empty() => {
                configured.ct_eq(provided.as_bytes()).into()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
