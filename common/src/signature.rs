// common/src/signature.rs
//! Signed cookie values in the format used by Express (`cookie-signature`).
//!
//! A signed cookie is `s:<payload>.<mac>` where `mac` is the unpadded standard
//! base64 encoding of HMAC-SHA256 over the payload, keyed with the shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::SignatureError;
use crate::models::session::SessionIdentifier;

type HmacSha256 = Hmac<Sha256>;

/// Prefix marking a cookie value as signed
pub const SIGNED_PREFIX: &str = "s:";

fn compute_mac(payload: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    base64::encode_config(mac.finalize().into_bytes(), base64::STANDARD_NO_PAD)
}

/// Sign a payload, producing `payload.mac`
pub fn sign(payload: &str, secret: &str) -> String {
    format!("{}.{}", payload, compute_mac(payload, secret))
}

/// Sign a payload the way the HTTP subsystem stores it in the session cookie
pub fn sign_cookie(payload: &str, secret: &str) -> String {
    format!("{}{}", SIGNED_PREFIX, sign(payload, secret))
}

/// Recover the payload of a `payload.mac` token if its MAC checks out
pub fn unsign<'a>(token: &'a str, secret: &str) -> Result<&'a str, SignatureError> {
    let (payload, mac) = token
        .rsplit_once('.')
        .ok_or(SignatureError::MissingSeparator)?;

    let expected = compute_mac(payload, secret);

    if bool::from(expected.as_bytes().ct_eq(mac.as_bytes())) {
        Ok(payload)
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Verify a decoded session cookie value and return the session identifier it carries.
///
/// Values without the `s:` prefix are rejected: an unsigned cookie never names a session.
pub fn verify_signed_cookie(raw: &str, secret: &str) -> Result<SessionIdentifier, SignatureError> {
    let token = raw
        .strip_prefix(SIGNED_PREFIX)
        .ok_or(SignatureError::MissingPrefix)?;

    unsign(token, secret).map(SessionIdentifier::from)
}
