//! JWT signing and signature verification (HS256).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, crypto, decode_header, encode};

use super::AuthError;
use crate::models::auth::{SubjectClaim, TokenClaims};
use crate::uuid::uuidv7;

/// Signing options.
#[derive(Debug, Clone, Copy)]
pub struct SignOptions {
    /// Lifetime from the moment of signing. May be negative in tests.
    pub expires_in: Duration,
}

impl SignOptions {
    pub fn expires_in(expires_in: Duration) -> Self {
        Self { expires_in }
    }
}

/// Why a token failed to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Signature valid but `exp` has passed.
    Expired,
    /// Wrong secret, bad signature, or not a JWT.
    Invalid,
    /// Signature valid but the payload does not have the claim shape.
    Malformed(String),
}

/// Sign a subject claim with `secret`.
///
/// Embeds `iat`, `exp = iat + expires_in` and a fresh `jti`.
pub fn sign(
    subject: &SubjectClaim,
    secret: &[u8],
    options: SignOptions,
) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::Signing("signing secret is not set".into()));
    }
    let now = Utc::now();
    let claims = TokenClaims {
        sub: subject.clone(),
        iat: now.timestamp(),
        exp: (now + options.expires_in).timestamp(),
        jti: uuidv7().to_string(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::Signing(format!("jwt encode: {e}")))
}

/// Verify a token's signature and expiry against `secret`, then decode claims.
///
/// The HS256 signature is checked over `header.payload` directly, since
/// `jsonwebtoken::decode` reads the registered `sub` claim as a string. Any
/// signed payload that is not a `TokenClaims`, one without `exp` included, is
/// `Malformed`.
pub fn decode_claims(token: &str, secret: &[u8]) -> Result<TokenClaims, DecodeFailure> {
    if secret.is_empty() {
        return Err(DecodeFailure::Invalid);
    }
    let (message, signature) = token.rsplit_once('.').ok_or(DecodeFailure::Invalid)?;
    let (_, payload) = message.split_once('.').ok_or(DecodeFailure::Invalid)?;

    let header = decode_header(token).map_err(|_| DecodeFailure::Invalid)?;
    if header.alg != Algorithm::HS256 {
        return Err(DecodeFailure::Invalid);
    }
    let key = DecodingKey::from_secret(secret);
    let verified = crypto::verify(signature, message.as_bytes(), &key, Algorithm::HS256)
        .map_err(|_| DecodeFailure::Invalid)?;
    if !verified {
        return Err(DecodeFailure::Invalid);
    }

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| DecodeFailure::Malformed(format!("payload encoding: {e}")))?;
    let claims: TokenClaims =
        serde_json::from_slice(&payload).map_err(|e| DecodeFailure::Malformed(e.to_string()))?;

    if claims.exp <= Utc::now().timestamp() {
        return Err(DecodeFailure::Expired);
    }
    Ok(claims)
}
