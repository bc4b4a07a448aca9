//! Authentication: signed tokens, password hashing, TOTP, and the
//! `Caller` extractor every protected handler takes.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hass_integrity::User;
use hass_shared::Role;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const ACCESS_COOKIE: &str = "access_token";

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    };
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

// ==================== TOKENS ====================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub hospital_id: Option<Uuid>,
    pub kind: TokenKind,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Token id, so two tokens minted in the same second differ
    pub jti: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong token kind")]
    WrongKind,
}

/// Signs and verifies `<claims>.<signature>` tokens, both base64url.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret: secret.to_vec(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn issue(&self, user: &User, kind: TokenKind) -> String {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user.id,
            role: user.role,
            hospital_id: user.hospital_id,
            kind,
            exp: (Utc::now() + ttl).timestamp(),
            jti: Uuid::new_v4(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> String {
        // Claims are plain data; serialization cannot fail
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap_or_default());
        let signature = URL_SAFE_NO_PAD.encode(hmac_sha256(&self.secret, payload.as_bytes()));
        format!("{}.{}", payload, signature)
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| TokenError::Malformed)?;
        let expected_sig = hmac_sha256(&self.secret, payload.as_bytes());
        if !constant_time_eq(&signature, &expected_sig) {
            return Err(TokenError::BadSignature);
        }

        let bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)?;
        if claims.exp < Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        if claims.kind != expected {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }
}

// ==================== PASSWORDS ====================

const PASSWORD_SCHEME: &str = "pbkdf2-sha256";
pub const PASSWORD_ITERATIONS: u32 = 10_000;

/// PBKDF2-HMAC-SHA256 with a single 32-byte output block
fn pbkdf2(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut block = salt.to_vec();
    block.extend_from_slice(&1u32.to_be_bytes());
    let mut u = hmac_sha256(password, &block);
    let mut out = u;
    for _ in 1..iterations {
        u = hmac_sha256(password, &u);
        for (o, x) in out.iter_mut().zip(u.iter()) {
            *o ^= x;
        }
    }
    out
}

/// Encoded as `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = random_bytes();
    let hash = pbkdf2(password.as_bytes(), &salt, PASSWORD_ITERATIONS);
    format!(
        "{}${}${}${}",
        PASSWORD_SCHEME,
        PASSWORD_ITERATIONS,
        hex::encode(salt),
        hex::encode(hash)
    )
}

pub fn verify_password(password: &str, encoded: &str) -> bool {
    let parts: Vec<&str> = encoded.split('$').collect();
    let [scheme, iterations, salt, hash] = parts.as_slice() else {
        return false;
    };
    if *scheme != PASSWORD_SCHEME {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(hash)) = (iterations.parse::<u32>(), hex::decode(salt), hex::decode(hash))
    else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    constant_time_eq(&pbkdf2(password.as_bytes(), &salt, iterations), &hash)
}

// ==================== TOTP ====================

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
pub const TOTP_STEP_SECONDS: i64 = 30;
const TOTP_DIGITS: u32 = 6;

/// RFC 4648 base32 without padding
pub fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

pub fn base32_decode(encoded: &str) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for c in encoded.trim_end_matches('=').chars() {
        let c = c.to_ascii_uppercase();
        let value = BASE32_ALPHABET.iter().position(|&a| a as char == c)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Some(out)
}

pub fn generate_totp_secret() -> String {
    base32_encode(&random_bytes::<20>())
}

/// Code for the 30-second step containing `unix_seconds`
pub fn totp_code(secret: &[u8], unix_seconds: i64) -> String {
    let counter = (unix_seconds / TOTP_STEP_SECONDS) as u64;
    let digest = hmac_sha256(secret, &counter.to_be_bytes());
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | digest[offset + 3] as u32;
    format!("{:0width$}", binary % 10u32.pow(TOTP_DIGITS), width = TOTP_DIGITS as usize)
}

/// Accepts the current step and one step either side for clock skew.
pub fn verify_totp(secret_b32: &str, code: &str, unix_seconds: i64) -> bool {
    let Some(secret) = base32_decode(secret_b32) else {
        return false;
    };
    let code = code.trim();
    [-1i64, 0, 1].iter().any(|skew| {
        let expected = totp_code(&secret, unix_seconds + skew * TOTP_STEP_SECONDS);
        constant_time_eq(expected.as_bytes(), code.as_bytes())
    })
}

pub fn otpauth_uri(secret_b32: &str, email: &str) -> String {
    format!(
        "otpauth://totp/HASS:{}?secret={}&issuer=HASS&algorithm=SHA256&digits={}&period={}",
        email, secret_b32, TOTP_DIGITS, TOTP_STEP_SECONDS
    )
}

// ==================== CALLER ====================

/// The authenticated user behind a request.
#[derive(Clone, Debug)]
pub struct Caller {
    pub user: User,
}

impl Caller {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn hospital_id(&self) -> Option<Uuid> {
        self.user.hospital_id
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer ")) {
            return Some(token.trim().to_string());
        }
    }
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_COOKIE)
        .map(|(_, value)| value.to_string())
}

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;
        let claims = state.signer.verify(&token, TokenKind::Access).map_err(|err| {
            tracing::debug!(%err, "rejected access token");
            AppError::unauthorized()
        })?;

        let user: User = state.store.find(claims.sub).await?.ok_or_else(AppError::unauthorized)?;
        if !user.can_sign_in() {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }
        Ok(Caller { user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "doctor@hass.local".to_string(),
            full_name: "Dr Test".to_string(),
            role,
            hospital_id: Some(Uuid::new_v4()),
            region_id: None,
            phone: None,
            is_active: true,
            is_deleted: false,
            two_factor_enabled: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn signer() -> TokenSigner {
        TokenSigner::new(b"test-secret", Duration::minutes(5), Duration::days(1))
    }

    #[test]
    fn test_token_round_trip() {
        let u = user(Role::Doctor);
        let token = signer().issue(&u, TokenKind::Access);
        let claims = signer().verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, u.id);
        assert_eq!(claims.role, Role::Doctor);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let token = signer().issue(&user(Role::Nurse), TokenKind::Refresh);
        assert_eq!(signer().verify(&token, TokenKind::Access), Err(TokenError::WrongKind));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let token = signer().issue(&user(Role::Patient), TokenKind::Access);
        let other = TokenSigner::new(b"other-secret", Duration::minutes(5), Duration::days(1));
        assert_eq!(other.verify(&token, TokenKind::Access), Err(TokenError::BadSignature));
        assert_eq!(signer().verify("garbage", TokenKind::Access), Err(TokenError::Malformed));
    }

    #[test]
    fn test_expired_token_rejected() {
        let expired = TokenSigner::new(b"test-secret", Duration::minutes(-5), Duration::days(1));
        let token = expired.issue(&user(Role::Doctor), TokenKind::Access);
        assert_eq!(signer().verify(&token, TokenKind::Access), Err(TokenError::Expired));
    }

    #[test]
    fn test_password_hashing() {
        let encoded = hash_password("Password123!");
        assert!(encoded.starts_with("pbkdf2-sha256$"));
        assert!(verify_password("Password123!", &encoded));
        assert!(!verify_password("password123!", &encoded));
        assert!(!verify_password("Password123!", "plain"));
        assert_ne!(encoded, hash_password("Password123!"));
    }

    #[test]
    fn test_base32() {
        assert_eq!(base32_encode(b"foobar"), "MZXW6YTBOI");
        assert_eq!(base32_decode("MZXW6YTBOI").unwrap(), b"foobar");
        assert!(base32_decode("not base32!").is_none());
    }

    #[test]
    fn test_totp_window() {
        let secret = generate_totp_secret();
        let raw = base32_decode(&secret).unwrap();
        let now = 1_700_000_000;
        let code = totp_code(&raw, now);
        assert_eq!(code.len(), 6);
        assert!(verify_totp(&secret, &code, now));
        assert!(verify_totp(&secret, &code, now + TOTP_STEP_SECONDS));
        assert!(!verify_totp(&secret, &code, now + 5 * TOTP_STEP_SECONDS));
    }

    #[test]
    fn test_bearer_and_cookie_extraction() {
        let req = axum::http::Request::builder()
            .header(AUTHORIZATION, "Bearer abc.def")
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();
        assert_eq!(bearer_token(&parts).as_deref(), Some("abc.def"));

        let req = axum::http::Request::builder()
            .header(COOKIE, "theme=dark; access_token=xyz.123")
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();
        assert_eq!(bearer_token(&parts).as_deref(), Some("xyz.123"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn base32_round_trips(data in proptest::collection::vec(any::<u8>(), 0..64)) {
                prop_assert_eq!(base32_decode(&base32_encode(&data)).unwrap(), data);
            }
        }
    }
}
