use std::collections::HashMap;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use crate::tprintln;

use super::principal::Identity;
use super::provider::AuthProvider;
use crate::error::{AppError, SessionError};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "turnstile_session";

pub type SessionToken = String;

/// Longest session lifetime accepted; larger TTLs are clamped to it.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Signed payload carried inside a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String,
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub identity: Identity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn gen_id() -> Result<String, AppError> {
    gen_id_with(getrandom::getrandom)
}

// 128-bit random id, base64url without padding
fn gen_id_with<F>(fill: F) -> Result<String, AppError>
where
    F: FnOnce(&mut [u8]) -> Result<(), getrandom::Error>,
{
    let mut buf = [0u8; 16];
    fill(&mut buf).map_err(|e| AppError::internal(format!("session id: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(buf))
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

/// Issues and verifies stateless HMAC-SHA256 session tokens of the form
/// `base64url(claims).base64url(tag)`. The only server-side state is the
/// denylist of revoked session ids, held until each token would have expired anyway.
pub struct SessionManager {
    mac: HmacSha256,
    pub ttl: Duration,
    pub secure_cookie: bool,
    revoked: RwLock<HashMap<String, i64>>,
}

impl SessionManager {
    pub fn new(key: &[u8], ttl: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(!key.is_empty(), "session signing key must not be empty");
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| anyhow::anyhow!("invalid session signing key: {}", e))?;
        Ok(Self { mac, ttl: ttl.min(MAX_SESSION_TTL), secure_cookie: false, revoked: RwLock::new(HashMap::new()) })
    }

    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    fn ttl_secs(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }

    pub fn issue(&self, identity: &Identity) -> Result<Session, AppError> {
        self.issue_at(identity, Utc::now().timestamp())
    }

    pub fn issue_at(&self, identity: &Identity, now: i64) -> Result<Session, AppError> {
        let claims = SessionClaims {
            sub: identity.id.clone(),
            sid: gen_id()?,
            iat: now,
            exp: now.saturating_add(self.ttl_secs()),
        };
        // Claims are plain strings and integers; serialization cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let body = URL_SAFE_NO_PAD.encode(payload);
        let token = format!("{}.{}", body, URL_SAFE_NO_PAD.encode(self.sign(body.as_bytes())));
        tprintln!("session.issue user={} sid={} ttl_secs={}", claims.sub, claims.sid, self.ttl.as_secs());
        Ok(Session {
            session_id: claims.sid,
            token,
            identity: identity.clone(),
            issued_at: ts(claims.iat),
            expires_at: ts(claims.exp),
        })
    }

    fn sign(&self, body: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }

    /// Signature check and claim decoding only; expiry and revocation are not consulted.
    fn verify_signature(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let (body, tag) = token.split_once('.').ok_or(SessionError::Malformed)?;
        let tag = URL_SAFE_NO_PAD.decode(tag).map_err(|_| SessionError::Malformed)?;
        let mut mac = self.mac.clone();
        mac.update(body.as_bytes());
        mac.verify_slice(&tag).map_err(|_| SessionError::BadSignature)?;
        let payload = URL_SAFE_NO_PAD.decode(body).map_err(|_| SessionError::Malformed)?;
        serde_json::from_slice(&payload).map_err(|_| SessionError::Malformed)
    }

    pub fn decode(&self, token: &str) -> Result<SessionClaims, SessionError> {
        self.decode_at(token, Utc::now().timestamp())
    }

    pub fn decode_at(&self, token: &str, now: i64) -> Result<SessionClaims, SessionError> {
        if token.is_empty() {
            return Err(SessionError::Missing);
        }
        let claims = self.verify_signature(token)?;
        if claims.exp <= now {
            return Err(SessionError::Expired);
        }
        if self.revoked.read().contains_key(&claims.sid) {
            return Err(SessionError::Revoked);
        }
        Ok(claims)
    }

    /// Resolve a token to an identity. The subject must still be a known user.
    pub fn resolve(&self, token: &str, users: &dyn AuthProvider) -> Result<Identity, SessionError> {
        self.resolve_at(token, users, Utc::now().timestamp())
    }

    pub fn resolve_at(&self, token: &str, users: &dyn AuthProvider, now: i64) -> Result<Identity, SessionError> {
        let claims = self.decode_at(token, now)?;
        if !users.exists(&claims.sub) {
            return Err(SessionError::UnknownUser);
        }
        Ok(Identity::new(claims.sub))
    }

    /// Deny the token's session id for the rest of its lifetime. Returns false for tokens
    /// that were not ours, already expired or already revoked.
    pub fn revoke(&self, token: &str) -> bool {
        self.revoke_at(token, Utc::now().timestamp())
    }

    pub fn revoke_at(&self, token: &str, now: i64) -> bool {
        let Ok(claims) = self.verify_signature(token) else { return false; };
        let mut revoked = self.revoked.write();
        revoked.retain(|_, exp| *exp > now);
        if claims.exp <= now {
            return false;
        }
        let fresh = revoked.insert(claims.sid.clone(), claims.exp).is_none();
        tprintln!("session.revoke user={} sid={} fresh={}", claims.sub, claims.sid, fresh);
        fresh
    }

    pub fn revoked_count(&self) -> usize { self.revoked.read().len() }

    pub fn set_cookie(&self, session: &Session) -> Result<HeaderValue, AppError> {
        let mut v = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            SESSION_COOKIE, session.token, self.ttl.as_secs()
        );
        if self.secure_cookie { v.push_str("; Secure"); }
        HeaderValue::from_str(&v).map_err(|e| AppError::internal(format!("session cookie: {}", e)))
    }

    pub fn clear_cookie(&self) -> HeaderValue {
        let v = if self.secure_cookie {
            "turnstile_session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0; Secure"
        } else {
            "turnstile_session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
        };
        HeaderValue::from_static(v)
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE) {
        let Ok(s) = cookie.to_str() else { continue; };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name && !v.is_empty() { return Some(v.to_string()); }
            }
        }
    }
    None
}

/// Session token from the session cookie, falling back to an `Authorization: Bearer` header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(t) = parse_cookie(headers, SESSION_COOKIE) { return Some(t); }
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}
