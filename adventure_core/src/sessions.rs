//! Registration, authentication, signed session tokens, and the session
//! table.
//!
//! Passwords are stored salted and hashed; every credential and signature
//! comparison is a constant-time fold. Tokens bind the player id and the
//! expiry instant under a keyed SHA-256 signature, so the core can verify
//! an action's bearer without consulting the session table.

use std::collections::HashMap;
use std::sync::RwLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bevy::prelude::Resource;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Sessions expire this long after issue.
pub const SESSION_LIFETIME_HOURS: i64 = 24;
/// Minimum accepted password length.
pub const PASSWORD_MIN_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("username '{0}' is already registered")]
    UsernameTaken(String),
    #[error("password is {0} chars, minimum {PASSWORD_MIN_LEN}")]
    WeakPassword(usize),
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("malformed or forged token")]
    InvalidToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("unknown session '{0}'")]
    UnknownSession(String),
}

#[derive(Debug, Clone)]
struct Credentials {
    salt: [u8; 16],
    password_hash: [u8; 32],
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub player_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// User registry, session table, and token signer in one service. Reads
/// never block each other; writers take the table exclusively.
#[derive(Resource, Debug)]
pub struct SessionService {
    users: RwLock<HashMap<String, Credentials>>,
    sessions: RwLock<HashMap<String, Session>>,
    secret: [u8; 32],
}

impl Default for SessionService {
    fn default() -> Self {
        let mut secret = [0u8; 32];
        secret[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        secret[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        Self::with_secret(secret)
    }
}

impl SessionService {
    pub fn with_secret(secret: [u8; 32]) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            secret,
        }
    }

    /// Register a new player. The username doubles as the player id.
    pub fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        if password.chars().count() < PASSWORD_MIN_LEN {
            return Err(AuthError::WeakPassword(password.chars().count()));
        }
        let mut users = self.users.write().expect("user registry lock");
        if users.contains_key(username) {
            return Err(AuthError::UsernameTaken(username.to_owned()));
        }
        let mut salt = [0u8; 16];
        salt.copy_from_slice(Uuid::new_v4().as_bytes());
        let password_hash = hash_password(&salt, password);
        users.insert(
            username.to_owned(),
            Credentials {
                salt,
                password_hash,
            },
        );
        tracing::info!(target: "everwilds::sessions", player = username, "session.registered");
        Ok(())
    }

    /// Authenticate and open a session with a signed bearer token.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let credentials = {
            let users = self.users.read().expect("user registry lock");
            users
                .get(username)
                .cloned()
                .ok_or_else(|| AuthError::UnknownUser(username.to_owned()))?
        };
        let offered = hash_password(&credentials.salt, password);
        if !constant_time_eq(&offered, &credentials.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let expires_at = now + Duration::hours(SESSION_LIFETIME_HOURS);
        let token = self.sign_token(username, expires_at);
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            player_id: username.to_owned(),
            token,
            created_at: now,
            expires_at,
            last_activity: now,
        };
        self.sessions
            .write()
            .expect("session table lock")
            .insert(session.session_id.clone(), session.clone());
        tracing::info!(target: "everwilds::sessions", player = username, "session.opened");
        Ok(session)
    }

    /// Verify a token's signature and expiry, returning the bound player id.
    pub fn validate_token(&self, token: &str) -> Result<String, AuthError> {
        let (payload_b64, signature_hex) =
            token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        let expected = self.sign_payload(&payload);
        let offered = hex::decode(signature_hex).map_err(|_| AuthError::InvalidToken)?;
        if !constant_time_eq(&offered, &expected) {
            return Err(AuthError::InvalidToken);
        }

        let payload = String::from_utf8(payload).map_err(|_| AuthError::InvalidToken)?;
        let (player_id, expiry) = payload.split_once('|').ok_or(AuthError::InvalidToken)?;
        let expires_at = expiry
            .parse::<i64>()
            .ok()
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .ok_or(AuthError::InvalidToken)?;
        if Utc::now() >= expires_at {
            return Err(AuthError::ExpiredToken);
        }
        Ok(player_id.to_owned())
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions
            .read()
            .expect("session table lock")
            .get(session_id)
            .cloned()
    }

    /// Refresh a session's last-activity stamp.
    pub fn touch(&self, session_id: &str) -> Result<(), AuthError> {
        let mut sessions = self.sessions.write().expect("session table lock");
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AuthError::UnknownSession(session_id.to_owned()))?;
        session.last_activity = Utc::now();
        Ok(())
    }

    pub fn invalidate(&self, session_id: &str) -> Result<(), AuthError> {
        let mut sessions = self.sessions.write().expect("session table lock");
        sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| AuthError::UnknownSession(session_id.to_owned()))
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.read().expect("session table lock").len()
    }

    fn sign_token(&self, player_id: &str, expires_at: DateTime<Utc>) -> String {
        let payload = format!("{player_id}|{}", expires_at.timestamp());
        let signature = self.sign_payload(payload.as_bytes());
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            hex::encode(signature)
        )
    }

    fn sign_payload(&self, payload: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.secret);
        hasher.update(payload);
        hasher.finalize().into()
    }
}

fn hash_password(salt: &[u8; 16], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Length-checked constant-time byte comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
