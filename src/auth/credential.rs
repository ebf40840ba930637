// src/auth/credential.rs
use crate::cert::ClientCertificate;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::fmt;

pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Something a credential can be attached to: an HTTP request or a
/// WebSocket handshake whose headers are fixed before it starts.
pub trait CredentialTarget {
    fn set_header(&mut self, name: &str, value: String);
    fn add_client_certificate(&mut self, certificate: ClientCertificate);
}

#[derive(Clone)]
pub enum CredentialSecret {
    BearerToken(String),
    Basic { username: String, password: String },
    ClientCertificate(ClientCertificate),
}

/// Credential material plus its expiry; `expires_at == None` never expires.
#[derive(Clone)]
pub struct Credential {
    pub secret: CredentialSecret,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn bearer(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: CredentialSecret::BearerToken(token.into()),
            expires_at,
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            secret: CredentialSecret::Basic {
                username: username.into(),
                password: password.into(),
            },
            expires_at: None,
        }
    }

    pub fn certificate(certificate: ClientCertificate, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: CredentialSecret::ClientCertificate(certificate),
            expires_at,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match &self.secret {
            CredentialSecret::BearerToken(token) => Some(token),
            _ => None,
        }
    }

    /// True once `now` is within `margin` of the expiry (or past it).
    /// A margin reaching past the representable range always refreshes.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => match expires_at.checked_sub_signed(margin) {
                Some(deadline) => now >= deadline,
                None => true,
            },
            None => false,
        }
    }

    pub fn authorization_header(&self) -> Option<String> {
        match &self.secret {
            CredentialSecret::BearerToken(token) => Some(format!("Bearer {}", token)),
            CredentialSecret::Basic { username, password } => {
                Some(format!("Basic {}", encode_basic(username, password)))
            }
            CredentialSecret::ClientCertificate(_) => None,
        }
    }

    pub fn apply_to<T: CredentialTarget + ?Sized>(&self, target: &mut T) {
        match &self.secret {
            CredentialSecret::ClientCertificate(certificate) => {
                target.add_client_certificate(certificate.clone())
            }
            _ => {
                if let Some(header) = self.authorization_header() {
                    target.set_header(AUTHORIZATION_HEADER, header);
                }
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.secret {
            CredentialSecret::BearerToken(_) => "bearer-token",
            CredentialSecret::Basic { .. } => "basic",
            CredentialSecret::ClientCertificate(_) => "client-certificate",
        };
        f.debug_struct("Credential")
            .field("kind", &kind)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

pub fn encode_basic(username: &str, password: &str) -> String {
    general_purpose::STANDARD.encode(format!("{}:{}", username, password))
}

/// Parses RFC3339, falling back to `YYYY-MM-DD HH:MM:SS` read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
