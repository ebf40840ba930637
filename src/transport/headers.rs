// src/transport/headers.rs
use crate::auth::CredentialTarget;
use crate::cert::ClientCertificate;
use std::fmt;

/// Header list with case-insensitive names; setting a name replaces it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    entries: Vec<(String, String)>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Values are left out; they usually carry credentials.
impl fmt::Debug for RequestHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// The parts of an outgoing HTTP request that authentication touches.
#[derive(Debug, Clone, Default)]
pub struct HttpRequestContext {
    pub headers: RequestHeaders,
    pub client_certificates: Vec<ClientCertificate>,
}

impl HttpRequestContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialTarget for HttpRequestContext {
    fn set_header(&mut self, name: &str, value: String) {
        self.headers.set(name, value);
    }

    fn add_client_certificate(&mut self, certificate: ClientCertificate) {
        self.client_certificates.push(certificate);
    }
}
