// src/cert/material.rs
use super::types::ClientCertificate;
use crate::error::{KubeError, Result};
use base64::{engine::general_purpose, Engine as _};
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use std::fs;
use std::path::Path;

/// Where a piece of certificate or key material comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialSource<'a> {
    /// Base64-encoded PEM or DER, as found in `*-data` kubeconfig fields.
    InlineBase64(&'a str),
    File(&'a Path),
}

impl MaterialSource<'_> {
    fn describe(&self, what: &str) -> String {
        match self {
            MaterialSource::InlineBase64(_) => format!("inline {}", what),
            MaterialSource::File(path) => format!("{} file {}", what, path.display()),
        }
    }

    fn read(&self, what: &str) -> Result<Vec<u8>> {
        match self {
            MaterialSource::InlineBase64(data) => decode_base64(data)
                .map_err(|e| KubeError::certificate_load(self.describe(what), e)),
            MaterialSource::File(path) => {
                fs::read(path).map_err(|e| KubeError::certificate_load(self.describe(what), e))
            }
        }
    }
}

/// Decodes base64 that may have been wrapped across lines.
pub fn decode_base64(data: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    general_purpose::STANDARD.decode(compact)
}

fn looks_like_pem(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"-----BEGIN")
}

pub fn parse_certificate(bytes: &[u8], source_name: &str) -> Result<X509> {
    let parsed = if looks_like_pem(bytes) {
        X509::from_pem(bytes)
    } else {
        X509::from_der(bytes)
    };
    parsed.map_err(|e| KubeError::certificate_load(source_name, e))
}

pub fn parse_private_key(bytes: &[u8], source_name: &str) -> Result<PKey<Private>> {
    let parsed = if looks_like_pem(bytes) {
        PKey::private_key_from_pem(bytes)
    } else {
        PKey::private_key_from_der(bytes)
    };
    parsed.map_err(|e| KubeError::certificate_load(source_name, e))
}

pub fn load_certificate(source: &MaterialSource<'_>) -> Result<X509> {
    let bytes = source.read("certificate")?;
    parse_certificate(&bytes, &source.describe("certificate"))
}

pub fn load_private_key(source: &MaterialSource<'_>) -> Result<PKey<Private>> {
    let bytes = source.read("private key")?;
    parse_private_key(&bytes, &source.describe("private key"))
}

/// Loads a client certificate; the key is optional here so that a missing key
/// is reported by validation rather than silently dropping the certificate.
pub fn load_client_certificate(
    certificate: &MaterialSource<'_>,
    key: Option<&MaterialSource<'_>>,
) -> Result<ClientCertificate> {
    let cert = load_certificate(certificate)?;
    let private_key = key.map(load_private_key).transpose()?;
    Ok(ClientCertificate::new(cert, private_key))
}

/// Builds a client certificate from the PEM text a credential plugin returns.
pub fn client_certificate_from_pem(certificate_pem: &str, key_pem: &str) -> Result<ClientCertificate> {
    let cert = parse_certificate(certificate_pem.as_bytes(), "plugin client certificate")?;
    let key = parse_private_key(key_pem.as_bytes(), "plugin client key")?;
    let client_certificate = ClientCertificate::new(cert, Some(key));
    client_certificate.validate()?;
    Ok(client_certificate)
}
