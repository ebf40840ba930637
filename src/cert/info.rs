// src/cert/info.rs
use crate::error::{KubeError, Result};
use chrono::{DateTime, TimeZone, Utc};
use openssl::x509::X509Ref;
use serde::Serialize;
use x509_parser::prelude::{FromDer, ParsedExtension, X509Certificate};

/// Human-readable summary of a certificate, used for diagnostics output.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub serial: String,
    pub fingerprint: String,
    pub is_ca: bool,
}

impl CertificateInfo {
    pub fn from_x509(cert: &X509Ref) -> Result<Self> {
        let cert_der = cert
            .to_der()
            .map_err(|e| KubeError::certificate_load("certificate", e))?;

        let (_remainder, parsed) = X509Certificate::from_der(&cert_der)
            .map_err(|e| KubeError::certificate_load("certificate", e))?;

        let not_before = Utc
            .timestamp_opt(parsed.validity().not_before.timestamp(), 0)
            .single()
            .ok_or_else(|| KubeError::certificate_load("certificate", "invalid not_before timestamp"))?;
        let not_after = Utc
            .timestamp_opt(parsed.validity().not_after.timestamp(), 0)
            .single()
            .ok_or_else(|| KubeError::certificate_load("certificate", "invalid not_after timestamp"))?;

        let is_ca = parsed
            .extensions()
            .iter()
            .find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::BasicConstraints(bc) => Some(bc.ca),
                _ => None,
            })
            .unwrap_or(false);

        let fingerprint = openssl::hash::hash(openssl::hash::MessageDigest::sha256(), &cert_der)
            .map_err(|e| KubeError::certificate_load("certificate", e))?;

        Ok(Self {
            subject: parsed.subject().to_string(),
            issuer: parsed.issuer().to_string(),
            not_before,
            not_after,
            serial: hex::encode(parsed.raw_serial()),
            fingerprint: hex::encode(fingerprint),
            is_ca,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.not_after
    }
}

/// Best-effort subject string; never fails.
pub fn certificate_subject(cert: &X509Ref) -> String {
    CertificateInfo::from_x509(cert)
        .map(|info| info.subject)
        .unwrap_or_else(|_| "<unparseable>".to_string())
}
