// cert/types.rs
use super::info::certificate_subject;
use crate::error::{KubeError, Result};
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use std::fmt;

/// A client certificate and (ideally) the private key that goes with it.
#[derive(Clone)]
pub struct ClientCertificate {
    certificate: X509,
    private_key: Option<PKey<Private>>,
}

impl ClientCertificate {
    pub fn new(certificate: X509, private_key: Option<PKey<Private>>) -> Self {
        Self {
            certificate,
            private_key,
        }
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn private_key(&self) -> Option<&PKey<Private>> {
        self.private_key.as_ref()
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Checks that the private key is present and belongs to the certificate.
    pub fn validate(&self) -> Result<()> {
        let subject = certificate_subject(&self.certificate);
        let key = self.private_key.as_ref().ok_or_else(|| {
            KubeError::certificate_load(
                format!("client certificate '{}'", subject),
                "the private key for the client certificate is not available",
            )
        })?;

        let public_key = self
            .certificate
            .public_key()
            .map_err(|e| KubeError::certificate_load(format!("client certificate '{}'", subject), e))?;

        if !public_key.public_eq(key) {
            return Err(KubeError::certificate_load(
                format!("client certificate '{}'", subject),
                "the private key does not match the certificate's public key",
            ));
        }
        Ok(())
    }

    pub fn certificate_pem(&self) -> Result<Vec<u8>> {
        self.certificate
            .to_pem()
            .map_err(|e| KubeError::certificate_load("client certificate", e))
    }

    /// Certificate followed by its PKCS#8 private key, the layout TLS client
    /// libraries accept as a PEM identity.
    pub fn identity_pem(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut pem = self.certificate_pem()?;
        if let Some(key) = &self.private_key {
            let key_pem = key
                .private_key_to_pem_pkcs8()
                .map_err(|e| KubeError::certificate_load("client key", e))?;
            pem.extend_from_slice(&key_pem);
        }
        Ok(pem)
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("subject", &certificate_subject(&self.certificate))
            .field(
                "private_key",
                &if self.private_key.is_some() {
                    "<redacted>"
                } else {
                    "<missing>"
                },
            )
            .finish()
    }
}
