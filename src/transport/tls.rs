// src/transport/tls.rs
//! Server certificate checks for clusters whose CA is distributed out of band.
use crate::error::{KubeError, Result};
use crate::options::ConnectionOptions;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509Ref, X509StoreContext, X509VerifyResult, X509};
use std::fmt;
use std::sync::Arc;

// X509_V_ERR_* codes meaning "no path to a trusted root".
const UNABLE_TO_GET_ISSUER_CERT: i32 = 2;
const DEPTH_ZERO_SELF_SIGNED_CERT: i32 = 18;
const SELF_SIGNED_CERT_IN_CHAIN: i32 = 19;
const UNABLE_TO_GET_ISSUER_CERT_LOCALLY: i32 = 20;

/// Outcome of the TLS stack's own chain validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    Trusted,
    /// The only problem is that the chain does not end at a known root.
    UnknownRoot,
    Failed(String),
}

impl ChainStatus {
    pub fn from_verify_result(result: X509VerifyResult) -> Self {
        match result.as_raw() {
            0 => ChainStatus::Trusted,
            UNABLE_TO_GET_ISSUER_CERT
            | DEPTH_ZERO_SELF_SIGNED_CERT
            | SELF_SIGNED_CERT_IN_CHAIN
            | UNABLE_TO_GET_ISSUER_CERT_LOCALLY => ChainStatus::UnknownRoot,
            _ => ChainStatus::Failed(result.error_string().to_string()),
        }
    }
}

/// Which roots a server certificate must chain to.
#[derive(Clone)]
pub enum TrustPolicy {
    PlatformRoots,
    CustomCa(X509),
    /// Accept any server certificate.
    Insecure,
}

impl TrustPolicy {
    /// A configured CA takes precedence over the insecure flag.
    pub fn for_options(options: &ConnectionOptions) -> Self {
        match (&options.ca_certificate, options.allow_insecure) {
            (Some(ca), _) => TrustPolicy::CustomCa(ca.clone()),
            (None, true) => TrustPolicy::Insecure,
            (None, false) => TrustPolicy::PlatformRoots,
        }
    }
}

impl fmt::Debug for TrustPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustPolicy::PlatformRoots => f.write_str("PlatformRoots"),
            TrustPolicy::CustomCa(ca) => f
                .debug_tuple("CustomCa")
                .field(&crate::cert::certificate_subject(ca))
                .finish(),
            TrustPolicy::Insecure => f.write_str("Insecure"),
        }
    }
}

/// Rebuilds a presented chain with an extra trusted root.
pub trait ChainVerifier: Send + Sync {
    /// `chain[0]` is the server's leaf certificate.
    fn verify_with_extra_root(&self, ca: &X509Ref, chain: &[X509]) -> Result<()>;
}

/// Same check as `openssl verify -CAfile <ca>`: the configured CA is the only
/// trusted root.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSslChainVerifier;

impl ChainVerifier for OpenSslChainVerifier {
    fn verify_with_extra_root(&self, ca: &X509Ref, chain: &[X509]) -> Result<()> {
        let tls_error = |e: openssl::error::ErrorStack| KubeError::TlsValidationFailure(e.to_string());

        let (leaf, intermediates) = chain.split_first().ok_or_else(|| {
            KubeError::TlsValidationFailure("the server presented no certificates".to_string())
        })?;

        let mut store = X509StoreBuilder::new().map_err(tls_error)?;
        store.add_cert(ca.to_owned()).map_err(tls_error)?;
        let store = store.build();

        let mut untrusted = Stack::new().map_err(tls_error)?;
        for certificate in intermediates {
            untrusted.push(certificate.clone()).map_err(tls_error)?;
        }

        let mut context = X509StoreContext::new().map_err(tls_error)?;
        let (verified, result) = context
            .init(&store, leaf, &untrusted, |ctx| {
                let verified = ctx.verify_cert()?;
                Ok((verified, ctx.error()))
            })
            .map_err(tls_error)?;

        if verified {
            Ok(())
        } else {
            Err(KubeError::TlsValidationFailure(format!(
                "the chain does not lead to the configured CA: {}",
                result.error_string()
            )))
        }
    }
}

/// Decides whether a server chain is acceptable under `policy`.
///
/// With a custom CA, a chain whose only fault is an unknown root is rebuilt
/// with the CA as an extra trusted root and accepted only if that succeeds;
/// any other reported fault is rejected outright.
pub fn validate_server_chain(
    policy: &TrustPolicy,
    status: &ChainStatus,
    chain: &[X509],
    verifier: &dyn ChainVerifier,
) -> Result<()> {
    match (policy, status) {
        (TrustPolicy::Insecure, _) => Ok(()),
        (_, ChainStatus::Trusted) => Ok(()),
        (_, ChainStatus::Failed(reason)) => Err(KubeError::TlsValidationFailure(reason.clone())),
        (TrustPolicy::PlatformRoots, ChainStatus::UnknownRoot) => Err(
            KubeError::TlsValidationFailure("the server certificate is not trusted".to_string()),
        ),
        (TrustPolicy::CustomCa(ca), ChainStatus::UnknownRoot) => {
            verifier.verify_with_extra_root(ca, chain)
        }
    }
}

/// A [`validate_server_chain`] call with its policy and verifier bound, ready
/// to hand to a TLS or WebSocket client.
#[derive(Clone)]
pub struct ServerCertificateValidator {
    policy: TrustPolicy,
    verifier: Arc<dyn ChainVerifier>,
}

impl ServerCertificateValidator {
    pub fn new(policy: TrustPolicy, verifier: Arc<dyn ChainVerifier>) -> Self {
        Self { policy, verifier }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    pub fn validate(&self, status: &ChainStatus, chain: &[X509]) -> Result<()> {
        validate_server_chain(&self.policy, status, chain, self.verifier.as_ref())
    }

    pub fn accepts(&self, status: &ChainStatus, chain: &[X509]) -> bool {
        self.validate(status, chain).is_ok()
    }
}

impl fmt::Debug for ServerCertificateValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCertificateValidator")
            .field("policy", &self.policy)
            .finish()
    }
}
