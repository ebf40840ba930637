// src/cert/mod.rs
mod info;
mod material;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use info::{certificate_subject, CertificateInfo};
pub use material::{
    client_certificate_from_pem, decode_base64, load_certificate, load_client_certificate,
    load_private_key, parse_certificate, parse_private_key, MaterialSource,
};
pub use types::ClientCertificate;
