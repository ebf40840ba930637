// src/config/mod.rs
mod types;

pub use types::{
    ClientSettings, DEFAULT_CREDENTIAL_WAIT_SECS, DEFAULT_EXEC_TIMEOUT_SECS, DEFAULT_NAMESPACE,
    DEFAULT_REFRESH_MARGIN_SECS,
};
