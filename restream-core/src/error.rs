use thiserror::Error;

use crate::settings::SettingsError;
use restream_providers::ProviderClientError;

#[derive(Error, Debug)]
pub enum Error {
    /// No valid destination access token and no way to mint one without a
    /// human re-authorizing. Aborts provisioning before any upstream call.
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("Upstream API error: {0}")]
    Upstream(#[from] ProviderClientError),

    #[error("Settings store error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
