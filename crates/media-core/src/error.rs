//! Error handling for the media-forwarding core
//!
//! Only setup-time misconfiguration surfaces as an error; malformed media
//! on the data plane is recovered locally (the offending unit is dropped
//! and processing continues) and never propagates as `Err`.

use thiserror::Error;

/// Result type alias for media-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by setup and configuration calls.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid component configuration.
    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },

    /// A codec this core cannot depacketize or select layers for.
    #[error("Unsupported codec: {codec}")]
    UnsupportedCodec { codec: String },

    /// Malformed out-of-band parameter set description.
    #[error("Invalid parameter sets: {details}")]
    InvalidParameterSets { details: String },
}
