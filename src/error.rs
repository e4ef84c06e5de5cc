use thiserror::Error;

/// Failures of API calls that cannot be recovered into a partial result.
///
/// Malformed subtitle content is never reported through this type; see
/// [`crate::diagnostics`] for that.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown subtitle format: {0}")]
    UnknownFormat(String),

    #[error("An effect handler for \\{0} is already registered")]
    EffectAlreadyRegistered(String),

    #[error("\\{0} is handled by the built-in tag grammar and cannot be registered")]
    ReservedEffectName(String),

    #[error("Effect tag names must be non-empty and alphabetic: {0:?}")]
    InvalidEffectName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
