use thiserror::Error;

/// Protocol-level errors. These are never raised for
/// execution outcomes (`NOT_STORED`, `NOT_FOUND`) which are ordinary
/// responses, only for malformed or unrecognized input.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtoError {
    #[error("unknown command")]
    UnknownCommand,
    #[error("malformed command header")]
    MalformedHeader,
    #[error("key exceeds 250 bytes or contains invalid characters")]
    InvalidKey,
}
