use std::fmt;

/// Failure categories surfaced to the boundary layer.
///
/// Every domain error maps to exactly one kind, so a transport can map kinds
/// to status codes without inspecting individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Duplicate username or email
    Conflict,
    /// Unknown id or username
    NotFound,
    /// Bad password, unknown login name or locked account
    InvalidCredentials,
    /// Signature, expiry or structure failure of a token
    InvalidToken,
    /// Operation not valid for the current record state
    InvalidState,
    /// Caller lacks permission
    Forbidden,
    /// Input failed value validation
    InvalidInput,
    /// Reading or writing the credential file failed
    StorageFailure,
    /// Anything else; details must not reach the caller
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::InvalidToken => "invalid_token",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::StorageFailure => "storage_failure",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}
