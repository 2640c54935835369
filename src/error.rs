//! Error types for the token economy client and swap engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Recognized on-chain program failures.
///
/// Raw execution logs are translated into this closed enum exactly once,
/// at the transport boundary (`transport::classify_program_logs`). Business
/// logic matches on these variants and never inspects log text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramErrorKind {
    #[error("slippage tolerance exceeded")]
    SlippageExceeded,

    #[error("daily minting limit reached")]
    DailyLimitReached,

    #[error("invalid PIN")]
    InvalidPin,

    #[error("party has already unlocked this connection")]
    AlreadyUnlocked,

    #[error("connection is already fully unlocked")]
    ConnectionFullyUnlocked,

    #[error("unauthorized user for this connection")]
    UnauthorizedUser,

    #[error("account already in use")]
    AccountAlreadyInUse,

    #[error("invalid amount")]
    InvalidAmount,

    #[error("user id too long")]
    UserIdTooLong,

    #[error("unrecognized program error: {0}")]
    Unknown(String),
}

/// Main error type for the client
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    // Local checks - resolved before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: {required} required, {available} available")]
    InsufficientFunds { required: u64, available: u64 },

    // On-chain program rejected the transaction
    #[error("Program error: {0}")]
    Program(ProgramErrorKind),

    // Transport / RPC / quoting service failures, not schema-related
    #[error("Network error: {0}")]
    Network(String),

    // Schema mismatch against the external program ABI - must never be
    // silently tolerated
    #[error("Account decode failed: {0}")]
    Codec(String),

    // Call paths intentionally not wired yet
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// The one failure the swap engine is allowed to retry (sell direction
    /// only, with escalated tolerance).
    pub fn is_slippage_exceeded(&self) -> bool {
        matches!(self, Error::Program(ProgramErrorKind::SlippageExceeded))
    }

    /// Errors resolved locally, before reaching the network.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::InsufficientFunds { .. } | Error::Unsupported(_)
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Network(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}
