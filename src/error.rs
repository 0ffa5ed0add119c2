use thiserror::Error;

#[derive(Debug, Error)]
pub enum CspError {
    /// Construction-time failure: the configured hashing method is not one of
    /// sha256/sha384/sha512. Fatal; the plugin cannot be built.
    #[error("'{0}' is not a valid hashing method")]
    InvalidHashingMethod(String),

    /// Per-page failure: an author-supplied source expression is a bare CSP
    /// keyword that must be apostrophe-wrapped.
    #[error("CSP: policy for {directive} contains {token} which should be wrapped in apostrophes")]
    UnquotedKeyword { directive: String, token: String },

    #[error("Invalid directive value: {0}")]
    InvalidDirectiveValue(String),

    #[error("Invalid policy shape: {0}")]
    InvalidPolicyShape(String),

    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("HTML parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
