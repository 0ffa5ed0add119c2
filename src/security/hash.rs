use crate::constants::{HASH_PREFIX_SHA256, HASH_PREFIX_SHA384, HASH_PREFIX_SHA512};
use crate::core::source::Source;
use crate::error::CspError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ring::digest::{self, SHA256, SHA384, SHA512};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    #[inline(always)]
    pub fn digest_algorithm(&self) -> &'static digest::Algorithm {
        match self {
            HashAlgorithm::Sha256 => &SHA256,
            HashAlgorithm::Sha384 => &SHA384,
            HashAlgorithm::Sha512 => &SHA512,
        }
    }

    #[inline(always)]
    pub const fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    #[inline(always)]
    pub const fn prefix(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => HASH_PREFIX_SHA256,
            HashAlgorithm::Sha384 => HASH_PREFIX_SHA384,
            HashAlgorithm::Sha512 => HASH_PREFIX_SHA512,
        }
    }
}

impl Default for HashAlgorithm {
    #[inline]
    fn default() -> Self {
        HashAlgorithm::Sha384
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&str> for HashAlgorithm {
    type Error = CspError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(CspError::InvalidHashingMethod(s.to_string())),
        }
    }
}

/// Computes base64 content digests for inline resources. Pure: identical
/// bytes under the same algorithm always yield the same digest string.
#[derive(Debug)]
pub struct HashGenerator;

impl HashGenerator {
    #[inline]
    pub fn generate(algorithm: HashAlgorithm, data: &[u8]) -> String {
        let digest = digest::digest(algorithm.digest_algorithm(), data);
        BASE64.encode(digest.as_ref())
    }

    #[inline]
    pub fn generate_source(algorithm: HashAlgorithm, data: &[u8]) -> Source {
        let hash = Self::generate(algorithm, data);
        Source::Hash {
            algorithm,
            value: hash.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_from_str() {
        assert_eq!(
            HashAlgorithm::try_from("sha256").unwrap(),
            HashAlgorithm::Sha256
        );
        assert_eq!(
            HashAlgorithm::try_from("sha512").unwrap(),
            HashAlgorithm::Sha512
        );
    }

    #[test]
    fn invalid_algorithm_message() {
        let err = HashAlgorithm::try_from("md5").unwrap_err();
        assert_eq!(err.to_string(), "'md5' is not a valid hashing method");
    }

    #[test]
    fn generate_is_deterministic() {
        let a = HashGenerator::generate(HashAlgorithm::Sha384, b"console.log(1)");
        let b = HashGenerator::generate(HashAlgorithm::Sha384, b"console.log(1)");
        assert_eq!(a, b);
        assert_ne!(
            a,
            HashGenerator::generate(HashAlgorithm::Sha384, b"console.log(2)")
        );
    }

    #[test]
    fn source_token_shape() {
        let source = HashGenerator::generate_source(HashAlgorithm::Sha256, b"body{}");
        let rendered = source.to_string();
        assert!(rendered.starts_with("'sha256-"));
        assert!(rendered.ends_with('\''));
    }
}
