use crate::constants::DEFAULT_NONCE_LENGTH;
use crate::error::CspError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use getrandom::getrandom;
use std::sync::Arc;

/// Source of random bytes for nonce generation. Production uses the OS CSPRNG
/// via [`SystemRandom`]; tests may substitute a deterministic sequence.
pub trait RandomSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<(), CspError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), CspError> {
        getrandom(buf).map_err(|e| CspError::CryptoError(e.to_string()))
    }
}

/// Generates URL-safe base64 nonce tokens of a fixed byte length.
#[derive(Clone)]
pub struct NonceGenerator {
    length: usize,
    random: Arc<dyn RandomSource>,
}

impl NonceGenerator {
    #[inline]
    pub fn new(length: usize) -> Self {
        Self {
            length,
            random: Arc::new(SystemRandom),
        }
    }

    #[inline]
    pub fn with_random_source(length: usize, random: Arc<dyn RandomSource>) -> Self {
        Self { length, random }
    }

    pub fn generate(&self) -> Result<String, CspError> {
        let mut buffer = vec![0u8; self.length];
        self.random.fill(&mut buffer)?;
        Ok(BASE64.encode(&buffer))
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for NonceGenerator {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_NONCE_LENGTH)
    }
}

impl std::fmt::Debug for NonceGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceGenerator")
            .field("length", &self.length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingRandom(std::sync::atomic::AtomicU8);

    impl RandomSource for CountingRandom {
        fn fill(&self, buf: &mut [u8]) -> Result<(), CspError> {
            let seed = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            for b in buf.iter_mut() {
                *b = seed;
            }
            Ok(())
        }
    }

    #[test]
    fn generates_url_safe_tokens() {
        let generator = NonceGenerator::default();
        let token = generator.generate().unwrap();
        assert!(!token.is_empty());
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert!(!token.contains('='));
    }

    #[test]
    fn injectable_source_is_deterministic() {
        let generator = NonceGenerator::with_random_source(
            8,
            Arc::new(CountingRandom(std::sync::atomic::AtomicU8::new(0))),
        );
        let first = generator.generate().unwrap();
        let second = generator.generate().unwrap();
        assert_ne!(first, second);
        assert_eq!(first, BASE64.encode([0u8; 8]));
        assert_eq!(second, BASE64.encode([1u8; 8]));
    }
}
