pub mod cover;
pub mod hash;
pub mod nonce;

pub use cover::covers_url;
pub use hash::{HashAlgorithm, HashGenerator};
pub use nonce::{NonceGenerator, RandomSource, SystemRandom};
