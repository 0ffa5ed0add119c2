pub(crate) const CSP_META_HTTP_EQUIV: &str = "Content-Security-Policy";

pub(crate) const SCRIPT_SRC: &str = "script-src";
pub(crate) const STYLE_SRC: &str = "style-src";
pub(crate) const BASE_URI: &str = "base-uri";
pub(crate) const OBJECT_SRC: &str = "object-src";

pub(crate) const NONE_SOURCE: &str = "'none'";
pub(crate) const SELF_SOURCE: &str = "'self'";
pub(crate) const UNSAFE_INLINE_SOURCE: &str = "'unsafe-inline'";
pub(crate) const UNSAFE_EVAL_SOURCE: &str = "'unsafe-eval'";
pub(crate) const STRICT_DYNAMIC_SOURCE: &str = "'strict-dynamic'";
pub(crate) const REPORT_SAMPLE_SOURCE: &str = "'report-sample'";
pub(crate) const NONCE_PREFIX: &str = "'nonce-";
pub(crate) const HASH_PREFIX_SHA256: &str = "'sha256-";
pub(crate) const HASH_PREFIX_SHA384: &str = "'sha384-";
pub(crate) const HASH_PREFIX_SHA512: &str = "'sha512-";
pub(crate) const SUFFIX_QUOTE: &str = "'";

/// Bare tokens that must always appear apostrophe-wrapped in author policy.
pub(crate) const QUOTED_KEYWORDS: &[&str] = &[
    "self",
    "unsafe-inline",
    "unsafe-eval",
    "none",
    "strict-dynamic",
    "report-sample",
];

pub(crate) const DEFAULT_NONCE_LENGTH: usize = 16;
pub(crate) const DEFAULT_BUFFER_CAPACITY: usize = 256;
pub(crate) const SEMICOLON_SPACE: &[u8] = b"; ";
