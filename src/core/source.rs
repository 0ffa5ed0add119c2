use crate::constants::{
    NONCE_PREFIX, NONE_SOURCE, QUOTED_KEYWORDS, REPORT_SAMPLE_SOURCE, SELF_SOURCE,
    STRICT_DYNAMIC_SOURCE, SUFFIX_QUOTE, UNSAFE_EVAL_SOURCE, UNSAFE_INLINE_SOURCE,
};
use crate::security::hash::HashAlgorithm;
use crate::utils::BufferWriter;
use bytes::BytesMut;
use std::{borrow::Cow, fmt};

/// A single source expression within a directive.
///
/// Author-supplied strings are parsed into typed variants where the token is
/// recognized; anything else is carried verbatim as [`Source::Host`] so
/// serialization reproduces author input byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    None,
    Self_,
    UnsafeInline,
    UnsafeEval,
    StrictDynamic,
    ReportSample,
    Host(Cow<'static, str>),
    Scheme(Cow<'static, str>),
    Nonce(Cow<'static, str>),
    Hash {
        algorithm: HashAlgorithm,
        value: Cow<'static, str>,
    },
}

impl Source {
    /// Parses one author-supplied source expression.
    pub fn parse(token: &str) -> Self {
        match token {
            NONE_SOURCE => return Source::None,
            SELF_SOURCE => return Source::Self_,
            UNSAFE_INLINE_SOURCE => return Source::UnsafeInline,
            UNSAFE_EVAL_SOURCE => return Source::UnsafeEval,
            STRICT_DYNAMIC_SOURCE => return Source::StrictDynamic,
            REPORT_SAMPLE_SOURCE => return Source::ReportSample,
            _ => {}
        }

        if let Some(inner) = token
            .strip_prefix(NONCE_PREFIX)
            .and_then(|rest| rest.strip_suffix(SUFFIX_QUOTE))
        {
            return Source::Nonce(Cow::Owned(inner.to_string()));
        }

        for algorithm in [
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            if let Some(value) = token
                .strip_prefix(algorithm.prefix())
                .and_then(|rest| rest.strip_suffix(SUFFIX_QUOTE))
            {
                return Source::Hash {
                    algorithm,
                    value: Cow::Owned(value.to_string()),
                };
            }
        }

        if let Some(scheme) = token.strip_suffix(':') {
            if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
                return Source::Scheme(Cow::Owned(scheme.to_string()));
            }
        }

        Source::Host(Cow::Owned(token.to_string()))
    }

    /// Returns the offending bare keyword when this expression is a CSP
    /// keyword that was not apostrophe-wrapped, e.g. `self` or `"self"`.
    pub fn unquoted_keyword(&self) -> Option<&str> {
        let raw = match self {
            Source::Host(host) => host.as_ref(),
            _ => return None,
        };
        let wrapped =
            raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'');
        if wrapped {
            return None;
        }
        let stripped = raw.trim_matches(|c| c == '\'' || c == '"');
        if QUOTED_KEYWORDS.contains(&stripped) {
            Some(raw)
        } else {
            None
        }
    }

    /// Host-like expressions participate in the external-URL coverage check;
    /// keywords, nonces and hashes do not.
    #[inline]
    pub fn host(&self) -> Option<&str> {
        match self {
            Source::Host(host) => Some(host),
            _ => None,
        }
    }

    #[inline]
    pub fn scheme(&self) -> Option<&str> {
        match self {
            Source::Scheme(scheme) => Some(scheme),
            _ => None,
        }
    }

    #[inline]
    pub fn nonce(&self) -> Option<&str> {
        match self {
            Source::Nonce(nonce) => Some(nonce),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_self(&self) -> bool {
        matches!(self, Source::Self_)
    }

    #[inline]
    pub const fn is_strict_dynamic(&self) -> bool {
        matches!(self, Source::StrictDynamic)
    }

    #[inline]
    pub const fn is_nonce(&self) -> bool {
        matches!(self, Source::Nonce(_))
    }

    #[inline]
    pub const fn is_hash(&self) -> bool {
        matches!(self, Source::Hash { .. })
    }

    #[inline]
    pub fn estimated_size(&self) -> usize {
        match self {
            Source::None => NONE_SOURCE.len(),
            Source::Self_ => SELF_SOURCE.len(),
            Source::UnsafeInline => UNSAFE_INLINE_SOURCE.len(),
            Source::UnsafeEval => UNSAFE_EVAL_SOURCE.len(),
            Source::StrictDynamic => STRICT_DYNAMIC_SOURCE.len(),
            Source::ReportSample => REPORT_SAMPLE_SOURCE.len(),
            Source::Host(host) => host.len(),
            Source::Scheme(scheme) => scheme.len() + 1,
            Source::Nonce(nonce) => NONCE_PREFIX.len() + nonce.len() + SUFFIX_QUOTE.len(),
            Source::Hash { algorithm, value } => {
                algorithm.prefix().len() + value.len() + SUFFIX_QUOTE.len()
            }
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::None => f.write_str(NONE_SOURCE),
            Source::Self_ => f.write_str(SELF_SOURCE),
            Source::UnsafeInline => f.write_str(UNSAFE_INLINE_SOURCE),
            Source::UnsafeEval => f.write_str(UNSAFE_EVAL_SOURCE),
            Source::StrictDynamic => f.write_str(STRICT_DYNAMIC_SOURCE),
            Source::ReportSample => f.write_str(REPORT_SAMPLE_SOURCE),
            Source::Host(host) => f.write_str(host),
            Source::Scheme(scheme) => write!(f, "{}:", scheme),
            Source::Nonce(nonce) => write!(f, "{}{}{}", NONCE_PREFIX, nonce, SUFFIX_QUOTE),
            Source::Hash { algorithm, value } => {
                write!(f, "{}{}{}", algorithm.prefix(), value, SUFFIX_QUOTE)
            }
        }
    }
}

impl BufferWriter for Source {
    fn write_to_buffer(&self, buffer: &mut BytesMut) {
        match self {
            Source::None => buffer.extend_from_slice(NONE_SOURCE.as_bytes()),
            Source::Self_ => buffer.extend_from_slice(SELF_SOURCE.as_bytes()),
            Source::UnsafeInline => buffer.extend_from_slice(UNSAFE_INLINE_SOURCE.as_bytes()),
            Source::UnsafeEval => buffer.extend_from_slice(UNSAFE_EVAL_SOURCE.as_bytes()),
            Source::StrictDynamic => buffer.extend_from_slice(STRICT_DYNAMIC_SOURCE.as_bytes()),
            Source::ReportSample => buffer.extend_from_slice(REPORT_SAMPLE_SOURCE.as_bytes()),
            Source::Host(host) => buffer.extend_from_slice(host.as_bytes()),
            Source::Scheme(scheme) => {
                buffer.extend_from_slice(scheme.as_bytes());
                buffer.extend_from_slice(b":");
            }
            Source::Nonce(nonce) => {
                buffer.reserve(NONCE_PREFIX.len() + nonce.len() + SUFFIX_QUOTE.len());
                buffer.extend_from_slice(NONCE_PREFIX.as_bytes());
                buffer.extend_from_slice(nonce.as_bytes());
                buffer.extend_from_slice(SUFFIX_QUOTE.as_bytes());
            }
            Source::Hash { algorithm, value } => {
                let prefix = algorithm.prefix();
                buffer.reserve(prefix.len() + value.len() + SUFFIX_QUOTE.len());
                buffer.extend_from_slice(prefix.as_bytes());
                buffer.extend_from_slice(value.as_bytes());
                buffer.extend_from_slice(SUFFIX_QUOTE.as_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_keywords() {
        assert_eq!(Source::parse("'self'"), Source::Self_);
        assert_eq!(Source::parse("'none'"), Source::None);
        assert_eq!(Source::parse("'strict-dynamic'"), Source::StrictDynamic);
    }

    #[test]
    fn parses_nonce_and_hash_tokens() {
        assert_eq!(
            Source::parse("'nonce-abc123'").nonce(),
            Some("abc123")
        );
        let hash = Source::parse("'sha384-deadbeef'");
        assert!(hash.is_hash());
        assert_eq!(hash.to_string(), "'sha384-deadbeef'");
    }

    #[test]
    fn parses_schemes_and_hosts() {
        assert_eq!(Source::parse("https:").scheme(), Some("https"));
        assert_eq!(
            Source::parse("https://cdn.example").host(),
            Some("https://cdn.example")
        );
    }

    #[test]
    fn flags_bare_keywords() {
        assert_eq!(Source::parse("self").unquoted_keyword(), Some("self"));
        assert_eq!(
            Source::parse("\"unsafe-inline\"").unquoted_keyword(),
            Some("\"unsafe-inline\"")
        );
        assert_eq!(Source::parse("'self'").unquoted_keyword(), None);
        assert_eq!(
            Source::parse("https://cdn.example").unquoted_keyword(),
            None
        );
    }

    #[test]
    fn display_round_trips_author_tokens() {
        for token in ["'self'", "https://cdn.example", "'nonce-x'", "https:"] {
            assert_eq!(Source::parse(token).to_string(), token);
        }
    }
}
