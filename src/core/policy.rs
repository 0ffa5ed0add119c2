use crate::constants::{DEFAULT_BUFFER_CAPACITY, SEMICOLON_SPACE};
use crate::core::source::Source;
use crate::error::CspError;
use crate::utils::BufferWriter;
use bytes::BytesMut;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::{borrow::Cow, fmt};

/// One directive with its ordered source list.
///
/// Insertion order is semantic: serialization reproduces author sources
/// first, then appended digests, then nonces, with `'strict-dynamic'`
/// relocated behind them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Directive {
    name: Cow<'static, str>,
    sources: SmallVec<[Source; 4]>,
}

impl Directive {
    #[inline]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            sources: SmallVec::new(),
        }
    }

    /// Appends a source unless an identical one is already present.
    /// De-duplication keeps first-occurrence order, which also collapses
    /// identical digests arising from repeated inline bodies.
    pub fn add_source(&mut self, source: Source) -> &mut Self {
        if !self.sources.iter().any(|s| s == &source) {
            self.sources.push(source);
        }
        self
    }

    pub fn add_sources<I>(&mut self, sources: I) -> &mut Self
    where
        I: IntoIterator<Item = Source>,
    {
        for source in sources {
            self.add_source(source);
        }
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    #[inline]
    pub fn contains_strict_dynamic(&self) -> bool {
        self.sources.iter().any(|s| s.is_strict_dynamic())
    }

    #[inline]
    pub fn contains_nonce(&self) -> bool {
        self.sources.iter().any(|s| s.is_nonce())
    }

    #[inline]
    pub fn contains_hash(&self) -> bool {
        self.sources.iter().any(|s| s.is_hash())
    }

    /// Moves `'strict-dynamic'` to the end of the source list so it
    /// serializes after every nonce entry. No-op when absent.
    pub fn relocate_strict_dynamic(&mut self) {
        if let Some(pos) = self.sources.iter().position(|s| s.is_strict_dynamic()) {
            if pos + 1 != self.sources.len() {
                let source = self.sources.remove(pos);
                self.sources.push(source);
            }
        }
    }

    #[inline]
    pub fn estimated_size(&self) -> usize {
        let mut size = self.name.len();
        if !self.sources.is_empty() {
            size += 1;
            size += self
                .sources
                .iter()
                .map(|s| s.estimated_size())
                .sum::<usize>();
            size += self.sources.len().saturating_sub(1);
        }
        size
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for source in &self.sources {
            write!(f, " {}", source)?;
        }
        Ok(())
    }
}

impl BufferWriter for Directive {
    fn write_to_buffer(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(self.name.as_bytes());
        for source in &self.sources {
            buffer.extend_from_slice(b" ");
            source.write_to_buffer(buffer);
        }
    }
}

/// A resolved per-page policy: an insertion-ordered directive map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CspPolicy {
    directives: IndexMap<Cow<'static, str>, Directive>,
}

impl CspPolicy {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a directive. Replacing keeps the directive's
    /// original position in the serialization order; new keys append.
    pub fn set_directive(&mut self, directive: Directive) -> &mut Self {
        let name = directive.name().to_owned();
        self.directives.insert(Cow::Owned(name), directive);
        self
    }

    #[inline]
    pub fn get_directive(&self, name: &str) -> Option<&Directive> {
        self.directives.get(name)
    }

    #[inline]
    pub fn get_directive_mut(&mut self, name: &str) -> Option<&mut Directive> {
        self.directives.get_mut(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    #[inline]
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.directives.values()
    }

    #[inline]
    pub fn directives_mut(&mut self) -> impl Iterator<Item = &mut Directive> {
        self.directives.values_mut()
    }

    /// Renders the policy to its exact wire form: sources space-joined,
    /// directives joined with `"; "`, no trailing separator.
    pub fn serialize(&self) -> Result<String, CspError> {
        let capacity = self
            .directives
            .values()
            .map(|d| d.estimated_size() + SEMICOLON_SPACE.len())
            .sum::<usize>()
            .max(DEFAULT_BUFFER_CAPACITY);
        let mut buffer = BytesMut::with_capacity(capacity);

        let mut first = true;
        for directive in self.directives.values() {
            if !first {
                buffer.extend_from_slice(SEMICOLON_SPACE);
            }
            directive.write_to_buffer(&mut buffer);
            first = false;
        }

        String::from_utf8(Vec::from(buffer))
            .map_err(|e| CspError::SerializationError(e.to_string()))
    }
}

impl fmt::Display for CspPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.serialize() {
            Ok(rendered) => f.write_str(&rendered),
            Err(_) => Err(fmt::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(name: &'static str, tokens: &[&str]) -> Directive {
        let mut d = Directive::new(name);
        d.add_sources(tokens.iter().map(|t| Source::parse(t)));
        d
    }

    #[test]
    fn serializes_with_exact_separators() {
        let mut policy = CspPolicy::new();
        policy.set_directive(directive("base-uri", &["'self'"]));
        policy.set_directive(directive("object-src", &["'none'"]));
        assert_eq!(
            policy.serialize().unwrap(),
            "base-uri 'self'; object-src 'none'"
        );
    }

    #[test]
    fn replacement_keeps_directive_position() {
        let mut policy = CspPolicy::new();
        policy.set_directive(directive("script-src", &["'self'"]));
        policy.set_directive(directive("style-src", &["'self'"]));
        policy.set_directive(directive("script-src", &["https://cdn.example"]));
        assert_eq!(
            policy.serialize().unwrap(),
            "script-src https://cdn.example; style-src 'self'"
        );
    }

    #[test]
    fn duplicate_sources_collapse() {
        let mut d = directive("script-src", &["'self'"]);
        d.add_source(Source::parse("'sha384-abc'"));
        d.add_source(Source::parse("'sha384-abc'"));
        assert_eq!(d.to_string(), "script-src 'self' 'sha384-abc'");
    }

    #[test]
    fn strict_dynamic_moves_behind_nonces() {
        let mut d = directive("script-src", &["'self'", "'strict-dynamic'"]);
        d.add_source(Source::parse("'nonce-one'"));
        d.add_source(Source::parse("'nonce-two'"));
        d.relocate_strict_dynamic();
        assert_eq!(
            d.to_string(),
            "script-src 'self' 'nonce-one' 'nonce-two' 'strict-dynamic'"
        );
    }
}
