use crate::constants::{BASE_URI, OBJECT_SRC, SCRIPT_SRC, STYLE_SRC};
use crate::core::policy::{CspPolicy, Directive};
use crate::core::source::Source;
use crate::error::CspError;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Deserialize;

/// A directive value as authors write it: a single token or a list.
/// Normalized to a list before any merge so the pipeline is list-uniform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SourceList {
    Single(String),
    Many(Vec<String>),
}

impl SourceList {
    pub fn normalize(&self) -> Vec<&str> {
        match self {
            SourceList::Single(token) => vec![token.as_str()],
            SourceList::Many(tokens) => tokens.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for SourceList {
    fn from(token: &str) -> Self {
        SourceList::Single(token.to_string())
    }
}

impl From<Vec<&str>> for SourceList {
    fn from(tokens: Vec<&str>) -> Self {
        SourceList::Many(tokens.into_iter().map(str::to_string).collect())
    }
}

/// An author-facing policy layer: directive name to string-or-list value,
/// in author insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PolicySpec {
    directives: IndexMap<String, SourceList>,
}

impl PolicySpec {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directive(mut self, name: &str, value: impl Into<SourceList>) -> Self {
        self.directives.insert(name.to_string(), value.into());
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<SourceList>) -> &mut Self {
        self.directives.insert(name.to_string(), value.into());
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceList)> {
        self.directives.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parses a layer out of page metadata JSON (directive -> string|list).
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CspError> {
        serde_json::from_value(value.clone())
            .map_err(|e| CspError::InvalidPolicyShape(e.to_string()))
    }

    /// The directives every page starts from unless a layer overrides them.
    pub fn base_defaults() -> Self {
        PolicySpec::new()
            .directive(BASE_URI, "'self'")
            .directive(OBJECT_SRC, "'none'")
            .directive(
                SCRIPT_SRC,
                vec!["'unsafe-inline'", "'self'", "'unsafe-eval'"],
            )
            .directive(
                STYLE_SRC,
                vec!["'unsafe-inline'", "'self'", "'unsafe-eval'"],
            )
    }
}

/// Merges the three policy layers into one resolved [`CspPolicy`].
///
/// A directive key present in a higher-precedence layer replaces the whole
/// source list from lower layers; absent keys fall through unchanged. No
/// directive appears unless some layer supplies it.
pub fn resolve(
    default: &PolicySpec,
    instance: &PolicySpec,
    page: Option<&PolicySpec>,
) -> CspPolicy {
    let mut merged: IndexMap<String, SourceList> = default.directives.clone();
    for (name, value) in &instance.directives {
        merged.insert(name.clone(), value.clone());
    }
    if let Some(page) = page {
        for (name, value) in &page.directives {
            merged.insert(name.clone(), value.clone());
        }
    }

    let mut policy = CspPolicy::new();
    for (name, value) in &merged {
        let mut directive = Directive::new(name.clone());
        directive.add_sources(value.normalize().into_iter().map(Source::parse));
        policy.set_directive(directive);
    }
    policy
}

/// Per-directive boolean map, e.g. `{"script-src": false}`.
pub type FlagMap = FxHashMap<String, bool>;

/// Three-layer resolution of one per-directive feature flag
/// (page override > instance override > global default of `true`).
#[derive(Debug, Clone, Copy)]
pub struct FeatureFlags<'a> {
    instance: &'a FlagMap,
    page: Option<&'a FlagMap>,
}

impl<'a> FeatureFlags<'a> {
    #[inline]
    pub fn new(instance: &'a FlagMap, page: Option<&'a FlagMap>) -> Self {
        Self { instance, page }
    }

    pub fn enabled(&self, directive: &str) -> bool {
        if let Some(page) = self.page {
            if let Some(&value) = page.get(directive) {
                return value;
            }
        }
        self.instance.get(directive).copied().unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_layer_replaces_whole_directive() {
        let default = PolicySpec::base_defaults();
        let instance = PolicySpec::new().directive("script-src", vec!["'self'"]);
        let page = PolicySpec::new().directive("script-src", "https://cdn.example");

        let resolved = resolve(&default, &instance, Some(&page));
        let script = resolved.get_directive("script-src").unwrap();
        assert_eq!(script.to_string(), "script-src https://cdn.example");
        // Untouched directives fall through from defaults.
        assert_eq!(
            resolved.get_directive("object-src").unwrap().to_string(),
            "object-src 'none'"
        );
    }

    #[test]
    fn no_implicit_directives() {
        let resolved = resolve(
            &PolicySpec::new(),
            &PolicySpec::new().directive("img-src", "'self'"),
            None,
        );
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains("img-src"));
    }

    #[test]
    fn string_values_normalize_to_single_element_lists() {
        let resolved = resolve(
            &PolicySpec::new().directive("base-uri", "'self'"),
            &PolicySpec::new(),
            None,
        );
        assert_eq!(
            resolved.get_directive("base-uri").unwrap().sources().len(),
            1
        );
    }

    #[test]
    fn spec_parses_from_json_metadata() {
        let value = serde_json::json!({
            "script-src": "'self'",
            "style-src": ["'self'", "https://fonts.example"],
        });
        let spec = PolicySpec::from_json(&value).unwrap();
        let resolved = resolve(&spec, &PolicySpec::new(), None);
        assert_eq!(
            resolved.serialize().unwrap(),
            "script-src 'self'; style-src 'self' https://fonts.example"
        );
    }

    #[test]
    fn flags_resolve_page_over_instance_over_default() {
        let mut instance = FlagMap::default();
        instance.insert("script-src".to_string(), false);
        let mut page = FlagMap::default();
        page.insert("script-src".to_string(), true);

        let flags = FeatureFlags::new(&instance, Some(&page));
        assert!(flags.enabled("script-src"));
        assert!(flags.enabled("style-src"));

        let flags = FeatureFlags::new(&instance, None);
        assert!(!flags.enabled("script-src"));
    }
}
