use crate::constants::{CSP_META_HTTP_EQUIV, SCRIPT_SRC, STYLE_SRC};
use crate::core::policy::CspPolicy;
use crate::core::resolve::{resolve, FeatureFlags, FlagMap, PolicySpec};
use crate::core::source::Source;
use crate::core::validate::validate_keywords;
use crate::core::Directive;
use crate::error::CspError;
use crate::html::{Document, NodeId};
use crate::report::{BuildReport, PageResult, PageStatus};
use crate::security::cover::covers_url;
use crate::security::hash::{HashAlgorithm, HashGenerator};
use crate::security::nonce::{NonceGenerator, RandomSource};
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::sync::Arc;

/// Reserved key in page metadata holding the per-page override surface.
const PAGE_OVERRIDE_KEY: &str = "csp";

/// Output hook invoked with the final serialized policy. The default hook
/// writes the meta tag; a custom hook replaces that write entirely.
pub type ProcessFn =
    Arc<dyn Fn(&str, &mut Document, &PageContext) -> Result<(), CspError> + Send + Sync>;

/// Whether the plugin runs, as a static flag or a predicate over the page.
#[derive(Clone)]
pub enum Enabled {
    Bool(bool),
    Predicate(Arc<dyn Fn(&PageContext) -> bool + Send + Sync>),
}

impl Enabled {
    pub fn evaluate(&self, ctx: &PageContext) -> bool {
        match self {
            Enabled::Bool(value) => *value,
            Enabled::Predicate(predicate) => predicate(ctx),
        }
    }
}

impl Default for Enabled {
    fn default() -> Self {
        Enabled::Bool(true)
    }
}

impl From<bool> for Enabled {
    fn from(value: bool) -> Self {
        Enabled::Bool(value)
    }
}

impl std::fmt::Debug for Enabled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Enabled::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Enabled::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Identity and metadata of one page being augmented.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub path: String,
    pub metadata: serde_json::Value,
    overrides: PageOverrides,
}

impl PageContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            metadata: serde_json::Value::Null,
            overrides: PageOverrides::default(),
        }
    }

    /// Attaches page metadata and extracts the override surface from its
    /// reserved `csp` key, when present.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Result<Self, CspError> {
        if let Some(raw) = metadata.get(PAGE_OVERRIDE_KEY) {
            self.overrides = PageOverrides::from_json(raw)?;
        }
        self.metadata = metadata;
        Ok(self)
    }

    pub fn with_overrides(mut self, overrides: PageOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    #[inline]
    pub fn overrides(&self) -> &PageOverrides {
        &self.overrides
    }
}

/// Per-page override surface; same shapes and precedence as instance options.
#[derive(Default, Clone)]
pub struct PageOverrides {
    pub enabled: Option<Enabled>,
    pub policy: Option<PolicySpec>,
    pub hash_enabled: Option<FlagMap>,
    pub nonce_enabled: Option<FlagMap>,
    pub process_fn: Option<ProcessFn>,
}

#[derive(Deserialize)]
struct RawOverrides {
    enabled: Option<bool>,
    policy: Option<PolicySpec>,
    #[serde(rename = "hashEnabled")]
    hash_enabled: Option<FlagMap>,
    #[serde(rename = "nonceEnabled")]
    nonce_enabled: Option<FlagMap>,
}

impl PageOverrides {
    /// Parses the serializable subset from page metadata JSON. The output
    /// hook is not representable in metadata and stays `None`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CspError> {
        let raw: RawOverrides = serde_json::from_value(value.clone())
            .map_err(|e| CspError::InvalidPolicyShape(e.to_string()))?;
        Ok(Self {
            enabled: raw.enabled.map(Enabled::from),
            policy: raw.policy,
            hash_enabled: raw.hash_enabled,
            nonce_enabled: raw.nonce_enabled,
            process_fn: None,
        })
    }
}

impl std::fmt::Debug for PageOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageOverrides")
            .field("enabled", &self.enabled)
            .field("policy", &self.policy)
            .field("hash_enabled", &self.hash_enabled)
            .field("nonce_enabled", &self.nonce_enabled)
            .field("process_fn", &self.process_fn.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Pre-computed subresource-integrity digests keyed by the exact
/// `src`/`href` string, supplied by the surrounding build.
#[derive(Debug, Clone, Default)]
pub struct AssetDigests {
    digests: FxHashMap<String, String>,
}

impl AssetDigests {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, digest: impl Into<String>) {
        self.digests.insert(url.into(), digest.into());
    }

    #[inline]
    pub fn get(&self, url: &str) -> Option<&str> {
        self.digests.get(url).map(String::as_str)
    }
}

/// The plugin instance: resolved construction options plus the per-page
/// augmentation engine.
#[derive(Clone)]
pub struct CspPlugin {
    default_policy: PolicySpec,
    policy: PolicySpec,
    enabled: Enabled,
    integrity_enabled: bool,
    hashing_method: HashAlgorithm,
    hash_enabled: FlagMap,
    nonce_enabled: FlagMap,
    process_fn: Option<ProcessFn>,
    public_path: Option<String>,
    nonce_generator: NonceGenerator,
}

impl CspPlugin {
    #[inline]
    pub fn builder() -> CspPluginBuilder {
        CspPluginBuilder::new()
    }

    #[inline]
    pub fn hashing_method(&self) -> HashAlgorithm {
        self.hashing_method
    }

    /// Augments one page in place.
    ///
    /// Disabled pages come back [`PageStatus::Skipped`] with the tree
    /// untouched. Attribute writes are staged and applied in one batch
    /// after every fallible step, so a validation or nonce-generation
    /// failure surfaces as an error with the tree unmodified.
    pub fn process_page(
        &self,
        doc: &mut Document,
        ctx: &PageContext,
        assets: &AssetDigests,
    ) -> Result<PageResult, CspError> {
        let overrides = ctx.overrides();

        let enabled = overrides
            .enabled
            .as_ref()
            .unwrap_or(&self.enabled)
            .evaluate(ctx);
        if !enabled {
            debug!("csp disabled for page {}", ctx.path);
            return Ok(PageResult::skipped(ctx.path.clone()));
        }

        let mut policy = resolve(
            &self.default_policy,
            &self.policy,
            overrides.policy.as_ref(),
        );
        validate_keywords(&policy)?;

        let hash_flags = FeatureFlags::new(&self.hash_enabled, overrides.hash_enabled.as_ref());
        let nonce_flags =
            FeatureFlags::new(&self.nonce_enabled, overrides.nonce_enabled.as_ref());

        let mut counts = Counts::default();
        let mut staged: Vec<AttrWrite> = Vec::new();
        for element in self.collect_resource_elements(doc) {
            self.plan_element(
                doc,
                &mut policy,
                element,
                &hash_flags,
                &nonce_flags,
                assets,
                &mut staged,
                &mut counts,
            )?;
        }

        for directive in policy.directives_mut() {
            directive.relocate_strict_dynamic();
        }

        let serialized = policy.serialize()?;
        debug!(
            "page {}: {} hashes, {} nonces, {} integrity attributes",
            ctx.path, counts.hashes, counts.nonces, counts.integrity
        );

        for write in staged {
            doc.set_attribute(write.id, write.attr, &write.value);
        }

        match overrides.process_fn.as_ref().or(self.process_fn.as_ref()) {
            Some(hook) => hook(&serialized, doc, ctx)?,
            None => write_meta_tag(doc, &serialized),
        }

        Ok(PageResult {
            page: ctx.path.clone(),
            status: PageStatus::Completed,
            policy: Some(serialized),
            hashes_added: counts.hashes,
            nonces_added: counts.nonces,
            integrity_added: counts.integrity,
        })
    }

    /// Processes independent pages, collecting failures instead of aborting.
    pub fn process_pages(
        &self,
        pages: &mut [(Document, PageContext)],
        assets: &AssetDigests,
    ) -> BuildReport {
        let mut report = BuildReport::new();
        for (doc, ctx) in pages.iter_mut() {
            match self.process_page(doc, ctx, assets) {
                Ok(result) => report.record(result),
                Err(error) => {
                    warn!("csp failed for page {}: {}", ctx.path, error);
                    report.record_failure(ctx.path.clone(), error);
                }
            }
        }
        report
    }

    /// Script, style and stylesheet-link elements in document order.
    fn collect_resource_elements(&self, doc: &Document) -> Vec<ResourceElement> {
        let mut elements: Vec<ResourceElement> = Vec::new();
        for id in doc.elements_by_tag("script") {
            let external = doc.get_attribute(id, "src").map(str::to_string);
            elements.push(ResourceElement {
                id,
                directive: SCRIPT_SRC,
                external,
            });
        }
        for id in doc.elements_by_tag("style") {
            elements.push(ResourceElement {
                id,
                directive: STYLE_SRC,
                external: None,
            });
        }
        for id in doc.elements_by_tag("link") {
            if doc.get_attribute(id, "rel") == Some("stylesheet") {
                if let Some(href) = doc.get_attribute(id, "href") {
                    elements.push(ResourceElement {
                        id,
                        directive: STYLE_SRC,
                        external: Some(href.to_string()),
                    });
                }
            }
        }
        // Template contents are inert until cloned; they never load.
        elements.retain(|e| !doc.in_template(e.id));
        // Node ids are assigned in parse order, so this restores document
        // order across the three tag queries.
        elements.sort_by_key(|e| e.id);
        elements
    }

    /// Plans one element's augmentation: policy appends happen eagerly (the
    /// policy is page-local and discarded on error), attribute writes are
    /// staged for the post-validation batch.
    fn plan_element(
        &self,
        doc: &Document,
        policy: &mut CspPolicy,
        element: ResourceElement,
        hash_flags: &FeatureFlags<'_>,
        nonce_flags: &FeatureFlags<'_>,
        assets: &AssetDigests,
        staged: &mut Vec<AttrWrite>,
        counts: &mut Counts,
    ) -> Result<(), CspError> {
        let directive = element.directive;

        match element.external {
            None => {
                if hash_flags.enabled(directive) {
                    let content = doc.text_content(element.id);
                    let source =
                        HashGenerator::generate_source(self.hashing_method, content.as_bytes());
                    counts.hashes += append_source(policy, directive, source);
                }
                if nonce_flags.enabled(directive) {
                    self.stage_nonce(policy, element.id, directive, staged, counts)?;
                }
            }
            Some(url) => {
                if nonce_flags.enabled(directive) && self.needs_nonce(policy, directive, &url) {
                    self.stage_nonce(policy, element.id, directive, staged, counts)?;
                }
                if self.integrity_enabled {
                    if let Some(digest) = assets.get(&url) {
                        staged.push(AttrWrite {
                            id: element.id,
                            attr: "integrity",
                            value: digest.to_string(),
                        });
                        counts.integrity += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// The nonce decision for an external element: hosts already allowlisted
    /// by the directive need no nonce, unless `'strict-dynamic'` is present,
    /// which makes browsers ignore host-based trust.
    fn needs_nonce(&self, policy: &CspPolicy, directive: &str, url: &str) -> bool {
        match policy.get_directive(directive) {
            Some(d) => {
                !covers_url(d, url, self.public_path.as_deref()) || d.contains_strict_dynamic()
            }
            None => true,
        }
    }

    fn stage_nonce(
        &self,
        policy: &mut CspPolicy,
        id: NodeId,
        directive: &'static str,
        staged: &mut Vec<AttrWrite>,
        counts: &mut Counts,
    ) -> Result<(), CspError> {
        let token = self.nonce_generator.generate()?;
        staged.push(AttrWrite {
            id,
            attr: "nonce",
            value: token.clone(),
        });
        counts.nonces += append_source(policy, directive, Source::Nonce(token.into()));
        Ok(())
    }
}

impl std::fmt::Debug for CspPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CspPlugin")
            .field("enabled", &self.enabled)
            .field("integrity_enabled", &self.integrity_enabled)
            .field("hashing_method", &self.hashing_method)
            .field("public_path", &self.public_path)
            .finish()
    }
}

#[derive(Debug, Default)]
struct Counts {
    hashes: usize,
    nonces: usize,
    integrity: usize,
}

struct ResourceElement {
    id: NodeId,
    directive: &'static str,
    external: Option<String>,
}

/// One deferred attribute write, applied only once the whole page has
/// augmented cleanly.
struct AttrWrite {
    id: NodeId,
    attr: &'static str,
    value: String,
}

/// Appends a source to a directive, creating the directive at the end of the
/// policy when no layer supplied it. Returns how many entries were added
/// (0 when de-duplicated).
fn append_source(policy: &mut CspPolicy, directive: &'static str, source: Source) -> usize {
    if !policy.contains(directive) {
        policy.set_directive(Directive::new(directive));
    }
    match policy.get_directive_mut(directive) {
        Some(d) => {
            let before = d.sources().len();
            d.add_source(source);
            d.sources().len() - before
        }
        None => 0,
    }
}

/// The default output hook: overwrite the `content` of an existing CSP meta
/// tag, or insert a fresh meta tag as the first child of `<head>` so the
/// policy takes effect before any resource-loading tag.
pub fn write_meta_tag(doc: &mut Document, policy: &str) {
    for id in doc.elements_by_tag("meta") {
        let matches = doc
            .get_attribute(id, "http-equiv")
            .is_some_and(|v| v.eq_ignore_ascii_case(CSP_META_HTTP_EQUIV));
        if matches {
            doc.set_attribute(id, "content", policy);
            return;
        }
    }

    let meta = doc.create_element(
        "meta",
        vec![
            ("http-equiv".to_string(), CSP_META_HTTP_EQUIV.to_string()),
            ("content".to_string(), policy.to_string()),
        ],
    );
    let parent = doc.head().unwrap_or_else(|| doc.root());
    doc.insert_first_child(parent, meta);
}

/// Construction options; `build` fails fast on an invalid hashing method
/// before any page is processed.
pub struct CspPluginBuilder {
    policy: PolicySpec,
    enabled: Enabled,
    integrity_enabled: bool,
    hashing_method: String,
    hash_enabled: FlagMap,
    nonce_enabled: FlagMap,
    process_fn: Option<ProcessFn>,
    public_path: Option<String>,
    random_source: Option<Arc<dyn RandomSource>>,
}

impl CspPluginBuilder {
    pub fn new() -> Self {
        Self {
            policy: PolicySpec::new(),
            enabled: Enabled::default(),
            integrity_enabled: true,
            hashing_method: HashAlgorithm::default().name().to_string(),
            hash_enabled: FlagMap::default(),
            nonce_enabled: FlagMap::default(),
            process_fn: None,
            public_path: None,
            random_source: None,
        }
    }

    pub fn policy(mut self, policy: PolicySpec) -> Self {
        self.policy = policy;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Enabled::Bool(enabled);
        self
    }

    pub fn enabled_fn<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PageContext) -> bool + Send + Sync + 'static,
    {
        self.enabled = Enabled::Predicate(Arc::new(predicate));
        self
    }

    pub fn integrity_enabled(mut self, enabled: bool) -> Self {
        self.integrity_enabled = enabled;
        self
    }

    pub fn hashing_method(mut self, method: impl Into<String>) -> Self {
        self.hashing_method = method.into();
        self
    }

    pub fn hash_enabled(mut self, directive: &str, enabled: bool) -> Self {
        self.hash_enabled.insert(directive.to_string(), enabled);
        self
    }

    pub fn nonce_enabled(mut self, directive: &str, enabled: bool) -> Self {
        self.nonce_enabled.insert(directive.to_string(), enabled);
        self
    }

    pub fn process_fn<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &mut Document, &PageContext) -> Result<(), CspError> + Send + Sync + 'static,
    {
        self.process_fn = Some(Arc::new(hook));
        self
    }

    pub fn public_path(mut self, path: impl Into<String>) -> Self {
        self.public_path = Some(path.into());
        self
    }

    pub fn random_source(mut self, source: Arc<dyn RandomSource>) -> Self {
        self.random_source = Some(source);
        self
    }

    pub fn build(self) -> Result<CspPlugin, CspError> {
        let hashing_method = HashAlgorithm::try_from(self.hashing_method.as_str())?;
        let nonce_generator = match self.random_source {
            Some(source) => NonceGenerator::with_random_source(
                crate::constants::DEFAULT_NONCE_LENGTH,
                source,
            ),
            None => NonceGenerator::default(),
        };
        Ok(CspPlugin {
            default_policy: PolicySpec::base_defaults(),
            policy: self.policy,
            enabled: self.enabled,
            integrity_enabled: self.integrity_enabled,
            hashing_method,
            hash_enabled: self.hash_enabled,
            nonce_enabled: self.nonce_enabled,
            process_fn: self.process_fn,
            public_path: self.public_path,
            nonce_generator,
        })
    }
}

impl Default for CspPluginBuilder {
    fn default() -> Self {
        Self::new()
    }
}
