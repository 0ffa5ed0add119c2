//! Build-time Content Security Policy injection for statically generated
//! HTML.
//!
//! Resolves a layered policy (defaults, plugin instance, per-page), validates
//! it, digests inline scripts and styles, allocates nonces for external
//! resources, and writes the serialized policy into each page's CSP meta tag
//! (or hands it to a custom output hook), keeping policy and markup mutually
//! consistent without hand-maintained allowlists.

pub mod constants;
pub mod core;
pub mod error;
pub mod html;
pub mod plugin;
pub mod prelude;
pub mod report;
pub mod security;
pub(crate) mod utils;

pub use crate::core::{
    resolve, validate_keywords, CspPolicy, Directive, FeatureFlags, FlagMap, PolicySpec, Source,
    SourceList,
};
pub use error::CspError;
pub use html::Document;
pub use plugin::{
    write_meta_tag, AssetDigests, CspPlugin, CspPluginBuilder, Enabled, PageContext, PageOverrides,
    ProcessFn,
};
pub use report::{BuildReport, PageResult, PageStatus};
pub use security::{covers_url, HashAlgorithm, HashGenerator, NonceGenerator, RandomSource, SystemRandom};
