pub use crate::core::{CspPolicy, Directive, PolicySpec, Source, SourceList};
pub use crate::error::CspError;
pub use crate::html::Document;
pub use crate::plugin::{AssetDigests, CspPlugin, CspPluginBuilder, PageContext, PageOverrides};
pub use crate::report::{BuildReport, PageResult, PageStatus};
pub use crate::security::{HashAlgorithm, HashGenerator, NonceGenerator, RandomSource};
