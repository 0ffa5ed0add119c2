pub mod policy;
pub mod resolve;
pub mod source;
pub mod validate;

pub use policy::{CspPolicy, Directive};
pub use resolve::{resolve, FeatureFlags, FlagMap, PolicySpec, SourceList};
pub use source::Source;
pub use validate::validate_keywords;
