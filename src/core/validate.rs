use crate::core::policy::CspPolicy;
use crate::error::CspError;

/// Rejects bare CSP keywords that authors forgot to apostrophe-wrap.
///
/// Runs once per resolved page policy, before digest/nonce augmentation, so
/// it only ever sees author input. Generated hash and nonce tokens never
/// pass through here.
pub fn validate_keywords(policy: &CspPolicy) -> Result<(), CspError> {
    for directive in policy.directives() {
        for source in directive.sources() {
            if let Some(token) = source.unquoted_keyword() {
                return Err(CspError::UnquotedKeyword {
                    directive: directive.name().to_string(),
                    token: token.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolve::{resolve, PolicySpec};

    #[test]
    fn bare_keyword_is_rejected_with_exact_message() {
        let spec = PolicySpec::new().directive("script-src", vec!["self"]);
        let policy = resolve(&spec, &PolicySpec::new(), None);
        let err = validate_keywords(&policy).unwrap_err();
        assert_eq!(
            err.to_string(),
            "CSP: policy for script-src contains self which should be wrapped in apostrophes"
        );
    }

    #[test]
    fn string_shaped_directive_is_checked_too() {
        let spec = PolicySpec::new().directive("style-src", "unsafe-inline");
        let policy = resolve(&spec, &PolicySpec::new(), None);
        assert!(validate_keywords(&policy).is_err());
    }

    #[test]
    fn quoted_keywords_and_hosts_pass() {
        let spec = PolicySpec::new()
            .directive("script-src", vec!["'self'", "'unsafe-eval'", "https://cdn.example"]);
        let policy = resolve(&spec, &PolicySpec::new(), None);
        assert!(validate_keywords(&policy).is_ok());
    }
}
