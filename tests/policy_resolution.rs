use csp_html_augment::prelude::*;
use csp_html_augment::{resolve, validate_keywords, HashAlgorithm};
use proptest::prelude::*;

#[test]
fn page_layer_wins_per_directive_without_bleed() {
    let default = PolicySpec::new()
        .directive("script-src", vec!["'self'"])
        .directive("style-src", vec!["'self'"])
        .directive("img-src", vec!["'self'"]);
    let instance = PolicySpec::new()
        .directive("script-src", vec!["https://instance.example"])
        .directive("style-src", vec!["https://instance.example"]);
    let page = PolicySpec::new().directive("script-src", vec!["https://page.example"]);

    let resolved = resolve(&default, &instance, Some(&page));
    assert_eq!(
        resolved.serialize().unwrap(),
        "script-src https://page.example; style-src https://instance.example; img-src 'self'"
    );
}

#[test]
fn full_list_replacement_not_per_source_merge() {
    let default = PolicySpec::new().directive("script-src", vec!["'self'", "'unsafe-eval'"]);
    let page = PolicySpec::new().directive("script-src", vec!["https://cdn.example"]);

    let resolved = resolve(&default, &PolicySpec::new(), Some(&page));
    let script = resolved.get_directive("script-src").unwrap();
    assert_eq!(script.sources().len(), 1);
    assert_eq!(script.to_string(), "script-src https://cdn.example");
}

#[test]
fn default_policy_directives() {
    let resolved = resolve(&PolicySpec::base_defaults(), &PolicySpec::new(), None);
    assert_eq!(
        resolved.serialize().unwrap(),
        "base-uri 'self'; object-src 'none'; \
         script-src 'unsafe-inline' 'self' 'unsafe-eval'; \
         style-src 'unsafe-inline' 'self' 'unsafe-eval'"
    );
}

#[test]
fn unquoted_keyword_in_list_shape() {
    let spec = PolicySpec::new().directive("script-src", vec!["'self'", "strict-dynamic"]);
    let resolved = resolve(&spec, &PolicySpec::new(), None);
    let err = validate_keywords(&resolved).unwrap_err();
    assert_eq!(
        err.to_string(),
        "CSP: policy for script-src contains strict-dynamic which should be wrapped in apostrophes"
    );
}

#[test]
fn unquoted_keyword_in_string_shape() {
    let spec = PolicySpec::new().directive("object-src", "none");
    let resolved = resolve(&spec, &PolicySpec::new(), None);
    assert!(validate_keywords(&resolved).is_err());
}

#[test]
fn double_quoted_keyword_is_still_rejected() {
    let spec = PolicySpec::new().directive("script-src", vec!["\"self\""]);
    let resolved = resolve(&spec, &PolicySpec::new(), None);
    let err = validate_keywords(&resolved).unwrap_err();
    assert!(err.to_string().contains("\"self\""));
}

#[test]
fn invalid_hashing_method_fails_construction() {
    let err = CspPluginBuilder::new()
        .hashing_method("md5")
        .build()
        .unwrap_err();
    assert_eq!(err.to_string(), "'md5' is not a valid hashing method");

    assert!(CspPluginBuilder::new().hashing_method("sha256").build().is_ok());
}

proptest! {
    #[test]
    fn digests_are_referentially_stable(content in ".*") {
        let a = HashGenerator::generate(HashAlgorithm::Sha384, content.as_bytes());
        let b = HashGenerator::generate(HashAlgorithm::Sha384, content.as_bytes());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn distinct_bodies_never_collapse(a in "[a-z]{1,32}", b in "[a-z]{1,32}") {
        prop_assume!(a != b);
        prop_assert_ne!(
            HashGenerator::generate(HashAlgorithm::Sha384, a.as_bytes()),
            HashGenerator::generate(HashAlgorithm::Sha384, b.as_bytes())
        );
    }

    #[test]
    fn page_layer_always_replaces(token in "[a-z]{3,12}") {
        let host = format!("https://{}.example", token);
        let default = PolicySpec::new().directive("script-src", vec!["'self'"]);
        let page = PolicySpec::new().directive("script-src", host.as_str());
        let resolved = resolve(&default, &PolicySpec::new(), Some(&page));
        let script = resolved.get_directive("script-src").unwrap();
        prop_assert_eq!(script.to_string(), format!("script-src {}", host));
    }
}
