use crate::core::policy::Directive;
use crate::core::source::Source;
use url::Url;

/// Decides whether an external URL is already allowed by a directive's
/// host-style sources, in which case no nonce is needed (absent
/// `'strict-dynamic'`).
///
/// Baseline rule: exact host-string containment. A host source covers the
/// URL when its raw text is contained in the URL or its host component
/// equals the URL's host; `'self'` covers URLs under the configured public
/// path. Wildcard-subdomain matching is deliberately not implemented.
pub fn covers_url(directive: &Directive, target: &str, public_path: Option<&str>) -> bool {
    let target_host = Url::parse(target)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));

    directive.sources().iter().any(|source| match source {
        Source::Self_ => public_path.is_some_and(|p| !p.is_empty() && target.starts_with(p)),
        Source::Host(host) => {
            if target.contains(host.as_ref()) {
                return true;
            }
            match (&target_host, Url::parse(host)) {
                (Some(th), Ok(source_url)) => source_url.host_str() == Some(th.as_str()),
                _ => false,
            }
        }
        _ => false,
    })
}
