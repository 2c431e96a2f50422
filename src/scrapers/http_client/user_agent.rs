//! The `User-Agent` header sent to crawl targets.
//!
//! Unset, sitemirror announces itself. `impersonate` borrows a desktop
//! browser's string for storefronts that turn away unknown clients. Any
//! other value is sent verbatim.

pub const USER_AGENT: &str = concat!("sitemirror/", env!("CARGO_PKG_VERSION"));

pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
];

/// Browser string for this process. Fixed for the whole run so a target sees
/// one consistent client across listing pages and payloads.
fn browser_user_agent() -> &'static str {
    IMPERSONATE_USER_AGENTS[std::process::id() as usize % IMPERSONATE_USER_AGENTS.len()]
}

/// Header value for the `user_agent` setting.
pub fn resolve_user_agent(setting: Option<&str>) -> String {
    match setting.map(str::trim) {
        None | Some("") => USER_AGENT.to_string(),
        Some("impersonate") => browser_user_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_announces_sitemirror() {
        for setting in [None, Some(""), Some("  ")] {
            assert_eq!(resolve_user_agent(setting), USER_AGENT);
        }
        assert!(USER_AGENT.starts_with("sitemirror/"));
    }

    #[test]
    fn test_impersonate_is_stable_within_a_run() {
        let first = resolve_user_agent(Some("impersonate"));
        assert!(IMPERSONATE_USER_AGENTS.contains(&first.as_str()));
        assert_eq!(resolve_user_agent(Some("impersonate")), first);
    }

    #[test]
    fn test_custom_value_sent_as_given() {
        assert_eq!(
            resolve_user_agent(Some(" ArchiveCrawler/3.1 (+ops@example.org) ")),
            "ArchiveCrawler/3.1 (+ops@example.org)"
        );
    }
}
