// Global configuration constants - single source of truth

pub struct Config;

impl Config {
    // Session storage
    pub const SESSION_KEY: &'static str = "cbgr";

    // Popup query protocol
    pub const QUERY_TAG: &'static str = "popup-get-partners";

    // Navigation filtering
    pub const INTERNAL_SCHEMES: &'static [&'static str] = &["chrome://"];

    // Offscreen sandbox
    pub const SANDBOX_TARGET: &'static str = "offscreen";
    pub const SANDBOX_REASON: &'static str = "DOM_PARSER";
    pub const SANDBOX_JUSTIFICATION: &'static str =
        "Need to parse the partners from the document.";
    pub const SANDBOX_QUEUE_DEPTH: usize = 16;

    // Consent management platforms
    pub const TCF_MESSAGE_ID: &'static str = "756676";
    pub const HEISE_CMP_HOST: &'static str = "cmp.heise.de";
    pub const SPIEGEL_CMP_HOST: &'static str = "sp-spiegel-de.spiegel.de";

    // HTTP/Network config
    pub const USER_AGENT: &'static str = "VendorDisclosure/0.1";
    pub const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024; // 10MB
    pub const POOL_IDLE_PER_HOST: usize = 4;
    pub const POOL_IDLE_TIMEOUT_SECS: u64 = 30;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_schemes_cover_browser_pages() {
        assert!(Config::INTERNAL_SCHEMES
            .iter()
            .any(|scheme| "chrome://extensions".starts_with(scheme)));
    }
}
