//! Shared User-Agent strings for metadata and publisher HTTP traffic.
//!
//! Single source for project URL and UA format so API and publisher requests
//! stay consistent and easy to update.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/nicksrandall/harvester";

/// Browser User-Agent sent to publisher pages.
///
/// Many publisher platforms serve an interstitial or an empty shell to
/// obvious bots, so landing, view and PDF requests present a browser UA.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default User-Agent for metadata API requests (identifies the tool).
#[must_use]
pub fn default_api_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("harvester/{version} (academic-research-tool; +{PROJECT_UA_URL})")
}
