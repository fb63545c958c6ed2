//! Product feed scraper.
//!
//! Pulls item URLs out of a zbozi.cz offer feed, then scrapes every item page for its
//! category breadcrumb and stock count. `mask` buckets raw availability strings into
//! L/N/S patterns so their formats can be inspected by hand.

mod error;
pub mod feed;
mod macros;
pub mod mask;
pub mod page;
pub mod process;

pub use error::{Error, Result};
pub use page::{ItemDescriptor, Stock};

// Redacted in the source this was lifted from; override through `ScrapeConfig`.
const FEED_URL: &str = "http://www.fit-pro.cz/export/zbozi.xml";
const URL_NAMESPACE: &str = "http://www.zbozi.cz/ns/offer/1.0";
const URL_LOCAL_NAME: &str = "URL";
const BREADCRUMB_SELECTOR: &str = "li.breadcrumb__item";
const AVAILABILITY_SELECTOR: &str = r#"div[class="order-box__ship availability availability--1"]"#;
const MASK_FILE_PATH: &str = "result_u_mask.txt";

/// Everything that points the scraper at a particular shop.
///
/// `Default` gives the production feed and markup; tests swap in a local server.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub feed_url: String,
    pub url_namespace: String,
    pub url_local_name: String,
    pub breadcrumb_selector: String,
    /// Must match the whole `class` attribute, not just one of its classes.
    pub availability_selector: String,
    pub mask_output_path: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            feed_url: FEED_URL.into(),
            url_namespace: URL_NAMESPACE.into(),
            url_local_name: URL_LOCAL_NAME.into(),
            breadcrumb_selector: BREADCRUMB_SELECTOR.into(),
            availability_selector: AVAILABILITY_SELECTOR.into(),
            mask_output_path: MASK_FILE_PATH.into(),
        }
    }
}

impl ScrapeConfig {
    /// Default markup, different feed.
    pub fn with_feed_url(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            ..Self::default()
        }
    }
}
