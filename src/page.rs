use std::fmt;

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tokio::task::spawn_blocking;

use crate::{info_time, Error, Result, ScrapeConfig};

const CATEGORY_SEPARATOR: &str = " > ";
const DEFAULT_CATEGORY: &str = "-";

/// What an item page tells us about the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDescriptor {
    /// Breadcrumb trail joined with `" > "`, or `"-"` when the page has none.
    pub category: String,
    pub stock: Stock,
}

impl Default for ItemDescriptor {
    fn default() -> Self {
        Self {
            category: DEFAULT_CATEGORY.into(),
            stock: Stock::Missing,
        }
    }
}

impl fmt::Display for ItemDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.category, self.stock)
    }
}

/// Stock as read off the availability block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stock {
    /// The page has no availability block.
    Missing,
    /// The block is there but holds no usable number, e.g. "Dotaz".
    Unparsed,
    /// All digits of the block, concatenated. `Count(0)` is a confirmed zero.
    Count(u64),
}

impl Stock {
    /// Flattened view where anything unknown counts as zero.
    pub fn quantity(&self) -> u64 {
        match self {
            Stock::Count(n) => *n,
            Stock::Missing | Stock::Unparsed => 0,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Stock::Count(_))
    }
}

impl fmt::Display for Stock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stock::Count(n) => write!(f, "{n}"),
            Stock::Missing => f.write_str("no availability"),
            Stock::Unparsed => f.write_str("unknown"),
        }
    }
}

/// Selectors compiled once per page.
struct PageSelectors {
    breadcrumb: Selector,
    link: Selector,
    strong: Selector,
    availability: Selector,
}

impl PageSelectors {
    fn from_config(config: &ScrapeConfig) -> Result<Self> {
        Ok(Self {
            breadcrumb: create_selector(&config.breadcrumb_selector)?,
            link: create_selector("a")?,
            strong: create_selector("strong")?,
            availability: create_selector(&config.availability_selector)?,
        })
    }
}

/// Fetches an item page and scrapes its category and stock.
pub async fn scrape_page(client: &Client, url: &str, config: &ScrapeConfig) -> Result<ItemDescriptor> {
    let html = request_page_html(client, url).await?;
    let config = config.clone();
    spawn_blocking(move || parse_item_page(&html, &config)).await?
}

/// Fetches an item page and returns the availability block's text untouched, or `""` when the
/// page has none. Feeds [`crate::mask::unique_masks`].
pub async fn scrape_raw_availability(client: &Client, url: &str, config: &ScrapeConfig) -> Result<String> {
    let html = request_page_html(client, url).await?;
    let config = config.clone();
    spawn_blocking(move || parse_raw_availability(&html, &config)).await?
}

/// Requests a page and returns a `Result<String>` containing the HTML.
/// The status code is not checked; an error page is scraped like any other.
async fn request_page_html(client: &Client, url: &str) -> Result<String> {
    info_time!("Requesting page: {url}");
    let res = client.get(url).send().await?;
    let html = res.text().await?;
    Ok(html)
}

pub fn parse_item_page(html: &str, config: &ScrapeConfig) -> Result<ItemDescriptor> {
    let selectors = PageSelectors::from_config(config)?;
    let doc = Html::parse_document(html);

    let mut item = ItemDescriptor::default();
    if let Some(category) = extract_category(&doc, &selectors) {
        item.category = category;
    }
    item.stock = extract_stock(&doc, &selectors.availability);
    Ok(item)
}

pub fn parse_raw_availability(html: &str, config: &ScrapeConfig) -> Result<String> {
    let availability = create_selector(&config.availability_selector)?;
    let doc = Html::parse_document(html);
    Ok(doc
        .select(&availability)
        .next()
        .map(|block| block.text().collect())
        .unwrap_or_default())
}

/// Walks the breadcrumb items in order. Links contribute `text > `, a `<strong>` contributes
/// its text and ends the trail. The walk also stops at the first item that has neither, so
/// anything after it is dropped. Without a `<strong>` the trailing separator stays.
fn extract_category(doc: &Html, selectors: &PageSelectors) -> Option<String> {
    let mut crumbs = doc.select(&selectors.breadcrumb).peekable();
    crumbs.peek()?;

    let mut category = String::new();
    for crumb in crumbs {
        if let Some(link) = crumb.select(&selectors.link).next() {
            category.push_str(&element_text(link));
            category.push_str(CATEGORY_SEPARATOR);
        } else if let Some(strong) = crumb.select(&selectors.strong).next() {
            category.push_str(&element_text(strong));
        } else {
            break;
        }
    }
    Some(category)
}

fn extract_stock(doc: &Html, availability: &Selector) -> Stock {
    let Some(block) = doc.select(availability).next() else {
        return Stock::Missing;
    };

    // ASCII only: other scripts' decimal digits (e.g. "٤٢") are dropped, and a block holding
    // nothing else ends up `Unparsed`.
    let digits: String = block
        .text()
        .flat_map(str::chars)
        .filter(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return Stock::Unparsed;
    }
    // Too many digits for a u64 is as good as none.
    digits.parse().map(Stock::Count).unwrap_or(Stock::Unparsed)
}

#[inline]
fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> String {
        format!("<!DOCTYPE html><html><head><title>Item</title></head><body>{body}</body></html>")
    }

    fn parse(body: &str) -> ItemDescriptor {
        parse_item_page(&page(body), &ScrapeConfig::default()).unwrap()
    }

    const AVAILABILITY_OPEN: &str = r#"<div class="order-box__ship availability availability--1">"#;

    #[test]
    fn test_full_breadcrumb_trail() {
        let item = parse(
            r#"<ol class="breadcrumb">
                <li class="breadcrumb__item"><a href="/e">Electronics</a></li>
                <li class="breadcrumb__item"><a href="/e/p">Phones</a></li>
                <li class="breadcrumb__item"><strong>CurrentModel</strong></li>
            </ol>"#,
        );
        assert_eq!(item.category, "Electronics > Phones > CurrentModel");
    }

    #[test]
    fn test_no_breadcrumbs_defaults_category() {
        let item = parse("<p>Nothing to see</p>");
        assert_eq!(item.category, "-");
    }

    #[test]
    fn test_links_only_keep_trailing_separator() {
        let item = parse(
            r#"<ul>
                <li class="breadcrumb__item"><a href="/">Home</a></li>
                <li class="breadcrumb__item"><a href="/fit">Fitness</a></li>
            </ul>"#,
        );
        assert_eq!(item.category, "Home > Fitness > ");
    }

    #[test]
    fn test_unrecognised_crumb_stops_the_trail() {
        let item = parse(
            r#"<ul>
                <li class="breadcrumb__item"><a href="/">Home</a></li>
                <li class="breadcrumb__item"><span>Sale</span></li>
                <li class="breadcrumb__item"><strong>Bench</strong></li>
            </ul>"#,
        );
        assert_eq!(item.category, "Home > ");
    }

    #[test]
    fn test_leading_unrecognised_crumb_gives_empty_category() {
        let item = parse(r#"<ul><li class="breadcrumb__item">plain</li></ul>"#);
        assert_eq!(item.category, "");
    }

    #[test]
    fn test_stock_from_availability_text() {
        let item = parse(&format!("{AVAILABILITY_OPEN}Skladem 42 ks</div>"));
        assert_eq!(item.stock, Stock::Count(42));
        assert_eq!(item.stock.quantity(), 42);
    }

    #[test]
    fn test_stock_concatenates_digit_runs() {
        let item = parse(&format!("{AVAILABILITY_OPEN}Skladem <span>&gt;</span> 1 250 ks</div>"));
        assert_eq!(item.stock, Stock::Count(1250));
    }

    #[test]
    fn test_stock_without_digits_is_unparsed() {
        let item = parse(&format!("{AVAILABILITY_OPEN}Dotaz</div>"));
        assert_eq!(item.stock, Stock::Unparsed);
        assert_eq!(item.stock.quantity(), 0);
        assert!(!item.stock.is_known());
    }

    #[test]
    fn test_non_ascii_digits_are_not_counted() {
        let item = parse(&format!("{AVAILABILITY_OPEN}Skladem ٤٢ ks</div>"));
        assert_eq!(item.stock, Stock::Unparsed);

        let item = parse(&format!("{AVAILABILITY_OPEN}Skladem ٤٢ (7) ks</div>"));
        assert_eq!(item.stock, Stock::Count(7));
    }

    #[test]
    fn test_confirmed_zero_is_known() {
        let item = parse(&format!("{AVAILABILITY_OPEN}Skladem 0 ks</div>"));
        assert_eq!(item.stock, Stock::Count(0));
        assert!(item.stock.is_known());
        assert!(!Stock::Missing.is_known());
    }

    #[test]
    fn test_stock_overflow_is_unparsed() {
        let item = parse(&format!("{AVAILABILITY_OPEN}99999999999999999999999 ks</div>"));
        assert_eq!(item.stock, Stock::Unparsed);
    }

    #[test]
    fn test_missing_availability_block() {
        let item = parse("<p>Skladem 42 ks</p>");
        assert_eq!(item.stock, Stock::Missing);
        assert_eq!(item.stock.quantity(), 0);
    }

    #[test]
    fn test_availability_class_must_match_exactly() {
        let item = parse(r#"<div class="order-box__ship availability availability--2">Skladem 5 ks</div>"#);
        assert_eq!(item.stock, Stock::Missing);
    }

    #[test]
    fn test_raw_availability() {
        let config = ScrapeConfig::default();
        let raw = parse_raw_availability(&page(&format!("{AVAILABILITY_OPEN} Skladem &gt; 5 ks </div>")), &config).unwrap();
        assert_eq!(raw, " Skladem > 5 ks ");

        let raw = parse_raw_availability(&page("<p>none</p>"), &config).unwrap();
        assert_eq!(raw, "");
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let config = ScrapeConfig {
            breadcrumb_selector: "li[".into(),
            ..ScrapeConfig::default()
        };
        match parse_item_page(&page(""), &config) {
            Err(Error::ParseMissingSelector(sel)) => assert_eq!(sel, "li["),
            other => panic!("expected ParseMissingSelector, got {other:?}"),
        }
    }

    #[test]
    fn test_descriptor_display() {
        let item = ItemDescriptor {
            category: "Home > Bench".into(),
            stock: Stock::Count(3),
        };
        assert_eq!(item.to_string(), "Home > Bench | 3");
        assert_eq!(ItemDescriptor::default().to_string(), "- | no availability");
    }
}
