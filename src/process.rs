use std::collections::HashSet;
use std::path::Path;

use chrono::Local;
use reqwest::Client;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

use crate::feed::extract_urls;
use crate::mask::unique_masks;
use crate::page::{scrape_page, scrape_raw_availability, ItemDescriptor};
use crate::{info_time, Result, ScrapeConfig};

/// Scrapes every item listed in the feed, one page at a time.
/// The first page that fails to download aborts the whole run.
pub async fn process_feed(client: &Client, config: &ScrapeConfig) -> Result<Vec<(String, ItemDescriptor)>> {
    let start_time = Local::now();
    info_time!("Started scraping");

    let urls = extract_urls(client, config).await?;
    let mut items = Vec::with_capacity(urls.len());
    for url in urls {
        let item = scrape_page(client, &url, config).await?;
        info_time!("{url} : {item}");
        items.push((url, item));
    }

    info_time!(start_time, "Finished PROCESSING {} items.", items.len());
    Ok(items)
}

/// Collects the raw availability text of every item in the feed, reduces it to unique masks
/// and appends those to `config.mask_output_path`.
pub async fn analyse_availability(client: &Client, config: &ScrapeConfig) -> Result<HashSet<String>> {
    let start_time = Local::now();
    info_time!("Started availability analysis");

    let urls = extract_urls(client, config).await?;
    let mut raw = Vec::with_capacity(urls.len());
    for url in &urls {
        raw.push(scrape_raw_availability(client, url, config).await?);
    }

    let masks = unique_masks(&raw);
    append_masks(&config.mask_output_path, &masks).await?;
    info_time!(
        start_time,
        "Found {} masks in {} availability texts, appended to: {}",
        masks.len(),
        raw.len(),
        config.mask_output_path
    );
    Ok(masks)
}

/// Appends one mask per line, creating the file if needed. Masks are sorted so that runs are
/// comparable.
pub async fn append_masks(path: impl AsRef<Path>, masks: &HashSet<String>) -> Result<()> {
    let mut sorted = masks.iter().map(String::as_str).collect::<Vec<_>>();
    sorted.sort_unstable();
    let mut res = String::new();
    for mask in sorted {
        res.push_str(mask);
        res.push('\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(res.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
