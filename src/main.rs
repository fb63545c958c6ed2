use chrono::Local;
use feedscrape::{info_time, process::process_feed, Result, ScrapeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Local::now();
    let client = reqwest::Client::new();
    let config = ScrapeConfig::default();

    for (url, item) in process_feed(&client, &config).await? {
        if item.stock.is_known() {
            println!("{url}\t{}\t{}", item.category, item.stock.quantity());
        } else {
            println!("{url}\t{}\t{} ({})", item.category, item.stock.quantity(), item.stock);
        }
    }
    info_time!(start_time, "Full program time:");

    Ok(())
}
