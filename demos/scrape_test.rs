//! JIRA スクレイパーテスト
//!
//! 実行方法:
//! ```
//! cargo run --example scrape_test
//! ```

use std::path::Path;

use jira_scraper_service::{export_csv, JiraConfig, JiraScraper, Scraper};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // .envがあれば読み込む
    if let Ok(env_path) = std::fs::canonicalize(".env") {
        println!("Loading .env from: {:?}", env_path);
        for line in std::fs::read_to_string(".env")?.lines() {
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('\'').trim_matches('"');
                if !key.starts_with('#') && !key.is_empty() {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    // 環境変数から設定を読み込み（JIRA_URL 必須）
    let config = JiraConfig::from_env()?
        .with_headless(false) // SSO/手動ログインのため表示モード
        .with_debug(true);

    println!("=== JIRA Scraper Test ===");
    println!("Base URL: {}", config.base());
    println!("Project: {}", config.project_key);

    let jql = format!(
        "project = {} AND created >= -12w ORDER BY created DESC",
        config.project_key
    );

    let mut scraper = JiraScraper::new(config);
    scraper.initialize().await?;
    scraper.login().await?;

    // テスト用に3件まで。全件取得するなら None を渡す
    let result = scraper.scrape(Some(&jql), Some(3)).await?;
    scraper.close().await?;

    println!("\n=== Scrape Result ===");
    println!("Records: {}", result.records.len());
    println!("Total matched: {}", result.total_matched);
    if !result.skipped.is_empty() {
        println!("Skipped: {:?}", result.skipped);
    }
    if let Some(reason) = &result.aborted {
        println!("途中終了: {}", reason);
    }
    for record in &result.records {
        println!("  - {}: {}", record.ticket_key(), record.get("summary"));
    }

    let csv_path = export_csv(&result.records, Path::new("./data/jira_tickets.csv"))?;
    println!("\n成功! CSV保存先: {:?}", csv_path);

    Ok(())
}
