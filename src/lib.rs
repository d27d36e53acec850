//! JIRAチケットスクレイパーライブラリ
//!
//! - JQL検索でチケットキーを列挙し、詳細ビューのDOMからフィールドを抽出
//! - 脅威モデリング指標をCSVに書き出してダッシュボードに連携
//!
//! # スクレイパー使用例
//!
//! ```rust,ignore
//! use jira_scraper_service::{JiraConfig, JiraScraper, Scraper};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = JiraConfig::from_env()
//!         .unwrap()
//!         .with_headless(false);
//!
//!     let mut scraper = JiraScraper::new(config);
//!     scraper.initialize().await.unwrap();
//!     scraper.login().await.unwrap();
//!
//!     let result = scraper
//!         .scrape(Some("project = TM ORDER BY created DESC"), Some(10))
//!         .await
//!         .unwrap();
//!     println!("Records: {}", result.records.len());
//! }
//! ```
//!
//! # tower Service 使用例
//!
//! ```rust,ignore
//! use jira_scraper_service::{ScrapeRequest, ScraperService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = ScraperService::new();
//!
//!     let request = ScrapeRequest::new("https://jira.example.com")
//!         .with_max_tickets(10)
//!         .with_headless(false)
//!         .with_output_path("./data/jira_tickets.csv");
//!
//!     let result = service.call(request).await.unwrap();
//!     println!("CSV written: {:?}", result.csv_path);
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod jira;
pub mod service;
pub mod traits;

// 主要な型をリエクスポート
pub use config::JiraConfig;
pub use error::ScraperError;
pub use export::export_csv;
pub use jira::{
    JiraScrapeResult, JiraScraper, TicketRecord, FIELD_COLUMNS, TICKET_KEY_FIELD,
};
pub use service::{ScrapeRequest, ScrapeResult, ScraperService};
pub use traits::Scraper;
