//! JIRA スクレイパーモジュール
//!
//! JQL検索 → チケット詳細ビューのDOM抽出 → TicketRecord 列の構築

mod locators;
mod scraper;
mod types;

pub use locators::{extraction_script, FieldLocator, FIELD_LOCATORS};
pub use scraper::JiraScraper;
pub use types::{JiraScrapeResult, TicketRecord, FIELD_COLUMNS, TICKET_KEY_FIELD};
