use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::{info, warn};

use crate::config::JiraConfig;
use crate::error::ScraperError;
use crate::export::export_csv;
use crate::jira::{JiraScraper, TicketRecord};
use crate::traits::Scraper;

/// スクレイピングリクエスト
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub base_url: String,
    /// JQLクエリ。None なら設定のプロジェクトキーから既定クエリを組む
    pub jql: Option<String>,
    /// 取得上限。None なら全件
    pub max_tickets: Option<usize>,
    pub headless: bool,
    pub output_path: PathBuf,
}

impl ScrapeRequest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            jql: None,
            max_tickets: None,
            headless: true,
            output_path: PathBuf::from("./data/jira_tickets.csv"),
        }
    }

    pub fn with_jql(mut self, jql: impl Into<String>) -> Self {
        self.jql = Some(jql.into());
        self
    }

    pub fn with_max_tickets(mut self, max_tickets: usize) -> Self {
        self.max_tickets = Some(max_tickets);
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }
}

impl From<ScrapeRequest> for JiraConfig {
    fn from(req: ScrapeRequest) -> Self {
        JiraConfig::new(req.base_url).with_headless(req.headless)
    }
}

/// スクレイピング結果
#[derive(Debug)]
pub struct ScrapeResult {
    pub csv_path: PathBuf,
    pub records: Vec<TicketRecord>,
    /// 検索ビューが報告した総ヒット件数
    pub total_matched: usize,
}

/// tower::Serviceを実装したスクレイパーサービス
#[derive(Debug, Clone, Default)]
pub struct ScraperService {
    // 将来的な拡張用（レートリミット、キャッシュなど）
}

impl ScraperService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = ScrapeResult;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!("スクレイピングリクエスト受信: base_url={}", req.base_url);

        Box::pin(async move {
            let jql = req.jql.clone();
            let max_tickets = req.max_tickets;
            let output_path = req.output_path.clone();

            let config: JiraConfig = req.into();
            let mut scraper = JiraScraper::new(config);

            scraper.initialize().await?;
            scraper.login().await?;
            let outcome = scraper.scrape(jql.as_deref(), max_tickets).await?;
            scraper.close().await?;

            // セッション喪失で途中終了していても収集済みレコードは出力する
            if let Some(reason) = &outcome.aborted {
                warn!("実行は途中終了しました: {}", reason);
            }

            let csv_path = export_csv(&outcome.records, &output_path)?;

            info!(
                "スクレイピング完了: path={:?}, records={}",
                csv_path,
                outcome.records.len()
            );

            Ok(ScrapeResult {
                csv_path,
                records: outcome.records,
                total_matched: outcome.total_matched,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_request_builder() {
        let req = ScrapeRequest::new("https://jira.example.com")
            .with_jql("project = TM AND created >= -12w ORDER BY created DESC")
            .with_max_tickets(3)
            .with_headless(false)
            .with_output_path("/tmp/tickets.csv");

        assert_eq!(req.base_url, "https://jira.example.com");
        assert_eq!(
            req.jql.as_deref(),
            Some("project = TM AND created >= -12w ORDER BY created DESC")
        );
        assert_eq!(req.max_tickets, Some(3));
        assert!(!req.headless);
        assert_eq!(req.output_path, PathBuf::from("/tmp/tickets.csv"));
    }

    #[test]
    fn test_scrape_request_to_config() {
        let req = ScrapeRequest::new("https://jira.example.com").with_headless(false);
        let config: JiraConfig = req.into();

        assert_eq!(config.base_url, "https://jira.example.com");
        assert!(!config.headless);
    }

    #[test]
    fn test_scrape_request_defaults() {
        let req = ScrapeRequest::new("https://jira.example.com");

        assert!(req.jql.is_none());
        assert!(req.max_tickets.is_none());
        assert!(req.headless);
        assert_eq!(req.output_path, PathBuf::from("./data/jira_tickets.csv"));
    }
}
