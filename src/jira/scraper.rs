//! JIRA チケットスクレイパー実装
//!
//! 検索ビュー (JQL) からチケットキーを列挙し、各チケットの詳細ビューの
//! DOM からフィールドを抽出して TicketRecord 列を構築する

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::{offset::FixedOffset, Utc};
use futures::StreamExt;
use tokio::io::AsyncBufReadExt;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::JiraConfig;
use crate::error::ScraperError;
use crate::traits::Scraper;

use super::locators::{extraction_script, FieldLocator, FIELD_LOCATORS};
use super::types::{JiraScrapeResult, TicketRecord};

/// 認証済みUIの目印セレクタ（スキン差分を併記）
const AUTH_MARKER_SELECTOR: &str =
    "nav[aria-label=\"Primary\"], #quickSearchInput, [data-testid=\"navigation-apps-sidebar\"]";

/// チケット詳細ビューの描画完了の目印
const ISSUE_MARKER_SELECTOR: &str =
    "#summary-val, [data-testid=\"issue.views.field.rich-text.summary\"], h1";

/// 検索結果のチケットキー要素
const ISSUE_KEY_SELECTOR: &str =
    "a[data-testid*=\"issue-key\"], .issue-link-key, [data-issue-key]";

/// 検索ビューの総ヒット件数表示
const RESULT_COUNT_SELECTOR: &str =
    ".results-count-total, .pagination-summary, [data-testid*=\"pagination\"]";

/// ログインフォームの入力欄
const LOGIN_USER_SELECTOR: &str = "#login-form-username, #username, input[name='os_username']";
const LOGIN_PASS_SELECTOR: &str = "#login-form-password, #password, input[name='os_password']";
const LOGIN_SUBMIT_SELECTOR: &str = "#login-form-submit, #login, input[name='login']";

/// DOM安定判定の必要連続回数とチェック間隔
const REQUIRED_STABLE_CHECKS: u32 = 3;
const STABLE_CHECK_INTERVAL_MS: u64 = 300;

/// JIRA チケットスクレイパー
pub struct JiraScraper {
    config: JiraConfig,
    browser: Option<Browser>,
    page: Option<Arc<Page>>,
}

impl JiraScraper {
    pub fn new(config: JiraConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
        }
    }

    pub fn config(&self) -> &JiraConfig {
        &self.config
    }

    fn get_page(&self) -> Result<&Arc<Page>, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("ブラウザが初期化されていません".into()))
    }

    /// JQL検索でチケットキー列を取得する
    ///
    /// 検索ビューの返却順のまま、`max_tickets` 指定時はそこで切り詰める。
    /// 戻り値の2要素目は検索ビューが報告した総ヒット件数
    /// （取得できなければ収集済み件数）。
    pub async fn list_tickets(
        &self,
        jql: &str,
        max_tickets: Option<usize>,
    ) -> Result<(Vec<String>, usize), ScraperError> {
        let page = self.get_page()?.clone();
        info!("Searching tickets with JQL: {}", jql);

        let mut keys: Vec<String> = Vec::new();
        let mut total_hint: Option<usize> = None;
        let mut format_index: Option<usize> = None;

        // スキンごとの検索URL形式を順に試す
        for (i, url) in search_urls(self.config.base(), jql, 0).iter().enumerate() {
            debug!("Trying search URL format {}: {}", i + 1, url);
            if let Err(e) = self.goto_and_settle(&page, url).await {
                debug!("Search URL format {} failed: {}", i + 1, e);
                continue;
            }

            let page_keys = self.collect_page_keys(&page).await;
            if page_keys.is_empty() {
                continue;
            }

            info!("Search URL format {} worked", i + 1);
            total_hint = self.read_total_count(&page).await;
            merge_keys(&mut keys, page_keys);
            format_index = Some(i);
            break;
        }

        let Some(format_index) = format_index else {
            return Err(ScraperError::Extraction(
                "検索結果からチケットキーを取得できませんでした".into(),
            ));
        };

        // 目標件数に達するまでページング。新規キーのないページで打ち切る
        let target = page_target(total_hint, max_tickets);
        let mut start_index = self.config.page_size;
        while keys.len() < target {
            let url = search_urls(self.config.base(), jql, start_index)
                .swap_remove(format_index);
            debug!("Fetching next page: startIndex={}", start_index);
            if let Err(e) = self.goto_and_settle(&page, &url).await {
                warn!("Pagination stopped at startIndex={}: {}", start_index, e);
                break;
            }

            let added = merge_keys(&mut keys, self.collect_page_keys(&page).await);
            if added == 0 {
                debug!("No new keys at startIndex={}, stopping", start_index);
                break;
            }
            start_index += self.config.page_size;
            sleep(self.config.ticket_delay).await;
        }

        let total_matched = total_hint.unwrap_or(keys.len());
        if let Some(max) = max_tickets {
            keys.truncate(max);
        }

        info!(
            "Found {} tickets to process (total matched: {})",
            keys.len(),
            total_matched
        );
        Ok((keys, total_matched))
    }

    /// 1チケット分のレコードを構築する
    ///
    /// 詳細ビューの描画完了を有界で待ち、ロケータテーブルの全フィールドを
    /// 固定順で抽出する。個々のフィールド不一致は空文字になり、エラーには
    /// しない。
    pub async fn build_record(&self, ticket_key: &str) -> Result<TicketRecord, ScraperError> {
        let page = self.get_page()?.clone();
        let url = format!("{}/browse/{}", self.config.base(), ticket_key);
        debug!("Navigating to ticket: {}", url);

        self.goto_and_settle(&page, &url).await?;

        // ログインページへ戻されていたらセッション切れ
        let current_url = self.eval_string(&page, "window.location.href").await;
        if current_url.contains("/login") || current_url.contains("Login") {
            return Err(ScraperError::Session(
                "ログインページへリダイレクトされました".into(),
            ));
        }

        if !self
            .wait_for_marker(&page, ISSUE_MARKER_SELECTOR, self.config.render_timeout)
            .await
        {
            return Err(ScraperError::Timeout(format!(
                "{} の詳細ビューが描画されませんでした",
                ticket_key
            )));
        }
        self.wait_stable(&page).await;

        let mut record = TicketRecord::new(ticket_key);
        for locator in &FIELD_LOCATORS {
            let value = self.extract_field(&page, locator).await;
            record.set(locator.name, value);
        }

        Ok(record)
    }

    /// 全チケットをスクレイプする（要ログイン済み）
    ///
    /// `jql` 省略時は `project = {project_key} ORDER BY created DESC`。
    /// チケット単位の失敗はスキップして続行し、セッション喪失で打ち切る。
    /// 打ち切り時も収集済みレコードは結果に残る。
    pub async fn scrape(
        &self,
        jql: Option<&str>,
        max_tickets: Option<usize>,
    ) -> Result<JiraScrapeResult, ScraperError> {
        let default_jql = format!("project = {} ORDER BY created DESC", self.config.project_key);
        let jql = jql.unwrap_or(&default_jql);

        let (keys, total_matched) = self.list_tickets(jql, max_tickets).await?;
        let session_id = format!("session_{}", Utc::now().timestamp());

        let planned = keys.len();
        let mut records: Vec<TicketRecord> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();
        let mut aborted: Option<String> = None;

        for (i, key) in keys.iter().enumerate() {
            info!("Processing ticket {}/{}: {}", i + 1, planned, key);
            match self.build_record(key).await {
                Ok(record) => {
                    records.push(record);
                    info!("Completed {}/{} tickets", records.len(), planned);
                }
                Err(e) if e.is_session_fatal() => {
                    error!("Session lost while processing {}: {}", key, e);
                    aborted = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", key, e);
                    skipped.push(key.clone());
                }
            }

            // リクエストレート抑制の固定ウェイト
            sleep(self.config.ticket_delay).await;
        }

        info!(
            "Scraping completed: {} records, {} skipped (total matched: {})",
            records.len(),
            skipped.len(),
            total_matched
        );

        let result = JiraScrapeResult {
            records,
            total_matched,
            skipped,
            session_id,
            aborted,
        };

        if self.config.debug {
            self.save_raw_records(&result);
        }

        Ok(result)
    }

    /// フィールド値を抽出する
    ///
    /// ロケータ不一致・JSエラーは「フィールドなし」であり空文字を返す。
    async fn extract_field(&self, page: &Page, locator: &FieldLocator) -> String {
        let script = extraction_script(locator);
        match page.evaluate(script.as_str()).await {
            Ok(value) => value
                .into_value::<String>()
                .unwrap_or_default()
                .trim()
                .to_string(),
            Err(e) => {
                debug!("Field '{}' extraction failed: {}", locator.name, e);
                String::new()
            }
        }
    }

    /// 現在ページのチケットキー一覧を収集する（形式不正は除外）
    async fn collect_page_keys(&self, page: &Page) -> Vec<String> {
        let script = format!(
            r#"
            (function() {{
                var elements = document.querySelectorAll({selector});
                var keys = [];
                for (var i = 0; i < elements.length; i++) {{
                    var key = (elements[i].textContent || '').trim();
                    if (!key) key = elements[i].getAttribute('data-issue-key') || '';
                    keys.push(key.trim());
                }}
                return JSON.stringify(keys);
            }})()
            "#,
            selector = serde_json::to_string(ISSUE_KEY_SELECTOR)
                .unwrap_or_else(|_| "''".to_string()),
        );

        let json = self.eval_string(page, &script).await;
        let raw: Vec<String> = serde_json::from_str(&json).unwrap_or_default();
        raw.into_iter().filter(|k| looks_like_issue_key(k)).collect()
    }

    /// 検索ビューの総ヒット件数を読む
    async fn read_total_count(&self, page: &Page) -> Option<usize> {
        let script = format!(
            r#"
            (function() {{
                var el = document.querySelector({selector});
                return el ? (el.textContent || '').trim() : '';
            }})()
            "#,
            selector = serde_json::to_string(RESULT_COUNT_SELECTOR)
                .unwrap_or_else(|_| "''".to_string()),
        );

        let text = self.eval_string(page, &script).await;
        let total = parse_result_total(&text);
        if total.is_none() {
            debug!("Result count not found (text: '{}')", text);
        }
        total
    }

    /// ページ遷移して readyState 完了まで待つ（遷移1回ごとの有界タイムアウト）
    async fn goto_and_settle(&self, page: &Page, url: &str) -> Result<(), ScraperError> {
        match tokio::time::timeout(self.config.nav_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ScraperError::Navigation(e.to_string())),
            Err(_) => {
                return Err(ScraperError::Timeout(format!(
                    "ページ遷移が{}秒以内に完了しませんでした: {}",
                    self.config.nav_timeout.as_secs(),
                    url
                )))
            }
        }

        for _ in 0..self.config.nav_timeout.as_secs().max(1) {
            let state = self.eval_string(page, "document.readyState").await;
            if state == "complete" {
                return Ok(());
            }
            sleep(Duration::from_secs(1)).await;
        }

        debug!("readyState did not reach complete, proceeding: {}", url);
        Ok(())
    }

    /// セレクタが出現するまでポーリング。タイムアウトで false
    async fn wait_for_marker(&self, page: &Page, selector: &str, timeout: Duration) -> bool {
        let script = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(selector).unwrap_or_else(|_| "''".to_string()),
        );

        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            match page.evaluate(script.as_str()).await {
                Ok(value) => {
                    if value.into_value::<bool>().unwrap_or(false) {
                        return true;
                    }
                }
                Err(e) => debug!("Marker check error: {}", e),
            }
            sleep(Duration::from_secs(1)).await;
        }
        false
    }

    /// DOMが安定するまで待機（HTML長が連続一致でOK）
    async fn wait_stable(&self, page: &Page) {
        let start = std::time::Instant::now();
        let mut last_len: Option<usize> = None;
        let mut stable_count = 0;

        while start.elapsed() < self.config.render_timeout {
            let len = match page
                .evaluate("document.documentElement.outerHTML.length")
                .await
            {
                Ok(value) => value.into_value::<usize>().unwrap_or(0),
                Err(e) => {
                    debug!("Page stable check error: {}", e);
                    0
                }
            };

            if len > 0 && last_len == Some(len) {
                stable_count += 1;
                if stable_count >= REQUIRED_STABLE_CHECKS {
                    debug!("Page stable after {:?}", start.elapsed());
                    return;
                }
            } else {
                stable_count = 0;
            }
            last_len = Some(len);

            sleep(Duration::from_millis(STABLE_CHECK_INTERVAL_MS)).await;
        }

        debug!("Page stable timeout after {:?}, proceeding", start.elapsed());
    }

    /// ログインフォームに認証情報を入力して送信する
    async fn submit_login_form(&self, page: &Page) -> Result<(), ScraperError> {
        info!("Login form detected, submitting credentials...");

        let username = self.config.username.as_deref().unwrap_or_default();
        let password = self.config.password.as_deref().unwrap_or_default();

        let fill_script = format!(
            r#"
            (function() {{
                var user = document.querySelector({user_sel});
                var pass = document.querySelector({pass_sel});
                if (!user || !pass) return false;
                user.value = {user};
                pass.value = {pass};
                var button = document.querySelector({submit_sel});
                if (button) button.click();
                return true;
            }})()
            "#,
            user_sel = serde_json::to_string(LOGIN_USER_SELECTOR)
                .unwrap_or_else(|_| "''".to_string()),
            pass_sel = serde_json::to_string(LOGIN_PASS_SELECTOR)
                .unwrap_or_else(|_| "''".to_string()),
            submit_sel = serde_json::to_string(LOGIN_SUBMIT_SELECTOR)
                .unwrap_or_else(|_| "''".to_string()),
            user = serde_json::to_string(username).unwrap_or_else(|_| "''".to_string()),
            pass = serde_json::to_string(password).unwrap_or_else(|_| "''".to_string()),
        );

        let submitted = page
            .evaluate(fill_script.as_str())
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value::<bool>()
            .unwrap_or(false);

        if !submitted {
            return Err(ScraperError::Login(
                "ログインフォームへの入力に失敗しました".into(),
            ));
        }

        sleep(Duration::from_secs(3)).await;
        Ok(())
    }

    /// デバッグ用スクリーンショットをbase64でログ出力
    async fn debug_screenshot(&self, page: &Page, tag: &str) {
        if let Ok(screenshot) = page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
            debug!("{} screenshot: data:image/png;base64,{}", tag, encoded);
        }
    }

    /// 生レコードをJSONで保存（デバッグ用・ベストエフォート）
    fn save_raw_records(&self, result: &JiraScrapeResult) {
        let jst = FixedOffset::east_opt(9 * 3600).unwrap();
        let timestamp = Utc::now().with_timezone(&jst).format("%Y%m%d_%H%M%S");
        let filename = format!("./data/jira_tickets_raw_{}.json", timestamp);

        if let Err(e) = std::fs::create_dir_all("./data") {
            warn!("Failed to create data directory: {}", e);
            return;
        }

        match serde_json::to_string_pretty(&result.records) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&filename, json) {
                    error!("Failed to save raw records: {}", e);
                } else {
                    info!("Saved raw records to {}", filename);
                }
            }
            Err(e) => error!("Failed to serialize records: {}", e),
        }
    }

    /// JS評価の文字列版。失敗は空文字（呼び出し側で存在確認する前提）
    async fn eval_string(&self, page: &Page, script: &str) -> String {
        match page.evaluate(script).await {
            Ok(value) => value.into_value::<String>().unwrap_or_default(),
            Err(e) => {
                debug!("Evaluate error: {}", e);
                String::new()
            }
        }
    }
}

#[async_trait]
impl Scraper for JiraScraper {
    type Output = JiraScrapeResult;

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        info!("Initializing browser for JIRA scraper...");

        // ユニークなユーザーデータディレクトリを生成
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("jira-scraper-{}", unique_id));

        // Chrome パスを取得
        let chrome_path = std::env::var("CHROME_PATH")
            .or_else(|_| std::env::var("CHROMIUM_PATH"))
            .unwrap_or_else(|_| "chromium".to_string());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&user_data_dir)
            .window_size(1920, 1080);

        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(Duration::from_secs(60))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if self.config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        self.browser = Some(browser);
        self.page = Some(Arc::new(page));

        info!("Browser initialized successfully");
        Ok(())
    }

    /// 認証を確立する
    ///
    /// SSO 自動認証 → 認証フォーム自動入力 → 手動ログイン待ちの順に
    /// フォールバックする。ヘッドレスでは手動待ちに入らず即時失敗。
    async fn login(&mut self) -> Result<(), ScraperError> {
        let page = self.get_page()?.clone();
        info!("Navigating to JIRA: {}", self.config.base());

        page.goto(self.config.base())
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;

        // 認証フォームが出ていて認証情報があれば自動入力
        let form_check = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(LOGIN_USER_SELECTOR).unwrap_or_else(|_| "''".to_string()),
        );
        let has_form = match page.evaluate(form_check.as_str()).await {
            Ok(value) => value.into_value::<bool>().unwrap_or(false),
            Err(e) => {
                debug!("Login form check error: {}", e);
                false
            }
        };

        if has_form && self.config.username.is_some() && self.config.password.is_some() {
            self.submit_login_form(&page).await?;
        } else {
            info!("Waiting for SSO authentication...");
        }

        if self
            .wait_for_marker(&page, AUTH_MARKER_SELECTOR, self.config.auth_timeout)
            .await
        {
            info!("Authentication successful");
            return Ok(());
        }

        if self.config.debug {
            self.debug_screenshot(&page, "login").await;
        }

        // ヘッドレスでは手動フォールバック不可。即時失敗させる
        if self.config.headless {
            return Err(ScraperError::Login(
                "認証を確認できませんでした（ヘッドレスモードでは手動ログイン不可）".into(),
            ));
        }

        // 手動ログイン待ち。オペレータの Enter 入力で再開する（タイムアウトなし）
        warn!("Automatic authentication failed; complete login in the browser window");
        println!("ブラウザでログインを完了したら Enter を押してください...");
        let mut line = String::new();
        let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
        stdin.read_line(&mut line).await?;

        if self
            .wait_for_marker(&page, AUTH_MARKER_SELECTOR, Duration::from_secs(10))
            .await
        {
            info!("Manual login confirmed");
            Ok(())
        } else {
            Err(ScraperError::Login(
                "手動ログイン後も認証を確認できませんでした".into(),
            ))
        }
    }

    async fn collect(&mut self) -> Result<JiraScrapeResult, ScraperError> {
        self.scrape(None, None).await
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Closing browser...");

        self.page = None;
        self.browser = None;

        info!("Browser closed");
        Ok(())
    }
}

/// スキンごとの検索URL形式（Cloud系 → クラシックナビゲータの順）
fn search_urls(base: &str, jql: &str, start_index: usize) -> Vec<String> {
    let encoded = urlencoding::encode(jql);
    vec![
        format!("{}/issues/?jql={}&startIndex={}", base, encoded, start_index),
        format!(
            "{}/secure/IssueNavigator.jspa?jqlQuery={}&startIndex={}",
            base, encoded, start_index
        ),
    ]
}

/// `PROJ-123` 形式のチケットキーかどうか
fn looks_like_issue_key(key: &str) -> bool {
    match key.rsplit_once('-') {
        Some((project, number)) => {
            !project.is_empty()
                && project
                    .chars()
                    .next()
                    .map(|c| c.is_ascii_alphabetic())
                    .unwrap_or(false)
                && project.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                && !number.is_empty()
                && number.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// ページ分のキーを既出を除いて追記する。追加件数を返す
fn merge_keys(all: &mut Vec<String>, page_keys: Vec<String>) -> usize {
    let mut added = 0;
    for key in page_keys {
        if !all.iter().any(|k| k == &key) {
            all.push(key);
            added += 1;
        }
    }
    added
}

/// ページングの目標件数
///
/// 総件数不明なら max_tickets（どちらも不明なら打ち切りはページ側の
/// 「新規キーなし」判定に任せる）。
fn page_target(total_hint: Option<usize>, max_tickets: Option<usize>) -> usize {
    match (total_hint, max_tickets) {
        (Some(total), Some(max)) => total.min(max),
        (Some(total), None) => total,
        (None, Some(max)) => max,
        (None, None) => usize::MAX,
    }
}

/// 件数表示テキストから総ヒット件数を取り出す
///
/// 「1-50 of 234」のような表示を想定し、最後の数値グループを採用する。
fn parse_result_total(text: &str) -> Option<usize> {
    let mut groups: Vec<usize> = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !current.is_empty() {
            if let Ok(n) = current.parse() {
                groups.push(n);
            }
            current.clear();
        }
    }
    if !current.is_empty() {
        if let Ok(n) = current.parse() {
            groups.push(n);
        }
    }

    groups.last().copied()
}
