use std::env;
use std::time::Duration;

use crate::error::ScraperError;

/// JIRAスクレイパー設定
///
/// `base_url` 以外はデフォルト値あり。認証情報は省略可能で、
/// 省略時はSSO自動認証と手動ログインフォールバックに委ねる。
#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub project_key: String,
    pub headless: bool,
    pub debug: bool,
    /// ページ遷移1回あたりのタイムアウト
    pub nav_timeout: Duration,
    /// チケット詳細ビューの描画完了待ちタイムアウト
    pub render_timeout: Duration,
    /// SSO認証完了待ちタイムアウト
    pub auth_timeout: Duration,
    /// チケット間のウェイト（リクエストレート抑制）
    pub ticket_delay: Duration,
    /// 検索ビューの1ページあたり件数
    pub page_size: usize,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: None,
            password: None,
            project_key: "TM".to_string(),
            headless: true,
            debug: false,
            nav_timeout: Duration::from_secs(15),
            render_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(60),
            ticket_delay: Duration::from_millis(500),
            page_size: 50,
        }
    }
}

impl JiraConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// 環境変数から設定を読み込む
    ///
    /// JIRA_URL は必須。JIRA_USERNAME / JIRA_PASSWORD / JIRA_PROJECT_KEY は任意。
    pub fn from_env() -> Result<Self, ScraperError> {
        let base_url = env::var("JIRA_URL")
            .map_err(|_| ScraperError::Config("JIRA_URL が設定されていません".into()))?;

        let mut config = Self::new(base_url);
        config.username = env::var("JIRA_USERNAME").ok().filter(|v| !v.is_empty());
        config.password = env::var("JIRA_PASSWORD").ok().filter(|v| !v.is_empty());
        if let Ok(key) = env::var("JIRA_PROJECT_KEY") {
            if !key.is_empty() {
                config.project_key = key;
            }
        }

        Ok(config)
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_project_key(mut self, key: impl Into<String>) -> Self {
        self.project_key = key.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_ticket_delay(mut self, delay: Duration) -> Self {
        self.ticket_delay = delay;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// 末尾スラッシュを除いたベースURL
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = JiraConfig::new("https://jira.example.com/")
            .with_credentials("user", "pass")
            .with_project_key("TMHUB")
            .with_headless(false)
            .with_debug(true)
            .with_ticket_delay(Duration::from_millis(300))
            .with_page_size(25);

        assert_eq!(config.base_url, "https://jira.example.com/");
        assert_eq!(config.base(), "https://jira.example.com");
        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.password.as_deref(), Some("pass"));
        assert_eq!(config.project_key, "TMHUB");
        assert!(!config.headless);
        assert!(config.debug);
        assert_eq!(config.ticket_delay, Duration::from_millis(300));
        assert_eq!(config.page_size, 25);
    }

    #[test]
    fn test_from_env() {
        env::set_var("JIRA_URL", "https://jira.example.com");
        env::set_var("JIRA_USERNAME", "alice");
        env::set_var("JIRA_PASSWORD", "secret");
        env::set_var("JIRA_PROJECT_KEY", "SEC");

        let config = JiraConfig::from_env().unwrap();
        assert_eq!(config.base_url, "https://jira.example.com");
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.project_key, "SEC");
    }

    #[test]
    fn test_config_defaults() {
        let config = JiraConfig::new("https://jira.example.com");

        assert_eq!(config.project_key, "TM");
        assert!(config.headless);
        assert!(!config.debug);
        assert!(config.username.is_none());
        assert!(config.password.is_none());
        assert_eq!(config.ticket_delay, Duration::from_millis(500));
        assert_eq!(config.page_size, 50);
    }
}
