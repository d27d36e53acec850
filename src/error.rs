use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("ログインエラー: {0}")]
    Login(String),

    #[error("セッションエラー: {0}")]
    Session(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("データ抽出エラー: {0}")]
    Extraction(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("CSV出力エラー: {0}")]
    Csv(#[from] csv::Error),
}

impl ScraperError {
    /// セッション全体が継続不能なエラーかどうか
    ///
    /// true の場合は実行を打ち切る。チケット単位のエラー
    /// (Timeout / Navigation / JavaScript など) はスキップして続行できる。
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            ScraperError::BrowserInit(_) | ScraperError::Login(_) | ScraperError::Session(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_fatal_classification() {
        assert!(ScraperError::Login("auth failed".into()).is_session_fatal());
        assert!(ScraperError::Session("expired".into()).is_session_fatal());
        assert!(ScraperError::BrowserInit("no chrome".into()).is_session_fatal());

        assert!(!ScraperError::Timeout("render".into()).is_session_fatal());
        assert!(!ScraperError::Navigation("404".into()).is_session_fatal());
        assert!(!ScraperError::JavaScript("eval".into()).is_session_fatal());
        assert!(!ScraperError::Extraction("no keys".into()).is_session_fatal());
    }
}
