//! JIRA スクレイパー関連の型定義

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// チケットキー列の論理フィールド名
pub const TICKET_KEY_FIELD: &str = "ticket_key";

/// CSV出力の列順（ヘッダ行と一致）
///
/// 標準フィールド10列 + 脅威モデリング用カスタムフィールド8列。
pub const FIELD_COLUMNS: [&str; 18] = [
    TICKET_KEY_FIELD,
    "summary",
    "status",
    "priority",
    "assignee",
    "reporter",
    "created",
    "updated",
    "resolved",
    "description",
    "application_name",
    "application_rating",
    "threat_modeler",
    "tm_completion_date",
    "num_threats_identified",
    "num_threats_mitigated",
    "num_open_items",
    "pentest_findings",
];

/// 1チケット分の抽出結果
///
/// フィールド名 → 抽出値のフラットなマップ。未抽出のフィールドは空文字扱い。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRecord {
    fields: HashMap<String, String>,
}

impl TicketRecord {
    pub fn new(ticket_key: impl Into<String>) -> Self {
        let mut fields = HashMap::new();
        fields.insert(TICKET_KEY_FIELD.to_string(), ticket_key.into());
        Self { fields }
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// フィールド値を返す。未抽出なら空文字
    pub fn get(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn ticket_key(&self) -> &str {
        self.get(TICKET_KEY_FIELD)
    }
}

/// スクレイプ実行結果
#[derive(Debug, Clone)]
pub struct JiraScrapeResult {
    /// 構築済みレコード（検索ビューの返却順）
    pub records: Vec<TicketRecord>,
    /// 検索ビューが報告した総ヒット件数（max_tickets で切り詰める前の値）
    pub total_matched: usize,
    /// 詳細ページのロードに失敗してスキップしたチケットキー
    pub skipped: Vec<String>,
    /// セッションID
    pub session_id: String,
    /// セッション喪失で途中終了した場合のエラー内容
    ///
    /// Some でも収集済みレコードはそのままエクスポート可能。
    pub aborted: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_columns_unique_and_key_first() {
        let unique: HashSet<&str> = FIELD_COLUMNS.iter().copied().collect();
        assert_eq!(unique.len(), FIELD_COLUMNS.len());
        assert_eq!(FIELD_COLUMNS[0], TICKET_KEY_FIELD);
        assert_eq!(FIELD_COLUMNS.len(), 18);
    }

    #[test]
    fn test_record_missing_field_is_empty() {
        let record = TicketRecord::new("TM-1001");
        assert_eq!(record.ticket_key(), "TM-1001");
        assert_eq!(record.get("summary"), "");
        assert_eq!(record.get("no_such_field"), "");
    }

    #[test]
    fn test_record_set_get() {
        let mut record = TicketRecord::new("TM-1002");
        record.set("summary", "Threat model for payments");
        record.set("num_threats_identified", "12");

        assert_eq!(record.get("summary"), "Threat model for payments");
        assert_eq!(record.get("num_threats_identified"), "12");
        assert_eq!(record.ticket_key(), "TM-1002");
    }
}
