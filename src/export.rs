//! CSV出力
//!
//! 列順は `FIELD_COLUMNS` に固定。値のカンマ・引用符・改行は csv クレートの
//! 標準クォート規則でエスケープされる。同一レコード列からは常に同一の
//! バイト列が生成される。

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::ScraperError;
use crate::jira::{TicketRecord, FIELD_COLUMNS};

/// レコード列をCSVファイルへ書き出す
///
/// 親ディレクトリがなければ作成する。失敗はファイルシステム起因のみ。
pub fn export_csv(records: &[TicketRecord], path: &Path) -> Result<PathBuf, ScraperError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(FIELD_COLUMNS)?;
    for record in records {
        writer.write_record(FIELD_COLUMNS.iter().map(|column| record.get(column)))?;
    }
    writer.flush()?;

    info!("Exported {} records to {:?}", records.len(), path);
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "jira-scraper-test-{}-{}",
            std::process::id(),
            name
        ))
    }

    fn sample_records() -> Vec<TicketRecord> {
        let mut first = TicketRecord::new("TM-1001");
        first.set("summary", "Threat model, with commas");
        first.set("description", "He said \"quoted\"\nsecond line");
        first.set("num_threats_identified", "12");

        let second = TicketRecord::new("TM-1002");
        vec![first, second]
    }

    #[test]
    fn test_export_header_and_rows() {
        let path = temp_path("header.csv");
        export_csv(&sample_records(), &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), FIELD_COLUMNS.len());
        assert_eq!(&headers[0], "ticket_key");
        assert_eq!(&headers[17], "pentest_findings");

        let rows: Vec<csv::StringRecord> =
            reader.records().map(|row| row.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "TM-1001");
        assert_eq!(&rows[0][1], "Threat model, with commas");
        assert_eq!(&rows[1][0], "TM-1002");
        // 未抽出フィールドは空文字のまま出力される
        assert_eq!(&rows[1][1], "");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_export_quoting_roundtrip() {
        let path = temp_path("quoting.csv");
        export_csv(&sample_records(), &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> =
            reader.records().map(|row| row.unwrap()).collect();
        assert_eq!(&rows[0][9], "He said \"quoted\"\nsecond line");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_export_idempotent() {
        let path_a = temp_path("idempotent-a.csv");
        let path_b = temp_path("idempotent-b.csv");
        let records = sample_records();

        export_csv(&records, &path_a).unwrap();
        export_csv(&records, &path_b).unwrap();

        let bytes_a = std::fs::read(&path_a).unwrap();
        let bytes_b = std::fs::read(&path_b).unwrap();
        assert_eq!(bytes_a, bytes_b);

        std::fs::remove_file(&path_a).ok();
        std::fs::remove_file(&path_b).ok();
    }

    #[test]
    fn test_export_empty_records_writes_header_only() {
        let path = temp_path("empty.csv");
        export_csv(&[], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ticket_key,summary,"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_export_unwritable_path_fails() {
        let path = Path::new("/proc/jira-scraper-no-such-dir/out.csv");
        let result = export_csv(&sample_records(), path);
        assert!(result.is_err());
    }
}
