//! フィールドロケータ定義
//!
//! フィールドごとに CSS セレクタ候補を順に試し、最後にラベル近傍探索に
//! フォールバックする。JIRA のスキン変更時はこのテーブルだけを修正する。
//! 制御フロー側 (`scraper.rs`) の変更は不要。

/// 1フィールド分のロケータ
///
/// `selectors` を先頭から試し、最初に非空テキストを返した要素を採用する。
/// どれも一致しなければ `label` を含む dt/label 要素の隣接値を探す。
#[derive(Debug, Clone, Copy)]
pub struct FieldLocator {
    pub name: &'static str,
    pub selectors: &'static [&'static str],
    pub label: Option<&'static str>,
}

/// 抽出対象フィールドのロケータテーブル（ticket_key は除く。キーは遷移時に確定済み）
///
/// セレクタは JIRA Server 系の `#xxx-val` 系 ID を優先し、Cloud 系の
/// `data-testid` 属性をフォールバックに置く。
pub const FIELD_LOCATORS: [FieldLocator; 17] = [
    FieldLocator {
        name: "summary",
        selectors: &[
            "#summary-val",
            "[data-testid=\"issue.views.field.rich-text.summary\"]",
            "h1",
        ],
        label: None,
    },
    FieldLocator {
        name: "status",
        selectors: &[
            "#status-val span.dropdown-text",
            "#status-val",
            "[data-testid*=\"status\"]",
        ],
        label: None,
    },
    FieldLocator {
        name: "priority",
        selectors: &[
            "#priority-val span.dropdown-text",
            "#priority-val",
            "[data-testid*=\"priority\"]",
        ],
        label: None,
    },
    FieldLocator {
        name: "assignee",
        selectors: &["#assignee-val", "[data-testid*=\"assignee\"]"],
        label: None,
    },
    FieldLocator {
        name: "reporter",
        selectors: &["#reporter-val", "[data-testid*=\"reporter\"]"],
        label: None,
    },
    FieldLocator {
        name: "created",
        selectors: &["#created-val", "[data-testid*=\"created\"]"],
        label: None,
    },
    FieldLocator {
        name: "updated",
        selectors: &["#updated-val", "[data-testid*=\"updated\"]"],
        label: None,
    },
    FieldLocator {
        name: "resolved",
        selectors: &["#resolved-val", "#resolutiondate-val"],
        label: None,
    },
    FieldLocator {
        name: "description",
        selectors: &["#description-val", "[data-testid*=\"description\"]"],
        label: None,
    },
    // ここから脅威モデリング用カスタムフィールド。ID はインスタンスごとに
    // 変わる (customfield_NNNNN) ため表示ラベルで引く。
    FieldLocator {
        name: "application_name",
        selectors: &[],
        label: Some("Application Name"),
    },
    FieldLocator {
        name: "application_rating",
        selectors: &[],
        label: Some("Application Rating"),
    },
    FieldLocator {
        name: "threat_modeler",
        selectors: &[],
        label: Some("Threat Modeler"),
    },
    FieldLocator {
        name: "tm_completion_date",
        selectors: &[],
        label: Some("TM Completion Date"),
    },
    FieldLocator {
        name: "num_threats_identified",
        selectors: &[],
        label: Some("Threats Identified"),
    },
    FieldLocator {
        name: "num_threats_mitigated",
        selectors: &[],
        label: Some("Threats Mitigated"),
    },
    FieldLocator {
        name: "num_open_items",
        selectors: &[],
        label: Some("Open Items"),
    },
    FieldLocator {
        name: "pentest_findings",
        selectors: &[],
        label: Some("Pentest Findings Not Identified"),
    },
];

/// 1フィールド分の抽出スクリプトを生成する
///
/// セレクタ・ラベル文字列は JSON エスケープして埋め込む。
/// 戻り値は最初に見つかった非空テキスト、見つからなければ空文字。
pub fn extraction_script(locator: &FieldLocator) -> String {
    let selectors =
        serde_json::to_string(locator.selectors).unwrap_or_else(|_| "[]".to_string());
    let label = serde_json::to_string(locator.label.unwrap_or(""))
        .unwrap_or_else(|_| "\"\"".to_string());

    format!(
        r#"
        (function() {{
            var selectors = {selectors};
            for (var i = 0; i < selectors.length; i++) {{
                var el = document.querySelector(selectors[i]);
                if (el) {{
                    var text = (el.textContent || '').trim();
                    if (text) return text;
                }}
            }}
            var label = {label};
            if (!label) return '';
            var headings = document.querySelectorAll('dt, label, strong.name');
            for (var i = 0; i < headings.length; i++) {{
                var heading = (headings[i].textContent || '').trim();
                if (heading.indexOf(label) < 0) continue;
                var sibling = headings[i].nextElementSibling;
                if (sibling) {{
                    var text = (sibling.textContent || '').trim();
                    if (text) return text;
                }}
                var wrap = headings[i].closest('[class*="field"]');
                if (wrap) {{
                    var value = wrap.querySelector('dd, .value, [class*="value"]');
                    if (value) {{
                        var text = (value.textContent || '').trim();
                        if (text) return text;
                    }}
                }}
            }}
            return '';
        }})()
        "#,
        selectors = selectors,
        label = label,
    )
}
