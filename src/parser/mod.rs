//! Parser Module
//!
//! アーカイブ内のXMLメンバーを直接解析するデコーダー群。
//! すべてのデコーダーは`quick_xml::Reader`のイベントを1回だけ走査します。

pub(crate) mod ods;
pub(crate) mod shared_strings;
pub(crate) mod workbook_map;
pub(crate) mod worksheet;
pub(crate) mod xml;

/// XLSXのワークブック定義（必須）
pub(crate) const XLSX_WORKBOOK: &str = "xl/workbook.xml";

/// XLSXの共有文字列テーブル（任意）
pub(crate) const XLSX_SHARED_STRINGS: &str = "xl/sharedStrings.xml";

/// ODSの本体（必須）
pub(crate) const ODS_CONTENT: &str = "content.xml";

/// シートIDからワークシートXMLのパスを求める
///
/// リレーションシップ（`xl/_rels/workbook.xml.rels`）は参照しません。
pub(crate) fn worksheet_path(sheet_id: &str) -> String {
    format!("xl/worksheets/sheet{}.xml", sheet_id)
}
