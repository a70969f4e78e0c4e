//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

use std::path::Path;

/// 吸収可能な異常の扱い
///
/// # 使用例
///
/// ```rust
/// use sheetzero::{ErrorPolicy, ReaderBuilder};
///
/// # fn main() -> Result<(), sheetzero::SheetError> {
/// let reader = ReaderBuilder::new()
///     .with_error_policy(ErrorPolicy::Strict)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ErrorPolicy {
    /// 異常を部分的な結果として吸収し、診断情報として記録する（デフォルト）
    #[default]
    Lenient,

    /// 診断情報が1件でも発生した操作をエラーにする
    ///
    /// 壊れた共有文字列や不正なセル座標による暗黙のデータ欠落を許容しない場合に使用します。
    Strict,
}

/// 入力ファイルの形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SheetFormat {
    /// Office Open XML（`.xlsx`, `.xlsm`）
    Xlsx,

    /// OpenDocument Spreadsheet（`.ods`）
    Ods,

    /// 区切りテキスト（`.csv`, `.tsv`, `.txt`）
    Csv,
}

impl SheetFormat {
    /// 拡張子から形式を判定する
    ///
    /// 大文字小文字は区別しません。判定できない場合は`None`を返します。
    ///
    /// ```rust
    /// use sheetzero::SheetFormat;
    ///
    /// assert_eq!(SheetFormat::from_path("report.XLSX"), Some(SheetFormat::Xlsx));
    /// assert_eq!(SheetFormat::from_path("data.ods"), Some(SheetFormat::Ods));
    /// assert_eq!(SheetFormat::from_path("archive.zip"), None);
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" => Some(SheetFormat::Xlsx),
            "ods" => Some(SheetFormat::Ods),
            "csv" | "tsv" | "txt" => Some(SheetFormat::Csv),
            _ => None,
        }
    }
}

/// 区切りテキストの文字エンコーディング
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum CsvEncoding {
    /// UTF-8（デフォルト）
    ///
    /// 不正なバイト列は置換文字（U+FFFD）に置き換え、診断情報を記録します。
    #[default]
    Utf8,

    /// ISO-8859-1（Latin-1）
    ///
    /// 各バイトを同じ値のUnicodeコードポイントとして解釈します。
    Latin1,
}

/// シート選択方式
///
/// 出力対象のシートを選択する方法を指定します。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SheetSelector {
    /// すべてのシート（デフォルト）
    #[default]
    All,

    /// インデックス指定（0始まり）
    ///
    /// 例: `SheetSelector::Index(0)` は最初のシートを選択
    Index(usize),

    /// シート名指定
    ///
    /// 例: `SheetSelector::Name("Sheet1".to_string())`
    Name(String),

    /// 複数のインデックス指定
    ///
    /// 例: `SheetSelector::Indices(vec![0, 2, 4])`
    Indices(Vec<usize>),

    /// 複数のシート名指定
    Names(Vec<String>),
}

/// 出力フォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum OutputFormat {
    /// Markdownテーブル形式（デフォルト）
    ///
    /// # 出力例
    ///
    /// ```markdown
    /// | Nome  | Valor |
    /// |-------|-------|
    /// | Maria | 10    |
    /// ```
    #[default]
    Markdown,

    /// CSV（RFC 4180）形式
    ///
    /// 1行目は列見出しです。
    Csv,

    /// JSON形式
    ///
    /// 列見出しをキー、列の値の配列を値とするオブジェクトとして出力します。
    ///
    /// # 出力例
    ///
    /// ```json
    /// {
    ///   "Nome": ["Maria"],
    ///   "Valor": ["10"]
    /// }
    /// ```
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(SheetFormat::from_path("a/b/c.xlsx"), Some(SheetFormat::Xlsx));
        assert_eq!(SheetFormat::from_path("macro.xlsm"), Some(SheetFormat::Xlsx));
        assert_eq!(SheetFormat::from_path("Dados.ODS"), Some(SheetFormat::Ods));
        assert_eq!(SheetFormat::from_path("export.tsv"), Some(SheetFormat::Csv));
        assert_eq!(SheetFormat::from_path("legacy.xls"), None);
        assert_eq!(SheetFormat::from_path("no_extension"), None);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Lenient);
        assert_eq!(CsvEncoding::default(), CsvEncoding::Utf8);
        assert_eq!(SheetSelector::default(), SheetSelector::All);
        assert_eq!(OutputFormat::default(), OutputFormat::Markdown);
    }
}
