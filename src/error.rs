//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。
//!
//! ここに定義されるのは読み込みを中断する「致命的な」エラーのみです。
//! 読み込みを継続できる異常（壊れた共有文字列、不正なセル座標など）は
//! [`crate::Diagnostic`]として記録されます。

use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// sheetzeroクレート全体で使用するエラー型
///
/// # エラーの種類
///
/// - `Io`: I/O操作中に発生したエラー（ファイル読み込み失敗など）
/// - `ArchiveOpen`: 入力が有効なZIPアーカイブではない
/// - `RequiredMemberMissing`: 必須のXMLメンバー（`xl/workbook.xml`、`content.xml`）が存在しない
/// - `MalformedXml`: 必須のXMLメンバーが解析できない
/// - `Strict`: 厳格モードで診断情報が発生した
#[derive(Error, Debug)]
pub enum SheetError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIPアーカイブを開けなかったエラー
    ///
    /// 入力がZIP形式でない、または中央ディレクトリが破損している場合に発生します。
    #[error("Failed to open archive: {0}")]
    ArchiveOpen(String),

    /// 必須メンバーが存在しないエラー
    ///
    /// XLSXの`xl/workbook.xml`、ODSの`content.xml`が対象です。
    /// `xl/sharedStrings.xml`の欠落はエラーになりません。
    #[error("Required archive member '{member}' is missing")]
    RequiredMemberMissing {
        /// アーカイブ内のパス
        member: String,
    },

    /// 必須メンバーのXML解析エラー
    #[error("Malformed XML in '{member}': {message}")]
    MalformedXml {
        /// アーカイブ内のパス
        member: String,
        /// パーサーが報告したメッセージ
        message: String,
    },

    /// セル座標の解析エラー
    ///
    /// 先頭に英字の列部分がない参照（例: `"1"`）を解析した場合に発生します。
    #[error("Invalid cell coordinate: '{0}'")]
    InvalidCoordinate(String),

    /// 指定した名前のシートが存在しない
    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    /// シートインデックスが範囲外
    #[error("Sheet index {index} is out of range (total: {total})")]
    SheetIndexOutOfRange {
        /// 要求されたインデックス（0始まり）
        index: usize,
        /// シート数
        total: usize,
    },

    /// 区切りテキストの読み書きエラー
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON出力時のシリアライズエラー
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 設定の検証に失敗したエラー
    ///
    /// `ReaderBuilder::build()`時に設定を検証し、無効な設定が検出された
    /// 場合に発生します。例えば、行数上限に0を指定した場合などです。
    ///
    /// # 例
    ///
    /// ```rust
    /// use sheetzero::{ReaderBuilder, SheetError};
    ///
    /// let result = ReaderBuilder::new().with_row_limit(0).build();
    ///
    /// match result {
    ///     Err(SheetError::Config(msg)) => {
    ///         println!("設定エラー: {}", msg);
    ///     }
    ///     _ => {}
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// テーブル構造が不正
    ///
    /// `SheetData::from_columns()`に長さの異なる列や重複した見出しを渡した場合に発生します。
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、パストラバーサル攻撃、ファイルサイズ制限などの
    /// セキュリティ制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// 形式を判定できない、または対応していない入力
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// 厳格モードで診断情報が発生した
    ///
    /// `ErrorPolicy::Strict`を指定した場合、本来は空データとして吸収される
    /// 異常がこのエラーとして呼び出し元に返されます。
    #[error("Strict mode rejected degraded result: {0}")]
    Strict(Diagnostic),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: SheetError = io_err.into();

        match error {
            SheetError::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
                assert_eq!(e.to_string(), "File not found");
            }
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_required_member_missing_display() {
        let error = SheetError::RequiredMemberMissing {
            member: "xl/workbook.xml".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("Required archive member"));
        assert!(msg.contains("xl/workbook.xml"));
    }

    #[test]
    fn test_malformed_xml_display() {
        let error = SheetError::MalformedXml {
            member: "content.xml".to_string(),
            message: "unexpected end tag".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.starts_with("Malformed XML in 'content.xml'"));
        assert!(msg.contains("unexpected end tag"));
    }

    #[test]
    fn test_sheet_index_out_of_range_display() {
        let error = SheetError::SheetIndexOutOfRange { index: 5, total: 2 };
        assert_eq!(error.to_string(), "Sheet index 5 is out of range (total: 2)");
    }

    #[test]
    fn test_strict_wraps_diagnostic() {
        let error = SheetError::Strict(Diagnostic::MemberMissing {
            member: "xl/worksheets/sheet3.xml".to_string(),
        });
        let msg = error.to_string();
        assert!(msg.starts_with("Strict mode rejected"));
        assert!(msg.contains("xl/worksheets/sheet3.xml"));
    }

    #[test]
    fn test_error_conversion_with_question_mark() {
        fn io_operation() -> Result<(), SheetError> {
            let _file = std::fs::File::open("nonexistent_file.xlsx")?;
            Ok(())
        }

        match io_operation() {
            Err(SheetError::Io(_)) => {}
            _ => panic!("Expected Io error from ? operator"),
        }
    }

    #[test]
    fn test_all_error_formats() {
        let io_err: SheetError = io::Error::other("test io").into();
        assert!(io_err.to_string().starts_with("IO error"));

        let archive_err = SheetError::ArchiveOpen("invalid Zip archive".to_string());
        assert!(archive_err.to_string().starts_with("Failed to open archive"));

        let config_err = SheetError::Config("test config".to_string());
        assert!(config_err.to_string().starts_with("Configuration error"));

        let coord_err = SheetError::InvalidCoordinate("1".to_string());
        assert_eq!(coord_err.to_string(), "Invalid cell coordinate: '1'");

        let not_found = SheetError::SheetNotFound("Plan1".to_string());
        assert_eq!(not_found.to_string(), "Sheet 'Plan1' not found");
    }
}
