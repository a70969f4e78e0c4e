//! Diagnostics Module
//!
//! 読み込みを中断しない異常を型付きの値として表現するモジュール。
//!
//! 実際のスプレッドシートには壊れた共有文字列や不正なセル座標が含まれることがあります。
//! デコーダーはそれらを部分的な結果（空文字列、空のシート）として吸収しますが、
//! 何が吸収されたかは[`Diagnostic`]として記録し、[`SheetOutcome`]で呼び出し元に返します。

use std::fmt;

use serde::Serialize;

use crate::api::ErrorPolicy;
use crate::error::SheetError;
use crate::types::SheetData;

/// 吸収された異常の種類
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum Diagnostic {
    /// 任意メンバーが存在しない（例: シートに対応するワークシートXML）
    MemberMissing {
        /// アーカイブ内のパス
        member: String,
    },

    /// 任意メンバーのXMLが解析できなかった
    MalformedXml {
        /// アーカイブ内のパス
        member: String,
        /// パーサーが報告したメッセージ
        message: String,
    },

    /// `name`または`sheetId`を欠くシート定義をスキップした
    SkippedSheetEntry {
        /// アーカイブ内のパス
        member: String,
        /// スキップの理由
        reason: String,
    },

    /// セル参照が解析できずセルをスキップした
    InvalidCoordinate {
        /// アーカイブ内のパス
        member: String,
        /// 元のセル参照文字列
        reference: String,
    },

    /// 行番号が解析できず行をスキップした
    InvalidRowNumber {
        /// アーカイブ内のパス
        member: String,
        /// 元の`r`属性
        value: String,
    },

    /// 共有文字列インデックスが解決できず空文字列として扱った
    UnresolvedSharedString {
        /// アーカイブ内のパス
        member: String,
        /// セル参照
        reference: String,
        /// `<v>`要素のテキスト
        index: String,
    },

    /// 繰り返し回数が解析できず1として扱った
    InvalidRepeatCount {
        /// アーカイブ内のパス
        member: String,
        /// 元の属性値
        value: String,
    },

    /// 行数・列数の上限を超えたデータを切り捨てた
    LimitExceeded {
        /// アーカイブ内のパス（CSVの場合はソース名）
        member: String,
        /// 詳細メッセージ
        message: String,
    },

    /// テキストのデコードに失敗し、置換文字で補った
    InvalidText {
        /// ソース名
        member: String,
        /// 該当レコード（1始まり）
        record: u64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MemberMissing { member } => {
                write!(f, "archive member '{}' is missing", member)
            }
            Diagnostic::MalformedXml { member, message } => {
                write!(f, "malformed XML in '{}': {}", member, message)
            }
            Diagnostic::SkippedSheetEntry { member, reason } => {
                write!(f, "skipped sheet entry in '{}': {}", member, reason)
            }
            Diagnostic::InvalidCoordinate { member, reference } => {
                write!(f, "invalid cell reference '{}' in '{}'", reference, member)
            }
            Diagnostic::InvalidRowNumber { member, value } => {
                write!(f, "invalid row number '{}' in '{}'", value, member)
            }
            Diagnostic::UnresolvedSharedString {
                member,
                reference,
                index,
            } => write!(
                f,
                "unresolved shared string '{}' at {} in '{}'",
                index, reference, member
            ),
            Diagnostic::InvalidRepeatCount { member, value } => {
                write!(f, "invalid repeat count '{}' in '{}'", value, member)
            }
            Diagnostic::LimitExceeded { member, message } => {
                write!(f, "limit exceeded in '{}': {}", member, message)
            }
            Diagnostic::InvalidText { member, record } => {
                write!(f, "invalid text in record {} of '{}'", record, member)
            }
        }
    }
}

/// デコード中に診断情報を収集する
///
/// 記録と同時に`log::warn!`で出力します。
#[derive(Debug, Clone, Default)]
pub(crate) struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}", diagnostic);
        self.items.push(diagnostic);
    }

    /// 既に記録済みの診断情報を引き継ぐ（ログは出力しない）
    pub fn inherit(&mut self, items: &[Diagnostic]) {
        self.items.extend_from_slice(items);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

/// デコーダーの内部結果（データと診断情報の組）
#[derive(Debug, Clone, Default)]
pub(crate) struct Decoded {
    pub data: SheetData,
    pub diagnostics: Vec<Diagnostic>,
}

impl Decoded {
    pub fn new(data: SheetData, diagnostics: Diagnostics) -> Self {
        Self {
            data,
            diagnostics: diagnostics.into_vec(),
        }
    }
}

/// シート読み込みの結果
///
/// 「異常なく読めた」と「一部を吸収して読めた」を型で区別します。
/// どちらの場合もデータは利用可能です。
///
/// # 使用例
///
/// ```rust,no_run
/// use sheetzero::{SheetLoader, SheetOutcome, XlsxLoader};
///
/// # fn main() -> Result<(), sheetzero::SheetError> {
/// let mut loader = XlsxLoader::new("book.xlsx");
/// match loader.sheet_outcome("Sheet1")? {
///     SheetOutcome::Complete(sheet) => println!("{} rows", sheet.row_count()),
///     SheetOutcome::Degraded { data, diagnostics } => {
///         println!("{} rows, {} problems", data.row_count(), diagnostics.len());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SheetOutcome<'a> {
    /// 診断情報なしで読み込めた
    Complete(&'a SheetData),

    /// 異常を吸収して読み込めた
    Degraded {
        /// 部分的な（または空の）データ
        data: &'a SheetData,
        /// 吸収された異常
        diagnostics: &'a [Diagnostic],
    },
}

impl<'a> SheetOutcome<'a> {
    pub(crate) fn new(data: &'a SheetData, diagnostics: &'a [Diagnostic]) -> Self {
        if diagnostics.is_empty() {
            SheetOutcome::Complete(data)
        } else {
            SheetOutcome::Degraded { data, diagnostics }
        }
    }

    /// データを取得（成否を問わない）
    pub fn data(&self) -> &'a SheetData {
        match self {
            SheetOutcome::Complete(data) => data,
            SheetOutcome::Degraded { data, .. } => data,
        }
    }

    /// 吸収された異常（完全な場合は空）
    pub fn diagnostics(&self) -> &'a [Diagnostic] {
        match self {
            SheetOutcome::Complete(_) => &[],
            SheetOutcome::Degraded { diagnostics, .. } => diagnostics,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, SheetOutcome::Degraded { .. })
    }
}

impl ErrorPolicy {
    /// 厳格モードの場合、最初の診断情報をエラーに変換する
    pub(crate) fn check(&self, diagnostics: &[Diagnostic]) -> Result<(), SheetError> {
        match (self, diagnostics.first()) {
            (ErrorPolicy::Strict, Some(first)) => Err(SheetError::Strict(first.clone())),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_complete_without_diagnostics() {
        let decoded = Decoded::new(SheetData::new(), Diagnostics::new());
        let outcome = SheetOutcome::new(&decoded.data, &decoded.diagnostics);
        assert!(!outcome.is_degraded());
        assert!(outcome.diagnostics().is_empty());
    }

    #[test]
    fn test_outcome_degraded_with_diagnostics() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(Diagnostic::MemberMissing {
            member: "xl/worksheets/sheet2.xml".to_string(),
        });
        let decoded = Decoded::new(SheetData::new(), diagnostics);
        let outcome = SheetOutcome::new(&decoded.data, &decoded.diagnostics);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.diagnostics().len(), 1);
        assert!(outcome.data().is_empty());
    }

    #[test]
    fn test_inherit_keeps_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.inherit(&[Diagnostic::MemberMissing {
            member: "a".to_string(),
        }]);
        diagnostics.record(Diagnostic::MemberMissing {
            member: "b".to_string(),
        });
        let items = diagnostics.into_vec();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            Diagnostic::MemberMissing {
                member: "a".to_string()
            }
        );
    }

    #[test]
    fn test_strict_policy_rejects_first_diagnostic() {
        let diagnostics = vec![
            Diagnostic::InvalidCoordinate {
                member: "xl/worksheets/sheet1.xml".to_string(),
                reference: "12".to_string(),
            },
            Diagnostic::MemberMissing {
                member: "x".to_string(),
            },
        ];

        match ErrorPolicy::Strict.check(&diagnostics) {
            Err(SheetError::Strict(Diagnostic::InvalidCoordinate { reference, .. })) => {
                assert_eq!(reference, "12");
            }
            other => panic!("Expected strict error, got {:?}", other),
        }
        assert!(ErrorPolicy::Lenient.check(&diagnostics).is_ok());
        assert!(ErrorPolicy::Strict.check(&[]).is_ok());
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::UnresolvedSharedString {
            member: "xl/worksheets/sheet1.xml".to_string(),
            reference: "B2".to_string(),
            index: "7".to_string(),
        };
        assert_eq!(
            d.to_string(),
            "unresolved shared string '7' at B2 in 'xl/worksheets/sheet1.xml'"
        );
    }
}
