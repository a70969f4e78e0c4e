//! Loader Module
//!
//! 入力形式ごとのローダーと、その共通インターフェース（[`SheetLoader`]）を提供するモジュール。
//!
//! ローダーはシートの対応表と各シートのデータをインスタンスごとにキャッシュします。
//! キャッシュを更新する操作はすべて`&mut self`を取るため、1つのローダーを
//! 複数スレッドで共有する場合は呼び出し側での同期が必要です。
//! 独立したローダー同士は状態を共有しません。

mod csv;
mod ods;
mod xlsx;

pub use self::csv::CsvLoader;
pub use self::ods::OdsLoader;
pub use self::xlsx::XlsxLoader;

use crate::api::{CsvEncoding, ErrorPolicy, SheetFormat};
use crate::diagnostics::{Diagnostic, SheetOutcome};
use crate::error::SheetError;
use crate::security::{SecurityConfig, TableLimits};
use crate::types::{SheetData, SheetIndexNames, WorkbookData};

/// ローダー共通の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadOptions {
    pub policy: ErrorPolicy,
    pub limits: TableLimits,
    pub security: SecurityConfig,
    pub csv_delimiter: u8,
    pub csv_encoding: CsvEncoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            policy: ErrorPolicy::default(),
            limits: TableLimits::default(),
            security: SecurityConfig::default(),
            csv_delimiter: b'\t',
            csv_encoding: CsvEncoding::default(),
        }
    }
}

/// シートを読み込むローダーの共通インターフェース
///
/// # 使用例
///
/// ```rust,no_run
/// use sheetzero::{SheetLoader, XlsxLoader};
///
/// # fn main() -> Result<(), sheetzero::SheetError> {
/// let mut loader = XlsxLoader::new("book.xlsx");
///
/// for (i, name) in loader.sheet_index()?.clone().iter() {
///     println!("{}: {}", i, name);
/// }
///
/// // 最初のシート
/// let first = loader.sheet(None)?;
/// println!("{:?}", first.header());
/// # Ok(())
/// # }
/// ```
pub trait SheetLoader {
    /// 入力ソースの安定したハッシュ値
    fn fingerprint(&self) -> u64;

    /// シートの対応表（初回のみ読み込み）
    fn sheet_index(&mut self) -> Result<&SheetIndexNames, SheetError>;

    /// 名前を指定してシートを読み込み、診断情報とともに返す
    ///
    /// # エラー
    ///
    /// * `SheetError::SheetNotFound` - 対応表にない名前の場合
    /// * `SheetError::Strict` - 厳格モードで診断情報が発生した場合
    fn sheet_outcome(&mut self, name: &str) -> Result<SheetOutcome<'_>, SheetError>;

    /// すべてのシートを対応表の順に読み込む
    fn workbook_data(&mut self) -> Result<&WorkbookData, SheetError>;

    /// すべてのシートを読み込み、ワークブックの所有権を返す
    fn into_workbook_data(self) -> Result<WorkbookData, SheetError>
    where
        Self: Sized;

    /// シート単位ではない診断情報（ワークブック定義、共有文字列テーブルなど）
    fn diagnostics(&self) -> &[Diagnostic];

    /// シートを取得する（`None`の場合は最初のシート）
    fn sheet(&mut self, name: Option<&str>) -> Result<&SheetData, SheetError> {
        match name {
            Some(name) => self.sheet_named(name),
            None => self.sheet_at(0),
        }
    }

    /// 序数（0始まり）を指定してシートを取得
    fn sheet_at(&mut self, index: usize) -> Result<&SheetData, SheetError> {
        let name = {
            let names = self.sheet_index()?;
            names
                .name_at(index)
                .map(str::to_string)
                .ok_or(SheetError::SheetIndexOutOfRange {
                    index,
                    total: names.len(),
                })?
        };
        self.sheet_named(&name)
    }

    /// 名前を指定してシートを取得
    fn sheet_named(&mut self, name: &str) -> Result<&SheetData, SheetError> {
        Ok(self.sheet_outcome(name)?.data())
    }
}

/// 形式を問わないローダー
///
/// [`crate::SheetReader::open()`]が返す型です。
#[derive(Debug)]
pub enum Workbook {
    Xlsx(XlsxLoader),
    Ods(OdsLoader),
    Csv(CsvLoader),
}

impl Workbook {
    pub fn format(&self) -> SheetFormat {
        match self {
            Workbook::Xlsx(_) => SheetFormat::Xlsx,
            Workbook::Ods(_) => SheetFormat::Ods,
            Workbook::Csv(_) => SheetFormat::Csv,
        }
    }
}

impl SheetLoader for Workbook {
    fn fingerprint(&self) -> u64 {
        match self {
            Workbook::Xlsx(l) => l.fingerprint(),
            Workbook::Ods(l) => l.fingerprint(),
            Workbook::Csv(l) => l.fingerprint(),
        }
    }

    fn sheet_index(&mut self) -> Result<&SheetIndexNames, SheetError> {
        match self {
            Workbook::Xlsx(l) => l.sheet_index(),
            Workbook::Ods(l) => l.sheet_index(),
            Workbook::Csv(l) => l.sheet_index(),
        }
    }

    fn sheet_outcome(&mut self, name: &str) -> Result<SheetOutcome<'_>, SheetError> {
        match self {
            Workbook::Xlsx(l) => l.sheet_outcome(name),
            Workbook::Ods(l) => l.sheet_outcome(name),
            Workbook::Csv(l) => l.sheet_outcome(name),
        }
    }

    fn workbook_data(&mut self) -> Result<&WorkbookData, SheetError> {
        match self {
            Workbook::Xlsx(l) => l.workbook_data(),
            Workbook::Ods(l) => l.workbook_data(),
            Workbook::Csv(l) => l.workbook_data(),
        }
    }

    fn into_workbook_data(self) -> Result<WorkbookData, SheetError> {
        match self {
            Workbook::Xlsx(l) => l.into_workbook_data(),
            Workbook::Ods(l) => l.into_workbook_data(),
            Workbook::Csv(l) => l.into_workbook_data(),
        }
    }

    fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Workbook::Xlsx(l) => l.diagnostics(),
            Workbook::Ods(l) => l.diagnostics(),
            Workbook::Csv(l) => l.diagnostics(),
        }
    }
}
