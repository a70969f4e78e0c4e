//! Builder Module
//!
//! Fluent Builder APIを提供し、`SheetReader`インスタンスを段階的に構築する。

use std::io::{BufWriter, Write};

use rayon::prelude::*;

use crate::api::{CsvEncoding, ErrorPolicy, OutputFormat, SheetFormat, SheetSelector};
use crate::archive::SheetSource;
use crate::error::SheetError;
use crate::loader::{CsvLoader, LoadOptions, OdsLoader, SheetLoader, Workbook, XlsxLoader};
use crate::output::write_sheets;
use crate::types::{SheetData, SheetIndexNames, WorkbookData};

/// 読み込み処理の設定を保持する内部構造体
#[derive(Debug, Clone, Default)]
pub(crate) struct ReaderConfig {
    /// ローダーに渡す設定
    pub load: LoadOptions,

    /// シート選択方式
    pub sheet_selector: SheetSelector,

    /// 出力フォーマット
    pub output_format: OutputFormat,
}

/// Fluent Builder APIを提供する構造体
///
/// `SheetReader`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use sheetzero::{ErrorPolicy, ReaderBuilder, SheetSelector};
///
/// # fn main() -> Result<(), sheetzero::SheetError> {
/// let reader = ReaderBuilder::new()
///     .with_sheet_selector(SheetSelector::Index(0))
///     .with_error_policy(ErrorPolicy::Strict)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ReaderBuilder {
    /// 内部設定（構築中）
    config: ReaderConfig,
}

impl ReaderBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 診断情報: 記録して読み込みを継続（`ErrorPolicy::Lenient`）
    /// - 行数上限: 1,048,576行（見出し行を含む）
    /// - 列数上限: 16,384列
    /// - CSV区切り文字: タブ
    /// - CSV文字コード: UTF-8
    /// - シート選択: すべてのシート
    /// - 出力フォーマット: Markdown
    pub fn new() -> Self {
        Self {
            config: ReaderConfig::default(),
        }
    }

    /// 診断情報の扱いを指定する
    ///
    /// # 引数
    ///
    /// * `policy: ErrorPolicy`: `Lenient`（デフォルト）または`Strict`
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.config.load.policy = policy;
        self
    }

    /// 1シートあたりの行数上限（見出し行を含む）を指定する
    ///
    /// 上限を超えた行は切り捨てられ、診断情報が記録されます。
    /// 0を指定すると`build()`時に`SheetError::Config`を返します。
    pub fn with_row_limit(mut self, rows: u32) -> Self {
        self.config.load.limits.max_rows = rows;
        self
    }

    /// 1シートあたりの列数上限を指定する
    pub fn with_column_limit(mut self, columns: u32) -> Self {
        self.config.load.limits.max_columns = columns;
        self
    }

    /// 1シートあたりのセル数上限（見出し行を含む、空きを埋めた後の数）を指定する
    ///
    /// 疎なシートは空きを空文字列で埋めるため、XMLが小さくても展開後は巨大になり得ます。
    /// 上限を超える分の行（列数自体が上限を超える場合は列も）は切り捨てられ、
    /// 診断情報が記録されます。デフォルトは16,777,216セルです。
    pub fn with_cell_limit(mut self, cells: u64) -> Self {
        self.config.load.limits.max_cells = cells;
        self
    }

    /// CSVの区切り文字を指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use sheetzero::ReaderBuilder;
    ///
    /// let builder = ReaderBuilder::new().with_csv_delimiter(b';');
    /// ```
    pub fn with_csv_delimiter(mut self, delimiter: u8) -> Self {
        self.config.load.csv_delimiter = delimiter;
        self
    }

    /// CSVの文字コードを指定する
    pub fn with_csv_encoding(mut self, encoding: CsvEncoding) -> Self {
        self.config.load.csv_encoding = encoding;
        self
    }

    /// 出力対象のシートを選択する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use sheetzero::{ReaderBuilder, SheetSelector};
    ///
    /// // 単一シートを名前で指定
    /// let builder = ReaderBuilder::new()
    ///     .with_sheet_selector(SheetSelector::Name("Resumo".to_string()));
    ///
    /// // 複数シートを指定
    /// let builder = ReaderBuilder::new()
    ///     .with_sheet_selector(SheetSelector::Indices(vec![0, 2]));
    /// ```
    pub fn with_sheet_selector(mut self, selector: SheetSelector) -> Self {
        self.config.sheet_selector = selector;
        self
    }

    /// 出力フォーマットを指定する
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// 設定を検証し、`SheetReader`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(SheetReader)`: 設定が有効な場合
    /// * `Err(SheetError::Config)`: 設定が無効な場合
    ///
    /// # 発生し得るエラー
    ///
    /// * 行数上限、列数上限、セル数上限のいずれかが0
    /// * CSV区切り文字が`"`、`\n`、`\r`のいずれか
    pub fn build(self) -> Result<SheetReader, SheetError> {
        let limits = self.config.load.limits;
        if limits.max_rows == 0 {
            return Err(SheetError::Config(
                "Row limit must be greater than 0".to_string(),
            ));
        }
        if limits.max_columns == 0 {
            return Err(SheetError::Config(
                "Column limit must be greater than 0".to_string(),
            ));
        }
        if limits.max_cells == 0 {
            return Err(SheetError::Config(
                "Cell limit must be greater than 0".to_string(),
            ));
        }

        let delimiter = self.config.load.csv_delimiter;
        if matches!(delimiter, b'"' | b'\n' | b'\r') {
            return Err(SheetError::Config(format!(
                "Invalid CSV delimiter: {:?}",
                char::from(delimiter)
            )));
        }

        Ok(SheetReader {
            config: self.config,
        })
    }
}

/// シートの読み込みと出力を行う構造体
///
/// `ReaderBuilder`で構築された設定を保持し、入力ソースごとにローダーを生成します。
/// ローダー同士は状態を共有しないため、複数のソースを並列に読み込めます。
///
/// # 使用例
///
/// ```rust,no_run
/// use sheetzero::{ReaderBuilder, SheetLoader};
///
/// # fn main() -> Result<(), sheetzero::SheetError> {
/// let reader = ReaderBuilder::new().build()?;
///
/// let mut workbook = reader.open("relatorio.ods")?;
/// let names = workbook.sheet_index()?.clone();
/// for (_, name) in names.iter() {
///     let sheet = workbook.sheet_named(name)?;
///     println!("{}: {} rows", name, sheet.row_count());
/// }
///
/// // Markdownとして標準出力へ
/// reader.export("relatorio.ods", std::io::stdout())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SheetReader {
    config: ReaderConfig,
}

impl SheetReader {
    /// ソースの形式を判定してローダーを生成する
    ///
    /// 形式はパスの拡張子、次にアーカイブの内容から判定します（[`SheetFormat::detect()`]）。
    pub fn open<S: Into<SheetSource>>(&self, source: S) -> Result<Workbook, SheetError> {
        let source = source.into();
        let format = SheetFormat::detect(&source)?;
        log::debug!("opening {} as {:?}", source.display_name(), format);
        Ok(self.open_as(source, format))
    }

    /// 形式を指定してローダーを生成する（この時点ではソースを開かない）
    pub fn open_as<S: Into<SheetSource>>(&self, source: S, format: SheetFormat) -> Workbook {
        let source = source.into();
        let options = self.config.load.clone();
        match format {
            SheetFormat::Xlsx => Workbook::Xlsx(XlsxLoader::with_options(source, options)),
            SheetFormat::Ods => Workbook::Ods(OdsLoader::with_options(source, options)),
            SheetFormat::Csv => Workbook::Csv(CsvLoader::with_options(source, options)),
        }
    }

    /// 複数のソースを並列に読み込む
    ///
    /// ソースごとに独立したローダーを使用し、結果は入力と同じ順序で返します。
    /// 1つのソースの失敗は他のソースの結果に影響しません。
    pub fn load_workbooks<I, S>(&self, sources: I) -> Vec<Result<WorkbookData, SheetError>>
    where
        I: IntoIterator<Item = S>,
        S: Into<SheetSource>,
    {
        let sources: Vec<SheetSource> = sources.into_iter().map(Into::into).collect();
        log::debug!("loading {} workbooks", sources.len());

        sources
            .into_par_iter()
            .map(|source| self.open(source)?.into_workbook_data())
            .collect()
    }

    /// 選択したシートを設定された出力フォーマットで書き出す
    ///
    /// # 引数
    ///
    /// * `source` - 入力ソース
    /// * `output` - 出力先のライター
    pub fn export<S, W>(&self, source: S, mut output: W) -> Result<(), SheetError>
    where
        S: Into<SheetSource>,
        W: Write,
    {
        let mut workbook = self.open(source)?;
        let index = workbook.sheet_index()?.clone();
        let names = self.select_sheets(&index)?;

        let mut writer = BufWriter::new(&mut output);
        if self.config.sheet_selector == SheetSelector::All {
            let data = workbook.into_workbook_data()?;
            let sheets: Vec<(&str, &SheetData)> = data.iter().collect();
            write_sheets(&sheets, self.config.output_format, &mut writer)?;
        } else {
            // 選択したシートのみデコードする
            let mut owned = Vec::with_capacity(names.len());
            for name in names {
                let sheet = workbook.sheet_named(&name)?.clone();
                owned.push((name, sheet));
            }
            let sheets: Vec<(&str, &SheetData)> = owned
                .iter()
                .map(|(name, sheet)| (name.as_str(), sheet))
                .collect();
            write_sheets(&sheets, self.config.output_format, &mut writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// 選択したシートを文字列として書き出す
    pub fn export_to_string<S: Into<SheetSource>>(&self, source: S) -> Result<String, SheetError> {
        let mut buffer = Vec::new();
        self.export(source, &mut buffer)?;

        let result = String::from_utf8(buffer).map_err(|e| {
            SheetError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        Ok(result)
    }

    /// シート選択方式に従って対象シート名を決定する
    fn select_sheets(&self, index: &SheetIndexNames) -> Result<Vec<String>, SheetError> {
        let out_of_range = |i: usize| SheetError::SheetIndexOutOfRange {
            index: i,
            total: index.len(),
        };

        match &self.config.sheet_selector {
            SheetSelector::All => Ok(index.names().to_vec()),

            SheetSelector::Index(i) => index
                .name_at(*i)
                .map(|name| vec![name.to_string()])
                .ok_or_else(|| out_of_range(*i)),

            SheetSelector::Name(name) => {
                if index.index_of(name).is_none() {
                    return Err(SheetError::SheetNotFound(name.clone()));
                }
                Ok(vec![name.clone()])
            }

            SheetSelector::Indices(indices) => indices
                .iter()
                .map(|&i| {
                    index
                        .name_at(i)
                        .map(str::to_string)
                        .ok_or_else(|| out_of_range(i))
                })
                .collect(),

            SheetSelector::Names(names) => {
                for name in names {
                    if index.index_of(name).is_none() {
                        return Err(SheetError::SheetNotFound(name.clone()));
                    }
                }
                Ok(names.clone())
            }
        }
    }
}
