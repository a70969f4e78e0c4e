//! CSV Loader
//!
//! 区切りテキストを1シートのワークブックとして読み込むローダー。
//! 最初のレコードを見出し行とし、シート名は常に`Sheet1`です。

use std::borrow::Cow;
use std::io::Read;

use crate::api::{CsvEncoding, ErrorPolicy};
use crate::archive::SheetSource;
use crate::diagnostics::{Diagnostic, Diagnostics, SheetOutcome};
use crate::error::SheetError;
use crate::loader::{LoadOptions, SheetLoader};
use crate::types::{SheetBuilder, SheetData, SheetIndexNames, WorkbookData};

/// CSVソースのシート名
pub(crate) const CSV_SHEET_NAME: &str = "Sheet1";

const UTF8_BOM: &str = "\u{feff}";

/// CSVローダー
///
/// デフォルトの区切り文字はタブ、文字コードはUTF-8です。
///
/// # 使用例
///
/// ```rust,no_run
/// use sheetzero::{CsvEncoding, CsvLoader, SheetLoader};
///
/// # fn main() -> Result<(), sheetzero::SheetError> {
/// let mut loader = CsvLoader::new("export.csv")
///     .with_delimiter(b';')
///     .with_encoding(CsvEncoding::Latin1);
/// let sheet = loader.sheet(None)?;
/// println!("{} rows", sheet.row_count());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CsvLoader {
    source: SheetSource,
    options: LoadOptions,
    index: SheetIndexNames,
    workbook: WorkbookData,
    diagnostics: Vec<Diagnostic>,
    loaded: bool,
}

impl CsvLoader {
    /// デフォルト設定のローダーを作成（この時点ではファイルを開かない）
    pub fn new<S: Into<SheetSource>>(source: S) -> Self {
        Self::with_options(source.into(), LoadOptions::default())
    }

    pub(crate) fn with_options(source: SheetSource, options: LoadOptions) -> Self {
        Self {
            source,
            options,
            index: SheetIndexNames::from_names([CSV_SHEET_NAME]),
            workbook: WorkbookData::new(),
            diagnostics: Vec::new(),
            loaded: false,
        }
    }

    /// 区切り文字を設定
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.options.csv_delimiter = delimiter;
        self
    }

    /// 文字コードを設定
    pub fn with_encoding(mut self, encoding: CsvEncoding) -> Self {
        self.options.csv_encoding = encoding;
        self
    }

    /// 診断情報の扱いを設定
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.options.policy = policy;
        self
    }

    fn ensure_loaded(&mut self) -> Result<(), SheetError> {
        if !self.loaded {
            let (reader, size) = self.source.open_reader()?;
            self.options.security.check_input_size(size)?;

            let mut diagnostics = Diagnostics::new();
            let data = decode_records(
                reader,
                &self.source.display_name(),
                &self.options,
                &mut diagnostics,
            )?;
            log::debug!(
                "loaded {} ({} rows x {} columns)",
                self.source.display_name(),
                data.row_count(),
                data.column_count()
            );

            self.workbook.add_sheet(CSV_SHEET_NAME, data);
            self.workbook.set_sheet_index_names(self.index.clone());
            self.diagnostics = diagnostics.into_vec();
            self.loaded = true;
        }
        self.options.policy.check(&self.diagnostics)
    }
}

/// バイト列を設定された文字コードで文字列にする
fn decode_field(bytes: &[u8], encoding: CsvEncoding) -> (Cow<'_, str>, bool) {
    match encoding {
        CsvEncoding::Latin1 => (Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()), true),
        CsvEncoding::Utf8 => {
            let text = String::from_utf8_lossy(bytes);
            let valid = matches!(text, Cow::Borrowed(_));
            (text, valid)
        }
    }
}

fn decode_records<R: Read>(
    reader: R,
    member: &str,
    options: &LoadOptions,
    diagnostics: &mut Diagnostics,
) -> Result<SheetData, SheetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.csv_delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let max_columns = options.limits.width_limit() as usize;
    // 見出し行の列数が決まるまでは行数上限のみ
    let mut max_rows = u64::from(options.limits.max_rows);
    let mut builder: Option<SheetBuilder> = None;
    let mut column_limit_reported = false;
    let mut rows = 0usize;

    let mut record = csv::ByteRecord::new();
    let mut number = 0u64;
    while csv_reader.read_byte_record(&mut record)? {
        number += 1;

        let mut valid = true;
        let mut fields: Vec<String> = Vec::with_capacity(record.len());
        for (i, raw) in record.iter().enumerate() {
            let (text, ok) = decode_field(raw, options.csv_encoding);
            valid &= ok;
            let text = if number == 1 && i == 0 {
                text.strip_prefix(UTF8_BOM).unwrap_or(&*text).to_string()
            } else {
                text.into_owned()
            };
            fields.push(text);
        }
        if !valid {
            diagnostics.record(Diagnostic::InvalidText {
                member: member.to_string(),
                record: number,
            });
        }

        if fields.len() > max_columns {
            fields.truncate(max_columns);
            if !column_limit_reported {
                column_limit_reported = true;
                diagnostics.record(Diagnostic::LimitExceeded {
                    member: member.to_string(),
                    message: format!("columns beyond {} were dropped", max_columns),
                });
            }
        }

        match builder.as_mut() {
            None => {
                max_rows = options.limits.rows_for_width(fields.len() as u64);
                builder = Some(SheetBuilder::with_header(fields));
            }
            Some(builder) => {
                if rows as u64 + 1 >= max_rows {
                    diagnostics.record(Diagnostic::LimitExceeded {
                        member: member.to_string(),
                        message: format!("rows beyond {} were dropped", max_rows),
                    });
                    break;
                }
                builder.push_row(fields);
                rows += 1;
            }
        }
    }

    Ok(builder.map(SheetBuilder::finish).unwrap_or_default())
}

impl SheetLoader for CsvLoader {
    fn fingerprint(&self) -> u64 {
        self.source.fingerprint()
    }

    fn sheet_index(&mut self) -> Result<&SheetIndexNames, SheetError> {
        Ok(&self.index)
    }

    fn sheet_outcome(&mut self, name: &str) -> Result<SheetOutcome<'_>, SheetError> {
        if name != CSV_SHEET_NAME {
            return Err(SheetError::SheetNotFound(name.to_string()));
        }
        self.ensure_loaded()?;
        let data = self
            .workbook
            .sheet(CSV_SHEET_NAME)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))?;
        Ok(SheetOutcome::new(data, &self.diagnostics))
    }

    fn workbook_data(&mut self) -> Result<&WorkbookData, SheetError> {
        self.ensure_loaded()?;
        Ok(&self.workbook)
    }

    fn into_workbook_data(mut self) -> Result<WorkbookData, SheetError> {
        self.ensure_loaded()?;
        Ok(self.workbook)
    }

    fn diagnostics(&self) -> &[Diagnostic] {
        &[]
    }
}
