//! Output Format Module
//!
//! Strategy Patternによる出力フォーマットの抽象化を提供するモジュール。

mod formatters;

use std::io::Write;

use indexmap::IndexMap;

use crate::api::OutputFormat;
use crate::error::SheetError;
use crate::types::SheetData;

pub use formatters::*;

/// 出力フォーマッター（Strategy Pattern）
#[derive(Debug, Clone, Copy)]
pub(crate) enum OutputFormatter {
    Markdown,
    Json,
    Csv,
}

impl OutputFormatter {
    /// 出力フォーマットからフォーマッターを生成
    pub fn from_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Markdown => OutputFormatter::Markdown,
            OutputFormat::Json => OutputFormatter::Json,
            OutputFormat::Csv => OutputFormatter::Csv,
        }
    }

    /// シートを指定されたフォーマットで出力する
    pub fn render<W: Write>(&self, sheet: &SheetData, writer: &mut W) -> Result<(), SheetError> {
        match self {
            OutputFormatter::Markdown => MarkdownFormatter.render(sheet, writer),
            OutputFormatter::Json => JsonFormatter.render(sheet, writer),
            OutputFormatter::Csv => CsvFormatter.render(sheet, writer),
        }
    }
}

/// 1シートを出力する
///
/// # 引数
///
/// * `sheet` - 出力するシート
/// * `format` - 出力フォーマット
/// * `writer` - 出力先のライター
///
/// # 使用例
///
/// ```rust
/// use sheetzero::{write_sheet, OutputFormat, SheetData};
///
/// # fn main() -> Result<(), sheetzero::SheetError> {
/// let sheet = SheetData::from_columns(vec![
///     ("Nome".to_string(), vec!["Maria".to_string()]),
/// ])?;
/// let mut output = Vec::new();
/// write_sheet(&sheet, OutputFormat::Csv, &mut output)?;
/// assert_eq!(output, b"Nome\nMaria\n");
/// # Ok(())
/// # }
/// ```
pub fn write_sheet<W: Write>(
    sheet: &SheetData,
    format: OutputFormat,
    writer: &mut W,
) -> Result<(), SheetError> {
    OutputFormatter::from_format(format).render(sheet, writer)
}

/// 複数シートを1つの出力にまとめる
///
/// - Markdown: シートごとに`# シート名`見出しを付け、`---`で区切る
/// - CSV: シートごとに`# Sheet: シート名`のコメント行を付ける
/// - JSON: シート名をキーとする1つのオブジェクト
pub(crate) fn write_sheets<W: Write>(
    sheets: &[(&str, &SheetData)],
    format: OutputFormat,
    writer: &mut W,
) -> Result<(), SheetError> {
    if format == OutputFormat::Json {
        let object: IndexMap<&str, &SheetData> = sheets.iter().copied().collect();
        serde_json::to_writer_pretty(&mut *writer, &object)?;
        writeln!(writer)?;
        writer.flush()?;
        return Ok(());
    }

    let formatter = OutputFormatter::from_format(format);
    for (sheet_idx, (name, sheet)) in sheets.iter().enumerate() {
        // シート間の区切り
        if sheet_idx > 0 {
            if format == OutputFormat::Markdown {
                writeln!(writer, "\n---\n")?;
            } else {
                writeln!(writer)?;
            }
        }

        if format == OutputFormat::Markdown {
            writeln!(writer, "# {}\n", name)?;
        } else {
            writeln!(writer, "# Sheet: {}\n", name)?;
        }

        formatter.render(sheet, writer)?;
    }

    writer.flush()?;
    Ok(())
}
