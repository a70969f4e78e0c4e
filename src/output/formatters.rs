//! Output Formatters Implementation
//!
//! 各出力フォーマットの実装を提供するモジュール。

use std::io::Write;

use unicode_width::UnicodeWidthStr;

use crate::error::SheetError;
use crate::types::SheetData;

/// Markdown形式のフォーマッター
///
/// 列幅は表示幅（全角文字は2）で揃え、最小幅は3文字です。
/// セル内の`|`は`\|`に、改行は`<br>`に置き換えます。
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    pub fn render<W: Write>(&self, sheet: &SheetData, writer: &mut W) -> Result<(), SheetError> {
        if sheet.column_count() == 0 {
            return Ok(());
        }

        let header: Vec<String> = sheet.header().into_iter().map(escape_markdown).collect();
        let rows: Vec<Vec<String>> = sheet
            .rows()
            .map(|row| row.into_iter().map(escape_markdown).collect())
            .collect();

        // 1. 列幅の計算
        let mut col_widths = vec![3; header.len()];
        for line in std::iter::once(&header).chain(rows.iter()) {
            for (col_idx, cell) in line.iter().enumerate() {
                col_widths[col_idx] = col_widths[col_idx].max(cell.width());
            }
        }

        // 2. 見出し行と区切り行
        write_markdown_row(writer, &header, &col_widths)?;
        writeln!(writer, "{}", separator(&col_widths))?;

        // 3. データ行
        for row in &rows {
            write_markdown_row(writer, row, &col_widths)?;
        }

        writer.flush()?;
        Ok(())
    }
}

fn write_markdown_row<W: Write>(
    writer: &mut W,
    cells: &[String],
    col_widths: &[usize],
) -> Result<(), SheetError> {
    write!(writer, "|")?;
    for (cell, &width) in cells.iter().zip(col_widths) {
        // 左揃え、残りは表示幅に基づいて空白で埋める
        let padding = width.saturating_sub(cell.width());
        write!(writer, " {}{} |", cell, " ".repeat(padding))?;
    }
    writeln!(writer)?;
    Ok(())
}

/// 区切り行（セルの前後の空白1文字ずつ + 列幅分のハイフン）
fn separator(col_widths: &[usize]) -> String {
    let mut line = String::from("|");
    for &width in col_widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('|');
    }
    line
}

fn escape_markdown(content: &str) -> String {
    content
        .trim()
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace(['\n', '\r'], "<br>")
}

/// JSON形式のフォーマッター
///
/// `{ 列見出し: [値, ...] }`として出力します。
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn render<W: Write>(&self, sheet: &SheetData, writer: &mut W) -> Result<(), SheetError> {
        serde_json::to_writer_pretty(&mut *writer, sheet)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// CSV形式のフォーマッター
///
/// 1行目は列見出しです。フィールドのクォートは`csv`クレートに任せます。
pub struct CsvFormatter;

impl CsvFormatter {
    pub fn render<W: Write>(&self, sheet: &SheetData, writer: &mut W) -> Result<(), SheetError> {
        if sheet.column_count() == 0 {
            return Ok(());
        }

        let mut csv_writer = csv::Writer::from_writer(&mut *writer);
        csv_writer.write_record(sheet.header())?;
        for row in sheet.rows() {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
