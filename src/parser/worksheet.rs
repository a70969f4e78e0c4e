//! Worksheet Decoder
//!
//! `xl/worksheets/sheet{N}.xml`の行指向のセルを読み取り、列指向の[`SheetData`]に組み替える。
//!
//! 1. 行の走査: `row`要素の`r`属性（省略時は1）を0始まりの行位置に変換する。
//!    欠番は許容し、同じ行番号が再び現れた場合は後の行で置き換える。
//! 2. セルの走査: `c`要素の`r`属性から列位置を求め、`t`属性に従って値を文字列化する。
//! 3. 組み替え: 行0を見出し（`max_col + 1`列）とし、行`1..=max_row`をデータとして出力する。

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::coord::column_index;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::parser::xml;
use crate::security::TableLimits;
use crate::types::{SheetBuilder, SheetData};

/// 読み取り中の行
enum RowState {
    Outside,
    /// 行番号が不正、または上限を超えた行（セルは読み飛ばす）
    Skipped,
    Active {
        index: u32,
        cells: HashMap<u32, String>,
    },
}

/// 読み取り中のセル
struct CellState {
    reference: String,
    col: u32,
    cell_type: Option<String>,
    /// セルからの相対パス
    path: Vec<Vec<u8>>,
    value: String,
    inline_direct: Option<String>,
    inline_runs: String,
}

impl CellState {
    fn push_text(&mut self, text: &str) {
        match self.path.as_slice() {
            [v] if v.as_slice() == b"v" => self.value.push_str(text),
            [is, t] if is.as_slice() == b"is" && t.as_slice() == b"t" => {
                if let Some(direct) = self.inline_direct.as_mut() {
                    direct.push_str(text);
                }
            }
            [is, r, t]
                if is.as_slice() == b"is" && r.as_slice() == b"r" && t.as_slice() == b"t" =>
            {
                self.inline_runs.push_str(text)
            }
            _ => {}
        }
    }

    fn inline_text(&mut self) -> String {
        self.inline_direct
            .take()
            .unwrap_or_else(|| std::mem::take(&mut self.inline_runs))
    }
}

/// セル値の文字列化
///
/// 共有文字列が解決できない場合は`None`を返します。
pub(crate) fn coerce_value(
    cell_type: Option<&str>,
    text: &str,
    shared_strings: &[String],
) -> Option<String> {
    match cell_type {
        Some("s") => {
            if text.is_empty() {
                return Some(String::new());
            }
            if !text.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            text.parse::<usize>()
                .ok()
                .and_then(|i| shared_strings.get(i))
                .cloned()
        }
        Some("n") | None => Some(format_number(text)),
        _ => Some(text.to_string()),
    }
}

/// 数値セルの文字列化
///
/// 整数値は小数部なし（`10.0` → `"10"`）、それ以外は最短の表現（`"10.5"`）。
/// 解析できない場合は元のテキストをそのまま返します。
fn format_number(text: &str) -> String {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => {
            if value == 0.0 {
                "0".to_string()
            } else if value.fract() == 0.0 {
                format!("{:.0}", value)
            } else {
                value.to_string()
            }
        }
        _ => text.to_string(),
    }
}

/// 行要素の`r`属性を0始まりの行位置に変換
fn row_index(attr: Option<&str>) -> Option<u32> {
    match attr {
        None => Some(0),
        Some(value) => value
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|r| r.checked_sub(1)),
    }
}

struct Decoder<'a> {
    member: &'a str,
    shared_strings: &'a [String],
    limits: TableLimits,
    rows: HashMap<u32, HashMap<u32, String>>,
    max_row: u32,
    max_col: u32,
    row_limit_reported: bool,
    col_limit_reported: bool,
}

impl<'a> Decoder<'a> {
    fn start_row(
        &mut self,
        e: &BytesStart<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Result<RowState, quick_xml::Error> {
        let attr = xml::attr_value(e, b"r")?;
        let index = match row_index(attr.as_deref()) {
            Some(index) => index,
            None => {
                diagnostics.record(Diagnostic::InvalidRowNumber {
                    member: self.member.to_string(),
                    value: attr.unwrap_or_default(),
                });
                return Ok(RowState::Skipped);
            }
        };

        if index >= self.limits.max_rows {
            if !self.row_limit_reported {
                self.row_limit_reported = true;
                diagnostics.record(Diagnostic::LimitExceeded {
                    member: self.member.to_string(),
                    message: format!("rows beyond {} were dropped", self.limits.max_rows),
                });
            }
            return Ok(RowState::Skipped);
        }

        self.max_row = self.max_row.max(index);
        Ok(RowState::Active {
            index,
            cells: HashMap::new(),
        })
    }

    fn start_cell(
        &mut self,
        e: &BytesStart<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<CellState>, quick_xml::Error> {
        let reference = match xml::attr_value(e, b"r")? {
            Some(r) if !r.is_empty() => r,
            _ => return Ok(None),
        };

        let col = match column_index(&reference) {
            Ok(col) => col - 1,
            Err(_) => {
                diagnostics.record(Diagnostic::InvalidCoordinate {
                    member: self.member.to_string(),
                    reference,
                });
                return Ok(None);
            }
        };

        if col >= self.limits.max_columns {
            if !self.col_limit_reported {
                self.col_limit_reported = true;
                diagnostics.record(Diagnostic::LimitExceeded {
                    member: self.member.to_string(),
                    message: format!("columns beyond {} were dropped", self.limits.max_columns),
                });
            }
            return Ok(None);
        }

        self.max_col = self.max_col.max(col);
        Ok(Some(CellState {
            reference,
            col,
            cell_type: xml::attr_value(e, b"t")?,
            path: Vec::new(),
            value: String::new(),
            inline_direct: None,
            inline_runs: String::new(),
        }))
    }

    fn finish_cell(&self, mut cell: CellState, diagnostics: &mut Diagnostics) -> (u32, String) {
        let value = if cell.cell_type.as_deref() == Some("inlineStr") {
            cell.inline_text()
        } else {
            match coerce_value(cell.cell_type.as_deref(), &cell.value, self.shared_strings) {
                Some(value) => value,
                None => {
                    diagnostics.record(Diagnostic::UnresolvedSharedString {
                        member: self.member.to_string(),
                        reference: cell.reference.clone(),
                        index: cell.value.clone(),
                    });
                    String::new()
                }
            }
        };
        (cell.col, value)
    }

    /// 見出し行と`1..=max_row`のデータ行に組み替える
    ///
    /// 空きを埋めた後のセル数が上限を超える場合は、列と行を切り詰めて
    /// 診断情報を1件記録します。
    fn pivot(mut self, diagnostics: &mut Diagnostics) -> SheetData {
        if self.rows.is_empty() {
            return SheetData::new();
        }

        let full_width = u64::from(self.max_col) + 1;
        let width = full_width.min(self.limits.width_limit());
        let full_rows = u64::from(self.max_row) + 1;
        let rows = full_rows.min(self.limits.rows_for_width(width)).max(1);
        if width < full_width || rows < full_rows {
            diagnostics.record(Diagnostic::LimitExceeded {
                member: self.member.to_string(),
                message: format!(
                    "{} x {} cells exceed the limit of {} cells; kept {} x {}",
                    full_rows, full_width, self.limits.max_cells, rows, width
                ),
            });
        }

        // どちらも元の`u32`の値以下
        let width = width as u32;
        let last_row = (rows - 1) as u32;

        let mut header_row = self.rows.remove(&0).unwrap_or_default();
        let header = (0..width).map(|c| header_row.remove(&c).unwrap_or_default());
        let mut builder = SheetBuilder::with_header(header);

        for r in 1..=last_row {
            let mut cells = self.rows.remove(&r).unwrap_or_default();
            builder.push_row((0..width).map(|c| cells.remove(&c).unwrap_or_default()));
        }

        builder.finish()
    }
}

/// ワークシートXMLを解析し、列指向のシートに組み替える
///
/// 共有文字列が解決できないセル、座標が不正なセル、上限を超えたセルは
/// 診断情報を記録したうえで空文字列またはスキップとして扱います。
pub(crate) fn decode_worksheet<R: BufRead>(
    reader: &mut Reader<R>,
    member: &str,
    shared_strings: &[String],
    limits: TableLimits,
    diagnostics: &mut Diagnostics,
) -> Result<SheetData, quick_xml::Error> {
    let mut decoder = Decoder {
        member,
        shared_strings,
        limits,
        rows: HashMap::new(),
        max_row: 0,
        max_col: 0,
        row_limit_reported: false,
        col_limit_reported: false,
    };

    let mut depth = 0usize;
    let mut sheet_data_depth: Option<usize> = None;
    let mut row = RowState::Outside;
    let mut cell: Option<CellState> = None;
    let mut skipped_cell_depth: Option<usize> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                if skipped_cell_depth.is_some() {
                    // スキップ中のセルの子要素
                } else if let Some(current) = cell.as_mut() {
                    let name = e.local_name().as_ref().to_vec();
                    if name == b"t"
                        && current.path.len() == 1
                        && current.path[0] == b"is"
                        && current.inline_direct.is_none()
                    {
                        current.inline_direct = Some(String::new());
                    }
                    current.path.push(name);
                } else {
                    match e.local_name().as_ref() {
                        b"sheetData" if sheet_data_depth.is_none() => {
                            sheet_data_depth = Some(depth)
                        }
                        b"row"
                            if matches!(row, RowState::Outside)
                                && sheet_data_depth.map(|d| d + 1) == Some(depth) =>
                        {
                            row = decoder.start_row(&e, diagnostics)?;
                        }
                        b"c" if sheet_data_depth.map(|d| d + 2) == Some(depth) => match row {
                            RowState::Active { .. } => {
                                match decoder.start_cell(&e, diagnostics)? {
                                    Some(state) => cell = Some(state),
                                    None => skipped_cell_depth = Some(depth),
                                }
                            }
                            _ => skipped_cell_depth = Some(depth),
                        },
                        _ => {}
                    }
                }
            }
            Event::Text(e) => {
                if let Some(current) = cell.as_mut() {
                    current.push_text(&xml::text(&e)?);
                }
            }
            Event::CData(e) => {
                if let Some(current) = cell.as_mut() {
                    current.push_text(&xml::cdata(&e));
                }
            }
            Event::End(_) => {
                if skipped_cell_depth == Some(depth) {
                    skipped_cell_depth = None;
                } else if skipped_cell_depth.is_some() {
                    // スキップ中のセルの子要素
                } else if let Some(current) = cell.as_mut() {
                    if current.path.pop().is_none() {
                        if let Some(done) = cell.take() {
                            let (col, value) = decoder.finish_cell(done, diagnostics);
                            if let RowState::Active { cells, .. } = &mut row {
                                cells.insert(col, value);
                            }
                        }
                    }
                } else if sheet_data_depth.map(|d| d + 1) == Some(depth) {
                    // 行の終了（同じ行番号は後の行で置き換える）
                    if let RowState::Active { index, cells } =
                        std::mem::replace(&mut row, RowState::Outside)
                    {
                        decoder.rows.insert(index, cells);
                    }
                } else if sheet_data_depth == Some(depth) {
                    sheet_data_depth = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    log::debug!(
        "decoded worksheet {} ({} rows, {} columns)",
        member,
        decoder.max_row,
        decoder.max_col + 1
    );

    Ok(decoder.pivot(diagnostics))
}
