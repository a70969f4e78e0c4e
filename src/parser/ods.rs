//! OpenDocument Table Decoder
//!
//! ODSの`content.xml`を1回のストリーミング走査で解析するモジュール。
//!
//! ODSは連続する同一の行・セルを`table:number-rows-repeated`、
//! `table:number-columns-repeated`属性による繰り返しで表現します。
//! 行ごとのランレングス表現（[`RowRuns`]）を保持し、展開は
//! `(行, 列, 値)`を順に返すイテレーター（[`Expand`]）で行うため、
//! 展開後の行を中間バッファとして確保しません。

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::diagnostics::{Decoded, Diagnostic, Diagnostics};
use crate::parser::xml;
use crate::security::TableLimits;
use crate::types::SheetBuilder;

/// 1行分のランレングス表現（`(値, 繰り返し回数)`の列）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RowRuns {
    runs: Vec<(String, u32)>,
}

impl RowRuns {
    pub fn push(&mut self, value: String, repeat: u32) {
        if repeat > 0 {
            self.runs.push((value, repeat));
        }
    }

    /// 展開後の列数
    pub fn width(&self) -> u64 {
        self.runs.iter().map(|(_, n)| u64::from(*n)).sum()
    }

    /// 行を`repeat`回複製し、各行`width`列分の`(行, 列, 値)`を順に返す
    ///
    /// `width`に満たない位置は空文字列、超えた位置は切り捨てます。
    pub fn expand(&self, repeat: u32, width: usize) -> Expand<'_> {
        Expand {
            runs: &self.runs,
            repeat,
            width,
            row: 0,
            col: 0,
            run: 0,
            offset: 0,
        }
    }
}

/// [`RowRuns::expand()`]が返すイテレーター
#[derive(Debug, Clone)]
pub(crate) struct Expand<'a> {
    runs: &'a [(String, u32)],
    repeat: u32,
    width: usize,
    row: u32,
    col: usize,
    run: usize,
    offset: u32,
}

impl<'a> Iterator for Expand<'a> {
    type Item = (u32, usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.width == 0 || self.row >= self.repeat {
            return None;
        }

        let runs = self.runs;
        let value = loop {
            match runs.get(self.run) {
                Some((value, count)) if self.offset < *count => {
                    self.offset += 1;
                    break value.as_str();
                }
                Some(_) => {
                    self.run += 1;
                    self.offset = 0;
                }
                None => break "",
            }
        };

        let item = (self.row, self.col, value);
        self.col += 1;
        if self.col == self.width {
            self.col = 0;
            self.row += 1;
            self.run = 0;
            self.offset = 0;
        }
        Some(item)
    }
}

/// 解析対象のテーブル
#[derive(Debug, Clone, Copy)]
pub(crate) enum Wanted<'a> {
    /// テーブル名のみ
    Names,
    /// すべてのテーブル
    All,
    /// 指定したテーブルのみ
    Only(&'a [String]),
}

impl Wanted<'_> {
    fn includes(&self, name: &str) -> bool {
        match self {
            Wanted::Names => false,
            Wanted::All => true,
            Wanted::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

/// `content.xml`の解析結果
#[derive(Debug, Default)]
pub(crate) struct OdsContent {
    /// トップレベルのテーブル名（文書順）
    pub names: Vec<String>,
    /// 解析したテーブル
    pub tables: HashMap<String, Decoded>,
}

struct CellState {
    depth: usize,
    repeat: u32,
    text: Option<String>,
    /// 最初の`text:p`の中にいる間はその深さ
    paragraph_depth: Option<usize>,
}

struct RowState {
    depth: usize,
    repeat: u32,
    runs: RowRuns,
    cell: Option<CellState>,
}

struct TableState {
    name: String,
    builder: Option<SheetBuilder>,
    data_rows: u32,
    diagnostics: Diagnostics,
    row_limit_reported: bool,
    col_limit_reported: bool,
}

struct Decoder<'a> {
    member: &'a str,
    limits: TableLimits,
}

impl Decoder<'_> {
    /// 繰り返し回数の属性を読む（省略時は1、不正な値は1として診断情報を記録）
    fn repeat_count(
        &self,
        e: &BytesStart<'_>,
        attr: &[u8],
        diagnostics: &mut Diagnostics,
    ) -> Result<u32, quick_xml::Error> {
        match xml::attr_value(e, attr)? {
            None => Ok(1),
            Some(value) => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => {
                    diagnostics.record(Diagnostic::InvalidRepeatCount {
                        member: self.member.to_string(),
                        value,
                    });
                    Ok(1)
                }
            },
        }
    }

    fn finish_row(&self, table: &mut TableState, row: RowState) {
        let Some(builder) = table.builder.as_mut() else {
            // 最初の行は見出し（行の繰り返しは無視）
            let full_width = row.runs.width();
            let width_limit = self.limits.width_limit();
            if full_width > width_limit && !table.col_limit_reported {
                table.col_limit_reported = true;
                table.diagnostics.record(Diagnostic::LimitExceeded {
                    member: format!("{}#{}", self.member, table.name),
                    message: format!("columns beyond {} were dropped", width_limit),
                });
            }
            let width = full_width.min(width_limit) as usize;
            let header = row
                .runs
                .expand(1, width)
                .map(|(_, _, value)| value.to_string());
            table.builder = Some(SheetBuilder::with_header(header));
            return;
        };

        // 見出し行の分を除いたデータ行の上限（行数とセル数の両方で決まる）
        let max_rows = self.limits.rows_for_width(builder.width() as u64);
        let max_data_rows = u32::try_from(max_rows.saturating_sub(1)).unwrap_or(u32::MAX);
        let remaining = max_data_rows.saturating_sub(table.data_rows);
        let mut repeat = row.repeat;
        if repeat > remaining {
            repeat = remaining;
            if !table.row_limit_reported {
                table.row_limit_reported = true;
                table.diagnostics.record(Diagnostic::LimitExceeded {
                    member: format!("{}#{}", self.member, table.name),
                    message: format!("rows beyond {} were dropped", max_rows),
                });
            }
        }

        for (_, col, value) in row.runs.expand(repeat, builder.width()) {
            builder.push(col, value.to_string());
        }
        table.data_rows += repeat;
    }
}

/// `content.xml`を解析する
///
/// トップレベルの`table:table`要素（空でない`table:name`を持つもの）の名前を文書順に収集し、
/// `wanted`に含まれるテーブルを列指向のシートに組み替えます。
/// 同名のテーブルが複数ある場合は最初のものを採用します。
///
/// - セルの値は最初の直下の`text:p`のテキスト（`text:span`などの子孫を含む）
/// - `text:s`は`text:c`個の空白、`text:tab`はタブ、`text:line-break`は改行
/// - `table:covered-table-cell`も列位置を占める
/// - `table:table-header-rows`、`table:table-row-group`、`table:table-rows`内の行もテーブルの行
/// - 入れ子のテーブルの行は外側のテーブルに含めない
pub(crate) fn decode_content<R: BufRead>(
    reader: &mut Reader<R>,
    member: &str,
    wanted: Wanted<'_>,
    limits: TableLimits,
) -> Result<OdsContent, quick_xml::Error> {
    let decoder = Decoder { member, limits };
    let mut content = OdsContent::default();

    let mut depth = 0usize;
    // 開いている`table:table`要素の深さ
    let mut tables: Vec<usize> = Vec::new();
    let mut table: Option<TableState> = None;
    let mut row: Option<RowState> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => 'start: {
                depth += 1;
                let local = e.local_name();
                let name = local.as_ref();

                if name == b"table" {
                    if tables.is_empty() {
                        let table_name = xml::attr_value(&e, b"name")?.unwrap_or_default();
                        if !table_name.is_empty() {
                            content.names.push(table_name.clone());
                            if wanted.includes(&table_name)
                                && !content.tables.contains_key(&table_name)
                            {
                                table = Some(TableState {
                                    name: table_name,
                                    builder: None,
                                    data_rows: 0,
                                    diagnostics: Diagnostics::new(),
                                    row_limit_reported: false,
                                    col_limit_reported: false,
                                });
                            }
                        }
                    }
                    tables.push(depth);
                    break 'start;
                }

                // 入れ子のテーブルの中、または解析対象外のテーブル
                let Some(current) = table.as_mut() else {
                    break 'start;
                };
                if tables.len() != 1 {
                    break 'start;
                }

                match row.as_mut() {
                    None => {
                        if name == b"table-row" {
                            row = Some(RowState {
                                depth,
                                repeat: decoder.repeat_count(
                                    &e,
                                    b"number-rows-repeated",
                                    &mut current.diagnostics,
                                )?,
                                runs: RowRuns::default(),
                                cell: None,
                            });
                        }
                    }
                    Some(active) => match active.cell.as_mut() {
                        None => {
                            if depth == active.depth + 1
                                && (name == b"table-cell" || name == b"covered-table-cell")
                            {
                                active.cell = Some(CellState {
                                    depth,
                                    repeat: decoder.repeat_count(
                                        &e,
                                        b"number-columns-repeated",
                                        &mut current.diagnostics,
                                    )?,
                                    text: None,
                                    paragraph_depth: None,
                                });
                            }
                        }
                        Some(cell) => match cell.paragraph_depth {
                            None => {
                                if depth == cell.depth + 1 && name == b"p" && cell.text.is_none() {
                                    cell.text = Some(String::new());
                                    cell.paragraph_depth = Some(depth);
                                }
                            }
                            Some(_) => {
                                if let Some(text) = cell.text.as_mut() {
                                    match name {
                                        b"s" => {
                                            let count = xml::attr_value(&e, b"c")?
                                                .and_then(|c| c.trim().parse::<u16>().ok())
                                                .unwrap_or(1);
                                            text.extend(std::iter::repeat(' ').take(count.into()));
                                        }
                                        b"tab" => text.push('\t'),
                                        b"line-break" => text.push('\n'),
                                        _ => {}
                                    }
                                }
                            }
                        },
                    },
                }
            }
            Event::Text(e) => {
                if let Some(cell) = row.as_mut().and_then(|r| r.cell.as_mut()) {
                    if cell.paragraph_depth.is_some() && tables.len() == 1 {
                        if let Some(text) = cell.text.as_mut() {
                            text.push_str(&xml::text(&e)?);
                        }
                    }
                }
            }
            Event::CData(e) => {
                if let Some(cell) = row.as_mut().and_then(|r| r.cell.as_mut()) {
                    if cell.paragraph_depth.is_some() && tables.len() == 1 {
                        if let Some(text) = cell.text.as_mut() {
                            text.push_str(&xml::cdata(&e));
                        }
                    }
                }
            }
            Event::End(_) => {
                if tables.last() == Some(&depth) {
                    tables.pop();
                    if tables.is_empty() {
                        row = None;
                        if let Some(done) = table.take() {
                            let data = done.builder.map(SheetBuilder::finish).unwrap_or_default();
                            log::debug!(
                                "decoded table {} in {} ({} rows, {} columns)",
                                done.name,
                                member,
                                data.row_count(),
                                data.column_count()
                            );
                            content
                                .tables
                                .insert(done.name, Decoded::new(data, done.diagnostics));
                        }
                    }
                } else if tables.len() == 1 {
                    if let Some(active) = row.as_mut() {
                        let mut cell_done = false;
                        if let Some(cell) = active.cell.as_mut() {
                            if cell.paragraph_depth == Some(depth) {
                                cell.paragraph_depth = None;
                            } else if cell.depth == depth {
                                cell_done = true;
                            }
                        }

                        if cell_done {
                            if let Some(cell) = active.cell.take() {
                                active
                                    .runs
                                    .push(cell.text.unwrap_or_default(), cell.repeat);
                            }
                        } else if active.depth == depth {
                            if let (Some(done), Some(current)) = (row.take(), table.as_mut()) {
                                decoder.finish_row(current, done);
                            }
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(content)
}
