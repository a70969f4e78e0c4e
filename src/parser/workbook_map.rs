//! Workbook Map Parser
//!
//! `xl/workbook.xml`の`sheets/sheet`要素から、シート名とワークシートXMLの対応を構築する。

use std::io::BufRead;

use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::parser::{worksheet_path, xml};
use crate::types::SheetIndexNames;

/// シート定義1件
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SheetEntry {
    pub sheet_id: String,
    pub path: String,
}

/// シート名からワークシートXMLへの順序付き対応表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WorkbookMap {
    entries: IndexMap<String, SheetEntry>,
}

impl WorkbookMap {
    pub fn get(&self, name: &str) -> Option<&SheetEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn sheet_index(&self) -> SheetIndexNames {
        SheetIndexNames::from_names(self.entries.keys().cloned())
    }
}

/// ワークブック定義を解析する
///
/// `name`と`sheetId`の両方を持つ`sheet`要素のみを採用します。
/// どちらかを欠く要素はスキップし、診断情報を記録します。
/// 同名のシートが複数ある場合は、最初の位置のまま後の定義で置き換えます。
pub(crate) fn parse_workbook_map<R: BufRead>(
    reader: &mut Reader<R>,
    member: &str,
    diagnostics: &mut Diagnostics,
) -> Result<WorkbookMap, quick_xml::Error> {
    let mut map = WorkbookMap::default();
    let mut depth = 0usize;
    let mut sheets_depth: Option<usize> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"sheets" if sheets_depth.is_none() => sheets_depth = Some(depth),
                    b"sheet" if sheets_depth.map(|d| d + 1) == Some(depth) => {
                        let name = xml::attr_value(&e, b"name")?.filter(|n| !n.is_empty());
                        let sheet_id = xml::attr_value(&e, b"sheetId")?.filter(|s| !s.is_empty());
                        match (name, sheet_id) {
                            (Some(name), Some(sheet_id)) => {
                                let path = worksheet_path(&sheet_id);
                                map.entries.insert(name, SheetEntry { sheet_id, path });
                            }
                            (name, _) => diagnostics.record(Diagnostic::SkippedSheetEntry {
                                member: member.to_string(),
                                reason: match name {
                                    Some(name) => format!("sheet '{}' has no sheetId", name),
                                    None => "sheet has no name".to_string(),
                                },
                            }),
                        }
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                if sheets_depth == Some(depth) {
                    sheets_depth = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(map)
}
