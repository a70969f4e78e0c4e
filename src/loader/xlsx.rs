//! XLSX Loader
//!
//! Office Open XMLのアーカイブから直接シートを読み込むローダー。

use std::collections::HashMap;

use crate::api::ErrorPolicy;
use crate::archive::{Archive, SheetSource};
use crate::diagnostics::{Decoded, Diagnostic, Diagnostics, SheetOutcome};
use crate::error::SheetError;
use crate::loader::{LoadOptions, SheetLoader};
use crate::parser::shared_strings::parse_shared_strings;
use crate::parser::workbook_map::{parse_workbook_map, WorkbookMap};
use crate::parser::worksheet::decode_worksheet;
use crate::parser::{xml, XLSX_SHARED_STRINGS, XLSX_WORKBOOK};
use crate::types::{SheetData, SheetIndexNames, WorkbookData};

/// ワークブック定義と共有文字列テーブル
#[derive(Debug)]
struct Metadata {
    map: WorkbookMap,
    index: SheetIndexNames,
    shared_strings: Vec<String>,
    /// 共有文字列テーブルの診断情報（各シートに引き継ぐ）
    shared_strings_diagnostics: Vec<Diagnostic>,
}

/// XLSXローダー
///
/// 初回アクセス時に`xl/workbook.xml`と`xl/sharedStrings.xml`を読み込み、
/// 要求されたシートのワークシートXMLを都度デコードしてキャッシュします。
///
/// # 使用例
///
/// ```rust,no_run
/// use sheetzero::{SheetLoader, XlsxLoader};
///
/// # fn main() -> Result<(), sheetzero::SheetError> {
/// let mut loader = XlsxLoader::new("vendas.xlsx");
/// let sheet = loader.sheet_named("Resumo")?;
/// for row in sheet.rows() {
///     println!("{}", row.join(" | "));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct XlsxLoader {
    source: SheetSource,
    options: LoadOptions,
    metadata: Option<Metadata>,
    workbook: WorkbookData,
    sheet_diagnostics: HashMap<String, Vec<Diagnostic>>,
    diagnostics: Vec<Diagnostic>,
    complete: bool,
}

impl XlsxLoader {
    /// デフォルト設定のローダーを作成（この時点ではファイルを開かない）
    pub fn new<S: Into<SheetSource>>(source: S) -> Self {
        Self::with_options(source.into(), LoadOptions::default())
    }

    pub(crate) fn with_options(source: SheetSource, options: LoadOptions) -> Self {
        Self {
            source,
            options,
            metadata: None,
            workbook: WorkbookData::new(),
            sheet_diagnostics: HashMap::new(),
            diagnostics: Vec::new(),
            complete: false,
        }
    }

    /// 診断情報の扱いを設定
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.options.policy = policy;
        self
    }

    /// ワークブック定義と共有文字列テーブルを読み込む（1回のアーカイブ操作）
    fn ensure_metadata(&mut self) -> Result<&Metadata, SheetError> {
        if self.metadata.is_none() {
            let mut archive = Archive::open(&self.source, &self.options.security)?;
            let mut diagnostics = Diagnostics::new();

            let map = match archive.read_xml_member(XLSX_WORKBOOK)? {
                Some(mut member) => parse_workbook_map(
                    &mut member.reader,
                    &member.path,
                    &mut diagnostics,
                )
                .map_err(|e| xml::fatal(XLSX_WORKBOOK, e))?,
                None => {
                    return Err(SheetError::RequiredMemberMissing {
                        member: XLSX_WORKBOOK.to_string(),
                    })
                }
            };

            // 共有文字列テーブルの欠落・破損は読み込みを中断しない
            let mut shared_diagnostics = Diagnostics::new();
            let shared_strings = match archive.read_xml_member(XLSX_SHARED_STRINGS) {
                Ok(Some(mut member)) => match parse_shared_strings(&mut member.reader) {
                    Ok(strings) => strings,
                    Err(e) => {
                        shared_diagnostics.record(xml::degraded(XLSX_SHARED_STRINGS, e));
                        Vec::new()
                    }
                },
                Ok(None) => Vec::new(),
                Err(e) => {
                    shared_diagnostics.record(Diagnostic::MalformedXml {
                        member: XLSX_SHARED_STRINGS.to_string(),
                        message: e.to_string(),
                    });
                    Vec::new()
                }
            };

            log::debug!(
                "loaded workbook map of {} ({} sheets, {} shared strings)",
                self.source.display_name(),
                map.len(),
                shared_strings.len()
            );

            let shared_strings_diagnostics = shared_diagnostics.into_vec();
            self.diagnostics = diagnostics.into_vec();
            self.diagnostics
                .extend(shared_strings_diagnostics.iter().cloned());
            self.metadata = Some(Metadata {
                index: map.sheet_index(),
                map,
                shared_strings,
                shared_strings_diagnostics,
            });
        }

        self.options.policy.check(&self.diagnostics)?;
        self.metadata
            .as_ref()
            .ok_or_else(|| SheetError::RequiredMemberMissing {
                member: XLSX_WORKBOOK.to_string(),
            })
    }

    /// キャッシュにないシートをまとめてデコードする（1回のアーカイブ操作）
    fn decode_sheets(&mut self, names: &[String]) -> Result<(), SheetError> {
        self.ensure_metadata()?;
        let Some(metadata) = self.metadata.as_ref() else {
            return Ok(());
        };

        let pending: Vec<&String> = names
            .iter()
            .filter(|name| !self.workbook.contains(name))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let mut archive = Archive::open(&self.source, &self.options.security)?;
        let mut decoded: Vec<(String, Decoded)> = Vec::with_capacity(pending.len());

        for name in pending {
            let entry = metadata
                .map
                .get(name)
                .ok_or_else(|| SheetError::SheetNotFound(name.clone()))?;

            let mut diagnostics = Diagnostics::new();
            diagnostics.inherit(&metadata.shared_strings_diagnostics);

            // ワークシートの欠落・破損・読み出し失敗はそのシートだけを空にする
            let data = match archive.read_xml_member(&entry.path) {
                Ok(None) => {
                    diagnostics.record(Diagnostic::MemberMissing {
                        member: entry.path.clone(),
                    });
                    SheetData::new()
                }
                Ok(Some(mut member)) => match decode_worksheet(
                    &mut member.reader,
                    &entry.path,
                    &metadata.shared_strings,
                    self.options.limits,
                    &mut diagnostics,
                ) {
                    Ok(data) => data,
                    Err(e) => {
                        diagnostics.record(xml::degraded(&entry.path, e));
                        SheetData::new()
                    }
                },
                Err(e) => {
                    diagnostics.record(Diagnostic::MalformedXml {
                        member: entry.path.clone(),
                        message: e.to_string(),
                    });
                    SheetData::new()
                }
            };
            decoded.push((name.clone(), Decoded::new(data, diagnostics)));
        }

        for (name, result) in decoded {
            self.sheet_diagnostics.insert(name.clone(), result.diagnostics);
            self.workbook.add_sheet(name, result.data);
        }
        Ok(())
    }
}

impl SheetLoader for XlsxLoader {
    fn fingerprint(&self) -> u64 {
        self.source.fingerprint()
    }

    fn sheet_index(&mut self) -> Result<&SheetIndexNames, SheetError> {
        Ok(&self.ensure_metadata()?.index)
    }

    fn sheet_outcome(&mut self, name: &str) -> Result<SheetOutcome<'_>, SheetError> {
        if self.ensure_metadata()?.map.get(name).is_none() {
            return Err(SheetError::SheetNotFound(name.to_string()));
        }
        self.decode_sheets(&[name.to_string()])?;

        let diagnostics = self
            .sheet_diagnostics
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        self.options.policy.check(diagnostics)?;

        let data = self
            .workbook
            .sheet(name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))?;
        Ok(SheetOutcome::new(data, diagnostics))
    }

    fn workbook_data(&mut self) -> Result<&WorkbookData, SheetError> {
        if !self.complete {
            let index = self.ensure_metadata()?.index.clone();
            self.decode_sheets(index.names())?;
            self.workbook.reorder(&index);
            self.workbook.set_sheet_index_names(index);
            self.complete = true;
        }

        self.options.policy.check(&self.diagnostics)?;
        for name in self.workbook.sheet_index_names().names() {
            if let Some(diagnostics) = self.sheet_diagnostics.get(name) {
                self.options.policy.check(diagnostics)?;
            }
        }
        Ok(&self.workbook)
    }

    fn into_workbook_data(mut self) -> Result<WorkbookData, SheetError> {
        self.workbook_data()?;
        Ok(self.workbook)
    }

    fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_xlsx(members: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options = FileOptions::default().compression_method(CompressionMethod::Stored);
            for (name, content) in members {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer
    }

    /// メンバーの圧縮方式を書き換える（ローカルヘッダーと中央ディレクトリの両方）
    fn patch_compression_method(buffer: &mut [u8], name: &str, method: u16) {
        let name = name.as_bytes();
        let mut patched = 0;
        for pos in 0..buffer.len().saturating_sub(name.len()) {
            if &buffer[pos..pos + name.len()] != name {
                continue;
            }
            // ローカルファイルヘッダー: 署名から30バイト後に名前、圧縮方式は+8
            if pos >= 30 && buffer[pos - 30..pos - 26] == [0x50, 0x4b, 0x03, 0x04] {
                buffer[pos - 22..pos - 20].copy_from_slice(&method.to_le_bytes());
                patched += 1;
            }
            // 中央ディレクトリ: 署名から46バイト後に名前、圧縮方式は+10
            if pos >= 46 && buffer[pos - 46..pos - 42] == [0x50, 0x4b, 0x01, 0x02] {
                buffer[pos - 36..pos - 34].copy_from_slice(&method.to_le_bytes());
                patched += 1;
            }
        }
        assert_eq!(patched, 2);
    }

    const WORKBOOK: &str = r#"<workbook><sheets>
        <sheet name="Dados" sheetId="1"/>
        <sheet name="Vazia" sheetId="2"/>
    </sheets></workbook>"#;

    const SHARED: &str = r#"<sst><si><t>Nome</t></si><si><t>Maria</t></si></sst>"#;

    const SHEET1: &str = r#"<worksheet><sheetData>
        <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="str"><v>Valor</v></c></row>
        <row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>10</v></c></row>
    </sheetData></worksheet>"#;

    #[test]
    fn test_sheet_and_missing_member() {
        let bytes = build_xlsx(&[
            (XLSX_WORKBOOK, WORKBOOK),
            (XLSX_SHARED_STRINGS, SHARED),
            ("xl/worksheets/sheet1.xml", SHEET1),
        ]);
        let mut loader = XlsxLoader::new(bytes);

        let index = loader.sheet_index().unwrap();
        assert_eq!(index.names(), &["Dados".to_string(), "Vazia".to_string()]);

        let outcome = loader.sheet_outcome("Dados").unwrap();
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.data().row(0), Some(vec!["Maria", "10"]));

        // sheet2.xmlは存在しない
        let outcome = loader.sheet_outcome("Vazia").unwrap();
        assert!(outcome.is_degraded());
        assert!(outcome.data().is_empty());
        assert!(matches!(
            outcome.diagnostics(),
            [Diagnostic::MemberMissing { member }] if member == "xl/worksheets/sheet2.xml"
        ));
    }

    #[test]
    fn test_unknown_sheet_and_ordinal() {
        let bytes = build_xlsx(&[(XLSX_WORKBOOK, WORKBOOK)]);
        let mut loader = XlsxLoader::new(bytes);
        assert!(matches!(
            loader.sheet_named("Nope"),
            Err(SheetError::SheetNotFound(ref n)) if n == "Nope"
        ));
        assert!(matches!(
            loader.sheet_at(2),
            Err(SheetError::SheetIndexOutOfRange { index: 2, total: 2 })
        ));
    }

    #[test]
    fn test_missing_workbook_is_fatal() {
        let bytes = build_xlsx(&[("xl/worksheets/sheet1.xml", SHEET1)]);
        let mut loader = XlsxLoader::new(bytes);
        assert!(matches!(
            loader.sheet_index(),
            Err(SheetError::RequiredMemberMissing { ref member }) if member == XLSX_WORKBOOK
        ));
    }

    #[test]
    fn test_malformed_workbook_is_fatal() {
        let bytes = build_xlsx(&[(XLSX_WORKBOOK, "<workbook><sheets></workbook>")]);
        let mut loader = XlsxLoader::new(bytes);
        assert!(matches!(
            loader.workbook_data(),
            Err(SheetError::MalformedXml { .. })
        ));
    }

    #[test]
    fn test_malformed_shared_strings_degrade() {
        let bytes = build_xlsx(&[
            (XLSX_WORKBOOK, WORKBOOK),
            (XLSX_SHARED_STRINGS, "<sst><si><t>Nome</si></sst>"),
            ("xl/worksheets/sheet1.xml", SHEET1),
        ]);
        let mut loader = XlsxLoader::new(bytes);
        let outcome = loader.sheet_outcome("Dados").unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.data().header(), vec!["Col1", "Valor"]);
        assert!(matches!(
            outcome.diagnostics()[0],
            Diagnostic::MalformedXml { .. }
        ));
        assert_eq!(loader.diagnostics().len(), 1);
    }

    #[test]
    fn test_strict_policy_rejects_degraded_sheet() {
        let bytes = build_xlsx(&[(XLSX_WORKBOOK, WORKBOOK)]);
        let mut loader = XlsxLoader::new(bytes).with_error_policy(ErrorPolicy::Strict);
        assert!(matches!(
            loader.sheet_outcome("Dados"),
            Err(SheetError::Strict(Diagnostic::MemberMissing { .. }))
        ));
    }

    #[test]
    fn test_workbook_in_declaration_order() {
        let bytes = build_xlsx(&[
            (XLSX_WORKBOOK, WORKBOOK),
            (XLSX_SHARED_STRINGS, SHARED),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", "<worksheet><sheetData/></worksheet>"),
        ]);
        let mut loader = XlsxLoader::new(bytes);
        // 後のシートを先に読み込んでも順序は宣言順
        loader.sheet_named("Vazia").unwrap();
        let workbook = loader.workbook_data().unwrap();
        assert_eq!(workbook.names().collect::<Vec<_>>(), vec!["Dados", "Vazia"]);
        assert_eq!(workbook.sheet_index_names().len(), 2);

        let owned = loader.into_workbook_data().unwrap();
        assert_eq!(owned.first().unwrap().column("Nome").unwrap()[0], "Maria");
    }

    #[test]
    fn test_unreadable_worksheet_degrades_only_that_sheet() {
        let mut bytes = build_xlsx(&[
            (XLSX_WORKBOOK, WORKBOOK),
            (XLSX_SHARED_STRINGS, SHARED),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", "<worksheet><sheetData/></worksheet>"),
        ]);
        // 12 = bzip2（有効にしていない圧縮方式）
        patch_compression_method(&mut bytes, "xl/worksheets/sheet2.xml", 12);

        let mut loader = XlsxLoader::new(bytes);
        let outcome = loader.sheet_outcome("Vazia").unwrap();
        assert!(outcome.data().is_empty());
        assert!(matches!(
            outcome.diagnostics(),
            [Diagnostic::MalformedXml { member, .. }] if member == "xl/worksheets/sheet2.xml"
        ));

        // 他のシートは読み込める
        let workbook = loader.workbook_data().unwrap();
        assert_eq!(workbook.len(), 2);
        assert_eq!(workbook.sheet("Dados").unwrap().row(0), Some(vec!["Maria", "10"]));
    }

    #[test]
    fn test_malformed_worksheet_keeps_earlier_diagnostics() {
        let bytes = build_xlsx(&[
            (XLSX_WORKBOOK, WORKBOOK),
            (XLSX_SHARED_STRINGS, "<sst><si><t>Nome</si></sst>"),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet><sheetData><row r="1"><c r="9"><v>1</v></c><c r="A1"><v>1</v></row></sheetData></worksheet>"#,
            ),
        ]);
        let mut loader = XlsxLoader::new(bytes);
        let outcome = loader.sheet_outcome("Dados").unwrap();
        assert!(outcome.data().is_empty());

        let diagnostics = outcome.diagnostics();
        assert_eq!(diagnostics.len(), 3);
        assert!(matches!(
            &diagnostics[0],
            Diagnostic::MalformedXml { member, .. } if member == XLSX_SHARED_STRINGS
        ));
        assert!(matches!(
            &diagnostics[1],
            Diagnostic::InvalidCoordinate { reference, .. } if reference == "9"
        ));
        assert!(matches!(
            &diagnostics[2],
            Diagnostic::MalformedXml { member, .. } if member == "xl/worksheets/sheet1.xml"
        ));
    }

    #[test]
    fn test_strict_workbook_reports_sheets_in_order() {
        let workbook = r#"<workbook><sheets>
            <sheet name="A" sheetId="1"/>
            <sheet name="B" sheetId="2"/>
            <sheet name="C" sheetId="3"/>
            <sheet name="D" sheetId="4"/>
        </sheets></workbook>"#;
        let bytes = build_xlsx(&[(XLSX_WORKBOOK, workbook)]);

        for _ in 0..8 {
            let mut loader =
                XlsxLoader::new(bytes.clone()).with_error_policy(ErrorPolicy::Strict);
            match loader.workbook_data() {
                Err(SheetError::Strict(Diagnostic::MemberMissing { member })) => {
                    assert_eq!(member, "xl/worksheets/sheet1.xml");
                }
                other => panic!("Expected strict error, got {:?}", other),
            }
        }
    }
}
