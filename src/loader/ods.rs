//! ODS Loader
//!
//! OpenDocument Spreadsheetの`content.xml`からシートを読み込むローダー。

use std::collections::HashMap;

use crate::api::ErrorPolicy;
use crate::archive::{Archive, SheetSource};
use crate::diagnostics::{Diagnostic, SheetOutcome};
use crate::error::SheetError;
use crate::loader::{LoadOptions, SheetLoader};
use crate::parser::ods::{decode_content, OdsContent, Wanted};
use crate::parser::{xml, ODS_CONTENT};
use crate::types::{SheetIndexNames, WorkbookData};

/// ODSローダー
///
/// シートはすべて`content.xml`の中にあるため、対応表の取得とシートの読み込みは
/// それぞれ`content.xml`の1回の走査で行います。
/// [`SheetLoader::workbook_data()`]を最初に呼んだ場合は、1回の走査で対応表と全シートを得ます。
#[derive(Debug)]
pub struct OdsLoader {
    source: SheetSource,
    options: LoadOptions,
    index: Option<SheetIndexNames>,
    workbook: WorkbookData,
    sheet_diagnostics: HashMap<String, Vec<Diagnostic>>,
    complete: bool,
}

impl OdsLoader {
    /// デフォルト設定のローダーを作成（この時点ではファイルを開かない）
    pub fn new<S: Into<SheetSource>>(source: S) -> Self {
        Self::with_options(source.into(), LoadOptions::default())
    }

    pub(crate) fn with_options(source: SheetSource, options: LoadOptions) -> Self {
        Self {
            source,
            options,
            index: None,
            workbook: WorkbookData::new(),
            sheet_diagnostics: HashMap::new(),
            complete: false,
        }
    }

    /// 診断情報の扱いを設定
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.options.policy = policy;
        self
    }

    /// `content.xml`を1回走査する
    fn scan(&self, wanted: Wanted<'_>) -> Result<OdsContent, SheetError> {
        let mut archive = Archive::open(&self.source, &self.options.security)?;
        let mut member = archive.read_xml_member(ODS_CONTENT)?.ok_or_else(|| {
            SheetError::RequiredMemberMissing {
                member: ODS_CONTENT.to_string(),
            }
        })?;
        let content = decode_content(&mut member.reader, ODS_CONTENT, wanted, self.options.limits)
            .map_err(|e| xml::fatal(ODS_CONTENT, e))?;

        log::debug!(
            "scanned {} of {} ({} tables, {} decoded)",
            ODS_CONTENT,
            self.source.display_name(),
            content.names.len(),
            content.tables.len()
        );
        Ok(content)
    }

    fn store(&mut self, mut content: OdsContent) {
        for name in content.names.iter() {
            if self.workbook.contains(name) {
                continue;
            }
            if let Some(decoded) = content.tables.remove(name) {
                self.sheet_diagnostics
                    .insert(name.clone(), decoded.diagnostics);
                self.workbook.add_sheet(name.clone(), decoded.data);
            }
        }
        if self.index.is_none() {
            self.index = Some(SheetIndexNames::from_names(content.names));
        }
    }

    fn ensure_index(&mut self) -> Result<&SheetIndexNames, SheetError> {
        if self.index.is_none() {
            let content = self.scan(Wanted::Names)?;
            self.store(content);
        }
        self.index.as_ref().ok_or_else(|| SheetError::RequiredMemberMissing {
            member: ODS_CONTENT.to_string(),
        })
    }
}

impl SheetLoader for OdsLoader {
    fn fingerprint(&self) -> u64 {
        self.source.fingerprint()
    }

    fn sheet_index(&mut self) -> Result<&SheetIndexNames, SheetError> {
        self.ensure_index()
    }

    fn sheet_outcome(&mut self, name: &str) -> Result<SheetOutcome<'_>, SheetError> {
        if self.ensure_index()?.index_of(name).is_none() {
            return Err(SheetError::SheetNotFound(name.to_string()));
        }
        if !self.workbook.contains(name) {
            let wanted = [name.to_string()];
            let content = self.scan(Wanted::Only(&wanted))?;
            self.store(content);
        }

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
            match self.index.clone() {
                None => {
                    let content = self.scan(Wanted::All)?;
                    self.store(content);
                }
                Some(index) => {
                    let missing: Vec<String> = index
                        .names()
                        .iter()
                        .filter(|name| !self.workbook.contains(name))
                        .cloned()
                        .collect();
                    if !missing.is_empty() {
                        let content = self.scan(Wanted::Only(&missing))?;
                        self.store(content);
                    }
                }
            }

            let index = self.ensure_index()?.clone();
            self.workbook.reorder(&index);
            self.workbook.set_sheet_index_names(index);
            self.complete = true;
        }

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
        &[]
    }
}
