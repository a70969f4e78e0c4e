//! Types Module
//!
//! クレート全体で使用する列指向のテーブルモデルを定義するモジュール。
//!
//! - [`SheetIndexNames`]: シートの序数（0始まり）とシート名の対応
//! - [`SheetData`]: 列見出しから値の列への順序付きマップ
//! - [`WorkbookData`]: シート名から[`SheetData`]への順序付きマップ

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::OnceLock;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::SheetError;

/// シートの序数とシート名の対応
///
/// 序数は0から始まる連続した値で、ワークブック内の宣言順に対応します。
/// 読み込み後は変更されません。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SheetIndexNames {
    names: Vec<String>,
}

impl SheetIndexNames {
    /// 名前の列から対応表を作成する
    ///
    /// ```rust
    /// use sheetzero::SheetIndexNames;
    ///
    /// let index = SheetIndexNames::from_names(["Planilha1", "Resumo"]);
    /// assert_eq!(index.name_at(1), Some("Resumo"));
    /// assert_eq!(index.index_of("Planilha1"), Some(0));
    /// ```
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// 序数からシート名を取得
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// シート名から序数を取得（同名が複数ある場合は最初のもの）
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `(序数, シート名)`の組を宣言順に返す
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.names.iter().map(String::as_str).enumerate()
    }

    pub fn first(&self) -> Option<&str> {
        self.name_at(0)
    }

    pub fn last(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// 1シート分の列指向データ
///
/// 列見出しをキー、その列のセル値（文字列）の配列を値とする順序付きマップです。
/// すべての列は同じ長さ（データ行数）を持ちます。
///
/// # 使用例
///
/// ```rust
/// use sheetzero::SheetData;
///
/// # fn main() -> Result<(), sheetzero::SheetError> {
/// let sheet = SheetData::from_columns(vec![
///     ("Nome".to_string(), vec!["Maria".to_string(), "João".to_string()]),
///     ("Valor".to_string(), vec!["10".to_string(), "10.5".to_string()]),
/// ])?;
///
/// assert_eq!(sheet.header(), vec!["Nome", "Valor"]);
/// assert_eq!(sheet.row(1), Some(vec!["João", "10.5"]));
/// assert_eq!(sheet.rows().rev().next(), Some(vec!["João", "10.5"]));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, Eq, Serialize)]
#[serde(transparent)]
pub struct SheetData {
    columns: IndexMap<String, Vec<String>>,
}

impl PartialEq for SheetData {
    fn eq(&self, other: &Self) -> bool {
        // 列の並び順も比較対象
        self.columns.iter().eq(other.columns.iter())
    }
}

impl SheetData {
    /// 空のシートを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 列の配列からシートを作成する
    ///
    /// # エラー
    ///
    /// 列の長さが揃っていない場合、または見出しが重複している場合は
    /// `SheetError::InvalidTable`を返します。
    pub fn from_columns(columns: Vec<(String, Vec<String>)>) -> Result<Self, SheetError> {
        let mut map: IndexMap<String, Vec<String>> = IndexMap::with_capacity(columns.len());
        let mut expected_len: Option<usize> = None;

        for (header, values) in columns {
            match expected_len {
                Some(len) if len != values.len() => {
                    return Err(SheetError::InvalidTable(format!(
                        "column '{}' has {} values (expected: {})",
                        header,
                        values.len(),
                        len
                    )));
                }
                None => expected_len = Some(values.len()),
                _ => {}
            }

            if map.contains_key(&header) {
                return Err(SheetError::InvalidTable(format!(
                    "duplicate column header '{}'",
                    header
                )));
            }
            map.insert(header, values);
        }

        Ok(Self { columns: map })
    }

    /// 列見出しを左から順に返す
    pub fn header(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    /// 見出しを指定して列を取得
    pub fn column(&self, header: &str) -> Option<&[String]> {
        self.columns.get(header).map(Vec::as_slice)
    }

    /// 位置（0始まり）を指定して列を取得
    pub fn column_at(&self, index: usize) -> Option<(&str, &[String])> {
        self.columns
            .get_index(index)
            .map(|(h, v)| (h.as_str(), v.as_slice()))
    }

    pub fn first_column(&self) -> Option<(&str, &[String])> {
        self.column_at(0)
    }

    pub fn last_column(&self) -> Option<(&str, &[String])> {
        self.columns
            .last()
            .map(|(h, v)| (h.as_str(), v.as_slice()))
    }

    /// データ行（0始まり、見出し行を含まない）を取得
    pub fn row(&self, index: usize) -> Option<Vec<&str>> {
        if index >= self.row_count() {
            return None;
        }
        Some(
            self.columns
                .values()
                .map(|values| values[index].as_str())
                .collect(),
        )
    }

    /// データ行のイテレーター
    ///
    /// `DoubleEndedIterator`を実装しているため、`.rev()`で末尾の行から走査できます。
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            sheet: self,
            front: 0,
            back: self.row_count(),
        }
    }

    /// データ行数（すべての列で共通）
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |(_, v)| v.len())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// `(見出し, 値の列)`の組を左から順に返す
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.columns
            .iter()
            .map(|(h, v)| (h.as_str(), v.as_slice()))
    }

    /// 列が1つもない場合に`true`
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// [`SheetData::rows()`]が返すイテレーター
#[derive(Debug, Clone)]
pub struct Rows<'a> {
    sheet: &'a SheetData,
    front: usize,
    back: usize,
}

impl<'a> Rows<'a> {
    fn row_at(&self, index: usize) -> Vec<&'a str> {
        self.sheet
            .columns
            .values()
            .map(|values| values[index].as_str())
            .collect()
    }
}

impl<'a> Iterator for Rows<'a> {
    type Item = Vec<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let row = self.row_at(self.front);
        self.front += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for Rows<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.row_at(self.back))
    }
}

impl ExactSizeIterator for Rows<'_> {}

/// 見出し行を確定させた後、列単位で値を積み上げるビルダー
///
/// 空の見出しは`Col{n}`（1始まり）に、重複した見出しは`name.1`, `name.2`, …に置き換えます。
#[derive(Debug, Clone, Default)]
pub(crate) struct SheetBuilder {
    headers: Vec<String>,
    columns: Vec<Vec<String>>,
}

impl SheetBuilder {
    pub fn with_header<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut headers = Vec::new();

        for (i, cell) in cells.into_iter().enumerate() {
            let base = if cell.is_empty() {
                format!("Col{}", i + 1)
            } else {
                cell
            };

            let mut name = base.clone();
            let mut suffix = 1usize;
            while seen.contains(&name) {
                name = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            seen.insert(name.clone());
            headers.push(name);
        }

        let columns = vec![Vec::new(); headers.len()];
        Self { headers, columns }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// 1行分の値を追加する（不足分は空文字列、余剰分は破棄）
    pub fn push_row<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut values = values.into_iter();
        for column in self.columns.iter_mut() {
            column.push(values.next().unwrap_or_default());
        }
    }

    /// 指定列に値を1つ追加する（範囲外の列は無視）
    pub fn push(&mut self, col: usize, value: String) {
        if let Some(column) = self.columns.get_mut(col) {
            column.push(value);
        }
    }

    /// 各列の長さを`len`に揃える（不足分は空文字列）
    pub fn pad_to(&mut self, len: usize) {
        for column in self.columns.iter_mut() {
            if column.len() < len {
                column.resize(len, String::new());
            }
        }
    }

    pub fn row_count(&self) -> usize {
        self.columns.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn finish(mut self) -> SheetData {
        let len = self.row_count();
        self.pad_to(len);
        SheetData {
            columns: self.headers.into_iter().zip(self.columns).collect(),
        }
    }
}

/// ワークブック全体のデータ
///
/// シート名をキー、[`SheetData`]を値とする順序付きマップです。
/// シートの対応表が明示的に設定されていない場合は、挿入順から一度だけ導出します。
///
/// JSONへは`{ シート名: { 列見出し: [値, ...] } }`としてシリアライズされます。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct WorkbookData {
    sheets: IndexMap<String, SheetData>,
    #[serde(skip)]
    explicit_index: Option<SheetIndexNames>,
    #[serde(skip)]
    derived_index: OnceLock<SheetIndexNames>,
}

impl PartialEq for WorkbookData {
    fn eq(&self, other: &Self) -> bool {
        self.sheets.iter().eq(other.sheets.iter())
    }
}

impl WorkbookData {
    pub fn new() -> Self {
        Self::default()
    }

    /// シートを追加する（同名のシートは置き換え）
    pub fn add_sheet<S: Into<String>>(&mut self, name: S, sheet: SheetData) {
        self.sheets.insert(name.into(), sheet);
        self.derived_index = OnceLock::new();
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetData> {
        self.sheets.get(name)
    }

    /// 挿入順の位置（0始まり）でシートを取得
    pub fn sheet_at(&self, index: usize) -> Option<&SheetData> {
        self.sheets.get_index(index).map(|(_, s)| s)
    }

    pub fn first(&self) -> Option<&SheetData> {
        self.sheet_at(0)
    }

    pub fn last(&self) -> Option<&SheetData> {
        self.sheets.last().map(|(_, s)| s)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.sheets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SheetData)> + '_ {
        self.sheets.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// シートの対応表を取得
    ///
    /// 明示的に設定された対応表があればそれを、なければ挿入順から導出したものを返します。
    pub fn sheet_index_names(&self) -> &SheetIndexNames {
        if let Some(index) = &self.explicit_index {
            return index;
        }
        self.derived_index
            .get_or_init(|| SheetIndexNames::from_names(self.sheets.keys().cloned()))
    }

    pub fn set_sheet_index_names(&mut self, index: SheetIndexNames) {
        self.explicit_index = Some(index);
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.sheets.contains_key(name)
    }

    /// 対応表の順序にシートを並べ替える（対応表にないシートは末尾）
    pub(crate) fn reorder(&mut self, order: &SheetIndexNames) {
        let position = |name: &str| order.index_of(name).unwrap_or(usize::MAX);
        self.sheets
            .sort_by(|a, _, b, _| -> Ordering { position(a).cmp(&position(b)) });
        self.derived_index = OnceLock::new();
    }
}
