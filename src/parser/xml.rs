//! XML Helpers
//!
//! 各デコーダーで共通のquick-xmlリーダー設定、属性・テキストの取得、
//! XML解析エラーの分類（致命的なエラーか診断情報か）を提供する。

use quick_xml::events::{BytesCData, BytesStart, BytesText};
use quick_xml::Reader;

use crate::diagnostics::Diagnostic;
use crate::error::SheetError;

/// デコーダー共通のリーダー設定
///
/// テキストはトリムしない（セル値の前後の空白を保持する）。
/// 空要素は開始・終了イベントの組に展開する。
pub(crate) fn configure<R>(mut reader: Reader<R>) -> Reader<R> {
    reader.trim_text(false);
    reader.expand_empty_elements(true);
    reader
}

/// 名前空間接頭辞を無視して属性値を取得
pub(crate) fn attr_value(
    element: &BytesStart<'_>,
    local_name: &[u8],
) -> Result<Option<String>, quick_xml::Error> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

pub(crate) fn text(event: &BytesText<'_>) -> Result<String, quick_xml::Error> {
    Ok(event.unescape()?.into_owned())
}

pub(crate) fn cdata(event: &BytesCData<'_>) -> String {
    String::from_utf8_lossy(event).into_owned()
}

/// 必須メンバーの解析エラー
pub(crate) fn fatal(member: &str, err: quick_xml::Error) -> SheetError {
    SheetError::MalformedXml {
        member: member.to_string(),
        message: err.to_string(),
    }
}

/// 任意メンバーの解析エラー
pub(crate) fn degraded(member: &str, err: quick_xml::Error) -> Diagnostic {
    Diagnostic::MalformedXml {
        member: member.to_string(),
        message: err.to_string(),
    }
}
