//! Shared String Table Parser
//!
//! `xl/sharedStrings.xml`から共有文字列テーブルを構築する。

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::parser::xml;

/// テキストの取り込み先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    /// `si`直下の`t`
    Direct,
    /// `si/r/t`
    Run,
}

/// `si`要素1つ分の状態
#[derive(Debug, Default)]
struct Item {
    /// `si`からの相対パス（`si`自身は含まない）
    path: Vec<Vec<u8>>,
    direct: Option<String>,
    runs: String,
}

impl Item {
    fn finish(self) -> String {
        self.direct.unwrap_or(self.runs)
    }
}

/// 共有文字列テーブルを解析する
///
/// 各`si`について、直下の最初の`t`要素のテキストを使用します。
/// 直下の`t`がなければ`r/t`のテキストを文書順に連結します（リッチテキスト）。
/// ふりがな（`rPh`）の中の`t`は無視します。
///
/// 要素名は名前空間接頭辞を除いたローカル名で照合します。
pub(crate) fn parse_shared_strings<R: BufRead>(
    reader: &mut Reader<R>,
) -> Result<Vec<String>, quick_xml::Error> {
    let mut strings = Vec::new();
    let mut item: Option<Item> = None;
    let mut capture = Capture::None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                match item.as_mut() {
                    None => {
                        if name == b"si" {
                            item = Some(Item::default());
                        }
                    }
                    Some(current) => {
                        if name == b"t" {
                            capture = match current.path.as_slice() {
                                [] if current.direct.is_none() => {
                                    current.direct = Some(String::new());
                                    Capture::Direct
                                }
                                [parent] if parent.as_slice() == b"r" => Capture::Run,
                                _ => Capture::None,
                            };
                        }
                        current.path.push(name);
                    }
                }
            }
            Event::Text(e) => {
                if let Some(current) = item.as_mut() {
                    push_text(current, capture, &xml::text(&e)?);
                }
            }
            Event::CData(e) => {
                if let Some(current) = item.as_mut() {
                    push_text(current, capture, &xml::cdata(&e));
                }
            }
            Event::End(_) => {
                if let Some(current) = item.as_mut() {
                    if current.path.pop().is_none() {
                        // `si`の終了
                        if let Some(done) = item.take() {
                            strings.push(done.finish());
                        }
                    }
                    capture = Capture::None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

fn push_text(item: &mut Item, capture: Capture, text: &str) {
    match capture {
        Capture::Direct => {
            if let Some(direct) = item.direct.as_mut() {
                direct.push_str(text);
            }
        }
        Capture::Run => item.runs.push_str(text),
        Capture::None => {}
    }
}
