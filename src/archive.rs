//! Archive Module
//!
//! 入力ソース（ファイルパスまたはメモリ上のバイト列）をZIPアーカイブとして開き、
//! 指定したXMLメンバーをイベントストリームとして読み出すモジュール。
//!
//! アーカイブハンドルは1回の論理操作（対応表の読み込み、シートの読み込みなど）の間だけ保持し、
//! スコープを抜けると常に解放されます。

use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quick_xml::Reader;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::api::SheetFormat;
use crate::error::SheetError;
use crate::parser::{xml, ODS_CONTENT, XLSX_WORKBOOK};
use crate::security::{validate_zip_path, SecurityConfig};

/// 読み込み対象の入力ソース
///
/// # 使用例
///
/// ```rust
/// use sheetzero::SheetSource;
///
/// let from_path = SheetSource::from("book.xlsx");
/// let from_bytes = SheetSource::from(vec![0u8; 4]);
/// assert_ne!(from_path.fingerprint(), from_bytes.fingerprint());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SheetSource {
    /// ファイルシステム上のパス
    Path(PathBuf),

    /// メモリ上のバイト列（複数のローダー間で共有可能）
    Bytes(Arc<[u8]>),
}

impl SheetSource {
    /// ソースの安定したハッシュ値
    ///
    /// パスの場合はパス文字列、バイト列の場合は内容から計算します。
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// ログや診断情報に使用する表示名
    pub fn display_name(&self) -> String {
        match self {
            SheetSource::Path(path) => path.display().to_string(),
            SheetSource::Bytes(bytes) => format!("<memory: {} bytes>", bytes.len()),
        }
    }

    /// 読み込み用のリーダーと入力サイズを取得
    pub(crate) fn open_reader(&self) -> Result<(SourceReader, u64), SheetError> {
        match self {
            SheetSource::Path(path) => {
                let file = File::open(path)?;
                let size = file.metadata()?.len();
                Ok((SourceReader::File(BufReader::new(file)), size))
            }
            SheetSource::Bytes(bytes) => {
                let size = bytes.len() as u64;
                Ok((SourceReader::Memory(Cursor::new(Arc::clone(bytes))), size))
            }
        }
    }
}

impl From<PathBuf> for SheetSource {
    fn from(path: PathBuf) -> Self {
        SheetSource::Path(path)
    }
}

impl From<&Path> for SheetSource {
    fn from(path: &Path) -> Self {
        SheetSource::Path(path.to_path_buf())
    }
}

impl From<&str> for SheetSource {
    fn from(path: &str) -> Self {
        SheetSource::Path(PathBuf::from(path))
    }
}

impl From<String> for SheetSource {
    fn from(path: String) -> Self {
        SheetSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for SheetSource {
    fn from(bytes: Vec<u8>) -> Self {
        SheetSource::Bytes(Arc::from(bytes))
    }
}

impl From<&[u8]> for SheetSource {
    fn from(bytes: &[u8]) -> Self {
        SheetSource::Bytes(Arc::from(bytes))
    }
}

impl From<Arc<[u8]>> for SheetSource {
    fn from(bytes: Arc<[u8]>) -> Self {
        SheetSource::Bytes(bytes)
    }
}

/// ソースの種類に応じたリーダー
pub(crate) enum SourceReader {
    File(BufReader<File>),
    Memory(Cursor<Arc<[u8]>>),
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SourceReader::File(r) => r.read(buf),
            SourceReader::Memory(r) => r.read(buf),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            SourceReader::File(r) => r.seek(pos),
            SourceReader::Memory(r) => r.seek(pos),
        }
    }
}

/// XMLメンバーのイベントストリーム
///
/// 空要素（`<c/>`）は開始・終了イベントの組に展開され、テキストはトリムされません。
pub(crate) struct XmlMember<'a> {
    pub path: String,
    pub reader: Reader<BufReader<ZipFile<'a>>>,
}

/// 開いたZIPアーカイブ
pub(crate) struct Archive {
    zip: ZipArchive<SourceReader>,
}

impl Archive {
    /// ソースをZIPアーカイブとして開く
    ///
    /// 開く時点で入力サイズ、メンバー数、メンバーのパスと宣言サイズを検証します。
    pub fn open(source: &SheetSource, security: &SecurityConfig) -> Result<Self, SheetError> {
        let (reader, size) = source.open_reader()?;
        security.check_input_size(size)?;

        let mut zip =
            ZipArchive::new(reader).map_err(|e| SheetError::ArchiveOpen(format!("{}", e)))?;

        // セキュリティチェック: メンバー数の上限
        security.check_file_count(zip.len())?;

        // セキュリティチェック: 各メンバーのパス検証とサイズチェック
        let mut total_decompressed_size = 0u64;
        for i in 0..zip.len() {
            let file = zip
                .by_index_raw(i)
                .map_err(|e| SheetError::ArchiveOpen(format!("{}", e)))?;

            let file_name = file.name();
            validate_zip_path(file_name).map_err(|e| {
                SheetError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;

            let file_size = file.size();
            if file_size > security.max_file_size {
                return Err(SheetError::SecurityViolation(format!(
                    "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    file_name, file_size, security.max_file_size
                )));
            }

            total_decompressed_size =
                total_decompressed_size
                    .checked_add(file_size)
                    .ok_or_else(|| {
                        SheetError::SecurityViolation(
                            "Total decompressed size calculation overflow".to_string(),
                        )
                    })?;

            if total_decompressed_size > security.max_decompressed_size {
                return Err(SheetError::SecurityViolation(format!(
                    "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    total_decompressed_size, security.max_decompressed_size
                )));
            }
        }

        log::debug!(
            "opened archive {} ({} members, {} bytes declared)",
            source.display_name(),
            zip.len(),
            total_decompressed_size
        );

        Ok(Self { zip })
    }

    /// XMLメンバーを開く
    ///
    /// # 戻り値
    ///
    /// * `Ok(Some(XmlMember))` - メンバーが存在する場合
    /// * `Ok(None)` - メンバーが存在しない場合（呼び出し側で既定値を使用する）
    /// * `Err(SheetError)` - メンバーを読み出せない場合
    pub fn read_xml_member(&mut self, path: &str) -> Result<Option<XmlMember<'_>>, SheetError> {
        match self.zip.by_name(path) {
            Ok(file) => {
                log::trace!("reading archive member {} ({} bytes)", path, file.size());
                Ok(Some(XmlMember {
                    path: path.to_string(),
                    reader: xml::configure(Reader::from_reader(BufReader::new(file))),
                }))
            }
            Err(ZipError::FileNotFound) => Ok(None),
            Err(ZipError::Io(e)) => Err(SheetError::Io(e)),
            Err(e) => Err(SheetError::ArchiveOpen(format!(
                "cannot read member '{}': {}",
                path, e
            ))),
        }
    }
}

impl SheetFormat {
    /// ソースの形式を判定する
    ///
    /// パスの拡張子で判定できればそれを使用し、できなければ内容を調べます。
    /// `xl/workbook.xml`を含むZIPはXLSX、`content.xml`を含むZIPはODS、
    /// ZIPとして開けない入力は区切りテキストとみなします。
    ///
    /// # エラー
    ///
    /// どちらのメンバーも含まないZIPの場合は`SheetError::UnsupportedFormat`を返します。
    pub fn detect(source: &SheetSource) -> Result<SheetFormat, SheetError> {
        if let SheetSource::Path(path) = source {
            if let Some(format) = SheetFormat::from_path(path) {
                return Ok(format);
            }
        }

        let (reader, _) = source.open_reader()?;
        let zip = match ZipArchive::new(reader) {
            Ok(zip) => zip,
            Err(_) => return Ok(SheetFormat::Csv),
        };

        if zip.file_names().any(|name| name == XLSX_WORKBOOK) {
            Ok(SheetFormat::Xlsx)
        } else if zip.file_names().any(|name| name == ODS_CONTENT) {
            Ok(SheetFormat::Ods)
        } else {
            Err(SheetError::UnsupportedFormat(format!(
                "{} is a ZIP archive without '{}' or '{}'",
                source.display_name(),
                XLSX_WORKBOOK,
                ODS_CONTENT
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_zip(members: &[(&str, &str)]) -> Vec<u8> {
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

    #[test]
    fn test_read_existing_member() {
        let bytes = build_zip(&[("content.xml", "<a><b/></a>")]);
        let source = SheetSource::from(bytes);
        let mut archive = Archive::open(&source, &SecurityConfig::default()).unwrap();

        let mut member = archive.read_xml_member("content.xml").unwrap().unwrap();
        assert_eq!(member.path, "content.xml");

        let mut buf = Vec::new();
        let mut starts = 0;
        let mut ends = 0;
        loop {
            match member.reader.read_event_into(&mut buf).unwrap() {
                Event::Start(_) => starts += 1,
                Event::End(_) => ends += 1,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        // 空要素は開始・終了の組に展開される
        assert_eq!(starts, 2);
        assert_eq!(ends, 2);
    }

    #[test]
    fn test_missing_member_is_none() {
        let bytes = build_zip(&[("content.xml", "<a/>")]);
        let source = SheetSource::from(bytes);
        let mut archive = Archive::open(&source, &SecurityConfig::default()).unwrap();
        assert!(archive.read_xml_member("xl/sharedStrings.xml").unwrap().is_none());
    }

    #[test]
    fn test_non_zip_input_fails_to_open() {
        let source = SheetSource::from(b"Nome\tValor\n".to_vec());
        assert!(matches!(
            Archive::open(&source, &SecurityConfig::default()),
            Err(SheetError::ArchiveOpen(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let source = SheetSource::from("definitely/not/here.xlsx");
        assert!(matches!(
            Archive::open(&source, &SecurityConfig::default()),
            Err(SheetError::Io(_))
        ));
    }

    #[test]
    fn test_member_count_limit() {
        let bytes = build_zip(&[("a.xml", "<a/>"), ("b.xml", "<b/>")]);
        let config = SecurityConfig {
            max_file_count: 1,
            ..SecurityConfig::default()
        };
        assert!(matches!(
            Archive::open(&SheetSource::from(bytes), &config),
            Err(SheetError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_member_size_limit() {
        let bytes = build_zip(&[("content.xml", "<table>0123456789</table>")]);
        let config = SecurityConfig {
            max_file_size: 8,
            ..SecurityConfig::default()
        };
        assert!(matches!(
            Archive::open(&SheetSource::from(bytes), &config),
            Err(SheetError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_detect_by_content() {
        let xlsx = build_zip(&[(XLSX_WORKBOOK, "<workbook/>")]);
        let ods = build_zip(&[(ODS_CONTENT, "<document-content/>")]);
        let other = build_zip(&[("readme.txt", "hello")]);

        assert_eq!(
            SheetFormat::detect(&SheetSource::from(xlsx)).unwrap(),
            SheetFormat::Xlsx
        );
        assert_eq!(
            SheetFormat::detect(&SheetSource::from(ods)).unwrap(),
            SheetFormat::Ods
        );
        assert!(matches!(
            SheetFormat::detect(&SheetSource::from(other)),
            Err(SheetError::UnsupportedFormat(_))
        ));
        assert_eq!(
            SheetFormat::detect(&SheetSource::from(b"a,b\n1,2\n".to_vec())).unwrap(),
            SheetFormat::Csv
        );
    }

    #[test]
    fn test_detect_prefers_extension() {
        // 拡張子で判定できる場合はファイルを開かない
        let source = SheetSource::from("missing/file.ods");
        assert_eq!(SheetFormat::detect(&source).unwrap(), SheetFormat::Ods);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = SheetSource::from(vec![1u8, 2, 3]);
        let b = SheetSource::from(vec![1u8, 2, 3]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), SheetSource::from("x.xlsx").fingerprint());
    }
}
