//! Security Module
//!
//! 入力に対する制限を実装するモジュール。
//! ZIP bomb攻撃、パストラバーサル攻撃、巨大なテーブル展開への対策を提供します。

use crate::error::SheetError;

/// アーカイブ読み込み時のセキュリティ設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SecurityConfig {
    /// 展開後の最大サイズ（メンバーの宣言サイズの合計、バイト）
    /// デフォルト: 1GB (1_073_741_824 bytes)
    pub max_decompressed_size: u64,
    /// ZIPアーカイブ内の最大メンバー数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// 単一メンバーの最大サイズ（バイト）
    /// デフォルト: 100MB (104_857_600 bytes)
    pub max_file_size: u64,
    /// 入力の最大サイズ（バイト）
    /// デフォルト: 2GB (2_147_483_648 bytes)
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 1_073_741_824, // 1GB
            max_file_count: 10_000,
            max_file_size: 104_857_600,         // 100MB
            max_input_file_size: 2_147_483_648, // 2GB
        }
    }
}

impl SecurityConfig {
    /// 入力サイズの検証
    pub fn check_input_size(&self, size: u64) -> Result<(), SheetError> {
        if size > self.max_input_file_size {
            return Err(SheetError::SecurityViolation(format!(
                "Input exceeds maximum size: {} bytes (max: {} bytes)",
                size, self.max_input_file_size
            )));
        }
        Ok(())
    }

    /// メンバー数の検証
    pub fn check_file_count(&self, count: usize) -> Result<(), SheetError> {
        if count > self.max_file_count {
            return Err(SheetError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                count, self.max_file_count
            )));
        }
        Ok(())
    }
}

/// 展開するテーブルの大きさの上限
///
/// ODSの繰り返し属性（`number-rows-repeated`など）は小さなXMLから
/// 巨大なテーブルを生成できるため、行数と列数に上限を設けます。
/// 行数と列数のデフォルトはXLSXのシート上限（1,048,576行 × 16,384列）と同じです。
/// 両方の上限いっぱいのシートは展開できないため、見出し行を含むセルの総数にも
/// 上限（`max_cells`）を設けます。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableLimits {
    pub max_rows: u32,
    pub max_columns: u32,
    /// 展開後のセル数の上限（見出し行を含む）
    /// デフォルト: 16,777,216
    pub max_cells: u64,
}

impl Default for TableLimits {
    fn default() -> Self {
        Self {
            max_rows: 1_048_576,
            max_columns: 16_384,
            max_cells: 16_777_216,
        }
    }
}

impl TableLimits {
    /// `width`列のテーブルで保持できる行数（見出し行を含む）の上限
    ///
    /// 行数上限とセル数上限の小さい方です。
    pub fn rows_for_width(&self, width: u64) -> u64 {
        let by_cells = self.max_cells.checked_div(width).unwrap_or(u64::MAX);
        by_cells.min(u64::from(self.max_rows))
    }

    /// 保持できる列数の上限
    pub fn width_limit(&self) -> u64 {
        u64::from(self.max_columns).min(self.max_cells)
    }
}

/// ファイルパスの検証
///
/// パストラバーサル攻撃を防ぐため、アーカイブ内のメンバーパスを検証します。
///
/// # 引数
///
/// * `path` - 検証するメンバーパス
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    // 空のパスは拒否
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    // 絶対パスを拒否（Unix形式の`/`、Windows形式のドライブレター`X:`）
    let bytes = path.as_bytes();
    let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if path.starts_with('/') || has_drive {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    // `..`のセグメントを拒否（ディレクトリトラバーサル攻撃）
    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    // `\`を含むパスを拒否（Windows形式のパスセパレータ）
    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_zip_path_valid() {
        assert!(validate_zip_path("xl/workbook.xml").is_ok());
        assert!(validate_zip_path("xl/worksheets/sheet1.xml").is_ok());
        assert!(validate_zip_path("content.xml").is_ok());
        assert!(validate_zip_path("META-INF/manifest.xml").is_ok());
        assert!(validate_zip_path("Pictures/a..b.png").is_ok());
    }

    #[test]
    fn test_validate_zip_path_empty() {
        assert!(validate_zip_path("").is_err());
    }

    #[test]
    fn test_validate_zip_path_absolute_unix() {
        assert!(validate_zip_path("/etc/passwd").is_err());
        assert!(validate_zip_path("/content.xml").is_err());
    }

    #[test]
    fn test_validate_zip_path_absolute_windows() {
        assert!(validate_zip_path("C:\\Windows\\system32").is_err());
        assert!(validate_zip_path("d:/xl/workbook.xml").is_err());
    }

    #[test]
    fn test_validate_zip_path_traversal() {
        assert!(validate_zip_path("../etc/passwd").is_err());
        assert!(validate_zip_path("xl/../../etc/passwd").is_err());
        assert!(validate_zip_path("xl/..").is_err());
        assert!(validate_zip_path("..").is_err());
    }

    #[test]
    fn test_validate_zip_path_backslash() {
        assert!(validate_zip_path("xl\\workbook.xml").is_err());
    }

    #[test]
    fn test_input_size_limit() {
        let config = SecurityConfig {
            max_input_file_size: 10,
            ..SecurityConfig::default()
        };
        assert!(config.check_input_size(10).is_ok());
        assert!(matches!(
            config.check_input_size(11),
            Err(SheetError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_default_table_limits() {
        let limits = TableLimits::default();
        assert_eq!(limits.max_rows, 1_048_576);
        assert_eq!(limits.max_columns, 16_384);
        assert_eq!(limits.max_cells, 16_777_216);
    }

    #[test]
    fn test_rows_for_width_uses_cell_budget() {
        let limits = TableLimits::default();
        // 列数が少なければ行数上限が先に効く
        assert_eq!(limits.rows_for_width(1), 1_048_576);
        assert_eq!(limits.rows_for_width(0), 1_048_576);
        // 全列を使うシートは1,024行まで
        assert_eq!(limits.rows_for_width(16_384), 1_024);

        let tight = TableLimits {
            max_cells: 10,
            ..TableLimits::default()
        };
        assert_eq!(tight.rows_for_width(4), 2);
        assert_eq!(tight.width_limit(), 10);
    }
}
