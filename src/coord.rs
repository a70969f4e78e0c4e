//! Cell Coordinate Module
//!
//! A1形式のセル参照から列番号を求める。

use crate::error::SheetError;

/// セル参照（例: `"AZ25"`）を1始まりの列番号に変換する
///
/// 先頭の英字部分を、ゼロを持たない26進数（A=1 … Z=26, AA=27 …）として解釈します。
/// 大文字小文字は区別しません。英字以降の行番号部分は読み飛ばします。
///
/// # エラー
///
/// 先頭に英字がない場合、または列番号が`u32`に収まらない場合は
/// `SheetError::InvalidCoordinate`を返します。
///
/// # 使用例
///
/// ```rust
/// use sheetzero::column_index;
///
/// assert_eq!(column_index("A1").unwrap(), 1);
/// assert_eq!(column_index("AZ25").unwrap(), 52);
/// assert!(column_index("1").is_err());
/// ```
pub fn column_index(coord: &str) -> Result<u32, SheetError> {
    let letters = coord
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .map(|b| b.to_ascii_uppercase());

    let mut index: u32 = 0;
    let mut seen = false;
    for letter in letters {
        seen = true;
        let value = u32::from(letter - b'A' + 1);
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(value))
            .ok_or_else(|| SheetError::InvalidCoordinate(coord.to_string()))?;
    }

    if !seen {
        return Err(SheetError::InvalidCoordinate(coord.to_string()));
    }

    Ok(index)
}
