//! パフォーマンステスト
//!
//! 大きめのワークブックの読み込み時間と、並列読み込みの結果が逐次読み込みと
//! 一致することを検証します。
//!
//! 注意: 時間の計測は目安です。正確な測定には`cargo bench`を使用してください。

use std::io::Write;
use std::time::Instant;

use rust_xlsxwriter::{Workbook, XlsxError};
use sheetzero::{
    ReaderBuilder, SheetError, SheetLoader, SheetSource, WorkbookData, XlsxLoader,
};

/// `rows`行 × `cols`列のシートを`sheets`枚持つワークブックを生成
fn generate_workbook(sheets: usize, rows: u32, cols: u16) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    for s in 0..sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(format!("Planilha{}", s + 1))?;
        for col in 0..cols {
            worksheet.write_string(0, col, format!("Col_{}", col))?;
        }
        for row in 1..rows {
            for col in 0..cols {
                if col % 2 == 0 {
                    worksheet.write_number(row, col, f64::from(row) * 1.5)?;
                } else {
                    worksheet.write_string(row, col, format!("R{}C{}", row, col))?;
                }
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

fn load_sequential(sources: &[SheetSource]) -> Vec<WorkbookData> {
    sources
        .iter()
        .map(|source| {
            XlsxLoader::new(source.clone())
                .into_workbook_data()
                .unwrap()
        })
        .collect()
}

/// 並列読み込みの結果は逐次読み込みと同じで、入力順に並ぶ
#[test]
fn test_parallel_matches_sequential() {
    let sources: Vec<SheetSource> = (1..=6)
        .map(|n| SheetSource::from(generate_workbook(n % 3 + 1, 20 + n as u32, 4).unwrap()))
        .collect();

    let reader = ReaderBuilder::new().build().unwrap();
    let parallel: Vec<WorkbookData> = reader
        .load_workbooks(sources.clone())
        .into_iter()
        .map(Result::unwrap)
        .collect();
    let sequential = load_sequential(&sources);

    assert_eq!(parallel.len(), sequential.len());
    for (p, s) in parallel.iter().zip(sequential.iter()) {
        assert_eq!(p.names().collect::<Vec<_>>(), s.names().collect::<Vec<_>>());
        for ((_, a), (_, b)) in p.iter().zip(s.iter()) {
            assert_eq!(a, b);
        }
    }
    assert_eq!(parallel[0].len(), 2);
    assert_eq!(parallel[2].len(), 1);
}

/// 独立したローダーは状態を共有しない
#[test]
fn test_independent_loaders() {
    let bytes = generate_workbook(2, 10, 3).unwrap();
    let mut first = XlsxLoader::new(bytes.clone());
    let mut second = XlsxLoader::new(bytes);

    let a = first.sheet_named("Planilha2").unwrap().clone();
    assert!(second.sheet_index().unwrap().len() == 2);
    let b = second.sheet_named("Planilha2").unwrap();
    assert_eq!(&a, b);
    assert_eq!(first.fingerprint(), second.fingerprint());
}

/// 10,000行 × 10列のシートの読み込み時間
#[test]
#[ignore] // 手動実行用
fn test_large_sheet_load_time() {
    let bytes = generate_workbook(1, 10_000, 10).unwrap();
    println!("Input size: {} bytes", bytes.len());

    let start = Instant::now();
    let mut loader = XlsxLoader::new(bytes);
    let sheet = loader.sheet(None).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(sheet.row_count(), 9_999);
    assert_eq!(sheet.column_count(), 10);
    println!("Loaded in {:?}", elapsed);

    if elapsed.as_secs() > 5 {
        eprintln!(
            "Warning: loading took {:.2} s (target: 5 s)",
            elapsed.as_secs_f64()
        );
    }
}

/// 読み込んだシートはキャッシュされ、入力を再び開かない
#[test]
fn test_cached_sheets_survive_source_removal() {
    let bytes = generate_workbook(2, 50, 3).unwrap();
    let mut file = tempfile::Builder::new()
        .suffix(".xlsx")
        .tempfile()
        .unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();
    let path = file.into_temp_path();
    let path_buf = path.to_path_buf();

    let mut loader = XlsxLoader::new(path_buf.clone());
    let expected = loader.workbook_data().unwrap().clone();
    assert_eq!(expected.len(), 2);

    path.close().unwrap();
    assert!(!path_buf.exists());

    // 新しいローダーはファイルを開けない
    let mut fresh = XlsxLoader::new(path_buf);
    assert!(matches!(fresh.sheet_index(), Err(SheetError::Io(_))));

    assert_eq!(loader.sheet_index().unwrap().len(), 2);
    assert_eq!(loader.sheet(None).unwrap().row_count(), 49);
    assert_eq!(loader.sheet_named("Planilha2").unwrap().column_count(), 3);
    assert_eq!(loader.workbook_data().unwrap(), &expected);
}
