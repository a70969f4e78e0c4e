//! パフォーマンスベンチマーク
//!
//! XLSX・ODS・CSVの読み込みと、Markdownへのエクスポートの速度を測定します。
//! フィクスチャはベンチマークの開始時にメモリ上で生成します。
//!
//! メモリ使用量の測定は別途、valgrindやheaptrackなどのツールを使用してください。

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_xlsxwriter::Workbook as XlsxWriter;
use sheetzero::{ReaderBuilder, SheetFormat, SheetLoader, SheetSource};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const ROWS: u32 = 5_000;
const COLS: u16 = 8;

fn xlsx_fixture(sheets: usize) -> Vec<u8> {
    let mut workbook = XlsxWriter::new();
    for s in 0..sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(format!("Planilha{}", s + 1)).unwrap();
        for col in 0..COLS {
            worksheet.write_string(0, col, format!("Col_{}", col)).unwrap();
        }
        for row in 1..ROWS {
            for col in 0..COLS {
                if col % 2 == 0 {
                    worksheet.write_number(row, col, f64::from(row)).unwrap();
                } else {
                    worksheet
                        .write_string(row, col, format!("texto {}", row % 100))
                        .unwrap();
                }
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

fn ods_fixture() -> Vec<u8> {
    let mut content = String::from(
        "<office:document-content><office:body><office:spreadsheet><table:table table:name=\"Dados\">",
    );
    for row in 0..ROWS {
        content.push_str("<table:table-row>");
        for col in 0..COLS {
            content.push_str(&format!(
                "<table:table-cell><text:p>{}-{}</text:p></table:table-cell>",
                row, col
            ));
        }
        content.push_str("</table:table-row>");
    }
    content.push_str("</table:table></office:spreadsheet></office:body></office:document-content>");

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file("content.xml", options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buffer
}

fn csv_fixture() -> Vec<u8> {
    let mut data = String::new();
    for row in 0..ROWS {
        let fields: Vec<String> = (0..COLS).map(|col| format!("{}\"{}", row, col)).collect();
        let quoted: Vec<String> = fields
            .iter()
            .map(|f| format!("\"{}\"", f.replace('"', "\"\"")))
            .collect();
        data.push_str(&quoted.join("\t"));
        data.push('\n');
    }
    data.into_bytes()
}

/// 形式ごとの全シート読み込み
fn benchmark_load(c: &mut Criterion) {
    let reader = ReaderBuilder::new().build().unwrap();
    let fixtures = [
        ("xlsx", SheetFormat::Xlsx, xlsx_fixture(1)),
        ("ods", SheetFormat::Ods, ods_fixture()),
        ("csv", SheetFormat::Csv, csv_fixture()),
    ];

    let mut group = c.benchmark_group("load");
    group.sample_size(10);

    for (label, format, data) in fixtures {
        let source = SheetSource::from(data.clone());
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_function(label, |b| {
            b.iter(|| {
                let workbook = reader.open_as(black_box(source.clone()), format);
                black_box(workbook.into_workbook_data().unwrap())
            });
        });
    }

    group.finish();
}

/// 対応表のみの読み込み（シート本体はデコードしない）
fn benchmark_sheet_index(c: &mut Criterion) {
    let source = SheetSource::from(xlsx_fixture(4));

    c.bench_function("xlsx_sheet_index", |b| {
        b.iter(|| {
            let mut loader = sheetzero::XlsxLoader::new(black_box(source.clone()));
            black_box(loader.sheet_index().unwrap().len())
        });
    });
}

/// Markdownへのエクスポート
fn benchmark_export(c: &mut Criterion) {
    let reader = ReaderBuilder::new().build().unwrap();
    let source = SheetSource::from(xlsx_fixture(1));

    let mut group = c.benchmark_group("export");
    group.sample_size(10);

    group.bench_function("xlsx_to_markdown", |b| {
        b.iter(|| {
            let mut output = Vec::new();
            reader
                .export(black_box(source.clone()), &mut output)
                .unwrap();
            black_box(output)
        });
    });

    group.finish();
}

/// 複数ワークブックの並列読み込み
fn benchmark_batch(c: &mut Criterion) {
    let reader = ReaderBuilder::new().build().unwrap();
    let sources: Vec<SheetSource> = (0..8).map(|_| SheetSource::from(xlsx_fixture(1))).collect();

    let mut group = c.benchmark_group("batch");
    group.sample_size(5);

    group.bench_function("load_8_workbooks", |b| {
        b.iter(|| {
            let results = reader.load_workbooks(black_box(sources.clone()));
            assert!(results.iter().all(Result::is_ok));
            black_box(results)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_load,
    benchmark_sheet_index,
    benchmark_export,
    benchmark_batch
);
criterion_main!(benches);
