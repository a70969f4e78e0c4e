//! sheetzero - Pure-Rust spreadsheet reader for XLSX, ODS and CSV
//!
//! This crate reads spreadsheet workbooks directly from their archive members
//! (`xl/workbook.xml`, `xl/sharedStrings.xml`, `xl/worksheets/sheet{N}.xml` for
//! XLSX and `content.xml` for ODS) and from delimited text, and exposes every
//! sheet as a column-oriented table of strings: the first row is the header,
//! every column has the same length, and missing cells are empty strings.
//!
//! Recoverable anomalies (a missing worksheet, a broken shared-string table,
//! an unparsable cell reference) never abort loading. They are recorded as
//! [`Diagnostic`] values, logged through the `log` facade, and returned with the
//! sheet as a [`SheetOutcome`]. [`ErrorPolicy::Strict`] turns them into errors.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sheetzero::{SheetLoader, XlsxLoader};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut loader = XlsxLoader::new("vendas.xlsx");
//!
//!     // First sheet
//!     let sheet = loader.sheet(None)?;
//!     println!("{:?}", sheet.header());
//!     for row in sheet.rows() {
//!         println!("{}", row.join(", "));
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Detecting the format and checking diagnostics
//!
//! ```rust,no_run
//! use sheetzero::{ReaderBuilder, SheetLoader, SheetOutcome};
//!
//! # fn main() -> Result<(), sheetzero::SheetError> {
//! let reader = ReaderBuilder::new().build()?;
//! let mut workbook = reader.open("planilha.ods")?;
//!
//! match workbook.sheet_outcome("Resumo")? {
//!     SheetOutcome::Complete(sheet) => println!("{} rows", sheet.row_count()),
//!     SheetOutcome::Degraded { data, diagnostics } => {
//!         println!("{} rows, {} problems", data.row_count(), diagnostics.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Export
//!
//! ```rust,no_run
//! use sheetzero::{OutputFormat, ReaderBuilder, SheetSelector};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reader = ReaderBuilder::new()
//!         .with_sheet_selector(SheetSelector::Index(0))
//!         .with_output_format(OutputFormat::Json)
//!         .build()?;
//!
//!     let output = std::fs::File::create("output.json")?;
//!     reader.export("vendas.xlsx", output)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Loading many workbooks
//!
//! ```rust,no_run
//! use sheetzero::ReaderBuilder;
//!
//! # fn main() -> Result<(), sheetzero::SheetError> {
//! let reader = ReaderBuilder::new().build()?;
//! let results = reader.load_workbooks(["a.xlsx", "b.ods", "c.csv"]);
//! for result in results {
//!     match result {
//!         Ok(workbook) => println!("{} sheets", workbook.len()),
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod archive;
mod builder;
mod coord;
mod diagnostics;
mod error;
mod loader;
mod output;
mod parser;
mod security;
mod types;

// 公開API
pub use api::{CsvEncoding, ErrorPolicy, OutputFormat, SheetFormat, SheetSelector};
pub use archive::SheetSource;
pub use builder::{ReaderBuilder, SheetReader};
pub use coord::column_index;
pub use diagnostics::{Diagnostic, SheetOutcome};
pub use error::SheetError;
pub use loader::{CsvLoader, OdsLoader, SheetLoader, Workbook, XlsxLoader};
pub use output::write_sheet;
pub use types::{Rows, SheetData, SheetIndexNames, WorkbookData};
