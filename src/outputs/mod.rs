//! Output generation modules for the CSV post dump and the JSON signal
//! report.
//!
//! Both are thin I/O wrappers around the in-memory results:
//!
//! - [`csv`]: Writes extracted posts as a spreadsheet-friendly CSV file
//! - [`report`]: Writes the aggregated trading signal as a JSON file
//!
//! Files land in the configured output directory as
//! `guba_posts_{stock_code}_{timestamp}.csv` and
//! `guba_signal_{stock_code}_{timestamp}.json`.

pub mod csv;
pub mod report;
