//! Record readers. Each turns a file into a multi-channel [`Record`].

pub mod csv;
pub mod edf;
pub mod wfdb;

use crate::signal::Record;
use anyhow::Result;
use std::path::Path;

/// Pick a reader from the file extension: `.hea`/`.dat` are WFDB, `.edf` is
/// EDF and anything else is read as delimited text sampled at `fs`.
pub fn load_record(path: &Path, fs: f64) -> Result<Record> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("hea") | Some("dat") => wfdb::load_wfdb_record(path),
        Some("edf") => edf::load_edf_record(path),
        _ => csv::load_csv_record(path, fs),
    }
}
