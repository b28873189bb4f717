use crate::signal::Record;
use anyhow::{anyhow, Result};
use edf_reader::file_reader::SyncFileReader;
use edf_reader::sync_reader::SyncEDFReader;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Helper implementing the EDF reader trait for on-disk files.
struct DiskFileReader {
    path: PathBuf,
}

impl DiskFileReader {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl SyncFileReader for DiskFileReader {
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, std::io::Error> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Load all channels of an EDF file. The record rate is taken from the first
/// channel; channels sampled at another rate are rejected.
pub fn load_edf_record(path: &Path) -> Result<Record> {
    let reader = SyncEDFReader::init_with_file_reader(DiskFileReader::new(path))?;
    let header = &reader.edf_header;
    let first = header
        .channels
        .first()
        .ok_or_else(|| anyhow!("EDF file {} has no channels", path.display()))?;
    if header.block_duration == 0 {
        return Err(anyhow!(
            "EDF file {} has a zero data record duration",
            path.display()
        ));
    }
    let rate_of = |samples_per_record: u64| {
        samples_per_record as f64 * 1000.0 / header.block_duration as f64
    };
    let fs = rate_of(first.number_of_samples_in_data_record as u64);
    for (idx, chan) in header.channels.iter().enumerate() {
        let chan_fs = rate_of(chan.number_of_samples_in_data_record as u64);
        if (chan_fs - fs).abs() > 1e-9 {
            return Err(anyhow!(
                "EDF channel {} ({}) is sampled at {} Hz, expected {} Hz",
                idx,
                chan.label.trim(),
                chan_fs,
                fs
            ));
        }
    }
    let total_duration = header.block_duration * header.number_of_blocks;
    let data_matrix = reader.read_data_window(0, total_duration)?;
    let channels = data_matrix
        .iter()
        .map(|chan| chan.iter().map(|value| *value as f64).collect())
        .collect();
    let labels = header
        .channels
        .iter()
        .map(|chan| chan.label.trim().to_string())
        .collect();
    Ok(Record {
        fs,
        channels,
        labels,
    })
}
