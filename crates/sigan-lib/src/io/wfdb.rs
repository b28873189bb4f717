use crate::signal::Record;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use wfdb_rust::header::{read_header, StorageFormat};
use wfdb_rust::signal::parse_212_format;

/// Gain WFDB assumes for signals whose header gives none (or zero).
const WFDB_DEFAULT_GAIN: f64 = 200.0;
const WFDB_DEFAULT_FS: f64 = 250.0;

/// Header path for a WFDB record given either its `.hea` or `.dat` file.
pub fn header_path(path: &Path) -> PathBuf {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("dat") => path.with_extension("hea"),
        _ => path.to_path_buf(),
    }
}

/// Load every signal of a WFDB record in physical units.
///
/// Format 212 and format 16 data files are supported, with signals sharing a
/// file interleaved frame by frame. Digital samples become
/// `(sample - baseline) / gain`; the format's invalid-sample marker
/// (-2048 for 212, -32768 for 16) becomes NaN.
pub fn load_wfdb_record(path: &Path) -> Result<Record> {
    let header_path = header_path(path);
    let text = std::fs::read_to_string(&header_path)
        .with_context(|| format!("failed to read WFDB header {}", header_path.display()))?;
    let header = read_header(&text);
    let data_dir = header_path.parent().unwrap_or_else(|| Path::new("."));
    let fs = header
        .record
        .sampling_frequency
        .map(|f| f as f64)
        .unwrap_or(WFDB_DEFAULT_FS);

    // data file -> indices of the signals stored in it, in header order
    let mut files: Vec<(&str, Vec<usize>)> = Vec::new();
    for (idx, spec) in header.signal_specs.iter().enumerate() {
        match files.iter_mut().find(|(name, _)| *name == spec.filename) {
            Some((_, leads)) => leads.push(idx),
            None => files.push((spec.filename.as_str(), vec![idx])),
        }
    }

    let mut channels = vec![Vec::new(); header.signal_specs.len()];
    for (filename, leads) in &files {
        let first = &header.signal_specs[leads[0]];
        let file = if Path::new(filename).is_absolute() {
            PathBuf::from(filename)
        } else {
            data_dir.join(filename)
        };
        let bytes = std::fs::read(&file)
            .with_context(|| format!("failed to read WFDB data {}", file.display()))?;
        let offset = first.byte_offset.unwrap_or(0) as usize;
        let (samples, invalid) = decode(first.format, bytes.get(offset..).unwrap_or_default())
            .with_context(|| format!("in {}", file.display()))?;
        for (slot, &lead) in leads.iter().enumerate() {
            let spec = &header.signal_specs[lead];
            let gain = match spec.adc_gain {
                Some(gain) if gain != 0.0 => gain as f64,
                _ => WFDB_DEFAULT_GAIN,
            };
            let baseline = spec.baseline.or(spec.adc_zero).unwrap_or(0) as f64;
            channels[lead] = samples
                .iter()
                .skip(slot)
                .step_by(leads.len())
                .map(|&sample| {
                    if sample == invalid {
                        f64::NAN
                    } else {
                        (sample as f64 - baseline) / gain
                    }
                })
                .collect();
        }
    }

    let labels = header
        .signal_specs
        .iter()
        .enumerate()
        .map(|(idx, spec)| {
            spec.description
                .clone()
                .unwrap_or_else(|| format!("signal {idx}"))
        })
        .collect();
    log::debug!(
        "WFDB {}: {} signals at {} Hz",
        header_path.display(),
        channels.len(),
        fs
    );
    Ok(Record {
        fs,
        channels,
        labels,
    })
}

/// Digital samples of a data file and the format's invalid-sample marker.
fn decode(format: StorageFormat, bytes: &[u8]) -> Result<(Vec<i16>, i16)> {
    match format {
        StorageFormat::_12bit_twos_complement => Ok((parse_212_format(bytes), -2048)),
        StorageFormat::_16bit_twos_complement => Ok((
            bytes
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
            i16::MIN,
        )),
        other => bail!("unsupported WFDB storage format {other:?}"),
    }
}
