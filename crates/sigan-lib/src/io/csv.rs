use crate::signal::Record;
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;

/// Read a delimited record: a header row of channel labels followed by one
/// row per sample. Empty, `nan` and `na` cells are missing samples.
pub fn read_csv_record<R: Read>(input: R, fs: f64, delimiter: u8) -> Result<Record> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(Trim::All)
        .from_reader(input);
    let labels: Vec<String> = reader
        .headers()
        .context("reading header row")?
        .iter()
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        anyhow::bail!("record has no columns");
    }
    let mut channels = vec![Vec::new(); labels.len()];
    for (row_idx, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("reading row {}", row_idx + 2))?;
        if row.len() != labels.len() {
            return Err(anyhow!(
                "row {} has {} columns, header has {}",
                row_idx + 2,
                row.len(),
                labels.len()
            ));
        }
        for (col, cell) in row.iter().enumerate() {
            let value = parse_cell(cell).with_context(|| {
                format!("row {}, column {}: {:?}", row_idx + 2, labels[col], cell)
            })?;
            channels[col].push(value);
        }
    }
    Ok(Record {
        fs,
        channels,
        labels,
    })
}

/// Load a CSV (or, for `.tsv`/`.txt`, tab separated) record from disk.
pub fn load_csv_record(path: &Path, fs: f64) -> Result<Record> {
    let delimiter = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("txt") => b'\t',
        _ => b',',
    };
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    read_csv_record(file, fs, delimiter).with_context(|| format!("in {}", path.display()))
}

fn parse_cell(cell: &str) -> Result<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("na") {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>()
        .map_err(|e| anyhow!("not a number ({e})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_columns_as_channels() {
        let text = "ecg,ppg\n0.1,1.5\n0.2,\n0.3,NaN\n0.4,1.2\n";
        let record = read_csv_record(text.as_bytes(), 256.0, b',').unwrap();
        assert_eq!(record.labels, vec!["ecg", "ppg"]);
        assert_eq!(record.channels[0], vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(record.channels[1].iter().filter(|v| v.is_nan()).count(), 2);
        assert_eq!(record.channels[1][3], 1.2);
    }

    #[test]
    fn single_column_is_one_channel() {
        let record = read_csv_record("ecg\n1\n2\n".as_bytes(), 256.0, b',').unwrap();
        assert_eq!(record.channel_count(), 1);
    }

    #[test]
    fn rejects_text_cells() {
        let err = read_csv_record("ecg,ppg\n1,oops\n".as_bytes(), 256.0, b',').unwrap_err();
        assert!(format!("{err:#}").contains("row 2"));
    }
}
