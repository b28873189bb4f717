use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, f64::consts::PI, fs, io::Write, path::Path};

const FS: f64 = 256.0;

#[derive(Deserialize)]
struct Rate {
    bpm: Option<f64>,
}

#[derive(Deserialize)]
struct Peaks {
    indices: Vec<usize>,
}

#[derive(Deserialize)]
struct AnalyzeOutput {
    channel: String,
    start: usize,
    end: usize,
    peaks: Peaks,
    rate: Rate,
}

#[derive(Deserialize)]
struct PsdOutput {
    segment_length: usize,
    points: Vec<[f64; 2]>,
    dominant_hz: Option<f64>,
}

/// 30 s of 60 BPM: ECG spikes of ~1000 units and PPG pulses lagging by 0.2 s.
fn write_record(path: &Path) -> Result<(), Box<dyn Error>> {
    let mut file = fs::File::create(path)?;
    writeln!(file, "ecg,ppg")?;
    for i in 0..(30 * FS as usize) {
        let t = i as f64 / FS;
        let phase = (t - 0.5).rem_euclid(1.0);
        let d = if phase > 0.5 { phase - 1.0 } else { phase };
        let ecg = 1000.0 * (-0.5 * (d / 0.02).powi(2)).exp() + 40.0 * (2.0 * PI * 0.2 * t).sin();
        let dp = ((t - 0.7).rem_euclid(1.0) + 0.5).rem_euclid(1.0) - 0.5;
        let ppg = 800.0 * (-0.5 * (dp / 0.12).powi(2)).exp();
        if i % 997 == 0 {
            writeln!(file, "{ecg},")?;
        } else {
            writeln!(file, "{ecg},{ppg}")?;
        }
    }
    Ok(())
}

#[test]
fn analyze_reports_sixty_bpm() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let record = dir.path().join("rec.csv");
    write_record(&record)?;

    let mut cmd = cargo_bin_cmd!("sigan");
    cmd.args([
        "analyze",
        "--record",
        record.to_str().expect("utf8 path"),
        "--start",
        "1000",
        "--end",
        "6000",
        "--min-distance",
        "150",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: AnalyzeOutput = serde_json::from_slice(&output)?;

    assert_eq!(actual.channel, "ecg");
    assert_eq!((actual.start, actual.end), (1000, 6000));
    assert!(actual.peaks.indices.len() >= 18);
    let bpm = actual.rate.bpm.expect("rate determined");
    assert!((bpm - 60.0).abs() < 1.0, "bpm {bpm}");
    Ok(())
}

#[test]
fn analyze_ppg_cleans_missing_samples() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let record = dir.path().join("rec.csv");
    write_record(&record)?;

    let mut cmd = cargo_bin_cmd!("sigan");
    cmd.args([
        "analyze",
        "--record",
        record.to_str().expect("utf8 path"),
        "--channel",
        "ppg",
        "--start",
        "1000",
        "--end",
        "6000",
        "--min-height",
        "200",
        "--min-distance",
        "150",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let value: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(value["load"]["ppg_missing"], 8);
    assert_eq!(value["preprocess"]["ppg_replaced"], 8);
    let bpm = value["rate"]["bpm"].as_f64().expect("rate determined");
    assert!((bpm - 60.0).abs() < 1.0, "bpm {bpm}");
    Ok(())
}

#[test]
fn config_file_supplies_defaults() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let record = dir.path().join("rec.csv");
    write_record(&record)?;
    let config = dir.path().join("sigan.toml");
    fs::write(&config, "start = 2000\nend = 4000\nmin_distance = 150\n")?;

    let mut cmd = cargo_bin_cmd!("sigan");
    cmd.args([
        "--config",
        config.to_str().expect("utf8 path"),
        "analyze",
        "--record",
        record.to_str().expect("utf8 path"),
        "--end",
        "5000",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: AnalyzeOutput = serde_json::from_slice(&output)?;
    assert_eq!((actual.start, actual.end), (2000, 5000));
    Ok(())
}

#[test]
fn psd_has_half_segment_plus_one_bins() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let record = dir.path().join("rec.csv");
    write_record(&record)?;

    let mut cmd = cargo_bin_cmd!("sigan");
    cmd.args(["psd", "--record", record.to_str().expect("utf8 path")]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: PsdOutput = serde_json::from_slice(&output)?;
    assert_eq!(actual.segment_length, 1024);
    assert_eq!(actual.points.len(), 513);
    assert!((actual.points[512][0] - 128.0).abs() < 1e-9);
    let dominant = actual.dominant_hz.expect("non-empty spectrum");
    assert!(dominant > 0.5 && dominant < 40.0);
    Ok(())
}

#[test]
#[ignore = "plot captions need system fonts"]
fn plots_are_written_as_png() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let record = dir.path().join("rec.csv");
    write_record(&record)?;
    let plot = dir.path().join("segment.png");
    let psd_plot = dir.path().join("psd.png");

    let mut cmd = cargo_bin_cmd!("sigan");
    cmd.args([
        "analyze",
        "--record",
        record.to_str().expect("utf8 path"),
        "--start",
        "0",
        "--end",
        "2560",
        "--plot",
        plot.to_str().expect("utf8 path"),
    ]);
    cmd.assert().success();
    assert!(fs::metadata(&plot)?.len() > 0);

    let mut cmd = cargo_bin_cmd!("sigan");
    cmd.args([
        "psd",
        "--record",
        record.to_str().expect("utf8 path"),
        "--plot",
        psd_plot.to_str().expect("utf8 path"),
    ]);
    cmd.assert().success();
    assert!(fs::metadata(&psd_plot)?.len() > 0);
    Ok(())
}

#[test]
fn filter_prints_one_sample_per_line() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let record = dir.path().join("rec.csv");
    write_record(&record)?;

    let mut cmd = cargo_bin_cmd!("sigan");
    cmd.args([
        "filter",
        "--record",
        record.to_str().expect("utf8 path"),
        "--filter",
        "lowpass",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output)?;
    let values: Vec<f64> = text
        .lines()
        .map(str::parse)
        .collect::<Result<_, _>>()?;
    assert_eq!(values.len(), 30 * FS as usize);
    Ok(())
}

#[test]
fn info_reports_labels_and_gaps() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let record = dir.path().join("rec.csv");
    write_record(&record)?;

    let mut cmd = cargo_bin_cmd!("sigan");
    cmd.args(["info", "--record", record.to_str().expect("utf8 path")]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let value: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(value["ecg_label"], "ecg");
    assert_eq!(value["ppg_label"], "ppg");
    assert_eq!(value["ecg_samples"], 30 * FS as usize);
    assert_eq!(value["ppg_missing"], 8);
    Ok(())
}

#[test]
fn single_channel_record_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let record = dir.path().join("ecg_only.csv");
    let mut text = String::from("ecg\n");
    for i in 0..1024 {
        text.push_str(&format!("{}\n", (i % 256) as f64));
    }
    fs::write(&record, text)?;

    let mut cmd = cargo_bin_cmd!("sigan");
    cmd.args(["info", "--record", record.to_str().expect("utf8 path")]);
    cmd.assert().failure();
    Ok(())
}

#[test]
fn out_of_range_window_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let record = dir.path().join("rec.csv");
    write_record(&record)?;

    let mut cmd = cargo_bin_cmd!("sigan");
    cmd.args([
        "analyze",
        "--record",
        record.to_str().expect("utf8 path"),
        "--start",
        "5000",
        "--end",
        "20000",
    ]);
    cmd.assert().failure();
    Ok(())
}
