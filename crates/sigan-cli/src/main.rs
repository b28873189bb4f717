use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use plotters::prelude::*;
use serde::Serialize;
use sigan_lib::{
    config::AnalysisConfig,
    filter::FilterPreset,
    io::load_record,
    metrics::{psd::SpectralEstimate, rate::RateEstimate},
    pipeline::{AnalysisSession, LoadReport, PreprocessReport},
    plot::{figure_from_psd, figure_from_segment, Figure, PlotBackend, Series},
    signal::{Channel, Events},
};
use std::{
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

const PLOT_MAX_POINTS: usize = 4096;

#[derive(Parser)]
#[command(
    name = "sigan",
    version,
    about = "Filter, peak-detect and rate ECG/PPG recordings"
)]
struct Cli {
    /// TOML file with analysis defaults; command-line flags take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ChannelArg {
    Ecg,
    Ppg,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Ecg => Channel::Ecg,
            ChannelArg::Ppg => Channel::Ppg,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FilterArg {
    /// Bandpass 0.5-40 Hz
    Bandpass,
    /// Lowpass 40 Hz
    Lowpass,
    /// Highpass 0.5 Hz
    Highpass,
}

impl From<FilterArg> for FilterPreset {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Bandpass => FilterPreset::Bandpass,
            FilterArg::Lowpass => FilterPreset::Lowpass,
            FilterArg::Highpass => FilterPreset::Highpass,
        }
    }
}

#[derive(Args)]
struct RecordArgs {
    /// WFDB header/data (.hea/.dat), EDF (.edf) or delimited text record
    #[arg(long)]
    record: PathBuf,
    /// Sampling rate to analyse at (Hz)
    #[arg(long)]
    fs: Option<f64>,
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long, value_enum)]
    filter: Option<FilterArg>,
    #[arg(long)]
    order: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a record and report channels and missing samples
    Info {
        #[command(flatten)]
        record: RecordArgs,
    },
    /// Filter a record, detect peaks in a sample window and estimate the rate
    Analyze {
        #[command(flatten)]
        record: RecordArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value = "ecg")]
        channel: ChannelArg,
        #[arg(long)]
        start: Option<usize>,
        #[arg(long)]
        end: Option<usize>,
        #[arg(long)]
        min_height: Option<f64>,
        #[arg(long)]
        min_distance: Option<usize>,
        /// Render the segment with its peaks to a PNG
        #[arg(long)]
        plot: Option<PathBuf>,
    },
    /// Welch power spectral density of the filtered ECG channel
    Psd {
        #[command(flatten)]
        record: RecordArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        segment: Option<usize>,
        /// Render the spectrum (log power) to a PNG
        #[arg(long)]
        plot: Option<PathBuf>,
    },
    /// Print the filtered samples of one channel, one per line
    Filter {
        #[command(flatten)]
        record: RecordArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value = "ecg")]
        channel: ChannelArg,
    },
}

#[derive(Serialize)]
struct AnalyzeOutput {
    load: LoadReport,
    preprocess: PreprocessReport,
    channel: Channel,
    start: usize,
    end: usize,
    peaks: Events,
    rate: RateEstimate,
    #[serde(skip_serializing_if = "Option::is_none")]
    plot: Option<PathBuf>,
}

#[derive(Serialize)]
struct PsdOutput {
    #[serde(flatten)]
    psd: SpectralEstimate,
    dominant_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plot: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut cfg = match cli.config.as_deref() {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    match cli.command {
        Commands::Info { record } => cmd_info(&mut cfg, &record)?,
        Commands::Analyze {
            record,
            filter,
            channel,
            start,
            end,
            min_height,
            min_distance,
            plot,
        } => {
            cfg.start = start.unwrap_or(cfg.start);
            cfg.end = end.unwrap_or(cfg.end);
            cfg.min_height = min_height.unwrap_or(cfg.min_height);
            cfg.min_distance = min_distance.unwrap_or(cfg.min_distance);
            cmd_analyze(&mut cfg, &record, &filter, channel.into(), plot.as_deref())?
        }
        Commands::Psd {
            record,
            filter,
            segment,
            plot,
        } => {
            cfg.psd_segment = segment.unwrap_or(cfg.psd_segment);
            cmd_psd(&mut cfg, &record, &filter, plot.as_deref())?
        }
        Commands::Filter {
            record,
            filter,
            channel,
        } => cmd_filter(&mut cfg, &record, &filter, channel.into())?,
    }
    Ok(())
}

fn load_session(
    cfg: &mut AnalysisConfig,
    args: &RecordArgs,
) -> Result<(AnalysisSession, LoadReport)> {
    cfg.fs = args.fs.unwrap_or(cfg.fs);
    let record = load_record(&args.record, cfg.fs)
        .with_context(|| format!("loading record {}", args.record.display()))?;
    let mut session = AnalysisSession::from_config(cfg);
    let report = session.load(record)?;
    Ok((session, report))
}

fn preprocessed_session(
    cfg: &mut AnalysisConfig,
    args: &RecordArgs,
    filter: &FilterArgs,
) -> Result<(AnalysisSession, LoadReport, PreprocessReport)> {
    cfg.filter = filter.filter.map(FilterPreset::from).unwrap_or(cfg.filter);
    cfg.filter_order = filter.order.unwrap_or(cfg.filter_order);
    let (mut session, load) = load_session(cfg, args)?;
    let spec = cfg.filter.spec(cfg.filter_order);
    let preprocess = session.preprocess(&spec)?;
    Ok((session, load, preprocess))
}

fn cmd_info(cfg: &mut AnalysisConfig, args: &RecordArgs) -> Result<()> {
    let (_, report) = load_session(cfg, args)?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_analyze(
    cfg: &mut AnalysisConfig,
    args: &RecordArgs,
    filter: &FilterArgs,
    channel: Channel,
    plot: Option<&Path>,
) -> Result<()> {
    let (session, load, preprocess) = preprocessed_session(cfg, args, filter)?;
    let analysis =
        session.analyze_segment(channel, cfg.start, cfg.end, cfg.min_height, cfg.min_distance)?;
    if let Some(path) = plot {
        PngBackend::new(path).draw(&figure_from_segment(&analysis, PLOT_MAX_POINTS))?;
    }
    let out = AnalyzeOutput {
        load,
        preprocess,
        channel,
        start: analysis.start,
        end: analysis.end,
        peaks: analysis.peaks,
        rate: analysis.rate,
        plot: plot.map(Path::to_path_buf),
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn cmd_psd(
    cfg: &mut AnalysisConfig,
    args: &RecordArgs,
    filter: &FilterArgs,
    plot: Option<&Path>,
) -> Result<()> {
    let (session, _, _) = preprocessed_session(cfg, args, filter)?;
    let psd = session.spectral_density(cfg.psd_segment)?;
    if let Some(path) = plot {
        PngBackend::new(path).draw(&figure_from_psd(&psd))?;
    }
    let out = PsdOutput {
        dominant_hz: psd.dominant_frequency(),
        psd,
        plot: plot.map(Path::to_path_buf),
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn cmd_filter(
    cfg: &mut AnalysisConfig,
    args: &RecordArgs,
    filter: &FilterArgs,
    channel: Channel,
) -> Result<()> {
    let (session, _, _) = preprocessed_session(cfg, args, filter)?;
    let filtered = session
        .filtered(channel)
        .context("session holds no filtered signal")?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for value in &filtered.data {
        writeln!(out, "{}", value)?;
    }
    out.flush()?;
    Ok(())
}

/// Renders figures to a PNG file with plotters.
struct PngBackend {
    path: PathBuf,
    size: (u32, u32),
}

impl PngBackend {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            size: (1000, 400),
        }
    }
}

impl PlotBackend for PngBackend {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        let log_y = fig.y.log_scale;
        let y_of = |y: f64| if log_y { y.log10() } else { y };
        let keep = |p: &[f64; 2]| p[0].is_finite() && p[1].is_finite() && !(log_y && p[1] <= 0.0);

        let (x_min, x_max, y_min, y_max) = fig.bounds().unwrap_or((0.0, 1.0, 1.0, 10.0));
        let (x_min, x_max) = widen(x_min, x_max);
        let (y_min, y_max) = widen(y_of(y_min), y_of(y_max));

        let root = BitMapBackend::new(&self.path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 22),
            )
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        let y_desc = match (&fig.y.label, log_y) {
            (Some(label), true) => format!("log10({label})"),
            (Some(label), false) => label.clone(),
            (None, _) => String::new(),
        };
        chart
            .configure_mesh()
            .x_desc(fig.x.label.clone().unwrap_or_default())
            .y_desc(y_desc)
            .draw()?;

        for series in &fig.series {
            match series {
                Series::Line(line) => {
                    let (r, g, b) = line.style.color.rgb();
                    let color = RGBColor(r, g, b);
                    chart
                        .draw_series(LineSeries::new(
                            line.points
                                .iter()
                                .filter(|p| keep(*p))
                                .map(|p| (p[0], y_of(p[1]))),
                            color.stroke_width(line.style.width.round().max(1.0) as u32),
                        ))?
                        .label(line.name.clone())
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
                }
                Series::Markers(markers) => {
                    let (r, g, b) = markers.color.rgb();
                    let color = RGBColor(r, g, b);
                    let size = markers.size as i32;
                    chart
                        .draw_series(
                            markers
                                .points
                                .iter()
                                .filter(|p| keep(*p))
                                .map(move |p| {
                                    Cross::new((p[0], y_of(p[1])), size, color.stroke_width(2))
                                }),
                        )?
                        .label(markers.name.clone())
                        .legend(move |(x, y)| Cross::new((x + 10, y), 4, color.stroke_width(2)));
                }
            }
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
        if let Some(note) = &fig.note {
            root.draw(&Text::new(
                note.clone(),
                (90, 45),
                ("sans-serif", 18).into_font().color(&BLUE),
            ))?;
        }
        root.present()?;
        log::info!("wrote plot to {}", self.path.display());
        Ok(())
    }
}

fn widen(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo - 1.0, hi + 1.0)
    }
}
