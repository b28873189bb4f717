use crate::{metrics::psd::SpectralEstimate, pipeline::SegmentAnalysis, signal::Channel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
    #[serde(default)]
    pub log_scale: bool,
}

impl Axis {
    pub fn labeled(label: &str) -> Self {
        Self {
            label: Some(label.into()),
            log_scale: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Individually marked points, e.g. detected peaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub size: u32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Markers(MarkerSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) => &line.points,
            Series::Markers(markers) => &markers.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
    /// Free text shown inside the plot area
    pub note: Option<String>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis::default(),
            y: Axis::default(),
            series: Vec::new(),
            note: None,
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over all finite points; non-positive y
    /// values are skipped on a log axis.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        let points = self.series.iter().flat_map(|s| s.points().iter());
        for &[x, y] in points {
            if !x.is_finite() || !y.is_finite() || (self.y.log_scale && y <= 0.0) {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, x, y, y),
                Some((x0, x1, y0, y1)) => (x0.min(x), x1.max(x), y0.min(y), y1.max(y)),
            });
        }
        bounds
    }
}

/// Something that can render a [`Figure`], e.g. to an image file.
pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        let sample = points[start];
        result.push(sample);
    }
    result
}

/// Filtered segment with its detected peaks and the rate estimate as a note.
/// The x axis counts samples from the start of the segment.
pub fn figure_from_segment(analysis: &SegmentAnalysis, max_points: usize) -> Figure {
    let (line_color, marker_color, peak_name) = match analysis.channel {
        Channel::Ecg => (0x1F77B4, 0xD62728, "Detected R-peaks"),
        Channel::Ppg => (0x1F77B4, 0x2CA02C, "Detected P-peaks"),
    };
    let title = match analysis.channel {
        Channel::Ecg => format!(
            "ECG Signal with Detected R-Peaks (Samples {} to {})",
            analysis.start, analysis.end
        ),
        Channel::Ppg => format!(
            "PPG Signal with Detected Peaks (Samples {} to {})",
            analysis.start, analysis.end
        ),
    };
    let points: Vec<[f64; 2]> = analysis
        .samples
        .iter()
        .enumerate()
        .map(|(i, value)| [i as f64, *value])
        .collect();
    let peaks: Vec<[f64; 2]> = analysis
        .peaks
        .indices
        .iter()
        .filter_map(|&i| analysis.samples.get(i).map(|v| [i as f64, *v]))
        .collect();

    let mut fig = Figure::new(Some(title));
    fig.x = Axis::labeled("Time (samples)");
    fig.y = Axis::labeled("Amplitude");
    fig.note = Some(analysis.rate.describe());
    fig.add_series(Series::Line(LineSeries {
        name: format!("Filtered {} Signal", analysis.channel),
        points: decimate_points(&points, max_points),
        style: Style {
            width: 1.4,
            color: Color(line_color),
        },
    }));
    fig.add_series(Series::Markers(MarkerSeries {
        name: peak_name.into(),
        points: peaks,
        size: 4,
        color: Color(marker_color),
    }));
    fig
}

/// Semilog power spectral density plot.
pub fn figure_from_psd(psd: &SpectralEstimate) -> Figure {
    let mut fig = Figure::new(Some("Power Spectral Density of ECG Signal".to_string()));
    fig.x = Axis::labeled("Frequency (Hz)");
    fig.y = Axis {
        label: Some("Power".into()),
        log_scale: true,
    };
    fig.add_series(Series::Line(LineSeries {
        name: "PSD".into(),
        points: psd.points.clone(),
        style: Style {
            width: 1.4,
            color: Color(0x1F77B4),
        },
    }));
    fig
}
