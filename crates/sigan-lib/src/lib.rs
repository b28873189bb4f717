pub mod config;
pub mod detectors;
pub mod error;
pub mod filter;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod signal;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, AnalysisResult};
pub use pipeline::*;
pub use signal::*;
