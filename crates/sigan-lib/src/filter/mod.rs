//! Butterworth design and zero-phase application.

pub mod apply;
pub mod design;

pub use apply::{filtfilt, lfilter, lfilter_zi};
pub use design::{design, FilterCoefficients, FilterKind, FilterPreset, FilterSpec};
