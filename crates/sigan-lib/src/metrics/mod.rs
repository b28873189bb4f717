pub mod psd;
pub mod rate;
