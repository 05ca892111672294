//! Signal-to-range conversion and beacon localization

pub mod rssi;
pub mod localization;

pub use rssi::PathLossModel;
pub use localization::{BeaconLocalizer, FixKind, LocalizationReport, LocalizerConfig, Workspace};
