pub mod batch;
pub mod bounds;
pub mod colormap;
pub mod config;
pub mod data;
pub mod error;
pub mod grid;
pub mod interpolate;
pub mod masking;
pub mod processing;
pub mod render;
pub mod types;

pub use error::{HeatmapError, Result};
