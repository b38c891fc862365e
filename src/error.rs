use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeatmapError {
    /// Empty, zero-area or self-intersecting district geometry.
    #[error("invalid district geometry: {0}")]
    Geometry(String),

    #[error("no samples fall inside district {district}")]
    EmptyIntersection { district: String },

    #[error("{method} interpolation needs {required} usable samples, got {available}")]
    InterpolationInput {
        method: &'static str,
        required: usize,
        available: usize,
    },

    #[error("grid {name} is {got_width}x{got_height}, expected {width}x{height} on the same transform")]
    GridMismatch {
        name: &'static str,
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },

    #[error("sample ({x}, {y}) cannot be triangulated")]
    InvalidSample { x: f64, y: f64 },

    #[error("failed to read {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path:?} has no column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{path:?} line {line}: cannot parse {column} value {value:?}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),

    #[error("setup error: {0}")]
    Setup(String),
}

impl HeatmapError {
    /// Errors that end a task without output but are not failures.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            HeatmapError::Geometry(_) | HeatmapError::EmptyIntersection { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, HeatmapError>;
