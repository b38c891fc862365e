use geo::{BoundingRect, MultiPolygon, Rect};
use std::path::PathBuf;

/// Land-use codes (`ntzg`) classified as buildings.
pub const BUILDING_CODES: [i64; 4] = [20, 21, 30, 32];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub temperature: f64,
    pub land_use_code: i64,
}

impl SamplePoint {
    pub fn is_building(&self) -> bool {
        BUILDING_CODES.contains(&self.land_use_code)
    }
}

#[derive(Debug, Clone)]
pub struct District {
    pub id: String,
    pub name: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

impl District {
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id: id.into(),
            name: None,
            geometry,
        }
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }
}

/// How a single (file, district) task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Written(PathBuf),
    /// Processed without output (no samples inside, degenerate geometry).
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TaskResult {
    pub file: PathBuf,
    pub district_id: String,
    pub status: TaskStatus,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, TaskStatus::Failed(_))
    }

    pub fn output(&self) -> Option<&PathBuf> {
        match &self.status {
            TaskStatus::Written(path) => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    /// Subset of `successful` that produced no image.
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, result: &TaskResult) {
        match result.status {
            TaskStatus::Written(_) => self.successful += 1,
            TaskStatus::Skipped(_) => {
                self.successful += 1;
                self.skipped += 1;
            }
            TaskStatus::Failed(_) => self.failed += 1,
        }
    }

    pub fn completed(&self) -> usize {
        self.successful + self.failed
    }
}
