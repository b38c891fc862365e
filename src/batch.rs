//! Fans (file, district) tasks out over a bounded worker pool.

use crate::error::{HeatmapError, Result};
use crate::types::{BatchSummary, District, TaskResult, TaskStatus};
use indicatif::ProgressBar;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// One unit of work: a sample file rendered against one district.
#[derive(Debug, Clone)]
pub struct Task {
    pub file: PathBuf,
    pub district: Arc<District>,
}

/// Every combination of input file and district.
pub fn plan_tasks(files: &[PathBuf], districts: &[Arc<District>]) -> Vec<Task> {
    files
        .iter()
        .flat_map(|file| {
            districts.iter().map(move |district| Task {
                file: file.clone(),
                district: Arc::clone(district),
            })
        })
        .collect()
}

pub struct BatchReport {
    pub summary: BatchSummary,
    pub results: Vec<TaskResult>,
}

pub struct BatchScheduler {
    pool: ThreadPool,
    workers: usize,
}

impl BatchScheduler {
    pub fn new(workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("heatmap-worker-{i}"))
            .build()
            .map_err(|e| HeatmapError::Setup(format!("cannot start {workers} workers: {e}")))?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `job` once per task and waits for all of them.
    ///
    /// Skip errors count as successes without output; any other error or a
    /// panic inside `job` marks only that task as failed.
    pub fn run<F>(&self, tasks: Vec<Task>, progress: &ProgressBar, job: F) -> BatchReport
    where
        F: Fn(&Task) -> Result<PathBuf> + Send + Sync + 'static,
    {
        let total = tasks.len();
        progress.set_length(total as u64);
        info!("Total number of combinations to process: {}", total);

        let job = Arc::new(job);
        let (tx, rx) = crossbeam_channel::unbounded();
        for task in tasks {
            let tx = tx.clone();
            let job = Arc::clone(&job);
            self.pool.spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&task)));
                let _ = tx.send(task_result(task, outcome));
            });
        }
        drop(tx);

        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };
        let mut results = Vec::with_capacity(total);
        for result in rx {
            match &result.status {
                TaskStatus::Written(_) => {}
                TaskStatus::Skipped(reason) => warn!(
                    file = %result.file.display(),
                    district = %result.district_id,
                    "Skipped: {}",
                    reason
                ),
                TaskStatus::Failed(detail) => error!(
                    file = %result.file.display(),
                    district = %result.district_id,
                    "Failed: {}",
                    detail
                ),
            }
            summary.record(&result);
            progress.inc(1);
            results.push(result);
        }
        progress.finish();

        info!(
            "Processing completed. Successful: {}, Failed: {}",
            summary.successful, summary.failed
        );
        BatchReport { summary, results }
    }
}

fn task_result(task: Task, outcome: std::thread::Result<Result<PathBuf>>) -> TaskResult {
    let status = match outcome {
        Ok(Ok(path)) => TaskStatus::Written(path),
        Ok(Err(e)) if e.is_skip() => TaskStatus::Skipped(e.to_string()),
        Ok(Err(e)) => TaskStatus::Failed(e.to_string()),
        Err(payload) => TaskStatus::Failed(format!("task panicked: {}", panic_message(&*payload))),
    };
    TaskResult {
        file: task.file,
        district_id: task.district.id.clone(),
        status,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
