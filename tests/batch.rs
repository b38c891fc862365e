use district_heatmaps::batch::{plan_tasks, BatchScheduler};
use district_heatmaps::colormap::Colormap;
use district_heatmaps::data::list_sample_files;
use district_heatmaps::processing::{process_task, RenderSettings};
use district_heatmaps::render::Orientation;
use district_heatmaps::types::{BatchSummary, District, TaskStatus};
use geo::{polygon, MultiPolygon};
use indicatif::ProgressBar;
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn rectangle(id: &str, x0: f64, x1: f64, y0: f64, y1: f64) -> Arc<District> {
    Arc::new(District::new(
        id,
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)
        ]]),
    ))
}

fn settings(output_dir: &Path) -> Arc<RenderSettings> {
    Arc::new(RenderSettings {
        resolution: 16,
        colormap: Colormap::named("RdBu_r").unwrap(),
        value_min: 10.0,
        value_max: 36.0,
        orientation: Orientation::SouthUp,
        world_file: true,
        output_dir: output_dir.to_path_buf(),
    })
}

const ROWS: &str = "x,y,temperatur,ntzg
1,1,20,0
9,1,22,0
9,9,24,0
1,9,26,0
5,5,23,21
21,1,18,0
29,1,19,0
29,9,21,0
21,9,20,0
";

#[test]
fn malformed_file_fails_only_the_district_it_touches() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("a.csv"), ROWS).unwrap();
    fs::write(input.path().join("b.csv"), ROWS).unwrap();
    fs::write(input.path().join("c.csv"), format!("{ROWS}25,5,n/a,0\n")).unwrap();

    let files = list_sample_files(input.path()).unwrap();
    assert_eq!(files.len(), 3);
    let districts = vec![
        rectangle("1", 0.0, 10.0, 0.0, 10.0),
        rectangle("2", 20.0, 30.0, 0.0, 10.0),
    ];

    let settings = settings(output.path());
    let scheduler = BatchScheduler::new(2).unwrap();
    let report = scheduler.run(plan_tasks(&files, &districts), &ProgressBar::hidden(), move |task| {
        process_task(&task.file, &task.district, &settings)
    });

    assert_eq!(
        report.summary,
        BatchSummary { total: 6, successful: 5, skipped: 0, failed: 1 }
    );
    let failed: Vec<_> = report
        .results
        .iter()
        .filter(|r| matches!(r.status, TaskStatus::Failed(_)))
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].district_id, "2");
    assert!(failed[0].file.ends_with("c.csv"));

    let pngs = fs::read_dir(output.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
        .count();
    assert_eq!(pngs, 5);
    assert!(output.path().join("c_district1.png").exists());
    assert!(output.path().join("c_district1.pgw").exists());
    assert!(!output.path().join("c_district2.png").exists());
}

#[test]
fn district_without_samples_is_skipped_without_output() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("a.csv"), ROWS).unwrap();

    let files = list_sample_files(input.path()).unwrap();
    let districts = vec![
        rectangle("1", 0.0, 10.0, 0.0, 10.0),
        rectangle("9", 100.0, 110.0, 100.0, 120.0),
    ];

    let settings = settings(output.path());
    let scheduler = BatchScheduler::new(1).unwrap();
    let report = scheduler.run(plan_tasks(&files, &districts), &ProgressBar::hidden(), move |task| {
        process_task(&task.file, &task.district, &settings)
    });

    assert_eq!(
        report.summary,
        BatchSummary { total: 2, successful: 2, skipped: 1, failed: 0 }
    );
    let skipped = report
        .results
        .iter()
        .find(|r| r.district_id == "9")
        .unwrap();
    assert!(matches!(skipped.status, TaskStatus::Skipped(_)));
    assert!(output.path().join("a_district1.png").exists());
    assert!(!output.path().join("a_district9.png").exists());
}
