use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use turnstile_rollup::config::PipelineConfig;
use turnstile_rollup::pipeline::run_pipeline;
use turnstile_rollup::stages::delta::BoundaryPolicy;
use turnstile_rollup::{PipelineError, record::MASTER_HEADER};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn fixture_config(work_dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        inputs: vec![
            fixture("turnstile_030617.txt"),
            fixture("turnstile_100617.txt"),
        ],
        work_dir: work_dir.path().to_path_buf(),
        ..Default::default()
    }
}

#[test]
fn test_full_pipeline() {
    let dir = TempDir::new().unwrap();
    let config = fixture_config(&dir);

    let report = run_pipeline(&config).expect("pipeline run failed");

    // R051: 1 (first-row sentinel) + 10 + 25 + 25
    // R052: 2000 - 1060 (no per-unit reset) + 40 + 60
    let reduced = fs::read_to_string(config.reducer_path()).unwrap();
    assert_eq!(reduced, "R051\t61\nR052\t1040\n");

    assert_eq!(report.files_merged, 2);
    assert_eq!(report.rows_merged, 8);
    assert_eq!(report.rows_read, 8);
    assert_eq!(report.rows_regular, 7);
    assert_eq!(report.rows_derived, 7);
    assert_eq!(report.rows_malformed, 0);
    assert_eq!(report.pairs_emitted, 7);
    assert_eq!(report.totals.len(), 2);
    assert_eq!(report.grand_total(), 1101.0);
    assert_eq!(report.window_minutes, 12 * 60);
}

#[test]
fn test_master_file_has_single_header() {
    let dir = TempDir::new().unwrap();
    let config = fixture_config(&dir);
    run_pipeline(&config).unwrap();

    let master = fs::read_to_string(config.master_path()).unwrap();
    let lines: Vec<_> = master.lines().collect();
    assert_eq!(lines.len(), 1 + 4 + 4);
    assert_eq!(lines[0], MASTER_HEADER);
    assert_eq!(lines.iter().filter(|l| l.starts_with("C/A")).count(), 1);
    assert!(lines[3].contains("RECOVR AUD"));
}

#[test]
fn test_mapper_output_skips_audit_row() {
    let dir = TempDir::new().unwrap();
    let config = fixture_config(&dir);
    run_pipeline(&config).unwrap();

    let mapped = fs::read_to_string(config.mapper_path()).unwrap();
    assert_eq!(
        mapped,
        "R051\t1\nR051\t10\nR051\t25\nR051\t25\nR052\t940\nR052\t40\nR052\t60\n"
    );
}

#[test]
fn test_missing_boundary_policy() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        boundary: BoundaryPolicy::Missing,
        ..fixture_config(&dir)
    };

    let report = run_pipeline(&config).unwrap();

    let reduced = fs::read_to_string(config.reducer_path()).unwrap();
    assert_eq!(reduced, "R051\t60\nR052\t1040\n");
    assert_eq!(report.pairs_skipped, 1);
}

#[test]
fn test_sort_before_reduce_groups_interleaved_units() {
    let dir = TempDir::new().unwrap();
    let raw = dir.path().join("interleaved.txt");
    fs::write(
        &raw,
        "header\n\
         A002,R051,02-00-00,59 ST,NQR456W,BMT,05/27/2017,00:00:00,REGULAR,100,10\n\
         A006,R052,00-00-00,5 AV/59 ST,NQRW,BMT,05/27/2017,00:00:00,REGULAR,104,12\n\
         A002,R051,02-00-00,59 ST,NQR456W,BMT,05/27/2017,04:00:00,REGULAR,110,15\n",
    )
    .unwrap();

    let unsorted = PipelineConfig {
        inputs: vec![raw.clone()],
        work_dir: dir.path().join("unsorted"),
        ..Default::default()
    };
    run_pipeline(&unsorted).unwrap();
    assert_eq!(
        fs::read_to_string(unsorted.reducer_path()).unwrap(),
        "R051\t1\nR052\t4\nR051\t6\n"
    );

    let sorted = PipelineConfig {
        inputs: vec![raw],
        work_dir: dir.path().join("sorted"),
        sort_before_reduce: true,
        ..Default::default()
    };
    let report = run_pipeline(&sorted).unwrap();
    assert_eq!(
        fs::read_to_string(sorted.reducer_path()).unwrap(),
        "R051\t7\nR052\t4\n"
    );
    assert_eq!(report.totals.len(), 2);
}

#[test]
fn test_malformed_and_non_numeric_rows_are_counted() {
    let dir = TempDir::new().unwrap();
    let raw = dir.path().join("dirty.txt");
    fs::write(
        &raw,
        "header\n\
         A002,R051,02-00-00,59 ST,NQR456W,BMT,05/27/2017,00:00:00,REGULAR,100,10\n\
         A002,R051,02-00-00,59 ST\n\
         A002,R051,02-00-00,59 ST,NQR456W,BMT,05/27/2017,04:00:00,REGULAR,n/a,12\n\
         A002,R051,02-00-00,59 ST,NQR456W,BMT,05/27/2017,08:00:00,REGULAR,130,20\n",
    )
    .unwrap();

    let config = PipelineConfig {
        inputs: vec![raw],
        work_dir: dir.path().join("out"),
        ..Default::default()
    };
    let report = run_pipeline(&config).unwrap();

    assert_eq!(report.rows_read, 4);
    assert_eq!(report.rows_malformed, 1);
    assert_eq!(report.rows_non_numeric, 1);
    assert_eq!(report.rows_derived, 2);
    assert_eq!(report.skip_pct(), 50.0);
    assert_eq!(
        fs::read_to_string(config.reducer_path()).unwrap(),
        "R051\t31\n"
    );
}

#[test]
fn test_no_inputs_produces_empty_result() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        work_dir: dir.path().to_path_buf(),
        ..Default::default()
    };

    let report = run_pipeline(&config).unwrap();
    assert!(report.totals.is_empty());
    assert_eq!(
        fs::read_to_string(config.master_path()).unwrap(),
        format!("{}\n", MASTER_HEADER)
    );
    assert_eq!(fs::read_to_string(config.reducer_path()).unwrap(), "");
}

#[test]
fn test_missing_input_aborts_run() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        inputs: vec![dir.path().join("turnstile_999999.txt")],
        work_dir: dir.path().to_path_buf(),
        ..Default::default()
    };

    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }));
    assert!(!config.reducer_path().exists());
}
