//! Integration test: Full pipeline (frame → table → features → frame)

use kolosal_features::prelude::*;
use polars::prelude::*;

fn bike_sharing_frame() -> DataFrame {
    df!(
        "datetime" => &[
            "2011-01-01 00:00:00",
            "2011-01-01 01:00:00",
            "2011-01-01 02:00:00",
            "2011-01-01 03:00:00",
            "2011-01-01 04:00:00",
        ],
        "season" => &["winter", "winter", "winter", "winter", "winter"],
        "temp" => &[9.84, 9.02, 9.02, 9.84, 9.84],
        "hum" => &[81.0, 80.0, 80.0, 75.0, 75.0],
        "count" => &[16i64, 40, 32, 13, 1]
    )
    .unwrap()
}

fn bike_sharing_table() -> SeriesTable {
    SeriesTable::from_frame(&bike_sharing_frame(), "datetime").unwrap()
}

fn f64_column(table: &SeriesTable, name: &str) -> Vec<Option<f64>> {
    table.column(name).unwrap().f64().unwrap().into_iter().collect()
}

fn assert_close(actual: &[Option<f64>], expected: &[Option<f64>]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        match (a, e) {
            (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "row {i}: {a} != {e}"),
            (None, None) => {}
            _ => panic!("row {i}: {a:?} != {e:?}"),
        }
    }
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[test]
fn test_temp_lags() {
    let spec = FeatureSpec::builder().lags("temp", &[1, 2]).build().unwrap();
    let out = FeaturePipeline::new(spec).transform(&bike_sharing_table()).unwrap();

    assert_eq!(
        f64_column(&out, "temp_lag_1"),
        vec![None, Some(9.84), Some(9.02), Some(9.02), Some(9.84)]
    );
    assert_eq!(
        f64_column(&out, "temp_lag_2"),
        vec![None, None, Some(9.84), Some(9.02), Some(9.02)]
    );
}

#[test]
fn test_temp_rolling_mean() {
    let spec = FeatureSpec::builder()
        .rolling_with_min_periods("temp", 2, AggregationFn::Mean, 1)
        .build()
        .unwrap();
    let out = FeaturePipeline::new(spec).transform(&bike_sharing_table()).unwrap();

    assert_close(
        &f64_column(&out, "temp_window_2_mean"),
        &[None, Some(9.84), Some(9.43), Some(9.02), Some(9.43)],
    );
}

#[test]
fn test_temp_rolling_mean_full_window() {
    let spec = FeatureSpec::builder()
        .rolling("temp", 2, AggregationFn::Mean)
        .build()
        .unwrap();
    let out = FeaturePipeline::new(spec).transform(&bike_sharing_table()).unwrap();

    assert_close(
        &f64_column(&out, "temp_window_2_mean"),
        &[None, None, Some(9.43), Some(9.02), Some(9.43)],
    );
}

#[test]
fn test_notebook_style_spec() {
    let spec = FeatureSpec::from_json_str(
        r#"{
            "calendar_attributes": ["day_of_week", "hour"],
            "rolling": [
                {"variable": "temp", "windows": [3], "functions": ["mean", "max", "min"]},
                {"variable": "hum", "windows": [3], "functions": ["mean"]}
            ],
            "lags": [
                {"variable": "temp", "lags": [1, 2]},
                {"variable": "count", "lags": [1]},
                {"variable": "season", "lags": [1]}
            ],
            "missing_value_policy": "ignore"
        }"#,
    )
    .unwrap();

    let out = FeaturePipeline::new(spec).transform(&bike_sharing_table()).unwrap();

    assert_eq!(
        out.column_names(),
        vec![
            "season",
            "temp",
            "hum",
            "count",
            "day_of_week",
            "hour",
            "temp_window_3_mean",
            "temp_window_3_max",
            "temp_window_3_min",
            "hum_window_3_mean",
            "temp_lag_1",
            "temp_lag_2",
            "count_lag_1",
            "season_lag_1",
        ]
    );

    let hours: Vec<Option<i32>> = out.column("hour").unwrap().i32().unwrap().into_iter().collect();
    assert_eq!(hours, vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);

    // 2011-01-01 was a Saturday
    let weekday: Vec<Option<i32>> = out.column("day_of_week").unwrap().i32().unwrap().into_iter().collect();
    assert!(weekday.iter().all(|d| *d == Some(5)));

    let count_lag: Vec<Option<i64>> = out.column("count_lag_1").unwrap().i64().unwrap().into_iter().collect();
    assert_eq!(count_lag, vec![None, Some(16), Some(40), Some(32), Some(13)]);

    assert_close(
        &f64_column(&out, "temp_window_3_max"),
        &[None, None, None, Some(9.84), Some(9.84)],
    );
}

#[test]
fn test_output_frame_has_time_column_first() {
    let spec = FeatureSpec::builder()
        .calendar(CalendarAttribute::Hour)
        .build()
        .unwrap();
    let out = FeaturePipeline::new(spec).transform(&bike_sharing_table()).unwrap();

    let frame = out.to_frame("datetime").unwrap();
    assert_eq!(frame.width(), 6);
    assert_eq!(frame.height(), 5);
    assert_eq!(frame.get_column_names()[0].as_str(), "datetime");
    assert!(matches!(frame.column("datetime").unwrap().dtype(), DataType::Datetime(_, _)));
}

// ============================================================================
// Referential transparency
// ============================================================================

#[test]
fn test_transform_is_deterministic() {
    let spec = FeatureSpec::builder()
        .calendar(CalendarAttribute::Hour)
        .rolling_windows("temp", &[2, 3], &[AggregationFn::Mean, AggregationFn::Std])
        .lags("hum", &[1, 3])
        .build()
        .unwrap();
    let pipeline = FeaturePipeline::new(spec);
    let table = bike_sharing_table();

    let first = pipeline.transform(&table).unwrap();
    let second = pipeline.transform(&table).unwrap();

    assert_eq!(first.index(), second.index());
    assert!(first.frame().equals_missing(second.frame()));
}

#[test]
fn test_rerun_on_original_columns_is_idempotent() {
    let spec = FeatureSpec::builder()
        .rolling("temp", 2, AggregationFn::Sum)
        .lags("temp", &[1])
        .build()
        .unwrap();
    let pipeline = FeaturePipeline::new(spec);
    let table = bike_sharing_table();
    let originals = table.column_names();

    let first = pipeline.transform(&table).unwrap();

    let original_frame = first
        .frame()
        .select(originals.iter().map(|s| s.as_str()))
        .unwrap();
    let subset = SeriesTable::new(first.index().to_vec(), original_frame.clone()).unwrap();
    let second = pipeline.transform(&subset).unwrap();

    assert!(first.frame().equals_missing(second.frame()));

    // Re-running on the enriched table recomputes its derived columns in place
    let third = pipeline.transform(&first).unwrap();
    assert_eq!(third.column_names(), first.column_names());
    assert!(first.frame().equals_missing(third.frame()));
    assert!(third
        .frame()
        .select(originals.iter().map(|s| s.as_str()))
        .unwrap()
        .equals_missing(&original_frame));
}

#[test]
fn test_input_is_not_mutated() {
    let table = bike_sharing_table();
    let before = table.frame().clone();

    let spec = FeatureSpec::builder().lags("temp", &[1]).build().unwrap();
    let _ = FeaturePipeline::new(spec).transform(&table).unwrap();

    assert!(table.frame().equals_missing(&before));
    assert_eq!(table.column_names(), vec!["season", "temp", "hum", "count"]);
}

// ============================================================================
// Grid handling
// ============================================================================

fn missing_hour_table() -> SeriesTable {
    let df = df!(
        "datetime" => &["2011-01-01 00:00:00", "2011-01-01 01:00:00", "2011-01-01 03:00:00"],
        "temp" => &[9.84, 9.02, 9.84]
    )
    .unwrap();
    SeriesTable::from_frame(&df, "datetime").unwrap()
}

#[test]
fn test_missing_hour_under_raise_fails_before_features() {
    let spec = FeatureSpec::builder()
        .calendar(CalendarAttribute::Hour)
        .missing_value_policy(MissingValuePolicy::Raise)
        .build()
        .unwrap();
    let err = FeaturePipeline::new(spec).transform(&missing_hour_table()).unwrap_err();

    match err {
        FeatureError::IrregularGrid { previous, current, .. } => {
            assert!(previous.starts_with("2011-01-01 01:00:00"));
            assert!(current.starts_with("2011-01-01 03:00:00"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_hour_is_irregular_under_every_default_policy() {
    for policy in [MissingValuePolicy::Ignore, MissingValuePolicy::Impute] {
        let spec = FeatureSpec::builder()
            .lags("temp", &[1])
            .missing_value_policy(policy)
            .build()
            .unwrap();
        let err = FeaturePipeline::new(spec).transform(&missing_hour_table()).unwrap_err();
        assert!(matches!(err, FeatureError::IrregularGrid { .. }), "{policy:?}");
    }
}

#[test]
fn test_missing_hour_filled_on_request() {
    let spec = FeatureSpec::from_json_str(
        r#"{"lags": [{"variable": "temp", "lags": [1]}], "fill_gaps": true}"#,
    )
    .unwrap();
    let out = FeaturePipeline::new(spec).transform(&missing_hour_table()).unwrap();

    assert_eq!(out.height(), 4);
    assert_eq!(
        f64_column(&out, "temp_lag_1"),
        vec![None, Some(9.84), Some(9.02), None]
    );
}

#[test]
fn test_irregular_grid_fails_before_features() {
    let df = df!(
        "datetime" => &["2011-01-01 00:00:00", "2011-01-01 01:00:00", "2011-01-01 02:30:00"],
        "temp" => &[9.84, 9.02, 9.84]
    )
    .unwrap();
    let table = SeriesTable::from_frame(&df, "datetime").unwrap();

    let spec = FeatureSpec::builder().lags("temp", &[1]).build().unwrap();
    let err = FeaturePipeline::new(spec).transform(&table).unwrap_err();
    assert!(matches!(err, FeatureError::IrregularGrid { .. }));
}

#[test]
fn test_declared_step_finds_gaps_inferred_step_would_hide() {
    let df = df!(
        "datetime" => &["2011-01-01 00:00:00", "2011-01-01 02:00:00", "2011-01-01 04:00:00"],
        "temp" => &[1.0, 2.0, 3.0]
    )
    .unwrap();
    let table = SeriesTable::from_frame(&df, "datetime").unwrap();

    let inferred = FeatureSpec::builder().lags("temp", &[1]).build().unwrap();
    let out = FeaturePipeline::new(inferred).transform(&table).unwrap();
    assert_eq!(out.height(), 3);
    assert_eq!(f64_column(&out, "temp_lag_1"), vec![None, Some(1.0), Some(2.0)]);

    let hourly = FeatureSpec::from_json_str(r#"{"lags": [{"variable": "temp", "lags": [1]}], "step": "1h"}"#).unwrap();
    let err = FeaturePipeline::new(hourly).transform(&table).unwrap_err();
    assert!(matches!(err, FeatureError::IrregularGrid { .. }));

    let hourly = FeatureSpec::from_json_str(
        r#"{"lags": [{"variable": "temp", "lags": [1]}], "step": "1h", "fill_gaps": true}"#,
    )
    .unwrap();
    let out = FeaturePipeline::new(hourly).transform(&table).unwrap();
    assert_eq!(out.height(), 5);
    assert_eq!(
        f64_column(&out, "temp_lag_1"),
        vec![None, Some(1.0), None, Some(2.0), None]
    );
}

#[test]
fn test_unsorted_input_rejected() {
    let df = df!(
        "datetime" => &["2011-01-01 01:00:00", "2011-01-01 00:00:00"],
        "temp" => &[9.84, 9.02]
    )
    .unwrap();
    let err = SeriesTable::from_frame(&df, "datetime").unwrap_err();
    assert!(matches!(err, FeatureError::UnsortedIndex { .. }));
}

#[test]
fn test_single_row_table() {
    let df = df!("datetime" => &["2011-01-01 00:00:00"], "temp" => &[9.84]).unwrap();
    let table = SeriesTable::from_frame(&df, "datetime").unwrap();

    let spec = FeatureSpec::builder()
        .calendar(CalendarAttribute::Hour)
        .rolling("temp", 3, AggregationFn::Mean)
        .lags("temp", &[1])
        .build()
        .unwrap();
    let out = FeaturePipeline::new(spec).transform(&table).unwrap();

    assert_eq!(out.height(), 1);
    assert_eq!(f64_column(&out, "temp_window_3_mean"), vec![None]);
    assert_eq!(f64_column(&out, "temp_lag_1"), vec![None]);
}

#[test]
fn test_empty_table() {
    let df = df!(
        "datetime" => Vec::<String>::new(),
        "temp" => Vec::<f64>::new()
    )
    .unwrap();
    let table = SeriesTable::from_frame(&df, "datetime").unwrap();

    let spec = FeatureSpec::builder()
        .calendar(CalendarAttribute::Hour)
        .lags("temp", &[1])
        .missing_value_policy(MissingValuePolicy::Raise)
        .build()
        .unwrap();
    let out = FeaturePipeline::new(spec).transform(&table).unwrap();
    assert_eq!(out.height(), 0);
    assert_eq!(out.column_names(), vec!["temp", "hour", "temp_lag_1"]);
}

// ============================================================================
// CLI
// ============================================================================

#[test]
fn test_cli_transform_writes_csv() {
    use std::io::Write;

    let data = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
    writeln!(data.as_file(), "datetime,temp,count").unwrap();
    for (hour, (temp, count)) in [(9.84, 16), (9.02, 40), (9.02, 32), (9.84, 13)].iter().enumerate() {
        writeln!(data.as_file(), "2011-01-01 {:02}:00:00,{},{}", hour, temp, count).unwrap();
    }
    data.as_file().flush().unwrap();

    let spec = tempfile::NamedTempFile::with_suffix(".json").unwrap();
    write!(
        spec.as_file(),
        r#"{{"calendar_attributes": ["hour"], "lags": [{{"variable": "temp", "lags": [1]}}]}}"#
    )
    .unwrap();
    spec.as_file().flush().unwrap();

    let output = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
    kolosal_features::cli::cmd_transform(data.path(), "datetime", spec.path(), Some(output.path()), 10, Some(2))
        .unwrap();

    let written = kolosal_features::cli::load_data(output.path()).unwrap();
    assert_eq!(written.height(), 4);
    assert_eq!(
        written
            .get_column_names()
            .iter()
            .map(|name| name.as_str())
            .collect::<Vec<_>>(),
        vec!["datetime", "temp", "count", "hour", "temp_lag_1"]
    );

    let table = SeriesTable::from_frame(&written, "datetime").unwrap();
    assert_eq!(
        f64_column(&table, "temp_lag_1"),
        vec![None, Some(9.84), Some(9.02), Some(9.02)]
    );
}
