//! Unit tests for scenario reporting

use audioprobe_report::*;

#[test]
fn test_values_recorded_in_order() {
    let mut report = ScenarioReport::new("timestamp_scenario");
    report.add_value(
        "start_streaming_lag",
        12.0,
        MetricUnit::Ms,
        MetricDirection::LowerBetter,
    );
    report.add_value(
        "total_markers_actual",
        4.0,
        MetricUnit::Count,
        MetricDirection::Neutral,
    );

    assert_eq!(report.entries().len(), 2);
    assert_eq!(report.entries()[0].key, "start_streaming_lag");
    assert_eq!(report.value("total_markers_actual"), Some(4.0));
    assert_eq!(report.value("missing"), None);
}

#[test]
fn test_summary_metric() {
    let mut report = ScenarioReport::new("jitter_scenario");
    assert!(report.summary().is_none());
    report.set_summary(
        "average_jitter",
        1.5,
        MetricUnit::Ms,
        MetricDirection::LowerBetter,
    );
    let summary = report.summary().expect("summary set");
    assert_eq!(summary.key, "average_jitter");
    assert_eq!(summary.value, 1.5);
}

#[test]
fn test_json_round_trip() {
    let mut report = ScenarioReport::new("serialize_scenario");
    report.add_value(
        "continuity_ratio",
        1.0003,
        MetricUnit::Ratio,
        MetricDirection::Neutral,
    );
    let json = report.to_json().expect("serializable");
    assert!(json.contains("serialize_scenario"));
    assert!(json.contains("continuity_ratio"));

    let parsed: ScenarioReport = serde_json::from_str(&json).expect("parseable");
    assert_eq!(parsed.name, report.name);
    assert_eq!(parsed.value("continuity_ratio"), Some(1.0003));
}

#[test]
fn test_emit_does_not_panic_without_subscriber() {
    let mut report = ScenarioReport::new("emit_scenario");
    report.add_value("x", 1.0, MetricUnit::Count, MetricDirection::Neutral);
    report.emit();
}
