use std::cell::RefCell;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};

use check_stackdriver::evaluator::EvaluationError;
use check_stackdriver::monitoring::{
    ListTimeSeriesResponse, MetricBackend, MonitoringError, TimeSeries, TimeSeriesStream,
};
use check_stackdriver::options::{self, CheckOptions, MultiplePoints, OptionsError};
use check_stackdriver::query::MetricQuery;
use check_stackdriver::{run_check, safe_run, CheckError, ServiceState};

/// Serves canned pages and records the queries it was asked for.
struct FakeBackend {
    pages: Vec<String>,
    fail_with: Option<u16>,
    queries: RefCell<Vec<MetricQuery>>,
}

impl FakeBackend {
    fn with_pages(pages: Vec<&str>) -> Self {
        FakeBackend {
            pages: pages.into_iter().map(str::to_owned).collect(),
            fail_with: None,
            queries: RefCell::new(Vec::new()),
        }
    }

    fn failing(code: u16) -> Self {
        FakeBackend {
            pages: Vec::new(),
            fail_with: Some(code),
            queries: RefCell::new(Vec::new()),
        }
    }

    fn single_point(value: i64) -> Self {
        let page = format!(
            r#"{{"timeSeries": [{{"points": [{{"value": {{"int64Value": "{}"}}}}]}}]}}"#,
            value
        );
        FakeBackend::with_pages(vec![&page])
    }
}

impl MetricBackend for FakeBackend {
    fn list_time_series<'a>(&'a self, query: &MetricQuery) -> TimeSeriesStream<'a> {
        self.queries.borrow_mut().push(query.clone());

        if let Some(code) = self.fail_with {
            return Box::new(std::iter::once(Err(MonitoringError::Api {
                code,
                status: "UNAVAILABLE".to_owned(),
                message: "backend down".to_owned(),
            })));
        }

        let series: Vec<Result<TimeSeries, MonitoringError>> = self
            .pages
            .iter()
            .map(|page| serde_json::from_str::<ListTimeSeriesResponse>(page.as_str()))
            .flat_map(|page| match page {
                Ok(page) => page.time_series.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(MonitoringError::from(e))],
            })
            .collect();
        Box::new(series.into_iter())
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

fn options(args: &[&str]) -> Result<CheckOptions, OptionsError> {
    options::parse_from(std::iter::once("check-stackdriver").chain(args.iter().copied()))
}

fn default_options() -> CheckOptions {
    options(&[
        "--filter=metric.type=x",
        "--project=p",
        "--criticalThreshold=100",
        "--warningThreshold=50",
    ])
    .unwrap()
}

#[test]
fn value_between_thresholds_is_warning() -> Result<()> {
    let backend = FakeBackend::single_point(75);
    let resource = run_check(&default_options(), &backend, now())?;

    assert_eq!(resource.get_state(), ServiceState::Warning);
    assert_eq!(resource.exit_code(), 1);
    assert_eq!(
        resource.to_nagios_string(),
        "WARNING: value 75 is greater than warning threshold 50, Check succeeded | value=75;50;100"
    );
    Ok(())
}

#[test]
fn value_above_both_thresholds_is_critical() -> Result<()> {
    let backend = FakeBackend::single_point(150);
    let resource = run_check(&default_options(), &backend, now())?;

    assert_eq!(resource.get_state(), ServiceState::Critical);
    assert_eq!(resource.exit_code(), 2);
    assert_eq!(
        resource.to_nagios_string(),
        "CRITICAL: value 150 is greater than critical threshold 100, Check succeeded, \
         value 150 is greater than warning threshold 50 | value=150;50;100"
    );
    Ok(())
}

#[test]
fn value_below_thresholds_is_ok() -> Result<()> {
    let backend = FakeBackend::single_point(3);
    let resource = run_check(&default_options(), &backend, now())?;

    assert_eq!(resource.get_state(), ServiceState::Ok);
    assert_eq!(resource.to_nagios_string(), "OK: Check succeeded | value=3;50;100");
    Ok(())
}

#[test]
fn empty_stream_is_unknown() -> Result<()> {
    let backend = FakeBackend::with_pages(vec![r#"{}"#]);
    let resource = run_check(&default_options(), &backend, now())?;

    assert_eq!(resource.get_state(), ServiceState::Unknown);
    assert_eq!(resource.exit_code(), 3);
    assert_eq!(
        resource.to_nagios_string(),
        "UNKNOWN: Failed to perform check, No results returned from the monitoring API"
    );
    assert!(resource.perf_data().is_empty());
    Ok(())
}

#[test]
fn the_query_covers_the_last_five_minutes() -> Result<()> {
    let backend = FakeBackend::single_point(1);
    run_check(&default_options(), &backend, now())?;

    let queries = backend.queries.borrow();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].resource_name(), "projects/p");
    assert_eq!(queries[0].filter(), "metric.type=x");
    assert_eq!(
        queries[0].interval().start,
        Utc.with_ymd_and_hms(2026, 10, 19, 11, 55, 0).unwrap()
    );
    assert_eq!(queries[0].interval().end, now());
    Ok(())
}

#[test]
fn too_many_points_is_an_error() {
    let backend = FakeBackend::with_pages(vec![
        r#"{"timeSeries": [{"points": [{"value": {"int64Value": "1"}}, {"value": {"int64Value": "2"}}]}]}"#,
    ]);
    let err = run_check(&default_options(), &backend, now()).unwrap_err();

    assert!(matches!(
        err,
        CheckError::Evaluation(EvaluationError::TooManyPoints(2))
    ));
}

#[test]
fn too_many_points_with_first_policy() -> Result<()> {
    let backend = FakeBackend::with_pages(vec![
        r#"{"timeSeries": [{"points": [{"value": {"doubleValue": 120.7}}, {"value": {"int64Value": "2"}}]}]}"#,
    ]);
    let options = default_options().with_multiple_points(MultiplePoints::First);
    let resource = run_check(&options, &backend, now())?;

    assert_eq!(resource.get_state(), ServiceState::Critical);
    assert_eq!(resource.perf_data()[0].value(), 120);
    Ok(())
}

#[test]
fn backend_errors_are_reported_as_unknown() {
    let backend = FakeBackend::failing(503);
    let options = default_options();

    let result = safe_run(|| run_check(&options, &backend, now()), ServiceState::Unknown);

    assert_eq!(result.state(), ServiceState::Unknown);
    assert_eq!(
        result.to_nagios_string(),
        "UNKNOWN: Failed to perform check, failed to fetch time series: \
         monitoring API returned 503 UNAVAILABLE: backend down"
    );
}

#[test]
fn invalid_options_never_reach_the_backend() {
    let backend = FakeBackend::single_point(1);

    for args in [
        &["--project=p", "-c", "1"][..],
        &["--filter=f", "-c", "1"][..],
        &["--filter=f", "--project=p"][..],
    ] {
        let result = safe_run(
            || -> Result<_, CheckError> {
                let options = options(args)?;
                run_check(&options, &backend, now())
            },
            ServiceState::Unknown,
        );
        assert_eq!(result.state(), ServiceState::Unknown, "{:?}", args);
    }

    assert!(backend.queries.borrow().is_empty());
}
