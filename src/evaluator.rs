//! Turn the time series returned for a query into check results.
//!
//! Only the first series is ever looked at. The evaluation starts from a successful result and
//! appends WARNING/CRITICAL results on top of it; reducing them to a single state is left to the
//! [`Resource`](crate::Resource) the results end up in.

use tracing::{debug, info};

use crate::monitoring::{MonitoringError, TimeSeries, TypedValue};
use crate::options::{MultiplePoints, Thresholds};
use crate::CheckResult;

pub const CHECK_SUCCEEDED: &str = "Check succeeded";
pub const NO_RESULTS: &str =
    "Failed to perform check, No results returned from the monitoring API";

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Failed to perform check, failed to fetch time series: {0}")]
    Fetch(#[source] MonitoringError),
    #[error(
        "Failed to perform check, too many points in result ({0}), refine filter and \
         aggregation params so that only 1 point is returned"
    )]
    TooManyPoints(usize),
    #[error("Failed to perform check, no points in result")]
    NoPoints,
    #[error("Failed to perform check, unsupported value type {0}")]
    UnsupportedValue(&'static str),
    #[error("Failed to perform check, value {0} is not a finite number")]
    NonFiniteValue(f64),
}

/// The outcome of looking at the first series.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Starts with the pre-seeded OK result.
    pub results: Vec<CheckResult>,
    /// The value compared against the thresholds, if a series was returned.
    pub value: Option<i64>,
}

/// Pulls at most one series out of `series` and compares its value against `thresholds`.
///
/// An empty stream is reported as an UNKNOWN result, every other problem as an error.
pub fn evaluate<I>(
    mut series: I,
    thresholds: &Thresholds,
    multiple_points: MultiplePoints,
) -> Result<Evaluation, EvaluationError>
where
    I: Iterator<Item = Result<TimeSeries, MonitoringError>>,
{
    let mut results = vec![CheckResult::ok(CHECK_SUCCEEDED)];

    let first = match series.next() {
        None => {
            info!("no time series returned");
            results.push(CheckResult::unknown(NO_RESULTS));
            return Ok(Evaluation {
                results,
                value: None,
            });
        }
        Some(Err(e)) => return Err(EvaluationError::Fetch(e)),
        Some(Ok(first)) => first,
    };

    let value = series_value(&first, multiple_points)?;
    debug!(value, "evaluating first time series");
    results.extend(compare(value, thresholds));

    Ok(Evaluation {
        results,
        value: Some(value),
    })
}

/// The results `value` triggers. Both thresholds are checked independently.
pub fn compare(value: i64, thresholds: &Thresholds) -> Vec<CheckResult> {
    let mut results = Vec::new();

    if let Some(critical) = thresholds.critical() {
        if value > critical {
            results.push(CheckResult::critical(format!(
                "value {} is greater than critical threshold {}",
                value, critical
            )));
        }
    }

    if let Some(warning) = thresholds.warning() {
        if value > warning {
            results.push(CheckResult::warning(format!(
                "value {} is greater than warning threshold {}",
                value, warning
            )));
        }
    }

    results
}

fn series_value(
    series: &TimeSeries,
    multiple_points: MultiplePoints,
) -> Result<i64, EvaluationError> {
    match (series.points.as_slice(), multiple_points) {
        ([], _) => Err(EvaluationError::NoPoints),
        ([point], _) => integer_value(&point.value),
        (points, MultiplePoints::Reject) => Err(EvaluationError::TooManyPoints(points.len())),
        ([first, ..], MultiplePoints::First) => integer_value(&first.value),
        (points, MultiplePoints::Mean) => {
            let sum = points.iter().try_fold(0i128, |sum, point| {
                integer_value(&point.value).map(|v| sum + i128::from(v))
            })?;
            // integer division truncates toward zero, and the mean of i64s fits an i64
            Ok((sum / points.len() as i128) as i64)
        }
    }
}

/// The integer a point value stands for. Floating point values are truncated toward zero.
pub fn integer_value(value: &TypedValue) -> Result<i64, EvaluationError> {
    match value {
        TypedValue::Int64Value(v) => Ok(*v),
        TypedValue::DoubleValue(v) => truncate(*v),
        TypedValue::DistributionValue(d) => truncate(d.mean),
        TypedValue::BoolValue(_) | TypedValue::StringValue(_) => {
            Err(EvaluationError::UnsupportedValue(value.kind()))
        }
    }
}

fn truncate(v: f64) -> Result<i64, EvaluationError> {
    if !v.is_finite() {
        return Err(EvaluationError::NonFiniteValue(v));
    }
    Ok(v.trunc() as i64)
}
