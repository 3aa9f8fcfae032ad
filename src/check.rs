//! One run of the check: options in, report out.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::auth;
use crate::evaluator::evaluate;
use crate::monitoring::{MetricBackend, MonitoringClient};
use crate::options::CheckOptions;
use crate::query::MetricQuery;
use crate::{CheckError, PerfData, Resource};

/// Label of the perf data for the evaluated value.
pub const PERF_LABEL: &str = "value";

/// Builds the client for the real monitoring API. No request is sent yet.
pub fn connect(options: &CheckOptions) -> Result<MonitoringClient, CheckError> {
    let token = auth::resolve(options.access_token(), options.timeout())?;
    let client = MonitoringClient::new(options.endpoint(), &token, options.timeout())?;
    Ok(client)
}

/// Queries `backend` for the window ending at `now` and evaluates the result.
pub fn run_check<B>(
    options: &CheckOptions,
    backend: &B,
    now: DateTime<Utc>,
) -> Result<Resource, CheckError>
where
    B: MetricBackend + ?Sized,
{
    let query = MetricQuery::build(options, now);
    info!(
        resource = %query.resource_name(),
        filter = query.filter(),
        "querying time series"
    );

    let thresholds = options.thresholds();
    let evaluation = evaluate(
        backend.list_time_series(&query),
        thresholds,
        options.multiple_points(),
    )?;

    let mut resource = Resource::new();
    resource.extend(evaluation.results);
    if let Some(value) = evaluation.value {
        resource = resource.with_perf_data(
            PerfData::new(PERF_LABEL, value)
                .with_thresholds(thresholds.warning(), thresholds.critical()),
        );
    }

    info!(state = %resource.get_state(), "check finished");
    Ok(resource)
}
