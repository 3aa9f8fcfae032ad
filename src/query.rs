//! Build the time series request for one check run.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::options::CheckOptions;

/// Length of the trailing window and of the alignment period.
pub const CHECK_INTERVAL_MINUTES: i64 = 5;

/// The closed time range `[start, end]` the query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    /// The window of the given length that ends at `now`.
    pub fn trailing(now: DateTime<Utc>, length: Duration) -> Self {
        TimeInterval {
            start: now - length,
            end: now,
        }
    }
}

/// How the points of a single series are aligned within an alignment period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aligner {
    Mean,
}

impl Aligner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aligner::Mean => "ALIGN_MEAN",
        }
    }
}

/// How the aligned series are combined into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Mean,
}

impl Reducer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Mean => "REDUCE_MEAN",
        }
    }
}

/// A `projects.timeSeries.list` request.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    project: String,
    filter: String,
    interval: TimeInterval,
    alignment_period: Duration,
    per_series_aligner: Aligner,
    cross_series_reducer: Reducer,
}

impl MetricQuery {
    /// The query of a check run that happens at `now`.
    pub fn build(options: &CheckOptions, now: DateTime<Utc>) -> Self {
        let window = Duration::minutes(CHECK_INTERVAL_MINUTES);
        MetricQuery {
            project: options.project().to_owned(),
            filter: options.filter().to_owned(),
            interval: TimeInterval::trailing(now, window),
            alignment_period: window,
            per_series_aligner: Aligner::Mean,
            cross_series_reducer: Reducer::Mean,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// The resource the time series are listed for: `projects/{project}`.
    pub fn resource_name(&self) -> String {
        format!("projects/{}", self.project)
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn interval(&self) -> &TimeInterval {
        &self.interval
    }

    pub fn alignment_period(&self) -> Duration {
        self.alignment_period
    }

    pub fn per_series_aligner(&self) -> Aligner {
        self.per_series_aligner
    }

    pub fn cross_series_reducer(&self) -> Reducer {
        self.cross_series_reducer
    }

    /// The REST query parameters of the request, without any page token.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("filter", self.filter.clone()),
            ("interval.startTime", timestamp(&self.interval.start)),
            ("interval.endTime", timestamp(&self.interval.end)),
            (
                "aggregation.alignmentPeriod",
                format!("{}s", self.alignment_period.num_seconds()),
            ),
            (
                "aggregation.perSeriesAligner",
                self.per_series_aligner.as_str().to_owned(),
            ),
            (
                "aggregation.crossSeriesReducer",
                self.cross_series_reducer.as_str().to_owned(),
            ),
        ]
    }
}

// RFC 3339 in UTC, truncated to whole seconds.
fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}
