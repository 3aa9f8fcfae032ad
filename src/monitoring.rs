//! Interact with the Cloud Monitoring API
//!
//! This module defines the [`MetricBackend`] seam the check runs against, the wire types of
//! `projects.timeSeries.list` and a blocking HTTP client implementing the backend.
//!
//! Results are exposed as a lazy stream: nothing is requested until the first element is pulled,
//! and further pages are only fetched once the previous page has been consumed.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Deserializer};
use tracing::{debug, trace};

use crate::auth::AccessToken;
use crate::query::MetricQuery;

#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),
    #[error("access token is not a valid header value")]
    InvalidToken,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("monitoring API returned {code} {status}: {message}")]
    Api {
        code: u16,
        status: String,
        message: String,
    },
    #[error("error parsing monitoring API response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("gave up after {0} consecutive pages without time series")]
    TooManyEmptyPages(usize),
}

/// How many pages without any series are followed in a row before giving up.
pub const MAX_EMPTY_PAGES: usize = 20;

/// A lazily fetched sequence of time series.
pub type TimeSeriesStream<'a> = Box<dyn Iterator<Item = Result<TimeSeries, MonitoringError>> + 'a>;

/// Anything that can list time series for a query.
pub trait MetricBackend {
    fn list_time_series<'a>(&'a self, query: &MetricQuery) -> TimeSeriesStream<'a>;
}

/// One page of `projects.timeSeries.list`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTimeSeriesResponse {
    #[serde(default)]
    pub time_series: Vec<TimeSeries>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// All the points for one metric/resource combination
///
/// With a cross series reducer in place there is normally only one series per page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    #[serde(default)]
    pub metric: Option<LabeledType>,
    #[serde(default)]
    pub resource: Option<LabeledType>,
    #[serde(default)]
    pub metric_kind: Option<String>,
    #[serde(default)]
    pub value_type: Option<String>,
    /// Newest first
    #[serde(default)]
    pub points: Vec<Point>,
}

/// A metric or monitored resource: its type plus labels.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LabeledType {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub interval: Option<PointInterval>,
    pub value: TypedValue,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointInterval {
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
}

/// The value of a point. Exactly one of the fields is present on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypedValue {
    BoolValue(bool),
    Int64Value(#[serde(deserialize_with = "int64")] i64),
    DoubleValue(f64),
    StringValue(String),
    DistributionValue(Distribution),
}

impl TypedValue {
    /// The wire name of the value's type
    pub fn kind(&self) -> &'static str {
        match self {
            TypedValue::BoolValue(_) => "boolValue",
            TypedValue::Int64Value(_) => "int64Value",
            TypedValue::DoubleValue(_) => "doubleValue",
            TypedValue::StringValue(_) => "stringValue",
            TypedValue::DistributionValue(_) => "distributionValue",
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::BoolValue(v) => write!(f, "{}", v),
            TypedValue::Int64Value(v) => write!(f, "{}", v),
            TypedValue::DoubleValue(v) => write!(f, "{}", v),
            TypedValue::StringValue(v) => write!(f, "{:?}", v),
            TypedValue::DistributionValue(d) => write!(f, "distribution(mean {})", d.mean),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Distribution {
    #[serde(default, deserialize_with = "int64")]
    pub count: i64,
    #[serde(default)]
    pub mean: f64,
}

/// int64 values are encoded as JSON strings, but accept plain numbers too.
fn int64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Follows `nextPageToken` across pages.
///
/// The first page is requested on the first call to `next`. An error is yielded once and ends
/// the iteration, as does a run of more than [MAX_EMPTY_PAGES] empty pages.
pub struct Pager<F> {
    fetch: F,
    buffer: VecDeque<TimeSeries>,
    page_token: Option<String>,
    exhausted: bool,
    empty_pages: usize,
}

impl<F> Pager<F>
where
    F: FnMut(Option<&str>) -> Result<ListTimeSeriesResponse, MonitoringError>,
{
    pub fn new(fetch: F) -> Self {
        Pager {
            fetch,
            buffer: VecDeque::new(),
            page_token: None,
            exhausted: false,
            empty_pages: 0,
        }
    }
}

impl<F> Iterator for Pager<F>
where
    F: FnMut(Option<&str>) -> Result<ListTimeSeriesResponse, MonitoringError>,
{
    type Item = Result<TimeSeries, MonitoringError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(series) = self.buffer.pop_front() {
                return Some(Ok(series));
            }
            if self.exhausted {
                return None;
            }
            if self.empty_pages >= MAX_EMPTY_PAGES {
                self.exhausted = true;
                return Some(Err(MonitoringError::TooManyEmptyPages(self.empty_pages)));
            }

            match (self.fetch)(self.page_token.as_deref()) {
                Ok(page) => {
                    trace!(
                        series = page.time_series.len(),
                        has_next = page.next_page_token.is_some(),
                        "received page"
                    );
                    self.page_token = page.next_page_token.filter(|t| !t.is_empty());
                    self.exhausted = self.page_token.is_none();
                    if page.time_series.is_empty() {
                        self.empty_pages += 1;
                    } else {
                        self.empty_pages = 0;
                    }
                    self.buffer.extend(page.time_series);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn api_error(code: StatusCode, body: &str) -> MonitoringError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => MonitoringError::Api {
            code: code.as_u16(),
            status: parsed.error.status,
            message: parsed.error.message,
        },
        Err(_) => MonitoringError::Api {
            code: code.as_u16(),
            status: code.canonical_reason().unwrap_or_default().to_owned(),
            message: body.trim().chars().take(200).collect(),
        },
    }
}

/// Blocking client for the Cloud Monitoring v3 REST API.
pub struct MonitoringClient {
    http: Client,
    endpoint: Url,
}

impl fmt::Debug for MonitoringClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoringClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl MonitoringClient {
    pub fn new(
        endpoint: &str,
        token: &AccessToken,
        timeout: Duration,
    ) -> Result<Self, MonitoringError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| MonitoringError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(MonitoringError::InvalidEndpoint(endpoint.to_string()));
        }

        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", token.secret()))
            .map_err(|_| MonitoringError::InvalidToken)?;
        authorization.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(MonitoringClient { http, endpoint })
    }

    /// The full url of one page of the query.
    pub fn time_series_url(
        &self,
        query: &MetricQuery,
        page_token: Option<&str>,
    ) -> Result<Url, MonitoringError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| MonitoringError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend(&["v3", "projects", query.project(), "timeSeries"]);

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.query_pairs() {
                pairs.append_pair(key, &value);
            }
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }

        Ok(url)
    }

    fn fetch_page(
        &self,
        query: &MetricQuery,
        page_token: Option<&str>,
    ) -> Result<ListTimeSeriesResponse, MonitoringError> {
        let url = self.time_series_url(query, page_token)?;
        debug!(url = %url, "listing time series");

        let response = self.http.get(url).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl MetricBackend for MonitoringClient {
    fn list_time_series<'a>(&'a self, query: &MetricQuery) -> TimeSeriesStream<'a> {
        let query = query.clone();
        Box::new(Pager::new(move |page_token: Option<&str>| {
            self.fetch_page(&query, page_token)
        }))
    }
}
