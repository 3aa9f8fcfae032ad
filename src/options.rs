//! Command line options.
//!
//! The flags keep the camelCase spelling of the threshold options that existing nagios command
//! definitions use (`--criticalThreshold`, `--warningThreshold`); kebab-case aliases are accepted
//! as well.

use std::ffi::OsString;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};

pub const DEFAULT_ENDPOINT: &str = "https://monitoring.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("Missing filter param")]
    MissingFilter,
    #[error("Missing project param")]
    MissingProject,
    #[error("you must provide either criticalThreshold param or warningThreshold param")]
    MissingThreshold,
    #[error("invalid arguments: {}", summarize(.0))]
    Cli(#[from] clap::Error),
}

/// What to do when the first time series holds more than one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MultiplePoints {
    /// Fail the check with UNKNOWN
    #[default]
    Reject,
    /// Use the first point returned, which is the most recent one
    First,
    /// Use the mean of all points
    Mean,
}

/// Check a single Google Cloud Monitoring (Stackdriver) metric against thresholds.
///
/// The metric is aggregated with ALIGN_MEAN and REDUCE_MEAN over the last five minutes.
#[derive(Debug, Parser)]
#[command(
    name = "check-stackdriver",
    version,
    after_help = "Examples:

    Warn above 50 and go critical above 100 undelivered pubsub messages:

        check-stackdriver --project my-project \\
            --filter 'metric.type=\"pubsub.googleapis.com/subscription/num_undelivered_messages\"' \\
            --warningThreshold 50 --criticalThreshold 100"
)]
pub struct Cli {
    /// Time series filter
    #[arg(long)]
    pub filter: Option<String>,

    /// Name of the Google Cloud project containing the monitored resource
    #[arg(long)]
    pub project: Option<String>,

    /// Critical alert when the result is greater than this threshold
    #[arg(
        long = "criticalThreshold",
        short = 'c',
        visible_alias = "critical-threshold",
        value_name = "N",
        allow_negative_numbers = true
    )]
    pub critical_threshold: Option<i64>,

    /// Warning alert when the result is greater than this threshold
    #[arg(
        long = "warningThreshold",
        short = 'w',
        visible_alias = "warning-threshold",
        value_name = "N",
        allow_negative_numbers = true
    )]
    pub warning_threshold: Option<i64>,

    /// What to do when the result holds more than one point
    #[arg(long, value_enum, default_value_t = MultiplePoints::Reject)]
    pub multiple_points: MultiplePoints,

    /// Base url of the Cloud Monitoring API
    #[arg(long, default_value = DEFAULT_ENDPOINT, value_name = "URL")]
    pub endpoint: String,

    /// Timeout for each HTTP request
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_name = "SECONDS")]
    pub timeout: u64,

    /// OAuth2 access token. Application Default Credentials are used when absent
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Log more to stderr, may be repeated
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Validates the parsed flags into the options of a single check run.
    pub fn into_options(self) -> Result<CheckOptions, OptionsError> {
        let filter = non_blank(self.filter).ok_or(OptionsError::MissingFilter)?;
        let project = non_blank(self.project).ok_or(OptionsError::MissingProject)?;
        let thresholds = Thresholds::new(self.warning_threshold, self.critical_threshold)?;

        Ok(CheckOptions::new(filter, project, thresholds)
            .with_multiple_points(self.multiple_points)
            .with_endpoint(&self.endpoint)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_access_token(non_blank(self.access_token)))
    }
}

/// Parses and validates the given arguments, the first one being the binary name.
pub fn parse_from<I, T>(args: I) -> Result<CheckOptions, OptionsError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args)?.into_options()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// First line of a clap error without its `error: ` prefix.
fn summarize(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.trim_start_matches("error: ").trim().to_owned()
}

/// Warning and critical thresholds, at least one of which is set.
///
/// The thresholds are not checked against each other, a warning threshold above the critical one
/// is passed through as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    warning: Option<i64>,
    critical: Option<i64>,
}

impl Thresholds {
    pub fn new(warning: Option<i64>, critical: Option<i64>) -> Result<Self, OptionsError> {
        if warning.is_none() && critical.is_none() {
            return Err(OptionsError::MissingThreshold);
        }
        Ok(Thresholds { warning, critical })
    }

    pub fn warning(&self) -> Option<i64> {
        self.warning
    }

    pub fn critical(&self) -> Option<i64> {
        self.critical
    }
}

/// The validated configuration of one check run.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOptions {
    filter: String,
    project: String,
    thresholds: Thresholds,
    multiple_points: MultiplePoints,
    endpoint: String,
    timeout: Duration,
    access_token: Option<String>,
}

impl CheckOptions {
    pub fn new(filter: String, project: String, thresholds: Thresholds) -> Self {
        CheckOptions {
            filter,
            project,
            thresholds,
            multiple_points: MultiplePoints::default(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            access_token: None,
        }
    }

    pub fn with_multiple_points(mut self, multiple_points: MultiplePoints) -> Self {
        self.multiple_points = multiple_points;
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_owned();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_access_token(mut self, access_token: Option<String>) -> Self {
        self.access_token = access_token;
        self
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn multiple_points(&self) -> MultiplePoints {
        self.multiple_points
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<CheckOptions, OptionsError> {
        parse_from(std::iter::once("check-stackdriver").chain(args.iter().copied()))
    }

    #[test]
    fn validate_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn validate_argparse() {
        let options = parse(&[
            "--filter",
            "metric.type=x",
            "--project",
            "p",
            "--criticalThreshold",
            "100",
            "--warningThreshold=50",
        ])
        .unwrap();

        assert_eq!(options.filter(), "metric.type=x");
        assert_eq!(options.project(), "p");
        assert_eq!(options.thresholds().critical(), Some(100));
        assert_eq!(options.thresholds().warning(), Some(50));
        assert_eq!(options.multiple_points(), MultiplePoints::Reject);
        assert_eq!(options.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(options.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn validate_aliases_and_short_flags() {
        let options = parse(&[
            "--filter=f",
            "--project=p",
            "--critical-threshold=7",
            "-w",
            "3",
            "--multiple-points",
            "mean",
        ])
        .unwrap();

        assert_eq!(options.thresholds().critical(), Some(7));
        assert_eq!(options.thresholds().warning(), Some(3));
        assert_eq!(options.multiple_points(), MultiplePoints::Mean);
    }

    #[test]
    fn negative_thresholds_are_accepted() {
        let options = parse(&["--filter=f", "--project=p", "-c", "-5"]).unwrap();
        assert_eq!(options.thresholds().critical(), Some(-5));
        assert_eq!(options.thresholds().warning(), None);
    }

    #[test]
    fn inconsistent_thresholds_are_passed_through() {
        let options = parse(&["--filter=f", "--project=p", "-c", "10", "-w", "20"]).unwrap();
        assert_eq!(options.thresholds().critical(), Some(10));
        assert_eq!(options.thresholds().warning(), Some(20));
    }

    #[test]
    fn missing_filter() {
        let err = parse(&["--project=p", "-c", "1"]).unwrap_err();
        assert!(matches!(err, OptionsError::MissingFilter));

        let err = parse(&["--filter", "  ", "--project=p", "-c", "1"]).unwrap_err();
        assert!(matches!(err, OptionsError::MissingFilter));
    }

    #[test]
    fn missing_project() {
        let err = parse(&["--filter=f", "-c", "1"]).unwrap_err();
        assert!(matches!(err, OptionsError::MissingProject));

        let err = parse(&["--filter=f", "--project=", "-c", "1"]).unwrap_err();
        assert!(matches!(err, OptionsError::MissingProject));
    }

    #[test]
    fn missing_both_thresholds() {
        let err = parse(&["--filter=f", "--project=p"]).unwrap_err();
        assert!(matches!(err, OptionsError::MissingThreshold));
        assert_eq!(
            err.to_string(),
            "you must provide either criticalThreshold param or warningThreshold param"
        );
    }

    #[test]
    fn invalid_threshold_is_a_one_line_error() {
        let err = parse(&["--filter=f", "--project=p", "-c", "lots"]).unwrap_err();
        assert!(matches!(err, OptionsError::Cli(_)));

        let message = err.to_string();
        assert!(message.starts_with("invalid arguments: "), "{}", message);
        assert!(!message.contains('\n'), "{}", message);
    }

    #[test]
    fn blank_access_token_is_ignored() {
        let options = parse(&["--filter=f", "--project=p", "-c", "1", "--access-token", " "])
            .unwrap();
        assert_eq!(options.access_token(), None);

        let options = parse(&["--filter=f", "--project=p", "-c", "1", "--access-token=abc"])
            .unwrap();
        assert_eq!(options.access_token(), Some("abc"));
    }
}
