//! The check_stackdriver crate implements a nagios/icinga check for a single Google Cloud
//! Monitoring (formerly Stackdriver) metric.
//!
//! A run queries the aggregated mean of a metric over the last five minutes, compares the value
//! against a warning and/or critical threshold and reports the outcome in the nagios plugin
//! convention: one status line on stdout and an exit code between 0 and 3.
//!
//! The report types in this module are independent of the monitoring backend and can be used on
//! their own:
//!
//! ```rust
//! # use check_stackdriver::{CheckResult, PerfData, Resource, ServiceState};
//! let resource = Resource::new()
//!     .with_result(CheckResult::ok("Check succeeded"))
//!     .with_result(CheckResult::warning("value 75 is greater than warning threshold 50"))
//!     .with_perf_data(PerfData::new("value", 75).with_thresholds(Some(50), Some(100)));
//!
//! assert_eq!(resource.get_state(), ServiceState::Warning);
//! assert_eq!(
//!     &resource.to_nagios_string(),
//!     "WARNING: value 75 is greater than warning threshold 50, Check succeeded | value=75;50;100"
//! );
//! ```

use std::fmt;
use std::process;

#[macro_use]
mod macros;

pub mod auth;
pub mod check;
pub mod error;
pub mod evaluator;
pub mod logging;
pub mod monitoring;
pub mod options;
pub mod query;

mod helper;
mod runner;

pub use crate::check::run_check;
pub use crate::error::CheckError;
pub use crate::helper::safe_run;
pub use crate::runner::{Runner, RunnerResult};

/// A Resource is the report of one check run, i.e. a single service from the perspective of
/// nagios.
///
/// Results are only ever appended. The reported state is the most severe state among all
/// results, so a pre-seeded OK result is simply outranked by a later WARNING or CRITICAL one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    results: Vec<CheckResult>,
    perf_data: Vec<PerfData>,
}

impl Resource {
    pub fn new() -> Resource {
        Resource::default()
    }

    pub fn with_result(mut self, result: CheckResult) -> Self {
        self.push(result);
        self
    }

    pub fn with_perf_data(mut self, perf_data: PerfData) -> Self {
        self.perf_data.push(perf_data);
        self
    }

    /// Appends a single result.
    pub fn push(&mut self, result: CheckResult) {
        self.results.push(result)
    }

    pub fn extend<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = CheckResult>,
    {
        self.results.extend(results)
    }

    pub fn perf_data(&self) -> &[PerfData] {
        &self.perf_data
    }

    /// The most severe state of all results. A resource without any results is unknown.
    pub fn get_state(&self) -> ServiceState {
        self.results
            .iter()
            .map(|r| r.state)
            .max()
            .unwrap_or(ServiceState::Unknown)
    }

    /// Returns a string which nagios understands to determine the service state.
    ///
    /// Messages of results that carry the final state come first, the remaining messages follow
    /// in the order they were added.
    pub fn to_nagios_string(&self) -> String {
        let state = self.get_state();
        let mut s = state.to_string();

        let (important, other): (Vec<&CheckResult>, Vec<&CheckResult>) =
            self.results.iter().partition(|r| r.state == state);
        let messages: Vec<&str> = important
            .into_iter()
            .chain(other)
            .map(|r| r.message.as_str())
            .filter(|m| !m.is_empty())
            .collect();

        if !messages.is_empty() {
            s.push_str(&format!(": {}", messages.join(", ")));
        }

        if !self.perf_data.is_empty() {
            s.push_str(" |");

            for perf_data in self.perf_data.iter() {
                s.push_str(&format!(" {}", perf_data.to_perf_string()));
            }
        }

        s
    }

    /// Will return the exit code of the determined state via Self::get_state.
    pub fn exit_code(&self) -> i32 {
        self.get_state().exit_code()
    }

    /// Will print Self::to_nagios_string and exit with the exit code from Self::exit_code
    pub fn print_and_exit(&self) -> ! {
        println!("{}", self.to_nagios_string());
        process::exit(self.exit_code());
    }
}

/// Represents a service state from nagios.
///
/// The ordering follows the exit codes, so UNKNOWN outranks CRITICAL when results are reduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    /// Returns the corresponding nagios exit code to signal the service state of self.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceState::Ok => 0,
            ServiceState::Warning => 1,
            ServiceState::Critical => 2,
            ServiceState::Unknown => 3,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Ok => "OK",
            ServiceState::Warning => "WARNING",
            ServiceState::Critical => "CRITICAL",
            ServiceState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A single outcome of a check with a human readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub state: ServiceState,
    pub message: String,
}

impl CheckResult {
    pub fn new(state: ServiceState, message: impl Into<String>) -> Self {
        CheckResult {
            state,
            message: message.into(),
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        CheckResult::new(ServiceState::Ok, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        CheckResult::new(ServiceState::Warning, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        CheckResult::new(ServiceState::Critical, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        CheckResult::new(ServiceState::Unknown, message)
    }
}

/// The purpose of ToPerfString is only so one can define custom representations of custom types
/// without using the ToString trait so we don't interfere with that.
///
/// Also used internally for generation of the final output.
pub trait ToPerfString {
    fn to_perf_string(&self) -> String;
}

impl_to_perf_string_on_to_string!(i64);

impl<T> ToPerfString for Option<T>
where
    T: ToPerfString,
{
    fn to_perf_string(&self) -> String {
        match self {
            Some(ref s) => s.to_perf_string(),
            None => String::new(),
        }
    }
}

/// A performance datum in the `label=value;warn;crit` format.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfData {
    label: String,
    value: i64,
    warning: Option<i64>,
    critical: Option<i64>,
}

impl PerfData {
    pub fn new(label: &str, value: i64) -> Self {
        PerfData {
            label: label.to_owned(),
            value,
            warning: None,
            critical: None,
        }
    }

    pub fn with_thresholds(mut self, warning: Option<i64>, critical: Option<i64>) -> Self {
        self.warning = warning;
        self.critical = critical;
        self
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

impl ToPerfString for PerfData {
    fn to_perf_string(&self) -> String {
        // replace `=`
        let label = self.label.replace('=', "_");

        // quote `'`
        let label = label.replace('\'', "''");

        // quote if contains spaces
        let label = if label.contains(' ') {
            format!("'{}'", label)
        } else {
            label
        };

        metric_string!(label, self.value, self.warning, self.critical)
    }
}
