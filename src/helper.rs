use std::fmt::Display;

use crate::runner::{Runner, RunnerResult};
use crate::{Resource, ServiceState};

/// Runs the given closure and reports any error with `error_state` instead of the resource.
pub fn safe_run<E, F>(closure: F, error_state: ServiceState) -> RunnerResult<E>
where
    E: Display,
    F: FnOnce() -> Result<Resource, E>,
{
    Runner::new()
        .on_error(move |_| error_state)
        .safe_run(closure)
}
