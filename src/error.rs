use crate::auth::AuthError;
use crate::evaluator::EvaluationError;
use crate::monitoring::MonitoringError;
use crate::options::OptionsError;

/// Everything that keeps a check from producing a regular report.
///
/// All variants are reported as UNKNOWN by the binary.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error("Failed to create client: {0}")]
    Auth(#[from] AuthError),
    #[error("Failed to create client: {0}")]
    Client(#[from] MonitoringError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}
