use mongodb::bson::oid::ObjectId;
use thiserror::Error;

/// Error kinds shared by every lifecycle operation. Each variant carries the
/// machine-readable code returned to the caller in the response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    Storage(&'static str),
}

impl ReportError {
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::Validation(code)
            | ReportError::NotFound(code)
            | ReportError::Conflict(code)
            | ReportError::Storage(code) => code,
        }
    }
}

/// Failure of the multi-step report submission. Once the report row has been
/// inserted there is no rollback: the id is handed back so the caller can
/// resume the remaining steps against the same report instead of filing a
/// duplicate.
#[derive(Debug)]
pub struct CreateError {
    pub report_id: Option<ObjectId>,
    pub error: ReportError,
}

impl CreateError {
    pub fn before(error: ReportError) -> Self {
        Self {
            report_id: None,
            error,
        }
    }
    pub fn partial(report_id: ObjectId, error: ReportError) -> Self {
        Self {
            report_id: Some(report_id),
            error,
        }
    }
}
