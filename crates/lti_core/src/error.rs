use serde::Serialize;
use thiserror::Error;

pub type ResponseResult<T> = Result<T, ResponseError>;

/// Failure taxonomy of a solve request.
///
/// `DegenerateEquation`, `InvalidRequest` and `ForcingSyntax` reject the whole
/// request. The remaining variants are confined to one sub-path and end up as
/// diagnostics on the report.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ResponseError {
    #[error("Degenerate equation: leading coefficient of the order-{order} equation is zero")]
    DegenerateEquation { order: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Forcing function syntax error: {0}")]
    ForcingSyntax(String),

    #[error("Initial-condition system is singular (determinant = {determinant:e})")]
    SingularInitialSystem { determinant: f64 },

    #[error("Unsupported forcing term `{term}`: {reason}")]
    UnsupportedForcingTerm { term: String, reason: String },

    #[error("Integrator diverged at t = {time}: {reason}")]
    IntegratorDivergence { time: f64, reason: String },
}

impl ResponseError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ResponseError::InvalidRequest(message.into())
    }

    pub(crate) fn unsupported(term: impl Into<String>, reason: impl Into<String>) -> Self {
        ResponseError::UnsupportedForcingTerm {
            term: term.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn divergence(time: f64, reason: impl Into<String>) -> Self {
        ResponseError::IntegratorDivergence {
            time,
            reason: reason.into(),
        }
    }

    /// True for errors that abort the whole request instead of one sub-path.
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            ResponseError::DegenerateEquation { .. }
                | ResponseError::InvalidRequest(_)
                | ResponseError::ForcingSyntax(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_the_failing_detail() {
        let err = ResponseError::SingularInitialSystem { determinant: 1e-20 };
        assert!(format!("{err}").contains("1e-20"));

        let err = ResponseError::unsupported("t^2*exp(t)*sin(t)", "more than two primitives");
        let message = format!("{err}");
        assert!(message.contains("t^2*exp(t)*sin(t)"));
        assert!(message.contains("more than two primitives"));
    }

    #[test]
    fn only_request_errors_are_fatal() {
        assert!(ResponseError::DegenerateEquation { order: 2 }.is_request_fatal());
        assert!(ResponseError::invalid("missing y0").is_request_fatal());
        assert!(!ResponseError::divergence(1.0, "step underflow").is_request_fatal());
        assert!(!ResponseError::SingularInitialSystem { determinant: 0.0 }.is_request_fatal());
    }
}
