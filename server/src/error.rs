use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use error_stack::Report;
use kernel::{KernelError, Precondition};
use serde::Serialize;
use std::process::{ExitCode, Termination};
use tracing::error;

#[derive(Debug)]
pub struct StackTrace(Report<KernelError>);

impl From<Report<KernelError>> for StackTrace {
    fn from(e: Report<KernelError>) -> Self {
        StackTrace(e)
    }
}

impl Termination for StackTrace {
    fn report(self) -> ExitCode {
        self.0.report()
    }
}

#[derive(Debug)]
pub struct ErrorStatus(Report<KernelError>);

impl From<Report<KernelError>> for ErrorStatus {
    fn from(e: Report<KernelError>) -> Self {
        ErrorStatus(e)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn precondition_code(reason: &Precondition) -> &'static str {
    match reason {
        Precondition::Unavailable => "unavailable",
        Precondition::LoanLimitExceeded => "loan_limit_exceeded",
        Precondition::AccountInactive => "account_inactive",
        Precondition::LoanNotActive => "loan_not_active",
        Precondition::ReservationNotReady => "reservation_not_ready",
        Precondition::ReservationExpired => "reservation_expired",
        Precondition::DuplicateReservation => "duplicate_reservation",
        Precondition::ReservationAlreadyCompleted => "reservation_already_completed",
        Precondition::ReservationWrongState => "reservation_wrong_state",
    }
}

impl ErrorStatus {
    fn status(&self) -> (StatusCode, &'static str) {
        match self.0.current_context() {
            KernelError::Validation => (StatusCode::BAD_REQUEST, "validation"),
            KernelError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            KernelError::Precondition(reason) => {
                (StatusCode::UNPROCESSABLE_ENTITY, precondition_code(reason))
            }
            KernelError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            KernelError::Conflict => (StatusCode::CONFLICT, "conflict"),
            KernelError::StoreUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
            KernelError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ErrorStatus {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status();
        if status.is_server_error() {
            error!("{:?}", self.0);
        }
        let body = ErrorBody {
            error: code,
            message: self.0.current_context().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kernel_errors_map_onto_statuses() {
        let cases = [
            (KernelError::Validation, StatusCode::BAD_REQUEST),
            (KernelError::NotFound, StatusCode::NOT_FOUND),
            (
                KernelError::Precondition(Precondition::LoanLimitExceeded),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (KernelError::Forbidden, StatusCode::FORBIDDEN),
            (KernelError::Conflict, StatusCode::CONFLICT),
            (KernelError::StoreUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (KernelError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            let response = ErrorStatus::from(Report::new(error)).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn precondition_names_the_reason() {
        let status = ErrorStatus::from(Report::new(KernelError::from(
            Precondition::DuplicateReservation,
        )));
        assert_eq!(status.status().1, "duplicate_reservation");
    }
}
