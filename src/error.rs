//! Errors raised by the settlement core and by the HTTP service.
//!
//! - [`InvalidExpenseError`] is returned by [`aggregate`] when an expense
//!   is structurally invalid.
//! - [`ApiError`] is what the handlers return; it maps onto HTTP statuses.
//!
//! [`aggregate`]: crate::balance::aggregate
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

use crate::schemas::{Expense, UserId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidExpenseReason {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
    #[error("share of \"{user_id}\" is negative: {amount}")]
    NegativeShare { user_id: UserId, amount: Decimal },
    #[error("\"{0}\" appears more than once in the shares")]
    DuplicateShare(UserId),
    #[error("user id must not be empty")]
    EmptyUserId,
    #[error("nobody is assigned a share of this expense")]
    UnassignedShares,
    #[error("shares sum to {actual} but the expense amount is {expected}")]
    ShareMismatch { expected: Decimal, actual: Decimal },
}

/// An expense the aggregator refused, together with its position in the input.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid expense #{index} (\"{}\"): {reason}", .expense.description)]
pub struct InvalidExpenseError {
    pub index: usize,
    pub expense: Expense,
    pub reason: InvalidExpenseReason,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Couldn't find trip \"{0}\"")]
    NotFound(String),
    #[error("Trip \"{0}\" already exists")]
    Conflict(String),
    #[error(transparent)]
    InvalidExpense(#[from] InvalidExpenseError),
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Serialization(#[from] bson::ser::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidExpense(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}
