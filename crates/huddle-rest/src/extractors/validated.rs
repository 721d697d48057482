//! Validated JSON extractor.
//!
//! Deserializes the body with `Json` and runs `validator` rules on it. Both
//! failures are reported as `INVALID_ARGUMENT`; rule violations carry
//! field-level details.

use crate::responses::ApiResponse;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use huddle_core::{field_errors, validation_errors_to_huddle_error, ErrorResponse, HuddleError};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

/// JSON extractor that validates the deserialized value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T> std::ops::Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Rejection type for validated JSON extraction.
#[derive(Debug)]
pub enum ValidatedJsonRejection {
    /// The body was not valid JSON for the target type.
    JsonError(JsonRejection),
    /// The value broke one or more validation rules.
    ValidationError(ValidationErrors),
}

impl IntoResponse for ValidatedJsonRejection {
    fn into_response(self) -> Response {
        let error_response = match self {
            Self::JsonError(rejection) => {
                ErrorResponse::from_error(&HuddleError::invalid_argument(format!("Invalid JSON: {}", rejection)))
            }
            Self::ValidationError(errors) => {
                let details = field_errors(&errors);
                ErrorResponse::from_error(&validation_errors_to_huddle_error(errors)).with_details(details)
            }
        };
        (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::error(error_response))).into_response()
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidatedJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidatedJsonRejection::JsonError)?;

        value.validate().map_err(ValidatedJsonRejection::ValidationError)?;

        Ok(ValidatedJson(value))
    }
}
