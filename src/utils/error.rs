use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

/// Field-level validation message, rendered inside `errors: [...]`
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Validation(Vec<FieldError>),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    DatabaseError(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                write!(f, "Validation failed: {}", fields.join(", "))
            }
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation(errors) => serde_json::json!({
                "success": false,
                "errors": errors
            }),
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg) => serde_json::json!({
                "success": false,
                "error": msg
            }),
            // Detail stays in the server log
            AppError::DatabaseError(_) | AppError::Internal(_) => {
                log::error!("❌ {}", self);
                serde_json::json!({
                    "success": false,
                    "error": "Internal Server Error"
                })
            }
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

/// One `FieldError` per failed rule, ordered by field name
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let errors = fields
            .into_iter()
            .flat_map(|(field, failures)| {
                failures.iter().map(move |failure| {
                    let message = failure
                        .message
                        .as_deref()
                        .unwrap_or(&failure.code);
                    FieldError::new(&field, message)
                })
            })
            .collect();

        AppError::Validation(errors)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Password hashing failed: {}", err))
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(format!("Blocking task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;

    fn body_json(err: &AppError) -> serde_json::Value {
        let bytes = err.error_response().into_body().try_into_bytes().unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Validation(vec![]).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::DatabaseError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_masked() {
        let body = body_json(&AppError::DatabaseError("connection refused at 10.0.0.3".into()));
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(body["success"], false);
    }

    #[test]
    fn test_validator_errors_become_field_errors() {
        let mut errors = validator::ValidationErrors::new();
        let mut short = validator::ValidationError::new("length");
        short.message = Some("Enter a 8 character password".into());
        errors.add("password", short);
        errors.add("email", validator::ValidationError::new("email"));

        match AppError::from(errors) {
            AppError::Validation(fields) => assert_eq!(
                fields,
                vec![
                    FieldError::new("email", "email"),
                    FieldError::new("password", "Enter a 8 character password"),
                ]
            ),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_lists_fields() {
        let body = body_json(&AppError::Validation(vec![
            FieldError::new("email", "Enter a valid Email"),
            FieldError::new("password", "Enter a 8 character password"),
        ]));
        assert_eq!(body["errors"][0]["field"], "email");
        assert_eq!(body["errors"][1]["message"], "Enter a 8 character password");
    }
}
