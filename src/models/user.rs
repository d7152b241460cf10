use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

pub const EMAIL_TAKEN: &str = "User with this Email already exists";

/// User document (collection `users`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    /// bcrypt hash, never the plain password
    pub password: String,
    pub created_at: i64,
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct SignupRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "Enter a name"))]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(email(message = "Enter a valid Email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "Enter a 8 character password"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(email(message = "Enter the Email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Enter password"))]
    pub password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        UserInfo {
            id: user.id.to_hex(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub auth_token: String,
    pub user: UserInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::AppError;

    fn signup(name: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_signup_validation() {
        assert!(signup("Ana", "ana@example.com", "longenough").validate().is_ok());

        match signup("", "nope", "short").validate().map_err(AppError::from) {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["email", "name", "password"]);
                assert_eq!(errors[0].message, "Enter a valid Email");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_email_shape() {
        for email in ["reader@example.com", "first.last+tag@mail.example.org"] {
            assert!(signup("Ana", email, "longenough").validate().is_ok(), "{}", email);
        }
        for email in ["reader.example.com", "a@b@c.com", "@example.com", "re ader@example.com", ""] {
            assert!(signup("Ana", email, "longenough").validate().is_err(), "{}", email);
        }
    }

    #[test]
    fn test_request_fields_are_trimmed() {
        let request: SignupRequest = serde_json::from_value(serde_json::json!({
            "name": "   ",
            "email": "  ana@example.com ",
            "password": "longenough"
        }))
        .unwrap();
        assert_eq!(request.email, "ana@example.com");

        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(!errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_login_requires_password() {
        let request = LoginRequest {
            email: "ana@example.com".into(),
            password: String::new(),
        };
        let errors = request.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 1);
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_password_length_boundary() {
        assert!(signup("Ana", "ana@example.com", "1234567").validate().is_err());
        assert!(signup("Ana", "ana@example.com", "12345678").validate().is_ok());
    }

    #[test]
    fn test_auth_response_uses_camel_case() {
        let response = AuthResponse {
            success: true,
            auth_token: "t".into(),
            user: UserInfo { id: "1".into(), name: "Ana".into(), email: "a@b.co".into() },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["authToken"], "t");
    }
}
