use crate::{
    config::AuthSettings,
    database::UserRepository,
    models::{AuthResponse, LoginRequest, SignupRequest, User, UserInfo, EMAIL_TAKEN},
    utils::AppError,
};
use actix_web::web;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const EMAIL_NOT_REGISTERED: &str = "Email not Registered, Please Signup";
pub const INCORRECT_PASSWORD: &str = "Incorrect Password";

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,           // user id (ObjectId hex)
    pub name: String,
    pub iat: usize,            // issued at
    pub exp: usize,            // expiration
    pub jti: String,           // JWT ID
    pub aud: String,           // audience
    pub iss: String,           // issuer
}

impl Claims {
    pub fn user_id(&self) -> Result<ObjectId, AppError> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("Access Denied: Invalid token".to_string()))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// Generate JWT token
pub fn generate_jwt(settings: &AuthSettings, user: &User) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_hex(),
        name: user.name.clone(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(settings.token_ttl_hours)).timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: settings.jwt_audience.clone(),
        iss: settings.jwt_issuer.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

// Verify JWT token
pub fn verify_token(settings: &AuthSettings, token: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[settings.jwt_audience.as_str()]);
    validation.set_issuer(&[settings.jwt_issuer.as_str()]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.jwt_secret.as_ref()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        log::debug!("Token rejected: {}", e);
        AppError::Unauthorized("Access Denied: Invalid token".to_string())
    })
}

fn auth_response(settings: &AuthSettings, user: &User) -> Result<AuthResponse, AppError> {
    Ok(AuthResponse {
        success: true,
        auth_token: generate_jwt(settings, user)?,
        user: UserInfo::from(user),
    })
}

// User signup
pub async fn signup(
    users: &dyn UserRepository,
    settings: &AuthSettings,
    request: &SignupRequest,
) -> Result<AuthResponse, AppError> {
    request.validate()?;

    let email = normalize_email(&request.email);

    if users.find_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest(EMAIL_TAKEN.to_string()));
    }

    // bcrypt is CPU-bound; keep it off the async workers
    let password = request.password.clone();
    let cost = settings.bcrypt_cost;
    let hashed_password = web::block(move || hash(password, cost)).await??;

    let new_user = User {
        id: ObjectId::new(),
        name: request.name.trim().to_string(),
        email,
        password: hashed_password,
        created_at: Utc::now().timestamp_millis(),
    };

    // Unique index still guards a concurrent signup with the same email
    users.insert(&new_user).await?;

    log::info!("✅ User registered successfully: {}", new_user.email);

    auth_response(settings, &new_user)
}

// User login
pub async fn login(
    users: &dyn UserRepository,
    settings: &AuthSettings,
    request: &LoginRequest,
) -> Result<AuthResponse, AppError> {
    request.validate()?;

    let user = users
        .find_by_email(&normalize_email(&request.email))
        .await?
        .ok_or_else(|| AppError::Unauthorized(EMAIL_NOT_REGISTERED.to_string()))?;

    let password = request.password.clone();
    let stored_hash = user.password.clone();
    let valid = web::block(move || verify(password, &stored_hash)).await??;

    if !valid {
        return Err(AppError::Unauthorized(INCORRECT_PASSWORD.to_string()));
    }

    auth_response(settings, &user)
}
