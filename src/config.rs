use crate::utils::AppError;

const DEFAULT_JWT_SECRET: &str = "default-secret-change-me";

/// Token and password-hash settings shared by the auth service and middleware
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_issuer: "book-review-service".to_string(),
            jwt_audience: "book-review-api".to_string(),
            token_ttl_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AuthSettings::default();

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Internal("DATABASE_URL must be set".to_string()))?;

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                log::warn!("⚠️  JWT_SECRET not set, using the insecure default");
                defaults.jwt_secret
            }
        };

        Ok(Config {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var(&lookup, "PORT", 5000)?,
            database_url,
            auth: AuthSettings {
                jwt_secret,
                jwt_issuer: lookup("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
                jwt_audience: lookup("JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
                token_ttl_hours: parse_var(&lookup, "JWT_EXPIRATION_HOURS", defaults.token_ttl_hours)?,
                bcrypt_cost: parse_var(&lookup, "BCRYPT_COST", defaults.bcrypt_cost)?,
            },
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Internal(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}
