use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

use crate::{api::AppState, services::auth_service, utils::AppError};

pub use crate::services::auth_service::Claims;

/// Custom header the web client sends the token in
pub const AUTH_TOKEN_HEADER: &str = "auth-token";

/// Verifies the signed token and stores its `Claims` in the request
/// extensions, where handlers read them through `web::ReqData<Claims>`.
/// Read-only requests (GET, HEAD, OPTIONS) pass through untouched.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

fn is_read_only(method: &Method) -> bool {
    [Method::GET, Method::HEAD, Method::OPTIONS].contains(method)
}

/// `auth-token: <jwt>` or `Authorization: Bearer <jwt>`
fn extract_token(req: &ServiceRequest) -> Option<String> {
    if let Some(value) = req.headers().get(AUTH_TOKEN_HEADER) {
        return value.to_str().ok().map(|s| s.trim().to_string());
    }

    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
}

fn authenticate(req: &ServiceRequest) -> Result<Claims, AppError> {
    let token = extract_token(req)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Access Denied: No token found".to_string()))?;

    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::Internal("AppState not registered".to_string()))?;

    auth_service::verify_token(&state.auth, &token)
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_read_only(req.method()) {
            let fut = self.service.call(req);
            return Box::pin(async move {
                let res = fut.await?;
                Ok(res.map_into_left_body())
            });
        }

        match authenticate(&req) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);

                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res.map_into_left_body())
                })
            }
            Err(e) => {
                log::warn!("🔒 {} {} rejected: {}", req.method(), req.path(), e);
                Box::pin(async move { Ok(req.error_response(e).map_into_right_body()) })
            }
        }
    }
}
