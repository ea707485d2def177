// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, is_elevated},
    error::AppError,
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Display name shown to other room members.
    pub name: String,
    /// User's role (e.g., 'student', 'instructor', 'admin').
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn identity(&self) -> Result<Identity, AppError> {
        let id = self
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))?;
        Ok(Identity {
            id,
            name: self.name.clone(),
            role: self.role.clone(),
        })
    }
}

/// The caller as seen by handlers and the room. Read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub role: String,
}

impl Identity {
    pub fn is_elevated(&self) -> bool {
        is_elevated(&self.role)
    }
}

/// Claims of the short-lived token that hands a finished attempt to the results view.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ResultClaims {
    /// Owner of the attempt (User ID as string).
    pub sub: String,
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub exp: usize,
}

fn now_secs() -> Result<usize, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize)
}

/// Signs a new JWT for the user.
///
/// Tokens are normally issued by the identity provider; this is used by
/// tooling and tests that share the secret.
pub fn sign_jwt(
    identity: &Identity,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: identity.id.to_string(),
        name: identity.name.clone(),
        role: identity.role.clone(),
        exp: now_secs()? + expiration_seconds as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Issues a result token for a completed attempt, valid for `ttl_seconds`.
pub fn sign_result_token(
    attempt_id: i64,
    quiz_id: i64,
    user_id: i64,
    secret: &str,
    ttl_seconds: u64,
) -> Result<String, AppError> {
    let claims = ResultClaims {
        sub: user_id.to_string(),
        attempt_id,
        quiz_id,
        exp: now_secs()? + ttl_seconds as usize,
    };
    encode_result_claims(&claims, secret)
}

pub fn encode_result_claims(claims: &ResultClaims, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

pub fn verify_result_token(token: &str, secret: &str) -> Result<ResultClaims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Result token is invalid or expired".to_string()))?;

    Ok(token_data.claims)
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Axum Middleware: Authentication.
///
/// Intercepts requests, validates the 'Authorization: Bearer <token>' header.
/// If valid, injects the caller's `Identity` into the request extensions.
/// If invalid, returns 401 Unauthorized.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let identity = verify_jwt(token, &config.jwt_secret)
        .and_then(|claims| claims.identity())
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Axum Middleware: Instructor/Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Checks that the injected `Identity`
/// holds an elevated role. If not, returns 403 Forbidden.
pub async fn elevated_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !identity.is_elevated() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
