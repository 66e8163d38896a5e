// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, SignupRequest, User, UserResponse},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{UserIdentity, sign_jwt},
    },
};

/// Registers a new user and signs them in.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created with a fresh token and the public user object.
pub async fn signup(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.validate().is_err() {
        return Err(AppError::ValidationError(
            "Please provide name, email, and password.".to_string(),
        ));
    }

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password)
        VALUES ($1, $2, $3)
        RETURNING id, name, email, password, created_at
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(&hashed_password)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        // Postgres error code for unique violation is 23505
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict("Email already registered".to_string())
        } else {
            tracing::error!("Failed to sign up user: {:?}", e);
            AppError::from(e)
        }
    })?;

    let token = sign_jwt(user.id, &user.email, &config.jwt_secret, config.jwt_expiration)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Signup successful",
            "token": token,
            "user": UserResponse::from(&user),
        })),
    ))
}

/// Authenticates a user and returns a JWT token.
///
/// Verifies email and password against the database. Bad credentials answer
/// 400 with a message that does not reveal which part was wrong.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, password, created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::from(e)
    })?;

    let user = user.ok_or_else(|| {
        AppError::ValidationError("Invalid email or password".to_string())
    })?;

    let is_valid = verify_password(&payload.password, &user.password)?;

    if !is_valid {
        return Err(AppError::ValidationError(
            "Invalid email or password".to_string(),
        ));
    }

    let token = sign_jwt(user.id, &user.email, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "message": "Login successful",
        "token": token,
        "user": UserResponse::from(&user),
    })))
}

/// Deletes the authenticated user's account.
///
/// Progress records and quiz attempts go with it via FK cascade.
pub async fn delete_account(
    State(pool): State<PgPool>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(identity.user_id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "message": "Account deleted successfully" })))
}
