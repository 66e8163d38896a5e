// src/handlers/quiz.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::progress::{fetch_progress, upsert_topic_score},
    models::{
        progress::DEFAULT_TOTAL_TOPICS,
        quiz::{QuizAttempt, SaveQuizRequest},
    },
    utils::jwt::UserIdentity,
};

/// Saves a quiz result and folds it into course progress.
///
/// Two independent writes: the append-only attempt log, then the topic
/// score upsert on the progress record. The log has no FK link to the
/// score set; it records what was submitted, not derived state.
/// Enrolls the user on the fly when no progress record exists yet.
pub async fn save_quiz(
    State(pool): State<PgPool>,
    Extension(identity): Extension<UserIdentity>,
    Json(payload): Json<SaveQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.validate().is_err() {
        return Err(AppError::ValidationError(
            "Missing required fields".to_string(),
        ));
    }
    let (score, total) = match (payload.score, payload.total) {
        (Some(score), Some(total)) => (score, total),
        _ => {
            return Err(AppError::ValidationError(
                "Missing required fields".to_string(),
            ));
        }
    };

    sqlx::query(
        r#"
        INSERT INTO quiz_attempts (user_id, course, topic, score, total)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(identity.user_id)
    .bind(&payload.course)
    .bind(&payload.topic)
    .bind(score)
    .bind(total)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to save quiz attempt: {:?}", e);
        AppError::from(e)
    })?;

    let progress = match fetch_progress(&pool, identity.user_id, &payload.course).await? {
        Some(record) => record,
        None => {
            sqlx::query(
                r#"
                INSERT INTO progress (user_id, course_name, total_topics)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, course_name) DO NOTHING
                "#,
            )
            .bind(identity.user_id)
            .bind(&payload.course)
            .bind(DEFAULT_TOTAL_TOPICS)
            .execute(&pool)
            .await?;

            fetch_progress(&pool, identity.user_id, &payload.course)
                .await?
                .ok_or_else(|| AppError::StorageError("Auto-enrollment failed".to_string()))?
        }
    };

    upsert_topic_score(&pool, progress.id, &payload.topic, score).await?;

    Ok(Json(json!({ "message": "Quiz saved successfully" })))
}

/// Full quiz attempt history for the user, newest first.
pub async fn quiz_history(
    State(pool): State<PgPool>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, user_id, course, topic, score, total, created_at
        FROM quiz_attempts
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(identity.user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch quiz history: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(attempts))
}
