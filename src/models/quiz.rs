// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'quiz_attempts' table in the database.
/// Append-only audit log of every quiz submission; written independently
/// of the topic score set kept on the progress record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub course: String,
    pub topic: String,
    pub score: f64,
    pub total: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for saving a quiz result. Numeric fields are Options so a missing
/// field maps to a 400, not a deserialization rejection.
#[derive(Debug, Deserialize, Validate)]
pub struct SaveQuizRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub course: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub topic: String,
    #[validate(range(min = 0.0, max = 10.0, message = "Score must be between 0 and 10"))]
    pub score: Option<f64>,
    #[validate(range(min = 1, message = "Total must be positive"))]
    pub total: Option<i64>,
}
