// src/handlers/progress.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::progress::{
        CourseSummary, DEFAULT_TOTAL_TOPICS, EnrollRequest, ProgressRecord, TopicPercentage,
        UpdateProgressRequest, overall_summary,
    },
    utils::jwt::UserIdentity,
};

/// Flat row of a progress record joined with its topic scores.
/// Topic columns are NULL for enrollments with no quiz taken yet.
#[derive(sqlx::FromRow)]
struct ProgressTopicRow {
    id: i64,
    user_id: i64,
    course_name: String,
    total_topics: i64,
    topic: Option<String>,
    score: Option<f64>,
}

/// Groups joined rows back into `ProgressRecord`s.
/// Rows must be sorted by progress id.
fn assemble(rows: Vec<ProgressTopicRow>) -> Vec<ProgressRecord> {
    let mut records: Vec<ProgressRecord> = Vec::new();
    for row in rows {
        if records.last().map(|r| r.id) != Some(row.id) {
            records.push(ProgressRecord::new(
                row.id,
                row.user_id,
                row.course_name,
                row.total_topics,
            ));
        }
        // Rows come from a UNIQUE(progress_id, topic) table, so this
        // only ever appends.
        if let (Some(record), Some(topic), Some(score)) =
            (records.last_mut(), row.topic, row.score)
        {
            record.upsert_topic(&topic, score);
        }
    }
    records
}

/// Loads one progress record with its topic scores, if the user is enrolled.
pub async fn fetch_progress(
    pool: &PgPool,
    user_id: i64,
    course_name: &str,
) -> Result<Option<ProgressRecord>, AppError> {
    let rows = sqlx::query_as::<_, ProgressTopicRow>(
        r#"
        SELECT p.id, p.user_id, p.course_name, p.total_topics, t.topic, t.score
        FROM progress p
        LEFT JOIN topic_scores t ON t.progress_id = p.id
        WHERE p.user_id = $1 AND p.course_name = $2
        ORDER BY p.id, t.topic
        "#,
    )
    .bind(user_id)
    .bind(course_name)
    .fetch_all(pool)
    .await?;

    Ok(assemble(rows).into_iter().next())
}

/// Loads all of a user's progress records with their topic scores.
async fn fetch_all_progress(pool: &PgPool, user_id: i64) -> Result<Vec<ProgressRecord>, AppError> {
    let rows = sqlx::query_as::<_, ProgressTopicRow>(
        r#"
        SELECT p.id, p.user_id, p.course_name, p.total_topics, t.topic, t.score
        FROM progress p
        LEFT JOIN topic_scores t ON t.progress_id = p.id
        WHERE p.user_id = $1
        ORDER BY p.id, t.topic
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(assemble(rows))
}

/// Writes one topic score into a progress record.
///
/// A single conditional upsert keyed on (progress_id, topic): concurrent
/// submissions for the same topic cannot lose updates, and the score set
/// grows by at most one row.
pub async fn upsert_topic_score(
    pool: &PgPool,
    progress_id: i64,
    topic: &str,
    score: f64,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO topic_scores (progress_id, topic, score)
        VALUES ($1, $2, $3)
        ON CONFLICT (progress_id, topic) DO UPDATE SET score = EXCLUDED.score
        "#,
    )
    .bind(progress_id)
    .bind(topic)
    .bind(score)
    .execute(pool)
    .await?;

    Ok(())
}

/// Creates the user's progress record for a course, or returns the existing
/// one. Re-enrolling is a safe no-op, not a conflict.
pub async fn enroll(
    State(pool): State<PgPool>,
    Extension(identity): Extension<UserIdentity>,
    Json(payload): Json<EnrollRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.validate().is_err() {
        return Err(AppError::ValidationError(
            "Course name is required".to_string(),
        ));
    }

    if let Some(existing) = fetch_progress(&pool, identity.user_id, &payload.course_name).await? {
        return Ok((
            StatusCode::OK,
            Json(json!({
                "message": "Already enrolled — returning existing course data",
                "progress": existing,
            })),
        ));
    }

    // ON CONFLICT DO NOTHING keeps the (user, course) invariant even when
    // two enrollments race; the loser falls back to the winner's record.
    let inserted = sqlx::query_as::<_, (i64,)>(
        r#"
        INSERT INTO progress (user_id, course_name, total_topics)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, course_name) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(identity.user_id)
    .bind(&payload.course_name)
    .bind(DEFAULT_TOTAL_TOPICS)
    .fetch_optional(&pool)
    .await?;

    match inserted {
        Some((id,)) => {
            let record = ProgressRecord::new(
                id,
                identity.user_id,
                payload.course_name.clone(),
                DEFAULT_TOTAL_TOPICS,
            );
            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "message": "Enrolled successfully",
                    "progress": record,
                })),
            ))
        }
        None => {
            let existing = fetch_progress(&pool, identity.user_id, &payload.course_name)
                .await?
                .ok_or_else(|| AppError::StorageError("Enrollment lookup failed".to_string()))?;
            Ok((
                StatusCode::OK,
                Json(json!({
                    "message": "Already enrolled — returning existing course data",
                    "progress": existing,
                })),
            ))
        }
    }
}

/// Lists every course the user is enrolled in, with full progress records.
pub async fn list_courses(
    State(pool): State<PgPool>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let records = fetch_all_progress(&pool, identity.user_id).await?;
    Ok(Json(records))
}

/// Topic-wise progress for a single course, scores as percentages.
pub async fn course_topics(
    State(pool): State<PgPool>,
    Extension(identity): Extension<UserIdentity>,
    Path(course_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = fetch_progress(&pool, identity.user_id, &course_name)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    let topics: Vec<TopicPercentage> = record.summary().topics;
    Ok(Json(topics))
}

/// Records a topic quiz score on an existing enrollment.
///
/// Upserts by topic name, then returns the refreshed record with its
/// recomputed `topicsCompleted`.
pub async fn update_progress(
    State(pool): State<PgPool>,
    Extension(identity): Extension<UserIdentity>,
    Json(payload): Json<UpdateProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(e) = payload.validate() {
        tracing::debug!("Rejected progress update: {}", e);
        return Err(AppError::ValidationError(
            "Missing required fields".to_string(),
        ));
    }
    let score = payload.score.ok_or_else(|| {
        AppError::ValidationError("Missing required fields".to_string())
    })?;

    let record = fetch_progress(&pool, identity.user_id, &payload.course_name)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    upsert_topic_score(&pool, record.id, &payload.topic, score).await?;

    let progress = fetch_progress(&pool, identity.user_id, &payload.course_name)
        .await?
        .ok_or_else(|| AppError::StorageError("Progress vanished mid-update".to_string()))?;

    Ok(Json(json!({
        "message": "Progress updated successfully",
        "progress": progress,
    })))
}

/// Cross-course aggregate for the homepage.
pub async fn summary(
    State(pool): State<PgPool>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let records = fetch_all_progress(&pool, identity.user_id).await?;
    Ok(Json(overall_summary(&records)))
}

/// Per-course summaries for the user's dashboard.
pub async fn user_progress(
    State(pool): State<PgPool>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let records = fetch_all_progress(&pool, identity.user_id).await?;
    let formatted: Vec<CourseSummary> = records.iter().map(|r| r.summary()).collect();
    Ok(Json(formatted))
}
