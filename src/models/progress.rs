// src/models/progress.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default number of topics in a course curriculum.
pub const DEFAULT_TOTAL_TOPICS: i64 = 7;

/// One quiz score for a single topic. Unique per topic name within a
/// progress record: re-submission overwrites, never appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TopicScore {
    pub topic: String,
    pub score: f64,
}

/// Per-user, per-course progress record, assembled from the `progress`
/// row and its `topic_scores`. `topics_completed` is derived from the
/// score set and is never settable on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub id: i64,
    pub user_id: i64,
    pub course_name: String,
    pub topics_completed: i64,
    pub total_topics: i64,
    pub quiz_scores: Vec<TopicScore>,
}

impl ProgressRecord {
    /// Fresh record for a new enrollment: empty score set, default curriculum size.
    pub fn new(id: i64, user_id: i64, course_name: String, total_topics: i64) -> Self {
        Self {
            id,
            user_id,
            course_name,
            topics_completed: 0,
            total_topics,
            quiz_scores: Vec::new(),
        }
    }

    pub fn find_topic(&self, topic: &str) -> Option<&TopicScore> {
        self.quiz_scores.iter().find(|t| t.topic == topic)
    }

    /// Replaces the score for `topic` in place, or appends a new entry.
    /// The set grows by at most one, and `topics_completed` is recomputed
    /// from the set size afterwards. Idempotent under identical input.
    pub fn upsert_topic(&mut self, topic: &str, score: f64) {
        match self.quiz_scores.iter_mut().find(|t| t.topic == topic) {
            Some(existing) => existing.score = score,
            None => self.quiz_scores.push(TopicScore {
                topic: topic.to_string(),
                score,
            }),
        }
        self.topics_completed = self.quiz_scores.len() as i64;
    }

    /// Per-course summary: topic percentages plus the 2-decimal average.
    pub fn summary(&self) -> CourseSummary {
        let topics: Vec<TopicPercentage> = self
            .quiz_scores
            .iter()
            .map(|t| TopicPercentage {
                topic: t.topic.clone(),
                score_percentage: score_to_percentage(t.score),
            })
            .collect();

        let total_score: f64 = self.quiz_scores.iter().map(|t| t.score).sum();
        let total_possible = self.quiz_scores.len() as f64 * 10.0;
        let average = if total_possible > 0.0 {
            total_score / total_possible * 100.0
        } else {
            0.0
        };

        CourseSummary {
            course_name: self.course_name.clone(),
            topics,
            average_percentage: format!("{:.2}", average),
        }
    }
}

/// Converts a raw quiz score (0-10) to a rounded percentage.
/// Zero and non-finite scores short-circuit to 0 rather than propagating.
pub fn score_to_percentage(score: f64) -> i64 {
    if !score.is_finite() || score == 0.0 {
        return 0;
    }
    (score / 10.0 * 100.0).round() as i64
}

/// Cross-course summary over all of a user's progress records.
/// Short-circuits to zeros when the user has no enrollments.
pub fn overall_summary(records: &[ProgressRecord]) -> OverallSummary {
    if records.is_empty() {
        return OverallSummary {
            enrollment_count: 0,
            completed_topics: 0,
            overall_progress: "0.00".to_string(),
        };
    }

    let enrollment_count = records.len() as i64;
    let completed_topics: i64 = records.iter().map(|r| r.quiz_scores.len() as i64).sum();
    let total_score: f64 = records
        .iter()
        .flat_map(|r| r.quiz_scores.iter())
        .map(|t| t.score)
        .sum();
    let total_possible: f64 = records
        .iter()
        .map(|r| r.quiz_scores.len() as f64 * 10.0)
        .sum();

    let overall = if total_possible > 0.0 {
        total_score / total_possible * 100.0
    } else {
        0.0
    };

    OverallSummary {
        enrollment_count,
        completed_topics,
        overall_progress: format!("{:.2}", overall),
    }
}

/// One topic of a course summary, score expressed as a percentage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPercentage {
    pub topic: String,
    pub score_percentage: i64,
}

/// Per-course view returned by `/api/progress/user`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub course_name: String,
    pub topics: Vec<TopicPercentage>,
    pub average_percentage: String,
}

/// Homepage aggregate returned by `/api/progress/summary`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallSummary {
    pub enrollment_count: i64,
    pub completed_topics: i64,
    pub overall_progress: String,
}

/// DTO for enrolling in a course. A missing course name deserializes to an
/// empty string, which validation turns into a 400.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Course name is required"))]
    pub course_name: String,
}

/// DTO for saving a topic quiz score into a progress record.
/// `score` stays an Option so that an absent field is a 400, not a 422.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub course_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub topic: String,
    #[validate(range(min = 0.0, max = 10.0, message = "Score must be between 0 and 10"))]
    pub score: Option<f64>,
}
