use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user-scoped grouping of sessions and skills, the unit over which an
/// external learner operates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSpace {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub meta: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionLearnStatus {
    Pending,
    Success,
    Failed,
}

/// `LearningSpaceSkill` junction row: unique by both `(space, skill_id)` and
/// `(space, skill_name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSpaceSkill {
    pub space_id: String,
    pub skill_id: String,
    pub skill_name: String,
}

/// `LearningSpaceSession` junction row: `session_id` is globally unique
/// across all spaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSpaceSession {
    pub space_id: String,
    pub session_id: String,
    pub status: SessionLearnStatus,
}
