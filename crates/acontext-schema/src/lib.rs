//! Core types shared across the message pipeline, skill ingest, and
//! learning-space orchestrator.

mod asset;
mod error;
mod message;
mod part;
mod skill;
mod space;
mod task;

pub use asset::Asset;
pub use error::{CoreError, CoreResult};
pub use message::{
    Cursor, GeminiCallInfo, Message, Role, Session, SourceFormat, GEMINI_CALL_INFO_KEY, NAME_KEY,
    SOURCE_FORMAT_KEY,
};
pub use part::{Part, PartType};
pub use skill::{sanitize_skill_name, AgentSkill, SkillAssetMeta, SkillFileEntry};
pub use space::{LearningSpace, LearningSpaceSession, LearningSpaceSkill, SessionLearnStatus};
pub use task::{Task, TaskStatus};
