use thiserror::Error;

/// Validation and not-found errors surfaced to callers by string identifier.
///
/// `Display` renders exactly the identifier so callers can match on
/// `err.to_string()` or `anyhow::Error::downcast_ref::<CoreError>()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("session_not_found")]
    SessionNotFound,
    #[error("session_project_mismatch")]
    SessionProjectMismatch,
    #[error("session_already_learned")]
    SessionAlreadyLearned,
    #[error("skill_name_required")]
    SkillNameRequired,
    #[error("skill_description_required")]
    SkillDescriptionRequired,
    #[error("skill_missing_SKILL_md")]
    SkillMissingSkillMd,
    #[error("skill_already_exists")]
    SkillAlreadyExists,
    #[error("function_name_mismatch")]
    FunctionNameMismatch,
    #[error("function_id_mismatch")]
    FunctionIdMismatch,
    #[error("invalid_function_name")]
    InvalidFunctionName,
    #[error("invalid_tool_call_id")]
    InvalidToolCallId,
    #[error("no_available_call_info")]
    NoAvailableCallInfo,
    #[error("learning_space_not_found")]
    LearningSpaceNotFound,
    #[error("skill_not_found")]
    SkillNotFound,
    #[error("cursor_decode_failed")]
    CursorDecodeFailed,
    #[error("invalid_role")]
    InvalidRole,
    #[error("unsupported_source_format")]
    UnsupportedSourceFormat,
    #[error("invalid_part")]
    InvalidPart,
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
