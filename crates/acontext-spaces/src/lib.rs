pub mod service;
pub mod templates;

pub use service::SpaceService;
pub use templates::DEFAULT_SKILL_DIRS;
