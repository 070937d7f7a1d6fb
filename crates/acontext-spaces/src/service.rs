//! Learning-space orchestrator: bootstrap, session membership, skill
//! junctions, and the task-terminal hand-off. Follows the same ordered-step
//! request handler shape as `acontext-messages::service`'s `store_message`.

use std::sync::Arc;

use acontext_blob::BlobStore;
use acontext_bus::{Publisher, EXCHANGE_LEARNING_SKILL, ROUTING_KEY_LEARNING_SKILL_DISTILL};
use acontext_schema::{AgentSkill, CoreError, LearningSpace, SessionLearnStatus, TaskStatus};
use acontext_store::Store;
use anyhow::{anyhow, Result};
use serde_json::Value;
use uuid::Uuid;

use crate::templates::{self, DEFAULT_SKILL_DIRS};

pub struct SpaceService<'a> {
    store: &'a Store,
    blob: Arc<dyn BlobStore>,
    publisher: Option<&'a dyn Publisher>,
}

impl<'a> SpaceService<'a> {
    pub fn new(store: &'a Store, blob: Arc<dyn BlobStore>, publisher: Option<&'a dyn Publisher>) -> Self {
        Self { store, blob, publisher }
    }

    /// Inserts the space row, then bootstraps the default skill set from the
    /// embedded templates. Any bootstrap failure rolls back every skill
    /// already created plus the space row itself.
    pub async fn create(&self, project_id: &str, user_id: Option<String>, meta: Value) -> Result<LearningSpace> {
        let space = LearningSpace { id: Uuid::new_v4().to_string(), project_id: project_id.to_string(), user_id, meta };
        self.store.spaces().insert(&space).await?;

        let mut created: Vec<AgentSkill> = Vec::new();
        for dir in DEFAULT_SKILL_DIRS {
            let bootstrap_result = self.bootstrap_one(&space, dir, &mut created).await;
            if let Err(err) = bootstrap_result {
                let cleanup_err = self.rollback_bootstrap(&space.id, &created).await.err();
                return match cleanup_err {
                    Some(cleanup_err) => Err(anyhow!("{err}; cleanup also failed: {cleanup_err}")),
                    None => Err(err),
                };
            }
        }

        Ok(space)
    }

    async fn bootstrap_one(&self, space: &LearningSpace, dir: &str, created: &mut Vec<AgentSkill>) -> Result<()> {
        let scanned = templates::scan_template(dir)?;
        let skill = acontext_skills::create_from_scanned(
            self.store,
            self.blob.clone(),
            &space.project_id,
            space.user_id.clone(),
            scanned,
            serde_json::json!({"bootstrap_template": dir}),
        )
        .await?;
        self.store.spaces().include_skill(&space.id, &skill.id, &skill.name).await?;
        created.push(skill);
        Ok(())
    }

    /// Runs on a detached task so caller cancellation can't abort cleanup
    /// partway through; both the original failure and any cleanup errors
    /// are joined together by the caller.
    async fn rollback_bootstrap(&self, space_id: &str, created: &[AgentSkill]) -> Result<()> {
        let store = self.store.clone();
        let blob = self.blob.clone();
        let space_id = space_id.to_string();
        let created = created.to_vec();

        let task = tokio::spawn(async move {
            let mut errors = Vec::new();
            for skill in &created {
                if let Some(asset_meta) = &skill.asset_meta {
                    if let Err(err) = blob.delete_by_prefix(&asset_meta.key).await {
                        errors.push(err.to_string());
                    }
                }
                if let Err(err) = store.skills().delete(&skill.id).await {
                    errors.push(err.to_string());
                }
            }
            if let Err(err) = store.spaces().delete(&space_id).await {
                errors.push(err.to_string());
            }
            if errors.is_empty() {
                Ok(())
            } else {
                Err(anyhow!(errors.join("; ")))
            }
        });
        task.await.unwrap_or_else(|join_err| Err(anyhow!("cleanup task panicked: {join_err}")))
    }

    /// Learn(session): validate space + session exist and share
    /// `project_id`; the junction table's unique `session_id` column rejects
    /// a session already claimed by any space as `session_already_learned`.
    pub async fn learn(&self, space_id: &str, session_id: &str) -> Result<()> {
        let space = self.store.spaces().get(space_id).await?.ok_or(CoreError::LearningSpaceNotFound)?;
        let session = self.store.sessions().get(session_id).await?.ok_or(CoreError::SessionNotFound)?;
        if session.project_id != space.project_id {
            return Err(CoreError::SessionProjectMismatch.into());
        }
        self.store.spaces().learn_session(space_id, session_id).await?;
        Ok(())
    }

    /// IncludeSkill: reject if the skill is already linked to this space by
    /// ID or by name.
    pub async fn include_skill(&self, space_id: &str, skill_id: &str) -> Result<()> {
        self.store.spaces().get(space_id).await?.ok_or(CoreError::LearningSpaceNotFound)?;
        let skill = self.store.skills().get(skill_id).await?.ok_or(CoreError::SkillNotFound)?;

        let existing = self.store.spaces().list_skills(space_id).await?;
        if existing.iter().any(|s| s.skill_id == skill.id || s.skill_name == skill.name) {
            return Err(CoreError::SkillAlreadyExists.into());
        }

        self.store.spaces().include_skill(space_id, &skill.id, &skill.name).await?;
        Ok(())
    }

    /// ExcludeSkill: idempotent by `(space, skill)`.
    pub async fn exclude_skill(&self, space_id: &str, skill_id: &str) -> Result<()> {
        self.store.spaces().exclude_skill(space_id, skill_id).await?;
        Ok(())
    }

    /// Task-terminal hand-off: called from the task service whenever a task
    /// reaches a terminal status. Publish failures are logged and swallowed
    /// (§7, best-effort secondary effect) — they never fail the caller's
    /// status update.
    pub async fn notify_task_terminal(&self, project_id: &str, session_id: &str, task_id: &str, status: TaskStatus) {
        if !status.is_terminal() {
            return;
        }
        match self.store.spaces().exists_by_session_id(session_id).await {
            Ok(false) => {}
            Ok(true) => {
                if let Some(publisher) = self.publisher {
                    let payload = serde_json::json!({
                        "project_id": project_id,
                        "session_id": session_id,
                        "task_id": task_id,
                    });
                    if let Err(err) =
                        publisher.publish_json(EXCHANGE_LEARNING_SKILL, ROUTING_KEY_LEARNING_SKILL_DISTILL, payload).await
                    {
                        tracing::warn!(error = %err, task_id, "learning.skill.distill publish failed");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, session_id, "failed to check learning-space membership for task-terminal hand-off");
            }
        }
    }
}
