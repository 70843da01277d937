//! Write-side inputs for configuration entities and sessions.
//!
//! ```rust
//! use cmemory::{CharacterDraft, SessionDraft};
//! use ccommon::CharacterId;
//!
//! let character = CharacterDraft::new("Aria").with_description("A wandering bard.");
//! assert_eq!(character.description.as_deref(), Some("A wandering bard."));
//!
//! let session = SessionDraft::new("Tavern night")
//!     .with_character(CharacterId::new(1))
//!     .with_post_prompt("Stay in character.", true);
//! assert!(session.post_prompt_enabled);
//! ```

use std::time::SystemTime;

use cchat::{AiModel, Character, SystemPrompt, UserProfile};
use ccommon::{AiModelId, CharacterId, SystemPromptId, UserProfileId};
use serde::{Deserialize, Serialize};

use crate::MemoryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDraft {
    pub name: String,
    pub description: Option<String>,
}

impl CharacterDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfileDraft {
    pub name: String,
    pub description: Option<String>,
}

impl UserProfileDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiModelDraft {
    pub label: String,
    pub description: Option<String>,
}

impl AiModelDraft {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPromptDraft {
    pub label: String,
    pub content: String,
}

impl SystemPromptDraft {
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }
}

/// Full replacement of a session's configuration; activity timestamps are store-managed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDraft {
    pub name: String,
    pub character_id: Option<CharacterId>,
    pub user_profile_id: Option<UserProfileId>,
    pub ai_model_id: Option<AiModelId>,
    pub system_prompt_id: Option<SystemPromptId>,
    pub pre_prompt: Option<String>,
    pub pre_prompt_enabled: bool,
    pub post_prompt: Option<String>,
    pub post_prompt_enabled: bool,
}

impl SessionDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_character(mut self, character_id: CharacterId) -> Self {
        self.character_id = Some(character_id);
        self
    }

    pub fn with_user_profile(mut self, user_profile_id: UserProfileId) -> Self {
        self.user_profile_id = Some(user_profile_id);
        self
    }

    pub fn with_ai_model(mut self, ai_model_id: AiModelId) -> Self {
        self.ai_model_id = Some(ai_model_id);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt_id: SystemPromptId) -> Self {
        self.system_prompt_id = Some(system_prompt_id);
        self
    }

    pub fn with_pre_prompt(mut self, text: impl Into<String>, enabled: bool) -> Self {
        self.pre_prompt = Some(text.into());
        self.pre_prompt_enabled = enabled;
        self
    }

    pub fn with_post_prompt(mut self, text: impl Into<String>, enabled: bool) -> Self {
        self.post_prompt = Some(text.into());
        self.post_prompt_enabled = enabled;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), MemoryError> {
        require_text("session name", &self.name)
    }
}

/// Storage shape shared by the four catalog entities: a searchable key and a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CatalogRow {
    pub id: i64,
    pub key: String,
    pub body: Option<String>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

pub(crate) trait CatalogEntity: Sized {
    type Id: Copy + Into<i64> + From<i64>;
    type Draft;

    const TABLE: &'static str;
    const KEY_COLUMN: &'static str;
    const BODY_COLUMN: &'static str;
    /// Column of `sessions` that references this entity.
    const SESSION_COLUMN: &'static str;
    const NOUN: &'static str;

    fn split_draft(draft: Self::Draft) -> Result<(String, Option<String>), MemoryError>;

    fn from_row(row: CatalogRow) -> Self;
}

impl CatalogEntity for Character {
    type Id = CharacterId;
    type Draft = CharacterDraft;

    const TABLE: &'static str = "characters";
    const KEY_COLUMN: &'static str = "name";
    const BODY_COLUMN: &'static str = "description";
    const SESSION_COLUMN: &'static str = "character_id";
    const NOUN: &'static str = "character";

    fn split_draft(draft: CharacterDraft) -> Result<(String, Option<String>), MemoryError> {
        require_text("character name", &draft.name)?;
        Ok((draft.name, draft.description))
    }

    fn from_row(row: CatalogRow) -> Self {
        Self {
            id: CharacterId::new(row.id),
            name: row.key,
            description: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl CatalogEntity for UserProfile {
    type Id = UserProfileId;
    type Draft = UserProfileDraft;

    const TABLE: &'static str = "user_profiles";
    const KEY_COLUMN: &'static str = "name";
    const BODY_COLUMN: &'static str = "description";
    const SESSION_COLUMN: &'static str = "user_profile_id";
    const NOUN: &'static str = "user profile";

    fn split_draft(draft: UserProfileDraft) -> Result<(String, Option<String>), MemoryError> {
        require_text("user profile name", &draft.name)?;
        Ok((draft.name, draft.description))
    }

    fn from_row(row: CatalogRow) -> Self {
        Self {
            id: UserProfileId::new(row.id),
            name: row.key,
            description: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl CatalogEntity for AiModel {
    type Id = AiModelId;
    type Draft = AiModelDraft;

    const TABLE: &'static str = "ai_models";
    const KEY_COLUMN: &'static str = "label";
    const BODY_COLUMN: &'static str = "description";
    const SESSION_COLUMN: &'static str = "ai_model_id";
    const NOUN: &'static str = "AI model";

    fn split_draft(draft: AiModelDraft) -> Result<(String, Option<String>), MemoryError> {
        require_text("AI model label", &draft.label)?;
        Ok((draft.label, draft.description))
    }

    fn from_row(row: CatalogRow) -> Self {
        Self {
            id: AiModelId::new(row.id),
            label: row.key,
            description: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl CatalogEntity for SystemPrompt {
    type Id = SystemPromptId;
    type Draft = SystemPromptDraft;

    const TABLE: &'static str = "system_prompts";
    const KEY_COLUMN: &'static str = "label";
    const BODY_COLUMN: &'static str = "content";
    const SESSION_COLUMN: &'static str = "system_prompt_id";
    const NOUN: &'static str = "system prompt";

    fn split_draft(draft: SystemPromptDraft) -> Result<(String, Option<String>), MemoryError> {
        require_text("system prompt label", &draft.label)?;
        Ok((draft.label, Some(draft.content)))
    }

    fn from_row(row: CatalogRow) -> Self {
        Self {
            id: SystemPromptId::new(row.id),
            label: row.key,
            content: row.body.unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<(), MemoryError> {
    if value.trim().is_empty() {
        return Err(MemoryError::invalid_request(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Case-insensitive substring match used by every `search_*` operation.
pub(crate) fn matches_query(value: &str, query: &str) -> bool {
    value.to_lowercase().contains(&query.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryErrorKind;

    #[test]
    fn blank_keys_are_rejected() {
        let error = Character::split_draft(CharacterDraft::new("  ")).expect_err("blank name");
        assert_eq!(error.kind, MemoryErrorKind::InvalidRequest);

        let error = SessionDraft::new("").validate().expect_err("blank session name");
        assert_eq!(error.kind, MemoryErrorKind::InvalidRequest);
    }

    #[test]
    fn system_prompt_rows_keep_content_as_body() {
        let (label, body) = SystemPrompt::split_draft(SystemPromptDraft::new("default", "Be kind."))
            .expect("valid draft");
        assert_eq!(label, "default");
        assert_eq!(body.as_deref(), Some("Be kind."));
    }

    #[test]
    fn session_drafts_decode_with_defaults() {
        let draft: SessionDraft =
            serde_json::from_str(r#"{"name":"Tavern","ai_model_id":4}"#).expect("decode");
        assert_eq!(draft.ai_model_id, Some(AiModelId::new(4)));
        assert!(!draft.post_prompt_enabled);
        assert!(draft.character_id.is_none());
    }

    #[test]
    fn query_matching_ignores_case() {
        assert!(matches_query("Aria the Bard", "bard"));
        assert!(matches_query("Aria", ""));
        assert!(!matches_query("Aria", "sam"));
    }
}
