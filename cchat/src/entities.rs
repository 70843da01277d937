//! Configuration entities, sessions, and persisted messages.

use std::cmp::Ordering;
use std::time::SystemTime;

use ccommon::{AiModelId, CharacterId, MessageId, SessionId, SystemPromptId, UserProfileId};
use cprovider::Role;

use crate::ChatError;

pub const MAX_MESSAGE_CHARS: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserProfileId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

/// A configured model. `label` is sent to the chat backend verbatim, or names the
/// transcript backend through the `ClaudeCode` sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiModel {
    pub id: AiModelId,
    pub label: String,
    pub description: Option<String>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt {
    pub id: SystemPromptId,
    pub label: String,
    pub content: String,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

/// One conversation. Holds references to its configuration entities, never copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: SessionId,
    pub name: String,
    pub character_id: Option<CharacterId>,
    pub user_profile_id: Option<UserProfileId>,
    pub ai_model_id: Option<AiModelId>,
    pub system_prompt_id: Option<SystemPromptId>,
    pub pre_prompt: Option<String>,
    pub pre_prompt_enabled: bool,
    pub post_prompt: Option<String>,
    pub post_prompt_enabled: bool,
    pub created_at: SystemTime,
    pub last_activity_at: SystemTime,
}

impl ChatSession {
    pub fn new(id: SessionId, name: impl Into<String>) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            name: name.into(),
            character_id: None,
            user_profile_id: None,
            ai_model_id: None,
            system_prompt_id: None,
            pre_prompt: None,
            pre_prompt_enabled: false,
            post_prompt: None,
            post_prompt_enabled: false,
            created_at: now,
            last_activity_at: now,
        }
    }
}

/// A session with every reference resolved, as loaded for one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session: ChatSession,
    pub character: Option<Character>,
    pub user_profile: Option<UserProfile>,
    pub ai_model: Option<AiModel>,
    pub system_prompt: Option<SystemPrompt>,
}

impl SessionSnapshot {
    pub fn new(session: ChatSession) -> Self {
        Self {
            session,
            character: None,
            user_profile: None,
            ai_model: None,
            system_prompt: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.session.id
    }

    pub fn with_character(mut self, character: Character) -> Self {
        self.session.character_id = Some(character.id);
        self.character = Some(character);
        self
    }

    pub fn with_user_profile(mut self, user_profile: UserProfile) -> Self {
        self.session.user_profile_id = Some(user_profile.id);
        self.user_profile = Some(user_profile);
        self
    }

    pub fn with_ai_model(mut self, ai_model: AiModel) -> Self {
        self.session.ai_model_id = Some(ai_model.id);
        self.ai_model = Some(ai_model);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: SystemPrompt) -> Self {
        self.session.system_prompt_id = Some(system_prompt.id);
        self.system_prompt = Some(system_prompt);
        self
    }

    pub fn with_pre_prompt(mut self, text: impl Into<String>, enabled: bool) -> Self {
        self.session.pre_prompt = Some(text.into());
        self.session.pre_prompt_enabled = enabled;
        self
    }

    pub fn with_post_prompt(mut self, text: impl Into<String>, enabled: bool) -> Self {
        self.session.post_prompt = Some(text.into());
        self.session.post_prompt_enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl From<MessageRole> for Role {
    fn from(value: MessageRole) -> Self {
        match value {
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: SystemTime,
}

impl StoredMessage {
    /// Conversation order: timestamp first, insertion id as the tie-breaker.
    pub fn conversation_cmp(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub session_id: SessionId,
    pub role: MessageRole,
    pub content: String,
}

impl NewMessage {
    pub fn new(session_id: SessionId, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            session_id,
            role,
            content: content.into(),
        }
    }

    pub fn user(session_id: SessionId, content: impl Into<String>) -> Self {
        Self::new(session_id, MessageRole::User, content)
    }

    pub fn assistant(session_id: SessionId, content: impl Into<String>) -> Self {
        Self::new(session_id, MessageRole::Assistant, content)
    }
}

pub fn validate_message_content(content: &str) -> Result<(), ChatError> {
    if content.trim().is_empty() {
        return Err(ChatError::validation("message content must not be empty"));
    }

    let length = content.chars().count();
    if length > MAX_MESSAGE_CHARS {
        return Err(ChatError::validation(format!(
            "message content must be at most {MAX_MESSAGE_CHARS} characters, got {length}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::ChatErrorKind;

    fn message(id: i64, secs: u64) -> StoredMessage {
        StoredMessage {
            id: MessageId::new(id),
            session_id: SessionId::new(1),
            role: MessageRole::User,
            content: "x".to_string(),
            created_at: UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    #[test]
    fn conversation_order_breaks_timestamp_ties_by_id() {
        let mut messages = vec![message(3, 10), message(2, 10), message(1, 20)];
        messages.sort_by(StoredMessage::conversation_cmp);

        let ids: Vec<i64> = messages.iter().map(|m| m.id.get()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn content_validation_enforces_bounds() {
        assert!(validate_message_content("hello").is_ok());
        assert!(validate_message_content(&"é".repeat(MAX_MESSAGE_CHARS)).is_ok());

        let blank = validate_message_content(" \n\t").expect_err("blank should fail");
        assert_eq!(blank.kind, ChatErrorKind::Validation);

        let long = validate_message_content(&"a".repeat(MAX_MESSAGE_CHARS + 1))
            .expect_err("overlong should fail");
        assert_eq!(long.kind, ChatErrorKind::Validation);
    }

    #[test]
    fn message_roles_round_trip_through_strings() {
        assert_eq!(MessageRole::parse("user"), Some(MessageRole::User));
        assert_eq!(
            MessageRole::parse(MessageRole::Assistant.as_str()),
            Some(MessageRole::Assistant)
        );
        assert_eq!(MessageRole::parse("system"), None);
        assert_eq!(Role::from(MessageRole::Assistant), Role::Assistant);
    }
}
