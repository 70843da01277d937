//! System prompt assembly from a session's configuration entities.
//!
//! ```rust
//! use cchat::{ChatSession, SessionSnapshot, assemble_system_prompt};
//! use ccommon::SessionId;
//!
//! let snapshot = SessionSnapshot::new(ChatSession::new(SessionId::new(1), "demo"))
//!     .with_pre_prompt("  Stay in character.  ", true);
//! let prompt = assemble_system_prompt(&snapshot);
//!
//! assert_eq!(
//!     prompt.text,
//!     "Stay in character.\n---\nNo character description provided\n---\nNo user description provided"
//! );
//! assert!(prompt.missing_system_prompt);
//! ```

use crate::SessionSnapshot;

pub const PROMPT_SEGMENT_SEPARATOR: &str = "\n---\n";
pub const NO_CHARACTER_DESCRIPTION: &str = "No character description provided";
pub const NO_USER_DESCRIPTION: &str = "No user description provided";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub text: String,
    /// Set when the session has no usable system prompt entity; the segment is omitted.
    pub missing_system_prompt: bool,
}

/// Joins pre-prompt, system prompt, character, and user-profile segments.
///
/// Segments are trimmed before joining and empty segments are dropped, so the result
/// never contains a doubled separator.
pub fn assemble_system_prompt(snapshot: &SessionSnapshot) -> AssembledPrompt {
    let session = &snapshot.session;
    let mut segments: Vec<&str> = Vec::with_capacity(4);

    if session.pre_prompt_enabled {
        if let Some(pre_prompt) = non_blank(session.pre_prompt.as_deref()) {
            segments.push(pre_prompt);
        }
    }

    let system_prompt = non_blank(
        snapshot
            .system_prompt
            .as_ref()
            .map(|prompt| prompt.content.as_str()),
    );
    if let Some(content) = system_prompt {
        segments.push(content);
    }

    segments.push(
        non_blank(
            snapshot
                .character
                .as_ref()
                .and_then(|character| character.description.as_deref()),
        )
        .unwrap_or(NO_CHARACTER_DESCRIPTION),
    );

    segments.push(
        non_blank(
            snapshot
                .user_profile
                .as_ref()
                .and_then(|profile| profile.description.as_deref()),
        )
        .unwrap_or(NO_USER_DESCRIPTION),
    );

    AssembledPrompt {
        text: segments.join(PROMPT_SEGMENT_SEPARATOR),
        missing_system_prompt: system_prompt.is_none(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use ccommon::{CharacterId, SessionId, SystemPromptId, UserProfileId};

    use super::*;
    use crate::{Character, ChatSession, SystemPrompt, UserProfile};

    fn base() -> SessionSnapshot {
        SessionSnapshot::new(ChatSession::new(SessionId::new(1), "s"))
    }

    fn character(description: Option<&str>) -> Character {
        Character {
            id: CharacterId::new(1),
            name: "Aria".to_string(),
            description: description.map(str::to_string),
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        }
    }

    fn profile(description: Option<&str>) -> UserProfile {
        UserProfile {
            id: UserProfileId::new(1),
            name: "Sam".to_string(),
            description: description.map(str::to_string),
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        }
    }

    fn system_prompt(content: &str) -> SystemPrompt {
        SystemPrompt {
            id: SystemPromptId::new(1),
            label: "default".to_string(),
            content: content.to_string(),
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        }
    }

    #[test]
    fn all_segments_join_in_fixed_order_after_trimming() {
        let snapshot = base()
            .with_pre_prompt("\n pre \n", true)
            .with_system_prompt(system_prompt("  system  "))
            .with_character(character(Some("\tcharacter\t")))
            .with_user_profile(profile(Some(" user ")));

        let prompt = assemble_system_prompt(&snapshot);
        assert_eq!(prompt.text, "pre\n---\nsystem\n---\ncharacter\n---\nuser");
        assert!(!prompt.missing_system_prompt);
    }

    #[test]
    fn disabled_pre_prompt_never_appears() {
        let snapshot = base()
            .with_pre_prompt("secret pre-prompt", false)
            .with_system_prompt(system_prompt("system"));

        let prompt = assemble_system_prompt(&snapshot);
        assert!(!prompt.text.contains("secret pre-prompt"));
        assert!(prompt.text.starts_with("system\n---\n"));
    }

    #[test]
    fn enabled_but_blank_pre_prompt_is_omitted() {
        let snapshot = base()
            .with_pre_prompt("   ", true)
            .with_system_prompt(system_prompt("system"));

        let prompt = assemble_system_prompt(&snapshot);
        assert_eq!(
            prompt.text,
            format!("system\n---\n{NO_CHARACTER_DESCRIPTION}\n---\n{NO_USER_DESCRIPTION}")
        );
    }

    #[test]
    fn missing_system_prompt_is_omitted_and_flagged() {
        let snapshot = base()
            .with_character(character(Some("character")))
            .with_user_profile(profile(Some("user")));

        let prompt = assemble_system_prompt(&snapshot);
        assert_eq!(prompt.text, "character\n---\nuser");
        assert!(prompt.missing_system_prompt);
    }

    #[test]
    fn absent_or_blank_descriptions_use_fallbacks() {
        let snapshot = base()
            .with_system_prompt(system_prompt("system"))
            .with_character(character(None))
            .with_user_profile(profile(Some("  ")));

        let prompt = assemble_system_prompt(&snapshot);
        assert_eq!(
            prompt.text,
            format!("system\n---\n{NO_CHARACTER_DESCRIPTION}\n---\n{NO_USER_DESCRIPTION}")
        );
    }

    #[test]
    fn segments_carry_no_outer_whitespace() {
        let snapshot = base()
            .with_pre_prompt(" a ", true)
            .with_system_prompt(system_prompt(" b "))
            .with_character(character(Some(" c ")))
            .with_user_profile(profile(Some(" d ")));

        let prompt = assemble_system_prompt(&snapshot);
        for segment in prompt.text.split(PROMPT_SEGMENT_SEPARATOR) {
            assert_eq!(segment, segment.trim());
            assert!(!segment.is_empty());
        }
    }
}
