//! Conversation rendering for the two backend families.

use cprovider::Message;

use crate::{SessionSnapshot, StoredMessage};

/// Everything both formatting modes consume for one generation.
#[derive(Debug, Clone, Copy)]
pub struct ConversationInput<'a> {
    pub system_prompt: &'a str,
    pub history: &'a [StoredMessage],
    pub post_prompt: Option<&'a str>,
    pub post_prompt_enabled: bool,
    pub new_message: &'a str,
}

impl<'a> ConversationInput<'a> {
    pub fn from_snapshot(
        snapshot: &'a SessionSnapshot,
        system_prompt: &'a str,
        history: &'a [StoredMessage],
        new_message: &'a str,
    ) -> Self {
        Self {
            system_prompt,
            history,
            post_prompt: snapshot.session.post_prompt.as_deref(),
            post_prompt_enabled: snapshot.session.post_prompt_enabled,
            new_message,
        }
    }

    fn active_post_prompt(&self) -> Option<&'a str> {
        if !self.post_prompt_enabled {
            return None;
        }

        self.post_prompt
            .map(str::trim)
            .filter(|post_prompt| !post_prompt.is_empty())
    }
}

/// Role/content sequence for chat-completion style backends.
pub fn format_structured(input: &ConversationInput<'_>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(input.history.len() + 3);
    messages.push(Message::system(input.system_prompt));
    messages.extend(
        input
            .history
            .iter()
            .map(|message| Message::new(message.role.into(), message.content.clone())),
    );

    if let Some(post_prompt) = input.active_post_prompt() {
        messages.push(Message::system(post_prompt));
    }

    messages.push(Message::user(input.new_message));
    messages
}

/// Flattened `User:` / `Assistant:` transcript for line-oriented backends.
///
/// The system prompt is not embedded and the post-prompt is not injected.
pub fn format_transcript(input: &ConversationInput<'_>) -> String {
    let mut lines: Vec<String> = input
        .history
        .iter()
        .map(|message| format!("{}: {}", speaker(message), message.content))
        .collect();
    lines.push(format!("User: {}", input.new_message));
    lines.join("\n")
}

fn speaker(message: &StoredMessage) -> &'static str {
    match message.role {
        crate::MessageRole::User => "User",
        crate::MessageRole::Assistant => "Assistant",
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use ccommon::{MessageId, SessionId};
    use cprovider::Role;

    use super::*;
    use crate::MessageRole;

    fn history() -> Vec<StoredMessage> {
        vec![
            StoredMessage {
                id: MessageId::new(1),
                session_id: SessionId::new(1),
                role: MessageRole::User,
                content: "Hello".to_string(),
                created_at: SystemTime::now(),
            },
            StoredMessage {
                id: MessageId::new(2),
                session_id: SessionId::new(1),
                role: MessageRole::Assistant,
                content: "Hi there!".to_string(),
                created_at: SystemTime::now(),
            },
        ]
    }

    fn input<'a>(
        history: &'a [StoredMessage],
        post_prompt: Option<&'a str>,
        enabled: bool,
    ) -> ConversationInput<'a> {
        ConversationInput {
            system_prompt: "prompt",
            history,
            post_prompt,
            post_prompt_enabled: enabled,
            new_message: "New message",
        }
    }

    #[test]
    fn structured_mode_without_post_prompt_yields_four_entries() {
        let history = history();
        let messages = format_structured(&input(&history, None, false));

        assert_eq!(
            messages,
            vec![
                Message::system("prompt"),
                Message::user("Hello"),
                Message::assistant("Hi there!"),
                Message::user("New message"),
            ]
        );
    }

    #[test]
    fn structured_mode_inserts_enabled_post_prompt_before_new_message() {
        let history = history();
        let messages = format_structured(&input(&history, Some("  Reply briefly. "), true));

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[3], Message::system("Reply briefly."));
        assert_eq!(messages[4].role, Role::User);
    }

    #[test]
    fn structured_mode_skips_disabled_or_blank_post_prompt() {
        let history = history();
        assert_eq!(format_structured(&input(&history, Some("text"), false)).len(), 4);
        assert_eq!(format_structured(&input(&history, Some("  "), true)).len(), 4);
    }

    #[test]
    fn transcript_mode_flattens_history_and_new_message() {
        let history = history();
        let transcript = format_transcript(&input(&history, Some("ignored"), true));

        assert_eq!(transcript, "User: Hello\nAssistant: Hi there!\nUser: New message");
    }

    #[test]
    fn transcript_mode_with_empty_history_is_single_line() {
        let transcript = format_transcript(&input(&[], None, false));
        assert_eq!(transcript, "User: New message");
    }
}
