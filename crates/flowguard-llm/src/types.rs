use serde::{Deserialize, Serialize};

// ─── Role ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

// ─── ChatMessage ──────────────────────────────────────────────────────────

/// One turn of a prompt. Pipeline stages send a system message carrying the
/// instructions followed by a single user message carrying the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Split a message list into the joined system prompt and the remaining
/// conversation turns. Backends that take the system prompt out-of-band
/// (the Messages API, the CLI's `--system-prompt`) use this.
pub fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<&ChatMessage>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let rest = messages.iter().filter(|m| m.role != Role::System).collect();
    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_system_joins_system_turns() {
        let msgs = vec![
            ChatMessage::system("a"),
            ChatMessage::user("question"),
            ChatMessage::system("b"),
        ];
        let (system, rest) = split_system(&msgs);
        assert_eq!(system.as_deref(), Some("a\n\nb"));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].content, "question");
    }

    #[test]
    fn split_system_without_system_turns() {
        let msgs = vec![ChatMessage::user("q")];
        let (system, rest) = split_system(&msgs);
        assert!(system.is_none());
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_string(&ChatMessage::assistant("x")).unwrap();
        assert!(json.contains("\"assistant\""));
    }
}
