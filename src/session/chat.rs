//! Chat history kept for the lifetime of a session

use crate::llm::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of chats shown in the history listing
pub const HISTORY_LIMIT: usize = 50;

/// Name of a chat until its first prompt arrives
pub const DEFAULT_CHAT_NAME: &str = "New Chat";

const CHAT_NAME_MAX_CHARS: usize = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Chat not found: {0}")]
    NotFound(String),
}

/// A message in a chat transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Tool-usage annotation rendered above the content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }
}

/// A named conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    messages: Vec<ChatMessage>,
}

impl Chat {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: DEFAULT_CHAT_NAME.to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Append a message; the first user prompt names the chat
    pub fn push(&mut self, message: ChatMessage) {
        if self.name == DEFAULT_CHAT_NAME && message.role == Role::User {
            let name = chat_name_from_prompt(&message.content);
            if !name.is_empty() {
                self.name = name;
            }
        }
        self.messages.push(message);
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}

fn chat_name_from_prompt(prompt: &str) -> String {
    let line = prompt.lines().next().unwrap_or("").trim();
    if line.chars().count() > CHAT_NAME_MAX_CHARS {
        let head: String = line.chars().take(CHAT_NAME_MAX_CHARS).collect();
        format!("{}...", head.trim_end())
    } else {
        line.to_string()
    }
}

/// Ordered chat collection with one selected chat.
///
/// Always holds at least one chat, so there is always a transcript to
/// append to.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    /// Oldest first
    chats: Vec<Chat>,
    current: String,
}

impl ChatHistory {
    pub fn new() -> Self {
        let chat = Chat::new();
        Self {
            current: chat.id.clone(),
            chats: vec![chat],
        }
    }

    /// Create a chat and select it
    pub fn create(&mut self) -> &Chat {
        let chat = Chat::new();
        self.current = chat.id.clone();
        let index = self.chats.len();
        self.chats.push(chat);
        &self.chats[index]
    }

    pub fn select(&mut self, id: &str) -> Result<(), ChatError> {
        if self.get(id).is_none() {
            return Err(ChatError::NotFound(id.to_string()));
        }
        self.current = id.to_string();
        Ok(())
    }

    /// Delete a chat.
    ///
    /// Deleting the selected chat selects the most recent remaining one, or a
    /// fresh chat when none remain.
    pub fn delete(&mut self, id: &str) -> Result<Chat, ChatError> {
        let index = self
            .chats
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ChatError::NotFound(id.to_string()))?;
        let removed = self.chats.remove(index);

        if removed.id == self.current {
            match self.chats.last() {
                Some(chat) => self.current = chat.id.clone(),
                None => {
                    self.create();
                }
            }
        }
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn current_id(&self) -> &str {
        &self.current
    }

    pub fn current(&self) -> &Chat {
        // `delete` refills the collection, so the last index always exists
        self.get(&self.current)
            .unwrap_or_else(|| &self.chats[self.chats.len() - 1])
    }

    /// Append to the selected chat
    pub fn append(&mut self, message: ChatMessage) {
        let current = self.current.clone();
        match self.chats.iter_mut().find(|c| c.id == current) {
            Some(chat) => chat.push(message),
            None => tracing::warn!("Selected chat {} vanished; dropping message", current),
        }
    }

    /// Up to `HISTORY_LIMIT` chats, most recent first
    pub fn recent(&self) -> Vec<&Chat> {
        self.chats.iter().rev().take(HISTORY_LIMIT).collect()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_history_has_selected_chat() {
        let history = ChatHistory::new();
        assert_eq!(history.len(), 1);
        assert_eq!(history.current().name, DEFAULT_CHAT_NAME);
        assert!(history.current().messages().is_empty());
    }

    #[test]
    fn test_first_user_prompt_names_chat() {
        let mut history = ChatHistory::new();
        history.append(ChatMessage::assistant("hello"));
        assert_eq!(history.current().name, DEFAULT_CHAT_NAME);

        history.append(ChatMessage::user("What are my top revenue metrics this quarter?"));
        history.append(ChatMessage::user("second question"));
        assert_eq!(history.current().name, "What are my top revenue metric...");
        assert_eq!(history.current().messages().len(), 3);
    }

    #[test]
    fn test_create_selects_new_chat() {
        let mut history = ChatHistory::new();
        let first = history.current_id().to_string();
        let second = history.create().id.clone();
        assert_ne!(first, second);
        assert_eq!(history.current_id(), second);

        history.append(ChatMessage::user("in second"));
        history.select(&first).unwrap();
        assert!(history.current().messages().is_empty());
    }

    #[test]
    fn test_select_unknown_chat() {
        let mut history = ChatHistory::new();
        assert_eq!(
            history.select("nope"),
            Err(ChatError::NotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_delete_current_selects_most_recent() {
        let mut history = ChatHistory::new();
        let first = history.current_id().to_string();
        let second = history.create().id.clone();
        let third = history.create().id.clone();

        history.delete(&third).unwrap();
        assert_eq!(history.current_id(), second);
        assert!(history.get(&third).is_none());

        history.delete(&first).unwrap();
        assert_eq!(history.current_id(), second);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_delete_last_chat_creates_fresh_one() {
        let mut history = ChatHistory::new();
        let only = history.current_id().to_string();
        history.delete(&only).unwrap();
        assert_eq!(history.len(), 1);
        assert_ne!(history.current_id(), only);
        assert_eq!(history.current().id, history.current_id());
    }

    #[test]
    fn test_current_follows_selection() {
        let mut history = ChatHistory::new();
        let first = history.current_id().to_string();
        let second = history.create().id.clone();
        history.select(&first).unwrap();
        assert_eq!(history.current().id, first);

        history.delete(&second).unwrap();
        assert_eq!(history.current().id, first);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_recent_is_capped_and_most_recent_first() {
        let mut history = ChatHistory::new();
        let mut last = String::new();
        for _ in 0..60 {
            last = history.create().id.clone();
        }
        let recent = history.recent();
        assert_eq!(recent.len(), HISTORY_LIMIT);
        assert_eq!(recent[0].id, last);
        assert!(recent.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn test_chat_name_uses_first_line() {
        assert_eq!(chat_name_from_prompt("  list my models\nplease"), "list my models");
        assert_eq!(chat_name_from_prompt(""), "");
    }
}
