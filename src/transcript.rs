//! Builds the initial transcript for an orchestration call.

use crate::types::{ChatMessage, ContentBlock, Message, Role};

/// Convert stored chat history plus the new user input into the ordered
/// message list the turn loop starts from.
///
/// Each prior message becomes a single text block; `input` is appended as
/// the final user message. Content size is not checked here.
pub fn build_transcript(history: &[ChatMessage], input: &str) -> Vec<Message> {
    let mut messages: Vec<Message> = history
        .iter()
        .map(|entry| Message {
            role: entry.role,
            content: vec![ContentBlock::text(entry.content.clone())],
        })
        .collect();
    messages.push(Message {
        role: Role::User,
        content: vec![ContentBlock::text(input)],
    });
    messages
}
