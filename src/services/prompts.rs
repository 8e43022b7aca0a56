//! Prompt assembly for decision, reply and summary calls.

use std::fmt::Write;

use crate::domain::models::{Judgment, Memo, Memory, Message, Scope};

/// Upper bound on characters of a single message quoted into a prompt.
const MAX_QUOTED_MESSAGE_CHARS: usize = 2_000;

/// Shared conversation context for judge and generate calls.
pub fn conversation_context(
    persona: &str,
    scope: &Scope,
    memory: Option<&Memory>,
    memos: &[Memo],
    history: &[Message],
) -> String {
    let mut out = String::new();
    if !persona.trim().is_empty() {
        let _ = writeln!(out, "{}\n", persona.trim());
    }

    match &scope.thread_ts {
        Some(thread_ts) => {
            let _ = writeln!(out, "Conversation: thread {thread_ts} in channel {}", scope.channel_id);
        }
        None => {
            let _ = writeln!(out, "Conversation: channel {}", scope.channel_id);
        }
    }

    if let Some(memory) = memory.filter(|m| !m.content.trim().is_empty()) {
        let _ = writeln!(out, "\n## Channel memory\n{}", memory.content.trim());
    }

    if !memos.is_empty() {
        out.push_str("\n## Notes\n");
        for memo in memos {
            let _ = writeln!(out, "- {}", memo.content.trim());
        }
    }

    out.push_str("\n## Recent messages\n");
    push_transcript(&mut out, history);
    out
}

/// Ask the model for a reply after a positive judgment.
pub fn reply_prompt(context: &str, judgment: &Judgment) -> String {
    format!(
        "{context}\n## Task\nWrite the next message in this conversation. \
         You decided to respond because: {}\n\
         Reply with the message text only.",
        judgment.reason.trim()
    )
}

/// Ask the model to fold new messages into a channel summary.
pub fn summary_prompt(channel_id: &str, previous: Option<&str>, messages: &[Message]) -> String {
    let mut out = format!("Maintain a running memory of channel {channel_id}.\n");
    match previous.map(str::trim).filter(|p| !p.is_empty()) {
        Some(previous) => {
            let _ = writeln!(out, "\n## Current memory\n{previous}");
        }
        None => out.push_str("\n## Current memory\n(none yet)\n"),
    }
    out.push_str("\n## New messages\n");
    push_transcript(&mut out, messages);
    out.push_str(
        "\n## Task\nRewrite the memory so it covers both the current memory and the new \
         messages: ongoing topics, decisions, open questions, and who is involved. \
         Reply with the updated memory only.",
    );
    out
}

fn push_transcript(out: &mut String, messages: &[Message]) {
    if messages.is_empty() {
        out.push_str("(no messages)\n");
        return;
    }
    for message in messages {
        let text: String = message.text.chars().take(MAX_QUOTED_MESSAGE_CHARS).collect();
        let _ = writeln!(out, "[{}] {}: {}", message.ts, message.user_id, text);
    }
}
