//! Prompt assembly for the chat relay.
//!
//! Every prompt opens with one system message: background topics recalled
//! from the archive (when any exist) followed by the counselor persona.
//! History is capped by a sliding window and the current message always
//! closes the prompt as the only open user turn.

use crate::llm::upstream::UpstreamMessage;

/// Persona instruction at the head of every prompt.
pub const PERSONA: &str = "You are a professional counselor who is skilled at \
listening and offering guidance. Speak with the person warmly, with \
understanding and professionalism.";

/// Prompt slots for history plus the current message.
pub const WINDOW_MAX_MESSAGES: usize = 16;

/// Most background topics surfaced in one prompt.
pub const RECALL_LIMIT: usize = 3;

/// Characters kept of each background topic.
const RECALL_PREVIEW_CHARS: usize = 80;

const RECALL_HEADER: &str = "[Background: the person previously raised the \
topics below. Use them to understand their state and mood, but do not quote \
or repeat them directly; respond in your own words.]";

/// Cap `messages` to the most recent window the prompt can carry.
///
/// One of the [`WINDOW_MAX_MESSAGES`] slots is reserved for the current
/// message, so at most 15 history entries survive. System entries are
/// excluded up front. The window must open on a user turn: when truncation
/// lands on an assistant entry the cut walks back to the previous user
/// entry, and unmatched leading assistants are dropped. A trailing user
/// entry is dropped as well, because the current message is appended as the
/// only open user turn.
#[must_use]
pub fn sliding_window(messages: &[UpstreamMessage]) -> Vec<UpstreamMessage> {
    let non_system: Vec<UpstreamMessage> = messages
        .iter()
        .filter(|message| message.role != "system")
        .cloned()
        .collect();

    let target = WINDOW_MAX_MESSAGES - 1;
    let mut window = if non_system.len() <= target {
        non_system
    } else {
        let mut start = non_system.len() - target;
        if non_system[start].role != "user" {
            if let Some(idx) = non_system[..start]
                .iter()
                .rposition(|message| message.role == "user")
            {
                start = idx;
            }
        }
        let mut cut = non_system[start..].to_vec();
        cut.truncate(target);
        cut
    };

    if let Some(lead) = window.iter().position(|message| message.role == "user") {
        window = window.split_off(lead);
    } else {
        window.clear();
    }

    if window.last().is_some_and(|message| message.role == "user") {
        window.pop();
    }

    window
}

/// Build the system message content from recalled background topics.
///
/// Without recall this is the bare persona. With recall, each topic is
/// previewed to [`RECALL_PREVIEW_CHARS`] characters and listed ahead of the
/// persona text.
#[must_use]
pub fn system_content(recalled: &[String]) -> String {
    if recalled.is_empty() {
        return PERSONA.to_string();
    }

    let mut out = String::from(RECALL_HEADER);
    out.push('\n');
    for (index, topic) in recalled.iter().take(RECALL_LIMIT).enumerate() {
        out.push_str(&(index + 1).to_string());
        out.push_str(". ");
        if topic.chars().count() > RECALL_PREVIEW_CHARS {
            out.extend(topic.chars().take(RECALL_PREVIEW_CHARS));
            out.push_str("...");
        } else {
            out.push_str(topic);
        }
        out.push('\n');
    }
    out.push('\n');
    out.push_str(PERSONA);
    out
}

/// Assemble the full upstream prompt for one chat turn.
#[must_use]
pub fn assemble(
    recalled: &[String],
    window: &[UpstreamMessage],
    current_message: &str,
) -> Vec<UpstreamMessage> {
    let mut messages = Vec::with_capacity(window.len() + 2);
    messages.push(UpstreamMessage::system(system_content(recalled)));
    messages.extend_from_slice(window);
    messages.push(UpstreamMessage::user(current_message));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(turns: usize) -> Vec<UpstreamMessage> {
        let mut messages = Vec::new();
        for i in 0..turns {
            messages.push(UpstreamMessage::user(format!("u{i}")));
            messages.push(UpstreamMessage::assistant(format!("a{i}")));
        }
        messages
    }

    #[test]
    fn test_window_empty_history() {
        assert!(sliding_window(&[]).is_empty());
    }

    #[test]
    fn test_window_short_history_passes_through() {
        let history = exchange(3);
        let window = sliding_window(&history);
        assert_eq!(window.len(), 6);
        assert_eq!(window[0].content, "u0");
        assert_eq!(window[5].content, "a2");
    }

    #[test]
    fn test_window_excludes_system_entries() {
        let mut history = vec![UpstreamMessage::system("persona")];
        history.extend(exchange(2));
        let window = sliding_window(&history);
        assert_eq!(window.len(), 4);
        assert!(window.iter().all(|m| m.role != "system"));
    }

    #[test]
    fn test_window_walks_back_to_user_when_cut_lands_on_assistant() {
        // 20 entries; the plain cut keeps the last 15, landing on "a2".
        let history = exchange(10);
        let window = sliding_window(&history);

        // The cut walks back to "u2", keeps 15 entries, then drops the
        // trailing user turn.
        assert_eq!(window[0].content, "u2");
        assert_eq!(window[0].role, "user");
        assert_eq!(window.len(), 14);
        assert_eq!(window.last().unwrap().content, "a8");
    }

    #[test]
    fn test_window_drops_unmatched_leading_assistants() {
        let history = vec![
            UpstreamMessage::assistant("welcome"),
            UpstreamMessage::user("hello"),
            UpstreamMessage::assistant("hi"),
        ];
        let window = sliding_window(&history);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "hello");
    }

    #[test]
    fn test_window_drops_trailing_user_turn() {
        let mut history = exchange(2);
        history.push(UpstreamMessage::user("pending"));
        let window = sliding_window(&history);
        assert_eq!(window.len(), 4);
        assert_eq!(window.last().unwrap().content, "a1");
    }

    #[test]
    fn test_window_without_any_user_turn_is_empty() {
        let history = vec![
            UpstreamMessage::assistant("one"),
            UpstreamMessage::assistant("two"),
        ];
        assert!(sliding_window(&history).is_empty());
    }

    #[test]
    fn test_system_content_without_recall_is_bare_persona() {
        assert_eq!(system_content(&[]), PERSONA);
    }

    #[test]
    fn test_system_content_lists_numbered_topics_before_persona() {
        let recalled = vec!["sleep trouble".to_string(), "work stress".to_string()];
        let content = system_content(&recalled);
        assert!(content.starts_with("[Background:"));
        assert!(content.contains("1. sleep trouble\n"));
        assert!(content.contains("2. work stress\n"));
        assert!(content.ends_with(PERSONA));
    }

    #[test]
    fn test_system_content_previews_long_topics() {
        let long = "x".repeat(120);
        let content = system_content(&[long]);
        let line = content
            .lines()
            .find(|line| line.starts_with("1. "))
            .unwrap();
        assert_eq!(line.len(), 3 + RECALL_PREVIEW_CHARS + 3);
        assert!(line.ends_with("..."));
    }

    #[test]
    fn test_system_content_caps_topic_count() {
        let recalled: Vec<String> = (0..5).map(|i| format!("topic {i}")).collect();
        let content = system_content(&recalled);
        assert!(content.contains("3. topic 2"));
        assert!(!content.contains("4. topic 3"));
    }

    #[test]
    fn test_assemble_orders_system_history_current() {
        let window = exchange(1);
        let messages = assemble(&[], &window, "how are you");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, PERSONA);
        assert_eq!(messages[1].content, "u0");
        assert_eq!(messages[2].content, "a0");
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content, "how are you");
    }
}
