use crate::agent_engine::history::HistoryEntry;
use crate::llm::types::{ChatMessage, ContentPart, ImageUrl, MessageContent};
use crate::perception::types::Frame;

const SYSTEM_PROMPT: &str = "\
You are SeeClick, a strict and honest UI navigation assistant.
You lead the user to their goal STEP BY STEP, one click per step.

Rules:
1) On EVERY step answer with exactly one JSON object and no other text:
   Option A (perform a click):
     {\"click\":{\"x\":123,\"y\":456},\"reason\":\"short explanation\"}
   Option B (goal reached or no further clicks are needed):
     {\"done\":true,\"reason\":\"short explanation\"}
2) NO keystrokes, NO double-clicks, NO drags. Only ONE single LEFT click per step.
3) Coordinates are pixels of the attached screenshot, within [0..width) and [0..height).
4) If the next click is not obvious, answer {\"done\":true,...} and explain why.
5) You only see the current screenshot. The history below is text only.
6) Be conservative: avoid restart or shutdown controls when the goal can be reached more safely.
7) Keep the reason short and to the point.

ANSWER ONLY IN THE JSON FORMAT ABOVE.";

#[cfg(target_os = "windows")]
const PLATFORM_HINT: Option<&str> = Some(
    "\n\nWINDOWS NOTES:\n\
     - To put the computer to sleep, the preferred route is:\n\
       1) Click the Start button (Windows logo).\n\
       2) Click the Power button.\n\
       3) Click \"Sleep\".",
);

#[cfg(not(target_os = "windows"))]
const PLATFORM_HINT: Option<&str> = None;

pub fn system_prompt() -> String {
    let mut prompt = SYSTEM_PROMPT.to_string();
    if let Some(hint) = PLATFORM_HINT {
        prompt.push_str(hint);
    }
    prompt
}

pub fn user_prompt(goal: &str) -> String {
    format!(
        "GOAL: {goal}\n\n\
         Context:\n\
         - OS: Windows/macOS/Linux, resolution and scaling unknown.\n\
         - Allowed: only ONE LEFT click per step.\n\
         - The screenshot is attached below.\n\n\
         Return exactly one JSON object:\n\
         - Either {{\"click\":{{\"x\":INT,\"y\":INT}},\"reason\":\"...\"}}\n\
         - Or {{\"done\":true,\"reason\":\"...\"}}\n\n\
         No other text, no formatting, no code.\n\
         If it makes sense, start with a system button or menu that leads to the goal."
    )
}

/// Message list for one decision: system rules, the newest `max_history`
/// text-only history entries, then the goal with the current frame.
pub fn build_messages(
    goal: &str,
    history: &[HistoryEntry],
    frame: &Frame,
    max_history: usize,
) -> Vec<ChatMessage> {
    let skip = history.len().saturating_sub(max_history);
    let mut messages = Vec::with_capacity(history.len() - skip + 2);

    messages.push(ChatMessage::system(system_prompt()));
    messages.extend(
        history[skip..]
            .iter()
            .map(|entry| ChatMessage::assistant_text(entry.text())),
    );
    messages.push(ChatMessage::user(MessageContent::Parts(vec![
        ContentPart::Text {
            text: user_prompt(goal),
        },
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: frame.data_url(),
            },
        },
    ])));
    messages
}
