//! Turns a free-text instruction into an action by asking the language model,
//! then applies that action to the deck.

use crate::actions::{Action, ActionContext};
use crate::client::ModelClient;
use crate::deck::Deck;
use crate::error::{ActionError, Result, SlideError};
use once_cell::sync::Lazy;
use regex::Regex;
use slide_common::{ChatMessage, SlideSummary};

pub const SYSTEM_PROMPT: &str = "You are a PowerPoint assistant. Based on the user's instruction and slide content, return only JSON.\n\
Examples:\n\
{\"action\": \"edit_text\", \"slide_number\": 1, \"old_text\": \"Welcome\", \"new_text\": \"Quarterly Review\"}\n\
{\"action\": \"apply_style\", \"slide_number\": 2, \"style\": \"modern\"}\n\
{\"action\": \"add_icon\", \"slide_number\": 3, \"keywords\": [\"profit\"]}\n\
{\"action\": \"change_layout\", \"slide_number\": 1}\n";

pub const UNKNOWN_ACTION: &str = "Unknown action.";
const PARSE_FAILURE_PREFIX: &str = "Failed to parse GPT response: ";

// Greedy: first `{` through last `}`.
#[allow(clippy::expect_used)]
static JSON_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid JSON span pattern"));

/// What a model reply resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Action(Action),
    /// The reply named an action outside the supported set.
    Unknown(String),
    /// No JSON could be read from the reply.
    ParseFailure(String),
}

pub fn build_messages(summaries: &[SlideSummary], instruction: &str) -> Vec<ChatMessage> {
    let slides = serde_json::to_string(summaries).unwrap_or_else(|_| "[]".to_string());
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!("Slides: {slides}\nInstruction: {instruction}")),
    ]
}

/// The outermost `{...}` span of `raw`, if any.
pub fn extract_json(raw: &str) -> Option<&str> {
    JSON_SPAN.find(raw).map(|m| m.as_str())
}

/// Read the model's reply. Unreadable JSON and unknown action names are
/// resolutions, not errors; a readable action with bad fields is an error.
pub fn interpret_reply(raw: &str) -> std::result::Result<Resolution, ActionError> {
    let Some(span) = extract_json(raw) else {
        return Ok(Resolution::ParseFailure("no JSON object found in model reply".to_string()));
    };
    let value: serde_json::Value = match serde_json::from_str(span) {
        Ok(value) => value,
        Err(e) => return Ok(Resolution::ParseFailure(e.to_string())),
    };
    match Action::decode(&value) {
        Ok(action) => Ok(Resolution::Action(action)),
        Err(ActionError::UnknownTag(tag)) => Ok(Resolution::Unknown(tag)),
        Err(e) => Err(e),
    }
}

/// One chat turn: summarize, ask the model, apply what it asked for.
/// Returns the text shown to the user.
pub async fn resolve_and_apply(
    client: &dyn ModelClient,
    deck: &mut Deck,
    instruction: &str,
    ctx: &ActionContext,
) -> Result<String> {
    let messages = build_messages(&deck.summaries(), instruction);
    tracing::debug!(
        model = client.model(),
        prompt_bytes = messages.iter().map(|m| m.content.len()).sum::<usize>(),
        "asking model"
    );

    let raw = client.complete(messages).await.map_err(SlideError::Model)?;
    tracing::debug!(%raw, "model reply");

    match interpret_reply(&raw)? {
        Resolution::Action(action) => {
            let outcome = action.apply(deck, ctx)?;
            tracing::info!(action = action.name(), %outcome, "applied action");
            Ok(outcome.to_string())
        }
        Resolution::Unknown(tag) => {
            tracing::info!(%tag, "model chose an unsupported action");
            Ok(UNKNOWN_ACTION.to_string())
        }
        Resolution::ParseFailure(reason) => {
            tracing::warn!(%reason, "could not parse model reply");
            Ok(format!("{PARSE_FAILURE_PREFIX}{reason}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StubClient;
    use crate::error::DeckError;
    use crate::test_support::DeckBuilder;
    use slide_common::Role;

    fn deck() -> Deck {
        Deck::from_bytes(&DeckBuilder::new().slide(&["Welcome", "Agenda"]).slide(&["Q&A"]).build()).unwrap()
    }

    fn ctx() -> ActionContext {
        ActionContext::new("/nonexistent/icon.png")
    }

    #[test]
    fn test_prompt_shape() {
        let messages = build_messages(&deck().summaries(), "Make it pop");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("\"change_layout\""));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(
            messages[1].content,
            "Slides: [{\"slide_number\":1,\"text\":\"Welcome\\nAgenda\"},{\"slide_number\":2,\"text\":\"Q&A\"}]\nInstruction: Make it pop"
        );
    }

    #[test]
    fn test_extract_json_is_greedy() {
        assert_eq!(extract_json("Sure! {\"a\": {\"b\": 1}} done"), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json("{\"a\":1}\n{\"b\":2}"), Some("{\"a\":1}\n{\"b\":2}"));
        assert_eq!(extract_json("nothing here"), None);
    }

    #[test]
    fn test_interpret_reply() {
        assert_eq!(
            interpret_reply("Here you go:\n{\"action\": \"change_layout\", \"slide_number\": 1}").unwrap(),
            Resolution::Action(Action::ChangeLayout { slide_number: 1 })
        );
        assert_eq!(
            interpret_reply("{\"action\": \"delete_slide\"}").unwrap(),
            Resolution::Unknown("delete_slide".into())
        );
        assert!(matches!(interpret_reply("{not json}").unwrap(), Resolution::ParseFailure(_)));
        assert!(matches!(
            interpret_reply("{\"action\": \"edit_text\"}"),
            Err(ActionError::MissingField { field: "old_text" })
        ));
    }

    #[tokio::test]
    async fn test_parse_failure_leaves_deck() {
        let mut deck = deck();
        let before = deck.summaries();
        let stub = StubClient::new("I cannot help with that.");
        let reply = resolve_and_apply(&stub, &mut deck, "anything", &ctx()).await.unwrap();
        assert!(reply.starts_with("Failed to parse GPT response:"), "{reply}");
        assert_eq!(deck.summaries(), before);
    }

    #[tokio::test]
    async fn test_applies_edit() {
        let mut deck = deck();
        let stub = StubClient::new(
            r#"{"action": "edit_text", "slide_number": 1, "old_text": "Welcome", "new_text": "Quarterly Review"}"#,
        );
        let reply = resolve_and_apply(&stub, &mut deck, "rename the title", &ctx()).await.unwrap();
        assert_eq!(reply, "Edit applied.");
        assert_eq!(deck.summaries()[0].text, "Quarterly Review\nAgenda");

        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0][1].content.ends_with("Instruction: rename the title"));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let mut deck = deck();
        let stub = StubClient::new(r#"{"action": "shuffle", "slide_number": 1}"#);
        let reply = resolve_and_apply(&stub, &mut deck, "shuffle", &ctx()).await.unwrap();
        assert_eq!(reply, UNKNOWN_ACTION);
    }

    #[tokio::test]
    async fn test_out_of_range_is_error() {
        let mut deck = deck();
        let stub = StubClient::new(r#"{"action": "apply_style", "slide_number": 9}"#);
        let err = resolve_and_apply(&stub, &mut deck, "style", &ctx()).await.unwrap_err();
        assert!(matches!(err, SlideError::Deck(DeckError::SlideOutOfRange { slide_number: 9, slide_count: 2 })));
    }
}
