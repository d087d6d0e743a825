//! Researcher assistant: a conversation with one LLM-backed persona.
//!
//! The researcher keeps the whole history and sends it, behind a generated
//! system prompt, on every turn. Replies are asked for as JSON
//! `{chat_message, suggested_user_questions}`; anything else is taken as
//! plain text with no suggestions.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::llm::{self, LlmProvider, Role};

use super::prompt::PromptBuilder;

const INITIAL_SUGGESTIONS: [&str; 3] = [
    "What can you help me with?",
    "How do you work?",
    "Tell me about your capabilities",
];

const JSON_REPLY_INSTRUCTION: &str = "Always respond with a single JSON object of the form \
{\"chat_message\": \"<your reply>\", \"suggested_user_questions\": [\"<question>\", ...]} \
and nothing else.";

/// Persona and prompt material for a researcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearcherProfile {
    pub name: String,
    pub description: String,
    pub background: Vec<String>,
    pub steps: Vec<String>,
    pub output_instructions: Vec<String>,
}

impl ResearcherProfile {
    /// General-purpose research assistant.
    pub fn general(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "A helpful research assistant that can answer questions and provide \
                          information."
                .into(),
            background: vec![
                "This assistant is a knowledgeable researcher designed to support users in \
                 finding information."
                    .into(),
                "It has access to a wide range of knowledge and can analyze documents to provide \
                 insights."
                    .into(),
            ],
            steps: vec![
                "Listen carefully to the user's query or problem.".into(),
                "Analyze the context and identify the core information need.".into(),
                "Provide a clear, concise response with relevant information.".into(),
                "Suggest useful follow-up questions to deepen the investigation.".into(),
            ],
            output_instructions: vec![
                "Keep responses informative but concise.".into(),
                "Cite sources where appropriate.".into(),
                "Include 2-3 relevant follow-up questions that might help the user explore the \
                 topic further."
                    .into(),
            ],
        }
    }

    /// Render the system prompt. `researcher.md` under `prompts_dir` is an
    /// optional leading layer; `{{name}}` and `{{description}}` are substituted.
    pub fn system_prompt(&self, prompts_dir: &Path) -> String {
        let mut output = self.output_instructions.clone();
        output.push(JSON_REPLY_INSTRUCTION.to_string());

        PromptBuilder::new(prompts_dir)
            .layer("researcher.md")
            .section("IDENTITY and PURPOSE", &self.background)
            .section("INTERNAL ASSISTANT STEPS", &self.steps)
            .section("OUTPUT INSTRUCTIONS", &output)
            .var("name", self.name.as_str())
            .var("description", self.description.as_str())
            .build()
    }
}

/// One entry of a conversation as the user sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub name: String,
    pub role: Role,
    pub content: String,
    /// Follow-up prompts offered with an assistant message.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl std::fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.content)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    history: Vec<ChatMessage>,
}

impl Conversation {
    pub fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn pop(&mut self) -> Option<ChatMessage> {
        self.history.pop()
    }
}

/// Structured reply shape requested from the model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reply {
    pub chat_message: String,
    #[serde(default)]
    pub suggested_user_questions: Vec<String>,
}

/// Parse a model reply. Accepts bare JSON or JSON inside a ```json fence;
/// anything else becomes the message text verbatim.
pub fn parse_reply(text: &str) -> Reply {
    let trimmed = text.trim();
    let candidate = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    match serde_json::from_str::<Reply>(candidate) {
        Ok(reply) if !reply.chat_message.trim().is_empty() => reply,
        _ => {
            debug!("reply is not structured JSON, using raw text");
            Reply { chat_message: trimmed.to_string(), suggested_user_questions: Vec::new() }
        }
    }
}

pub struct Researcher {
    profile: ResearcherProfile,
    provider: LlmProvider,
    system_prompt: String,
    conversation: Conversation,
}

impl Researcher {
    /// Start a conversation seeded with the greeting.
    pub fn new(profile: ResearcherProfile, provider: LlmProvider, prompts_dir: &Path) -> Self {
        let system_prompt = profile.system_prompt(prompts_dir);
        let mut conversation = Conversation::default();
        conversation.push(ChatMessage {
            name: profile.name.clone(),
            role: Role::Assistant,
            content: format!(
                "Hello! I'm {}, a researcher assistant. How can I help you today?",
                profile.name
            ),
            suggestions: INITIAL_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        });
        Self { profile, provider, system_prompt, conversation }
    }

    pub fn profile(&self) -> &ResearcherProfile {
        &self.profile
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn history(&self) -> &[ChatMessage] {
        self.conversation.history()
    }

    /// The opening assistant message.
    pub fn initial_message(&self) -> Option<&ChatMessage> {
        self.conversation.history().first()
    }

    /// Suggestions attached to the latest assistant message.
    pub fn suggestions(&self) -> &[String] {
        self.conversation
            .history()
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.suggestions.as_slice())
            .unwrap_or_default()
    }

    /// Send `text` and return the assistant's reply. On provider failure the
    /// user message is withdrawn so the history stays alternating.
    pub async fn process_message(&mut self, text: &str) -> Result<&ChatMessage, AppError> {
        self.conversation.push(ChatMessage {
            name: "user".into(),
            role: Role::User,
            content: text.to_string(),
            suggestions: Vec::new(),
        });

        let response = match self.provider.complete(&self.wire_messages()).await {
            Ok(r) => r,
            Err(e) => {
                self.conversation.pop();
                warn!(provider = self.provider.name(), error = %e, "chat completion failed");
                return Err(AppError::Llm(e.to_string()));
            }
        };
        if let Some(usage) = response.usage {
            debug!(input = usage.input_tokens, output = usage.output_tokens, "llm usage");
        }

        let reply = parse_reply(&response.text);
        self.conversation.push(ChatMessage {
            name: self.profile.name.clone(),
            role: Role::Assistant,
            content: reply.chat_message,
            suggestions: reply.suggested_user_questions,
        });
        // Just pushed.
        self.conversation
            .history()
            .last()
            .ok_or_else(|| AppError::Llm("conversation unexpectedly empty".into()))
    }

    fn wire_messages(&self) -> Vec<llm::ChatMessage> {
        let mut messages = Vec::with_capacity(self.conversation.len() + 1);
        messages.push(llm::ChatMessage::system(self.system_prompt.clone()));
        messages.extend(self.conversation.history().iter().map(|m| llm::ChatMessage {
            role: m.role,
            content: m.content.clone(),
        }));
        messages
    }
}
