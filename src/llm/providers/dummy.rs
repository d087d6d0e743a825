//! Dummy LLM provider, echoes the last user message back prefixed with `[echo]`.
//! Lets the console run end to end without an API key.

use crate::llm::{ChatMessage, LlmResponse, ProviderError, Role};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse, ProviderError> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(LlmResponse { text: format!("[echo] {last}"), usage: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_echoes_last_user_message() {
        let p = DummyProvider;
        let msgs = [
            ChatMessage::system("be brief"),
            ChatMessage::user("first"),
            ChatMessage::assistant("ok"),
            ChatMessage::user("hello"),
        ];
        assert_eq!(p.complete(&msgs).await.unwrap().text, "[echo] hello");
    }

    #[tokio::test]
    async fn complete_without_user_message() {
        let p = DummyProvider;
        assert_eq!(p.complete(&[]).await.unwrap().text, "[echo] ");
    }
}
