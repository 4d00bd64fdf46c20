//! OpenAI-compatible chat completion shim.
//!
//! Lets chat clients that speak the `/v1/chat/completions` protocol use the
//! corpus as a context source: the last `user` message is the query, and the
//! assistant reply is the top matches' snippets joined by `\n---\n`.

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::search::{Query, SearchIndex};

pub const NO_CONTENT_REPLY: &str = "No relevant content found in the corpus.";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Accepted for client compatibility; replies are not sampled.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_temperature() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ReplyMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReplyMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatRequest {
    /// Content of the most recent `user` message, or `""` if there is none.
    pub fn last_user_message(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Answer a chat request with corpus snippets.
pub async fn complete(index: &SearchIndex, req: &ChatRequest) -> Result<ChatResponse, SearchError> {
    let query = Query::new(req.last_user_message());
    let matches = index.search(&query, index.default_k()).await?;

    let content = if matches.is_empty() {
        NO_CONTENT_REPLY.to_string()
    } else {
        matches
            .iter()
            .map(|m| m.snippet.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n")
    };

    Ok(ChatResponse {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
        object: "chat.completion",
        created: chrono::Utc::now().timestamp(),
        model: req.model.clone(),
        choices: vec![ChatChoice {
            index: 0,
            message: ReplyMessage {
                role: "assistant",
                content,
            },
            finish_reason: "stop",
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::corpus::tests::FakeLoader;
    use crate::corpus::CorpusStore;
    use std::sync::Arc;

    fn request(messages: &[(&str, &str)]) -> ChatRequest {
        ChatRequest {
            model: "corpus".to_string(),
            messages: messages
                .iter()
                .map(|(role, content)| ChatMessage {
                    role: role.to_string(),
                    content: content.to_string(),
                })
                .collect(),
            temperature: 1.0,
        }
    }

    fn index() -> SearchIndex {
        SearchIndex::new(
            Arc::new(CorpusStore::new(Arc::new(FakeLoader::new(vec![
                ("a.md", "alpha bravo"),
                ("b.md", "bravo charlie"),
            ])))),
            RetrievalConfig::default(),
        )
    }

    #[test]
    fn test_last_user_message() {
        let req = request(&[
            ("system", "be brief"),
            ("user", "first"),
            ("assistant", "ok"),
            ("user", "second"),
        ]);
        assert_eq!(req.last_user_message(), "second");
        assert_eq!(request(&[("system", "x")]).last_user_message(), "");
    }

    #[tokio::test]
    async fn test_complete_joins_snippets() {
        let resp = complete(&index(), &request(&[("user", "bravo")]))
            .await
            .unwrap();
        assert_eq!(resp.object, "chat.completion");
        assert_eq!(resp.model, "corpus");
        assert_eq!(resp.choices[0].message.role, "assistant");
        assert_eq!(
            resp.choices[0].message.content,
            "alpha bravo\n---\nbravo charlie"
        );
    }

    #[tokio::test]
    async fn test_complete_without_matches() {
        let resp = complete(&index(), &request(&[("user", "zulu")]))
            .await
            .unwrap();
        assert_eq!(resp.choices[0].message.content, NO_CONTENT_REPLY);
    }
}
