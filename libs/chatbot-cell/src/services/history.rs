// libs/chatbot-cell/src/services/history.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::access::CallerScope;
use shared_utils::validation::FieldErrors;

use crate::models::{
    AskRequest, AskResponse, ChatMessage, ChatRole, ChatbotError, FALLBACK_RESPONSE,
    MAX_QUESTION_CHARS,
};
use crate::services::responder::ChatResponder;

const MESSAGE_COLUMNS: &str = "role,content,timestamp";

pub struct ChatbotService {
    supabase: Arc<SupabaseClient>,
    responder: Arc<dyn ChatResponder>,
}

impl ChatbotService {
    pub fn new(config: &AppConfig, responder: Arc<dyn ChatResponder>) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            responder,
        }
    }

    pub fn supabase(&self) -> &SupabaseClient {
        &self.supabase
    }

    /// Returns the trimmed question or the field error for it.
    pub fn validate_question(request: &AskRequest) -> Result<String, ChatbotError> {
        let question = request.question.as_deref().map(str::trim).unwrap_or_default();

        let mut errors = FieldErrors::new();
        if question.is_empty() {
            errors.add("question", "Question is required");
        } else {
            errors.check(
                question.chars().count() <= MAX_QUESTION_CHARS,
                "question",
                "Question too long",
            );
        }
        errors.finish().map_err(ChatbotError::Validation)?;

        Ok(question.to_string())
    }

    fn history_path(patient_id: Uuid) -> String {
        format!(
            "/rest/v1/chat_messages?patient_id=eq.{}&select={}&order=timestamp.asc,id.asc",
            patient_id, MESSAGE_COLUMNS
        )
    }

    pub async fn history(&self, scope: &CallerScope, auth_token: &str) -> Result<Vec<ChatMessage>, ChatbotError> {
        let patient_id = Self::patient_only(scope)?;

        let path = Self::history_path(patient_id);

        debug!("Loading chat history for patient {}", patient_id);
        Ok(self.supabase.find_many(&path, auth_token).await?)
    }

    /// Answers a question and appends both sides of the exchange to the history.
    pub async fn ask(
        &self,
        scope: &CallerScope,
        request: AskRequest,
        auth_token: &str,
    ) -> Result<AskResponse, ChatbotError> {
        let patient_id = Self::patient_only(scope)?;
        let question = Self::validate_question(&request)?;
        let asked_at = Utc::now();

        let bot_response = match self.responder.respond(&question).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Chat responder failed for patient {}: {:#}", patient_id, e);
                FALLBACK_RESPONSE.to_string()
            }
        };
        let answered_at = answer_timestamp(asked_at, Utc::now());

        let rows = json!([
            {
                "patient_id": patient_id,
                "role": ChatRole::Patient,
                "content": question,
                "timestamp": asked_at.to_rfc3339()
            },
            {
                "patient_id": patient_id,
                "role": ChatRole::Bot,
                "content": bot_response,
                "timestamp": answered_at.to_rfc3339()
            }
        ]);

        let table = format!("chat_messages?select={}", MESSAGE_COLUMNS);
        let stored: Vec<ChatMessage> = self.supabase.insert(&table, auth_token, rows).await?;
        debug!("Stored {} chat messages for patient {}", stored.len(), patient_id);

        Ok(AskResponse {
            bot_response,
            timestamp: answered_at,
        })
    }

    pub async fn clear_history(&self, scope: &CallerScope, auth_token: &str) -> Result<(), ChatbotError> {
        let patient_id = Self::patient_only(scope)?;

        let path = format!("/rest/v1/chat_messages?patient_id=eq.{}", patient_id);
        self.supabase
            .execute(Method::DELETE, &path, Some(auth_token), None)
            .await?;

        info!("Cleared chat history for patient {}", patient_id);
        Ok(())
    }

    fn patient_only(scope: &CallerScope) -> Result<Uuid, ChatbotError> {
        scope
            .patient_id()
            .ok_or_else(|| ChatbotError::Forbidden("Access denied".to_string()))
    }
}

/// The stored answer always sorts after its question, even when both are
/// stamped within the same microsecond.
fn answer_timestamp(asked_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    now.max(asked_at + Duration::microseconds(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use shared_utils::test_utils::TestConfig;

    use crate::services::responder::MockChatResponder;

    fn stored_rows() -> serde_json::Value {
        json!([
            { "role": "patient", "content": "q", "timestamp": "2024-01-01T00:00:00Z" },
            { "role": "bot", "content": "a", "timestamp": "2024-01-01T00:00:01Z" }
        ])
    }

    #[test]
    fn test_question_validation() {
        let blank = AskRequest { question: Some("   ".to_string()) };
        assert_matches!(
            ChatbotService::validate_question(&blank),
            Err(ChatbotError::Validation(errors)) if errors[0].message == "Question is required"
        );

        let long = AskRequest { question: Some("é".repeat(MAX_QUESTION_CHARS + 1)) };
        assert_matches!(
            ChatbotService::validate_question(&long),
            Err(ChatbotError::Validation(errors)) if errors[0].message == "Question too long"
        );

        let exact = AskRequest { question: Some("é".repeat(MAX_QUESTION_CHARS)) };
        assert!(ChatbotService::validate_question(&exact).is_ok());
    }

    #[test]
    fn test_answer_is_stamped_after_question() {
        let asked_at = Utc::now();
        assert!(answer_timestamp(asked_at, asked_at) > asked_at);

        let later = asked_at + Duration::seconds(2);
        assert_eq!(answer_timestamp(asked_at, later), later);
    }

    #[test]
    fn test_history_query_breaks_timestamp_ties_by_insert_order() {
        let patient_id = Uuid::new_v4();
        let path = ChatbotService::history_path(patient_id);
        assert!(path.ends_with("&order=timestamp.asc,id.asc"));
    }

    #[tokio::test]
    async fn test_responder_failure_stores_fallback() {
        let mock_server = MockServer::start().await;
        let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();

        Mock::given(method("POST"))
            .and(path("/rest/v1/chat_messages"))
            .and(body_partial_json(json!([
                { "role": "patient", "content": "Is this rash serious?" },
                { "role": "bot", "content": FALLBACK_RESPONSE }
            ])))
            .respond_with(ResponseTemplate::new(201).set_body_json(stored_rows()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut responder = MockChatResponder::new();
        responder
            .expect_respond()
            .times(1)
            .returning(|_| Err(anyhow!("upstream timeout")));

        let service = ChatbotService::new(&config, Arc::new(responder));
        let scope = CallerScope::Patient { patient_id: Uuid::new_v4() };
        let request = AskRequest { question: Some("Is this rash serious?".to_string()) };

        let response = service.ask(&scope, request, "token").await.unwrap();
        assert_eq!(response.bot_response, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_only_patients_chat() {
        let config = TestConfig::default().to_app_config();
        let mut responder = MockChatResponder::new();
        responder.expect_respond().times(0);

        let service = ChatbotService::new(&config, Arc::new(responder));
        let request = AskRequest { question: Some("Hello".to_string()) };

        assert_matches!(
            service.ask(&CallerScope::Doctor { doctor_id: Uuid::new_v4() }, request, "token").await,
            Err(ChatbotError::Forbidden(_))
        );
    }
}
