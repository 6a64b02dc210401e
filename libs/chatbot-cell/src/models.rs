// libs/chatbot-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::DatabaseError;
use shared_models::error::{AppError, FieldError};

pub const MAX_QUESTION_CHARS: usize = 1000;

/// Stored and returned in place of an answer when the responder fails.
pub const FALLBACK_RESPONSE: &str = "I'm sorry, I'm having trouble processing your request right now. \
Please try again later or contact your healthcare provider directly.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Patient,
    Bot,
}

/// One entry of a patient's chat history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskRequest {
    pub question: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum ChatbotError {
    #[error("{0}")]
    Forbidden(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<ChatbotError> for AppError {
    fn from(err: ChatbotError) -> Self {
        match err {
            ChatbotError::Forbidden(msg) => AppError::Forbidden(msg),
            ChatbotError::Validation(errors) => AppError::InvalidFields(errors),
            ChatbotError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
