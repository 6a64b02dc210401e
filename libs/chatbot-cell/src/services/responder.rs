// libs/chatbot-cell/src/services/responder.rs
use anyhow::anyhow;
use async_trait::async_trait;
use rand::seq::SliceRandom;

#[cfg(test)]
use mockall::automock;

const CANNED_RESPONSES: [&str; 5] = [
    "I understand your concern. Based on your symptoms, I recommend consulting with a healthcare professional for proper diagnosis and treatment.",
    "Thank you for your question. While I can provide general information, it's important to discuss your specific situation with your doctor.",
    "Your symptoms could be related to various conditions. I suggest scheduling an appointment with your healthcare provider for a thorough evaluation.",
    "This is a common concern. However, for accurate diagnosis and treatment recommendations, please consult with a medical professional.",
    "I appreciate you sharing this information. For personalized medical advice, it's best to speak directly with your doctor or healthcare team.",
];

/// Produces the bot side of a chat exchange.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn respond(&self, question: &str) -> anyhow::Result<String>;
}

/// Answers every question with one of a fixed set of general replies.
#[derive(Debug, Default, Clone)]
pub struct CannedResponder;

impl CannedResponder {
    pub fn new() -> Self {
        Self
    }

    pub fn responses() -> &'static [&'static str] {
        &CANNED_RESPONSES
    }
}

#[async_trait]
impl ChatResponder for CannedResponder {
    async fn respond(&self, _question: &str) -> anyhow::Result<String> {
        let answer = {
            let mut rng = rand::thread_rng();
            CANNED_RESPONSES.choose(&mut rng).copied()
        };

        answer
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no canned responses configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_responder_answers_from_fixed_set() {
        let responder = CannedResponder::new();
        for _ in 0..20 {
            let answer = responder.respond("I have a headache").await.unwrap();
            assert!(CannedResponder::responses().contains(&answer.as_str()));
        }
    }
}
