pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::{chatbot_routes, chatbot_routes_with_responder, ChatbotState};
