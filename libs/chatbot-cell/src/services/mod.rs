pub mod history;
pub mod responder;

pub use history::ChatbotService;
pub use responder::{CannedResponder, ChatResponder};
