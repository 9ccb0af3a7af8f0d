pub mod chat;

pub use chat::{ChatAnswer, DocumentChat, QueryError, CHAT_FAILURE, CHAT_TEMPERATURE, NOT_FOUND_ANSWER};
