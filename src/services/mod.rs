pub mod conversation_service;
pub mod message_service;
pub mod unread_ledger;

pub use conversation_service::*;
pub use message_service::*;
pub use unread_ledger::*;
