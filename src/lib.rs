pub mod bootstrap;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod listeners;
pub mod listings;
pub mod models;
pub mod observability;
pub mod services;

pub use bootstrap::*;
pub use config::*;
pub use database::*;
pub use error::*;
pub use events::*;
pub use listings::*;
pub use models::*;
pub use services::*;
