pub mod config;
pub mod document;
pub mod gate;
pub mod knowledge;
pub mod mailer;
pub mod prompt;
pub mod report;
pub mod search;
pub mod store;
pub mod types;

pub use types::*;
