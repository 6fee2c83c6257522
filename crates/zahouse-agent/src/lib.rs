pub mod anthropic;
pub mod backend;
pub mod google;
pub mod groq;
mod http;
pub mod memory;

pub use anthropic::AnthropicBackend;
pub use backend::{build_backend, CompletionRequest, LlmBackend, ProviderError};
pub use google::GoogleBackend;
pub use groq::GroqBackend;
pub use memory::ThreadMemory;
