//! Service layer modules for external integrations.
//!
//! Contains clients for the OpenAI completion API, Supabase Storage, and
//! outbound email via Resend.

pub mod email;
pub mod openai;
pub mod storage;

pub use email::EmailService;
pub use openai::OpenAiClient;
pub use storage::StorageClient;
