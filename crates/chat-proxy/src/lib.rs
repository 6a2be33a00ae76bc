//! Chat proxy: resolves client model names per provider and forwards chats
//! to the upstream LLM API.

pub mod config;
pub mod error;
pub mod handler;
pub mod markdown;
pub mod modelmap;
pub mod provider;
