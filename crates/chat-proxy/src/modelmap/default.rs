use super::{AliasTable, ModelCatalog};
use crate::provider::ProviderId;

// Model names the browser client sends by default; the client was written
// against Gemini and still requests those names.
const GEMINI_NAMES: [&str; 11] = [
    "gemini-pro",
    "gemini-1.0-pro",
    "gemini-1.5-flash",
    "gemini-1.5-flash-latest",
    "gemini-1.5-pro",
    "gemini-1.5-pro-latest",
    "gemini-1.5-flash-8b",
    "gemini-1.5-flash-8b-latest",
    "gemini-2.0-flash",
    "gemini-2.0-flash-latest",
    "gemini-2.0-flash-exp",
];

pub fn default_model(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::Groq => "llama-3.1-8b-instant",
        ProviderId::Cohere => "command-light",
    }
}

pub fn default_catalog(provider: ProviderId) -> ModelCatalog {
    let models: &[&str] = match provider {
        ProviderId::Groq => &[
            "llama-3.1-8b-instant",
            "llama-3.1-70b-versatile",
            "llama-3.2-11b-text-preview",
            "llama-3.2-3b-preview",
            "mixtral-8x7b-32768",
        ],
        ProviderId::Cohere => &["command-light", "command", "command-nightly"],
    };
    models.iter().map(|m| m.to_string()).collect()
}

pub fn default_aliases(provider: ProviderId) -> AliasTable {
    let mut m = AliasTable::new();
    match provider {
        ProviderId::Groq => {
            // Pro-class Gemini names go to the larger Llama, the rest to the fast one.
            for name in GEMINI_NAMES {
                let target = if name.starts_with("gemini-1.5-pro") {
                    "llama-3.1-70b-versatile"
                } else {
                    "llama-3.1-8b-instant"
                };
                m.insert(name.to_string(), target.to_string());
            }
        }
        ProviderId::Cohere => {
            for name in GEMINI_NAMES {
                m.insert(name.to_string(), "command-light".to_string());
            }
        }
    }
    m
}
