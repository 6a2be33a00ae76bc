use serde::{Deserialize, Serialize};

/// Upstream providers the proxy can forward to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Groq,
    Cohere,
}

impl ProviderId {
    pub const ALL: [ProviderId; 2] = [ProviderId::Groq, ProviderId::Cohere];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Groq => "groq",
            ProviderId::Cohere => "cohere",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        let key = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == key)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderId::Groq => "Groq",
            ProviderId::Cohere => "Cohere",
        }
    }

    /// Environment variable holding the provider API key.
    pub fn api_key_env(self) -> &'static str {
        match self {
            ProviderId::Groq => "GROQ_API_KEY",
            ProviderId::Cohere => "COHERE_API_KEY",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderId::Groq => "https://api.groq.com",
            ProviderId::Cohere => "https://api.cohere.ai",
        }
    }

    /// Routes served by this provider. `/api/gemini` is the path the browser
    /// client posts to and has always been served by Cohere.
    pub fn routes(self) -> &'static [&'static str] {
        match self {
            ProviderId::Groq => &["/api/groq"],
            ProviderId::Cohere => &["/api/cohere", "/api/gemini"],
        }
    }

    /// Name a route uses in its `<label> proxy error` reply. `/api/gemini`
    /// keeps the label the browser client has always seen.
    pub fn route_label(self, path: &str) -> &'static str {
        match path {
            "/api/gemini" => "Gemini",
            _ => self.display_name(),
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversation turn as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}
