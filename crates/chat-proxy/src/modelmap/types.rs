use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Provider-supported model identifiers.
pub type ModelCatalog = BTreeSet<String>;

/// Legacy or foreign identifier -> target identifier. Targets are not
/// guaranteed to be in the catalog.
pub type AliasTable = HashMap<String, String>;

/// How a requested model name was turned into a concrete model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    /// No usable name was supplied.
    Default,
    Exact,
    Alias,
    /// Matched the catalog after dropping a `-latest` suffix.
    TrimmedLatest,
    /// Matched the alias table after dropping a `-latest` suffix.
    TrimmedLatestAlias,
    /// Unknown name; the default model was substituted.
    Fallback,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Default => "default",
            Resolution::Exact => "exact",
            Resolution::Alias => "alias",
            Resolution::TrimmedLatest => "trimmed-latest",
            Resolution::TrimmedLatestAlias => "trimmed-latest-alias",
            Resolution::Fallback => "fallback",
        }
    }

    /// True when the resolved model is the configured default rather than a
    /// catalog match.
    pub fn uses_default(self) -> bool {
        matches!(self, Resolution::Default | Resolution::Fallback)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub model: String,
    pub resolution: Resolution,
    /// Trimmed input, or `None` when no textual name was supplied.
    pub original: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelMapError {
    #[error("model catalog for '{provider}' is empty")]
    EmptyCatalog { provider: String },
    #[error("default model '{model}' for '{provider}' is not in its catalog")]
    DefaultNotInCatalog { provider: String, model: String },
    #[error("model map references unknown provider '{0}'")]
    UnknownProvider(String),
}

/// Model map TOML file: per-provider overrides keyed by provider name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawModelMapFile {
    #[serde(default)]
    pub providers: HashMap<String, RawProviderModels>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProviderModels {
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
    /// Replace the built-in catalog with `models` instead of extending it.
    #[serde(default)]
    pub replace_models: bool,
    #[serde(default)]
    pub aliases: HashMap<String, String>, // alias -> target
}
