use super::{AliasTable, ModelCatalog, ModelMapError, Resolution, ResolutionResult};

const LATEST_SUFFIX: &str = "-latest";

/// Catalog, alias table and default model for one upstream provider.
///
/// Built once at startup; `resolve` is pure and never fails.
#[derive(Debug, Clone)]
pub struct ModelResolver {
    catalog: ModelCatalog,
    aliases: AliasTable,
    default_model: String,
}

impl ModelResolver {
    pub fn new(
        provider: impl Into<String>,
        catalog: ModelCatalog,
        aliases: AliasTable,
        default_model: impl Into<String>,
    ) -> Result<Self, ModelMapError> {
        let provider = provider.into();
        let default_model = default_model.into();
        if catalog.is_empty() {
            return Err(ModelMapError::EmptyCatalog { provider });
        }
        if !catalog.contains(&default_model) {
            return Err(ModelMapError::DefaultNotInCatalog {
                provider,
                model: default_model,
            });
        }
        let dead = aliases
            .iter()
            .filter(|(_, target)| !catalog.contains(*target))
            .count();
        if dead > 0 {
            tracing::debug!(
                "model map for '{}' has {} alias(es) with targets outside the catalog",
                provider,
                dead
            );
        }
        Ok(Self {
            catalog,
            aliases,
            default_model,
        })
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Map a requested model name to a model this provider supports.
    ///
    /// Order: alias table, catalog, then the same two lookups with a trailing
    /// `-latest` removed. Anything else resolves to the default model.
    pub fn resolve(&self, raw: Option<&str>) -> ResolutionResult {
        let Some(raw) = raw else {
            return self.with_default(Resolution::Default, None);
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return self.with_default(Resolution::Default, Some(trimmed));
        }

        if let Some(target) = self.live_alias(trimmed) {
            let resolution = if target == trimmed {
                Resolution::Exact
            } else {
                Resolution::Alias
            };
            return resolved(target, resolution, trimmed);
        }

        if self.catalog.contains(trimmed) {
            return resolved(trimmed, Resolution::Exact, trimmed);
        }

        if let Some(base) = trimmed.strip_suffix(LATEST_SUFFIX) {
            if let Some(target) = self.live_alias(base) {
                return resolved(target, Resolution::TrimmedLatestAlias, trimmed);
            }
            if self.catalog.contains(base) {
                return resolved(base, Resolution::TrimmedLatest, trimmed);
            }
        }

        self.with_default(Resolution::Fallback, Some(trimmed))
    }

    /// Alias target, only if it is in the catalog.
    fn live_alias(&self, key: &str) -> Option<&str> {
        self.aliases
            .get(key)
            .filter(|target| self.catalog.contains(*target))
            .map(String::as_str)
    }

    fn with_default(&self, resolution: Resolution, original: Option<&str>) -> ResolutionResult {
        ResolutionResult {
            model: self.default_model.clone(),
            resolution,
            original: original.map(str::to_string),
        }
    }
}

fn resolved(model: &str, resolution: Resolution, original: &str) -> ResolutionResult {
    ResolutionResult {
        model: model.to_string(),
        resolution,
        original: Some(original.to_string()),
    }
}
