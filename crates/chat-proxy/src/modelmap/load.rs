use anyhow::Context as _;

use super::default::{default_aliases, default_catalog, default_model};
use super::{ModelMap, ModelMapError, ModelResolver, RawModelMapFile, RawProviderModels};
use crate::provider::ProviderId;

pub fn from_toml_str(s: &str) -> anyhow::Result<ModelMap> {
    let raw: RawModelMapFile = toml::from_str(s)?;
    Ok(build_model_map(raw)?)
}

pub fn load_from_file(path: &std::path::Path) -> anyhow::Result<ModelMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read model map '{}'", path.display()))?;
    from_toml_str(&content).with_context(|| format!("invalid model map '{}'", path.display()))
}

pub fn load_default() -> Result<ModelMap, ModelMapError> {
    build_model_map(RawModelMapFile::default())
}

fn build_model_map(raw: RawModelMapFile) -> Result<ModelMap, ModelMapError> {
    let mut overrides = std::collections::HashMap::new();
    for (name, entry) in raw.providers {
        let Some(p) = ProviderId::from_name(&name) else {
            return Err(ModelMapError::UnknownProvider(name));
        };
        overrides.insert(p, entry);
    }
    Ok(ModelMap {
        groq: build_resolver(ProviderId::Groq, overrides.remove(&ProviderId::Groq))?,
        cohere: build_resolver(ProviderId::Cohere, overrides.remove(&ProviderId::Cohere))?,
    })
}

fn build_resolver(
    provider: ProviderId,
    entry: Option<RawProviderModels>,
) -> Result<ModelResolver, ModelMapError> {
    let mut catalog = default_catalog(provider);
    let mut aliases = default_aliases(provider);
    let mut default = default_model(provider).to_string();

    if let Some(e) = entry {
        if e.replace_models {
            catalog.clear();
        }
        catalog.extend(e.models.into_iter().map(|m| m.trim().to_string()));
        for (k, v) in e.aliases {
            aliases.insert(k.trim().to_string(), v.trim().to_string());
        }
        if let Some(d) = e.default_model {
            default = d.trim().to_string();
        }
        tracing::debug!(
            "model map override for {}: catalog={}, aliases={}, default={}",
            provider,
            catalog.len(),
            aliases.len(),
            default
        );
    }

    ModelResolver::new(provider.as_str(), catalog, aliases, default)
}
