use serde::{Deserialize, Serialize};

/// Describes a model the service knows how to present to clinicians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub family: String,
    pub size: String,
    pub recommended_timeout_secs: u64,
}

struct CatalogEntry {
    name: &'static str,
    display_name: &'static str,
    description: &'static str,
    family: &'static str,
    size: &'static str,
    recommended_timeout_secs: u64,
}

const SUPPORTED_MODELS: &[CatalogEntry] = &[
    CatalogEntry {
        name: "llama3.1:8b",
        display_name: "Llama 3.1 8B",
        description: "High-quality general model for complex tasks",
        family: "llama",
        size: "8B",
        recommended_timeout_secs: 360,
    },
    CatalogEntry {
        name: "llama3.2:3b",
        display_name: "Llama 3.2 3B",
        description: "Lightweight fast model for simple tasks",
        family: "llama",
        size: "3B",
        recommended_timeout_secs: 180,
    },
    CatalogEntry {
        name: "mistral:7b",
        display_name: "Mistral 7B",
        description: "Balanced performance and resource usage",
        family: "mistral",
        size: "7B",
        recommended_timeout_secs: 300,
    },
];

impl From<&CatalogEntry> for ModelDescriptor {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            name: entry.name.to_string(),
            display_name: entry.display_name.to_string(),
            description: entry.description.to_string(),
            family: entry.family.to_string(),
            size: entry.size.to_string(),
            recommended_timeout_secs: entry.recommended_timeout_secs,
        }
    }
}

/// The static catalog returned whenever the live inventory cannot be used.
pub fn supported_models() -> Vec<ModelDescriptor> {
    SUPPORTED_MODELS.iter().map(ModelDescriptor::from).collect()
}

/// Catalog entries present in `installed`; the full catalog when none are.
pub fn filter_installed(installed: &[String]) -> Vec<ModelDescriptor> {
    let available: Vec<ModelDescriptor> = SUPPORTED_MODELS
        .iter()
        .filter(|entry| installed.iter().any(|name| name == entry.name))
        .map(ModelDescriptor::from)
        .collect();

    if available.is_empty() {
        supported_models()
    } else {
        available
    }
}
