use std::path::Path;

use anyhow::Context as _;
use serde_derive::Deserialize;
use uuid::Uuid;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    pub scan: Option<ScanConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ScanConfig {
    /// Only report peripherals advertising one of these services. Empty or
    /// missing means every service.
    pub services: Option<Vec<Uuid>>,
    /// Index into the platform's adapter list.
    pub adapter: Option<usize>,
    /// Also report repeat advertisements from already-discovered peripherals.
    pub report_updates: Option<bool>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::de::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn scan(&self) -> ScanConfig {
        self.scan.clone().unwrap_or_default()
    }
}
