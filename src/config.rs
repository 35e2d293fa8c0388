use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::planner::PlannerConfig;
use crate::reference::DEFAULT_REGISTRY_HOSTNAME;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub default_registry: String,
    pub pretty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_registry: DEFAULT_REGISTRY_HOSTNAME.into(),
            pretty: true,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("rollplan.toml"))
            .merge(Json::file("rollplan.json"))
            .merge(Env::prefixed("ROLLPLAN_"))
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        config.default_registry = config.default_registry.trim().to_string();
        if config.default_registry.is_empty() {
            return Err(anyhow::anyhow!("default_registry must not be empty"));
        }

        Ok(config)
    }

    pub fn planner(&self) -> PlannerConfig {
        PlannerConfig {
            default_registry: self.default_registry.clone(),
        }
    }
}
