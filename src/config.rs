use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Tickets from any other country (or with no coordinates) go to a hub.
    #[serde(default = "default_home_country")]
    pub home_country: String,
    /// Hub office names in toggle order; foreign/unknown tickets alternate
    /// between the first two that exist in the loaded office set.
    #[serde(default = "default_hub_offices")]
    pub hub_offices: Vec<String>,
    #[serde(default = "default_home_language")]
    pub default_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_base_url")]
    pub base_url: String,
    #[serde(default = "default_geocoder_user_agent")]
    pub user_agent: String,
    /// Provider rate-limit floor between outbound requests. Nominatim policy
    /// caps at 1 req/s, so the default leaves headroom.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Extra attempts per address variant after a transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl GeocoderConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub home_country: Option<String>,
    pub geocoder_base_url: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/ticket-dispatch/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(home_country) = overrides.home_country {
            self.routing.home_country = home_country;
        }
        if let Some(base_url) = overrides.geocoder_base_url {
            self.geocoder.base_url = base_url;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn default_template() -> String {
        let template = r#"[routing]
home_country = "Kazakhstan"
hub_offices = ["Astana", "Almaty"]
default_language = "RU"

[geocoder]
base_url = "https://nominatim.openstreetmap.org"
user_agent = "ticket-dispatch/0.1"
min_interval_ms = 1100
max_retries = 3
retry_base_delay_ms = 2000
timeout_secs = 10
"#;
        template.to_string()
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            home_country: default_home_country(),
            hub_offices: default_hub_offices(),
            default_language: default_home_language(),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_base_url(),
            user_agent: default_geocoder_user_agent(),
            min_interval_ms: default_min_interval_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_home_country() -> String {
    "Kazakhstan".to_string()
}

fn default_hub_offices() -> Vec<String> {
    vec!["Astana".to_string(), "Almaty".to_string()]
}

fn default_home_language() -> String {
    "RU".to_string()
}

fn default_geocoder_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_geocoder_user_agent() -> String {
    "ticket-dispatch/0.1".to_string()
}

fn default_min_interval_ms() -> u64 {
    1100
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    2000
}

fn default_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_back_into_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).unwrap();
        assert_eq!(parsed.routing.home_country, "Kazakhstan");
        assert_eq!(parsed.routing.hub_offices.len(), 2);
        assert_eq!(parsed.geocoder.min_interval_ms, 1100);
    }

    #[test]
    fn empty_config_falls_back_to_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed.geocoder.max_retries, 3);
        assert_eq!(parsed.routing.default_language, "RU");
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            home_country: Some("Germany".to_string()),
            geocoder_base_url: Some("http://localhost:8088".to_string()),
        });
        assert_eq!(config.routing.home_country, "Germany");
        assert_eq!(config.geocoder.base_url, "http://localhost:8088");
    }
}
