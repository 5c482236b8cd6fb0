use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `TIER_SERVICE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub loyalty: LoyaltyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            loyalty: LoyaltyConfig::default(),
        }
    }
}

// ─── Loyalty Config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LoyaltyConfig {
    /// Idle days up to which keep/upgrade rules apply.
    #[serde(default = "default_active_window_days")]
    pub active_window_days: i64,
    /// Idle days up to which the customer drops one tier; beyond it they reset.
    #[serde(default = "default_downgrade_window_days")]
    pub downgrade_window_days: i64,
    /// Reject transactions timestamped before the customer's last one.
    #[serde(default = "default_reject_out_of_order")]
    pub reject_out_of_order: bool,
    /// JSON document with tiers, journeys and point checkpoints.
    /// The built-in BRONZE/SILVER/GOLD program is used when unset.
    #[serde(default)]
    pub reference_data_path: Option<String>,
}

fn default_active_window_days() -> i64 { 30 }
fn default_downgrade_window_days() -> i64 { 60 }
fn default_reject_out_of_order() -> bool { true }

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            active_window_days: default_active_window_days(),
            downgrade_window_days: default_downgrade_window_days(),
            reject_out_of_order: default_reject_out_of_order(),
            reference_data_path: None,
        }
    }
}

impl LoyaltyConfig {
    pub fn validate(&self) -> Result<(), crate::TierError> {
        if self.active_window_days < 0 {
            return Err(crate::TierError::Config(
                "active_window_days must be non-negative".to_string(),
            ));
        }
        if self.downgrade_window_days < self.active_window_days {
            return Err(crate::TierError::Config(format!(
                "downgrade_window_days ({}) must not be shorter than active_window_days ({})",
                self.downgrade_window_days, self.active_window_days
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("TIER_SERVICE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
