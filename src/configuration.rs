use serde;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub app_port: u16,
    pub app_host: String,
    pub webhook: WebhookSettings,
    #[serde(default)]
    pub entitlement: EntitlementSettings,
    /// Overrides the catalog compiled into the binary.
    #[serde(default)]
    pub catalog_path: Option<String>,
    #[serde(default)]
    pub gates: Vec<GateSettings>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database_name: String,
}

#[derive(Clone, serde::Deserialize)]
pub struct WebhookSettings {
    pub secret: String,
    #[serde(default = "WebhookSettings::default_tolerance_secs")]
    pub tolerance_secs: u64,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EntitlementSettings {
    #[serde(default = "EntitlementSettings::default_past_due_grace_days")]
    pub past_due_grace_days: i64,
}

/// Requests whose path falls under `prefix` need `feature`.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct GateSettings {
    pub prefix: String,
    pub feature: String,
}

impl WebhookSettings {
    const fn default_tolerance_secs() -> u64 {
        300
    }
}

// The secret must never reach the logs.
impl std::fmt::Debug for WebhookSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSettings")
            .field("secret", &"********")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl EntitlementSettings {
    const fn default_past_due_grace_days() -> i64 {
        3
    }
}

impl Default for EntitlementSettings {
    fn default() -> Self {
        Self {
            past_due_grace_days: Self::default_past_due_grace_days(),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // configuration.yaml first, then APP__SECTION__KEY environment overrides
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration"))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;

    let mut config: Settings = settings.try_deserialize()?;

    if let Ok(secret) = std::env::var("BILLING_WEBHOOK_SECRET") {
        config.webhook.secret = secret;
    }
    if config.webhook.secret.trim().is_empty() {
        return Err(config::ConfigError::NotFound(
            "BILLING_WEBHOOK_SECRET".to_string(),
        ));
    }

    Ok(config)
}
