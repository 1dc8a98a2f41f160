use std::num::{NonZeroU32, NonZeroU64};

use anyhow::{bail, Context, Result};

use crate::db::schema::ReadingsSchema;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub schema: ReadingsSchema,
    pub server_host: String,
    pub server_port: u16,
    /// MQTT ingestion is enabled only when `MQTT_BROKER_HOST` is set.
    pub mqtt: Option<MqttConfig>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: NonZeroU32,
    /// Seconds to wait for a pooled connection before failing with a storage error.
    pub acquire_timeout_secs: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub topic: String,
    /// Username and password, set together or not at all.
    pub credentials: Option<(String, String)>,
    /// Location recorded for payloads that do not name one.
    pub default_location: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        Ok(Self {
            database: DatabaseConfig {
                url: vars.required("DATABASE_URL")?,
                max_connections: vars
                    .optional("DB_MAX_CONNECTIONS", "10")
                    .parse()
                    .context("DB_MAX_CONNECTIONS must be a positive integer")?,
                acquire_timeout_secs: vars
                    .optional("DB_ACQUIRE_TIMEOUT_SECS", "5")
                    .parse()
                    .context("DB_ACQUIRE_TIMEOUT_SECS must be a positive integer")?,
            },
            schema: ReadingsSchema::new(vars.optional("READINGS_TABLE", ReadingsSchema::DEFAULT_TABLE))
                .context("READINGS_TABLE is not a valid table name")?,
            server_host: vars.optional("SERVER_HOST", "0.0.0.0"),
            server_port: vars
                .optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            mqtt: MqttConfig::from_vars(&vars)?,
        })
    }
}

impl MqttConfig {
    fn from_vars<F>(vars: &Vars<F>) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(broker_host) = vars.get("MQTT_BROKER_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            broker_host,
            broker_port: vars
                .optional("MQTT_BROKER_PORT", "1883")
                .parse()
                .context("MQTT_BROKER_PORT must be a valid port number")?,
            client_id: vars.optional("MQTT_CLIENT_ID", "temperature-service"),
            topic: vars.optional("MQTT_TOPIC", "sensors/temperature"),
            credentials: match (vars.get("MQTT_USERNAME"), vars.get_raw("MQTT_PASSWORD")) {
                (Some(username), Some(password)) => Some((username, password)),
                (None, None) => None,
                (Some(_), None) => bail!("MQTT_USERNAME is set but MQTT_PASSWORD is missing"),
                (None, Some(_)) => bail!("MQTT_PASSWORD is set but MQTT_USERNAME is missing"),
            },
            default_location: vars.get("MQTT_DEFAULT_LOCATION"),
        }))
    }
}

// ---------------------------------------------------------------------------
// Variable lookup helpers
// ---------------------------------------------------------------------------

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Returns the value for `key`, treating blank values as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    /// Like `get`, but keeps surrounding whitespace. Used for secrets.
    fn get_raw(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("missing required env var: {key}"))
    }

    fn optional(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }
}
