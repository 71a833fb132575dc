use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Reproducción
    pub default_volume: f32,
    pub idle_timeout: Duration,

    // UI
    pub queue_preview: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Reproducción
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            idle_timeout: match std::env::var("IDLE_TIMEOUT") {
                Ok(val) if !val.trim().is_empty() => humantime::parse_duration(val.trim())?,
                _ => Duration::from_secs(300), // 5 minutos
            },

            // UI
            queue_preview: std::env::var("QUEUE_PREVIEW")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Valida los valores antes de arrancar el bot
    pub fn validate(&self) -> Result<()> {
        if self.default_volume <= 0.0 || self.default_volume > 1.0 {
            anyhow::bail!(
                "DEFAULT_VOLUME debe estar entre 0.0 (exclusivo) y 1.0, recibido: {}",
                self.default_volume
            );
        }

        if self.idle_timeout.is_zero() {
            anyhow::bail!("IDLE_TIMEOUT debe ser mayor que cero");
        }

        if self.queue_preview == 0 {
            anyhow::bail!("QUEUE_PREVIEW debe ser mayor que cero");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults, deben proveerse)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            // Reproducción
            default_volume: 0.5,
            idle_timeout: Duration::from_secs(300),

            // UI
            queue_preview: 5,
        }
    }
}
