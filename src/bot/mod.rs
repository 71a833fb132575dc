//! # Bot Module
//!
//! Integración con Discord: registro de comandos slash y despacho de
//! interacciones hacia los players.
//!
//! El estado compartido vive en [`AriaBot`]: la configuración, el registro de
//! players, el resolver y el conector de voz. Cada interacción corre en su
//! propia tarea corta; los loops de player corren aparte, uno por guild.

use std::sync::Arc;

use serenity::all::{Context, EventHandler, Interaction, Ready};
use serenity::async_trait;
use serenity::model::id::GuildId;
use tracing::{error, info};

pub mod commands;
pub mod handlers;

use crate::audio::backend::VoiceConnector;
use crate::audio::registry::PlayerRegistry;
use crate::config::Config;
use crate::sources::Resolver;

/// Handler principal del bot
pub struct AriaBot {
    config: Arc<Config>,
    registry: Arc<PlayerRegistry>,
    resolver: Arc<dyn Resolver>,
    voice: Arc<dyn VoiceConnector>,
}

impl AriaBot {
    pub fn new(
        config: Config,
        registry: Arc<PlayerRegistry>,
        resolver: Arc<dyn Resolver>,
        voice: Arc<dyn VoiceConnector>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            resolver,
            voice,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PlayerRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    pub fn voice(&self) -> &Arc<dyn VoiceConnector> {
        &self.voice
    }
}

#[async_trait]
impl EventHandler for AriaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} conectado y listo", ready.user.name);
        info!("🔧 Application ID: {}", self.config.application_id);

        let result = match self.config.guild_id {
            Some(guild_id) => commands::register_guild_commands(&ctx, GuildId::new(guild_id)).await,
            None => commands::register_global_commands(&ctx).await,
        };

        match result {
            Ok(()) => info!("✅ Comandos slash registrados"),
            Err(e) => error!("Error al registrar comandos: {e:?}"),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        let name = command.data.name.as_str();
        let result = match name {
            "play" => handlers::play(&ctx, &command, self).await,
            "join" => handlers::join(&ctx, &command, self).await,
            "pause" => handlers::pause(&ctx, &command, self).await,
            "resume" => handlers::resume(&ctx, &command, self).await,
            "skip" => handlers::skip(&ctx, &command, self).await,
            "stop" | "leave" => handlers::stop(&ctx, &command, self).await,
            "queue" => handlers::queue(&ctx, &command, self).await,
            "nowplaying" => handlers::nowplaying(&ctx, &command, self).await,
            "volume" => handlers::volume(&ctx, &command, self).await,
            _ => Ok(()),
        };

        if let Err(e) = result {
            error!("Error en comando /{name}: {e:?}");
        }
    }
}
