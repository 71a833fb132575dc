use anyhow::Result;
use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::backend::SongbirdConnector;
use crate::audio::registry::PlayerRegistry;
use crate::bot::AriaBot;
use crate::config::Config;
use crate::sources::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aria_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Aria Music v{}", env!("CARGO_PKG_VERSION"));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let config = Config::load()?;

    // Intents mínimos: comandos slash + estados de voz para ubicar al usuario
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // El manager se comparte entre serenity y el registro de players
    let manager = Songbird::serenity();
    let voice = Arc::new(SongbirdConnector::new(Arc::clone(&manager)));
    let resolver = Arc::new(YtDlpResolver::new());

    let registry = Arc::new(PlayerRegistry::new(
        voice.clone(),
        resolver.clone(),
        config.default_volume,
        config.idle_timeout,
    ));

    let handler = AriaBot::new(
        config.clone(),
        Arc::clone(&registry),
        resolver,
        voice,
    );

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?;

    // Apagado ordenado: cortar los loops de player y después los shards
    let shard_manager = client.shard_manager.clone();
    let registry_for_shutdown = Arc::clone(&registry);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("No se pudo registrar Ctrl+C: {e}");
            return;
        }
        info!("⚠️ Señal de apagado recibida, cerrando...");
        registry_for_shutdown.shutdown();
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {why:?}");
    }

    Ok(())
}

/// Verifica que el extractor externo esté disponible
async fn health_check() -> Result<()> {
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("yt-dlp no está disponible");
    }
}
