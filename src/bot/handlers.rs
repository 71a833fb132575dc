use std::sync::Arc;

use anyhow::Result;
use serenity::all::{ChannelId, CommandInteraction, GuildId, ResolvedValue, UserId};
use serenity::builder::{
    CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
    EditInteractionResponse,
};
use serenity::prelude::Context;
use tracing::{debug, info, warn};

use crate::audio::backend::{ChannelNotifier, SongbirdSink};
use crate::bot::AriaBot;
use crate::error::VoiceError;
use crate::ui::embeds;

/// Reproduce una búsqueda o URL en el canal de voz del usuario.
///
/// Se conecta (o se muda) al canal del usuario si hace falta, resuelve solo
/// la metadata y encola un descriptor diferido; el stream se resuelve recién
/// cuando le toca sonar.
pub async fn play(ctx: &Context, cmd: &CommandInteraction, bot: &AriaBot) -> Result<()> {
    let Some(guild_id) = guild_of(ctx, cmd).await? else {
        return Ok(());
    };
    let Some(query) = option_str(cmd, "query") else {
        return respond(ctx, cmd, embeds::error("Falta el término de búsqueda")).await;
    };

    // La resolución puede tardar más que la ventana de respuesta de Discord
    cmd.defer(&ctx.http).await?;

    let Some(voice_channel) = user_voice_channel(ctx, guild_id, cmd.user.id) else {
        return edit(
            ctx,
            cmd,
            embeds::error(&VoiceError::InvalidVoiceChannel.to_string()),
        )
        .await;
    };

    let call = match bot.voice().join(guild_id, voice_channel).await {
        Ok(call) => call,
        Err(e) => return edit(ctx, cmd, embeds::error(&e.to_string())).await,
    };

    let player = bot.registry().get_or_create(
        guild_id,
        Arc::new(SongbirdSink::new(call)),
        Arc::new(ChannelNotifier::new(Arc::clone(&ctx.http), cmd.channel_id)),
    );

    match bot.resolver().resolve_metadata(&query, cmd.user.id).await {
        Ok(track) => {
            let position = player.queue_len() + 1;
            player.enqueue(track.clone());
            info!("📥 {} encoló '{}' en guild {guild_id}", cmd.user.name, track.title());
            edit(ctx, cmd, embeds::track_added(&track, position)).await
        }
        Err(e) => {
            warn!("Búsqueda fallida para '{query}': {e}");
            edit(
                ctx,
                cmd,
                embeds::error(&format!("No encontré nada para **{query}**\n```{e}```")),
            )
            .await
        }
    }
}

/// Conecta el bot al canal de voz del usuario sin reproducir nada
pub async fn join(ctx: &Context, cmd: &CommandInteraction, bot: &AriaBot) -> Result<()> {
    let Some(guild_id) = guild_of(ctx, cmd).await? else {
        return Ok(());
    };

    cmd.defer(&ctx.http).await?;

    let Some(voice_channel) = user_voice_channel(ctx, guild_id, cmd.user.id) else {
        return edit(
            ctx,
            cmd,
            embeds::error(&VoiceError::InvalidVoiceChannel.to_string()),
        )
        .await;
    };

    match bot.voice().join(guild_id, voice_channel).await {
        Ok(_) => {
            edit(
                ctx,
                cmd,
                embeds::info(&format!("✅ Conectado a <#{voice_channel}>")),
            )
            .await
        }
        Err(e) => edit(ctx, cmd, embeds::error(&e.to_string())).await,
    }
}

/// Pausa la canción actual
pub async fn pause(ctx: &Context, cmd: &CommandInteraction, bot: &AriaBot) -> Result<()> {
    let Some(guild_id) = guild_of(ctx, cmd).await? else {
        return Ok(());
    };

    let Some(player) = bot.registry().get(guild_id) else {
        return respond(ctx, cmd, nothing_playing()).await;
    };

    if player.pause().await {
        respond(
            ctx,
            cmd,
            embeds::info(&format!("⏸️ **{}** pausó la reproducción", cmd.user.name)),
        )
        .await
    } else {
        respond(ctx, cmd, nothing_playing()).await
    }
}

/// Reanuda la canción pausada
pub async fn resume(ctx: &Context, cmd: &CommandInteraction, bot: &AriaBot) -> Result<()> {
    let Some(guild_id) = guild_of(ctx, cmd).await? else {
        return Ok(());
    };

    let Some(player) = bot.registry().get(guild_id) else {
        return respond(ctx, cmd, nothing_playing()).await;
    };

    if player.resume().await {
        respond(
            ctx,
            cmd,
            embeds::info(&format!("▶️ **{}** reanudó la reproducción", cmd.user.name)),
        )
        .await
    } else {
        respond(ctx, cmd, embeds::info("No hay nada pausado")).await
    }
}

/// Salta la canción actual; también funciona si está pausada
pub async fn skip(ctx: &Context, cmd: &CommandInteraction, bot: &AriaBot) -> Result<()> {
    let Some(guild_id) = guild_of(ctx, cmd).await? else {
        return Ok(());
    };

    let Some(player) = bot.registry().get(guild_id) else {
        return respond(ctx, cmd, nothing_playing()).await;
    };

    if player.skip().await {
        respond(
            ctx,
            cmd,
            embeds::info(&format!("⏭️ **{}** saltó la canción", cmd.user.name)),
        )
        .await
    } else {
        respond(ctx, cmd, nothing_playing()).await
    }
}

/// Detiene la reproducción, vacía la cola y desconecta el bot.
/// Esto destruye el player del guild junto con su configuración.
pub async fn stop(ctx: &Context, cmd: &CommandInteraction, bot: &AriaBot) -> Result<()> {
    let Some(guild_id) = guild_of(ctx, cmd).await? else {
        return Ok(());
    };

    if bot.registry().get(guild_id).is_none() {
        return respond(ctx, cmd, nothing_playing()).await;
    }

    bot.registry().cleanup(guild_id).await;
    respond(
        ctx,
        cmd,
        embeds::info(&format!("⏹️ **{}** detuvo la música, ¡hasta la próxima!", cmd.user.name)),
    )
    .await
}

/// Muestra las próximas canciones de la cola
pub async fn queue(ctx: &Context, cmd: &CommandInteraction, bot: &AriaBot) -> Result<()> {
    let Some(guild_id) = guild_of(ctx, cmd).await? else {
        return Ok(());
    };

    let Some(player) = bot.registry().get(guild_id) else {
        return respond(ctx, cmd, embeds::info("No estoy conectado a voz")).await;
    };

    let current = player.current();
    let upcoming = player.upcoming(bot.config().queue_preview);

    if current.is_none() && upcoming.is_empty() {
        return respond(ctx, cmd, embeds::info("No hay canciones en cola")).await;
    }

    respond(ctx, cmd, embeds::queue_list(current.as_ref(), &upcoming)).await
}

/// Vuelve a publicar el aviso de "reproduciendo ahora", borrando el anterior
pub async fn nowplaying(ctx: &Context, cmd: &CommandInteraction, bot: &AriaBot) -> Result<()> {
    let Some(guild_id) = guild_of(ctx, cmd).await? else {
        return Ok(());
    };

    let Some(player) = bot.registry().get(guild_id) else {
        return respond(ctx, cmd, nothing_playing()).await;
    };
    let Some(track) = player.current() else {
        return respond(ctx, cmd, nothing_playing()).await;
    };

    if let Some((channel_id, message_id)) = player.take_now_playing() {
        if let Err(e) = channel_id.delete_message(&ctx.http, message_id).await {
            debug!("No se pudo borrar el aviso previo: {e}");
        }
    }

    respond(ctx, cmd, embeds::now_playing(&track)).await?;

    // La respuesta pasa a ser el aviso vigente, para poder borrarla después
    if let Ok(message) = cmd.get_response(&ctx.http).await {
        player.store_now_playing((message.channel_id, message.id));
    }

    Ok(())
}

/// Fija el volumen del servidor (1 a 100)
pub async fn volume(ctx: &Context, cmd: &CommandInteraction, bot: &AriaBot) -> Result<()> {
    let Some(guild_id) = guild_of(ctx, cmd).await? else {
        return Ok(());
    };

    let Some(level) = option_int(cmd, "nivel") else {
        return respond(ctx, cmd, embeds::error("Falta el nivel de volumen")).await;
    };
    if !(1..=100).contains(&level) {
        return respond(ctx, cmd, embeds::info("El volumen va de 1 a 100")).await;
    }

    let Some(player) = bot.registry().get(guild_id) else {
        return respond(ctx, cmd, embeds::info("No estoy conectado a voz")).await;
    };

    player.set_volume(level as f32 / 100.0).await;
    respond(
        ctx,
        cmd,
        embeds::info(&format!("🔊 **{}** fijó el volumen en **{level}%**", cmd.user.name)),
    )
    .await
}

// Helpers

async fn respond(ctx: &Context, cmd: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    let message = CreateInteractionResponseMessage::new().embed(embed);
    cmd.create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await?;
    Ok(())
}

async fn edit(ctx: &Context, cmd: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    cmd.edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}

fn nothing_playing() -> CreateEmbed {
    embeds::info("No estoy reproduciendo nada ahora mismo")
}

/// Guild del comando; responde y devuelve `None` si llegó por DM
async fn guild_of(ctx: &Context, cmd: &CommandInteraction) -> Result<Option<GuildId>> {
    match cmd.guild_id {
        Some(guild_id) => Ok(Some(guild_id)),
        None => {
            respond(
                ctx,
                cmd,
                embeds::info("Este comando solo funciona dentro de un servidor"),
            )
            .await?;
            Ok(None)
        }
    }
}

/// Canal de voz en el que está el usuario, según la caché
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    ctx.cache
        .guild(guild_id)
        .and_then(|guild| guild.voice_states.get(&user_id).and_then(|vs| vs.channel_id))
}

fn option_str(cmd: &CommandInteraction, name: &str) -> Option<String> {
    cmd.data
        .options()
        .into_iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            ResolvedValue::String(value) => Some(value.to_string()),
            _ => None,
        })
}

fn option_int(cmd: &CommandInteraction, name: &str) -> Option<i64> {
    cmd.data
        .options()
        .into_iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            ResolvedValue::Integer(value) => Some(value),
            _ => None,
        })
}
