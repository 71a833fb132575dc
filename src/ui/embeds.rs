use serenity::all::Timestamp;
use serenity::builder::{CreateEmbed, CreateEmbedFooter};
use std::time::Duration;

use crate::audio::queue::QueueItem;
use crate::sources::TrackSource;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Aria Music";

/// Embed de "reproduciendo ahora"
pub fn now_playing(track: &TrackSource) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field(
            "🎤 Artista",
            track.artist().unwrap_or_else(|| "Desconocido".to_string()),
            true,
        );

    if let Some(duration) = track.duration() {
        embed = embed.field("⏱️ Duración", format_duration(duration), true);
    } else {
        embed = embed.field("⏱️ Duración", "🔴 En vivo", true);
    }

    embed = embed.field(
        "👤 Solicitado por",
        format!("<@{}>", track.requested_by()),
        true,
    );

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(track.url())
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de canción agregada a la cola
pub fn track_added(track: &TrackSource, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("**{}** entró a la cola", track.title()))
        .color(colors::MUSIC_PURPLE)
        .field("📊 Posición", position.to_string(), true);

    if let Some(duration) = track.duration() {
        embed = embed.field("⏱️ Duración", format_duration(duration), true);
    }

    embed = embed.field(
        "👤 Solicitado por",
        format!("<@{}>", track.requested_by()),
        true,
    );

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(track.url())
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed con las próximas canciones de la cola
pub fn queue_list(current: Option<&TrackSource>, upcoming: &[QueueItem]) -> CreateEmbed {
    let mut description = String::new();

    if let Some(track) = current {
        description.push_str(&format!("▶️ Ahora: **{}**\n\n", track.title()));
    }

    if upcoming.is_empty() {
        description.push_str("No hay más canciones en espera.");
    } else {
        for (index, item) in upcoming.iter().enumerate() {
            description.push_str(&format!(
                "`{}.` **{}** · en cola desde hace {}\n",
                index + 1,
                item.track.title(),
                queue_age(item)
            ));
        }
    }

    CreateEmbed::default()
        .title(format!("📋 Próximas {}", upcoming.len()))
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed informativo genérico
pub fn info(message: &str) -> CreateEmbed {
    CreateEmbed::default()
        .description(message.to_string())
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de error visible para el usuario
pub fn error(message: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Algo salió mal")
        .description(message.to_string())
        .color(colors::ERROR_RED)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Tiempo que un item lleva esperando, redondeado a segundos
fn queue_age(item: &QueueItem) -> String {
    let age = (chrono::Utc::now() - item.enqueued_at)
        .to_std()
        .unwrap_or_default();
    humantime::format_duration(Duration::from_secs(age.as_secs())).to_string()
}

/// Formatea una duración como h:mm:ss o m:ss
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(61)), "1:01");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1:01:01");
    }
}
