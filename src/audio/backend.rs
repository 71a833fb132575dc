//! Fronteras hacia el mundo exterior del player: el driver de voz, el canal
//! de texto para avisos y la conexión de voz en sí. Los loops de player
//! hablan solo con estos traits; las implementaciones concretas viven acá.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serenity::all::{ChannelId, GuildId, MessageId};
use serenity::builder::CreateMessage;
use serenity::http::Http;
use songbird::error::JoinError;
use songbird::input::{HttpRequest, Input};
use songbird::tracks::{PlayMode, TrackHandle};
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::error::VoiceError;
use crate::sources::TrackSource;
use crate::ui::embeds;

/// Referencia a un mensaje enviado, para poder borrarlo después
pub type MessageRef = (ChannelId, MessageId);

/// Salida de reproducción de un guild.
///
/// `start` arranca el stream y dispara `done` exactamente una vez cuando el
/// stream termina, falla o es detenido a la fuerza.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    async fn start(
        &self,
        track: &TrackSource,
        volume: f32,
        done: Arc<Notify>,
    ) -> Result<(), VoiceError>;

    async fn stop(&self);
    async fn pause(&self);
    async fn resume(&self);
    async fn set_volume(&self, volume: f32);
    async fn is_playing(&self) -> bool;
    async fn is_paused(&self) -> bool;

    /// Libera los recursos del stream que acaba de terminar
    async fn release(&self);
}

/// Avisos al usuario; todos los fallos se tragan y solo se loguean
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn now_playing(&self, track: &TrackSource) -> Option<MessageRef>;
    async fn resolve_failed(&self, track: &TrackSource, reason: &str);
    async fn delete(&self, message: MessageRef);
}

/// Conexión de voz por guild
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    /// Conecta al canal, o mueve la conexión existente hacia él
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<Mutex<Call>>, VoiceError>;

    /// Corta la conexión del guild; desconectar dos veces no es error
    async fn disconnect(&self, guild_id: GuildId) -> Result<(), VoiceError>;
}

/// Sink respaldado por songbird
pub struct SongbirdSink {
    call: Arc<Mutex<Call>>,
    http: Client,
    handle: parking_lot::Mutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    pub fn new(call: Arc<Mutex<Call>>) -> Self {
        Self {
            call,
            http: Client::new(),
            handle: parking_lot::Mutex::new(None),
        }
    }

    fn current_handle(&self) -> Option<TrackHandle> {
        self.handle.lock().clone()
    }
}

#[async_trait]
impl PlaybackSink for SongbirdSink {
    async fn start(
        &self,
        track: &TrackSource,
        volume: f32,
        done: Arc<Notify>,
    ) -> Result<(), VoiceError> {
        let stream_url = track.stream_url().ok_or(VoiceError::MissingStream)?;
        let input = Input::from(HttpRequest::new(self.http.clone(), stream_url));

        let mut call = self.call.lock().await;
        let handle = call.play_input(input);
        let _ = handle.set_volume(volume);

        // Fin natural y error de decodificación completan el mismo aviso:
        // un stream roto no puede dejar el loop colgado
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackDoneNotifier {
                        done: Arc::clone(&done),
                    },
                )
                .map_err(|e| VoiceError::Driver(e.to_string()))?;
        }

        *self.handle.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(handle) = self.current_handle() {
            let _ = handle.stop();
        }
    }

    async fn pause(&self) {
        if let Some(handle) = self.current_handle() {
            let _ = handle.pause();
        }
    }

    async fn resume(&self) {
        if let Some(handle) = self.current_handle() {
            let _ = handle.play();
        }
    }

    async fn set_volume(&self, volume: f32) {
        if let Some(handle) = self.current_handle() {
            let _ = handle.set_volume(volume);
        }
    }

    async fn is_playing(&self) -> bool {
        match self.current_handle() {
            Some(handle) => handle
                .get_info()
                .await
                .map(|info| info.playing == PlayMode::Play)
                .unwrap_or(false),
            None => false,
        }
    }

    async fn is_paused(&self) -> bool {
        match self.current_handle() {
            Some(handle) => handle
                .get_info()
                .await
                .map(|info| info.playing == PlayMode::Pause)
                .unwrap_or(false),
            None => false,
        }
    }

    async fn release(&self) {
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.stop();
        }
    }
}

/// Completa la señal del loop cuando songbird reporta fin o error del track
struct TrackDoneNotifier {
    done: Arc<Notify>,
}

#[async_trait]
impl VoiceEventHandler for TrackDoneNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("🎶 Stream finalizado, avisando al loop");
        self.done.notify_one();
        None
    }
}

/// Avisos por el canal de texto donde se invocó el comando
pub struct ChannelNotifier {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn now_playing(&self, track: &TrackSource) -> Option<MessageRef> {
        let message = CreateMessage::new().embed(embeds::now_playing(track));
        match self.channel_id.send_message(&self.http, message).await {
            Ok(sent) => Some((self.channel_id, sent.id)),
            Err(e) => {
                warn!("No se pudo enviar el aviso de reproducción: {e}");
                None
            }
        }
    }

    async fn resolve_failed(&self, track: &TrackSource, reason: &str) {
        let text = format!(
            "No pude reproducir **{}**, sigo con la siguiente.\n```{reason}```",
            track.title()
        );
        let message = CreateMessage::new().embed(embeds::error(&text));
        if let Err(e) = self.channel_id.send_message(&self.http, message).await {
            warn!("No se pudo enviar el aviso de fallo: {e}");
        }
    }

    async fn delete(&self, (channel_id, message_id): MessageRef) {
        if let Err(e) = channel_id.delete_message(&self.http, message_id).await {
            debug!("No se pudo borrar el aviso previo: {e}");
        }
    }
}

/// Conector respaldado por el manager de songbird
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<Mutex<Call>>, VoiceError> {
        match self.manager.join(guild_id, channel_id).await {
            Ok(call) => Ok(call),
            Err(JoinError::TimedOut) => Err(VoiceError::ConnectionTimedOut),
            Err(e) => Err(VoiceError::Driver(e.to_string())),
        }
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), VoiceError> {
        match self.manager.remove(guild_id).await {
            Ok(()) => Ok(()),
            // Ya estaba desconectado
            Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(VoiceError::Driver(e.to_string())),
        }
    }
}
