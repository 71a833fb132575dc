use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serenity::model::id::GuildId;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::backend::{MessageRef, Notifier, PlaybackSink};
use crate::audio::queue::{QueueItem, TrackQueue};
use crate::audio::registry::PlayerRegistry;
use crate::sources::{Resolver, TrackSource};

/// Player de un guild: su cola, el track actual y el volumen.
///
/// Nace con el primer `/play` del guild y muere cuando su loop se apaga por
/// inactividad o cuando la limpieza lo destruye. Nunca hay dos players para
/// el mismo guild; eso lo garantiza el registro.
pub struct Player {
    guild_id: GuildId,
    queue: TrackQueue,
    current: Mutex<Option<TrackSource>>,
    volume: Mutex<f32>,
    now_playing_msg: Mutex<Option<MessageRef>>,
    stop_token: CancellationToken,
    idle_timeout: Duration,
    sink: Arc<dyn PlaybackSink>,
    notifier: Arc<dyn Notifier>,
    resolver: Arc<dyn Resolver>,
}

impl Player {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        guild_id: GuildId,
        idle_timeout: Duration,
        default_volume: f32,
        stop_token: CancellationToken,
        sink: Arc<dyn PlaybackSink>,
        notifier: Arc<dyn Notifier>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        Self {
            guild_id,
            queue: TrackQueue::new(),
            current: Mutex::new(None),
            volume: Mutex::new(default_volume),
            now_playing_msg: Mutex::new(None),
            stop_token,
            idle_timeout,
            sink,
            notifier,
            resolver,
        }
    }

    /// Agrega un track al final de la cola; nunca bloquea
    pub fn enqueue(&self, track: TrackSource) {
        self.queue.push(track);
    }

    /// Track sonando ahora mismo, si hay
    pub fn current(&self) -> Option<TrackSource> {
        self.current.lock().clone()
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn upcoming(&self, n: usize) -> Vec<QueueItem> {
        self.queue.upcoming(n)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn stop_token(&self) -> &CancellationToken {
        &self.stop_token
    }

    /// Pausa si hay algo sonando; `false` si no había nada
    pub async fn pause(&self) -> bool {
        if self.sink.is_playing().await {
            self.sink.pause().await;
            true
        } else {
            false
        }
    }

    /// Reanuda si había algo pausado; `false` si no
    pub async fn resume(&self) -> bool {
        if self.sink.is_paused().await {
            self.sink.resume().await;
            true
        } else {
            false
        }
    }

    /// Corta el track actual; el loop sigue solo con el próximo.
    /// También funciona con el track pausado.
    pub async fn skip(&self) -> bool {
        if self.current.lock().is_some() {
            self.sink.stop().await;
            true
        } else {
            false
        }
    }

    /// Fija el volumen del guild y lo aplica al stream vivo.
    ///
    /// Hay un único valor almacenado: cada stream nuevo lo lee al arrancar,
    /// así el valor del player y el del stream no pueden divergir.
    pub async fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.01, 1.0);
        *self.volume.lock() = volume;
        self.sink.set_volume(volume).await;
    }

    /// Se lleva la referencia al último aviso de "reproduciendo"
    pub fn take_now_playing(&self) -> Option<MessageRef> {
        self.now_playing_msg.lock().take()
    }

    /// Guarda la referencia al aviso vigente
    pub fn store_now_playing(&self, message: MessageRef) {
        *self.now_playing_msg.lock() = Some(message);
    }

    /// Loop principal del player; una tarea por guild.
    ///
    /// Saca tracks de la cola en orden, resuelve el stream si el descriptor
    /// venía diferido, reproduce y espera la señal de fin. Sin actividad
    /// durante la ventana de inactividad, se limpia a sí mismo y termina.
    pub(crate) async fn run(self: Arc<Self>, registry: Arc<PlayerRegistry>) {
        debug!("▶️ Loop de player iniciado para guild {}", self.guild_id);

        loop {
            let track = tokio::select! {
                _ = self.stop_token.cancelled() => break,
                popped = self.queue.pop_wait(self.idle_timeout) => match popped {
                    Some(track) => track,
                    None => {
                        info!(
                            "💤 Guild {} sin actividad por {}, cerrando player",
                            self.guild_id,
                            humantime::format_duration(self.idle_timeout)
                        );
                        break;
                    }
                },
            };

            self.play_one(track).await;

            if self.stop_token.is_cancelled() {
                break;
            }
        }

        registry.cleanup(self.guild_id).await;
        debug!("⏹️ Loop de player terminado para guild {}", self.guild_id);
    }

    /// Una iteración del loop: resolver, reproducir, esperar el fin, drenar.
    /// Ningún fallo acá tumba el loop; los tracks problemáticos se descartan.
    async fn play_one(&self, track: TrackSource) {
        // Resolución diferida: hasta acá el descriptor solo trae metadata.
        // Se resuelve exactamente una vez, justo antes de reproducir, porque
        // las URLs de stream expiran si se piden temprano.
        let track = if track.is_resolved() {
            track
        } else {
            match self.resolver.resolve_stream(&track).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!("❌ No se pudo resolver '{}': {e}", track.title());
                    self.notifier.resolve_failed(&track, &e.to_string()).await;
                    return; // descartado, no se reintenta
                }
            }
        };

        let done = Arc::new(Notify::new());
        if let Err(e) = self.sink.start(&track, self.volume(), Arc::clone(&done)).await {
            warn!("❌ No se pudo iniciar '{}': {e}", track.title());
            self.notifier.resolve_failed(&track, &e.to_string()).await;
            return;
        }

        info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title());
        *self.current.lock() = Some(track.clone());

        if let Some(posted) = self.notifier.now_playing(&track).await {
            self.store_now_playing(posted);
        }

        tokio::select! {
            _ = self.stop_token.cancelled() => self.sink.stop().await,
            _ = done.notified() => {}
        }

        // Drenaje: soltar el stream terminado y el aviso que quedó viejo
        self.sink.release().await;
        *self.current.lock() = None;
        if let Some(previous) = self.take_now_playing() {
            self.notifier.delete(previous).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::registry::PlayerRegistry;
    use crate::audio::testing::{deferred_track, resolved_track, FakeNotifier, FakeResolver, FakeSink, FakeVoice};
    use pretty_assertions::assert_eq;

    const GUILD: GuildId = GuildId::new(100);

    fn registry_with(
        voice: Arc<FakeVoice>,
        resolver: Arc<FakeResolver>,
        idle_timeout: Duration,
    ) -> Arc<PlayerRegistry> {
        Arc::new(PlayerRegistry::new(voice, resolver, 0.5, idle_timeout))
    }

    async fn settle() {
        // Deja correr al loop; con el tiempo pausado avanza solo
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn plays_tracks_in_enqueue_order() {
        let sink = Arc::new(FakeSink::auto_complete());
        let notifier = Arc::new(FakeNotifier::default());
        let registry = registry_with(
            Arc::new(FakeVoice::default()),
            Arc::new(FakeResolver::default()),
            Duration::from_secs(300),
        );

        let player = registry.get_or_create(GUILD, sink.clone(), notifier.clone());
        for title in ["a", "b", "c"] {
            player.enqueue(deferred_track(title));
        }
        settle().await;

        assert_eq!(sink.started_titles(), vec!["a", "b", "c"]);
        assert_eq!(notifier.now_playing_count(), 3);
        assert_eq!(notifier.deleted_count(), 3);

        registry.cleanup(GUILD).await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_resolution_skips_only_that_track() {
        let sink = Arc::new(FakeSink::auto_complete());
        let notifier = Arc::new(FakeNotifier::default());
        let resolver = Arc::new(FakeResolver::failing_on("b"));
        let registry = registry_with(
            Arc::new(FakeVoice::default()),
            resolver,
            Duration::from_secs(300),
        );

        let player = registry.get_or_create(GUILD, sink.clone(), notifier.clone());
        for title in ["a", "b", "c"] {
            player.enqueue(deferred_track(title));
        }
        settle().await;

        // "b" se descarta sin reintento y el resto conserva el orden
        assert_eq!(sink.started_titles(), vec!["a", "c"]);
        assert_eq!(notifier.failed_titles(), vec!["b"]);

        registry.cleanup(GUILD).await;
    }

    #[tokio::test(start_paused = true)]
    async fn already_resolved_tracks_bypass_the_resolver() {
        let sink = Arc::new(FakeSink::auto_complete());
        let notifier = Arc::new(FakeNotifier::default());
        let resolver = Arc::new(FakeResolver::default());
        let registry = registry_with(
            Arc::new(FakeVoice::default()),
            Arc::clone(&resolver),
            Duration::from_secs(300),
        );

        let player = registry.get_or_create(GUILD, sink.clone(), notifier.clone());
        player.enqueue(resolved_track("directo"));
        settle().await;

        assert_eq!(sink.started_titles(), vec!["directo"]);
        assert_eq!(resolver.stream_calls(), 0);

        registry.cleanup(GUILD).await;
    }

    #[tokio::test(start_paused = true)]
    async fn volume_persists_across_tracks() {
        let sink = Arc::new(FakeSink::manual());
        let notifier = Arc::new(FakeNotifier::default());
        let registry = registry_with(
            Arc::new(FakeVoice::default()),
            Arc::new(FakeResolver::default()),
            Duration::from_secs(300),
        );

        let player = registry.get_or_create(GUILD, sink.clone(), notifier.clone());
        player.enqueue(deferred_track("a"));
        player.enqueue(deferred_track("b"));
        settle().await;

        // "a" arrancó con el volumen por defecto
        assert_eq!(sink.started(), vec![("a".to_string(), 0.5)]);

        player.set_volume(0.8).await;
        sink.complete_current();
        settle().await;

        // "b" hereda el volumen nuevo sin que nadie lo reaplique
        assert_eq!(
            sink.started(),
            vec![("a".to_string(), 0.5), ("b".to_string(), 0.8)]
        );

        registry.cleanup(GUILD).await;
    }

    #[tokio::test(start_paused = true)]
    async fn volume_is_independent_between_guilds() {
        let sink_a = Arc::new(FakeSink::manual());
        let sink_b = Arc::new(FakeSink::manual());
        let notifier = Arc::new(FakeNotifier::default());
        let registry = registry_with(
            Arc::new(FakeVoice::default()),
            Arc::new(FakeResolver::default()),
            Duration::from_secs(300),
        );

        let other = GuildId::new(200);
        let player_a = registry.get_or_create(GUILD, sink_a.clone(), notifier.clone());
        let player_b = registry.get_or_create(other, sink_b.clone(), notifier.clone());

        player_a.set_volume(0.9).await;

        player_a.enqueue(deferred_track("a"));
        player_b.enqueue(deferred_track("b"));
        settle().await;

        assert_eq!(sink_a.started(), vec![("a".to_string(), 0.9)]);
        assert_eq!(sink_b.started(), vec![("b".to_string(), 0.5)]);

        registry.cleanup(GUILD).await;
        registry.cleanup(other).await;
    }

    #[tokio::test(start_paused = true)]
    async fn skip_moves_on_to_the_next_track() {
        let sink = Arc::new(FakeSink::manual());
        let notifier = Arc::new(FakeNotifier::default());
        let registry = registry_with(
            Arc::new(FakeVoice::default()),
            Arc::new(FakeResolver::default()),
            Duration::from_secs(300),
        );

        let player = registry.get_or_create(GUILD, sink.clone(), notifier.clone());
        player.enqueue(deferred_track("a"));
        player.enqueue(deferred_track("b"));
        settle().await;

        assert_eq!(player.current().map(|t| t.title()), Some("a".to_string()));
        assert!(player.skip().await);
        settle().await;

        assert_eq!(sink.started_titles(), vec!["a", "b"]);
        assert_eq!(player.current().map(|t| t.title()), Some("b".to_string()));

        registry.cleanup(GUILD).await;
    }

    #[tokio::test(start_paused = true)]
    async fn upcoming_shows_waiting_tracks_while_one_plays() {
        let sink = Arc::new(FakeSink::manual());
        let notifier = Arc::new(FakeNotifier::default());
        let registry = registry_with(
            Arc::new(FakeVoice::default()),
            Arc::new(FakeResolver::default()),
            Duration::from_secs(300),
        );

        let player = registry.get_or_create(GUILD, sink.clone(), notifier.clone());
        for title in ["a", "b", "c"] {
            player.enqueue(deferred_track(title));
        }
        settle().await;

        // "a" suena; la vista de la cola muestra solo lo que espera
        assert_eq!(player.current().map(|t| t.title()), Some("a".to_string()));
        let waiting: Vec<String> = player
            .upcoming(5)
            .into_iter()
            .map(|item| item.track.title())
            .collect();
        assert_eq!(waiting, vec!["b", "c"]);

        registry.cleanup(GUILD).await;
    }

    #[tokio::test(start_paused = true)]
    async fn skip_without_current_track_is_a_noop() {
        let sink = Arc::new(FakeSink::manual());
        let notifier = Arc::new(FakeNotifier::default());
        let registry = registry_with(
            Arc::new(FakeVoice::default()),
            Arc::new(FakeResolver::default()),
            Duration::from_secs(300),
        );

        let player = registry.get_or_create(GUILD, sink.clone(), notifier.clone());
        assert!(!player.skip().await);

        registry.cleanup(GUILD).await;
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_follow_sink_state() {
        let sink = Arc::new(FakeSink::manual());
        let notifier = Arc::new(FakeNotifier::default());
        let registry = registry_with(
            Arc::new(FakeVoice::default()),
            Arc::new(FakeResolver::default()),
            Duration::from_secs(300),
        );

        let player = registry.get_or_create(GUILD, sink.clone(), notifier.clone());

        // Sin nada sonando, ambos son no-ops
        assert!(!player.pause().await);
        assert!(!player.resume().await);

        player.enqueue(deferred_track("a"));
        settle().await;

        assert!(player.pause().await);
        assert!(!player.pause().await);
        assert!(player.resume().await);
        assert!(!player.resume().await);

        registry.cleanup(GUILD).await;
    }
}
