use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serenity::model::id::GuildId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::backend::{Notifier, PlaybackSink, VoiceConnector};
use crate::audio::player::Player;
use crate::sources::Resolver;

/// Registro guild → player: alta perezosa y atómica, baja idempotente.
///
/// El alta y la baja de un mismo guild se excluyen mutuamente sobre la
/// entrada del mapa, así dos comandos concurrentes no pueden crear players
/// duplicados ni pisar una limpieza en curso.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<Player>>,
    voice: Arc<dyn VoiceConnector>,
    resolver: Arc<dyn Resolver>,
    default_volume: f32,
    idle_timeout: Duration,
    shutdown: CancellationToken,
}

impl PlayerRegistry {
    pub fn new(
        voice: Arc<dyn VoiceConnector>,
        resolver: Arc<dyn Resolver>,
        default_volume: f32,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            players: DashMap::new(),
            voice,
            resolver,
            default_volume,
            idle_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    /// Devuelve el player del guild, creándolo (y arrancando su loop) si no
    /// existe. Dos llamadas concurrentes del mismo guild ven el mismo player.
    pub fn get_or_create(
        self: &Arc<Self>,
        guild_id: GuildId,
        sink: Arc<dyn PlaybackSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Player> {
        match self.players.entry(guild_id) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                info!("🆕 Creando player para guild {guild_id}");
                let player = Arc::new(Player::new(
                    guild_id,
                    self.idle_timeout,
                    self.default_volume,
                    self.shutdown.child_token(),
                    sink,
                    notifier,
                    Arc::clone(&self.resolver),
                ));
                entry.insert(Arc::clone(&player));
                tokio::spawn(Arc::clone(&player).run(Arc::clone(self)));
                player
            }
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Player>> {
        self.players.get(&guild_id).map(|entry| Arc::clone(&entry))
    }

    /// Destruye el player del guild: corta su loop, desconecta la voz y
    /// remueve la entrada. Solo la llamada que gana la remoción hace el
    /// trabajo observable; repetirla, incluso en paralelo, es inocua.
    pub async fn cleanup(&self, guild_id: GuildId) {
        let Some((_, player)) = self.players.remove(&guild_id) else {
            debug!("Limpieza sin player registrado para guild {guild_id}");
            return;
        };

        player.stop_token().cancel();
        if let Err(e) = self.voice.disconnect(guild_id).await {
            warn!("Fallo al desconectar la voz de guild {guild_id}: {e}");
        }
        info!("🧹 Player de guild {guild_id} destruido");
    }

    /// Apagado global: corta todos los loops (Ctrl-C)
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{deferred_track, FakeNotifier, FakeResolver, FakeSink, FakeVoice};
    use futures::future::join_all;
    use pretty_assertions::assert_eq;

    const GUILD: GuildId = GuildId::new(300);

    fn registry(voice: Arc<FakeVoice>, idle_timeout: Duration) -> Arc<PlayerRegistry> {
        Arc::new(PlayerRegistry::new(
            voice,
            Arc::new(FakeResolver::default()),
            0.5,
            idle_timeout,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_get_or_create_yields_one_player() {
        let registry = registry(Arc::new(FakeVoice::default()), Duration::from_secs(300));

        let tasks = (0..16).map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry.get_or_create(
                    GUILD,
                    Arc::new(FakeSink::manual()),
                    Arc::new(FakeNotifier::default()),
                )
            })
        });

        let players: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.expect("tarea caída"))
            .collect();

        assert_eq!(registry.len(), 1);
        for player in &players[1..] {
            assert!(Arc::ptr_eq(&players[0], player));
        }

        registry.cleanup(GUILD).await;
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_disconnects_exactly_once() {
        let voice = Arc::new(FakeVoice::default());
        let registry = registry(Arc::clone(&voice), Duration::from_secs(300));

        registry.get_or_create(
            GUILD,
            Arc::new(FakeSink::manual()),
            Arc::new(FakeNotifier::default()),
        );

        tokio::join!(registry.cleanup(GUILD), registry.cleanup(GUILD));
        registry.cleanup(GUILD).await;

        // Deja que el loop cancelado termine y pase por su propia limpieza
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(voice.disconnects(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_of_unknown_guild_is_a_noop() {
        let voice = Arc::new(FakeVoice::default());
        let registry = registry(Arc::clone(&voice), Duration::from_secs(300));

        registry.cleanup(GuildId::new(999)).await;

        assert_eq!(voice.disconnects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_player_tears_itself_down() {
        let voice = Arc::new(FakeVoice::default());
        let registry = registry(Arc::clone(&voice), Duration::from_millis(100));

        registry.get_or_create(
            GUILD,
            Arc::new(FakeSink::manual()),
            Arc::new(FakeNotifier::default()),
        );
        assert_eq!(registry.len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(registry.is_empty());
        assert_eq!(voice.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_within_the_window_keeps_the_player_alive() {
        let voice = Arc::new(FakeVoice::default());
        let registry = registry(Arc::clone(&voice), Duration::from_millis(100));
        let sink = Arc::new(FakeSink::auto_complete());

        let player = registry.get_or_create(GUILD, sink.clone(), Arc::new(FakeNotifier::default()));

        // Cada track llega antes de que venza la ventana de inactividad
        for title in ["a", "b", "c"] {
            tokio::time::sleep(Duration::from_millis(60)).await;
            player.enqueue(deferred_track(title));
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(registry.len(), 1);
        assert_eq!(sink.started_titles(), vec!["a", "b", "c"]);

        // Sin tracks nuevos, ahora sí vence
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(registry.is_empty());
        assert_eq!(voice.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn global_shutdown_stops_every_loop() {
        let voice = Arc::new(FakeVoice::default());
        let registry = registry(Arc::clone(&voice), Duration::from_secs(300));

        for guild in [GuildId::new(1), GuildId::new(2), GuildId::new(3)] {
            registry.get_or_create(
                guild,
                Arc::new(FakeSink::manual()),
                Arc::new(FakeNotifier::default()),
            );
        }
        assert_eq!(registry.len(), 3);

        registry.shutdown();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(registry.is_empty());
        assert_eq!(voice.disconnects(), 3);
    }
}
