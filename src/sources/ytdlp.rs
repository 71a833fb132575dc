use std::sync::OnceLock;
use std::time::Duration;

use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serenity::model::id::UserId;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{Resolver, SourceError, TrackSource};

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    webpage_url: String,
    url: Option<String>,
    formats: Option<Vec<Format>>,
    is_live: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Format {
    url: String,
    acodec: Option<String>,
    abr: Option<f64>,
}

/// Resolver basado en yt-dlp.
///
/// La metadata se pide con `--skip-download` para no tocar los streams; la
/// URL de audio directa se pide aparte porque esas URLs expiran.
pub struct YtDlpResolver {
    // Limitar requests concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://\S+$").unwrap())
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self {
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Distingue URLs directas de términos de búsqueda
    fn is_direct_url(query: &str) -> bool {
        url_regex().is_match(query.trim())
    }

    /// Objetivo que se le pasa a yt-dlp para una consulta del usuario
    fn search_target(query: &str) -> Result<String, SourceError> {
        let query = query.trim();
        if Self::is_direct_url(query) {
            url::Url::parse(query).map_err(|_| SourceError::InvalidUrl(query.to_string()))?;
            Ok(query.to_string())
        } else {
            Ok(format!("ytsearch1:{query}"))
        }
    }

    async fn extract(&self, target: &str, with_stream: bool) -> Result<YtDlpInfo, SourceError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| SourceError::Extractor(e.to_string()))?;

        let mut args = vec!["--no-playlist", "--dump-json", "--no-warnings"];
        if with_stream {
            args.extend(["-f", "bestaudio/best"]);
        } else {
            args.push("--skip-download");
        }

        debug!("🔍 Ejecutando yt-dlp para: {target}");

        let output = Command::new("yt-dlp").args(&args).arg(target).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp terminó con error para {target}");
            return Err(SourceError::Extractor(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|line| line.trim_start().starts_with('{'))
            .ok_or_else(|| SourceError::NoResults(target.to_string()))?;

        Ok(serde_json::from_str(line)?)
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve_metadata(
        &self,
        query: &str,
        requested_by: UserId,
    ) -> Result<TrackSource, SourceError> {
        let target = Self::search_target(query)?;
        let info = self.extract(&target, false).await?;

        info!("🎶 Resuelto '{}' para la consulta: {query}", info.title);
        Ok(into_track(info, requested_by))
    }

    async fn resolve_stream(&self, track: &TrackSource) -> Result<TrackSource, SourceError> {
        let info = self.extract(&track.url(), true).await?;

        let stream_url = info
            .url
            .clone()
            .or_else(|| best_audio_url(info.formats.as_deref().unwrap_or_default()))
            .ok_or_else(|| SourceError::NoResults(track.url()))?;

        Ok(into_track(info, track.requested_by()).with_stream_url(stream_url))
    }
}

fn into_track(info: YtDlpInfo, requested_by: UserId) -> TrackSource {
    let live = info.is_live.unwrap_or(false);
    let mut track = TrackSource::new(info.title, info.webpage_url, requested_by);

    if let Some(artist) = info.uploader {
        track = track.with_artist(artist);
    }
    // Los streams en vivo quedan sin duración y la UI los marca como tales
    if let Some(secs) = info.duration.filter(|d| *d > 0.0 && !live) {
        track = track.with_duration(Duration::from_secs_f64(secs));
    }
    if let Some(thumbnail) = info.thumbnail {
        track = track.with_thumbnail(thumbnail);
    }

    track
}

/// Elige el formato solo-audio con mejor bitrate
fn best_audio_url(formats: &[Format]) -> Option<String> {
    formats
        .iter()
        .filter(|f| f.acodec.as_deref().is_some_and(|codec| codec != "none"))
        .max_by(|a, b| a.abr.unwrap_or(0.0).total_cmp(&b.abr.unwrap_or(0.0)))
        .map(|f| f.url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_direct_url_detection() {
        assert!(YtDlpResolver::is_direct_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YtDlpResolver::is_direct_url("http://youtu.be/dQw4w9WgXcQ"));
        assert!(!YtDlpResolver::is_direct_url("never gonna give you up"));
        assert!(!YtDlpResolver::is_direct_url("https:// con espacios"));
    }

    #[test]
    fn search_terms_become_ytsearch_targets() {
        assert_eq!(
            YtDlpResolver::search_target("lofi beats").unwrap(),
            "ytsearch1:lofi beats"
        );
        assert_eq!(
            YtDlpResolver::search_target("https://youtu.be/abc123").unwrap(),
            "https://youtu.be/abc123"
        );
    }

    #[test]
    fn malformed_urls_are_rejected() {
        assert!(matches!(
            YtDlpResolver::search_target("https://[::invalid"),
            Err(SourceError::InvalidUrl(_))
        ));
    }

    #[test]
    fn best_audio_prefers_highest_bitrate() {
        let formats = vec![
            Format {
                url: "low".into(),
                acodec: Some("opus".into()),
                abr: Some(64.0),
            },
            Format {
                url: "video-only".into(),
                acodec: Some("none".into()),
                abr: Some(999.0),
            },
            Format {
                url: "high".into(),
                acodec: Some("opus".into()),
                abr: Some(160.0),
            },
        ];

        assert_eq!(best_audio_url(&formats), Some("high".into()));
        assert_eq!(best_audio_url(&[]), None);
    }
}
