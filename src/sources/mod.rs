pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serenity::model::id::UserId;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::PlaybackError;

pub use youtube::YtDlp;

/// Reconoce enlaces directos de YouTube (ruta de watch o enlace corto)
static DIRECT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(youtube\.com/watch|youtu\.be/)").expect("regex de enlace directo válida")
});

const UNKNOWN_AUTHOR: &str = "Unknown";

/// Entrada cruda devuelta por el catálogo externo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    pub uploader: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
}

/// Catálogo/extractor externo (yt-dlp en producción)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Busca hasta `max_results` entradas con metadata plana, sin descargar nada
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<CatalogEntry>>;

    /// Metadata de un único enlace
    async fn lookup(&self, url: &str) -> Result<CatalogEntry>;

    /// URL de stream efímera para una URL de watch
    async fn stream_url(&self, watch_url: &str) -> Result<String>;
}

/// Usuario que pidió el track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Un track resuelto y listo para encolar. Inmutable una vez construido.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    url: String,
    author: String,
    duration_secs: u64,
    thumbnail: Option<String>,
    requester: Option<Requester>,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>, duration_secs: u64) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            author: UNKNOWN_AUTHOR.to_string(),
            duration_secs,
            thumbnail: None,
            requester: None,
        }
    }

    fn from_entry(entry: CatalogEntry) -> Self {
        let duration_secs = entry_seconds(&entry);
        Self {
            url: watch_url(&entry.id),
            title: entry.title,
            author: entry
                .uploader
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            duration_secs,
            thumbnail: entry.thumbnail,
            requester: None,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn author(&self) -> &str {
        &self.author
    }
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
    #[allow(dead_code)]
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }
    pub fn duration_label(&self) -> String {
        format_duration(self.duration())
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn requester(&self) -> Option<&Requester> {
        self.requester.as_ref()
    }

    // Builders
    #[allow(dead_code)]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    #[allow(dead_code)]
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_requester(mut self, requester: Requester) -> Self {
        self.requester = Some(requester);
        self
    }
}

/// Resultado de resolver lo que escribió el usuario
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Enlace directo: un único track
    Direct(Track),
    /// Búsqueda: candidatos para que el usuario elija
    Candidates(Vec<Track>),
}

/// Convierte consultas y enlaces en tracks, aplicando el límite de duración.
#[derive(Clone)]
pub struct TrackResolver {
    catalog: Arc<dyn Catalog>,
    max_duration: Duration,
    search_limit: usize,
}

impl TrackResolver {
    pub fn new(catalog: Arc<dyn Catalog>, max_duration: Duration, search_limit: usize) -> Self {
        Self {
            catalog,
            max_duration,
            search_limit,
        }
    }

    /// Decide entre enlace directo y búsqueda según el texto de entrada
    pub async fn resolve(&self, query: &str) -> Result<Resolved, PlaybackError> {
        if is_direct_link(query) {
            self.resolve_direct_link(query).await.map(Resolved::Direct)
        } else {
            self.search(query).await.map(Resolved::Candidates)
        }
    }

    /// Busca candidatos y descarta los que superan la duración máxima
    pub async fn search(&self, query: &str) -> Result<Vec<Track>, PlaybackError> {
        info!("🔍 Buscando: {}", query);

        let entries = self
            .catalog
            .search(query, self.search_limit)
            .await
            .map_err(|e| {
                warn!("❌ Error del extractor buscando '{}': {:#}", query, e);
                PlaybackError::Resolution(e)
            })?;

        let found = entries.len();
        let tracks: Vec<Track> = entries
            .into_iter()
            .take(self.search_limit)
            .filter(|entry| self.admits(entry))
            .map(Track::from_entry)
            .collect();

        debug!("📋 {} de {} resultados dentro del límite de duración", tracks.len(), found);

        if tracks.is_empty() {
            return Err(PlaybackError::NothingFound(query.to_string()));
        }
        Ok(tracks)
    }

    /// Resuelve un enlace directo a un único track
    pub async fn resolve_direct_link(&self, url: &str) -> Result<Track, PlaybackError> {
        info!("🔗 Resolviendo enlace directo: {}", url);

        let entry = self.catalog.lookup(url).await.map_err(|e| {
            warn!("❌ Error del extractor con '{}': {:#}", url, e);
            PlaybackError::Resolution(e)
        })?;

        if !self.admits(&entry) {
            return Err(PlaybackError::TooLong {
                seconds: entry_seconds(&entry),
                title: entry.title,
            });
        }
        Ok(Track::from_entry(entry))
    }

    /// Obtiene la URL de stream justo antes de reproducir; nunca se guarda.
    pub async fn resolve_stream_url(&self, track: &Track) -> Result<String, PlaybackError> {
        debug!("🎵 Obteniendo URL de stream para: {}", track.url());

        let stream_url = self
            .catalog
            .stream_url(track.url())
            .await
            .map_err(PlaybackError::Resolution)?;

        if stream_url.trim().is_empty() {
            return Err(PlaybackError::Resolution(anyhow::anyhow!(
                "el extractor no devolvió URL de stream para {}",
                track.url()
            )));
        }
        Ok(stream_url)
    }

    fn admits(&self, entry: &CatalogEntry) -> bool {
        entry_seconds(entry) < self.max_duration.as_secs()
    }
}

/// ¿Es el texto un enlace directo a un video?
pub fn is_direct_link(query: &str) -> bool {
    DIRECT_LINK.is_match(query)
}

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

/// Formatea una duración como `m:ss` (o `h:mm:ss` a partir de una hora)
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

// Sin duración cuenta como 0; las fracciones se truncan
fn entry_seconds(entry: &CatalogEntry) -> u64 {
    entry
        .duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(id: &str, duration: f64) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            title: format!("Song {}", id),
            uploader: Some("Artist".to_string()),
            duration: Some(duration),
            thumbnail: None,
        }
    }

    fn resolver(catalog: MockCatalog) -> TrackResolver {
        TrackResolver::new(Arc::new(catalog), Duration::from_secs(900), 5)
    }

    #[tokio::test]
    async fn test_search_filters_long_entries_and_keeps_order() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_search()
            .withf(|query, max| query == "lofi" && *max == 5)
            .times(1)
            .returning(|_, _| Ok(vec![entry("a", 1000.0), entry("b", 500.0), entry("c", 60.0)]));

        let tracks = resolver(catalog).search("lofi").await.unwrap();

        let urls: Vec<&str> = tracks.iter().map(|t| t.url()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.youtube.com/watch?v=b",
                "https://www.youtube.com/watch?v=c"
            ]
        );
        assert_eq!(tracks[0].duration_label(), "8:20");
        assert_eq!(tracks[1].duration_label(), "1:00");
    }

    #[tokio::test]
    async fn test_exactly_the_limit_is_rejected() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_search()
            .returning(|_, _| Ok(vec![entry("a", 900.0), entry("b", 899.9)]));

        let tracks = resolver(catalog).search("x").await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].duration_secs(), 899);
    }

    #[tokio::test]
    async fn test_all_candidates_too_long_is_nothing_found() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_search()
            .returning(|_, _| Ok(vec![entry("a", 3600.0)]));

        let err = resolver(catalog).search("long mix").await.unwrap_err();
        assert!(matches!(err, PlaybackError::NothingFound(_)));
    }

    #[tokio::test]
    async fn test_extractor_failure_is_resolution_failure() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_search()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("HTTP Error 429")));

        let err = resolver(catalog).search("x").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resolution);
    }

    #[tokio::test]
    async fn test_short_link_takes_direct_path() {
        let mut catalog = MockCatalog::new();
        catalog.expect_search().never();
        catalog
            .expect_lookup()
            .withf(|url| url == "https://youtu.be/abc123")
            .times(1)
            .returning(|_| Ok(entry("abc123", 212.0)));

        let resolved = resolver(catalog).resolve("https://youtu.be/abc123").await.unwrap();

        match resolved {
            Resolved::Direct(track) => {
                assert_eq!(track.url(), "https://www.youtube.com/watch?v=abc123");
                assert_eq!(track.duration_label(), "3:32");
            }
            other => panic!("se esperaba enlace directo, llegó {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_long_direct_link_is_rejected() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_lookup()
            .returning(|_| Ok(entry("long", 5400.0)));

        let err = resolver(catalog)
            .resolve_direct_link("https://www.youtube.com/watch?v=long")
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::TooLong { seconds: 5400, .. }));
    }

    #[tokio::test]
    async fn test_stream_url_is_requested_every_time() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_stream_url()
            .withf(|url| url == "https://www.youtube.com/watch?v=a")
            .times(2)
            .returning(|_| Ok("https://rr1.googlevideo.com/videoplayback?x".to_string()));

        let resolver = resolver(catalog);
        let track = Track::new("A", "https://www.youtube.com/watch?v=a", 10);
        resolver.resolve_stream_url(&track).await.unwrap();
        resolver.resolve_stream_url(&track).await.unwrap();
    }

    #[test]
    fn test_direct_link_detection() {
        assert!(is_direct_link("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_direct_link("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_direct_link("https://music.youtube.com/watch?v=test"));
        assert!(is_direct_link("HTTPS://YOUTU.BE/abc"));
        assert!(!is_direct_link("never gonna give you up"));
        assert!(!is_direct_link("https://example.com/video"));
    }

    #[test]
    fn test_missing_metadata_defaults() {
        let track = Track::from_entry(CatalogEntry {
            id: "z".to_string(),
            title: "No info".to_string(),
            uploader: None,
            duration: None,
            thumbnail: None,
        });
        assert_eq!(track.author(), "Unknown");
        assert_eq!(track.duration_secs(), 0);
        assert_eq!(track.duration_label(), "0:00");
        assert!(track.requester().is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(605)), "10:05");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }
}
