use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{Catalog, CatalogEntry};

/// Cliente del catálogo basado en el binario `yt-dlp`
pub struct YtDlp {
    binary: String,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (`--dump-json`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YtDlpInfo {
    fn into_entry(self) -> CatalogEntry {
        // En modo flat yt-dlp suele omitir `thumbnail` y `uploader`
        let thumbnail = self
            .thumbnail
            .or_else(|| self.thumbnails.into_iter().last().map(|t| t.url));

        CatalogEntry {
            title: self.title.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            uploader: self.uploader.or(self.channel),
            duration: self.duration,
            thumbnail,
        }
    }
}

impl YtDlp {
    pub fn new(binary: impl Into<String>, concurrency: usize) -> Self {
        Self {
            binary: binary.into(),
            rate_limiter: Semaphore::new(concurrency.max(1)),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let _permit = self.rate_limiter.acquire().await?;

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .context("Error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Verifica que yt-dlp y ffmpeg se puedan ejecutar
    pub async fn verify_dependencies(&self) -> Result<()> {
        let yt_dlp = Command::new(&self.binary).arg("--version").output().await?;
        let ffmpeg = Command::new("ffmpeg").arg("-version").output().await?;

        if yt_dlp.status.success() && ffmpeg.status.success() {
            Ok(())
        } else {
            anyhow::bail!("Dependencias faltantes (yt-dlp / ffmpeg)");
        }
    }
}

#[async_trait]
impl Catalog for YtDlp {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<CatalogEntry>> {
        info!("🔍 Buscando en YouTube: {}", query);

        let search_query = format!("ytsearch{}:{}", max_results, query);
        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                &search_query,
            ])
            .await?;

        Ok(parse_entries(&stdout))
    }

    async fn lookup(&self, url: &str) -> Result<CatalogEntry> {
        debug!("📊 Obteniendo info de: {}", url);

        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                url,
            ])
            .await?;

        let info: YtDlpInfo = serde_json::from_str(stdout.trim())
            .context("Error al parsear respuesta de yt-dlp")?;
        Ok(info.into_entry())
    }

    async fn stream_url(&self, watch_url: &str) -> Result<String> {
        debug!("🎵 Obteniendo URL de stream para: {}", watch_url);

        let stdout = self
            .run(&[
                "--no-playlist",
                "-f",
                "bestaudio/best",
                "--get-url",
                "--no-check-certificate",
                "--no-cache-dir",
                "--no-warnings",
                watch_url,
            ])
            .await?;

        // Con formatos combinados yt-dlp puede imprimir varias URLs; la primera es el audio
        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("No se pudo obtener URL de stream"))
    }
}

/// Una entrada JSON por línea; las líneas ilegibles se ignoran
fn parse_entries(stdout: &str) -> Vec<CatalogEntry> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
            Ok(info) => Some(info.into_entry()),
            Err(e) => {
                debug!("Línea de yt-dlp ignorada: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_flat_search_output() {
        let stdout = concat!(
            r#"{"_type":"url","id":"abc","title":"First","channel":"Some Channel","duration":213.0,"thumbnails":[{"url":"https://i.ytimg.com/vi/abc/hq1.jpg"},{"url":"https://i.ytimg.com/vi/abc/hq2.jpg"}]}"#,
            "\n",
            "WARNING: not json\n",
            r#"{"id":"def","title":"Second","uploader":"Uploader","duration":null,"thumbnail":"https://i.ytimg.com/vi/def/max.jpg"}"#,
            "\n"
        );

        let entries = parse_entries(stdout);

        assert_eq!(
            entries,
            vec![
                CatalogEntry {
                    id: "abc".to_string(),
                    title: "First".to_string(),
                    uploader: Some("Some Channel".to_string()),
                    duration: Some(213.0),
                    thumbnail: Some("https://i.ytimg.com/vi/abc/hq2.jpg".to_string()),
                },
                CatalogEntry {
                    id: "def".to_string(),
                    title: "Second".to_string(),
                    uploader: Some("Uploader".to_string()),
                    duration: None,
                    thumbnail: Some("https://i.ytimg.com/vi/def/max.jpg".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_missing_title_falls_back_to_id() {
        let entries = parse_entries(r#"{"id":"xyz"}"#);
        assert_eq!(entries[0].title, "xyz");
        assert_eq!(entries[0].uploader, None);
    }
}
