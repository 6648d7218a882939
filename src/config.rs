//! Service configuration: defaults plus `RXSCAN_*` environment overrides.

use std::net::SocketAddr;
use std::path::PathBuf;

pub const APP_NAME: &str = "rxscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application data directory (`~/.rxscan/`), used for staged uploads.
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(".rxscan")
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Directory where uploads are staged while the pipeline runs.
    pub staging_dir: PathBuf,
    /// Upper bound on an uploaded file, in bytes.
    pub max_upload_bytes: usize,
    /// Tesseract traineddata directory; OCR stays disabled without it.
    pub tessdata_dir: Option<PathBuf>,
    /// Optional drug wordlist (one term per line) for OCR and recognition.
    pub drug_wordlist: Option<PathBuf>,
    /// Optional remote NER inference endpoint; lexicon matching is the
    /// offline default.
    pub ner_endpoint: Option<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 8000).into(),
            staging_dir: app_data_dir().join("staging"),
            max_upload_bytes: 50 * 1024 * 1024,
            tessdata_dir: None,
            drug_wordlist: None,
            ner_endpoint: None,
        }
    }
}

impl AnalyzerConfig {
    /// Build a config from defaults plus environment overrides.
    ///
    /// Unparseable values are logged and ignored rather than fatal; the demo
    /// service should come up with whatever is usable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("RXSCAN_ADDR") {
            match addr.parse() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(e) => tracing::warn!(%addr, error = %e, "Ignoring invalid RXSCAN_ADDR"),
            }
        }
        if let Ok(dir) = std::env::var("RXSCAN_STAGING_DIR") {
            config.staging_dir = PathBuf::from(dir);
        }
        if let Ok(mb) = std::env::var("RXSCAN_MAX_UPLOAD_MB") {
            match mb.parse::<usize>() {
                Ok(parsed) if parsed > 0 => config.max_upload_bytes = parsed * 1024 * 1024,
                _ => tracing::warn!(%mb, "Ignoring invalid RXSCAN_MAX_UPLOAD_MB"),
            }
        }
        if let Ok(dir) = std::env::var("RXSCAN_TESSDATA_DIR") {
            config.tessdata_dir = Some(PathBuf::from(dir));
        }
        if let Ok(path) = std::env::var("RXSCAN_DRUG_WORDLIST") {
            config.drug_wordlist = Some(PathBuf::from(path));
        }
        if let Ok(url) = std::env::var("RXSCAN_NER_ENDPOINT") {
            config.ner_endpoint = Some(url);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with(".rxscan"));
    }

    #[test]
    fn default_config_values() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert!(config.staging_dir.ends_with("staging"));
        assert!(config.tessdata_dir.is_none());
        assert!(config.ner_endpoint.is_none());
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
