use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub env: String,
    pub app: App,
    #[serde(default)]
    pub database: Database,
    pub logging: Logging,
    #[serde(default)]
    pub lexicon: LexiconConfig,
    #[serde(default)]
    pub antinuke: AntinukeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct App {
    pub name: String,
}

/// Brak `url` => tryb czysto pamięciowy (bez persystencji).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Database {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logging {
    pub json: Option<bool>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub include_default: bool,
    /// Tekst dłuższy niż tyle znaków jest obcinany przed normalizacją.
    pub max_text_chars: usize,
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
    /// Statyczne listy gildii, używane gdy nie ma bazy.
    pub scope_terms: HashMap<String, Vec<String>>,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            include_default: true,
            max_text_chars: 4096,
            cache_ttl_secs: 300,
            cache_capacity: 1024,
            scope_terms: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AntinukeConfig {
    pub report_threshold: f64,
    pub alert_threshold: f64,
    pub learning_increment: f64,
    /// Górny limit długości okna akcji przekazanego przez wywołującego.
    pub max_sequence_len: usize,
    /// `None` = bez retencji (rekordy rosną bez ograniczeń).
    pub retention_days: Option<u64>,
    pub prune_interval_secs: u64,
    pub flush_interval_secs: u64,
}

impl Default for AntinukeConfig {
    fn default() -> Self {
        Self {
            report_threshold: 70.0,
            alert_threshold: 80.0,
            learning_increment: 10.0,
            max_sequence_len: 50,
            retention_days: Some(7),
            prune_interval_secs: 60,
            flush_interval_secs: 30,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        // Które środowisko?
        let env = std::env::var("TSS_ENV").unwrap_or_else(|_| "development".to_string());

        // Załaduj .env.<env> i .env (jeśli są)
        let _ = dotenvy::from_filename(format!(".env.{}", env));
        let _ = dotenvy::dotenv();

        Self::load_from(format!("config/{}.toml", env), &env)
    }

    /// Warstwy: domyślne -> plik TOML -> zmienne środowiskowe TSS_*
    pub fn load_from(path: impl AsRef<Path>, env: &str) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Self::defaults(env)))
            .merge(Toml::file(path.as_ref()))
            // TSS_DATABASE_URL => database.url itd.
            .merge(Env::prefixed("TSS_").split("_"));

        let mut s: Settings = figment.extract()?;
        s.env = env.to_string();
        s.antinuke = sanitize_cfg(s.antinuke);
        Ok(s)
    }

    pub fn defaults(env: &str) -> Self {
        Self {
            env: env.to_string(),
            app: App {
                name: "Tigris Threat Engine".into(),
            },
            database: Database {
                url: None,
                max_connections: Some(10),
            },
            logging: Logging {
                json: Some(false),
                level: Some("info".into()),
            },
            lexicon: LexiconConfig::default(),
            antinuke: AntinukeConfig::default(),
        }
    }
}

/// Progi w [0,100], alert nie niżej niż report, okno akcji co najmniej 1.
pub fn sanitize_cfg(mut cfg: AntinukeConfig) -> AntinukeConfig {
    fn clamp_pct(v: f64) -> f64 {
        if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
    }
    cfg.report_threshold = clamp_pct(cfg.report_threshold);
    cfg.alert_threshold = clamp_pct(cfg.alert_threshold).max(cfg.report_threshold);
    cfg.learning_increment = clamp_pct(cfg.learning_increment);
    cfg.max_sequence_len = cfg.max_sequence_len.max(1);
    cfg.prune_interval_secs = cfg.prune_interval_secs.max(1);
    cfg.flush_interval_secs = cfg.flush_interval_secs.max(1);
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_cfg_orders_thresholds() {
        let cfg = sanitize_cfg(AntinukeConfig {
            report_threshold: 120.0,
            alert_threshold: 50.0,
            learning_increment: -3.0,
            max_sequence_len: 0,
            ..Default::default()
        });
        assert_eq!(cfg.report_threshold, 100.0);
        assert_eq!(cfg.alert_threshold, 100.0);
        assert_eq!(cfg.learning_increment, 0.0);
        assert_eq!(cfg.max_sequence_len, 1);
    }

    #[test]
    fn defaults_match_scoring_constants() {
        let s = Settings::defaults("test");
        assert_eq!(s.antinuke.report_threshold, 70.0);
        assert_eq!(s.antinuke.alert_threshold, 80.0);
        assert_eq!(s.antinuke.learning_increment, 10.0);
        assert!(s.lexicon.include_default);
        assert!(s.database.url.is_none());
    }
}
