// src/lib.rs

pub mod antinuke;
pub mod config;
pub mod db;
pub mod lexicon;
pub mod logging;
pub mod normalizer;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use dashmap::DashMap;
use moka::future::Cache;
use tracing::{debug, info, warn};

use antinuke::{ActionDescriptor, Antinuke, ConfirmOutcome, Fingerprint, NotifySink, Observation};
use config::Settings;
use db::Db;
use lexicon::{Lexicon, MatchResult, is_default_term};

/// Globalny kontekst aplikacji.
/// Tu trzymamy konfigurację, (opcjonalny) uchwyt do DB i gotowe serwisy (Lexicon, Antinuke).
pub struct AppContext {
    pub settings: Settings,
    pub db: Option<Db>,
    pub lexicon: Lexicon,
    pub antinuke: Arc<Antinuke>,
    // listy gildii z DB, z TTL
    terms_cache: Cache<String, Arc<Vec<String>>>,
    // tryb bez DB: listy z configu + zmiany w runtime
    terms_mem: DashMap<String, Vec<String>>,
}

impl AppContext {
    /// Bootstrap całej aplikacji:
    /// - logi
    /// - połączenie z DB + migracje (jeśli jest `database.url`)
    /// - rozgrzanie sygnatur z DB
    /// - taski w tle: retencja + flush sygnatur
    pub async fn bootstrap(settings: Settings, sink: Arc<dyn NotifySink>) -> Result<Arc<Self>> {
        // 1) logi
        if let Err(e) = logging::init(&settings) {
            debug!(error = %e, "logging already initialized");
        }

        // 2) DB
        let db = match settings.database.url.as_deref() {
            Some(url) => {
                let pool = db::connect(url, settings.database.max_connections).await?;
                db::migrate(&pool).await?;
                Some(pool)
            }
            None => {
                info!("no database configured, running in-memory");
                None
            }
        };

        // 3) kontekst
        let ctx = Arc::new(Self::build(settings, db, sink));

        // 4) warmup
        ctx.warmup_signatures().await;

        // 5) taski
        Antinuke::spawn_prune_task(&ctx.antinuke);
        Self::spawn_flush_task(&ctx);

        info!(app = %ctx.settings.app.name, env = %ctx.settings.env, "threat engine ready");
        Ok(ctx)
    }

    /// Kontekst bez logów, migracji i tasków w tle.
    pub fn new_testing(settings: Settings, db: Option<Db>, sink: Arc<dyn NotifySink>) -> Arc<Self> {
        Arc::new(Self::build(settings, db, sink))
    }

    fn build(settings: Settings, db: Option<Db>, sink: Arc<dyn NotifySink>) -> Self {
        let lexicon = Lexicon::new(&settings.lexicon);
        let antinuke = Antinuke::new(settings.antinuke.clone(), sink);
        let terms_cache = Cache::builder()
            .max_capacity(settings.lexicon.cache_capacity)
            .time_to_live(Duration::from_secs(settings.lexicon.cache_ttl_secs))
            .build();
        let terms_mem = settings
            .lexicon
            .scope_terms
            .iter()
            .map(|(scope, terms)| (scope.clone(), terms.clone()))
            .collect();
        Self {
            settings,
            db,
            lexicon,
            antinuke,
            terms_cache,
            terms_mem,
        }
    }

    /* --------- Lexicon --------- */

    /// Własna lista gildii (bez wbudowanych).
    pub async fn scope_terms(&self, scope_id: &str) -> Result<Arc<Vec<String>>> {
        let Some(db) = &self.db else {
            let terms = self
                .terms_mem
                .get(scope_id)
                .map(|t| t.value().clone())
                .unwrap_or_default();
            return Ok(Arc::new(terms));
        };
        self.terms_cache
            .try_get_with(scope_id.to_string(), async move {
                db::load_terms(db, scope_id).await.map(Arc::new)
            })
            .await
            .map_err(|e| anyhow::anyhow!("loading terms for {scope_id}: {e}"))
    }

    /// Zwraca `false`, gdy słowo już było na liście (bez względu na wielkość liter).
    /// Słowa są zapisywane małymi literami.
    pub async fn add_term(&self, scope_id: &str, term: &str, added_by: Option<&str>) -> Result<bool> {
        let term = term.trim().to_lowercase();
        let term = term.as_str();
        if term.is_empty() {
            bail!("term must not be blank");
        }
        if is_default_term(term) {
            bail!("`{term}` is a built-in term");
        }
        let added = match &self.db {
            Some(db) => db::add_term(db, scope_id, term, added_by).await?,
            None => {
                let mut list = self.terms_mem.entry(scope_id.to_string()).or_default();
                if list.iter().any(|t| t.to_lowercase() == term) {
                    false
                } else {
                    list.push(term.to_string());
                    true
                }
            }
        };
        self.terms_cache.invalidate(scope_id).await;
        if added {
            info!(%scope_id, %term, ?added_by, "lexicon term added");
        }
        Ok(added)
    }

    pub async fn remove_term(&self, scope_id: &str, term: &str) -> Result<bool> {
        let term = term.trim().to_lowercase();
        let term = term.as_str();
        if is_default_term(term) {
            bail!("built-in terms cannot be removed");
        }
        let removed = match &self.db {
            Some(db) => db::remove_term(db, scope_id, term).await?,
            None => match self.terms_mem.get_mut(scope_id) {
                Some(mut list) => {
                    let before = list.len();
                    list.retain(|t| t.to_lowercase() != term);
                    list.len() != before
                }
                None => false,
            },
        };
        self.terms_cache.invalidate(scope_id).await;
        if removed {
            info!(%scope_id, %term, "lexicon term removed");
        }
        Ok(removed)
    }

    /// `CheckText` dla gildii. Nigdy nie zwraca błędu – problem z DB = tylko lista wbudowana.
    pub async fn check_text(&self, scope_id: &str, text: &str) -> MatchResult {
        let terms = match self.scope_terms(scope_id).await {
            Ok(t) => t,
            Err(e) => {
                warn!(%scope_id, error = %e, "custom terms unavailable, using built-in list");
                Arc::new(Vec::new())
            }
        };
        self.lexicon.check_scoped(
            scope_id,
            text,
            terms.as_slice(),
            self.settings.lexicon.include_default,
        )
    }

    /* --------- Antinuke --------- */

    pub fn observe(
        &self,
        scope_id: &str,
        actor_id: &str,
        action: &ActionDescriptor,
        window: &[ActionDescriptor],
    ) -> Observation {
        self.antinuke.observe(scope_id, actor_id, action, window)
    }

    pub fn confirm(&self, fingerprint: &Fingerprint, is_true_attack: bool) -> ConfirmOutcome {
        self.antinuke
            .confirm(fingerprint, is_true_attack, now_millis())
    }

    pub async fn warmup_signatures(&self) {
        let Some(db) = &self.db else { return };
        match db::load_signatures(db).await {
            Ok(list) => {
                let n = self.antinuke.signatures().load(list);
                info!(signatures = n, "threat signatures loaded");
            }
            Err(e) => warn!(error = %e, "failed to load threat signatures"),
        }
    }

    /// Zapis zmienionych sygnatur. Nieudane wracają do kolejki.
    pub async fn flush_signatures(&self) -> Result<usize> {
        let Some(db) = &self.db else {
            return Ok(0);
        };
        let dirty = self.antinuke.signatures().take_dirty();
        let mut saved = 0;
        let mut first_err = None;
        for sig in dirty {
            match db::upsert_signature(db, &sig).await {
                Ok(()) => saved += 1,
                Err(e) => {
                    self.antinuke.signatures().mark_dirty(&sig.fingerprint);
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e.context(format!("flushed {saved} signatures before failure"))),
            None => Ok(saved),
        }
    }

    fn spawn_flush_task(this: &Arc<Self>) {
        if this.db.is_none() {
            return;
        }
        let weak = Arc::downgrade(this);
        let every = Duration::from_secs(this.settings.antinuke.flush_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let Some(strong) = weak.upgrade() else { break };
                match strong.flush_signatures().await {
                    Ok(0) => {}
                    Ok(n) => debug!(signatures = n, "threat signatures flushed"),
                    Err(e) => warn!(error = %e, "signature flush failed"),
                }
            }
        });
    }
}

/// Bieżący czas w ms od epoki (UTC).
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use antinuke::RecordingSink;

    fn ctx() -> Arc<AppContext> {
        let mut settings = Settings::defaults("test");
        settings
            .lexicon
            .scope_terms
            .insert("g1".into(), vec!["badword".into()]);
        AppContext::new_testing(settings, None, Arc::new(RecordingSink::default()))
    }

    #[tokio::test]
    async fn configured_scope_terms_are_used() {
        let ctx = ctx();
        let r = ctx.check_text("g1", "b a d w o r d").await;
        assert!(r.detected);
        assert_eq!(r.term.as_deref(), Some("badword"));
        assert!(!ctx.check_text("g2", "badword").await.detected);
    }

    #[tokio::test]
    async fn add_and_remove_terms_in_memory() {
        let ctx = ctx();
        assert!(ctx.add_term("g2", " scam ", Some("mod")).await.unwrap());
        assert!(!ctx.add_term("g2", "scam", None).await.unwrap());
        assert!(ctx.check_text("g2", "$c@m").await.detected);

        assert!(ctx.remove_term("g2", "scam").await.unwrap());
        assert!(!ctx.remove_term("g2", "scam").await.unwrap());
        assert!(!ctx.check_text("g2", "scam").await.detected);
    }

    #[tokio::test]
    async fn terms_are_deduplicated_case_insensitively() {
        let ctx = ctx();
        assert!(ctx.add_term("g3", "Scam", None).await.unwrap());
        assert!(!ctx.add_term("g3", "scam", None).await.unwrap());
        assert!(!ctx.add_term("g3", " SCAM ", None).await.unwrap());
        assert_eq!(*ctx.scope_terms("g3").await.unwrap(), vec!["scam"]);

        // lista z configu może mieć wielkie litery
        assert!(!ctx.add_term("g1", "BadWord", None).await.unwrap());
        assert!(ctx.remove_term("g1", "BADWORD").await.unwrap());
        assert!(ctx.scope_terms("g1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn built_in_terms_are_immutable() {
        let ctx = ctx();
        assert!(ctx.add_term("g1", "  ", None).await.is_err());
        assert!(ctx.add_term("g1", "HEIL", None).await.is_err());
        assert!(ctx.remove_term("g1", "nazi").await.is_err());
        assert!(ctx.check_text("g1", "n a z i").await.is_default);
    }

    #[tokio::test]
    async fn flush_without_db_is_noop() {
        let ctx = ctx();
        assert_eq!(ctx.flush_signatures().await.unwrap(), 0);
    }
}
