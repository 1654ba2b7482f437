//! src/lexicon/mod.rs
//! Lexicon – wykrywanie fraz z czarnej listy odporne na obfuskację
//! (spacje, wielkość liter, leetspeak, fonty Unicode, separatory, powtórzenia).
//!
//! Kolejność: najpierw lista wbudowana, potem lista gildii (w kolejności podanej
//! przez wywołującego); dla każdej frazy strategie idą wg `MatchMethod::ALL`
//! i pierwsze trafienie kończy sprawdzanie.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LexiconConfig;
use crate::normalizer::truncate_chars;

pub mod strategy;
pub mod terms;

pub use strategy::{CompiledTerm, MatchMethod, TextForms};
pub use terms::{DEFAULT_TERMS, is_default_term};

/// Werdykt pojedynczego sprawdzenia. Nigdy nie jest zapisywany przez sam Lexicon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub detected: bool,
    pub term: Option<String>,
    pub method: Option<MatchMethod>,
    pub is_default: bool,
}

impl MatchResult {
    pub fn clean() -> Self {
        Self {
            detected: false,
            term: None,
            method: None,
            is_default: false,
        }
    }

    fn hit(term: &CompiledTerm, method: MatchMethod) -> Self {
        Self {
            detected: true,
            term: Some(term.term.clone()),
            method: Some(method),
            is_default: term.is_default,
        }
    }
}

/// Skompilowana lista efektywna (wbudowane ∪ gildii).
#[derive(Debug, Default)]
pub struct CompiledLexicon {
    terms: Vec<CompiledTerm>,
}

impl CompiledLexicon {
    pub fn compile<S: AsRef<str>>(custom_terms: &[S], include_default: bool) -> Self {
        let defaults = DEFAULT_TERMS
            .iter()
            .filter(|_| include_default)
            .filter_map(|t| CompiledTerm::compile(t, true));
        let custom = custom_terms
            .iter()
            .filter_map(|t| CompiledTerm::compile(t.as_ref(), is_default_term(t.as_ref())));
        Self {
            terms: defaults.chain(custom).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Sprawdza już obcięty tekst.
    pub fn check(&self, text: &str) -> MatchResult {
        if self.terms.is_empty() || text.is_empty() {
            return MatchResult::clean();
        }
        let forms = TextForms::new(text);
        for term in &self.terms {
            if let Some(method) = term.first_match(&forms) {
                debug!(term = %term.term, %method, "lexicon hit");
                return MatchResult::hit(term, method);
            }
        }
        MatchResult::clean()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LexiconKey {
    scope_id: String,
    include_default: bool,
    terms: Vec<String>,
}

/// Matcher z opcjonalnym cache skompilowanych list per (gildia, snapshot listy).
/// Cache to tylko optymalizacja – wynik jest identyczny z `check`.
pub struct Lexicon {
    max_text_chars: usize,
    cache: Cache<LexiconKey, Arc<CompiledLexicon>>,
}

impl Lexicon {
    pub fn new(cfg: &LexiconConfig) -> Self {
        Self {
            max_text_chars: cfg.max_text_chars.max(1),
            cache: Cache::builder()
                .max_capacity(cfg.cache_capacity)
                .time_to_live(Duration::from_secs(cfg.cache_ttl_secs))
                .build(),
        }
    }

    /// `CheckText` bez cache – lista kompilowana na miejscu.
    pub fn check<S: AsRef<str>>(
        &self,
        text: &str,
        custom_terms: &[S],
        include_default: bool,
    ) -> MatchResult {
        if text.is_empty() {
            return MatchResult::clean();
        }
        CompiledLexicon::compile(custom_terms, include_default)
            .check(truncate_chars(text, self.max_text_chars))
    }

    /// `CheckText` dla gildii – lista kompilowana raz na snapshot i trzymana z TTL.
    pub fn check_scoped<S: AsRef<str>>(
        &self,
        scope_id: &str,
        text: &str,
        custom_terms: &[S],
        include_default: bool,
    ) -> MatchResult {
        if text.is_empty() {
            return MatchResult::clean();
        }
        let key = LexiconKey {
            scope_id: scope_id.to_string(),
            include_default,
            terms: custom_terms.iter().map(|t| t.as_ref().to_string()).collect(),
        };
        let compiled = self.cache.get_with(key, || {
            Arc::new(CompiledLexicon::compile(custom_terms, include_default))
        });
        compiled.check(truncate_chars(text, self.max_text_chars))
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new(&LexiconConfig::default())
    }
}
