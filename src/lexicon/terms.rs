//! Wbudowana (niemodyfikowalna w runtime) lista fraz.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Frazy zawsze aktywne, niezależnie od listy gildii.
pub const DEFAULT_TERMS: &[&str] = &[
    "nazi",
    "hitler",
    "heil",
    "kkk",
    "white power",
    "kurwa",
    "chuj",
    "spierdalaj",
    "pierdol",
    "szmata",
    "dziwka",
    "zjeb",
    "cwel",
];

static DEFAULT_SET: Lazy<HashSet<String>> =
    Lazy::new(|| DEFAULT_TERMS.iter().map(|t| t.to_ascii_lowercase()).collect());

/// Czy fraza należy do listy wbudowanej (bez względu na wielkość liter i spacje brzegowe).
pub fn is_default_term(term: &str) -> bool {
    DEFAULT_SET.contains(&term.trim().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_membership_ignores_case() {
        assert!(is_default_term("NaZi"));
        assert!(is_default_term("  kkk "));
        assert!(!is_default_term("badword"));
    }

    #[test]
    fn default_terms_are_not_blank() {
        assert!(DEFAULT_TERMS.iter().all(|t| !t.trim().is_empty()));
    }
}
