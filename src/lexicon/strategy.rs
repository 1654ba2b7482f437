//! src/lexicon/strategy.rs
//! Osiem strategii wykrywania frazy, w stałej kolejności priorytetu.
//! Każda fraza jest kompilowana raz do `CompiledTerm`; strategia, której wzorca
//! nie dało się zbudować, jest po prostu pomijana dla tej frazy.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::normalizer::{fold_fonts, normalize};

const SEPARATORS: [char; 4] = ['-', '_', '.', '|'];

/// Pary litera → klasa znaków z typowymi podmianami.
const LEET_CLASSES: [(char, &str); 6] = [
    ('a', "[a4@]"),
    ('e', "[e3]"),
    ('i', "[i1!]"),
    ('o', "[o0]"),
    ('s', "[s5$]"),
    ('t', "[t7]"),
];

/// Krótsze frazy pomijają strategię `RepeatedChars` (za dużo fałszywych trafień).
const REPEATED_MIN_LEN: usize = 4;

const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Strategia, która wykryła frazę. Kolejność wariantów = priorytet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    NormalizedMatch,
    CaseInsensitive,
    SpacingVariation,
    CaseVariation,
    SeparatorVariation,
    Leetspeak,
    RepeatedChars,
    FontVariation,
}

impl MatchMethod {
    /// Kolejność prób dla każdej frazy – pierwsze trafienie wygrywa.
    pub const ALL: [MatchMethod; 8] = [
        MatchMethod::NormalizedMatch,
        MatchMethod::CaseInsensitive,
        MatchMethod::SpacingVariation,
        MatchMethod::CaseVariation,
        MatchMethod::SeparatorVariation,
        MatchMethod::Leetspeak,
        MatchMethod::RepeatedChars,
        MatchMethod::FontVariation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::NormalizedMatch => "normalized_match",
            MatchMethod::CaseInsensitive => "case_insensitive",
            MatchMethod::SpacingVariation => "spacing_variation",
            MatchMethod::CaseVariation => "case_variation",
            MatchMethod::SeparatorVariation => "separator_variation",
            MatchMethod::Leetspeak => "leetspeak",
            MatchMethod::RepeatedChars => "repeated_chars",
            MatchMethod::FontVariation => "font_variation",
        }
    }

    /// Czy ta strategia wykrywa `term` w `text`.
    pub fn try_match(&self, term: &CompiledTerm, text: &TextForms<'_>) -> bool {
        match self {
            MatchMethod::NormalizedMatch => {
                !term.normalized.is_empty() && text.normalized.contains(&term.normalized)
            }
            MatchMethod::CaseInsensitive => term
                .case_insensitive
                .as_ref()
                .is_some_and(|re| re.is_match(text.raw)),
            MatchMethod::SpacingVariation => term
                .spacing
                .as_ref()
                .is_some_and(|re| re.is_match(text.raw)),
            MatchMethod::CaseVariation => {
                text.raw.contains(&term.title_case) || text.raw.contains(&term.upper_case)
            }
            MatchMethod::SeparatorVariation => {
                term.separated.iter().any(|v| text.lower.contains(v.as_str()))
            }
            MatchMethod::Leetspeak => term.leet.iter().any(|re| re.is_match(text.raw)),
            MatchMethod::RepeatedChars => term
                .deduplicated
                .as_ref()
                .is_some_and(|d| text.normalized.contains(d.as_str())),
            MatchMethod::FontVariation => {
                !term.font_folded.is_empty() && text.font_folded.contains(&term.font_folded)
            }
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Warianty tekstu liczone raz na wywołanie `check`.
#[derive(Debug)]
pub struct TextForms<'a> {
    pub raw: &'a str,
    pub lower: String,
    pub normalized: String,
    pub font_folded: String,
}

impl<'a> TextForms<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            lower: raw.to_lowercase(),
            normalized: normalize(raw),
            font_folded: fold_fonts(raw).to_lowercase(),
        }
    }
}

/// Fraza z prekompilowanymi wzorcami wszystkich strategii.
#[derive(Debug, Clone)]
pub struct CompiledTerm {
    pub term: String,
    pub is_default: bool,
    normalized: String,
    case_insensitive: Option<Regex>,
    spacing: Option<Regex>,
    title_case: String,
    upper_case: String,
    separated: Vec<String>,
    leet: Vec<Regex>,
    deduplicated: Option<String>,
    font_folded: String,
}

impl CompiledTerm {
    /// `None` dla frazy pustej po `trim()`.
    pub fn compile(raw: &str, is_default: bool) -> Option<Self> {
        let term = raw.trim();
        if term.is_empty() {
            return None;
        }
        let lower = term.to_lowercase();
        let chars: Vec<char> = lower.chars().collect();

        let spacing_pat = term
            .chars()
            .map(|c| regex::escape(&c.to_string()))
            .collect::<Vec<_>>()
            .join(r"\s*");

        let separated = SEPARATORS
            .iter()
            .map(|sep| {
                let sep = sep.to_string();
                chars
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(sep.as_str())
            })
            .collect();

        let leet = LEET_CLASSES
            .iter()
            .filter(|(letter, _)| chars.contains(letter))
            .filter_map(|(letter, class)| {
                let pat: String = chars
                    .iter()
                    .map(|c| {
                        if c == letter {
                            (*class).to_string()
                        } else {
                            regex::escape(&c.to_string())
                        }
                    })
                    .collect();
                build_regex(&pat, term)
            })
            .collect();

        let deduplicated = if chars.len() >= REPEATED_MIN_LEN {
            let d = dedup_consecutive(&lower);
            (!d.is_empty()).then_some(d)
        } else {
            None
        };

        Some(Self {
            term: term.to_string(),
            is_default,
            normalized: normalize(term),
            case_insensitive: build_regex(&regex::escape(term), term),
            spacing: build_regex(&spacing_pat, term),
            title_case: title_case(term),
            upper_case: term.to_uppercase(),
            separated,
            leet,
            deduplicated,
            font_folded: fold_fonts(term).to_lowercase(),
        })
    }

    /// Pierwsza strategia (wg priorytetu), która trafia.
    pub fn first_match(&self, text: &TextForms<'_>) -> Option<MatchMethod> {
        MatchMethod::ALL
            .into_iter()
            .find(|m| m.try_match(self, text))
    }
}

fn build_regex(pattern: &str, term: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .dfa_size_limit(REGEX_SIZE_LIMIT)
        .build()
    {
        Ok(re) => Some(re),
        Err(e) => {
            debug!(%term, ?e, "lexicon pattern skipped");
            None
        }
    }
}

fn title_case(term: &str) -> String {
    let mut chars = term.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_uppercase(), chars.as_str().to_lowercase()),
        None => String::new(),
    }
}

/// `"baddword"` → `"badword"`.
pub fn dedup_consecutive(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if Some(c) != prev {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}
