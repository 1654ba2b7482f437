//! Odcisk sekwencji akcji administracyjnych.
//! Surowy `kind` (np. `CHANNEL_DELETE`) jest zwijany do grubej kategorii, kategorie
//! łączone `->` i haszowane 32-bitowym rolling hashem (`h = h*31 + c`), zapis w base-36.
//! Bez soli i losowości – ten sam ciąg kategorii daje ten sam odcisk także po restarcie.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pojedyncza akcja w oknie gildii. `payload` nie wchodzi do odcisku.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    pub kind: String,
    pub actor_id: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ActionDescriptor {
    pub fn new(kind: impl Into<String>, actor_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            kind: kind.into(),
            actor_id: actor_id.into(),
            timestamp,
            payload: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionCategory {
    Create,
    Delete,
    Update,
    Ban,
    Kick,
    Unknown,
}

/// Kolejność ma znaczenie: pierwszy pasujący marker wygrywa.
const MARKERS: [(&str, ActionCategory); 5] = [
    ("CREATE", ActionCategory::Create),
    ("DELETE", ActionCategory::Delete),
    ("UPDATE", ActionCategory::Update),
    ("BAN", ActionCategory::Ban),
    ("KICK", ActionCategory::Kick),
];

const SEPARATOR: &str = "->";

impl ActionCategory {
    pub fn of(kind: &str) -> Self {
        let upper = kind.to_uppercase();
        MARKERS
            .iter()
            .find(|(marker, _)| upper.contains(marker))
            .map(|(_, cat)| *cat)
            .unwrap_or(ActionCategory::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCategory::Create => "CREATE",
            ActionCategory::Delete => "DELETE",
            ActionCategory::Update => "UPDATE",
            ActionCategory::Ban => "BAN",
            ActionCategory::Kick => "KICK",
            ActionCategory::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Ciąg kategorii, np. `DELETE->DELETE->BAN`.
pub fn category_chain(sequence: &[ActionDescriptor]) -> String {
    sequence
        .iter()
        .map(|a| ActionCategory::of(&a.kind).as_str())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

pub fn fingerprint(sequence: &[ActionDescriptor]) -> Fingerprint {
    Fingerprint(to_base36(rolling_hash(&category_chain(sequence))))
}

/// `h = (h << 5) - h + unit` na jednostkach UTF-16, z zawijaniem do i32.
fn rolling_hash(s: &str) -> u32 {
    let mut h: i32 = 0;
    for unit in s.encode_utf16() {
        h = h.wrapping_shl(5).wrapping_sub(h).wrapping_add(unit as i32);
    }
    h.unsigned_abs()
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(7);
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}
