//! src/normalizer.rs
//! Kanonizacja tekstu pod wyszukiwanie fraz z czarnej listy.
//!
//! Kolejność kroków jest stała (każdy kolejny pracuje na wyniku poprzedniego):
//! 1. wycięcie znaków zerowej szerokości (ZWSP/ZWJ/ZWNJ/WJ/BOM)
//! 2. zwinięcie „fancy fontów” Unicode (fullwidth, matematyczne, circled,
//!    parenthesized, squared, regional indicators) + homoglify cyrylicy/greki do ASCII
//! 3. usunięcie wszystkich białych znaków (nie zamiana na jedną spację!)
//! 4. lowercase
//! 5. leetspeak: `0→o 1→i 3→e 4→a 5→s 7→t @→a !→i $→s #→h`
//! 6. zwinięcie powtórzeń 3+ tych samych znaków do 2
//! 7. wycięcie wszystkiego poza `[a-z0-9_]`
//!
//! Po kroku 7 powtórzenia są zwijane jeszcze raz – wycięte znaki mogły skleić
//! nowy ciąg (np. `aa-a`), a wynik `normalize` ma być punktem stałym.

/* ==============================
   Publiczne API
   ============================== */

/// Pełny pipeline kanonizacji. Zawsze zwraca `String` (pusty dla pustego wejścia).
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    // 1) + 2) + 3) w jednym przebiegu – każdy krok działa per znak
    let compact: String = text
        .chars()
        .filter(|c| !is_zero_width(*c))
        .map(|c| fold_confusable(fold_font_char(c)))
        .filter(|c| !c.is_whitespace())
        .collect();

    // 4)
    let lower = compact.to_lowercase();

    // 5)
    let deleeted: String = lower.chars().map(deleet_char).collect();

    // 6)
    let collapsed = collapse_runs(&deleeted, 2);

    // 7)
    let words: String = collapsed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    collapse_runs(&words, 2)
}

/// Zwinięcie samych bloków fontów (bez homoglifów i bez reszty pipeline’u).
/// Znaki spoza znanych zakresów przechodzą bez zmian.
pub fn fold_fonts(text: &str) -> String {
    text.chars().map(fold_font_char).collect()
}

/// Obcina tekst do `max_chars` znaków (nie bajtów) – osłona przed patologicznie długim wejściem.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Zwija ciągi > `keep` identycznych znaków do dokładnie `keep` znaków.
pub fn collapse_runs(text: &str, keep: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    let mut run = 0usize;
    for ch in text.chars() {
        if Some(ch) == prev {
            run += 1;
        } else {
            prev = Some(ch);
            run = 1;
        }
        if run <= keep {
            out.push(ch);
        }
    }
    out
}

/* ==============================
   Krok 1 – zero-width
   ============================== */

pub(crate) fn is_zero_width(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' // zero width space
            | '\u{200C}' // ZWNJ
            | '\u{200D}' // ZWJ
            | '\u{2060}' // word joiner
            | '\u{FEFF}' // BOM
    )
}

/* ==============================
   Krok 2 – fonty Unicode
   ============================== */

const MATH_ALPHA_START: u32 = 0x1D400;
const MATH_ALPHA_END: u32 = 0x1D6A3; // 13 alfabetów po 52 litery
const MATH_DIGIT_START: u32 = 0x1D7CE;
const MATH_DIGIT_END: u32 = 0x1D7FF; // 5 zestawów cyfr po 10

fn letter(offset: u32, upper: bool) -> char {
    let base = if upper { b'A' } else { b'a' };
    (base + offset as u8) as char
}

/// Jedna litera/cyfra z bloku „fancy” → ASCII. Reszta bez zmian.
pub(crate) fn fold_font_char(c: char) -> char {
    let cp = c as u32;
    match cp {
        // fullwidth
        0xFF10..=0xFF19 => (b'0' + (cp - 0xFF10) as u8) as char,
        0xFF21..=0xFF3A => letter(cp - 0xFF21, true),
        0xFF41..=0xFF5A => letter(cp - 0xFF41, false),

        // Mathematical Alphanumeric Symbols: bold, italic, script, fraktur, double-struck, sans, mono
        MATH_ALPHA_START..=MATH_ALPHA_END => {
            let idx = (cp - MATH_ALPHA_START) % 52;
            if idx < 26 {
                letter(idx, true)
            } else {
                letter(idx - 26, false)
            }
        }
        0x1D6A4 => 'i', // dotless i
        0x1D6A5 => 'j', // dotless j
        MATH_DIGIT_START..=MATH_DIGIT_END => (b'0' + ((cp - MATH_DIGIT_START) % 10) as u8) as char,

        // circled / parenthesized (BMP)
        0x249C..=0x24B5 => letter(cp - 0x249C, false),
        0x24B6..=0x24CF => letter(cp - 0x24B6, true),
        0x24D0..=0x24E9 => letter(cp - 0x24D0, false),

        // Enclosed Alphanumeric Supplement (poza BMP – pary surogatów w UTF-16)
        0x1F110..=0x1F129 => letter(cp - 0x1F110, true), // parenthesized
        0x1F130..=0x1F149 => letter(cp - 0x1F130, true), // squared
        0x1F150..=0x1F169 => letter(cp - 0x1F150, true), // negative circled
        0x1F170..=0x1F189 => letter(cp - 0x1F170, true), // negative squared
        0x1F1E6..=0x1F1FF => letter(cp - 0x1F1E6, true), // regional indicators

        _ => fold_letterlike(c),
    }
}

/// Dziury w alfabetach matematycznych zajęte przez Letterlike Symbols (ℎ, ℬ, ℂ …).
fn fold_letterlike(c: char) -> char {
    match c {
        'ℂ' | 'ℭ' => 'C',
        'ℊ' => 'g',
        'ℋ' | 'ℌ' | 'ℍ' => 'H',
        'ℎ' => 'h',
        'ℐ' | 'ℑ' => 'I',
        'ℒ' => 'L',
        'ℕ' => 'N',
        'ℙ' => 'P',
        'ℚ' => 'Q',
        'ℛ' | 'ℜ' | 'ℝ' => 'R',
        'ℤ' | 'ℨ' => 'Z',
        'ℬ' => 'B',
        'ℯ' => 'e',
        'ℰ' => 'E',
        'ℱ' => 'F',
        'ℳ' => 'M',
        'ℴ' => 'o',
        _ => c,
    }
}

/// Homoglify – cyrylica i greka udające łacinę.
fn fold_confusable(c: char) -> char {
    match c {
        // Cyrillic
        '\u{0430}' => 'a', // а
        '\u{0435}' => 'e', // е
        '\u{043E}' => 'o', // о
        '\u{0440}' => 'p', // р
        '\u{0441}' => 'c', // с
        '\u{0445}' => 'x', // х
        '\u{0443}' => 'y', // у
        '\u{0456}' => 'i', // і
        '\u{04CF}' => 'l', // ӏ
        '\u{0410}' => 'A', // А
        '\u{0412}' => 'B', // В
        '\u{0415}' => 'E', // Е
        '\u{041A}' => 'K', // К
        '\u{041C}' => 'M', // М
        '\u{041D}' => 'H', // Н
        '\u{041E}' => 'O', // О
        '\u{0420}' => 'P', // Р
        '\u{0421}' => 'C', // С
        '\u{0422}' => 'T', // Т
        '\u{0425}' => 'X', // Х
        // Greek
        '\u{03B1}' => 'a', // α
        '\u{03B5}' => 'e', // ε
        '\u{03BF}' => 'o', // ο
        '\u{03C1}' => 'p', // ρ
        '\u{03C5}' => 'y', // υ
        '\u{03C7}' => 'x', // χ
        '\u{03BA}' => 'k', // κ
        '\u{03BD}' => 'v', // ν
        _ => c,
    }
}

/* ==============================
   Krok 5 – leetspeak
   ============================== */

fn deleet_char(c: char) -> char {
    match c {
        '0' => 'o',
        '1' | '!' => 'i',
        '3' => 'e',
        '4' | '@' => 'a',
        '5' | '$' => 's',
        '7' => 't',
        '#' => 'h',
        _ => c,
    }
}
