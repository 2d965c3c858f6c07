//! Master-passphrase strength estimation
//!
//! One passphrase governs every key Keyforge will ever derive, so the
//! model here is the actual attack: offline guessing against
//! PBKDF2-HMAC-SHA512 at the iteration count in [`crate::master`]. The
//! estimate is the attacker's guessing work in bits:
//!
//! - a multi-word passphrase costs roughly vocabulary-bits per word,
//!   however long the words are;
//! - anything else costs alphabet-bits per character, where predictable
//!   characters (repeats, runs like `abc`/`321`) barely count;
//! - a dictionary hit collapses most of its characters into one guess;
//! - the KDF adds `log2(iterations)` bits of work per guess on top.
//!
//! Advisory only. Derivation never refuses an input, because refusing
//! would also refuse recovery.

use crate::master::PBKDF2_ITERATIONS;

/// Attacker vocabulary assumed per word of a phrase (about 16k words)
const BITS_PER_WORD: f64 = 14.0;

/// Weight of a character that continues a repeat or an `abc`-style run
const PREDICTABLE_WEIGHT: f64 = 0.25;

/// Minimum recommended guessing work, KDF stretch included, in bits
pub const RECOMMENDED_WORK_BITS: f64 = 60.0;

/// Strength of a master passphrase, classified by total guessing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    /// Under 40 work-bits: cracked quickly despite the KDF
    Critical,
    /// 40 to 59 work-bits: within reach of a motivated attacker
    Poor,
    /// 60 to 89 work-bits: the floor for guarding a whole key family
    Acceptable,
    /// 90 work-bits and up
    Strong,
}

impl Strength {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Poor => "poor",
            Self::Acceptable => "acceptable",
            Self::Strong => "strong",
        }
    }

    pub fn is_recommended(&self) -> bool {
        *self >= Self::Acceptable
    }
}

/// Outcome of [`analyze`]
#[derive(Debug, Clone)]
pub struct Report {
    /// Guessing entropy of the passphrase itself
    pub raw_bits: f64,
    /// `raw_bits` plus the per-guess KDF work
    pub work_bits: f64,
    pub strength: Strength,
    pub warnings: Vec<String>,
}

/// Passwords and words attackers try first, including the ones people
/// pick for key tools specifically.
const COMMON_WORDS: &[&str] = &[
    "password", "passphrase", "123456", "qwerty", "letmein", "iloveyou", "dragon", "master",
    "monkey", "shadow", "trustno1", "bitcoin", "satoshi", "wallet", "crypto", "secret", "seed",
    "vault", "keyforge", "hunter2",
];

/// Estimate the guessing work for a candidate master passphrase.
pub fn analyze(passphrase: &str) -> Report {
    let stretch = (PBKDF2_ITERATIONS as f64).log2();

    if passphrase.is_empty() {
        return Report {
            raw_bits: 0.0,
            work_bits: stretch,
            strength: Strength::Critical,
            warnings: vec!["passphrase is empty".into()],
        };
    }

    let mut warnings = Vec::new();

    // Character path: alphabet bits times the effective length, where
    // predictable characters are nearly free for the attacker.
    let alphabet = alphabet_bits(passphrase);
    let effective = effective_length(passphrase);
    let literal_len = passphrase.chars().count() as f64;
    let mut char_bits = effective * alphabet;
    if effective < 0.75 * literal_len {
        warnings.push("repeated or sequential characters add almost nothing".into());
    }

    // Dictionary path: the longest common-word hit collapses to roughly
    // one guess (two bits for casing/suffix variants).
    let lower = passphrase.to_lowercase();
    if let Some(hit) = COMMON_WORDS
        .iter()
        .filter(|w| lower.contains(*w))
        .max_by_key(|w| w.len())
    {
        char_bits -= hit.chars().count() as f64 * alphabet - 2.0;
        warnings.push(format!(
            "contains \"{hit}\", which guessing tools try immediately"
        ));
    }

    // Word path: a phrase is guessed word-by-word from a vocabulary, so
    // its cost is per word, not per character. Take whichever model is
    // cheaper for the attacker.
    let words = passphrase.split_whitespace().count();
    let mut raw_bits = char_bits;
    if words >= 3 {
        raw_bits = raw_bits.min(words as f64 * BITS_PER_WORD);
    } else if passphrase.chars().count() < 12 {
        warnings.push(
            "short single-token passphrases cannot be strengthened later; prefer four or more \
             random words"
                .into(),
        );
    }
    let raw_bits = raw_bits.max(0.0);

    let work_bits = raw_bits + stretch;
    let strength = match work_bits {
        w if w < 40.0 => Strength::Critical,
        w if w < RECOMMENDED_WORK_BITS => Strength::Poor,
        w if w < 90.0 => Strength::Acceptable,
        _ => Strength::Strong,
    };

    Report {
        raw_bits,
        work_bits,
        strength,
        warnings,
    }
}

/// log2 of the alphabet the passphrase draws from.
fn alphabet_bits(s: &str) -> f64 {
    let mut space = 0u32;
    if s.chars().any(|c| c.is_ascii_lowercase()) {
        space += 26;
    }
    if s.chars().any(|c| c.is_ascii_uppercase()) {
        space += 26;
    }
    if s.chars().any(|c| c.is_ascii_digit()) {
        space += 10;
    }
    if s.chars().any(|c| c.is_ascii_punctuation() || c == ' ') {
        space += 34;
    }
    if s.chars().any(|c| !c.is_ascii()) {
        space += 128;
    }
    f64::from(space.max(1)).log2()
}

/// Length with predictable characters discounted: a character that
/// continues an arithmetic run of step 0 or ±1 (`aaa`, `abc`, `987`)
/// carries [`PREDICTABLE_WEIGHT`] instead of 1.
fn effective_length(s: &str) -> f64 {
    let chars: Vec<u32> = s.chars().map(|c| c as u32).collect();
    let mut length = 0.0;
    for i in 0..chars.len() {
        let continues_run = i >= 2 && {
            let step = chars[i - 1] as i64 - chars[i - 2] as i64;
            let next = chars[i] as i64 - chars[i - 1] as i64;
            next == step && step.abs() <= 1
        };
        length += if continues_run { PREDICTABLE_WEIGHT } else { 1.0 };
    }
    length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_critical() {
        let report = analyze("");
        assert_eq!(report.strength, Strength::Critical);
        assert_eq!(report.raw_bits, 0.0);
        assert!(!report.warnings.is_empty());
    }

    #[test]
    fn test_work_includes_kdf_stretch() {
        let report = analyze("anything");
        let stretch = (PBKDF2_ITERATIONS as f64).log2();
        assert!((report.work_bits - report.raw_bits - stretch).abs() < 1e-9);
        assert!(stretch > 18.0 && stretch < 20.0);
    }

    #[test]
    fn test_common_words_collapse() {
        for pw in ["password", "bitcoin2024", "my keyforge phrase"] {
            let report = analyze(pw);
            assert!(
                report.warnings.iter().any(|w| w.contains("immediately")),
                "{pw} should trigger the dictionary warning"
            );
        }
        // The hit costs most of its characters
        assert!(analyze("password").raw_bits < 10.0);
    }

    #[test]
    fn test_pins_are_critical() {
        assert_eq!(analyze("123456").strength, Strength::Critical);
        assert_eq!(analyze("12345678").strength, Strength::Critical);
    }

    #[test]
    fn test_word_phrase_costs_per_word_not_per_char() {
        // 28 characters, but only four vocabulary words
        let report = analyze("correct horse battery staple");
        let char_only = 28.0 * alphabet_bits("correct horse battery staple");
        assert!(report.raw_bits < char_only / 2.0);
        assert!((report.raw_bits - 4.0 * BITS_PER_WORD).abs() < 1e-9);
        assert!(report.strength.is_recommended());
    }

    #[test]
    fn test_more_words_more_work() {
        let four = analyze("ridge lantern novel cactus");
        let six = analyze("ridge lantern novel cactus ember quartz");
        assert!(six.raw_bits > four.raw_bits);
        assert!(six.strength >= four.strength);
    }

    #[test]
    fn test_repeats_and_runs_discounted() {
        let repeated = analyze("aaaaaaaaaaaa");
        let runs = analyze("abcdefghijkl");
        let scattered = analyze("ajkmpqwrtznd");
        assert!(repeated.raw_bits < scattered.raw_bits);
        assert!(runs.raw_bits < scattered.raw_bits);
        assert!(repeated
            .warnings
            .iter()
            .any(|w| w.contains("sequential")));
    }

    #[test]
    fn test_wider_alphabet_costs_more() {
        let single = analyze("ajkmpqwrtznd");
        let mixed = analyze("aJ3!pQ9#tZ5&");
        assert!(mixed.raw_bits > single.raw_bits);
    }

    #[test]
    fn test_short_single_token_warned() {
        let report = analyze("qx7Tp2");
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("random words")));
        assert!(!report.strength.is_recommended());
    }

    #[test]
    fn test_strength_ordering_and_threshold() {
        assert!(Strength::Critical < Strength::Poor);
        assert!(Strength::Poor < Strength::Acceptable);
        assert!(Strength::Acceptable < Strength::Strong);
        assert!(!Strength::Poor.is_recommended());
        assert!(Strength::Acceptable.is_recommended());
    }
}
