use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"(?u)[\p{L}\p{N}_]+(?:['’][\p{L}\p{N}_]+)*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Turns raw text into index terms.
///
/// Indexing and querying must use the same analyzer: terms produced by two
/// different normalizations never match, and nothing downstream detects it.
pub trait Analyzer: Send + Sync {
    /// Normalize a whole text into its ordered term sequence (repetitions kept).
    fn normalize(&self, text: &str) -> Vec<String>;

    /// Normalize a single query token without filtering it out.
    fn normalize_term(&self, token: &str) -> String;

    /// Document length used for ranking normalization.
    fn token_count(&self, text: &str) -> u32 {
        self.normalize(text).len() as u32
    }
}

/// NFKC, ASCII-alphabetic words only, lowercase, Snowball English stemming.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishAnalyzer;

impl Analyzer for EnglishAnalyzer {
    fn normalize(&self, text: &str) -> Vec<String> {
        words(text).iter().map(|w| STEMMER.stem(w).into_owned()).collect()
    }

    fn normalize_term(&self, token: &str) -> String {
        let lowered = token.nfkc().collect::<String>().to_lowercase();
        STEMMER.stem(strip_clitic(&lowered)).into_owned()
    }

    /// Counts words without stemming them.
    fn token_count(&self, text: &str) -> u32 {
        words(text).len() as u32
    }
}

/// Lowercased words made only of ASCII letters. Words mixing in digits,
/// underscores or other scripts are dropped whole, not trimmed. English
/// clitics are split off and discarded (`runner's` -> `runner`,
/// `don't` -> `do`).
pub fn words(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>();
    WORD.find_iter(&normalized)
        .map(|m| strip_clitic(m.as_str()))
        .filter(|w| !w.is_empty() && w.bytes().all(|b| b.is_ascii_alphabetic()))
        .map(|w| w.to_ascii_lowercase())
        .collect()
}

/// The host word of a contraction. Unknown apostrophe forms (`o'clock`) are
/// returned whole and later dropped as non-alphabetic.
fn strip_clitic(word: &str) -> &str {
    let Some(at) = word.find(['\'', '’']) else {
        return word;
    };
    let (host, rest) = word.split_at(at);
    let clitic = rest.trim_start_matches(['\'', '’']).to_ascii_lowercase();
    match clitic.as_str() {
        "t" if host.ends_with(['n', 'N']) => &host[..host.len() - 1],
        "s" | "re" | "ve" | "ll" | "d" | "m" => host,
        _ => word,
    }
}
