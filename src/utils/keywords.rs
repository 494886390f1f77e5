// file: src/utils/keywords.rs
// description: keyword extraction for Korean/English queries
// reference: stop-word filtering with particle stripping

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").expect("non-word regex is valid");

    static ref STOP_WORDS: HashSet<&'static str> = [
        "이", "가", "을", "를", "의", "에", "에서", "로", "으로", "와", "과", "도", "는", "은",
        "어떻게", "무엇", "언제", "어디", "왜", "어떤", "몇", "얼마", "어떠한", "무슨", "어느",
        "있나요", "있습니까", "입니까", "인가요", "인지", "인지요", "인가",
        "알려주세요", "알려주시기", "알려주시면", "알려주시겠습니까", "알려주시겠어요",
        "해주세요", "해주시기", "해주시면", "해주시겠습니까", "해주시겠어요",
        "좋겠습니까", "좋겠어요", "좋을까요", "좋을지", "좋을지요",
        "있을까요", "있을지", "있을지요", "될까요", "될지", "될지요",
        "the", "and", "for", "what", "how", "when", "where", "which", "who", "why",
        "is", "are", "was", "were", "of", "in", "on", "to", "me", "please", "show", "tell",
    ]
    .into_iter()
    .collect();
}

/// Trailing particles removed from a word when at least two characters remain.
const PARTICLES: [&str; 14] = [
    "에서", "으로", "은", "는", "이", "가", "을", "를", "의", "에", "로", "와", "과", "도",
];

/// Lowercased keywords of two or more characters, stop words removed,
/// first-occurrence order, no duplicates, at most `top_k`.
pub fn extract_keywords(text: &str, top_k: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, " ");

    let mut keywords: Vec<String> = Vec::new();
    for word in cleaned.split_whitespace() {
        if STOP_WORDS.contains(word) {
            continue;
        }
        let word = strip_particle(word);
        if word.chars().count() < 2 || STOP_WORDS.contains(word) {
            continue;
        }
        if !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
        if keywords.len() >= top_k {
            break;
        }
    }
    keywords
}

fn strip_particle(word: &str) -> &str {
    for particle in PARTICLES {
        if let Some(stem) = word.strip_suffix(particle) {
            if stem.chars().count() >= 2 {
                return stem;
            }
        }
    }
    word
}
