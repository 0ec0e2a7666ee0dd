//! Per-sentence tokenization.
//!
//! Korean sentences go through a particle-stripping filter that approximates
//! a morphological analyzer: trailing josa are removed, stopwords and
//! single-character tokens dropped, and adjacent surviving tokens grouped
//! into noun phrases. English sentences yield stopword-delimited noun
//! chunks. Anything else is kept whole as a single token.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use embedding::lang::{detect, Lang};
pub use embedding::lang::is_hangul;

#[derive(Debug, Clone)]
pub struct TokenizedSentence {
    pub index: usize,
    pub tokens: Vec<String>,
}

static STOPWORDS_KO: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "사실", "경우", "시절", "내용", "점", "것", "수", "때", "정도", "이유", "상황", "뿐",
        "매우", "아주", "또한", "그리고", "그러나", "그런데", "하지만", "대한", "관한", "때문에",
        "하다", "되다", "이다", "있다", "같다",
    ]
    .into_iter()
    .collect()
});

static STOPWORDS_EN: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "if", "then", "this", "that", "these", "those",
        "it", "its", "they", "them", "their", "he", "she", "his", "her", "you", "your", "we",
        "our", "me", "my", "is", "are", "was", "were", "be", "been", "being", "has", "have",
        "had", "do", "does", "did", "will", "would", "can", "could", "should", "shall", "may",
        "might", "must", "of", "in", "on", "at", "to", "for", "with", "by", "from", "as",
        "into", "about", "over", "under", "after", "before", "which", "who", "whom", "what",
        "when", "where", "why", "how", "not", "no", "nor", "so", "than", "too", "very",
    ]
    .into_iter()
    .collect()
});

/// Trailing Korean particles, longest first so compound josa strip cleanly.
static PARTICLES_KO: &[&str] = &[
    "에서부터", "으로부터", "라든지", "이라도", "까지", "부터", "처럼", "보다", "마저", "조차",
    "밖에", "한테", "에게", "께서", "마다", "든지", "이나", "으로", "에서", "라도", "와", "과",
    "은", "는", "이", "가", "을", "를", "의", "에", "도", "만", "나", "로",
];

/// Verb/adjective-style endings that close a noun phrase.
static PHRASE_BREAK_ENDINGS: &[char] = &['다', '요', '죠', '며', '지', '만', '고', '서'];

/// Tokenize every sentence, preserving sentence indices.
pub fn tokenize_sentences(sentences: &[String]) -> Vec<TokenizedSentence> {
    sentences
        .iter()
        .enumerate()
        .map(|(index, sentence)| TokenizedSentence {
            index,
            tokens: tokenize(sentence),
        })
        .collect()
}

/// Tokenize one sentence according to its detected language.
pub fn tokenize(sentence: &str) -> Vec<String> {
    let tokens = match detect(sentence) {
        Lang::Ko => tokenize_ko(sentence),
        Lang::En => tokenize_en(sentence),
        Lang::Other => vec![sentence.trim().to_string()],
    };
    if tokens.is_empty() {
        // Keep the sentence addressable even when nothing survives filtering.
        vec![sentence.trim().to_string()]
    } else {
        tokens
    }
}

fn tokenize_ko(sentence: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for word in sentence.split_whitespace() {
        let cleaned = strip_punct(word);
        if cleaned.is_empty() {
            flush(&mut current, &mut phrases);
            continue;
        }

        // Predicate-style endings close the running noun phrase.
        let breaks_phrase = cleaned
            .chars()
            .last()
            .map(|c| PHRASE_BREAK_ENDINGS.contains(&c))
            .unwrap_or(false);
        if breaks_phrase {
            flush(&mut current, &mut phrases);
            continue;
        }

        let stem = strip_particle(&cleaned);
        let qualifies = stem.chars().count() > 1 && !STOPWORDS_KO.contains(stem.as_str());
        if qualifies {
            current.push(stem);
        } else {
            flush(&mut current, &mut phrases);
        }
    }
    flush(&mut current, &mut phrases);
    phrases
}

fn tokenize_en(sentence: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for word in sentence.split_whitespace() {
        let cleaned = strip_punct(word).to_lowercase();
        let qualifies = cleaned.chars().count() >= 2 && !STOPWORDS_EN.contains(cleaned.as_str());
        if qualifies {
            current.push(cleaned);
        } else {
            flush(&mut current, &mut chunks);
        }
    }
    flush(&mut current, &mut chunks);
    chunks
}

fn flush(current: &mut Vec<String>, out: &mut Vec<String>) {
    if !current.is_empty() {
        out.push(current.join(" "));
        current.clear();
    }
}

fn strip_punct(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_ascii_alphanumeric() || is_hangul(*c) || c.is_alphabetic())
        .collect()
}

/// Remove one trailing particle when the remaining stem is still a word.
fn strip_particle(word: &str) -> String {
    for particle in PARTICLES_KO {
        if let Some(stem) = word.strip_suffix(particle) {
            if stem.chars().count() >= 2 {
                return stem.to_string();
            }
        }
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn korean_particles_are_stripped() {
        let tokens = tokenize("고려대학교의 교풍은 전통에서 비롯되었다");
        assert!(tokens.iter().any(|t| t.contains("고려대학교")));
        assert!(tokens.iter().all(|t| !t.ends_with("의")));
    }

    #[test]
    fn korean_stopwords_and_short_tokens_drop() {
        let tokens = tokenize("매우 것 수 인공지능 기술");
        let joined = tokens.join(" ");
        assert!(joined.contains("인공지능"));
        assert!(!joined.contains("매우"));
    }

    #[test]
    fn english_noun_chunks_skip_stopwords() {
        let tokens = tokenize("Alice is an engineer at the Acme company");
        assert!(tokens.contains(&"alice".to_string()));
        assert!(tokens.contains(&"acme company".to_string()));
        assert!(!tokens.iter().any(|t| t.contains("the")));
    }

    #[test]
    fn other_scripts_stay_whole() {
        let tokens = tokenize("これは日本語です");
        assert_eq!(tokens, vec!["これは日本語です".to_string()]);
    }

    #[test]
    fn indices_are_preserved() {
        let sentences = vec!["Alice is an engineer.".to_string(), "Bob too.".to_string()];
        let tokenized = tokenize_sentences(&sentences);
        assert_eq!(tokenized[0].index, 0);
        assert_eq!(tokenized[1].index, 1);
    }
}
