//! Reply shortening before synthesis.
//!
//! Long replies take too long to speak and the network backends reject long
//! inputs, so replies are cut on sentence or word boundaries first.

use crate::defaults::{
    ELLIPSIS, LONG_REPLY_CHARS, PACKED_REPLY_CHARS, SHORT_INPUT_CHARS, SHORT_INPUT_WORDS,
    WEATHER_SENTENCES,
};

const WEATHER_WORDS: &[&str] = &["weather", "temperature"];
const SENTENCE_BREAK: &str = ". ";

/// Shorten a generated reply for speech.
///
/// Weather replies keep their first three sentences. Anything else longer
/// than [`LONG_REPLY_CHARS`] keeps as many whole words as fit in
/// [`PACKED_REPLY_CHARS`], followed by an ellipsis.
pub fn shorten_reply(reply: &str) -> String {
    let lower = reply.to_lowercase();
    if WEATHER_WORDS.iter().any(|w| lower.contains(w)) {
        let sentences: Vec<&str> = reply.split(SENTENCE_BREAK).collect();
        if sentences.len() > WEATHER_SENTENCES {
            return format!(
                "{}.",
                sentences[..WEATHER_SENTENCES].join(SENTENCE_BREAK)
            );
        }
    }

    if reply.chars().count() > LONG_REPLY_CHARS {
        return format!("{}{}", pack_words(reply, PACKED_REPLY_CHARS), ELLIPSIS);
    }

    reply.to_string()
}

/// Greedily join whole words while the result stays within `budget` chars.
pub fn pack_words(text: &str, budget: usize) -> String {
    let mut packed = String::new();
    let mut len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let needed = if packed.is_empty() { word_len } else { word_len + 1 };
        if len + needed > budget {
            break;
        }
        if !packed.is_empty() {
            packed.push(' ');
        }
        packed.push_str(word);
        len += needed;
    }

    packed
}

/// Cut long inputs down to a handful of words for the short network backend.
///
/// Only inputs longer than [`SHORT_INPUT_CHARS`] with more than
/// [`SHORT_INPUT_WORDS`] words are touched.
pub fn first_words(text: &str) -> String {
    if text.chars().count() <= SHORT_INPUT_CHARS {
        return text.to_string();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= SHORT_INPUT_WORDS {
        return text.to_string();
    }
    format!("{}.", words[..SHORT_INPUT_WORDS].join(" "))
}
