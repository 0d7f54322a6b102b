//! Secret word selection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Shortest allowed secret word.
pub const MIN_WORD_LEN: usize = 3;

/// Longest allowed secret word.
pub const MAX_WORD_LEN: usize = 10;

/// Built-in pool used when no words are configured.
pub const DEFAULT_WORDS: &[&str] = &["apple", "banana", "gopher", "dog", "cat"];

/// Word pool errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WordError {
    /// The pool has no words.
    #[error("Word pool is empty")]
    EmptyPool,

    /// A word is too short or too long.
    #[error("Word {word:?} has length {len}, expected {MIN_WORD_LEN}..={MAX_WORD_LEN}")]
    InvalidLength {
        /// The offending word.
        word: String,
        /// Its length in characters.
        len: usize,
    },
}

/// Check that a word can be used as a target.
///
/// # Errors
///
/// Returns an error if the word is outside the allowed length.
pub fn validate_word(word: &str) -> Result<(), WordError> {
    let len = word.chars().count();
    if !(MIN_WORD_LEN..=MAX_WORD_LEN).contains(&len) {
        return Err(WordError::InvalidLength {
            word: word.to_string(),
            len,
        });
    }
    Ok(())
}

fn normalize<I, S>(words: I) -> Result<Vec<String>, WordError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let words: Vec<String> = words
        .into_iter()
        .map(|w| w.as_ref().trim().to_lowercase())
        .collect();
    if words.is_empty() {
        return Err(WordError::EmptyPool);
    }
    for word in &words {
        validate_word(word)?;
    }
    Ok(words)
}

/// A source of secret words.
///
/// Implementations must only return words that pass [`validate_word`],
/// lowercased.
pub trait WordSource: Send {
    /// Draw the next target word.
    fn next_word(&mut self) -> String;
}

/// Uniform random selection from a fixed pool.
#[derive(Debug, Clone)]
pub struct WordPool {
    words: Vec<String>,
    rng: StdRng,
}

impl WordPool {
    /// Create a pool seeded from OS entropy.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is empty or contains an invalid word.
    pub fn new<I, S>(words: I) -> Result<Self, WordError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            words: normalize(words)?,
            rng: StdRng::from_entropy(),
        })
    }

    /// Create a pool with a fixed seed, for repeatable word order.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is empty or contains an invalid word.
    pub fn with_seed<I, S>(words: I, seed: u64) -> Result<Self, WordError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            words: normalize(words)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// The built-in pool.
    #[must_use]
    pub fn default_pool() -> Self {
        Self {
            words: DEFAULT_WORDS.iter().map(|w| (*w).to_string()).collect(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Words in the pool.
    #[must_use]
    pub fn words(&self) -> &[String] {
        &self.words
    }
}

impl WordSource for WordPool {
    fn next_word(&mut self) -> String {
        let index = self.rng.gen_range(0..self.words.len());
        self.words[index].clone()
    }
}

/// Returns words in a fixed order, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedWords {
    words: Vec<String>,
    next: usize,
}

impl ScriptedWords {
    /// Create a scripted source.
    ///
    /// # Errors
    ///
    /// Returns an error if the script is empty or contains an invalid word.
    pub fn new<I, S>(words: I) -> Result<Self, WordError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            words: normalize(words)?,
            next: 0,
        })
    }
}

impl WordSource for ScriptedWords {
    fn next_word(&mut self) -> String {
        let word = self.words[self.next].clone();
        self.next = (self.next + 1) % self.words.len();
        word
    }
}
