//! Round state: target word, scores, history and countdown.

use crate::words::WordSource;
use metrics::counter;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};
use wordrelay_protocol::Snapshot;

/// Default number of history lines kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Default round length in seconds.
pub const DEFAULT_ROUND_SECS: u32 = 30;

/// Counter of correct guesses.
pub const CORRECT_GUESSES_TOTAL: &str = "wordrelay_correct_guesses_total";
/// Counter of round rotations.
pub const ROUNDS_TOTAL: &str = "wordrelay_rounds_total";

/// History line appended when the countdown runs out.
pub const TIMEOUT_LINE: &str = "Time's up! New word generated.";

/// Bounded event log; the oldest line is dropped first.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
}

impl History {
    /// Create a history holding at most `capacity` lines.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, evicting the oldest if full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line.into());
    }

    /// Number of lines held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of lines.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lines, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// The newest line.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    /// Copy the lines out, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

/// Result of a clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The countdown moved on.
    Counting {
        /// Seconds left after the tick.
        time_left: u32,
    },
    /// The countdown hit zero and a new word was drawn.
    Expired,
}

/// The single game round shared by every session.
pub struct GameRound {
    words: Box<dyn WordSource>,
    target: String,
    scores: BTreeMap<String, u32>,
    history: History,
    duration: u32,
    time_left: u32,
    round: u64,
}

impl GameRound {
    /// Start the first round.
    ///
    /// A zero `duration` is treated as one second.
    #[must_use]
    pub fn new(mut words: Box<dyn WordSource>, duration: u32, history_capacity: usize) -> Self {
        let duration = duration.max(1);
        let target = words.next_word();
        Self {
            words,
            target,
            scores: BTreeMap::new(),
            history: History::with_capacity(history_capacity),
            duration,
            time_left: duration,
            round: 1,
        }
    }

    /// The current secret word.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Seconds left in the round.
    #[must_use]
    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    /// Round length in seconds.
    #[must_use]
    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// One-based round counter.
    #[must_use]
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Event history.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Score for a name, if it ever joined.
    #[must_use]
    pub fn score(&self, name: &str) -> Option<u32> {
        self.scores.get(name).copied()
    }

    /// Register a display name. Returns `true` if the name is new.
    pub fn join(&mut self, name: &str) -> bool {
        if self.scores.contains_key(name) {
            return false;
        }
        self.scores.insert(name.to_string(), 0);
        true
    }

    /// Case-insensitive comparison against the target.
    #[must_use]
    pub fn is_correct(&self, guess: &str) -> bool {
        guess.to_lowercase() == self.target
    }

    /// Credit `name` with the word and start a new round.
    ///
    /// Returns the new score.
    pub fn award(&mut self, name: &str) -> u32 {
        let score = self.scores.entry(name.to_string()).or_insert(0);
        *score += 1;
        let score = *score;
        counter!(CORRECT_GUESSES_TOTAL).increment(1);
        info!(player = %name, word = %self.target, score, "Word guessed");
        self.history.push(format!("{name} guessed the word!"));
        self.rotate();
        score
    }

    /// Record a chat line. Returns the formatted line.
    pub fn chat(&mut self, name: &str, text: &str) -> String {
        let line = format!("{name}: {text}");
        self.history.push(line.clone());
        line
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> TickOutcome {
        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left > 0 {
            return TickOutcome::Counting {
                time_left: self.time_left,
            };
        }
        debug!(word = %self.target, round = self.round, "Round expired");
        self.history.push(TIMEOUT_LINE);
        self.rotate();
        TickOutcome::Expired
    }

    fn rotate(&mut self) {
        self.target = self.words.next_word();
        self.time_left = self.duration;
        self.round += 1;
        counter!(ROUNDS_TOTAL).increment(1);
        debug!(round = self.round, word_length = self.target.chars().count(), "New round");
    }

    /// Full state for clients.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            word_length: self.target.chars().count(),
            scores: self.scores.clone(),
            history: self.history.to_vec(),
            time_left: self.time_left,
        }
    }
}

impl std::fmt::Debug for GameRound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameRound")
            .field("round", &self.round)
            .field("time_left", &self.time_left)
            .field("duration", &self.duration)
            .field("players", &self.scores.len())
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}
