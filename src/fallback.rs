//! Ordered fallback over interchangeable candidates.
//!
//! Speech backends and audio players are both "try each in order, keep the
//! first that works, remember what happened to the rest".

use std::fmt;

/// Result of trying one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Skipped: the candidate's program or service is not present.
    Unavailable,
    /// The candidate ran and reported an error.
    BackendError(String),
    /// The candidate claimed success but produced nothing usable.
    InvalidOutput(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success => write!(f, "ok"),
            AttemptOutcome::Unavailable => write!(f, "unavailable"),
            AttemptOutcome::BackendError(msg) => write!(f, "error: {}", msg),
            AttemptOutcome::InvalidOutput(msg) => write!(f, "invalid output: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub name: String,
    /// Zero-based position in the configured order.
    pub position: usize,
    pub outcome: AttemptOutcome,
}

/// Anything that can sit in a fallback order.
pub trait Named {
    fn name(&self) -> &str;
}

/// What a fallback run produced.
#[derive(Debug)]
pub struct FallbackRun<R> {
    /// The winning value, if any candidate succeeded.
    pub value: Option<R>,
    /// One entry per candidate actually tried, in order.
    pub attempts: Vec<Attempt>,
}

impl<R> FallbackRun<R> {
    pub fn winner(&self) -> Option<&Attempt> {
        self.attempts
            .last()
            .filter(|a| a.outcome == AttemptOutcome::Success)
    }
}

/// Candidates tried strictly in the order given.
#[derive(Debug, Clone)]
pub struct OrderedFallback<T> {
    candidates: Vec<T>,
}

impl<T: Named> OrderedFallback<T> {
    pub fn new(candidates: Vec<T>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[T] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Try each candidate until one returns `Ok`.
    ///
    /// `attempt` returns the failure outcome on `Err`; later candidates are
    /// never touched once one succeeds.
    pub fn run<R, F>(&self, mut attempt: F) -> FallbackRun<R>
    where
        F: FnMut(&T) -> std::result::Result<R, AttemptOutcome>,
    {
        let mut attempts = Vec::with_capacity(self.candidates.len());

        for (position, candidate) in self.candidates.iter().enumerate() {
            let name = candidate.name().to_string();
            match attempt(candidate) {
                Ok(value) => {
                    tracing::debug!(candidate = %name, position, "fallback succeeded");
                    attempts.push(Attempt {
                        name,
                        position,
                        outcome: AttemptOutcome::Success,
                    });
                    return FallbackRun {
                        value: Some(value),
                        attempts,
                    };
                }
                Err(outcome) => {
                    tracing::debug!(candidate = %name, position, %outcome, "fallback moving on");
                    attempts.push(Attempt {
                        name,
                        position,
                        outcome,
                    });
                }
            }
        }

        FallbackRun {
            value: None,
            attempts,
        }
    }
}
