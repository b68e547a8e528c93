use crate::infrastructure::error::InfraError;
use futures::future::BoxFuture;

/// Candidate endpoints tried in order; the first success wins.
/// Futures are lazy, so a candidate does nothing until its turn comes.
pub struct FallbackChain<'a, T> {
    candidates: Vec<(&'static str, BoxFuture<'a, Result<T, InfraError>>)>,
}

#[derive(Debug)]
pub struct ChainFailure {
    /// `(candidate, error)` in the order they were tried.
    pub attempts: Vec<(&'static str, InfraError)>,
}

impl ChainFailure {
    pub fn last_error(self) -> Option<InfraError> {
        self.attempts.into_iter().last().map(|(_, error)| error)
    }
}

impl<'a, T> FallbackChain<'a, T> {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    pub fn then(mut self, name: &'static str, candidate: BoxFuture<'a, Result<T, InfraError>>) -> Self {
        self.candidates.push((name, candidate));
        self
    }

    /// Returns the winning candidate's name and value.
    pub async fn run(self) -> Result<(&'static str, T), ChainFailure> {
        let mut attempts = Vec::new();
        for (name, candidate) in self.candidates {
            match candidate.await {
                Ok(value) => return Ok((name, value)),
                Err(error) => attempts.push((name, error)),
            }
        }
        Err(ChainFailure { attempts })
    }

    /// Like [`run`](Self::run) but an exhausted chain resolves to `None`.
    pub async fn run_or_none(self) -> Option<T> {
        self.run().await.ok().map(|(_, value)| value)
    }

    /// Like [`run`](Self::run) but surfaces the last candidate's error.
    pub async fn run_or_last_error(self) -> Result<T, InfraError> {
        match self.run().await {
            Ok((_, value)) => Ok(value),
            Err(failure) => Err(failure
                .last_error()
                .unwrap_or_else(|| InfraError::InvalidConfig("empty fallback chain".to_string()))),
        }
    }
}

impl<T> Default for FallbackChain<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}
