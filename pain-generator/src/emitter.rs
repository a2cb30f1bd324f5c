//! Repeated batch generation on a fixed cadence.
//!
//! [`PeriodicEmitter::run`] blocks the calling thread; callers wanting a background emitter
//! run it on a thread of their own and keep a clone of the [`StopSignal`]. Scheduling is
//! cooperative: a callback that blocks delays every later batch.

use std::fmt::Display;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::GenError;
use crate::generator::TransactionGenerator;
use crate::timestamp::{Clock, SystemClock};

/// Cloneable cancellation handle shared between an emitter and whoever controls it
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop and wakes any emitter waiting between batches
    pub fn stop(&self) {
        let (lock, condvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        condvar.notify_all();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for up to `timeout`, returning early once stopped. Returns whether a stop was
    /// requested.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, condvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = condvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}

/// What happens when the batch callback returns an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallbackPolicy {
    /// Log it, count it and keep emitting
    #[default]
    Isolate,
    /// Stop emitting and return [`GenError::Callback`]
    Propagate,
}

#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Transactions per batch
    pub batch_size: usize,
    /// Pause between the end of one batch and the start of the next
    pub period: Duration,
    /// Stop on its own after this many batches
    pub max_batches: Option<u64>,
    pub callback_policy: CallbackPolicy,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        EmitterConfig {
            batch_size: 1,
            period: Duration::from_secs(2),
            max_batches: None,
            callback_policy: CallbackPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterSummary {
    pub batches: u64,
    pub transactions: u64,
    pub callback_failures: u64,
}

#[derive(Debug)]
pub struct PeriodicEmitter<'a, C = SystemClock> {
    generator: TransactionGenerator<'a, C>,
    config: EmitterConfig,
}

impl<'a, C: Clock> PeriodicEmitter<'a, C> {
    #[must_use]
    pub fn new(generator: TransactionGenerator<'a, C>, config: EmitterConfig) -> Self {
        PeriodicEmitter { generator, config }
    }

    #[must_use]
    pub fn generator(&self) -> &TransactionGenerator<'a, C> {
        &self.generator
    }

    #[must_use]
    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Generates a batch, hands it to `callback`, waits one period, and repeats until `stop`
    /// is signalled or `max_batches` is reached.
    ///
    /// # Errors
    /// Errors when generation fails, or when the callback fails under
    /// [`CallbackPolicy::Propagate`]
    pub fn run<F, E>(&self, stop: &StopSignal, mut callback: F) -> Result<EmitterSummary, GenError>
    where
        F: FnMut(&[String]) -> Result<(), E>,
        E: Display,
    {
        info!(
            "Emitting {} transactions every {:?}",
            self.config.batch_size, self.config.period
        );
        let mut summary = EmitterSummary::default();

        while !stop.is_stopped() {
            let batch = self.generator.generate_batch(self.config.batch_size)?;
            summary.batches += 1;
            summary.transactions += batch.len() as u64;
            debug!("Emitting batch {} ({} transactions)", summary.batches, batch.len());

            if let Err(e) = callback(&batch) {
                match self.config.callback_policy {
                    CallbackPolicy::Isolate => {
                        warn!("Batch callback failed on batch {}: {}", summary.batches, e);
                        summary.callback_failures += 1;
                    }
                    CallbackPolicy::Propagate => {
                        return Err(GenError::Callback(e.to_string()));
                    }
                }
            }

            if self
                .config
                .max_batches
                .is_some_and(|max| summary.batches >= max)
            {
                break;
            }
            if stop.wait_timeout(self.config.period) {
                break;
            }
        }

        info!(
            "Emitter stopped after {} batches ({} transactions)",
            summary.batches, summary.transactions
        );
        Ok(summary)
    }
}
