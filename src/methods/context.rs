//! Per-run state shared by the methods.
//!
//! The [`AnalysisContext`] carries what every method needs besides the function it
//! works on: the event log it reports to, the configuration, and an optional
//! cancellation flag set by the caller. It is handed out by shared reference, so one
//! context serves all worker threads of a parallel run.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{config::EngineConfig, events::EventLog, Error, Result};

/// Shared state of one deobfuscation run.
pub struct AnalysisContext<'a> {
    /// Log receiving the events of every method.
    pub events: &'a EventLog,

    /// Settings of the run.
    pub config: &'a EngineConfig,

    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> AnalysisContext<'a> {
    /// Creates a context without cancellation support.
    #[must_use]
    pub fn new(events: &'a EventLog, config: &'a EngineConfig) -> Self {
        Self {
            events,
            config,
            cancel: None,
        }
    }

    /// Attaches a cancellation flag. Setting it to `true` makes long-running methods stop
    /// with [`Error::Cancelled`].
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Returns true if the caller asked to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Fails with [`Error::Cancelled`] if the caller asked to stop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] once the flag is set.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag() {
        let events = EventLog::new();
        let config = EngineConfig::default();
        assert!(AnalysisContext::new(&events, &config).check_cancelled().is_ok());

        let flag = Arc::new(AtomicBool::new(false));
        let ctx = AnalysisContext::new(&events, &config).with_cancel_flag(flag.clone());
        assert!(!ctx.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(matches!(ctx.check_cancelled(), Err(Error::Cancelled)));
    }
}
