//! Structured event logging for deobfuscation methods.
//!
//! Every method records what it did into an [`EventLog`] independently of the `log`
//! facade, so callers can inspect results per function without scraping log output.
//!
//! - [`Event`] - A single recorded event (rewrite, patch, warning, ...)
//! - [`EventLog`] - Thread-safe append-only collection with query and summary helpers
//! - [`EventBuilder`] - Fluent API for creating events
//!
//! # Example
//!
//! ```rust
//! use deobscope::events::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::ExpressionRewritten)
//!     .at(0x401000, 3)
//!     .method("mba-simplifier")
//!     .message("(a | b) + (a & b) -> a + b");
//! log.info("corpus loaded");
//!
//! assert_eq!(log.count_kind(EventKind::ExpressionRewritten), 1);
//! assert_eq!(log.summary(), "1 expression rewritten");
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// An obfuscated pattern matched an IR expression.
    PatternMatched,
    /// A matched expression was replaced by its simplified form.
    ExpressionRewritten,
    /// A match was found but the rewriter declined to substitute.
    RewriteDeclined,
    /// A branch with a constant condition was turned into a jump.
    PredicatePatched,
    /// A function looks control-flow flattened.
    FlatteningDetected,
    /// The dispatcher (state) variable of a flattened function was identified.
    DispatcherIdentified,
    /// A method started on a function.
    MethodStarted,
    /// A method completed on a function.
    MethodCompleted,
    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::PatternMatched => "pattern matched",
            Self::ExpressionRewritten => "expression rewritten",
            Self::RewriteDeclined => "rewrite declined",
            Self::PredicatePatched => "predicate patched",
            Self::FlatteningDetected => "flattening detected",
            Self::DispatcherIdentified => "dispatcher identified",
            Self::MethodStarted => "method started",
            Self::MethodCompleted => "method completed",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a change to the IR.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(self, Self::ExpressionRewritten | Self::PredicatePatched)
    }

    /// Returns true if this event reports an analysis finding.
    #[must_use]
    pub fn is_finding(&self) -> bool {
        matches!(
            self,
            Self::PatternMatched | Self::FlatteningDetected | Self::DispatcherIdentified
        )
    }

    /// Returns true if this is a diagnostic event (info/warning/error).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// Address of the function where the event occurred (if applicable).
    pub function: Option<u64>,
    /// Instruction index within the function.
    pub location: Option<usize>,
    /// Human-readable description.
    pub message: String,
    /// Name of the method that produced the event.
    pub method: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            function: None,
            location: None,
            message: message.into(),
            method: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.function, self.location) {
            (Some(function), Some(location)) => {
                write!(f, "[{}] {function:#x}@{location}: {}", self.kind, self.message)
            }
            (Some(function), None) => write!(f, "[{}] {function:#x}: {}", self.kind, self.message),
            _ => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is automatically added
/// to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    function: Option<u64>,
    location: Option<usize>,
    message: Option<String>,
    method: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            function: None,
            location: None,
            message: None,
            method: None,
        }
    }

    /// Sets the function address and instruction index where the event occurred.
    pub fn at(mut self, function: u64, location: usize) -> Self {
        self.function = Some(function);
        self.location = Some(location);
        self
    }

    /// Sets only the function (for function-level events).
    pub fn function(mut self, function: u64) -> Self {
        self.function = Some(function);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific method.
    pub fn method(mut self, method_name: impl Into<String>) -> Self {
        self.method = Some(method_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        let event = Event {
            kind: self.kind,
            function: self.function.take(),
            location: self.location.take(),
            message,
            method: self.method.take(),
        };

        self.log.events.push(event);
    }
}

/// Collection of events from deobfuscation.
///
/// This type is thread-safe: events can be appended concurrently from
/// multiple threads using shared references (`&self`).
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        new_log.merge(self);
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is automatically added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends a copy of every event of another log.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over events for a specific function.
    pub fn filter_function(&self, function: u64) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.function == Some(function))
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Returns an iterator over error events.
    pub fn errors(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Error)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of transformation events.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.transformations().count()
    }

    /// Returns the number of distinct functions with events.
    #[must_use]
    pub fn functions_affected(&self) -> usize {
        self.iter()
            .filter_map(|e| e.function)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of all events.
    ///
    /// Transformations and findings are counted per kind; a log holding only
    /// diagnostics is summarised by its length.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut counts: Vec<(EventKind, usize)> = self
            .count_by_kind()
            .into_iter()
            .filter(|(k, _)| k.is_transformation() || k.is_finding())
            .collect();

        if counts.is_empty() {
            return format!("{} events", self.len());
        }

        counts.sort();
        counts
            .iter()
            .map(|(kind, count)| format!("{count} {}", kind.description()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Iterator wrapper for EventLog that yields &Event
pub struct EventLogIter<'a> {
    inner: boxcar::Iter<'a, Event>,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        EventLogIter {
            inner: self.events.iter(),
        }
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}
