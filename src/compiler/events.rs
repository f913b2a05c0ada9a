//! Event logging for the pass pipeline.
//!
//! Every pass reports what it did through an [`EventLog`]: rewritten loops, removed
//! blocks, rejected candidates, plus scheduler progress and failures. Events can
//! be inspected after a run or safely ignored.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event
//! - [`EventLog`] - Collection of events with query and summary capabilities
//! - [`EventBuilder`] - Fluent API for creating events
//!
//! # Example
//!
//! ```rust
//! use tailfold::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//!
//! log.record(EventKind::LoopRewritten)
//!     .at("sum", 0)
//!     .message("sum: recursion replaced by loop.header");
//! log.record(EventKind::PassCompleted).function("sum");
//!
//! assert!(log.has(EventKind::LoopRewritten));
//! assert_eq!(log.summary(), "1 loop rewritten");
//! ```

use std::fmt;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An accumulator recursion was replaced by a loop.
    LoopRewritten,
    /// A phi node was inserted.
    PhiInserted,
    /// A basic block was removed.
    BlockRemoved,

    /// A function matched the detector.
    CandidateFound,
    /// A function matched the detector but failed a precondition of the rewrite.
    CandidateRejected,

    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,
    /// A function finished the pipeline.
    FunctionProcessed,
    /// A pass failed and the function was restored.
    Error,
}

impl EventKind {
    /// Transformation kinds, in the order the pipeline produces them.
    pub const TRANSFORMATIONS: [Self; 3] =
        [Self::LoopRewritten, Self::PhiInserted, Self::BlockRemoved];

    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Transformations
            Self::LoopRewritten => "loop rewritten",
            Self::PhiInserted => "phi inserted",
            Self::BlockRemoved => "block removed",
            // Analysis
            Self::CandidateFound => "candidate found",
            Self::CandidateRejected => "candidate rejected",
            // Engine
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::FunctionProcessed => "function processed",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a code transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        Self::TRANSFORMATIONS.contains(self)
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
    /// The function where the event occurred (if applicable).
    pub function: Option<String>,
    /// Layout position of the block the event concerns.
    pub location: Option<usize>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the builder is
/// dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    function: Option<String>,
    location: Option<usize>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            function: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the function and block position where the event occurred.
    pub fn at(mut self, function: impl Into<String>, location: usize) -> Self {
        self.function = Some(function.into());
        self.location = Some(location);
        self
    }

    /// Sets only the function (for function-level events).
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
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
            pass: self.pass.take(),
        };

        self.log.events.push(event);
    }
}

/// Collection of events from a pipeline run.
///
/// Statistics are derived from the events rather than tracked separately.
///
/// This type is thread-safe: events can be appended concurrently from multiple threads
/// using shared references (`&self`).
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
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
    /// The event is added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
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

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.events
            .iter()
            .filter_map(move |(_, e)| if e.kind == kind { Some(e) } else { None })
    }

    /// Returns an iterator over the events of one function.
    pub fn filter_function<'a>(&'a self, function: &'a str) -> impl Iterator<Item = &'a Event> {
        self.events
            .iter()
            .filter_map(move |(_, e)| (e.function.as_deref() == Some(function)).then_some(e))
    }

    /// Returns an iterator over error events.
    pub fn errors(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Error)
    }

    /// Summarises the transformations, e.g. `1 loop rewritten, 3 phi inserted`.
    ///
    /// Falls back to the plain event count when nothing was transformed.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let parts: Vec<String> = EventKind::TRANSFORMATIONS
            .iter()
            .map(|&kind| (kind, self.count_kind(kind)))
            .filter(|&(_, count)| count > 0)
            .map(|(kind, count)| format!("{count} {kind}"))
            .collect();

        if parts.is_empty() {
            format!("{} events", self.len())
        } else {
            parts.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(!log.has(EventKind::LoopRewritten));
        assert_eq!(log.summary(), "no events");
    }

    #[test]
    fn test_record_event() {
        let log = EventLog::new();

        log.record(EventKind::BlockRemoved)
            .at("sum", 2)
            .pass("dead-blocks")
            .message("removed 'base'");

        let event = log.iter().next().unwrap();
        assert_eq!(event.function.as_deref(), Some("sum"));
        assert_eq!(event.location, Some(2));
        assert_eq!(event.pass.as_deref(), Some("dead-blocks"));
        assert_eq!(event.message, "removed 'base'");
    }

    #[test]
    fn test_default_message() {
        let log = EventLog::new();
        log.record(EventKind::PhiInserted).function("sum");

        let event = log.iter().next().unwrap();
        assert_eq!(event.message, "phi inserted");
    }

    #[test]
    fn test_summary_and_functions() {
        let log = EventLog::new();

        log.record(EventKind::LoopRewritten).function("sum");
        log.record(EventKind::PhiInserted).function("sum");
        log.record(EventKind::PhiInserted).function("fact");
        log.record(EventKind::CandidateRejected).function("climb");
        log.record(EventKind::Error).function("climb");

        assert_eq!(log.summary(), "1 loop rewritten, 2 phi inserted");
        assert_eq!(log.filter_function("sum").count(), 2);
        assert_eq!(log.filter_kind(EventKind::PhiInserted).count(), 2);
        assert_eq!(log.errors().count(), 1);
    }

    #[test]
    fn test_summary_without_transformations() {
        let log = EventLog::new();
        log.record(EventKind::PassStarted).function("max");
        log.record(EventKind::PassCompleted).function("max");
        assert_eq!(log.summary(), "2 events");
    }

    #[test]
    fn test_thread_safe_append() {
        use std::sync::Arc;
        use std::thread;

        let log = Arc::new(EventLog::new());
        let mut handles = vec![];

        for i in 0..4 {
            let log_clone = Arc::clone(&log);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    log_clone
                        .record(EventKind::BlockRemoved)
                        .at(format!("f{i}"), j)
                        .message(format!("thread {i} event {j}"));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.len(), 400);
        assert_eq!(log.count_kind(EventKind::BlockRemoved), 400);
        assert_eq!(log.filter_function("f2").count(), 100);
    }
}
