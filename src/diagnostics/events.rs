//! Structured event log of a transformation run.
//!
//! Every decision of the driver that a user may want to inspect is recorded
//! as an [`Event`]: replaced instructions, resolved fields, pruned
//! initializers, and the per-site failures that left bytecode untouched.
//! Events are appended through a shared reference and mirrored to the `log`
//! facade, so a binary can route them with any logger while library callers
//! inspect the log directly.
//!
//! # Example
//!
//! ```rust
//! use classfold::diagnostics::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::InstructionReplaced)
//!     .class("com/example/Config")
//!     .member("<clinit>()V")
//!     .message("static method Integer.parseInt(constant \"42\") -> 42");
//! log.warn("round limit reached");
//!
//! assert_eq!(log.count_kind(EventKind::InstructionReplaced), 1);
//! assert!(log.summary().contains("1 instruction replaced"));
//! ```

use std::{collections::HashMap, fmt};

use crate::diagnostics::failure::BytecodeLocation;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// A call site was replaced by the instructions of its constant value.
    InstructionReplaced,
    /// A static final field was proven constant.
    FieldResolved,
    /// A read of a resolved field was replaced by its value.
    FieldReadSubstituted,
    /// A static initializer left empty was removed.
    InitializerRemoved,
    /// `getstatic <Wrapper>.TYPE` was rewritten to a type constant load.
    TypeLoadNormalized,

    /// A configured or required member is absent or inaccessible.
    MemberUnavailable,
    /// A reconstructed value has no instruction form for its slot type.
    DeconstructionFailed,
    /// A field is assigned different values on different initializer paths.
    MultipleInitPaths,
    /// A string conversion produced an identity-based representation.
    NonDeterministicString,
    /// A hard failure with its full context chain.
    ReconstructionFailed,

    /// A fixed-point round finished.
    RoundCompleted,

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
            // Transformations
            Self::InstructionReplaced => "instruction replaced",
            Self::FieldResolved => "field resolved",
            Self::FieldReadSubstituted => "field read substituted",
            Self::InitializerRemoved => "initializer removed",
            Self::TypeLoadNormalized => "type load normalized",
            // Diagnostics
            Self::MemberUnavailable => "member unavailable",
            Self::DeconstructionFailed => "deconstruction failed",
            Self::MultipleInitPaths => "multiple initialization paths",
            Self::NonDeterministicString => "non-deterministic string",
            Self::ReconstructionFailed => "reconstruction failed",
            // Engine
            Self::RoundCompleted => "round completed",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a change to the bytecode.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::InstructionReplaced
                | Self::FieldResolved
                | Self::FieldReadSubstituted
                | Self::InitializerRemoved
                | Self::TypeLoadNormalized
        )
    }

    /// Returns true if this is a diagnostic event.
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            Self::MemberUnavailable
                | Self::DeconstructionFailed
                | Self::MultipleInitPaths
                | Self::NonDeterministicString
                | Self::ReconstructionFailed
                | Self::Info
                | Self::Warning
                | Self::Error
        )
    }

    fn level(self) -> log::Level {
        match self {
            Self::ReconstructionFailed | Self::MemberUnavailable | Self::Warning => {
                log::Level::Warn
            }
            Self::Error => log::Level::Error,
            Self::Info | Self::RoundCompleted => log::Level::Info,
            _ => log::Level::Debug,
        }
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
    /// Internal name of the class the event concerns.
    pub class: Option<String>,
    /// Member name and descriptor, e.g. `<clinit>()V` or `VERSION:Ljava/lang/String;`.
    pub member: Option<String>,
    /// Source line, when debug info has one.
    pub line: Option<u32>,
    /// Human-readable description.
    pub message: String,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            class: None,
            member: None,
            line: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(class) = &self.class {
            write!(f, " {class}")?;
            if let Some(member) = &self.member {
                write!(f, ".{member}")?;
            }
            if let Some(line) = self.line {
                write!(f, ":{line}")?;
            }
        }
        write!(f, " {}", self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log, and
/// forwarded to the `log` facade, when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    class: Option<String>,
    member: Option<String>,
    line: Option<u32>,
    message: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            class: None,
            member: None,
            line: None,
            message: None,
        }
    }

    /// Sets class, member and line from a bytecode location.
    pub fn at(mut self, location: &BytecodeLocation) -> Self {
        self.class = Some(location.class.clone());
        self.member = Some(format!("{}{}", location.method, location.descriptor));
        self.line = location.line;
        self
    }

    /// Sets only the class.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Sets the member.
    pub fn member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
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
            class: self.class.take(),
            member: self.member.take(),
            line: self.line.take(),
            message,
        };

        self.log.push(event);
    }
}

/// Collection of events from one transformation run.
///
/// Events can be appended through shared references, which lets the
/// reconstruction engine report while the driver holds the log.
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        for (_, event) in &self.events {
            new_log.events.push(event.clone());
        }
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

    fn push(&self, event: Event) {
        log::log!(target: "classfold", event.kind.level(), "{event}");
        self.events.push(event);
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
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.push(Event::new(EventKind::Error, message));
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

    /// Returns an iterator over events concerning one class.
    pub fn filter_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events
            .iter()
            .map(|(_, e)| e)
            .filter(move |e| e.class.as_deref() == Some(class))
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events
            .iter()
            .map(|(_, e)| e)
            .filter(|e| e.kind.is_transformation())
    }

    /// Returns an iterator over diagnostic events only.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events
            .iter()
            .map(|(_, e)| e)
            .filter(|e| e.kind.is_diagnostic())
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

    /// Generates a human-readable summary of all transformation events.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let counts = self.count_by_kind();

        let mut parts: Vec<String> = counts
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
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

/// Statistics derived from an [`EventLog`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Number of call sites replaced by constants.
    pub instructions_replaced: usize,
    /// Number of fields proven constant.
    pub fields_resolved: usize,
    /// Number of field reads substituted.
    pub reads_substituted: usize,
    /// Number of static initializers removed.
    pub initializers_removed: usize,
    /// Number of hard failures reported.
    pub failures: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of fixed-point rounds run.
    pub rounds: usize,
}

impl TransformStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            instructions_replaced: get(EventKind::InstructionReplaced),
            fields_resolved: get(EventKind::FieldResolved),
            reads_substituted: get(EventKind::FieldReadSubstituted),
            initializers_removed: get(EventKind::InitializerRemoved),
            failures: get(EventKind::ReconstructionFailed),
            warnings: get(EventKind::Warning),
            rounds: get(EventKind::RoundCompleted),
        }
    }
}

impl fmt::Display for TransformStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} replaced, {} fields resolved, {} reads substituted, {} initializers removed in {} rounds",
            self.instructions_replaced,
            self.fields_resolved,
            self.reads_substituted,
            self.initializers_removed,
            self.rounds
        )?;
        if self.failures > 0 {
            write!(f, " ({} failures)", self.failures)?;
        }
        Ok(())
    }
}
