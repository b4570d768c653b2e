//! Trace sink collaborator (spec §9): the codec has no logging opinions of
//! its own beyond emitting named events at well-defined points. Mirrors the
//! `log::debug!`/`log::warn!` call sites already scattered through the
//! teacher's `fec.rs`/`framing.rs`, generalized into a trait so a caller can
//! swap in a structured sink without the core depending on one.

/// A well-defined point in the pipeline worth recording. New variants should
/// stay additive; callers match non-exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PreambleDetected,
    ChannelEstimated,
    SymbolDecoded,
    FecCorrected,
    ErrorRaised,
}

/// Minimal event sink: `trace(event_kind, fields)`. The default impl
/// forwards to the `log` crate at `debug` level, which is what every kept
/// teacher module already reaches for.
pub trait TraceSink {
    fn trace(&self, kind: EventKind, fields: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn trace(&self, kind: EventKind, fields: &str) {
        log::debug!("{kind:?}: {fields}");
    }
}

/// Drops every event; useful in hot loops (e.g. property tests) that don't
/// want to pay for formatting.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn trace(&self, _kind: EventKind, _fields: &str) {}
}
