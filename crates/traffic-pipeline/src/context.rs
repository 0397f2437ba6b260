use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
        Arc,
    },
};

use serde::Serialize;
use tracing::info;

use crate::{
    aggregate::AggregateMap, channel::BoundedChannel, cursor::WorkCursor, record::Record,
};

/// Lifecycle of a single pipeline run. Phases only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PipelineState {
    /// Channel and map exist, no worker started yet.
    Init = 0,
    /// Workers are running and producers are claiming lines.
    Running = 1,
    /// Every producer finished, consumers empty the channel.
    Draining = 2,
    /// Every worker returned, the aggregates are final.
    Done = 3,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PipelineState::Init,
            1 => PipelineState::Running,
            2 => PipelineState::Draining,
            _ => PipelineState::Done,
        }
    }
}

impl Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug)]
pub(crate) struct StateTracker(AtomicU8);

impl StateTracker {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(PipelineState::Init as u8))
    }

    #[cfg(test)]
    pub(crate) fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` unless the run is already there or further along.
    pub(crate) fn advance(&self, next: PipelineState) -> bool {
        let previous = PipelineState::from_u8(self.0.fetch_max(next as u8, Ordering::AcqRel));
        let advanced = previous < next;

        if advanced {
            info!("Pipeline state: {} -> {}", previous, next);
        }

        advanced
    }
}

#[derive(Debug, Default)]
pub(crate) struct PipelineStats {
    pub(crate) records_parsed: AtomicUsize,
    pub(crate) lines_skipped: AtomicUsize,
    pub(crate) records_folded: AtomicUsize,
}

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub lines_total: usize,
    pub lines_claimed: usize,
    pub records_parsed: usize,
    pub lines_skipped: usize,
    pub records_folded: usize,
    pub peak_occupancy: usize,
}

/// Everything the workers of one run share.
pub struct PipelineContext<'a> {
    pub(crate) lines: &'a [String],
    pub(crate) cursor: WorkCursor,
    pub(crate) channel: BoundedChannel<Record>,
    pub(crate) aggregates: AggregateMap,
    pub(crate) stats: PipelineStats,
    pub(crate) state: StateTracker,
    cancel: Option<Arc<AtomicBool>>,
    abort: AtomicBool,
}

impl<'a> PipelineContext<'a> {
    pub(crate) fn new(
        lines: &'a [String],
        producers: usize,
        capacity: usize,
        aggregates: AggregateMap,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            lines,
            cursor: WorkCursor::new(lines.len()),
            channel: BoundedChannel::new(capacity, producers),
            aggregates,
            stats: PipelineStats::default(),
            state: StateTracker::new(),
            cancel,
            abort: AtomicBool::new(false),
        }
    }

    /// Checked by producers before claiming each line.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
            || self
                .cancel
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Stops producers from claiming further lines, independent of the caller's flag.
    pub(crate) fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub(crate) fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            lines_total: self.lines.len(),
            lines_claimed: self.cursor.claimed(),
            records_parsed: self.stats.records_parsed.load(Ordering::Relaxed),
            lines_skipped: self.stats.lines_skipped.load(Ordering::Relaxed),
            records_folded: self.stats.records_folded.load(Ordering::Relaxed),
            peak_occupancy: self.channel.peak_len(),
        }
    }
}
