use std::{
    sync::{atomic::AtomicBool, Arc},
    thread::{self, Scope, ScopedJoinHandle},
    time::Instant,
};

use tracing::{info, warn};

use crate::{
    aggregate::{AggregateMap, Aggregates, DEFAULT_STRIPES},
    context::{PipelineContext, PipelineState, PipelineSummary},
    error::{PipelineError, Result, WorkerRole},
    worker::{Consumer, Producer},
};

/// Worker counts and channel capacity of a run, all at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    producers: usize,
    consumers: usize,
    capacity: usize,
}

impl PipelineConfig {
    pub fn new(producers: usize, consumers: usize, capacity: usize) -> Result<Self> {
        for (parameter, value) in [
            ("producers", producers),
            ("consumers", consumers),
            ("capacity", capacity),
        ] {
            if value == 0 {
                return Err(PipelineError::InvalidConfiguration { parameter, value });
            }
        }

        Ok(Self {
            producers,
            consumers,
            capacity,
        })
    }

    pub fn producers(&self) -> usize {
        self.producers
    }

    pub fn consumers(&self) -> usize {
        self.consumers
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub aggregates: Aggregates,
    pub summary: PipelineSummary,
}

/// Runs `producers` parsing threads and `consumers` aggregating threads over one bounded
/// channel and one aggregate map, and returns the map once every thread has finished.
///
/// A `Pipeline` is consumed by [`Pipeline::run`] and cannot be restarted.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    stripes: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            stripes: DEFAULT_STRIPES,
            cancel: None,
        }
    }

    /// Producers stop claiming lines once `flag` is set. Records already in the channel are
    /// still folded before [`Pipeline::run`] returns [`PipelineError::Cancelled`].
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Number of independently locked stripes of the aggregate map.
    pub fn with_stripes(mut self, stripes: usize) -> Self {
        self.stripes = stripes;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(self, lines: &[String]) -> Result<PipelineOutput> {
        let PipelineConfig {
            producers,
            consumers,
            capacity,
        } = self.config;

        let context = PipelineContext::new(
            lines,
            producers,
            capacity,
            AggregateMap::with_stripes(self.stripes),
            self.cancel,
        );

        info!(
            "Starting pipeline over {} lines ({} producers, {} consumers, capacity {})",
            lines.len(),
            producers,
            consumers,
            capacity
        );
        let start = Instant::now();

        thread::scope(|scope| start_and_join(scope, &context, producers, consumers))?;
        context.state.advance(PipelineState::Done);

        let summary = context.summary();
        info!(
            "Pipeline finished in {}ms: {} records folded, {} lines skipped, peak occupancy {}/{}",
            start.elapsed().as_millis(),
            summary.records_folded,
            summary.lines_skipped,
            summary.peak_occupancy,
            capacity
        );

        if summary.lines_claimed < summary.lines_total && context.is_cancelled() {
            return Err(PipelineError::Cancelled {
                lines_claimed: summary.lines_claimed,
            });
        }

        Ok(PipelineOutput {
            aggregates: context.aggregates.into_aggregates(),
            summary,
        })
    }
}

/// Runs the configured pipeline over `lines` and returns the hourly aggregates.
pub fn aggregate(lines: &[String], config: PipelineConfig) -> Result<Aggregates> {
    Pipeline::new(config)
        .run(lines)
        .map(|output| output.aggregates)
}

/// Consumers are spawned before producers. If a consumer fails to spawn, no producer exists
/// yet and signalling every producer done lets the started consumers exit. If a producer fails
/// to spawn, the unspawned ones are signalled done and the started ones aborted.
fn start_and_join<'scope, 'env>(
    scope: &'scope Scope<'scope, 'env>,
    context: &'env PipelineContext<'env>,
    producers: usize,
    consumers: usize,
) -> Result<()> {
    let mut consumer_handles = Vec::with_capacity(consumers);
    for id in 0..consumers {
        let consumer = Consumer::new(id, context);
        match spawn(scope, format!("consumer-{id}"), move || consumer.run()) {
            Ok(handle) => consumer_handles.push(handle),
            Err(e) => {
                warn!("Failed to spawn consumer #{}: {}", id, e);
                return Err(abandon_consumers(context, producers, consumer_handles, e));
            }
        }
    }

    let mut producer_handles = Vec::with_capacity(producers);
    let mut spawn_error = None;
    for id in 0..producers {
        let producer = Producer::new(id, context);
        match spawn(scope, format!("producer-{id}"), move || producer.run()) {
            Ok(handle) => producer_handles.push(handle),
            Err(e) => {
                warn!("Failed to spawn producer #{}: {}", id, e);
                context.abort();
                for _ in id..producers {
                    context.channel.signal_producer_done();
                }
                spawn_error = Some(e);
                break;
            }
        }
    }

    if spawn_error.is_none() {
        context.state.advance(PipelineState::Running);
    }

    let producers_joined = join_all(WorkerRole::Producer, producer_handles);
    let consumers_joined = join_all(WorkerRole::Consumer, consumer_handles);

    if let Some(e) = spawn_error {
        return Err(PipelineError::Spawn(e));
    }

    producers_joined.and(consumers_joined)
}

/// Lets already started consumers run to end-of-stream and joins them. The spawn failure is
/// what gets reported, even if one of those consumers panicked.
fn abandon_consumers(
    context: &PipelineContext<'_>,
    producers: usize,
    handles: Vec<ScopedJoinHandle<'_, ()>>,
    error: std::io::Error,
) -> PipelineError {
    for _ in 0..producers {
        context.channel.signal_producer_done();
    }
    if let Err(e) = join_all(WorkerRole::Consumer, handles) {
        warn!("{} while abandoning the run", e);
    }

    PipelineError::Spawn(error)
}

fn spawn<'scope, 'env, F>(
    scope: &'scope Scope<'scope, 'env>,
    name: String,
    f: F,
) -> std::io::Result<ScopedJoinHandle<'scope, ()>>
where
    F: FnOnce() + Send + 'scope,
{
    thread::Builder::new().name(name).spawn_scoped(scope, f)
}

/// Joins every handle, reporting the first worker that panicked.
fn join_all(role: WorkerRole, handles: Vec<ScopedJoinHandle<'_, ()>>) -> Result<()> {
    let mut result = Ok(());

    for (index, handle) in handles.into_iter().enumerate() {
        if handle.join().is_err() && result.is_ok() {
            result = Err(PipelineError::WorkerPanicked { role, index });
        }
    }

    result
}
