use std::sync::atomic::Ordering;

use tracing::{debug, trace, warn};

use crate::{
    context::{PipelineContext, PipelineState},
    record::Record,
};

/// Claims lines from the shared cursor, parses them and feeds the channel.
pub struct Producer<'a> {
    id: usize,
    context: &'a PipelineContext<'a>,
}

impl<'a> Producer<'a> {
    pub(crate) fn new(id: usize, context: &'a PipelineContext<'a>) -> Self {
        Self { id, context }
    }

    pub fn run(self) {
        let context = self.context;
        let _done = ProducerDone {
            id: self.id,
            context,
        };

        let (mut parsed, mut skipped) = (0, 0);
        debug!("producer #{}: Started", self.id);

        while !context.is_cancelled() {
            let Some(index) = context.cursor.claim() else {
                break;
            };

            match context.lines[index].parse::<Record>() {
                Ok(record) => {
                    if context.channel.enqueue(record).is_err() {
                        warn!("producer #{}: Channel closed unexpectedly", self.id);
                        break;
                    }
                    parsed += 1;
                }
                Err(e) => {
                    trace!("producer #{}: Skipping line {}: {}", self.id, index + 1, e);
                    skipped += 1;
                }
            }
        }

        context
            .stats
            .records_parsed
            .fetch_add(parsed, Ordering::Relaxed);
        context
            .stats
            .lines_skipped
            .fetch_add(skipped, Ordering::Relaxed);

        debug!(
            "producer #{}: Finished ({} records, {} skipped)",
            self.id, parsed, skipped
        );
    }
}

/// Signals producer completion exactly once, also when the producer unwinds.
struct ProducerDone<'a> {
    id: usize,
    context: &'a PipelineContext<'a>,
}

impl Drop for ProducerDone<'_> {
    fn drop(&mut self) {
        if self.context.channel.signal_producer_done() {
            debug!("producer #{}: Last producer done", self.id);
            self.context.state.advance(PipelineState::Draining);
        }
    }
}

/// Drains the channel into the shared aggregate map until end-of-stream.
pub struct Consumer<'a> {
    id: usize,
    context: &'a PipelineContext<'a>,
}

impl<'a> Consumer<'a> {
    pub(crate) fn new(id: usize, context: &'a PipelineContext<'a>) -> Self {
        Self { id, context }
    }

    pub fn run(self) {
        let context = self.context;
        let mut folded = 0;
        debug!("consumer #{}: Started", self.id);

        while let Some(record) = context.channel.dequeue() {
            context.aggregates.fold(&record);
            folded += 1;
        }

        context
            .stats
            .records_folded
            .fetch_add(folded, Ordering::Relaxed);

        debug!("consumer #{}: Reached end of stream ({} records)", self.id, folded);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        str::FromStr,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread,
    };

    use crate::{
        aggregate::AggregateMap,
        context::{PipelineContext, PipelineState},
        record::BucketKey,
    };

    use super::{Consumer, Producer};

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_single_producer_then_consumer() {
        let input = lines(&[
            "2025-01-01 00:00:00 1 10",
            "not a record",
            "2025-01-01 00:10:00 1 5",
        ]);
        let context = PipelineContext::new(&input, 1, 8, AggregateMap::new(), None);

        Producer::new(0, &context).run();
        assert_eq!(context.channel.len(), 2);
        assert_eq!(context.channel.active_producers(), 0);
        assert_eq!(context.state.get(), PipelineState::Draining);

        Consumer::new(0, &context).run();
        let summary = context.summary();
        assert_eq!(summary.records_parsed, 2);
        assert_eq!(summary.lines_skipped, 1);
        assert_eq!(summary.records_folded, 2);

        let aggregates = context.aggregates.into_aggregates();
        assert_eq!(
            aggregates.get(&BucketKey::from_str("2025-01-01 00").unwrap(), 1),
            Some(15)
        );
    }

    #[test]
    fn test_cancelled_producer_claims_nothing_but_signals_done() {
        let input = lines(&["2025-01-01 00:00:00 1 10"]);
        let flag = Arc::new(AtomicBool::new(true));
        let context = PipelineContext::new(&input, 1, 1, AggregateMap::new(), Some(flag));

        Producer::new(0, &context).run();
        assert_eq!(context.cursor.claimed(), 0);
        assert_eq!(context.channel.active_producers(), 0);
        assert_eq!(context.channel.dequeue(), None);
    }

    #[test]
    fn test_panicking_producer_still_signals_done() {
        let input = lines(&["2025-01-01 00:00:00 1 10"]);
        let context = PipelineContext::new(&input, 2, 1, AggregateMap::new(), None);
        let flag = AtomicBool::new(false);

        thread::scope(|s| {
            let crashed = s.spawn(|| {
                let _done = super::ProducerDone {
                    id: 0,
                    context: &context,
                };
                flag.store(true, Ordering::SeqCst);
                panic!("producer crashed");
            });
            assert!(crashed.join().is_err());
        });

        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(context.channel.active_producers(), 1);
    }
}
