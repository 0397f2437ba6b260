use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct State<T> {
    queue: VecDeque<T>,
    active_producers: usize,
    peak_len: usize,
}

/// A fixed-capacity FIFO shared by a known number of producers and any number of consumers.
///
/// Producers block in [`BoundedChannel::enqueue`] while the queue is full. Consumers block in
/// [`BoundedChannel::dequeue`] while the queue is empty *and* at least one producer has not yet
/// called [`BoundedChannel::signal_producer_done`]. Once the queue is empty and every producer
/// is done, `dequeue` returns `None` to every caller without blocking.
///
/// All state lives behind a single mutex. `not_full` wakes producers, `not_empty` wakes
/// consumers both for new items and for end-of-stream.
pub struct BoundedChannel<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

/// Returned by [`BoundedChannel::enqueue`] when no producer is registered anymore.
#[derive(Debug, PartialEq, Eq)]
pub struct Closed<T>(pub T);

impl<T> BoundedChannel<T> {
    /// `capacity` and `producers` are clamped to at least 1, callers validate them beforehand.
    pub fn new(capacity: usize, producers: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity),
                active_producers: producers.max(1),
                peak_len: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Appends `item`, blocking while the channel is full.
    pub fn enqueue(&self, item: T) -> Result<(), Closed<T>> {
        let mut state = self.state.lock();

        if state.active_producers == 0 {
            return Err(Closed(item));
        }

        self.not_full
            .wait_while(&mut state, |s| s.queue.len() >= self.capacity);

        state.queue.push_back(item);
        state.peak_len = state.peak_len.max(state.queue.len());
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the head of the queue, blocking while it is empty and producers remain.
    ///
    /// `None` means end-of-stream: the queue is drained and every producer is done.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.state.lock();

        self.not_empty
            .wait_while(&mut state, |s| s.queue.is_empty() && s.active_producers > 0);

        let item = state.queue.pop_front();
        drop(state);

        if item.is_some() {
            // Always wake a producer. Waking only on the full -> not full edge strands a second
            // blocked producer when two consumers pop back to back.
            self.not_full.notify_one();
        }

        item
    }

    /// Marks one producer as finished. Returns `true` for the last one.
    ///
    /// When the last producer finishes every waiting consumer is woken so it can observe
    /// end-of-stream.
    pub fn signal_producer_done(&self) -> bool {
        let mut state = self.state.lock();

        debug_assert!(state.active_producers > 0, "more producers finished than started");
        state.active_producers = state.active_producers.saturating_sub(1);
        let last = state.active_producers == 0;
        drop(state);

        if last {
            self.not_empty.notify_all();
        }

        last
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_producers(&self) -> usize {
        self.state.lock().active_producers
    }

    /// Highest number of items ever held at once.
    pub fn peak_len(&self) -> usize {
        self.state.lock().peak_len
    }
}
