use std::sync::atomic::{AtomicUsize, Ordering};

/// Hands out the indices `0..len` to concurrent callers, each index exactly once.
#[derive(Debug)]
pub struct WorkCursor {
    next: AtomicUsize,
    len: usize,
}

impl WorkCursor {
    pub fn new(len: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            len,
        }
    }

    /// Claims the next unclaimed index, `None` once the input is exhausted.
    pub fn claim(&self) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        (index < self.len).then_some(index)
    }

    /// Number of indices handed out so far.
    pub fn claimed(&self) -> usize {
        self.next.load(Ordering::Relaxed).min(self.len)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, thread};

    use super::WorkCursor;

    #[test]
    fn test_claims_every_index_once() {
        let cursor = WorkCursor::new(3);
        assert_eq!(cursor.claim(), Some(0));
        assert_eq!(cursor.claim(), Some(1));
        assert_eq!(cursor.claim(), Some(2));
        assert_eq!(cursor.claim(), None);
        assert_eq!(cursor.claim(), None);
        assert_eq!(cursor.claimed(), 3);
    }

    #[test]
    fn test_empty_cursor() {
        let cursor = WorkCursor::new(0);
        assert!(cursor.is_empty());
        assert_eq!(cursor.claim(), None);
        assert_eq!(cursor.claimed(), 0);
    }

    #[test]
    fn test_concurrent_claims_partition_input() {
        let cursor = WorkCursor::new(10_000);

        let claimed = thread::scope(|s| {
            let handles = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let mut mine = vec![];
                        while let Some(index) = cursor.claim() {
                            mine.push(index);
                        }
                        mine
                    })
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(claimed.len(), 10_000);
        assert_eq!(claimed.iter().collect::<HashSet<_>>().len(), 10_000);
    }
}
