//! Even/odd version helpers for optimistic concurrency control

use std::sync::atomic::{AtomicU64, Ordering};

/// Version counter using even/odd optimistic versioning
///
/// Writers move the version to an odd value before touching data and to the
/// next even value afterwards. Readers compare the version before and after
/// copying.
#[derive(Debug, Default)]
pub struct VersionCounter {
    counter: AtomicU64,
}

impl VersionCounter {
    /// Create a new version counter starting at 0 (even)
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current version with acquire ordering
    pub fn load(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Begin write operation - increment to odd version
    pub fn begin_write(&self) -> u64 {
        Self::advance(&self.counter)
    }

    /// Complete write operation - increment to even version
    pub fn end_write(&self) -> u64 {
        Self::advance(&self.counter)
    }

    /// Single-writer increment of a header version word
    pub fn advance(word: &AtomicU64) -> u64 {
        let next = word.load(Ordering::Acquire).wrapping_add(1);
        word.store(next, Ordering::Release);
        next
    }

    /// Check if version is stable (even)
    pub fn is_stable(version: u64) -> bool {
        version % 2 == 0
    }

    /// Check if version indicates write in progress (odd)
    pub fn is_writing(version: u64) -> bool {
        version % 2 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_cycle() {
        let counter = VersionCounter::new();
        assert_eq!(counter.load(), 0);

        let v1 = counter.begin_write();
        assert_eq!(v1, 1);
        assert!(VersionCounter::is_writing(v1));

        let v2 = counter.end_write();
        assert_eq!(v2, 2);
        assert!(VersionCounter::is_stable(v2));
    }

    #[test]
    fn test_advance_header_word() {
        let word = AtomicU64::new(40);
        assert_eq!(VersionCounter::advance(&word), 41);
        assert_eq!(VersionCounter::advance(&word), 42);
        assert!(VersionCounter::is_stable(word.load(Ordering::Relaxed)));
    }
}
