use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out row ids. Ids taken by rolled-back transactions are not reused.
#[derive(Debug)]
pub struct IdSequence {
    next: AtomicU64,
}

impl IdSequence {
    /// A sequence whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.max(1)),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// One sequence per table the engine inserts into.
#[derive(Debug, Default)]
pub struct Sequences {
    pub rentals: IdSequence,
    pub fees: IdSequence,
    pub invoices: IdSequence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let seq = IdSequence::default();
        assert_eq!(seq.next_id(), 1);
        assert_eq!(seq.next_id(), 2);

        let resumed = IdSequence::starting_at(42);
        assert_eq!(resumed.next_id(), 42);
    }

    #[test]
    fn test_zero_is_never_handed_out() {
        let seq = IdSequence::starting_at(0);
        assert_eq!(seq.next_id(), 1);
    }
}
