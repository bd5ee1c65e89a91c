//! Innovation numbering for connection genes.
//!
//! Every connection carries an innovation number recording the order in which
//! it appeared. Initial genomes number their seeded connections sequentially
//! from zero; the counter is the single place that hands those numbers out so a
//! future structural mutation can keep numbering where construction stopped.

use serde::{Deserialize, Serialize};

use crate::gene::ConnectionGene;

/// Sequential source of innovation numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnovationCounter {
    next: u64,
}

impl InnovationCounter {
    /// A counter whose first number is 0.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// A counter that continues after the highest innovation among `connections`.
    #[must_use]
    pub fn after<'a, I>(connections: I) -> Self
    where
        I: IntoIterator<Item = &'a ConnectionGene>,
    {
        let next = connections
            .into_iter()
            .map(|c| c.innovation.saturating_add(1))
            .max()
            .unwrap_or(0);
        Self { next }
    }

    /// Hand out the next innovation number.
    #[inline]
    pub fn next_innovation(&mut self) -> u64 {
        let innovation = self.next;
        self.next += 1;
        innovation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::NodeId;

    #[test]
    fn test_counter_starts_at_zero() {
        let mut counter = InnovationCounter::new();
        assert_eq!(counter.next_innovation(), 0);
        assert_eq!(counter.next_innovation(), 1);
        assert_eq!(counter.next_innovation(), 2);
        assert_eq!(counter.next_innovation(), 3);
    }

    #[test]
    fn test_counter_after_existing() {
        let conns = [
            ConnectionGene::new(NodeId(0), NodeId(2), 0.1, 4),
            ConnectionGene::new(NodeId(1), NodeId(2), 0.2, 9),
        ];
        let mut counter = InnovationCounter::after(&conns);
        assert_eq!(counter.next_innovation(), 10);
    }

    #[test]
    fn test_counter_after_empty() {
        let mut counter = InnovationCounter::after(&Vec::<ConnectionGene>::new());
        assert_eq!(counter.next_innovation(), 0);
    }
}
