//! Progress source consumed by the vault.
//!
//! The vault only ever reads block heights; advancing them is the job of
//! whoever hosts it (a node, a test, the demo harness).

use serde::{Deserialize, Serialize};

pub type Height = u64;

/// Monotonically non-decreasing progress counter.
pub trait ProgressSource {
    fn current(&self) -> Height;
}

/// Locally mined block counter.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockCounter {
    height: Height,
}

impl BlockCounter {
    pub fn new(height: Height) -> Self {
        Self { height }
    }

    pub fn height(&self) -> Height {
        self.height
    }

    /// Height at which the next transaction will be included.
    pub fn next_block(&self) -> Height {
        self.height.saturating_add(1)
    }

    /// Mines `blocks` empty blocks and returns the new tip.
    pub fn mine(&mut self, blocks: u64) -> Height {
        self.height = self.height.saturating_add(blocks);
        self.height
    }
}

impl ProgressSource for BlockCounter {
    fn current(&self) -> Height {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mining_only_moves_forward() {
        let mut chain = BlockCounter::new(10);
        assert_eq!(chain.next_block(), 11);
        assert_eq!(chain.mine(0), 10);
        assert_eq!(chain.mine(30), 40);
        assert_eq!(chain.current(), 40);

        let mut tip = BlockCounter::new(Height::MAX - 1);
        assert_eq!(tip.mine(5), Height::MAX);
        assert_eq!(tip.next_block(), Height::MAX);
    }
}
