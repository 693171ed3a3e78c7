//! Deterministic synthetic order flow.

use meridian_core::Command;

/// Reference price the synthetic book trades around, in ticks.
pub const MID_PRICE: u64 = 10_000;

const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;
/// Stand-in state for the one seed that mixes to zero.
const ZERO_STATE: u64 = 0x2545_F491_4F6C_DD1D;

/// Generates a reproducible mix of passive orders, aggressive orders and
/// cancels from a seed.
///
/// Roughly 70% passive limit orders a few ticks away from the mid, 20%
/// orders priced through the opposite side and 10% cancels of earlier
/// orders. Cancels may target orders that already traded away; those are
/// rejected by the engine like any other unknown id.
pub struct OrderGenerator {
    state: u64,
    issued: u64,
    owners: u64,
}

impl OrderGenerator {
    pub fn new(seed: u64) -> Self {
        // xorshift must not start at zero
        let state = match seed ^ SEED_MIX {
            0 => ZERO_STATE,
            mixed => mixed,
        };
        Self { state, issued: 0, owners: 16 }
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    pub fn next_command(&mut self) -> Command {
        let roll = self.next_u64() % 10;
        if roll == 9 && self.issued > 0 {
            let target = 1 + self.next_u64() % self.issued;
            return Command::cancel(target);
        }

        let offset = 1 + self.next_u64() % 20;
        let quantity = 1 + self.next_u64() % 100;
        let owner = 1 + self.next_u64() % self.owners;
        let buy = self.next_u64() & 1 == 0;
        let aggressive = roll >= 7;
        self.issued += 1;

        match (buy, aggressive) {
            (true, false) => Command::buy(MID_PRICE - offset, quantity, owner),
            (true, true) => Command::buy(MID_PRICE + offset, quantity, owner),
            (false, false) => Command::sell(MID_PRICE + offset, quantity, owner),
            (false, true) => Command::sell(MID_PRICE - offset, quantity, owner),
        }
    }

    /// Generate `count` commands.
    pub fn generate(&mut self, count: usize) -> Vec<Command> {
        (0..count).map(|_| self.next_command()).collect()
    }
}
