//! Seeded cell-state buffers and the two-phase cycle that alternates them
//!
//! There is no update rule: both buffers are filled once at startup and the
//! renderer simply swaps which one it binds on every timer tick.

/// Seed where every third cell, starting at index 0, is active
pub fn seed_every_third(count: usize) -> Vec<u32> {
    (0..count).map(|i| (i % 3 == 0) as u32).collect()
}

/// Seed where every odd-indexed cell is active
pub fn seed_odd(count: usize) -> Vec<u32> {
    (0..count).map(|i| (i % 2) as u32).collect()
}

/// The two pre-seeded cell-state snapshots, one `u32` (0 or 1) per cell
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellStates {
    pub a: Vec<u32>,
    pub b: Vec<u32>,
}

impl CellStates {
    pub fn seeded(grid_size: u32) -> Self {
        let count = grid_size as usize * grid_size as usize;
        Self {
            a: seed_every_third(count),
            b: seed_odd(count),
        }
    }

    pub fn get(&self, phase: StatePhase) -> &[u32] {
        match phase {
            StatePhase::A => &self.a,
            StatePhase::B => &self.b,
        }
    }
}

/// Which of the two state buffers is bound for drawing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatePhase {
    A,
    B,
}

impl StatePhase {
    pub fn for_step(step: u64) -> Self {
        if step % 2 == 0 {
            StatePhase::A
        } else {
            StatePhase::B
        }
    }

    /// Slot of this phase's bind group
    pub fn index(self) -> usize {
        match self {
            StatePhase::A => 0,
            StatePhase::B => 1,
        }
    }
}

/// Step counter driving the A/B alternation
///
/// Starts at step 0 (phase A) and advances by one on every tick, forever.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateCycle {
    step: u64,
}

impl StateCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn phase(&self) -> StatePhase {
        StatePhase::for_step(self.step)
    }

    /// Move to the next step and return the phase to draw with
    pub fn advance(&mut self) -> StatePhase {
        self.step = self.step.wrapping_add(1);
        self.phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_a_activates_every_third_cell() {
        let states = CellStates::seeded(32);
        assert_eq!(states.a.len(), 32 * 32);
        for (i, &cell) in states.a.iter().enumerate() {
            assert_eq!(cell == 1, i % 3 == 0, "cell {i}");
            assert!(cell <= 1);
        }
    }

    #[test]
    fn buffer_b_activates_odd_cells() {
        let states = CellStates::seeded(7);
        assert_eq!(states.b.len(), 49);
        for (i, &cell) in states.b.iter().enumerate() {
            assert_eq!(cell == 1, i % 2 == 1, "cell {i}");
        }
    }

    #[test]
    fn seeds_start_as_expected() {
        assert_eq!(seed_every_third(7), vec![1, 0, 0, 1, 0, 0, 1]);
        assert_eq!(seed_odd(5), vec![0, 1, 0, 1, 0]);
        assert!(seed_odd(0).is_empty());
    }

    #[test]
    fn phase_selects_buffer() {
        let states = CellStates::seeded(2);
        assert_eq!(states.get(StatePhase::A), &[1, 0, 0, 1]);
        assert_eq!(states.get(StatePhase::B), &[0, 1, 0, 1]);
    }

    #[test]
    fn first_tick_switches_to_b() {
        let mut cycle = StateCycle::new();
        assert_eq!(cycle.phase(), StatePhase::A);
        assert_eq!(cycle.advance(), StatePhase::B);
        assert_eq!(cycle.step(), 1);
    }

    #[test]
    fn ticks_alternate_by_parity() {
        let mut cycle = StateCycle::new();
        for t in 1..=100u64 {
            let phase = cycle.advance();
            let expected = if t % 2 == 0 {
                StatePhase::A
            } else {
                StatePhase::B
            };
            assert_eq!(phase, expected, "tick {t}");
            assert_eq!(phase.index(), (t % 2) as usize);
        }
    }
}
