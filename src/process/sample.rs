// src/process/sample.rs

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use tracing::warn;

/// Streaming decision for one visited row ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The ordinal matches the pending target: emit this row.
    Take,
    /// Not a target: discard and keep going.
    Skip,
    /// All targets consumed: the rest of the file can be skipped unread.
    Done,
}

/// A fixed-size without-replacement draw over row ordinals, consumed in a
/// single in-order streaming pass. Targets are kept sorted descending and
/// popped from the tail, so the pending target is always the smallest
/// remaining ordinal.
#[derive(Debug)]
pub struct SamplePlan {
    targets: Vec<u64>,
    pending: Option<u64>,
}

impl SamplePlan {
    /// Draw `sample_size` distinct ordinals uniformly from
    /// `[1, total_rows]`. A request larger than the file is clamped rather
    /// than rejected, since small early years are a normal case.
    pub fn draw(total_rows: u64, sample_size: u64, rng: &mut StdRng) -> Self {
        let amount = sample_size.min(total_rows);
        if amount < sample_size {
            warn!(
                total_rows,
                sample_size, "sample larger than file, clamping to every row"
            );
        }

        let mut targets: Vec<u64> = index::sample(rng, total_rows as usize, amount as usize)
            .into_iter()
            .map(|i| i as u64 + 1)
            .collect();
        targets.sort_unstable_by(|a, b| b.cmp(a));

        let mut plan = Self {
            targets,
            pending: None,
        };
        plan.advance();
        plan
    }

    fn advance(&mut self) {
        self.pending = self.targets.pop();
    }

    /// Visit the next row ordinal. Ordinals must be presented in strictly
    /// increasing order starting from 1.
    pub fn visit(&mut self, ordinal: u64) -> Verdict {
        match self.pending {
            None => Verdict::Done,
            Some(target) if target == ordinal => {
                self.advance();
                Verdict::Take
            }
            Some(_) => Verdict::Skip,
        }
    }

    /// Targets not yet consumed, the pending one included.
    pub fn remaining(&self) -> usize {
        self.targets.len() + usize::from(self.pending.is_some())
    }
}

/// Explicitly seeded draws are reproducible across runs; without a seed the
/// plan differs every run.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
