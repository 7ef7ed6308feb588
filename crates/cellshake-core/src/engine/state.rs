use std::ops::AddAssign;

/// Attempt and acceptance counts of one kind of trial move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveStatistics {
    pub attempted: u64,
    pub accepted: u64,
}

impl MoveStatistics {
    pub fn record(&mut self, accepted: bool) {
        self.attempted += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Fraction of attempts that were accepted, or zero without attempts.
    pub fn acceptance_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }
}

impl AddAssign for MoveStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.attempted += rhs.attempted;
        self.accepted += rhs.accepted;
    }
}

/// Summary of a completed shake stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShakeReport {
    pub translations: MoveStatistics,
    pub rotations: MoveStatistics,
    /// Sum of accepted energy changes, in kJ/mol.
    pub energy_delta: f64,
    /// Step sizes after adaptation.
    pub translation_step: f64,
    pub rotation_step: f64,
    pub n_objects: usize,
    pub n_unavailable_instances: usize,
    pub n_change_broadcasts: usize,
}

impl ShakeReport {
    pub fn n_accepted(&self) -> u64 {
        self.translations.accepted + self.rotations.accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_track_rate() {
        let mut stats = MoveStatistics::default();
        assert_eq!(stats.acceptance_rate(), 0.0);
        stats.record(true);
        stats.record(false);
        stats.record(false);
        stats.record(true);
        assert_eq!(stats.attempted, 4);
        assert_eq!(stats.acceptance_rate(), 0.5);

        stats += MoveStatistics {
            attempted: 4,
            accepted: 0,
        };
        assert_eq!(stats.acceptance_rate(), 0.25);
    }
}
