//! Hadronic correction of cluster energies.

use crate::config::CorrectionMode;
use crate::matching::MatchResult;

/// The closest track as far as the subtract-closest policy is concerned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestTrack {
    /// |p| of the track
    pub p: f64,
    /// Inside the matching window and passing the association gate
    pub eligible: bool,
}

/// Result of correcting one cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub energy_before: f64,
    /// Floored at zero
    pub energy_after: f64,
    /// Amount removed by the formula, before flooring
    pub subtracted: f64,
    /// Subtract-all diagnostic: `min(fraction × totalP, E)`, only with totalP > 0
    pub capped_subtraction: Option<f64>,
}

impl Correction {
    /// A cluster survives into the output only with strictly positive energy.
    pub fn emitted(&self) -> bool {
        self.energy_after > 0.0
    }
}

/// Applies the configured correction policy.
#[derive(Debug, Clone, Copy)]
pub struct Corrector {
    mode: CorrectionMode,
}

impl Corrector {
    pub fn new(mode: CorrectionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> CorrectionMode {
        self.mode
    }

    /// Correct `energy` given the cluster's match result.
    ///
    /// For subtract-all the energy arithmetic uses the uncapped
    /// `fraction × totalP`; only the reported `capped_subtraction` is limited
    /// to the cluster energy. The final floor at zero makes both agree on
    /// the output energy.
    pub fn apply(&self, energy: f64, result: &MatchResult, closest: Option<ClosestTrack>) -> Correction {
        let (subtracted, capped_subtraction) = match self.mode {
            CorrectionMode::Disabled => (0.0, None),
            CorrectionMode::SubtractAll { fraction } => {
                let esub = fraction * result.total_p;
                let capped = (result.total_p > 0.0).then(|| esub.min(energy));
                (esub, capped)
            }
            CorrectionMode::SubtractClosest { fraction } => match closest {
                Some(track) if track.eligible => (fraction * track.p, None),
                _ => (0.0, None),
            },
        };

        let mut energy_after = energy - subtracted;
        if energy_after < 0.0 {
            energy_after = 0.0;
        }

        Correction {
            energy_before: energy,
            energy_after,
            subtracted,
            capped_subtraction,
        }
    }
}
