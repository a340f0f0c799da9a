//! Discrete binning used to index the diagnostic histograms.
//!
//! Every function here is total: out-of-range input yields `None` and the
//! caller skips the corresponding fill.

use hadcorr_env::AMBIGUOUS_CHARGE;

/// Number of centrality bins.
pub const N_CENT_BINS: usize = 4;

/// Number of momentum bins.
pub const N_MOM_BINS: usize = 9;

/// Number of charge classes.
pub const N_CHARGE_CLASSES: usize = 2;

/// Number of match-count classes used by the subtraction diagnostics.
pub const N_MATCH_CLASSES: usize = 3;

/// Lower edges of momentum bins 1..=8 in GeV/c (bin 0 starts at 0).
const MOM_EDGES: [f64; N_MOM_BINS - 1] = [0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 8.0];

/// Centrality class index in [0, 4).
pub type CentBin = usize;

/// Momentum class index in [0, 9).
pub type MomBin = usize;

/// Map a centrality percentile to its bin.
///
/// [0,10) → 0, [10,30) → 1, [30,50) → 2, [50,100] → 3.
pub fn centrality_bin(cent: f64) -> Option<CentBin> {
    if (0.0..10.0).contains(&cent) {
        Some(0)
    } else if (10.0..30.0).contains(&cent) {
        Some(1)
    } else if (30.0..50.0).contains(&cent) {
        Some(2)
    } else if (50.0..=100.0).contains(&cent) {
        Some(3)
    } else {
        None
    }
}

/// Map a momentum to its bin.
///
/// Half-GeV bins up to 2, unit bins up to 5, then [5,8) and [8,∞).
pub fn momentum_bin(p: f64) -> Option<MomBin> {
    if !(p >= 0.0) {
        return None;
    }
    Some(MOM_EDGES.iter().take_while(|&&edge| p >= edge).count())
}

/// Charge class used to split the angular residual maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChargeClass {
    Positive,
    /// Negative or ambiguous
    Negative,
}

impl ChargeClass {
    /// Classify a raw charge. The ambiguous sentinel counts as negative.
    pub fn from_raw(charge: i16) -> Self {
        if charge == -1 || charge == AMBIGUOUS_CHARGE {
            ChargeClass::Negative
        } else {
            ChargeClass::Positive
        }
    }
    
    /// Centrality index shifted into the negative-charge half of [0, 8).
    pub fn shift(&self, cent_bin: CentBin) -> usize {
        match self {
            ChargeClass::Positive => cent_bin,
            ChargeClass::Negative => cent_bin + N_CENT_BINS,
        }
    }
}

/// Number of tracks that contributed to a subtraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchCountClass {
    One,
    Two,
    ThreeOrMore,
}

impl MatchCountClass {
    pub fn from_count(n: usize) -> Self {
        match n {
            1 => MatchCountClass::One,
            2 => MatchCountClass::Two,
            _ => MatchCountClass::ThreeOrMore,
        }
    }
    
    pub fn index(&self) -> usize {
        match self {
            MatchCountClass::One => 0,
            MatchCountClass::Two => 1,
            MatchCountClass::ThreeOrMore => 2,
        }
    }
}
