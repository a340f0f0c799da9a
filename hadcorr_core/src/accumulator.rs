//! The "ACCUMULATOR" - Job-Lifetime Diagnostics
//!
//! Owns every histogram the correction fills. Histograms are created once
//! per job, filled per event and handed out as a named `HistogramList` when
//! the job ends. Per-worker sets are combined with `HistogramSet::merge`.
//!
//! Fills indexed by a centrality, momentum or charge class silently skip
//! when the index is invalid, and ratio fills skip zero denominators.

use crate::binning::{
    momentum_bin, CentBin, ChargeClass, MatchCountClass, N_CENT_BINS, N_CHARGE_CLASSES,
    N_MATCH_CLASSES, N_MOM_BINS,
};
use crate::histogram::{Hist1D, Hist2D, Histogram, HistogramError, HistogramList};
use crate::kinematics::AngularOffset;
use std::array;

/// Centrality bins times charge classes.
const N_SHIFTED_CENT_BINS: usize = N_CENT_BINS * N_CHARGE_CLASSES;

// ============================================================================
// HISTOGRAM SET
// ============================================================================

/// All diagnostic histograms of one job (or one worker).
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSet {
    pub centrality: Hist1D,
    pub nclus_vs_cent: Hist1D,
    pub nclus_match_vs_cent: Hist1D,
    /// Centrality weighted by cluster energy before correction
    pub e_before: Hist1D,
    /// Centrality weighted by cluster energy after correction
    pub e_after: Hist1D,
    pub eop_cent: Hist2D,
    pub n_matches_cent: Hist2D,
    pub n_matches_cent_trk: Hist2D,
    /// (deta, dphi) residuals by charge-shifted centrality bin and momentum bin
    pub match_eta_phi: [[Hist2D; N_MOM_BINS]; N_SHIFTED_CENT_BINS],
    pub match_e_vs_p: [Hist2D; N_CENT_BINS],
    pub match_dr_vs_ep: [Hist2D; N_CENT_BINS],
    /// Summed track momentum weighted by the subtracted energy
    pub esub_pch: [[Hist1D; N_MATCH_CLASSES]; N_CENT_BINS],
    pub esub_pch_rat: [[Hist2D; N_MATCH_CLASSES]; N_CENT_BINS],
}

impl Default for HistogramSet {
    fn default() -> Self {
        Self::new()
    }
}

impl HistogramSet {
    pub fn new() -> Self {
        let cent_1d = |name: &str| Hist1D::new(name, name, 100, 0.0, 100.0);
        let n_matches = |name: &str| Hist2D::new(name, name, 100, 0.0, 100.0, 101, -0.5, 100.5);

        Self {
            centrality: cent_1d("Centrality"),
            nclus_vs_cent: cent_1d("NclusVsCent"),
            nclus_match_vs_cent: cent_1d("NclusMatchVsCent"),
            e_before: cent_1d("Ebefore"),
            e_after: cent_1d("Eafter"),
            eop_cent: Hist2D::new("EoPCent", "EoPCent", 100, 0.0, 100.0, 1000, 0.0, 10.0),
            n_matches_cent: n_matches("NMatchesCent"),
            n_matches_cent_trk: n_matches("NMatchesCentTrk"),
            match_eta_phi: array::from_fn(|c| {
                array::from_fn(|m| {
                    let name = format!("MatchEtaPhi_{}_{}", c, m);
                    Hist2D::new(&name, &name, 400, -0.2, 0.2, 1600, -0.8, 0.8)
                })
            }),
            match_e_vs_p: array::from_fn(|c| {
                let name = format!("MatchEvsP_{}", c);
                Hist2D::new(&name, &name, 400, 0.0, 200.0, 1000, 0.0, 10.0)
            }),
            match_dr_vs_ep: array::from_fn(|c| {
                let name = format!("MatchdRvsEP_{}", c);
                Hist2D::new(&name, &name, 1000, 0.0, 1.0, 1000, 0.0, 10.0)
            }),
            esub_pch: array::from_fn(|c| {
                array::from_fn(|k| {
                    let name = format!("EsubPch_{}_{}", c, k);
                    Hist1D::new(&name, &name, 400, 0.0, 100.0).with_sumw2()
                })
            }),
            esub_pch_rat: array::from_fn(|c| {
                array::from_fn(|k| {
                    let name = format!("EsubPchRat_{}_{}", c, k);
                    Hist2D::new(&name, &name, 400, 0.0, 200.0, 1000, 0.0, 10.0)
                })
            }),
        }
    }

    /// Add the contents of another set (e.g. a worker's partial result).
    pub fn merge(&mut self, other: &HistogramSet) -> Result<(), HistogramError> {
        self.centrality.merge(&other.centrality)?;
        self.nclus_vs_cent.merge(&other.nclus_vs_cent)?;
        self.nclus_match_vs_cent.merge(&other.nclus_match_vs_cent)?;
        self.e_before.merge(&other.e_before)?;
        self.e_after.merge(&other.e_after)?;
        self.eop_cent.merge(&other.eop_cent)?;
        self.n_matches_cent.merge(&other.n_matches_cent)?;
        self.n_matches_cent_trk.merge(&other.n_matches_cent_trk)?;

        for (mine, theirs) in self.match_eta_phi.iter_mut().zip(&other.match_eta_phi) {
            for (h, o) in mine.iter_mut().zip(theirs) {
                h.merge(o)?;
            }
        }
        for (h, o) in self.match_e_vs_p.iter_mut().zip(&other.match_e_vs_p) {
            h.merge(o)?;
        }
        for (h, o) in self.match_dr_vs_ep.iter_mut().zip(&other.match_dr_vs_ep) {
            h.merge(o)?;
        }
        for (mine, theirs) in self.esub_pch.iter_mut().zip(&other.esub_pch) {
            for (h, o) in mine.iter_mut().zip(theirs) {
                h.merge(o)?;
            }
        }
        for (mine, theirs) in self.esub_pch_rat.iter_mut().zip(&other.esub_pch_rat) {
            for (h, o) in mine.iter_mut().zip(theirs) {
                h.merge(o)?;
            }
        }
        Ok(())
    }

    /// Flatten into the named output list.
    ///
    /// Per-bin families come first, then the event-level summaries.
    pub fn into_list(self) -> HistogramList {
        let mut histograms = Vec::new();

        let mut e_vs_p = self.match_e_vs_p.into_iter();
        let mut dr_vs_ep = self.match_dr_vs_ep.into_iter();
        let mut esub = self.esub_pch.into_iter().zip(self.esub_pch_rat);

        for eta_phi in self.match_eta_phi {
            histograms.extend(eta_phi.into_iter().map(Histogram::H2));
            if let (Some(evp), Some(drep), Some((pch, rat))) = (e_vs_p.next(), dr_vs_ep.next(), esub.next()) {
                histograms.push(Histogram::H2(evp));
                histograms.push(Histogram::H2(drep));
                for (h1, h2) in pch.into_iter().zip(rat) {
                    histograms.push(Histogram::H1(h1));
                    histograms.push(Histogram::H2(h2));
                }
            }
        }

        histograms.extend([
            Histogram::H1(self.nclus_match_vs_cent),
            Histogram::H1(self.nclus_vs_cent),
            Histogram::H1(self.e_before),
            Histogram::H1(self.e_after),
            Histogram::H2(self.eop_cent),
            Histogram::H2(self.n_matches_cent),
            Histogram::H2(self.n_matches_cent_trk),
            Histogram::H1(self.centrality),
        ]);

        HistogramList { histograms }
    }
}

// ============================================================================
// ACCUMULATOR
// ============================================================================

/// Fills the histogram set according to the per-cluster fill rules.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    set: HistogramSet,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn histograms(&self) -> &HistogramSet {
        &self.set
    }

    pub fn into_histograms(self) -> HistogramSet {
        self.set
    }

    /// Once per accepted event.
    pub fn record_event(&mut self, cent: f64) {
        self.set.centrality.fill(cent);
    }

    /// Reverse pass: clusters inside the fixed window of one track.
    pub fn record_track_matches(&mut self, cent: f64, n_matches: usize) {
        self.set.n_matches_cent_trk.fill(cent, n_matches as f64);
    }

    /// Forward pass, before any correction.
    pub fn record_cluster(&mut self, cent: f64, energy: f64, n_matches: usize) {
        self.set.nclus_vs_cent.fill(cent);
        self.set.e_before.fill_weighted(cent, energy);
        self.set.n_matches_cent.fill(cent, n_matches as f64);
        if n_matches > 0 {
            self.set.nclus_match_vs_cent.fill(cent);
        }
    }

    /// Forward pass, after correction and flooring.
    pub fn record_corrected(&mut self, cent: f64, energy: f64) {
        self.set.e_after.fill_weighted(cent, energy);
    }

    /// Residual of one scanned track (subtract-all mode).
    ///
    /// Tracks with an invalid momentum bin are skipped entirely.
    pub fn record_residual(
        &mut self,
        cent_bin: CentBin,
        charge: ChargeClass,
        p: f64,
        offset: &AngularOffset,
        cluster_energy: f64,
    ) {
        let Some(mom_bin) = momentum_bin(p) else {
            return;
        };
        self.fill_eta_phi(cent_bin, charge, mom_bin, offset);
        if p > 0.0 {
            if let Some(h) = self.set.match_dr_vs_ep.get_mut(cent_bin) {
                h.fill(offset.dr(), cluster_energy / p);
            }
        }
    }

    /// Subtract-all diagnostics for one cluster with matched momentum.
    ///
    /// `esub` is the subtraction capped at the cluster energy. `EoPCent` is
    /// filled even when the event has no valid centrality bin.
    pub fn record_subtract_all(
        &mut self,
        cent: f64,
        cent_bin: Option<CentBin>,
        energy: f64,
        total_p: f64,
        n_matches: usize,
        esub: f64,
    ) {
        if !(total_p > 0.0) {
            return;
        }
        let eop = energy / total_p;
        self.set.eop_cent.fill(cent, eop);

        let Some(c) = cent_bin.filter(|&c| c < N_CENT_BINS) else {
            return;
        };
        self.set.match_e_vs_p[c].fill(energy, eop);

        let k = MatchCountClass::from_count(n_matches).index();
        self.set.esub_pch_rat[c][k].fill(total_p, esub / total_p);
        self.set.esub_pch[c][k].fill_weighted(total_p, esub);
    }

    /// Subtract-closest diagnostics for a cluster whose nearest track exists.
    #[allow(clippy::too_many_arguments)]
    pub fn record_closest(
        &mut self,
        cent: f64,
        cent_bin: Option<CentBin>,
        charge: ChargeClass,
        p: f64,
        offset: &AngularOffset,
        dr: f64,
        energy: f64,
    ) {
        if let (Some(c), Some(mom_bin)) = (cent_bin, momentum_bin(p)) {
            self.fill_eta_phi(c, charge, mom_bin, offset);
        }
        if !(p > 0.0) {
            return;
        }
        let eop = energy / p;
        self.set.eop_cent.fill(cent, eop);
        if let Some(c) = cent_bin.filter(|&c| c < N_CENT_BINS) {
            self.set.match_e_vs_p[c].fill(energy, eop);
            self.set.match_dr_vs_ep[c].fill(dr, eop);
        }
    }

    /// Out-of-range indices are ignored.
    fn fill_eta_phi(&mut self, cent_bin: CentBin, charge: ChargeClass, mom_bin: usize, offset: &AngularOffset) {
        if cent_bin >= N_CENT_BINS {
            return;
        }
        if let Some(h) = self
            .set
            .match_eta_phi
            .get_mut(charge.shift(cent_bin))
            .and_then(|row| row.get_mut(mom_bin))
        {
            h.fill(offset.deta, offset.dphi);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn offset(deta: f64, dphi: f64) -> AngularOffset {
        AngularOffset { deta, dphi }
    }

    #[test]
    fn test_set_names_and_count() {
        let list = HistogramSet::new().into_list();
        // 72 residual maps, 4 + 4 per-centrality maps, 12 + 12 subtraction maps, 8 summaries
        assert_eq!(list.len(), 72 + 8 + 24 + 8);
        assert!(list.h2("MatchEtaPhi_7_8").is_some());
        assert!(list.h2("MatchEvsP_3").is_some());
        assert!(list.h2("MatchdRvsEP_0").is_some());
        assert!(list.h1("EsubPch_2_1").unwrap().has_sumw2());
        assert!(list.h2("EsubPchRat_3_2").is_some());
        for name in ["Centrality", "NclusVsCent", "NclusMatchVsCent", "Ebefore", "Eafter"] {
            assert!(list.h1(name).is_some(), "{}", name);
        }
        for name in ["EoPCent", "NMatchesCent", "NMatchesCentTrk"] {
            assert!(list.h2(name).is_some(), "{}", name);
        }
        assert!(list.get("MatchEtaPhi_8_0").is_none());
    }

    #[test]
    fn test_record_cluster() {
        let mut acc = Accumulator::new();
        acc.record_cluster(5.0, 2.0, 0);
        acc.record_cluster(5.0, 3.0, 2);

        let set = acc.histograms();
        assert_relative_eq!(set.nclus_vs_cent.integral(), 2.0);
        assert_relative_eq!(set.nclus_match_vs_cent.integral(), 1.0);
        assert_relative_eq!(set.e_before.content_at(5.0), 5.0);
        assert_relative_eq!(set.n_matches_cent.content_at(5.0, 0.0), 1.0);
        assert_relative_eq!(set.n_matches_cent.content_at(5.0, 2.0), 1.0);
    }

    #[test]
    fn test_residual_charge_shift() {
        let mut acc = Accumulator::new();
        acc.record_residual(1, ChargeClass::Negative, 1.2, &offset(0.01, -0.02), 2.4);
        acc.record_residual(1, ChargeClass::Positive, 1.2, &offset(0.01, -0.02), 2.4);

        let set = acc.histograms();
        assert_eq!(set.match_eta_phi[5][2].entries(), 1);
        assert_eq!(set.match_eta_phi[1][2].entries(), 1);
        assert_relative_eq!(set.match_dr_vs_ep[1].content_at(0.0224, 2.4 / 1.2), 2.0);
    }

    #[test]
    fn test_residual_invalid_momentum_skipped() {
        let mut acc = Accumulator::new();
        acc.record_residual(0, ChargeClass::Positive, -1.0, &offset(0.0, 0.0), 1.0);
        acc.record_residual(0, ChargeClass::Positive, f64::NAN, &offset(0.0, 0.0), 1.0);

        let set = acc.histograms();
        assert!(set.match_eta_phi.iter().flatten().all(|h| h.entries() == 0));
        assert_eq!(set.match_dr_vs_ep[0].entries(), 0);
    }

    #[test]
    fn test_residual_zero_momentum_skips_ratio() {
        let mut acc = Accumulator::new();
        acc.record_residual(0, ChargeClass::Positive, 0.0, &offset(0.0, 0.0), 1.0);

        let set = acc.histograms();
        assert_eq!(set.match_eta_phi[0][0].entries(), 1);
        assert_eq!(set.match_dr_vs_ep[0].entries(), 0);
    }

    #[test]
    fn test_subtract_all_classes() {
        let mut acc = Accumulator::new();
        acc.record_subtract_all(5.0, Some(0), 2.0, 1.0, 1, 1.0);
        acc.record_subtract_all(5.0, Some(0), 2.0, 2.0, 2, 2.0);
        acc.record_subtract_all(5.0, Some(0), 2.0, 4.0, 5, 2.0);

        let set = acc.histograms();
        assert_relative_eq!(set.esub_pch[0][0].content_at(1.0), 1.0);
        assert_relative_eq!(set.esub_pch[0][1].content_at(2.0), 2.0);
        assert_relative_eq!(set.esub_pch[0][2].content_at(4.0), 2.0);
        assert_relative_eq!(set.esub_pch_rat[0][2].content_at(4.0, 0.5), 1.0);
        assert_eq!(set.eop_cent.entries(), 3);
        assert_eq!(set.match_e_vs_p[0].entries(), 3);
    }

    #[test]
    fn test_subtract_all_zero_momentum_skipped() {
        let mut acc = Accumulator::new();
        acc.record_subtract_all(5.0, Some(0), 2.0, 0.0, 0, 0.0);

        let set = acc.histograms();
        assert_eq!(set.eop_cent.entries(), 0);
        assert!(set.esub_pch.iter().flatten().all(|h| h.entries() == 0));
    }

    #[test]
    fn test_closest_fills() {
        let mut acc = Accumulator::new();
        acc.record_closest(5.0, Some(0), ChargeClass::Positive, 1.0, &offset(0.01, 0.0), 0.01, 2.0);

        let set = acc.histograms();
        assert_eq!(set.match_eta_phi[0][2].entries(), 1);
        assert_relative_eq!(set.match_e_vs_p[0].content_at(2.0, 2.0), 1.0);
        assert_relative_eq!(set.eop_cent.content_at(5.0, 2.0), 1.0);
        assert_relative_eq!(set.match_dr_vs_ep[0].content_at(0.01, 2.0), 1.0);
    }

    #[test]
    fn test_invalid_cent_bin_skipped() {
        let mut acc = Accumulator::new();
        acc.record_residual(N_CENT_BINS, ChargeClass::Negative, 1.0, &offset(0.0, 0.0), 1.0);
        acc.record_closest(150.0, None, ChargeClass::Positive, 1.0, &offset(0.0, 0.0), 0.0, 1.0);
        acc.record_subtract_all(150.0, None, 2.0, 1.0, 1, 1.0);

        let set = acc.histograms();
        assert!(set.match_eta_phi.iter().flatten().all(|h| h.entries() == 0));
        assert!(set.match_e_vs_p.iter().all(|h| h.entries() == 0));
        assert!(set.match_dr_vs_ep.iter().all(|h| h.entries() == 0));
        assert!(set.esub_pch.iter().flatten().all(|h| h.entries() == 0));

        // Not indexed by centrality class; lands in overflow
        assert_eq!(set.eop_cent.entries(), 2);
    }

    #[test]
    fn test_merge_sets() {
        let mut a = Accumulator::new();
        let mut b = Accumulator::new();
        a.record_event(5.0);
        b.record_event(15.0);
        b.record_residual(2, ChargeClass::Positive, 9.0, &offset(0.0, 0.0), 1.0);

        let mut merged = a.into_histograms();
        merged.merge(b.histograms()).unwrap();
        assert_eq!(merged.centrality.entries(), 2);
        assert_eq!(merged.match_eta_phi[2][8].entries(), 1);
    }
}
