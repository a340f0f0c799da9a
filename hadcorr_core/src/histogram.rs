//! Fixed-binning histograms for job-lifetime diagnostics.
//!
//! Bin numbering follows the usual convention: bin 0 is underflow, bins
//! 1..=n are in range, bin n+1 is overflow. 1D histograms are dense; 2D
//! histograms store only filled cells because most residual maps are
//! very large and nearly empty.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// AXIS
// =============================================================================

/// Uniform binning over [min, max).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub nbins: usize,
    pub min: f64,
    pub max: f64,
}

impl Axis {
    pub fn new(nbins: usize, min: f64, max: f64) -> Self {
        Self { nbins, min, max }
    }

    /// Bin width.
    pub fn width(&self) -> f64 {
        (self.max - self.min) / self.nbins as f64
    }

    /// Bin containing `x`, including under/overflow. `None` for NaN.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if x.is_nan() {
            return None;
        }
        if x < self.min {
            return Some(0);
        }
        if x >= self.max {
            return Some(self.nbins + 1);
        }
        let bin = ((x - self.min) / self.width()) as usize + 1;
        Some(bin.min(self.nbins))
    }

    /// Center of in-range bin `bin` (1-based).
    pub fn bin_center(&self, bin: usize) -> f64 {
        self.min + (bin as f64 - 0.5) * self.width()
    }

    /// Total number of cells including under/overflow.
    fn cells(&self) -> usize {
        self.nbins + 2
    }
}

/// Errors from combining histograms.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistogramError {
    #[error("Histogram {0} has incompatible binning")]
    IncompatibleBinning(String),
}

// =============================================================================
// 1D
// =============================================================================

/// One-dimensional histogram with optional per-bin sum of squared weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1D {
    pub name: String,
    pub title: String,
    pub axis: Axis,
    /// Bin contents, index = bin number (0 = underflow)
    contents: Vec<f64>,
    /// Sum of squared weights per bin, when enabled
    sumw2: Option<Vec<f64>>,
    /// Number of fill calls
    entries: u64,
    /// Σw·x and Σw over in-range fills (for the mean)
    sum_wx: f64,
    sum_w: f64,
}

impl Hist1D {
    pub fn new(name: &str, title: &str, nbins: usize, min: f64, max: f64) -> Self {
        let axis = Axis::new(nbins, min, max);
        Self {
            name: name.to_string(),
            title: title.to_string(),
            contents: vec![0.0; axis.cells()],
            sumw2: None,
            axis,
            entries: 0,
            sum_wx: 0.0,
            sum_w: 0.0,
        }
    }

    /// Enable storage of squared weights (for weighted-fill errors).
    pub fn with_sumw2(mut self) -> Self {
        self.sumw2 = Some(vec![0.0; self.axis.cells()]);
        self
    }

    /// Fill with unit weight.
    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    /// Fill with weight `w`. NaN coordinates are ignored.
    pub fn fill_weighted(&mut self, x: f64, w: f64) {
        let Some(bin) = self.axis.find_bin(x) else {
            return;
        };
        self.entries += 1;
        self.contents[bin] += w;
        if let Some(sumw2) = self.sumw2.as_mut() {
            sumw2[bin] += w * w;
        }
        if (1..=self.axis.nbins).contains(&bin) {
            self.sum_wx += w * x;
            self.sum_w += w;
        }
    }

    /// Content of bin `bin` (0 = underflow, n+1 = overflow).
    pub fn bin_content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }

    /// Statistical error of bin `bin`.
    pub fn bin_error(&self, bin: usize) -> f64 {
        match &self.sumw2 {
            Some(sumw2) => sumw2.get(bin).copied().unwrap_or(0.0).sqrt(),
            None => self.bin_content(bin).abs().sqrt(),
        }
    }

    /// Content of the bin containing `x`.
    pub fn content_at(&self, x: f64) -> f64 {
        self.axis.find_bin(x).map_or(0.0, |bin| self.bin_content(bin))
    }

    pub fn underflow(&self) -> f64 {
        self.contents[0]
    }

    pub fn overflow(&self) -> f64 {
        self.contents[self.axis.nbins + 1]
    }

    /// Sum of in-range contents.
    pub fn integral(&self) -> f64 {
        self.contents[1..=self.axis.nbins].iter().sum()
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Weighted mean of in-range fills.
    pub fn mean(&self) -> f64 {
        if self.sum_w != 0.0 {
            self.sum_wx / self.sum_w
        } else {
            0.0
        }
    }

    pub fn has_sumw2(&self) -> bool {
        self.sumw2.is_some()
    }

    /// Add another histogram with identical binning.
    pub fn merge(&mut self, other: &Hist1D) -> Result<(), HistogramError> {
        if self.axis != other.axis {
            return Err(HistogramError::IncompatibleBinning(self.name.clone()));
        }
        for (a, b) in self.contents.iter_mut().zip(&other.contents) {
            *a += b;
        }
        match (self.sumw2.as_mut(), other.sumw2.as_ref()) {
            (Some(a), Some(b)) => {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
            }
            // Unweighted content doubles as its own sum of squares
            (Some(a), None) => {
                for (x, y) in a.iter_mut().zip(&other.contents) {
                    *x += y;
                }
            }
            _ => {}
        }
        self.entries += other.entries;
        self.sum_wx += other.sum_wx;
        self.sum_w += other.sum_w;
        Ok(())
    }
}

// =============================================================================
// 2D
// =============================================================================

/// Two-dimensional histogram with sparse cell storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist2D {
    pub name: String,
    pub title: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    /// Filled cells keyed by global bin `bx + (nx + 2) * by`
    cells: BTreeMap<usize, f64>,
    entries: u64,
}

impl Hist2D {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        title: &str,
        nx: usize,
        x_min: f64,
        x_max: f64,
        ny: usize,
        y_min: f64,
        y_max: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            x_axis: Axis::new(nx, x_min, x_max),
            y_axis: Axis::new(ny, y_min, y_max),
            cells: BTreeMap::new(),
            entries: 0,
        }
    }

    /// Global bin number for cell (bx, by).
    pub fn global_bin(&self, bx: usize, by: usize) -> usize {
        bx + self.x_axis.cells() * by
    }

    /// Fill with unit weight.
    pub fn fill(&mut self, x: f64, y: f64) {
        self.fill_weighted(x, y, 1.0);
    }

    /// Fill with weight `w`. NaN coordinates are ignored.
    pub fn fill_weighted(&mut self, x: f64, y: f64, w: f64) {
        let (Some(bx), Some(by)) = (self.x_axis.find_bin(x), self.y_axis.find_bin(y)) else {
            return;
        };
        let bin = self.global_bin(bx, by);
        *self.cells.entry(bin).or_insert(0.0) += w;
        self.entries += 1;
    }

    /// Content of cell (bx, by).
    pub fn bin_content(&self, bx: usize, by: usize) -> f64 {
        self.cells.get(&self.global_bin(bx, by)).copied().unwrap_or(0.0)
    }

    /// Content of the cell containing (x, y).
    pub fn content_at(&self, x: f64, y: f64) -> f64 {
        match (self.x_axis.find_bin(x), self.y_axis.find_bin(y)) {
            (Some(bx), Some(by)) => self.bin_content(bx, by),
            _ => 0.0,
        }
    }

    /// Sum of in-range contents.
    pub fn integral(&self) -> f64 {
        let nx = self.x_axis.nbins;
        let ny = self.y_axis.nbins;
        let stride = self.x_axis.cells();
        self.cells
            .iter()
            .filter(|(bin, _)| {
                let (bx, by) = (**bin % stride, **bin / stride);
                (1..=nx).contains(&bx) && (1..=ny).contains(&by)
            })
            .map(|(_, w)| w)
            .sum()
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Number of non-empty cells.
    pub fn filled_cells(&self) -> usize {
        self.cells.len()
    }

    /// Add another histogram with identical binning.
    pub fn merge(&mut self, other: &Hist2D) -> Result<(), HistogramError> {
        if self.x_axis != other.x_axis || self.y_axis != other.y_axis {
            return Err(HistogramError::IncompatibleBinning(self.name.clone()));
        }
        for (&bin, &w) in &other.cells {
            *self.cells.entry(bin).or_insert(0.0) += w;
        }
        self.entries += other.entries;
        Ok(())
    }
}

// =============================================================================
// NAMED OUTPUT LIST
// =============================================================================

/// Either histogram kind, for the named output list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Histogram {
    H1(Hist1D),
    H2(Hist2D),
}

impl Histogram {
    pub fn name(&self) -> &str {
        match self {
            Histogram::H1(h) => &h.name,
            Histogram::H2(h) => &h.name,
        }
    }

    pub fn entries(&self) -> u64 {
        match self {
            Histogram::H1(h) => h.entries(),
            Histogram::H2(h) => h.entries(),
        }
    }
}

/// Ordered, named collection of produced histograms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramList {
    pub histograms: Vec<Histogram>,
}

impl HistogramList {
    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.histograms.iter().find(|h| h.name() == name)
    }

    pub fn h1(&self, name: &str) -> Option<&Hist1D> {
        match self.get(name)? {
            Histogram::H1(h) => Some(h),
            Histogram::H2(_) => None,
        }
    }

    pub fn h2(&self, name: &str) -> Option<&Hist2D> {
        match self.get(name)? {
            Histogram::H2(h) => Some(h),
            Histogram::H1(_) => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.histograms.iter().map(Histogram::name)
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
