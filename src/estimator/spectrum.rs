use super::grid::AngleGrid;
use crate::{bearing::Bearing, error::Error};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Thresholds applied to the log-scale spectrum when extracting peaks.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakCriteria {
    /// Minimum log-scale level of a peak.
    pub min_height: f64,

    /// Minimum separation between two peaks in grid samples.
    ///
    /// When two peaks are closer, the lower one is dropped.
    pub min_distance: f64,

    /// Minimum height of a peak above the higher of its two surrounding bases.
    pub min_prominence: Option<f64>,
}

impl Default for PeakCriteria {
    fn default() -> Self {
        Self {
            min_height: 1.35,
            min_distance: 1.5,
            min_prominence: None,
        }
    }
}

/// A local maximum of a [`Pseudospectrum`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    /// Index of the peak in the angle grid.
    pub index: usize,
    pub bearing: Bearing,
    /// Log-scale level of the peak.
    pub level: f64,
}

/// A spectral estimate evaluated over an [`AngleGrid`].
#[derive(Clone, Debug, PartialEq)]
pub struct Pseudospectrum {
    grid: AngleGrid,
    values: Vec<f64>,
}

impl Pseudospectrum {
    /// Creates a new `Pseudospectrum` with one value per grid angle.
    ///
    /// Returns an error if the lengths differ or any value is not finite and positive.
    pub fn new(grid: AngleGrid, values: Vec<f64>) -> Result<Self, Error> {
        if grid.len() != values.len() {
            return Err(Error::SpectrumLength {
                angles: grid.len(),
                values: values.len(),
            });
        }

        if values.iter().any(|value| !value.is_finite() || *value <= 0.0) {
            return Err(Error::NonFiniteSpectrum);
        }

        Ok(Self { grid, values })
    }

    pub fn grid(&self) -> &AngleGrid {
        &self.grid
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The spectrum as `log10(10 * P / min(P))`.
    ///
    /// The minimum of the spectrum maps to 1.
    pub fn log_scale(&self) -> Vec<f64> {
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        self.values
            .iter()
            .map(|value| (10.0 * value / min).log10())
            .collect()
    }

    /// The global maximum of the spectrum.
    ///
    /// Ties resolve to the lowest index.
    pub fn max_peak(&self) -> Peak {
        let levels = self.log_scale();
        let index = argmax(&levels);
        self.peak(index, &levels)
    }

    /// Extracts the peaks of the log-scale spectrum that satisfy `criteria`,
    /// ordered by grid index.
    pub fn peaks(&self, criteria: &PeakCriteria) -> Vec<Peak> {
        let levels = self.log_scale();
        let n = levels.len();

        // A circular grid is unrolled to start and end on its global minimum so
        // that no peak can sit on an edge.
        let (sequence, offset) = match self.grid.is_circular() {
            true => {
                let start = argmin(&levels);
                let unrolled: Vec<f64> = (0..=n).map(|i| levels[(start + i) % n]).collect();
                (unrolled, start)
            }
            false => (levels.clone(), 0),
        };

        let candidates: Vec<usize> = local_maxima(&sequence)
            .into_iter()
            .filter(|&i| sequence[i] >= criteria.min_height)
            .filter(|&i| {
                criteria
                    .min_prominence
                    .is_none_or(|min| prominence(&sequence, i) >= min)
            })
            .map(|i| (i + offset) % n)
            .collect();

        select_by_distance(
            candidates,
            &levels,
            criteria.min_distance,
            self.grid.is_circular(),
        )
        .into_iter()
        .map(|index| self.peak(index, &levels))
        .collect()
    }

    fn peak(&self, index: usize, levels: &[f64]) -> Peak {
        Peak {
            index,
            bearing: Bearing::from_radians(self.grid.angles()[index]),
            level: levels[index],
        }
    }
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &value)| match value > best.1 {
            true => (i, value),
            false => best,
        })
        .0
}

fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, &value)| match value < best.1 {
            true => (i, value),
            false => best,
        })
        .0
}

/// Indices of the interior local maxima of `x`.
///
/// A flat peak is reported at the middle of its plateau.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    let last = x.len().saturating_sub(1);
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }

            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Height of the peak at `index` above the higher of its two bases.
///
/// A base is the minimum of `x` between the peak and the first higher sample
/// (or the edge) on that side.
fn prominence(x: &[f64], index: usize) -> f64 {
    let level = x[index];
    let left = base(x[..index].iter().rev(), level);
    let right = base(x[index + 1..].iter(), level);
    level - left.max(right)
}

fn base<'a>(side: impl Iterator<Item = &'a f64>, level: f64) -> f64 {
    side.take_while(|&&value| value <= level)
        .fold(level, |min, &value| min.min(value))
}

/// Keeps the highest peaks such that no two kept peaks are closer than
/// `min_distance` samples. Returns the kept indices in ascending order.
fn select_by_distance(
    mut candidates: Vec<usize>,
    levels: &[f64],
    min_distance: f64,
    circular: bool,
) -> Vec<usize> {
    let n = levels.len();
    let distance = min_distance.max(1.0).ceil() as usize;
    candidates.sort_by(|&a, &b| levels[b].partial_cmp(&levels[a]).unwrap_or(Ordering::Equal));

    let mut kept: Vec<usize> = Vec::with_capacity(candidates.len());
    for index in candidates {
        let separated = kept.iter().all(|&other| {
            let gap = index.abs_diff(other);
            let gap = match circular {
                true => gap.min(n - gap),
                false => gap,
            };
            gap >= distance
        });

        if separated {
            kept.push(index);
        }
    }

    kept.sort_unstable();
    kept
}
