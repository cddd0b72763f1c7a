use super::{
    Estimator,
    grid::AngleGrid,
    spectrum::{Peak, PeakCriteria, Pseudospectrum},
    subspace::Subspaces,
};
use crate::{array::ArrayGeometry, bearing::Bearing, error::Error, simulation::SampleCovariance};
use rayon::prelude::*;

/// Smallest noise projection norm used when inverting the spectrum.
const NORM_FLOOR: f64 = 1e-12;

/// Estimates the bearings of multiple sources with the MUSIC algorithm.
#[derive(Clone, Debug)]
pub struct Music {
    /// The number of sources assumed to be present.
    sources: usize,
    grid: AngleGrid,
    criteria: PeakCriteria,
}

/// The output of [`Music`].
#[derive(Clone, Debug)]
pub struct MusicEstimate {
    /// Estimated bearings sorted in ascending order.
    ///
    /// Holds fewer than the requested number of sources when fewer peaks
    /// were detected.
    pub bearings: Vec<Bearing>,

    /// Every peak that satisfied the detection criteria.
    pub peaks: Vec<Peak>,

    pub spectrum: Pseudospectrum,
}

impl Music {
    pub fn new(sources: usize, grid: AngleGrid) -> Self {
        Self {
            sources,
            grid,
            criteria: PeakCriteria::default(),
        }
    }

    pub fn with_criteria(mut self, criteria: PeakCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn sources(&self) -> usize {
        self.sources
    }

    pub fn grid(&self) -> &AngleGrid {
        &self.grid
    }

    /// Evaluates `1 / |En^H a(theta)|` at every angle of the grid.
    pub fn pseudospectrum(
        &self,
        covariance: &SampleCovariance,
        geometry: &ArrayGeometry,
    ) -> Result<Pseudospectrum, Error> {
        if covariance.elements() != geometry.len() {
            let matrix = covariance.as_matrix();
            return Err(Error::CovarianceShape {
                elements: geometry.len(),
                rows: matrix.nrows(),
                cols: matrix.ncols(),
            });
        }

        let subspaces = Subspaces::partition(covariance, self.sources)?;
        let values: Vec<f64> = self
            .grid
            .angles()
            .par_iter()
            .map(|&angle| {
                let response = geometry.response_vector(Bearing::from_radians(angle));
                let norm = subspaces.noise_projection_norm(&response);
                match norm.is_finite() {
                    true => 1.0 / norm.max(NORM_FLOOR),
                    false => f64::NAN,
                }
            })
            .collect();

        Pseudospectrum::new(self.grid.clone(), values)
    }
}

impl Estimator for Music {
    type Output = MusicEstimate;

    fn estimate(
        &self,
        covariance: &SampleCovariance,
        geometry: &ArrayGeometry,
    ) -> Result<Self::Output, Error> {
        let spectrum = self.pseudospectrum(covariance, geometry)?;
        let peaks = spectrum.peaks(&self.criteria);

        let bearings = match self.sources {
            // A single source is the global maximum, whatever its level.
            1 => vec![spectrum.max_peak().bearing],
            sources => {
                let mut bearings: Vec<Bearing> = peaks.iter().map(|peak| peak.bearing).collect();
                bearings.sort_by(|a, b| a.radians().total_cmp(&b.radians()));
                bearings.truncate(sources);
                bearings
            }
        };

        tracing::trace!(
            sources = self.sources,
            detected = peaks.len(),
            "music estimate"
        );

        Ok(MusicEstimate {
            bearings,
            peaks,
            spectrum,
        })
    }
}
