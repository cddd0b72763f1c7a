mod grid;
mod music;
mod spectrum;
pub mod subspace;

use crate::{array::ArrayGeometry, error::Error, simulation::SampleCovariance};
pub use grid::AngleGrid;
pub use music::{Music, MusicEstimate};
pub use spectrum::{Peak, PeakCriteria, Pseudospectrum};

pub trait Estimator {
    type Output;
    fn estimate(
        &self,
        covariance: &SampleCovariance,
        geometry: &ArrayGeometry,
    ) -> Result<Self::Output, Error>;
}
