use crate::{array::ArrayGeometry, bearing::Bearing, error::Error};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::TAU;

/// A narrowband plane-wave emitter seen by an array.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalSource {
    pub bearing: Bearing,
    pub amplitude: Complex64,
}

impl SignalSource {
    pub fn new(bearing: Bearing, amplitude: Complex64) -> Self {
        Self { bearing, amplitude }
    }
}

/// Draws a circularly-symmetric complex Gaussian amplitude with unit power.
pub fn random_amplitude<R: Rng + ?Sized>(rng: &mut R) -> Complex64 {
    let re: f64 = rng.sample(StandardNormal);
    let im: f64 = rng.sample(StandardNormal);
    Complex64::new(re, im) * 0.5f64.sqrt()
}

/// An unnormalized sample covariance `H * H^H` of array snapshots.
///
/// The matrix is not divided by the snapshot count. Eigenvector directions
/// are unaffected, only the absolute eigenvalue scale.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleCovariance {
    inner: DMatrix<Complex64>,
    snapshots: usize,
}

impl SampleCovariance {
    /// Wraps an existing matrix, eg. one computed from recorded data.
    ///
    /// Returns an error if `inner` is not square or is empty.
    pub fn from_matrix(inner: DMatrix<Complex64>, snapshots: usize) -> Result<Self, Error> {
        if inner.nrows() != inner.ncols() {
            return Err(Error::CovarianceShape {
                elements: inner.nrows(),
                rows: inner.nrows(),
                cols: inner.ncols(),
            });
        }

        if inner.is_empty() {
            return Err(Error::EmptyArray);
        }

        Ok(Self { inner, snapshots })
    }

    /// Builds the covariance of the snapshot matrix `snapshots` (one column per snapshot).
    pub fn from_snapshots(snapshots: &DMatrix<Complex64>) -> Result<Self, Error> {
        Self::from_matrix(snapshots * snapshots.adjoint(), snapshots.ncols())
    }

    pub fn as_matrix(&self) -> &DMatrix<Complex64> {
        &self.inner
    }

    pub fn into_inner(self) -> DMatrix<Complex64> {
        self.inner
    }

    /// The number of elements of the array that produced the covariance.
    pub fn elements(&self) -> usize {
        self.inner.nrows()
    }

    pub fn snapshots(&self) -> usize {
        self.snapshots
    }
}

/// Generates synthetic snapshots for an array and reduces them to a covariance.
pub struct ArraySimulator<'a> {
    geometry: &'a ArrayGeometry,
    snr: f64,
    snapshots: usize,
}

impl<'a> ArraySimulator<'a> {
    /// Creates a new `ArraySimulator`.
    ///
    /// `snr` is a linear power ratio. An infinite `snr` simulates noise-free
    /// snapshots. Returns an error if `snr` is not positive or `snapshots` is zero.
    pub fn try_new(geometry: &'a ArrayGeometry, snr: f64, snapshots: usize) -> Result<Self, Error> {
        // Also rejects NaN.
        if !(snr > 0.0) {
            return Err(Error::InvalidSnr { snr });
        }

        if snapshots == 0 {
            return Err(Error::NoSnapshots);
        }

        Ok(Self {
            geometry,
            snr,
            snapshots,
        })
    }

    pub fn geometry(&self) -> &ArrayGeometry {
        self.geometry
    }

    /// Standard deviation of each real noise component.
    fn noise_scale(&self) -> f64 {
        (0.5 / self.snr).sqrt()
    }

    /// Simulates a single snapshot of the array.
    ///
    /// Draws one uniform phase per source, in order, followed by the real
    /// then imaginary parts of the noise for every element.
    pub fn snapshot<R: Rng + ?Sized>(
        &self,
        sources: &[SignalSource],
        responses: &[DVector<Complex64>],
        rng: &mut R,
    ) -> DVector<Complex64> {
        let n = self.geometry.len();
        let mut snapshot = DVector::<Complex64>::zeros(n);
        for (source, response) in sources.iter().zip(responses) {
            let phase = Complex64::from_polar(1.0, TAU * rng.random::<f64>());
            snapshot += response * (phase * source.amplitude);
        }

        let scale = self.noise_scale();
        let re: Vec<f64> = (0..n).map(|_| rng.sample(StandardNormal)).collect();
        let im: Vec<f64> = (0..n).map(|_| rng.sample(StandardNormal)).collect();
        for (value, (re, im)) in snapshot.iter_mut().zip(re.into_iter().zip(im)) {
            *value += Complex64::new(re, im) * scale;
        }

        snapshot
    }

    /// Simulates `snapshots` snapshots from `sources` and returns their
    /// unnormalized sample covariance.
    pub fn simulate_covariance<R: Rng + ?Sized>(
        &self,
        sources: &[SignalSource],
        rng: &mut R,
    ) -> SampleCovariance {
        let responses: Vec<_> = sources
            .iter()
            .map(|source| self.geometry.response_vector(source.bearing))
            .collect();

        let columns: Vec<_> = (0..self.snapshots)
            .map(|_| self.snapshot(sources, &responses, rng))
            .collect();
        let h = DMatrix::from_columns(&columns);

        SampleCovariance {
            inner: &h * h.adjoint(),
            snapshots: self.snapshots,
        }
    }
}

/// Simulates a covariance for sources at `bearings` with matching `amplitudes`.
pub fn simulate_covariance<R: Rng + ?Sized>(
    geometry: &ArrayGeometry,
    bearings: &[Bearing],
    amplitudes: &[Complex64],
    snr: f64,
    snapshots: usize,
    rng: &mut R,
) -> Result<SampleCovariance, Error> {
    if bearings.len() != amplitudes.len() {
        return Err(Error::AmplitudeMismatch {
            bearings: bearings.len(),
            amplitudes: amplitudes.len(),
        });
    }

    let sources: Vec<_> = bearings
        .iter()
        .zip(amplitudes)
        .map(|(bearing, amplitude)| SignalSource::new(*bearing, *amplitude))
        .collect();

    Ok(ArraySimulator::try_new(geometry, snr, snapshots)?.simulate_covariance(&sources, rng))
}
