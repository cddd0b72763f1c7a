use crate::{error::Error, simulation::SampleCovariance};
use nalgebra::{DMatrix, DVector, linalg::SymmetricEigen};
use num_complex::Complex64;
use std::cmp::Ordering;

/// The eigendecomposition of a covariance split into signal and noise subspaces.
///
/// Eigenpairs are sorted by eigenvalue in descending order before the split:
/// the signal subspace holds the eigenvectors of the `L` largest eigenvalues
/// and the noise subspace holds the remaining `N - L`.
#[derive(Clone, Debug)]
pub struct Subspaces {
    eigenvalues: DVector<f64>,
    signal: DMatrix<Complex64>,
    noise: DMatrix<Complex64>,
}

impl Subspaces {
    /// Partitions `covariance` assuming `sources` signal sources.
    ///
    /// Returns an error if `sources` is zero or not less than the number of
    /// elements, or if the covariance is all-zero or non-finite.
    pub fn partition(covariance: &SampleCovariance, sources: usize) -> Result<Self, Error> {
        let matrix = covariance.as_matrix();
        let n = covariance.elements();
        if sources == 0 || sources >= n {
            return Err(Error::InvalidSourceCount {
                sources,
                elements: n,
            });
        }

        let scale = matrix.iter().map(|value| value.norm()).fold(0.0, f64::max);
        if !(scale > f64::MIN_POSITIVE) || matrix.iter().any(|value| !value.is_finite()) {
            return Err(Error::DegenerateCovariance);
        }

        let eigen = SymmetricEigen::new(matrix.clone());

        // The solver makes no promise about the order of its output.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(Ordering::Equal)
        });

        let eigenvalues = DVector::from_iterator(n, order.iter().map(|&i| eigen.eigenvalues[i]));
        let signal = DMatrix::from_fn(n, sources, |row, col| {
            eigen.eigenvectors[(row, order[col])]
        });
        let noise = DMatrix::from_fn(n, n - sources, |row, col| {
            eigen.eigenvectors[(row, order[sources + col])]
        });

        if eigenvalues.iter().any(|value| !value.is_finite()) {
            return Err(Error::DegenerateCovariance);
        }

        Ok(Self {
            eigenvalues,
            signal,
            noise,
        })
    }

    /// All eigenvalues in descending order.
    pub fn eigenvalues(&self) -> &DVector<f64> {
        &self.eigenvalues
    }

    /// The `N x L` signal subspace.
    pub fn signal(&self) -> &DMatrix<Complex64> {
        &self.signal
    }

    /// The `N x (N - L)` noise subspace.
    pub fn noise(&self) -> &DMatrix<Complex64> {
        &self.noise
    }

    /// The norm of the projection of `vector` onto the noise subspace.
    pub fn noise_projection_norm(&self, vector: &DVector<Complex64>) -> f64 {
        (self.noise.adjoint() * vector).norm()
    }
}
