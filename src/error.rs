use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("sensor array must contain at least one element")]
    EmptyArray,
    #[error("expected a finite, non-negative array radius but got: {radius}")]
    InvalidRadius { radius: f64 },
    #[error("expected a positive snr but got: {snr}")]
    InvalidSnr { snr: f64 },
    #[error("snapshot count must be greater than zero")]
    NoSnapshots,
    #[error("got {bearings} bearings but {amplitudes} amplitudes")]
    AmplitudeMismatch { bearings: usize, amplitudes: usize },
    #[error("expected a {elements}x{elements} covariance matrix but got {rows}x{cols}")]
    CovarianceShape {
        elements: usize,
        rows: usize,
        cols: usize,
    },
    #[error("source count must be in range [1, {elements}) but got: {sources}")]
    InvalidSourceCount { sources: usize, elements: usize },
    #[error("covariance matrix is zero or contains non-finite values")]
    DegenerateCovariance,
    #[error("pseudospectrum contains non-finite or non-positive values")]
    NonFiniteSpectrum,
    #[error("got {values} spectrum values for {angles} grid angles")]
    SpectrumLength { angles: usize, values: usize },
    #[error("angle grid requires at least 3 finite points but got {count} over [{start}, {stop}]")]
    InvalidGrid { start: f64, stop: f64, count: usize },
    #[error("at least two bearings are required but got: {count}")]
    InsufficientBearings { count: usize },
    #[error("pseudo-inverse failed: {reason}")]
    PseudoInverse { reason: &'static str },
    #[error("{name} must be a finite symmetric positive semi-definite matrix")]
    InvalidNoiseModel { name: &'static str },
    #[error("measurement contains non-finite values")]
    NonFiniteMeasurement,
    #[error("innovation covariance is singular")]
    SingularInnovation,
    #[error("filter update produced a non-finite state")]
    DegenerateUpdate,
    #[error("polygon requires at least 3 finite vertices but got: {count}")]
    InvalidPolygon { count: usize },
    #[error("no point inside the polygon after {attempts} attempts")]
    SamplingExhausted { attempts: usize },
}
