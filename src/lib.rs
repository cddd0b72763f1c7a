// #![warn(missing_docs)]

//! Direction-of-arrival Source Localization
//!
//! Simulates narrowband sources observed by planar sensor arrays, estimates
//! their bearings with MUSIC and turns the bearings into 2D positions by
//! multilateration, line intersection or Kalman filtering.

#[allow(missing_docs)]
pub mod error;

pub mod array;
pub mod bearing;
pub mod estimator;
pub mod filter;
pub mod geometry;
pub mod params;
pub mod scenario;
pub mod simulation;

pub use array::ArrayGeometry;
pub use bearing::Bearing;
pub use error::Error;
