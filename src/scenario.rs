use crate::{
    array::ArrayGeometry,
    bearing::Bearing,
    error::Error,
    estimator::{AngleGrid, Estimator, Music},
    filter::{
        BearingPairModel, ExtendedKalmanFilter, KalmanFilter, PositionEstimate, PositionFilter,
    },
    geometry::{BearingLine, line_intersection, multilaterate},
    params::ScenarioParams,
    simulation::{ArraySimulator, SignalSource, random_amplitude},
};
use nalgebra::{Matrix2, Point2};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};

/// Rejection sampling gives up after this many draws per point.
const MAX_SAMPLING_ATTEMPTS: usize = 10_000;

/// A simple polygon. The closing edge from the last vertex back to the
/// first is implied.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point2<f64>>,
}

impl Polygon {
    /// Returns an error if there are fewer than three vertices or any is not finite.
    pub fn try_new(vertices: Vec<Point2<f64>>) -> Result<Self, Error> {
        let finite = vertices
            .iter()
            .all(|vertex| vertex.coords.iter().all(|v| v.is_finite()));

        if vertices.len() < 3 || !finite {
            return Err(Error::InvalidPolygon {
                count: vertices.len(),
            });
        }

        Ok(Self { vertices })
    }

    pub fn l_shaped_room() -> Self {
        Self {
            vertices: ScenarioParams::l_shaped_room(),
        }
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    /// Tests whether `point` lies inside the polygon by casting a ray towards +x.
    pub fn contains(&self, point: &Point2<f64>) -> bool {
        let edges = self
            .vertices
            .iter()
            .zip(self.vertices.iter().cycle().skip(1));

        edges
            .filter(|(a, b)| (a.y > point.y) != (b.y > point.y))
            .filter(|(a, b)| a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y) > point.x)
            .count()
            % 2
            == 1
    }

    /// The lower-left and upper-right corners of the bounding box.
    pub fn bounds(&self) -> (Point2<f64>, Point2<f64>) {
        self.vertices.iter().fold(
            (
                Point2::new(f64::INFINITY, f64::INFINITY),
                Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            ),
            |(min, max), v| (min.inf(v), max.sup(v)),
        )
    }

    /// Draws a point uniformly from the interior of the polygon.
    pub fn sample_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Point2<f64>, Error> {
        let (min, max) = self.bounds();
        let extent = max - min;

        for _ in 0..MAX_SAMPLING_ATTEMPTS {
            let x = min.x + extent.x * rng.random::<f64>();
            let y = min.y + extent.y * rng.random::<f64>();
            let point = Point2::new(x, y);
            if self.contains(&point) {
                return Ok(point);
            }
        }

        Err(Error::SamplingExhausted {
            attempts: MAX_SAMPLING_ATTEMPTS,
        })
    }

    pub fn sample_points<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Point2<f64>>, Error> {
        (0..count).map(|_| self.sample_point(rng)).collect()
    }
}

/// The state of a filter after one epoch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Epoch {
    pub index: usize,
    pub estimate: PositionEstimate,

    /// Whether a measurement was available and applied this epoch.
    pub updated: bool,
}

/// The history of a filter tracking a single source.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub source: Point2<f64>,
    pub epochs: Vec<Epoch>,
}

impl Track {
    pub fn last(&self) -> Option<&PositionEstimate> {
        self.epochs.last().map(|epoch| &epoch.estimate)
    }
}

/// A source and the position recovered for it, if any.
///
/// `index` is the rank of the source by bearing from the first array.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceLocation {
    pub index: usize,
    pub truth: Point2<f64>,

    /// `None` when either array missed the source or the bearings were parallel.
    pub estimate: Option<Point2<f64>>,
}

/// A room observed by circular arrays, driven by a single seeded random source.
pub struct Scenario {
    params: ScenarioParams,
    arrays: Vec<ArrayGeometry>,
    room: Polygon,
    grid: AngleGrid,
    rng: StdRng,
}

impl Scenario {
    pub fn from_params(params: ScenarioParams) -> Result<Self, Error> {
        let arrays = params
            .array_centers
            .iter()
            .map(|center| ArrayGeometry::circular(*center, params.elements, params.array_radius))
            .collect::<Result<Vec<_>, _>>()?;

        let room = Polygon::try_new(params.room.clone())?;
        let grid = AngleGrid::full_circle(params.grid_size)?;
        let rng = StdRng::seed_from_u64(params.seed);

        Ok(Self {
            params,
            arrays,
            room,
            grid,
            rng,
        })
    }

    pub fn params(&self) -> &ScenarioParams {
        &self.params
    }

    pub fn arrays(&self) -> &[ArrayGeometry] {
        &self.arrays
    }

    pub fn room(&self) -> &Polygon {
        &self.room
    }

    /// Tracks a source drawn from the room with a linear Kalman filter fed by
    /// the multilaterated bearings of every array.
    pub fn run_kalman(&mut self) -> Result<Track, Error> {
        let source = self.room.sample_point(&mut self.rng)?;
        self.track_kalman(source)
    }

    /// Tracks `source` with a linear Kalman filter fed by the multilaterated
    /// bearings of every array.
    pub fn track_kalman(&mut self, source: Point2<f64>) -> Result<Track, Error> {
        if self.arrays.len() < 2 {
            return Err(Error::InsufficientBearings {
                count: self.arrays.len(),
            });
        }

        let Self {
            params,
            arrays,
            grid,
            rng,
            ..
        } = self;
        info!(x = source.x, y = source.y, "tracking source with kalman filter");

        let amplitude = random_amplitude(rng);
        debug!(magnitude = amplitude.norm(), "drew source amplitude");
        let simulators = simulators(arrays, params.snr, params.snapshots)?;
        let music = Music::new(1, grid.clone()).with_criteria(params.peak_criteria);
        let config = &params.kalman;
        let mut filter = KalmanFilter::with_scales(
            config.initial_mean,
            config.initial_variance,
            config.q_scale,
            config.r_scale,
        )?;

        let epochs = track(&mut filter, config.epochs, |_| {
            let lines = simulators
                .iter()
                .map(|simulator| {
                    let geometry = simulator.geometry();
                    let origin = geometry.centroid();
                    let source = SignalSource::new(Bearing::between(&origin, &source), amplitude);
                    let covariance = simulator.simulate_covariance(&[source], rng);
                    let estimate = music.estimate(&covariance, geometry)?;
                    Ok(BearingLine::new(origin, first_bearing(&estimate.bearings)?))
                })
                .collect::<Result<Vec<_>, Error>>()?;

            multilaterate(&lines)
        });

        Ok(Track { source, epochs })
    }

    /// Tracks a source drawn from the room with an extended Kalman filter fed
    /// by the bearings of the first two arrays.
    pub fn run_extended(&mut self) -> Result<Track, Error> {
        let source = self.room.sample_point(&mut self.rng)?;
        self.track_extended(source)
    }

    /// Tracks `source` with an extended Kalman filter fed by the bearings of
    /// the first two arrays.
    pub fn track_extended(&mut self, source: Point2<f64>) -> Result<Track, Error> {
        let Self {
            params,
            arrays,
            grid,
            rng,
            ..
        } = self;

        let [first, second, ..] = arrays.as_slice() else {
            return Err(Error::InsufficientBearings {
                count: arrays.len(),
            });
        };
        info!(x = source.x, y = source.y, "tracking source with extended kalman filter");

        let amplitude = random_amplitude(rng);
        debug!(magnitude = amplitude.norm(), "drew source amplitude");
        let simulators = simulators(&arrays[..2], params.snr, params.snapshots)?;
        let music = Music::new(1, grid.clone()).with_criteria(params.peak_criteria);
        let config = &params.extended;
        let model = BearingPairModel::new(first.centroid(), second.centroid());
        let mut filter = ExtendedKalmanFilter::new(
            PositionEstimate::isotropic(config.initial_mean, config.initial_variance),
            Matrix2::identity() * config.q_scale,
            Matrix2::identity() * config.r_scale,
            model,
        )?;

        let epochs = track(&mut filter, config.epochs, |_| {
            let mut bearings = [Bearing::from_radians(0.0); 2];
            for (bearing, simulator) in bearings.iter_mut().zip(&simulators) {
                let geometry = simulator.geometry();
                let origin = geometry.centroid();
                let source = SignalSource::new(Bearing::between(&origin, &source), amplitude);
                let covariance = simulator.simulate_covariance(&[source], rng);
                *bearing = first_bearing(&music.estimate(&covariance, geometry)?.bearings)?;
            }
            Ok(bearings)
        });

        Ok(Track { source, epochs })
    }

    /// Draws several sources from the room and locates each one by
    /// intersecting the bearings of the first two arrays.
    pub fn locate_sources(&mut self) -> Result<Vec<SourceLocation>, Error> {
        let sources = self
            .room
            .sample_points(self.params.intersect.sources, &mut self.rng)?;
        self.locate(&sources)
    }

    /// Locates `sources` by intersecting the bearings of the first two arrays.
    ///
    /// Bearings are paired by their rank in ascending order on each array.
    /// Locations are reported in ascending order of the true bearing from the
    /// first array, so a truth lines up with its estimate whenever both arrays
    /// rank the sources alike.
    pub fn locate(&mut self, sources: &[Point2<f64>]) -> Result<Vec<SourceLocation>, Error> {
        let Self {
            params,
            arrays,
            grid,
            rng,
            ..
        } = self;

        let [first, second, ..] = arrays.as_slice() else {
            return Err(Error::InsufficientBearings {
                count: arrays.len(),
            });
        };

        let amplitudes: Vec<_> = sources.iter().map(|_| random_amplitude(rng)).collect();
        debug!(
            magnitudes = ?amplitudes.iter().map(|a| a.norm()).collect::<Vec<_>>(),
            "drew source amplitudes"
        );
        let music =
            Music::new(sources.len(), grid.clone()).with_criteria(params.peak_criteria);
        let config = &params.intersect;

        let mut bearings = Vec::with_capacity(2);
        for geometry in [first, second] {
            let origin = geometry.centroid();
            let signals: Vec<_> = sources
                .iter()
                .zip(&amplitudes)
                .map(|(source, amplitude)| {
                    SignalSource::new(Bearing::between(&origin, source), *amplitude)
                })
                .collect();

            let covariance = ArraySimulator::try_new(geometry, config.snr, config.snapshots)?
                .simulate_covariance(&signals, rng);
            let estimate = music.estimate(&covariance, geometry)?;
            if estimate.bearings.len() < sources.len() {
                warn!(
                    detected = estimate.bearings.len(),
                    expected = sources.len(),
                    "array detected fewer sources than present"
                );
            }
            bearings.push(estimate.bearings);
        }

        let (c0, c1) = (first.centroid(), second.centroid());
        let mut ranked: Vec<&Point2<f64>> = sources.iter().collect();
        ranked.sort_by(|a, b| {
            let (a, b) = (Bearing::between(&c0, a), Bearing::between(&c0, b));
            a.radians().total_cmp(&b.radians())
        });

        let locations = ranked
            .into_iter()
            .enumerate()
            .map(|(index, truth)| {
                let estimate = match (bearings[0].get(index), bearings[1].get(index)) {
                    (Some(b0), Some(b1)) => line_intersection(c0, *b0, c1, *b1),
                    _ => None,
                };
                debug!(index, ?truth, ?estimate, "located source");

                SourceLocation {
                    index,
                    truth: *truth,
                    estimate,
                }
            })
            .collect();

        Ok(locations)
    }
}

fn simulators(
    arrays: &[ArrayGeometry],
    snr: f64,
    snapshots: usize,
) -> Result<Vec<ArraySimulator<'_>>, Error> {
    arrays
        .iter()
        .map(|geometry| ArraySimulator::try_new(geometry, snr, snapshots))
        .collect()
}

fn first_bearing(bearings: &[Bearing]) -> Result<Bearing, Error> {
    bearings
        .first()
        .copied()
        .ok_or(Error::InsufficientBearings { count: 0 })
}

/// Runs `epochs` predict/update cycles, skipping the update of any epoch
/// whose measurement fails.
fn track<F, M>(filter: &mut F, epochs: usize, mut measure: M) -> Vec<Epoch>
where
    F: PositionFilter,
    M: FnMut(usize) -> Result<F::Measurement, Error>,
{
    (0..epochs)
        .map(|index| {
            filter.predict();

            let updated = match measure(index).and_then(|z| filter.update(&z).map(|_| ())) {
                Ok(()) => true,
                Err(err) => {
                    warn!(epoch = index, %err, "skipping filter update");
                    false
                }
            };

            let estimate = *filter.state();
            debug!(
                epoch = index,
                x = estimate.mean.x,
                y = estimate.mean.y,
                trace = estimate.trace(),
                "filter epoch"
            );

            Epoch {
                index,
                estimate,
                updated,
            }
        })
        .collect()
}
