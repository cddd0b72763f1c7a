use clap::{Parser, ValueEnum};
use doa_locate::{
    params::ScenarioParams,
    scenario::{Scenario, SourceLocation, Track},
};
use std::{
    fmt::Write as _,
    fs::File,
    io::{BufWriter, Read, Write},
    path::PathBuf,
};
use tracing::{error, info};

#[derive(Clone, Copy, ValueEnum)]
enum Pipeline {
    /// Multilateration over every array followed by a linear Kalman filter.
    Kalman,
    /// Bearings of the first two arrays fed to an extended Kalman filter.
    Extended,
    /// Several sources located by intersecting bearings of two arrays.
    Intersect,
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to scenario parameters as JSON. Defaults are used if absent.
    #[arg(short, long)]
    params: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Pipeline::Kalman)]
    pipeline: Pipeline,

    /// Optional path to write output to.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    // Events go to STDERR so that STDOUT can carry the csv.
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let args = Args::parse();

    let params: ScenarioParams = match &args.params {
        Some(path) => {
            let mut file = File::open(path).expect("failed to open params file");
            let mut serialized = String::new();
            file.read_to_string(&mut serialized)
                .expect("failed to read params file");
            serde_json::from_str(&serialized).expect("failed to parse params file")
        }
        None => ScenarioParams::default(),
    };

    let mut scenario = Scenario::from_params(params).expect("invalid scenario parameters");
    let output = match args.pipeline {
        Pipeline::Kalman => track_csv(&scenario.run_kalman().expect("kalman pipeline failed")),
        Pipeline::Extended => {
            track_csv(&scenario.run_extended().expect("extended pipeline failed"))
        }
        Pipeline::Intersect => {
            locations_csv(&scenario.locate_sources().expect("intersect pipeline failed"))
        }
    };

    let mut writer: Box<dyn Write> = match args.output {
        Some(path_buf) => Box::new(BufWriter::new(
            File::create(path_buf).expect("unable to create output file"),
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    match writer.write_all(output.as_bytes()).and_then(|()| writer.flush()) {
        Ok(()) => info!("wrote result as csv"),
        Err(e) => error!(err = e.to_string(), "failed to write result as csv"),
    }
}

fn track_csv(track: &Track) -> String {
    info!(x = track.source.x, y = track.source.y, "true source position");

    let mut csv = String::from("epoch,x,y,p_xx,p_xy,p_yy\n");
    for epoch in &track.epochs {
        let (mean, p) = (epoch.estimate.mean, epoch.estimate.covariance);
        let _ = writeln!(
            csv,
            "{},{:.6},{:.6},{:.6e},{:.6e},{:.6e}",
            epoch.index,
            mean.x,
            mean.y,
            p[(0, 0)],
            p[(0, 1)],
            p[(1, 1)]
        );
    }
    csv
}

fn locations_csv(locations: &[SourceLocation]) -> String {
    let mut csv = String::from("source,true_x,true_y,est_x,est_y\n");
    for location in locations {
        let (est_x, est_y) = match location.estimate {
            Some(point) => (format!("{:.6}", point.x), format!("{:.6}", point.y)),
            None => (String::new(), String::new()),
        };
        let _ = writeln!(
            csv,
            "{},{:.6},{:.6},{},{}",
            location.index, location.truth.x, location.truth.y, est_x, est_y
        );
    }
    csv
}
