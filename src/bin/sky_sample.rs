use chrono::NaiveDateTime;
use clap::Parser;
use image::{ImageReader, Rgb};
use skydata::prelude::*;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};
use tracing::{error, info};
use uom::si::angle::degree;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the dataset root holding `config.json`.
    #[arg(long)]
    data: PathBuf,

    /// Local capture instant, e.g. "2017-06-01 12:03:00".
    #[arg(long, value_parser = parse_capture)]
    capture: NaiveDateTime,

    /// Photograph file extension.
    #[arg(long, default_value = "jpg")]
    ext: String,

    /// Exposure time in seconds to sample from the capture's exposure bracket.
    #[arg(long)]
    exposure: Option<f64>,

    /// Edge of the square pixel region sampled per direction.
    #[arg(long, default_value_t = 1)]
    region: u32,

    #[arg(long, default_value_t = PixelWeighting::Gaussian)]
    weighting: PixelWeighting,

    /// Use the calibrated lens instead of the ideal one.
    #[arg(long)]
    calibrated: bool,

    /// Optional path to write output to.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_capture(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
}

fn main() {
    // Register an event subscriber that prints events to STDOUT.
    let subscriber = tracing_subscriber::FmtSubscriber::new();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to register event subscriber: {err}");
    }

    let args = Args::parse();
    if let Err(err) = run(args) {
        error!(%err, "failed to sample capture");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::load_from_dataset(&args.data)?;

    let correlator = Correlator::new(&args.data, &config);
    let photo_path = match args.exposure {
        Some(exposure) => correlator.find_exposure_photo(args.capture, exposure, &args.ext)?,
        None => correlator.find_photo(args.capture, &args.ext)?,
    };
    let photo = ImageReader::open(&photo_path)?.decode()?.into_rgb8();
    info!(?photo_path, "decoded photograph");

    let projection = match args.calibrated {
        true => Projection::Calibrated,
        false => Projection::Ideal,
    };
    let sampler = CaptureSampler::new(&config, projection, args.weighting, args.region);
    let report = sampler.sample_capture(&args.data, args.capture, &photo)?;

    let mut writer: Box<dyn Write> = match args.output {
        Some(path_buf) => Box::new(BufWriter::new(File::create(path_buf)?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    writeln!(
        writer,
        "capture,sun_azimuth,sun_altitude,sky_cover,index,azimuth,altitude,x,y,r,g,b,scan"
    )?;
    for row in &report.samples {
        writeln!(writer, "{}", format_row(&report, row))?;
    }
    writer.flush()?;

    info!(
        rows = report.samples.len(),
        complete = report.complete().count(),
        "wrote samples as csv"
    );
    Ok(())
}

fn format_row(report: &CaptureReport<Rgb<u8>>, row: &DirectionSample<Rgb<u8>>) -> String {
    let (azimuth, altitude) = row.direction.to_degrees();
    let rgb = match &row.sample {
        Ok(Rgb([r, g, b])) => format!("{r},{g},{b}"),
        Err(_) => ",,".to_string(),
    };
    let scan = match &row.scan {
        Ok(path) => path.display().to_string(),
        Err(_) => String::new(),
    };

    format!(
        "{},{:.4},{:.4},{},{},{azimuth},{altitude},{},{},{rgb},{scan}",
        report.capture.format("%Y-%m-%d %H:%M:%S"),
        report.sun.azimuth().get::<degree>(),
        report.sun.altitude().get::<degree>(),
        report.sky_cover,
        row.index,
        row.pixel.x(),
        row.pixel.y(),
    )
}
