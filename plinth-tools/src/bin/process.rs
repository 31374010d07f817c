use std::{path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::{value_t, App, Arg};
use log::info;
use plinth_algorithms::{
    outlier_removal::{NoiseRemovalParams, OutlierMethod},
    pipeline::{process_point_cloud, ProcessingParams},
    segmentation::RansacParams,
};
use plinth_io::{
    base::{read_point_cloud, write_point_cloud},
    report::{write_analysis_report, write_zmean},
};

struct Args {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub segments_file: Option<PathBuf>,
    pub params: ProcessingParams,
}

fn get_args() -> Result<Args> {
    let matches = App::new("plinth process")
        .version("0.1")
        .about("Removes noise from a point cloud, finds its floor and rotates the cloud so that the floor becomes the plane z = 0")
        .arg(
            Arg::with_name("INPUT")
                .short("i")
                .long("input")
                .takes_value(true)
                .value_name("INPUT")
                .help("Input point cloud file (.ply, .xyz, .txt or .pts)")
                .required(true),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("Output point cloud file. zmean.txt and analysis_report.txt are written next to it")
                .required(true),
        )
        .arg(
            Arg::with_name("SEGMENTS")
                .long("segments")
                .takes_value(true)
                .value_name("SEGMENTS")
                .help("Optional file for the filtered cloud with the floor painted red and everything else grey"),
        )
        .arg(
            Arg::with_name("NOISE_METHOD")
                .long("noise_method")
                .takes_value(true)
                .possible_values(&["statistical", "radius"])
                .default_value("statistical")
                .help("Noise removal method"),
        )
        .arg(
            Arg::with_name("NB_NEIGHBORS")
                .long("nb_neighbors")
                .takes_value(true)
                .default_value("20")
                .help("Number of neighbours for noise removal"),
        )
        .arg(
            Arg::with_name("STD_RATIO")
                .long("std_ratio")
                .takes_value(true)
                .default_value("2.0")
                .help("Standard deviation ratio of the statistical method, search radius of the radius method"),
        )
        .arg(
            Arg::with_name("PLANE_THRESHOLD")
                .long("plane_threshold")
                .takes_value(true)
                .default_value("0.02")
                .help("Maximum distance of a floor point to the floor plane"),
        )
        .arg(
            Arg::with_name("RANSAC_N")
                .long("ransac_n")
                .takes_value(true)
                .default_value("3")
                .help("Number of points sampled per RANSAC trial"),
        )
        .arg(
            Arg::with_name("ITERATIONS")
                .long("iterations")
                .takes_value(true)
                .default_value("1000")
                .help("Number of RANSAC trials"),
        )
        .arg(
            Arg::with_name("SEED")
                .long("seed")
                .takes_value(true)
                .help("Seed for a reproducible plane segmentation"),
        )
        .get_matches();

    let input_file = PathBuf::from(matches.value_of("INPUT").unwrap_or_default());
    let output_file = PathBuf::from(matches.value_of("OUTPUT").unwrap_or_default());
    let segments_file = matches.value_of("SEGMENTS").map(PathBuf::from);

    let noise = NoiseRemovalParams::default()
        .with_method(OutlierMethod::from_name(
            matches.value_of("NOISE_METHOD").unwrap_or_default(),
        ))
        .with_nb_neighbors(value_t!(matches, "NB_NEIGHBORS", usize)?)
        .with_std_ratio(value_t!(matches, "STD_RATIO", f64)?);
    let ransac = RansacParams::default()
        .with_distance_threshold(value_t!(matches, "PLANE_THRESHOLD", f64)?)
        .with_ransac_n(value_t!(matches, "RANSAC_N", usize)?)
        .with_num_iterations(value_t!(matches, "ITERATIONS", usize)?);
    let mut params = ProcessingParams::default()
        .with_noise(noise)
        .with_ransac(ransac);
    if matches.is_present("SEED") {
        params = params.with_seed(value_t!(matches, "SEED", u64)?);
    }

    Ok(Args {
        input_file,
        output_file,
        segments_file,
        params,
    })
}

fn main() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let args = get_args()?;
    let t_start = Instant::now();

    let output_dir = match args.output_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Could not create output directory {}", output_dir.display()))?;

    let cloud = read_point_cloud(&args.input_file)?;
    let output = process_point_cloud(&cloud, &args.params)?;

    write_point_cloud(&output.corrected, &args.output_file)?;
    write_zmean(&output_dir, output.floor_zmean)?;
    write_analysis_report(&output_dir, &output.report)?;
    if let Some(segments_file) = &args.segments_file {
        write_point_cloud(&output.floor.merged(&output.rest), segments_file)?;
    }

    println!("{}", output.report);
    info!("Done, took {:.2}s", t_start.elapsed().as_secs_f64());
    Ok(())
}
