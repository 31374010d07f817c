use std::{path::PathBuf, time::Instant};

use anyhow::Result;
use clap::{value_t, App, Arg};
use plinth_algorithms::analysis::{analyze_point_cloud, AnalysisParams};
use plinth_io::base::{GenericPointReader, PointReader};

struct Args {
    pub input_file: PathBuf,
    pub params: AnalysisParams,
}

fn get_args() -> Result<Args> {
    let matches = App::new("plinth info")
        .version("0.1")
        .about("Prints size, extent and point spacing of the given point cloud file")
        .arg(
            Arg::with_name("INPUT")
                .short("i")
                .takes_value(true)
                .value_name("INPUT")
                .help("Input point cloud file")
                .required(true),
        )
        .arg(
            Arg::with_name("SAMPLE_SIZE")
                .short("s")
                .long("sample_size")
                .takes_value(true)
                .default_value("1000")
                .help("Number of points used to estimate the point spacing"),
        )
        .arg(
            Arg::with_name("NEIGHBOURS")
                .short("k")
                .long("neighbours")
                .takes_value(true)
                .default_value("10")
                .help("Number of nearest neighbours per sampled point"),
        )
        .get_matches();

    let input_file = PathBuf::from(matches.value_of("INPUT").unwrap_or_default());
    let params = AnalysisParams::default()
        .with_sample_size(value_t!(matches, "SAMPLE_SIZE", usize)?)
        .with_num_neighbours(value_t!(matches, "NEIGHBOURS", usize)?);

    Ok(Args { input_file, params })
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = get_args()?;
    let t_start = Instant::now();

    let mut reader = GenericPointReader::open_file(&args.input_file)?;
    if let Some(count) = reader.point_count() {
        println!("Header point count: {}", count);
    }
    let cloud = reader.read()?;
    println!("plinth info report for {}", args.input_file.display());
    println!("Has colors: {}", cloud.has_colors());

    let report = analyze_point_cloud(&cloud, &args.params)?;
    println!("{}", report);

    println!("Took {:.2}s", t_start.elapsed().as_secs_f64());
    Ok(())
}
