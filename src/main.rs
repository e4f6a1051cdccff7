use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;

use station_viewshed::cache::MaskCache;
use station_viewshed::coverage::{ViewshedConfig, ViewshedEngine, ViewshedProgress, ViewshedRun};
use station_viewshed::io::{
    DEFAULT_HEIGHT_FIELD, Station, load_stations_from_csv, load_stations_from_json,
};
use station_viewshed::terrain::{HgtLoader, read_ascii_grid, write_ascii_grid};

#[derive(Parser, Debug)]
#[command(
    name = "station_viewshed",
    about = "Count, for every DEM cell, how many stations can see it"
)]
struct Args {
    /// Elevation model: ESRI ASCII grid (.asc) or SRTM tile (.hgt)
    #[arg(long)]
    dem: PathBuf,

    /// Stations as JSON (array of {name, x, y, height_offset}) or CSV (x, y, height column)
    #[arg(long)]
    stations: PathBuf,

    /// Output ESRI ASCII grid of visibility counts
    #[arg(long)]
    output: PathBuf,

    /// CSV column holding each station's height above ground
    #[arg(long, default_value = DEFAULT_HEIGHT_FIELD)]
    height_field: String,

    /// Height used for CSV rows without a height value
    #[arg(long)]
    default_height: Option<f64>,

    /// JSON file with engine settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Process stations on all cores
    #[arg(long)]
    parallel: bool,
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

fn load_dem(path: &Path) -> Result<station_viewshed::ElevationGrid> {
    match extension(path).as_str() {
        "hgt" => {
            let (lat, lon) = parse_tile_name(path)?;
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            HgtLoader::new(dir).load_tile(lat, lon)
        }
        _ => read_ascii_grid(path),
    }
}

/// `N45E005.hgt` -> (45, 5)
fn parse_tile_name(path: &Path) -> Result<(i32, i32)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Bad tile name {:?}", path))?
        .to_ascii_uppercase();
    if stem.len() != 7 || !stem.is_ascii() {
        bail!("Bad tile name {:?}", stem);
    }

    let lat: i32 = stem[1..3].parse().with_context(|| format!("Bad tile name {:?}", stem))?;
    let lon: i32 = stem[4..7].parse().with_context(|| format!("Bad tile name {:?}", stem))?;
    let lat = match &stem[0..1] {
        "N" => lat,
        "S" => -lat,
        _ => bail!("Bad tile name {:?}", stem),
    };
    let lon = match &stem[3..4] {
        "E" => lon,
        "W" => -lon,
        _ => bail!("Bad tile name {:?}", stem),
    };
    Ok((lat, lon))
}

fn load_stations(args: &Args) -> Result<Vec<Station>> {
    match extension(&args.stations).as_str() {
        "json" => load_stations_from_json(&args.stations),
        "csv" => load_stations_from_csv(&args.stations, &args.height_field, args.default_height),
        other => bail!("Unsupported station file type {:?}", other),
    }
}

fn station_total(stations: &[Station]) -> Result<u32> {
    u32::try_from(stations.len())
        .with_context(|| format!("Too many stations to track progress: {}", stations.len()))
}

#[cfg(feature = "parallel")]
fn run_engine(
    engine: &ViewshedEngine<'_>,
    stations: &[Station],
    parallel: bool,
) -> Result<ViewshedRun> {
    if parallel {
        Ok(engine.run_parallel(stations)?)
    } else {
        Ok(engine.run(stations)?)
    }
}

#[cfg(not(feature = "parallel"))]
fn run_engine(
    engine: &ViewshedEngine<'_>,
    stations: &[Station],
    parallel: bool,
) -> Result<ViewshedRun> {
    if parallel {
        log::warn!("Built without the parallel feature, running sequentially");
    }
    Ok(engine.run(stations)?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ViewshedConfig::from_json_file(path)?,
        None => ViewshedConfig::default(),
    };

    let dem = load_dem(&args.dem)?;
    let stations = load_stations(&args)?;
    log::info!("Loaded {} stations from {:?}", stations.len(), args.stations);

    let total = station_total(&stations)?;
    let progress = ViewshedProgress::new(total);
    let engine = ViewshedEngine::new(&dem)
        .with_config(config)
        .with_progress(progress)
        .with_cache(Arc::new(MaskCache::new(config.cache_capacity)));

    let start = Instant::now();
    let run = run_engine(&engine, &stations, args.parallel)?;
    log::info!("Viewshed computed in {:.2?}", start.elapsed());

    if let (Some(min), Some(max)) = (run.summary.min_count, run.summary.max_count) {
        log::info!("Visibility counts range from {} to {}", min, max);
    }

    write_ascii_grid(&args.output, &run.counts)?;
    log::info!("Wrote {:?}", args.output);
    Ok(())
}
