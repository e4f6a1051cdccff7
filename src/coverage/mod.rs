//! Cumulative viewshed over a list of stations.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use anyhow::Context;
use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_CACHE_CAPACITY, MaskCache, StationKey, grid_fingerprint};
use crate::error::{ViewshedError, ViewshedResult};
use crate::io::Station;
use crate::physics::{
    ANGLE_SCALE, ResolvedStation, VisibilityMask, accumulate_visibility, add_mask, station_fields,
    visibility_mask,
};
use crate::terrain::{CountGrid, ElevationGrid};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewshedConfig {
    /// Multiplier on elevation difference over distance.
    pub angle_scale: f64,
    /// Masks kept by a cache built from this config.
    pub cache_capacity: usize,
}

impl Default for ViewshedConfig {
    fn default() -> Self {
        Self {
            angle_scale: ANGLE_SCALE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ViewshedConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }
}

/// Stations handled so far, for progress reporting from another thread.
#[derive(Debug, Clone)]
pub struct ViewshedProgress {
    pub current: Arc<AtomicU32>,
    pub total: u32,
}

impl ViewshedProgress {
    pub fn new(total: u32) -> Self {
        Self {
            current: Arc::new(AtomicU32::new(0)),
            total,
        }
    }

    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        self.current.load(Ordering::Relaxed) as f32 / self.total as f32
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Stations whose visibility was added to the counts.
    pub processed: usize,
    /// Input indices of stations skipped for lack of elevation.
    pub skipped: Vec<usize>,
    /// Set when the run stopped early on request.
    pub cancelled: bool,
    /// Cells seen by at least one station.
    pub defined_cells: usize,
    pub min_count: Option<f64>,
    pub max_count: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ViewshedRun {
    pub counts: CountGrid,
    pub summary: RunSummary,
}

pub struct ViewshedEngine<'a> {
    dem: &'a ElevationGrid,
    config: ViewshedConfig,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<ViewshedProgress>,
    cache: Option<Arc<MaskCache>>,
}

impl<'a> ViewshedEngine<'a> {
    pub fn new(dem: &'a ElevationGrid) -> Self {
        Self {
            dem,
            config: ViewshedConfig::default(),
            cancel: None,
            progress: None,
            cache: None,
        }
    }

    pub fn with_config(mut self, config: ViewshedConfig) -> Self {
        self.config = config;
        self
    }

    /// The flag is checked once before each station.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_progress(mut self, progress: ViewshedProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cache(mut self, cache: Arc<MaskCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn check_preconditions(&self, stations: &[Station]) -> ViewshedResult<()> {
        if self.dem.is_empty() {
            return Err(ViewshedError::EmptyGrid);
        }
        if !self.dem.geometry.is_valid() {
            return Err(ViewshedError::InvalidGeometry(format!("{:?}", self.dem.geometry)));
        }
        if stations.is_empty() {
            return Err(ViewshedError::EmptyStations);
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn tick(&self) {
        if let Some(progress) = &self.progress {
            progress.current.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn resolve(&self, index: usize, station: &Station) -> Option<ResolvedStation> {
        let resolved = ResolvedStation::resolve(index, station, self.dem);
        if resolved.is_none() {
            log::warn!(
                "Ignoring station {} ({:?}) at ({}, {}): no elevation available",
                index,
                station.name,
                station.x,
                station.y
            );
        }
        resolved
    }

    /// Visibility mask for one station, through the cache when there is one.
    fn station_mask(
        &self,
        station: &Station,
        resolved: &ResolvedStation,
        fingerprint: u64,
    ) -> ViewshedResult<Arc<VisibilityMask>> {
        let key = StationKey::new(fingerprint, station, self.config.angle_scale);
        if let Some(mask) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            log::debug!("Station {} served from cache", resolved.index);
            return Ok(mask);
        }

        let (angles, horizon) = station_fields(self.dem, resolved, self.config.angle_scale);
        let mask = Arc::new(visibility_mask(&angles, &horizon)?);
        if let Some(cache) = &self.cache {
            cache.insert(key, mask.clone());
        }
        Ok(mask)
    }

    /// Processes stations one by one in input order.
    pub fn run(&self, stations: &[Station]) -> ViewshedResult<ViewshedRun> {
        self.check_preconditions(stations)?;
        log::info!(
            "Computing viewshed for {} stations on a {}x{} grid",
            stations.len(),
            self.dem.cols(),
            self.dem.rows()
        );

        let fingerprint = self
            .cache
            .as_ref()
            .map(|_| grid_fingerprint(self.dem))
            .unwrap_or_default();
        let mut counts = self.dem.blank_like();
        let mut summary = RunSummary::default();

        for (index, station) in stations.iter().enumerate() {
            if self.is_cancelled() {
                log::info!("Viewshed cancelled after {} of {} stations", index, stations.len());
                summary.cancelled = true;
                break;
            }

            let Some(resolved) = self.resolve(index, station) else {
                summary.skipped.push(index);
                self.tick();
                continue;
            };
            log::debug!(
                "Working on station {} at cell ({}, {}), elevation {:.2}",
                index,
                resolved.col,
                resolved.row,
                resolved.elevation
            );

            if self.cache.is_some() {
                let mask = self.station_mask(station, &resolved, fingerprint)?;
                add_mask(&mask, &mut counts)?;
            } else {
                let (angles, horizon) =
                    station_fields(self.dem, &resolved, self.config.angle_scale);
                accumulate_visibility(&angles, &horizon, &mut counts)?;
            }

            summary.processed += 1;
            self.tick();
        }

        Ok(finish(counts, summary))
    }

    /// Processes stations on the rayon pool, one mask per station, then sums
    /// the masks in input order.
    #[cfg(feature = "parallel")]
    pub fn run_parallel(&self, stations: &[Station]) -> ViewshedResult<ViewshedRun> {
        use rayon::prelude::*;

        self.check_preconditions(stations)?;
        log::info!(
            "Computing viewshed for {} stations on a {}x{} grid ({} threads)",
            stations.len(),
            self.dem.cols(),
            self.dem.rows(),
            rayon::current_num_threads()
        );

        let fingerprint = self
            .cache
            .as_ref()
            .map(|_| grid_fingerprint(self.dem))
            .unwrap_or_default();
        let outcomes: Vec<StationOutcome> = stations
            .par_iter()
            .enumerate()
            .map(|(index, station)| -> ViewshedResult<StationOutcome> {
                if self.is_cancelled() {
                    return Ok(StationOutcome::Cancelled);
                }
                let outcome = match self.resolve(index, station) {
                    Some(resolved) => {
                        StationOutcome::Visible(self.station_mask(station, &resolved, fingerprint)?)
                    }
                    None => StationOutcome::Skipped,
                };
                self.tick();
                Ok(outcome)
            })
            .collect::<ViewshedResult<_>>()?;

        let mut counts = self.dem.blank_like();
        let mut summary = RunSummary::default();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                StationOutcome::Visible(mask) => {
                    add_mask(&mask, &mut counts)?;
                    summary.processed += 1;
                }
                StationOutcome::Skipped => summary.skipped.push(index),
                StationOutcome::Cancelled => summary.cancelled = true,
            }
        }

        Ok(finish(counts, summary))
    }
}

#[cfg(feature = "parallel")]
enum StationOutcome {
    Visible(Arc<VisibilityMask>),
    Skipped,
    Cancelled,
}

fn finish(counts: CountGrid, mut summary: RunSummary) -> ViewshedRun {
    let defined = counts.data.iter().copied().filter(|v| !counts.is_novalue(*v));
    let (min, max) = match defined.minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::NoElements => (None, None),
        MinMaxResult::OneElement(v) => (Some(v), Some(v)),
        MinMaxResult::MinMax(lo, hi) => (Some(lo), Some(hi)),
    };
    summary.defined_cells = counts.defined_count();
    summary.min_count = min;
    summary.max_count = max;

    log::info!(
        "Viewshed done: {} stations processed, {} skipped, {} cells visible",
        summary.processed,
        summary.skipped.len(),
        summary.defined_cells
    );

    ViewshedRun { counts, summary }
}

/// Number of stations seeing each cell, with default settings.
pub fn compute_viewshed(
    elevation: &ElevationGrid,
    stations: &[Station],
) -> ViewshedResult<CountGrid> {
    Ok(ViewshedEngine::new(elevation).run(stations)?.counts)
}
