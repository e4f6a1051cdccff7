//! SRTM `.hgt` tiles as elevation grids in geographic (degree) coordinates.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use ndarray::Array2;

use super::Raster;
use crate::geo::GridGeometry;

pub const SRTM3_SIZE: usize = 1201;
pub const SRTM1_SIZE: usize = 3601;

/// Void marker used by SRTM tiles.
pub const SRTM_VOID: i16 = -32768;

pub struct HgtLoader {
    pub assets_path: PathBuf,
}

impl HgtLoader {
    pub fn new(assets_path: PathBuf) -> Self {
        Self { assets_path }
    }

    pub fn tile_name(lat: i32, lon: i32) -> String {
        format!(
            "{}{:02}{}{:03}.hgt",
            if lat >= 0 { "N" } else { "S" },
            lat.abs(),
            if lon >= 0 { "E" } else { "W" },
            lon.abs()
        )
    }

    /// Loads the tile whose south-west corner is at (`lat`, `lon`).
    pub fn load_tile(&self, lat: i32, lon: i32) -> Result<Raster> {
        let path = self.assets_path.join(Self::tile_name(lat, lon));

        let mut file = File::open(&path).with_context(|| format!("Failed to open {:?}", path))?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;

        decode_tile(&buffer, lat, lon).with_context(|| format!("Failed to decode {:?}", path))
    }
}

/// Decodes raw big-endian samples. Row 0 is the northern edge; adjacent tiles
/// share their border rows and columns, so the cell size is `1 / (size - 1)`
/// degrees and cell centres sit on whole-degree lines.
pub fn decode_tile(buffer: &[u8], lat: i32, lon: i32) -> Result<Raster> {
    let size = match buffer.len() {
        2884802 => SRTM3_SIZE,
        25934402 => SRTM1_SIZE,
        len => anyhow::bail!("Unknown HGT file size: {}", len),
    };
    decode_samples(buffer, size, lat, lon)
}

fn decode_samples(buffer: &[u8], size: usize, lat: i32, lon: i32) -> Result<Raster> {
    let samples: Vec<f64> = buffer
        .chunks_exact(2)
        .map(|chunk| f64::from(i16::from_be_bytes([chunk[0], chunk[1]])))
        .collect();

    let step = 1.0 / (size - 1) as f64;
    let geometry = GridGeometry::new(
        size,
        size,
        lon as f64 - step / 2.0,
        lat as f64 + 1.0 + step / 2.0,
        step,
        step,
    );
    let data = Array2::from_shape_vec((size, size), samples)?;
    Ok(Raster::from_array(data, geometry, f64::from(SRTM_VOID))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::WorldPoint;

    #[test]
    fn test_tile_names() {
        assert_eq!(HgtLoader::tile_name(45, 5), "N45E005.hgt");
        assert_eq!(HgtLoader::tile_name(-3, -71), "S03W071.hgt");
    }

    #[test]
    fn test_unknown_size_rejected() {
        assert!(decode_tile(&[0u8; 10], 45, 5).is_err());
    }

    #[test]
    fn test_decode_small_tile() {
        // 3x3 samples, big-endian
        let values: [i16; 9] = [100, 200, 300, 400, SRTM_VOID, 600, 700, 800, 900];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let grid = decode_samples(&bytes, 3, 45, 5).unwrap();

        assert_eq!(grid.get(0, 0), Some(100.0));
        assert_eq!(grid.get(1, 1), None);
        // North-west corner sample sits on (lat + 1, lon)
        assert_eq!(grid.sample_world(WorldPoint::new(5.0, 46.0)), Some(100.0));
        // South-east corner sample sits on (lat, lon + 1)
        assert_eq!(grid.sample_world(WorldPoint::new(6.0, 45.0)), Some(900.0));
    }
}
