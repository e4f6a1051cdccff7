//! ESRI ASCII grid (`.asc`) reading and writing.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use ndarray::Array2;

use super::{DEFAULT_NOVALUE, Raster};
use crate::geo::GridGeometry;

pub fn read_ascii_grid<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    parse_ascii_grid(BufReader::new(file)).with_context(|| format!("Failed to parse {:?}", path))
}

pub fn parse_ascii_grid<R: Read>(reader: R) -> Result<Raster> {
    let mut lines = BufReader::new(reader).lines();

    let mut cols = None;
    let mut rows = None;
    let mut x_corner = None;
    let mut y_corner = None;
    let mut x_center = None;
    let mut y_center = None;
    let mut cell_size = None;
    let mut novalue = DEFAULT_NOVALUE;
    let mut first_data_line = None;

    for line in lines.by_ref() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let key = parts.next().unwrap_or_default().to_ascii_lowercase();
        let value = parts.next();

        let parse = |v: Option<&str>| -> Result<f64> {
            let v = v.with_context(|| format!("Missing value for header {}", key))?;
            v.parse::<f64>().with_context(|| format!("Bad value {:?} for header {}", v, key))
        };
        let count = |v: Option<&str>| -> Result<usize> {
            let v = v.with_context(|| format!("Missing value for header {}", key))?;
            match v.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => bail!("Header {} must be a positive integer, got {:?}", key, v),
            }
        };

        match key.as_str() {
            "ncols" => cols = Some(count(value)?),
            "nrows" => rows = Some(count(value)?),
            "xllcorner" => x_corner = Some(parse(value)?),
            "yllcorner" => y_corner = Some(parse(value)?),
            "xllcenter" => x_center = Some(parse(value)?),
            "yllcenter" => y_center = Some(parse(value)?),
            "cellsize" => cell_size = Some(parse(value)?),
            "nodata_value" => novalue = parse(value)?,
            _ => {
                first_data_line = Some(line);
                break;
            }
        }
    }

    let (Some(cols), Some(rows), Some(cell_size)) = (cols, rows, cell_size) else {
        bail!("ASCII grid header must declare ncols, nrows and cellsize");
    };
    let west = match (x_corner, x_center) {
        (Some(x), _) => x,
        (None, Some(x)) => x - cell_size / 2.0,
        (None, None) => bail!("ASCII grid header must declare xllcorner or xllcenter"),
    };
    let south = match (y_corner, y_center) {
        (Some(y), _) => y,
        (None, Some(y)) => y - cell_size / 2.0,
        (None, None) => bail!("ASCII grid header must declare yllcorner or yllcenter"),
    };

    let Some(expected) = cols.checked_mul(rows) else {
        bail!("Grid of {}x{} cells is too large", cols, rows);
    };

    let mut samples = Vec::new();
    let data_lines = first_data_line.into_iter().map(Ok::<String, std::io::Error>).chain(lines);
    for line in data_lines {
        let line = line?;
        for token in line.split_whitespace() {
            let value: f64 = token.parse().with_context(|| format!("Bad sample {:?}", token))?;
            if samples.len() == expected {
                bail!("More than {} samples ({}x{})", expected, cols, rows);
            }
            samples.push(value);
        }
    }

    if samples.len() != expected {
        bail!("Expected {} samples ({}x{}), found {}", expected, cols, rows, samples.len());
    }

    let geometry = GridGeometry::from_lower_left(cols, rows, west, south, cell_size);
    let data = Array2::from_shape_vec((rows, cols), samples)?;
    Ok(Raster::from_array(data, geometry, novalue)?)
}

pub fn write_ascii_grid<P: AsRef<Path>>(path: P, raster: &Raster) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    format_ascii_grid(&mut writer, raster)?;
    writer.flush()?;
    Ok(())
}

pub fn format_ascii_grid<W: Write>(writer: &mut W, raster: &Raster) -> Result<()> {
    let geometry = &raster.geometry;
    let skew = (geometry.cell_width - geometry.cell_height).abs();
    if skew > f64::EPSILON * geometry.cell_width.abs() {
        bail!(
            "ASCII grids need square cells, got {}x{}",
            geometry.cell_width,
            geometry.cell_height
        );
    }

    writeln!(writer, "ncols {}", geometry.cols)?;
    writeln!(writer, "nrows {}", geometry.rows)?;
    writeln!(writer, "xllcorner {}", geometry.west)?;
    writeln!(writer, "yllcorner {}", geometry.south())?;
    writeln!(writer, "cellsize {}", geometry.cell_width)?;
    writeln!(writer, "NODATA_value {}", raster.novalue)?;

    for row in raster.data.rows() {
        let line = row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ");
        writeln!(writer, "{}", line)?;
    }
    Ok(())
}
