use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::geo::WorldPoint;

/// Column read for the height offset when none is given.
pub const DEFAULT_HEIGHT_FIELD: &str = "elev";

/// An observer point in the grid's world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(default)]
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Height above the terrain, meters.
    #[serde(default, alias = "elev")]
    pub height_offset: f64,
}

impl Station {
    pub fn new(name: impl Into<String>, x: f64, y: f64, height_offset: f64) -> Self {
        Self { name: name.into(), x, y, height_offset }
    }

    pub fn location(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }
}

pub fn load_stations_from_json<P: AsRef<Path>>(path: P) -> Result<Vec<Station>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let reader = std::io::BufReader::new(file);
    let stations: Vec<Station> =
        serde_json::from_reader(reader).with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(stations)
}

pub fn load_stations_from_csv<P: AsRef<Path>>(
    path: P,
    height_field: &str,
    default_height: Option<f64>,
) -> Result<Vec<Station>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    parse_stations_csv(file, height_field, default_height)
        .with_context(|| format!("Failed to parse {:?}", path))
}

/// Reads `x`, `y`, an optional `name` column and the height column from CSV.
///
/// Rows whose height is empty take `default_height`; without one they are rejected.
pub fn parse_stations_csv<R: std::io::Read>(
    reader: R,
    height_field: &str,
    default_height: Option<f64>,
) -> Result<Vec<Station>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let Some(x_idx) = column("x") else { bail!("CSV has no x column") };
    let Some(y_idx) = column("y") else { bail!("CSV has no y column") };
    let name_idx = column("name");
    let height_idx = column(height_field);

    if height_idx.is_none() && default_height.is_none() {
        bail!("CSV has no {:?} column and no default height was given", height_field);
    }

    let mut stations = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record?;
        let number = |idx: usize, what: &str| -> Result<f64> {
            let raw = record.get(idx).unwrap_or_default();
            raw.parse::<f64>()
                .with_context(|| format!("Row {}: bad {} value {:?}", line + 1, what, raw))
        };

        let x = number(x_idx, "x")?;
        let y = number(y_idx, "y")?;
        let height_offset = match height_idx.map(|idx| record.get(idx).unwrap_or_default()) {
            Some(raw) if !raw.is_empty() => raw
                .parse::<f64>()
                .with_context(|| {
                    format!("Row {}: bad {} value {:?}", line + 1, height_field, raw)
                })?,
            _ => match default_height {
                Some(h) => h,
                None => bail!("Row {}: missing {} value", line + 1, height_field),
            },
        };
        let name = name_idx
            .and_then(|idx| record.get(idx))
            .map(str::to_string)
            .unwrap_or_else(|| format!("station-{}", line + 1));

        stations.push(Station { name, x, y, height_offset });
    }
    Ok(stations)
}

/// Fingerprint of a station's location and height, used in cache keys.
pub fn station_hash(station: &Station) -> u64 {
    let mut hasher = DefaultHasher::new();
    station.x.to_bits().hash(&mut hasher);
    station.y.to_bits().hash(&mut hasher);
    station.height_offset.to_bits().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_json_accepts_elev_alias() {
        let json = r#"[{"name": "a", "x": 1.0, "y": 2.0, "elev": 3.5}, {"x": 4.0, "y": 5.0}]"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let stations = load_stations_from_json(file.path()).unwrap();
        assert_eq!(stations[0], Station::new("a", 1.0, 2.0, 3.5));
        assert_eq!(stations[1].height_offset, 0.0);
    }

    #[test]
    fn test_csv_with_custom_height_field() {
        let text = "name,x,y,mast\nhill,10,20,15\nvalley, 30 , 40 ,\n";
        let stations = parse_stations_csv(text.as_bytes(), "mast", Some(2.0)).unwrap();

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0], Station::new("hill", 10.0, 20.0, 15.0));
        assert_eq!(stations[1], Station::new("valley", 30.0, 40.0, 2.0));
    }

    #[test]
    fn test_csv_missing_height_rejected() {
        let text = "x,y\n1,2\n";
        assert!(parse_stations_csv(text.as_bytes(), "elev", None).is_err());

        let stations = parse_stations_csv(text.as_bytes(), "elev", Some(1.5)).unwrap();
        assert_eq!(stations[0].name, "station-1");
        assert_eq!(stations[0].height_offset, 1.5);
    }
}
