/// Errors raised by the viewshed core before any station is processed.
///
/// Station-local problems are never errors: they are logged and the station skipped.
#[derive(Debug, thiserror::Error)]
pub enum ViewshedError {
    #[error("no stations supplied")]
    EmptyStations,

    #[error("elevation grid has no cells")]
    EmptyGrid,

    #[error("invalid grid geometry: {0}")]
    InvalidGeometry(String),

    #[error("raster shape mismatch: expected {expected:?}, got {actual:?}")]
    Shape {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

pub type ViewshedResult<T> = Result<T, ViewshedError>;
