pub mod geo;
pub mod io;
pub mod terrain;
pub mod physics;
pub mod coverage;
pub mod cache;
pub mod error;


pub use coverage::{ViewshedConfig, ViewshedEngine, ViewshedProgress, ViewshedRun, compute_viewshed};
pub use error::{ViewshedError, ViewshedResult};
pub use io::Station;
pub use terrain::{CountGrid, ElevationGrid, Raster};
