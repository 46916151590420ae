//! trailfuse geo - GPS track validation and projection
//!
//! Turns validated GPS records into planar movement records: tracks are
//! cleaned (ordering, duplicates, speed spikes, gaps), bounded and projected
//! through Web Mercator into a normalized square.

pub mod map_client;
pub mod projection;
pub mod track;
pub mod validation;

pub use map_client::StaticMapClient;
pub use projection::{calculate_bounds, lat_to_mercator_y, lng_to_x, to_pixels, GeoBounds};
pub use track::{project_track, project_with_bounds, ProjectedTrack};
pub use validation::{is_valid_gps_point, validate_track, GpsValidationReport};
