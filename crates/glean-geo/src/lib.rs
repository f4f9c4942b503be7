pub mod error;
pub mod geohash;
pub mod distance;

pub use distance::{haversine_miles, EARTH_RADIUS_MILES};
pub use error::GeoError;
pub use geohash::{decode, encode, neighbors, prefixes_for_radius, GeohashCell};
