use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeoError {
    #[error("empty geohash")]
    Empty,

    #[error("invalid geohash character '{0}'")]
    InvalidCharacter(char),
}
