use glean_domain::GeoPoint;

use crate::error::GeoError;

const BASE32: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

// Adjacency lookup tables, indexed by `hash.len() % 2` (0 = even, 1 = odd).
const NEIGHBOR_N: [&str; 2] = ["p0r21436x8zb9dcf5h7kjnmqesgutwvy", "bc01fg45238967deuvhjyznpkmstqrwx"];
const NEIGHBOR_S: [&str; 2] = ["14365h7k9dcfesgujnmqp0r2twvyx8zb", "238967debc01fg45kmstqrwxuvhjyznp"];
const NEIGHBOR_E: [&str; 2] = ["bc01fg45238967deuvhjyznpkmstqrwx", "p0r21436x8zb9dcf5h7kjnmqesgutwvy"];
const NEIGHBOR_W: [&str; 2] = ["238967debc01fg45kmstqrwxuvhjyznp", "14365h7k9dcfesgujnmqp0r2twvyx8zb"];
const BORDER_N: [&str; 2] = ["prxz", "bcfguvyz"];
const BORDER_S: [&str; 2] = ["028b", "0145hjnp"];
const BORDER_E: [&str; 2] = ["bcfguvyz", "prxz"];
const BORDER_W: [&str; 2] = ["0145hjnp", "028b"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    fn neighbor_table(self, parity: usize) -> &'static str {
        match self {
            Direction::North => NEIGHBOR_N[parity],
            Direction::South => NEIGHBOR_S[parity],
            Direction::East => NEIGHBOR_E[parity],
            Direction::West => NEIGHBOR_W[parity],
        }
    }

    fn border_table(self, parity: usize) -> &'static str {
        match self {
            Direction::North => BORDER_N[parity],
            Direction::South => BORDER_S[parity],
            Direction::East => BORDER_E[parity],
            Direction::West => BORDER_W[parity],
        }
    }
}

// ── Encode ────────────────────────────────────────────────────────────────────

/// Encode a coordinate as a base-32 geohash. Precision is clamped to 1..=12
/// (precision 6 is a cell of roughly 1.2 km).
pub fn encode(lat: f64, lon: f64, precision: usize) -> String {
    let precision = precision.clamp(1, 12);
    let lat = lat.clamp(-90.0, 90.0);
    let lon = lon.clamp(-180.0, 180.0);

    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut bit = 0u8;
    let mut idx = 0usize;
    let mut even_bit = true; // longitude first

    while hash.len() < precision {
        if even_bit {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                idx = idx * 2 + 1;
                lon_range.0 = mid;
            } else {
                idx *= 2;
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                idx = idx * 2 + 1;
                lat_range.0 = mid;
            } else {
                idx *= 2;
                lat_range.1 = mid;
            }
        }
        even_bit = !even_bit;
        bit += 1;
        if bit == 5 {
            hash.push(BASE32[idx] as char);
            bit = 0;
            idx = 0;
        }
    }
    hash
}

// ── Decode ────────────────────────────────────────────────────────────────────

/// The bounding cell a geohash denotes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeohashCell {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl GeohashCell {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.lat_min + self.lat_max) / 2.0,
            (self.lon_min + self.lon_max) / 2.0,
        )
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.lat_min
            && point.lat <= self.lat_max
            && point.lon >= self.lon_min
            && point.lon <= self.lon_max
    }
}

/// Decode a geohash to its bounding cell.
pub fn decode(hash: &str) -> Result<GeohashCell, GeoError> {
    if hash.is_empty() {
        return Err(GeoError::Empty);
    }

    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut even_bit = true;

    for ch in hash.chars() {
        let idx = BASE32
            .iter()
            .position(|&b| b as char == ch)
            .ok_or(GeoError::InvalidCharacter(ch))?;
        for shift in (0..5).rev() {
            let bit = (idx >> shift) & 1;
            if even_bit {
                let mid = (lon_range.0 + lon_range.1) / 2.0;
                if bit == 1 {
                    lon_range.0 = mid;
                } else {
                    lon_range.1 = mid;
                }
            } else {
                let mid = (lat_range.0 + lat_range.1) / 2.0;
                if bit == 1 {
                    lat_range.0 = mid;
                } else {
                    lat_range.1 = mid;
                }
            }
            even_bit = !even_bit;
        }
    }

    Ok(GeohashCell {
        lat_min: lat_range.0,
        lat_max: lat_range.1,
        lon_min: lon_range.0,
        lon_max: lon_range.1,
    })
}

// ── Neighbors ─────────────────────────────────────────────────────────────────

fn adjacent(hash: &str, direction: Direction) -> Result<String, GeoError> {
    if hash.is_empty() {
        return Err(GeoError::Empty);
    }
    if let Some(bad) = hash.chars().find(|c| !c.is_ascii()) {
        return Err(GeoError::InvalidCharacter(bad));
    }
    let hash = hash.to_ascii_lowercase();
    let last = hash.chars().last().ok_or(GeoError::Empty)?;
    let parent = &hash[..hash.len() - 1];
    let parity = hash.len() % 2;

    let parent = if direction.border_table(parity).contains(last) && !parent.is_empty() {
        adjacent(parent, direction)?
    } else {
        parent.to_string()
    };

    let pos = direction
        .neighbor_table(parity)
        .chars()
        .position(|c| c == last)
        .ok_or(GeoError::InvalidCharacter(last))?;
    Ok(format!("{}{}", parent, BASE32[pos] as char))
}

/// The 8 cells surrounding `hash`, clockwise from north.
pub fn neighbors(hash: &str) -> Result<[String; 8], GeoError> {
    let n = adjacent(hash, Direction::North)?;
    let s = adjacent(hash, Direction::South)?;
    let e = adjacent(hash, Direction::East)?;
    let w = adjacent(hash, Direction::West)?;
    let ne = adjacent(&n, Direction::East)?;
    let se = adjacent(&s, Direction::East)?;
    let sw = adjacent(&s, Direction::West)?;
    let nw = adjacent(&n, Direction::West)?;
    Ok([n, ne, e, se, s, sw, w, nw])
}

// ── Radius sweep ──────────────────────────────────────────────────────────────

const KM_PER_MILE: f64 = 1.609_344;

/// Precision for a candidate sweep of the given radius: coarser cells for
/// wider radii so the center-plus-neighbors block covers the circle.
fn precision_for_radius(radius_miles: f64) -> usize {
    let radius_km = radius_miles * KM_PER_MILE;
    if radius_km > 20.0 {
        4
    } else if radius_km > 10.0 {
        5
    } else {
        6
    }
}

/// Geohash prefixes covering a search circle: the center cell plus its 8
/// neighbors at a radius-dependent precision. Results feed the store's
/// geohash-prefix index.
pub fn prefixes_for_radius(center: GeoPoint, radius_miles: f64) -> Vec<String> {
    let precision = precision_for_radius(radius_miles);
    let cell = encode(center.lat, center.lon, precision);
    let mut prefixes = vec![cell.clone()];
    // Neighbor lookup cannot fail on an encode() output.
    if let Ok(ring) = neighbors(&cell) {
        prefixes.extend(ring);
    }
    prefixes
}
