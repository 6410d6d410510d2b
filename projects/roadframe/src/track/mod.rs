// GPS track input: ordered geodetic waypoints with time stamps

pub mod distance;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// A single timestamped position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl Waypoint {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    pub fn point(&self) -> geo_types::Point<f64> {
        geo_types::Point::new(self.longitude, self.latitude)
    }
}

/// Ordered waypoints of one recording. Insertion order is temporal order and
/// is never rearranged.
#[derive(Debug, Clone, Default)]
pub struct GeoTrack {
    waypoints: Vec<Waypoint>,
}

impl GeoTrack {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        if let Some(i) = waypoints
            .windows(2)
            .position(|w| w[1].timestamp < w[0].timestamp)
        {
            tracing::warn!(
                "GeoTrack: time stamps go backwards at waypoint {}, keeping file order",
                i + 1
            );
        }
        Self { waypoints }
    }

    pub fn from_gpx_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::input(format!("cannot open track {}: {}", path.display(), e)))?;
        Self::from_gpx_reader(BufReader::new(file))
    }

    /// Flattens every track and segment of a GPX document, in file order.
    pub fn from_gpx_reader<R: Read>(reader: R) -> Result<Self> {
        let doc =
            gpx::read(reader).map_err(|e| Error::input(format!("Error parsing GPX file: {}", e)))?;

        let mut waypoints = Vec::new();
        let mut untimed = 0usize;
        for track in doc.tracks {
            for segment in track.segments {
                for point in segment.points {
                    let Some(time) = point.time else {
                        untimed += 1;
                        continue;
                    };
                    let iso = time
                        .format()
                        .map_err(|e| Error::input(format!("Error parsing GPX file: {}", e)))?;
                    let timestamp = DateTime::parse_from_rfc3339(&iso)
                        .map_err(|e| Error::input(format!("Error parsing GPX file: {}", e)))?
                        .with_timezone(&Utc);
                    let position = point.point();
                    waypoints.push(Waypoint::new(position.y(), position.x(), timestamp));
                }
            }
        }

        if untimed > 0 {
            tracing::warn!("GeoTrack: skipped {} track points without a time stamp", untimed);
        }
        if waypoints.is_empty() {
            return Err(Error::input("No GPS points found in GPX file"));
        }

        Ok(Self::new(waypoints))
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }
}
