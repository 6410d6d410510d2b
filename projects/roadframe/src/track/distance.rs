use super::GeoTrack;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use geo::HaversineDistance;

/// Cumulative path length along a track, one entry per waypoint.
///
/// `distance_m[0] == 0` and the sequence never decreases. Times are kept as
/// seconds relative to the first waypoint so interpolation stays in `f64`.
#[derive(Debug, Clone)]
pub struct CumulativeDistanceTable {
    origin: DateTime<Utc>,
    distance_m: Vec<f64>,
    offset_s: Vec<f64>,
}

impl CumulativeDistanceTable {
    pub fn from_track(track: &GeoTrack) -> Result<Self> {
        let waypoints = track.waypoints();
        let first = waypoints
            .first()
            .ok_or_else(|| Error::input("No GPS points found in GPX file"))?;

        let mut distance_m = Vec::with_capacity(waypoints.len());
        let mut offset_s = Vec::with_capacity(waypoints.len());
        let mut total = 0.0;
        distance_m.push(total);
        offset_s.push(0.0);

        for pair in waypoints.windows(2) {
            total += pair[0].point().haversine_distance(&pair[1].point());
            distance_m.push(total);
            offset_s.push(seconds_between(first.timestamp, pair[1].timestamp));
        }

        Ok(Self {
            origin: first.timestamp,
            distance_m,
            offset_s,
        })
    }

    pub fn len(&self) -> usize {
        self.distance_m.len()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.distance_m.last().copied().unwrap_or(0.0)
    }

    #[cfg(test)]
    pub fn distances(&self) -> &[f64] {
        &self.distance_m
    }

    /// Seconds since the first waypoint at the given path distance.
    ///
    /// An exact table hit returns the first entry at that distance, so a
    /// vehicle standing still maps to the moment it arrived.
    pub fn offset_at(&self, distance_m: f64) -> f64 {
        let n = self.distance_m.len();
        if distance_m <= self.distance_m[0] {
            return self.offset_s[0];
        }
        if distance_m >= self.distance_m[n - 1] {
            return self.offset_s[n - 1];
        }

        let hi = self.distance_m.partition_point(|&d| d < distance_m);
        if self.distance_m[hi] == distance_m {
            return self.offset_s[hi];
        }

        let lo = hi - 1;
        let (d0, d1) = (self.distance_m[lo], self.distance_m[hi]);
        let (t0, t1) = (self.offset_s[lo], self.offset_s[hi]);
        t0 + (t1 - t0) * (distance_m - d0) / (d1 - d0)
    }

    pub fn instant_at(&self, distance_m: f64) -> DateTime<Utc> {
        let offset = self.offset_at(distance_m);
        self.origin + Duration::microseconds((offset * 1_000_000.0).round() as i64)
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

/// A query point along the path and the moment the vehicle passed it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleQuery {
    pub distance_m: f64,
    /// Seconds since the first query (the start of the track).
    pub offset_s: f64,
    pub instant: DateTime<Utc>,
}

/// Samples a track at equal ground-distance spacing.
#[derive(Debug, Clone, Copy)]
pub struct DistanceSampler {
    pub interval_m: f64,
}

impl DistanceSampler {
    pub fn new(interval_m: f64) -> Self {
        Self { interval_m }
    }

    /// Query distances are `0, interval, 2 * interval, ...` strictly below the
    /// total path length, each mapped to an interpolated instant.
    pub fn sample(&self, track: &GeoTrack) -> Result<Vec<SampleQuery>> {
        if !self.interval_m.is_finite() || self.interval_m <= 0.0 {
            return Err(Error::input(format!(
                "Distance interval must be positive, got {}",
                self.interval_m
            )));
        }

        let table = CumulativeDistanceTable::from_track(track)?;
        let total = table.total_distance_m();
        if total <= 0.0 {
            return Err(Error::input("GPS track spans zero distance"));
        }

        let mut queries = Vec::new();
        let mut k = 0u64;
        loop {
            let distance_m = k as f64 * self.interval_m;
            if distance_m >= total {
                break;
            }
            queries.push(SampleQuery {
                distance_m,
                offset_s: table.offset_at(distance_m),
                instant: table.instant_at(distance_m),
            });
            k += 1;
        }

        tracing::debug!(
            "DistanceSampler: {} waypoints, total {:.1} m, {} queries at {} m",
            table.len(),
            total,
            queries.len(),
            self.interval_m
        );

        Ok(queries)
    }
}

/// A video frame chosen for a distance query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedFrame {
    pub frame_index: usize,
    pub query: SampleQuery,
}

/// Maps query instants to frame indices with
/// `round(fps * (instant - first_instant))`.
///
/// Consecutive queries landing on the same frame are collapsed to the first
/// one; the later query is dropped, not moved to the next frame.
pub fn plan_frames(queries: &[SampleQuery], fps: f64) -> Vec<PlannedFrame> {
    let Some(first) = queries.first() else {
        return Vec::new();
    };

    let mut planned: Vec<PlannedFrame> = Vec::with_capacity(queries.len());
    for query in queries {
        let elapsed = query.offset_s - first.offset_s;
        let frame_index = (fps * elapsed).round().max(0.0) as usize;
        if planned.last().map(|p| p.frame_index) == Some(frame_index) {
            continue;
        }
        planned.push(PlannedFrame {
            frame_index,
            query: *query,
        });
    }
    planned
}
