use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single GPS fix as delivered by the platform location service.
///
/// Immutable once produced; the location manager appends accepted
/// points to an ordered sequence and never rewrites them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocationPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude above sea level in meters.
    pub elevation_m: f64,
    /// Reported horizontal accuracy radius in meters.
    pub horizontal_accuracy_m: f64,
    /// Instantaneous speed reported by the receiver, m/s.
    pub speed_mps: f64,
    pub timestamp: DateTime<Utc>,
}

/// One heart-rate reading from the sensor feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub bpm: u16,
    pub timestamp: DateTime<Utc>,
}

/// Distance unit for split boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitPreference {
    Metric,
    Imperial,
}

impl UnitPreference {
    /// Length of one split in kilometers.
    pub fn split_length_km(self) -> f64 {
        match self {
            UnitPreference::Metric => 1.0,
            UnitPreference::Imperial => 1.609_344,
        }
    }
}

/// A completed fixed-distance interval.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Split {
    /// 1-based split number.
    pub index: u32,
    /// Cumulative distance at the moment the boundary was crossed.
    pub distance_km: f64,
    /// Session elapsed seconds at the boundary.
    pub duration_secs: i64,
    pub timestamp: DateTime<Utc>,
}

/// Surface classification for a stretch of track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerrainKind {
    Pavement,
    Trail,
    Grass,
    Gravel,
    Sand,
    Snow,
}

impl TerrainKind {
    /// Energy cost multiplier relative to pavement.
    pub fn energy_multiplier(self) -> f64 {
        match self {
            TerrainKind::Pavement => 1.0,
            TerrainKind::Trail | TerrainKind::Grass => 1.2,
            TerrainKind::Gravel => 1.3,
            TerrainKind::Sand => 1.8,
            TerrainKind::Snow => 2.5,
        }
    }
}

/// A stretch of track with a uniform terrain cost.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainSegment {
    pub distance_km: f64,
    pub energy_multiplier: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// User attributes consumed by the calorie estimators.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub weight_kg: f64,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub resting_hr: Option<u16>,
}

impl UserProfile {
    pub fn new(weight_kg: f64) -> Self {
        UserProfile {
            weight_kg,
            age: None,
            gender: None,
            resting_hr: None,
        }
    }
}

/// Distance-weighted mean of terrain multipliers, 1.0 when no
/// segments have been recorded.
pub fn weighted_terrain_multiplier(segments: &[TerrainSegment]) -> f64 {
    let total: f64 = segments.iter().map(|s| s.distance_km).sum();
    if total <= 0.0 {
        return 1.0;
    }
    segments
        .iter()
        .map(|s| s.energy_multiplier * s.distance_km)
        .sum::<f64>()
        / total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terrain_multiplier_is_distance_weighted() {
        let segments = vec![
            TerrainSegment { distance_km: 3.0, energy_multiplier: 1.0 },
            TerrainSegment { distance_km: 1.0, energy_multiplier: 1.8 },
        ];
        let m = weighted_terrain_multiplier(&segments);
        assert!((m - 1.2).abs() < 1e-9);
    }

    #[test]
    fn terrain_multiplier_defaults_to_pavement() {
        assert_eq!(weighted_terrain_multiplier(&[]), 1.0);
    }

    #[test]
    fn imperial_split_is_a_mile() {
        assert!((UnitPreference::Imperial.split_length_km() - 1.609_344).abs() < 1e-9);
        assert_eq!(UnitPreference::Metric.split_length_km(), 1.0);
    }
}
