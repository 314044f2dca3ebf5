// calories.rs — energy expenditure estimation.
//
// Three estimators share one accounting rule for the ruck load: the
// MET path multiplies by body weight only (load enters through the
// MET coefficient), the mechanical path models the load mass
// explicitly in the Pandolf terms. The load is never counted twice.

use crate::config::{CalorieMethod, TrackerConfig};
use crate::types::{Gender, UserProfile};

/// Everything the estimators consume, assembled by the coordinator on
/// each tick and at completion.
#[derive(Clone, Debug)]
pub struct CalorieInput {
    pub distance_km: f64,
    pub elapsed_secs: f64,
    pub ruck_weight_kg: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    /// Distance-weighted terrain cost, >= 1.0.
    pub terrain_multiplier: f64,
    /// Mean heart rate over the session, if any samples arrived.
    pub avg_hr: Option<f64>,
    /// Fraction of elapsed time covered by heart-rate samples, 0..=1.
    pub hr_coverage: f64,
}

const KCAL_PER_JOULE: f64 = 1.0 / 4186.0;
const KM_TO_MILES: f64 = 0.621_371;
const KG_TO_LBS: f64 = 2.204_62;

/// Bound the time used for energy calculation. Elapsed time can
/// include idle or near-stationary stretches; re-derive a duration
/// from the average speed clamped to a plausible rucking band and
/// take the smaller of the two.
pub fn active_time_secs(distance_km: f64, elapsed_secs: f64, config: &TrackerConfig) -> f64 {
    if distance_km <= 0.0 || elapsed_secs <= 0.0 {
        return 0.0;
    }
    let avg_speed_kmh = distance_km / (elapsed_secs / 3600.0);
    let clamped = avg_speed_kmh.clamp(
        config.plausible_speed_min_kmh,
        config.plausible_speed_max_kmh,
    );
    let rederived_secs = distance_km / clamped * 3600.0;
    elapsed_secs.min(rederived_secs)
}

/// Dynamic MET for rucking at a given speed, grade and load.
/// Speed bands and adjustments follow standard walking compendium
/// values, clamped to [2, 15].
fn rucking_met(speed_mph: f64, grade_pct: f64, ruck_weight_lbs: f64) -> f64 {
    let base_met = if speed_mph < 2.0 {
        2.5
    } else if speed_mph < 2.5 {
        3.0
    } else if speed_mph < 3.0 {
        3.5
    } else if speed_mph < 3.5 {
        4.0
    } else if speed_mph < 4.0 {
        4.5
    } else if speed_mph < 5.0 {
        5.0
    } else {
        6.0
    };

    let grade_adjustment = if grade_pct > 0.0 {
        grade_pct * 0.6 * (speed_mph / 4.0)
    } else if grade_pct < 0.0 {
        let abs_grade = grade_pct.abs();
        if abs_grade <= 10.0 {
            // Gentle downhill is easier than flat.
            -abs_grade * 0.1
        } else {
            // Steep downhill costs braking energy.
            (abs_grade - 10.0) * 0.15
        }
    } else {
        0.0
    };

    let load_adjustment = (ruck_weight_lbs * 0.05).min(5.0);

    (base_met + grade_adjustment + load_adjustment).clamp(2.0, 15.0)
}

fn gender_factor(gender: Option<Gender>) -> f64 {
    match gender {
        Some(Gender::Male) => 1.0,
        Some(Gender::Female) => 0.85,
        None => 0.925,
    }
}

fn average_grade_pct(input: &CalorieInput) -> f64 {
    if input.distance_km <= 0.0 {
        return 0.0;
    }
    (input.elevation_gain_m - input.elevation_loss_m) / (input.distance_km * 1000.0) * 100.0
}

/// MET-based estimate over body weight only.
pub fn met_calories(input: &CalorieInput, profile: &UserProfile, config: &TrackerConfig) -> f64 {
    let active_secs = active_time_secs(input.distance_km, input.elapsed_secs, config);
    if active_secs <= 0.0 {
        return 0.0;
    }
    let hours = active_secs / 3600.0;
    let speed_mph = input.distance_km / hours * KM_TO_MILES;
    let met = rucking_met(
        speed_mph,
        average_grade_pct(input),
        input.ruck_weight_kg * KG_TO_LBS,
    );

    let base = met * profile.weight_kg * hours;
    (base * input.terrain_multiplier * gender_factor(profile.gender)).max(0.0)
}

/// Pandolf load-carriage model with a pace correction for fast,
/// loaded movement, metabolic rate clamped to [50, 800] W.
pub fn mechanical_calories(
    input: &CalorieInput,
    profile: &UserProfile,
    config: &TrackerConfig,
) -> f64 {
    let active_secs = active_time_secs(input.distance_km, input.elapsed_secs, config);
    if active_secs <= 0.0 || profile.weight_kg <= 0.0 {
        return 0.0;
    }
    let speed_kmh = input.distance_km / (active_secs / 3600.0);
    let v = (speed_kmh / 3.6).min(3.0); // m/s
    let w = profile.weight_kg;
    let l = input.ruck_weight_kg;
    let g = average_grade_pct(input).clamp(-20.0, 30.0);
    let lw = l / w;

    let term_load = 2.0 * (w + l) * (lw * lw);
    let term_speed = (w + l) * (1.5 * v * v + 0.35 * v * g);
    let mut watts = 1.5 * w + term_load + term_speed;

    // Loaded movement above 2 mph costs more than Pandolf predicts.
    if lw > 0.0 && speed_kmh > 3.2 {
        let base_adj = (lw * 0.45).min(0.15);
        let speed_factor = ((speed_kmh - 3.2) / 3.2).min(1.0);
        watts *= 1.0 + base_adj * speed_factor;
    }

    watts = watts.clamp(50.0, 800.0);
    let kcal = watts * KCAL_PER_JOULE * active_secs;
    (kcal * input.terrain_multiplier * gender_factor(profile.gender)).max(0.0)
}

/// Keytel heart-rate regression, kcal over the active period.
fn heart_rate_calories(
    avg_hr: f64,
    profile: &UserProfile,
    active_secs: f64,
) -> f64 {
    let age = profile.age.unwrap_or(30) as f64;
    let weight = profile.weight_kg;
    let kcal_per_min = match profile.gender {
        Some(Gender::Female) => {
            (-20.4022 + 0.4472 * avg_hr - 0.1263 * weight + 0.074 * age) / 4.184
        }
        _ => (-55.0969 + 0.6309 * avg_hr + 0.1988 * weight + 0.2017 * age) / 4.184,
    };
    (kcal_per_min * active_secs / 60.0).max(0.0)
}

/// Blend the heart-rate estimate into the mechanical one. The blend
/// weight scales with HR coverage, so the estimate stays continuous
/// when heart-rate data first appears mid-session, and the result is
/// capped to ±15 % of the mechanical estimate to reject implausible
/// extremes.
pub fn fused_calories(input: &CalorieInput, profile: &UserProfile, config: &TrackerConfig) -> f64 {
    let mechanical = mechanical_calories(input, profile, config);
    let avg_hr = match input.avg_hr {
        Some(hr) if hr > 0.0 => hr,
        _ => return mechanical,
    };

    let active_secs = active_time_secs(input.distance_km, input.elapsed_secs, config);
    let hr_estimate = heart_rate_calories(avg_hr, profile, active_secs);

    let blend = input.hr_coverage.clamp(0.0, 1.0) * 0.5;
    let fused = mechanical * (1.0 - blend) + hr_estimate * blend;

    fused.clamp(mechanical * 0.85, mechanical * 1.15)
}

/// Dispatch on the configured method. `Fused` falls back to the
/// mechanical estimate when no heart-rate data is present.
pub fn estimate(
    input: &CalorieInput,
    profile: &UserProfile,
    config: &TrackerConfig,
) -> f64 {
    match config.calorie_method {
        CalorieMethod::Met => met_calories(input, profile, config),
        CalorieMethod::Mechanical => mechanical_calories(input, profile, config),
        CalorieMethod::Fused => fused_calories(input, profile, config),
    }
}
