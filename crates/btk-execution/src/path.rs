//! Intraday stochastic path reconstruction from one OHLC bar (§4.5).

use btk_core::{OhlcBar, OrderKind, Price, Side, MICROS_PER_UNIT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{ChiSquared, Distribution, StandardNormal};

/// Path points are always derived from already-clamped `f64` values inside
/// `[bar.low, bar.high]`, so this never sees a non-positive input — unlike
/// [`Price::from_f64`], which is reserved for untrusted wire input.
fn price_from_path_value(v: f64) -> Price {
    Price::from_micros_unchecked((v * MICROS_PER_UNIT as f64).round() as i64)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathProfile {
    UShaped,
    JShaped,
    ReverseJ,
    Uniform,
}

#[derive(Copy, Clone, Debug)]
pub struct PathConfig {
    pub total_points: usize,
    pub profile: PathProfile,
    pub seed: Option<u64>,
    pub degrees_of_freedom: f64,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            total_points: 390,
            profile: PathProfile::UShaped,
            seed: None,
            degrees_of_freedom: 4.0,
        }
    }
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Samples one Student-t(df) draw as `Z / sqrt(V / df)`, `Z ~ N(0,1)`,
/// `V ~ ChiSq(df)`, per §4.5 step 5.
fn sample_student_t(rng: &mut StdRng, df: f64) -> f64 {
    let z: f64 = StandardNormal.sample(rng);
    let chi = ChiSquared::new(df).expect("degrees_of_freedom must be > 0");
    let v: f64 = chi.sample(rng);
    z / (v / df).sqrt()
}

/// Step 2: probability that the bar's high occurs before its low.
fn high_first_probability(open: f64, close: f64, volatility_scale: f64) -> f64 {
    let confidence = 1.0 / volatility_scale.max(1.0);
    let mut p = 0.5;
    if close > open {
        p += 0.3 / confidence;
    } else if close < open {
        p -= 0.3 / confidence;
    }
    p.clamp(0.2, 0.8)
}

/// Step 3: geometric mean of a shape factor and a magnitude factor.
fn volatility_scale(open: f64, high: f64, low: f64, close: f64) -> f64 {
    let body = (close - open).abs();
    let range = high - low;
    if range == 0.0 {
        return 0.0;
    }
    let shape = if body == 0.0 {
        2.0
    } else {
        (range / body / 2.5).min(2.0)
    };
    let magnitude = ((range / open) / 0.02).min(2.0);
    (shape * magnitude).sqrt()
}

/// Step 4: density functions for rejection-sampling waypoint time indices,
/// and each density's maximum (the rejection-sampling bound).
fn density(profile: PathProfile, t: f64) -> f64 {
    match profile {
        PathProfile::UShaped => 2.0 * (t * t + (1.0 - t) * (1.0 - t)),
        PathProfile::JShaped => (-3.0 * t).exp(),
        PathProfile::ReverseJ => (3.0 * (t - 1.0)).exp(),
        PathProfile::Uniform => 1.0,
    }
}

fn density_bound(profile: PathProfile) -> f64 {
    match profile {
        PathProfile::UShaped => 2.0,
        PathProfile::JShaped | PathProfile::ReverseJ | PathProfile::Uniform => 1.0,
    }
}

fn sample_waypoint_index(rng: &mut StdRng, profile: PathProfile, total_points: usize) -> usize {
    let lo = 1usize;
    let hi = total_points.saturating_sub(2).max(lo);
    if profile == PathProfile::Uniform {
        // Middle 60% of the index range.
        let span = total_points as f64;
        let low_t = 0.2;
        let high_t = 0.8;
        let t: f64 = rng.gen_range(low_t..=high_t);
        let idx = (t * (span - 1.0)).round() as usize;
        return idx.clamp(lo, hi);
    }

    let bound = density_bound(profile);
    loop {
        let t: f64 = rng.gen_range(0.0..=1.0);
        let u: f64 = rng.gen_range(0.0..=bound);
        if u <= density(profile, t) {
            let idx = (t * (total_points as f64 - 1.0)).round() as usize;
            return idx.clamp(lo, hi);
        }
    }
}

fn sample_two_waypoint_indices(
    rng: &mut StdRng,
    profile: PathProfile,
    total_points: usize,
) -> (usize, usize) {
    let mut t1 = sample_waypoint_index(rng, profile, total_points);
    let mut t2 = sample_waypoint_index(rng, profile, total_points);
    let lo = 1usize;
    let hi = total_points.saturating_sub(2).max(lo);
    if t1 == t2 {
        if t2 < hi {
            t2 += 1;
        } else if t1 > lo {
            t1 -= 1;
        }
    }
    if t1 <= t2 {
        (t1, t2)
    } else {
        (t2, t1)
    }
}

/// Brownian-bridge interpolation between two fixed endpoints, conditioned to
/// hit `end_price` exactly on the final generated point (§4.5 step 5).
fn bridge_segment(
    rng: &mut StdRng,
    start_idx: usize,
    start_price: f64,
    end_idx: usize,
    end_price: f64,
    low: f64,
    high: f64,
    total_points: usize,
    volatility_scale: f64,
    df: f64,
) -> Vec<f64> {
    let n = end_idx - start_idx;
    let mut out = Vec::with_capacity(n);
    if n == 0 {
        return out;
    }
    let dt = n as f64 / total_points as f64;
    let mut current = start_price;
    for step in 1..=n {
        let remaining = (n - step + 1) as f64;
        let new_price = if step == n {
            end_price
        } else {
            let drift = (end_price - current) / remaining;
            let noise =
                sample_student_t(rng, df) * volatility_scale * (dt / (n as f64 + 1.0)).sqrt();
            (current + drift + noise).clamp(low, high)
        };
        out.push(new_price);
        current = new_price;
    }
    out
}

/// Generates one intraday price path from `bar`. Deterministic for a given
/// `config.seed`; non-deterministic otherwise.
pub fn generate_path(bar: &OhlcBar, config: &PathConfig) -> Vec<Price> {
    let mut rng = rng_for(config.seed);

    let open = bar.open.to_f64();
    let high = bar.high.to_f64();
    let low = bar.low.to_f64();
    let close = bar.close.to_f64();

    let vscale = volatility_scale(open, high, low, close);
    let p_high_first = high_first_probability(open, close, vscale);
    let high_first = rng.gen_bool(p_high_first);

    let (extreme1, extreme2) = if high_first { (high, low) } else { (low, high) };

    if config.total_points <= 4 {
        return [open, extreme1, extreme2, close]
            .into_iter()
            .map(price_from_path_value)
            .collect();
    }

    let (t1, t2) = sample_two_waypoint_indices(&mut rng, config.profile, config.total_points);
    let last_idx = config.total_points - 1;

    let mut points_f64: Vec<f64> = Vec::with_capacity(config.total_points);
    points_f64.push(open);
    points_f64.extend(bridge_segment(
        &mut rng, 0, open, t1, extreme1, low, high, config.total_points, vscale,
        config.degrees_of_freedom,
    ));
    points_f64.extend(bridge_segment(
        &mut rng, t1, extreme1, t2, extreme2, low, high, config.total_points, vscale,
        config.degrees_of_freedom,
    ));
    points_f64.extend(bridge_segment(
        &mut rng, t2, extreme2, last_idx, close, low, high, config.total_points, vscale,
        config.degrees_of_freedom,
    ));

    points_f64.into_iter().map(price_from_path_value).collect()
}

/// Early-exit predicate: can `kind` possibly fill anywhere on `bar`, without
/// walking the generated path (§4.5).
pub fn might_fill(bar: &OhlcBar, side: Side, kind: OrderKind) -> bool {
    match kind {
        OrderKind::Market => true,
        OrderKind::Limit(l) => match side {
            Side::Buy => bar.low <= l,
            Side::Sell => bar.high >= l,
        },
        OrderKind::Stop(s) => match side {
            Side::Buy => bar.high >= s,
            Side::Sell => bar.low <= s,
        },
        OrderKind::StopLimit { stop, limit } => {
            might_fill(bar, side, OrderKind::Stop(stop)) && might_fill(bar, side, OrderKind::Limit(limit))
        }
    }
}
