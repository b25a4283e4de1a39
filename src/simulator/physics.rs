use rand::Rng;

/// Nominal value plus uniform noise in `[-spread, spread)`.
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, base: f64, spread: f64) -> f64 {
    base + rng.gen_range(-spread..spread)
}

/// Random walk step from the current reading, biased by the asymmetric bounds.
pub fn drift<R: Rng + ?Sized>(rng: &mut R, current: f64, down: f64, up: f64) -> f64 {
    current + rng.gen_range(-down..up)
}

/// NaN lands on the upper bound.
pub fn clamp_band(value: f64, band: (f64, f64)) -> f64 {
    if value.is_nan() {
        return band.1;
    }
    value.clamp(band.0, band.1)
}

pub fn power_from_cutting_speed(target_power: f64, cutting_speed: f64) -> f64 {
    // 2 kW per m/min away from the 20 m/min reference speed
    target_power + (cutting_speed - 20.0) * 2.0
}

/// Bernoulli trial.
pub fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}
