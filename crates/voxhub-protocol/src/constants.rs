/// Protocol version advertised in the welcome frame.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Language used when a client does not pick one.
pub const DEFAULT_LANGUAGE: &str = "id-ID";

pub const DEFAULT_SPEED: f64 = 1.0;
pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;

/// Bound a requested speaking rate. Missing or non-finite rates fall back to
/// the default.
pub fn clamp_speed(speed: Option<f64>) -> f64 {
    match speed {
        Some(s) if s.is_finite() => s.clamp(MIN_SPEED, MAX_SPEED),
        _ => DEFAULT_SPEED,
    }
}

/// Default inclusive maximum for trimmed work text, in characters.
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 2000;
