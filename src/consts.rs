// Constants of the crayfish update rule.

/// Lowest ambient temperature the search samples.
pub const TEMPERATURE_MIN: f64 = 20.;
/// Width of the temperature range, temperatures live in [20, 35).
pub const TEMPERATURE_SPAN: f64 = 15.;
/// Above this temperature the swarm is in the summer resort / competition regime.
pub const HOT_TEMPERATURE_THRESHOLD: f64 = 30.;

/// Centre (mean) of the intake curve, in degrees.
pub const INTAKE_MEAN_TEMPERATURE: f64 = 25.;
/// Spread (standard deviation) of the intake curve.
pub const INTAKE_SPREAD: f64 = 3.;
/// Scale applied to the intake density.
pub const INTAKE_SCALE: f64 = 0.2;

/// Food larger than this intake ratio is broken down before eating.
pub const FOOD_SIZE_THRESHOLD: f64 = 2.;
/// Probability of heading for the shelter (rather than competing) when hot.
pub const SHELTER_PROBABILITY: f64 = 0.5;

/// Initial value of the annealed control factor `C`.
pub const CONTROL_FACTOR_START: f64 = 2.;
