use crate::consts::{INTAKE_MEAN_TEMPERATURE, INTAKE_SCALE, INTAKE_SPREAD};
use rand::prelude::*;
use statrs::distribution::{Continuous, Normal};
use std::f64::consts::PI;

/// Temperature dependent intake of a crayfish, a scaled normal density
/// centred on the ideal temperature.
#[derive(Debug, Clone)]
pub struct IntakeCurve {
    density: Normal,
}

impl IntakeCurve {
    pub fn new() -> Result<Self, String> {
        Normal::new(INTAKE_MEAN_TEMPERATURE, INTAKE_SPREAD)
            .map(|density| IntakeCurve { density })
            .map_err(|e| e.to_string())
    }

    pub fn probability(&self, temperature: f64) -> f64 {
        INTAKE_SCALE * self.density.pdf(temperature)
    }
}

/// Summer resort stage: move a random fraction of the way to the shelter.
pub fn seek_shelter<R: Rng + ?Sized>(
    row: &[f64],
    shelter: &[f64],
    control_factor: f64,
    rng: &mut R,
) -> Vec<f64> {
    row.iter()
        .zip(shelter)
        .map(|(&x, &cave)| x + control_factor * rng.gen::<f64>() * (cave - x))
        .collect()
}

/// Competition stage: crayfish `i` is displaced by rivals fighting over the
/// shelter. Every coordinate draws its own rival.
pub fn compete<R: Rng + ?Sized>(
    i: usize,
    population: &[Vec<f64>],
    shelter: &[f64],
    rng: &mut R,
) -> Vec<f64> {
    let rows = population.len();
    population[i]
        .iter()
        .zip(shelter)
        .enumerate()
        .map(|(j, (&x, &cave))| {
            let rival = pick_rival(i, rows, rng);
            x - population[rival][j] + cave
        })
        .collect()
}

/// Foraging on food too big to eat whole: the food is shredded first (in
/// place, so later crayfish of the same iteration see the smaller piece) and
/// then eaten alternately with the claws.
pub fn shred_and_eat<R: Rng + ?Sized>(
    row: &[f64],
    food: &mut [f64],
    intake_ratio: f64,
    intake: f64,
    rng: &mut R,
) -> Vec<f64> {
    let shrink = (-1. / intake_ratio).exp();
    row.iter()
        .zip(food.iter_mut())
        .map(|(&x, piece)| {
            *piece *= shrink;
            x + (2. * PI * rng.gen::<f64>()).cos() * *piece * intake
                - (2. * PI * rng.gen::<f64>()).sin() * *piece * intake
        })
        .collect()
}

/// Foraging on food of a manageable size.
pub fn eat<R: Rng + ?Sized>(row: &[f64], food: &[f64], intake: f64, rng: &mut R) -> Vec<f64> {
    row.iter()
        .zip(food)
        .map(|(&x, &piece)| (x - piece) * intake + intake * rng.gen::<f64>() * x)
        .collect()
}

/// Index of a random rival for crayfish `i`, distinct from `i` whenever the
/// partition has more than one row.
pub fn pick_rival<R: Rng + ?Sized>(i: usize, rows: usize, rng: &mut R) -> usize {
    match rows {
        0 | 1 => return i,
        2 => return 1 - i,
        _ => {}
    }
    let z = rng.gen_range(0..rows - 1);
    if z >= i {
        z + 1
    } else {
        z
    }
}
