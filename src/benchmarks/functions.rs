// Classic benchmark suite (Yao et al. / Mirjalili numbering).
use std::f64::consts::{E, PI};

/// F1: sphere.
pub fn sphere(x: &[f64]) -> f64 {
    x.iter().map(|xi| xi * xi).sum()
}

/// F2: Schwefel 2.22, sum plus product of absolute values.
pub fn schwefel_2_22(x: &[f64]) -> f64 {
    let sum = x.iter().map(|xi| xi.abs()).sum::<f64>();
    let product = x.iter().map(|xi| xi.abs()).product::<f64>();
    sum + product
}

/// F3: Schwefel 1.2, squared running sums.
pub fn schwefel_1_2(x: &[f64]) -> f64 {
    x.iter()
        .scan(0., |running, xi| {
            *running += xi;
            Some(*running * *running)
        })
        .sum()
}

/// F4: Schwefel 2.21, largest absolute coordinate.
pub fn schwefel_2_21(x: &[f64]) -> f64 {
    x.iter().fold(0., |max: f64, xi| max.max(xi.abs()))
}

/// F5: generalized Rosenbrock.
pub fn rosenbrock(x: &[f64]) -> f64 {
    x.windows(2)
        .map(|w| 100. * (w[1] - w[0] * w[0]).powi(2) + (w[0] - 1.).powi(2))
        .sum()
}

/// F6: step function in its `|x + 0.5|^2` form.
pub fn step(x: &[f64]) -> f64 {
    x.iter().map(|xi| (xi + 0.5).abs().powi(2)).sum()
}

/// F7: weighted quartic. The usual additive noise term is left out so that
/// the function stays deterministic.
pub fn quartic(x: &[f64]) -> f64 {
    x.iter()
        .enumerate()
        .map(|(i, xi)| (i + 1) as f64 * xi.powi(4))
        .sum()
}

/// F8: Schwefel 2.26.
pub fn schwefel_2_26(x: &[f64]) -> f64 {
    x.iter().map(|xi| -xi * xi.abs().sqrt().sin()).sum()
}

/// F9: Rastrigin.
pub fn rastrigin(x: &[f64]) -> f64 {
    x.iter()
        .map(|xi| xi * xi - 10. * (2. * PI * xi).cos() + 10.)
        .sum()
}

/// F10: Ackley.
pub fn ackley(x: &[f64]) -> f64 {
    let n = x.len() as f64;
    let squares = x.iter().map(|xi| xi * xi).sum::<f64>();
    let cosines = x.iter().map(|xi| (2. * PI * xi).cos()).sum::<f64>();
    -20. * (-0.2 * (squares / n).sqrt()).exp() - (cosines / n).exp() + 20. + E
}

/// F11: Griewank.
pub fn griewank(x: &[f64]) -> f64 {
    let sum = x.iter().map(|xi| xi * xi).sum::<f64>() / 4000.;
    let product = x
        .iter()
        .enumerate()
        .map(|(i, xi)| (xi / ((i + 1) as f64).sqrt()).cos())
        .product::<f64>();
    sum - product + 1.
}

/// F16: six-hump camel back. Only the first two coordinates are used.
pub fn six_hump_camel(x: &[f64]) -> f64 {
    let (x1, x2) = (x[0], x[1]);
    4. * x1.powi(2) - 2.1 * x1.powi(4) + x1.powi(6) / 3. + x1 * x2 - 4. * x2.powi(2)
        + 4. * x2.powi(4)
}

/// F17: Branin.
pub fn branin(x: &[f64]) -> f64 {
    let (x1, x2) = (x[0], x[1]);
    (x2 - 5.1 / (4. * PI * PI) * x1 * x1 + 5. / PI * x1 - 6.).powi(2)
        + 10. * (1. - 1. / (8. * PI)) * x1.cos()
        + 10.
}

/// F18: Goldstein-Price.
pub fn goldstein_price(x: &[f64]) -> f64 {
    let (x1, x2) = (x[0], x[1]);
    let a = 1.
        + (x1 + x2 + 1.).powi(2)
            * (19. - 14. * x1 + 3. * x1 * x1 - 14. * x2 + 6. * x1 * x2 + 3. * x2 * x2);
    let b = 30.
        + (2. * x1 - 3. * x2).powi(2)
            * (18. - 32. * x1 + 12. * x1 * x1 + 48. * x2 - 36. * x1 * x2 + 27. * x2 * x2);
    a * b
}
