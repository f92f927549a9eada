/// Lennard-Jones 12-6 energy and `fpair = -(dE/dr) / r` at squared separation `rsq`.
#[inline]
pub fn lennard_jones_12_6(rsq: f64, epsilon: f64, sigma: f64) -> (f64, f64) {
    let r2inv = 1.0 / rsq;
    let sr6 = (sigma * sigma * r2inv).powi(3);
    let lj1 = 48.0 * epsilon * sr6 * sr6;
    let lj2 = 24.0 * epsilon * sr6;
    let energy = 4.0 * epsilon * (sr6 * sr6 - sr6);
    (energy, (lj1 - lj2) * r2inv)
}

/// Energy of the Lennard-Jones potential at `cutoff`, subtracted when shifting.
#[inline]
pub fn lennard_jones_offset(epsilon: f64, sigma: f64, cutoff: f64) -> f64 {
    if cutoff <= 0.0 {
        return 0.0;
    }
    let sr6 = (sigma / cutoff).powi(6);
    4.0 * epsilon * (sr6 * sr6 - sr6)
}

/// Quartic angle energy `K2 d^2 + K3 d^3 + K4 d^4` with `d = theta - theta0`, and its
/// derivative with respect to `theta`.
#[inline]
pub fn quartic_angle(theta: f64, theta0: f64, k2: f64, k3: f64, k4: f64) -> (f64, f64) {
    let d = theta - theta0;
    let d2 = d * d;
    let energy = k2 * d2 + k3 * d2 * d + k4 * d2 * d2;
    let de_dtheta = 2.0 * k2 * d + 3.0 * k3 * d2 + 4.0 * k4 * d2 * d;
    (energy, de_dtheta)
}
