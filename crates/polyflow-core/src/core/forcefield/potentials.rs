pub const COULOMB_CONSTANT: f64 = 332.0637; // In kcal·Å/(mol·e²)

const MIN_DISTANCE: f64 = 1e-6;

/// 12-6 Lennard-Jones energy and its radial derivative `dE/dr`.
#[inline]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> (f64, f64) {
    let dist = dist.max(MIN_DISTANCE);
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    let energy = well_depth * (rho12 - 2.0 * rho6);
    let derivative = -12.0 * well_depth * (rho12 - rho6) / dist;
    (energy, derivative)
}

/// Coulomb energy with a constant dielectric and its radial derivative.
#[inline]
pub fn coulomb(dist: f64, q1: f64, q2: f64, dielectric: f64) -> (f64, f64) {
    let dist = dist.max(MIN_DISTANCE);
    let energy = COULOMB_CONSTANT * q1 * q2 / (dielectric * dist);
    (energy, -energy / dist)
}

/// Harmonic `½k(x - x0)²` energy and its derivative with respect to `x`.
#[inline]
pub fn harmonic(x: f64, x0: f64, k: f64) -> (f64, f64) {
    let dx = x - x0;
    (0.5 * k * dx * dx, k * dx)
}
