/// Coulomb prefactor in kJ·Å/(mol·e²).
pub const COULOMB_CONSTANT: f64 = 1389.35457;

#[inline]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    if dist < 1e-6 {
        return 1e10;
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    well_depth * (rho12 - 2.0 * rho6)
}

#[inline]
pub fn coulomb(dist: f64, q1: f64, q2: f64, dielectric: f64) -> f64 {
    if dist < 1e-6 {
        return q1.signum() * q2.signum() * 1e10;
    }
    COULOMB_CONSTANT * q1 * q2 / (dielectric * dist)
}

#[inline]
pub fn harmonic(dist: f64, force_constant: f64, equilibrium: f64) -> f64 {
    let dr = dist - equilibrium;
    0.5 * force_constant * dr * dr
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn lennard_jones_at_minimum_distance_returns_negative_well_depth() {
        assert!(f64_approx_equal(lennard_jones_12_6(3.4, 3.4, 0.99), -0.99));
    }

    #[test]
    fn lennard_jones_crosses_zero_below_minimum() {
        let sigma = 3.4 / 2f64.powf(1.0 / 6.0);
        assert!(f64_approx_equal(lennard_jones_12_6(sigma, 3.4, 0.99), 0.0));
    }

    #[test]
    fn lennard_jones_at_very_small_distance_returns_large_positive_energy() {
        assert!(f64_approx_equal(lennard_jones_12_6(1e-7, 2.0, 10.0), 1e10));
    }

    #[test]
    fn coulomb_sign_follows_charges() {
        assert!(f64_approx_equal(coulomb(1.0, 1.0, 1.0, 1.0), COULOMB_CONSTANT));
        assert!(f64_approx_equal(coulomb(2.0, 1.0, -1.0, 2.0), -COULOMB_CONSTANT / 4.0));
    }

    #[test]
    fn harmonic_vanishes_at_equilibrium() {
        assert!(f64_approx_equal(harmonic(1.5, 1000.0, 1.5), 0.0));
        assert!(f64_approx_equal(harmonic(1.6, 1000.0, 1.5), 5.0));
    }
}
