use rand::Rng;
use thiserror::Error;
use tracing::{instrument, warn};

/// Boltzmann constant in kJ/mol/K.
pub const BOLTZMANN_KJ_PER_MOL: f64 = 0.008314472;

/// Factor applied to a step size when no trial move was accepted.
const ZERO_ACCEPTANCE_FACTOR: f64 = 0.8;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum SamplingError {
    #[error("Invalid temperature {0}. Temperature must be positive for Metropolis sampling")]
    InvalidTemperature(f64),
    #[error("Invalid step bounds [{min}, {max}]. Bounds must be positive with min <= max")]
    InvalidStepBounds { min: f64, max: f64 },
    #[error("Invalid target acceptance rate {0}. It must lie strictly between 0 and 1")]
    InvalidTargetAcceptance(f64),
}

/// The Metropolis acceptance criterion at a fixed temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metropolis {
    beta: f64,
}

impl Metropolis {
    pub fn from_temperature(temperature: f64) -> Result<Self, SamplingError> {
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(SamplingError::InvalidTemperature(temperature));
        }
        Ok(Self {
            beta: 1.0 / (BOLTZMANN_KJ_PER_MOL * temperature),
        })
    }

    /// Inverse thermal energy, 1/kT, in mol/kJ.
    #[inline]
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Accepts every energy decrease, and an increase with probability `exp(-delta/kT)`.
    ///
    /// A random number is drawn only for increases.
    #[inline]
    pub fn accept<R: Rng + ?Sized>(&self, delta: f64, rng: &mut R) -> bool {
        if delta <= 0.0 {
            return true;
        }
        rng.r#gen::<f64>() < (-delta * self.beta).exp()
    }
}

/// A trial step size adapted toward a target acceptance rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSize {
    value: f64,
    min: f64,
    max: f64,
    target: f64,
}

impl StepSize {
    pub fn new(value: f64, min: f64, max: f64, target: f64) -> Result<Self, SamplingError> {
        if !(min > 0.0 && min <= max && max.is_finite()) {
            return Err(SamplingError::InvalidStepBounds { min, max });
        }
        if !(target > 0.0 && target < 1.0) {
            return Err(SamplingError::InvalidTargetAcceptance(target));
        }
        Ok(Self {
            value: value.clamp(min, max),
            min,
            max,
            target,
        })
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Rescales the step by the ratio of observed to target acceptance.
    ///
    /// Without attempts the step is left unchanged.
    #[instrument(level = "trace", skip(self), fields(value = self.value))]
    pub fn adjust(&mut self, accepted: u64, attempted: u64) -> f64 {
        if attempted == 0 {
            return self.value;
        }
        let factor = if accepted == 0 {
            ZERO_ACCEPTANCE_FACTOR
        } else {
            (accepted as f64 / attempted as f64) / self.target
        };
        let proposed = self.value * factor;
        self.value = proposed.clamp(self.min, self.max);
        if self.value != proposed {
            warn!(
                proposed,
                clamped = self.value,
                "Step size adjustment left the permitted range; clamping."
            );
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn beta_follows_temperature() {
        let m = Metropolis::from_temperature(300.0).unwrap();
        assert!((m.beta() - 1.0 / (0.008314472 * 300.0)).abs() < TOLERANCE);
        assert_eq!(
            Metropolis::from_temperature(0.0),
            Err(SamplingError::InvalidTemperature(0.0))
        );
    }

    #[test]
    fn downhill_moves_are_always_accepted() {
        let m = Metropolis::from_temperature(10.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for k in 0..10_000 {
            assert!(m.accept(-(k as f64) * 0.01, &mut rng));
        }
    }

    #[test]
    fn uphill_acceptance_matches_boltzmann_factor() {
        let temperature = 300.0;
        let delta = 2.0;
        let m = Metropolis::from_temperature(temperature).unwrap();
        let expected = (-delta / (BOLTZMANN_KJ_PER_MOL * temperature)).exp();

        let mut rng = StdRng::seed_from_u64(20_240_601);
        let n = 10_000;
        let accepted = (0..n).filter(|_| m.accept(delta, &mut rng)).count();
        let observed = accepted as f64 / n as f64;
        assert!(
            (observed - expected).abs() < 0.02,
            "observed {observed}, expected {expected}"
        );
    }

    #[test]
    fn step_grows_when_acceptance_exceeds_target() {
        let mut step = StepSize::new(0.1, 0.001, 3.0, 0.33).unwrap();
        let v = step.adjust(66, 100);
        assert!((v - 0.2).abs() < 1e-9);
    }

    #[test]
    fn step_shrinks_without_acceptances() {
        let mut step = StepSize::new(0.1, 0.001, 3.0, 0.33).unwrap();
        assert!((step.adjust(0, 40) - 0.08).abs() < TOLERANCE);
        assert_eq!(step.adjust(0, 0), step.value());
    }

    #[test]
    fn step_is_clamped_to_bounds() {
        let mut step = StepSize::new(2.5, 0.001, 3.0, 0.1).unwrap();
        assert_eq!(step.adjust(100, 100), 3.0);
        let mut step = StepSize::new(0.0011, 0.001, 3.0, 0.33).unwrap();
        assert_eq!(step.adjust(0, 10), 0.001);
    }

    #[test]
    fn step_rejects_invalid_settings() {
        assert!(matches!(
            StepSize::new(1.0, 2.0, 1.0, 0.3),
            Err(SamplingError::InvalidStepBounds { .. })
        ));
        assert_eq!(
            StepSize::new(1.0, 0.1, 2.0, 1.5),
            Err(SamplingError::InvalidTargetAcceptance(1.5))
        );
    }
}
