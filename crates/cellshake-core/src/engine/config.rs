use super::kernel::KernelScaling;
use super::pool::DivisionStrategy;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How molecules are handed out to process groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistributionMode {
    /// One molecule per group per round through the lock-based distributor.
    #[default]
    Sequential,
    /// Batches of molecules per group per cycle through spatial regions.
    Regional,
}

/// Initial value and permitted range of an adaptive step size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepConfig {
    pub initial: f64,
    pub min: f64,
    pub max: f64,
}

impl StepConfig {
    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if !(self.min > 0.0 && self.min <= self.max && self.max.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name,
                reason: format!("bounds [{}, {}] are not a positive range", self.min, self.max),
            });
        }
        if !(self.initial > 0.0 && self.initial.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name,
                reason: format!("initial step {} must be positive", self.initial),
            });
        }
        Ok(())
    }
}

/// Settings of one Monte-Carlo shake stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ShakeConfig {
    /// Interaction cutoff in Å; `None` uses the range of the potential map.
    pub cutoff: Option<f64>,
    pub shakes_per_object: usize,
    pub target_acceptance: f64,
    /// Translation step in Å.
    pub translation: StepConfig,
    /// Rotation step in degrees.
    pub rotation: StepConfig,
    pub strategy: DivisionStrategy,
    pub distribution: DistributionMode,
    pub repeats_allowed: bool,
    pub kernel_scaling: Option<KernelScaling>,
}

impl Default for ShakeConfig {
    fn default() -> Self {
        Self {
            cutoff: None,
            shakes_per_object: 1,
            target_acceptance: 0.33,
            translation: StepConfig {
                initial: 0.05,
                min: 0.001,
                max: 3.0,
            },
            rotation: StepConfig {
                initial: 1.0,
                min: 0.01,
                max: 90.0,
            },
            strategy: DivisionStrategy::Groups,
            distribution: DistributionMode::Sequential,
            repeats_allowed: false,
            kernel_scaling: None,
        }
    }
}

#[derive(Default)]
pub struct ShakeConfigBuilder {
    cutoff: Option<f64>,
    shakes_per_object: Option<usize>,
    target_acceptance: Option<f64>,
    translation: Option<StepConfig>,
    rotation: Option<StepConfig>,
    strategy: Option<DivisionStrategy>,
    distribution: Option<DistributionMode>,
    repeats_allowed: Option<bool>,
    kernel_scaling: Option<KernelScaling>,
}

impl ShakeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
    pub fn shakes_per_object(mut self, n: usize) -> Self {
        self.shakes_per_object = Some(n);
        self
    }
    pub fn target_acceptance(mut self, rate: f64) -> Self {
        self.target_acceptance = Some(rate);
        self
    }
    pub fn translation(mut self, step: StepConfig) -> Self {
        self.translation = Some(step);
        self
    }
    pub fn rotation(mut self, step: StepConfig) -> Self {
        self.rotation = Some(step);
        self
    }
    pub fn strategy(mut self, strategy: DivisionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }
    pub fn distribution(mut self, mode: DistributionMode) -> Self {
        self.distribution = Some(mode);
        self
    }
    pub fn repeats_allowed(mut self, allowed: bool) -> Self {
        self.repeats_allowed = Some(allowed);
        self
    }
    pub fn kernel_scaling(mut self, scaling: KernelScaling) -> Self {
        self.kernel_scaling = Some(scaling);
        self
    }

    /// Fills unset parameters from [`ShakeConfig::default`] and validates the result.
    pub fn build(self) -> Result<ShakeConfig, ConfigError> {
        let defaults = ShakeConfig::default();
        let config = ShakeConfig {
            cutoff: self.cutoff.or(defaults.cutoff),
            shakes_per_object: self.shakes_per_object.unwrap_or(defaults.shakes_per_object),
            target_acceptance: self.target_acceptance.unwrap_or(defaults.target_acceptance),
            translation: self.translation.unwrap_or(defaults.translation),
            rotation: self.rotation.unwrap_or(defaults.rotation),
            strategy: self.strategy.unwrap_or(defaults.strategy),
            distribution: self.distribution.unwrap_or(defaults.distribution),
            repeats_allowed: self.repeats_allowed.unwrap_or(defaults.repeats_allowed),
            kernel_scaling: self.kernel_scaling.or(defaults.kernel_scaling),
        };

        if let Some(cutoff) = config.cutoff {
            if !(cutoff > 0.0 && cutoff.is_finite()) {
                return Err(ConfigError::InvalidParameter {
                    name: "cutoff",
                    reason: format!("{cutoff} is not a positive distance"),
                });
            }
        }
        if config.shakes_per_object == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "shakes_per_object",
                reason: "at least one shake is required".to_string(),
            });
        }
        if !(config.target_acceptance > 0.0 && config.target_acceptance < 1.0) {
            return Err(ConfigError::InvalidParameter {
                name: "target_acceptance",
                reason: format!("{} is not strictly between 0 and 1", config.target_acceptance),
            });
        }
        config.translation.validate("translation")?;
        config.rotation.validate("rotation")?;
        if let Some(s) = config.kernel_scaling {
            if !(s.inter_distance_scale > 0.0 && s.intra_energy_scale >= 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name: "kernel_scaling",
                    reason: "distance scale must be positive and energy scale non-negative"
                        .to_string(),
                });
            }
        }

        Ok(config)
    }
}
