use cellshake::engine::config::ShakeConfig;

pub struct DefaultsConfig {
    pub module: &'static str,
    pub cycles: usize,
    pub seed: u64,
    pub temperature: f64,
    pub cell_size: f64,
    pub shake: ShakeConfig,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            module: "molecule",
            cycles: 1,
            seed: 0x5EED,
            temperature: 300.0,
            cell_size: 7.0,
            shake: ShakeConfig::default(),
        }
    }
}
