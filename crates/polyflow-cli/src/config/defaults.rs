pub struct DefaultsConfig {
    pub charger: String,
    pub max_chain_len: usize,
    pub anneal_params: String,
    pub anneal_step_name: String,
    pub density: f64,
    pub exclusion: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            charger: "gasteiger".to_string(),
            max_chain_len: 150,
            anneal_params: "anneal".to_string(),
            anneal_step_name: "anneal".to_string(),
            density: 1.0,
            exclusion: 2.5,
        }
    }
}
