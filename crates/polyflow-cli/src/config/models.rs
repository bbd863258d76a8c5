use polyflow::core::forcefield::params::Forcefield;
use polyflow::engine::md::SimulationParameters;
use polyflow::workflows::schedule::SimulationSchedule;

pub struct AnnealConfig {
    pub params: SimulationParameters,
    pub step_name: String,
    pub forcefield: Forcefield,
}

pub struct ScheduleConfig {
    pub schedule: SimulationSchedule,
    pub forcefield: Forcefield,
    pub prefix: Option<String>,
}
