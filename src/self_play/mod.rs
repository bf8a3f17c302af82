pub mod batch;
pub mod player;
pub mod temperature;

pub use batch::{GamesResults, QStats, ResignDisable, SelfPlayBatch, SelfPlayConfig, SelfPlayResults};
pub use player::{GameOutcome, GamePlayer, MoveRecord, PlayerParams, ResignPolicy, TrainingExample, NEVER_RESIGN};
pub use temperature::TemperaturePolicy;
