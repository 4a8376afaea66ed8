// Online tuner for UCI engine options, driven by cutechess-cli rounds
pub mod config;
pub mod error;
pub mod pgn;
pub mod runner;
pub mod sampler;
pub mod trajectory;
pub mod tuner;

pub use config::{Config, ParameterRange, ParameterSet, RangeKind};
pub use error::{Result, TunerError};
pub use pgn::{GameRecord, Outcome};
pub use runner::{GameRunner, ProcessGameRunner, RoundOutput, RoundStatus};
pub use sampler::{Contestant, OptionValue, ParameterSampler};
pub use trajectory::TrajectoryLog;
pub use tuner::{CampaignReport, IterationReport, Phase, Tuner};
