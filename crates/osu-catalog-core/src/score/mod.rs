//! Score storage: custom and legacy score files, ordering and export

pub mod custom;
mod export;
pub mod legacy;
mod model;
pub mod replay;
mod sort;
mod store;

pub use custom::SCORES_DB_VERSION;
pub use model::{calculate_accuracy, mods, FinishedScore, ScoreSource};
pub use replay::ReplayStore;
pub use sort::SortMethod;
pub use store::{ScoreLoadSummary, ScoreStore};
