pub mod error;
pub mod game;
pub mod mcts;
pub mod self_play;
pub mod ttt;

pub use error::{Error, Result};
