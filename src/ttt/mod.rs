mod ttt_game;
mod ttt_test;

pub use ttt_game::*;
