use std::fmt::Debug;
use std::hash::Hash;

use rand::Rng;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GameColor {
    Player1,
    Player2,
}

impl GameColor {
    pub fn opposite(&self) -> GameColor {
        match self {
            GameColor::Player1 => GameColor::Player2,
            GameColor::Player2 => GameColor::Player1,
        }
    }

    pub fn to_signed_one(player: Option<GameColor>) -> i8 {
        match player {
            Some(GameColor::Player1) => 1,
            Some(GameColor::Player2) => -1,
            None => 0,
        }
    }

    /// Convert a value given from Player1's point of view to this player's point of view
    pub fn perspective(&self, player1_value: f32) -> f32 {
        match self {
            GameColor::Player1 => player1_value,
            GameColor::Player2 => -player1_value,
        }
    }
}

pub trait GameMove: Clone + Copy + Eq + Ord + Hash + Debug {}
impl<T: Clone + Copy + Eq + Ord + Hash + Debug> GameMove for T {}

/// The rules engine as seen by the search.
///
/// A position is an immutable snapshot, `moved_position` returns a new position and never mutates `self`.
pub trait Position: Clone + Eq + Debug {
    type Move: GameMove;

    fn turn(&self) -> GameColor;
    fn legal_moves(&self) -> Vec<Self::Move>;
    fn moved_position(&self, m: Self::Move) -> Self;
    fn is_over(&self) -> bool;

    /// Final score of a terminal position, positive if Player1 is ahead
    fn score(&self) -> f32;

    /// Outcome of a terminal position in {-1, 0, 1}, from the point of view of the player to move
    fn terminal_value(&self) -> f32 {
        debug_assert!(self.is_over());
        let score = self.score();
        let player1_value = if score > 0.0 {
            1.0
        } else if score < 0.0 {
            -1.0
        } else {
            0.0
        };
        self.turn().perspective(player1_value)
    }
}

/// Play uniformly random moves until the game is over, returning the final position
pub fn play_random_until_over<P: Position>(position: &P, rand: &mut impl Rng) -> P {
    let mut pos = position.clone();
    while !pos.is_over() {
        let moves = pos.legal_moves();
        if moves.is_empty() {
            break;
        }
        let m = moves[rand.gen_range(0..moves.len())];
        pos = pos.moved_position(m);
    }
    pos
}
