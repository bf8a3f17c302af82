use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::game::{play_random_until_over, Position};

/// The evaluator's output for a single position.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation<Move> {
    /// Per-move probabilities. Illegal moves may be present, they are masked out by the search.
    pub priors: Vec<(Move, f32)>,
    /// The position value in range [-1, 1], from the point of view of the player to move
    pub value: f32,
}

pub trait Evaluator<P: Position> {
    /// Evaluate a batch of positions
    ///
    /// Returns exactly one evaluation per position, in the same order.
    fn evaluate(&mut self, positions: &[P]) -> Vec<Evaluation<P::Move>>;
}

/// Run the evaluator on a batch and verify it answered every position
pub fn evaluate_batch<P: Position>(
    evaluator: &mut (impl Evaluator<P> + ?Sized),
    positions: &[P],
) -> Result<Vec<Evaluation<P::Move>>> {
    let evaluations = evaluator.evaluate(positions);
    if evaluations.len() != positions.len() {
        return Err(Error::EvaluatorBatchSize {
            expected: positions.len(),
            actual: evaluations.len(),
        });
    }
    Ok(evaluations)
}

fn uniform_priors<P: Position>(position: &P) -> Vec<(P::Move, f32)> {
    /* We don't have anything smart to say per move */
    /* Assign uniform probabilities to all legal moves */
    let moves = position.legal_moves();
    let move_prob = 1.0 / moves.len() as f32;
    moves.into_iter().map(|m| (m, move_prob)).collect_vec()
}

/// Uniform priors over the legal moves and a value of zero for every position
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformEvaluator;

impl<P: Position> Evaluator<P> for UniformEvaluator {
    fn evaluate(&mut self, positions: &[P]) -> Vec<Evaluation<P::Move>> {
        positions
            .iter()
            .map(|position| Evaluation {
                priors: uniform_priors(position),
                value: 0.0,
            })
            .collect_vec()
    }
}

/// Uniform priors, and a value obtained by playing a single random game from the position
pub struct RolloutEvaluator {
    rand: StdRng,
}

impl RolloutEvaluator {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rand: StdRng::seed_from_u64(seed),
        }
    }
}

impl<P: Position> Evaluator<P> for RolloutEvaluator {
    fn evaluate(&mut self, positions: &[P]) -> Vec<Evaluation<P::Move>> {
        positions
            .iter()
            .map(|position| {
                if position.is_over() {
                    return Evaluation {
                        priors: Vec::new(),
                        value: position.terminal_value(),
                    };
                }
                let final_pos = play_random_until_over(position, &mut self.rand);
                let player1_value = final_pos.score().clamp(-1.0, 1.0);
                Evaluation {
                    priors: uniform_priors(position),
                    value: position.turn().perspective(player1_value),
                }
            })
            .collect_vec()
    }
}
