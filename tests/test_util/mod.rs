#![allow(dead_code)]

use cattus_selfplay::game::{GameColor, Position};
use cattus_selfplay::mcts::evaluator::{Evaluation, Evaluator, UniformEvaluator};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ScriptMove {
    Play(u8),
    Pass,
}

/// A scripted rules engine: two choices for the first `plays` plies, then only passing is allowed and the game ends
/// after two consecutive passes with a fixed score.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PassGamePosition {
    ply: u32,
    passes: u8,
    plays: u32,
    final_score: i32,
}

impl PassGamePosition {
    pub fn new(plays: u32, final_score: i32) -> Self {
        Self {
            ply: 0,
            passes: 0,
            plays,
            final_score,
        }
    }

    pub fn ply(&self) -> u32 {
        self.ply
    }
}

impl Position for PassGamePosition {
    type Move = ScriptMove;

    fn turn(&self) -> GameColor {
        if self.ply % 2 == 0 {
            GameColor::Player1
        } else {
            GameColor::Player2
        }
    }

    fn legal_moves(&self) -> Vec<ScriptMove> {
        if self.is_over() {
            Vec::new()
        } else if self.ply < self.plays {
            vec![ScriptMove::Play(0), ScriptMove::Play(1)]
        } else {
            vec![ScriptMove::Pass]
        }
    }

    fn moved_position(&self, m: ScriptMove) -> Self {
        assert!(self.legal_moves().contains(&m), "illegal move {:?} in {:?}", m, self);
        let mut res = *self;
        res.ply += 1;
        res.passes = match m {
            ScriptMove::Pass => self.passes + 1,
            ScriptMove::Play(_) => 0,
        };
        res
    }

    fn is_over(&self) -> bool {
        self.passes >= 2
    }

    fn score(&self) -> f32 {
        self.final_score as f32
    }
}

/// Evaluates every position as lost for Player1
pub struct Player1LosingEvaluator;

impl<P: Position> Evaluator<P> for Player1LosingEvaluator {
    fn evaluate(&mut self, positions: &[P]) -> Vec<Evaluation<P::Move>> {
        let mut evaluations = UniformEvaluator.evaluate(positions);
        for (evaluation, position) in evaluations.iter_mut().zip(positions) {
            evaluation.value = position.turn().perspective(-0.9);
        }
        evaluations
    }
}

/// Wraps an evaluator and records the size of every batch
pub struct RecordingEvaluator<E> {
    inner: E,
    pub batch_sizes: Vec<usize>,
}

impl<E> RecordingEvaluator<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            batch_sizes: Vec::new(),
        }
    }
}

impl<P: Position, E: Evaluator<P>> Evaluator<P> for RecordingEvaluator<E> {
    fn evaluate(&mut self, positions: &[P]) -> Vec<Evaluation<P::Move>> {
        self.batch_sizes.push(positions.len());
        self.inner.evaluate(positions)
    }
}

/// Drops the last evaluation of every batch
pub struct TruncatingEvaluator;

impl<P: Position> Evaluator<P> for TruncatingEvaluator {
    fn evaluate(&mut self, positions: &[P]) -> Vec<Evaluation<P::Move>> {
        let mut evaluations = UniformEvaluator.evaluate(positions);
        evaluations.pop();
        evaluations
    }
}
