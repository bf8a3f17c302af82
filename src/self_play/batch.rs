use std::time::Instant;

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::game::{GameColor, Position};
use crate::mcts::evaluator::{evaluate_batch, Evaluator};
use crate::self_play::player::{GamePlayer, PlayerParams, TrainingExample, NEVER_RESIGN};

/// Whether a self-play run ignores resignation for its whole cohort.
///
/// Games played without resignation are used to measure how often resigned games would have been won.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResignDisable {
    /// Disable resignation with the given probability, drawn once per run
    Sample(f64),
    Always,
    Never,
}

impl Default for ResignDisable {
    fn default() -> Self {
        ResignDisable::Sample(0.05)
    }
}

impl ResignDisable {
    pub fn resolve(&self, rand: &mut impl Rng) -> bool {
        match self {
            ResignDisable::Sample(probability) => rand.gen::<f64>() < *probability,
            ResignDisable::Always => true,
            ResignDisable::Never => false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SelfPlayConfig {
    pub player: PlayerParams,
    pub resign_disable: ResignDisable,
    /// 0 is silent, 1 logs a summary every ten moves, 2 every move, 3 adds the first game's tree, 4 adds its leaves
    pub verbosity: u8,
}

/// Max, min and standard deviation of the root values across the active games
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QStats {
    pub max: f32,
    pub min: f32,
    pub std: f32,
}

impl QStats {
    pub fn new(qs: &[f32]) -> Option<Self> {
        if qs.is_empty() {
            return None;
        }
        let max = qs.iter().copied().fold(f32::MIN, f32::max);
        let min = qs.iter().copied().fold(f32::MAX, f32::min);
        let mean = qs.iter().sum::<f32>() / qs.len() as f32;
        let variance = qs.iter().map(|q| (q - mean) * (q - mean)).sum::<f32>() / qs.len() as f32;
        Some(Self {
            max,
            min,
            std: variance.sqrt(),
        })
    }

    pub fn from_players<P: Position>(players: &[GamePlayer<P>]) -> Option<Self> {
        Self::new(&players.iter().map(|p| p.root_q()).collect_vec())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GamesResults {
    pub w1: u32,
    pub w2: u32,
    pub d: u32,
    pub resignations: u32,
}

pub struct SelfPlayResults<P: Position> {
    /// Finished games, in the order they ended
    pub players: Vec<GamePlayer<P>>,
    pub resign_disabled: bool,
}

impl<P: Position> SelfPlayResults<P> {
    pub fn summary(&self) -> GamesResults {
        let mut results = GamesResults::default();
        for outcome in self.players.iter().filter_map(|p| p.outcome()) {
            let counter = match outcome.winner() {
                None => &mut results.d,
                Some(GameColor::Player1) => &mut results.w1,
                Some(GameColor::Player2) => &mut results.w2,
            };
            *counter += 1;
            if outcome.is_resignation() {
                results.resignations += 1;
            }
        }
        results
    }

    pub fn training_examples(&self) -> Vec<TrainingExample<P>> {
        self.players.iter().flat_map(|p| p.training_examples()).collect_vec()
    }
}

/// Plays a cohort of games simultaneously, evaluating one leaf of every active game in a single evaluator call.
pub struct SelfPlayBatch<P: Position> {
    start_position: P,
    config: SelfPlayConfig,
    rand: StdRng,
}

impl<P: Position> SelfPlayBatch<P> {
    pub fn new(start_position: P, config: SelfPlayConfig, seed: u64) -> Self {
        Self {
            start_position,
            config,
            rand: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &SelfPlayConfig {
        &self.config
    }

    pub fn play(
        &mut self,
        evaluator: &mut (impl Evaluator<P> + ?Sized),
        game_count: usize,
        readouts_per_move: usize,
        resign_threshold: f32,
    ) -> Result<SelfPlayResults<P>> {
        if readouts_per_move == 0 {
            return Err(Error::InvalidConfig("readouts per move must be positive".to_string()));
        }
        let verbosity = self.config.verbosity;

        let mut players = (0..game_count)
            .map(|_| GamePlayer::new(self.start_position.clone(), self.config.player.clone(), resign_threshold))
            .collect::<Result<Vec<_>>>()?;

        let resign_disabled = self.config.resign_disable.resolve(&mut self.rand);
        if resign_disabled {
            log::info!("Resignation disabled for this run of {} games", game_count);
            for player in &mut players {
                player.set_resign_threshold(NEVER_RESIGN);
            }
        }
        for player in &mut players {
            player.initialize_game();
        }

        let (mut done_players, mut players): (Vec<_>, Vec<_>) = players.into_iter().partition(|p| p.is_done());
        let mut global_n = 0usize;

        while !players.is_empty() {
            let start = Instant::now();

            run_readouts(&mut players, &mut *evaluator, readouts_per_move, &mut self.rand, verbosity)?;

            /* Some stats on the search */
            if (global_n % 10 == 9 && verbosity >= 1) || verbosity > 2 {
                if let Some(stats) = QStats::from_players(&players) {
                    log::info!("Max/min Q: {:.4} / {:.4}", stats.max, stats.min);
                    log::info!("std: {:.3}", stats.std);
                }
            }
            if verbosity >= 3 {
                log::debug!("{:?}", players[0].position());
                log::debug!("{}", players[0].tree().describe());
            }

            for player in &mut players {
                /* First, check the roots for hopeless games */
                if player.should_resign() {
                    player.resign();
                    continue;
                }
                let m = player.pick_move(&mut self.rand)?;
                player.play_move(m)?;
            }

            let dur = start.elapsed().as_secs_f64();
            global_n += 1;
            if verbosity > 1 || (verbosity == 1 && global_n % 10 == 9) {
                if verbosity > 2 {
                    log::debug!("Played >> {:?}", players[0].moves().last());
                }
                let readouts_num = readouts_per_move * players.len();
                log::info!(
                    "{}: {} readouts, {:.3} s/100. ({:.2} sec)",
                    global_n,
                    readouts_num,
                    dur / (readouts_num as f64 / 100.0),
                    dur
                );
            }

            let (done, active): (Vec<_>, Vec<_>) = players.into_iter().partition(|p| p.is_done());
            for player in &done {
                log::debug!("Game done after {} moves: {:?}", player.moves().len(), player.outcome());
            }
            done_players.extend(done);
            players = active;
        }

        Ok(SelfPlayResults {
            players: done_players,
            resign_disabled,
        })
    }
}

/// Search every active game for one move: each readout selects one leaf per game and evaluates all of them in a
/// single evaluator call. Exploration noise is mixed into every root right after the first readout.
pub(crate) fn run_readouts<P: Position>(
    players: &mut [GamePlayer<P>],
    evaluator: &mut (impl Evaluator<P> + ?Sized),
    readouts_per_move: usize,
    rand: &mut impl Rng,
    verbosity: u8,
) -> Result<()> {
    for readout in 0..readouts_per_move {
        let leaves = players.iter().map(|p| p.select_leaf()).collect_vec();
        if verbosity > 3 {
            if let (Some(player), Some(leaf)) = (players.first(), leaves.first()) {
                log::debug!("Leaf path: {:?}", player.tree().path_to_root(leaf.node()));
            }
        }

        let positions = players
            .iter()
            .zip(&leaves)
            .map(|(p, leaf)| p.leaf_position(leaf).clone())
            .collect_vec();
        let evaluations = evaluate_batch(&mut *evaluator, &positions)?;

        for ((player, leaf), evaluation) in players.iter_mut().zip(&leaves).zip(evaluations) {
            player.incorporate_results(leaf, evaluation)?;
        }
        if readout == 0 {
            for player in players.iter_mut() {
                player.inject_noise(&mut *rand)?;
            }
        }
    }
    Ok(())
}
