use itertools::Itertools;
use rand::distributions::WeightedIndex;
use rand::prelude::*;

use crate::error::{Error, Result};
use crate::game::{GameColor, Position};
use crate::mcts::evaluator::Evaluation;
use crate::mcts::{Leaf, MctsParams, SearchTree};
use crate::self_play::temperature::TemperaturePolicy;

/// A resignation threshold that can never be crossed, root values are never below -1
pub const NEVER_RESIGN: f32 = -1.0;

/// How the root statistics are compared against the resignation threshold
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ResignPolicy {
    /// Resign when the root value is below the threshold
    #[default]
    RootValue,
    /// Resign only when both the root value and the value of the most visited child are below the threshold
    RootAndBestChild,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GameOutcome {
    /// Final score reported by the rules engine, positive if Player1 is ahead
    Score(f32),
    Resignation { winner: GameColor },
}

impl GameOutcome {
    pub fn winner(&self) -> Option<GameColor> {
        match self {
            GameOutcome::Score(score) if *score > 0.0 => Some(GameColor::Player1),
            GameOutcome::Score(score) if *score < 0.0 => Some(GameColor::Player2),
            GameOutcome::Score(_) => None,
            GameOutcome::Resignation { winner } => Some(*winner),
        }
    }

    /// The outcome in {-1, 0, 1}, from Player1's point of view
    pub fn value(&self) -> f32 {
        GameColor::to_signed_one(self.winner()) as f32
    }

    pub fn is_resignation(&self) -> bool {
        matches!(self, GameOutcome::Resignation { .. })
    }
}

/// The search result recorded before each played move
#[derive(Clone, Debug)]
pub struct MoveRecord<P: Position> {
    pub position: P,
    /// Root children visit counts, normalized
    pub probs: Vec<(P::Move, f32)>,
    pub root_q: f32,
}

#[derive(Clone, Debug)]
pub struct TrainingExample<P: Position> {
    pub position: P,
    pub probs: Vec<(P::Move, f32)>,
    pub root_q: f32,
    /// The game outcome in {-1, 0, 1}, from the point of view of the player to move at `position`
    pub outcome: f32,
}

#[derive(Clone, Debug, Default)]
pub struct PlayerParams {
    pub mcts: MctsParams,
    pub temperature: TemperaturePolicy,
    pub resign_policy: ResignPolicy,
}

/// A single self-play game and its search tree.
pub struct GamePlayer<P: Position> {
    start_position: P,
    params: PlayerParams,
    resign_threshold: f32,
    tree: SearchTree<P>,
    done: bool,
    outcome: Option<GameOutcome>,
    records: Vec<MoveRecord<P>>,
    moves: Vec<P::Move>,
}

impl<P: Position> GamePlayer<P> {
    pub fn new(start_position: P, params: PlayerParams, resign_threshold: f32) -> Result<Self> {
        params.mcts.validate()?;
        let tree = SearchTree::new(start_position.clone(), params.mcts);
        let mut player = Self {
            start_position,
            params,
            resign_threshold,
            tree,
            done: false,
            outcome: None,
            records: Vec::new(),
            moves: Vec::new(),
        };
        player.initialize_game();
        Ok(player)
    }

    /// Start over from the starting position with an empty tree
    pub fn initialize_game(&mut self) {
        self.tree = SearchTree::new(self.start_position.clone(), self.params.mcts);
        self.records.clear();
        self.moves.clear();
        self.done = false;
        self.outcome = None;
        self.check_game_over();
    }

    pub fn resign_threshold(&self) -> f32 {
        self.resign_threshold
    }

    pub fn set_resign_threshold(&mut self, resign_threshold: f32) {
        self.resign_threshold = resign_threshold;
    }

    pub fn params(&self) -> &PlayerParams {
        &self.params
    }

    pub fn tree(&self) -> &SearchTree<P> {
        &self.tree
    }

    pub fn position(&self) -> &P {
        self.tree.root_position()
    }

    pub fn root_q(&self) -> f32 {
        self.tree.root_q()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn outcome(&self) -> Option<GameOutcome> {
        self.outcome
    }

    /// Moves played so far, in order
    pub fn moves(&self) -> &[P::Move] {
        &self.moves
    }

    pub fn records(&self) -> &[MoveRecord<P>] {
        &self.records
    }

    pub fn select_leaf(&self) -> Leaf {
        self.tree.select_leaf()
    }

    pub fn leaf_position(&self, leaf: &Leaf) -> &P {
        self.tree.leaf_position(leaf)
    }

    pub fn incorporate_results(&mut self, leaf: &Leaf, evaluation: Evaluation<P::Move>) -> Result<()> {
        self.tree.incorporate_results(leaf, evaluation)
    }

    pub fn inject_noise(&mut self, rand: &mut impl Rng) -> Result<()> {
        self.tree.inject_noise(rand)
    }

    pub fn should_resign(&self) -> bool {
        if self.done || self.resign_threshold <= NEVER_RESIGN {
            return false;
        }
        let root_q = self.tree.root_q();
        match self.params.resign_policy {
            ResignPolicy::RootValue => root_q < self.resign_threshold,
            ResignPolicy::RootAndBestChild => {
                let best_child_q = self
                    .tree
                    .root_node()
                    .children()
                    .iter()
                    .filter_map(|(m, child_id)| self.tree.node(*child_id).map(|child| (m, child)))
                    .filter(|(_m, child)| child.visits() > 0)
                    /* Equal visit counts are resolved towards the smallest move */
                    .max_by(|(m1, c1), (m2, c2)| c1.visits().cmp(&c2.visits()).then_with(|| m2.cmp(m1)))
                    /* The child's value is stored from the opponent's point of view */
                    .map(|(_m, child)| -child.q());
                match best_child_q {
                    Some(best_child_q) => root_q < self.resign_threshold && best_child_q < self.resign_threshold,
                    None => false,
                }
            }
        }
    }

    /// End the game, the player to move resigns
    pub fn resign(&mut self) {
        let winner = self.position().turn().opposite();
        self.done = true;
        self.outcome = Some(GameOutcome::Resignation { winner });
    }

    /// Choose the move to play from the root visit counts.
    ///
    /// With a zero temperature the most visited move is returned (ties resolved towards the smallest move),
    /// otherwise a move is sampled with probability proportional to `N^(1 / temperature)`.
    pub fn pick_move(&self, rand: &mut impl Rng) -> Result<P::Move> {
        if self.done {
            return Err(Error::GameOver);
        }
        let moves_probs = self.tree.visit_distribution();
        if moves_probs.is_empty() {
            return Err(Error::NoLegalMoves);
        }

        let temperature = self.params.temperature.get_temperature(self.moves.len());
        if temperature == 0.0 {
            let (m, _p) = moves_probs
                .iter()
                .max_by(|(m1, p1), (m2, p2)| p1.total_cmp(p2).then_with(|| m2.cmp(m1)))
                .ok_or(Error::NoLegalMoves)?;
            return Ok(*m);
        }

        /* prob -> (prob / max prob)^(1 / temperature), the max keeps small temperatures from underflowing */
        let max_prob = moves_probs.iter().map(|(_m, p)| *p).fold(0.0f32, f32::max) as f64;
        let weights = moves_probs
            .iter()
            .map(|(_m, p)| (*p as f64 / max_prob).powf(1.0 / temperature as f64))
            .collect_vec();
        let distribution =
            WeightedIndex::new(&weights).map_err(|e| Error::MalformedPriors(format!("visit weights: {}", e)))?;
        Ok(moves_probs[distribution.sample(rand)].0)
    }

    /// Record the search result, commit the move in the tree and detect the end of the game
    pub fn play_move(&mut self, m: P::Move) -> Result<()> {
        if self.done {
            return Err(Error::GameOver);
        }
        let record = MoveRecord {
            position: self.position().clone(),
            probs: self.tree.visit_distribution(),
            root_q: self.tree.root_q(),
        };
        self.tree.promote(m)?;
        self.records.push(record);
        self.moves.push(m);
        self.check_game_over();
        Ok(())
    }

    fn check_game_over(&mut self) {
        let position = self.tree.root_position();
        if position.is_over() {
            self.outcome = Some(GameOutcome::Score(position.score()));
            self.done = true;
        }
    }

    /// The recorded positions joined with the final outcome, empty while the game is not done
    pub fn training_examples(&self) -> Vec<TrainingExample<P>> {
        let Some(outcome) = self.outcome else {
            return Vec::new();
        };
        self.records
            .iter()
            .map(|record| TrainingExample {
                position: record.position.clone(),
                probs: record.probs.clone(),
                root_q: record.root_q,
                outcome: record.position.turn().perspective(outcome.value()),
            })
            .collect_vec()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::mcts::evaluator::{evaluate_batch, Evaluator, UniformEvaluator};
    use crate::ttt::{TttMove, TttPosition};

    fn search(player: &mut GamePlayer<TttPosition>, evaluator: &mut impl Evaluator<TttPosition>, readouts: usize) {
        for _ in 0..readouts {
            let leaf = player.select_leaf();
            let position = player.leaf_position(&leaf).clone();
            let evaluation = evaluate_batch(evaluator, &[position]).unwrap().into_iter().next().unwrap();
            player.incorporate_results(&leaf, evaluation).unwrap();
        }
    }

    fn argmax_params() -> PlayerParams {
        PlayerParams {
            temperature: TemperaturePolicy::constant(0.0),
            ..PlayerParams::default()
        }
    }

    #[test]
    fn initialize_game_resets() {
        let mut player = GamePlayer::new(TttPosition::new(), argmax_params(), -0.9).unwrap();
        search(&mut player, &mut UniformEvaluator, 10);
        let m = player.pick_move(&mut StdRng::seed_from_u64(0)).unwrap();
        player.play_move(m).unwrap();
        assert_eq!(player.moves().len(), 1);

        player.initialize_game();
        assert_eq!(*player.position(), TttPosition::new());
        assert_eq!(player.tree().root_visits(), 0);
        assert!(player.moves().is_empty());
        assert!(player.records().is_empty());
        assert!(!player.is_done());
    }

    #[test]
    fn argmax_pick_is_deterministic() {
        let mut player = GamePlayer::new(TttPosition::new(), argmax_params(), -0.9).unwrap();
        /* 1 root expansion + 9 visits, one per child */
        search(&mut player, &mut UniformEvaluator, 10);
        let m1 = player.pick_move(&mut StdRng::seed_from_u64(1)).unwrap();
        let m2 = player.pick_move(&mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(m1, TttMove::from_idx(0));
        assert_eq!(m1, m2);
    }

    #[test]
    fn sampled_pick_only_uses_visited_moves() {
        let params = PlayerParams {
            temperature: TemperaturePolicy::constant(1.0),
            ..PlayerParams::default()
        };
        let mut player = GamePlayer::new(TttPosition::new(), params, -0.9).unwrap();
        /* Root expansion, then the first three children */
        search(&mut player, &mut UniformEvaluator, 4);
        let mut rand = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let m = player.pick_move(&mut rand).unwrap();
            assert!(m.to_idx() < 3);
        }
    }

    #[test]
    fn play_move_records_and_promotes() {
        let mut player = GamePlayer::new(TttPosition::new(), argmax_params(), -0.9).unwrap();
        search(&mut player, &mut UniformEvaluator, 30);
        let before = *player.position();
        let probs = player.tree().visit_distribution();
        let m = TttMove::new(1, 1);
        player.play_move(m).unwrap();

        assert_eq!(*player.position(), before.moved_position(m));
        assert_eq!(player.moves(), &[m]);
        let record = &player.records()[0];
        assert_eq!(record.position, before);
        assert_eq!(record.probs, probs);
        assert!(!player.is_done());
        assert!(player.training_examples().is_empty());
    }

    #[test]
    fn illegal_move_is_rejected() {
        let pos = TttPosition::from_str("x_o_x_o__x");
        let mut player = GamePlayer::new(pos, argmax_params(), -0.9).unwrap();
        search(&mut player, &mut UniformEvaluator, 5);
        let err = player.play_move(TttMove::from_idx(2)).unwrap_err();
        assert!(matches!(err, Error::IllegalMove(_)));
        assert!(player.records().is_empty());
    }

    #[test]
    fn winning_move_ends_the_game() {
        let pos = TttPosition::from_str("xoooxxxo_x");
        let mut player = GamePlayer::new(pos, argmax_params(), -0.9).unwrap();
        search(&mut player, &mut UniformEvaluator, 3);
        let m = player.pick_move(&mut StdRng::seed_from_u64(0)).unwrap();
        player.play_move(m).unwrap();

        assert!(player.is_done());
        assert_eq!(player.outcome(), Some(GameOutcome::Score(1.0)));
        assert!(matches!(player.play_move(m), Err(Error::GameOver)));

        let examples = player.training_examples();
        assert_eq!(examples.len(), 1);
        /* X was to move and won */
        assert_eq!(examples[0].outcome, 1.0);
    }

    #[test]
    fn resignation() {
        let pos = TttPosition::from_str("xoooxxxo_x");
        let mut player = GamePlayer::new(pos, argmax_params(), 0.5).unwrap();
        search(&mut player, &mut UniformEvaluator, 3);
        /* X is winning, root Q is 2/3 */
        assert!(!player.should_resign());

        player.set_resign_threshold(0.9);
        assert!(player.should_resign());
        player.resign();
        assert!(player.is_done());
        assert_eq!(player.outcome(), Some(GameOutcome::Resignation { winner: GameColor::Player2 }));
        assert!(!player.should_resign());
    }

    #[test]
    fn never_resign_sentinel() {
        let pos = TttPosition::from_str("xoooxxxo_x");
        let mut player = GamePlayer::new(pos, argmax_params(), NEVER_RESIGN).unwrap();
        search(&mut player, &mut UniformEvaluator, 3);
        assert!(!player.should_resign());
    }

    #[test]
    fn dual_check_is_more_conservative() {
        let pos = TttPosition::from_str("xoooxxxo_x");
        let params = PlayerParams {
            resign_policy: ResignPolicy::RootAndBestChild,
            ..argmax_params()
        };
        let mut player = GamePlayer::new(pos, params, 0.9).unwrap();
        search(&mut player, &mut UniformEvaluator, 3);
        /* Root Q is 2/3 but the only child is a win, its value is 1 */
        assert!(!player.should_resign());

        player.set_resign_threshold(1.5);
        assert!(player.should_resign());
    }

    #[test]
    fn dual_check_breaks_visit_ties_towards_smallest_move() {
        let pos = TttPosition::from_str("x_o_x_o__x");
        let params = PlayerParams {
            resign_policy: ResignPolicy::RootAndBestChild,
            ..argmax_params()
        };
        let mut player = GamePlayer::new(pos, params, -0.2).unwrap();
        let evaluate = |player: &mut GamePlayer<TttPosition>, expected_path: Vec<TttMove>, value: f32| {
            let leaf = player.select_leaf();
            assert_eq!(player.tree().path_to_root(leaf.node()), expected_path);
            let priors = vec![(TttMove::from_idx(1), 0.1), (TttMove::from_idx(3), 1.0)];
            player.incorporate_results(&leaf, Evaluation { priors, value }).unwrap();
        };
        evaluate(&mut player, vec![], -0.9);
        /* Bad for X after (1, 0), good for X after (0, 1) */
        evaluate(&mut player, vec![TttMove::from_idx(3)], 0.9);
        evaluate(&mut player, vec![TttMove::from_idx(1)], -0.9);

        /* Root Q is -0.3, both children have a single visit */
        assert!((player.root_q() - (-0.3)).abs() < 1e-5);
        assert!(!player.should_resign());

        let params = PlayerParams {
            resign_policy: ResignPolicy::RootValue,
            ..player.params().clone()
        };
        let mut root_only = GamePlayer::new(pos, params, -0.2).unwrap();
        evaluate(&mut root_only, vec![], -0.9);
        evaluate(&mut root_only, vec![TttMove::from_idx(3)], 0.9);
        evaluate(&mut root_only, vec![TttMove::from_idx(1)], -0.9);
        assert!(root_only.should_resign());
    }

    #[test]
    fn outcome_values() {
        assert_eq!(GameOutcome::Score(7.5).value(), 1.0);
        assert_eq!(GameOutcome::Score(-0.5).value(), -1.0);
        assert_eq!(GameOutcome::Score(0.0).value(), 0.0);
        let resigned = GameOutcome::Resignation { winner: GameColor::Player2 };
        assert_eq!(resigned.value(), -1.0);
        assert!(resigned.is_resignation());
    }
}
