pub mod evaluator;


use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use itertools::Itertools;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::Dfs;
use rand::Rng;
use rand_distr::{Dirichlet, Distribution};

use crate::error::{Error, Result};
use crate::game::Position;
use crate::mcts::evaluator::Evaluation;

/// Monte Carlo Tree Search (MCTS) tree of a single game.
///
/// The nodes live in an arena (a stable graph), each node knows its parent index and its children by move. Removing
/// nodes when a move is committed never invalidates the indices of the surviving nodes.
///
/// Values are always stored from the point of view of the player to move at the node's position. The evaluator
/// reports values from the same point of view, and the backup flips the sign at every ply.
///
/// Visit counting: every backup adds one visit to each node of the path, and a node is expanded by its first backup,
/// so an expanded node always satisfies `N = 1 + sum(N of children)`.

#[derive(Clone, Copy, Debug)]
pub struct MctsParams {
    /// Exploration weight of the selection score
    pub c_puct: f32,
    /// Dirichlet concentration of the root noise
    pub noise_alpha: f32,
    /// Weight of the noise in the noised root priors, in [0, 1]
    pub noise_epsilon: f32,
}

impl Default for MctsParams {
    fn default() -> Self {
        Self {
            c_puct: std::f32::consts::SQRT_2,
            noise_alpha: 0.03,
            noise_epsilon: 0.25,
        }
    }
}

impl MctsParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.c_puct.is_finite() && self.c_puct >= 0.0) {
            return Err(Error::InvalidConfig(format!("c_puct must be non negative, got {}", self.c_puct)));
        }
        if !(self.noise_alpha.is_finite() && self.noise_alpha >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "noise alpha must be non negative, got {}",
                self.noise_alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.noise_epsilon) {
            return Err(Error::InvalidConfig(format!(
                "noise epsilon must be in [0, 1], got {}",
                self.noise_epsilon
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SearchNode<P: Position> {
    position: P,

    /// The move that led to this node, None for the root
    m: Option<P::Move>,
    parent: Option<NodeIndex>,
    children: BTreeMap<P::Move, NodeIndex>,

    /// The prior probability assigned by the evaluator.
    /// In range [0, 1]
    prior: f32,

    /// This is the variable n from the PUCT formula
    simulations_n: u32,

    /// This is the variable w from the PUCT formula
    score_w: f32,

    expanded: bool,
}

impl<P: Position> SearchNode<P> {
    fn new(position: P, m: Option<P::Move>, parent: Option<NodeIndex>, prior: f32) -> Self {
        Self {
            position,
            m,
            parent,
            children: BTreeMap::new(),
            prior,
            simulations_n: 0,
            score_w: 0.0,
            expanded: false,
        }
    }

    pub fn position(&self) -> &P {
        &self.position
    }

    pub fn last_move(&self) -> Option<P::Move> {
        self.m
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    pub fn children(&self) -> &BTreeMap<P::Move, NodeIndex> {
        &self.children
    }

    pub fn prior(&self) -> f32 {
        self.prior
    }

    pub fn visits(&self) -> u32 {
        self.simulations_n
    }

    pub fn value_sum(&self) -> f32 {
        self.score_w
    }

    /// Mean value, from the point of view of the player to move at this node
    pub fn q(&self) -> f32 {
        if self.simulations_n == 0 {
            0.0
        } else {
            self.score_w / self.simulations_n as f32
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_terminal(&self) -> bool {
        self.position.is_over()
    }
}

/// A node reached by `select_leaf`, with the path from the root to it (both ends included).
#[derive(Clone, Debug)]
pub struct Leaf {
    node: NodeIndex,
    path: Vec<NodeIndex>,
}

impl Leaf {
    pub fn node(&self) -> NodeIndex {
        self.node
    }

    pub fn path(&self) -> &[NodeIndex] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }
}

pub struct SearchTree<P: Position> {
    search_tree: StableDiGraph<SearchNode<P>, P::Move>,
    root: NodeIndex,
    params: MctsParams,
    noise_injected: bool,
}

impl<P: Position> SearchTree<P> {
    pub fn new(position: P, params: MctsParams) -> Self {
        let mut search_tree = StableDiGraph::new();
        let root = search_tree.add_node(SearchNode::new(position, None, None, 1.0));
        Self {
            search_tree,
            root,
            params,
            noise_injected: false,
        }
    }

    pub fn params(&self) -> &MctsParams {
        &self.params
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn root_node(&self) -> &SearchNode<P> {
        &self.search_tree[self.root]
    }

    pub fn root_position(&self) -> &P {
        &self.search_tree[self.root].position
    }

    /// Mean value of the root, from the point of view of the player to move at the root
    pub fn root_q(&self) -> f32 {
        self.search_tree[self.root].q()
    }

    pub fn root_visits(&self) -> u32 {
        self.search_tree[self.root].simulations_n
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&SearchNode<P>> {
        self.search_tree.node_weight(idx)
    }

    /// The position of a leaf selected from this tree since the last committed move
    pub fn leaf_position(&self, leaf: &Leaf) -> &P {
        &self.search_tree[leaf.node].position
    }

    pub fn child(&self, idx: NodeIndex, m: P::Move) -> Option<&SearchNode<P>> {
        let node = self.search_tree.node_weight(idx)?;
        let child = node.children.get(&m)?;
        self.search_tree.node_weight(*child)
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.search_tree.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.search_tree.node_count() == 0
    }

    pub fn is_noise_injected(&self) -> bool {
        self.noise_injected
    }

    /* Descend from the root to a node that is either unexpanded or terminal */
    pub fn select_leaf(&self) -> Leaf {
        let mut path = vec![self.root];
        let mut node_id = self.root;
        loop {
            let node = &self.search_tree[node_id];

            /* Node is leaf, done */
            if !node.expanded || node.position.is_over() {
                return Leaf { node: node_id, path };
            }

            /* Node is not a leaf, choose best child and continue in its sub tree */
            let parent_simcount_sqrt = (node.simulations_n as f32).sqrt();
            let best_child = node
                .children
                .iter()
                .map(|(m, child_id)| {
                    let child = &self.search_tree[*child_id];
                    (m, *child_id, self.calc_selection_heuristic(child, parent_simcount_sqrt))
                })
                /* Equal scores are resolved towards the smallest move */
                .max_by(|(m1, _, val1), (m2, _, val2)| val1.total_cmp(val2).then_with(|| m2.cmp(m1)));

            match best_child {
                Some((_m, child_id, _val)) => {
                    path.push(child_id);
                    node_id = child_id;
                }
                None => return Leaf { node: node_id, path },
            }
        }
    }

    fn calc_selection_heuristic(&self, child: &SearchNode<P>, parent_simcount_sqrt: f32) -> f32 {
        /* Child values are stored from the opponent's point of view */
        let exploit = -child.q();
        let explore = self.params.c_puct * child.prior * parent_simcount_sqrt / (1 + child.simulations_n) as f32;
        exploit + explore
    }

    /// Expand the leaf (if needed) using the evaluator's priors and back up the value to the root.
    ///
    /// The value of a terminal leaf is taken from the rules engine and the evaluator output is ignored.
    pub fn incorporate_results(&mut self, leaf: &Leaf, evaluation: Evaluation<P::Move>) -> Result<()> {
        debug_assert_eq!(leaf.path.first(), Some(&self.root));
        debug_assert_eq!(leaf.path.last(), Some(&leaf.node));

        let node = &self.search_tree[leaf.node];
        let value = if node.position.is_over() {
            node.position.terminal_value()
        } else {
            let value = evaluation.value;
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(Error::ValueOutOfRange(value));
            }
            if !node.expanded {
                self.create_children(leaf.node, &evaluation.priors)?;
            }
            value
        };

        self.backpropagate(&leaf.path, value);
        Ok(())
    }

    fn create_children(&mut self, parent_id: NodeIndex, priors: &[(P::Move, f32)]) -> Result<()> {
        let parent_pos = self.search_tree[parent_id].position.clone();
        debug_assert!(!parent_pos.is_over());

        let legal_moves = parent_pos.legal_moves();
        if legal_moves.is_empty() {
            return Err(Error::NoLegalMoves);
        }

        let mut priors_map = BTreeMap::new();
        for (m, p) in priors {
            if !p.is_finite() || *p < 0.0 {
                return Err(Error::MalformedPriors(format!("prior {} for move {:?}", p, m)));
            }
            if priors_map.insert(*m, *p).is_some() {
                return Err(Error::MalformedPriors(format!("duplicate prior for move {:?}", m)));
            }
        }

        /* Mask out illegal moves and renormalize */
        let legal_priors = legal_moves
            .into_iter()
            .map(|m| (m, priors_map.get(&m).copied().unwrap_or(0.0)))
            .collect_vec();
        let priors_sum: f32 = legal_priors.iter().map(|(_m, p)| p).sum();
        if !(priors_sum > 0.0 && priors_sum.is_finite()) {
            return Err(Error::MalformedPriors(format!(
                "no probability mass on the legal moves of {:?}",
                parent_pos
            )));
        }

        for (m, p) in legal_priors {
            let child_pos = parent_pos.moved_position(m);
            let child = SearchNode::new(child_pos, Some(m), Some(parent_id), p / priors_sum);
            let child_id = self.search_tree.add_node(child);
            self.search_tree.add_edge(parent_id, child_id, m);
            self.search_tree[parent_id].children.insert(m, child_id);
        }
        self.search_tree[parent_id].expanded = true;
        Ok(())
    }

    fn backpropagate(&mut self, path: &[NodeIndex], value: f32) {
        let mut applied_value = value;
        for node_id in path.iter().rev() {
            let node = &mut self.search_tree[*node_id];
            node.simulations_n += 1;
            node.score_w += applied_value;
            applied_value = -applied_value;
        }
    }

    /// Mix Dirichlet noise into the root's children priors.
    ///
    /// Must be called at most once between two committed moves.
    pub fn inject_noise(&mut self, rand: &mut impl Rng) -> Result<()> {
        if self.noise_injected {
            return Err(Error::NoiseAlreadyInjected);
        }
        self.noise_injected = true;

        let alpha = self.params.noise_alpha;
        let epsilon = self.params.noise_epsilon;
        if alpha == 0.0 || epsilon == 0.0 {
            return Ok(());
        }

        let children = self.search_tree[self.root].children.values().copied().collect_vec();
        if children.len() < 2 {
            return Ok(());
        }

        let dist = Dirichlet::new_with_size(alpha, children.len()).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        /* Small alphas might produce NaNs, keep drawing until a valid noise is achieved */
        let noise_vec = loop {
            let noise_vec: Vec<f32> = dist.sample(rand);
            if noise_vec.iter().all(|n| n.is_finite()) {
                break noise_vec;
            }
        };

        for (child_id, noise) in children.into_iter().zip(noise_vec) {
            let child = &mut self.search_tree[child_id];
            child.prior = (1.0 - epsilon) * child.prior + epsilon * noise;
        }
        Ok(())
    }

    /// Root children visit counts, normalized to a distribution and ordered by move.
    ///
    /// A root with no visited children (a single readout) yields a uniform distribution.
    pub fn visit_distribution(&self) -> Vec<(P::Move, f32)> {
        let moves_and_simcounts = self.search_tree[self.root]
            .children
            .iter()
            .map(|(m, child_id)| (*m, self.search_tree[*child_id].simulations_n))
            .collect_vec();

        let simcount_total: u32 = moves_and_simcounts.iter().map(|(_m, n)| n).sum();
        if simcount_total == 0 {
            let uniform = 1.0 / moves_and_simcounts.len() as f32;
            return moves_and_simcounts.into_iter().map(|(m, _n)| (m, uniform)).collect_vec();
        }
        moves_and_simcounts
            .into_iter()
            .map(|(m, n)| (m, n as f32 / simcount_total as f32))
            .collect_vec()
    }

    /// Commit a move: the chosen child becomes the root and all other nodes are dropped.
    pub fn promote(&mut self, m: P::Move) -> Result<()> {
        let root = &self.search_tree[self.root];
        if root.position.is_over() {
            return Err(Error::GameOver);
        }

        let new_root = match root.children.get(&m) {
            Some(child_id) => *child_id,
            None if !root.expanded && root.position.legal_moves().contains(&m) => {
                /* Nothing was searched yet, start over from the moved position */
                let position = root.position.moved_position(m);
                *self = Self::new(position, self.params);
                return Ok(());
            }
            None => {
                return Err(Error::IllegalMove(format!("{:?} in position {:?}", m, root.position)));
            }
        };

        let mut keep = HashSet::new();
        let mut dfs = Dfs::new(&self.search_tree, new_root);
        while let Some(node_id) = dfs.next(&self.search_tree) {
            keep.insert(node_id);
        }
        let discarded = self
            .search_tree
            .node_indices()
            .filter(|node_id| !keep.contains(node_id))
            .collect_vec();
        for node_id in discarded {
            self.search_tree.remove_node(node_id);
        }

        let root = &mut self.search_tree[new_root];
        root.parent = None;
        root.m = None;
        self.root = new_root;
        self.noise_injected = false;
        Ok(())
    }

    /// Moves from the root to the given node
    pub fn path_to_root(&self, node_id: NodeIndex) -> Vec<P::Move> {
        let mut moves = Vec::new();
        let mut current = self.search_tree.node_weight(node_id);
        while let Some(node) = current {
            if let Some(m) = node.m {
                moves.push(m);
            }
            current = node.parent.and_then(|parent_id| self.search_tree.node_weight(parent_id));
        }
        moves.reverse();
        moves
    }

    /// The most visited path from the root, ties resolved towards the smallest move
    pub fn principal_variation(&self) -> Vec<P::Move> {
        let mut moves = Vec::new();
        let mut node = &self.search_tree[self.root];
        while let Some((m, child_id)) = node
            .children
            .iter()
            .max_by(|(m1, c1), (m2, c2)| {
                let n1 = self.search_tree[**c1].simulations_n;
                let n2 = self.search_tree[**c2].simulations_n;
                n1.cmp(&n2).then_with(|| m2.cmp(m1))
            })
        {
            let child = &self.search_tree[*child_id];
            if child.simulations_n == 0 {
                break;
            }
            moves.push(*m);
            node = child;
        }
        moves
    }

    /// Human readable ranking of the root children, for diagnostics only
    pub fn describe(&self) -> String {
        let root = &self.search_tree[self.root];
        let mut s = String::new();
        let _ = writeln!(s, "Q: {:.4}, N: {}", root.q(), root.simulations_n);
        let _ = writeln!(s, "Principal variation: {:?}", self.principal_variation());

        let ranked = root
            .children
            .iter()
            .map(|(m, child_id)| (m, &self.search_tree[*child_id]))
            .sorted_by(|(m1, c1), (m2, c2)| c2.simulations_n.cmp(&c1.simulations_n).then_with(|| m1.cmp(m2)));
        for (m, child) in ranked.take(10) {
            let _ = writeln!(
                s,
                "{:?}: N={}, Q={:.4}, P={:.4}",
                m,
                child.simulations_n,
                -child.q(),
                child.prior
            );
        }
        s
    }
}
