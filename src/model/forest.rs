//! The trait universe for tree-structured representations.
//!
//! Trait tokens are nodes of a forest of balanced trees with uniform
//! branching factor and depth. A token's ancestor chain (root down to its
//! parent) is its set of prerequisites. The forest is immutable and shared
//! read-only by every agent in a run.

use std::collections::BTreeSet;

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::schema::{ConfigError, TreeParams, tree_universe_size};

/// Number of nodes in a balanced tree with branching factor `r`, depth `h`.
pub fn balanced_tree_node_count(r: usize, h: usize) -> usize {
    (0..=h).map(|i| r.pow(i as u32)).sum()
}

/// An immutable forest of balanced trait trees.
///
/// Nodes are numbered breadth-first within each tree, so all structural
/// queries are arithmetic on the token id; tree `t` occupies the id range
/// `[t * nodes_per_tree, (t + 1) * nodes_per_tree)`.
#[derive(Debug, Clone)]
pub struct TraitForest {
    num_trees: usize,
    branching: usize,
    nodes_per_tree: usize,
}

impl TraitForest {
    /// Build a forest of `num_trees` balanced trees.
    pub fn balanced(num_trees: usize, branching: usize, depth: usize) -> Result<Self, ConfigError> {
        if num_trees == 0 || branching == 0 || depth == 0 {
            return Err(ConfigError::InvalidTreeShape);
        }
        // Token ids are u32, so the whole universe must fit that range.
        let total = tree_universe_size(num_trees, branching, depth)
            .filter(|&n| n <= u32::MAX as u64)
            .ok_or(ConfigError::TraitUniverseTooLarge)?;
        Ok(Self {
            num_trees,
            branching,
            nodes_per_tree: (total / num_trees as u64) as usize,
        })
    }

    /// Build the forest described by a rule's tree parameters.
    pub fn from_params(params: &TreeParams) -> Result<Self, ConfigError> {
        Self::balanced(params.num_trees, params.branching_factor, params.depth)
    }

    /// Total number of trait tokens in the universe.
    pub fn node_count(&self) -> usize {
        self.num_trees * self.nodes_per_tree
    }

    /// Number of tokens per tree.
    pub fn nodes_per_tree(&self) -> usize {
        self.nodes_per_tree
    }

    /// Root token of the tree containing `token`.
    pub fn root_of(&self, token: u32) -> u32 {
        let tree = token as usize / self.nodes_per_tree;
        (tree * self.nodes_per_tree) as u32
    }

    /// Parent of `token`, or `None` for roots.
    pub fn parent(&self, token: u32) -> Option<u32> {
        let root = self.root_of(token);
        let local = (token - root) as usize;
        if local == 0 {
            return None;
        }
        let parent_local = (local - 1) / self.branching;
        Some(root + parent_local as u32)
    }

    /// Ancestor chain of `token`, root first, excluding the token itself.
    pub fn ancestors(&self, token: u32) -> Vec<u32> {
        let mut chain = Vec::new();
        let mut current = token;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Ancestor chain of `token` including the token itself, root first.
    pub fn token_with_ancestors(&self, token: u32) -> Vec<u32> {
        let mut chain = self.ancestors(token);
        chain.push(token);
        chain
    }

    /// Whether `held` contains every ancestor of `token`.
    pub fn has_prerequisites(&self, token: u32, held: &BTreeSet<u32>) -> bool {
        let mut current = token;
        while let Some(parent) = self.parent(current) {
            if !held.contains(&parent) {
                return false;
            }
            current = parent;
        }
        true
    }

    /// Deepest ancestor of `token` absent from `held`, if any.
    pub fn deepest_missing_ancestor(&self, token: u32, held: &BTreeSet<u32>) -> Option<u32> {
        let mut current = token;
        while let Some(parent) = self.parent(current) {
            if !held.contains(&parent) {
                return Some(parent);
            }
            current = parent;
        }
        None
    }

    /// Uniformly random token from the whole universe.
    pub fn random_token(&self, rng: &mut StdRng) -> u32 {
        rng.gen_range(0..self.node_count() as u32)
    }

    /// Random token together with its full ancestor chain, root first.
    /// Used both for population initialization and innovation events.
    pub fn random_token_with_ancestors(&self, rng: &mut StdRng) -> Vec<u32> {
        let token = self.random_token(rng);
        self.token_with_ancestors(token)
    }

    /// Connected components of the forest induced by a token set,
    /// as (tokens, parent-child edges) pairs. Handed to the external
    /// symmetry collaborator at finalize time.
    pub fn induced_subgraphs(&self, tokens: &BTreeSet<u32>) -> Vec<TraitSubgraph> {
        let toks: Vec<u32> = tokens.iter().copied().collect();
        let index: std::collections::HashMap<u32, usize> =
            toks.iter().enumerate().map(|(i, &t)| (t, i)).collect();

        // Undirected adjacency over held parent-child links.
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); toks.len()];
        let mut edges: Vec<(u32, u32)> = Vec::new();
        for (i, &token) in toks.iter().enumerate() {
            if let Some(parent) = self.parent(token)
                && let Some(&j) = index.get(&parent)
            {
                adjacency[i].push(j);
                adjacency[j].push(i);
                edges.push((parent, token));
            }
        }

        let mut seen = vec![false; toks.len()];
        let mut components = Vec::new();
        for start in 0..toks.len() {
            if seen[start] {
                continue;
            }
            let mut component_tokens = Vec::new();
            let mut stack = vec![start];
            seen[start] = true;
            while let Some(current) = stack.pop() {
                component_tokens.push(toks[current]);
                for &next in &adjacency[current] {
                    if !seen[next] {
                        seen[next] = true;
                        stack.push(next);
                    }
                }
            }
            component_tokens.sort_unstable();
            let members: BTreeSet<u32> = component_tokens.iter().copied().collect();
            let component_edges = edges
                .iter()
                .copied()
                .filter(|(_, child)| members.contains(child))
                .collect();
            components.push(TraitSubgraph {
                tokens: component_tokens,
                edges: component_edges,
            });
        }

        components
    }
}

/// A connected fragment of the trait forest held by one culture.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraitSubgraph {
    /// Tokens in the fragment, ascending.
    pub tokens: Vec<u32>,
    /// Parent-child edges within the fragment.
    pub edges: Vec<(u32, u32)>,
}
