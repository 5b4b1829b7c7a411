//! Population topologies.
//!
//! Agents sit on the nodes of an undirected graph that is fixed after
//! construction; only per-node trait state ever mutates. The model needs
//! nothing beyond O(1) random-node selection, O(degree) adjacency, and
//! full edge iteration, so the graph is a flat adjacency list.

use std::collections::BTreeSet;

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::schema::{ConfigError, LATTICE_COORDINATION_NUMBER, TopologyConfig};

/// An immutable undirected graph over the agent population.
#[derive(Debug, Clone)]
pub struct Topology {
    neighbors: Vec<Vec<usize>>,
    edges: Vec<(usize, usize)>,
    coordination: usize,
}

impl Topology {
    fn from_edge_set(node_count: usize, edge_set: BTreeSet<(usize, usize)>) -> Self {
        let mut neighbors = vec![Vec::new(); node_count];
        for &(a, b) in &edge_set {
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        Self {
            neighbors,
            edges: edge_set.into_iter().collect(),
            coordination: LATTICE_COORDINATION_NUMBER,
        }
    }

    /// Build the topology named by the configuration.
    pub fn build(
        config: &TopologyConfig,
        popsize: usize,
        rng: &mut StdRng,
    ) -> Result<Self, ConfigError> {
        match config {
            TopologyConfig::Lattice { periodic } => Self::square_lattice(popsize, *periodic),
            TopologyConfig::SmallWorld { rewiring } => Self::small_world(popsize, *rewiring, rng),
        }
    }

    /// Square lattice of side sqrt(N), toroidal when `periodic`.
    ///
    /// Fails when the population size is not a perfect square; a lattice
    /// population cannot be silently resized.
    pub fn square_lattice(popsize: usize, periodic: bool) -> Result<Self, ConfigError> {
        let side = (popsize as f64).sqrt().round() as usize;
        if side * side != popsize {
            return Err(ConfigError::NotPerfectSquare(popsize));
        }

        let node = |row: usize, col: usize| row * side + col;
        let mut edge_set = BTreeSet::new();
        for row in 0..side {
            for col in 0..side {
                // Right and down cover every link once; wrapping links
                // collapse to duplicates on tiny lattices, which the edge
                // set absorbs.
                if col + 1 < side {
                    edge_set.insert(ordered(node(row, col), node(row, col + 1)));
                } else if periodic && side > 1 {
                    edge_set.insert(ordered(node(row, col), node(row, 0)));
                }
                if row + 1 < side {
                    edge_set.insert(ordered(node(row, col), node(row + 1, col)));
                } else if periodic && side > 1 {
                    edge_set.insert(ordered(node(row, col), node(0, col)));
                }
            }
        }

        Ok(Self::from_edge_set(popsize, edge_set))
    }

    /// Watts-Strogatz small world: a ring lattice with coordination number
    /// 4, each link rewired with probability `rewiring`. Construction is
    /// retried until the graph is connected.
    pub fn small_world(
        popsize: usize,
        rewiring: f64,
        rng: &mut StdRng,
    ) -> Result<Self, ConfigError> {
        if popsize <= LATTICE_COORDINATION_NUMBER {
            return Err(ConfigError::PopulationTooSmall {
                popsize,
                minimum: LATTICE_COORDINATION_NUMBER + 1,
            });
        }
        if !(0.0..=1.0).contains(&rewiring) {
            return Err(ConfigError::InvalidRate {
                name: "rewiring",
                value: rewiring,
            });
        }

        const MAX_ATTEMPTS: usize = 100;
        for _ in 0..MAX_ATTEMPTS {
            let topology = Self::rewired_ring(popsize, rewiring, rng);
            if topology.is_connected() {
                return Ok(topology);
            }
        }
        Err(ConfigError::DisconnectedTopology(popsize))
    }

    fn rewired_ring(popsize: usize, rewiring: f64, rng: &mut StdRng) -> Self {
        let half_k = LATTICE_COORDINATION_NUMBER / 2;
        let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); popsize];
        for node in 0..popsize {
            for offset in 1..=half_k {
                let other = (node + offset) % popsize;
                adjacency[node].insert(other);
                adjacency[other].insert(node);
            }
        }

        // Rewire the far endpoint of each original ring link.
        for node in 0..popsize {
            for offset in 1..=half_k {
                if rng.r#gen::<f64>() >= rewiring {
                    continue;
                }
                let old = (node + offset) % popsize;
                let candidate = rng.gen_range(0..popsize);
                if candidate == node || adjacency[node].contains(&candidate) {
                    continue;
                }
                if adjacency[node].remove(&old) {
                    adjacency[old].remove(&node);
                    adjacency[node].insert(candidate);
                    adjacency[candidate].insert(node);
                }
            }
        }

        let mut edge_set = BTreeSet::new();
        for (node, others) in adjacency.iter().enumerate() {
            for &other in others {
                edge_set.insert(ordered(node, other));
            }
        }
        Self::from_edge_set(popsize, edge_set)
    }

    fn is_connected(&self) -> bool {
        if self.neighbors.is_empty() {
            return true;
        }
        let mut seen = vec![false; self.neighbors.len()];
        let mut stack = vec![0usize];
        seen[0] = true;
        let mut visited = 1;
        while let Some(node) = stack.pop() {
            for &next in &self.neighbors[node] {
                if !seen[next] {
                    seen[next] = true;
                    visited += 1;
                    stack.push(next);
                }
            }
        }
        visited == self.neighbors.len()
    }

    /// Number of agents.
    pub fn node_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Neighbor list of a node.
    pub fn neighbors(&self, id: usize) -> &[usize] {
        &self.neighbors[id]
    }

    /// Degree of a node.
    pub fn degree(&self, id: usize) -> usize {
        self.neighbors[id].len()
    }

    /// All edges as ordered `(low, high)` pairs.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nominal coordination number of the underlying lattice.
    pub fn coordination_number(&self) -> usize {
        self.coordination
    }

    /// Uniformly random node.
    pub fn random_node(&self, rng: &mut StdRng) -> usize {
        rng.gen_range(0..self.neighbors.len())
    }

    /// Uniformly random neighbor of `id`, or `None` for isolated nodes.
    pub fn random_neighbor(&self, id: usize, rng: &mut StdRng) -> Option<usize> {
        self.neighbors[id].choose(rng).copied()
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn periodic_lattice_is_four_regular() {
        let topology = Topology::square_lattice(25, true).unwrap();
        assert_eq!(topology.node_count(), 25);
        assert_eq!(topology.edge_count(), 50);
        for id in 0..25 {
            assert_eq!(topology.degree(id), 4);
        }
    }

    #[test]
    fn bounded_lattice_has_corner_degree_two() {
        let topology = Topology::square_lattice(25, false).unwrap();
        assert_eq!(topology.edge_count(), 40);
        assert_eq!(topology.degree(0), 2);
        assert_eq!(topology.degree(24), 2);
        // Interior node keeps degree 4.
        assert_eq!(topology.degree(12), 4);
    }

    #[test]
    fn lattice_rejects_imperfect_square() {
        assert!(matches!(
            Topology::square_lattice(30, true),
            Err(ConfigError::NotPerfectSquare(30))
        ));
    }

    #[test]
    fn lattice_neighbors_wrap_when_periodic() {
        let topology = Topology::square_lattice(25, true).unwrap();
        let mut neighbors = topology.neighbors(0).to_vec();
        neighbors.sort_unstable();
        // Node 0 of a 5x5 torus touches 1, 4 (row wrap), 5, and 20 (column wrap).
        assert_eq!(neighbors, vec![1, 4, 5, 20]);
    }

    #[test]
    fn small_world_is_connected_and_preserves_edge_count() {
        let mut rng = StdRng::seed_from_u64(11);
        for rewiring in [0.0, 0.1, 0.5] {
            let topology = Topology::small_world(30, rewiring, &mut rng).unwrap();
            assert!(topology.is_connected());
            // Rewiring moves endpoints but never removes links outright.
            assert_eq!(topology.edge_count(), 30 * 2);
        }
    }

    #[test]
    fn small_world_rejects_tiny_population() {
        let mut rng = StdRng::seed_from_u64(11);
        assert!(matches!(
            Topology::small_world(4, 0.1, &mut rng),
            Err(ConfigError::PopulationTooSmall { .. })
        ));
    }

    #[test]
    fn unrewired_ring_matches_regular_lattice() {
        let mut rng = StdRng::seed_from_u64(3);
        let topology = Topology::small_world(10, 0.0, &mut rng).unwrap();
        for id in 0..10 {
            assert_eq!(topology.degree(id), 4);
        }
    }

    #[test]
    fn random_neighbor_is_adjacent() {
        let topology = Topology::square_lattice(16, true).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let node = topology.random_node(&mut rng);
            let neighbor = topology.random_neighbor(node, &mut rng).unwrap();
            assert!(topology.neighbors(node).contains(&neighbor));
        }
    }
}
