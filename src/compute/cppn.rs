//! Compositional pattern-producing networks.
//!
//! A [`CppnGenome`] is a feed-forward network over the inputs
//! `(x, y, z, d)`, where `d` is the distance from the lattice centre. Genes
//! carry innovation numbers so that crossover and the compatibility distance
//! can line up structurally matching connections. [`CppnRng`] owns the
//! random state and the innovation bookkeeping for one population.

use std::collections::HashMap;

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compute::evolution::Cppn;
use crate::schema::ReproductionConfig;

/// Network inputs: x, y, z and distance from centre.
pub const INPUT_COUNT: usize = 4;

/// Node transfer functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    Sigmoid,
    Tanh,
    /// Sine shifted into `[0, 1]` with the input clamped to `[-60, 60]`.
    Sine,
    Gaussian,
    Identity,
}

impl Activation {
    pub const ALL: [Activation; 5] = [
        Activation::Sigmoid,
        Activation::Tanh,
        Activation::Sine,
        Activation::Gaussian,
        Activation::Identity,
    ];

    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-(5.0 * x).clamp(-60.0, 60.0)).exp()),
            Activation::Tanh => (2.5 * x).tanh(),
            Activation::Sine => ((5.0 * x).clamp(-60.0, 60.0).sin() + 1.0) / 2.0,
            Activation::Gaussian => (-5.0 * x * x).exp(),
            Activation::Identity => x,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Input,
    Hidden,
    Output,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeGene {
    pub id: usize,
    pub kind: NodeKind,
    pub activation: Activation,
    pub bias: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionGene {
    pub innovation: u64,
    pub from: usize,
    pub to: usize,
    pub weight: f32,
    pub enabled: bool,
}

/// One evaluation step: `values[node] = activation(bias + Σ values[src] * w)`.
#[derive(Debug, Clone)]
struct Step {
    node: usize,
    activation: Activation,
    bias: f32,
    inputs: Vec<(usize, f32)>,
}

/// A CPPN genome.
///
/// `nodes` is kept in evaluation order: inputs first, the output last, and
/// every enabled connection runs from an earlier node to a later one.
#[derive(Debug, Clone)]
pub struct CppnGenome {
    nodes: Vec<NodeGene>,
    connections: Vec<ConnectionGene>,
    plan: Vec<Step>,
}

impl CppnGenome {
    /// Build a genome and its evaluation plan.
    pub fn from_genes(nodes: Vec<NodeGene>, connections: Vec<ConnectionGene>) -> Self {
        let mut genome = Self {
            nodes,
            connections,
            plan: Vec::new(),
        };
        genome.rebuild();
        genome
    }

    pub fn nodes(&self) -> &[NodeGene] {
        &self.nodes
    }

    pub fn connections(&self) -> &[ConnectionGene] {
        &self.connections
    }

    fn position(&self, id: usize) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    fn rebuild(&mut self) {
        let positions: HashMap<usize, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(pos, n)| (n.id, pos))
            .collect();

        self.plan = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind != NodeKind::Input)
            .map(|(pos, node)| Step {
                node: pos,
                activation: node.activation,
                bias: node.bias,
                inputs: self
                    .connections
                    .iter()
                    .filter(|c| c.enabled && c.to == node.id)
                    .filter_map(|c| {
                        positions
                            .get(&c.from)
                            .filter(|src| **src < pos)
                            .map(|src| (*src, c.weight))
                    })
                    .collect(),
            })
            .collect();
    }

    /// NEAT compatibility distance: disjoint genes and mean weight
    /// difference of matching genes.
    pub fn distance(&self, other: &CppnGenome, disjoint_coefficient: f32, weight_coefficient: f32) -> f32 {
        let theirs: HashMap<u64, f32> = other
            .connections
            .iter()
            .map(|c| (c.innovation, c.weight))
            .collect();

        let mut matching = 0usize;
        let mut weight_diff = 0.0f32;
        for gene in &self.connections {
            if let Some(w) = theirs.get(&gene.innovation) {
                matching += 1;
                weight_diff += (gene.weight - w).abs();
            }
        }
        let disjoint = self.connections.len() + other.connections.len() - 2 * matching;
        let size = self.connections.len().max(other.connections.len()).max(1);

        let mean_weight_diff = if matching > 0 {
            weight_diff / matching as f32
        } else {
            0.0
        };
        disjoint_coefficient * disjoint as f32 / size as f32 + weight_coefficient * mean_weight_diff
    }
}

impl Cppn for CppnGenome {
    fn activate(&self, x: f32, y: f32, z: f32) -> f32 {
        let mut values = vec![0.0f32; self.nodes.len()];
        let d = ((x - 0.5).powi(2) + (y - 0.5).powi(2) + (z - 0.5).powi(2)).sqrt();
        for (slot, input) in values.iter_mut().zip([x, y, z, d]) {
            *slot = input;
        }
        for step in &self.plan {
            let sum: f32 = step.inputs.iter().map(|(src, w)| values[*src] * w).sum();
            values[step.node] = step.activation.apply(step.bias + sum);
        }
        values.last().copied().unwrap_or(0.0)
    }

    fn complexity(&self) -> (usize, usize) {
        let enabled = self.connections.iter().filter(|c| c.enabled).count();
        (self.nodes.len(), enabled)
    }
}

/// Random number generator and innovation tracker for CPPN operations.
pub struct CppnRng {
    rng: StdRng,
    innovations: HashMap<(usize, usize), u64>,
    splits: HashMap<u64, usize>,
    next_node: usize,
}

impl CppnRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            innovations: HashMap::new(),
            splits: HashMap::new(),
            next_node: INPUT_COUNT + 1,
        }
    }

    fn innovation(&mut self, from: usize, to: usize) -> u64 {
        let next = self.innovations.len() as u64;
        *self.innovations.entry((from, to)).or_insert(next)
    }

    /// Same connection split twice yields the same node id.
    fn split_node(&mut self, innovation: u64) -> usize {
        if let Some(id) = self.splits.get(&innovation) {
            return *id;
        }
        let id = self.next_node;
        self.next_node += 1;
        self.splits.insert(innovation, id);
        id
    }

    fn weight(&mut self) -> f32 {
        self.rng.sample::<f32, _>(rand_distr::StandardNormal)
    }

    /// Minimal genome: every input wired straight to a sine output.
    pub fn random_genome(&mut self) -> CppnGenome {
        let output = INPUT_COUNT;
        let mut nodes: Vec<NodeGene> = (0..INPUT_COUNT)
            .map(|id| NodeGene {
                id,
                kind: NodeKind::Input,
                activation: Activation::Identity,
                bias: 0.0,
            })
            .collect();
        nodes.push(NodeGene {
            id: output,
            kind: NodeKind::Output,
            activation: Activation::Sine,
            bias: self.weight(),
        });

        let connections = (0..INPUT_COUNT)
            .map(|from| ConnectionGene {
                innovation: self.innovation(from, output),
                from,
                to: output,
                weight: self.weight(),
                enabled: true,
            })
            .collect();

        CppnGenome::from_genes(nodes, connections)
    }

    /// Gaussian perturbation of `value`.
    pub fn gaussian_mutate(&mut self, value: f32, power: f32) -> f32 {
        let noise: f32 = self.rng.sample(rand_distr::StandardNormal);
        (value + noise * power).clamp(-8.0, 8.0)
    }

    /// Apply every mutation operator with its configured probability.
    pub fn mutate(&mut self, genome: &mut CppnGenome, config: &ReproductionConfig) {
        for i in 0..genome.connections.len() {
            if self.rng.r#gen::<f32>() < config.weight_mutation_rate {
                genome.connections[i].weight =
                    self.gaussian_mutate(genome.connections[i].weight, config.weight_mutation_power);
            }
        }
        for i in INPUT_COUNT..genome.nodes.len() {
            if self.rng.r#gen::<f32>() < config.weight_mutation_rate {
                genome.nodes[i].bias =
                    self.gaussian_mutate(genome.nodes[i].bias, config.weight_mutation_power);
            }
        }

        if self.rng.r#gen::<f32>() < config.add_node_rate {
            self.add_node(genome);
        }
        if self.rng.r#gen::<f32>() < config.add_connection_rate {
            self.add_connection(genome);
        }
        if !genome.connections.is_empty() && self.rng.r#gen::<f32>() < config.toggle_rate {
            let idx = self.rng.gen_range(0..genome.connections.len());
            genome.connections[idx].enabled = !genome.connections[idx].enabled;
        }

        genome.rebuild();
    }

    /// Split an enabled connection `a -> b` into `a -> new -> b`.
    pub fn add_node(&mut self, genome: &mut CppnGenome) {
        let enabled: Vec<usize> = (0..genome.connections.len())
            .filter(|i| genome.connections[*i].enabled)
            .collect();
        let Some(&idx) = enabled.choose(&mut self.rng) else {
            return;
        };
        let (innovation, from, to, weight) = {
            let c = &genome.connections[idx];
            (c.innovation, c.from, c.to, c.weight)
        };

        let id = self.split_node(innovation);
        if genome.position(id).is_some() {
            return;
        }
        let Some(to_pos) = genome.position(to) else {
            return;
        };

        genome.connections[idx].enabled = false;
        let activation = *Activation::ALL
            .choose(&mut self.rng)
            .unwrap_or(&Activation::Sigmoid);
        genome.nodes.insert(
            to_pos,
            NodeGene {
                id,
                kind: NodeKind::Hidden,
                activation,
                bias: 0.0,
            },
        );
        genome.connections.push(ConnectionGene {
            innovation: self.innovation(from, id),
            from,
            to: id,
            weight: 1.0,
            enabled: true,
        });
        genome.connections.push(ConnectionGene {
            innovation: self.innovation(id, to),
            from: id,
            to,
            weight,
            enabled: true,
        });
        genome.rebuild();
    }

    /// Connect two unconnected nodes, earlier to later in evaluation order.
    pub fn add_connection(&mut self, genome: &mut CppnGenome) {
        let n = genome.nodes.len();
        let mut candidates = Vec::new();
        for src in 0..n {
            if genome.nodes[src].kind == NodeKind::Output {
                continue;
            }
            for dst in (src + 1)..n {
                if genome.nodes[dst].kind == NodeKind::Input {
                    continue;
                }
                let (from, to) = (genome.nodes[src].id, genome.nodes[dst].id);
                if !genome.connections.iter().any(|c| c.from == from && c.to == to) {
                    candidates.push((from, to));
                }
            }
        }
        let Some(&(from, to)) = candidates.choose(&mut self.rng) else {
            return;
        };
        let weight = self.weight();
        genome.connections.push(ConnectionGene {
            innovation: self.innovation(from, to),
            from,
            to,
            weight,
            enabled: true,
        });
        genome.rebuild();
    }

    /// Child with the fitter parent's structure; matching genes take either
    /// parent's weight at random.
    pub fn crossover(&mut self, fitter: &CppnGenome, other: &CppnGenome) -> CppnGenome {
        let theirs: HashMap<u64, f32> = other
            .connections
            .iter()
            .map(|c| (c.innovation, c.weight))
            .collect();

        let connections = fitter
            .connections
            .iter()
            .map(|gene| {
                let mut child = gene.clone();
                if let Some(w) = theirs.get(&gene.innovation)
                    && self.rng.gen_bool(0.5)
                {
                    child.weight = *w;
                }
                child
            })
            .collect();

        CppnGenome::from_genes(fitter.nodes.clone(), connections)
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }

    /// Uniform sample in `[0, 1)`.
    pub fn unit(&mut self) -> f32 {
        self.rng.r#gen()
    }

    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReproductionConfig {
        ReproductionConfig::default()
    }

    #[test]
    fn test_sine_activation_range() {
        for x in [-100.0, -1.0, 0.0, 0.3, 100.0] {
            let y = Activation::Sine.apply(x);
            assert!((0.0..=1.0).contains(&y));
        }
        assert_eq!(Activation::Sine.apply(0.0), 0.5);
        // Clamped at 60 before the sine.
        assert_eq!(Activation::Sine.apply(100.0), Activation::Sine.apply(12.0));
    }

    #[test]
    fn test_random_genome_is_minimal() {
        let mut rng = CppnRng::new(42);
        let genome = rng.random_genome();
        assert_eq!(genome.complexity(), (INPUT_COUNT + 1, INPUT_COUNT));
        let y = genome.activate(0.25, 0.5, 0.75);
        assert!((0.0..=1.0).contains(&y));
    }

    #[test]
    fn test_add_node_keeps_output() {
        let mut rng = CppnRng::new(7);
        let mut genome = rng.random_genome();
        let before = genome.activate(0.1, 0.2, 0.3);
        rng.add_node(&mut genome);

        let (nodes, connections) = genome.complexity();
        assert_eq!(nodes, INPUT_COUNT + 2);
        assert_eq!(connections, INPUT_COUNT + 1);
        assert_eq!(genome.nodes().last().map(|n| n.kind), Some(NodeKind::Output));
        // Output still produced from the rewired network.
        let after = genome.activate(0.1, 0.2, 0.3);
        assert!(after.is_finite() && before.is_finite());
    }

    #[test]
    fn test_add_connection_acyclic() {
        let mut rng = CppnRng::new(3);
        let mut genome = rng.random_genome();
        for _ in 0..5 {
            rng.add_node(&mut genome);
            rng.add_connection(&mut genome);
        }
        for c in genome.connections() {
            let from = genome.position(c.from).unwrap();
            let to = genome.position(c.to).unwrap();
            assert!(from < to);
        }
    }

    #[test]
    fn test_shared_innovations() {
        let mut rng = CppnRng::new(1);
        let a = rng.random_genome();
        let b = rng.random_genome();
        let innov_a: Vec<_> = a.connections().iter().map(|c| c.innovation).collect();
        let innov_b: Vec<_> = b.connections().iter().map(|c| c.innovation).collect();
        assert_eq!(innov_a, innov_b);
    }

    #[test]
    fn test_distance() {
        let mut rng = CppnRng::new(5);
        let a = rng.random_genome();
        assert_eq!(a.distance(&a, 1.0, 0.5), 0.0);

        let mut b = a.clone();
        rng.add_node(&mut b);
        assert!(a.distance(&b, 1.0, 0.0) > 0.0);
    }

    #[test]
    fn test_crossover_follows_fitter_structure() {
        let mut rng = CppnRng::new(11);
        let mut fitter = rng.random_genome();
        rng.add_node(&mut fitter);
        let other = rng.random_genome();

        let child = rng.crossover(&fitter, &other);
        assert_eq!(child.complexity(), fitter.complexity());
    }

    #[test]
    fn test_mutation_preserves_invariants() {
        let mut rng = CppnRng::new(99);
        let mut genome = rng.random_genome();
        let mut config = config();
        config.add_node_rate = 1.0;
        config.add_connection_rate = 1.0;
        for _ in 0..10 {
            rng.mutate(&mut genome, &config);
        }
        assert!(genome.nodes().len() > INPUT_COUNT + 1);
        assert!(genome.activate(0.5, 0.5, 0.5).is_finite());
    }
}
