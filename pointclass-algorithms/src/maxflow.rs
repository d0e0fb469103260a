//! s-t minimum cut on graphs with real-valued capacities

use std::collections::VecDeque;

const EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct FlowEdge {
    to: usize,
    capacity: f64,
}

/// Residual flow network solved with Dinic's algorithm
///
/// Edges are stored in pairs: edge `e` and `e ^ 1` are each other's reverse.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    adjacency: Vec<Vec<usize>>,
    edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn new(node_count: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); node_count],
            edges: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Add an edge `from -> to` and its reverse `to -> from`
    pub fn add_edge(&mut self, from: usize, to: usize, capacity: f64, reverse_capacity: f64) {
        self.adjacency[from].push(self.edges.len());
        self.edges.push(FlowEdge { to, capacity });
        self.adjacency[to].push(self.edges.len());
        self.edges.push(FlowEdge {
            to: from,
            capacity: reverse_capacity,
        });
    }

    fn levels(&self, source: usize) -> Vec<usize> {
        let mut level = vec![usize::MAX; self.node_count()];
        let mut queue = VecDeque::new();
        level[source] = 0;
        queue.push_back(source);

        while let Some(u) = queue.pop_front() {
            for &e in &self.adjacency[u] {
                let edge = self.edges[e];
                if edge.capacity > EPSILON && level[edge.to] == usize::MAX {
                    level[edge.to] = level[u] + 1;
                    queue.push_back(edge.to);
                }
            }
        }

        level
    }

    /// Push the maximum flow from `source` to `sink` and return its value
    pub fn max_flow(&mut self, source: usize, sink: usize) -> f64 {
        if source == sink {
            return 0.0;
        }

        let mut total = 0.0;

        loop {
            let mut level = self.levels(source);
            if level[sink] == usize::MAX {
                return total;
            }

            let mut next = vec![0usize; self.node_count()];
            let mut path: Vec<usize> = Vec::new();
            let mut u = source;

            loop {
                if u == sink {
                    let bottleneck = path
                        .iter()
                        .map(|&e| self.edges[e].capacity)
                        .fold(f64::INFINITY, f64::min);
                    for &e in &path {
                        self.edges[e].capacity -= bottleneck;
                        self.edges[e ^ 1].capacity += bottleneck;
                    }
                    total += bottleneck;
                    path.clear();
                    u = source;
                    continue;
                }

                let mut advanced = false;
                while next[u] < self.adjacency[u].len() {
                    let e = self.adjacency[u][next[u]];
                    let edge = self.edges[e];
                    if edge.capacity > EPSILON && level[edge.to] == level[u] + 1 {
                        path.push(e);
                        u = edge.to;
                        advanced = true;
                        break;
                    }
                    next[u] += 1;
                }

                if !advanced {
                    if u == source {
                        break;
                    }
                    // Dead end: drop the node from this phase and step back
                    level[u] = usize::MAX;
                    if let Some(e) = path.pop() {
                        u = self.edges[e ^ 1].to;
                        next[u] += 1;
                    }
                }
            }
        }
    }

    /// Nodes reachable from `source` in the residual graph after [`Self::max_flow`]
    pub fn source_side(&self, source: usize) -> Vec<bool> {
        self.levels(source)
            .into_iter()
            .map(|l| l != usize::MAX)
            .collect()
    }
}
