//! s-t minimum cut on a capacitated graph (Dinic's algorithm).
//!
//! Edges are stored in pairs: edge `e` and its reverse `e ^ 1`.

use std::collections::VecDeque;

const EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
pub(crate) struct FlowGraph {
    n_nodes: usize,
    to: Vec<usize>,
    cap: Vec<f64>,
    adj: Vec<Vec<usize>>,
    level: Vec<i32>,
    iter: Vec<usize>,
}

impl FlowGraph {
    /// Graph with `n_nodes` regular nodes plus an implicit source and sink.
    pub(crate) fn new(n_nodes: usize) -> Self {
        let total = n_nodes + 2;
        Self {
            n_nodes,
            to: Vec::new(),
            cap: Vec::new(),
            adj: vec![Vec::new(); total],
            level: vec![-1; total],
            iter: vec![0; total],
        }
    }

    #[inline]
    fn source(&self) -> usize {
        self.n_nodes
    }

    #[inline]
    fn sink(&self) -> usize {
        self.n_nodes + 1
    }

    fn push_pair(&mut self, a: usize, b: usize, cap_ab: f64, cap_ba: f64) {
        let e = self.to.len();
        self.to.push(b);
        self.cap.push(cap_ab.max(0.0));
        self.to.push(a);
        self.cap.push(cap_ba.max(0.0));
        self.adj[a].push(e);
        self.adj[b].push(e + 1);
    }

    /// Terminal links: `source -> node` with `to_source` and `node -> sink`
    /// with `to_sink`.
    pub(crate) fn add_tweights(&mut self, node: usize, to_source: f64, to_sink: f64) {
        let (s, t) = (self.source(), self.sink());
        if to_source > 0.0 {
            self.push_pair(s, node, to_source, 0.0);
        }
        if to_sink > 0.0 {
            self.push_pair(node, t, to_sink, 0.0);
        }
    }

    pub(crate) fn add_edge(&mut self, a: usize, b: usize, cap_ab: f64, cap_ba: f64) {
        if cap_ab > 0.0 || cap_ba > 0.0 {
            self.push_pair(a, b, cap_ab, cap_ba);
        }
    }

    fn bfs(&mut self) -> bool {
        self.level.iter_mut().for_each(|l| *l = -1);
        let s = self.source();
        self.level[s] = 0;
        let mut queue = VecDeque::from([s]);
        while let Some(u) = queue.pop_front() {
            for &e in &self.adj[u] {
                let v = self.to[e];
                if self.cap[e] > EPS && self.level[v] < 0 {
                    self.level[v] = self.level[u] + 1;
                    queue.push_back(v);
                }
            }
        }
        self.level[self.sink()] >= 0
    }

    fn blocking_flow(&mut self) -> f64 {
        let (s, t) = (self.source(), self.sink());
        let mut total = 0.0;
        let mut path: Vec<usize> = Vec::new();
        let mut u = s;
        loop {
            if u == t {
                let f = path
                    .iter()
                    .map(|&e| self.cap[e])
                    .fold(f64::INFINITY, f64::min);
                let mut cut = path.len();
                for (i, &e) in path.iter().enumerate() {
                    self.cap[e] -= f;
                    self.cap[e ^ 1] += f;
                    if cut == path.len() && self.cap[e] <= EPS {
                        cut = i;
                    }
                }
                total += f;
                path.truncate(cut);
                u = match path.last() {
                    Some(&e) => self.to[e],
                    None => s,
                };
                continue;
            }

            let mut advanced = false;
            while self.iter[u] < self.adj[u].len() {
                let e = self.adj[u][self.iter[u]];
                let v = self.to[e];
                if self.cap[e] > EPS && self.level[v] == self.level[u] + 1 {
                    path.push(e);
                    u = v;
                    advanced = true;
                    break;
                }
                self.iter[u] += 1;
            }
            if advanced {
                continue;
            }

            // Dead end: retire `u` for this phase and back up one edge.
            let Some(e) = path.pop() else {
                break;
            };
            self.level[u] = -1;
            u = self.to[e ^ 1];
            self.iter[u] += 1;
        }
        total
    }

    /// Run max-flow to completion and return the flow value. Afterwards
    /// [`FlowGraph::is_source_side`] reports the minimum cut.
    pub(crate) fn maxflow(&mut self) -> f64 {
        let mut flow = 0.0;
        while self.bfs() {
            self.iter.iter_mut().for_each(|i| *i = 0);
            flow += self.blocking_flow();
        }
        flow
    }

    /// Whether `node` is reachable from the source in the residual graph.
    pub(crate) fn is_source_side(&self, node: usize) -> bool {
        self.level[node] >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn single_chain_cut_at_weakest_link() {
        // s -> 0 -> 1 -> 2 -> t
        let mut g = FlowGraph::new(3);
        g.add_tweights(0, 10.0, 0.0);
        g.add_edge(0, 1, 3.0, 0.0);
        g.add_edge(1, 2, 7.0, 0.0);
        g.add_tweights(2, 0.0, 10.0);
        assert_relative_eq!(g.maxflow(), 3.0);
        assert!(g.is_source_side(0));
        assert!(!g.is_source_side(1));
        assert!(!g.is_source_side(2));
    }

    #[test]
    fn classic_diamond() {
        let mut g = FlowGraph::new(4);
        g.add_tweights(0, 10.0, 0.0);
        g.add_tweights(1, 10.0, 0.0);
        g.add_edge(0, 1, 2.0, 0.0);
        g.add_edge(0, 2, 4.0, 0.0);
        g.add_edge(0, 3, 8.0, 0.0);
        g.add_edge(1, 3, 9.0, 0.0);
        g.add_edge(3, 2, 6.0, 0.0);
        g.add_tweights(2, 0.0, 10.0);
        g.add_tweights(3, 0.0, 10.0);
        assert_relative_eq!(g.maxflow(), 19.0);
    }

    #[test]
    fn terminal_preference_decides_isolated_nodes() {
        let mut g = FlowGraph::new(2);
        g.add_tweights(0, 5.0, 1.0);
        g.add_tweights(1, 1.0, 5.0);
        g.add_edge(0, 1, 0.5, 0.5);
        assert_relative_eq!(g.maxflow(), 2.5);
        assert!(g.is_source_side(0));
        assert!(!g.is_source_side(1));
    }
}
