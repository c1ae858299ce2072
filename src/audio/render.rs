//! Render graph executed on the real-time context
//!
//! Owns the node arena, applies queued [`GraphCommand`]s at quantum
//! boundaries and pulls one quantum of audio through the nodes in
//! topological order.

use super::commands::GraphCommand;
use super::device::{Endpoint, NodeId, ParamKind};
use super::nodes::{Analyser, Gain, Oscillator};

/// Frames rendered per processing step
pub const RENDER_QUANTUM: usize = 128;

#[derive(Debug)]
enum NodeKind {
    Oscillator(Oscillator),
    Gain(Gain),
    Analyser(Analyser),
}

#[derive(Debug)]
struct RenderNode {
    id: NodeId,
    kind: NodeKind,
    outputs: Vec<Endpoint>,
    input: Vec<f32>,
    output: Vec<f32>,
}

impl RenderNode {
    fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            outputs: Vec::with_capacity(2),
            input: vec![0.0; RENDER_QUANTUM],
            output: vec![0.0; RENDER_QUANTUM],
        }
    }

    fn render(&mut self, frames: usize, first_frame: u64, sample_rate: f64) {
        let input = &self.input[..frames];
        let output = &mut self.output[..frames];
        match &mut self.kind {
            NodeKind::Oscillator(osc) => osc.render(output, first_frame, sample_rate),
            NodeKind::Gain(gain) => gain.render(input, output, first_frame, sample_rate),
            NodeKind::Analyser(analyser) => analyser.render(input, output),
        }
    }
}

pub struct RenderGraph {
    sample_rate: f64,
    /// Frames rendered since creation; the device clock
    frame: u64,
    nodes: Vec<RenderNode>,
    /// Node indices in processing order
    order: Vec<usize>,
    visit: Vec<u8>,
}

impl RenderGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            frame: 0,
            nodes: Vec::with_capacity(16),
            order: Vec::with_capacity(16),
            visit: Vec::with_capacity(16),
        }
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut RenderNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn apply(&mut self, command: GraphCommand) {
        match command {
            GraphCommand::CreateOscillator(id) => {
                let osc = Oscillator::new(self.sample_rate);
                self.add_node(RenderNode::new(id, NodeKind::Oscillator(osc)));
            }
            GraphCommand::CreateGain(id) => {
                self.add_node(RenderNode::new(id, NodeKind::Gain(Gain::new())));
            }
            GraphCommand::CreateAnalyser { node, tap } => {
                self.add_node(RenderNode::new(node, NodeKind::Analyser(Analyser { tap })));
            }
            GraphCommand::Connect { from, to } => {
                if let Some(node) = self.node_mut(from) {
                    if !node.outputs.contains(&to) {
                        node.outputs.push(to);
                    }
                }
                self.rebuild_order();
            }
            GraphCommand::Disconnect(id) => {
                if let Some(node) = self.node_mut(id) {
                    node.outputs.clear();
                }
                self.rebuild_order();
            }
            GraphCommand::Start { node, when } => {
                if let Some(RenderNode {
                    kind: NodeKind::Oscillator(osc),
                    ..
                }) = self.node_mut(node)
                {
                    osc.start(when);
                }
            }
            GraphCommand::Stop { node, when } => {
                if let Some(RenderNode {
                    kind: NodeKind::Oscillator(osc),
                    ..
                }) = self.node_mut(node)
                {
                    osc.stop(when);
                }
            }
            GraphCommand::SetShape { node, shape } => {
                if let Some(RenderNode {
                    kind: NodeKind::Oscillator(osc),
                    ..
                }) = self.node_mut(node)
                {
                    osc.shape = shape;
                }
            }
            GraphCommand::Automate { node, param, event } => {
                match (self.node_mut(node).map(|n| &mut n.kind), param) {
                    (Some(NodeKind::Oscillator(osc)), ParamKind::Frequency) => {
                        osc.frequency.schedule(event)
                    }
                    (Some(NodeKind::Gain(gain)), ParamKind::Gain) => gain.gain.schedule(event),
                    _ => log::debug!("Ignoring automation for {} ({:?})", node, param),
                }
            }
            GraphCommand::Release(id) => {
                if let Some(idx) = self.index_of(id) {
                    self.nodes.swap_remove(idx);
                }
                let target = Endpoint::Node(id);
                for node in &mut self.nodes {
                    node.outputs.retain(|ep| *ep != target);
                }
                self.rebuild_order();
            }
        }
    }

    fn add_node(&mut self, node: RenderNode) {
        self.nodes.push(node);
        self.rebuild_order();
    }

    /// Depth-first topological sort over output edges. Back edges of a cycle
    /// are skipped, so every node is still rendered exactly once.
    fn rebuild_order(&mut self) {
        self.order.clear();
        self.visit.clear();
        self.visit.resize(self.nodes.len(), 0);
        for idx in 0..self.nodes.len() {
            self.visit_node(idx);
        }
        self.order.reverse();
    }

    fn visit_node(&mut self, idx: usize) {
        if self.visit[idx] != 0 {
            return;
        }
        self.visit[idx] = 1;
        for k in 0..self.nodes[idx].outputs.len() {
            if let Endpoint::Node(target) = self.nodes[idx].outputs[k] {
                if let Some(t) = self.index_of(target) {
                    self.visit_node(t);
                }
            }
        }
        self.visit[idx] = 2;
        self.order.push(idx);
    }

    /// Render `out.len()` frames (at most one quantum) of mixed destination output
    pub fn process(&mut self, out: &mut [f32]) {
        let frames = out.len().min(RENDER_QUANTUM);
        let out = &mut out[..frames];
        out.fill(0.0);
        for node in &mut self.nodes {
            node.input[..frames].fill(0.0);
        }

        for k in 0..self.order.len() {
            let idx = self.order[k];
            self.nodes[idx].render(frames, self.frame, self.sample_rate);

            let output = std::mem::take(&mut self.nodes[idx].output);
            let outputs = std::mem::take(&mut self.nodes[idx].outputs);
            for endpoint in &outputs {
                match *endpoint {
                    Endpoint::Destination => {
                        for (o, &s) in out.iter_mut().zip(&output[..frames]) {
                            *o += s;
                        }
                    }
                    Endpoint::Node(target) => {
                        if let Some(t) = self.index_of(target) {
                            for (i, &s) in self.nodes[t].input[..frames]
                                .iter_mut()
                                .zip(&output[..frames])
                            {
                                *i += s;
                            }
                        }
                    }
                }
            }
            self.nodes[idx].output = output;
            self.nodes[idx].outputs = outputs;
        }

        self.frame += frames as u64;
    }

    /// Render an arbitrary number of frames, one quantum at a time
    pub fn render(&mut self, out: &mut [f32]) {
        for chunk in out.chunks_mut(RENDER_QUANTUM) {
            self.process(chunk);
        }
    }
}
