//! Control-side bookkeeping shared by every device implementation
//!
//! Tracks which nodes exist and what kind they are, validates operations
//! before they reach the real-time context and turns them into queued
//! [`GraphCommand`]s.
//!
//! The queue always keeps one vacant slot per live node, so the `Release`
//! of every node can be queued even when ordinary commands are refused with
//! `QueueFull`. A released node is removed from the render graph together
//! with its edges, which also silences it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use super::commands::{AutomationEvent, CommandSender, GraphCommand};
use super::device::{Endpoint, NodeId, ParamKind, ParamRef};
use super::nodes::{AnalyserTap, Shape};
use super::signals::Waveform;
use crate::error::DeviceError;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

enum NodeEntry {
    Oscillator,
    Gain,
    Analyser(Arc<AnalyserTap>),
}

impl NodeEntry {
    fn kind_name(&self) -> &'static str {
        match self {
            NodeEntry::Oscillator => "oscillator",
            NodeEntry::Gain => "gain",
            NodeEntry::Analyser(_) => "analyser",
        }
    }
}

pub struct DeviceCore {
    sample_rate: u32,
    next_id: Cell<u32>,
    nodes: RefCell<HashMap<NodeId, NodeEntry>>,
    sender: CommandSender,
}

impl DeviceCore {
    pub fn new(sample_rate: u32, sender: CommandSender) -> Self {
        Self {
            sample_rate,
            next_id: Cell::new(1),
            nodes: RefCell::new(HashMap::new()),
            sender,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of nodes created and not yet released
    pub fn live_nodes(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Queue an ordinary command, leaving the release slots untouched
    fn send(&self, command: GraphCommand) -> Result<(), DeviceError> {
        self.sender.send_keeping(command, self.live_nodes())
    }

    fn allocate(
        &self,
        entry: NodeEntry,
        command: impl FnOnce(NodeId) -> GraphCommand,
    ) -> Result<NodeId, DeviceError> {
        let id = NodeId(self.next_id.get());
        // The new node needs a release slot of its own
        self.sender.send_keeping(command(id), self.live_nodes() + 1)?;
        self.next_id.set(id.0 + 1);
        log::debug!("Created {} node {}", entry.kind_name(), id);
        self.nodes.borrow_mut().insert(id, entry);
        Ok(id)
    }

    fn expect_kind(&self, node: NodeId, expected: &'static str) -> Result<(), DeviceError> {
        match self.nodes.borrow().get(&node) {
            None => Err(DeviceError::UnknownNode(node)),
            Some(entry) if entry.kind_name() == expected => Ok(()),
            Some(_) => Err(DeviceError::WrongNodeKind { node, expected }),
        }
    }

    fn expect_live(&self, node: NodeId) -> Result<(), DeviceError> {
        if self.nodes.borrow().contains_key(&node) {
            Ok(())
        } else {
            Err(DeviceError::UnknownNode(node))
        }
    }

    pub fn create_oscillator(&self) -> Result<NodeId, DeviceError> {
        self.allocate(NodeEntry::Oscillator, GraphCommand::CreateOscillator)
    }

    pub fn create_gain(&self) -> Result<NodeId, DeviceError> {
        self.allocate(NodeEntry::Gain, GraphCommand::CreateGain)
    }

    pub fn create_analyser(&self, fft_size: usize) -> Result<NodeId, DeviceError> {
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(DeviceError::InvalidArgument(format!(
                "fft size {} is not a power of two in [{}, {}]",
                fft_size, MIN_FFT_SIZE, MAX_FFT_SIZE
            )));
        }
        let tap = Arc::new(AnalyserTap::new(fft_size));
        let render_tap = Arc::clone(&tap);
        self.allocate(NodeEntry::Analyser(tap), move |node| {
            GraphCommand::CreateAnalyser {
                node,
                tap: render_tap,
            }
        })
    }

    pub fn connect(&self, from: NodeId, to: Endpoint) -> Result<(), DeviceError> {
        self.expect_live(from)?;
        if let Endpoint::Node(target) = to {
            self.expect_live(target)?;
        }
        self.send(GraphCommand::Connect { from, to })
    }

    pub fn disconnect(&self, node: NodeId) -> Result<(), DeviceError> {
        self.expect_live(node)?;
        self.send(GraphCommand::Disconnect(node))
    }

    pub fn start(&self, node: NodeId, when: f64) -> Result<(), DeviceError> {
        self.expect_kind(node, "oscillator")?;
        self.send(GraphCommand::Start { node, when })
    }

    pub fn stop(&self, node: NodeId, when: f64) -> Result<(), DeviceError> {
        self.expect_kind(node, "oscillator")?;
        self.send(GraphCommand::Stop { node, when })
    }

    pub fn set_waveform(&self, node: NodeId, waveform: Waveform) -> Result<(), DeviceError> {
        self.expect_kind(node, "oscillator")?;
        self.send(GraphCommand::SetShape {
            node,
            shape: Shape::from(waveform),
        })
    }

    fn automate(&self, param: ParamRef, event: AutomationEvent) -> Result<(), DeviceError> {
        let expected = match param.kind {
            ParamKind::Frequency => "oscillator",
            ParamKind::Gain => "gain",
        };
        self.expect_kind(param.node, expected)?;
        self.send(GraphCommand::Automate {
            node: param.node,
            param: param.kind,
            event,
        })
    }

    pub fn set_value_at_time(
        &self,
        param: ParamRef,
        value: f32,
        time: f64,
    ) -> Result<(), DeviceError> {
        if !value.is_finite() || !time.is_finite() {
            return Err(DeviceError::InvalidArgument(format!(
                "non-finite automation value {} at {}",
                value, time
            )));
        }
        self.automate(param, AutomationEvent::SetValue { value, time })
    }

    pub fn set_target_at_time(
        &self,
        param: ParamRef,
        target: f32,
        start_time: f64,
        time_constant: f64,
    ) -> Result<(), DeviceError> {
        if !target.is_finite()
            || !start_time.is_finite()
            || time_constant.is_nan()
            || time_constant < 0.0
        {
            return Err(DeviceError::InvalidArgument(format!(
                "invalid target automation {} at {} (time constant {})",
                target, start_time, time_constant
            )));
        }
        self.automate(
            param,
            AutomationEvent::SetTarget {
                target,
                time: start_time,
                time_constant,
            },
        )
    }

    pub fn read_time_domain(&self, analyser: NodeId, out: &mut [u8]) -> Result<(), DeviceError> {
        let tap = match self.nodes.borrow().get(&analyser) {
            Some(NodeEntry::Analyser(tap)) => Arc::clone(tap),
            Some(_) => {
                return Err(DeviceError::WrongNodeKind {
                    node: analyser,
                    expected: "analyser",
                })
            }
            None => return Err(DeviceError::UnknownNode(analyser)),
        };
        tap.read_bytes(out);
        Ok(())
    }

    /// Forget the node and queue its destruction. Uses the slot held back for
    /// this node, so it succeeds even when the queue refuses other commands.
    pub fn release(&self, node: NodeId) -> Result<(), DeviceError> {
        let entry = self.nodes.borrow_mut().remove(&node);
        match entry {
            Some(entry) => {
                log::debug!("Releasing {} node {}", entry.kind_name(), node);
                self.sender
                    .send_keeping(GraphCommand::Release(node), self.live_nodes())
            }
            None => Err(DeviceError::UnknownNode(node)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::commands::command_queue;

    fn core() -> (DeviceCore, crate::audio::commands::CommandReceiver) {
        let (sender, receiver) = command_queue(64);
        (DeviceCore::new(48000, sender), receiver)
    }

    #[test]
    fn test_node_ids_are_unique() {
        let (core, _rx) = core();
        let a = core.create_oscillator().unwrap();
        let b = core.create_gain().unwrap();
        assert_ne!(a, b);
        assert_eq!(core.live_nodes(), 2);
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let (core, _rx) = core();
        let gain = core.create_gain().unwrap();
        assert_eq!(
            core.start(gain, 0.0).unwrap_err(),
            DeviceError::WrongNodeKind {
                node: gain,
                expected: "oscillator"
            }
        );
        assert!(core
            .set_value_at_time(ParamRef::frequency(gain), 440.0, 0.0)
            .is_err());
        assert!(core.set_value_at_time(ParamRef::gain(gain), 0.5, 0.0).is_ok());
    }

    #[test]
    fn test_released_node_is_unknown() {
        let (core, mut rx) = core();
        let osc = core.create_oscillator().unwrap();
        core.release(osc).unwrap();
        assert_eq!(core.live_nodes(), 0);
        assert_eq!(core.start(osc, 0.0).unwrap_err(), DeviceError::UnknownNode(osc));
        assert_eq!(core.release(osc).unwrap_err(), DeviceError::UnknownNode(osc));

        let mut commands = Vec::new();
        rx.drain(|cmd| commands.push(cmd));
        assert!(matches!(commands.last(), Some(GraphCommand::Release(id)) if *id == osc));
    }

    #[test]
    fn test_release_fits_in_full_queue() {
        let (sender, mut rx) = command_queue(8);
        let core = DeviceCore::new(48000, sender);
        let osc = core.create_oscillator().unwrap();
        let gain = core.create_gain().unwrap();

        let mut accepted = 0;
        while core.set_value_at_time(ParamRef::gain(gain), 0.5, 0.0).is_ok() {
            accepted += 1;
        }
        // 8 slots: 2 creates, 2 held back for the releases
        assert_eq!(accepted, 4);
        assert_eq!(core.start(osc, 0.0).unwrap_err(), DeviceError::QueueFull);
        assert_eq!(core.create_gain().unwrap_err(), DeviceError::QueueFull);
        assert_eq!(core.live_nodes(), 2);

        core.release(osc).unwrap();
        core.release(gain).unwrap();
        let mut commands = Vec::new();
        rx.drain(|cmd| commands.push(cmd));
        assert_eq!(commands.len(), 8);
        assert!(matches!(commands[6], GraphCommand::Release(id) if id == osc));
        assert!(matches!(commands[7], GraphCommand::Release(id) if id == gain));
    }

    #[test]
    fn test_analyser_size_validated() {
        let (core, _rx) = core();
        assert!(core.create_analyser(2048).is_ok());
        assert!(core.create_analyser(1000).is_err());
        assert!(core.create_analyser(16).is_err());
    }

    #[test]
    fn test_non_finite_automation_rejected() {
        let (core, _rx) = core();
        let osc = core.create_oscillator().unwrap();
        let param = ParamRef::frequency(osc);
        assert!(core.set_value_at_time(param, f32::NAN, 0.0).is_err());
        assert!(core.set_target_at_time(param, 1.0, 0.0, -1.0).is_err());
    }
}
