//! Graph commands and the queue that carries them to the real-time thread
//!
//! The control thread pushes timestamped commands; the audio thread drains
//! them at the start of every render quantum. Uses a lock-free ring buffer so
//! the audio thread never waits on the control thread.

use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};
use std::sync::Arc;

use super::device::{Endpoint, NodeId, ParamKind};
use super::nodes::{AnalyserTap, Shape};
use crate::error::DeviceError;

/// Default queue capacity in commands
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Scheduled change to an automatable parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutomationEvent {
    /// Jump to `value` at `time` (seconds on the device clock)
    SetValue { value: f32, time: f64 },
    /// Approach `target` exponentially from `time` on
    SetTarget {
        target: f32,
        time: f64,
        time_constant: f64,
    },
}

impl AutomationEvent {
    #[inline]
    pub fn time(&self) -> f64 {
        match *self {
            AutomationEvent::SetValue { time, .. } => time,
            AutomationEvent::SetTarget { time, .. } => time,
        }
    }
}

/// Commands applied by the render graph
#[derive(Debug)]
pub enum GraphCommand {
    CreateOscillator(NodeId),
    CreateGain(NodeId),
    CreateAnalyser { node: NodeId, tap: Arc<AnalyserTap> },
    Connect { from: NodeId, to: Endpoint },
    Disconnect(NodeId),
    Start { node: NodeId, when: f64 },
    Stop { node: NodeId, when: f64 },
    SetShape { node: NodeId, shape: Shape },
    Automate {
        node: NodeId,
        param: ParamKind,
        event: AutomationEvent,
    },
    Release(NodeId),
}

/// Control-side end of the command queue
pub struct CommandSender {
    producer: Mutex<ringbuf::HeapProd<GraphCommand>>,
    capacity: usize,
}

/// Audio-side end of the command queue
pub struct CommandReceiver {
    consumer: ringbuf::HeapCons<GraphCommand>,
}

/// Create a connected sender/receiver pair
pub fn command_queue(capacity: usize) -> (CommandSender, CommandReceiver) {
    let rb = HeapRb::new(capacity);
    let (producer, consumer) = rb.split();
    (
        CommandSender {
            producer: Mutex::new(producer),
            capacity,
        },
        CommandReceiver { consumer },
    )
}

impl CommandSender {
    /// Push a command. Fails instead of blocking when the queue is full.
    pub fn send(&self, command: GraphCommand) -> Result<(), DeviceError> {
        self.send_keeping(command, 0)
    }

    /// Push a command only if at least `keep_free` slots stay vacant after it.
    /// Callers use the held-back slots for commands that must not be dropped.
    pub fn send_keeping(&self, command: GraphCommand, keep_free: usize) -> Result<(), DeviceError> {
        let mut producer = self.producer.lock();
        if producer.vacant_len() <= keep_free {
            log::warn!(
                "Command queue full (capacity: {}, {} slots held back), dropped {:?}",
                self.capacity,
                keep_free,
                command
            );
            return Err(DeviceError::QueueFull);
        }
        match producer.try_push(command) {
            Ok(()) => Ok(()),
            Err(command) => {
                log::warn!(
                    "Command queue full (capacity: {}), dropped {:?}",
                    self.capacity,
                    command
                );
                Err(DeviceError::QueueFull)
            }
        }
    }
}

impl CommandReceiver {
    /// Apply every pending command in order (called from the audio thread)
    #[inline]
    pub fn drain(&mut self, mut apply: impl FnMut(GraphCommand)) -> usize {
        let mut count = 0;
        while let Some(command) = self.consumer.try_pop() {
            apply(command);
            count += 1;
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_arrive_in_order() {
        let (sender, mut receiver) = command_queue(8);
        sender.send(GraphCommand::CreateOscillator(NodeId(1))).unwrap();
        sender
            .send(GraphCommand::Start {
                node: NodeId(1),
                when: 0.5,
            })
            .unwrap();

        let mut seen = Vec::new();
        let count = receiver.drain(|cmd| seen.push(cmd));
        assert_eq!(count, 2);
        assert!(matches!(seen[0], GraphCommand::CreateOscillator(NodeId(1))));
        assert!(matches!(seen[1], GraphCommand::Start { when, .. } if when == 0.5));
        assert!(receiver.is_empty());
    }

    #[test]
    fn test_queue_overflow() {
        let (sender, mut receiver) = command_queue(2);
        assert!(sender.send(GraphCommand::Release(NodeId(1))).is_ok());
        assert!(sender.send(GraphCommand::Release(NodeId(2))).is_ok());
        assert_eq!(
            sender.send(GraphCommand::Release(NodeId(3))).unwrap_err(),
            DeviceError::QueueFull
        );

        assert_eq!(receiver.drain(|_| {}), 2);
        assert!(sender.send(GraphCommand::Release(NodeId(3))).is_ok());
    }

    #[test]
    fn test_held_back_slots_refuse_ordinary_commands() {
        let (sender, mut receiver) = command_queue(4);
        assert!(sender.send_keeping(GraphCommand::Release(NodeId(1)), 2).is_ok());
        assert!(sender.send_keeping(GraphCommand::Release(NodeId(2)), 2).is_ok());
        assert_eq!(
            sender
                .send_keeping(GraphCommand::Release(NodeId(3)), 2)
                .unwrap_err(),
            DeviceError::QueueFull
        );
        // The held-back slots are still usable with a smaller reserve
        assert!(sender.send_keeping(GraphCommand::Release(NodeId(3)), 1).is_ok());
        assert!(sender.send(GraphCommand::Release(NodeId(4))).is_ok());
        assert_eq!(receiver.drain(|_| {}), 4);
    }

    #[test]
    fn test_automation_event_time() {
        let set = AutomationEvent::SetValue {
            value: 1.0,
            time: 0.25,
        };
        let target = AutomationEvent::SetTarget {
            target: 0.0,
            time: 0.75,
            time_constant: 0.01,
        };
        assert_eq!(set.time(), 0.25);
        assert_eq!(target.time(), 0.75);
    }
}
