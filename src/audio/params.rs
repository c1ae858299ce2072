//! Sample-accurate parameter automation
//!
//! A parameter holds a timeline of scheduled events. The render graph asks
//! for the value at every sample time, so a change lands on the exact sample
//! its timestamp names rather than whenever the control thread ran.

use std::collections::VecDeque;

use super::commands::AutomationEvent;

/// Pending events kept per parameter before the queue has to grow
const EVENT_CAPACITY: usize = 32;

/// Active exponential approach toward a target
#[derive(Debug, Clone, Copy)]
struct TargetRamp {
    target: f32,
    /// Per-sample decay factor: exp(-1 / (time_constant * sample_rate))
    coeff: f32,
}

#[derive(Debug, Clone)]
pub struct AudioParam {
    value: f32,
    min: f32,
    max: f32,
    events: VecDeque<AutomationEvent>,
    ramp: Option<TargetRamp>,
}

impl AudioParam {
    pub fn new(default: f32, min: f32, max: f32) -> Self {
        Self {
            value: default,
            min,
            max,
            events: VecDeque::with_capacity(EVENT_CAPACITY),
            ramp: None,
        }
    }

    /// Current value, without advancing the timeline
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Insert an event, keeping the timeline sorted by time.
    /// Events with equal times keep their insertion order.
    pub fn schedule(&mut self, event: AutomationEvent) {
        let time = event.time();
        let pos = self
            .events
            .iter()
            .position(|e| e.time() > time)
            .unwrap_or(self.events.len());
        self.events.insert(pos, event);
    }

    /// Advance to sample time `time` and return the value for that sample
    #[inline]
    pub fn next_value(&mut self, time: f64, sample_rate: f64) -> f32 {
        while let Some(event) = self.events.front().copied() {
            if event.time() > time {
                break;
            }
            self.events.pop_front();
            match event {
                AutomationEvent::SetValue { value, .. } => {
                    self.value = value;
                    self.ramp = None;
                }
                AutomationEvent::SetTarget {
                    target,
                    time_constant,
                    ..
                } => {
                    if time_constant <= 0.0 {
                        self.value = target;
                        self.ramp = None;
                    } else {
                        let coeff = (-1.0 / (time_constant * sample_rate)).exp() as f32;
                        self.ramp = Some(TargetRamp { target, coeff });
                    }
                }
            }
        }

        if let Some(ramp) = self.ramp {
            self.value = ramp.target + (self.value - ramp.target) * ramp.coeff;
        }

        self.value = self.value.clamp(self.min, self.max);
        self.value
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}
