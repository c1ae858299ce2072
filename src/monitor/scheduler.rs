//! Frame scheduling for the cooperative render loop

use std::cell::RefCell;
use std::thread;
use std::time::{Duration, Instant};

pub type FrameCallback = Box<dyn FnOnce()>;

/// Handle returned by [`FrameScheduler::request_frame`], used to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// "Run after next frame" primitive of the host
pub trait FrameScheduler {
    /// Run `callback` once, on the next display frame
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;
    /// Drop a pending callback. Unknown or already-run handles are ignored.
    fn cancel_frame(&self, handle: FrameHandle);
}

struct FrameQueue {
    next_handle: u64,
    pending: Vec<(FrameHandle, FrameCallback)>,
}

/// Single-threaded frame scheduler driven by the host's loop
pub struct FrameLoop {
    queue: RefCell<FrameQueue>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(FrameQueue {
                next_handle: 1,
                pending: Vec::new(),
            }),
        }
    }

    /// Run every callback requested before this frame began. Callbacks that
    /// request another frame land in the next one. Returns how many ran.
    pub fn run_frame(&self) -> usize {
        let due = std::mem::take(&mut self.queue.borrow_mut().pending);
        let count = due.len();
        for (_, callback) in due {
            callback();
        }
        count
    }

    /// Drive frames at `refresh_hz` until `duration` has elapsed or
    /// `on_frame` returns false
    pub fn run_for(
        &self,
        duration: Duration,
        refresh_hz: u32,
        mut on_frame: impl FnMut(u64) -> bool,
    ) -> u64 {
        let frame_time = Duration::from_secs_f64(1.0 / refresh_hz.max(1) as f64);
        let started = Instant::now();
        let mut frames = 0u64;
        while started.elapsed() < duration {
            let frame_start = Instant::now();
            self.run_frame();
            frames += 1;
            if !on_frame(frames) {
                break;
            }
            if let Some(rest) = frame_time.checked_sub(frame_start.elapsed()) {
                thread::sleep(rest);
            }
        }
        frames
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().pending.len()
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler for FrameLoop {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let mut queue = self.queue.borrow_mut();
        let handle = FrameHandle(queue.next_handle);
        queue.next_handle += 1;
        queue.pending.push((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.queue
            .borrow_mut()
            .pending
            .retain(|(pending, _)| *pending != handle);
    }
}
