//! Waveform monitor
//!
//! A cooperative loop that, once per display frame, copies the analyser's
//! latest snapshot and traces it as a polyline on a drawing surface. The
//! loop re-checks its cancellation token and the session's liveness on every
//! tick, because `stop()` may run between any two frames.

mod ascii;
mod scheduler;

pub use ascii::AsciiSurface;
pub use scheduler::{FrameCallback, FrameHandle, FrameLoop, FrameScheduler};

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::graph::{SampleFrame, SignalSession};

/// 2D target the monitor draws into
pub trait DrawingSurface {
    /// Width in pixels
    fn width(&self) -> u32;
    /// Height in pixels
    fn height(&self) -> u32;
    fn clear(&mut self);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn stroke(&mut self);
}

/// Shared cancellation flag of one armed loop
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }

    fn same_as(&self, other: &CancelToken) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

struct ArmedLoop {
    token: CancelToken,
    pending: Option<FrameHandle>,
}

struct MonitorState {
    surface: Option<Box<dyn DrawingSurface>>,
    armed: Option<ArmedLoop>,
    frame: SampleFrame,
    ticks: u64,
}

pub struct Monitor {
    scheduler: Rc<dyn FrameScheduler>,
    state: Rc<RefCell<MonitorState>>,
}

impl Monitor {
    pub fn new(scheduler: Rc<dyn FrameScheduler>) -> Self {
        Self {
            scheduler,
            state: Rc::new(RefCell::new(MonitorState {
                surface: None,
                armed: None,
                frame: SampleFrame::new(),
                ticks: 0,
            })),
        }
    }

    /// Bind the output surface, replacing any previous one
    pub fn attach(&self, surface: Box<dyn DrawingSurface>) {
        self.state.borrow_mut().surface = Some(surface);
    }

    pub fn detach(&self) -> Option<Box<dyn DrawingSurface>> {
        self.state.borrow_mut().surface.take()
    }

    pub fn is_armed(&self) -> bool {
        self.state.borrow().armed.is_some()
    }

    /// Render ticks completed since creation
    pub fn ticks(&self) -> u64 {
        self.state.borrow().ticks
    }

    /// Begin the per-frame loop for `session`
    pub fn arm(&self, session: Weak<SignalSession>) {
        self.disarm();
        let token = CancelToken::new();
        let handle = schedule_tick(
            &self.scheduler,
            Rc::downgrade(&self.state),
            session,
            token.clone(),
        );
        self.state.borrow_mut().armed = Some(ArmedLoop {
            token,
            pending: Some(handle),
        });
        log::debug!("Monitor armed");
    }

    /// Cancel the loop. No tick runs after this returns.
    pub fn disarm(&self) {
        let armed = self.state.borrow_mut().armed.take();
        if let Some(armed) = armed {
            armed.token.cancel();
            if let Some(handle) = armed.pending {
                self.scheduler.cancel_frame(handle);
            }
            log::debug!("Monitor disarmed");
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.disarm();
    }
}

fn schedule_tick(
    scheduler: &Rc<dyn FrameScheduler>,
    state: Weak<RefCell<MonitorState>>,
    session: Weak<SignalSession>,
    token: CancelToken,
) -> FrameHandle {
    let weak_scheduler = Rc::downgrade(scheduler);
    scheduler.request_frame(Box::new(move || {
        tick(weak_scheduler, state, session, token);
    }))
}

fn tick(
    scheduler: Weak<dyn FrameScheduler>,
    state: Weak<RefCell<MonitorState>>,
    session: Weak<SignalSession>,
    token: CancelToken,
) {
    if token.is_cancelled() {
        return;
    }
    let Some(state) = state.upgrade() else {
        return;
    };
    let Some(live) = session.upgrade().filter(|s| s.is_live()) else {
        log::debug!("Monitor tick after session ended, loop finished");
        finish(&state, &token);
        return;
    };

    let read = {
        let mut st = state.borrow_mut();
        let MonitorState {
            surface,
            frame,
            ticks,
            ..
        } = &mut *st;
        live.read_frame(frame).map(|()| {
            if let Some(surface) = surface.as_deref_mut() {
                trace_waveform(surface, frame);
            }
            *ticks += 1;
        })
    };
    drop(live);
    if let Err(e) = read {
        log::warn!("Monitor could not read analyser, loop finished: {}", e);
        finish(&state, &token);
        return;
    }

    let Some(scheduler) = scheduler.upgrade() else {
        return;
    };
    let handle = schedule_tick(&scheduler, Rc::downgrade(&state), session, token.clone());
    let mut st = state.borrow_mut();
    match st.armed.as_mut() {
        Some(armed) if armed.token.same_as(&token) => armed.pending = Some(handle),
        _ => scheduler.cancel_frame(handle),
    }
}

/// Drop the armed loop that owned `token`, if it is still the current one
fn finish(state: &RefCell<MonitorState>, token: &CancelToken) {
    let mut st = state.borrow_mut();
    if st.armed.as_ref().is_some_and(|armed| armed.token.same_as(token)) {
        st.armed = None;
    }
}

/// Clear `surface` and stroke `frame` as one polyline across its full width
pub fn trace_waveform(surface: &mut dyn DrawingSurface, frame: &SampleFrame) {
    let width = surface.width() as f64;
    let height = surface.height() as f64;
    let samples = frame.samples();
    if samples.is_empty() {
        return;
    }

    surface.clear();
    surface.begin_path();
    let slice_width = width / samples.len() as f64;
    for (i, &sample) in samples.iter().enumerate() {
        let x = i as f64 * slice_width;
        let y = (sample as f64 / 128.0 - 1.0) * height / 2.0 + height / 2.0;
        if i == 0 {
            surface.move_to(x, y);
        } else {
            surface.line_to(x, y);
        }
    }
    surface.stroke();
}
