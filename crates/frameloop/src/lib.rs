//! Per-frame callback multiplexing and pointer tracking.
//!
//! A host event loop owns exactly one [`AnimationDriver`] and is the single
//! process-wide source of animation ticks: while the driver has registered
//! callbacks the host keeps requesting ticks, and when the last callback
//! unregisters it stops. `tick` takes `&mut self`, so a tick can never be
//! re-entered before the previous one finishes.

/// Timing handed to each callback on every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Seconds since the host's time origin.
    pub seconds: f64,
    /// Seconds since this callback last ran; `0.0` on its first invocation.
    pub delta_seconds: f64,
}

/// Handle returned by [`AnimationDriver::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

struct Entry {
    id: CallbackId,
    last_seconds: Option<f64>,
    callback: Box<dyn FnMut(FrameTick)>,
}

/// Fans a single animation tick out to every registered callback.
#[derive(Default)]
pub struct AnimationDriver {
    entries: Vec<Entry>,
    next_id: u64,
}

impl AnimationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a per-frame callback; it first runs on the next tick.
    pub fn register(&mut self, callback: impl FnMut(FrameTick) + 'static) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            last_seconds: None,
            callback: Box::new(callback),
        });
        tracing::debug!(callbacks = self.entries.len(), "animation callback registered");
        id
    }

    /// Removes a callback, effective from the next would-be tick. Returns
    /// false when the id is not registered.
    pub fn unregister(&mut self, id: CallbackId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Whether the host can stop requesting animation ticks.
    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every registered callback with per-callback delta timing.
    pub fn tick(&mut self, seconds: f64) {
        for entry in &mut self.entries {
            let delta_seconds = entry
                .last_seconds
                .map(|last| seconds - last)
                .unwrap_or(0.0);
            entry.last_seconds = Some(seconds);
            (entry.callback)(FrameTick {
                seconds,
                delta_seconds,
            });
        }
    }
}

/// Pointer button bits, matching the browser convention uniform scripts
/// were written against.
pub mod buttons {
    pub const LEFT: u8 = 1;
    pub const RIGHT: u8 = 2;
    pub const MIDDLE: u8 = 4;
}

/// A raw pointer observation in canvas-relative pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
    /// Buttons reported as held at the time of the sample.
    pub buttons: u8,
}

/// Normalises host pointer events into shader-space position and a latched
/// button mask.
///
/// Position is height-normalised so shapes are never vertically distorted:
/// the canvas's vertical extent maps to `[-1, 1]` with the origin at the
/// centre and y pointing up. While the pointer is outside the canvas the
/// position reads `(0, 0)` and the mask only ever shrinks — buttons released
/// outside are cleared by intersection, buttons still held stay latched.
#[derive(Debug, Clone)]
pub struct PointerTracker {
    width: f32,
    height: f32,
    position: [f32; 2],
    buttons: u8,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            position: [0.0, 0.0],
            buttons: 0,
        }
    }
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_canvas_size(&mut self, width: f32, height: f32) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
    }

    /// Feeds one pointer observation through the in-bounds check.
    pub fn update(&mut self, sample: PointerSample) {
        let in_bounds = sample.x >= 0.0
            && sample.x <= self.width
            && sample.y >= 0.0
            && sample.y <= self.height;
        if in_bounds {
            self.position = [
                2.0 * (sample.x - self.width / 2.0) / self.height,
                -2.0 * (sample.y - self.height / 2.0) / self.height,
            ];
            self.buttons = sample.buttons;
        } else {
            self.position = [0.0, 0.0];
            self.buttons &= sample.buttons;
        }
    }

    /// Host focus loss: forget position and buttons entirely.
    pub fn clear(&mut self) {
        self.position = [0.0, 0.0];
        self.buttons = 0;
    }

    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    pub fn buttons(&self) -> u8 {
        self.buttons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn first_tick_reports_zero_delta() {
        let ticks = Rc::new(RefCell::new(Vec::new()));
        let sink = ticks.clone();
        let mut driver = AnimationDriver::new();
        driver.register(move |tick| sink.borrow_mut().push(tick));

        driver.tick(10.0);
        driver.tick(10.5);

        let ticks = ticks.borrow();
        assert_eq!(ticks[0].delta_seconds, 0.0);
        assert!((ticks[1].delta_seconds - 0.5).abs() < 1e-9);
    }

    #[test]
    fn late_registration_gets_its_own_zero_delta() {
        let deltas = Rc::new(RefCell::new(Vec::new()));
        let mut driver = AnimationDriver::new();
        let sink = deltas.clone();
        driver.register(move |tick| sink.borrow_mut().push(("a", tick.delta_seconds)));
        driver.tick(1.0);

        let sink = deltas.clone();
        driver.register(move |tick| sink.borrow_mut().push(("b", tick.delta_seconds)));
        driver.tick(2.0);

        let deltas = deltas.borrow();
        // "a" sees a full second; "b" is on its first invocation.
        assert_eq!(deltas.as_slice(), [("a", 0.0), ("a", 1.0), ("b", 0.0)]);
    }

    #[test]
    fn unregister_stops_callbacks_and_reports_absence() {
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        let mut driver = AnimationDriver::new();
        let id = driver.register(move |_| *sink.borrow_mut() += 1);

        driver.tick(0.0);
        assert!(driver.unregister(id));
        assert!(!driver.unregister(id));
        driver.tick(1.0);

        assert_eq!(*count.borrow(), 1);
        assert!(driver.is_idle());
    }

    #[test]
    fn idle_tracks_registration_count() {
        let mut driver = AnimationDriver::new();
        assert!(driver.is_idle());
        let a = driver.register(|_| {});
        let b = driver.register(|_| {});
        assert!(!driver.is_idle());
        driver.unregister(a);
        assert!(!driver.is_idle());
        driver.unregister(b);
        assert!(driver.is_idle());
    }

    #[test]
    fn in_bounds_position_is_height_normalised() {
        let mut tracker = PointerTracker::new();
        tracker.set_canvas_size(200.0, 100.0);
        tracker.update(PointerSample {
            x: 100.0,
            y: 0.0,
            buttons: buttons::LEFT,
        });
        assert_eq!(tracker.position(), [0.0, 1.0]);
        assert_eq!(tracker.buttons(), buttons::LEFT);

        tracker.update(PointerSample {
            x: 200.0,
            y: 50.0,
            buttons: buttons::LEFT,
        });
        // Full half-width is an aspect-ratio multiple of the unit square.
        assert_eq!(tracker.position(), [2.0, 0.0]);
    }

    #[test]
    fn leaving_resets_position_and_intersects_buttons() {
        let mut tracker = PointerTracker::new();
        tracker.set_canvas_size(100.0, 100.0);
        tracker.update(PointerSample {
            x: 10.0,
            y: 10.0,
            buttons: buttons::LEFT | buttons::RIGHT,
        });

        // Pointer leaves while the event still reports LEFT held.
        tracker.update(PointerSample {
            x: -5.0,
            y: 10.0,
            buttons: buttons::LEFT,
        });
        assert_eq!(tracker.position(), [0.0, 0.0]);
        assert_eq!(tracker.buttons(), buttons::LEFT);
    }

    #[test]
    fn outside_samples_never_add_buttons() {
        let mut tracker = PointerTracker::new();
        tracker.set_canvas_size(100.0, 100.0);
        tracker.update(PointerSample {
            x: -1.0,
            y: -1.0,
            buttons: buttons::MIDDLE,
        });
        assert_eq!(tracker.buttons(), 0);
    }

    #[test]
    fn clear_drops_latched_buttons() {
        let mut tracker = PointerTracker::new();
        tracker.set_canvas_size(100.0, 100.0);
        tracker.update(PointerSample {
            x: 1.0,
            y: 1.0,
            buttons: buttons::LEFT,
        });
        tracker.clear();
        assert_eq!(tracker.buttons(), 0);
        assert_eq!(tracker.position(), [0.0, 0.0]);
    }
}
