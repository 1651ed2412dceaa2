use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use time::OffsetDateTime;

use super::{frame_for, CountdownFrame, CountdownStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    Attached,
    /// Whatever displayed the countdown is gone; stop ticking.
    Detached,
}

/// Receiver for countdown frames.
pub trait CountdownSink {
    fn update(&mut self, frame: &CountdownFrame) -> SinkStatus;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Scheduled { due: OffsetDateTime },
    Passed,
    Cancelled,
    Detached,
}

impl TaskStatus {
    pub fn is_terminated(self) -> bool {
        !matches!(self, TaskStatus::Scheduled { .. })
    }
}

/// Caller-side view of one running countdown.
#[derive(Debug, Clone)]
pub struct CountdownHandle {
    status: Rc<Cell<TaskStatus>>,
}

impl CountdownHandle {
    pub fn status(&self) -> TaskStatus {
        self.status.get()
    }

    pub fn is_terminated(&self) -> bool {
        self.status().is_terminated()
    }

    /// Stop a scheduled countdown. Terminated countdowns keep their final status.
    pub fn cancel(&self) {
        if !self.is_terminated() {
            self.status.set(TaskStatus::Cancelled);
        }
    }
}

struct Task {
    target: OffsetDateTime,
    style: CountdownStyle,
    sink: Box<dyn CountdownSink>,
    status: Rc<Cell<TaskStatus>>,
}

impl Task {
    fn tick(&mut self, now: OffsetDateTime) {
        let frame = frame_for(self.style, self.target, now);
        let next = match self.sink.update(&frame) {
            SinkStatus::Detached => TaskStatus::Detached,
            SinkStatus::Attached => match frame.next_tick {
                Some(delay) => TaskStatus::Scheduled { due: now + delay },
                None => TaskStatus::Passed,
            },
        };
        self.status.set(next);
    }

    fn due(&self) -> Option<OffsetDateTime> {
        match self.status.get() {
            TaskStatus::Scheduled { due } => Some(due),
            _ => None,
        }
    }
}

/// Owns every live countdown on the UI thread and re-ticks the ones that are due.
#[derive(Default)]
pub struct CountdownScheduler {
    tasks: Vec<Task>,
}

impl CountdownScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push the first frame right away, then keep the task if it wants more ticks.
    pub fn start(
        &mut self,
        target: OffsetDateTime,
        style: CountdownStyle,
        sink: Box<dyn CountdownSink>,
        now: OffsetDateTime,
    ) -> CountdownHandle {
        let status = Rc::new(Cell::new(TaskStatus::Scheduled { due: now }));
        let mut task = Task {
            target,
            style,
            sink,
            status: Rc::clone(&status),
        };
        task.tick(now);
        if !task.status.get().is_terminated() {
            self.tasks.push(task);
        }
        CountdownHandle { status }
    }

    /// Re-tick every task due at or before `now`. Returns how many frames were pushed.
    pub fn run_due(&mut self, now: OffsetDateTime) -> usize {
        let mut ticked = 0;
        for task in &mut self.tasks {
            match task.due() {
                Some(due) if due <= now => {
                    task.tick(now);
                    ticked += 1;
                }
                _ => {}
            }
        }
        self.tasks.retain(|task| !task.status.get().is_terminated());
        ticked
    }

    /// Tasks that have not terminated yet.
    pub fn active(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| !task.status.get().is_terminated())
            .count()
    }
}

/// Frame cell owned by whatever displays the countdown.
#[derive(Debug, Clone, Default)]
pub struct CountdownSlot {
    frame: Rc<RefCell<Option<CountdownFrame>>>,
}

impl CountdownSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> Option<CountdownFrame> {
        self.frame.borrow().clone()
    }

    /// A sink that reports `Detached` once every clone of this slot is dropped.
    pub fn sink(&self) -> SlotSink {
        SlotSink {
            frame: Rc::downgrade(&self.frame),
        }
    }
}

pub struct SlotSink {
    frame: Weak<RefCell<Option<CountdownFrame>>>,
}

impl CountdownSink for SlotSink {
    fn update(&mut self, frame: &CountdownFrame) -> SinkStatus {
        match self.frame.upgrade() {
            Some(cell) => {
                *cell.borrow_mut() = Some(frame.clone());
                SinkStatus::Attached
            }
            None => SinkStatus::Detached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;
    use time::macros::datetime;

    struct Recorder {
        frames: Rc<RefCell<Vec<String>>>,
    }

    impl CountdownSink for Recorder {
        fn update(&mut self, frame: &CountdownFrame) -> SinkStatus {
            self.frames.borrow_mut().push(frame.text.clone());
            SinkStatus::Attached
        }
    }

    fn recorder() -> (Box<dyn CountdownSink>, Rc<RefCell<Vec<String>>>) {
        let frames = Rc::new(RefCell::new(Vec::new()));
        (
            Box::new(Recorder {
                frames: Rc::clone(&frames),
            }),
            frames,
        )
    }

    #[test]
    fn first_frame_is_pushed_immediately() {
        let now = datetime!(2026-10-17 00:00:00 UTC);
        let mut scheduler = CountdownScheduler::new();
        let (sink, frames) = recorder();
        let handle = scheduler.start(
            datetime!(2026-10-20 00:00:00 UTC),
            CountdownStyle::Compact,
            sink,
            now,
        );
        assert_eq!(frames.borrow().as_slice(), ["in 3 days"]);
        assert_eq!(
            handle.status(),
            TaskStatus::Scheduled {
                due: now + Duration::from_secs(3600)
            }
        );
        assert_eq!(scheduler.active(), 1);
    }

    #[test]
    fn ticks_only_when_due() {
        let start = datetime!(2026-10-17 00:00:00 UTC);
        let mut scheduler = CountdownScheduler::new();
        let (sink, frames) = recorder();
        scheduler.start(
            datetime!(2026-10-17 00:00:10 UTC),
            CountdownStyle::Compact,
            sink,
            start,
        );
        assert_eq!(scheduler.run_due(start + Duration::from_millis(500)), 0);
        assert_eq!(scheduler.run_due(start + Duration::from_secs(1)), 1);
        assert_eq!(
            frames.borrow().as_slice(),
            ["in 0 minutes 10 seconds", "in 0 minutes 9 seconds"]
        );
    }

    #[test]
    fn passing_the_deadline_terminates() {
        let start = datetime!(2026-10-17 00:00:00 UTC);
        let mut scheduler = CountdownScheduler::new();
        let (sink, frames) = recorder();
        let handle = scheduler.start(
            datetime!(2026-10-17 00:00:01 UTC),
            CountdownStyle::Verbose,
            sink,
            start,
        );
        scheduler.run_due(start + Duration::from_secs(1));
        assert_eq!(handle.status(), TaskStatus::Passed);
        assert_eq!(scheduler.active(), 0);
        assert_eq!(frames.borrow().last().map(String::as_str), Some("Deadline Passed"));
        assert_eq!(scheduler.run_due(start + Duration::from_secs(5)), 0);
    }

    #[test]
    fn cancelled_handle_stops_ticks() {
        let start = datetime!(2026-10-17 00:00:00 UTC);
        let mut scheduler = CountdownScheduler::new();
        let (sink, frames) = recorder();
        let handle = scheduler.start(
            datetime!(2026-10-17 00:10:00 UTC),
            CountdownStyle::Verbose,
            sink,
            start,
        );
        handle.cancel();
        assert_eq!(scheduler.run_due(start + Duration::from_secs(1)), 0);
        assert_eq!(frames.borrow().len(), 1);
        assert_eq!(scheduler.active(), 0);
        assert_eq!(handle.status(), TaskStatus::Cancelled);
    }

    #[test]
    fn terminated_handle_cannot_be_revived_by_cancel() {
        let now = datetime!(2026-10-17 00:00:00 UTC);
        let mut scheduler = CountdownScheduler::new();
        let (sink, _) = recorder();
        let handle = scheduler.start(
            datetime!(2026-10-16 00:00:00 UTC),
            CountdownStyle::Compact,
            sink,
            now,
        );
        assert_eq!(handle.status(), TaskStatus::Passed);
        handle.cancel();
        assert_eq!(handle.status(), TaskStatus::Passed);
    }

    #[test]
    fn dropped_slot_detaches_its_countdown() {
        let start = datetime!(2026-10-17 00:00:00 UTC);
        let mut scheduler = CountdownScheduler::new();
        let slot = CountdownSlot::new();
        let handle = scheduler.start(
            datetime!(2026-10-17 00:30:00 UTC),
            CountdownStyle::Compact,
            Box::new(slot.sink()),
            start,
        );
        assert_matches!(slot.frame(), Some(frame) => {
            assert_eq!(frame.text, "in 30 minutes 0 seconds");
        });
        drop(slot);
        assert_eq!(scheduler.run_due(start + Duration::from_secs(1)), 1);
        assert_eq!(handle.status(), TaskStatus::Detached);
        assert_eq!(scheduler.active(), 0);
    }
}
