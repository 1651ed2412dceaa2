use std::collections::HashMap;

use time::OffsetDateTime;

use crate::countdown::{
    CountdownFrame, CountdownHandle, CountdownScheduler, CountdownSlot, CountdownStyle,
};
use crate::model::DeadlineRecord;

/// Where a countdown is drawn. Each surface owns its own set of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Cards and list rows, compact style.
    Row,
    /// Detail overlay, verbose style.
    Detail,
}

impl Surface {
    fn style(self) -> CountdownStyle {
        match self {
            Surface::Row => CountdownStyle::Compact,
            Surface::Detail => CountdownStyle::Verbose,
        }
    }
}

struct Entry {
    slot: CountdownSlot,
    handle: CountdownHandle,
}

/// Live countdowns for whatever is currently on screen.
#[derive(Default)]
pub struct CountdownBoard {
    scheduler: CountdownScheduler,
    entries: HashMap<(Surface, usize), Entry>,
}

impl CountdownBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every countdown on `surface` and start fresh ones for `records`.
    /// Records without a concrete deadline get no countdown.
    pub fn replace<'a, I>(&mut self, surface: Surface, records: I, now: OffsetDateTime)
    where
        I: IntoIterator<Item = &'a DeadlineRecord>,
    {
        self.clear(surface);
        for record in records {
            let Some(target) = record.due.instant() else {
                continue;
            };
            let slot = CountdownSlot::new();
            let handle =
                self.scheduler
                    .start(target, surface.style(), Box::new(slot.sink()), now);
            self.entries
                .insert((surface, record.id), Entry { slot, handle });
        }
        tracing::trace!(?surface, active = self.scheduler.active(), "countdowns replaced");
    }

    pub fn clear(&mut self, surface: Surface) {
        self.entries.retain(|(owner, _), entry| {
            if *owner == surface {
                entry.handle.cancel();
                false
            } else {
                true
            }
        });
    }

    pub fn frame(&self, surface: Surface, id: usize) -> Option<CountdownFrame> {
        self.entries
            .get(&(surface, id))
            .and_then(|entry| entry.slot.frame())
    }

    /// Advance every countdown that is due. Returns how many re-rendered.
    pub fn tick(&mut self, now: OffsetDateTime) -> usize {
        self.scheduler.run_due(now)
    }

    pub fn active(&self) -> usize {
        self.scheduler.active()
    }
}
