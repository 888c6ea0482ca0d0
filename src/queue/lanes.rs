// MIT/Apache2 License

use super::coalesce::{self, CacheEntry, CacheSlot, CoalesceCache, Merged, SourceCoalescer};
use crate::event::{Event, EventClass, Priority, SourceId, LANE_COUNT};
use std::{collections::VecDeque, mem};

pub(crate) struct QueueItem {
    // sequence numbers only ever grow, so every lane is sorted by them
    seq: u64,
    event: Event,
}

/// Whether a post appended a new entry or was merged into a pending one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Posted {
    Appended,
    Coalesced,
}

/// The four priority lanes of a queue, plus its coalescing cache.
#[derive(Default)]
pub(crate) struct Lanes {
    lanes: [VecDeque<QueueItem>; LANE_COUNT],
    cache: CoalesceCache,
}

impl Lanes {
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.lanes.iter().all(VecDeque::is_empty)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    pub(crate) fn insert(
        &mut self,
        event: Event,
        seq: u64,
        coalescing: bool,
        custom: Option<&dyn SourceCoalescer>,
    ) -> Posted {
        let priority = event.priority();
        let source = event.source();
        let slot = if coalescing {
            CacheSlot::of(&event)
        } else {
            None
        };
        let mut event = event;

        if let Some(slot) = slot {
            if let Some(entry) = self.cache.get(source, slot) {
                if entry.priority == priority {
                    match self.find_mut(entry) {
                        Some(pending) => match coalesce::merge(pending, event, slot, custom) {
                            Merged::Absorbed => {
                                log::trace!("Coalesced {:?} event for {}", slot, source);
                                return Posted::Coalesced;
                            }
                            Merged::Distinct(newer) => event = newer,
                        },
                        None => self.cache.forget(source, slot, entry.seq),
                    }
                }
            }
        }

        self.cache.evict_others(source, priority, slot);
        self.lanes[priority.lane()].push_back(QueueItem { seq, event });
        if let Some(slot) = slot {
            self.cache.set(source, slot, CacheEntry { priority, seq });
        }
        Posted::Appended
    }

    fn find_mut(&mut self, entry: CacheEntry) -> Option<&mut Event> {
        let lane = &mut self.lanes[entry.priority.lane()];
        let index = lane
            .binary_search_by_key(&entry.seq, |item| item.seq)
            .ok()?;
        lane.get_mut(index).map(|item| &mut item.event)
    }

    /// Remove the head of the highest non-empty lane.
    pub(crate) fn pop_front(&mut self) -> Option<Event> {
        for priority in Priority::DESCENDING.iter() {
            if let Some(item) = self.lanes[priority.lane()].pop_front() {
                if let Some(slot) = CacheSlot::of(&item.event) {
                    self.cache.forget(item.event.source(), slot, item.seq);
                }
                return Some(item.event);
            }
        }

        None
    }

    #[inline]
    pub(crate) fn peek(&self) -> Option<&Event> {
        Priority::DESCENDING
            .iter()
            .find_map(|p| self.lanes[p.lane()].front())
            .map(|item| &item.event)
    }

    #[inline]
    pub(crate) fn peek_class(&self, class: EventClass) -> Option<&Event> {
        Priority::DESCENDING
            .iter()
            .flat_map(|p| self.lanes[p.lane()].iter())
            .map(|item| &item.event)
            .find(|event| event.class() == class)
    }

    /// Remove every queued event of `source`.
    pub(crate) fn remove_source(&mut self, source: SourceId) -> Vec<Event> {
        let mut removed = Vec::new();
        for lane in self.lanes.iter_mut() {
            let (gone, kept): (VecDeque<QueueItem>, VecDeque<QueueItem>) = lane
                .drain(..)
                .partition(|item| item.event.source() == source);
            *lane = kept;
            removed.extend(gone.into_iter().map(|item| item.event));
        }
        self.cache.remove_source(source);
        removed
    }

    /// Move every event into `other`, lane by lane, preserving order.
    pub(crate) fn drain_into(&mut self, other: &mut Lanes) {
        for (from, to) in self.lanes.iter_mut().zip(other.lanes.iter_mut()) {
            to.extend(from.drain(..));
        }
        other.cache.absorb(mem::take(&mut self.cache));
    }

    /// Empty the lanes, handing back every pending event.
    pub(crate) fn take_all(&mut self) -> Vec<Event> {
        self.cache.clear();
        self.lanes
            .iter_mut()
            .flat_map(|lane| lane.drain(..))
            .map(|item| item.event)
            .collect()
    }
}
