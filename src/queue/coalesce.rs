// MIT/Apache2 License

use crate::{
    event::{Event, EventKind, MouseAction, PaintKind, Priority, SourceId},
    geometry::UpdateRect,
    util::Map,
};

/// The coalescing class of an event. Each source has one cache slot per class.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CacheSlot {
    Paint = 0,
    Update = 1,
    MouseMove = 2,
    MouseDrag = 3,
    Peer = 4,
}

const SLOT_COUNT: usize = 5;

impl CacheSlot {
    #[inline]
    pub(crate) fn of(event: &Event) -> Option<CacheSlot> {
        match event.kind() {
            EventKind::Paint {
                kind: PaintKind::Paint,
                ..
            } => Some(CacheSlot::Paint),
            EventKind::Paint {
                kind: PaintKind::Update,
                ..
            } => Some(CacheSlot::Update),
            EventKind::Mouse(m) if m.action == MouseAction::Moved => Some(CacheSlot::MouseMove),
            EventKind::Mouse(m) if m.action == MouseAction::Dragged => Some(CacheSlot::MouseDrag),
            EventKind::Peer(_) => Some(CacheSlot::Peer),
            _ => None,
        }
    }
}

/// What a source-specific coalescer decided about a pair of events.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Coalesce {
    /// Drop the newer event, the pending one already covers it.
    KeepPending,
    /// Replace the pending event with the newer one, in place.
    TakeNewer,
    /// Veto coalescing; both events stay queued.
    KeepBoth,
    /// Fall back to the built-in policy for this kind of event.
    Default,
}

/// A per-source hook consulted before the built-in coalescing policy for paint and mouse events.
pub trait SourceCoalescer: Send + Sync {
    fn coalesce(&self, pending: &Event, newer: &Event) -> Coalesce;
}

impl<F: Fn(&Event, &Event) -> Coalesce + Send + Sync> SourceCoalescer for F {
    #[inline]
    fn coalesce(&self, pending: &Event, newer: &Event) -> Coalesce {
        (self)(pending, newer)
    }
}

/// Where a cached event sits: its lane and its sequence number within the stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct CacheEntry {
    pub(crate) priority: Priority,
    pub(crate) seq: u64,
}

/// Points, per source and per slot, at the single queued event a newer one may merge into.
#[derive(Default)]
pub(crate) struct CoalesceCache {
    sources: Map<SourceId, [Option<CacheEntry>; SLOT_COUNT]>,
}

impl CoalesceCache {
    #[inline]
    pub(crate) fn get(&self, source: SourceId, slot: CacheSlot) -> Option<CacheEntry> {
        self.sources
            .get(&source)
            .and_then(|slots| slots[slot as usize])
    }

    #[inline]
    pub(crate) fn set(&mut self, source: SourceId, slot: CacheSlot, entry: CacheEntry) {
        self.sources.entry(source).or_default()[slot as usize] = Some(entry);
    }

    /// Drop the cache pointer if it still refers to `seq`.
    pub(crate) fn forget(&mut self, source: SourceId, slot: CacheSlot, seq: u64) {
        let now_empty = match self.sources.get_mut(&source) {
            Some(slots) => {
                if matches!(slots[slot as usize], Some(entry) if entry.seq == seq) {
                    slots[slot as usize] = None;
                }
                slots.iter().all(Option::is_none)
            }
            None => return,
        };

        if now_empty {
            self.sources.remove(&source);
        }
    }

    /// An event is about to be appended to `priority`'s lane for `source`. Any cached event of
    /// a different class in that lane can no longer absorb newer events, or they would jump
    /// ahead of the one being appended.
    pub(crate) fn evict_others(
        &mut self,
        source: SourceId,
        priority: Priority,
        keep: Option<CacheSlot>,
    ) {
        if let Some(slots) = self.sources.get_mut(&source) {
            for (i, slot) in slots.iter_mut().enumerate() {
                let stale = matches!(slot, Some(entry) if entry.priority == priority)
                    && keep.map(|k| k as usize) != Some(i);
                if stale {
                    *slot = None;
                }
            }
        }
    }

    #[inline]
    pub(crate) fn remove_source(&mut self, source: SourceId) {
        self.sources.remove(&source);
    }

    /// Take over every entry of `other`, which is being drained into the owner of `self`.
    #[inline]
    pub(crate) fn absorb(&mut self, other: CoalesceCache) {
        self.sources.extend(other.sources);
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.sources.clear();
    }
}

pub(crate) enum Merged {
    /// The newer event was folded into the pending one.
    Absorbed,
    /// The two events stay distinct; the newer one is handed back.
    Distinct(Event),
}

#[inline]
fn paint_rect(event: &Event) -> Option<UpdateRect> {
    match event.kind() {
        EventKind::Paint { rect, .. } => Some(*rect),
        _ => None,
    }
}

/// Try to fold `newer` into `pending`. Both share a source and a cache slot.
pub(crate) fn merge(
    pending: &mut Event,
    newer: Event,
    slot: CacheSlot,
    custom: Option<&dyn SourceCoalescer>,
) -> Merged {
    if let Some(custom) = custom {
        if slot != CacheSlot::Peer {
            match custom.coalesce(pending, &newer) {
                Coalesce::KeepPending => return Merged::Absorbed,
                Coalesce::TakeNewer => {
                    *pending = newer;
                    return Merged::Absorbed;
                }
                Coalesce::KeepBoth => return Merged::Distinct(newer),
                Coalesce::Default => (),
            }
        }
    }

    match slot {
        CacheSlot::Paint | CacheSlot::Update => {
            let (old, new) = match (paint_rect(pending), paint_rect(&newer)) {
                (Some(old), Some(new)) => (old, new),
                _ => return Merged::Distinct(newer),
            };

            if old.contains_rect(&new) {
                Merged::Absorbed
            } else if new.contains_rect(&old) {
                *pending = newer;
                Merged::Absorbed
            } else {
                Merged::Distinct(newer)
            }
        }
        CacheSlot::MouseMove | CacheSlot::MouseDrag => {
            *pending = newer;
            Merged::Absorbed
        }
        CacheSlot::Peer => {
            let merged = match (pending.kind_mut(), newer.kind()) {
                (EventKind::Peer(old), EventKind::Peer(new)) => old.coalesce_with(new),
                _ => false,
            };

            if merged {
                Merged::Absorbed
            } else {
                Merged::Distinct(newer)
            }
        }
    }
}
