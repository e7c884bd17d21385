//! Row slot pool.
//!
//! A slot is the unit a host draws. As the render range slides, slots whose id
//! left the range are reassigned to ids entering it; ids that stay in range
//! keep their slot and are only repainted when their content changes.

use crate::model::columns::ColumnSet;
use crate::model::row::{Row, RowId};
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// What the data layer knows about one id
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowState<'a> {
    Ready(&'a Row),
    /// Page not cached yet (or in flight)
    Loading,
    /// Page fetch failed with this message
    Failed(&'a str),
    /// Page cached but the backend returned no row for this id
    Missing,
}

pub trait RowLookup {
    fn row_state(&self, id: RowId) -> RowState<'_>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotContent {
    Empty,
    Loading,
    Failed(String),
    Cells(Vec<String>),
}

impl SlotContent {
    fn from_state(state: RowState<'_>, columns: &ColumnSet) -> Self {
        match state {
            RowState::Ready(row) => SlotContent::Cells(columns.format_row(row)),
            RowState::Loading => SlotContent::Loading,
            RowState::Failed(message) => SlotContent::Failed(message.to_string()),
            RowState::Missing => SlotContent::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowSlot {
    /// Stable identity of the slot across reassignments
    pub serial: u64,
    pub id: RowId,
    /// Offset in the virtual content: `(id - 1) * row_height`
    pub top: f64,
    pub content: SlotContent,
    pub highlighted: bool,
    /// Number of times this slot was (re)painted
    pub paint_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Slots allocated because the pool ran dry
    pub created: usize,
    /// Slots reassigned from an id that left the range
    pub reused: usize,
    /// Slots whose id stayed in range
    pub kept: usize,
    /// Slots returned to the spare pool this pass
    pub released: usize,
    /// Slots painted this pass (new assignment or changed content)
    pub repainted: usize,
}

#[derive(Debug, Default)]
pub struct RowRenderer {
    /// Active slots, ascending by id
    slots: Vec<RowSlot>,
    /// Slots not assigned to any id
    spare: Vec<RowSlot>,
    next_serial: u64,
    passes: u64,
}

impl RowRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> &[RowSlot] {
        &self.slots
    }

    pub fn slot_for(&self, id: RowId) -> Option<&RowSlot> {
        self.slots
            .binary_search_by_key(&id, |slot| slot.id)
            .ok()
            .map(|index| &self.slots[index])
    }

    /// Total slots ever allocated (active plus spare)
    pub fn pool_size(&self) -> usize {
        self.slots.len() + self.spare.len()
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Render `range`. With `force`, every active slot is repainted.
    pub fn render(
        &mut self,
        range: Option<&RangeInclusive<RowId>>,
        rows: &dyn RowLookup,
        columns: &ColumnSet,
        row_height: f64,
        highlighted: Option<RowId>,
        force: bool,
    ) -> RenderStats {
        self.passes += 1;
        let mut stats = RenderStats::default();

        let mut kept: HashMap<RowId, RowSlot> = HashMap::new();
        let mut leaving: Vec<RowSlot> = Vec::new();
        for slot in self.slots.drain(..) {
            match range {
                Some(range) if range.contains(&slot.id) => {
                    kept.insert(slot.id, slot);
                }
                _ => leaving.push(slot),
            }
        }

        let mut next = Vec::new();
        if let Some(range) = range {
            next.reserve(range.clone().count());
            for id in range.clone() {
                let content = SlotContent::from_state(rows.row_state(id), columns);
                let is_highlighted = highlighted == Some(id);

                let mut slot = match kept.remove(&id) {
                    Some(mut slot) => {
                        stats.kept += 1;
                        if force || slot.content != content || slot.highlighted != is_highlighted {
                            slot.content = content;
                            slot.highlighted = is_highlighted;
                            slot.paint_count += 1;
                            stats.repainted += 1;
                        }
                        next.push(slot);
                        continue;
                    }
                    None => match leaving.pop().or_else(|| self.spare.pop()) {
                        Some(slot) => {
                            stats.reused += 1;
                            slot
                        }
                        None => {
                            stats.created += 1;
                            self.next_serial += 1;
                            RowSlot {
                                serial: self.next_serial,
                                id,
                                top: 0.0,
                                content: SlotContent::Empty,
                                highlighted: false,
                                paint_count: 0,
                            }
                        }
                    },
                };

                slot.id = id;
                slot.top = (id - 1) as f64 * row_height;
                slot.content = content;
                slot.highlighted = is_highlighted;
                slot.paint_count += 1;
                stats.repainted += 1;
                next.push(slot);
            }
        }

        stats.released = leaving.len();
        for mut slot in leaving {
            slot.content = SlotContent::Empty;
            slot.highlighted = false;
            self.spare.push(slot);
        }
        self.slots = next;

        tracing::trace!(
            "Render pass {}: {} slots, {:?}",
            self.passes,
            self.slots.len(),
            stats
        );
        stats
    }

    /// Drop every slot (table teardown)
    pub fn clear(&mut self) {
        self.slots.clear();
        self.spare.clear();
    }
}
