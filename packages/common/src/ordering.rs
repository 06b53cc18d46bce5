//! Ordering rules for chapters within a course.
//!
//! Positions are plain integers. They need not be contiguous, and a chapter
//! moved between courses may share a position with a sibling, so every listing
//! breaks ties by id.

use serde::{Deserialize, Serialize};

/// Anything with an id and a position inside its parent.
pub trait Positioned {
    fn id(&self) -> i32;
    fn position(&self) -> i32;
}

impl Positioned for (i32, i32) {
    fn id(&self) -> i32 {
        self.0
    }
    fn position(&self) -> i32 {
        self.1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

/// A single position assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reassignment {
    pub id: i32,
    pub position: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapPlan {
    /// Already at the edge in the requested direction.
    NoOp,
    /// Exchange positions between the moved item and its neighbour.
    Swap {
        moved: Reassignment,
        neighbour: Reassignment,
    },
}

/// Position for a newly appended item: one past the current maximum, or 0.
///
/// Returns `None` if the maximum is already `i32::MAX`.
pub fn next_position(current_max: Option<i32>) -> Option<i32> {
    match current_max {
        Some(max) => max.checked_add(1),
        None => Some(0),
    }
}

/// Sort ascending by position, ties broken by ascending id.
pub fn sort_by_position<T: Positioned>(items: &mut [T]) {
    items.sort_by_key(|item| (item.position(), item.id()));
}

/// Work out the exchange needed to move `id` one step in `direction`.
///
/// Returns `None` when `id` is not among `items`. The input need not be sorted.
pub fn plan_swap<T: Positioned>(
    items: &[T],
    id: i32,
    direction: MoveDirection,
) -> Option<SwapPlan> {
    let mut ordered: Vec<(i32, i32)> = items.iter().map(|i| (i.id(), i.position())).collect();
    sort_by_position(&mut ordered);

    let index = ordered.iter().position(|(item_id, _)| *item_id == id)?;
    let neighbour_index = match direction {
        MoveDirection::Up if index == 0 => return Some(SwapPlan::NoOp),
        MoveDirection::Up => index - 1,
        MoveDirection::Down if index + 1 == ordered.len() => return Some(SwapPlan::NoOp),
        MoveDirection::Down => index + 1,
    };

    let (moved_id, moved_pos) = ordered[index];
    let (neighbour_id, neighbour_pos) = ordered[neighbour_index];
    Some(SwapPlan::Swap {
        moved: Reassignment {
            id: moved_id,
            position: neighbour_pos,
        },
        neighbour: Reassignment {
            id: neighbour_id,
            position: moved_pos,
        },
    })
}

/// Apply a plan to an in-memory list. Items not named by the plan are untouched.
pub fn apply_swap(items: &mut [(i32, i32)], plan: SwapPlan) {
    if let SwapPlan::Swap { moved, neighbour } = plan {
        for item in items.iter_mut() {
            if item.0 == moved.id {
                item.1 = moved.position;
            } else if item.0 == neighbour.id {
                item.1 = neighbour.position;
            }
        }
    }
}
