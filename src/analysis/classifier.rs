use serde::Serialize;

use crate::catalog;
use crate::types::{AnimalCode, DrawRecord, ReferenceSet, ScheduleId};

/// Outcome of a follow-up draw relative to the reference pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawStatus {
    /// Slot was never part of the reference pattern; nothing to verify.
    Future,
    /// Slot is in the reference pattern and the same animal came out.
    Hit,
    /// Slot is in the reference pattern and a different animal came out.
    Miss,
}

impl std::fmt::Display for DrawStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DrawStatus::Future => "FUTURE",
            DrawStatus::Hit => "HIT",
            DrawStatus::Miss => "MISS",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationMode {
    /// FUTURE / HIT / MISS against the reference set.
    ThreeWay,
    /// Multi-lottery detail: every row is FUTURE, whether or not its slot is
    /// in the reference pattern. Kept apart from `ThreeWay` until cross-lottery
    /// hit semantics are settled.
    FutureOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedDraw {
    pub draw: DrawRecord,
    pub status: DrawStatus,
}

/// Reference-day slot listed under a multi-lottery detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRow {
    pub schedule: ScheduleId,
    /// None when the reference day has no result for the slot.
    pub animal_code: Option<AnimalCode>,
    pub animal_name: String,
}

/// Classify one future draw against one reference set.
///
/// Membership in `reference_schedules` is checked before `assignments`: data
/// for a slot outside the reference pattern never makes it a HIT or MISS.
pub fn classify(future: &DrawRecord, reference: &ReferenceSet) -> DrawStatus {
    if !reference.is_reference_schedule(&future.schedule) {
        return DrawStatus::Future;
    }
    match reference.animal_at(&future.schedule) {
        Some(code) if *code == future.animal_code => DrawStatus::Hit,
        _ => DrawStatus::Miss,
    }
}

pub fn classify_with(mode: ClassificationMode, future: &DrawRecord, reference: &ReferenceSet) -> DrawStatus {
    match mode {
        ClassificationMode::ThreeWay => classify(future, reference),
        ClassificationMode::FutureOnly => DrawStatus::Future,
    }
}

pub fn classify_all(
    mode: ClassificationMode,
    draws: &[DrawRecord],
    reference: &ReferenceSet,
) -> Vec<ClassifiedDraw> {
    draws
        .iter()
        .map(|draw| ClassifiedDraw {
            status: classify_with(mode, draw, reference),
            draw: draw.clone(),
        })
        .collect()
}

/// One row per reference slot, in the given order.
pub fn reference_rows(schedules: &[ScheduleId], reference: &ReferenceSet) -> Vec<ReferenceRow> {
    schedules
        .iter()
        .map(|schedule| {
            let animal_code = reference.animal_at(schedule).cloned();
            let animal_name = animal_code
                .as_deref()
                .and_then(catalog::animal_name)
                .unwrap_or("")
                .to_string();
            ReferenceRow { schedule: schedule.clone(), animal_code, animal_name }
        })
        .collect()
}
