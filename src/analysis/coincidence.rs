use crate::types::{DrawRecord, ScheduleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayTag {
    Coincidence,
    Normal,
}

impl std::fmt::Display for DayTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DayTag::Coincidence => write!(f, "COINC."),
            DayTag::Normal => write!(f, "Normal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedDraw {
    pub draw: DrawRecord,
    pub tag: DayTag,
}

/// Tag every draw of a day whose schedule is one of `marked`.
pub fn highlight_by_schedules(draws: &[DrawRecord], marked: &[ScheduleId]) -> Vec<TaggedDraw> {
    draws
        .iter()
        .map(|draw| {
            let tag = if marked.iter().any(|m| *m == draw.schedule) {
                DayTag::Coincidence
            } else {
                DayTag::Normal
            };
            TaggedDraw { draw: draw.clone(), tag }
        })
        .collect()
}
