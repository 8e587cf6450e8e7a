pub mod classifier;
pub mod coincidence;
pub mod frequency;

pub use classifier::{classify, classify_all, ClassificationMode, ClassifiedDraw, DrawStatus, ReferenceRow};
pub use coincidence::{highlight_by_schedules, DayTag, TaggedDraw};
pub use frequency::{FrequencyMatrix, FrequencyMatrixRow, FrequencyReport, FrequencyTable, MatrixCell, TopN};
