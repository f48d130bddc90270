//! Server-side analysis: per-chapter QA fan-out with weighted aggregation,
//! outline completeness analysis, and applying QA fixes.

pub mod aggregate;
pub mod fix;
pub mod outline;
pub mod qa;

pub use aggregate::{DimensionScores, aggregate, apply_consistency_adjustment, build_result};
pub use fix::{AppliedFix, FixRequest, apply_chapter_fix, apply_fix};
pub use outline::OutlineAnalyzer;
pub use qa::{QaOrchestrator, QaSettings};
