//! Interview Wizard
//!
//! Tag extraction from interviewer text and the phase machine derived from it.

pub mod phase;
pub mod tags;

pub use phase::{InterviewContext, derive_state, phase_for, question_count, ready_signal};
pub use tags::{OUTLINE_READY, extract_gaps, extract_phase_signal, strip};
