//! Wizard Phase State Machine
//!
//! The interview phase is a pure function of the conversation: how many
//! assistant turns there have been, and whether any of them announced that
//! the outline can be generated. Nothing is stored besides the history.
//! `outline_generation` is terminal, so a ready signal latches.

use crate::types::{ConversationMessage, Role, WizardPhase, WizardState};

use super::tags::{self, OUTLINE_READY};

/// Assistant turns after which the outline phase starts regardless of signals
pub const OUTLINE_THRESHOLD: usize = 12;

/// Map a question count and ready signal to a phase.
///
/// | questions | phase |
/// |-----------|-------|
/// | 0-2       | topic_exploration |
/// | 3-4       | audience_definition |
/// | 5-8       | expertise_extraction |
/// | 9-11      | gap_analysis |
/// | 12+ or ready | outline_generation |
pub fn phase_for(question_count: usize, ready: bool) -> WizardPhase {
    if ready {
        return WizardPhase::OutlineGeneration;
    }
    match question_count {
        0..=2 => WizardPhase::TopicExploration,
        3..=4 => WizardPhase::AudienceDefinition,
        5..=8 => WizardPhase::ExpertiseExtraction,
        9..=11 => WizardPhase::GapAnalysis,
        _ => WizardPhase::OutlineGeneration,
    }
}

/// Number of assistant turns in the history
pub fn question_count(history: &[ConversationMessage]) -> usize {
    history.iter().filter(|m| m.role == Role::Assistant).count()
}

/// Whether any assistant turn so far carried the outline-ready signal
pub fn ready_signal(history: &[ConversationMessage]) -> bool {
    history
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .filter_map(|m| tags::extract_phase_signal(&m.content))
        .any(|signal| signal == OUTLINE_READY)
}

/// Static interview context that does not come from the history
#[derive(Debug, Clone, Default)]
pub struct InterviewContext {
    pub topic: String,
    pub audience: String,
    pub expertise_level: String,
    pub total_questions: usize,
}

/// Re-derive the full wizard state from history.
///
/// Gaps are concatenated across every assistant turn in order. Repeated
/// suggestions are kept as-is; deduplication is an open product decision.
pub fn derive_state(history: &[ConversationMessage], ctx: &InterviewContext) -> WizardState {
    let count = question_count(history);
    let ready = ready_signal(history);
    let phase = phase_for(count, ready);

    let detected_gaps = history
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .flat_map(|m| tags::extract_gaps(&m.content))
        .collect();

    WizardState {
        phase,
        question_count: count,
        total_questions: ctx.total_questions,
        topic: ctx.topic.clone(),
        audience: ctx.audience.clone(),
        expertise_level: ctx.expertise_level.clone(),
        detected_gaps,
        is_ready_for_outline: phase == WizardPhase::OutlineGeneration,
    }
}
