//! Prompt Builder System
//!
//! Standardized prompt construction for every LLM interaction. The wording
//! of individual prompts is free to change; the section structure is fixed:
//!
//! 1. **Role**: who the model is for this task
//! 2. **Objectives**: numbered goals
//! 3. **Context**: ordered key/value facts about the book
//! 4. **Focus**: what to stay on and what to avoid
//! 5. **Output rules**: tag grammar or JSON expectations

use crate::types::{Book, Chapter, Expertise, Outline, Tone, WizardPhase};
use crate::wizard::{InterviewContext, OUTLINE_READY};

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    Role { expertise: String, task: String },
    Objectives(Vec<String>),
    /// Key/value facts, rendered in insertion order
    Context(Vec<(String, String)>),
    Text {
        header: Option<String>,
        content: String,
    },
    Focus {
        target: String,
        restrictions: Vec<String>,
    },
    /// Good/bad examples
    AntiPatterns { bad: Vec<String>, good: Vec<String> },
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    pub fn objectives<S: AsRef<str>>(mut self, objectives: &[S]) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.iter().map(|o| o.as_ref().to_string()).collect(),
        ));
        self
    }

    /// Add a context item, appending to the existing context section if any
    pub fn context_item(mut self, key: &str, value: impl Into<String>) -> Self {
        let item = (key.to_string(), value.into());
        let existing = self.sections.iter_mut().find_map(|s| match s {
            PromptSection::Context(items) => Some(items),
            _ => None,
        });
        match existing {
            Some(items) => items.push(item),
            None => self.sections.push(PromptSection::Context(vec![item])),
        }
        self
    }

    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.into(),
        });
        self
    }

    pub fn section(mut self, header: &str, content: impl Into<String>) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.into(),
        });
        self
    }

    pub fn focus(mut self, target: &str, restrictions: &[&str]) -> Self {
        self.sections.push(PromptSection::Focus {
            target: target.to_string(),
            restrictions: restrictions.iter().map(|r| r.to_string()).collect(),
        });
        self
    }

    pub fn anti_patterns(mut self, bad: &[&str], good: &[&str]) -> Self {
        self.sections.push(PromptSection::AntiPatterns {
            bad: bad.iter().map(|s| s.to_string()).collect(),
            good: good.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Context(items) => {
                    prompt.push_str("# Context\n\n");
                    for (key, value) in items {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Focus {
                    target,
                    restrictions,
                } => {
                    prompt.push_str("<FOCUS>\n");
                    prompt.push_str(&format!("IMPORTANT: Focus EXCLUSIVELY on: {}\n", target));
                    for restriction in restrictions {
                        prompt.push_str(&format!("- {}\n", restriction));
                    }
                    prompt.push_str("</FOCUS>\n\n");
                }
                PromptSection::AntiPatterns { bad, good } => {
                    prompt.push_str("<what_not_to_do>\n");
                    for example in bad {
                        prompt.push_str(&format!("WRONG: {}\n", example));
                    }
                    prompt.push_str("</what_not_to_do>\n\n<what_to_do>\n");
                    for example in good {
                        prompt.push_str(&format!("CORRECT: {}\n", example));
                    }
                    prompt.push_str("</what_to_do>\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Preset prompts for each AI operation
pub struct PromptTemplates;

impl PromptTemplates {
    /// System prompt for one interview turn
    pub fn interview(phase: WizardPhase, question_count: usize, ctx: &InterviewContext) -> String {
        let phase_goal = match phase {
            WizardPhase::TopicExploration => "Understand the core topic and why the author wants to write about it",
            WizardPhase::AudienceDefinition => "Pin down who the readers are and what they already know",
            WizardPhase::ExpertiseExtraction => "Draw out the author's unique knowledge, stories and examples",
            WizardPhase::GapAnalysis => "Identify important areas the author has not covered yet",
            WizardPhase::OutlineGeneration => "Summarize what you learned and confirm the book is ready for an outline",
        };

        PromptBuilder::new()
            .role("book development editor", "interviewing authors to plan non-fiction books")
            .objectives(&[
                "Ask exactly ONE focused follow-up question per turn",
                phase_goal,
                "Build on the author's previous answers instead of repeating questions",
            ])
            .context_item("Topic", non_empty(&ctx.topic))
            .context_item("Audience", non_empty(&ctx.audience))
            .context_item("Expertise level", non_empty(&ctx.expertise_level))
            .context_item("Current phase", phase.as_str())
            .context_item(
                "Questions asked",
                format!("{} of about {}", question_count, ctx.total_questions),
            )
            .section(
                "Directives",
                format!(
                    "When you notice a topic the book should cover but the author has not mentioned, \
                     append a block on its own lines:\n\n\
                     <gap_suggestion>\narea: <short name>\ndescription: <one sentence>\nimportance: high|medium|low\n</gap_suggestion>\n\n\
                     When you have enough information to draft an outline, end your message with:\n\n\
                     <phase_signal>{}</phase_signal>\n\n\
                     These blocks are hidden from the author; never mention them.",
                    OUTLINE_READY
                ),
            )
            .build()
    }

    /// System prompt for drafting one chapter as HTML
    pub fn chapter_draft(
        book: &Book,
        outline: &Outline,
        chapter: &Chapter,
        section_description: &str,
        tone: Tone,
        expertise: Expertise,
    ) -> String {
        let toc = outline
            .sections
            .iter()
            .map(|s| format!("{}. {}", s.order_index + 1, s.title))
            .collect::<Vec<_>>()
            .join("\n");

        PromptBuilder::new()
            .role("non-fiction author", "writing clear, well-structured book chapters")
            .objectives(&[
                "Write the complete chapter described below",
                "Match the requested tone and reader expertise",
                "Use concrete examples and smooth transitions",
            ])
            .context_item("Book", &book.title)
            .context_item("Topic", &book.topic)
            .context_item("Audience", &book.audience)
            .context_item("Tone", tone.to_string())
            .context_item("Reader expertise", expertise.to_string())
            .context_item("Chapter", &chapter.title)
            .context_item("Chapter brief", non_empty(section_description))
            .section("Table of Contents", toc)
            .focus(
                &chapter.title,
                &[
                    "Do NOT repeat material that belongs to other chapters",
                    "Do NOT include a preamble or closing remarks addressed to the author",
                ],
            )
            .section(
                "Output",
                "Respond with HTML only, using <h2>, <h3>, <p>, <ul>, <ol>, <li>, <blockquote> and <strong>/<em>. \
                 No <html>, <head> or <body> wrappers, no markdown.",
            )
            .build()
    }

    /// Per-chapter quality review
    pub fn chapter_review(
        book: &Book,
        chapter_title: &str,
        chapter_text: &str,
        position: usize,
        total: usize,
        max_suggestions: usize,
    ) -> String {
        PromptBuilder::new()
            .role("developmental editor", "manuscript quality review")
            .objectives(&[
                "Score readability, consistency, structure and accuracy from 0 to 100",
                "Give one short rationale per dimension",
                format!(
                    "List at most {} suggestions, most severe first, quoting the exact text to change",
                    max_suggestions
                )
                .as_str(),
            ])
            .context_item("Book", &book.title)
            .context_item("Audience", &book.audience)
            .context_item("Chapter", format!("{} ({} of {})", chapter_title, position, total))
            .section("Chapter Text", chapter_text)
            .anti_patterns(
                &["issueText paraphrases the chapter", "vague advice like \"improve flow\""],
                &["issueText is copied verbatim from the chapter", "suggestedFix is a drop-in replacement"],
            )
            .build()
    }

    /// Cross-chapter consistency pass over compact summaries
    pub fn consistency_review(book: &Book, summaries: &[String], max_suggestions: usize) -> String {
        PromptBuilder::new()
            .role("developmental editor", "whole-manuscript consistency")
            .objectives(&[
                "Find contradictions, terminology drift and repeated material across chapters",
                "Return a consistency adjustment between -20 and 0 (0 means no cross-chapter problems)",
                format!("List at most {} cross-chapter suggestions", max_suggestions).as_str(),
            ])
            .context_item("Book", &book.title)
            .context_item("Chapters", summaries.len().to_string())
            .section("Chapter Summaries", summaries.join("\n\n"))
            .build()
    }

    /// Outline completeness analysis
    pub fn outline_analysis(book: &Book, outline: &Outline) -> String {
        let sections = outline
            .sections
            .iter()
            .map(|s| {
                if s.description.is_empty() {
                    format!("[{}] {}", s.order_index, s.title)
                } else {
                    format!("[{}] {}: {}", s.order_index, s.title, s.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        PromptBuilder::new()
            .role("acquisitions editor", "evaluating book outlines")
            .objectives(&[
                "Suggest missing chapters with an insertion position (0-based), priority and rationale",
                "Assess coverage of each major topic area as covered, partial or missing",
                "Give an overall completeness score from 0 to 100 and a one-paragraph summary",
            ])
            .context_item("Book", &book.title)
            .context_item("Topic", &book.topic)
            .context_item("Audience", &book.audience)
            .context_item("Expertise level", &book.expertise_level)
            .section("Current Outline", sections)
            .focus(
                "gaps in the outline as written",
                &["Do NOT rewrite existing chapter titles"],
            )
            .build()
    }
}

fn non_empty(value: &str) -> &str {
    if value.trim().is_empty() {
        "(not yet known)"
    } else {
        value
    }
}
