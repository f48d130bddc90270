//! QA Command
//!
//! Run the QA orchestrator over one book and print the report.

use std::sync::Arc;

use crate::ai::LazyProvider;
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::service::AnalysisService;
use crate::types::{QaAnalysisResult, Result};

pub async fn run(book_id: &str, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let book = ctx.db.load_book_unchecked(book_id)?;
    let provider = Arc::new(LazyProvider::new(ctx.config.llm.clone())).get()?;

    let service = AnalysisService::new(ctx.db.clone(), ctx.config.qa_settings());
    let result = service.run_qa(provider, &book).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&book.title, &result);
    }
    Ok(())
}

fn print_report(title: &str, result: &QaAnalysisResult) {
    let output = Output::new();
    output.section(&format!("QA Report: {}", title));

    let level = Output::quality_style(result.quality_level);
    println!(
        "Overall: {} ({})",
        level.apply_to(result.overall_score),
        level.apply_to(result.quality_level.label())
    );
    for line in dimension_lines(result) {
        println!("  {}", line);
    }

    if !result.chapter_scores.is_empty() {
        output.section("Chapters");
        for chapter in &result.chapter_scores {
            println!(
                "  {:<32} R{:>3} C{:>3} S{:>3} A{:>3}  {} words",
                chapter.chapter_title,
                chapter.readability,
                chapter.consistency,
                chapter.structure,
                chapter.accuracy,
                chapter.word_count
            );
        }
    }

    if result.suggestions.is_empty() {
        output.success("No suggestions");
        return;
    }

    output.section("Suggestions");
    for suggestion in &result.suggestions {
        let severity = Output::severity_style(suggestion.severity);
        let scope = if suggestion.is_cross_chapter() {
            "whole book"
        } else {
            suggestion.chapter_title.as_str()
        };
        println!(
            "  [{}] {} ({})",
            severity.apply_to(format!("{:?}", suggestion.severity).to_lowercase()),
            suggestion.issue_text,
            scope
        );
        if !suggestion.explanation.is_empty() {
            println!("      {}", suggestion.explanation);
        }
        if let Some(fix) = &suggestion.suggested_fix {
            println!("      fix: {}", fix);
        }
    }
}

fn dimension_lines(result: &QaAnalysisResult) -> Vec<String> {
    [
        ("Readability", result.readability),
        ("Consistency", result.consistency),
        ("Structure", result.structure),
        ("Accuracy", result.accuracy),
    ]
    .iter()
    .map(|(name, score)| format!("{:<12} {:>3}", name, score))
    .collect()
}
