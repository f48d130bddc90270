//! Structured Tag Parser
//!
//! Extracts machine-readable directives the interviewer embeds in its prose
//! and strips them for display.
//!
//! ## Grammar
//!
//! ```text
//! gap_block    := "<gap_suggestion>" field* "</gap_suggestion>"
//! field        := key ":" value NEWLINE
//! key          := "area" | "description" | "importance"
//! importance   := "high" | "medium" | "low"
//! phase_block  := "<phase_signal>" value "</phase_signal>"
//! ```
//!
//! Blocks may appear anywhere, interleaved with prose. A block whose open tag
//! has no close tag, or that contains another open tag before its close, is
//! dangling and never yields a directive. A gap block that lacks a field or
//! spells the importance outside the enum is dropped whole, never partially
//! parsed; `strip` still removes it from the displayed text.

use std::ops::Range;

use crate::types::{GapSuggestion, Importance};

const GAP_OPEN: &str = "<gap_suggestion>";
const GAP_CLOSE: &str = "</gap_suggestion>";
const PHASE_OPEN: &str = "<phase_signal>";
const PHASE_CLOSE: &str = "</phase_signal>";

const ALL_TOKENS: [&str; 4] = [GAP_OPEN, GAP_CLOSE, PHASE_OPEN, PHASE_CLOSE];

/// Phase signal value announcing the interview has enough material
pub const OUTLINE_READY: &str = "ready_for_outline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Gap,
    Phase,
}

impl TagKind {
    fn open(self) -> &'static str {
        match self {
            Self::Gap => GAP_OPEN,
            Self::Phase => PHASE_OPEN,
        }
    }

    fn close(self) -> &'static str {
        match self {
            Self::Gap => GAP_CLOSE,
            Self::Phase => PHASE_CLOSE,
        }
    }
}

/// A complete block located in the source text
#[derive(Debug)]
struct Block<'a> {
    kind: TagKind,
    span: Range<usize>,
    body: &'a str,
}

/// Find the next open tag of either kind at or after `from`
fn next_open(text: &str, from: usize) -> Option<(usize, TagKind)> {
    let rest = &text[from..];
    let gap = rest.find(GAP_OPEN).map(|i| (from + i, TagKind::Gap));
    let phase = rest.find(PHASE_OPEN).map(|i| (from + i, TagKind::Phase));
    match (gap, phase) {
        (Some(g), Some(p)) => Some(if g.0 <= p.0 { g } else { p }),
        (g, p) => g.or(p),
    }
}

/// Scan `text` for complete blocks in order of appearance
fn scan(text: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some((start, kind)) = next_open(text, pos) {
        let body_start = start + kind.open().len();
        let Some(close_rel) = text[body_start..].find(kind.close()) else {
            pos = body_start;
            continue;
        };
        let body_end = body_start + close_rel;

        // Another open tag before the close makes this one dangling
        if let Some((inner, _)) = next_open(text, body_start)
            && inner < body_end
        {
            pos = inner;
            continue;
        }

        let end = body_end + kind.close().len();
        blocks.push(Block {
            kind,
            span: start..end,
            body: &text[body_start..body_end],
        });
        pos = end;
    }

    blocks
}

/// Parse the body of a gap block; `None` when any field is missing or invalid
fn parse_gap_body(body: &str) -> Option<GapSuggestion> {
    let mut area = None;
    let mut description = None;
    let mut importance = None;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once(':')?;
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "area" => area = Some(value.to_string()),
            "description" => description = Some(value.to_string()),
            "importance" => importance = Some(value.to_ascii_lowercase().parse::<Importance>().ok()?),
            _ => return None,
        }
    }

    let area = area.filter(|a| !a.is_empty())?;
    let description = description.filter(|d| !d.is_empty())?;

    Some(GapSuggestion {
        area,
        description,
        importance: importance?,
    })
}

/// Every well-formed gap block, in order of appearance
pub fn extract_gaps(text: &str) -> Vec<GapSuggestion> {
    scan(text)
        .into_iter()
        .filter(|b| b.kind == TagKind::Gap)
        .filter_map(|b| {
            let gap = parse_gap_body(b.body);
            if gap.is_none() {
                tracing::debug!("Dropping malformed gap block");
            }
            gap
        })
        .collect()
}

/// The first phase signal's trimmed value
pub fn extract_phase_signal(text: &str) -> Option<String> {
    scan(text)
        .into_iter()
        .find(|b| b.kind == TagKind::Phase)
        .map(|b| b.body.trim().to_string())
}

/// Remove all directive blocks and stray tag tokens for display.
///
/// Idempotent: the output contains no tag token, so a second pass finds
/// nothing to remove and the newline collapse has already been applied.
pub fn strip(text: &str) -> String {
    let mut current = text.to_string();

    // Removing one span can splice two fragments into a new token; repeat to a fixpoint
    loop {
        let mut next = String::with_capacity(current.len());
        let mut last = 0;
        for block in scan(&current) {
            next.push_str(&current[last..block.span.start]);
            last = block.span.end;
        }
        next.push_str(&current[last..]);

        for token in ALL_TOKENS {
            next = next.replace(token, "");
        }

        if next == current {
            break;
        }
        current = next;
    }

    collapse_newlines(&current).trim().to_string()
}

/// Collapse runs of three or more newlines to exactly two
fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0;
    for c in text.chars() {
        if c == '\n' {
            run += 1;
            if run <= 2 {
                out.push(c);
            }
        } else {
            run = 0;
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "Great, tell me more about your readers.\n\n\
<gap_suggestion>\narea: Case studies\ndescription: Real-world examples are thin\nimportance: high\n</gap_suggestion>\n\n\n\
What do they already know?\n\
<gap_suggestion>\narea: Glossary\ndescription: Terms are undefined\nimportance: low\n</gap_suggestion>";

    #[test]
    fn test_extract_gaps_in_order() {
        let gaps = extract_gaps(SAMPLE);
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].area, "Case studies");
        assert_eq!(gaps[0].importance, Importance::High);
        assert_eq!(gaps[1].area, "Glossary");
        assert_eq!(gaps[1].importance, Importance::Low);
    }

    #[test]
    fn test_misspelled_importance_drops_block() {
        let text = "<gap_suggestion>\narea: Tools\ndescription: Missing setup\nimportance: hihg\n</gap_suggestion>\
<gap_suggestion>\narea: Ok\ndescription: Fine\nimportance: medium\n</gap_suggestion>";
        let gaps = extract_gaps(text);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].area, "Ok");
    }

    #[test]
    fn test_missing_importance_drops_block() {
        let text = "<gap_suggestion>\narea: Tools\ndescription: Missing setup\n</gap_suggestion>";
        assert!(extract_gaps(text).is_empty());
    }

    #[test]
    fn test_unclosed_block_is_ignored() {
        let text = "<gap_suggestion>\narea: A\ndescription: B\nimportance: high\n";
        assert!(extract_gaps(text).is_empty());
        assert_eq!(strip(text), "area: A\ndescription: B\nimportance: high");
    }

    #[test]
    fn test_phase_signal_first_match_trimmed() {
        let text = "Done!<phase_signal>  ready_for_outline \n</phase_signal> and \
<phase_signal>other</phase_signal>";
        assert_eq!(extract_phase_signal(text).as_deref(), Some(OUTLINE_READY));
        assert_eq!(extract_phase_signal("no signal here"), None);
    }

    #[test]
    fn test_strip_removes_blocks_and_collapses() {
        let stripped = strip(SAMPLE);
        assert_eq!(
            stripped,
            "Great, tell me more about your readers.\n\nWhat do they already know?"
        );
    }

    #[test]
    fn test_strip_handles_spliced_tokens() {
        let text = "<gap_<phase_signal>x</phase_signal>suggestion>tail";
        let stripped = strip(text);
        assert_eq!(stripped, "tail");
    }

    fn fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z \n]{0,12}",
            Just(GAP_OPEN.to_string()),
            Just(GAP_CLOSE.to_string()),
            Just(PHASE_OPEN.to_string()),
            Just(PHASE_CLOSE.to_string()),
            Just("\n\n\n\n".to_string()),
            Just("area: x\ndescription: y\nimportance: high\n".to_string()),
            Just("<gap_".to_string()),
            Just("suggestion>".to_string()),
        ]
    }

    proptest! {
        #[test]
        fn prop_strip_is_idempotent(parts in proptest::collection::vec(fragment(), 0..16)) {
            let text = parts.concat();
            let once = strip(&text);
            prop_assert_eq!(strip(&once), once.clone());
            for token in ALL_TOKENS {
                prop_assert!(!once.contains(token));
            }
            prop_assert!(!once.contains("\n\n\n"));
        }
    }
}
