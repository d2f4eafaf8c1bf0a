//! Mutation catalog
//!
//! A fixed, ordered table of deterministic mutation rules. Each rule targets
//! one narrow visible-impact category and matches structurally on source text
//! with regexes - never a parse. `apply` is a pure function of its input;
//! applicability must be re-checked between applications because earlier rules
//! change the text.

use regex::{Captures, Regex};

/// One deterministic mutation.
///
/// `apply` is only called on text for which `is_applicable` returned true,
/// and must return text that differs from its input in that case.
pub trait MutationRule: Send + Sync {
    fn name(&self) -> &'static str;
    /// Technical change description recorded for the round (player-hidden).
    fn description(&self) -> &'static str;
    fn is_applicable(&self, text: &str) -> bool;
    fn apply(&self, text: &str) -> String;
}

/// The full rule table, in fixed order. Selection order is randomized by the
/// planner, not here.
pub fn catalog() -> Vec<Box<dyn MutationRule>> {
    vec![
        Box::new(StringTruncation::new()),
        Box::new(FirstItemDropped::new()),
        Box::new(IndexCollapse::new()),
        Box::new(UndefinedProperty::new()),
        Box::new(BrokenDereference::new()),
        Box::new(OffByOne),
        Box::new(SortInversion::new()),
        Box::new(AwaitDropped),
        Box::new(BooleanFlip::new()),
    ]
}

// ============================================================================
// Rules
// ============================================================================

/// Cuts a long string literal down to half its length.
struct StringTruncation {
    pattern: Regex,
}

impl StringTruncation {
    fn new() -> Self {
        Self {
            pattern: Regex::new(r#""([^"\\]{8,})""#).unwrap(),
        }
    }
}

impl MutationRule for StringTruncation {
    fn name(&self) -> &'static str {
        "string-truncation"
    }

    fn description(&self) -> &'static str {
        "Truncated a string literal to half its length"
    }

    fn is_applicable(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    fn apply(&self, text: &str) -> String {
        self.pattern
            .replacen(text, 1, |caps: &Captures| {
                let inner = &caps[1];
                let keep = inner.chars().count() / 2;
                let kept: String = inner.chars().take(keep).collect();
                format!("\"{}\"", kept)
            })
            .into_owned()
    }
}

/// Drops the first element of a collection right before it is mapped.
struct FirstItemDropped {
    pattern: Regex,
}

impl FirstItemDropped {
    fn new() -> Self {
        Self {
            pattern: Regex::new(r"\.map\(").unwrap(),
        }
    }
}

impl MutationRule for FirstItemDropped {
    fn name(&self) -> &'static str {
        "first-item-dropped"
    }

    fn description(&self) -> &'static str {
        "Sliced off the first element of a collection before a map call"
    }

    fn is_applicable(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    fn apply(&self, text: &str) -> String {
        self.pattern
            .replacen(text, 1, ".slice(1).map(")
            .into_owned()
    }
}

/// Pins an index expression to zero so every iteration reads the same value.
struct IndexCollapse {
    pattern: Regex,
}

impl IndexCollapse {
    fn new() -> Self {
        Self {
            pattern: Regex::new(r"\[(i|idx|index)\]").unwrap(),
        }
    }
}

impl MutationRule for IndexCollapse {
    fn name(&self) -> &'static str {
        "index-collapse"
    }

    fn description(&self) -> &'static str {
        "Pinned an indexed access to element zero"
    }

    fn is_applicable(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    fn apply(&self, text: &str) -> String {
        self.pattern.replacen(text, 1, "[0]").into_owned()
    }
}

/// Misspells a property access so it resolves to undefined and the bad value
/// flows onward (NaN arithmetic, blank rendering).
struct UndefinedProperty {
    pattern: Regex,
}

impl UndefinedProperty {
    fn new() -> Self {
        // Property reads only: the trailing class excludes call expressions.
        Self {
            pattern: Regex::new(r"\.([a-z][A-Za-z0-9_]{3,})([^A-Za-z0-9_(]|$)").unwrap(),
        }
    }

    /// First property whose letter swap actually changes the name.
    fn find_target(&self, text: &str) -> Option<(std::ops::Range<usize>, String)> {
        for caps in self.pattern.captures_iter(text) {
            let whole = caps.get(0)?;
            let prop = &caps[1];
            let tail = &caps[2];
            if let Some(swapped) = swap_last_two(prop) {
                let replacement = format!(".{}{}", swapped, tail);
                return Some((whole.range(), replacement));
            }
        }
        None
    }
}

/// Swap the last two characters of an identifier. None when the swap would be
/// a no-op (repeated trailing letter).
fn swap_last_two(ident: &str) -> Option<String> {
    let mut chars: Vec<char> = ident.chars().collect();
    let n = chars.len();
    if n < 2 || chars[n - 2] == chars[n - 1] {
        return None;
    }
    chars.swap(n - 2, n - 1);
    Some(chars.into_iter().collect())
}

impl MutationRule for UndefinedProperty {
    fn name(&self) -> &'static str {
        "undefined-property"
    }

    fn description(&self) -> &'static str {
        "Misspelled a property access so it resolves to undefined"
    }

    fn is_applicable(&self, text: &str) -> bool {
        self.find_target(text).is_some()
    }

    fn apply(&self, text: &str) -> String {
        match self.find_target(text) {
            Some((range, replacement)) => {
                let mut out = String::with_capacity(text.len());
                out.push_str(&text[..range.start]);
                out.push_str(&replacement);
                out.push_str(&text[range.end..]);
                out
            }
            None => text.to_string(),
        }
    }
}

/// Routes a `.length` read through an intermediate object that does not
/// exist, so evaluation throws instead of yielding a number.
struct BrokenDereference {
    pattern: Regex,
}

impl BrokenDereference {
    fn new() -> Self {
        Self {
            pattern: Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\.length\b").unwrap(),
        }
    }
}

impl MutationRule for BrokenDereference {
    fn name(&self) -> &'static str {
        "broken-dereference"
    }

    fn description(&self) -> &'static str {
        "Routed a length read through a missing intermediate object"
    }

    fn is_applicable(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    fn apply(&self, text: &str) -> String {
        self.pattern
            .replacen(text, 1, "$1.entries.length")
            .into_owned()
    }
}

/// Shifts an arithmetic or comparison boundary by one.
struct OffByOne;

impl MutationRule for OffByOne {
    fn name(&self) -> &'static str {
        "off-by-one"
    }

    fn description(&self) -> &'static str {
        "Shifted an arithmetic or comparison boundary by one"
    }

    fn is_applicable(&self, text: &str) -> bool {
        text.contains("+ 1") || text.contains("- 1") || text.contains("<=") || text.contains(">=")
    }

    fn apply(&self, text: &str) -> String {
        if text.contains("+ 1") {
            text.replacen("+ 1", "- 1", 1)
        } else if text.contains("- 1") {
            text.replacen("- 1", "+ 1", 1)
        } else if text.contains("<=") {
            text.replacen("<=", "<", 1)
        } else {
            text.replacen(">=", ">", 1)
        }
    }
}

/// Swaps the comparator parameters of a sort call, inverting the order of
/// everything rendered from it.
struct SortInversion {
    pattern: Regex,
}

impl SortInversion {
    fn new() -> Self {
        Self {
            pattern: Regex::new(
                r"\.sort\(\(([A-Za-z_][A-Za-z0-9_]*),\s*([A-Za-z_][A-Za-z0-9_]*)\)\s*=>",
            )
            .unwrap(),
        }
    }
}

impl MutationRule for SortInversion {
    fn name(&self) -> &'static str {
        "sort-inversion"
    }

    fn description(&self) -> &'static str {
        "Swapped the comparator parameters of a sort call"
    }

    fn is_applicable(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    fn apply(&self, text: &str) -> String {
        self.pattern
            .replacen(text, 1, |caps: &Captures| {
                format!(".sort(({}, {}) =>", &caps[2], &caps[1])
            })
            .into_owned()
    }
}

/// Removes an await so downstream code sees a pending promise instead of its
/// resolved value.
struct AwaitDropped;

impl MutationRule for AwaitDropped {
    fn name(&self) -> &'static str {
        "await-dropped"
    }

    fn description(&self) -> &'static str {
        "Removed an await from an assignment"
    }

    fn is_applicable(&self, text: &str) -> bool {
        text.contains("= await ")
    }

    fn apply(&self, text: &str) -> String {
        text.replacen("= await ", "= ", 1)
    }
}

/// Flips a boolean literal or equality operator.
struct BooleanFlip {
    true_literal: Regex,
    false_literal: Regex,
}

impl BooleanFlip {
    fn new() -> Self {
        Self {
            true_literal: Regex::new(r"\btrue\b").unwrap(),
            false_literal: Regex::new(r"\bfalse\b").unwrap(),
        }
    }
}

impl MutationRule for BooleanFlip {
    fn name(&self) -> &'static str {
        "boolean-flip"
    }

    fn description(&self) -> &'static str {
        "Flipped a boolean literal or equality check"
    }

    fn is_applicable(&self, text: &str) -> bool {
        self.true_literal.is_match(text)
            || self.false_literal.is_match(text)
            || text.contains("!==")
            || text.contains("===")
    }

    fn apply(&self, text: &str) -> String {
        if self.true_literal.is_match(text) {
            self.true_literal.replacen(text, 1, "false").into_owned()
        } else if self.false_literal.is_match(text) {
            self.false_literal.replacen(text, 1, "true").into_owned()
        } else if text.contains("!==") {
            text.replacen("!==", "===", 1)
        } else {
            text.replacen("===", "!==", 1)
        }
    }
}
