//! Parsing of irreducible infeasible subsystem (IIS) models.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static FREE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9_]*) free$").unwrap());
static BOUNDED_ABOVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<=\s*([A-Za-z][A-Za-z0-9_]*)").unwrap());
static BOUNDED_BELOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9_]*)\s*<=").unwrap());

/** A conflict diagnostic extracted from an infeasible solve.

The solver writes the IIS as an LP-format model; what matters for
diagnostics is which constraints and which variable bounds participate in
the conflict, so the model is reduced to name lists while the raw text is
kept for inspection.
 */
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Iis {
    /// Conflicting constraint names, in order of first appearance.
    pub constraints: Vec<String>,
    /// Variables with conflicting bounds, in order of first appearance.
    pub variables: Vec<String>,
    /// The raw LP-format text the solver emitted.
    pub raw_content: String,
}

impl Iis {
    /** Parses an LP-format IIS model.

    One pass over the trimmed lines: comments are skipped, a line with a
    colon names a constraint, and otherwise the line is checked for a free
    declaration, then a bound with the variable on the right of `<=`, then a
    bound with the variable on the left. Each list keeps first occurrences
    only.
     */
    pub fn parse(content: &str) -> Self {
        let mut constraints = Vec::new();
        let mut variables = Vec::new();
        for line in content.lines().map(str::trim) {
            if line.starts_with('\\') {
                continue;
            }
            if let Some((name, _)) = line.split_once(':') {
                push_unique(&mut constraints, name.trim());
            } else if let Some(captures) = FREE_LINE.captures(line) {
                push_unique(&mut variables, &captures[1]);
            } else if let Some(captures) = BOUNDED_ABOVE.captures(line) {
                push_unique(&mut variables, &captures[1]);
            } else if let Some(captures) = BOUNDED_BELOW.captures(line) {
                push_unique(&mut variables, &captures[1]);
            }
        }
        Iis {
            constraints,
            variables,
            raw_content: content.to_owned(),
        }
    }

    /// Reads and parses an IIS file; `None` for a missing, unreadable, or
    /// empty file.
    pub async fn from_file(path: &Path) -> Option<Self> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        if content.trim().is_empty() {
            return None;
        }
        Some(Self::parse(&content))
    }
}

fn push_unique(items: &mut Vec<String>, candidate: &str) {
    if !items.iter().any(|existing| existing == candidate) {
        items.push(candidate.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_model_yields_only_the_objective_row() {
        let iis = Iis::parse("min\nobj:\nst\nbounds\nend\n");
        assert_eq!(iis.constraints, vec!["obj"]);
        assert!(iis.variables.is_empty());
    }

    #[test]
    fn double_sided_bounds_deduplicate() {
        let iis = Iis::parse("0 <= xName <= 5\nxName free\n");
        assert_eq!(iis.variables, vec!["xName"]);
        assert!(iis.constraints.is_empty());
    }

    #[test]
    fn comments_are_never_constraints() {
        let iis = Iis::parse("\\ infeasibilities: 2\nc1: 1 x >= 10\nc2: 1 x <= 5\n");
        assert_eq!(iis.constraints, vec!["c1", "c2"]);
        // Constraint bodies are classified as constraints, not bound lines.
        assert!(iis.variables.is_empty());
    }

    #[test]
    fn classifies_bound_lines() {
        let content = "\
min
obj:
st
c000002: 1 x000001_x >= 10
bounds
x000001_x <= 5
0 <= x000003_y
zFree free
end
";
        let iis = Iis::parse(content);
        assert_eq!(iis.constraints, vec!["obj", "c000002"]);
        assert_eq!(iis.variables, vec!["x000001_x", "x000003_y", "zFree"]);
        assert_eq!(iis.raw_content, content);
    }
}
