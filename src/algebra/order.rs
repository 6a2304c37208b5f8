//! Traversal ordering.
//!
//! Given the unordered algebraic expressions of one pattern, pick the
//! evaluation order (and transposes) that maximises selectivity at the
//! entry point: each expression's source must be resolved by an earlier
//! expression, and higher-scored expressions go first.
//!
//! Scoring runs in three phases, each dominating the previous by adding
//! the running maximum: labels, then filters, then bound variables.

use crate::algebra::{AlgebraicExpression, QueryGraph};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Distilled filter-tree analysis handed over by the host.
///
/// `filtered` counts aliases mentioned in any predicate; `independent`
/// counts aliases that are the single entity of a predicate (`n.v = 1`
/// makes `n` independent, `n.v = m.v` makes neither).
#[derive(Debug, Clone, Default)]
pub struct FilterSummary {
    filtered: HashMap<String, u64>,
    independent: HashMap<String, u64>,
}

impl FilterSummary {
    pub fn new() -> Self {
        FilterSummary::default()
    }

    /// Record an alias mentioned by a predicate.
    pub fn add_filtered(&mut self, alias: &str) {
        *self.filtered.entry(alias.to_string()).or_insert(0) += 1;
    }

    /// Record an independent occurrence of an alias.
    pub fn add_independent(&mut self, alias: &str) {
        self.add_filtered(alias);
        *self.independent.entry(alias.to_string()).or_insert(0) += 1;
    }

    pub fn is_filtered(&self, alias: &str) -> bool {
        self.filtered.contains_key(alias)
    }

    pub fn independent_count(&self, alias: &str) -> u64 {
        self.independent.get(alias).copied().unwrap_or(0)
    }
}

fn is_var_len(exp: &AlgebraicExpression, qg: &QueryGraph) -> bool {
    exp.edge().is_some_and(|e| qg.is_var_len(e))
}

/// Phase 1: source label count plus destination label count; zero for
/// variable-length expressions, which are flanked by dedicated label
/// expressions.
pub fn labels_score(exp: &AlgebraicExpression, qg: &QueryGraph) -> i64 {
    if is_var_len(exp, qg) {
        return 0;
    }
    (qg.label_count(exp.source()) + qg.label_count(exp.destination())) as i64
}

/// Phase 2: filter presence and independent-occurrence counts on the
/// endpoints, plus a smaller bump for a filtered edge (filtering an edge
/// still requires traversing the expression).
pub fn filter_score(
    exp: &AlgebraicExpression,
    qg: &QueryGraph,
    filters: &FilterSummary,
) -> i64 {
    let mut score = 0;
    let src = exp.source();
    let dest = exp.destination();

    if !is_var_len(exp, qg) {
        if filters.is_filtered(src) {
            score += 2;
            score += 2 * filters.independent_count(src) as i64;
        }
        if dest != src && filters.is_filtered(dest) {
            score += 2;
            score += 2 * filters.independent_count(dest) as i64;
        }
    }

    if let Some(edge) = exp.edge() {
        if filters.is_filtered(edge) {
            score += 1;
        }
    }

    score
}

/// Phase 3: one point per bound endpoint.
pub fn bound_score(exp: &AlgebraicExpression, bound_vars: &HashSet<String>) -> i64 {
    let src = exp.source();
    let dest = exp.destination();
    let mut score = i64::from(bound_vars.contains(src));
    if dest != src {
        score += i64::from(bound_vars.contains(dest));
    }
    score
}

/// Flat score of a stand-alone expression, used to compare the two
/// virtual entry points of the winning expression.
pub fn score_expression(
    exp: &AlgebraicExpression,
    qg: &QueryGraph,
    filters: Option<&FilterSummary>,
    bound_vars: Option<&HashSet<String>>,
) -> i64 {
    let mut score = labels_score(exp, qg);
    if let Some(f) = filters {
        score += filter_score(exp, qg, f);
    }
    if let Some(b) = bound_vars {
        score += bound_score(exp, b);
    }
    score
}

/// Score every expression with the three-phase lexicographic scheme;
/// each phase adds the running maximum of the previous phases so later
/// phases dominate earlier ones.
pub fn score_expressions(
    exps: &[AlgebraicExpression],
    qg: &QueryGraph,
    filters: Option<&FilterSummary>,
    bound_vars: Option<&HashSet<String>>,
) -> Vec<i64> {
    let n = exps.len();
    let mut scores = vec![0; n];
    let mut max = 0;

    // phase 1: labels
    for (i, exp) in exps.iter().enumerate() {
        scores[i] = labels_score(exp, qg);
        max = max.max(scores[i]);
    }
    let mut currmax = max;

    // phase 2: filters
    if let Some(f) = filters {
        for (i, exp) in exps.iter().enumerate() {
            let mut score = filter_score(exp, qg, f);
            if score > 0 {
                if is_var_len(exp, qg) {
                    // a filtered variable-length traversal ranks between
                    // its flanking plain expressions
                    score = currmax / 2;
                } else {
                    score += currmax;
                }
                scores[i] += score;
                max = max.max(scores[i]);
            }
        }
        currmax = max;
    }

    // phase 3: bound variables
    if let Some(b) = bound_vars {
        for (i, exp) in exps.iter().enumerate() {
            let score = bound_score(exp, b);
            if score > 0 {
                scores[i] += score + currmax;
            }
        }
    }

    scores
}

/// Expression indices whose source or destination touches an already
/// placed expression, excluding placed ones; returned in ascending score
/// order so `pop` yields the best candidate.
fn valid_expressions(
    exps: &[AlgebraicExpression],
    order: &[(i64, usize)], // ascending by score
    placed: &[usize],
) -> Vec<usize> {
    let mut options = Vec::new();
    for &(_, i) in order {
        if placed.contains(&i) {
            continue;
        }

        if placed.is_empty() {
            options.push(i);
            continue;
        }

        let src = exps[i].source();
        let dest = exps[i].destination();
        let connected = placed.iter().any(|&j| {
            let used_src = exps[j].source();
            let used_dest = exps[j].destination();
            src == used_src || src == used_dest || dest == used_src || dest == used_dest
        });
        if connected {
            options.push(i);
        }
    }
    options
}

/// Backtracking arrangement search: place the highest-scored valid
/// candidate at each position, requiring every remaining expression to
/// stay reachable, and backtrack when the chain dead-ends.
fn arrange(
    exps: &[AlgebraicExpression],
    order: &[(i64, usize)],
    placed: &mut Vec<usize>,
    mut options: Vec<usize>,
) -> bool {
    let n = exps.len();
    if placed.len() == n {
        return true;
    }

    while let Some(candidate) = options.pop() {
        placed.push(candidate);

        let follows = valid_expressions(exps, order, placed);
        // every unplaced expression must remain a candidate, otherwise
        // this prefix cannot complete
        if follows.len() == n - placed.len() && arrange(exps, order, placed, follows) {
            return true;
        }

        placed.pop();
    }
    false
}

/// Transpose out-of-order expressions so every expression's source is
/// resolved by an earlier one.
fn resolve_winning_sequence(exps: &mut [AlgebraicExpression]) {
    for i in 1..exps.len() {
        let src = exps[i].source().to_string();
        let resolved = exps[..i]
            .iter()
            .any(|prev| prev.source() == src || prev.destination() == src);
        if !resolved {
            exps[i].transpose();
        }
    }
}

/// Decide whether the opening expression should be entered from its
/// destination instead of its source.
fn should_transpose_entry_point(
    exp: &AlgebraicExpression,
    qg: &QueryGraph,
    filters: Option<&FilterSummary>,
    bound_vars: Option<&HashSet<String>>,
) -> bool {
    let src = exp.source();
    let dest = exp.destination();

    // consider source and destination as stand-alone expressions
    let src_exp = AlgebraicExpression::new_operand(false, src, src, None, None);
    let dest_exp = AlgebraicExpression::new_operand(false, dest, dest, None, None);

    let src_score = score_expression(&src_exp, qg, filters, bound_vars);
    let dest_score = score_expression(&dest_exp, qg, filters, bound_vars);
    dest_score > src_score
}

/// Order a pattern's expressions for evaluation, transposing where the
/// winning arrangement requires it. `exps` is reordered in place.
pub fn order_expressions(
    qg: &QueryGraph,
    exps: &mut Vec<AlgebraicExpression>,
    filters: Option<&FilterSummary>,
    bound_vars: Option<&HashSet<String>>,
) {
    if exps.is_empty() {
        return;
    }

    let scores = score_expressions(exps, qg, filters, bound_vars);

    // ascending score order; pop() returns the best remaining
    let mut order: Vec<(i64, usize)> = scores.iter().copied().zip(0..exps.len()).collect();
    order.sort_unstable();

    let mut placed = Vec::with_capacity(exps.len());
    let options = valid_expressions(exps, &order, &placed);
    let ok = arrange(exps, &order, &mut placed, options);
    debug_assert!(ok, "no valid arrangement found");
    if !ok {
        return;
    }

    // reorder in place following the winning arrangement
    let mut arranged: Vec<Option<AlgebraicExpression>> = exps.drain(..).map(Some).collect();
    for &i in &placed {
        if let Some(exp) = arranged[i].take() {
            exps.push(exp);
        }
    }

    resolve_winning_sequence(exps);

    if should_transpose_entry_point(&exps[0], qg, filters, bound_vars) {
        debug!("transposing traversal entry point");
        exps[0].transpose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str, dest: &str, edge: &str) -> AlgebraicExpression {
        AlgebraicExpression::new_operand(false, src, dest, Some(edge), Some("R"))
    }

    fn pattern() -> (QueryGraph, Vec<AlgebraicExpression>) {
        // (a)-[e1]->(b)-[e2]->(c)
        let mut qg = QueryGraph::new();
        qg.add_node("a", &[]);
        qg.add_node("b", &[]);
        qg.add_node("c", &[]);
        qg.add_edge("e1", "a", "b", &["R"]);
        qg.add_edge("e2", "b", "c", &["R"]);
        (qg, vec![expr("b", "c", "e2"), expr("a", "b", "e1")])
    }

    #[test]
    fn test_filtered_source_goes_first() {
        let (qg, mut exps) = pattern();
        let mut filters = FilterSummary::new();
        filters.add_independent("a");

        order_expressions(&qg, &mut exps, Some(&filters), None);
        assert_eq!(exps[0].source(), "a");
        assert_eq!(exps[1].source(), "b");
    }

    #[test]
    fn test_bound_variable_dominates_filters() {
        let (qg, mut exps) = pattern();
        let mut filters = FilterSummary::new();
        filters.add_independent("a");
        let bound: HashSet<String> = ["c".to_string()].into();

        order_expressions(&qg, &mut exps, Some(&filters), Some(&bound));
        // entered from the bound end; e2 runs first, transposed so its
        // source is the resolved alias
        assert_eq!(exps[0].edge(), Some("e2"));
        assert_eq!(exps[0].source(), "c");
    }

    #[test]
    fn test_out_of_order_expression_is_transposed() {
        let mut qg = QueryGraph::new();
        qg.add_node("a", &["A", "A2"]);
        qg.add_node("b", &[]);
        qg.add_node("c", &[]);
        qg.add_edge("e1", "a", "b", &["R"]);
        qg.add_edge("e2", "c", "b", &["R"]);
        // both expressions point into b; whichever runs second must be
        // transposed so its source (b) is resolved
        let mut exps = vec![expr("a", "b", "e1"), expr("c", "b", "e2")];

        order_expressions(&qg, &mut exps, None, None);
        assert_eq!(exps[0].source(), "a");
        assert_eq!(exps[1].source(), "b");
        assert!(exps[1].transposed());
    }

    #[test]
    fn test_entry_point_label_tiebreak() {
        let mut qg = QueryGraph::new();
        qg.add_node("a", &[]);
        qg.add_node("b", &["B", "B2"]);
        qg.add_edge("e1", "a", "b", &["R"]);
        let mut exps = vec![expr("a", "b", "e1")];

        // destination carries more labels: enter from it
        order_expressions(&qg, &mut exps, None, None);
        assert!(exps[0].transposed());
        assert_eq!(exps[0].source(), "b");
    }

    #[test]
    fn test_var_len_scores_between_neighbors() {
        let mut qg = QueryGraph::new();
        qg.add_node("a", &["A"]);
        qg.add_node("b", &["B"]);
        qg.add_var_len_edge("e", "a", "b", &["R"], 1, 4);
        let exps = vec![
            AlgebraicExpression::new_operand(true, "a", "a", None, Some("A")),
            expr("a", "b", "e"),
            AlgebraicExpression::new_operand(true, "b", "b", None, Some("B")),
        ];
        let mut filters = FilterSummary::new();
        filters.add_independent("e");

        let scores = score_expressions(&exps, &qg, Some(&filters), None);
        assert!(scores[1] < scores[0].max(scores[2]));
    }
}
