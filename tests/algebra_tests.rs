//! Algebraic Expression & Traversal Ordering Integration Tests
//!
//! Tests for:
//! - Expression construction, domains, transposition round-trips
//! - Operand resolution against a live graph store
//! - Redundant operand elimination across expressions
//! - Expression ordering with filters and bound variables

use deltagraph::algebra::{
    order_expressions, remove_redundant_operands, AlgebraicExpression, FilterSummary, MatrixRef,
    Operation, QueryGraph,
};
use deltagraph::graph::Graph;
use std::collections::HashSet;

// ============================================================================
// Test Helpers
// ============================================================================

fn label_operand(alias: &str, label: &str) -> AlgebraicExpression {
    AlgebraicExpression::new_operand(true, alias, alias, None, Some(label))
}

fn relation_operand(src: &str, dest: &str, edge: &str, rel: &str) -> AlgebraicExpression {
    AlgebraicExpression::new_operand(false, src, dest, Some(edge), Some(rel))
}

/// L_a * R_e1 * L_b
fn labeled_hop(src: &str, src_label: &str, dest: &str, dest_label: &str, edge: &str) -> AlgebraicExpression {
    let mut mul = AlgebraicExpression::new_operation(Operation::Mul);
    mul.add_child(label_operand(src, src_label));
    mul.add_child(relation_operand(src, dest, edge, "R"));
    mul.add_child(label_operand(dest, dest_label));
    mul
}

// ============================================================================
// Structure & Transposition
// ============================================================================

#[test]
fn test_double_transpose_is_structurally_identity() {
    let exp = labeled_hop("a", "A", "b", "B", "e");
    let printed = format!("{exp:?}");

    let mut t = exp;
    t.transpose();
    t.transpose();
    assert_eq!(format!("{t:?}"), printed);
}

#[test]
fn test_source_of_transpose_is_destination() {
    let mut exp = labeled_hop("a", "A", "b", "B", "e");
    let (src, dest) = (exp.source().to_string(), exp.destination().to_string());
    exp.transpose();
    assert_eq!(exp.source(), dest);
    assert_eq!(exp.destination(), src);
}

#[test]
fn test_add_preserves_left_domain() {
    let mut add = AlgebraicExpression::new_operation(Operation::Add);
    add.add_child(relation_operand("a", "b", "e1", "R"));
    add.add_child(relation_operand("a", "b", "e2", "S"));
    assert_eq!(add.source(), "a");
    assert_eq!(add.destination(), "b");
    assert_eq!(add.operation_count(Operation::Add), 1);
}

// ============================================================================
// Operand Resolution
// ============================================================================

#[test]
fn test_populate_resolves_known_schema() {
    let mut g = Graph::new("resolve");
    let person = g.add_label("Person");
    let knows = g.add_relation("KNOWS");

    let mut exp = AlgebraicExpression::new_operation(Operation::Mul);
    exp.add_child(label_operand("a", "Person"));
    exp.add_child(relation_operand("a", "b", "e", "KNOWS"));
    exp.populate_operands(&g);

    let label = exp.operand(0).expect("label operand");
    assert_eq!(label.matrix, MatrixRef::Label(person));
    let rel = exp.operand(1).expect("relation operand");
    assert_eq!(
        rel.matrix,
        MatrixRef::Relation {
            id: knows,
            transposed: false
        }
    );
}

#[test]
fn test_populate_missing_schema_is_zero() {
    let g = Graph::new("empty");
    let mut exp = label_operand("a", "Ghost");
    exp.populate_operands(&g);
    assert_eq!(exp.operand(0).expect("operand").matrix, MatrixRef::Zero);
}

#[test]
fn test_populate_folds_transpose_into_operand() {
    let mut g = Graph::new("transposed");
    let knows = g.add_relation("KNOWS");

    let mut exp = relation_operand("a", "b", "e", "KNOWS");
    exp.transpose();
    exp.populate_operands(&g);

    // the explicit transpose node is gone, replaced by a transposed
    // operand with swapped domains
    assert_eq!(exp.operation_count(Operation::Transpose), 0);
    let op = exp.operand(0).expect("operand");
    assert_eq!(
        op.matrix,
        MatrixRef::Relation {
            id: knows,
            transposed: true
        }
    );
    assert_eq!((op.src.as_str(), op.dest.as_str()), ("b", "a"));
}

#[test]
fn test_populate_unlabeled_operand_uses_adjacency() {
    let g = Graph::new("adj");
    let mut exp = AlgebraicExpression::new_operand(false, "a", "b", None, None);
    exp.populate_operands(&g);
    assert_eq!(
        exp.operand(0).expect("operand").matrix,
        MatrixRef::Adjacency { transposed: false }
    );
}

#[test]
fn test_populate_is_idempotent() {
    let mut g = Graph::new("idem");
    g.add_relation("KNOWS");
    let mut exp = relation_operand("a", "b", "e", "KNOWS");
    exp.populate_operands(&g);
    let resolved = exp.operand(0).expect("operand").matrix;

    // later registrations must not rewrite resolved operands
    g.add_relation("OTHER");
    exp.populate_operands(&g);
    assert_eq!(exp.operand(0).expect("operand").matrix, resolved);
}

// ============================================================================
// Redundant Operand Elimination
// ============================================================================

#[test]
fn test_shared_alias_label_dropped_from_later_expression() {
    let mut qg = QueryGraph::new();
    qg.add_node("a", &["A"]);
    qg.add_node("b", &["B"]);
    qg.add_node("c", &["C"]);
    qg.add_edge("e1", "a", "b", &["R"]);
    qg.add_edge("e2", "b", "c", &["R"]);

    let mut exps = vec![
        labeled_hop("a", "A", "b", "B", "e1"),
        labeled_hop("b", "B", "c", "C", "e2"),
    ];
    remove_redundant_operands(&mut exps, &qg);

    assert_eq!(exps.len(), 2);
    // the second expression lost its leading B label operand
    assert_eq!(exps[1].operand_count(), 2);
    assert!(!exps[1].src_operand().diagonal);
    // the first expression is untouched
    assert_eq!(exps[0].operand_count(), 3);
}

#[test]
fn test_expression_reduced_to_nothing_is_removed() {
    let mut qg = QueryGraph::new();
    qg.add_node("a", &["A"]);
    qg.add_node("b", &["B"]);
    qg.add_edge("e1", "a", "b", &["R"]);

    // second expression is only b's label, already resolved by the first
    let mut exps = vec![labeled_hop("a", "A", "b", "B", "e1"), label_operand("b", "B")];
    remove_redundant_operands(&mut exps, &qg);
    assert_eq!(exps.len(), 1);
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_filtered_alias_becomes_entry_point() {
    let mut qg = QueryGraph::new();
    qg.add_node("a", &[]);
    qg.add_node("b", &[]);
    qg.add_node("c", &[]);
    qg.add_edge("e1", "a", "b", &["R"]);
    qg.add_edge("e2", "b", "c", &["R"]);

    let mut exps = vec![
        relation_operand("b", "c", "e2", "R"),
        relation_operand("a", "b", "e1", "R"),
    ];
    let mut filters = FilterSummary::new();
    filters.add_independent("a");

    order_expressions(&qg, &mut exps, Some(&filters), None);

    // the expression whose source carries the filter runs first and the
    // chain stays source-resolved
    assert_eq!(exps[0].source(), "a");
    assert_eq!(exps[0].edge(), Some("e1"));
    assert_eq!(exps[1].source(), "b");
}

#[test]
fn test_entry_point_transposed_when_destination_wins() {
    let mut qg = QueryGraph::new();
    qg.add_node("a", &[]);
    qg.add_node("b", &["B", "B2"]);
    qg.add_edge("e1", "a", "b", &["R"]);

    let mut exps = vec![relation_operand("a", "b", "e1", "R")];
    order_expressions(&qg, &mut exps, None, None);

    assert!(exps[0].transposed());
    assert_eq!(exps[0].source(), "b");
}

#[test]
fn test_entry_point_kept_when_source_outscores() {
    let mut qg = QueryGraph::new();
    qg.add_node("a", &["A", "A2"]);
    qg.add_node("b", &["B"]);
    qg.add_edge("e1", "a", "b", &["R"]);

    let mut exps = vec![relation_operand("a", "b", "e1", "R")];
    order_expressions(&qg, &mut exps, None, None);

    assert!(!exps[0].transposed());
    assert_eq!(exps[0].source(), "a");
}

#[test]
fn test_bound_variable_outranks_label_and_filter() {
    let mut qg = QueryGraph::new();
    qg.add_node("a", &["A", "A2", "A3"]);
    qg.add_node("b", &[]);
    qg.add_node("c", &[]);
    qg.add_edge("e1", "a", "b", &["R"]);
    qg.add_edge("e2", "b", "c", &["R"]);

    let mut exps = vec![
        relation_operand("a", "b", "e1", "R"),
        relation_operand("b", "c", "e2", "R"),
    ];
    let mut filters = FilterSummary::new();
    filters.add_independent("a");
    let bound: HashSet<String> = ["c".to_string()].into();

    order_expressions(&qg, &mut exps, Some(&filters), Some(&bound));

    // the bound end wins the arrangement and the walk enters from it
    assert_eq!(exps[0].edge(), Some("e2"));
    assert_eq!(exps[0].source(), "c");
    // the follow-up expression is reachable from the opening one
    let resolved: Vec<&str> = vec![exps[0].source(), exps[0].destination()];
    assert!(resolved.contains(&exps[1].source()));
}
