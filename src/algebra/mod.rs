//! # Algebraic Expressions
//!
//! A query traversal segment is represented as a tree of operations
//! (`Mul`, `Add`, `Transpose`) over matrix operands. Each operand names
//! the query aliases its rows and columns stand for (its domain), an
//! optional edge alias, and an optional label used at resolution time;
//! [`AlgebraicExpression::populate_operands`] resolves operands to
//! concrete matrix handles against the graph store, folding transpose
//! operations into transposed operands as it goes.
//!
//! ## Example
//!
//! ```rust
//! use deltagraph::algebra::{AlgebraicExpression, Operation};
//!
//! // (a)-[e]->(b): L_a * R_e, domains read left to right
//! let mut mul = AlgebraicExpression::new_operation(Operation::Mul);
//! mul.add_child(AlgebraicExpression::new_operand(true, "a", "a", None, Some("Person")));
//! mul.add_child(AlgebraicExpression::new_operand(false, "a", "b", Some("e"), Some("KNOWS")));
//! assert_eq!(mul.source(), "a");
//! assert_eq!(mul.destination(), "b");
//! ```

pub mod order;
pub mod query_graph;

pub use order::{order_expressions, FilterSummary};
pub use query_graph::{QueryEdge, QueryGraph, QueryNode};

use crate::graph::Graph;
use crate::ids::{LabelId, RelationId};

/// Operation kinds of internal tree nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Mul,
    Add,
    Transpose,
}

/// Resolved matrix handle of an operand. `Unset` before resolution; the
/// runtime operator fetches the actual matrix guard from the graph store
/// through this descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixRef {
    #[default]
    Unset,
    Adjacency {
        transposed: bool,
    },
    Label(LabelId),
    Relation {
        id: RelationId,
        transposed: bool,
    },
    /// Shared all-absent matrix standing in for missing schema
    Zero,
}

/// Leaf of an algebraic expression.
#[derive(Debug, Clone)]
pub struct Operand {
    pub matrix: MatrixRef,
    /// Label matrices are diagonal
    pub diagonal: bool,
    /// Row domain: the alias the rows refer to
    pub src: String,
    /// Column domain: the alias the columns refer to
    pub dest: String,
    /// Edge alias for relation operands
    pub edge: Option<String>,
    /// Label or relation name, resolved at populate time
    pub label: Option<String>,
}

/// Tree of operations over matrix operands.
#[derive(Debug, Clone)]
pub enum AlgebraicExpression {
    Operation {
        op: Operation,
        children: Vec<AlgebraicExpression>,
    },
    Operand(Operand),
}

use AlgebraicExpression::{Operand as OperandNode, Operation as OperationNode};

impl AlgebraicExpression {
    pub fn new_operation(op: Operation) -> Self {
        OperationNode {
            op,
            children: Vec::new(),
        }
    }

    pub fn new_operand(
        diagonal: bool,
        src: &str,
        dest: &str,
        edge: Option<&str>,
        label: Option<&str>,
    ) -> Self {
        OperandNode(Operand {
            matrix: MatrixRef::Unset,
            diagonal,
            src: src.to_string(),
            dest: dest.to_string(),
            edge: edge.map(str::to_string),
            label: label.map(str::to_string),
        })
    }

    pub fn is_operand(&self) -> bool {
        matches!(self, OperandNode(_))
    }

    /// Append a child to an operation node.
    pub fn add_child(&mut self, child: AlgebraicExpression) {
        match self {
            OperationNode { children, .. } => children.push(child),
            OperandNode(_) => debug_assert!(false, "operands cannot have children"),
        }
    }

    pub fn child_count(&self) -> usize {
        match self {
            OperationNode { children, .. } => children.len(),
            OperandNode(_) => 0,
        }
    }

    pub fn operand_count(&self) -> usize {
        match self {
            OperandNode(_) => 1,
            OperationNode { children, .. } => children.iter().map(Self::operand_count).sum(),
        }
    }

    /// Count operation nodes of the given kind.
    pub fn operation_count(&self, kind: Operation) -> usize {
        match self {
            OperandNode(_) => 0,
            OperationNode { op, children } => {
                let own = usize::from(*op == kind);
                own + children
                    .iter()
                    .map(|c| c.operation_count(kind))
                    .sum::<usize>()
            }
        }
    }

    pub fn contains_op(&self, kind: Operation) -> bool {
        match self {
            OperandNode(_) => false,
            OperationNode { op, children } => {
                *op == kind || children.iter().any(|c| c.contains_op(kind))
            }
        }
    }

    fn source_inner(&self, transposed: bool) -> &str {
        match self {
            OperandNode(o) => {
                if transposed {
                    &o.dest
                } else {
                    &o.src
                }
            }
            OperationNode { op, children } => {
                debug_assert!(!children.is_empty());
                match op {
                    // addition domain follows the left child regardless
                    Operation::Add => children[0].source_inner(transposed),
                    Operation::Mul => {
                        if transposed {
                            children[children.len() - 1].source_inner(transposed)
                        } else {
                            children[0].source_inner(transposed)
                        }
                    }
                    Operation::Transpose => children[0].source_inner(!transposed),
                }
            }
        }
    }

    /// Row domain of the whole expression.
    pub fn source(&self) -> &str {
        self.source_inner(false)
    }

    /// Column domain of the whole expression.
    pub fn destination(&self) -> &str {
        self.source_inner(true)
    }

    /// True iff an odd number of transpose operations wrap the entire
    /// expression.
    pub fn transposed(&self) -> bool {
        let mut flipped = false;
        let mut current = self;
        while let OperationNode {
            op: Operation::Transpose,
            children,
        } = current
        {
            flipped = !flipped;
            current = &children[0];
        }
        flipped
    }

    /// First edge alias mentioned by any operand.
    pub fn edge(&self) -> Option<&str> {
        match self {
            OperandNode(o) => o.edge.as_deref(),
            OperationNode { children, .. } => children.iter().find_map(Self::edge),
        }
    }

    /// Operand at `idx`, left to right.
    pub fn operand(&self, idx: usize) -> Option<&Operand> {
        fn walk<'a>(exp: &'a AlgebraicExpression, idx: usize, seen: &mut usize) -> Option<&'a Operand> {
            match exp {
                OperandNode(o) => {
                    if *seen == idx {
                        return Some(o);
                    }
                    *seen += 1;
                    None
                }
                OperationNode { children, .. } => {
                    children.iter().find_map(|c| walk(c, idx, seen))
                }
            }
        }
        walk(self, idx, &mut 0)
    }

    /// Is the operand at `idx` a diagonal (label) matrix?
    pub fn diagonal_operand(&self, idx: usize) -> bool {
        self.operand(idx).is_some_and(|o| o.diagonal)
    }

    fn end_operand(&self, src: bool, transposed: bool) -> &Operand {
        match self {
            OperandNode(o) => o,
            OperationNode { op, children } => {
                debug_assert!(!children.is_empty());
                match op {
                    Operation::Transpose => children[0].end_operand(src, !transposed),
                    Operation::Add => children[if src { 0 } else { children.len() - 1 }]
                        .end_operand(src, transposed),
                    Operation::Mul => {
                        let first = src != transposed;
                        children[if first { 0 } else { children.len() - 1 }]
                            .end_operand(src, transposed)
                    }
                }
            }
        }
    }

    /// The operand resolving the expression's source.
    pub fn src_operand(&self) -> &Operand {
        self.end_operand(true, false)
    }

    /// The operand resolving the expression's destination.
    pub fn dest_operand(&self) -> &Operand {
        self.end_operand(false, false)
    }

    /// Locate an operand by row domain, column domain, and edge alias;
    /// `None` criteria match anything.
    pub fn locate_operand(
        &self,
        src: Option<&str>,
        dest: Option<&str>,
        edge: Option<&str>,
    ) -> Option<&Operand> {
        match self {
            OperandNode(o) => {
                let hit = src.is_none_or(|s| o.src == s)
                    && dest.is_none_or(|d| o.dest == d)
                    && edge.is_none_or(|e| o.edge.as_deref() == Some(e));
                hit.then_some(o)
            }
            OperationNode { children, .. } => children
                .iter()
                .find_map(|c| c.locate_operand(src, dest, edge)),
        }
    }

    /// Wrap with a transpose, or unwrap an existing outer transpose; two
    /// applications restore the original tree.
    pub fn transpose(&mut self) {
        if let OperationNode {
            op: Operation::Transpose,
            children,
        } = self
        {
            debug_assert_eq!(children.len(), 1);
            let child = children.pop().unwrap_or_else(|| unreachable!());
            *self = child;
            return;
        }
        let inner = std::mem::replace(self, Self::new_operation(Operation::Transpose));
        self.add_child(inner);
    }

    //--------------------------------------------------------------------------
    // operand removal
    //--------------------------------------------------------------------------

    fn remove_end(self, src: bool, transposed: bool) -> (Option<Self>, Self) {
        match self {
            OperandNode(_) => (None, self),
            OperationNode { op, mut children } => {
                debug_assert!(!children.is_empty());
                let pick_first = match op {
                    Operation::Transpose => true,
                    // addition order is unaffected by transposition
                    Operation::Add => src,
                    Operation::Mul => src != transposed,
                };
                let idx = if pick_first { 0 } else { children.len() - 1 };
                let child = children.remove(idx);

                let next_transposed = if op == Operation::Transpose {
                    !transposed
                } else {
                    transposed
                };
                let (replacement, removed) = child.remove_end(src, next_transposed);

                if let Some(replacement) = replacement {
                    children.insert(idx, replacement);
                }

                match children.len() {
                    // a transpose left with no child is freed
                    0 => (None, removed),
                    // a binary node left with a single child collapses into it
                    1 if op != Operation::Transpose => {
                        let only = children
                            .pop()
                            .unwrap_or_else(|| unreachable!("length checked"));
                        (Some(only), removed)
                    }
                    _ => (Some(OperationNode { op, children }), removed),
                }
            }
        }
    }

    /// Pop the source-end operand; returns `(new_root, removed)`. The
    /// root becomes `None` when the expression was a lone operand (or
    /// transposes of one).
    pub fn remove_source(self) -> (Option<Self>, Self) {
        self.remove_end(true, false)
    }

    /// Pop the destination-end operand.
    pub fn remove_destination(self) -> (Option<Self>, Self) {
        self.remove_end(false, false)
    }

    fn remove_end_child(self, src: bool) -> (Option<Self>, Self) {
        match self {
            OperandNode(_) => (None, self),
            OperationNode { op, mut children } => {
                debug_assert!(!children.is_empty());
                if op == Operation::Transpose {
                    let child = children.remove(0);
                    let (replacement, removed) = child.remove_end_child(!src);
                    return match replacement {
                        Some(r) => {
                            children.insert(0, r);
                            (Some(OperationNode { op, children }), removed)
                        }
                        None => (None, removed),
                    };
                }

                let idx = if src { 0 } else { children.len() - 1 };
                let removed = children.remove(idx);
                match children.len() {
                    0 => (None, removed),
                    1 => {
                        let only = children
                            .pop()
                            .unwrap_or_else(|| unreachable!("length checked"));
                        (Some(only), removed)
                    }
                    _ => (Some(OperationNode { op, children }), removed),
                }
            }
        }
    }

    /// Pop the source-end direct child, operand or operation, without
    /// descending into nested operations. Planners use this to peel off
    /// whole sub-expressions.
    pub fn remove_source_op(self) -> (Option<Self>, Self) {
        self.remove_end_child(true)
    }

    /// Destination-end counterpart of
    /// [`AlgebraicExpression::remove_source_op`].
    pub fn remove_destination_op(self) -> (Option<Self>, Self) {
        self.remove_end_child(false)
    }

    //--------------------------------------------------------------------------
    // tree growth
    //--------------------------------------------------------------------------

    fn wrap_binary(self, op: Operation, other: Self, other_on_left: bool) -> Self {
        let mut node = Self::new_operation(op);
        if other_on_left {
            node.add_child(other);
            node.add_child(self);
        } else {
            node.add_child(self);
            node.add_child(other);
        }
        node
    }

    /// `m * self`; the new operand inherits the source-end domain.
    pub fn multiply_to_left(self, m: MatrixRef) -> Self {
        let src = self.source().to_string();
        let mut operand = Self::new_operand(false, &src, &src, None, None);
        if let OperandNode(o) = &mut operand {
            o.matrix = m;
        }
        self.wrap_binary(Operation::Mul, operand, true)
    }

    /// `self * m`; the new operand inherits the destination-end domain.
    pub fn multiply_to_right(self, m: MatrixRef) -> Self {
        let dest = self.destination().to_string();
        let mut operand = Self::new_operand(false, &dest, &dest, None, None);
        if let OperandNode(o) = &mut operand {
            o.matrix = m;
        }
        self.wrap_binary(Operation::Mul, operand, false)
    }

    /// `m + self`; the new operand inherits both domains and the edge.
    pub fn add_to_left(self, m: MatrixRef) -> Self {
        let src = self.source().to_string();
        let dest = self.destination().to_string();
        let edge = self.edge().map(str::to_string);
        let mut operand = Self::new_operand(false, &src, &dest, edge.as_deref(), None);
        if let OperandNode(o) = &mut operand {
            o.matrix = m;
        }
        self.wrap_binary(Operation::Add, operand, true)
    }

    /// `self + m`.
    pub fn add_to_right(self, m: MatrixRef) -> Self {
        let src = self.source().to_string();
        let dest = self.destination().to_string();
        let edge = self.edge().map(str::to_string);
        let mut operand = Self::new_operand(false, &src, &dest, edge.as_deref(), None);
        if let OperandNode(o) = &mut operand {
            o.matrix = m;
        }
        self.wrap_binary(Operation::Add, operand, false)
    }

    //--------------------------------------------------------------------------
    // operand resolution
    //--------------------------------------------------------------------------

    fn populate_plain(operand: &mut Operand, graph: &Graph) {
        // idempotent: matrices set prior are never overwritten
        if operand.matrix != MatrixRef::Unset {
            return;
        }

        operand.matrix = match &operand.label {
            None => MatrixRef::Adjacency { transposed: false },
            Some(label) if operand.diagonal => graph
                .schema()
                .label_id(label)
                .map_or(MatrixRef::Zero, MatrixRef::Label),
            Some(label) => graph
                .schema()
                .relation_id(label)
                .map_or(MatrixRef::Zero, |id| MatrixRef::Relation {
                    id,
                    transposed: false,
                }),
        };
    }

    fn populate_transposed(operand: &mut Operand, graph: &Graph) {
        // the transposed operand swaps its row and column domains
        std::mem::swap(&mut operand.src, &mut operand.dest);

        // a diagonal matrix is its own transpose
        if operand.diagonal {
            Self::populate_plain(operand, graph);
            return;
        }

        if operand.matrix != MatrixRef::Unset {
            return;
        }

        operand.matrix = match &operand.label {
            None => MatrixRef::Adjacency { transposed: true },
            Some(label) => graph
                .schema()
                .relation_id(label)
                .map_or(MatrixRef::Zero, |id| MatrixRef::Relation {
                    id,
                    transposed: true,
                }),
        };
    }

    /// Resolve every operand's matrix handle against the graph store,
    /// rewriting `Transpose(operand)` into a transposed operand with
    /// swapped domains.
    pub fn populate_operands(&mut self, graph: &Graph) {
        match self {
            OperationNode {
                op: Operation::Transpose,
                children,
            } => {
                debug_assert_eq!(children.len(), 1);
                match children.pop() {
                    Some(OperandNode(mut operand)) => {
                        Self::populate_transposed(&mut operand, graph);
                        *self = OperandNode(operand);
                    }
                    Some(mut child) => {
                        // nested operation under the transpose: recurse
                        // and keep the explicit transpose node
                        child.populate_operands(graph);
                        children.push(child);
                    }
                    None => {}
                }
            }
            OperationNode { children, .. } => {
                for child in children.iter_mut() {
                    child.populate_operands(graph);
                }
            }
            OperandNode(operand) => Self::populate_plain(operand, graph),
        }
    }
}

/// Drop label operands already resolved by an earlier expression.
///
/// When expression `J` resolves alias `x` through a label operand at its
/// destination, a later expression `I` whose source is `x` does not need
/// its own leading label operands for `x`; they are removed, and an
/// expression reduced to nothing is deleted from the list.
pub fn remove_redundant_operands(
    exps: &mut Vec<AlgebraicExpression>,
    qg: &QueryGraph,
) {
    if exps.len() < 2 {
        return;
    }

    let mut i = 1;
    while i < exps.len() {
        let src_alias = exps[i].source().to_string();
        let leading_diagonal = exps[i].src_operand().diagonal;
        if !leading_diagonal {
            i += 1;
            continue;
        }

        let label_count = qg.label_count(&src_alias);
        debug_assert!(label_count > 0);

        // is the source alias resolved by a previous label operand?
        let resolved = exps[..i].iter().rev().any(|prev| {
            prev.destination() == src_alias && prev.dest_operand().diagonal
        });
        if !resolved {
            i += 1;
            continue;
        }

        let mut exp = Some(
            std::mem::replace(&mut exps[i], AlgebraicExpression::new_operation(Operation::Mul)),
        );
        for _ in 0..label_count {
            match exp.take() {
                Some(e) => {
                    let (rest, _removed) = e.remove_source();
                    exp = rest;
                }
                None => break,
            }
        }

        match exp {
            Some(e) => {
                exps[i] = e;
                i += 1;
            }
            None => {
                // reduced to an empty expression, drop it
                exps.remove(i);
            }
        }
    }
}
