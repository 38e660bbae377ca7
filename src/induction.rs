//! Induction classification store
//!
//! The classification pass itself lives outside this crate; what lives here
//! is its result store and the narrow mutation interface the range analyzer
//! consumes. Induction descriptions are finite trees (sharing is allowed,
//! cycles are not) held in a handle-indexed arena, keyed per loop by the
//! classified instruction. A pluggable [`Classifier`] re-populates a single
//! loop after invalidation.

use crate::ir::{Graph, InstrId, IntType, LoopId};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// Handle of an induction description node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoId(pub u32);

/// Loop-invariant operator nodes
///
/// Comparisons only appear in taken-test expressions; the evaluator treats
/// them as unbounded and only the code generator re-emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantOp {
    Add(InfoId, InfoId),
    Sub(InfoId, InfoId),
    Neg(InfoId),
    Mul(InfoId, InfoId),
    Div(InfoId, InfoId),
    Rem(InfoId, InfoId),
    Xor(InfoId, InfoId),
    Lt(InfoId, InfoId),
    Le(InfoId, InfoId),
    Gt(InfoId, InfoId),
    Ge(InfoId, InfoId),
    /// Reference to an IR value that is invariant in the classified loop
    Fetch(InstrId),
    Constant(i64),
    /// Type conversion; destination type is the node's, source the child's
    Convert(InfoId),
}

/// Whether a geometric induction multiplies or divides by its ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometricOp {
    Mul,
    Div,
}

/// Induction description node payload
///
/// Induction forms are classified against exactly one loop, the one whose
/// store entry points at them; their children are invariants of that loop
/// or lower-order forms of the same loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoKind {
    Invariant(InvariantOp),
    /// `stride * k + offset` over the loop counter `k`
    Linear { stride: InfoId, offset: InfoId },
    /// Running sum of a linear sequence, plus an invariant start value
    Polynomial { sum: InfoId, offset: InfoId },
    /// `scale * ratio^k + offset` (or `scale / ratio^k + offset`)
    Geometric {
        scale: InfoId,
        offset: InfoId,
        ratio: i64,
        op: GeometricOp,
    },
    /// `initial` on the first iteration, `body` afterwards
    WrapAround { initial: InfoId, body: InfoId },
    /// Cycles through its phases, one per iteration
    Periodic { phases: Vec<InfoId> },
}

/// An induction description node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoNode {
    pub kind: InfoKind,
    pub ty: IntType,
}

/// Trip-count tags; absence of a [`Trip`] entry is the unknown case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripKind {
    /// Exact count known at compile time
    Constant,
    /// Terminates on every entry, count possibly symbolic
    Finite,
    /// Count valid only once the body has executed (post-test loops)
    Body,
    /// The count expression itself may overflow
    Unsafe,
}

/// Trip-count description of a loop
#[derive(Debug, Clone)]
pub struct Trip {
    /// Expression computing the number of back-edge executions
    pub count: InfoId,
    /// Predicate for "the body executes at least once", when one is needed
    pub taken_test: Option<InfoId>,
    pub kind: TripKind,
}

/// Result store of the induction classification pass
#[derive(Debug, Default)]
pub struct InductionStore {
    nodes: Vec<InfoNode>,
    induction: HashMap<LoopId, HashMap<InstrId, InfoId>>,
    cycles: HashMap<InstrId, HashSet<InstrId>>,
    trips: HashMap<LoopId, Trip>,
}

impl InductionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, ty: IntType, kind: InfoKind) -> InfoId {
        let id = InfoId(self.nodes.len() as u32);
        self.nodes.push(InfoNode { kind, ty });
        id
    }

    pub fn node(&self, id: InfoId) -> &InfoNode {
        &self.nodes[id.0 as usize]
    }

    pub fn invariant(&mut self, ty: IntType, op: InvariantOp) -> InfoId {
        self.add(ty, InfoKind::Invariant(op))
    }

    pub fn constant(&mut self, ty: IntType, value: i64) -> InfoId {
        self.invariant(ty, InvariantOp::Constant(value))
    }

    pub fn fetch(&mut self, ty: IntType, instr: InstrId) -> InfoId {
        self.invariant(ty, InvariantOp::Fetch(instr))
    }

    pub fn linear(&mut self, ty: IntType, stride: InfoId, offset: InfoId) -> InfoId {
        self.add(ty, InfoKind::Linear { stride, offset })
    }

    pub fn polynomial(&mut self, ty: IntType, sum: InfoId, offset: InfoId) -> InfoId {
        self.add(ty, InfoKind::Polynomial { sum, offset })
    }

    pub fn geometric(
        &mut self,
        ty: IntType,
        scale: InfoId,
        offset: InfoId,
        ratio: i64,
        op: GeometricOp,
    ) -> InfoId {
        self.add(
            ty,
            InfoKind::Geometric {
                scale,
                offset,
                ratio,
                op,
            },
        )
    }

    pub fn wrap_around(&mut self, ty: IntType, initial: InfoId, body: InfoId) -> InfoId {
        self.add(ty, InfoKind::WrapAround { initial, body })
    }

    pub fn periodic(&mut self, ty: IntType, phases: Vec<InfoId>) -> InfoId {
        self.add(ty, InfoKind::Periodic { phases })
    }

    /// Record the classification of `instr` relative to `loop_id`
    pub fn classify(&mut self, loop_id: LoopId, instr: InstrId, info: InfoId) {
        self.induction.entry(loop_id).or_default().insert(instr, info);
    }

    pub fn lookup_info(&self, loop_id: LoopId, instr: InstrId) -> Option<InfoId> {
        self.induction.get(&loop_id)?.get(&instr).copied()
    }

    pub fn set_trip(&mut self, loop_id: LoopId, trip: Trip) {
        self.trips.insert(loop_id, trip);
    }

    pub fn trip(&self, loop_id: LoopId) -> Option<&Trip> {
        self.trips.get(&loop_id)
    }

    pub fn record_cycle(&mut self, phi: InstrId, members: HashSet<InstrId>) {
        self.cycles.insert(phi, members);
    }

    pub fn lookup_cycle(&self, phi: InstrId) -> Option<&HashSet<InstrId>> {
        self.cycles.get(&phi)
    }

    /// All description roots registered for a loop
    pub fn loop_infos(&self, loop_id: LoopId) -> Vec<InfoId> {
        self.induction
            .get(&loop_id)
            .map(|m| m.values().copied().collect())
            .unwrap_or_default()
    }

    /// Drop everything recorded for `loop_id` and its header phis
    pub fn invalidate(&mut self, loop_id: LoopId, header_phis: &[InstrId]) {
        self.induction.remove(&loop_id);
        self.trips.remove(&loop_id);
        for phi in header_phis {
            self.cycles.remove(phi);
        }
    }

    /// Rewrite every fetch of `old` reachable from `root` to fetch `new`
    ///
    /// Nodes may be shared between trees; `visited` makes the walk linear
    /// in the number of distinct reachable nodes.
    pub fn rewrite_fetch(
        &mut self,
        root: InfoId,
        old: InstrId,
        new: InstrId,
        visited: &mut HashSet<InfoId>,
    ) {
        if !visited.insert(root) {
            return;
        }
        for child in self.children(root) {
            self.rewrite_fetch(child, old, new, visited);
        }
        if let InfoKind::Invariant(InvariantOp::Fetch(instr)) =
            &mut self.nodes[root.0 as usize].kind
        {
            if *instr == old {
                *instr = new;
            }
        }
    }

    fn children(&self, id: InfoId) -> Vec<InfoId> {
        match &self.node(id).kind {
            InfoKind::Invariant(op) => match *op {
                InvariantOp::Add(a, b)
                | InvariantOp::Sub(a, b)
                | InvariantOp::Mul(a, b)
                | InvariantOp::Div(a, b)
                | InvariantOp::Rem(a, b)
                | InvariantOp::Xor(a, b)
                | InvariantOp::Lt(a, b)
                | InvariantOp::Le(a, b)
                | InvariantOp::Gt(a, b)
                | InvariantOp::Ge(a, b) => vec![a, b],
                InvariantOp::Neg(a) | InvariantOp::Convert(a) => vec![a],
                InvariantOp::Fetch(_) | InvariantOp::Constant(_) => Vec::new(),
            },
            InfoKind::Linear { stride, offset } => vec![*stride, *offset],
            InfoKind::Polynomial { sum, offset } => vec![*sum, *offset],
            InfoKind::Geometric { scale, offset, .. } => vec![*scale, *offset],
            InfoKind::WrapAround { initial, body } => vec![*initial, *body],
            InfoKind::Periodic { phases } => phases.clone(),
        }
    }

    /// Structural equality of two description trees
    pub fn info_equal(&self, a: InfoId, b: InfoId) -> bool {
        if a == b {
            return true;
        }
        let na = self.node(a);
        let nb = self.node(b);
        if na.ty != nb.ty {
            return false;
        }
        match (&na.kind, &nb.kind) {
            (InfoKind::Invariant(x), InfoKind::Invariant(y)) => self.invariant_equal(*x, *y),
            (
                InfoKind::Linear {
                    stride: s1,
                    offset: o1,
                },
                InfoKind::Linear {
                    stride: s2,
                    offset: o2,
                },
            ) => self.info_equal(*s1, *s2) && self.info_equal(*o1, *o2),
            (
                InfoKind::Polynomial { sum: s1, offset: o1 },
                InfoKind::Polynomial { sum: s2, offset: o2 },
            ) => self.info_equal(*s1, *s2) && self.info_equal(*o1, *o2),
            (
                InfoKind::Geometric {
                    scale: a1,
                    offset: o1,
                    ratio: r1,
                    op: p1,
                },
                InfoKind::Geometric {
                    scale: a2,
                    offset: o2,
                    ratio: r2,
                    op: p2,
                },
            ) => {
                r1 == r2 && p1 == p2 && self.info_equal(*a1, *a2) && self.info_equal(*o1, *o2)
            }
            (
                InfoKind::WrapAround {
                    initial: i1,
                    body: b1,
                },
                InfoKind::WrapAround {
                    initial: i2,
                    body: b2,
                },
            ) => self.info_equal(*i1, *i2) && self.info_equal(*b1, *b2),
            (InfoKind::Periodic { phases: p1 }, InfoKind::Periodic { phases: p2 }) => {
                p1.len() == p2.len()
                    && p1.iter().zip(p2).all(|(&x, &y)| self.info_equal(x, y))
            }
            _ => false,
        }
    }

    fn invariant_equal(&self, x: InvariantOp, y: InvariantOp) -> bool {
        use InvariantOp::*;
        match (x, y) {
            (Add(a1, b1), Add(a2, b2))
            | (Sub(a1, b1), Sub(a2, b2))
            | (Mul(a1, b1), Mul(a2, b2))
            | (Div(a1, b1), Div(a2, b2))
            | (Rem(a1, b1), Rem(a2, b2))
            | (Xor(a1, b1), Xor(a2, b2))
            | (Lt(a1, b1), Lt(a2, b2))
            | (Le(a1, b1), Le(a2, b2))
            | (Gt(a1, b1), Gt(a2, b2))
            | (Ge(a1, b1), Ge(a2, b2)) => self.info_equal(a1, a2) && self.info_equal(b1, b2),
            (Neg(a1), Neg(a2)) | (Convert(a1), Convert(a2)) => self.info_equal(a1, a2),
            (Fetch(i1), Fetch(i2)) => i1 == i2,
            (Constant(c1), Constant(c2)) => c1 == c2,
            _ => false,
        }
    }
}

/// Incremental re-classification hook
///
/// `ReVisit` drops a loop's entries and hands the loop back to whatever
/// produced them. Implemented for closures so hosts and tests can install
/// one without a named type.
pub trait Classifier {
    fn visit_loop(&mut self, graph: &Graph, loop_id: LoopId, store: &mut InductionStore);
}

impl<F> Classifier for F
where
    F: FnMut(&Graph, LoopId, &mut InductionStore),
{
    fn visit_loop(&mut self, graph: &Graph, loop_id: LoopId, store: &mut InductionStore) {
        self(graph, loop_id, store)
    }
}

/// The classification store together with its re-classification hook
#[derive(Default)]
pub struct InductionVarAnalysis {
    pub store: InductionStore,
    classifier: Option<Box<dyn Classifier>>,
}

impl InductionVarAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(classifier: Box<dyn Classifier>) -> Self {
        Self {
            store: InductionStore::new(),
            classifier: Some(classifier),
        }
    }

    pub fn set_classifier(&mut self, classifier: Box<dyn Classifier>) {
        self.classifier = Some(classifier);
    }

    /// Run the classifier over a single loop, if one is installed
    pub fn visit_loop(&mut self, graph: &Graph, loop_id: LoopId) {
        if let Some(classifier) = self.classifier.as_mut() {
            classifier.visit_loop(graph, loop_id, &mut self.store);
        }
    }

    pub fn lookup_info(&self, loop_id: LoopId, instr: InstrId) -> Option<InfoId> {
        self.store.lookup_info(loop_id, instr)
    }

    pub fn trip(&self, loop_id: LoopId) -> Option<&Trip> {
        self.store.trip(loop_id)
    }

    pub fn lookup_cycle(&self, phi: InstrId) -> Option<&HashSet<InstrId>> {
        self.store.lookup_cycle(phi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IntType;

    #[test]
    fn classify_and_lookup_round_trip() {
        let mut store = InductionStore::new();
        let one = store.constant(IntType::I32, 1);
        let zero = store.constant(IntType::I32, 0);
        let linear = store.linear(IntType::I32, one, zero);
        store.classify(LoopId(0), InstrId(5), linear);
        assert_eq!(store.lookup_info(LoopId(0), InstrId(5)), Some(linear));
        assert_eq!(store.lookup_info(LoopId(0), InstrId(6)), None);
        assert_eq!(store.lookup_info(LoopId(1), InstrId(5)), None);
    }

    #[test]
    fn invalidate_drops_loop_entries_and_phi_cycles() {
        let mut store = InductionStore::new();
        let c = store.constant(IntType::I32, 3);
        store.classify(LoopId(0), InstrId(1), c);
        store.set_trip(
            LoopId(0),
            Trip {
                count: c,
                taken_test: None,
                kind: TripKind::Finite,
            },
        );
        let mut cycle = HashSet::default();
        cycle.insert(InstrId(2));
        store.record_cycle(InstrId(1), cycle);

        store.invalidate(LoopId(0), &[InstrId(1)]);
        assert_eq!(store.lookup_info(LoopId(0), InstrId(1)), None);
        assert!(store.trip(LoopId(0)).is_none());
        assert!(store.lookup_cycle(InstrId(1)).is_none());
    }

    #[test]
    fn rewrite_fetch_visits_shared_nodes_once() {
        let mut store = InductionStore::new();
        let fetch = store.fetch(IntType::I32, InstrId(7));
        let one = store.constant(IntType::I32, 1);
        // Two parents sharing the same fetch leaf.
        let left = store.invariant(IntType::I32, InvariantOp::Add(fetch, one));
        let root = store.invariant(IntType::I32, InvariantOp::Sub(left, fetch));

        let mut visited = HashSet::default();
        store.rewrite_fetch(root, InstrId(7), InstrId(9), &mut visited);
        assert_eq!(
            store.node(fetch).kind,
            InfoKind::Invariant(InvariantOp::Fetch(InstrId(9)))
        );
        // Root, left child, fetch, and the constant each visited exactly once.
        assert_eq!(visited.len(), 4);
    }

    #[test]
    fn info_equal_is_structural_not_identity() {
        let mut store = InductionStore::new();
        let a1 = store.constant(IntType::I32, 4);
        let a2 = store.constant(IntType::I32, 4);
        let f1 = store.fetch(IntType::I32, InstrId(3));
        let f2 = store.fetch(IntType::I32, InstrId(3));
        let s1 = store.invariant(IntType::I32, InvariantOp::Sub(f1, a1));
        let s2 = store.invariant(IntType::I32, InvariantOp::Sub(f2, a2));
        let other = store.invariant(IntType::I32, InvariantOp::Add(f2, a2));
        assert!(store.info_equal(s1, s2));
        assert!(!store.info_equal(s1, other));
    }

    #[test]
    fn visit_loop_delegates_to_installed_classifier() {
        let graph = Graph::new();
        let mut analysis = InductionVarAnalysis::new();
        analysis.set_classifier(Box::new(
            |_: &Graph, loop_id: LoopId, store: &mut InductionStore| {
                let c = store.constant(IntType::I32, 11);
                store.classify(loop_id, InstrId(0), c);
            },
        ));
        analysis.visit_loop(&graph, LoopId(2));
        assert!(analysis.lookup_info(LoopId(2), InstrId(0)).is_some());
    }
}
