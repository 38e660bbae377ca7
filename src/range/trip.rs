//! Trip-count & finiteness oracle
//!
//! Reads a loop's stored trip description and turns it into the
//! classification clients act on: whether the loop terminates, whether the
//! count is a compile-time constant, and whether bounds derived from the
//! count need runtime guards.

use super::eval::ConstantRequest;
use super::{InductionVarRange, Query};
use crate::induction::{GeometricOp, InfoId, InfoKind, TripKind};
use crate::ir::{BlockId, Graph, InstrId, LoopId};

/// Classification of a loop's trip count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripClass {
    /// Exact count known at compile time
    Constant(i64),
    /// Terminates on every entry; count stays symbolic
    Finite,
    /// Count valid only once the body has executed at least once
    Body,
    /// The count expression itself may overflow
    Unsafe,
    /// No information
    Unknown,
}

impl InductionVarRange<'_> {
    /// Classify the trip count of `loop_id`
    pub fn classify_trip(&self, graph: &Graph, loop_id: LoopId) -> TripClass {
        let trip = match self.analysis.trip(loop_id) {
            Some(trip) => trip,
            None => return TripClass::Unknown,
        };
        match trip.kind {
            TripKind::Unsafe => TripClass::Unsafe,
            TripKind::Body => TripClass::Body,
            TripKind::Constant | TripKind::Finite => {
                let q = Query {
                    graph,
                    loop_id,
                    in_body: true,
                    chase_hint: None,
                };
                match self.is_constant(&q, Some(trip.count), ConstantRequest::Exact) {
                    Some(n) if n >= 0 => TripClass::Constant(n),
                    _ => TripClass::Finite,
                }
            }
        }
    }

    /// Whether the loop's header logic provably terminates on every entry
    pub fn is_finite(&self, graph: &Graph, loop_id: LoopId) -> bool {
        matches!(
            self.classify_trip(graph, loop_id),
            TripClass::Constant(_) | TripClass::Finite
        )
    }

    /// The exact trip count, when it is a compile-time constant
    pub fn known_trip_count(&self, graph: &Graph, loop_id: LoopId) -> Option<i64> {
        match self.classify_trip(graph, loop_id) {
            TripClass::Constant(n) => Some(n),
            _ => None,
        }
    }

    /// Unit-stride check for `instruction` in its closest enclosing loop
    ///
    /// Succeeds for a non-narrowing linear induction with stride exactly
    /// one over a well-behaved trip, returning the invariant offset (e.g.
    /// pass an array index to learn the `b` of `i + b`). A constant offset
    /// is materialized in the graph.
    pub fn is_unit_stride(
        &self,
        graph: &mut Graph,
        context: BlockId,
        instruction: InstrId,
    ) -> Option<InstrId> {
        let resolved = self.resolve(graph, context, instruction)?;
        if !self.is_finite(graph, resolved.loop_id) {
            return None;
        }
        if self.is_narrowing_linear(resolved.info) {
            return None;
        }
        let node = self.analysis.store.node(resolved.info);
        let ty = node.ty;
        let (stride, offset) = match node.kind {
            InfoKind::Linear { stride, offset } => (stride, offset),
            _ => return None,
        };
        let offset_fetch;
        let offset_const;
        {
            let q = Query {
                graph: &*graph,
                loop_id: resolved.loop_id,
                in_body: true,
                chase_hint: None,
            };
            if self.is_constant(&q, Some(stride), ConstantRequest::Exact) != Some(1) {
                return None;
            }
            offset_fetch = match self.analysis.store.node(offset).kind {
                InfoKind::Invariant(crate::induction::InvariantOp::Fetch(instr)) => Some(instr),
                _ => None,
            };
            offset_const = self.is_constant(&q, Some(offset), ConstantRequest::Exact);
        }
        if let Some(instr) = offset_fetch {
            return Some(instr);
        }
        match offset_const {
            Some(c) if ty.contains(c) => Some(graph.constant(ty, c)),
            _ => None,
        }
    }

    /// Whether evaluating `info` consumes the loop's trip count
    ///
    /// Drives the finite-test advisory: a bound that never touched the
    /// count needs no termination guard.
    pub(crate) fn uses_trip_count(&self, q: &Query<'_>, info: InfoId) -> bool {
        match self.analysis.store.node(info).kind {
            InfoKind::Linear { .. } => self.linear_stride(q, info).is_some(),
            InfoKind::Polynomial { sum, .. } => self.uses_trip_count(q, sum),
            InfoKind::WrapAround { body, .. } => self.uses_trip_count(q, body),
            InfoKind::Geometric {
                op: GeometricOp::Mul,
                ..
            } => true,
            _ => false,
        }
    }

    /// The constant stride of a linear induction, when there is one
    pub(crate) fn linear_stride(&self, q: &Query<'_>, info: InfoId) -> Option<i64> {
        match self.analysis.store.node(info).kind {
            InfoKind::Linear { stride, .. } => {
                self.is_constant(q, Some(stride), ConstantRequest::Exact)
            }
            _ => None,
        }
    }

    /// A linear induction computed in a type narrower than its children's
    /// lost bits on the way; its bounds cannot be trusted beyond the type
    pub(crate) fn is_narrowing_linear(&self, info: InfoId) -> bool {
        match self.analysis.store.node(info).kind {
            InfoKind::Linear { stride, offset } => {
                let ty = self.analysis.store.node(info).ty;
                ty.is_narrower_than(self.analysis.store.node(stride).ty)
                    || ty.is_narrower_than(self.analysis.store.node(offset).ty)
            }
            _ => false,
        }
    }
}
