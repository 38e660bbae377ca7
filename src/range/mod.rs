//! Range analysis on expressions within loops
//!
//! Takes the results of induction-variable classification and answers, for
//! any classified IR value at a given context block, what conservative
//! lower and upper bounds the value stays inside, and what value it holds
//! once its loop is done. Bounds combine symbolic and partial integral
//! evaluation: wrap-around is never assumed absent on symbolic parts, so a
//! known range `[0, 100]` for `i` yields the exact `[-100, 100]` for
//! `-2 * i + 100` but only `[x, x + 100]` for `i + x`, which may wrap
//! depending on `x`.

mod codegen;
mod eval;
mod trip;
mod value;

pub use codegen::{GeneratedRange, Guards};
pub use trip::TripClass;
pub use value::Value;

use crate::induction::{InductionVarAnalysis, InfoId, TripKind};
use crate::ir::{BlockId, Graph, InstrId, LoopId};
use rustc_hash::FxHashSet as HashSet;
use tracing::{debug, trace};

/// Outcome of a range query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InductionRange {
    pub min: Value,
    pub max: Value,
    /// The derivation used the trip count of a loop that was not proven
    /// finite; the caller must assert or test termination before relying
    /// on the bounds
    pub needs_finite_test: bool,
}

/// Per-query evaluation parameters
///
/// The chase hint travels here instead of in analyzer state, so concurrent
/// queries against the same analyzer cannot observe each other.
pub(crate) struct Query<'g> {
    pub graph: &'g Graph,
    pub loop_id: LoopId,
    pub in_body: bool,
    pub chase_hint: Option<InstrId>,
}

pub(crate) struct Resolved {
    pub loop_id: LoopId,
    pub info: InfoId,
    pub in_body: bool,
}

/// The range analyzer
///
/// Borrows the classification store for its whole lifetime; queries are
/// pure reads, while [`replace`](Self::replace) and
/// [`re_visit`](Self::re_visit) are the only mutations and go through the
/// store's narrow update interface.
pub struct InductionVarRange<'a> {
    analysis: &'a mut InductionVarAnalysis,
    allow_potential_overflow: bool,
}

impl<'a> InductionVarRange<'a> {
    /// Analyzer with the default emission policy: range bounds may be
    /// materialized with arithmetic that wraps, last values may not
    pub fn new(analysis: &'a mut InductionVarAnalysis) -> Self {
        Self {
            analysis,
            allow_potential_overflow: true,
        }
    }

    /// Analyzer with an explicit overflow policy for range emission
    pub fn with_overflow_policy(analysis: &'a mut InductionVarAnalysis, allow: bool) -> Self {
        Self {
            analysis,
            allow_potential_overflow: allow,
        }
    }

    /// Conservative bounds on `instruction` at the `context` block
    ///
    /// `chase_hint` names an instruction at which fetch chasing stops, so
    /// callers can keep a bound expressed relative to a value they intend
    /// to compare against. Returns `None` when the instruction is not
    /// classified in the innermost loop containing its definition.
    pub fn get_induction_range(
        &self,
        graph: &Graph,
        context: BlockId,
        instruction: InstrId,
        chase_hint: Option<InstrId>,
    ) -> Option<InductionRange> {
        let resolved = self.resolve(graph, context, instruction)?;
        let trip = self.analysis.trip(resolved.loop_id);
        let q = Query {
            graph,
            loop_id: resolved.loop_id,
            in_body: resolved.in_body,
            chase_hint,
        };
        let min = self.get_val(&q, Some(resolved.info), trip, true);
        let max = self.get_val(&q, Some(resolved.info), trip, false);
        let needs_finite_test = self.uses_trip_count(&q, resolved.info)
            && trip.is_some_and(|t| t.kind == TripKind::Unsafe);
        trace!(
            ?instruction,
            ?min,
            ?max,
            needs_finite_test,
            "induction range"
        );
        Some(InductionRange {
            min,
            max,
            needs_finite_test,
        })
    }

    /// Whether `phi` has been classified relative to its closest enclosing
    /// loop; reductions and other complex cycles have not
    pub fn is_classified(&self, graph: &Graph, phi: InstrId) -> bool {
        let block = graph.defining_block(phi);
        match graph.innermost_loop_of(block) {
            Some(loop_id) => self.analysis.lookup_info(loop_id, phi).is_some(),
            None => false,
        }
    }

    /// The interesting cycle recorded for an entry phi, if any
    pub fn cycle(&self, phi: InstrId) -> Option<&HashSet<InstrId>> {
        self.analysis.lookup_cycle(phi)
    }

    /// Rewrite every fetch of `fetch` to `replacement` in all induction
    /// information of the loops containing `instruction`
    pub fn replace(
        &mut self,
        graph: &Graph,
        instruction: InstrId,
        fetch: InstrId,
        replacement: InstrId,
    ) {
        debug!(?instruction, ?fetch, ?replacement, "replace fetch");
        let def_block = graph.defining_block(instruction);
        let loops: Vec<LoopId> = graph.loops_containing(def_block).collect();
        let mut visited = HashSet::default();
        for loop_id in loops {
            let mut roots = self.analysis.store.loop_infos(loop_id);
            if let Some(trip) = self.analysis.store.trip(loop_id) {
                roots.push(trip.count);
                if let Some(taken) = trip.taken_test {
                    roots.push(taken);
                }
            }
            for root in roots {
                self.analysis
                    .store
                    .rewrite_fetch(root, fetch, replacement, &mut visited);
            }
        }
    }

    /// Drop the stored classification for `loop_id` and its header phis,
    /// then re-run the classifier on just that loop
    pub fn re_visit(&mut self, graph: &Graph, loop_id: LoopId) {
        debug!(?loop_id, "re-visit loop");
        let phis = graph.header_phis(loop_id);
        self.analysis.store.invalidate(loop_id, &phis);
        self.analysis.visit_loop(graph, loop_id);
    }

    /// Locate the classification of `instruction` and the context's
    /// position relative to its home loop
    ///
    /// The home loop is the innermost loop containing the definition; the
    /// context block only decides whether the iteration counter is still
    /// short of its final value (in the body, off the header).
    pub(crate) fn resolve(
        &self,
        graph: &Graph,
        context: BlockId,
        instruction: InstrId,
    ) -> Option<Resolved> {
        let def_block = graph.defining_block(instruction);
        let loop_id = graph.innermost_loop_of(def_block)?;
        let info = self.analysis.lookup_info(loop_id, instruction)?;
        let header = graph.loop_header(loop_id);
        let in_body = graph.loop_contains(loop_id, context) && context != header;
        Some(Resolved {
            loop_id,
            info,
            in_body,
        })
    }
}
