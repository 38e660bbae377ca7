//! Re-emission of evaluated bounds as IR
//!
//! Mirrors the evaluator, but instead of a [`Value`](super::Value) each
//! recursion step appends instructions to a caller-supplied block. Every
//! entry point has a probe twin that runs the identical recursion without
//! touching the graph, so `can_generate_*` answers are exact. Emission
//! refuses forms whose arithmetic cannot be proven free of wrap-around
//! unless the analyzer was built with a permissive overflow policy.

use super::eval::{checked_pow, ConstantRequest};
use super::{InductionVarRange, Query};
use crate::error::{Error, Result};
use crate::induction::{GeometricOp, InfoId, InfoKind, InvariantOp, Trip, TripKind};
use crate::ir::{BlockId, CmpKind, Graph, InstrId, InstrKind, IntType, LoopId};
use bitflags::bitflags;

bitflags! {
    /// Runtime guards a generated range still depends on
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Guards: u8 {
        /// The loop must be asserted or tested finite
        const FINITE_TEST = 1;
        /// The bounds are valid only if the loop body executes at least once
        const TAKEN_TEST = 1 << 1;
    }
}

/// IR handles produced by range emission
///
/// For a loop-invariant result only `upper` is produced; the value has no
/// separate lower bound expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedRange {
    pub lower: Option<InstrId>,
    pub upper: InstrId,
}

/// Emission target: a dry run over the graph, or a real block to append to
enum CodeSink<'g> {
    Probe(&'g Graph),
    Emit { graph: &'g mut Graph, block: BlockId },
}

impl CodeSink<'_> {
    fn graph(&self) -> &Graph {
        match self {
            CodeSink::Probe(graph) => graph,
            CodeSink::Emit { graph, .. } => graph,
        }
    }

    fn emit(&mut self, ty: IntType, kind: InstrKind) -> Option<InstrId> {
        match self {
            CodeSink::Probe(_) => None,
            CodeSink::Emit { graph, block } => Some(graph.emit(*block, ty, kind)),
        }
    }

    fn constant(&mut self, ty: IntType, value: i64) -> Option<InstrId> {
        match self {
            CodeSink::Probe(_) => None,
            CodeSink::Emit { graph, .. } => Some(graph.constant(ty, value)),
        }
    }
}

struct BoundsOutput {
    lower: Option<InstrId>,
    upper: Option<InstrId>,
    needs_finite_test: bool,
    needs_taken_test: bool,
}

struct LastValue {
    result: Option<InstrId>,
    needs_finite_test: bool,
    needs_taken_test: bool,
}

fn polynomial_sum(a: i64, b: i64, m: i64) -> Option<i64> {
    // sum_{i=0}^{m-1} (a*i + b)  ==  a*(m*(m-1))/2 + b*m
    let pairs = m.checked_mul(m.checked_sub(1)?)?.checked_div(2)?;
    a.checked_mul(pairs)?.checked_add(b.checked_mul(m)?)
}

impl InductionVarRange<'_> {
    /// Dry run: whether [`generate_range`](Self::generate_range) would
    /// succeed, and which runtime guards the emitted bounds would need
    pub fn can_generate_range(
        &self,
        graph: &Graph,
        context: BlockId,
        instruction: InstrId,
    ) -> Option<Guards> {
        let mut sink = CodeSink::Probe(graph);
        let out = self.generate_range_internal(&mut sink, context, instruction)?;
        let mut guards = Guards::empty();
        if out.needs_finite_test {
            guards |= Guards::FINITE_TEST;
        }
        if out.needs_taken_test {
            guards |= Guards::TAKEN_TEST;
        }
        Some(guards)
    }

    /// Emit the bounds of `instruction` at `context` into `block`
    ///
    /// Precondition: [`can_generate_range`](Self::can_generate_range)
    /// returned `Some`; the guards it reported are the caller's to emit.
    pub fn generate_range(
        &self,
        graph: &mut Graph,
        context: BlockId,
        instruction: InstrId,
        block: BlockId,
    ) -> Result<GeneratedRange> {
        let resolved = self
            .resolve(graph, context, instruction)
            .ok_or(Error::Unclassified)?;
        if self.analysis.trip(resolved.loop_id).is_none() {
            return Err(Error::MissingTripCount);
        }
        let mut sink = CodeSink::Emit { graph, block };
        match self.generate_range_internal(&mut sink, context, instruction) {
            Some(BoundsOutput {
                lower,
                upper: Some(upper),
                ..
            }) => Ok(GeneratedRange { lower, upper }),
            _ => Err(Error::Unsupported),
        }
    }

    /// Emit a boolean expression for "the loop body executes at least once"
    ///
    /// `loop_control` is the condition instruction controlling the loop
    /// whose trip description carries the taken-test.
    pub fn generate_taken_test(
        &self,
        graph: &mut Graph,
        loop_control: InstrId,
        block: BlockId,
    ) -> Result<InstrId> {
        let loop_id = graph
            .innermost_loop_of(graph.defining_block(loop_control))
            .ok_or(Error::Unclassified)?;
        let trip = self.analysis.trip(loop_id).ok_or(Error::MissingTripCount)?;
        let taken = trip.taken_test.ok_or(Error::Unsupported)?;
        let mut sink = CodeSink::Emit { graph, block };
        let mut result = None;
        if self.generate_code(&mut sink, loop_id, false, Some(taken), None, false, true, &mut result)
        {
            result.ok_or(Error::Unsupported)
        } else {
            Err(Error::Unsupported)
        }
    }

    /// Dry run: whether the closed-form last value of `instruction` can be
    /// emitted without leaving any guard to the caller
    pub fn can_generate_last_value(&self, graph: &Graph, instruction: InstrId) -> bool {
        let mut sink = CodeSink::Probe(graph);
        self.last_value_internal(&mut sink, instruction, false)
            .map(|out| !out.needs_finite_test && !out.needs_taken_test)
            .unwrap_or(false)
    }

    /// Emit the value `instruction` holds right after its closest
    /// enclosing loop terminates
    ///
    /// Precondition: [`can_generate_last_value`](Self::can_generate_last_value)
    /// returned `true`.
    pub fn generate_last_value(
        &self,
        graph: &mut Graph,
        instruction: InstrId,
        block: BlockId,
    ) -> Result<InstrId> {
        let context = graph.defining_block(instruction);
        let resolved = self
            .resolve(graph, context, instruction)
            .ok_or(Error::Unclassified)?;
        if self.analysis.trip(resolved.loop_id).is_none() {
            return Err(Error::MissingTripCount);
        }
        if !self.can_generate_last_value(graph, instruction) {
            // A permissive probe pinpoints overflow as the blocker.
            let mut probe = CodeSink::Probe(graph);
            return match self.last_value_internal(&mut probe, instruction, true) {
                Some(out) if !out.needs_finite_test && !out.needs_taken_test => {
                    Err(Error::PotentialOverflow)
                }
                _ => Err(Error::Unsupported),
            };
        }
        let mut sink = CodeSink::Emit { graph, block };
        match self.last_value_internal(&mut sink, instruction, false) {
            Some(LastValue {
                result: Some(value),
                ..
            }) => Ok(value),
            _ => Err(Error::Unsupported),
        }
    }

    /// Emit the trip count of `loop_id`, guarded by a taken-test when the
    /// count is only valid once the body has run; `None` when the count
    /// is unavailable or unsafe
    pub fn generate_trip_count(
        &self,
        graph: &mut Graph,
        loop_id: LoopId,
        block: BlockId,
    ) -> Option<InstrId> {
        let trip = self.analysis.trip(loop_id)?;
        if trip.kind == TripKind::Unsafe {
            return None;
        }
        let ty = self.analysis.store.node(trip.count).ty;
        let mut sink = CodeSink::Emit { graph, block };
        let mut taken = None;
        if trip.kind == TripKind::Body {
            let taken_info = trip.taken_test?;
            if !self.generate_code(
                &mut sink,
                loop_id,
                false,
                Some(taken_info),
                None,
                false,
                true,
                &mut taken,
            ) {
                return None;
            }
        }
        let mut count = None;
        if !self.generate_code(
            &mut sink,
            loop_id,
            false,
            Some(trip.count),
            None,
            false,
            true,
            &mut count,
        ) {
            return None;
        }
        let count = count?;
        match taken {
            Some(condition) => {
                let zero = sink.constant(ty, 0)?;
                sink.emit(
                    ty,
                    InstrKind::Select {
                        condition,
                        if_true: count,
                        if_false: zero,
                    },
                )
            }
            None => Some(count),
        }
    }

    fn generate_range_internal(
        &self,
        sink: &mut CodeSink<'_>,
        context: BlockId,
        instruction: InstrId,
    ) -> Option<BoundsOutput> {
        let resolved = self.resolve(sink.graph(), context, instruction)?;
        // Code generation needs all information, including the trip count.
        let trip = self.analysis.trip(resolved.loop_id)?;
        let needs_finite_test = {
            let q = Query {
                graph: sink.graph(),
                loop_id: resolved.loop_id,
                in_body: resolved.in_body,
                chase_hint: None,
            };
            self.uses_trip_count(&q, resolved.info)
        } && trip.kind == TripKind::Unsafe;
        let needs_taken_test = trip.kind == TripKind::Body;
        if needs_taken_test {
            // The caller will have to emit the taken-test; make sure it can.
            let taken = trip.taken_test?;
            let mut probe = CodeSink::Probe(sink.graph());
            let mut ignored = None;
            if !self.generate_code(
                &mut probe,
                resolved.loop_id,
                false,
                Some(taken),
                None,
                false,
                true,
                &mut ignored,
            ) {
                return None;
            }
        }
        let allow = self.allow_potential_overflow;
        let invariant = matches!(
            self.analysis.store.node(resolved.info).kind,
            InfoKind::Invariant(_)
        );
        let mut lower = None;
        let mut upper = None;
        if invariant {
            // An invariant has a single value; emit only the upper handle.
            if !self.generate_code(
                sink,
                resolved.loop_id,
                resolved.in_body,
                Some(resolved.info),
                Some(trip),
                false,
                allow,
                &mut upper,
            ) {
                return None;
            }
        } else {
            if !self.generate_code(
                sink,
                resolved.loop_id,
                resolved.in_body,
                Some(resolved.info),
                Some(trip),
                true,
                allow,
                &mut lower,
            ) {
                return None;
            }
            if !self.generate_code(
                sink,
                resolved.loop_id,
                resolved.in_body,
                Some(resolved.info),
                Some(trip),
                false,
                allow,
                &mut upper,
            ) {
                return None;
            }
        }
        Some(BoundsOutput {
            lower,
            upper,
            needs_finite_test,
            needs_taken_test,
        })
    }

    fn last_value_internal(
        &self,
        sink: &mut CodeSink<'_>,
        instruction: InstrId,
        allow_overflow: bool,
    ) -> Option<LastValue> {
        let context = sink.graph().defining_block(instruction);
        let resolved = self.resolve(sink.graph(), context, instruction)?;
        let trip = self.analysis.trip(resolved.loop_id)?;
        let needs_finite_test = {
            let q = Query {
                graph: sink.graph(),
                loop_id: resolved.loop_id,
                in_body: false,
                chase_hint: None,
            };
            self.uses_trip_count(&q, resolved.info)
        } && trip.kind == TripKind::Unsafe;
        let mut needs_taken_test = trip.kind == TripKind::Body;
        let mut result = None;
        if !self.generate_last_value_for(
            sink,
            resolved.loop_id,
            resolved.info,
            trip,
            allow_overflow,
            &mut needs_taken_test,
            &mut result,
        ) {
            return None;
        }
        Some(LastValue {
            result,
            needs_finite_test,
            needs_taken_test,
        })
    }

    fn generate_last_value_for(
        &self,
        sink: &mut CodeSink<'_>,
        loop_id: LoopId,
        info: InfoId,
        trip: &Trip,
        allow_overflow: bool,
        needs_taken_test: &mut bool,
        result: &mut Option<InstrId>,
    ) -> bool {
        match &self.analysis.store.node(info).kind {
            InfoKind::Invariant(_) => self.generate_code(
                sink,
                loop_id,
                false,
                Some(info),
                Some(trip),
                false,
                allow_overflow,
                result,
            ),
            InfoKind::Linear { .. } => {
                let stride = {
                    let q = Query {
                        graph: sink.graph(),
                        loop_id,
                        in_body: false,
                        chase_hint: None,
                    };
                    match self.linear_stride(&q, info) {
                        Some(stride) => stride,
                        None => return false,
                    }
                };
                // A positive stride peaks at the end, a negative one
                // bottoms out there; either way that endpoint is the
                // last value.
                let is_min = stride < 0;
                self.generate_last_value_linear(
                    sink,
                    loop_id,
                    info,
                    trip,
                    is_min,
                    allow_overflow,
                    needs_taken_test,
                    result,
                )
            }
            InfoKind::Polynomial { .. } => {
                self.generate_last_value_polynomial(sink, loop_id, info, trip, allow_overflow, result)
            }
            InfoKind::Geometric { .. } => {
                self.generate_last_value_geometric(sink, loop_id, info, trip, allow_overflow, result)
            }
            InfoKind::WrapAround { .. } => self.generate_last_value_wrap_around(
                sink,
                loop_id,
                info,
                trip,
                allow_overflow,
                needs_taken_test,
                result,
            ),
            InfoKind::Periodic { .. } => self.generate_last_value_periodic(
                sink,
                loop_id,
                info,
                trip,
                allow_overflow,
                needs_taken_test,
                result,
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_last_value_linear(
        &self,
        sink: &mut CodeSink<'_>,
        loop_id: LoopId,
        info: InfoId,
        trip: &Trip,
        is_min: bool,
        allow_overflow: bool,
        needs_taken_test: &mut bool,
        result: &mut Option<InstrId>,
    ) -> bool {
        let store = &self.analysis.store;
        let ty = store.node(info).ty;
        let (stride, offset) = match store.node(info).kind {
            InfoKind::Linear { stride, offset } => (stride, offset),
            _ => return false,
        };
        // No narrowing inductions and no type mismatch against the count.
        if self.is_narrowing_linear(info) || store.node(trip.count).ty != ty {
            return false;
        }
        let stride_value = {
            let q = Query {
                graph: sink.graph(),
                loop_id,
                in_body: false,
                chase_hint: None,
            };
            match self
                .is_constant(&q, Some(stride), ConstantRequest::Exact)
                .and_then(|s| i32::try_from(s).ok())
            {
                Some(s) => s,
                None => return false,
            }
        };
        let is_min_a = if stride_value >= 0 { is_min } else { !is_min };
        let mut count = None;
        if !self.generate_trip_bound(sink, loop_id, false, Some(trip), is_min_a, allow_overflow, &mut count)
        {
            return false;
        }
        let mut offset_code = None;
        if !self.generate_code(
            sink,
            loop_id,
            false,
            Some(offset),
            Some(trip),
            is_min,
            allow_overflow,
            &mut offset_code,
        ) {
            return false;
        }
        if let CodeSink::Emit { graph, block } = sink {
            if let (Some(count), Some(offset)) = (count, offset_code) {
                let value = if stride_value == 1 {
                    graph.emit(*block, ty, InstrKind::Add(count, offset))
                } else if stride_value == -1 {
                    graph.emit(*block, ty, InstrKind::Sub(offset, count))
                } else {
                    let scale = graph.constant(ty, stride_value as i64);
                    let mul = graph.emit(*block, ty, InstrKind::Mul(scale, count));
                    graph.emit(*block, ty, InstrKind::Add(mul, offset))
                };
                *result = Some(value);
            }
        }
        if *needs_taken_test {
            // Degenerate to the seed value when the loop is never entered.
            if !self.try_generate_taken_test(sink, loop_id, trip, result, offset_code) {
                return false;
            }
            *needs_taken_test = false;
        }
        true
    }

    fn generate_last_value_polynomial(
        &self,
        sink: &mut CodeSink<'_>,
        loop_id: LoopId,
        info: InfoId,
        trip: &Trip,
        allow_overflow: bool,
        result: &mut Option<InstrId>,
    ) -> bool {
        let store = &self.analysis.store;
        let ty = store.node(info).ty;
        let (sum, offset) = match store.node(info).kind {
            InfoKind::Polynomial { sum, offset } => (sum, offset),
            _ => return false,
        };
        let (stride, sum_offset) = match store.node(sum).kind {
            InfoKind::Linear { stride, offset } => (stride, offset),
            _ => return false,
        };
        let folded = {
            let q = Query {
                graph: sink.graph(),
                loop_id,
                in_body: false,
                chase_hint: None,
            };
            let a = self.is_constant(&q, Some(stride), ConstantRequest::Exact);
            let b = self.is_constant(&q, Some(sum_offset), ConstantRequest::Exact);
            let m = self.is_constant(&q, Some(trip.count), ConstantRequest::Exact);
            match (a, b, m) {
                (Some(a), Some(b), Some(m)) if m >= 0 => {
                    polynomial_sum(a, b, m).filter(|&v| ty.contains(v))
                }
                _ => None,
            }
        };
        let folded = match folded {
            Some(v) => v,
            None => return false,
        };
        let mut offset_code = None;
        if !self.generate_code(
            sink,
            loop_id,
            false,
            Some(offset),
            Some(trip),
            false,
            allow_overflow,
            &mut offset_code,
        ) {
            return false;
        }
        if let CodeSink::Emit { graph, block } = sink {
            if let Some(offset) = offset_code {
                let sum = graph.constant(ty, folded);
                *result = Some(graph.emit(*block, ty, InstrKind::Add(sum, offset)));
            }
        }
        true
    }

    fn generate_last_value_geometric(
        &self,
        sink: &mut CodeSink<'_>,
        loop_id: LoopId,
        info: InfoId,
        trip: &Trip,
        allow_overflow: bool,
        result: &mut Option<InstrId>,
    ) -> bool {
        let store = &self.analysis.store;
        let ty = store.node(info).ty;
        let (scale, offset, ratio, op) = match store.node(info).kind {
            InfoKind::Geometric {
                scale,
                offset,
                ratio,
                op,
            } => (scale, offset, ratio, op),
            _ => return false,
        };
        if ratio < 1 {
            return false;
        }
        let folded = {
            let q = Query {
                graph: sink.graph(),
                loop_id,
                in_body: false,
                chase_hint: None,
            };
            let a = self.is_constant(&q, Some(scale), ConstantRequest::Exact);
            let m = self.is_constant(&q, Some(trip.count), ConstantRequest::Exact);
            match (a, m) {
                (Some(a), Some(m)) if m >= 0 => match op {
                    GeometricOp::Mul => checked_pow(ratio, m)
                        .and_then(|p| a.checked_mul(p))
                        .filter(|&v| ty.contains(v)),
                    // The quotient vanishes once the power outgrows the scale.
                    GeometricOp::Div => Some(match checked_pow(ratio, m) {
                        Some(p) => a / p,
                        None => 0,
                    }),
                },
                _ => None,
            }
        };
        let folded = match folded {
            Some(v) => v,
            None => return false,
        };
        let mut offset_code = None;
        if !self.generate_code(
            sink,
            loop_id,
            false,
            Some(offset),
            Some(trip),
            false,
            allow_overflow,
            &mut offset_code,
        ) {
            return false;
        }
        if folded == 0 {
            *result = offset_code;
        } else if let CodeSink::Emit { graph, block } = sink {
            if let Some(offset) = offset_code {
                let scaled = graph.constant(ty, folded);
                *result = Some(graph.emit(*block, ty, InstrKind::Add(scaled, offset)));
            }
        }
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_last_value_wrap_around(
        &self,
        sink: &mut CodeSink<'_>,
        loop_id: LoopId,
        info: InfoId,
        trip: &Trip,
        allow_overflow: bool,
        needs_taken_test: &mut bool,
        result: &mut Option<InstrId>,
    ) -> bool {
        // Strip the wraps; beyond them the inner induction takes over.
        let mut depth: i64 = 0;
        let mut inner = info;
        while let InfoKind::WrapAround { body, .. } = &self.analysis.store.node(inner).kind {
            inner = *body;
            depth += 1;
        }
        let past_wraps = {
            let q = Query {
                graph: sink.graph(),
                loop_id,
                in_body: false,
                chase_hint: None,
            };
            self.is_constant(&q, Some(trip.count), ConstantRequest::Exact)
                .is_some_and(|m| m >= depth)
        };
        if !past_wraps {
            return false;
        }
        self.generate_last_value_for(
            sink,
            loop_id,
            inner,
            trip,
            allow_overflow,
            needs_taken_test,
            result,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_last_value_periodic(
        &self,
        sink: &mut CodeSink<'_>,
        loop_id: LoopId,
        info: InfoId,
        trip: &Trip,
        allow_overflow: bool,
        needs_taken_test: &mut bool,
        result: &mut Option<InstrId>,
    ) -> bool {
        let (phases, ty) = match &self.analysis.store.node(info).kind {
            InfoKind::Periodic { phases } => {
                (phases.clone(), self.analysis.store.node(info).ty)
            }
            _ => return false,
        };
        if phases.is_empty() {
            return false;
        }
        let period = phases.len() as i64;
        let count = {
            let q = Query {
                graph: sink.graph(),
                loop_id,
                in_body: false,
                chase_hint: None,
            };
            self.is_constant(&q, Some(trip.count), ConstantRequest::Exact)
        };
        if let Some(m) = count {
            if m < 0 {
                return false;
            }
            // After m iterations the sequence sits at phase m mod period.
            let phase = phases[(m % period) as usize];
            if !self.generate_code(
                sink,
                loop_id,
                false,
                Some(phase),
                Some(trip),
                false,
                allow_overflow,
                result,
            ) {
                return false;
            }
            if *needs_taken_test {
                let mut seed = None;
                if !self.generate_code(
                    sink,
                    loop_id,
                    false,
                    Some(phases[0]),
                    Some(trip),
                    false,
                    allow_overflow,
                    &mut seed,
                ) {
                    return false;
                }
                if !self.try_generate_taken_test(sink, loop_id, trip, result, seed) {
                    return false;
                }
                *needs_taken_test = false;
            }
            return true;
        }
        // Symbolic count: a two-phase constant sequence selects on parity.
        if phases.len() == 2 {
            let constants = {
                let q = Query {
                    graph: sink.graph(),
                    loop_id,
                    in_body: false,
                    chase_hint: None,
                };
                match (
                    self.is_constant(&q, Some(phases[0]), ConstantRequest::Exact),
                    self.is_constant(&q, Some(phases[1]), ConstantRequest::Exact),
                ) {
                    (Some(x), Some(y)) if ty.contains(x) && ty.contains(y) => Some((x, y)),
                    _ => None,
                }
            };
            let (even, odd) = match constants {
                Some(pair) => pair,
                None => return false,
            };
            let mut count_code = None;
            if !self.generate_code(
                sink,
                loop_id,
                false,
                Some(trip.count),
                None,
                false,
                allow_overflow,
                &mut count_code,
            ) {
                return false;
            }
            if let CodeSink::Emit { graph, block } = sink {
                if let Some(count) = count_code {
                    let two = graph.constant(ty, 2);
                    let rem = graph.emit(*block, ty, InstrKind::Rem(count, two));
                    let zero = graph.constant(ty, 0);
                    let cond =
                        graph.emit(*block, IntType::I32, InstrKind::Cmp(CmpKind::Eq, rem, zero));
                    let if_true = graph.constant(ty, even);
                    let if_false = graph.constant(ty, odd);
                    *result = Some(graph.emit(
                        *block,
                        ty,
                        InstrKind::Select {
                            condition: cond,
                            if_true,
                            if_false,
                        },
                    ));
                }
            }
            if *needs_taken_test {
                let seed = match sink {
                    CodeSink::Probe(_) => None,
                    CodeSink::Emit { graph, .. } => Some(graph.constant(ty, even)),
                };
                if !self.try_generate_taken_test(sink, loop_id, trip, result, seed) {
                    return false;
                }
                *needs_taken_test = false;
            }
            return true;
        }
        false
    }

    /// Wrap `result` in `select(taken, result, not_taken)`
    fn try_generate_taken_test(
        &self,
        sink: &mut CodeSink<'_>,
        loop_id: LoopId,
        trip: &Trip,
        result: &mut Option<InstrId>,
        not_taken: Option<InstrId>,
    ) -> bool {
        let taken_info = match trip.taken_test {
            Some(info) => info,
            None => return false,
        };
        let mut condition = None;
        if !self.generate_code(
            sink,
            loop_id,
            false,
            Some(taken_info),
            None,
            false,
            true,
            &mut condition,
        ) {
            return false;
        }
        if let CodeSink::Emit { graph, block } = sink {
            if let (Some(condition), Some(value), Some(seed)) = (condition, *result, not_taken) {
                let ty = graph.instruction(value).ty;
                *result = Some(graph.emit(
                    *block,
                    ty,
                    InstrKind::Select {
                        condition,
                        if_true: value,
                        if_false: seed,
                    },
                ));
            }
        }
        true
    }

    /// Counter bound as IR: `0` on the min side, the count (less one when
    /// still inside the body) on the max side
    #[allow(clippy::too_many_arguments)]
    fn generate_trip_bound(
        &self,
        sink: &mut CodeSink<'_>,
        loop_id: LoopId,
        in_body: bool,
        trip: Option<&Trip>,
        is_min: bool,
        allow_overflow: bool,
        result: &mut Option<InstrId>,
    ) -> bool {
        let trip = match trip {
            Some(trip) => trip,
            None => return false,
        };
        let ty = self.analysis.store.node(trip.count).ty;
        if is_min {
            *result = sink.constant(ty, 0);
            return true;
        }
        if !in_body {
            return self.generate_code(
                sink,
                loop_id,
                false,
                Some(trip.count),
                None,
                false,
                allow_overflow,
                result,
            );
        }
        // count - 1, folded when the count is a compile-time constant
        let exact = {
            let q = Query {
                graph: sink.graph(),
                loop_id,
                in_body,
                chase_hint: None,
            };
            self.is_constant(&q, Some(trip.count), ConstantRequest::Exact)
        };
        if let Some(count) = exact {
            let last = count - 1;
            if !ty.contains(last) {
                return false;
            }
            *result = sink.constant(ty, last);
            return true;
        }
        let mut count = None;
        if !self.generate_code(
            sink,
            loop_id,
            in_body,
            Some(trip.count),
            None,
            false,
            allow_overflow,
            &mut count,
        ) {
            return false;
        }
        if !allow_overflow {
            let provable = {
                let q = Query {
                    graph: sink.graph(),
                    loop_id,
                    in_body,
                    chase_hint: None,
                };
                self.is_constant(&q, Some(trip.count), ConstantRequest::AtLeast)
                    .is_some_and(|lo| lo > ty.min_value())
            };
            if !provable {
                return false;
            }
        }
        if let CodeSink::Emit { graph, block } = sink {
            if let Some(count) = count {
                let one = graph.constant(ty, 1);
                *result = Some(graph.emit(*block, ty, InstrKind::Sub(count, one)));
            }
        }
        true
    }

    /// Recursive emission of one side of a bound
    #[allow(clippy::too_many_arguments)]
    fn generate_code(
        &self,
        sink: &mut CodeSink<'_>,
        loop_id: LoopId,
        in_body: bool,
        info: Option<InfoId>,
        trip: Option<&Trip>,
        is_min: bool,
        allow_overflow: bool,
        result: &mut Option<InstrId>,
    ) -> bool {
        let info = match info {
            Some(info) => info,
            None => return false,
        };
        let node = self.analysis.store.node(info);
        let ty = node.ty;
        match &node.kind {
            InfoKind::Invariant(op) => match *op {
                // Invariant subexpressions are exact; is_min passes through
                // untouched and only steers induction endpoints below.
                InvariantOp::Add(a, b) => {
                    let mut opa = None;
                    let mut opb = None;
                    if !self.generate_code(sink, loop_id, in_body, Some(a), trip, is_min, allow_overflow, &mut opa)
                        || !self.generate_code(sink, loop_id, in_body, Some(b), trip, is_min, allow_overflow, &mut opb)
                    {
                        return false;
                    }
                    if allow_overflow {
                        if let CodeSink::Emit { graph, block } = sink {
                            if let (Some(x), Some(y)) = (opa, opb) {
                                *result = Some(graph.emit(*block, ty, InstrKind::Add(x, y)));
                            }
                        }
                        true
                    } else {
                        self.try_generate_add_without_overflow(
                            sink, loop_id, in_body, a, b, opa, opb, ty, result,
                        )
                    }
                }
                InvariantOp::Sub(a, b) => {
                    let mut opa = None;
                    let mut opb = None;
                    if !self.generate_code(sink, loop_id, in_body, Some(a), trip, is_min, allow_overflow, &mut opa)
                        || !self.generate_code(sink, loop_id, in_body, Some(b), trip, is_min, allow_overflow, &mut opb)
                    {
                        return false;
                    }
                    if allow_overflow {
                        if let CodeSink::Emit { graph, block } = sink {
                            if let (Some(x), Some(y)) = (opa, opb) {
                                *result = Some(graph.emit(*block, ty, InstrKind::Sub(x, y)));
                            }
                        }
                        true
                    } else {
                        self.try_generate_sub_without_overflow(
                            sink, loop_id, in_body, a, b, opa, opb, ty, result,
                        )
                    }
                }
                InvariantOp::Neg(a) => {
                    let mut op = None;
                    if !self.generate_code(sink, loop_id, in_body, Some(a), trip, !is_min, allow_overflow, &mut op)
                    {
                        return false;
                    }
                    if !allow_overflow {
                        let provable = {
                            let q = Query {
                                graph: sink.graph(),
                                loop_id,
                                in_body,
                                chase_hint: None,
                            };
                            self.is_constant(&q, Some(a), ConstantRequest::AtLeast)
                                .is_some_and(|lo| lo > ty.min_value())
                        };
                        if !provable {
                            return false;
                        }
                    }
                    if let CodeSink::Emit { graph, block } = sink {
                        if let Some(x) = op {
                            *result = Some(graph.emit(*block, ty, InstrKind::Neg(x)));
                        }
                    }
                    true
                }
                InvariantOp::Mul(a, b) => {
                    let mut opa = None;
                    let mut opb = None;
                    if !self.generate_code(sink, loop_id, in_body, Some(a), trip, is_min, allow_overflow, &mut opa)
                        || !self.generate_code(sink, loop_id, in_body, Some(b), trip, is_min, allow_overflow, &mut opb)
                    {
                        return false;
                    }
                    if !allow_overflow && !self.product_fits(sink.graph(), loop_id, in_body, a, b, ty) {
                        return false;
                    }
                    if let CodeSink::Emit { graph, block } = sink {
                        if let (Some(x), Some(y)) = (opa, opb) {
                            *result = Some(graph.emit(*block, ty, InstrKind::Mul(x, y)));
                        }
                    }
                    true
                }
                InvariantOp::Div(a, b) | InvariantOp::Rem(a, b) => {
                    let mut opa = None;
                    let mut opb = None;
                    if !self.generate_code(sink, loop_id, in_body, Some(a), trip, is_min, allow_overflow, &mut opa)
                        || !self.generate_code(sink, loop_id, in_body, Some(b), trip, is_min, allow_overflow, &mut opb)
                    {
                        return false;
                    }
                    // A zero or minus-one divisor can trap or overflow.
                    let divisor_safe = {
                        let q = Query {
                            graph: sink.graph(),
                            loop_id,
                            in_body,
                            chase_hint: None,
                        };
                        matches!(
                            self.is_constant(&q, Some(b), ConstantRequest::Exact),
                            Some(d) if d != 0 && d != -1
                        )
                    };
                    if !divisor_safe {
                        return false;
                    }
                    if let CodeSink::Emit { graph, block } = sink {
                        if let (Some(x), Some(y)) = (opa, opb) {
                            let kind = match *op {
                                InvariantOp::Div(..) => InstrKind::Div(x, y),
                                _ => InstrKind::Rem(x, y),
                            };
                            *result = Some(graph.emit(*block, ty, kind));
                        }
                    }
                    true
                }
                InvariantOp::Xor(a, b) => {
                    let mut opa = None;
                    let mut opb = None;
                    if !self.generate_code(sink, loop_id, in_body, Some(a), trip, is_min, allow_overflow, &mut opa)
                        || !self.generate_code(sink, loop_id, in_body, Some(b), trip, is_min, allow_overflow, &mut opb)
                    {
                        return false;
                    }
                    if let CodeSink::Emit { graph, block } = sink {
                        if let (Some(x), Some(y)) = (opa, opb) {
                            *result = Some(graph.emit(*block, ty, InstrKind::Xor(x, y)));
                        }
                    }
                    true
                }
                InvariantOp::Lt(a, b)
                | InvariantOp::Le(a, b)
                | InvariantOp::Gt(a, b)
                | InvariantOp::Ge(a, b) => {
                    let mut opa = None;
                    let mut opb = None;
                    if !self.generate_code(sink, loop_id, in_body, Some(a), trip, is_min, allow_overflow, &mut opa)
                        || !self.generate_code(sink, loop_id, in_body, Some(b), trip, is_min, allow_overflow, &mut opb)
                    {
                        return false;
                    }
                    if let CodeSink::Emit { graph, block } = sink {
                        if let (Some(x), Some(y)) = (opa, opb) {
                            let cmp = match *op {
                                InvariantOp::Lt(..) => CmpKind::Lt,
                                InvariantOp::Le(..) => CmpKind::Le,
                                InvariantOp::Gt(..) => CmpKind::Gt,
                                _ => CmpKind::Ge,
                            };
                            *result =
                                Some(graph.emit(*block, IntType::I32, InstrKind::Cmp(cmp, x, y)));
                        }
                    }
                    true
                }
                InvariantOp::Fetch(instr) => {
                    if let CodeSink::Emit { graph, block } = sink {
                        // The fetched value must be visible where we splice.
                        if !graph.dominates(graph.defining_block(instr), *block) {
                            return false;
                        }
                    }
                    let fetch_ty = sink.graph().instruction(instr).ty;
                    if fetch_ty != ty {
                        if let CodeSink::Emit { graph, block } = sink {
                            *result = Some(graph.emit(*block, ty, InstrKind::Convert(instr)));
                        }
                    } else if let CodeSink::Emit { .. } = sink {
                        *result = Some(instr);
                    }
                    true
                }
                InvariantOp::Constant(c) => {
                    if !ty.contains(c) {
                        return false;
                    }
                    *result = sink.constant(ty, c);
                    true
                }
                InvariantOp::Convert(child) => {
                    let mut op = None;
                    if !self.generate_code(sink, loop_id, in_body, Some(child), trip, is_min, allow_overflow, &mut op)
                    {
                        return false;
                    }
                    let src = self.analysis.store.node(child).ty;
                    if ty.is_narrower_than(src) && !allow_overflow {
                        let fits = {
                            let q = Query {
                                graph: sink.graph(),
                                loop_id,
                                in_body,
                                chase_hint: None,
                            };
                            let lo = self.is_constant(&q, Some(child), ConstantRequest::AtLeast);
                            let hi = self.is_constant(&q, Some(child), ConstantRequest::AtMost);
                            matches!((lo, hi), (Some(lo), Some(hi)) if ty.contains(lo) && ty.contains(hi))
                        };
                        if !fits {
                            return false;
                        }
                    }
                    if let CodeSink::Emit { graph, block } = sink {
                        if let Some(x) = op {
                            *result = Some(graph.emit(*block, ty, InstrKind::Convert(x)));
                        }
                    }
                    true
                }
            },
            InfoKind::Linear { stride, offset } => {
                let (stride, offset) = (*stride, *offset);
                let stride_value = {
                    let q = Query {
                        graph: sink.graph(),
                        loop_id,
                        in_body,
                        chase_hint: None,
                    };
                    match self
                        .is_constant(&q, Some(stride), ConstantRequest::Exact)
                        .and_then(|s| i32::try_from(s).ok())
                    {
                        Some(s) => s,
                        None => return false,
                    }
                };
                let is_min_a = if stride_value >= 0 { is_min } else { !is_min };
                let mut counter = None;
                if !self.generate_trip_bound(sink, loop_id, in_body, trip, is_min_a, allow_overflow, &mut counter)
                {
                    return false;
                }
                let mut offset_code = None;
                if !self.generate_code(
                    sink,
                    loop_id,
                    in_body,
                    Some(offset),
                    trip,
                    is_min,
                    allow_overflow,
                    &mut offset_code,
                ) {
                    return false;
                }
                if let CodeSink::Emit { graph, block } = sink {
                    if let (Some(counter), Some(offset)) = (counter, offset_code) {
                        let value = if stride_value == 1 {
                            graph.emit(*block, ty, InstrKind::Add(counter, offset))
                        } else if stride_value == -1 {
                            graph.emit(*block, ty, InstrKind::Sub(offset, counter))
                        } else {
                            let scale = graph.constant(ty, stride_value as i64);
                            let mul = graph.emit(*block, ty, InstrKind::Mul(scale, counter));
                            graph.emit(*block, ty, InstrKind::Add(mul, offset))
                        };
                        *result = Some(value);
                    }
                }
                true
            }
            // Extreme values of wrap-around and periodic sequences are
            // materialized only as constants, easy to test at runtime
            // without wrap-around complications.
            InfoKind::WrapAround { .. } | InfoKind::Periodic { .. } => {
                let extreme = {
                    let q = Query {
                        graph: sink.graph(),
                        loop_id,
                        in_body,
                        chase_hint: None,
                    };
                    self.get_val(&q, Some(info), trip, is_min)
                };
                match extreme.as_constant() {
                    Some(c) if ty.contains(c as i64) => {
                        *result = sink.constant(ty, c as i64);
                        true
                    }
                    _ => false,
                }
            }
            // Polynomial and geometric forms have last values only.
            InfoKind::Polynomial { .. } | InfoKind::Geometric { .. } => false,
        }
    }

    fn product_fits(
        &self,
        graph: &Graph,
        loop_id: LoopId,
        in_body: bool,
        a: InfoId,
        b: InfoId,
        ty: IntType,
    ) -> bool {
        let q = Query {
            graph,
            loop_id,
            in_body,
            chase_hint: None,
        };
        let bounds = |info: InfoId| {
            Some((
                self.is_constant(&q, Some(info), ConstantRequest::AtLeast)?,
                self.is_constant(&q, Some(info), ConstantRequest::AtMost)?,
            ))
        };
        match (bounds(a), bounds(b)) {
            (Some((a_lo, a_hi)), Some((b_lo, b_hi))) => [
                a_lo.checked_mul(b_lo),
                a_lo.checked_mul(b_hi),
                a_hi.checked_mul(b_lo),
                a_hi.checked_mul(b_hi),
            ]
            .iter()
            .all(|corner| corner.is_some_and(|v| ty.contains(v))),
            _ => false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_generate_add_without_overflow(
        &self,
        sink: &mut CodeSink<'_>,
        loop_id: LoopId,
        in_body: bool,
        a: InfoId,
        b: InfoId,
        opa: Option<InstrId>,
        opb: Option<InstrId>,
        ty: IntType,
        result: &mut Option<InstrId>,
    ) -> bool {
        enum Plan {
            Fold(i64),
            UseLeft,
            UseRight,
            Emit,
        }
        let plan = {
            let q = Query {
                graph: sink.graph(),
                loop_id,
                in_body,
                chase_hint: None,
            };
            let ca = self.is_constant(&q, Some(a), ConstantRequest::Exact);
            let cb = self.is_constant(&q, Some(b), ConstantRequest::Exact);
            match (ca, cb) {
                (Some(x), Some(y)) => match x.checked_add(y) {
                    Some(sum) if ty.contains(sum) => Some(Plan::Fold(sum)),
                    _ => None,
                },
                (Some(0), _) => Some(Plan::UseRight),
                (_, Some(0)) => Some(Plan::UseLeft),
                _ => {
                    let lo = self
                        .is_constant(&q, Some(a), ConstantRequest::AtLeast)
                        .zip(self.is_constant(&q, Some(b), ConstantRequest::AtLeast))
                        .and_then(|(x, y)| x.checked_add(y));
                    let hi = self
                        .is_constant(&q, Some(a), ConstantRequest::AtMost)
                        .zip(self.is_constant(&q, Some(b), ConstantRequest::AtMost))
                        .and_then(|(x, y)| x.checked_add(y));
                    match (lo, hi) {
                        (Some(lo), Some(hi)) if ty.contains(lo) && ty.contains(hi) => {
                            Some(Plan::Emit)
                        }
                        _ => None,
                    }
                }
            }
        };
        match plan {
            None => false,
            Some(Plan::Fold(sum)) => {
                *result = sink.constant(ty, sum);
                true
            }
            Some(Plan::UseRight) => {
                *result = opb;
                true
            }
            Some(Plan::UseLeft) => {
                *result = opa;
                true
            }
            Some(Plan::Emit) => {
                if let CodeSink::Emit { graph, block } = sink {
                    if let (Some(x), Some(y)) = (opa, opb) {
                        *result = Some(graph.emit(*block, ty, InstrKind::Add(x, y)));
                    }
                }
                true
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_generate_sub_without_overflow(
        &self,
        sink: &mut CodeSink<'_>,
        loop_id: LoopId,
        in_body: bool,
        a: InfoId,
        b: InfoId,
        opa: Option<InstrId>,
        opb: Option<InstrId>,
        ty: IntType,
        result: &mut Option<InstrId>,
    ) -> bool {
        enum Plan {
            Fold(i64),
            UseLeft,
            Emit,
        }
        let plan = {
            let q = Query {
                graph: sink.graph(),
                loop_id,
                in_body,
                chase_hint: None,
            };
            let ca = self.is_constant(&q, Some(a), ConstantRequest::Exact);
            let cb = self.is_constant(&q, Some(b), ConstantRequest::Exact);
            match (ca, cb) {
                (Some(x), Some(y)) => match x.checked_sub(y) {
                    Some(diff) if ty.contains(diff) => Some(Plan::Fold(diff)),
                    _ => None,
                },
                (_, Some(0)) => Some(Plan::UseLeft),
                _ => {
                    let lo = self
                        .is_constant(&q, Some(a), ConstantRequest::AtLeast)
                        .zip(self.is_constant(&q, Some(b), ConstantRequest::AtMost))
                        .and_then(|(x, y)| x.checked_sub(y));
                    let hi = self
                        .is_constant(&q, Some(a), ConstantRequest::AtMost)
                        .zip(self.is_constant(&q, Some(b), ConstantRequest::AtLeast))
                        .and_then(|(x, y)| x.checked_sub(y));
                    match (lo, hi) {
                        (Some(lo), Some(hi)) if ty.contains(lo) && ty.contains(hi) => {
                            Some(Plan::Emit)
                        }
                        _ => None,
                    }
                }
            }
        };
        match plan {
            None => false,
            Some(Plan::Fold(diff)) => {
                *result = sink.constant(ty, diff);
                true
            }
            Some(Plan::UseLeft) => {
                *result = opa;
                true
            }
            Some(Plan::Emit) => {
                if let CodeSink::Emit { graph, block } = sink {
                    if let (Some(x), Some(y)) = (opa, opb) {
                        *result = Some(graph.emit(*block, ty, InstrKind::Sub(x, y)));
                    }
                }
                true
            }
        }
    }
}
