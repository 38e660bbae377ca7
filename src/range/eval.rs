//! Recursive evaluation of induction descriptions into symbolic bounds
//!
//! Every entry point takes an `is_min` side and returns a [`Value`]; the
//! same description is evaluated twice to obtain a range. Trip counts feed
//! in as the iteration-counter interval `[0, T-1]` (or `[0, T]` once the
//! loop is behind the context).

use super::value::Value;
use super::{InductionVarRange, Query};
use crate::induction::{GeometricOp, InfoId, InfoKind, InvariantOp, Trip};
use crate::ir::{InstrId, InstrKind, IntType};

/// How much of a constant answer a caller needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstantRequest {
    Exact,
    AtMost,
    AtLeast,
}

fn constant_value(c: i64) -> Value {
    match i32::try_from(c) {
        Ok(c) => Value::constant(c),
        Err(_) => Value::Unknown,
    }
}

pub(crate) fn checked_pow(base: i64, exp: i64) -> Option<i64> {
    if base == 1 {
        return Some(1);
    }
    let mut result: i64 = 1;
    for _ in 0..exp {
        result = result.checked_mul(base)?;
    }
    Some(result)
}

impl InductionVarRange<'_> {
    /// Evaluate one side of the bound of `info`
    pub(crate) fn get_val(
        &self,
        q: &Query<'_>,
        info: Option<InfoId>,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        let info = match info {
            Some(info) => info,
            None => return Value::Unknown,
        };
        let node = self.analysis.store.node(info);
        match &node.kind {
            InfoKind::Invariant(op) => match *op {
                InvariantOp::Add(a, b) => self
                    .get_val(q, Some(a), trip, is_min)
                    .add(self.get_val(q, Some(b), trip, is_min)),
                InvariantOp::Sub(a, b) => self
                    .get_val(q, Some(a), trip, is_min)
                    .sub(self.get_val(q, Some(b), trip, !is_min)),
                InvariantOp::Neg(a) => {
                    Value::constant(0).sub(self.get_val(q, Some(a), trip, !is_min))
                }
                InvariantOp::Mul(a, b) => self.get_mul(q, a, b, trip, is_min),
                InvariantOp::Div(a, b) => self.get_div(q, a, b, trip, is_min),
                InvariantOp::Rem(a, b) => self.get_rem(q, a, b, is_min),
                InvariantOp::Xor(a, b) => self.get_xor(q, a, b),
                InvariantOp::Lt(..)
                | InvariantOp::Le(..)
                | InvariantOp::Gt(..)
                | InvariantOp::Ge(..) => Value::Unknown,
                InvariantOp::Fetch(instr) => self.get_fetch(q, instr, trip, is_min),
                InvariantOp::Constant(c) => constant_value(c),
                InvariantOp::Convert(child) => {
                    self.get_conversion(q, child, node.ty, trip, is_min)
                }
            },
            InfoKind::Linear { stride, offset } => {
                self.get_linear(q, *stride, *offset, node.ty, trip, is_min)
            }
            InfoKind::Polynomial { sum, offset } => {
                self.get_polynomial(q, *sum, *offset, trip, is_min)
            }
            InfoKind::Geometric {
                scale,
                offset,
                ratio,
                op,
            } => self.get_geometric(q, *scale, *offset, *ratio, *op, trip, is_min),
            InfoKind::WrapAround { initial, body } => self
                .get_val(q, Some(*initial), trip, is_min)
                .merge(self.get_val(q, Some(*body), trip, is_min), is_min),
            InfoKind::Periodic { phases } => {
                let mut phases = phases.iter();
                let first = match phases.next() {
                    Some(&p) => p,
                    None => return Value::Unknown,
                };
                let mut bound = self.get_val(q, Some(first), trip, is_min);
                for &phase in phases {
                    bound = bound.merge(self.get_val(q, Some(phase), trip, is_min), is_min);
                }
                bound
            }
        }
    }

    /// Bound of the iteration counter: `0` on the min side, `T-1` inside
    /// the body and `T` past it on the max side
    pub(crate) fn get_trip_range(
        &self,
        q: &Query<'_>,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        let trip = match trip {
            Some(trip) => trip,
            None => return Value::Unknown,
        };
        if is_min {
            return Value::constant(0);
        }
        let count = self.get_val(q, Some(trip.count), None, false);
        if q.in_body {
            count.sub(Value::constant(1))
        } else {
            count
        }
    }

    /// Resolve an opaque fetch, chasing through constants and foldable
    /// arithmetic until the chase hint or an unanalyzable definition
    fn get_fetch(
        &self,
        q: &Query<'_>,
        instr: InstrId,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        if let Some(c) = q.graph.as_constant(instr) {
            if let Ok(c) = i32::try_from(c) {
                return Value::constant(c);
            }
            return Value::affine(instr, 1, 0);
        }
        if q.chase_hint == Some(instr) {
            return Value::affine(instr, 1, 0);
        }
        match q.graph.instruction(instr).kind {
            InstrKind::Add(lhs, rhs) => {
                if let Some(c) = self.constant32(q, lhs) {
                    return Value::constant(c).add(self.get_fetch(q, rhs, trip, is_min));
                }
                if let Some(c) = self.constant32(q, rhs) {
                    return self.get_fetch(q, lhs, trip, is_min).add(Value::constant(c));
                }
            }
            InstrKind::Sub(lhs, rhs) => {
                if let Some(c) = self.constant32(q, lhs) {
                    return Value::constant(c).sub(self.get_fetch(q, rhs, trip, !is_min));
                }
                if let Some(c) = self.constant32(q, rhs) {
                    return self.get_fetch(q, lhs, trip, is_min).sub(Value::constant(c));
                }
            }
            InstrKind::Convert(input) => {
                // Chase beyond a widening conversion; analysis is 32-bit
                let src = q.graph.instruction(input).ty;
                let dst = q.graph.instruction(instr).ty;
                if src == IntType::I32 && dst == IntType::I64 {
                    return self.get_fetch(q, input, trip, is_min);
                }
            }
            _ => {}
        }
        // A fetch of the home loop's own counter closes the recursion on
        // symbolic trip counts: substitute the counter's bounds.
        if trip.is_some() {
            let def_loop = q.graph.innermost_loop_of(q.graph.defining_block(instr));
            if def_loop == Some(q.loop_id) && self.is_primary_induction(q, instr) {
                return if is_min {
                    Value::constant(0)
                } else {
                    self.get_trip_range(q, trip, false)
                };
            }
        }
        Value::affine(instr, 1, 0)
    }

    fn constant32(&self, q: &Query<'_>, instr: InstrId) -> Option<i32> {
        q.graph
            .as_constant(instr)
            .and_then(|c| i32::try_from(c).ok())
    }

    fn is_primary_induction(&self, q: &Query<'_>, instr: InstrId) -> bool {
        if let Some(info) = self.analysis.lookup_info(q.loop_id, instr) {
            if let InfoKind::Linear { stride, offset } = self.analysis.store.node(info).kind {
                return self.is_constant(q, Some(stride), ConstantRequest::Exact) == Some(1)
                    && self.is_constant(q, Some(offset), ConstantRequest::Exact) == Some(0);
            }
        }
        false
    }

    fn get_linear(
        &self,
        q: &Query<'_>,
        stride: InfoId,
        offset: InfoId,
        ty: IntType,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        // An offset inside the trip count cancels against the induction's
        // own offset: for i in [0, p - q) the maximum of i + q is p - 1.
        // Detecting the cancellation keeps the bound exact where the
        // intermediate values alone would not fold.
        if let Some(trip) = trip {
            let store = &self.analysis.store;
            let count_node = store.node(trip.count);
            if count_node.ty == ty {
                if let InfoKind::Invariant(InvariantOp::Sub(pos, neg)) = count_node.kind {
                    match self.is_constant(q, Some(stride), ConstantRequest::Exact) {
                        Some(1) if !is_min && store.info_equal(neg, offset) => {
                            let v = self.get_val(q, Some(pos), Some(trip), false);
                            return if q.in_body {
                                v.sub(Value::constant(1))
                            } else {
                                v
                            };
                        }
                        Some(-1) if is_min && store.info_equal(pos, offset) => {
                            let v = self.get_val(q, Some(neg), Some(trip), true);
                            return if q.in_body {
                                v.add(Value::constant(1))
                            } else {
                                v
                            };
                        }
                        _ => {}
                    }
                }
            }
        }
        // General rule: stride * counter + offset with the counter at the
        // endpoint selected by the sign of the stride.
        self.get_mul_counter(q, stride, trip, is_min)
            .add(self.get_val(q, Some(offset), trip, is_min))
    }

    fn get_mul_counter(
        &self,
        q: &Query<'_>,
        stride: InfoId,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        if let Some(value) = self.is_constant(q, Some(stride), ConstantRequest::Exact) {
            return self.mul_counter_and_constant(q, value, trip, is_min);
        }
        let s_min = self.get_val(q, Some(stride), trip, true);
        let s_max = self.get_val(q, Some(stride), trip, false);
        let k_min = self.get_trip_range(q, trip, true);
        let k_max = self.get_trip_range(q, trip, false);
        mul_intervals(s_min, s_max, k_min, k_max, is_min)
    }

    fn mul_counter_and_constant(
        &self,
        q: &Query<'_>,
        value: i64,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        match i32::try_from(value) {
            Ok(v) => {
                let side = if value >= 0 { is_min } else { !is_min };
                self.get_trip_range(q, trip, side).mul(Value::constant(v))
            }
            Err(_) => Value::Unknown,
        }
    }

    fn get_mul(
        &self,
        q: &Query<'_>,
        info1: InfoId,
        info2: InfoId,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        if let Some(value) = self.is_constant(q, Some(info1), ConstantRequest::Exact) {
            return self.mul_range_and_constant(q, value, info2, trip, is_min);
        }
        if let Some(value) = self.is_constant(q, Some(info2), ConstantRequest::Exact) {
            return self.mul_range_and_constant(q, value, info1, trip, is_min);
        }
        let a_min = self.get_val(q, Some(info1), trip, true);
        let a_max = self.get_val(q, Some(info1), trip, false);
        let b_min = self.get_val(q, Some(info2), trip, true);
        let b_max = self.get_val(q, Some(info2), trip, false);
        mul_intervals(a_min, a_max, b_min, b_max, is_min)
    }

    fn mul_range_and_constant(
        &self,
        q: &Query<'_>,
        value: i64,
        info: InfoId,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        match i32::try_from(value) {
            Ok(v) => {
                let side = if value >= 0 { is_min } else { !is_min };
                self.get_val(q, Some(info), trip, side).mul(Value::constant(v))
            }
            Err(_) => Value::Unknown,
        }
    }

    fn get_div(
        &self,
        q: &Query<'_>,
        info1: InfoId,
        info2: InfoId,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        match self.is_constant(q, Some(info2), ConstantRequest::Exact) {
            Some(divisor) if divisor != 0 => match i32::try_from(divisor) {
                Ok(d) => {
                    let side = if divisor >= 0 { is_min } else { !is_min };
                    self.get_val(q, Some(info1), trip, side).div(Value::constant(d))
                }
                Err(_) => Value::Unknown,
            },
            _ => Value::Unknown,
        }
    }

    fn get_rem(&self, q: &Query<'_>, info1: InfoId, info2: InfoId, is_min: bool) -> Value {
        let divisor = match self.is_constant(q, Some(info2), ConstantRequest::Exact) {
            Some(d) if d != 0 => d,
            _ => return Value::Unknown,
        };
        if let Some(dividend) = self.is_constant(q, Some(info1), ConstantRequest::Exact) {
            return match dividend.checked_rem(divisor) {
                Some(rem) => constant_value(rem),
                None => Value::Unknown,
            };
        }
        let bound = match divisor
            .checked_abs()
            .and_then(|d| d.checked_sub(1))
            .and_then(|d| i32::try_from(d).ok())
        {
            Some(bound) => bound,
            None => return Value::Unknown,
        };
        let non_negative = self
            .is_constant(q, Some(info1), ConstantRequest::AtLeast)
            .is_some_and(|lo| lo >= 0);
        match (non_negative, is_min) {
            (true, true) => Value::constant(0),
            (false, true) => Value::constant(-bound),
            (_, false) => Value::constant(bound),
        }
    }

    fn get_xor(&self, q: &Query<'_>, info1: InfoId, info2: InfoId) -> Value {
        // Xor of symbolic values has no tight bound; fold sign-free
        // constants and give up otherwise.
        match (
            self.is_constant(q, Some(info1), ConstantRequest::Exact),
            self.is_constant(q, Some(info2), ConstantRequest::Exact),
        ) {
            (Some(x), Some(y)) if x >= 0 && y >= 0 => constant_value(x ^ y),
            _ => Value::Unknown,
        }
    }

    fn get_conversion(
        &self,
        q: &Query<'_>,
        child: InfoId,
        dst: IntType,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        let v = self.get_val(q, Some(child), trip, is_min);
        let src = self.analysis.store.node(child).ty;
        if dst.is_narrower_than(src) {
            if let Some(c) = v.as_constant() {
                if dst.contains(c as i64) {
                    return v;
                }
            }
            // Truncation may apply; collapse to the destination's bounds.
            return if is_min {
                Value::constant(dst.min_value() as i32)
            } else {
                Value::constant(dst.max_value() as i32)
            };
        }
        v
    }

    fn get_polynomial(
        &self,
        q: &Query<'_>,
        sum: InfoId,
        offset: InfoId,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        let (stride, sum_offset) = match self.analysis.store.node(sum).kind {
            InfoKind::Linear { stride, offset } => (stride, offset),
            _ => return Value::Unknown,
        };
        let a = match self.is_constant(q, Some(stride), ConstantRequest::Exact) {
            Some(a) if (0..=i32::MAX as i64).contains(&a) => a as i32,
            _ => return Value::Unknown,
        };
        let b = match self.is_constant(q, Some(sum_offset), ConstantRequest::Exact) {
            Some(b) if (0..=i32::MAX as i64).contains(&b) => b as i32,
            _ => return Value::Unknown,
        };
        let c = self.get_val(q, Some(offset), trip, is_min);
        if is_min {
            // With non-negative coefficients the sum is empty at the first
            // iteration, so the start value is the minimum.
            return c;
        }
        // sum_{i=0}^{m-1} (a*i + b) + c  ==  a*(m*(m-1))/2 + b*m + c
        let m = self.get_trip_range(q, trip, false);
        let t = m.mul(m.sub(Value::constant(1))).div(Value::constant(2));
        Value::constant(a)
            .mul(t)
            .add(Value::constant(b).mul(m))
            .add(c)
    }

    fn get_geometric(
        &self,
        q: &Query<'_>,
        scale: InfoId,
        offset: InfoId,
        ratio: i64,
        op: GeometricOp,
        trip: Option<&Trip>,
        is_min: bool,
    ) -> Value {
        if ratio < 1 {
            return Value::Unknown;
        }
        let a = match self
            .is_constant(q, Some(scale), ConstantRequest::Exact)
            .and_then(|a| i32::try_from(a).ok())
        {
            Some(a) => a,
            None => return Value::Unknown,
        };
        let offset_val = self.get_val(q, Some(offset), trip, is_min);
        // The sign of the scale decides which endpoint each side lands on.
        let is_min_a = if a >= 0 { is_min } else { !is_min };
        match op {
            GeometricOp::Div => {
                // a / ratio^k + b decays from a + b toward b.
                if is_min_a {
                    offset_val
                } else {
                    offset_val.add(Value::constant(a))
                }
            }
            GeometricOp::Mul => {
                // a * ratio^k + b grows away from a + b.
                if is_min_a {
                    return offset_val.add(Value::constant(a));
                }
                let m = match self.get_trip_range(q, trip, false).as_constant() {
                    Some(m) if m >= 0 => m as i64,
                    _ => return Value::Unknown,
                };
                let scaled = checked_pow(ratio, m)
                    .and_then(|p| (a as i64).checked_mul(p))
                    .and_then(|v| i32::try_from(v).ok());
                match scaled {
                    Some(v) => offset_val.add(Value::constant(v)),
                    None => Value::Unknown,
                }
            }
        }
    }

    /// Constant evaluation of an invariant, accepting only proper ranges
    pub(crate) fn is_constant(
        &self,
        q: &Query<'_>,
        info: Option<InfoId>,
        request: ConstantRequest,
    ) -> Option<i64> {
        let info = info?;
        if let InfoKind::Invariant(op) = &self.analysis.store.node(info).kind {
            match *op {
                InvariantOp::Constant(c) => return Some(c),
                InvariantOp::Fetch(instr) => {
                    if let Some(c) = q.graph.as_constant(instr) {
                        return Some(c);
                    }
                }
                _ => {}
            }
        }
        let sub = Query {
            graph: q.graph,
            loop_id: q.loop_id,
            in_body: true,
            chase_hint: q.chase_hint,
        };
        let min = self.get_val(&sub, Some(info), None, true).as_constant()?;
        let max = self.get_val(&sub, Some(info), None, false).as_constant()?;
        if min > max {
            return None;
        }
        match request {
            ConstantRequest::Exact => (min == max).then_some(min as i64),
            ConstantRequest::AtMost => Some(max as i64),
            ConstantRequest::AtLeast => Some(min as i64),
        }
    }
}

/// Interval multiplication by sign analysis of the constant endpoints
fn mul_intervals(a_min: Value, a_max: Value, b_min: Value, b_max: Value, is_min: bool) -> Value {
    let const_ge_zero = |v: Value| v.as_constant().is_some_and(|c| c >= 0);
    let const_le_zero = |v: Value| v.as_constant().is_some_and(|c| c <= 0);
    if const_ge_zero(a_min) {
        if const_ge_zero(b_min) {
            return if is_min {
                a_min.mul(b_min)
            } else {
                a_max.mul(b_max)
            };
        } else if const_le_zero(b_max) {
            return if is_min {
                a_max.mul(b_min)
            } else {
                a_min.mul(b_max)
            };
        }
    } else if const_le_zero(a_max) {
        if const_ge_zero(b_min) {
            return if is_min {
                a_min.mul(b_max)
            } else {
                a_max.mul(b_min)
            };
        } else if const_le_zero(b_max) {
            return if is_min {
                a_max.mul(b_max)
            } else {
                a_min.mul(b_min)
            };
        }
    }
    Value::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::induction::{InductionVarAnalysis, TripKind};
    use crate::ir::{Graph, InstrKind};

    struct Fixture {
        graph: Graph,
        analysis: InductionVarAnalysis,
        phi: crate::ir::InstrId,
    }

    /// One loop `for (i = 0; i < 100; i++)` with its phi classified
    fn fixture() -> (Fixture, crate::ir::LoopId, crate::ir::BlockId) {
        let mut graph = Graph::new();
        let entry = graph.entry_block();
        let header = graph.add_block(entry);
        let body = graph.add_block(header);
        let loop_id = graph.add_loop(header, None);
        graph.set_block_loop(body, loop_id);

        let mut analysis = InductionVarAnalysis::new();
        let store = &mut analysis.store;
        let one = store.constant(IntType::I32, 1);
        let zero = store.constant(IntType::I32, 0);
        let hundred = store.constant(IntType::I32, 100);
        let zero_i = graph.constant(IntType::I32, 0);
        let phi = graph.emit(header, IntType::I32, InstrKind::Phi(vec![zero_i]));
        let linear = store.linear(IntType::I32, one, zero);
        store.classify(loop_id, phi, linear);
        store.set_trip(
            loop_id,
            crate::induction::Trip {
                count: hundred,
                taken_test: None,
                kind: TripKind::Constant,
            },
        );
        (Fixture { graph, analysis, phi }, loop_id, body)
    }

    #[test]
    fn fetching_the_loop_counter_substitutes_its_bounds() {
        let (mut fx, loop_id, _body) = fixture();
        let trip = fx.analysis.store.trip(loop_id).cloned();
        let phi = fx.phi;
        let range = InductionVarRange::new(&mut fx.analysis);
        let q = Query {
            graph: &fx.graph,
            loop_id,
            in_body: true,
            chase_hint: None,
        };
        assert_eq!(range.get_fetch(&q, phi, trip.as_ref(), true), Value::constant(0));
        assert_eq!(
            range.get_fetch(&q, phi, trip.as_ref(), false),
            Value::constant(99)
        );
    }

    #[test]
    fn fetch_chases_added_constants() {
        let (mut fx, loop_id, _body) = fixture();
        let entry = fx.graph.entry_block();
        let x = fx.graph.emit(entry, IntType::I32, InstrKind::Param(0));
        let three = fx.graph.constant(IntType::I32, 3);
        let sum = fx.graph.emit(entry, IntType::I32, InstrKind::Add(x, three));
        let range = InductionVarRange::new(&mut fx.analysis);
        let q = Query {
            graph: &fx.graph,
            loop_id,
            in_body: true,
            chase_hint: None,
        };
        assert_eq!(range.get_fetch(&q, sum, None, false), Value::affine(x, 1, 3));
        // With the hint at the addition itself, chasing stops there.
        let q_hint = Query {
            chase_hint: Some(sum),
            graph: &fx.graph,
            loop_id,
            in_body: true,
        };
        assert_eq!(
            range.get_fetch(&q_hint, sum, None, false),
            Value::affine(sum, 1, 0)
        );
    }

    #[test]
    fn rem_bounds_depend_on_dividend_sign() {
        let (mut fx, loop_id, _) = fixture();
        let store = &mut fx.analysis.store;
        let d = store.constant(IntType::I32, 8);
        let pos = store.constant(IntType::I32, 30);
        let entry = fx.graph.entry_block();
        let x = fx.graph.emit(entry, IntType::I32, InstrKind::Param(0));
        let opaque = fx.analysis.store.fetch(IntType::I32, x);
        let range = InductionVarRange::new(&mut fx.analysis);
        let q = Query {
            graph: &fx.graph,
            loop_id,
            in_body: true,
            chase_hint: None,
        };
        // Constant dividend folds exactly.
        assert_eq!(range.get_rem(&q, pos, d, true), Value::constant(6));
        // Unknown-sign dividend widens to both sides of the divisor.
        assert_eq!(range.get_rem(&q, opaque, d, true), Value::constant(-7));
        assert_eq!(range.get_rem(&q, opaque, d, false), Value::constant(7));
    }

    #[test]
    fn narrowing_conversion_collapses_to_type_bounds() {
        let (mut fx, loop_id, _) = fixture();
        let entry = fx.graph.entry_block();
        let x = fx.graph.emit(entry, IntType::I64, InstrKind::Param(0));
        let store = &mut fx.analysis.store;
        let wide = store.fetch(IntType::I64, x);
        let narrowed = store.invariant(IntType::I32, InvariantOp::Convert(wide));
        let small = store.constant(IntType::I64, 12);
        let folded = store.invariant(IntType::I32, InvariantOp::Convert(small));
        let range = InductionVarRange::new(&mut fx.analysis);
        let q = Query {
            graph: &fx.graph,
            loop_id,
            in_body: true,
            chase_hint: None,
        };
        assert_eq!(
            range.get_val(&q, Some(narrowed), None, true),
            Value::constant(i32::MIN)
        );
        assert_eq!(
            range.get_val(&q, Some(narrowed), None, false),
            Value::constant(i32::MAX)
        );
        assert_eq!(range.get_val(&q, Some(folded), None, false), Value::constant(12));
    }

    #[test]
    fn xor_folds_non_negative_constants_only() {
        let (mut fx, loop_id, _) = fixture();
        let store = &mut fx.analysis.store;
        let a = store.constant(IntType::I32, 12);
        let b = store.constant(IntType::I32, 10);
        let neg = store.constant(IntType::I32, -1);
        let range = InductionVarRange::new(&mut fx.analysis);
        let q = Query {
            graph: &fx.graph,
            loop_id,
            in_body: true,
            chase_hint: None,
        };
        assert_eq!(range.get_xor(&q, a, b), Value::constant(6));
        assert_eq!(range.get_xor(&q, a, neg), Value::Unknown);
    }

    #[test]
    fn polynomial_sum_has_closed_form_maximum() {
        let (mut fx, loop_id, _) = fixture();
        let store = &mut fx.analysis.store;
        let one = store.constant(IntType::I32, 1);
        let zero = store.constant(IntType::I32, 0);
        let linear = store.linear(IntType::I32, one, zero);
        // sum of 0 + 1 + ... + (k-1), starting at 5
        let five = store.constant(IntType::I32, 5);
        let poly = store.polynomial(IntType::I32, linear, five);
        let trip = fx.analysis.store.trip(loop_id).cloned();
        let range = InductionVarRange::new(&mut fx.analysis);
        let q = Query {
            graph: &fx.graph,
            loop_id,
            in_body: true,
            chase_hint: None,
        };
        assert_eq!(
            range.get_val(&q, Some(poly), trip.as_ref(), true),
            Value::constant(5)
        );
        // In the body the counter tops out at 99: 99*98/2 + 5.
        assert_eq!(
            range.get_val(&q, Some(poly), trip.as_ref(), false),
            Value::constant(99 * 98 / 2 + 5)
        );
    }
}
