//! Shared fixtures for range-analysis integration tests

use std::collections::HashMap;
use strider::{
    BlockId, CmpKind, Graph, InductionVarAnalysis, InstrId, InstrKind, IntType, InvariantOp,
    LoopId, Trip, TripKind,
};

/// A canonical counted loop: `entry -> header(phi, cmp) -> body`, with a
/// separate exit block for splicing generated code into
pub struct LoopFixture {
    pub graph: Graph,
    pub analysis: InductionVarAnalysis,
    pub header: BlockId,
    pub body: BlockId,
    pub exit: BlockId,
    pub loop_id: LoopId,
    /// The loop counter phi, classified as `1 * k + 0`
    pub phi: InstrId,
    /// The loop control comparison
    pub control: InstrId,
}

/// `for (i = 0; i < n; i++)` with a compile-time constant `n`
pub fn constant_loop(n: i64) -> LoopFixture {
    let mut graph = Graph::new();
    let entry = graph.entry_block();
    let header = graph.add_block(entry);
    let body = graph.add_block(header);
    let exit = graph.add_block(header);
    let loop_id = graph.add_loop(header, None);
    graph.set_block_loop(body, loop_id);
    let zero = graph.constant(IntType::I32, 0);
    let limit = graph.constant(IntType::I32, n);
    let phi = graph.emit(header, IntType::I32, InstrKind::Phi(vec![zero]));
    let control = graph.emit(header, IntType::I32, InstrKind::Cmp(CmpKind::Lt, phi, limit));
    graph.set_loop_control(loop_id, control);

    let mut analysis = InductionVarAnalysis::new();
    let store = &mut analysis.store;
    let one = store.constant(IntType::I32, 1);
    let start = store.constant(IntType::I32, 0);
    let count = store.constant(IntType::I32, n);
    let info = store.linear(IntType::I32, one, start);
    store.classify(loop_id, phi, info);
    store.set_trip(
        loop_id,
        Trip {
            count,
            taken_test: None,
            kind: TripKind::Constant,
        },
    );

    LoopFixture {
        graph,
        analysis,
        header,
        body,
        exit,
        loop_id,
        phi,
        control,
    }
}

/// `for (i = 0; i < n; i++)` with `n` an opaque parameter; the trip count
/// carries a `0 < n` taken-test. Returns the fixture and `n`.
pub fn symbolic_loop(kind: TripKind) -> (LoopFixture, InstrId) {
    let mut graph = Graph::new();
    let entry = graph.entry_block();
    let n = graph.emit(entry, IntType::I32, InstrKind::Param(0));
    let header = graph.add_block(entry);
    let body = graph.add_block(header);
    let exit = graph.add_block(header);
    let loop_id = graph.add_loop(header, None);
    graph.set_block_loop(body, loop_id);
    let zero = graph.constant(IntType::I32, 0);
    let phi = graph.emit(header, IntType::I32, InstrKind::Phi(vec![zero]));
    let control = graph.emit(header, IntType::I32, InstrKind::Cmp(CmpKind::Lt, phi, n));
    graph.set_loop_control(loop_id, control);

    let mut analysis = InductionVarAnalysis::new();
    let store = &mut analysis.store;
    let one = store.constant(IntType::I32, 1);
    let start = store.constant(IntType::I32, 0);
    let count = store.fetch(IntType::I32, n);
    let zero_info = store.constant(IntType::I32, 0);
    let n_info = store.fetch(IntType::I32, n);
    let taken = store.invariant(IntType::I32, InvariantOp::Lt(zero_info, n_info));
    let info = store.linear(IntType::I32, one, start);
    store.classify(loop_id, phi, info);
    store.set_trip(
        loop_id,
        Trip {
            count,
            taken_test: Some(taken),
            kind,
        },
    );

    (
        LoopFixture {
            graph,
            analysis,
            header,
            body,
            exit,
            loop_id,
            phi,
            control,
        },
        n,
    )
}

/// Interpret an emitted expression against bindings for opaque values
pub fn eval_instr(graph: &Graph, env: &HashMap<InstrId, i64>, id: InstrId) -> i64 {
    if let Some(&v) = env.get(&id) {
        return v;
    }
    let instr = graph.instruction(id);
    let v = match &instr.kind {
        InstrKind::Const(c) => *c,
        InstrKind::Add(a, b) => eval_instr(graph, env, *a) + eval_instr(graph, env, *b),
        InstrKind::Sub(a, b) => eval_instr(graph, env, *a) - eval_instr(graph, env, *b),
        InstrKind::Neg(a) => -eval_instr(graph, env, *a),
        InstrKind::Mul(a, b) => eval_instr(graph, env, *a) * eval_instr(graph, env, *b),
        InstrKind::Div(a, b) => eval_instr(graph, env, *a) / eval_instr(graph, env, *b),
        InstrKind::Rem(a, b) => eval_instr(graph, env, *a) % eval_instr(graph, env, *b),
        InstrKind::Xor(a, b) => eval_instr(graph, env, *a) ^ eval_instr(graph, env, *b),
        InstrKind::Convert(a) => eval_instr(graph, env, *a),
        InstrKind::Cmp(kind, a, b) => {
            let x = eval_instr(graph, env, *a);
            let y = eval_instr(graph, env, *b);
            i64::from(match kind {
                CmpKind::Eq => x == y,
                CmpKind::Ne => x != y,
                CmpKind::Lt => x < y,
                CmpKind::Le => x <= y,
                CmpKind::Gt => x > y,
                CmpKind::Ge => x >= y,
            })
        }
        InstrKind::Select {
            condition,
            if_true,
            if_false,
        } => {
            if eval_instr(graph, env, *condition) != 0 {
                eval_instr(graph, env, *if_true)
            } else {
                eval_instr(graph, env, *if_false)
            }
        }
        other => panic!("instruction needs an environment binding: {other:?}"),
    };
    // Model the instruction's own width.
    match instr.ty {
        IntType::I32 => v as i32 as i64,
        IntType::I64 => v,
    }
}
