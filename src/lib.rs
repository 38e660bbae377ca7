//! Strider: induction-variable range analysis for compiler IRs
//!
//! Strider takes the results of an induction-variable classification pass
//! over a structured IR and answers two families of queries about a value
//! at a program point: a conservative symbolic range `[lo, hi]` it stays
//! inside, and the closed-form value it holds once its loop terminates.
//! Both answers can be materialized back into the IR for clients such as
//! bounds-check elimination and loop-exit substitution.
//!
//! # Features
//!
//! - **Symbolic bounds**: ranges over `a * instr + b` values with checked
//!   coefficient arithmetic that never silently wraps
//! - **Five induction classes**: linear, polynomial, geometric,
//!   wrap-around, and periodic sequences, plus loop invariants
//! - **Guarded emission**: generated bounds report when they additionally
//!   need a taken-test or finite-test, and overflow-unsound forms are
//!   refused rather than emitted
//!
//! # Example
//!
//! ```
//! use strider::{
//!     Graph, InductionVarAnalysis, InductionVarRange, InstrKind, IntType, Trip, TripKind, Value,
//! };
//!
//! // for (i = 0; i < 100; i++) { ... }
//! let mut graph = Graph::new();
//! let entry = graph.entry_block();
//! let header = graph.add_block(entry);
//! let body = graph.add_block(header);
//! let loop_id = graph.add_loop(header, None);
//! graph.set_block_loop(body, loop_id);
//! let zero = graph.constant(IntType::I32, 0);
//! let i = graph.emit(header, IntType::I32, InstrKind::Phi(vec![zero]));
//!
//! // What the classification pass would have recorded for the loop.
//! let mut analysis = InductionVarAnalysis::new();
//! let one = analysis.store.constant(IntType::I32, 1);
//! let start = analysis.store.constant(IntType::I32, 0);
//! let count = analysis.store.constant(IntType::I32, 100);
//! let info = analysis.store.linear(IntType::I32, one, start);
//! analysis.store.classify(loop_id, i, info);
//! analysis.store.set_trip(
//!     loop_id,
//!     Trip { count, taken_test: None, kind: TripKind::Constant },
//! );
//!
//! let range = InductionVarRange::new(&mut analysis);
//! let bounds = range.get_induction_range(&graph, body, i, None).unwrap();
//! assert_eq!(bounds.min, Value::constant(0));
//! assert_eq!(bounds.max, Value::constant(99));
//! assert!(!bounds.needs_finite_test);
//! ```

pub mod induction;
pub mod ir;
pub mod range;

mod error;

pub use error::{Error, Result};
pub use induction::{
    Classifier, GeometricOp, InductionStore, InductionVarAnalysis, InfoId, InfoKind, InfoNode,
    InvariantOp, Trip, TripKind,
};
pub use ir::{BlockId, CmpKind, Graph, InstrId, InstrKind, Instruction, IntType, LoopId};
pub use range::{
    GeneratedRange, Guards, InductionRange, InductionVarRange, TripClass, Value,
};

/// Strider version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
