//! Minimal host IR for the range analyzer
//!
//! The analyzer only needs a narrow slice of a compiler IR: instructions
//! with integral types, basic blocks with a dominator tree, and a loop
//! tree. Everything is stored in handle-indexed arenas; handles are plain
//! `u32` newtypes and nothing is ever freed, so borrowed data never moves
//! out from under a query.

use rustc_hash::FxHashMap as HashMap;
use std::fmt;
use std::iter;

/// Handle of an IR instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub u32);

/// Handle of a basic block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Handle of a natural loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(pub u32);

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop{}", self.0)
    }
}

/// Integral value types understood by the analyzer
///
/// Narrower widths are treated as 32-bit by the host before queries reach
/// the analyzer; floating point values are never classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntType {
    I32,
    I64,
}

impl IntType {
    /// Width of the type in bits
    pub fn bit_width(self) -> u32 {
        match self {
            IntType::I32 => 32,
            IntType::I64 => 64,
        }
    }

    /// Smallest representable value
    pub fn min_value(self) -> i64 {
        match self {
            IntType::I32 => i32::MIN as i64,
            IntType::I64 => i64::MIN,
        }
    }

    /// Largest representable value
    pub fn max_value(self) -> i64 {
        match self {
            IntType::I32 => i32::MAX as i64,
            IntType::I64 => i64::MAX,
        }
    }

    /// Whether `value` is representable in this type
    pub fn contains(self, value: i64) -> bool {
        self.min_value() <= value && value <= self.max_value()
    }

    pub fn is_narrower_than(self, other: IntType) -> bool {
        self.bit_width() < other.bit_width()
    }
}

/// Comparison operators, used by loop controls and taken-tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Instruction payload
///
/// `Convert` records its destination type on the instruction itself; the
/// source type is the operand's. `ArrayGet` is opaque to the analyzer and
/// serves as a fetch sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrKind {
    Const(i64),
    /// Opaque incoming value (method parameter, unanalyzed definition)
    Param(u32),
    Add(InstrId, InstrId),
    Sub(InstrId, InstrId),
    Neg(InstrId),
    Mul(InstrId, InstrId),
    Div(InstrId, InstrId),
    Rem(InstrId, InstrId),
    Xor(InstrId, InstrId),
    Convert(InstrId),
    Cmp(CmpKind, InstrId, InstrId),
    Select {
        condition: InstrId,
        if_true: InstrId,
        if_false: InstrId,
    },
    ArrayGet {
        array: InstrId,
        index: InstrId,
    },
    Phi(Vec<InstrId>),
}

/// An IR instruction: payload, type, and the block that defines it
#[derive(Debug, Clone)]
pub struct Instruction {
    pub kind: InstrKind,
    pub ty: IntType,
    pub block: BlockId,
}

#[derive(Debug, Clone)]
struct BlockData {
    instructions: Vec<InstrId>,
    idom: Option<BlockId>,
    loop_id: Option<LoopId>,
}

#[derive(Debug, Clone)]
struct LoopData {
    header: BlockId,
    parent: Option<LoopId>,
    control: Option<InstrId>,
}

/// The IR container
///
/// Owns the instruction, block, and loop arenas. The entry block exists
/// from construction and holds all interned constants.
#[derive(Debug)]
pub struct Graph {
    instructions: Vec<Instruction>,
    blocks: Vec<BlockData>,
    loops: Vec<LoopData>,
    constants: HashMap<(IntType, i64), InstrId>,
    entry: BlockId,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create a graph with an empty entry block
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            blocks: vec![BlockData {
                instructions: Vec::new(),
                idom: None,
                loop_id: None,
            }],
            loops: Vec::new(),
            constants: HashMap::default(),
            entry: BlockId(0),
        }
    }

    pub fn entry_block(&self) -> BlockId {
        self.entry
    }

    /// Append a block dominated by `idom`
    pub fn add_block(&mut self, idom: BlockId) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BlockData {
            instructions: Vec::new(),
            idom: Some(idom),
            loop_id: None,
        });
        id
    }

    /// Register a natural loop with the given header block
    pub fn add_loop(&mut self, header: BlockId, parent: Option<LoopId>) -> LoopId {
        let id = LoopId(self.loops.len() as u32);
        self.loops.push(LoopData {
            header,
            parent,
            control: None,
        });
        self.blocks[header.0 as usize].loop_id = Some(id);
        id
    }

    /// Record the condition instruction that controls the loop's back edge
    pub fn set_loop_control(&mut self, loop_id: LoopId, control: InstrId) {
        self.loops[loop_id.0 as usize].control = Some(control);
    }

    pub fn loop_control(&self, loop_id: LoopId) -> Option<InstrId> {
        self.loops[loop_id.0 as usize].control
    }

    /// Assign a block to its innermost loop
    pub fn set_block_loop(&mut self, block: BlockId, loop_id: LoopId) {
        self.blocks[block.0 as usize].loop_id = Some(loop_id);
    }

    /// Append a new instruction to `block` and return its handle
    pub fn emit(&mut self, block: BlockId, ty: IntType, kind: InstrKind) -> InstrId {
        let id = InstrId(self.instructions.len() as u32);
        self.instructions.push(Instruction { kind, ty, block });
        self.blocks[block.0 as usize].instructions.push(id);
        id
    }

    /// Interned integer constant, defined in the entry block
    pub fn constant(&mut self, ty: IntType, value: i64) -> InstrId {
        if let Some(&id) = self.constants.get(&(ty, value)) {
            return id;
        }
        let entry = self.entry;
        let id = self.emit(entry, ty, InstrKind::Const(value));
        self.constants.insert((ty, value), id);
        id
    }

    pub fn instruction(&self, id: InstrId) -> &Instruction {
        &self.instructions[id.0 as usize]
    }

    pub fn instr_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn block_instructions(&self, block: BlockId) -> &[InstrId] {
        &self.blocks[block.0 as usize].instructions
    }

    pub fn defining_block(&self, id: InstrId) -> BlockId {
        self.instruction(id).block
    }

    /// The constant payload of `id`, if it is a constant instruction
    pub fn as_constant(&self, id: InstrId) -> Option<i64> {
        match self.instruction(id).kind {
            InstrKind::Const(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_phi(&self, id: InstrId) -> bool {
        matches!(self.instruction(id).kind, InstrKind::Phi(_))
    }

    /// Dominator query over the immediate-dominator tree (reflexive)
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = Some(b);
        while let Some(block) = current {
            if block == a {
                return true;
            }
            current = self.blocks[block.0 as usize].idom;
        }
        false
    }

    /// The innermost loop whose body contains `block`
    pub fn innermost_loop_of(&self, block: BlockId) -> Option<LoopId> {
        self.blocks[block.0 as usize].loop_id
    }

    pub fn loop_header(&self, loop_id: LoopId) -> BlockId {
        self.loops[loop_id.0 as usize].header
    }

    pub fn loop_parent(&self, loop_id: LoopId) -> Option<LoopId> {
        self.loops[loop_id.0 as usize].parent
    }

    /// Whether `block` belongs to `loop_id` or one of its inner loops
    pub fn loop_contains(&self, loop_id: LoopId, block: BlockId) -> bool {
        self.loops_containing(block).any(|l| l == loop_id)
    }

    /// Loops containing `block`, innermost first
    pub fn loops_containing(&self, block: BlockId) -> impl Iterator<Item = LoopId> + '_ {
        iter::successors(self.innermost_loop_of(block), move |&l| self.loop_parent(l))
    }

    /// Phi instructions in the loop's header block
    pub fn header_phis(&self, loop_id: LoopId) -> Vec<InstrId> {
        let header = self.loop_header(loop_id);
        self.block_instructions(header)
            .iter()
            .copied()
            .filter(|&id| self.is_phi(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> (Graph, BlockId, BlockId, BlockId, BlockId) {
        let mut graph = Graph::new();
        let entry = graph.entry_block();
        let left = graph.add_block(entry);
        let right = graph.add_block(entry);
        let join = graph.add_block(entry);
        (graph, entry, left, right, join)
    }

    #[test]
    fn dominance_is_reflexive_and_follows_idom_chain() {
        let (graph, entry, left, right, join) = diamond();
        assert!(graph.dominates(entry, entry));
        assert!(graph.dominates(entry, left));
        assert!(graph.dominates(entry, join));
        assert!(!graph.dominates(left, right));
        assert!(!graph.dominates(join, entry));
    }

    #[test]
    fn constants_are_interned_per_type_and_value() {
        let mut graph = Graph::new();
        let a = graph.constant(IntType::I32, 7);
        let b = graph.constant(IntType::I32, 7);
        let c = graph.constant(IntType::I64, 7);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(graph.as_constant(a), Some(7));
        assert_eq!(graph.defining_block(a), graph.entry_block());
    }

    #[test]
    fn loop_tree_membership_walks_outward() {
        let mut graph = Graph::new();
        let entry = graph.entry_block();
        let outer_header = graph.add_block(entry);
        let inner_header = graph.add_block(outer_header);
        let inner_body = graph.add_block(inner_header);
        let outer = graph.add_loop(outer_header, None);
        let inner = graph.add_loop(inner_header, Some(outer));
        graph.set_block_loop(inner_body, inner);

        assert!(graph.loop_contains(inner, inner_body));
        assert!(graph.loop_contains(outer, inner_body));
        assert!(!graph.loop_contains(inner, outer_header));
        assert_eq!(
            graph.loops_containing(inner_body).collect::<Vec<_>>(),
            vec![inner, outer]
        );
    }

    #[test]
    fn header_phis_filters_non_phi_instructions() {
        let mut graph = Graph::new();
        let entry = graph.entry_block();
        let header = graph.add_block(entry);
        let l = graph.add_loop(header, None);
        let zero = graph.constant(IntType::I32, 0);
        let phi = graph.emit(header, IntType::I32, InstrKind::Phi(vec![zero]));
        let add = graph.emit(header, IntType::I32, InstrKind::Add(phi, zero));
        let phis = graph.header_phis(l);
        assert_eq!(phis, vec![phi]);
        assert!(!phis.contains(&add));
    }
}
