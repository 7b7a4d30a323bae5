//! Generator and async-function suspension state.
//!
//! Bodies are normalised first (see `lower`): every `yield`/`await` is
//! hoisted to a statement of the canonical form `let %slot = yield expr;`.
//! Suspension therefore only ever happens at statement level, and a
//! suspended body is described by a path of frames from the body root down
//! to the suspend statement. Loop and conditional state lives in the
//! persistent environment chain recorded on the frames, so resuming is a
//! descent along the path with no expression-level continuation capture.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

use tsi_parser::ast::Stmt;

use crate::env::EnvRef;
use crate::value::{FunctionValue, Value};

/// How a suspended body is being resumed.
#[derive(Clone, Debug)]
pub enum GeneratorResume {
    /// `next(value)` / a fulfilled await.
    Next(Value),
    /// `throw(error)` / a rejected await.
    Throw(Value),
    /// `return(value)`: run finalizers and finish.
    Return(Value),
}

/// Why a body suspended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuspendKind {
    Yield,
    Await,
}

/// One step on the suspension path.
#[derive(Clone)]
pub enum PathSeg {
    /// Position in the statement list whose environment is on the frame.
    Index(usize),
    /// Inside a loop body.
    LoopBody,
    IfThen,
    IfElse,
    TryBlock,
    CatchBlock,
    /// Inside a finally block, carrying the completion it will restore.
    FinallyBlock(Option<Box<crate::completion::Completion>>),
    /// Inside a `switch` arm.
    Case(usize),
    LabelBody,
    /// Inside a for-of body; the live iterator rides on the frame.
    ForOfBody(IterHandle),
    ForInBody(IterHandle),
}

/// One frame of the suspension path.
#[derive(Clone)]
pub struct GenFrame {
    pub seg: PathSeg,
    /// Environment of the statement list this frame indexes into
    /// (meaningful on `Index` frames; cloned through on the rest).
    pub env: EnvRef,
}

/// Shared handle to a live iterator (for-of state and yield* delegates
/// survive across suspensions through this).
pub type IterHandle = Rc<RefCell<crate::interp::iter::ValueIterator>>;

/// The suspended-execution record of one generator or async body.
pub struct GeneratorState {
    pub func: Rc<FunctionValue>,
    /// Normalised body shared by every activation of this function.
    pub body: Rc<Vec<Stmt>>,
    /// Function-entry environment (parameters bound).
    pub env: EnvRef,
    pub this: Option<Value>,
    pub started: bool,
    pub done: bool,
    /// Suspension path, root-first; empty when not suspended.
    pub frames: Vec<GenFrame>,
    /// Live `yield*` delegates keyed by the yield expression's node id.
    pub delegates: FxHashMap<u32, IterHandle>,
    /// Guards re-entrant `next()` while the body is running.
    pub running: bool,
}

impl GeneratorState {
    #[must_use]
    pub fn new(
        func: Rc<FunctionValue>,
        body: Rc<Vec<Stmt>>,
        env: EnvRef,
        this: Option<Value>,
    ) -> GeneratorState {
        GeneratorState {
            func,
            body,
            env,
            this,
            started: false,
            done: false,
            frames: Vec::new(),
            delegates: FxHashMap::default(),
            running: false,
        }
    }
}
