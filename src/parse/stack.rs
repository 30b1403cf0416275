//! Parse stacks for the (generalized) LR engine.

use crate::base::StateId;
use crate::tree::GreenElement;

/// One stack entry: the state entered and the green elements contributed
/// by the symbol that entered it (leading trivia and error wraps included).
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub state: StateId,
    pub elements: Vec<GreenElement>,
}

/// One alternative parse stack.
///
/// Under generalized parsing several stacks are live at once; they are
/// logical alternatives processed cooperatively, never OS threads. Forking
/// clones the frame vector — green elements are reference-counted, so a
/// fork shares all tree structure built so far.
#[derive(Debug, Clone)]
pub(crate) struct ParseStack {
    pub frames: Vec<Frame>,
    /// Number of recovery steps taken on this stack; the primary ranking
    /// key when merging and pruning.
    pub errors: u32,
    /// Fork sequence number; the deterministic final tie-break.
    pub fork_order: u32,
}

impl ParseStack {
    pub fn root(start: StateId) -> ParseStack {
        ParseStack {
            frames: vec![Frame {
                state: start,
                elements: Vec::new(),
            }],
            errors: 0,
            fork_order: 0,
        }
    }

    pub fn top_state(&self) -> StateId {
        self.frames.last().expect("bottom frame").state
    }

    pub fn push(&mut self, state: StateId, elements: Vec<GreenElement>) {
        self.frames.push(Frame { state, elements });
    }

    /// Pop the frames of one production body. `None` when the stack is too
    /// shallow (possible only mid-recovery).
    pub fn pop(&mut self, count: usize) -> Option<Vec<Frame>> {
        if self.frames.len() <= count {
            return None;
        }
        Some(self.frames.split_off(self.frames.len() - count))
    }

    /// State sequence, used to detect convergent stacks: two stacks with
    /// the same signature at the same input position have parsed the same
    /// span into the same states and can be merged.
    pub fn signature(&self) -> Vec<StateId> {
        self.frames.iter().map(|f| f.state).collect()
    }

    /// Ranking key: fewer recovery steps first, then earliest fork.
    pub fn rank(&self) -> (u32, u32) {
        (self.errors, self.fork_order)
    }
}
