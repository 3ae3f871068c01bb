//! Deferred cleanups and fault recovery.
//!
//! Every call that may register cleanups runs as a frame of a [`CallStack`].
//! Cleanups run in reverse registration order when the frame exits, whether
//! the body returned or faulted. Each cleanup runs in a frame of its own,
//! marked as deferred; [`Frame::recover`] succeeds only there, and only while
//! the frame that registered the cleanup is unwinding.

use std::cell::RefCell;

use crate::fault::{Fault, FaultResult};
use crate::value::{Func, Value};

type Cleanup = Box<dyn FnOnce(&Frame<'_>) -> FaultResult<()>>;

/// A fault propagating out of a frame, with the faults it replaced.
struct InFlight {
    fault: Fault,
    superseded: Vec<Fault>,
}

#[derive(Default)]
struct FrameState {
    cleanups: Vec<Cleanup>,
    unwinding: Option<InFlight>,
    deferred: bool,
}

/// What `recover()` returns: the fault being propagated, and any earlier
/// faults a cleanup replaced while unwinding, oldest first.
#[derive(Debug)]
pub struct Recovered {
    pub fault: Fault,
    pub superseded: Vec<Fault>,
}

/// How a frame finished when it did not propagate a fault.
#[derive(Debug)]
pub enum Outcome<R> {
    Returned(R),
    /// The body faulted and a cleanup recovered; the caller continues with
    /// the zero results.
    Recovered,
}

impl<R> Outcome<R> {
    pub fn returned(self) -> Option<R> {
        match self {
            Outcome::Returned(value) => Some(value),
            Outcome::Recovered => None,
        }
    }
}

#[derive(Default)]
pub struct CallStack {
    frames: RefCell<Vec<FrameState>>,
}

/// Handle onto one active frame.
pub struct Frame<'s> {
    stack: &'s CallStack,
    depth: usize,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Run `body` as the outermost frame.
    pub fn run<R>(&self, body: impl FnOnce(&Frame<'_>) -> FaultResult<R>) -> FaultResult<Outcome<R>> {
        self.enter(false, body)
    }

    fn enter<R>(
        &self,
        deferred: bool,
        body: impl FnOnce(&Frame<'_>) -> FaultResult<R>,
    ) -> FaultResult<Outcome<R>> {
        let depth = {
            let mut frames = self.frames.borrow_mut();
            frames.push(FrameState {
                deferred,
                ..FrameState::default()
            });
            frames.len() - 1
        };
        let frame = Frame { stack: self, depth };

        let returned = match body(&frame) {
            Ok(value) => Some(value),
            Err(fault) => {
                tracing::debug!(depth, %fault, "fault raised");
                self.frames.borrow_mut()[depth].unwinding = Some(InFlight {
                    fault,
                    superseded: Vec::new(),
                });
                None
            }
        };

        loop {
            let next = self.frames.borrow_mut()[depth].cleanups.pop();
            let Some(cleanup) = next else {
                break;
            };
            if let Err(fault) = self.enter(true, cleanup) {
                let mut frames = self.frames.borrow_mut();
                let state = &mut frames[depth];
                let superseded = match state.unwinding.take() {
                    Some(InFlight {
                        fault: old,
                        mut superseded,
                    }) => {
                        tracing::debug!(depth, %old, new = %fault, "fault superseded");
                        superseded.push(old);
                        superseded
                    }
                    None => {
                        tracing::debug!(depth, %fault, "fault raised in cleanup");
                        Vec::new()
                    }
                };
                state.unwinding = Some(InFlight { fault, superseded });
            }
        }

        let state = self.frames.borrow_mut().pop();
        match (state.and_then(|s| s.unwinding), returned) {
            (Some(in_flight), _) => Err(in_flight.fault),
            (None, Some(value)) => Ok(Outcome::Returned(value)),
            (None, None) => Ok(Outcome::Recovered),
        }
    }
}

impl Frame<'_> {
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Register a cleanup for this frame.
    pub fn defer(&self, action: impl FnOnce(&Frame<'_>) -> FaultResult<()> + 'static) {
        self.stack.frames.borrow_mut()[self.depth]
            .cleanups
            .push(Box::new(action));
    }

    /// `defer f(args...)`: the function value and its arguments are
    /// evaluated now, the call happens at frame exit.
    pub fn defer_call(&self, func: Func, args: Vec<Value>) {
        self.defer(move |_| func.call(&args).map(|_| ()));
    }

    /// Run `body` as a callee frame.
    pub fn call<R>(&self, body: impl FnOnce(&Frame<'_>) -> FaultResult<R>) -> FaultResult<Outcome<R>> {
        self.stack.enter(false, body)
    }

    /// Stop the fault propagating out of the frame whose cleanup this is.
    ///
    /// Returns `None` outside a cleanup, inside a function called from a
    /// cleanup, and when the registering frame is not unwinding.
    pub fn recover(&self) -> Option<Recovered> {
        if self.depth == 0 {
            return None;
        }
        let mut frames = self.stack.frames.borrow_mut();
        if !frames[self.depth].deferred {
            return None;
        }
        let in_flight = frames[self.depth - 1].unwinding.take()?;
        tracing::debug!(depth = self.depth - 1, fault = %in_flight.fault, "fault recovered");
        Some(Recovered {
            fault: in_flight.fault,
            superseded: in_flight.superseded,
        })
    }
}
