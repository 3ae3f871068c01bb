//! Channels.
//!
//! Blocking operations are futures. A task that cannot complete parks an
//! entry in the channel's send or receive queue and is completed in place by
//! the counterpart operation, which then wakes it. Whatever executor polls
//! the futures is the scheduler; the runtime never blocks the thread.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use gossamer_core::RuntimeConfig;
use rand::Rng;

use crate::fault::{Fault, FaultResult};
use crate::types::Type;
use crate::value::Value;

/// A channel value. The zero value is the nil channel, on which sends and
/// receives block forever.
#[derive(Clone, Default)]
pub struct Chan(Option<Rc<Channel>>);

pub struct Channel {
    elem: Type,
    capacity: usize,
    state: RefCell<ChanState>,
}

#[derive(Default)]
struct ChanState {
    buffer: VecDeque<Value>,
    senders: VecDeque<Rc<Parked>>,
    receivers: VecDeque<Rc<Parked>>,
    closed: bool,
}

/// How a parked operation was completed by its counterpart.
enum Completion {
    Received { case: usize, value: Value, ok: bool },
    Sent { case: usize },
    SendClosed { case: usize },
}

/// A suspended task. One waiter may be parked on several queues at once
/// (select); the first counterpart to complete it wins and the other entries
/// go stale.
#[derive(Default)]
struct Waiter {
    completion: RefCell<Option<Completion>>,
    waker: RefCell<Option<Waker>>,
}

impl Waiter {
    fn is_done(&self) -> bool {
        self.completion.borrow().is_some()
    }

    fn complete(&self, completion: Completion) {
        *self.completion.borrow_mut() = Some(completion);
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }

    fn register(&self, cx: &Context<'_>) {
        *self.waker.borrow_mut() = Some(cx.waker().clone());
    }
}

/// A queue entry: the waiter, which of its cases this is, and for senders
/// the value to hand over.
struct Parked {
    waiter: Rc<Waiter>,
    case: usize,
    value: RefCell<Option<Value>>,
}

impl ChanState {
    /// Pop stale entries off the front of `queue`, then pop the first live one.
    fn pop_live(queue: &mut VecDeque<Rc<Parked>>) -> Option<Rc<Parked>> {
        while let Some(parked) = queue.pop_front() {
            if !parked.waiter.is_done() {
                return Some(parked);
            }
        }
        None
    }

    fn has_live(queue: &VecDeque<Rc<Parked>>) -> bool {
        queue.iter().any(|parked| !parked.waiter.is_done())
    }
}

fn send_on_closed() -> Fault {
    Fault::runtime("send on closed channel")
}

/// `make(chan T, size)`.
pub fn make_chan(ty: Type, size: i64) -> FaultResult<Chan> {
    if size < 0 || size > RuntimeConfig::current().max_index {
        return Err(Fault::runtime("makechan: size out of range"));
    }
    Ok(Chan(Some(Rc::new(Channel {
        elem: ty.elem(),
        capacity: size as usize,
        state: RefCell::new(ChanState::default()),
    }))))
}

impl Chan {
    pub fn nil() -> Self {
        Chan(None)
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }

    pub fn ptr_eq(&self, other: &Chan) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub(crate) fn identity(&self) -> Option<usize> {
        self.0.as_ref().map(|c| Rc::as_ptr(c) as *const () as usize)
    }

    /// `len(c)`: buffered elements.
    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, |c| c.state.borrow().buffer.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `cap(c)`.
    pub fn cap(&self) -> usize {
        self.0.as_ref().map_or(0, |c| c.capacity)
    }

    pub fn is_closed(&self) -> bool {
        self.0.as_ref().is_some_and(|c| c.state.borrow().closed)
    }

    /// `close(c)`. Parked senders fault; parked receivers get the zero value
    /// with `ok == false`.
    pub fn close(&self) -> FaultResult<()> {
        let Some(channel) = &self.0 else {
            return Err(Fault::runtime("close of nil channel"));
        };
        let (senders, receivers) = {
            let mut state = channel.state.borrow_mut();
            if state.closed {
                return Err(Fault::runtime("close of closed channel"));
            }
            state.closed = true;
            (
                std::mem::take(&mut state.senders),
                std::mem::take(&mut state.receivers),
            )
        };
        tracing::debug!(
            elem = %channel.elem,
            senders = senders.len(),
            receivers = receivers.len(),
            "closed channel"
        );
        for parked in senders.into_iter().filter(|p| !p.waiter.is_done()) {
            parked.waiter.complete(Completion::SendClosed { case: parked.case });
        }
        for parked in receivers.into_iter().filter(|p| !p.waiter.is_done()) {
            parked.waiter.complete(Completion::Received {
                case: parked.case,
                value: channel.elem.zero(),
                ok: false,
            });
        }
        Ok(())
    }

    /// Non-blocking send. `Ok(Err(value))` hands the value back when the
    /// send would block.
    pub fn try_send(&self, value: Value) -> FaultResult<Result<(), Value>> {
        let Some(channel) = &self.0 else {
            return Ok(Err(value));
        };
        let receiver = {
            let mut state = channel.state.borrow_mut();
            if state.closed {
                return Err(send_on_closed());
            }
            match ChanState::pop_live(&mut state.receivers) {
                Some(receiver) => receiver,
                None if state.buffer.len() < channel.capacity => {
                    state.buffer.push_back(value);
                    return Ok(Ok(()));
                }
                None => return Ok(Err(value)),
            }
        };
        receiver.waiter.complete(Completion::Received {
            case: receiver.case,
            value,
            ok: true,
        });
        Ok(Ok(()))
    }

    /// Non-blocking receive. `None` when the receive would block.
    ///
    /// A parked sender's value joins the back of the buffer before the head
    /// is taken, so buffered values are always received first.
    pub fn try_recv(&self) -> Option<(Value, bool)> {
        let channel = self.0.as_ref()?;
        let (result, sender) = {
            let mut state = channel.state.borrow_mut();
            let sender = ChanState::pop_live(&mut state.senders);
            if let Some(sender) = &sender
                && let Some(value) = sender.value.borrow_mut().take()
            {
                state.buffer.push_back(value);
            }
            let result = match state.buffer.pop_front() {
                Some(value) => Some((value, true)),
                None if state.closed => Some((channel.elem.zero(), false)),
                None => None,
            };
            (result, sender)
        };
        if let Some(sender) = sender {
            sender.waiter.complete(Completion::Sent { case: sender.case });
        }
        result
    }

    fn send_ready(&self) -> bool {
        self.0.as_ref().is_some_and(|c| {
            let state = c.state.borrow();
            state.closed || ChanState::has_live(&state.receivers) || state.buffer.len() < c.capacity
        })
    }

    fn recv_ready(&self) -> bool {
        self.0.as_ref().is_some_and(|c| {
            let state = c.state.borrow();
            state.closed || !state.buffer.is_empty() || ChanState::has_live(&state.senders)
        })
    }

    fn park(&self, parked: Rc<Parked>, sending: bool) {
        if let Some(channel) = &self.0 {
            let mut state = channel.state.borrow_mut();
            if sending {
                state.senders.push_back(parked);
            } else {
                state.receivers.push_back(parked);
            }
        }
    }

    fn unpark(&self, waiter: &Rc<Waiter>) {
        if let Some(channel) = &self.0 {
            let mut state = channel.state.borrow_mut();
            state.senders.retain(|p| !Rc::ptr_eq(&p.waiter, waiter));
            state.receivers.retain(|p| !Rc::ptr_eq(&p.waiter, waiter));
        }
    }

    /// `c <- value`.
    pub fn send(&self, value: Value) -> SendFuture {
        SendFuture {
            chan: self.clone(),
            value: Some(value),
            waiter: None,
        }
    }

    /// `v, ok := <-c`.
    pub fn recv(&self) -> RecvFuture {
        RecvFuture {
            chan: self.clone(),
            waiter: None,
        }
    }
}

impl fmt::Debug for Chan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("chan(nil)"),
            Some(c) => write!(
                f,
                "chan {}[{}/{}]{}",
                c.elem,
                c.state.borrow().buffer.len(),
                c.capacity,
                if c.state.borrow().closed { " closed" } else { "" }
            ),
        }
    }
}

// ============================================================================
// Futures
// ============================================================================

pub struct SendFuture {
    chan: Chan,
    value: Option<Value>,
    waiter: Option<Rc<Waiter>>,
}

impl Future for SendFuture {
    type Output = FaultResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(waiter) = &this.waiter {
            return match waiter.completion.borrow_mut().take() {
                Some(Completion::SendClosed { .. }) => Poll::Ready(Err(send_on_closed())),
                Some(_) => Poll::Ready(Ok(())),
                None => {
                    waiter.register(cx);
                    Poll::Pending
                }
            };
        }
        let Some(value) = this.value.take() else {
            return Poll::Ready(Ok(()));
        };
        if this.chan.is_nil() {
            this.value = Some(value);
            return Poll::Pending;
        }
        match this.chan.try_send(value)? {
            Ok(()) => Poll::Ready(Ok(())),
            Err(value) => {
                let waiter = Rc::new(Waiter::default());
                waiter.register(cx);
                this.chan.park(
                    Rc::new(Parked {
                        waiter: waiter.clone(),
                        case: 0,
                        value: RefCell::new(Some(value)),
                    }),
                    true,
                );
                this.waiter = Some(waiter);
                Poll::Pending
            }
        }
    }
}

impl Drop for SendFuture {
    fn drop(&mut self) {
        if let Some(waiter) = &self.waiter {
            self.chan.unpark(waiter);
        }
    }
}

pub struct RecvFuture {
    chan: Chan,
    waiter: Option<Rc<Waiter>>,
}

impl Future for RecvFuture {
    type Output = (Value, bool);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(waiter) = &this.waiter {
            return match waiter.completion.borrow_mut().take() {
                Some(Completion::Received { value, ok, .. }) => Poll::Ready((value, ok)),
                Some(_) => unreachable!("receive completed as a send"),
                None => {
                    waiter.register(cx);
                    Poll::Pending
                }
            };
        }
        if this.chan.is_nil() {
            return Poll::Pending;
        }
        if let Some(received) = this.chan.try_recv() {
            return Poll::Ready(received);
        }
        let waiter = Rc::new(Waiter::default());
        waiter.register(cx);
        this.chan.park(
            Rc::new(Parked {
                waiter: waiter.clone(),
                case: 0,
                value: RefCell::new(None),
            }),
            false,
        );
        this.waiter = Some(waiter);
        Poll::Pending
    }
}

impl Drop for RecvFuture {
    fn drop(&mut self) {
        if let Some(waiter) = &self.waiter {
            self.chan.unpark(waiter);
        }
    }
}

// ============================================================================
// Select
// ============================================================================

pub enum SelectCase {
    Recv(Chan),
    Send(Chan, Value),
    Default,
}

/// The case a `select` completed, by position in the case list.
#[derive(Debug)]
pub enum Selected {
    Recv { index: usize, value: Value, ok: bool },
    Send { index: usize },
    Default { index: usize },
}

/// `select { ... }` over `cases`.
///
/// When several cases are ready one is chosen uniformly at random. With no
/// ready case the default case is taken if present; otherwise the task parks
/// on every channel at once and resumes with whichever case completes first.
pub fn select(cases: Vec<SelectCase>) -> SelectFuture {
    SelectFuture {
        cases,
        waiter: None,
    }
}

pub struct SelectFuture {
    cases: Vec<SelectCase>,
    waiter: Option<Rc<Waiter>>,
}

impl SelectFuture {
    fn ready_cases(&self) -> Vec<usize> {
        self.cases
            .iter()
            .enumerate()
            .filter(|(_, case)| match case {
                SelectCase::Recv(chan) => chan.recv_ready(),
                SelectCase::Send(chan, _) => chan.send_ready(),
                SelectCase::Default => false,
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn run_case(&mut self, index: usize) -> FaultResult<Option<Selected>> {
        match &self.cases[index] {
            SelectCase::Recv(chan) => Ok(chan
                .try_recv()
                .map(|(value, ok)| Selected::Recv { index, value, ok })),
            SelectCase::Send(chan, value) => Ok(chan
                .try_send(value.clone())?
                .ok()
                .map(|()| Selected::Send { index })),
            SelectCase::Default => Ok(Some(Selected::Default { index })),
        }
    }

    fn unpark_all(&self, waiter: &Rc<Waiter>) {
        for case in &self.cases {
            match case {
                SelectCase::Recv(chan) | SelectCase::Send(chan, _) => chan.unpark(waiter),
                SelectCase::Default => {}
            }
        }
    }
}

impl Future for SelectFuture {
    type Output = FaultResult<Selected>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(waiter) = this.waiter.clone() {
            let completion = waiter.completion.borrow_mut().take();
            return match completion {
                None => {
                    waiter.register(cx);
                    Poll::Pending
                }
                Some(completion) => {
                    this.unpark_all(&waiter);
                    this.waiter = None;
                    Poll::Ready(match completion {
                        Completion::Received { case, value, ok } => Ok(Selected::Recv {
                            index: case,
                            value,
                            ok,
                        }),
                        Completion::Sent { case } => Ok(Selected::Send { index: case }),
                        Completion::SendClosed { .. } => Err(send_on_closed()),
                    })
                }
            };
        }

        let ready = this.ready_cases();
        if !ready.is_empty() {
            let pick = ready[rand::thread_rng().gen_range(0..ready.len())];
            if let Some(selected) = this.run_case(pick)? {
                return Poll::Ready(Ok(selected));
            }
        }
        if let Some(index) = this
            .cases
            .iter()
            .position(|case| matches!(case, SelectCase::Default))
        {
            return Poll::Ready(Ok(Selected::Default { index }));
        }

        let waiter = Rc::new(Waiter::default());
        waiter.register(cx);
        for (index, case) in this.cases.iter().enumerate() {
            let (chan, value, sending) = match case {
                SelectCase::Recv(chan) => (chan, None, false),
                SelectCase::Send(chan, value) => (chan, Some(value.clone()), true),
                SelectCase::Default => continue,
            };
            chan.park(
                Rc::new(Parked {
                    waiter: waiter.clone(),
                    case: index,
                    value: RefCell::new(value),
                }),
                sending,
            );
        }
        this.waiter = Some(waiter);
        Poll::Pending
    }
}

impl Drop for SelectFuture {
    fn drop(&mut self) {
        if let Some(waiter) = self.waiter.take() {
            self.unpark_all(&waiter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChanDir, builtins, chan_type};

    fn int_chan(size: i64) -> Chan {
        make_chan(chan_type(builtins().int, ChanDir::Both), size).unwrap()
    }

    #[test]
    fn buffered_fifo() {
        let c = int_chan(2);
        assert!(c.try_send(Value::from(1)).unwrap().is_ok());
        assert!(c.try_send(Value::from(2)).unwrap().is_ok());
        assert!(c.try_send(Value::from(3)).unwrap().is_err());
        assert_eq!(c.len(), 2);
        assert_eq!(c.try_recv().unwrap().0.as_number(), Some(1.0));
        assert_eq!(c.try_recv().unwrap().0.as_number(), Some(2.0));
        assert!(c.try_recv().is_none());
    }

    #[test]
    fn closed_channels_drain_then_yield_zero() {
        let c = int_chan(1);
        c.try_send(Value::from(7)).unwrap().unwrap();
        c.close().unwrap();
        assert_eq!(c.try_recv().unwrap().0.as_number(), Some(7.0));
        let (zero, ok) = c.try_recv().unwrap();
        assert_eq!((zero.as_number(), ok), (Some(0.0), false));
        assert_eq!(
            c.try_send(Value::from(1)).unwrap_err().to_string(),
            "runtime error: send on closed channel"
        );
        assert_eq!(
            c.close().unwrap_err().to_string(),
            "runtime error: close of closed channel"
        );
    }

    #[test]
    fn nil_channel_operations() {
        let c = Chan::nil();
        assert!(c.try_recv().is_none());
        assert!(c.try_send(Value::from(1)).unwrap().is_err());
        assert_eq!(
            c.close().unwrap_err().to_string(),
            "runtime error: close of nil channel"
        );
        assert_eq!((c.len(), c.cap()), (0, 0));
    }

    #[test]
    fn make_chan_rejects_negative_sizes() {
        let err = make_chan(chan_type(builtins().int, ChanDir::Both), -1).unwrap_err();
        assert_eq!(err.to_string(), "runtime error: makechan: size out of range");
    }
}
