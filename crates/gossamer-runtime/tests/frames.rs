use std::cell::RefCell;
use std::rc::Rc;

use gossamer_runtime::types::builtins;
use gossamer_runtime::{CallStack, Fault, Frame, FaultResult, Outcome, Slice, Typed, Value};

type Log = Rc<RefCell<Vec<String>>>;

fn push(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

/// `func F() { defer recoverer(); defer func() { panic("second") }(); panic("first") }`
fn f(frame: &Frame<'_>, log: Log) -> FaultResult<()> {
    frame.defer(move |d| {
        if let Some(r) = d.recover() {
            push(&log, format!("recovered {}", r.fault.message()));
            for old in r.superseded {
                push(&log, format!("superseded {}", old.message()));
            }
        }
        Ok(())
    });
    frame.defer(|_| Err(Fault::panic_str("second")));
    Err(Fault::panic_str("first"))
}

#[test]
fn test_cleanup_fault_supersedes_and_is_recovered_in_f() {
    let log = Log::default();
    let stack = CallStack::new();
    let out = stack
        .run(|main| {
            let inner = log.clone();
            let result = main.call(move |frame| f(frame, inner))?;
            push(&log, "main continues");
            Ok(result.returned().is_none())
        })
        .unwrap();

    assert_eq!(out.returned(), Some(true));
    assert_eq!(
        *log.borrow(),
        vec!["recovered second", "superseded first", "main continues"]
    );
    assert_eq!(stack.depth(), 0);
}

#[test]
fn test_unrecovered_runtime_errors_reach_the_top() {
    let log = Log::default();
    let stack = CallStack::new();
    let ints = gossamer_runtime::types::slice_type(builtins().int);
    let err = stack
        .run(|main| {
            let log = log.clone();
            main.defer(move |_| {
                push(&log, "main cleanup");
                Ok(())
            });
            main.call(|_| {
                let s = Slice::from_values(ints, vec![Value::from(1)])?;
                s.get(5)
            })?;
            Ok(())
        })
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "runtime error: index out of range [5] with length 1"
    );
    assert_eq!(*log.borrow(), vec!["main cleanup"]);
}

#[test]
fn test_recover_outside_a_panic_returns_none() {
    let stack = CallStack::new();
    let out = stack
        .run(|main| {
            assert!(main.recover().is_none());
            let seen = Rc::new(RefCell::new(None));
            let sink = seen.clone();
            main.call(move |frame| {
                frame.defer(move |d| {
                    *sink.borrow_mut() = Some(d.recover().is_some());
                    Ok(())
                });
                Ok(())
            })?;
            let seen = *seen.borrow();
            Ok(seen)
        })
        .unwrap();
    assert_eq!(out.returned(), Some(Some(false)));
}

#[test]
fn test_recovered_values_keep_their_dynamic_type() {
    let b = builtins();
    let stack = CallStack::new();
    let recovered = Rc::new(RefCell::new(None));
    let sink = recovered.clone();
    let out = stack
        .run(move |main| {
            main.defer(move |d| {
                *sink.borrow_mut() = d.recover();
                Ok(())
            });
            Err::<(), _>(Fault::panic_value(Typed::new(b.int, Value::from(42))))
        })
        .unwrap();
    assert!(matches!(out, Outcome::Recovered));

    let recovered = recovered.borrow_mut().take().unwrap();
    let Fault::Value(typed) = recovered.fault else {
        panic!("expected a panic value");
    };
    assert_eq!(typed.ty, b.int);
    assert_eq!(typed.val.as_number(), Some(42.0));
    assert!(recovered.superseded.is_empty());
}
