//! Behaviour of a scope across success, early exit and panics

mod common;

use common::{init_tracing, Aware, Dual, Log, Opaque, Plain};
use errscope::{Accumulation, Coordinator, Error, Handler, Phase, PlainFirst, State};
use anyhow::Context as _;
use std::cell::Cell;
use std::fs::{self, File};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn fail(message: &str) -> Result<(), Error> {
    Err(Error::failure(message))
}

#[test]
fn test_clean_body_returns_ok_and_releases_everything() {
    init_tracing();
    let log = Log::default();

    let result = Coordinator::new().run(|s| {
        s.defer_value(Plain::new("a", &log))?;
        s.defer_value(Dual::new("b", &log))?;
        s.defer_value(Aware::new("c", &log))?;
        assert_eq!(s.len(), 3);
        Ok(())
    });

    assert!(result.is_ok());
    assert_eq!(log.entries(), vec!["close c", "close b", "close a"]);
}

#[test]
fn test_must_ok_never_changes_control_flow() {
    let reached = Cell::new(0);

    let result = Coordinator::new().run(|s| {
        for i in 0..10 {
            let value = s.must(Ok::<_, Error>(i))?;
            assert_eq!(value, i);
            reached.set(reached.get() + 1);
        }
        Ok(())
    });

    assert!(result.is_ok());
    assert_eq!(reached.get(), 10);
}

#[test]
fn test_statements_after_failing_must_do_not_run() {
    let after = Cell::new(false);

    let result = Coordinator::new().run(|s| {
        s.must(fail("first"))?;
        after.set(true);
        s.must(fail("second"))?;
        Ok(())
    });

    assert_eq!(result.unwrap_err().to_string(), "first");
    assert!(!after.get());
}

#[test]
fn test_exit_from_nested_helper_propagates() {
    fn step<'s>(s: &errscope::Scope<'s, '_>, depth: u32) -> Result<(), errscope::Exit<'s>> {
        if depth == 0 {
            s.must(fail("deep failure"))?;
        }
        step(s, depth.saturating_sub(1))
    }

    let result = Coordinator::new().run(|s| step(s, 5));
    assert_eq!(result.unwrap_err().to_string(), "deep failure");
}

#[test]
fn test_panic_drains_stack_and_is_reraised() {
    init_tracing();
    let log = Log::default();

    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        Coordinator::new().run(|s| {
            s.defer_value(Plain::new("a", &log))?;
            s.defer_value(Dual::new("b", &log))?;
            panic!("boom");
        })
    }));

    let payload = caught.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
    assert_eq!(
        log.entries(),
        vec!["abort b: scope body panicked: boom", "close a"]
    );
}

#[test]
fn test_panic_in_release_does_not_stop_later_releases() {
    let log = Log::default();

    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        Coordinator::new().run(|s| {
            s.defer_value(Plain::new("first", &log))?;
            s.defer_func(|_: &State<'_>| panic!("release exploded"));
            s.defer_value(Plain::new("last", &log))?;
            Ok(())
        })
    }));

    assert!(caught.is_err());
    assert_eq!(log.entries(), vec!["close last", "close first"]);
}

#[test]
fn test_nested_scope_panic_unwinds_outer_scope() {
    let log = Log::default();

    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        Coordinator::new().run(|outer| {
            outer.defer_value(Plain::new("outer", &log))?;
            let inner = Coordinator::new().run(|inner| {
                inner.defer_value(Plain::new("inner", &log))?;
                panic!("inner fault");
            });
            outer.must(inner)?;
            Ok(())
        })
    }));

    assert!(caught.is_err());
    assert_eq!(log.entries(), vec!["close inner", "close outer"]);
}

#[test]
fn test_aware_only_value_is_aborted_when_failing() {
    let log = Log::default();

    let result = Coordinator::new().run(|s| {
        s.defer_value(Aware::new("pipe", &log))?;
        s.must(fail("broken"))?;
        Ok(())
    });

    assert!(result.is_err());
    assert_eq!(log.entries(), vec!["abort pipe: broken"]);
}

#[test]
fn test_dual_value_is_closed_plainly_on_success() {
    let log = Log::default();

    let result = Coordinator::new().run(|s| {
        s.defer_value(Dual::new("writer", &log))?;
        Ok(())
    });

    assert!(result.is_ok());
    assert_eq!(log.entries(), vec!["close writer"]);
}

#[test]
fn test_plain_first_selector_closes_even_when_failing() {
    let log = Log::default();
    let coordinator = Coordinator::builder().selector(PlainFirst).build();

    let result = coordinator.run(|s| {
        s.defer_value(Dual::new("writer", &log))?;
        s.must(fail("broken"))?;
        Ok(())
    });

    assert!(result.is_err());
    assert_eq!(log.entries(), vec!["close writer"]);
}

#[test]
fn test_first_cause_wins_by_default() {
    let log = Log::default();

    let result = Coordinator::new().run(|s| {
        s.defer_value(Plain::failing("conn", &log))?;
        s.must(fail("A"))?;
        Ok(())
    });

    assert_eq!(result.unwrap_err().to_string(), "A");
    assert_eq!(log.entries(), vec!["close conn"]);
}

#[test]
fn test_aggregate_policy_keeps_every_error() {
    let log = Log::default();
    let coordinator = Coordinator::builder()
        .accumulation(Accumulation::Aggregate)
        .build();

    let result = coordinator.run(|s| {
        s.defer_value(Plain::failing("conn", &log))?;
        s.must(fail("A"))?;
        Ok(())
    });

    let err = result.unwrap_err();
    assert_eq!(err.errors().len(), 2);
    assert_eq!(err.errors()[0].to_string(), "A");
    assert_eq!(err.errors()[1].to_string(), "release conn failed");
}

#[test]
fn test_last_cause_policy_overwrites() {
    let log = Log::default();
    let coordinator = Coordinator::builder()
        .accumulation(Accumulation::LastCause)
        .build();

    let result = coordinator.run(|s| {
        s.defer_value(Plain::failing("conn", &log))?;
        s.must(fail("A"))?;
        Ok(())
    });

    assert_eq!(result.unwrap_err().to_string(), "release conn failed");
}

#[test]
fn test_release_error_after_success_becomes_terminal_and_aborts_the_rest() {
    let log = Log::default();

    let result = Coordinator::new().run(|s| {
        s.defer_value(Dual::new("x", &log))?;
        s.defer_value(Plain::failing("y", &log))?;
        Ok(())
    });

    assert_eq!(result.unwrap_err().to_string(), "release y failed");
    assert_eq!(log.entries(), vec!["close y", "abort x: release y failed"]);
}

#[test]
fn test_end_to_end_failure_aborts_error_aware_resource() {
    init_tracing();
    let log = Log::default();
    let coordinator = Coordinator::builder()
        .handler(Handler::context("copy job"))
        .build();

    let result = coordinator.run(|s| {
        s.defer_value(Aware::new("X", &log))?;
        let y = s.defer_value(Plain::new("Y", &log))?;
        let use_y: Result<(), Error> = Err(Error::failure(format!("write to {} failed", y.borrow().name)));
        s.must_with(use_y, Handler::context("writing Y"))?;
        Ok(())
    });

    assert_eq!(
        result.unwrap_err().to_string(),
        "copy job: writing Y: write to Y failed"
    );
    assert_eq!(
        log.entries(),
        vec!["close Y", "abort X: writing Y: write to Y failed"]
    );
}

#[test]
fn test_value_without_capability_is_rejected_at_registration() {
    let log = Log::default();
    let after = Cell::new(false);

    let result = Coordinator::new().run(|s| {
        s.defer_value(Plain::new("earlier", &log))?;
        s.defer_value(Opaque)?;
        after.set(true);
        Ok(())
    });

    let err = result.unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("Opaque"));
    assert!(!after.get());
    assert_eq!(log.entries(), vec!["close earlier"]);
}

#[test]
fn test_forcing_an_undeclared_release_is_rejected() {
    let log = Log::default();

    let result = Coordinator::new().run(|s| {
        s.defer_close(Aware::new("pipe", &log), Handler::context("closing"))?;
        Ok(())
    });

    assert!(result.unwrap_err().is_configuration());
    assert!(log.entries().is_empty());
}

#[test]
fn test_discard_as_sole_default_handler_hides_cleanup_error() {
    let log = Log::default();
    let coordinator = Coordinator::builder().handler(Handler::discard()).build();

    let result = coordinator.run(|s| {
        s.defer_value(Plain::failing("conn", &log))?;
        Ok(())
    });

    assert!(result.is_ok());
    assert_eq!(log.entries(), vec!["close conn"]);
}

#[test]
fn test_discarding_interim_close_keeps_authoritative_one() {
    let log = Log::default();

    let result = Coordinator::new().run(|s| {
        s.defer_value(Dual::new("final", &log))?;
        s.defer_close(Plain::failing("interim", &log), Handler::discard())?;
        Ok(())
    });

    assert!(result.is_ok());
    assert_eq!(log.entries(), vec!["close interim", "close final"]);
}

#[test]
fn test_call_site_discard_stops_body_without_error() {
    let after = Cell::new(false);

    let result = Coordinator::new().run(|s| {
        s.must_with(fail("expected"), Handler::discard())?;
        after.set(true);
        Ok(())
    });

    assert!(result.is_ok());
    assert!(!after.get());
}

#[test]
fn test_default_handlers_run_once_after_call_site_handlers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let log = Log::default();
    let coordinator = Coordinator::builder()
        .accumulation(Accumulation::Aggregate)
        .handler(Handler::new(move |state: &State<'_>, err: Error| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(state.phase(), Phase::Exit);
            err.context("boundary")
        }))
        .build();

    let result = coordinator.run(|s| {
        s.defer_value(Plain::failing("a", &log))?;
        s.defer_value(Plain::failing("b", &log))?;
        s.must_with(fail("body"), Handler::context("call site"))?;
        Ok(())
    });

    let err = result.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(err.to_string().starts_with("boundary: 3 errors occurred: call site: body"));
}

#[test]
fn test_handle_orders_call_site_before_defaults() {
    let coordinator = Coordinator::builder()
        .handler(Handler::context("outer"))
        .build();

    let result = coordinator.run(|s| {
        let err = s.handle(Error::failure("root"), Handler::context("inner"));
        assert_eq!(err.unwrap().to_string(), "outer: inner: root");
        Ok(())
    });

    assert!(result.is_ok());
}

#[test]
fn test_handled_error_reported_through_must_gets_defaults_again() {
    let coordinator = Coordinator::builder()
        .handler(Handler::context("outer"))
        .build();

    let result = coordinator.run(|s| {
        if let Some(err) = s.handle(Error::failure("root"), Handler::context("inner")) {
            s.must(Err::<(), _>(err))?;
        }
        Ok(())
    });

    assert_eq!(result.unwrap_err().to_string(), "outer: outer: inner: root");
}

#[test]
fn test_anyhow_errors_keep_their_context_chain() {
    let after = Cell::new(false);

    let result = Coordinator::new().run(|s| {
        let dialed: anyhow::Result<u16> =
            Err::<u16, _>(anyhow::anyhow!("connection refused")).context("dialing database");
        let port = s.must(dialed)?;
        after.set(true);
        assert_eq!(port, 0);
        Ok(())
    });

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "dialing database: connection refused");
    assert!(std::error::Error::source(&err).is_some());
    assert!(!after.get());
}

#[test]
fn test_nested_result_handed_to_outer_must_ends_outer_body() {
    let log = Log::default();
    let after = Cell::new(false);

    let result = Coordinator::new().run(|outer| {
        outer.defer_value(Plain::new("outer", &log))?;
        let nested = Coordinator::builder()
            .handler(Handler::context("nested"))
            .build()
            .run(|inner| {
                inner.defer_value(Plain::new("inner", &log))?;
                inner.must(fail("outer failure"))
            });
        outer.must(nested)?;
        after.set(true);
        Ok(())
    });

    assert_eq!(result.unwrap_err().to_string(), "nested: outer failure");
    assert!(!after.get());
    assert_eq!(log.entries(), vec!["close inner", "close outer"]);
}

#[test]
fn test_must_defer_shares_handlers_with_release() {
    let log = Log::default();

    let result = Coordinator::new().run(|s| {
        s.must_defer_with(
            Ok::<_, Error>(Plain::failing("db", &log)),
            Handler::context("db connection"),
        )?;
        Ok(())
    });
    assert_eq!(
        result.unwrap_err().to_string(),
        "db connection: release db failed"
    );

    let result = Coordinator::new().run(|s| {
        s.must_defer_with(
            Err::<Plain, _>(Error::failure("refused")),
            Handler::context("db connection"),
        )?;
        Ok(())
    });
    assert_eq!(result.unwrap_err().to_string(), "db connection: refused");
}

#[test]
fn test_defer_func_sees_failure_state() {
    let seen = Cell::new(None);

    let result = Coordinator::new().run(|s| {
        s.defer_func(|state: &State<'_>| {
            seen.set(Some((
                state.phase(),
                state.is_failing(),
                state.is_panicking(),
                state.err().map(ToString::to_string),
            )));
            Ok(())
        });
        s.must(fail("late"))?;
        Ok(())
    });

    assert!(result.is_err());
    assert_eq!(
        seen.take(),
        Some((Phase::Unwind, true, false, Some("late".to_string())))
    );
}

#[test]
fn test_close_with_error_forced_on_success_gets_no_cause() {
    let log = Log::default();

    let result = Coordinator::new().run(|s| {
        s.defer_close_with_error(Dual::new("w", &log))?;
        Ok(())
    });

    assert!(result.is_ok());
    assert_eq!(log.entries(), vec!["close-with-nil w"]);
}

#[test]
fn test_deferred_handle_gives_access_until_body_ends() {
    let log = Log::default();

    let result = Coordinator::new().run(|s| {
        let dual = s.defer_value(Dual::new("before", &log))?;
        dual.borrow_mut().name = "after";
        assert_eq!(dual.borrow().name, "after");
        Ok(())
    });

    assert!(result.is_ok());
    assert_eq!(log.entries(), vec!["close after"]);
}

#[test]
fn test_std_resources_release_through_a_scope() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let lock = parking_lot::Mutex::new(0);

    let result = Coordinator::new().run(|s| {
        let file = s.must_defer(File::create(&path))?;
        s.must(file.borrow_mut().write_all(b"payload"))?;

        let guard = s.defer_unlock(lock.lock())?;
        **guard.borrow_mut() += 1;
        assert!(lock.try_lock().is_none());

        s.must(fail("after acquiring"))
    });

    assert_eq!(result.unwrap_err().to_string(), "after acquiring");
    assert_eq!(*lock.lock(), 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), "payload");
}
