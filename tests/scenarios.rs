//! End-to-end scenarios through the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use pretty_assertions::assert_eq;
use emx_script::backend::{CompileRequest, CompiledUnit, Compiler, Diagnostic, ScriptCompiler};
use emx_script::{
    CacheConfig, CacheKey, CmdResult, CompilationCache, CompilationReference, ErrorKind,
    ExecutionResult, Executor, FaultKind, Repl, ScriptMode, ScriptUnit, Session, Value,
};

fn session() -> Session {
    Session::new(Arc::new(Executor::default()))
}

fn sink() -> Vec<u8> {
    Vec::new()
}

#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

impl Compiler for Counting {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompiledUnit, Vec<Diagnostic>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ScriptCompiler::new().compile(request)
    }
}

#[test]
fn script_returns_value() {
    let executor = Executor::default();
    let unit = ScriptUnit::new("return 42;", ScriptMode::Script);
    let result = executor.execute(Some(&unit), None, &mut sink()).unwrap();
    assert!(result.is_success());
    assert_eq!(result.value_as::<i64>(), Some(42));
}

#[test]
fn invalid_syntax_is_compilation_fault() {
    let executor = Executor::default();
    let unit = ScriptUnit::new("invalid syntax here", ScriptMode::Script);
    let result = executor.execute(Some(&unit), None, &mut sink()).unwrap();
    let fault = result.fault().unwrap();
    assert_eq!(fault.kind, FaultKind::Compilation);
    assert_eq!(fault.type_name, "emx.CompilationError");
    assert!(result.return_value().is_none());
}

#[test]
fn absent_unit_is_precondition_error() {
    let executor = Executor::default();
    let err = executor.execute(None, None, &mut sink()).unwrap_err();
    assert!(err.is_precondition());
    assert_eq!(err.kind, ErrorKind::Precondition);

    let err = session().submit_unit(None, &mut sink()).unwrap_err();
    assert!(err.is_precondition());
}

#[test]
fn reference_without_path() {
    let reference = CompilationReference::new(None);
    assert_eq!(reference.path(), None);
    assert_eq!(reference, CompilationReference::new(None));
}

#[test]
fn repl_state_accumulates_until_reset() {
    let mut s = session();
    assert!(s.submit("var x = 1;", &mut sink()).is_success());
    assert_eq!(s.submit("x + 1", &mut sink()).value_as::<i64>(), Some(2));

    s.reset();
    let result = s.submit("x + 1", &mut sink());
    let fault = result.fault().unwrap();
    assert_eq!(fault.kind, FaultKind::Compilation);
    assert!(fault.message.contains("The name 'x' does not exist"), "{}", fault.message);
}

#[test]
fn repeated_reset_is_idempotent() {
    let mut s = session();
    s.reset();
    s.reset();
    let clean = s.generation();
    assert!(s.state().is_clean());

    s.submit("var y = 2;", &mut sink());
    s.reset();
    let once = s.generation();
    s.reset();
    s.reset();
    assert_eq!(s.generation(), once);
    assert!(once > clean);
    assert!(s.state().is_clean());

    assert_eq!(s.submit("1 + 1", &mut sink()).value_as::<i64>(), Some(2));
}

#[test]
fn failed_submission_leaves_state_untouched() {
    let mut s = session();
    s.submit("var n = 10;", &mut sink());
    let generation = s.generation();

    // the assignment runs before the fault, but is not kept
    let result = s.submit("n = 0;\nvar z = 1 / n;", &mut sink());
    assert_eq!(result.fault().unwrap().type_name, "emx.DivideByZeroError");
    assert_eq!(s.generation(), generation);
    assert_eq!(s.bindings().get("n"), Some(&Value::Int(10)));
    assert!(!s.bindings().contains("z"));

    // the session keeps working
    assert_eq!(s.submit("n * 2", &mut sink()).value_as::<i64>(), Some(20));
}

#[test]
fn duplicate_reference_loads_once() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("util.emxs"), "fn twice(x) { return x * 2; }").unwrap();
    let executor = Executor::default();
    let unit = ScriptUnit::new("#r \"util.emxs\"\n#r \"./util.emxs\"\nreturn twice(4);", ScriptMode::Script)
        .with_working_directory(dir.path());

    let result = executor.execute(Some(&unit), None, &mut sink()).unwrap();
    assert_eq!(result.value_as::<i64>(), Some(8));
    assert_eq!(result.side_effects().unwrap().references.len(), 1);
}

#[test]
fn unchanged_submission_hits_cache() {
    let counting = Arc::new(Counting::default());
    let executor = Arc::new(Executor::default().with_compiler(counting.clone()));
    let unit = ScriptUnit::new("return 1 + 2;", ScriptMode::Script);

    for _ in 0..3 {
        let result = executor.execute(Some(&unit), None, &mut sink()).unwrap();
        assert_eq!(result.value_as::<i64>(), Some(3));
    }
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    assert_eq!(executor.cache().stats().hits, 2);

    // same text after a reset is a different key
    let mut s = Session::new(Arc::clone(&executor));
    s.submit("var a = 1;", &mut sink());
    s.reset();
    s.submit("var a = 1;", &mut sink());
    assert_eq!(counting.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn output_and_value_are_separate() {
    let mut s = session();
    let mut out = Vec::new();
    let result = s.submit("print(\"hello\", 1);\n\"done\"", &mut out);
    assert_eq!(String::from_utf8(out).unwrap(), "hello 1\n");
    assert_eq!(result.value_as::<String>(), Some("done".to_string()));
}

#[test]
fn repl_reset_command_prints_confirmation() {
    let repl = Repl::new();
    let mut s = session();
    let mut out = Vec::new();

    repl.handle_line(&mut s, "var x = 5;", &mut out).unwrap();
    out.clear();
    let flow = repl.handle_line(&mut s, "#reset", &mut out).unwrap();
    assert_eq!(flow, CmdResult::Ok);
    assert_eq!(String::from_utf8(out).unwrap(), "Session reset.\n");
    assert!(s.state().is_clean());

    assert_eq!(repl.handle_line(&mut s, "#exit", &mut sink()).unwrap(), CmdResult::Exit);
}

#[test]
fn runtime_fault_is_reported_not_raised() {
    let executor = Executor::default();
    let unit = ScriptUnit::new("throw new { type = \"app.Boom\", message = \"bad\" };", ScriptMode::Script);
    match executor.execute(Some(&unit), None, &mut sink()).unwrap() {
        ExecutionResult::Failure { fault } => {
            assert_eq!(fault.kind, FaultKind::Runtime);
            assert_eq!(fault.to_string(), "app.Boom: bad");
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn deeply_nested_source_is_a_compile_fault() {
    let executor = Executor::default();
    let source = format!("return {}1{};", "(".repeat(100_000), ")".repeat(100_000));
    let unit = ScriptUnit::new(source, ScriptMode::Script);
    let result = executor.execute(Some(&unit), None, &mut sink()).unwrap();
    let fault = result.fault().unwrap();
    assert_eq!(fault.kind, FaultKind::Compilation);
    assert!(fault.message.contains("too long or complex"), "{}", fault.message);

    let shallow = format!("return {}1{};", "(".repeat(200), ")".repeat(200));
    let unit = ScriptUnit::new(shallow, ScriptMode::Script);
    assert_eq!(executor.execute(Some(&unit), None, &mut sink()).unwrap().value_as::<i64>(), Some(1));
}

#[test]
fn deep_recursion_hits_call_depth_limit() {
    let mut s = session();
    s.submit("fn f(n) { if (n > 0) { var a = (((n))); return f(a - 1) + 1; } return 0; }", &mut sink());

    let result = s.submit("f(1000)", &mut sink());
    assert_eq!(result.fault().unwrap().type_name, "emx.StackOverflowError");

    // the session survives and shallow calls still work
    assert_eq!(s.submit("f(100)", &mut sink()).value_as::<i64>(), Some(100));
}

#[test]
fn sessions_on_many_threads_share_one_cache() {
    let executor = Arc::new(Executor::default());

    let results: Vec<Option<i64>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let executor = Arc::clone(&executor);
                scope.spawn(move || {
                    let mut s = Session::new(executor);
                    s.submit("return 1 + 1;", &mut sink()).value_as::<i64>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results, vec![Some(2); 8]);
    assert_eq!(executor.cache().len(), 1);
}

#[test]
fn concurrent_misses_agree_on_one_entry() {
    let cache = Arc::new(CompilationCache::new(CacheConfig::default()));
    let counting = Arc::new(Counting::default());

    let units = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let counting = Arc::clone(&counting);
                scope.spawn(move || {
                    let request = CompileRequest {
                        source: "return 40 + 2;",
                        mode: ScriptMode::Script,
                        references: &[],
                        known_globals: &[],
                        usings: &[],
                    };
                    let key = CacheKey::new(&request, &[], 0);
                    cache.get_or_compile(key, counting.as_ref(), &request).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
    });

    assert_eq!(cache.len(), 1);
    assert!(units.iter().all(|unit| Arc::ptr_eq(unit, &units[0])));
    assert!(counting.calls.load(Ordering::SeqCst) >= 1);
}

#[test]
fn running_loop_is_cancelled_from_another_thread() {
    let executor = Executor::default();
    let token = executor.cancellation_token().clone();
    let unit = ScriptUnit::new("while (true) { }", ScriptMode::Script);

    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel();
        })
    };
    let result = executor.execute(Some(&unit), None, &mut sink()).unwrap();
    canceller.join().unwrap();

    let fault = result.fault().unwrap();
    assert_eq!(fault.kind, FaultKind::Cancelled);
    assert_eq!(fault.type_name, "emx.OperationCancelledError");

    token.reset();
    let unit = ScriptUnit::new("return 7;", ScriptMode::Script);
    assert_eq!(executor.execute(Some(&unit), None, &mut sink()).unwrap().value_as::<i64>(), Some(7));
}
