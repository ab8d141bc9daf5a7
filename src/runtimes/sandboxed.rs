//! In-process JavaScript evaluation.
//!
//! Every call gets a fresh QuickJS runtime and context. The context carries
//! the standard ECMAScript built-ins and no host bindings apart from a
//! `console` that appends to a buffer owned by the invocation. The runtime's
//! interrupt handler aborts the script once its deadline passes, so a timed
//! out evaluation never outlives the call. Memory is capped per runtime; CPU
//! is only bounded by the deadline.

use rquickjs::convert::Coerced;
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Function, Runtime, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::runtime::{ErrorKind, ExecutionError, RunOutcome};

/// Heap ceiling for a single evaluation
const MEMORY_LIMIT: usize = 256 * 1024 * 1024;

/// Installs the console facade and returns the value formatter. `__emit` is
/// removed from the global scope before user code runs.
const PRELUDE: &str = r#"
(function () {
    const emit = __emit;
    delete globalThis.__emit;
    const stringify = JSON.stringify;
    const toText = String;
    const format = (value) =>
        typeof value === 'object' ? stringify(value, null, 2) : toText(value);
    const channel = (prefix) => (...args) => {
        emit(prefix + args.map(format).join(' ') + '\n');
    };
    globalThis.console = {
        log: channel(''),
        info: channel('INFO: '),
        warn: channel('WARN: '),
        error: channel('ERROR: '),
    };
    return format;
})()
"#;

fn append(buffer: &Mutex<String>, text: &str) {
    if let Ok(mut buffer) = buffer.lock() {
        buffer.push_str(text);
    }
}

fn script_runtime_error(err: rquickjs::Error) -> EngineError {
    EngineError::Internal(format!("Failed to set up script runtime: {}", err))
}

fn run_script<'js>(
    ctx: &Ctx<'js>,
    code: &str,
    buffer: &Arc<Mutex<String>>,
) -> Result<(), CaughtError<'js>> {
    let sink = Arc::clone(buffer);
    let emit = Function::new(ctx.clone(), move |text: String| append(&sink, &text)).catch(ctx)?;
    ctx.globals().set("__emit", emit).catch(ctx)?;
    let format: Function = ctx.eval(PRELUDE).catch(ctx)?;

    let value: Value = ctx.eval(code).catch(ctx)?;
    if !value.is_undefined() {
        let text: String = format.call((value,)).catch(ctx)?;
        append(buffer, &text);
    }
    Ok(())
}

/// Turn a script fault into a structured error carrying its name, message and stack
fn describe(err: CaughtError<'_>) -> ExecutionError {
    match err {
        CaughtError::Exception(exception) => {
            let name = exception
                .as_object()
                .get::<_, Option<String>>("name")
                .ok()
                .flatten()
                .unwrap_or_else(|| "Error".to_string());
            let message = exception.message().unwrap_or_default();
            ExecutionError::new(ErrorKind::RuntimeError, message)
                .with_name(name)
                .with_stack(exception.stack().filter(|stack| !stack.is_empty()))
        }
        CaughtError::Value(value) => {
            let message = value
                .get::<Coerced<String>>()
                .map(|text| text.0)
                .unwrap_or_default();
            ExecutionError::new(ErrorKind::RuntimeError, message).with_name("Error")
        }
        CaughtError::Error(err) => {
            ExecutionError::new(ErrorKind::InternalExecutionError, err.to_string())
        }
    }
}

/// Evaluate `code` on the current thread, capturing console output into
/// `buffer`. Returns once the script finishes or is interrupted at its deadline.
fn evaluate(
    code: &str,
    buffer: &Arc<Mutex<String>>,
    timeout: Duration,
) -> Result<Option<ExecutionError>, EngineError> {
    let deadline = Instant::now() + timeout;
    let interrupted = Arc::new(AtomicBool::new(false));

    let runtime = Runtime::new().map_err(script_runtime_error)?;
    runtime.set_memory_limit(MEMORY_LIMIT);
    let expired = Arc::clone(&interrupted);
    runtime.set_interrupt_handler(Some(Box::new(move || {
        let past_deadline = Instant::now() >= deadline;
        if past_deadline {
            expired.store(true, Ordering::Relaxed);
        }
        past_deadline
    })));
    let context = Context::full(&runtime).map_err(script_runtime_error)?;

    let error = context.with(|ctx| run_script(&ctx, code, buffer).err().map(describe));

    if interrupted.load(Ordering::Relaxed) {
        warn!(timeout_ms = timeout.as_millis() as u64, "Script evaluation interrupted at its deadline");
        return Ok(Some(ExecutionError::new(
            ErrorKind::Timeout,
            format!("Script execution timed out after {}ms", timeout.as_millis()),
        )));
    }
    Ok(error)
}

pub async fn run(code: &str, timeout: Duration) -> Result<RunOutcome, EngineError> {
    let buffer = Arc::new(Mutex::new(String::new()));
    let source = code.to_string();
    let sink = Arc::clone(&buffer);

    let error = tokio::task::spawn_blocking(move || evaluate(&source, &sink, timeout)).await??;

    let output = buffer
        .lock()
        .map(|captured| captured.trim().to_string())
        .unwrap_or_default();
    debug!(output_len = output.len(), failed = error.is_some(), "Script evaluation finished");

    Ok(RunOutcome { output, error })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn eval(code: &str) -> RunOutcome {
        run(code, Duration::from_secs(5)).await.unwrap()
    }

    #[tokio::test]
    async fn test_console_log_arithmetic() {
        let outcome = eval("console.log(1+1)").await;
        assert_eq!(outcome.output, "2");
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_console_channels_are_prefixed() {
        let outcome = eval(
            "console.log('a', 'b'); console.info('i'); console.warn('w'); console.error('e');",
        )
        .await;
        assert_eq!(outcome.output, "a b\nINFO: i\nWARN: w\nERROR: e");
    }

    #[tokio::test]
    async fn test_objects_are_pretty_printed() {
        let outcome = eval("console.log({ a: 1 })").await;
        assert_eq!(outcome.output, "{\n  \"a\": 1\n}");
    }

    #[tokio::test]
    async fn test_completion_value_is_appended() {
        let outcome = eval("console.log('first'); 'second'").await;
        assert_eq!(outcome.output, "first\nsecond");

        let outcome = eval("[1, 2].map(x => x * 2)").await;
        assert_eq!(outcome.output, "[\n  2,\n  4\n]");
    }

    #[tokio::test]
    async fn test_thrown_error_is_structured() {
        let outcome = eval("console.log('before'); throw new TypeError('boom');").await;
        assert_eq!(outcome.output, "before");
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, ErrorKind::RuntimeError);
        assert_eq!(error.name, "TypeError");
        assert_eq!(error.message, "boom");
    }

    #[tokio::test]
    async fn test_thrown_primitive() {
        let outcome = eval("throw 'plain'").await;
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, ErrorKind::RuntimeError);
        assert_eq!(error.message, "plain");
    }

    #[tokio::test]
    async fn test_syntax_error() {
        let outcome = eval("let = ;").await;
        let error = outcome.error.unwrap();
        assert_eq!(error.name, "SyntaxError");
    }

    #[tokio::test]
    async fn test_standard_builtins_are_available() {
        let outcome = eval(
            "const m = new Map(); m.set('a', 1);\n\
             const s = new Set([1, 1, 2]);\n\
             const r = new RegExp('b+');\n\
             console.log(m.get('a'), s.size, r.test('abbc'));\n\
             console.log(typeof Symbol, typeof Promise, typeof BigInt, typeof WeakMap, typeof Uint8Array);",
        )
        .await;
        assert!(outcome.error.is_none(), "{:?}", outcome.error);
        assert_eq!(
            outcome.output,
            "1 2 true\nfunction function function function function"
        );
    }

    #[tokio::test]
    async fn test_no_host_bindings() {
        let outcome = eval(
            "console.log(typeof require, typeof process, typeof __emit, typeof std, typeof os)",
        )
        .await;
        assert_eq!(outcome.output, "undefined undefined undefined undefined undefined");
    }

    #[test]
    fn test_nested_loop_is_interrupted_on_the_calling_thread() {
        // The outer loop never ends; evaluate only returns because the deadline interrupts it.
        let buffer = Arc::new(Mutex::new(String::new()));
        let start = Instant::now();
        let error = evaluate(
            "for (;;) { for (let i = 0; i < 1000; i++) {} }",
            &buffer,
            Duration::from_millis(300),
        )
        .unwrap()
        .unwrap();
        assert_eq!(error.kind, ErrorKind::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let outcome = run("console.log('started'); while (true) {}", Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(outcome.output, "started");
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_invocations_do_not_share_state() {
        let first = eval("globalThis.leak = 42; console.log('set')").await;
        assert_eq!(first.output, "set");
        let second = eval("console.log(typeof leak)").await;
        assert_eq!(second.output, "undefined");
    }
}
