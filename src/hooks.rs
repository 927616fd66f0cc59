//! Process-facing instrumentation hooks.
//!
//! Thin entry points over a thread-local `Session`, gated by a process-wide
//! enabled flag. Generated or hand-written instrumentation inside serialize
//! routines calls these five functions; a usage error aborts the process,
//! since continuing past broken instrumentation would corrupt every later
//! frame.

use std::cell::RefCell;
use std::fs::File;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;

use crate::report::RenderOptions;
use crate::runtime::{MemberAddr, Session, UsageError};

static ENABLED: AtomicBool = AtomicBool::new(true);

thread_local! {
    static SESSION: RefCell<Session> = RefCell::new(Session::new());
}

/// Truthy values of this variable route the summary to a per-process file.
pub const REPORT_FILE_ENV: &str = "SERCHECK_REPORT_FILE";

/// Gate every hook at once. While disabled, all five entry points are
/// no-ops.
pub fn set_enabled(on: bool) {
    ENABLED.store(on, Ordering::Relaxed);
}

pub fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn push(type_name: &str) {
    if !enabled() {
        return;
    }
    SESSION.with(|cell| cell.borrow_mut().push(type_name));
}

pub fn pop(type_name: &str) {
    if !enabled() {
        return;
    }
    SESSION
        .with(|cell| cell.borrow_mut().pop(type_name))
        .unwrap_or_else(|err| die(err));
}

pub fn check_member(addr: MemberAddr, name: &str, type_name: &str) {
    if !enabled() {
        return;
    }
    SESSION
        .with(|cell| cell.borrow_mut().check_member(addr, name, type_name))
        .unwrap_or_else(|err| die(err));
}

pub fn skip_member(addr: MemberAddr, name: &str, type_name: &str) {
    if !enabled() {
        return;
    }
    SESSION
        .with(|cell| cell.borrow_mut().skip_member(addr, name, type_name))
        .unwrap_or_else(|err| die(err));
}

pub fn mark_serialized(addr: MemberAddr, count: usize, type_name: &str) {
    if !enabled() {
        return;
    }
    SESSION.with(|cell| cell.borrow_mut().mark_serialized(addr, count, type_name));
}

/// Tear down this thread's session and emit the summary: to
/// `sercheck.<pid>.out` when requested through the environment, falling back
/// to stdout on any write failure.
pub fn finalize() {
    let report = SESSION.with(|cell| cell.take()).into_report();

    if file_output_requested() {
        let pid = std::process::id();
        let path = format!("sercheck.{pid}.out");
        let opts = RenderOptions { color: false, pid: Some(pid) };
        match File::create(&path).and_then(|mut f| report.render(&mut f, &opts)) {
            Ok(()) => return,
            Err(err) => {
                eprintln!("sercheck: cannot write {path}: {err}; falling back to stdout");
            }
        }
    }

    let opts = RenderOptions { color: true, pid: None };
    let mut out = io::stdout().lock();
    if let Err(err) = report.render(&mut out, &opts) {
        eprintln!("sercheck: failed to write summary: {err}");
    }
}

fn file_output_requested() -> bool {
    // Read once per process; the destination does not change mid-run.
    static REQUESTED: Lazy<bool> = Lazy::new(|| {
        matches!(
            std::env::var(REPORT_FILE_ENV).ok().as_deref(),
            Some("1" | "ON" | "on" | "true" | "TRUE")
        )
    });
    *REQUESTED
}

fn die(err: UsageError) -> ! {
    eprintln!("sercheck: fatal: {err}");
    std::process::abort();
}

// --------------------------------- Tests --------------------------------- //
