//! Integration tests for the SourceControl facade and its worker thread
//!
//! These tests drive the facade against a recording fake provider and verify:
//! - Provider calls run one at a time, in the order they were queued
//! - Every call runs on the worker thread
//! - Facade calls block until the provider returns
//! - A faulting provider call doesn't take the worker down
//! - Shutdown is idempotent and later calls fail cleanly

mod common;

use common::{FakeBehavior, FakePlugin};
use decoda_scc::models::{ProjectContext, SccCode, Status, WindowHandle, raw};
use decoda_scc::services::{BindError, PluginLoader, SourceControl};
use decoda_scc::{Phase, SessionChange};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

fn bound(behavior: FakeBehavior) -> (SourceControl, Arc<FakePlugin>) {
    let plugin = FakePlugin::new(behavior);
    let scc = SourceControl::new();
    assert!(scc.initialize_with("Fake", plugin.loader(), WindowHandle::NONE));
    (scc, plugin)
}

fn project() -> ProjectContext {
    ProjectContext::new("alice", "$/Game", "C:/game", "perforce:1666")
}

#[test]
fn test_initialize_binds_provider() {
    let (scc, plugin) = bound(FakeBehavior::default());

    assert!(scc.is_initialized());
    assert_eq!(scc.session().phase(), Phase::Ready);
    assert_eq!(
        scc.plugin_info().map(|info| info.provider_name),
        Some("Fake Provider".to_string())
    );
    assert_eq!(plugin.operations(), vec!["initialize", "threadsafe_query_info"]);
}

#[test]
fn test_commands_from_one_thread_run_in_order() {
    let (scc, plugin) = bound(FakeBehavior::default());

    assert!(scc.check_out(&["a.lua"], ""));
    assert!(scc.add_files(&["b.lua"], "new"));
    assert!(scc.check_in(&["a.lua", "b.lua"], "done"));
    assert!(scc.show_diff("a.lua"));

    let ops = plugin.operations();
    assert_eq!(&ops[2..], &["checkout", "add", "checkin", "diff"]);
}

#[test]
fn test_commands_from_many_threads_run_in_queue_order() {
    let (scc, plugin) = bound(FakeBehavior {
        delay: Duration::from_millis(50),
        ..FakeBehavior::default()
    });
    let scc = Arc::new(scc);
    let already_dispatched = scc.metrics().commands_dispatched.load(Ordering::SeqCst);

    let mut handles = Vec::new();
    for i in 0..5u64 {
        let caller = Arc::clone(&scc);
        handles.push(thread::spawn(move || {
            caller.check_out(&[format!("file{i}.lua")], "")
        }));

        // Wait until this command is queued before the next thread pushes
        let expected = already_dispatched + i + 1;
        let deadline = Instant::now() + Duration::from_secs(5);
        while scc.metrics().commands_dispatched.load(Ordering::SeqCst) < expected {
            assert!(Instant::now() < deadline, "command {i} was never queued");
            thread::yield_now();
        }
    }

    for handle in handles {
        assert!(handle.join().unwrap());
    }

    let checked_out: Vec<String> = plugin
        .calls()
        .into_iter()
        .filter(|call| call.operation == "checkout")
        .flat_map(|call| call.files)
        .collect();
    let expected: Vec<String> = (0..5).map(|i| format!("file{i}.lua")).collect();
    assert_eq!(checked_out, expected);
    assert_eq!(plugin.max_in_flight(), 1);
}

#[test]
fn test_concurrent_callers_never_overlap() {
    let (scc, plugin) = bound(FakeBehavior {
        delay: Duration::from_millis(5),
        ..FakeBehavior::default()
    });
    let scc = Arc::new(scc);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let scc = Arc::clone(&scc);
            thread::spawn(move || {
                for j in 0..5 {
                    let file = format!("t{i}_{j}.lua");
                    assert!(scc.check_out(&[&file], ""));
                    assert_eq!(scc.get_file_status(&file), Status::CheckedIn);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(plugin.count("checkout"), 40);
    assert_eq!(plugin.count("query_info"), 40);
    assert_eq!(plugin.max_in_flight(), 1);
}

#[test]
fn test_every_call_runs_on_worker_thread() {
    let (scc, plugin) = bound(FakeBehavior::default());
    let worker = scc.worker_thread_id().unwrap();
    assert_ne!(worker, thread::current().id());

    assert!(scc.open_project(&project()));
    assert!(scc.check_out(&["a.lua"], ""));
    assert!(scc.undo_check_out(&["a.lua"]));
    assert!(scc.show_history(&["a.lua"]));
    assert!(scc.show_properties("a.lua"));
    let _ = scc.get_files_status(&["a.lua", "b.lua"]);
    assert!(scc.close_project());
    scc.shutdown();

    let calls = plugin.calls();
    assert!(calls.len() > 8);
    assert!(calls.iter().all(|call| call.thread == worker));
    assert_eq!(calls.last().map(|call| call.operation.as_str()), Some("uninitialize"));
}

#[test]
fn test_caller_blocks_until_provider_returns() {
    let delay = Duration::from_millis(200);
    let (scc, plugin) = bound(FakeBehavior {
        delay,
        ..FakeBehavior::default()
    });

    let started = Instant::now();
    assert!(scc.check_out(&["slow.lua"], ""));
    assert!(started.elapsed() >= delay);
    assert_eq!(plugin.count("checkout"), 1);
}

#[test]
fn test_fault_is_contained_and_next_command_succeeds() {
    let (scc, plugin) = bound(FakeBehavior {
        fault_on: Some("checkout"),
        ..FakeBehavior::default()
    });
    let mut events = scc.session().subscribe();

    assert!(!scc.check_out(&["boom.lua"], ""));
    assert!(scc.check_in(&["fine.lua"], ""));
    assert!(scc.is_initialized());

    let faulted = std::iter::from_fn(|| events.try_recv().ok())
        .find(|event| matches!(event, SessionChange::PluginFaulted { .. }));
    match faulted {
        Some(SessionChange::PluginFaulted { operation, message }) => {
            assert_eq!(operation, "check out");
            assert!(message.contains("fake provider fault"));
        }
        other => panic!("Expected PluginFaulted event, got: {:?}", other),
    }
    assert_eq!(scc.session().snapshot().faults, 1);
    assert_eq!(scc.metrics().commands_faulted.load(Ordering::SeqCst), 1);
    assert_eq!(plugin.count("checkin"), 1);
}

#[cfg(any(unix, target_env = "msvc"))]
#[test]
fn test_native_fault_is_contained_and_next_command_succeeds() {
    let (scc, plugin) = bound(FakeBehavior {
        crash_on: Some("checkout"),
        ..FakeBehavior::default()
    });
    let worker = scc.worker_thread_id();
    let mut events = scc.session().subscribe();

    assert!(!scc.check_out(&["boom.lua"], ""));
    assert!(scc.check_in(&["fine.lua"], ""));
    assert!(!scc.check_out(&["boom.lua"], ""));
    assert!(scc.undo_check_out(&["fine.lua"]));

    assert_eq!(scc.worker_thread_id(), worker);
    assert_eq!(scc.session().snapshot().faults, 2);
    assert!(
        std::iter::from_fn(|| events.try_recv().ok())
            .any(|event| matches!(event, SessionChange::PluginFaulted { ref operation, .. } if operation == "check out"))
    );
    assert_eq!(plugin.count("checkin"), 1);

    scc.shutdown();
    assert_eq!(plugin.count("uninitialize"), 1);
}

#[cfg(any(unix, target_env = "msvc"))]
#[test]
fn test_native_fault_on_direct_status_path() {
    let (scc, _plugin) = bound(FakeBehavior {
        threadsafe_query_info: true,
        crash_on: Some("query_info"),
        ..FakeBehavior::default()
    });
    assert!(scc.has_concurrent_status_queries());

    assert_eq!(scc.get_files_status(&["a.lua", "b.lua"]), vec![Status::Error; 2]);
    assert!(scc.check_out(&["a.lua"], ""));
    assert_eq!(scc.session().snapshot().faults, 1);
}

#[test]
fn test_faulting_status_query_reports_errors() {
    let (scc, _plugin) = bound(FakeBehavior {
        fault_on: Some("query_info"),
        ..FakeBehavior::default()
    });

    assert_eq!(
        scc.get_files_status(&["a.lua", "b.lua"]),
        vec![Status::Error, Status::Error]
    );
    assert!(scc.check_out(&["a.lua"], ""));
}

#[test]
fn test_provider_errors_map_to_false() {
    let (scc, _plugin) = bound(FakeBehavior {
        op_code: SccCode::FILE_IS_LOCKED,
        ..FakeBehavior::default()
    });

    assert!(!scc.check_out(&["locked.lua"], ""));
    assert!(!scc.show_diff("locked.lua"));
    assert_eq!(scc.get_file_status("locked.lua"), Status::Error);
    assert!(scc.metrics().provider_errors.load(Ordering::SeqCst) >= 2);
}

#[test]
fn test_provider_warnings_count_as_success() {
    let (scc, _plugin) = bound(FakeBehavior {
        op_code: SccCode(1),
        ..FakeBehavior::default()
    });

    assert!(scc.check_out(&["a.lua"], ""));
}

#[test]
fn test_empty_file_lists_short_circuit() {
    let (scc, plugin) = bound(FakeBehavior::default());
    let before = plugin.calls().len();
    let none: [&str; 0] = [];

    assert!(scc.check_out(&none, ""));
    assert!(scc.check_in(&none, ""));
    assert!(scc.undo_check_out(&none));
    assert!(scc.add_files(&none, ""));
    assert!(scc.remove_files(&none, ""));
    assert!(scc.get_files_status(&none).is_empty());

    assert_eq!(plugin.calls().len(), before);
}

#[test]
fn test_status_mapping_through_facade() {
    let (scc, _plugin) = bound(FakeBehavior {
        status_bits: raw::CONTROLLED | raw::CHECKEDOUT | raw::OUTBYUSER,
        ..FakeBehavior::default()
    });

    assert_eq!(
        scc.get_files_status(&["a.lua", "b.lua", "c.lua"]),
        vec![Status::CheckedOutByUser; 3]
    );
}

#[test]
fn test_shutdown_is_idempotent() {
    let never = SourceControl::new();
    never.shutdown();
    never.shutdown();
    assert!(!never.is_initialized());

    let (scc, plugin) = bound(FakeBehavior::default());
    scc.shutdown();
    scc.shutdown();

    assert!(!scc.is_initialized());
    assert!(scc.worker_thread_id().is_none());
    assert_eq!(scc.session().phase(), Phase::Unloaded);
    assert_eq!(plugin.count("uninitialize"), 1);
}

#[test]
fn test_shutdown_releases_binding() {
    let (scc, plugin) = bound(FakeBehavior::default());
    assert!(Arc::strong_count(&plugin) > 1);

    scc.shutdown();

    assert_eq!(Arc::strong_count(&plugin), 1);
}

#[test]
fn test_operations_after_shutdown_fail() {
    let (scc, plugin) = bound(FakeBehavior::default());
    scc.shutdown();
    let calls = plugin.calls().len();

    assert!(!scc.check_out(&["a.lua"], ""));
    assert!(!scc.check_in(&["a.lua"], ""));
    assert!(!scc.show_diff("a.lua"));
    assert!(!scc.open_project(&project()));
    assert!(!scc.close_project());
    assert!(scc.select_project(&project()).is_none());
    assert_eq!(scc.get_file_status("a.lua"), Status::Error);
    assert_eq!(scc.get_files_status(&["a.lua", "b.lua"]), vec![Status::Error; 2]);

    assert_eq!(plugin.calls().len(), calls);
}

#[test]
fn test_failed_loader_returns_false() {
    let scc = SourceControl::new();
    let loader: PluginLoader = Box::new(|| Err(BindError::ProviderNotFound("Missing".into())));

    assert!(!scc.initialize_with("Missing", loader, WindowHandle::NONE));
    assert!(!scc.is_initialized());
    assert_eq!(scc.session().phase(), Phase::Unloaded);
}

#[test]
fn test_panicking_loader_returns_false() {
    let scc = SourceControl::new();
    let loader: PluginLoader = Box::new(|| panic!("module constructor crashed"));

    assert!(!scc.initialize_with("Crashy", loader, WindowHandle::NONE));
    assert!(!scc.is_initialized());
}

#[test]
fn test_failed_provider_initialize_returns_false() {
    let plugin = FakePlugin::new(FakeBehavior {
        init_code: SccCode::INITIALIZE_FAILED,
        ..FakeBehavior::default()
    });
    let scc = SourceControl::new();

    assert!(!scc.initialize_with("Fake", plugin.loader(), WindowHandle::NONE));
    assert!(!scc.is_initialized());
    assert_eq!(plugin.operations(), vec!["initialize"]);
    assert_eq!(Arc::strong_count(&plugin), 1);
}

#[test]
fn test_missing_provider_index_or_name_returns_false() {
    let scc = SourceControl::new();

    assert!(!scc.initialize_index(usize::MAX, WindowHandle::NONE));
    assert!(!scc.initialize_name("No Such Provider", WindowHandle::NONE));
    assert!(SourceControl::provider_name(usize::MAX).is_none());
}

#[test]
fn test_reinitialize_replaces_binding() {
    let (scc, first) = bound(FakeBehavior::default());
    let first_worker = scc.worker_thread_id();

    let second = FakePlugin::new(FakeBehavior::default());
    assert!(scc.initialize_with("Second", second.loader(), WindowHandle::NONE));

    assert_eq!(first.count("uninitialize"), 1);
    assert_ne!(scc.worker_thread_id(), first_worker);
    assert_eq!(scc.session().snapshot().provider.as_deref(), Some("Second"));
}

#[test]
fn test_threadsafe_status_queries_run_on_caller_thread() {
    let (scc, plugin) = bound(FakeBehavior {
        threadsafe_query_info: true,
        ..FakeBehavior::default()
    });
    assert!(scc.has_concurrent_status_queries());

    assert_eq!(scc.get_file_status("a.lua"), Status::CheckedIn);
    assert!(scc.check_out(&["a.lua"], ""));

    let worker = scc.worker_thread_id().unwrap();
    let calls = plugin.calls();
    let query = calls.iter().find(|call| call.operation == "query_info").unwrap();
    let checkout = calls.iter().find(|call| call.operation == "checkout").unwrap();
    assert_eq!(query.thread, thread::current().id());
    assert_eq!(checkout.thread, worker);
    assert_eq!(scc.metrics().direct_status_queries.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_status_queries_can_be_disabled() {
    use decoda_scc::SourceControlOptions;

    let plugin = FakePlugin::new(FakeBehavior {
        threadsafe_query_info: true,
        ..FakeBehavior::default()
    });
    let scc = SourceControl::with_options(SourceControlOptions {
        concurrent_status_queries: false,
        ..SourceControlOptions::default()
    });
    assert!(scc.initialize_with("Fake", plugin.loader(), WindowHandle::NONE));

    assert!(!scc.has_concurrent_status_queries());
    assert_eq!(scc.get_file_status("a.lua"), Status::CheckedIn);
    let query = plugin
        .calls()
        .into_iter()
        .find(|call| call.operation == "query_info")
        .unwrap();
    assert_eq!(Some(query.thread), scc.worker_thread_id());
}

#[test]
fn test_project_lifecycle() {
    let (scc, plugin) = bound(FakeBehavior::default());

    assert!(scc.open_project(&project()));
    assert!(scc.is_project_open());
    assert_eq!(scc.session().phase(), Phase::ProjectOpen);
    assert_eq!(scc.project().map(|p| p.project_name), Some("$/Game".to_string()));

    // Opening another project closes the first
    let other = ProjectContext::new("alice", "$/Tools", "C:/tools", "");
    assert!(scc.open_project(&other));
    assert_eq!(plugin.count("close_project"), 1);

    assert!(scc.close_project());
    assert!(!scc.is_project_open());
    assert_eq!(scc.session().phase(), Phase::Ready);

    // Nothing open: nothing to do
    assert!(scc.close_project());
    assert_eq!(plugin.count("close_project"), 2);
}

#[test]
fn test_shutdown_closes_open_project() {
    let (scc, plugin) = bound(FakeBehavior::default());
    assert!(scc.open_project(&project()));

    scc.shutdown();

    let ops = plugin.operations();
    let tail = &ops[ops.len() - 2..];
    assert_eq!(tail, &["close_project", "uninitialize"]);
}

#[test]
fn test_select_project_returns_provider_choice() {
    let (scc, _plugin) = bound(FakeBehavior::default());

    assert!(scc.selected_project().is_none());
    let chosen = scc.select_project(&project()).unwrap();
    assert_eq!(chosen.project_name, "$/Game/selected");
    assert_eq!(scc.selected_project(), Some(chosen.clone()));
    assert!(!scc.is_project_open());

    assert!(scc.open_project(&chosen));
    assert_eq!(scc.project(), Some(chosen));

    scc.shutdown();
    assert!(scc.selected_project().is_none());
}

#[test]
fn test_drop_shuts_down() {
    let (scc, plugin) = bound(FakeBehavior::default());
    drop(scc);

    assert_eq!(plugin.count("uninitialize"), 1);
    assert_eq!(Arc::strong_count(&plugin), 1);
}
