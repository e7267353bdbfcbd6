//! Integration tests for the loader/action lifecycle driven through the router
//!
//! Covers:
//! - Loader success, failure, pending views and retry
//! - Cancellation of superseded loaders and guards
//! - Load identity (params and search params)
//! - Navigation guards and what stays on screen after a rejection
//! - Actions (reload after success, failure isolation, overlapping submissions)
//! - Stale-time caching
//! - Lazy pages and metadata timing
//! - History traversal events and concurrent navigation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use rhtmx_spa_router::*;
use serde_json::json;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn route(pattern: &str, name: &str, definition: RouteDefinition) -> Route {
    Route::new(pattern, Component::new(name))
        .unwrap()
        .with_definition(definition)
}

fn plain(pattern: &str, name: &str) -> Route {
    Route::new(pattern, Component::new(name)).unwrap()
}

fn router_at(table: RouteTable, url: &str) -> (Arc<MemoryHistory>, Router) {
    let history = Arc::new(MemoryHistory::new(url));
    let router = Router::builder(table).history(history.clone()).build();
    (history, router)
}

/// Polls `condition`, yielding to spawned tasks, for up to a second
async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn counting_loader(calls: Arc<AtomicUsize>, value: &'static str) -> RouteDefinition {
    RouteDefinition::new().loader(move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { Ok(json!(value)) }
    })
}

// ============================================================================
// Loaders
// ============================================================================

#[tokio::test]
async fn test_loader_data_reaches_page() {
    init_tracing();
    let table = RouteTable::new().with_route(route(
        "/users/:id",
        "User",
        RouteDefinition::new().loader(|ctx| async move {
            Ok(json!({ "id": ctx.params.get("id"), "tab": ctx.search_params.first("tab") }))
        }),
    ));
    let (_, router) = router_at(table, "/users/5?tab=posts");

    assert!(router.loader_state().is_loading());
    assert_eq!(router.render(&Component::new("Loading")).to_string(), "Loading");

    let state = router.lifecycle().settled().await;
    assert_eq!(state.data(), Some(&json!({ "id": "5", "tab": "posts" })));
    assert_eq!(router.render(&Component::new("Loading")).to_string(), "User");
}

#[tokio::test]
async fn test_route_pending_view_beats_fallback() {
    let gate = Arc::new(Notify::new());
    let table = RouteTable::new().with_route(route(
        "/slow",
        "Slow",
        RouteDefinition::new().pending(Component::new("Spinner")).loader({
            let gate = gate.clone();
            move |_| {
                let gate = gate.clone();
                async move {
                    gate.notified().await;
                    Ok(json!(null))
                }
            }
        }),
    ));
    let (_, router) = router_at(table, "/slow");

    assert_eq!(router.render(&Component::new("Loading")).to_string(), "Spinner");
    gate.notify_one();
    router.lifecycle().settled().await;
    assert_eq!(router.render(&Component::new("Loading")).to_string(), "Slow");
}

#[tokio::test]
async fn test_superseded_loader_never_wins() {
    init_tracing();
    let started = Arc::new(Notify::new());
    let gate = Arc::new(Notify::new());
    let a_signal: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));

    let route_a = route(
        "/a",
        "A",
        RouteDefinition::new().loader({
            let (started, gate, a_signal) = (started.clone(), gate.clone(), a_signal.clone());
            move |ctx| {
                *a_signal.lock().unwrap() = Some(ctx.signal.clone());
                started.notify_one();
                let gate = gate.clone();
                async move {
                    gate.notified().await;
                    Ok(json!("A"))
                }
            }
        }),
    );
    let route_b = route(
        "/b",
        "B",
        RouteDefinition::new().loader(|_| async { Ok(json!("B")) }),
    );
    let (_, router) = router_at(RouteTable::new().with_route(route_a).with_route(route_b), "/");

    router.navigate("/a");
    started.notified().await;
    router.navigate("/b");

    let signal = a_signal.lock().unwrap().clone().unwrap();
    assert!(signal.is_cancelled());

    assert_eq!(router.lifecycle().settled().await.data(), Some(&json!("B")));

    // Releasing A afterwards must not change anything
    gate.notify_one();
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(router.loader_state().data(), Some(&json!("B")));
}

#[tokio::test]
async fn test_unchanged_location_does_not_reload() {
    let calls = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::new().with_route(route("/list", "List", counting_loader(calls.clone(), "x")));
    let (_, router) = router_at(table, "/list?page=1");
    router.lifecycle().settled().await;

    router.navigate("/list?page=1");
    router.lifecycle().settled().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    router.set_search_params(SearchPatch::new().set("page", "2"), SetSearchOptions::merge());
    router.lifecycle().settled().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_params_containing_separators_reload() {
    let calls = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::new().with_route(route(
        "/x/:a/:b",
        "X",
        RouteDefinition::new().loader({
            let calls = calls.clone();
            move |ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(json!(ctx.params)) }
            }
        }),
    ));
    let (_, router) = router_at(table, "/x/1&b=2/3");
    router.lifecycle().settled().await;

    router.navigate("/x/1/2&b=3");
    let state = router.lifecycle().settled().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.data(), Some(&json!({ "a": "1", "b": "2&b=3" })));
}

#[tokio::test]
async fn test_loader_error_renders_error_view_and_retry_recovers() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let guard_calls = Arc::new(AtomicUsize::new(0));
    let definition = RouteDefinition::new()
        .error(Component::new("Oops"))
        .before_enter({
            let guard_calls = guard_calls.clone();
            move |_| {
                guard_calls.fetch_add(1, Ordering::SeqCst);
                async { true }
            }
        })
        .loader({
            let attempts = attempts.clone();
            move |_| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(anyhow::anyhow!("database unavailable"))
                    } else {
                        Ok(json!({ "attempt": attempt }))
                    }
                }
            }
        });
    let (_, router) = router_at(RouteTable::new().with_route(route("/report", "Report", definition)), "/report");

    let state = router.lifecycle().settled().await;
    assert_eq!(state.error().unwrap().to_string(), "database unavailable");

    let tree = router.render(&Component::new("Loading"));
    let RenderNode::Error { view, error, retry, .. } = tree.content() else {
        panic!("expected error node, got {}", tree);
    };
    assert_eq!(view.as_ref().map(Component::name), Some("Oops"));
    assert_eq!(error.to_string(), "database unavailable");

    assert!(retry.call());
    let state = router.lifecycle().settled().await;
    assert_eq!(state.data(), Some(&json!({ "attempt": 1 })));
    assert_eq!(guard_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_error_without_view_uses_builtin_default() {
    let definition = RouteDefinition::new().loader(|_| async { Err(anyhow::anyhow!("nope")) });
    let (_, router) = router_at(RouteTable::new().with_route(route("/x", "X", definition)), "/x");
    router.lifecycle().settled().await;

    let tree = router.render(&Component::new("Loading"));
    assert!(matches!(tree.content(), RenderNode::Error { view: None, .. }));
    assert_eq!(tree.to_string(), "Error[nope]");
}

// ============================================================================
// Guards
// ============================================================================

#[tokio::test]
async fn test_guard_rejection_keeps_prior_route_on_screen() {
    let admin_loads = Arc::new(AtomicUsize::new(0));
    let guard_calls = Arc::new(AtomicUsize::new(0));
    let home_loads = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::new()
        .with_route(route("/", "Home", counting_loader(home_loads.clone(), "home")))
        .with_route(route(
            "/admin",
            "Admin",
            counting_loader(admin_loads.clone(), "admin").before_enter({
                let guard_calls = guard_calls.clone();
                move |_| {
                    guard_calls.fetch_add(1, Ordering::SeqCst);
                    async { false }
                }
            }),
        ));
    let (_, router) = router_at(table, "/");
    assert_eq!(router.lifecycle().settled().await.data(), Some(&json!("home")));

    router.navigate("/admin");
    let state = router.lifecycle().settled().await;

    assert_eq!(state.data(), Some(&json!("home")));
    assert_eq!(router.location().pathname, "/admin");
    assert_eq!(admin_loads.load(Ordering::SeqCst), 0);

    let tree = router.render(&Component::new("Loading"));
    assert_eq!(tree.to_string(), "Home");
    let scope = tree.context().unwrap().route().unwrap();
    assert_eq!(scope.pattern(), "/");
    assert_eq!(tree.context().unwrap().router().unwrap().pathname, "/");

    // Retry targets the route still on screen
    assert!(router.retry());
    router.lifecycle().settled().await;
    assert_eq!(home_loads.load(Ordering::SeqCst), 2);

    // Navigating to the rejected route again asks the guard again
    router.navigate("/admin");
    router.lifecycle().settled().await;
    assert_eq!(guard_calls.load(Ordering::SeqCst), 2);
    assert_eq!(router.render(&Component::new("Loading")).to_string(), "Home");
}

#[tokio::test]
async fn test_rejected_page_never_sees_previous_loader_data() {
    let gate = Arc::new(Notify::new());
    let table = RouteTable::new()
        .with_route(route(
            "/",
            "Home",
            RouteDefinition::new().loader(|_| async { Ok(json!({ "secret": "home-data" })) }),
        ))
        .with_route(route(
            "/admin",
            "Admin",
            RouteDefinition::new()
                .pending(Component::new("Checking"))
                .before_enter({
                    let gate = gate.clone();
                    move |_| {
                        let gate = gate.clone();
                        async move {
                            gate.notified().await;
                            false
                        }
                    }
                }),
        ));
    let (_, router) = router_at(table, "/");
    router.lifecycle().settled().await;

    router.navigate("/admin");
    let tree = router.render(&Component::new("Loading"));
    assert_eq!(tree.to_string(), "Checking");
    let admin_scope = tree.content().context().unwrap().route().unwrap().clone();
    assert_eq!(admin_scope.pattern(), "/admin");
    assert!(matches!(admin_scope.loader_state(), Ok(LoaderState::Loading)));

    gate.notify_one();
    router.lifecycle().settled().await;

    assert!(matches!(admin_scope.loader_state(), Err(ContextError::OutsideRoute)));
    let tree = router.render(&Component::new("Loading"));
    assert_eq!(tree.to_string(), "Home");
    assert_eq!(
        tree.content().context().unwrap().loader_state().unwrap().data(),
        Some(&json!({ "secret": "home-data" }))
    );
}

#[tokio::test]
async fn test_superseded_guard_never_starts_its_loader() {
    let guarded_loads = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Notify::new());
    let gate = Arc::new(Notify::new());
    let table = RouteTable::new()
        .with_route(plain("/", "Home"))
        .with_route(route(
            "/guarded",
            "Guarded",
            counting_loader(guarded_loads.clone(), "guarded").before_enter({
                let (started, gate) = (started.clone(), gate.clone());
                move |_| {
                    started.notify_one();
                    let gate = gate.clone();
                    async move {
                        gate.notified().await;
                        true
                    }
                }
            }),
        ))
        .with_route(route(
            "/b",
            "B",
            RouteDefinition::new().loader(|_| async { Ok(json!("B")) }),
        ));
    let (_, router) = router_at(table, "/");

    router.navigate("/guarded");
    started.notified().await;
    router.navigate("/b");
    assert_eq!(router.lifecycle().settled().await.data(), Some(&json!("B")));

    // The guard answering late must not start the superseded loader
    gate.notify_one();
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(guarded_loads.load(Ordering::SeqCst), 0);
    assert_eq!(router.loader_state().data(), Some(&json!("B")));
    assert_eq!(router.render(&Component::new("Loading")).to_string(), "B");
}

#[tokio::test]
async fn test_guard_sees_params_and_search() {
    let seen = Arc::new(Mutex::new(None));
    let table = RouteTable::new().with_route(route(
        "/projects/:id",
        "Project",
        RouteDefinition::new()
            .before_enter({
                let seen = seen.clone();
                move |ctx| {
                    *seen.lock().unwrap() = Some((
                        ctx.params.get("id").cloned(),
                        ctx.search_params.first("view").map(str::to_string),
                    ));
                    async { true }
                }
            })
            .loader(|_| async { Ok(json!(true)) }),
    ));
    let (_, router) = router_at(table, "/projects/11?view=board");
    router.lifecycle().settled().await;

    assert_eq!(
        seen.lock().unwrap().clone(),
        Some((Some("11".to_string()), Some("board".to_string())))
    );
    assert_eq!(router.loader_state().data(), Some(&json!(true)));
}

// ============================================================================
// Actions
// ============================================================================

fn todo_routes(items: Arc<AtomicUsize>, gate: Option<Arc<Notify>>) -> RouteTable {
    let definition = RouteDefinition::new()
        .loader({
            let items = items.clone();
            move |_| {
                let count = items.load(Ordering::SeqCst);
                async move { Ok(json!({ "count": count })) }
            }
        })
        .action(move |ctx| {
            let items = items.clone();
            let gate = gate.clone();
            async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                let title = ctx.request.form.get("title").unwrap_or_default().to_string();
                if title.is_empty() {
                    anyhow::bail!("title is required");
                }
                items.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "added": title, "url": ctx.request.url }))
            }
        });

    RouteTable::new()
        .with_route(route("/todos", "Todos", definition))
        .with_route(plain("/elsewhere", "Elsewhere"))
}

#[tokio::test]
async fn test_action_success_reloads_loader() {
    init_tracing();
    let items = Arc::new(AtomicUsize::new(0));
    let (_, router) = router_at(todo_routes(items, None), "/todos?filter=open");
    assert_eq!(router.lifecycle().settled().await.data(), Some(&json!({ "count": 0 })));

    router
        .submit(FormData::new().with("title", "  Write docs "))
        .await
        .unwrap();

    let action = router.action_state();
    assert!(!action.is_submitting);
    assert_eq!(
        action.data,
        Some(json!({ "added": "Write docs", "url": "/todos?filter=open" }))
    );
    assert_eq!(router.loader_state().data(), Some(&json!({ "count": 1 })));
}

#[tokio::test]
async fn test_action_failure_leaves_loader_data() {
    let items = Arc::new(AtomicUsize::new(0));
    let (_, router) = router_at(todo_routes(items, None), "/todos");
    router.lifecycle().settled().await;

    router.submit(FormData::new()).await.unwrap();

    let action = router.action_state();
    assert!(!action.is_submitting);
    assert_eq!(action.error.unwrap().to_string(), "title is required");
    assert_eq!(router.loader_state().data(), Some(&json!({ "count": 0 })));
}

#[tokio::test]
async fn test_overlapping_submission_is_rejected() {
    let items = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let (_, router) = router_at(todo_routes(items.clone(), Some(gate.clone())), "/todos");
    router.lifecycle().settled().await;

    let first = tokio::spawn({
        let router = router.clone();
        async move { router.submit(FormData::new().with("title", "one")).await }
    });
    let mut action_rx = router.lifecycle().subscribe_action();
    action_rx.wait_for(|state| state.is_submitting).await.unwrap();

    let second = router.submit(FormData::new().with("title", "two")).await;
    assert!(matches!(second, Err(RouterError::SubmissionInFlight(pattern)) if pattern == "/todos"));

    gate.notify_one();
    first.await.unwrap().unwrap();
    assert_eq!(items.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_action_result_for_departed_route_is_discarded() {
    let items = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let (_, router) = router_at(todo_routes(items, Some(gate.clone())), "/todos");
    router.lifecycle().settled().await;

    let submission = tokio::spawn({
        let router = router.clone();
        async move { router.submit(FormData::new().with("title", "late")).await }
    });
    let mut action_rx = router.lifecycle().subscribe_action();
    action_rx.wait_for(|state| state.is_submitting).await.unwrap();

    router.navigate("/elsewhere");
    gate.notify_one();
    submission.await.unwrap().unwrap();

    let action = router.action_state();
    assert!(action.data.is_none());
    assert!(!action.is_submitting);
}

#[tokio::test]
async fn test_stale_route_scope_cannot_submit() {
    let items = Arc::new(AtomicUsize::new(0));
    let (_, router) = router_at(todo_routes(items, None), "/todos");
    router.lifecycle().settled().await;

    let tree = router.render(&Component::new("Loading"));
    let scope = tree.context().unwrap().route().unwrap().clone();
    router.navigate("/elsewhere");

    let result = scope.submit(FormData::new().with("title", "x")).await;
    assert!(matches!(
        result,
        Err(RouterError::Context(ContextError::OutsideRoute))
    ));
}

#[tokio::test]
async fn test_route_scope_is_bound_to_its_search_params() {
    let items = Arc::new(AtomicUsize::new(0));
    let (_, router) = router_at(todo_routes(items.clone(), None), "/todos?page=1");
    router.lifecycle().settled().await;

    let tree = router.render(&Component::new("Loading"));
    let scope = tree.context().unwrap().route().unwrap().clone();
    assert!(scope.is_current());

    router.navigate("/todos?page=2");
    router.lifecycle().settled().await;

    assert!(!scope.is_current());
    assert!(matches!(scope.loader_state(), Err(ContextError::OutsideRoute)));
    assert!(matches!(scope.action_state(), Err(ContextError::OutsideRoute)));
    assert!(matches!(
        scope.submit(FormData::new().with("title", "x")).await,
        Err(RouterError::Context(ContextError::OutsideRoute))
    ));
    assert_eq!(items.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_submit_on_route_without_action() {
    let (_, router) = router_at(RouteTable::new().with_route(plain("/", "Home")), "/");
    assert!(matches!(
        router.submit(FormData::new()).await,
        Err(RouterError::NoAction(_))
    ));
}

// ============================================================================
// Caching
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_fresh_results_are_replayed_until_stale() {
    let calls = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::new().with_route(route(
        "/items/:id",
        "Item",
        counting_loader(calls.clone(), "item").stale_time(Duration::from_secs(30)),
    ));
    let (_, router) = router_at(table, "/items/1");
    router.lifecycle().settled().await;

    router.navigate("/items/2");
    router.lifecycle().settled().await;
    router.navigate("/items/1");
    let state = router.lifecycle().settled().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.data(), Some(&json!("item")));

    tokio::time::advance(Duration::from_secs(31)).await;
    router.navigate("/items/2");
    router.lifecycle().settled().await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_default_stale_time_from_config() {
    let calls = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::new()
        .with_route(route("/a", "A", counting_loader(calls.clone(), "a")))
        .with_route(plain("/b", "B"));
    let config = RouterConfig::from_toml_str("[router]\ndefault_stale_time_ms = 60000").unwrap();
    let router = Router::builder(table)
        .history(Arc::new(MemoryHistory::new("/a")))
        .config(config)
        .build();
    router.lifecycle().settled().await;

    router.navigate("/b");
    router.navigate("/a");
    router.lifecycle().settled().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_uncached_by_default() {
    let calls = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::new()
        .with_route(route("/a", "A", counting_loader(calls.clone(), "a")))
        .with_route(plain("/b", "B"));
    let (_, router) = router_at(table, "/a");
    router.lifecycle().settled().await;

    router.navigate("/b");
    router.navigate("/a");
    router.lifecycle().settled().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Lazy Pages
// ============================================================================

#[tokio::test]
async fn test_lazy_page_metadata_applies_after_resolution() {
    let head = Arc::new(MemoryHead::new());
    let gate = Arc::new(Notify::new());
    let lazy = LazyPage::new({
        let gate = gate.clone();
        move || {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                Ok(Component::new("Settings"))
            }
        }
    });
    let table = RouteTable::new()
        .with_route(Route::new("/settings", lazy).unwrap().with_title("Settings"))
        .with_layout(LayoutRoute::new("/", Component::new("Root")));
    let router = Router::builder(table)
        .history(Arc::new(MemoryHistory::new("/settings")))
        .head(head.clone())
        .build();

    assert_eq!(router.render(&Component::new("Loading")).to_string(), "Root(Loading)");
    assert_eq!(head.title(), None);

    gate.notify_one();
    wait_until(|| head.title().is_some()).await;

    assert_eq!(head.title().as_deref(), Some("Settings"));
    assert_eq!(router.render(&Component::new("Loading")).to_string(), "Root(Settings)");
}

#[tokio::test]
async fn test_failed_lazy_page_can_be_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let lazy = LazyPage::new({
        let attempts = attempts.clone();
        move || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(anyhow::anyhow!("chunk failed to load"))
                } else {
                    Ok(Component::new("Reports"))
                }
            }
        }
    });
    let table = RouteTable::new().with_route(Route::new("/reports", lazy).unwrap());
    let (_, router) = router_at(table, "/reports");
    let fallback = Component::new("Loading");

    wait_until(|| matches!(router.render(&fallback), RenderNode::Error { .. })).await;
    assert!(router.retry());
    wait_until(|| router.render(&fallback).to_string() == "Reports").await;
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

// ============================================================================
// History Traversal
// ============================================================================

#[tokio::test]
async fn test_back_and_forward_reresolve() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let table = RouteTable::new()
        .with_route(plain("/", "Home"))
        .with_route(route("/a", "A", counting_loader(calls.clone(), "a")))
        .with_route(plain("/b", "B"));
    let (history, router) = router_at(table, "/");
    let listener = router.listen();

    router.navigate("/a");
    router.lifecycle().settled().await;
    router.navigate("/b");

    assert!(history.back());
    wait_until(|| router.location().pathname == "/a").await;
    assert_eq!(router.selection().route.unwrap().pattern(), "/a");
    assert_eq!(router.lifecycle().settled().await.data(), Some(&json!("a")));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert!(history.forward());
    wait_until(|| router.location().pathname == "/b").await;

    listener.abort();
}

#[tokio::test]
async fn test_revision_ticks_on_navigation() {
    let (_, router) = router_at(
        RouteTable::new().with_route(plain("/", "Home")).with_route(plain("/x", "X")),
        "/",
    );
    let mut revisions = router.subscribe_revision();
    let mut locations = router.subscribe_location();

    router.navigate("/x");

    assert!(revisions.has_changed().unwrap());
    locations.changed().await.unwrap();
    assert_eq!(locations.borrow().pathname, "/x");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_navigations_keep_selection_current() {
    let table = RouteTable::new().with_route(route(
        "/items/:id",
        "Item",
        RouteDefinition::new().loader(|ctx| async move { Ok(json!(ctx.params.get("id"))) }),
    ));
    let (history, router) = router_at(table, "/items/0");
    let listener = router.listen();

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let (router, history) = (router.clone(), history.clone());
            tokio::spawn(async move {
                for step in 0..25 {
                    router.navigate(&format!("/items/{}", worker * 100 + step));
                    if step % 5 == 0 {
                        history.back();
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for worker in workers {
        worker.await.unwrap();
    }
    listener.abort();
    let _ = listener.await;

    let location = router.location();
    let id = location.pathname.trim_start_matches("/items/").to_string();
    assert_eq!(router.selection().params().get("id"), Some(&id));
    assert_eq!(
        router.lifecycle().active_target().map(|target| target.pathname),
        Some(location.pathname.clone())
    );
    assert_eq!(router.lifecycle().settled().await.data(), Some(&json!(id)));
}
