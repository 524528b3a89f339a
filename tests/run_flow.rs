//! End-to-end scheduling behavior through the public API.

use taskmesh::body::ModuleError;
use taskmesh::graphs::GraphBuilder;
use taskmesh::module::Module;
use taskmesh::ports::Port;
use taskmesh::runtimes::RunnerError;
use taskmesh::types::Priority;

fn noop(name: &str) -> Module {
    Module::task_fn(name, |_ctx| async { Ok(()) })
}

#[tokio::test]
async fn linear_pipeline_runs_each_module_once() {
    let stage = Port::atomic("stage", 0_u32);

    let download = Module::task_fn("download", |ctx| async move {
        ctx.write_output("stage", 1_u32)?;
        Ok(())
    });
    let verify = Module::task_fn("verify", |ctx| async move {
        let s: u32 = ctx.read_input("stage")?;
        ctx.write_output("stage", s + 1)?;
        Ok(())
    });
    let install = Module::task_fn("install", |ctx| async move {
        let s: u32 = ctx.read_input("stage")?;
        ctx.write_output("stage", s + 1)?;
        Ok(())
    });
    stage
        .output_of(&download)
        .input_of(&verify)
        .output_of(&verify)
        .input_of(&install)
        .output_of(&install);

    let _ = &download >> &verify >> &install;

    let graph = GraphBuilder::new()
        .add_root(&download)
        .with_workers(2)
        .compile()
        .unwrap();
    let report = graph.run().await.unwrap();

    assert_eq!(stage.get(), 3);
    assert_eq!(report.runs("download"), 1);
    assert_eq!(report.runs("verify"), 1);
    assert_eq!(report.runs("install"), 1);
    assert_eq!(report.total_runs(), 3);
}

#[tokio::test]
async fn condition_loop_reruns_until_branch_switches() {
    let attempts = Port::atomic("attempts", 0_u32);

    let init = noop("init");
    let check = Module::condition_fn("check", |ctx| async move {
        let n: u32 = ctx.read_input("attempts")?;
        ctx.write_output("attempts", n + 1)?;
        Ok(if n + 1 < 4 { 0 } else { 1 })
    });
    let done = noop("done");
    attempts.input_of(&check).output_of(&check);

    init.before(&[&check]);
    // Branch 0 loops back, branch 1 exits.
    check.before(&[&check, &done]);

    let graph = GraphBuilder::new()
        .add_root(&init)
        .with_workers(2)
        .compile()
        .unwrap();
    let report = graph.run().await.unwrap();

    assert_eq!(attempts.get(), 4);
    assert_eq!(report.runs("init"), 1);
    assert_eq!(report.runs("check"), 4);
    assert_eq!(report.runs("done"), 1);
}

#[tokio::test]
async fn joined_node_waits_for_all_strong_predecessors() {
    let seen = Port::atomic("seen", 0_u32);

    let left = noop("left");
    let right = noop("right");
    let join = Module::task_fn("join", |ctx| async move {
        let s: u32 = ctx.read_input("seen")?;
        ctx.write_output("seen", s + 1)?;
        Ok(())
    });
    seen.input_of(&join).output_of(&join);
    join.after(&[&left, &right]);

    let graph = GraphBuilder::new()
        .add_root(&join)
        .with_workers(4)
        .compile()
        .unwrap();
    let report = graph.run().await.unwrap();

    // Both predecessors fire, the join body runs exactly once.
    assert_eq!(seen.get(), 1);
    assert_eq!(report.runs("join"), 1);
}

#[tokio::test]
async fn single_worker_dispatches_by_priority_tier() {
    let order = Port::shared("order", Vec::<String>::new());

    let record = |name: &str, priority: Priority| {
        let order = order.clone();
        let tag = name.to_string();
        Module::task_fn(name, move |_ctx| {
            let order = order.clone();
            let tag = tag.clone();
            async move {
                let mut seen = order.get();
                seen.push(tag);
                order.set(seen);
                Ok(())
            }
        })
        .with_priority(priority)
    };

    let low = record("low", Priority::Low);
    let normal = record("normal", Priority::Normal);
    let high = record("high", Priority::High);

    let graph = GraphBuilder::new()
        .add_root(&low)
        .add_root(&normal)
        .add_root(&high)
        .with_workers(1)
        .compile()
        .unwrap();
    graph.run().await.unwrap();

    assert_eq!(order.get(), ["high", "normal", "low"]);
}

#[tokio::test]
async fn untaken_branch_sibling_never_runs() {
    let pick = Module::condition_fn("pick", |_ctx| async { Ok(1) });
    let skipped = noop("skipped");
    let taken = noop("taken");
    pick.before(&[&skipped, &taken]);

    let graph = GraphBuilder::new().add_root(&pick).compile().unwrap();
    let report = graph.run().await.unwrap();

    assert_eq!(report.runs("taken"), 1);
    assert_eq!(report.runs("skipped"), 0);
}

#[tokio::test]
async fn out_of_range_branch_is_fatal() {
    let wild = Module::condition_fn("wild", |_ctx| async { Ok(5) });
    let only = noop("only");
    wild.before(&[&only]);

    let graph = GraphBuilder::new().add_root(&wild).compile().unwrap();
    match graph.run().await {
        Err(RunnerError::BranchOutOfRange {
            module,
            index,
            successors,
        }) => {
            assert_eq!(module, "wild");
            assert_eq!(index, 5);
            assert_eq!(successors, 1);
        }
        other => panic!("expected BranchOutOfRange, got {other:?}"),
    }
}

#[tokio::test]
async fn cycle_without_entry_is_rejected() {
    let a = noop("a");
    let b = noop("b");
    a.before(&[&b]);
    b.before(&[&a]);

    let graph = GraphBuilder::new().add_root(&a).compile().unwrap();
    match graph.run().await {
        Err(RunnerError::NoEntryNodes) => {}
        other => panic!("expected NoEntryNodes, got {other:?}"),
    }
}

#[tokio::test]
async fn body_failure_halts_run_with_module_name() {
    let ok = noop("ok");
    let boom = Module::task_fn("boom", |_ctx| async {
        Err(ModuleError::Failed("sensor offline".into()))
    });
    let never = noop("never");
    let _ = &ok >> &boom >> &never;

    let graph = GraphBuilder::new().add_root(&ok).compile().unwrap();
    match graph.run().await {
        Err(RunnerError::Module { module, .. }) => assert_eq!(module, "boom"),
        other => panic!("expected Module error, got {other:?}"),
    }
}

#[tokio::test]
async fn graph_reruns_from_scratch() {
    let count = Port::atomic("count", 0_u64);
    let bump = {
        let count = count.clone();
        Module::task_fn("bump", move |_ctx| {
            let count = count.clone();
            async move {
                count.set(count.get() + 1);
                Ok(())
            }
        })
    };

    let graph = GraphBuilder::new().add_root(&bump).compile().unwrap();
    let first = graph.run().await.unwrap();
    let second = graph.run().await.unwrap();

    assert_eq!(count.get(), 2);
    assert_eq!(first.runs("bump"), 1);
    assert_eq!(second.runs("bump"), 1);
}
