//! Port data flow between concurrently running modules.

use taskmesh::body::ModuleError;
use taskmesh::graphs::GraphBuilder;
use taskmesh::module::Module;
use taskmesh::ports::{Port, PortError};
use taskmesh::runtimes::RunnerError;

#[tokio::test]
async fn consumer_waits_for_producer_threshold() {
    let level = Port::atomic("level", 0_u64);
    let total = Port::atomic("total", 0_u64);

    // Sole writer of `level`; the consumer runs as a sibling entry node and
    // polls until the threshold is crossed.
    let producer = Module::task_fn("producer", |ctx| async move {
        for step in 1..=100_u64 {
            ctx.write_output("level", step)?;
            tokio::task::yield_now().await;
        }
        Ok(())
    });
    let consumer = Module::task_fn("consumer", |ctx| async move {
        let seen: u64 = ctx.wait_input("level", |v: &u64| *v >= 100).await?;
        ctx.write_output("total", seen)?;
        Ok(())
    });
    level.output_of(&producer).input_of(&consumer);
    total.output_of(&consumer);

    let graph = GraphBuilder::new()
        .add_root(&producer)
        .add_root(&consumer)
        .with_workers(2)
        .compile()
        .unwrap();
    graph.run().await.unwrap();

    assert_eq!(total.get(), 100);
}

#[tokio::test]
async fn consumer_observes_both_thresholds_regardless_of_finish_order() {
    let x = Port::atomic("x", 0_u64);
    let y = Port::atomic("y", 0_u64);
    let sum = Port::atomic("sum", 0_u64);

    let ramp = |name: &str, port_name: &'static str, pause: u64| {
        Module::task_fn(name, move |ctx| async move {
            for step in 1..=100_u64 {
                ctx.write_output(port_name, step)?;
                if step % 25 == 0 {
                    tokio::time::sleep(std::time::Duration::from_millis(pause)).await;
                }
            }
            Ok(())
        })
    };
    let fast = ramp("fast", "x", 1);
    let slow = ramp("slow", "y", 5);
    let consumer = Module::task_fn("consumer", |ctx| async move {
        let x: u64 = ctx.wait_input("x", |v: &u64| *v >= 100).await?;
        let y: u64 = ctx.wait_input("y", |v: &u64| *v >= 100).await?;
        ctx.write_output("sum", x + y)?;
        Ok(())
    });
    x.output_of(&fast).input_of(&consumer);
    y.output_of(&slow).input_of(&consumer);
    sum.output_of(&consumer);

    let graph = GraphBuilder::new()
        .add_root(&fast)
        .add_root(&slow)
        .add_root(&consumer)
        .with_workers(3)
        .compile()
        .unwrap();
    graph.run().await.unwrap();

    assert_eq!(sum.get(), 200);
}

#[tokio::test]
async fn shared_port_carries_structured_payloads() {
    let manifest = Port::shared("manifest", serde_json::json!(null));

    let fetch = Module::task_fn("fetch", |ctx| async move {
        ctx.write_output(
            "manifest",
            serde_json::json!({"version": "2.4.1", "images": 4}),
        )?;
        Ok(())
    });
    let apply = Module::task_fn("apply", |ctx| async move {
        let manifest: serde_json::Value = ctx.read_input("manifest")?;
        let images = manifest["images"]
            .as_u64()
            .ok_or_else(|| ModuleError::Failed("manifest missing image count".into()))?;
        ctx.write_output("manifest", serde_json::json!({"applied": images}))?;
        Ok(())
    });
    manifest
        .output_of(&fetch)
        .input_of(&apply)
        .output_of(&apply);
    fetch.before(&[&apply]);

    let graph = GraphBuilder::new().add_root(&fetch).compile().unwrap();
    graph.run().await.unwrap();

    assert_eq!(manifest.get()["applied"], serde_json::json!(4));
}

#[tokio::test]
async fn mistyped_read_fails_the_run() {
    let level = Port::atomic("level", 7_u32);

    let reader = Module::task_fn("reader", |ctx| async move {
        // Declared as u32 above; this lookup must be rejected.
        let _wrong: String = ctx.read_input("level")?;
        Ok(())
    });
    level.input_of(&reader);

    let graph = GraphBuilder::new().add_root(&reader).compile().unwrap();
    match graph.run().await {
        Err(RunnerError::Module {
            module,
            source: ModuleError::Port(PortError::TypeMismatch { name, .. }),
        }) => {
            assert_eq!(module, "reader");
            assert_eq!(name, "level");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn one_port_fans_out_to_many_consumers() {
    let config = Port::shared("config", String::from("default"));

    let set = Module::task_fn("set", |ctx| async move {
        ctx.write_output("config", String::from("release"))?;
        Ok(())
    });
    let mk_reader = |name: &str, sink: &Port<String>| {
        let sink = sink.clone();
        Module::task_fn(name, move |ctx| {
            let sink = sink.clone();
            async move {
                let value: String = ctx.read_input("config")?;
                sink.set(value);
                Ok(())
            }
        })
    };
    let seen_a = Port::shared("seen_a", String::new());
    let seen_b = Port::shared("seen_b", String::new());
    let reader_a = mk_reader("reader_a", &seen_a);
    let reader_b = mk_reader("reader_b", &seen_b);
    config
        .output_of(&set)
        .input_of(&reader_a)
        .input_of(&reader_b);
    set.before(&[&reader_a, &reader_b]);

    let graph = GraphBuilder::new()
        .add_root(&set)
        .with_workers(4)
        .compile()
        .unwrap();
    graph.run().await.unwrap();

    assert_eq!(seen_a.get(), "release");
    assert_eq!(seen_b.get(), "release");
}
