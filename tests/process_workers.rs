//! Request flow through worker child processes.

use cluster_proxy::config::WorkerMode;

mod common;

#[tokio::test]
async fn test_process_workers_proxy_requests() {
    let backend = common::start_echo_backend().await;
    let config = common::proxy_config(
        WorkerMode::Process,
        2,
        &[("/echo", "up1")],
        &[("up1", backend.to_string())],
    );
    let (addr, shutdown) = common::start_proxy(&config, &common::process_launcher()).await;
    let client = common::client();

    for i in 0..8 {
        let res = client
            .put(format!("http://{addr}/echo?i={i}"))
            .body(format!("body-{i}"))
            .send()
            .await
            .expect("Proxy unreachable");
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.unwrap(), format!("PUT /echo?i={i}|-|body-{i}"));
    }

    let res = client.get(format!("http://{addr}/nope")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "Rule Not found");

    shutdown.trigger();
}

#[cfg(unix)]
#[tokio::test]
async fn test_killed_worker_fails_its_request() {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    let (backend, accepted) = common::start_hanging_backend().await;
    let config = common::proxy_config(
        WorkerMode::Process,
        1,
        &[("/slow", "up1")],
        &[("up1", backend.to_string())],
    );
    let (addr, pool, shutdown) =
        common::start_proxy_with_pool(&config, &common::process_launcher()).await;
    assert_eq!(pool.len(), 1);

    let worker = pool.workers()[0].clone();
    let pid = worker
        .label()
        .strip_prefix("pid ")
        .expect("process worker label carries its pid")
        .to_string();

    let request = tokio::spawn(async move {
        common::client()
            .get(format!("http://{addr}/slow"))
            .send()
            .await
            .unwrap()
    });

    // The worker is now blocked on the upstream call.
    common::wait_until(|| accepted.load(Ordering::SeqCst) >= 1).await;
    let status = std::process::Command::new("kill")
        .args(["-9", &pid])
        .status()
        .unwrap();
    assert!(status.success());

    let res = tokio::time::timeout(Duration::from_secs(10), request)
        .await
        .expect("request was not failed after the worker died")
        .unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.text().await.unwrap(), "Internal Server Error");

    common::wait_until(|| pool.is_empty()).await;
    assert!(!worker.is_alive());
    shutdown.trigger();
}

#[tokio::test]
async fn test_missing_worker_binary_fails_startup() {
    let config = common::proxy_config(WorkerMode::Process, 1, &[], &[]);
    let launcher = cluster_proxy::WorkerLauncher::Process {
        program: "/nonexistent/cluster-proxy".into(),
    };
    assert!(cluster_proxy::start(&config, &launcher).await.is_err());
}
