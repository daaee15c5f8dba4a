//! Socket server: status, subscribe fan-out, and stop.

use std::fs;
use std::time::Duration;

use storewatch_core::WatchConfig;
use storewatch_daemon::{request_status, request_stop, run, subscribe, ServeOptions};
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscribers_receive_updates_until_stop() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("params.db");
    let socket = dir.path().join("sw.sock");
    fs::write(&db, b"v0").expect("create store");

    let options = ServeOptions::new(&db, &socket, &WatchConfig::default());
    let server = tokio::spawn(run(options));

    let (status, event) = {
        let socket = socket.clone();
        let db = db.clone();
        tokio::task::spawn_blocking(move || {
            let status = request_status(&socket).expect("status");
            let mut subscription = subscribe(&socket).expect("subscribe");
            fs::write(&db, b"v1").expect("write store");
            let event = subscription
                .next()
                .expect("notification before eof")
                .expect("decode notification");
            (status, event)
        })
        .await
        .expect("client join")
    };

    assert_eq!(status["running"], serde_json::json!(true));
    assert_eq!(status["state"], serde_json::json!("running"));
    assert_eq!(event.event, "database_update");

    {
        let socket = socket.clone();
        tokio::task::spawn_blocking(move || request_stop(&socket).expect("stop"))
            .await
            .expect("stop join");
    }

    let outcome = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server exits after stop")
        .expect("server join");
    outcome.expect("server result");
    assert!(!socket.exists(), "socket file is removed on shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_command_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let socket = dir.path().join("sw.sock");
    let options = ServeOptions::new(dir.path().join("params.db"), &socket, &WatchConfig::default());
    let server = tokio::spawn(run(options));

    let response = {
        let socket = socket.clone();
        tokio::task::spawn_blocking(move || {
            request_status(&socket).expect("server up");
            storewatch_daemon::send_request(&socket, &storewatch_daemon::Request::new("sync"))
                .expect("response")
        })
        .await
        .expect("client join")
    };
    assert!(!response.ok);
    assert!(response.error.unwrap_or_default().contains("unknown command"));

    let stop_socket = socket.clone();
    tokio::task::spawn_blocking(move || request_stop(&stop_socket).expect("stop"))
        .await
        .expect("stop join");
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server exits")
        .expect("join")
        .expect("server result");
}
