use pretty_assertions::assert_eq;
use savvy_core::{RecordedCommand, SessionConfig};
use savvy_server::{CaptureClient, CaptureServer, new_step_id};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

struct Running {
    server: Arc<CaptureServer>,
    serving: JoinHandle<()>,
    path: PathBuf,
    _dir: tempfile::TempDir,
}

fn start() -> Running {
    start_with(|config| config)
}

fn start_with(configure: impl FnOnce(SessionConfig) -> SessionConfig) -> Running {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.sock");
    let config = configure(SessionConfig::new(&path));
    let server = Arc::new(CaptureServer::bind(config).unwrap());
    let serving = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.listen_and_serve().await.unwrap() }
    });
    Running {
        server,
        serving,
        path,
        _dir: dir,
    }
}

/// Poll until the captured commands satisfy `done`.
async fn wait_until(server: &CaptureServer, done: impl Fn(&[RecordedCommand]) -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let commands = server.commands();
        if done(&commands) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out, captured so far: {commands:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for(server: &CaptureServer, n: usize) {
    wait_until(server, |commands| commands.len() >= n).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_captures_commands_in_order() {
    let running = start();
    let client = CaptureClient::new(&running.path);

    for command in ["ls -la", "  git status  ", "", "echo done"] {
        client.send(command).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    wait_for(&running.server, 3).await;

    let commands: Vec<String> = running
        .server
        .commands()
        .into_iter()
        .map(|c| c.command)
        .collect();
    assert_eq!(commands, vec!["ls -la", "git status", "echo done"]);

    running.server.close();
    running.serving.await.unwrap();
    assert!(!running.path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connections_lose_nothing() {
    let running = start();

    let sends: Vec<_> = (0..50)
        .map(|i| {
            let client = CaptureClient::new(&running.path);
            tokio::spawn(async move { client.send(&format!("echo {i}")).await })
        })
        .collect();
    for send in sends {
        send.await.unwrap().unwrap();
    }
    wait_for(&running.server, 50).await;

    let commands = running.server.commands();
    assert_eq!(commands.len(), 50);
    let unique: BTreeSet<String> = commands.into_iter().map(|c| c.command).collect();
    let expected: BTreeSet<String> = (0..50).map(|i| format!("echo {i}")).collect();
    assert_eq!(unique, expected);

    running.server.close();
    running.serving.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bad_connection_does_not_stop_capture() {
    let running = start();

    let mut broken = tokio::net::UnixStream::connect(&running.path)
        .await
        .unwrap();
    broken.write_all(&[0xff, 0xfe, 0x00]).await.unwrap();
    drop(broken);

    CaptureClient::new(&running.path).send("pwd").await.unwrap();
    wait_for(&running.server, 1).await;
    assert_eq!(running.server.commands()[0].command, "pwd");

    running.server.close();
    running.serving.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_attachment() {
    let running = start();
    let file = running.path.with_file_name("deployment.yaml");
    std::fs::write(&file, "replicas: 3\n").unwrap();

    let client = CaptureClient::new(&running.path);
    client
        .send(&format!("savvy record file {}", file.display()))
        .await
        .unwrap();
    client.send_file(&file).await.unwrap();
    wait_for(&running.server, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let commands = running.server.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(
        commands[0].command,
        format!("savvy record file {}", file.display())
    );
    let attachment = commands[0].file.as_ref().unwrap();
    assert_eq!(attachment.content, b"replicas: 3\n");

    running.server.close();
    running.serving.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_directive_closes_server() {
    let running = start();
    let token = running.server.shutdown_token();

    CaptureClient::new(&running.path).shutdown().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), running.serving)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(token.is_cancelled());
    assert!(!running.path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_typed_directive_text_is_recorded() {
    let running = start();
    let client = CaptureClient::new(&running.path);

    client.send("#savvy:shutdown").await.unwrap();
    wait_for(&running.server, 1).await;
    client.send("#savvy:file /etc/passwd").await.unwrap();
    wait_for(&running.server, 2).await;

    let commands: Vec<String> = running
        .server
        .commands()
        .into_iter()
        .map(|c| c.command)
        .collect();
    assert_eq!(commands, vec!["#savvy:shutdown", "#savvy:file /etc/passwd"]);
    assert!(!running.server.shutdown_token().is_cancelled());

    running.server.close();
    running.serving.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_exit_status_is_recorded() {
    let running = start();
    let client = CaptureClient::new(&running.path);
    let build = new_step_id();
    let check = new_step_id();

    client.send_step(&build, "make build", Some("~/src $ ")).await.unwrap();
    wait_for(&running.server, 1).await;
    client.send_step(&check, "make check", None).await.unwrap();
    client.send_step(&check, "make check", None).await.unwrap();
    wait_for(&running.server, 2).await;
    client.send_exit_status(&check, 2).await.unwrap();
    wait_until(&running.server, |commands| commands[1].exit_code == 2).await;

    let commands = running.server.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].prompt.as_deref(), Some("~/src $ "));
    assert_eq!(commands[0].exit_code, 0);
    assert!(commands[1].failed());

    running.server.close();
    running.serving.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ignore_errors_drops_failed_commands() {
    let running = start_with(|config| config.with_ignore_errors(true));
    let client = CaptureClient::new(&running.path);
    let ok = new_step_id();
    let failed = new_step_id();

    client.send_step(&ok, "cargo fmt", None).await.unwrap();
    client.send_step(&failed, "cargo tset", None).await.unwrap();
    wait_for(&running.server, 2).await;
    client.send_exit_status(&ok, 0).await.unwrap();
    client.send_exit_status(&failed, 101).await.unwrap();
    wait_until(&running.server, |commands| commands.len() == 1).await;

    let commands: Vec<String> = running
        .server
        .commands()
        .into_iter()
        .map(|c| c.command)
        .collect();
    assert_eq!(commands, vec!["cargo fmt"]);

    running.server.close();
    running.serving.await.unwrap();
}
