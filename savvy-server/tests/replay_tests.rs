use pretty_assertions::assert_eq;
use savvy_core::{Bindings, ReplayConfig, ReplayStep};
use savvy_server::{ClientError, ReplayClient, ReplayServer, Request, Response};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;

struct Running {
    server: Arc<ReplayServer>,
    serving: JoinHandle<()>,
    client: ReplayClient,
    path: PathBuf,
    _dir: tempfile::TempDir,
}

fn start(steps: Vec<ReplayStep>) -> Running {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.sock");
    let server = Arc::new(ReplayServer::bind(ReplayConfig::new(&path, steps)).unwrap());
    let serving = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.listen_and_serve().await.unwrap() }
    });
    Running {
        server,
        serving,
        client: ReplayClient::new(&path),
        path,
        _dir: dir,
    }
}

fn three_steps() -> Vec<ReplayStep> {
    vec![
        ReplayStep::new("echo hello"),
        ReplayStep::new("echo <param>"),
        ReplayStep::new("echo <param> <param2>"),
    ]
}

fn bind(key: &str, value: &str) -> Bindings {
    Bindings::from([(key.to_string(), value.to_string())])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_walks_three_steps() {
    let running = start(three_steps());
    let client = &running.client;

    let step = client.current().await.unwrap();
    assert_eq!(step.index, 0);
    assert_eq!(step.total, 3);
    assert_eq!(step.command_with_params, "echo hello");

    assert_eq!(client.previous().await.unwrap().index, 0);

    let step = client.next().await.unwrap();
    assert_eq!(step.index, 1);
    assert_eq!(step.command_with_params, "echo <param>");

    let step = client.set_params(bind("<param>", "world")).await.unwrap();
    assert_eq!(step.command_with_params, "echo world");

    client.next().await.unwrap();
    let step = client.next().await.unwrap();
    assert_eq!(step.index, 2);
    assert_eq!(step.command_with_params, "echo world <param2>");

    let step = client.set_params(bind("<param2>", "again")).await.unwrap();
    assert_eq!(step.command_with_params, "echo world again");

    running.server.close();
    running.serving.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_params_are_first_writer_wins() {
    let running = start(three_steps());
    let client = &running.client;

    client.next().await.unwrap();
    client.set_params(bind("<param>", "value")).await.unwrap();
    let step = client
        .set_params(bind("<param>", "anotherValue"))
        .await
        .unwrap();
    assert_eq!(step.command_with_params, "echo value");

    client.previous().await.unwrap();
    client.next().await.unwrap();
    assert_eq!(running.server.state().params()["<param>"], "value");

    running.server.close();
    running.serving.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_request_gets_error_response() {
    let running = start(three_steps());

    let mut stream = tokio::net::UnixStream::connect(&running.path)
        .await
        .unwrap();
    stream.write_all(b"{\"command\":\"jump\"}\n").await.unwrap();

    let mut line = String::new();
    BufReader::new(&mut stream)
        .read_line(&mut line)
        .await
        .unwrap();
    let response: Response = serde_json::from_str(&line).unwrap();
    assert!(matches!(response, Response::Error { .. }));

    // The server keeps serving after a bad request.
    assert_eq!(running.client.current().await.unwrap().index, 0);

    running.server.close();
    running.serving.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_request() {
    let running = start(three_steps());
    let token = running.server.shutdown_token();

    running.client.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), running.serving)
        .await
        .expect("server did not stop")
        .unwrap();

    assert!(token.is_cancelled());
    assert!(!running.path.exists());

    let err = running.client.request(&Request::Current).await.unwrap_err();
    assert!(matches!(err, ClientError::Unavailable(_)));
}
