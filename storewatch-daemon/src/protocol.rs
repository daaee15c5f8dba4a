use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::sink::Notification;

/// JSON newline-delimited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub cmd: String,
}

impl Request {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn into_data(self) -> Result<Value, DaemonError> {
        if self.ok {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(DaemonError::Protocol(
                self.error.unwrap_or_else(|| "unknown server error".to_string()),
            ))
        }
    }
}

fn connect(socket: &Path) -> Result<UnixStream, DaemonError> {
    if !socket.exists() {
        return Err(DaemonError::NotRunning {
            socket: socket.to_path_buf(),
        });
    }

    UnixStream::connect(socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::NotRunning {
                socket: socket.to_path_buf(),
            }
        } else {
            io_err(socket, err)
        }
    })
}

fn write_request(stream: &mut UnixStream, socket: &Path, request: &Request) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(socket, e))?;
    stream.flush().map_err(|e| io_err(socket, e))
}

fn read_response(
    reader: &mut BufReader<UnixStream>,
    socket: &Path,
) -> Result<Response, DaemonError> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "server closed connection before responding".to_string(),
        ));
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

/// Send one JSON request to the server socket and return one response.
pub fn send_request(socket: &Path, request: &Request) -> Result<Response, DaemonError> {
    let mut stream = connect(socket)?;
    write_request(&mut stream, socket, request)?;
    read_response(&mut BufReader::new(stream), socket)
}

pub fn request_status(socket: &Path) -> Result<Value, DaemonError> {
    let request = Request::new("status");

    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match send_request(socket, &request) {
            Ok(response) => return response.into_data(),
            Err(err @ DaemonError::NotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_stop(socket: &Path) -> Result<(), DaemonError> {
    send_request(socket, &Request::new("stop"))?
        .into_data()
        .map(|_| ())
}

/// Subscribe to change notifications. Blocks on each `next()` until the
/// server publishes, shuts down, or the connection drops.
pub fn subscribe(socket: &Path) -> Result<Subscription, DaemonError> {
    let mut stream = connect(socket)?;
    write_request(&mut stream, socket, &Request::new("subscribe"))?;
    let mut reader = BufReader::new(stream);
    read_response(&mut reader, socket)?.into_data()?;
    Ok(Subscription {
        reader,
        socket: socket.to_path_buf(),
    })
}

#[derive(Debug)]
pub struct Subscription {
    reader: BufReader<UnixStream>,
    socket: PathBuf,
}

impl Iterator for Subscription {
    type Item = Result<Notification, DaemonError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(serde_json::from_str(line.trim_end()).map_err(DaemonError::from)),
            Err(err) => Some(Err(io_err(&self.socket, err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_omits_absent_fields() {
        let encoded = serde_json::to_value(Response::ok(json!({"running": true}))).expect("encode");
        assert_eq!(encoded, json!({"ok": true, "data": {"running": true}}));

        let encoded = serde_json::to_value(Response::error("nope")).expect("encode");
        assert_eq!(encoded, json!({"ok": false, "error": "nope"}));
    }

    #[test]
    fn error_response_becomes_protocol_error() {
        let err = Response::error("unknown command 'sync'").into_data().unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(ref msg) if msg.contains("sync")));
    }

    #[test]
    fn missing_socket_means_not_running() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let err = send_request(&dir.path().join("absent.sock"), &Request::new("status")).unwrap_err();
        assert!(matches!(err, DaemonError::NotRunning { .. }), "got: {err}");
    }

    #[test]
    fn subscription_yields_notifications_until_eof() {
        let (client, mut server) = UnixStream::pair().expect("socketpair");
        server
            .write_all(b"{\"event\":\"database_update\"}\n{\"event\":\"database_update\"}\n")
            .expect("write");
        drop(server);

        let mut subscription = Subscription {
            reader: BufReader::new(client),
            socket: PathBuf::from("pair"),
        };
        let events: Vec<_> = subscription
            .by_ref()
            .map(|n| n.expect("notification").event)
            .collect();
        assert_eq!(events, ["database_update", "database_update"]);
        assert!(subscription.next().is_none());
    }
}
