use crate::bridge::controller::{BridgeEndpoint, BridgeMsg};
use crate::bridge::protocol::{self, ErrorCode, Request};
use anyhow::Result;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const CAPABILITIES: [&str; 12] = [
    "hello",
    "start",
    "update",
    "state",
    "mine",
    "place",
    "select_slot",
    "jump",
    "save",
    "list_worlds",
    "menu",
    "shutdown",
];

pub struct BridgeServerHandle {
    pub endpoint: BridgeEndpoint,
    pub local_addr: SocketAddr,
    #[allow(dead_code)]
    join: thread::JoinHandle<()>,
}

pub struct BridgeServer;

impl BridgeServer {
    /// Bind `addr` and accept controllers on a background thread. Requests
    /// arrive on the returned endpoint; the caller answers each one.
    pub fn start(addr: SocketAddr) -> Result<BridgeServerHandle> {
        let (to_game_tx, to_game_rx) = mpsc::sync_channel::<BridgeMsg>(256);

        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(false)?;
        let local_addr = listener.local_addr()?;
        let controller_active = Arc::new(AtomicBool::new(false));

        let join = thread::spawn(move || {
            tracing::info!(addr = %local_addr, "Bridge listening");
            loop {
                let (stream, peer) = match listener.accept() {
                    Ok(conn) => conn,
                    Err(err) => {
                        tracing::warn!(%err, "Bridge accept failed");
                        continue;
                    }
                };

                let controller_active = Arc::clone(&controller_active);
                let to_game_tx = to_game_tx.clone();
                thread::spawn(move || {
                    handle_connection(stream, peer.to_string(), controller_active, to_game_tx);
                });
            }
        });

        Ok(BridgeServerHandle {
            endpoint: BridgeEndpoint { rx: to_game_rx },
            local_addr,
            join,
        })
    }
}

fn handle_connection(
    mut stream: TcpStream,
    peer: String,
    controller_active: Arc<AtomicBool>,
    to_game: SyncSender<BridgeMsg>,
) {
    let claimed = controller_active
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok();

    if !claimed {
        let mut writer = BufWriter::new(&mut stream);
        let _ = write_value(
            &mut writer,
            &protocol::event_error(None, ErrorCode::Busy, "controller already connected"),
        );
        drop(writer);
        let _ = stream.shutdown(Shutdown::Both);
        return;
    }
    tracing::info!(peer = peer.as_str(), "Bridge controller connected");

    let mut reader = BufReader::new(match stream.try_clone() {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(%err, "Failed to clone bridge stream");
            controller_active.store(false, Ordering::SeqCst);
            return;
        }
    });
    let mut writer = BufWriter::new(stream);

    let mut greeted = false;
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(n) => {
                if n > protocol::MAX_LINE_BYTES {
                    let _ = write_value(
                        &mut writer,
                        &protocol::event_error(None, ErrorCode::BadRequest, "line too large"),
                    );
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(%err, "Bridge read failed");
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let req = match protocol::decode_request(trimmed) {
            Ok(req) => req,
            Err(err) => {
                tracing::debug!(peer = peer.as_str(), message = err.message.as_str(), "Rejected request");
                let _ = write_value(
                    &mut writer,
                    &protocol::event_error(err.id, err.code, err.message),
                );
                continue;
            }
        };
        tracing::debug!(peer = peer.as_str(), op = req.op(), "Bridge request");

        match req {
            Request::Hello(hello) => {
                if greeted {
                    let _ = write_value(
                        &mut writer,
                        &protocol::event_error(
                            hello.id,
                            ErrorCode::BadRequest,
                            "hello already completed",
                        ),
                    );
                    continue;
                }

                if hello.version != protocol::PROTOCOL_VERSION {
                    let _ = write_value(
                        &mut writer,
                        &protocol::event_error(
                            hello.id,
                            ErrorCode::Unsupported,
                            format!(
                                "unsupported protocol version {}, expected {}",
                                hello.version,
                                protocol::PROTOCOL_VERSION
                            ),
                        ),
                    );
                    break;
                }

                greeted = true;
                let _ = write_value(&mut writer, &protocol::event_hello(hello.id, &CAPABILITIES));
                let _ = to_game.send(BridgeMsg::Connected);
            }
            Request::Unknown { id, op } => {
                if !greeted {
                    let _ = write_value(
                        &mut writer,
                        &protocol::event_error(id, ErrorCode::Unauthorized, "hello required"),
                    );
                    break;
                }
                let _ = write_value(
                    &mut writer,
                    &protocol::event_error(id, ErrorCode::Unsupported, format!("unknown op `{op}`")),
                );
            }
            other => {
                if !greeted {
                    let _ = write_value(
                        &mut writer,
                        &protocol::event_error(
                            other.request_id(),
                            ErrorCode::Unauthorized,
                            "hello required",
                        ),
                    );
                    break;
                }

                let (resp_tx, resp_rx) = mpsc::sync_channel(1);
                let timeout = timeout_for_request(&other);
                let request_id = other.request_id();
                match to_game.try_send(BridgeMsg::Request {
                    request: other,
                    respond_to: resp_tx,
                }) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        let _ = write_value(
                            &mut writer,
                            &protocol::event_error(request_id, ErrorCode::Busy, "server busy"),
                        );
                        continue;
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }

                let response = resp_rx.recv_timeout(timeout).unwrap_or_else(|_| {
                    protocol::event_error(
                        request_id,
                        ErrorCode::Internal,
                        "timeout waiting for response",
                    )
                });
                let _ = write_value(&mut writer, &response);
            }
        }
    }

    tracing::info!(peer = peer.as_str(), "Bridge controller disconnected");
    if greeted {
        let _ = to_game.send(BridgeMsg::Disconnected);
    }

    controller_active.store(false, Ordering::SeqCst);
}

fn timeout_for_request(request: &Request) -> Duration {
    match request {
        // Starting loads or generates a world and saving writes one.
        Request::Start(_) | Request::Save { .. } | Request::Menu { .. } => Duration::from_secs(60),
        _ => Duration::from_secs(30),
    }
}

fn write_value<W: Write>(writer: &mut W, value: &serde_json::Value) -> Result<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
