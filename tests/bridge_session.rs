use serde_json::json;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tesselbox_testkit::unique_temp_dir;

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

fn connect_with_retry(addr: SocketAddr, timeout: Duration) -> TcpStream {
    let start = Instant::now();
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => return stream,
            Err(err) => {
                if start.elapsed() > timeout {
                    panic!("failed to connect to {addr}: {err}");
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn write_json_line(writer: &mut BufWriter<TcpStream>, value: serde_json::Value) {
    serde_json::to_writer(&mut *writer, &value).expect("write request");
    writer.write_all(b"\n").expect("write newline");
    writer.flush().expect("flush");
}

fn read_json_line(reader: &mut BufReader<TcpStream>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response");
    assert!(!line.trim().is_empty(), "empty response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn wait_for_exit(child: &mut std::process::Child, timeout: Duration) -> std::process::ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("try_wait") {
            return status;
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            panic!("process did not exit within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn bridge_plays_saves_and_shuts_down() {
    let port = pick_free_port();
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let saves = unique_temp_dir("bridge_session");

    let bin = env!("CARGO_BIN_EXE_tesselbox");
    let mut child = Command::new(bin)
        .args([
            "--bridge",
            &addr.to_string(),
            "--saves",
            saves.to_str().unwrap(),
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn tesselbox");

    let stream = connect_with_retry(addr, Duration::from_secs(5));
    stream
        .set_read_timeout(Some(Duration::from_secs(60)))
        .expect("set read timeout");
    stream
        .set_write_timeout(Some(Duration::from_secs(30)))
        .expect("set write timeout");

    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut writer = BufWriter::new(stream);

    write_json_line(&mut writer, json!({"op":"hello","id":1,"version":1}));
    let hello = read_json_line(&mut reader);
    assert_eq!(hello["event"], "hello");
    assert_eq!(hello["version"], 1);

    write_json_line(&mut writer, json!({"op":"update","id":2}));
    let early = read_json_line(&mut reader);
    assert_eq!(early["event"], "error");
    assert_eq!(early["code"], "not_playing");

    write_json_line(
        &mut writer,
        json!({"op":"start","id":3,"mode":"survival","world":"bridged","seed":7}),
    );
    let started = read_json_line(&mut reader);
    assert_eq!(started["event"], "started");
    assert_eq!(started["seed"], 7);

    for tick in 1..=5u64 {
        write_json_line(
            &mut writer,
            json!({"op":"update","id":3 + tick,"keys":{"d":true},"cursor":[640,360]}),
        );
        let updated = read_json_line(&mut reader);
        assert_eq!(updated["event"], "updated");
        assert_eq!(updated["tick"], tick);
    }

    write_json_line(&mut writer, json!({"op":"state","id":20}));
    let state = read_json_line(&mut reader);
    assert_eq!(state["event"], "state");
    assert_eq!(state["state"], "playing");
    assert_eq!(state["frame"]["world"], "bridged");
    assert_eq!(state["frame"]["tick"], 5);

    write_json_line(&mut writer, json!({"op":"teleport","id":21}));
    let unknown = read_json_line(&mut reader);
    assert_eq!(unknown["event"], "error");
    assert_eq!(unknown["code"], "unsupported");

    write_json_line(&mut writer, json!({"op":"save","id":22}));
    let saved = read_json_line(&mut reader);
    assert_eq!(saved["event"], "ok");
    assert!(saves.join("bridged.world").exists());
    assert!(saves.join("player_bridged.json").exists());

    write_json_line(&mut writer, json!({"op":"shutdown","id":23}));
    let shutdown = read_json_line(&mut reader);
    assert_eq!(shutdown["event"], "ok");

    drop(writer);
    drop(reader);

    let status = wait_for_exit(&mut child, Duration::from_secs(20));
    assert!(status.success(), "tesselbox exited with {status}");

    let _ = std::fs::remove_dir_all(&saves);
}
