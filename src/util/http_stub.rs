//! One-shot HTTP/1.1 responder on 127.0.0.1 for exercising the reqwest clients.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Request as the stub saw it.
#[derive(Debug)]
pub struct Captured {
    pub head: String,
    pub body: String,
}

impl Captured {
    pub fn request_line(&self) -> &str { self.head.lines().next().unwrap_or("") }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|l| {
            let (k, v) = l.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }
}

pub enum Reply {
    Canned { status_line: &'static str, body: String },
    /// Read the request, then never answer.
    Stall,
}

/// Serve a single connection; returns the base url and the captured request.
pub async fn serve_once(reply: Reply) -> (String, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let captured = read_request(&mut sock).await;
        let _ = tx.send(captured);
        match reply {
            Reply::Stall => tokio::time::sleep(Duration::from_secs(30)).await,
            Reply::Canned { status_line, body } => {
                let resp = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                sock.write_all(resp.as_bytes()).await.unwrap();
                let _ = sock.shutdown().await;
            }
        }
    });
    (base, rx)
}

async fn read_request(sock: &mut TcpStream) -> Captured {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).into_owned();
            let want = Captured { head: head.clone(), body: String::new() }
                .header("content-length")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < pos + 4 + want {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 { break; }
                buf.extend_from_slice(&chunk[..n]);
            }
            let body = String::from_utf8_lossy(&buf[pos + 4..]).into_owned();
            return Captured { head, body };
        }
        let n = sock.read(&mut chunk).await.unwrap();
        if n == 0 {
            return Captured { head: String::from_utf8_lossy(&buf).into_owned(), body: String::new() };
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
