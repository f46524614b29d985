//! Scripted upstream server standing in for the theme host and the profile API.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use monkeytype_card::config::Settings;

#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub delay: Option<Duration>,
}

impl Route {
    pub fn css(path: &str, body: &str) -> Self {
        Self {
            path: path.to_string(),
            status: 200,
            content_type: "text/css",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn json(path: &str, body: serde_json::Value) -> Self {
        Self {
            path: path.to_string(),
            status: 200,
            content_type: "application/json",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn text(path: &str, status: u16, body: &str) -> Self {
        Self {
            path: path.to_string(),
            status,
            content_type: "text/plain",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

pub struct UpstreamHarness {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    stop: Arc<AtomicBool>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl Drop for UpstreamHarness {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.base_url.trim_start_matches("http://"));
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

impl UpstreamHarness {
    pub fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        listener
            .set_nonblocking(true)
            .expect("set nonblocking listener");

        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
        let stop = Arc::new(AtomicBool::new(false));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let stop_clone = Arc::clone(&stop);
        let requests_clone = Arc::clone(&requests);

        let join_handle = thread::spawn(move || {
            loop {
                if stop_clone.load(Ordering::SeqCst) {
                    break;
                }

                match listener.accept() {
                    Ok((mut stream, _addr)) => {
                        let Some(path) = read_request_path(&mut stream) else {
                            continue;
                        };
                        requests_clone
                            .lock()
                            .expect("requests lock")
                            .push(path.clone());

                        let route = routes.iter().find(|route| route.path == path);
                        match route {
                            Some(route) => {
                                if let Some(delay) = route.delay {
                                    thread::sleep(delay);
                                }
                                write_response(
                                    &mut stream,
                                    route.status,
                                    route.content_type,
                                    &route.body,
                                );
                            }
                            None => write_response(&mut stream, 404, "text/plain", "404: Not Found"),
                        }
                    }
                    Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            base_url,
            requests,
            stop,
            join_handle: Some(join_handle),
        }
    }

    /// Settings pointing both upstreams at this server.
    pub fn settings(&self) -> Settings {
        Settings {
            themes_url: format!("{}/themes", self.base_url),
            profile_api_url: self.base_url.clone(),
            ..Settings::default()
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|requested| requested.as_str() == path)
            .count()
    }
}

/// Settings whose upstreams refuse connections.
pub fn unreachable_settings() -> Settings {
    Settings {
        themes_url: "http://127.0.0.1:1/themes".to_string(),
        profile_api_url: "http://127.0.0.1:1".to_string(),
        ..Settings::default()
    }
}

fn read_request_path(stream: &mut TcpStream) -> Option<String> {
    let mut bytes = Vec::new();
    let mut buf = [0_u8; 4096];

    stream.set_nonblocking(false).ok()?;
    stream.set_read_timeout(Some(Duration::from_secs(2))).ok()?;

    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => {
                bytes.extend_from_slice(&buf[..read]);
                if bytes.windows(4).any(|window| window == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => return None,
        }
    }

    let head = String::from_utf8_lossy(&bytes).to_string();
    let request_line = head.lines().next()?;
    request_line.split_whitespace().nth(1).map(ToOwned::to_owned)
}

fn write_response(stream: &mut TcpStream, status: u16, content_type: &str, body: &str) {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Error",
    };
    let payload = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(payload.as_bytes());
    let _ = stream.flush();
}
