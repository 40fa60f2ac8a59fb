//! A minimal passive-mode FTP server serving a local directory
//!
//! Speaks just enough of the protocol for the ftp driver: USER/PASS, TYPE,
//! NOOP, PASV, LIST, RETR and QUIT. Listings are POSIX `ls -l` lines, with
//! symlinks reported as links. One thread per control connection.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

pub struct FtpServer {
    port: u16,
    retrievals: Arc<AtomicUsize>,
}

impl FtpServer {
    /// Serve `root`, accepting only `username`/`password`
    pub fn start(root: &Path, username: &str, password: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind FTP listener");
        let port = listener.local_addr().expect("listener address").port();
        let retrievals = Arc::new(AtomicUsize::new(0));

        let root = root.to_path_buf();
        let login = (username.to_string(), password.to_string());
        let counter = retrievals.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let session = Session {
                    root: root.clone(),
                    login: login.clone(),
                    retrievals: counter.clone(),
                };
                thread::spawn(move || session.run(stream));
            }
        });

        Self { port, retrievals }
    }

    /// `ftp://` URL for `path` with the given userinfo
    pub fn url(&self, userinfo: &str, path: &str) -> String {
        format!("ftp://{}127.0.0.1:{}{}", userinfo, self.port, path)
    }

    /// Number of RETR transfers served
    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }
}

struct Session {
    root: PathBuf,
    login: (String, String),
    retrievals: Arc<AtomicUsize>,
}

impl Session {
    fn run(self, stream: TcpStream) {
        let mut reader = BufReader::new(stream.try_clone().expect("clone control stream"));
        let mut control = stream;
        let mut user = String::new();
        let mut logged_in = false;
        let mut passive: Option<TcpListener> = None;

        if reply(&mut control, "220 test server ready").is_err() {
            return;
        }

        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            let line = line.trim_end();
            let (verb, arg) = match line.split_once(' ') {
                Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
                None => (line.to_ascii_uppercase(), String::new()),
            };

            let result = match verb.as_str() {
                "USER" => {
                    user = arg;
                    reply(&mut control, "331 password required")
                }
                "PASS" => {
                    logged_in = user == self.login.0 && arg == self.login.1;
                    if logged_in {
                        reply(&mut control, "230 logged in")
                    } else {
                        reply(&mut control, "530 login incorrect")
                    }
                }
                "QUIT" => {
                    let _ = reply(&mut control, "221 bye");
                    return;
                }
                _ if !logged_in => reply(&mut control, "530 not logged in"),
                "TYPE" | "NOOP" => reply(&mut control, "200 ok"),
                "PASV" => {
                    let listener = TcpListener::bind("127.0.0.1:0").expect("bind data listener");
                    let port = listener.local_addr().expect("data address").port();
                    passive = Some(listener);
                    reply(
                        &mut control,
                        &format!(
                            "227 Entering Passive Mode (127,0,0,1,{},{}).",
                            port / 256,
                            port % 256
                        ),
                    )
                }
                "LIST" => {
                    let dir = self.resolve(&arg);
                    match (listing(&dir), passive.take()) {
                        (Some(body), Some(listener)) => send(&mut control, &listener, body.as_bytes()),
                        (_, listener) => refuse(&mut control, listener, "550 no such directory"),
                    }
                }
                "RETR" => {
                    let file = self.resolve(&arg);
                    match (fs::read(&file), passive.take()) {
                        (Ok(body), Some(listener)) => {
                            self.retrievals.fetch_add(1, Ordering::SeqCst);
                            send(&mut control, &listener, &body)
                        }
                        (_, listener) => refuse(&mut control, listener, "550 no such file"),
                    }
                }
                _ => reply(&mut control, "502 command not implemented"),
            };

            if result.is_err() {
                return;
            }
        }
    }

    fn resolve(&self, remote: &str) -> PathBuf {
        let relative = remote.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }
}

fn reply(control: &mut TcpStream, message: &str) -> std::io::Result<()> {
    control.write_all(format!("{}\r\n", message).as_bytes())
}

fn send(control: &mut TcpStream, listener: &TcpListener, body: &[u8]) -> std::io::Result<()> {
    reply(control, "150 opening data connection")?;
    let (mut data, _) = listener.accept()?;
    data.write_all(body)?;
    drop(data);
    reply(control, "226 transfer complete")
}

/// The client connects to the passive port before reading the reply, so
/// take that connection before refusing.
fn refuse(control: &mut TcpStream, listener: Option<TcpListener>, message: &str) -> std::io::Result<()> {
    if let Some(listener) = listener {
        drop(listener.accept()?);
    }
    reply(control, message)
}

/// `ls -l` style lines for `dir`, including `.` and `..`
fn listing(dir: &Path) -> Option<String> {
    let mut lines = vec![
        "total 0".to_string(),
        "drwxr-xr-x 2 ftp ftp 4096 Jan 15 2024 .".to_string(),
        "drwxr-xr-x 2 ftp ftp 4096 Jan 15 2024 ..".to_string(),
    ];

    let mut entries: Vec<_> = fs::read_dir(dir).ok()?.flatten().collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let metadata = fs::symlink_metadata(entry.path()).ok()?;
        let line = if metadata.file_type().is_symlink() {
            let target = fs::read_link(entry.path()).ok()?;
            format!(
                "lrwxrwxrwx 1 ftp ftp 0 Jan 15 2024 {} -> {}",
                name,
                target.display()
            )
        } else if metadata.is_dir() {
            format!("drwxr-xr-x 2 ftp ftp 4096 Jan 15 2024 {}", name)
        } else {
            format!("-rw-r--r-- 1 ftp ftp {} Jan 15 2024 {}", metadata.len(), name)
        };
        lines.push(line);
    }

    Some(lines.join("\r\n") + "\r\n")
}
