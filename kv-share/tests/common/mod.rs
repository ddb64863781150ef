#![allow(dead_code)]

//! 测试用的内存 Redis：只实现本仓库用到的命令，并记录收到的每一条命令。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kv_share::{KvPool, PoolConfig, new_pool};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedReadHalf;
use tokio::task::AbortHandle;

#[derive(Default)]
struct Store {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
}

pub struct FakeRedis {
    pub addr: String,
    log: Arc<Mutex<Vec<Vec<String>>>>,
    accepted: Arc<AtomicUsize>,
    sessions: Arc<Mutex<Vec<AbortHandle>>>,
}

impl FakeRedis {
    /// 启动服务；`password` 为 Some 时要求先 AUTH
    pub async fn start(password: Option<&str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();

        let log = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));
        let sessions = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(Mutex::new(Store::default()));
        let password = password.map(str::to_string);

        {
            let log = log.clone();
            let accepted = accepted.clone();
            let sessions = sessions.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let (reader, mut writer) = stream.into_split();
                    let log = log.clone();
                    let store = store.clone();
                    let password = password.clone();
                    let handle = tokio::spawn(async move {
                        let mut reader = BufReader::new(reader);
                        let mut authed = password.is_none();
                        while let Some(args) = read_command(&mut reader).await {
                            let name = args[0].to_ascii_uppercase();
                            if name != "CLIENT" {
                                let mut entry = vec![name.clone()];
                                entry.extend(args[1..].iter().cloned());
                                log.lock().unwrap().push(entry);
                            }
                            let reply =
                                execute(&name, &args[1..], &store, password.as_deref(), &mut authed);
                            if writer.write_all(&reply).await.is_err() {
                                break;
                            }
                        }
                    });
                    sessions.lock().unwrap().push(handle.abort_handle());
                }
            });
        }

        Self {
            addr,
            log,
            accepted,
            sessions,
        }
    }

    /// 收到的命令（不含连接握手时的 CLIENT SETINFO）
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.log.lock().unwrap().clone()
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands().into_iter().map(|c| c[0].clone()).collect()
    }

    /// 服务端接受过的 TCP 连接数
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// 断开所有现存连接
    pub fn kill_sessions(&self) {
        for handle in self.sessions.lock().unwrap().drain(..) {
            handle.abort();
        }
    }

    pub fn pool_config(&self, password: &str) -> PoolConfig {
        PoolConfig {
            wait_timeout: Duration::from_millis(200),
            ..PoolConfig::new(self.addr.clone(), password)
        }
    }

    pub fn pool(&self) -> KvPool {
        new_pool(self.pool_config("")).expect("pool")
    }
}

async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> Option<String> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await.ok()?;
    if n == 0 {
        return None;
    }
    Some(line.trim_end_matches("\r\n").to_string())
}

async fn read_command(reader: &mut BufReader<OwnedReadHalf>) -> Option<Vec<String>> {
    let header = read_line(reader).await?;
    let count: usize = header.strip_prefix('*')?.parse().ok()?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let len: usize = read_line(reader).await?.strip_prefix('$')?.parse().ok()?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data).await.ok()?;
        data.truncate(len);
        args.push(String::from_utf8(data).ok()?);
    }
    if args.is_empty() { None } else { Some(args) }
}

fn simple(msg: &str) -> Vec<u8> {
    format!("+{}\r\n", msg).into_bytes()
}

fn error(msg: &str) -> Vec<u8> {
    format!("-{}\r\n", msg).into_bytes()
}

fn integer(n: i64) -> Vec<u8> {
    format!(":{}\r\n", n).into_bytes()
}

fn bulk(data: &str) -> Vec<u8> {
    format!("${}\r\n{}\r\n", data.len(), data).into_bytes()
}

fn null() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

fn array(items: &[&String]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        out.extend(bulk(item));
    }
    out
}

fn execute(
    name: &str,
    args: &[String],
    store: &Mutex<Store>,
    password: Option<&str>,
    authed: &mut bool,
) -> Vec<u8> {
    match name {
        "CLIENT" => return simple("OK"),
        "AUTH" => {
            return match password {
                None => error("ERR AUTH <password> called without any password configured for the default user."),
                Some(p) if args.first().map(String::as_str) == Some(p) => {
                    *authed = true;
                    simple("OK")
                }
                Some(_) => {
                    error("WRONGPASS invalid username-password pair or user is disabled.")
                }
            };
        }
        _ if !*authed => return error("NOAUTH Authentication required."),
        _ => {}
    }

    let mut store = store.lock().unwrap();
    match (name, args) {
        ("PING", _) => simple("PONG"),
        ("SET", [key, value]) => {
            store.hashes.remove(key);
            store.strings.insert(key.clone(), value.clone());
            simple("OK")
        }
        ("GET", [key]) => match store.strings.get(key) {
            Some(value) => bulk(value),
            None if store.hashes.contains_key(key) => {
                error("WRONGTYPE Operation against a key holding the wrong kind of value")
            }
            None => null(),
        },
        ("INCR", [key]) => {
            let current = store.strings.get(key).cloned().unwrap_or_else(|| "0".to_string());
            match current.parse::<i64>() {
                Ok(n) => {
                    store.strings.insert(key.clone(), (n + 1).to_string());
                    integer(n + 1)
                }
                Err(_) => error("ERR value is not an integer or out of range"),
            }
        }
        ("EXISTS", keys) if !keys.is_empty() => {
            let n = keys
                .iter()
                .filter(|k| store.strings.contains_key(*k) || store.hashes.contains_key(*k))
                .count();
            integer(n as i64)
        }
        ("DEL", keys) if !keys.is_empty() => {
            let mut n = 0;
            for key in keys {
                if store.strings.remove(key).is_some() || store.hashes.remove(key).is_some() {
                    n += 1;
                }
            }
            integer(n)
        }
        ("HMSET", [key, pairs @ ..]) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
            let hash = store.hashes.entry(key.clone()).or_default();
            for pair in pairs.chunks(2) {
                hash.insert(pair[0].clone(), pair[1].clone());
            }
            simple("OK")
        }
        ("HGETALL", [key]) => match store.hashes.get(key) {
            Some(hash) => {
                let items: Vec<&String> = hash.iter().flat_map(|(f, v)| [f, v]).collect();
                array(&items)
            }
            None => array(&[]),
        },
        _ => error(&format!("ERR unknown command or wrong arguments for '{}'", name)),
    }
}
