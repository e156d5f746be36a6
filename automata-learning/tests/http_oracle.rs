//! Runs the HTTP oracle against a minimal maze server that lives in a background thread.

use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    thread::JoinHandle,
    time::Duration,
};

use automata_core::prelude::*;
use automata_learning::active::{
    BoundedOracle, EquivalenceRequest, HttpOracle, HttpOracleConfig, LStar, LearningError,
    MazeParameters, ObservationTable, Oracle, OracleError,
};

#[derive(Debug, Clone)]
struct Request {
    path: String,
    content_type: Option<String>,
    body: String,
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let header = |wanted: &str| {
        head.lines().skip(1).find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case(wanted)
                .then(|| value.trim().to_string())
        })
    };
    let length: usize = header("content-length")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);

    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let path = head.split_whitespace().nth(1)?.to_string();
    Some(Request {
        path,
        content_type: header("content-type"),
        body: String::from_utf8_lossy(&buf[header_end..header_end + length]).to_string(),
    })
}

fn respond(stream: &mut TcpStream, status: u16, body: &str) {
    let reason = if status == 200 { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).unwrap();
    stream.flush().unwrap();
}

/// What the server sends back. After a reply with `last` set, the server shuts down.
struct Reply {
    status: u16,
    body: String,
    last: bool,
}

impl Reply {
    fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            last: false,
        }
    }

    fn last(mut self) -> Self {
        self.last = true;
        self
    }
}

/// Spawns a server that answers each request with `handler` until a reply is marked as the
/// last one. Gives back the base URL and a handle yielding all received requests.
fn spawn_server<H>(mut handler: H) -> (String, JoinHandle<Vec<Request>>)
where
    H: FnMut(&Request) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let mut received = vec![];
        for stream in listener.incoming() {
            let mut stream = stream.unwrap();
            let Some(request) = read_request(&mut stream) else {
                continue;
            };
            let reply = handler(&request);
            respond(&mut stream, reply.status, &reply.body);
            received.push(request);
            if reply.last {
                break;
            }
        }
        received
    });

    (url, handle)
}

fn oracle_for(url: String) -> HttpOracle {
    HttpOracle::new(HttpOracleConfig {
        base_url: url,
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[test_log::test]
fn membership_posts_plain_word() {
    let (url, server) = spawn_server(|request| match request.body.as_str() {
        "NS" => Reply::ok("0"),
        _ => Reply::ok("1\n").last(),
    });
    let oracle = oracle_for(url);

    assert_eq!(oracle.membership(&Word::from("NS")), Ok(false));
    assert_eq!(oracle.membership(&Word::from("NSE")), Ok(true));

    let received = server.join().unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].path, "/check_membership");
    assert_eq!(received[0].body, "NS");
    assert_eq!(
        received[1].content_type.as_deref(),
        Some("application/json")
    );
    assert_eq!(received[1].body, "NSE");
}

#[test_log::test]
fn error_status_means_unavailable() {
    let (url, server) = spawn_server(|_| {
        Reply {
            status: 500,
            body: "internal error".to_string(),
            last: false,
        }
        .last()
    });
    let oracle = oracle_for(url);

    assert!(matches!(
        oracle.membership(&Word::from("a")),
        Err(OracleError::Unavailable(_))
    ));
    server.join().unwrap();
}

#[test_log::test]
fn error_status_on_table_check_means_unavailable() {
    let (url, server) = spawn_server(|_| {
        Reply {
            status: 500,
            body: "true".to_string(),
            last: false,
        }
        .last()
    });
    let oracle = oracle_for(url);
    let local = BoundedOracle::new(alphabet!(simple 'N', 'S'), 2, |w: &Word| w.is_empty());
    let table = ObservationTable::new(local.alphabet().clone(), &local).unwrap();

    assert!(matches!(
        oracle.equivalence(&table),
        Err(OracleError::Unavailable(_))
    ));
    let received = server.join().unwrap();
    assert_eq!(received[0].path, "/check_table");
}

#[test_log::test]
fn error_status_on_maze_generation_means_unavailable() {
    let (url, server) = spawn_server(|_| {
        Reply {
            status: 503,
            body: "busy".to_string(),
            last: false,
        }
        .last()
    });
    let oracle = oracle_for(url);

    assert!(matches!(
        oracle.generate_maze(&MazeParameters::default()),
        Err(OracleError::Unavailable(_))
    ));
    let received = server.join().unwrap();
    assert_eq!(received[0].path, "/generate_graph");
}

#[test_log::test]
fn garbage_body_is_malformed() {
    let (url, server) = spawn_server(|_| Reply::ok("").last());
    let oracle = oracle_for(url);

    assert!(matches!(
        oracle.membership(&Word::from("a")),
        Err(OracleError::MalformedResponse(_))
    ));
    server.join().unwrap();
}

#[test_log::test]
fn unreachable_server_means_unavailable() {
    let url = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let oracle = oracle_for(url);
    assert!(matches!(
        oracle.membership(&Word::from("a")),
        Err(OracleError::Unavailable(_))
    ));
}

#[test_log::test]
fn generates_maze_and_learns() {
    let target = |word: &str| word.ends_with("NS");
    let mut counterexamples = vec!["NS"].into_iter();
    let (url, server) = spawn_server(move |request| match request.path.as_str() {
        "/generate_graph" => Reply::ok("ok"),
        "/check_membership" => Reply::ok(if target(&request.body) { "1" } else { "0" }),
        "/check_table" => match counterexamples.next() {
            Some(word) => Reply::ok(word),
            None => Reply::ok("true").last(),
        },
        _ => Reply {
            status: 404,
            body: String::new(),
            last: false,
        },
    });

    let oracle = oracle_for(url);
    oracle.generate_maze(&MazeParameters::default()).unwrap();

    let alphabet: CharAlphabet = "NS".parse().unwrap();
    let mut learner = LStar::new(alphabet, &oracle);
    let learned = learner.infer().unwrap();
    assert_eq!(learned.size(), 3);
    assert_eq!(learned.rounds, 2);

    let received = server.join().unwrap();
    assert_eq!(received[0].path, "/generate_graph");
    let maze: serde_json::Value = serde_json::from_str(&received[0].body).unwrap();
    assert_eq!(maze["pr_of_break_wall"], 3);

    let tables = received
        .iter()
        .filter(|request| request.path == "/check_table")
        .map(|request| serde_json::from_str::<EquivalenceRequest>(&request.body).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].main_prefixes, "e");
    assert_eq!(tables[0].complementary_prefixes, "N S");
    assert_eq!(tables[0].table, "000");
    assert_eq!(tables[1], EquivalenceRequest::from(&learned.table));
    assert_eq!(tables[1].main_prefixes, "e N NS");
    assert_eq!(tables[1].suffixes, "e S NS");
}

#[test_log::test]
fn malformed_membership_aborts_learning() {
    let (url, server) = spawn_server(|_| Reply::ok("maybe").last());
    let oracle = oracle_for(url);
    let mut learner = LStar::new("NS".parse().unwrap(), &oracle);

    assert!(matches!(
        learner.infer(),
        Err(LearningError::Oracle(OracleError::MalformedResponse(_)))
    ));
    assert!(learner.partial_table().is_none());
    server.join().unwrap();
}
