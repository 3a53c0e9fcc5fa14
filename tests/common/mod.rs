#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use reqwest::Client;
use server::clients::pgn_source::PgnSource;
use server::config::Config;
use tokio::net::TcpListener;

pub const OPEN_GAME: &str = "[Event \"Casual\"]\n[White \"A\"]\n[Black \"B\"]\n\n1. e4 e5 *\n";

pub const RUY_LOPEZ: &str = "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6 5. O-O Be7 *";

/// Answer to every `go`: a fixed score and no principal variation.
pub const GO_FIXED_CP: &str = r#"echo "info depth 1 score cp 20 nodes 1"; echo "bestmove 0000""#;

/// Answer to every `go`: a score plus a principal variation.
pub const GO_WITH_PV: &str =
    r#"echo "info depth 1 score cp 10 nodes 1 pv a2a3"; echo "info depth 2 score cp 35 nodes 9 pv g1f3 b8c6"; echo "bestmove g1f3""#;

/// Dies while answering the second `go`.
pub const GO_CRASH_SECOND: &str = r#"if [ "$n" -ge 2 ]; then exit 1; fi; echo "info depth 1 score cp 20 nodes 1"; echo "bestmove 0000""#;

/// Answers without ever reporting a score.
pub const GO_NO_SCORE: &str = r#"echo "bestmove e2e4""#;

/// Swallows every `go` without ever answering.
pub const GO_NEVER: &str = ":";

/// Always finds a mate in 2 for the side to move.
pub const GO_MATE: &str = r#"echo "info depth 5 score mate 2 nodes 100 pv d1h5"; echo "bestmove d1h5""#;

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}

/// Write an executable shell script that speaks just enough UCI.
///
/// `on_go` runs for every `go` command with `$n` holding the call count.
/// The script writes its pid to `<dir>/<name>.pid` on startup.
pub fn mock_engine(dir: &Path, name: &str, on_go: &str) -> PathBuf {
    let path = dir.join(name);
    let pid_file = pid_file(dir, name);
    let script = format!(
        r#"#!/bin/sh
echo $$ > "{pid}"
n=0
while read -r line; do
  case "$line" in
    uci) echo "id name MockFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*)
      n=$((n+1))
      {on_go}
      ;;
    quit) exit 0 ;;
  esac
done
"#,
        pid = pid_file.display(),
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Write an executable that records its pid and then reads stdin forever
/// without saying anything, so the UCI handshake never completes.
pub fn mute_engine(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let script = format!(
        "#!/bin/sh\necho $$ > \"{pid}\"\nwhile read -r line; do :; done\n",
        pid = pid_file(dir, name).display(),
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Poll until the process is gone, giving up after about two seconds.
pub async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..100 {
        if !process_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    !process_alive(pid)
}

pub fn pid_file(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.pid"))
}

/// Pid the mock engine recorded, if it was ever started.
pub fn engine_pid(dir: &Path, name: &str) -> Option<u32> {
    std::fs::read_to_string(pid_file(dir, name))
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// True while the process exists and is not a zombie.
pub fn process_alive(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // "pid (comm) state ..." where comm may itself contain spaces or parens
    let state = stat
        .rfind(')')
        .and_then(|i| stat[i + 1..].split_whitespace().next());
    !matches!(state, Some("Z") | Some("X") | None)
}

/// PGN host serving fixtures, counting every request it receives.
pub struct Upstream {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
}

impl Upstream {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn serve_fixture(State(hits): State<Arc<AtomicUsize>>, body: &'static str) -> String {
    hits.fetch_add(1, Ordering::SeqCst);
    body.to_string()
}

pub async fn spawn_upstream() -> Upstream {
    let hits = Arc::new(AtomicUsize::new(0));

    let app = Router::new()
        .route(
            "/games/open.pgn",
            get(|state: State<Arc<AtomicUsize>>| serve_fixture(state, OPEN_GAME)),
        )
        .route(
            "/games/ruy.pgn",
            get(|state: State<Arc<AtomicUsize>>| serve_fixture(state, RUY_LOPEZ)),
        )
        .route(
            "/games/empty.pgn",
            get(|state: State<Arc<AtomicUsize>>| serve_fixture(state, "")),
        )
        .route(
            "/games/illegal.pgn",
            get(|state: State<Arc<AtomicUsize>>| serve_fixture(state, "1. e4 e5 2. Ke3 *")),
        )
        .route(
            "/games/garbled.pgn",
            get(|state: State<Arc<AtomicUsize>>| serve_fixture(state, "1. e4 e5 2. Zz9 Nf3 *")),
        )
        .fallback(|State(hits): State<Arc<AtomicUsize>>| async move {
            hits.fetch_add(1, Ordering::SeqCst);
            (StatusCode::NOT_FOUND, "not found")
        })
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Upstream {
        base_url: format!("http://{addr}"),
        hits,
    }
}

/// Start the analyzer on an ephemeral port, returning its base URL.
pub async fn spawn_app(stockfish_path: &Path) -> String {
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        stockfish_path: stockfish_path.display().to_string(),
        analysis_time: Duration::from_millis(10),
        fetch_timeout: Duration::from_secs(5),
    };
    let source = PgnSource::new(config.fetch_timeout).unwrap();
    let app = server::build_router(config, source);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}
