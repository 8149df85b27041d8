pub mod builders;
pub mod fake_launcher;

use std::sync::Once;
use std::time::Duration;

use durabletask::Controller;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Poll `exit_status` every 20ms, draining the log into `log` as we go,
/// until a result appears. Panics after `timeout`.
pub async fn poll_until_done(controller: &mut Controller, log: &mut Vec<u8>, timeout: Duration) -> i32 {
    let poll = async {
        loop {
            let status = controller.exit_status().expect("reading result file");
            controller.write_log(log).expect("draining log");
            if let Some(code) = status {
                return code;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .expect("task did not finish in time")
}

/// Drop a single trailing `\n` or `\r\n`.
pub fn trim_line_terminator(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}
