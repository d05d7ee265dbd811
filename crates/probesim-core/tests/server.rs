//! End-to-end session tests over an in-memory duplex stream standing in for
//! the serial line.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use probesim_core::{CommandServer, PeriodicSampler, SampleStore, TransportError, TxHandle};

struct Session {
    /// Line-buffered view of everything the emulator writes
    responses: tokio::io::Lines<BufReader<ReadHalf<tokio::io::DuplexStream>>>,
    /// Peer side: what the host writes to the emulator
    requests: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    shutdown: CancellationToken,
    server: JoinHandle<Result<(), TransportError>>,
}

fn start_session(source: &str) -> Session {
    let store = Arc::new(SampleStore::from_reader(Cursor::new(source.to_string())).unwrap());
    let (host, device) = tokio::io::duplex(4096);
    let (device_rx, device_tx) = tokio::io::split(device);
    let (host_rx, host_tx) = tokio::io::split(host);

    let tx = TxHandle::new(device_tx);
    let sampler = PeriodicSampler::new(Arc::clone(&store), tx.clone());
    let shutdown = CancellationToken::new();
    let server = CommandServer::new(device_rx, tx, store, sampler, shutdown.clone());

    Session {
        responses: BufReader::new(host_rx).lines(),
        requests: host_tx,
        shutdown,
        server: tokio::spawn(server.run()),
    }
}

impl Session {
    async fn send(&mut self, line: &str) {
        self.requests.write_all(line.as_bytes()).await.unwrap();
        self.requests.write_all(b"\n").await.unwrap();
    }

    async fn recv(&mut self) -> String {
        self.responses.next_line().await.unwrap().expect("emulator closed the line")
    }

    /// Assert nothing arrives within the window (paused-clock friendly)
    async fn assert_silent(&mut self, window: Duration) {
        let next = tokio::time::timeout(window, self.responses.next_line()).await;
        assert!(next.is_err(), "unexpected data: {next:?}");
    }
}

#[tokio::test]
async fn get_sample_cycles_through_records() {
    let mut session = start_session("a,b\n1,2\n3,4\n");

    session.send("GET_SAMPLE").await;
    assert_eq!(session.recv().await, "12");
    session.send("GET_SAMPLE").await;
    assert_eq!(session.recv().await, "34");
    // Wraparound
    session.send("GET_SAMPLE").await;
    assert_eq!(session.recv().await, "12");

    session.shutdown.cancel();
    session.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn input_is_case_insensitive_and_trimmed() {
    let mut session = start_session("a,b\n1,2\n");

    session.send("get_sample").await;
    assert_eq!(session.recv().await, "12");
    session.send("  GET_SAMPLE \r").await;
    assert_eq!(session.recv().await, "Invalid Command"); // leading spaces are not trimmed
    session.send("Get_Sample\r").await;
    assert_eq!(session.recv().await, "12");

    session.shutdown.cancel();
    session.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_command_leaves_cursor_untouched() {
    let mut session = start_session("a,b\n1,2\n3,4\n");

    // Same malformed line always yields the same reply
    session.send("FOOBAR").await;
    assert_eq!(session.recv().await, "Invalid Command");
    session.send("FOOBAR").await;
    assert_eq!(session.recv().await, "Invalid Command");

    // Cursor still at the first record
    session.send("GET_SAMPLE").await;
    assert_eq!(session.recv().await, "12");

    session.shutdown.cancel();
    session.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn empty_lines_get_no_response() {
    let mut session = start_session("a,b\n1,2\n");

    session.send("").await;
    session.send("GET_SAMPLE").await;
    // First (and only) response is the sample
    assert_eq!(session.recv().await, "12");

    session.shutdown.cancel();
    session.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn period_confirmation_names_the_accepted_period() {
    let mut session = start_session("a,b\n1,2\n");

    session.send("PERIOD 2.5").await;
    let reply = session.recv().await;
    assert!(reply.contains("2.5"), "confirmation was: {reply}");

    session.send("period 0").await;
    assert_eq!(session.recv().await, "SET NEW PERIOD: 0 (seconds)");

    session.shutdown.cancel();
    session.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_period_is_invalid_and_changes_nothing() {
    let mut session = start_session("a,b\n1,2\n3,4\n");

    session.send("PERIOD abc").await;
    assert_eq!(session.recv().await, "Invalid Command");
    session.send("PERIOD -3").await;
    assert_eq!(session.recv().await, "Invalid Command");

    session.send("GET_SAMPLE").await;
    assert_eq!(session.recv().await, "12");

    session.shutdown.cancel();
    session.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn oversized_period_is_confirmed_but_arms_nothing() {
    let mut session = start_session("a,b\n1,2\n");

    // Finite, non-negative, but far beyond what any timer can hold: the
    // session must stay up rather than dying on the reconfiguration
    session.send("PERIOD 100000000000000000000").await;
    let reply = session.recv().await;
    assert!(reply.starts_with("SET NEW PERIOD:"), "reply was: {reply}");

    session.send("GET_SAMPLE").await;
    assert_eq!(session.recv().await, "12");

    session.shutdown.cancel();
    session.server.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn period_arms_pushes_and_zero_disables_them() {
    let mut session = start_session("a,b\n1,2\n3,4\n");

    session.send("PERIOD 1").await;
    assert_eq!(session.recv().await, "SET NEW PERIOD: 1 (seconds)");

    // Unsolicited pushes advance the shared cursor
    assert_eq!(session.recv().await, "12");
    assert_eq!(session.recv().await, "34");

    session.send("PERIOD 0").await;
    assert_eq!(session.recv().await, "SET NEW PERIOD: 0 (seconds)");

    // Well past the would-be period: nothing more arrives
    session.assert_silent(Duration::from_secs(3)).await;

    // The on-demand path continues from where the pushes left the cursor
    session.send("GET_SAMPLE").await;
    assert_eq!(session.recv().await, "12");

    session.shutdown.cancel();
    session.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn peer_disconnect_ends_the_session_cleanly() {
    let mut session = start_session("a,b\n1,2\n");

    session.send("GET_SAMPLE").await;
    assert_eq!(session.recv().await, "12");

    // Host drops its write half: the emulator sees EOF and stops
    session.requests.shutdown().await.unwrap();
    drop(session.requests);
    session.server.await.unwrap().unwrap();

    // The emulator closed its side of the line on the way out
    assert_eq!(session.responses.next_line().await.unwrap(), None);
}

#[tokio::test]
async fn cancellation_closes_the_transport() {
    let session = start_session("a,b\n1,2\n");

    session.shutdown.cancel();
    session.server.await.unwrap().unwrap();

    let mut responses = session.responses;
    assert_eq!(responses.next_line().await.unwrap(), None);
}
