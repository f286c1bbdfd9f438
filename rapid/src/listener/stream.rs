//! WebSocket connection and read loop.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::error::StreamError;
use super::event::ProgressEvent;
use crate::background::{BackgroundTask, BoxFuture, Readiness, TaskCloser, TaskContext, TaskError};
use crate::cancellation::{CancelReason, Coordinator};
use crate::config::{ConfigError, DEFAULT_KEEPALIVE_INTERVAL};
use crate::job::JobStore;
use crate::progress::ProgressMultiplexer;

/// Name the listener registers under.
pub const LISTENER_TASK_NAME: &str = "stream-listener";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// State shared between the read loop and its closer.
struct Shared {
    /// Write half, present while connected.
    sink: Mutex<Option<WsSink>>,
    /// Fired by the closer to stop the read loop.
    closing: CancellationToken,
}

/// How the read loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenEnd {
    /// The server reported completion.
    Completed,
    /// Cancellation or close was requested locally.
    Stopped,
}

/// Background task that consumes the progress stream.
pub struct StreamListener {
    endpoint: Result<String, ConfigError>,
    coordinator: Coordinator,
    store: JobStore,
    progress: Arc<ProgressMultiplexer>,
    ready: Readiness,
    connect_timeout: Duration,
    keepalive: Duration,
    close_timeout: Duration,
    shared: Arc<Shared>,
}

/// Factory suitable for [`TaskRegistry::register`](crate::background::TaskRegistry::register).
pub fn stream_listener_factory(ctx: &TaskContext) -> Box<dyn BackgroundTask> {
    Box::new(StreamListener::new(ctx))
}

impl StreamListener {
    pub fn new(ctx: &TaskContext) -> Self {
        let keepalive = if ctx.config.keepalive_interval.is_zero() {
            DEFAULT_KEEPALIVE_INTERVAL
        } else {
            ctx.config.keepalive_interval
        };

        Self {
            endpoint: ctx.config.stream_endpoint(),
            coordinator: ctx.coordinator.clone(),
            store: ctx.store.clone(),
            progress: Arc::clone(&ctx.progress),
            ready: ctx.stream_ready.clone(),
            connect_timeout: ctx.config.request_timeout,
            keepalive,
            close_timeout: ctx.config.close_timeout,
            shared: Arc::new(Shared {
                sink: Mutex::new(None),
                closing: CancellationToken::new(),
            }),
        }
    }

    async fn run_inner(mut self) {
        let endpoint = std::mem::replace(&mut self.endpoint, Ok(String::new()));
        let result = match endpoint {
            Ok(url) => self.listen(url).await,
            Err(e) => Err(StreamError::Endpoint(e)),
        };

        match result {
            Ok(ListenEnd::Completed) => info!("Server reported job complete"),
            Ok(ListenEnd::Stopped) => debug!("Stream listener stopped"),
            Err(e) if self.coordinator.is_cancelled() || self.shared.closing.is_cancelled() => {
                debug!(error = %e, "Stream ended during teardown");
            }
            Err(e) => {
                error!(error = %e, "Progress stream failed");
                self.coordinator.trigger(CancelReason::TransportError);
            }
        }
    }

    async fn listen(&self, endpoint: String) -> Result<ListenEnd, StreamError> {
        debug!(url = %endpoint, "Connecting to progress stream");
        let ws = tokio::select! {
            biased;
            _ = self.coordinator.cancelled() => return Ok(ListenEnd::Stopped),
            _ = self.shared.closing.cancelled() => return Ok(ListenEnd::Stopped),
            result = tokio::time::timeout(self.connect_timeout, connect_async(endpoint.as_str())) => match result {
                Ok(Ok((ws, _response))) => ws,
                Ok(Err(source)) => return Err(StreamError::Connect { url: endpoint, source }),
                Err(_) => {
                    return Err(StreamError::ConnectTimeout {
                        url: endpoint,
                        timeout_secs: self.connect_timeout.as_secs(),
                    })
                }
            },
        };
        info!(url = %endpoint, "Connected to progress stream");

        let (sink, mut stream) = ws.split();
        if !self.adopt_sink(sink).await {
            return Ok(ListenEnd::Stopped);
        }
        self.ready.mark_ready();

        // Events are filtered against the job active when the stream opened.
        let job_id = self.store.active_id();
        let mut keepalive = interval_at(Instant::now() + self.keepalive, self.keepalive);

        loop {
            tokio::select! {
                biased;
                _ = self.coordinator.cancelled() => return Ok(ListenEnd::Stopped),
                _ = self.shared.closing.cancelled() => return Ok(ListenEnd::Stopped),
                _ = keepalive.tick() => self.ping().await?,
                frame = stream.next() => {
                    let message = match frame {
                        None => return Err(StreamError::ClosedBeforeDone),
                        Some(Err(e)) => return Err(StreamError::Read(e)),
                        Some(Ok(message)) => message,
                    };
                    if self.handle_message(message, job_id.as_deref())? {
                        return Ok(ListenEnd::Completed);
                    }
                }
            }
        }
    }

    /// Process one frame. Returns `true` once the job has completed.
    fn handle_message(&self, message: Message, job_id: Option<&str>) -> Result<bool, StreamError> {
        let payload = match message {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(bytes) => bytes,
            Message::Close(frame) => {
                debug!(frame = ?frame, "Server closed the stream");
                return Err(StreamError::ClosedBeforeDone);
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return Ok(false),
        };

        let event = ProgressEvent::decode(&payload)?;

        if let Some(active) = job_id {
            if !event.belongs_to(active) {
                trace!(event_job = %event.job_id, active_job = %active, "Ignoring event for another job");
                return Ok(false);
            }
        }

        if event.done {
            // Clear before triggering so nothing that wakes on completion
            // sees a finished job as active.
            self.store.clear();
            self.coordinator.trigger(CancelReason::RemoteDone);
            return Ok(true);
        }

        if self.coordinator.is_cancelled() {
            return Ok(false);
        }

        trace!(
            chunk = event.chunk_index,
            downloaded = event.downloaded,
            size = event.chunk_size,
            progress = event.progress,
            "Progress event"
        );
        self.progress
            .update(event.chunk_index, event.downloaded, event.chunk_size);
        Ok(false)
    }

    /// Hand the write half to the closer, or close it here if the closer
    /// already ran. Returns `false` in the latter case.
    async fn adopt_sink(&self, mut sink: WsSink) -> bool {
        let mut slot = self.shared.sink.lock().await;
        // The closer fires `closing` before taking the lock, so checking
        // under the lock leaves exactly one side responsible for the sink.
        if self.shared.closing.is_cancelled() {
            drop(slot);
            debug!("Closer ran while connecting, closing new connection");
            let result = tokio::time::timeout(self.close_timeout, send_close(&mut sink)).await;
            if let Err(e) = close_result(result, self.close_timeout) {
                warn!(error = %e, "Failed to close late connection");
            }
            return false;
        }
        *slot = Some(sink);
        true
    }

    async fn ping(&self) -> Result<(), StreamError> {
        let mut guard = self.shared.sink.lock().await;
        if let Some(sink) = guard.as_mut() {
            trace!("Sending keepalive ping");
            sink.send(Message::Ping(Vec::new()))
                .await
                .map_err(StreamError::Keepalive)?;
        }
        Ok(())
    }
}

impl BackgroundTask for StreamListener {
    fn name(&self) -> &str {
        LISTENER_TASK_NAME
    }

    fn closer(&self) -> Option<Arc<dyn TaskCloser>> {
        Some(Arc::new(StreamCloser {
            shared: Arc::clone(&self.shared),
            timeout: self.close_timeout,
        }))
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin((*self).run_inner())
    }
}

/// Sends the close frame and releases the connection.
struct StreamCloser {
    shared: Arc<Shared>,
    timeout: Duration,
}

impl StreamCloser {
    async fn close_inner(&self) -> Result<(), TaskError> {
        self.shared.closing.cancel();

        let polite = async {
            let Some(mut sink) = self.shared.sink.lock().await.take() else {
                return Ok(());
            };
            send_close(&mut sink).await
        };

        close_result(tokio::time::timeout(self.timeout, polite).await, self.timeout)
    }
}

async fn send_close(sink: &mut WsSink) -> Result<(), tungstenite::Error> {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "client exiting".into(),
    };
    sink.send(Message::Close(Some(frame))).await
}

fn close_result(
    result: Result<Result<(), tungstenite::Error>, tokio::time::error::Elapsed>,
    timeout: Duration,
) -> Result<(), TaskError> {
    match result {
        Ok(Ok(())) => {
            debug!("Stream close frame sent");
            Ok(())
        }
        Ok(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {
            debug!("Stream already closed");
            Ok(())
        }
        Ok(Err(e)) => Err(TaskError::Close {
            task: LISTENER_TASK_NAME.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Stream close timed out");
            Err(TaskError::Timeout {
                task: LISTENER_TASK_NAME.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

impl TaskCloser for StreamCloser {
    fn close(&self) -> BoxFuture<'_, Result<(), TaskError>> {
        Box::pin(self.close_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::job::Job;
    use crate::progress::NullSink;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one WebSocket connection: send `frames`, then either close or
    /// hold the connection open until the client closes it. The receiver
    /// yields whether a close frame arrived from the client.
    async fn serve(frames: Vec<Message>, hold_open: bool) -> (String, oneshot::Receiver<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            for frame in frames {
                if ws.send(frame).await.is_err() {
                    let _ = tx.send(false);
                    return;
                }
            }
            if !hold_open {
                let _ = ws.close(None).await;
                let _ = tx.send(false);
                return;
            }
            let mut saw_close = false;
            while let Some(Ok(message)) = ws.next().await {
                if message.is_close() {
                    saw_close = true;
                    break;
                }
            }
            let _ = tx.send(saw_close);
        });

        (format!("ws://{}/ws/cli", addr), rx)
    }

    fn context(stream_url: &str) -> TaskContext {
        let store = JobStore::new();
        store.set(Job {
            id: "abc123".to_string(),
            ..Job::default()
        });
        TaskContext {
            coordinator: Coordinator::new(),
            store,
            progress: Arc::new(ProgressMultiplexer::new(Arc::new(NullSink))),
            config: ClientConfig::default()
                .with_stream_url(stream_url)
                .with_close_timeout(Duration::from_millis(500)),
            stream_ready: Readiness::new(),
        }
    }

    fn text(json: &str) -> Message {
        Message::Text(json.to_string())
    }

    async fn run_listener(ctx: &TaskContext) {
        let task = stream_listener_factory(ctx);
        tokio::time::timeout(Duration::from_secs(5), task.run())
            .await
            .expect("listener did not finish");
    }

    #[tokio::test]
    async fn test_events_then_done() {
        let (url, _rx) = serve(
            vec![
                text(r#"{"id":"abc123","index":0,"downloaded":250,"progress":50,"size":500,"done":false}"#),
                text(r#"{"id":"abc123","index":1,"downloaded":500,"progress":100,"size":500,"done":false}"#),
                text(r#"{"id":"abc123","index":0,"downloaded":500,"progress":100,"size":500,"done":false}"#),
                text(r#"{"id":"abc123","done":true}"#),
            ],
            true,
        )
        .await;
        let ctx = context(&url);

        run_listener(&ctx).await;

        assert_eq!(ctx.coordinator.reason(), Some(CancelReason::RemoteDone));
        assert!(ctx.store.is_empty());
        assert_eq!(ctx.progress.len(), 2);
        assert_eq!(ctx.progress.get(0).unwrap().current, 500);
        assert_eq!(ctx.progress.get(1).unwrap().current, 500);
    }

    #[tokio::test]
    async fn test_done_event_is_not_forwarded() {
        let (url, _rx) = serve(
            vec![
                text(r#"{"id":"abc123","index":3,"downloaded":10,"size":100,"done":true}"#),
                text(r#"{"id":"abc123","done":true}"#),
            ],
            true,
        )
        .await;
        let ctx = context(&url);

        run_listener(&ctx).await;

        assert_eq!(ctx.coordinator.reason(), Some(CancelReason::RemoteDone));
        assert!(ctx.progress.is_empty());
    }

    #[tokio::test]
    async fn test_events_for_other_jobs_are_ignored() {
        let (url, _rx) = serve(
            vec![
                text(r#"{"id":"zzz999","index":0,"downloaded":100,"size":100}"#),
                text(r#"{"id":"zzz999","done":true}"#),
                text(r#"{"id":"abc123","index":2,"downloaded":5,"size":100}"#),
                text(r#"{"id":"abc123","done":true}"#),
            ],
            true,
        )
        .await;
        let ctx = context(&url);

        run_listener(&ctx).await;

        assert_eq!(ctx.progress.len(), 1);
        assert!(ctx.progress.get(0).is_none());
        assert_eq!(ctx.progress.get(2).unwrap().current, 5);
    }

    #[tokio::test]
    async fn test_garbage_frame_triggers_transport_error() {
        let (url, _rx) = serve(vec![text("hello")], true).await;
        let ctx = context(&url);

        run_listener(&ctx).await;

        assert_eq!(ctx.coordinator.reason(), Some(CancelReason::TransportError));
        assert!(!ctx.store.is_empty());
    }

    #[tokio::test]
    async fn test_server_close_before_done_triggers_transport_error() {
        let (url, _rx) = serve(
            vec![text(r#"{"id":"abc123","index":0,"downloaded":1,"size":2}"#)],
            false,
        )
        .await;
        let ctx = context(&url);

        run_listener(&ctx).await;

        assert_eq!(ctx.coordinator.reason(), Some(CancelReason::TransportError));
        assert_eq!(ctx.progress.len(), 1);
    }

    #[tokio::test]
    async fn test_dial_failure_triggers_transport_error() {
        // Bind then drop to get a port with nothing listening.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let ctx = context(&format!("ws://{}/ws/cli", addr));

        run_listener(&ctx).await;

        assert_eq!(ctx.coordinator.reason(), Some(CancelReason::TransportError));
        assert!(!ctx.stream_ready.is_ready());
    }

    #[tokio::test]
    async fn test_stalled_handshake_triggers_transport_error() {
        // Accepts TCP but never answers the upgrade.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_tcp, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let mut ctx = context(&format!("ws://{}/ws/cli", addr));
        ctx.config.request_timeout = Duration::from_millis(300);

        run_listener(&ctx).await;
        server.abort();

        assert_eq!(ctx.coordinator.reason(), Some(CancelReason::TransportError));
        assert!(!ctx.stream_ready.is_ready());
    }

    #[tokio::test]
    async fn test_connected_stream_is_marked_ready() {
        let (url, rx) = serve(Vec::new(), true).await;
        let ctx = context(&url);
        let task = stream_listener_factory(&ctx);
        let closer = task.closer().unwrap();
        let join = tokio::spawn(task.run());

        tokio::time::timeout(Duration::from_secs(5), ctx.stream_ready.ready())
            .await
            .expect("stream never became ready");
        assert!(!ctx.coordinator.is_cancelled());

        ctx.coordinator.trigger(CancelReason::UserInterrupt);
        join.await.unwrap();
        closer.close().await.unwrap();
        assert!(rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_connection_finished_after_close_is_closed_too() {
        let (url, rx) = serve(Vec::new(), true).await;
        let ctx = context(&url);
        let listener = StreamListener::new(&ctx);
        let closer = listener.closer().unwrap();

        // Handshake completes, then the closer runs before the sink is stored.
        let (ws, _) = connect_async(url.as_str()).await.unwrap();
        let (sink, _stream) = ws.split();
        closer.close().await.unwrap();

        assert!(!listener.adopt_sink(sink).await);
        assert!(listener.shared.sink.lock().await.is_none());
        assert!(!ctx.stream_ready.is_ready());
        let saw_close = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .unwrap()
            .unwrap();
        assert!(saw_close, "server should see a close frame");
    }

    #[tokio::test]
    async fn test_external_cancel_and_close() {
        let (url, rx) = serve(
            vec![text(r#"{"id":"abc123","index":0,"downloaded":1,"size":2}"#)],
            true,
        )
        .await;
        let ctx = context(&url);
        let task = stream_listener_factory(&ctx);
        let closer = task.closer().unwrap();
        let join = tokio::spawn(task.run());

        // Wait for the first event to land before interrupting.
        for _ in 0..100 {
            if !ctx.progress.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(ctx.coordinator.trigger(CancelReason::UserInterrupt));

        tokio::time::timeout(Duration::from_secs(5), join)
            .await
            .unwrap()
            .unwrap();
        closer.close().await.unwrap();

        assert_eq!(ctx.coordinator.reason(), Some(CancelReason::UserInterrupt));
        assert!(rx.await.unwrap(), "server should see a close frame");
    }

    #[tokio::test]
    async fn test_close_before_connect_is_noop() {
        let ctx = context("ws://127.0.0.1:1/ws/cli");
        let task = stream_listener_factory(&ctx);
        let closer = task.closer().unwrap();

        closer.close().await.unwrap();
        // A closed listener stops without dialing.
        task.run().await;
        assert!(!ctx.coordinator.is_cancelled());
    }
}
