//! HTTP client for a remote player endpoint.
//!
//! Commands are POSTed as JSON to `{base}/command`; pushed events are read as
//! newline-delimited JSON from `{base}/events`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::bytes::Bytes;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use media_session_types::{CommandOutcome, PlayerCommand, PlayerEvent};

use crate::transport::{PlayerTransport, TransportError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const EVENT_CHANNEL_CAPACITY: usize = 256;
/// Longest accepted event line; anything longer drops the connection.
const MAX_EVENT_LINE: usize = 64 * 1024;

/// HTTP transport for a remote player.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a client for `base_url` with a per-command `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        // No client-wide timeout: it would also cut the long-lived event stream.
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| TransportError::Offline(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start reading the remote event stream into a channel.
    ///
    /// Reconnects after a short delay when the stream drops; stops once the
    /// receiver is closed.
    pub fn spawn_event_stream(&self) -> (mpsc::Receiver<PlayerEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let transport = self.clone();
        let handle = tokio::spawn(async move {
            while !tx.is_closed() {
                match transport.read_events(&tx).await {
                    Ok(()) => tracing::info!("player event stream ended; reconnecting"),
                    Err(err) => tracing::warn!(error = %err, "player event stream failed"),
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        });
        (rx, handle)
    }

    async fn read_events(&self, tx: &mpsc::Sender<PlayerEvent>) -> Result<(), TransportError> {
        let resp = self
            .client
            .get(self.url("events"))
            .send()
            .await
            .map_err(map_request_error)?;
        let resp = check_status(resp).await?;
        tracing::info!(url = %self.base_url, "player event stream connected");

        let chunks = resp.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
        let mut lines = std::pin::pin!(event_lines(chunks, MAX_EVENT_LINE));
        while let Some(line) = lines.next().await {
            let line = line.map_err(map_line_error)?;
            let Some(event) = parse_event_line(&line) else {
                continue;
            };
            if tx.send(event).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PlayerTransport for HttpTransport {
    async fn send(&self, command: PlayerCommand) -> Result<CommandOutcome, TransportError> {
        let resp = self
            .client
            .post(self.url("command"))
            .timeout(self.timeout)
            .json(&command)
            .send()
            .await
            .map_err(map_request_error)?;
        let resp = check_status(resp).await?;
        resp.json::<CommandOutcome>()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))
    }
}

fn map_request_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Offline(err.to_string())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Frame a body stream into UTF-8 lines of at most `max_length` bytes.
fn event_lines<S>(chunks: S, max_length: usize) -> FramedRead<StreamReader<S, Bytes>, LinesCodec>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    FramedRead::new(
        StreamReader::new(chunks),
        LinesCodec::new_with_max_length(max_length),
    )
}

fn map_line_error(err: LinesCodecError) -> TransportError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            TransportError::Decode(format!("event line longer than {MAX_EVENT_LINE} bytes"))
        }
        LinesCodecError::Io(err) if err.kind() == std::io::ErrorKind::InvalidData => {
            TransportError::Decode(err.to_string())
        }
        LinesCodecError::Io(err) => TransportError::Offline(err.to_string()),
    }
}

/// Parse one NDJSON line; blank and malformed lines yield `None`.
fn parse_event_line(line: &str) -> Option<PlayerEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<PlayerEvent>(line) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::warn!(error = %err, "skipping malformed player event");
            None
        }
    }
}
