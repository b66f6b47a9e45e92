use crate::constants::{RECONNECT_BASE_MS, RECONNECT_MAX_ATTEMPTS, RECONNECT_MAX_MS};
use crate::error::{Error, Result};
use crate::net::{encode, GameFrame};
use crate::sync::Channel;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

// WebSocket plumbing for the relay. A connection is a background task pumping text frames
// between the socket and two unbounded queues, with a periodic JSON keep-alive.

type RelayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub fn parse_relay_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(Error::Validation(format!(
            "relay url must use ws or wss, got {}",
            other
        ))),
    }
}

pub struct RelayConnection {
    url: Url,
    outgoing: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<String>,
    task: JoinHandle<()>,
}

impl RelayConnection {
    pub async fn connect(raw_url: &str, heartbeat: Duration) -> Result<Self> {
        let url = parse_relay_url(raw_url)?;
        let (stream, _) = connect_async(url.as_str()).await?;
        info!("connected to {}", url);
        let ping = encode(&GameFrame::ping())?;
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming) = mpsc::unbounded_channel();
        let task = tokio::spawn(pump(stream, outgoing_rx, incoming_tx, heartbeat, ping));
        Ok(Self {
            url,
            outgoing,
            incoming,
            task,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Next text frame, or `None` once the socket has closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.incoming.recv().await
    }

    pub fn close(self) {
        debug!("closing {}", self.url);
        self.task.abort();
    }
}

impl Channel for RelayConnection {
    fn send_text(&mut self, text: String) -> Result<()> {
        self.outgoing.send(text).map_err(|_| Error::ChannelClosed)
    }
}

async fn pump(
    stream: RelayStream,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    incoming: mpsc::UnboundedSender<String>,
    heartbeat: Duration,
    ping: String,
) {
    let (mut write, mut read) = stream.split();
    let mut beat = interval_at(Instant::now() + heartbeat, heartbeat);
    loop {
        tokio::select! {
            frame = outgoing.recv() => match frame {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        warn!("relay send failed: {}", e);
                        break;
                    }
                }
                None => {
                    let _ = write.close().await;
                    break;
                }
            },
            _ = beat.tick() => {
                if let Err(e) = write.send(Message::Text(ping.clone().into())).await {
                    warn!("relay heartbeat failed: {}", e);
                    break;
                }
            }
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if incoming.send(text.as_str().to_owned()).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("relay receive failed: {}", e);
                    break;
                }
            },
        }
    }
    debug!("relay pump stopped");
}

/// Exponential backoff: `base * 2^(attempt - 1)`, capped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(RECONNECT_BASE_MS),
            max: Duration::from_millis(RECONNECT_MAX_MS),
            max_attempts: RECONNECT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.max)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Connecting { attempt: u32 },
    Connected,
    Failed,
}

/// Tracks reconnect attempts for a long-lived channel such as the lobby board.
#[derive(Debug)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    status: ConnectionStatus,
    attempts: u32,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            status: ConnectionStatus::Idle,
            attempts: 0,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Runs `connect` until it succeeds or the policy gives up. Each call starts a fresh
    /// attempt count, so calling it again after `Failed` is the manual retry.
    pub async fn run<F, Fut, T>(&mut self, mut connect: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.attempts = 0;
        loop {
            self.attempts += 1;
            self.status = ConnectionStatus::Connecting {
                attempt: self.attempts,
            };
            match connect().await {
                Ok(value) => {
                    self.status = ConnectionStatus::Connected;
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && self.attempts < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(self.attempts);
                    warn!(
                        "connect failed ({}), attempt {}/{}, retrying in {:?}",
                        e, self.attempts, self.policy.max_attempts, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    self.status = ConnectionStatus::Failed;
                    warn!("giving up after {} attempts: {}", self.attempts, e);
                    return Err(if e.is_retryable() {
                        Error::ConnectionFailed {
                            attempts: self.attempts,
                        }
                    } else {
                        e
                    });
                }
            }
        }
    }

    /// Runs the backoff loop on its own task so the caller's event loop keeps turning. The
    /// connection, or the final error, arrives on the returned receiver.
    pub fn spawn<F, Fut, T>(mut self, connect: F) -> oneshot::Receiver<Result<T>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done, receiver) = oneshot::channel();
        tokio::spawn(async move {
            let result = self.run(connect).await;
            if done.send(result).is_err() {
                debug!("reconnect finished after its caller left");
            }
        });
        receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick_policy() -> ReconnectPolicy {
        ReconnectPolicy {
            base: Duration::from_millis(1),
            max: Duration::from_millis(4),
            max_attempts: 5,
        }
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=7)
            .map(|n| policy.delay_for(n).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[tokio::test]
    async fn reconnects_after_transient_failures() {
        let mut reconnector = Reconnector::new(quick_policy());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = reconnector
            .run(|| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::ChannelClosed)
                    } else {
                        Ok("socket")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "socket");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(reconnector.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts_then_manual_retry_resets() {
        let mut reconnector = Reconnector::new(quick_policy());
        let result: Result<()> = reconnector.run(|| async { Err(Error::ChannelClosed) }).await;
        assert!(matches!(result, Err(Error::ConnectionFailed { attempts: 5 })));
        assert_eq!(reconnector.status(), ConnectionStatus::Failed);

        let result = reconnector.run(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(reconnector.attempts(), 1);
    }

    #[tokio::test]
    async fn background_reconnect_leaves_the_caller_free() {
        let policy = ReconnectPolicy {
            base: Duration::from_millis(20),
            max: Duration::from_millis(20),
            max_attempts: 3,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut pending = Reconnector::new(policy).spawn(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::ChannelClosed)
                } else {
                    Ok("board")
                }
            }
        });

        let mut turns = 0;
        let connected = loop {
            tokio::select! {
                result = &mut pending => break result.unwrap(),
                _ = sleep(Duration::from_millis(1)) => turns += 1,
            }
        };
        assert_eq!(connected.unwrap(), "board");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(turns > 5);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let mut reconnector = Reconnector::new(quick_policy());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<()> = reconnector
            .run(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Validation("bad url".into()))
                }
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connect_rejects_bad_urls() {
        let heartbeat = Duration::from_secs(25);
        assert!(matches!(
            RelayConnection::connect("not a url", heartbeat).await,
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            RelayConnection::connect("https://example.com/x", heartbeat).await,
            Err(Error::Validation(_))
        ));
    }
}
