//! gpsd client.
//!
//! Speaks the gpsd JSON protocol over TCP: enables watch mode, then turns
//! `TPV` reports into fixes and `DEVICE` reports into provider events.
//! Reconnects with backoff whenever the daemon goes away.

use std::time::Duration;

use async_trait::async_trait;
use domain::models::LocationSample;
use domain::services::{PositionEvent, PositioningError, PositioningSource, UpdatePolicy};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const NAME: &str = "gpsd";
const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// Fix modes below this carry no position.
const MODE_2D: u8 = 2;

#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
enum Report {
    #[serde(rename = "TPV")]
    Tpv {
        #[serde(default)]
        mode: u8,
        lat: Option<f64>,
        lon: Option<f64>,
        /// Horizontal position error, meters (gpsd 3.20+).
        eph: Option<f64>,
        epx: Option<f64>,
        epy: Option<f64>,
    },
    #[serde(rename = "DEVICE")]
    Device {
        path: Option<String>,
        /// A timestamp while the device is open, `0` once it is closed.
        activated: Option<serde_json::Value>,
    },
    #[serde(other)]
    Other,
}

/// Decodes one line of gpsd output. Returns `None` for anything that is not
/// a usable fix or a device state change.
pub fn decode_report(line: &str) -> Option<PositionEvent> {
    let report: Report = serde_json::from_str(line).ok()?;
    match report {
        Report::Tpv {
            mode,
            lat: Some(lat),
            lon: Some(lon),
            eph,
            epx,
            epy,
        } if mode >= MODE_2D => {
            let accuracy = eph.or_else(|| match (epx, epy) {
                (Some(x), Some(y)) => Some(x.max(y)),
                (x, y) => x.or(y),
            });
            Some(PositionEvent::Fix(LocationSample::from_provider(
                NAME,
                lat,
                lon,
                accuracy.map(|a| a as f32),
            )))
        }
        Report::Tpv { .. } => None,
        Report::Device { path, activated } => {
            let active = matches!(activated, Some(serde_json::Value::String(_)));
            let provider = path.map_or_else(|| NAME.to_string(), |p| format!("{} {}", NAME, p));
            Some(if active {
                PositionEvent::ProviderEnabled(provider)
            } else {
                PositionEvent::ProviderDisabled(provider)
            })
        }
        Report::Other => None,
    }
}

/// Delay before the first reconnect attempt; doubled after each failure.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

type ReportLines = Lines<BufReader<TcpStream>>;

/// Positioning source backed by a gpsd daemon.
///
/// The subscription outlives the daemon: a lost or refused connection is
/// reported as `ProviderDisabled` and retried with exponential backoff until
/// the receiver is dropped. A restored connection is reported as
/// `ProviderEnabled`.
#[derive(Debug, Clone)]
pub struct GpsdSource {
    addr: String,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl GpsdSource {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }
}

#[async_trait]
impl PositioningSource for GpsdSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn subscribe(
        &self,
        policy: UpdatePolicy,
    ) -> Result<mpsc::Receiver<PositionEvent>, PositioningError> {
        let (tx, rx) = mpsc::channel(16);

        let session = match connect(&self.addr).await {
            Ok(lines) => {
                debug!(addr = %self.addr, "Connected to gpsd");
                Some(lines)
            }
            Err(e) => {
                warn!(addr = %self.addr, error = %e, "gpsd unavailable, retrying in background");
                // Fresh channel, cannot be full.
                let _ = tx.try_send(PositionEvent::ProviderDisabled(NAME.to_string()));
                None
            }
        };

        let link = Link {
            addr: self.addr.clone(),
            policy,
            initial_backoff: self.initial_backoff,
            max_backoff: self.max_backoff,
            tx,
        };
        tokio::spawn(link.run(session));

        Ok(rx)
    }
}

async fn connect(addr: &str) -> std::io::Result<ReportLines> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(WATCH_COMMAND).await?;
    Ok(BufReader::new(stream).lines())
}

/// How a connected session ended.
enum SessionEnd {
    /// gpsd closed the connection or it failed.
    Lost,
    /// Nobody is listening anymore.
    Unsubscribed,
}

/// Background side of one subscription.
struct Link {
    addr: String,
    policy: UpdatePolicy,
    initial_backoff: Duration,
    max_backoff: Duration,
    tx: mpsc::Sender<PositionEvent>,
}

impl Link {
    async fn run(self, mut session: Option<ReportLines>) {
        let mut last_fix: Option<LocationSample> = None;
        let mut delay = self.initial_backoff;

        loop {
            let lines = match session.take() {
                Some(lines) => lines,
                None => {
                    let attempt = tokio::select! {
                        _ = self.tx.closed() => return,
                        attempt = async {
                            tokio::time::sleep(delay).await;
                            connect(&self.addr).await
                        } => attempt,
                    };
                    match attempt {
                        Ok(lines) => {
                            info!(addr = %self.addr, "Reconnected to gpsd");
                            delay = self.initial_backoff;
                            if self
                                .tx
                                .send(PositionEvent::ProviderEnabled(NAME.to_string()))
                                .await
                                .is_err()
                            {
                                return;
                            }
                            lines
                        }
                        Err(e) => {
                            debug!(addr = %self.addr, error = %e, retry_in = ?delay, "gpsd still unavailable");
                            delay = (delay * 2).min(self.max_backoff);
                            continue;
                        }
                    }
                }
            };

            match self.stream(lines, &mut last_fix).await {
                SessionEnd::Unsubscribed => return,
                SessionEnd::Lost => {
                    if self
                        .tx
                        .send(PositionEvent::ProviderDisabled(NAME.to_string()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
        }
    }

    async fn stream(&self, mut lines: ReportLines, last_fix: &mut Option<LocationSample>) -> SessionEnd {
        loop {
            let line = tokio::select! {
                _ = self.tx.closed() => return SessionEnd::Unsubscribed,
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    warn!(addr = %self.addr, "gpsd closed the connection");
                    return SessionEnd::Lost;
                }
                Err(e) => {
                    warn!(addr = %self.addr, error = %e, "Failed to read from gpsd");
                    return SessionEnd::Lost;
                }
            };

            let Some(event) = decode_report(&line) else {
                continue;
            };
            if let PositionEvent::Fix(sample) = &event {
                if !self.policy.admits(last_fix.as_ref(), sample) {
                    continue;
                }
                *last_fix = Some(sample.clone());
            }
            if self.tx.send(event).await.is_err() {
                return SessionEnd::Unsubscribed;
            }
        }
    }
}
