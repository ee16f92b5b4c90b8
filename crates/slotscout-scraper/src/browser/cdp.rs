//! Minimal Chrome DevTools Protocol client over a WebSocket.
//!
//! One writer task owns the sink; one reader task routes command responses
//! to their waiting callers by id and fans events out to subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::ScraperError;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;
type Listeners = Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>>;

pub struct CdpClient {
    ws_tx: mpsc::Sender<String>,
    pending: Pending,
    next_id: AtomicU64,
    listeners: Listeners,
    command_timeout: Duration,
    reader: tokio::task::JoinHandle<()>,
    writer: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connects to a page-level DevTools WebSocket.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Session`] if the socket cannot be opened.
    pub async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self, ScraperError> {
        let (stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| ScraperError::Session {
                reason: format!("failed to connect to {ws_url}: {e}"),
            })?;
        let (mut sink, mut source) = stream.split();
        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(256);

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let listeners: Listeners = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(msg)).await {
                    tracing::warn!(error = %e, "CDP socket write failed");
                    break;
                }
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_listeners = Arc::clone(&listeners);
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        let Ok(value) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        if let Some(id) = value.get("id").and_then(Value::as_u64) {
                            if let Some(tx) = reader_pending.lock().await.remove(&id) {
                                let _ = tx.send(value);
                            }
                        } else if let Some(method) = value.get("method").and_then(Value::as_str) {
                            let listeners = reader_listeners.lock().await;
                            if let Some(senders) = listeners.get(method) {
                                let params = value.get("params").cloned().unwrap_or(Value::Null);
                                for tx in senders {
                                    let _ = tx.try_send(params.clone());
                                }
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::debug!("CDP socket closed by browser");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "CDP socket read failed");
                        break;
                    }
                    Ok(_) => {}
                }
            }
            // Dropping the senders wakes every caller still waiting.
            reader_pending.lock().await.clear();
        });

        Ok(Self {
            ws_tx,
            pending,
            next_id: AtomicU64::new(1),
            listeners,
            command_timeout,
            reader,
            writer,
        })
    }

    /// Sends a command and waits for its `result`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Protocol`] on a CDP error response, a closed
    /// socket, or no response within the command timeout.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value, ScraperError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let message = json!({ "id": id, "method": method, "params": params });
        if self.ws_tx.send(message.to_string()).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(protocol(method, "socket writer is gone"));
        }

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(response)) => match response.get("error") {
                Some(error) => Err(protocol(method, error.to_string())),
                None => Ok(response.get("result").cloned().unwrap_or(Value::Null)),
            },
            Ok(Err(_)) => Err(protocol(method, "connection closed before response")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(protocol(
                    method,
                    format!("no response after {}ms", self.command_timeout.as_millis()),
                ))
            }
        }
    }

    /// Subscribes to an event such as `Page.loadEventFired`.
    pub async fn subscribe(&self, method: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(16);
        self.listeners
            .lock()
            .await
            .entry(method.to_string())
            .or_default()
            .push(tx);
        rx
    }

    pub async fn enable_domain(&self, domain: &str) -> Result<(), ScraperError> {
        self.send_command(&format!("{domain}.enable"), json!({}))
            .await
            .map(|_| ())
    }

    /// Evaluates `expression` and returns its JSON value. A thrown exception
    /// is a protocol error.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, ScraperError> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script threw");
            return Err(protocol("Runtime.evaluate", text));
        }
        Ok(result
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub async fn dispatch_mouse_event(
        &self,
        event_type: &str,
        x: f64,
        y: f64,
    ) -> Result<(), ScraperError> {
        self.send_command(
            "Input.dispatchMouseEvent",
            json!({
                "type": event_type,
                "x": x,
                "y": y,
                "button": "left",
                "clickCount": 1,
            }),
        )
        .await
        .map(|_| ())
    }

    /// PNG bytes of the viewport.
    pub async fn screenshot(&self) -> Result<Vec<u8>, ScraperError> {
        let result = self
            .send_command("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| protocol("Page.captureScreenshot", "no data in response"))?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| protocol("Page.captureScreenshot", e.to_string()))
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn protocol(method: &str, reason: impl Into<String>) -> ScraperError {
    ScraperError::Protocol {
        method: method.to_string(),
        reason: reason.into(),
    }
}
