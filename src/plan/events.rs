// Server-Sent Events framing and the per-run emitter

use super::types::{BlockReason, Plan, PlanOutcome, StepRecord};
use crate::policy::CommandSafety;
use futures::Stream;
use serde_json::{Value, json};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const CHANNEL_CAPACITY: usize = 64;

/// One SSE frame: a named event with JSON data, or a comment line
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    Event { name: &'static str, data: Value },
    Comment(String),
}

impl SseFrame {
    fn event(name: &'static str, data: Value) -> Self {
        SseFrame::Event { name, data }
    }

    pub fn plan(plan: &Plan, safety: &[CommandSafety]) -> Self {
        Self::event("plan", json!({ "plan": plan, "safety": safety }))
    }

    pub fn policy(reason: BlockReason, safety: &[CommandSafety]) -> Self {
        Self::event(
            "policy",
            json!({ "blocked": true, "reason": reason, "safety": safety }),
        )
    }

    pub fn step_start(index: usize, cmd: &str, explain: &str) -> Self {
        Self::event(
            "step",
            json!({ "index": index, "status": "start", "cmd": cmd, "explain": explain }),
        )
    }

    pub fn step_complete(index: usize, record: &StepRecord) -> Self {
        let mut data = serde_json::to_value(record).unwrap_or_else(|_| json!({}));
        if let Some(obj) = data.as_object_mut() {
            obj.insert("index".into(), json!(index));
            obj.insert("status".into(), json!("complete"));
        }
        Self::event("step", data)
    }

    pub fn error(message: &str) -> Self {
        Self::event("error", json!({ "message": message }))
    }

    pub fn done(outcome: &PlanOutcome) -> Self {
        Self::event(
            "done",
            json!({
                "status": outcome.status_name(),
                "executed": outcome.results().len(),
                "terminated": outcome.terminated(),
            }),
        )
    }

    /// Terminal frame when no plan could be produced
    pub fn done_failed() -> Self {
        Self::event(
            "done",
            json!({ "status": "failed", "executed": 0, "terminated": false }),
        )
    }

    pub fn connected() -> Self {
        SseFrame::Comment("connected".into())
    }

    pub fn keep_alive() -> Self {
        SseFrame::Comment("keep-alive".into())
    }

    pub fn name(&self) -> Option<&'static str> {
        match self {
            SseFrame::Event { name, .. } => Some(name),
            SseFrame::Comment(_) => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            SseFrame::Event { data, .. } => Some(data),
            SseFrame::Comment(_) => None,
        }
    }

    /// Wire form, including the blank-line terminator
    pub fn encode(&self) -> String {
        match self {
            SseFrame::Event { name, data } => format!("event: {}\ndata: {}\n\n", name, data),
            SseFrame::Comment(text) => format!(": {}\n\n", text),
        }
    }
}

/// Receiving side handed to the transport; dropping it is a client disconnect
pub struct PlanStream {
    rx: mpsc::Receiver<SseFrame>,
}

impl PlanStream {
    pub async fn next_frame(&mut self) -> Option<SseFrame> {
        self.rx.recv().await
    }

    /// Drain every remaining frame
    pub async fn collect_frames(mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.rx.recv().await {
            frames.push(frame);
        }
        frames
    }
}

impl Stream for PlanStream {
    type Item = SseFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Sends frames for one run; a no-op sink in sync mode
pub struct Emitter {
    tx: Option<mpsc::Sender<SseFrame>>,
    heartbeat: Option<JoinHandle<()>>,
    disconnected: bool,
}

impl Emitter {
    pub fn sync() -> Self {
        Self {
            tx: None,
            heartbeat: None,
            disconnected: false,
        }
    }

    /// Open a stream: `: connected` first, then `: keep-alive` every `heartbeat`
    pub fn stream(heartbeat: Duration) -> (Self, PlanStream) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        // Capacity is fresh, so this cannot fail for lack of room
        let _ = tx.try_send(SseFrame::connected());

        let beat_tx = tx.clone();
        let period = heartbeat.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if beat_tx.send(SseFrame::keep_alive()).await.is_err() {
                    debug!("heartbeat stopped, client gone");
                    break;
                }
            }
        });

        let emitter = Self {
            tx: Some(tx),
            heartbeat: Some(handle),
            disconnected: false,
        };
        (emitter, PlanStream { rx })
    }

    /// False once the client has gone away
    pub fn is_connected(&self) -> bool {
        !self.disconnected
    }

    pub async fn emit(&mut self, frame: SseFrame) -> bool {
        let Some(tx) = &self.tx else {
            return !self.disconnected;
        };
        if tx.send(frame).await.is_err() {
            info!("stream client disconnected");
            self.disconnected = true;
            self.tx = None;
            self.stop_heartbeat();
            return false;
        }
        true
    }

    fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }

    /// Send the terminal frame and close the stream
    pub async fn finish(mut self, done: SseFrame) {
        self.stop_heartbeat();
        self.emit(done).await;
        self.tx = None;
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_event() {
        let frame = SseFrame::error("boom");
        assert_eq!(frame.encode(), "event: error\ndata: {\"message\":\"boom\"}\n\n");
        assert_eq!(SseFrame::keep_alive().encode(), ": keep-alive\n\n");
    }

    #[test]
    fn test_step_complete_carries_index() {
        let record = StepRecord {
            cmd: "ls".into(),
            explain: "list".into(),
            result: crate::backend::ExecutionResult::from_output("a\n".into(), String::new(), 0),
            ai_analysis: None,
        };
        let frame = SseFrame::step_complete(2, &record);
        let data = frame.data().unwrap();
        assert_eq!(data["index"], 2);
        assert_eq!(data["status"], "complete");
        assert_eq!(data["stdout"], "a\n");
        assert_eq!(frame.name(), Some("step"));
    }

    #[tokio::test]
    async fn test_stream_connects_and_heartbeats() {
        let (mut emitter, mut stream) = Emitter::stream(Duration::from_millis(20));
        assert_eq!(stream.next_frame().await, Some(SseFrame::connected()));
        assert_eq!(stream.next_frame().await, Some(SseFrame::keep_alive()));

        assert!(emitter.emit(SseFrame::error("x")).await);
        emitter.finish(SseFrame::done_failed()).await;

        let rest = stream.collect_frames().await;
        let names: Vec<_> = rest.iter().filter_map(|f| f.name()).collect();
        assert_eq!(names, vec!["error", "done"]);
    }

    #[tokio::test]
    async fn test_disconnect_detected() {
        let (mut emitter, stream) = Emitter::stream(Duration::from_secs(60));
        drop(stream);
        assert!(!emitter.emit(SseFrame::error("x")).await);
        assert!(!emitter.is_connected());
    }
}
