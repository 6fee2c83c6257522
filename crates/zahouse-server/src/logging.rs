use std::{collections::VecDeque, sync::Arc};

use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

pub(crate) const LOG_RING_CAPACITY: usize = 500;

/// Tracing layer that mirrors every event as a JSON line to the admin log
/// stream and keeps the last `LOG_RING_CAPACITY` lines for late subscribers.
pub(crate) struct BroadcastLayer {
    pub tx: broadcast::Sender<String>,
    pub ring: Arc<std::sync::Mutex<VecDeque<String>>>,
}

struct EventVisitor<'a> {
    message: &'a mut String,
    fields: &'a mut serde_json::Map<String, serde_json::Value>,
}

impl tracing::field::Visit for EventVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            *self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.into());
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let mut rendered = format!("{value:?}");
        // Strip surrounding quotes added by Debug on &str
        if rendered.len() >= 2 && rendered.starts_with('"') && rendered.ends_with('"') {
            rendered = rendered[1..rendered.len() - 1].to_string();
        }
        if field.name() == "message" {
            *self.message = rendered;
        } else {
            self.fields.insert(field.name().to_string(), rendered.into());
        }
    }
}

fn category(target: &str) -> &'static str {
    if target.starts_with("zahouse_agent") {
        "llm"
    } else if target.starts_with("tower_http") || target.starts_with("zahouse_server::routes") {
        "http"
    } else if target.starts_with("zahouse_core::mailer") || target.starts_with("zahouse_core::store") {
        "leads"
    } else {
        "system"
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for BroadcastLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = match *event.metadata().level() {
            tracing::Level::ERROR => "err",
            tracing::Level::WARN => "warn",
            tracing::Level::INFO => "info",
            tracing::Level::DEBUG => "debug",
            tracing::Level::TRACE => return,
        };

        let mut message = String::new();
        let mut fields = serde_json::Map::new();
        event.record(&mut EventVisitor {
            message: &mut message,
            fields: &mut fields,
        });

        let json = serde_json::json!({
            "ts": chrono::Utc::now().timestamp(),
            "level": level,
            "message": message,
            "category": category(event.metadata().target()),
            "fields": fields,
        })
        .to_string();

        let _ = self.tx.send(json.clone());
        if let Ok(mut ring) = self.ring.lock() {
            ring.push_back(json);
            if ring.len() > LOG_RING_CAPACITY {
                ring.pop_front();
            }
        }
    }
}

/// Buffered lines first, then live ones. Lagged receivers skip what they missed.
pub(crate) fn replay_and_follow(
    tx: &broadcast::Sender<String>,
    ring: &std::sync::Mutex<VecDeque<String>>,
) -> impl Stream<Item = String> {
    // Subscribe before the snapshot so nothing falls between the two.
    let live = BroadcastStream::new(tx.subscribe()).filter_map(Result::ok);
    let history: Vec<String> = ring
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .cloned()
        .collect();
    tokio_stream::iter(history).chain(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn events_reach_ring_and_channel() {
        let (tx, mut rx) = broadcast::channel(16);
        let ring = Arc::new(std::sync::Mutex::new(VecDeque::new()));
        let subscriber = tracing_subscriber::registry().with(BroadcastLayer {
            tx,
            ring: Arc::clone(&ring),
        });

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(email = "a@b.co", count = 3u64, "lead captured");
            tracing::trace!("dropped");
        });

        let line = rx.try_recv().unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["level"], "info");
        assert_eq!(v["message"], "lead captured");
        assert_eq!(v["fields"]["email"], "a@b.co");
        assert_eq!(v["fields"]["count"], 3);
        assert!(rx.try_recv().is_err());
        assert_eq!(ring.lock().unwrap().len(), 1);
    }

    #[test]
    fn ring_is_bounded() {
        let (tx, _rx) = broadcast::channel(1024);
        let ring = Arc::new(std::sync::Mutex::new(VecDeque::new()));
        let subscriber = tracing_subscriber::registry().with(BroadcastLayer {
            tx,
            ring: Arc::clone(&ring),
        });
        tracing::subscriber::with_default(subscriber, || {
            for i in 0..(LOG_RING_CAPACITY + 25) {
                tracing::warn!("line {i}");
            }
        });
        let ring = ring.lock().unwrap();
        assert_eq!(ring.len(), LOG_RING_CAPACITY);
        assert!(ring.back().unwrap().contains(&format!("line {}", LOG_RING_CAPACITY + 24)));
    }

    #[tokio::test]
    async fn replay_precedes_live_lines() {
        let (tx, _) = broadcast::channel(16);
        let ring = std::sync::Mutex::new(VecDeque::from(vec!["old 1".to_string(), "old 2".to_string()]));
        let stream = replay_and_follow(&tx, &ring);
        tx.send("new".to_string()).unwrap();
        drop(tx);
        let lines: Vec<String> = stream.collect().await;
        assert_eq!(lines, vec!["old 1", "old 2", "new"]);
    }

    #[test]
    fn targets_map_to_categories() {
        assert_eq!(category("zahouse_agent::groq"), "llm");
        assert_eq!(category("tower_http::trace::on_response"), "http");
        assert_eq!(category("zahouse_core::store"), "leads");
        assert_eq!(category("zahouse_server"), "system");
    }
}
