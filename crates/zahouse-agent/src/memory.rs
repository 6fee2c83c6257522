use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Instant,
};

use tokio::sync::Mutex as TokioMutex;
use tracing::debug;
use zahouse_core::ChatTurn;

const DEFAULT_MAX_THREADS: usize = 1_000;

struct Thread {
    turns: VecDeque<ChatTurn>,
    touched: Instant,
}

/// In-process chat history keyed by thread id.
///
/// Each thread keeps its last `max_exchanges` user/assistant pairs, so a
/// replayed history always starts with a user turn. When more than
/// `max_threads` threads exist the least recently used one is dropped.
/// History is lost on restart.
#[derive(Clone)]
pub struct ThreadMemory {
    threads: Arc<TokioMutex<HashMap<String, Thread>>>,
    max_exchanges: usize,
    max_threads: usize,
}

impl ThreadMemory {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            threads: Arc::new(TokioMutex::new(HashMap::new())),
            max_exchanges,
            max_threads: DEFAULT_MAX_THREADS,
        }
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads.max(1);
        self
    }

    /// Prior turns for `thread_id`, oldest first.
    pub async fn history(&self, thread_id: &str) -> Vec<ChatTurn> {
        let threads = self.threads.lock().await;
        threads
            .get(thread_id)
            .map(|t| t.turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append one completed exchange.
    pub async fn record(&self, thread_id: &str, user: ChatTurn, assistant: ChatTurn) {
        if self.max_exchanges == 0 {
            return;
        }
        let mut threads = self.threads.lock().await;

        if !threads.contains_key(thread_id) && threads.len() >= self.max_threads {
            let oldest = threads
                .iter()
                .min_by_key(|(_, t)| t.touched)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                debug!(thread_id = %id, "evicting least recently used thread");
                threads.remove(&id);
            }
        }

        let thread = threads
            .entry(thread_id.to_string())
            .or_insert_with(|| Thread {
                turns: VecDeque::new(),
                touched: Instant::now(),
            });
        thread.turns.push_back(user);
        thread.turns.push_back(assistant);
        while thread.turns.len() > self.max_exchanges * 2 {
            thread.turns.pop_front();
            thread.turns.pop_front();
        }
        thread.touched = Instant::now();
    }

    pub async fn clear(&self, thread_id: &str) {
        self.threads.lock().await.remove(thread_id);
    }

    pub async fn thread_count(&self) -> usize {
        self.threads.lock().await.len()
    }
}
