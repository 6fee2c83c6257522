use zahouse_agent::ThreadMemory;
use zahouse_core::{ChatTurn, Role};

#[tokio::test]
async fn unknown_thread_has_no_history() {
    let memory = ThreadMemory::new(10);
    assert!(memory.history("nope").await.is_empty());
}

#[tokio::test]
async fn keeps_only_the_most_recent_exchanges() {
    let memory = ThreadMemory::new(2);
    for i in 0..5 {
        memory
            .record("t1", ChatTurn::user(format!("q{i}")), ChatTurn::assistant(format!("a{i}")))
            .await;
    }
    let history = memory.history("t1").await;
    let contents: Vec<&str> = history.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, vec!["q3", "a3", "q4", "a4"]);
    assert_eq!(history[0].role, Role::User);
}

#[tokio::test]
async fn threads_are_isolated() {
    let memory = ThreadMemory::new(10);
    memory.record("a", ChatTurn::user("hi"), ChatTurn::assistant("yo")).await;
    assert!(memory.history("b").await.is_empty());
    assert_eq!(memory.history("a").await.len(), 2);
    memory.clear("a").await;
    assert!(memory.history("a").await.is_empty());
}

#[tokio::test]
async fn zero_exchanges_disables_memory() {
    let memory = ThreadMemory::new(0);
    memory.record("a", ChatTurn::user("hi"), ChatTurn::assistant("yo")).await;
    assert!(memory.history("a").await.is_empty());
    assert_eq!(memory.thread_count().await, 0);
}

#[tokio::test]
async fn least_recently_used_thread_is_evicted() {
    let memory = ThreadMemory::new(10).with_max_threads(2);
    memory.record("old", ChatTurn::user("1"), ChatTurn::assistant("1")).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    memory.record("mid", ChatTurn::user("2"), ChatTurn::assistant("2")).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    memory.record("old", ChatTurn::user("3"), ChatTurn::assistant("3")).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    memory.record("new", ChatTurn::user("4"), ChatTurn::assistant("4")).await;

    assert_eq!(memory.thread_count().await, 2);
    assert!(memory.history("mid").await.is_empty());
    assert_eq!(memory.history("old").await.len(), 4);
}
