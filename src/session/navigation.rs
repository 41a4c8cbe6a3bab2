//! Navigation debouncing
//!
//! Single-page apps change the URL through the history API without a page
//! load. Every such signal restarts a short timer; only when the timer fires
//! is the URL compared against the active key, and only a changed key is
//! reported.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::annotations::url_key;

/// Quiet period before a URL change is acted on
pub const URL_CHECK_DELAY: Duration = Duration::from_millis(120);

/// A history or location change, carrying the new location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationSignal {
    PushState(String),
    ReplaceState(String),
    PopState(String),
    HashChange(String),
}

impl NavigationSignal {
    pub fn url(&self) -> &str {
        match self {
            NavigationSignal::PushState(url)
            | NavigationSignal::ReplaceState(url)
            | NavigationSignal::PopState(url)
            | NavigationSignal::HashChange(url) => url,
        }
    }
}

/// Collapses bursts of navigation signals into URL-key changes
#[derive(Debug, Clone)]
pub struct NavigationDebouncer {
    delay: Duration,
    current_key: String,
}

impl NavigationDebouncer {
    pub fn new(current_url: &str) -> Self {
        Self {
            delay: URL_CHECK_DELAY,
            current_key: url_key(current_url),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn current_key(&self) -> &str {
        &self.current_key
    }

    /// Record `url` as the location and return its key if it differs
    pub fn check(&mut self, url: &str) -> Option<String> {
        let key = url_key(url);
        if key == self.current_key {
            return None;
        }
        self.current_key = key.clone();
        Some(key)
    }

    /// Consume signals until the sender side closes, emitting changed keys.
    ///
    /// A check still pending when the signal channel closes is completed.
    pub async fn run(
        mut self,
        mut signals: mpsc::Receiver<NavigationSignal>,
        changes: mpsc::UnboundedSender<String>,
    ) {
        let timer = time::sleep(self.delay);
        tokio::pin!(timer);
        let mut pending: Option<String> = None;

        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(signal) => {
                        tracing::trace!(url = signal.url(), "Navigation signal queued");
                        pending = Some(signal.url().to_string());
                        timer.as_mut().reset(Instant::now() + self.delay);
                    }
                    None => break,
                },
                () = &mut timer, if pending.is_some() => {
                    if let Some(url) = pending.take() {
                        if !self.emit(&url, &changes) {
                            return;
                        }
                    }
                }
            }
        }

        if let Some(url) = pending.take() {
            timer.await;
            self.emit(&url, &changes);
        }
    }

    fn emit(&mut self, url: &str, changes: &mpsc::UnboundedSender<String>) -> bool {
        match self.check(url) {
            Some(key) => {
                tracing::debug!("URL key changed to {}", key);
                changes.send(key).is_ok()
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "https://app.test/inbox";

    #[test]
    fn test_check_ignores_fragment_changes() {
        let mut debouncer = NavigationDebouncer::new(START);
        assert_eq!(debouncer.check("https://app.test/inbox#message-3"), None);
        assert_eq!(
            debouncer.check("https://app.test/sent"),
            Some("https://app.test/sent".to_string())
        );
        assert_eq!(debouncer.current_key(), "https://app.test/sent");
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_last_url() {
        let (tx, rx) = mpsc::channel(8);
        let (changes_tx, mut changes_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(NavigationDebouncer::new(START).run(rx, changes_tx));

        tx.send(NavigationSignal::PushState("https://app.test/one".into()))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(50)).await;
        tx.send(NavigationSignal::PushState("https://app.test/two".into()))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(50)).await;
        tx.send(NavigationSignal::HashChange("https://app.test/two#top".into()))
            .await
            .unwrap();

        let started = Instant::now();
        let key = changes_rx.recv().await.unwrap();
        assert_eq!(key, "https://app.test/two");
        assert!(started.elapsed() >= URL_CHECK_DELAY);

        drop(tx);
        handle.await.unwrap();
        assert!(changes_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_key_emits_nothing() {
        let (tx, rx) = mpsc::channel(8);
        let (changes_tx, mut changes_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(NavigationDebouncer::new(START).run(rx, changes_tx));

        tx.send(NavigationSignal::HashChange(format!("{}#a", START)))
            .await
            .unwrap();
        tx.send(NavigationSignal::PopState(START.to_string()))
            .await
            .unwrap();
        drop(tx);

        handle.await.unwrap();
        assert!(changes_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_each_report() {
        let (tx, rx) = mpsc::channel(8);
        let (changes_tx, mut changes_rx) = mpsc::unbounded_channel();
        tokio::spawn(NavigationDebouncer::new(START).run(rx, changes_tx));

        tx.send(NavigationSignal::PushState("https://app.test/a".into()))
            .await
            .unwrap();
        assert_eq!(changes_rx.recv().await.unwrap(), "https://app.test/a");

        tx.send(NavigationSignal::ReplaceState("https://app.test/b".into()))
            .await
            .unwrap();
        assert_eq!(changes_rx.recv().await.unwrap(), "https://app.test/b");
    }
}
