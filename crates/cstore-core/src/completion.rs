use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// A key and its content, as returned by content loads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentEntry {
    pub key: String,
    pub data: Vec<u8>,
}

/// Outcome of a content load.
///
/// When `success` is `false` the entries must not be trusted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadResult {
    pub success: bool,
    pub entries: Vec<ContentEntry>,
}

impl LoadResult {
    pub(crate) fn failed() -> Self {
        Self::default()
    }
}

/// Outcome of a key enumeration.
///
/// When `success` is `false` the keys must not be trusted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeysResult {
    pub success: bool,
    pub keys: Vec<String>,
}

/// Create a linked completer/completion pair.
pub(crate) fn channel<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, Completion { rx })
}

/// Sending half of a [`Completion`]. Consumed on use, so a result is
/// delivered at most once.
pub(crate) struct Completer<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Completer<T> {
    pub(crate) fn complete(self, value: T) {
        // The caller may have dropped the completion; nobody is waiting then.
        let _ = self.tx.send(value);
    }
}

/// Result of an asynchronous content store call.
///
/// Resolves exactly once. If the store is dropped before the call finishes,
/// the completion resolves to `T::default()`, which is the failure value for
/// every store result (`false`, or `success: false`).
#[must_use = "a completion does nothing unless awaited"]
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

impl<T: Default> Future for Completion<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|result| result.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_sent_value() {
        let (completer, completion) = channel::<bool>();
        completer.complete(true);
        assert!(completion.await);
    }

    #[tokio::test]
    async fn dropped_completer_resolves_to_failure() {
        let (completer, completion) = channel::<LoadResult>();
        drop(completer);
        let result = completion.await;
        assert!(!result.success);
        assert!(result.entries.is_empty());
    }
}
