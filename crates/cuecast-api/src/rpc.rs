// ── Request/response correlation ──
//
// Both sockets multiplex many in-flight requests over one connection and
// match replies by a generated id. This table is the shared bookkeeping.

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::error::Error;

type Reply = Result<serde_json::Value, Error>;

/// In-flight requests keyed by request id.
#[derive(Default)]
pub(crate) struct PendingRequests {
    waiting: DashMap<String, oneshot::Sender<Reply>>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a request id. The entry lives until a reply lands or the
    /// returned [`Registration`] is dropped.
    pub(crate) fn register(&self, id: &str) -> Registration<'_> {
        let (tx, rx) = oneshot::channel();
        self.waiting.insert(id.to_owned(), tx);
        Registration {
            pending: self,
            id: id.to_owned(),
            reply: rx,
        }
    }

    /// Deliver a reply. Returns `false` if nobody was waiting for `id`
    /// (late reply after a timeout, or an id we never issued).
    pub(crate) fn resolve(&self, id: &str, reply: Reply) -> bool {
        match self.waiting.remove(id) {
            Some((_, tx)) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Drop a registration without replying (caller gave up).
    pub(crate) fn forget(&self, id: &str) {
        self.waiting.remove(id);
    }

    /// Fail every in-flight request, e.g. when the socket drops.
    pub(crate) fn fail_all(&self, err: &Error) {
        let ids: Vec<String> = self.waiting.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, tx)) = self.waiting.remove(&id) {
                let _ = tx.send(Err(err.clone()));
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.waiting.len()
    }
}

/// One in-flight request. Dropping it early (timeout, cancelled caller)
/// removes the table entry.
pub(crate) struct Registration<'a> {
    pending: &'a PendingRequests,
    id: String,
    reply: oneshot::Receiver<Reply>,
}

impl Registration<'_> {
    pub(crate) async fn reply(mut self) -> Result<Reply, oneshot::error::RecvError> {
        (&mut self.reply).await
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.pending.forget(&self.id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_delivers_to_registered_receiver() {
        let pending = PendingRequests::new();
        let rx = pending.register("a");

        assert!(pending.resolve("a", Ok(serde_json::json!({ "ok": true }))));
        assert_eq!(rx.reply().await.unwrap().unwrap()["ok"], true);
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn resolve_unknown_id_is_ignored() {
        let pending = PendingRequests::new();
        assert!(!pending.resolve("nope", Ok(serde_json::Value::Null)));
    }

    #[tokio::test]
    async fn fail_all_rejects_everyone() {
        let pending = PendingRequests::new();
        let a = pending.register("a");
        let b = pending.register("b");

        pending.fail_all(&Error::SessionClosed);

        assert!(matches!(a.reply().await.unwrap(), Err(Error::SessionClosed)));
        assert!(matches!(b.reply().await.unwrap(), Err(Error::SessionClosed)));
        assert_eq!(pending.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn caller_giving_up_clears_the_entry() {
        let pending = PendingRequests::new();
        let waited = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            pending.register("slow").reply(),
        )
        .await;

        assert!(waited.is_err());
        assert_eq!(pending.len(), 0);
        assert!(!pending.resolve("slow", Ok(serde_json::Value::Null)));
    }

    #[test]
    fn dropped_registration_is_forgotten() {
        let pending = PendingRequests::new();
        let kept = pending.register("kept");
        drop(pending.register("dropped"));

        assert_eq!(pending.len(), 1);
        drop(kept);
        assert_eq!(pending.len(), 0);
    }
}
