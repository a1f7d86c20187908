//! Scripted hint source

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tower_lsp::lsp_types::Url;

use syntax_tree_client::client::error::ClientError;
use syntax_tree_client::client::traits::HintSource;
use syntax_tree_client::inlay::{HintSet, InlayHint};

struct Reply {
    delay: Duration,
    hints: Option<HintSet>,
}

/// Hint source answering from a queue of scripted replies, falling back to a
/// default reply once the queue is empty
pub struct FakeHintSource {
    replies: Mutex<VecDeque<Reply>>,
    default: Option<HintSet>,
    calls: AtomicUsize,
}

impl FakeHintSource {
    pub fn new(default: Option<HintSet>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a reply delivered after `delay`
    pub fn push(&self, delay: Duration, hints: Option<HintSet>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply { delay, hints });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HintSource for FakeHintSource {
    async fn inlay_hints(&self, _uri: &Url) -> Result<Option<HintSet>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let reply = self.replies.lock().unwrap().pop_front();
        let (delay, hints) = match reply {
            Some(reply) => (reply.delay, reply.hints),
            None => (Duration::ZERO, self.default.clone()),
        };
        tokio::time::sleep(delay).await;
        Ok(hints)
    }
}

pub fn before_hint(position: usize, text: &str) -> HintSet {
    HintSet {
        before: vec![InlayHint {
            position,
            text: text.to_string(),
        }],
        after: vec![],
    }
}
