use tokio_util::sync::CancellationToken;

use crate::broadcaster::Broadcaster;

/// Shared by every request handler. Built once at startup.
#[derive(Clone)]
pub struct AppContext {
    pub broadcaster: Broadcaster,
    /// Cancelled on shutdown; open websockets close when it fires.
    pub token: CancellationToken,
}

impl AppContext {
    pub fn new(broadcaster: Broadcaster, token: CancellationToken) -> Self {
        Self { broadcaster, token }
    }
}
