use tokio::sync::watch;

/// Create a linked trigger/listener pair.
///
/// Listeners can be cloned freely; firing the trigger (or dropping it)
/// wakes every one of them.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Resolve once shutdown has been requested.
    pub async fn triggered(&mut self) {
        // A dropped trigger counts as a request too
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}
