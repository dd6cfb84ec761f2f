use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub fn register() -> Result<Interrupted, ctrlc::Error> {
    let interrupted = Interrupted::new();
    let b = interrupted.clone();
    ctrlc::set_handler(move || {
        if b.interrupted() {
            println!("User requested abort (Ctrl+C twice)");
            std::process::exit(1);
        }
        println!("Cancelling in-flight requests (Ctrl+C again to abort)...");
        b.interrupt();
    })?;
    Ok(interrupted)
}

#[derive(Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation shared by the orchestrator, every executor and
/// the sampler. Once set it stays set.
#[derive(Clone, Default)]
pub struct Interrupted {
    inner: Arc<Inner>,
}

impl Interrupted {
    pub fn new() -> Interrupted {
        Interrupted::default()
    }

    pub fn interrupt(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn interrupted(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`Interrupted::interrupt`] has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent interrupt is not missed.
            let notified = self.inner.notify.notified();
            if self.interrupted() {
                return;
            }
            notified.await;
        }
    }
}
