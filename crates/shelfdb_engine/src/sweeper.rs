//! Background maintenance: expiration, periodic sync and auto-shrink.

use crate::config::SyncPolicy;
use crate::engine::Shared;
use crate::error::{EngineError, EngineResult};
use crate::state;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread;

/// Starts the sweeper of `shared`.
///
/// The thread only holds a weak reference between passes and exits once
/// the store is dropped (its stop sender disconnects).
pub(crate) fn spawn(shared: &Arc<Shared>, stop: Receiver<()>) -> EngineResult<()> {
    let weak = Arc::downgrade(shared);
    thread::Builder::new()
        .name("shelfdb-sweeper".into())
        .spawn(move || run(&weak, &stop))?;
    Ok(())
}

fn run(weak: &Weak<Shared>, stop: &Receiver<()>) {
    loop {
        let Some(interval) = weak.upgrade().map(|s| s.config.read().sweep_interval) else {
            return;
        };

        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }

        let Some(shared) = weak.upgrade() else {
            return;
        };
        if let Err(err) = pass(&shared) {
            tracing::warn!(error = %err, "sweeper pass failed");
        }
    }
}

/// One maintenance pass.
pub(crate) fn pass(shared: &Shared) -> EngineResult<()> {
    expire(shared)?;

    let config = shared.config.read().clone();
    if config.sync_policy == SyncPolicy::EverySecond {
        shared.sync_if_dirty()?;
    }

    if let Some((size, base)) = shared.log_sizes()? {
        if config.wants_shrink(size, base) {
            shared.shrink()?;
        }
    }
    Ok(())
}

fn expire(shared: &Shared) -> EngineResult<()> {
    let keys = shared.state.read().expired_keys(state::now_millis());
    if keys.is_empty() {
        return Ok(());
    }

    let config = shared.config.read().clone();
    if let Some(on_expired) = &config.on_expired {
        tracing::trace!(count = keys.len(), "notifying expired keys");
        on_expired(&keys);
        return Ok(());
    }

    let removed = shared.update(|tx| {
        let mut removed = 0usize;
        for key in &keys {
            // Skip keys rewritten since the scan.
            let Some(value) = tx.expired_value(key) else {
                continue;
            };
            let outcome = match &config.on_expired_sync {
                Some(on_expired_sync) => on_expired_sync(key, &value, tx),
                None => tx.delete(key).map(|_| ()),
            };
            match outcome {
                Ok(()) | Err(EngineError::NotFound) => removed += 1,
                Err(err) => return Err(err),
            }
        }
        Ok(removed)
    })?;

    tracing::trace!(removed, "expired entries swept");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::tx::SetOptions;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn expiring(engine: &Engine, key: &str) {
        engine
            .update(|tx| {
                tx.set(key, "v", SetOptions::expiring(Duration::ZERO))
                    .map(|_| ())
            })
            .unwrap();
    }

    #[test]
    fn sweeper_removes_expired_entries() {
        let config = EngineConfig::new().sweep_interval(Duration::from_millis(10));
        let engine = Engine::open_with_config(crate::MEMORY_PATH, config).unwrap();
        expiring(&engine, "gone");
        engine
            .update(|tx| tx.set("kept", "v", SetOptions::persistent()).map(|_| ()))
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while engine.physical_len() > 1 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(engine.physical_len(), 1);
    }

    #[test]
    fn on_expired_receives_keys_and_keeps_them() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        // Passes are driven by hand.
        let mut config = EngineConfig::new().sweep_interval(Duration::from_secs(3600));
        config.on_expired = Some(Arc::new(move |keys: &[String]| {
            sink.lock().extend_from_slice(keys);
        }));
        let engine = Engine::open_with_config(crate::MEMORY_PATH, config).unwrap();

        expiring(&engine, "a");
        expiring(&engine, "b");
        engine.sweep().unwrap();

        assert_eq!(*seen.lock(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(engine.physical_len(), 2);
        assert!(engine.is_empty());
    }

    #[test]
    fn on_expired_sync_runs_inside_transaction() {
        let mut config = EngineConfig::new().sweep_interval(Duration::from_secs(3600));
        config.on_expired_sync = Some(Arc::new(|key: &str, value: &str, tx: &mut crate::Tx<'_>| {
            tx.set(&format!("archived:{key}"), value, SetOptions::persistent())?;
            tx.delete(key).map(|_| ())
        }));
        let engine = Engine::open_with_config(crate::MEMORY_PATH, config).unwrap();

        expiring(&engine, "session");
        engine.sweep().unwrap();

        assert_eq!(engine.physical_len(), 1);
        assert_eq!(engine.view(|tx| tx.get("archived:session")).unwrap(), "v");
    }

    #[test]
    fn failing_on_expired_sync_rolls_back_pass() {
        let mut config = EngineConfig::new().sweep_interval(Duration::from_secs(3600));
        config.on_expired_sync = Some(Arc::new(|key: &str, _: &str, tx: &mut crate::Tx<'_>| {
            tx.delete(key).map(|_| ()).or_else(|e| {
                if e.is_not_found() {
                    Err(EngineError::transaction_aborted("refuse"))
                } else {
                    Err(e)
                }
            })
        }));
        let engine = Engine::open_with_config(crate::MEMORY_PATH, config).unwrap();

        expiring(&engine, "k");
        assert!(engine.sweep().is_err());
        assert_eq!(engine.physical_len(), 1);
    }
}
