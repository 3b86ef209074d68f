// Reserved-corner interlock. Moving the pointer into the top-left corner
// stops a live session, even while a click is in flight.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use enigo::{Enigo, Mouse, Settings};

use crate::agent_engine::interrupt::{InterruptKind, InterruptSignal};

/// True when `(x, y)` lies inside the reserved top-left corner.
pub fn in_reserved_corner(x: i32, y: i32, margin: i32) -> bool {
    (0..=margin).contains(&x) && (0..=margin).contains(&y)
}

/// Background pointer poller. Stops when dropped.
pub struct CornerWatch {
    stop: Arc<AtomicBool>,
}

impl CornerWatch {
    pub fn spawn(signal: InterruptSignal, margin: i32, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let spawned = std::thread::Builder::new()
            .name("seeclick-corner-watch".into())
            .spawn(move || {
                let enigo = match Enigo::new(&Settings::default()) {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(error = %e, "corner watch unavailable; relying on pre-click checks");
                        return;
                    }
                };
                while !stop_flag.load(Ordering::Relaxed) && signal.current().is_none() {
                    if let Ok((x, y)) = enigo.location() {
                        if in_reserved_corner(x, y, margin) {
                            tracing::warn!(x, y, "pointer in reserved corner, tripping safety stop");
                            signal.trip(InterruptKind::SafetyTrigger);
                            return;
                        }
                    }
                    std::thread::sleep(interval);
                }
            });

        if let Err(e) = spawned {
            tracing::warn!(error = %e, "failed to start corner watch thread");
        }

        Self { stop }
    }
}

impl Drop for CornerWatch {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
