// Focus-follows-mouse: debounced pointer-enter per pane.

use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use crate::layout::{OverlayWidget, PointerEvent, SignalId};
use crate::pane::PaneId;
use crate::runtime::{StateVersion, TimerSlot, UiScheduler};

pub type HoverCallback = Arc<dyn Fn(&PaneId) + Send + Sync>;

/// Fires its callback once the pointer has rested on a pane for `delay`.
pub struct HoverHandler {
    pane_id: PaneId,
    scheduler: Arc<dyn UiScheduler>,
    delay: Mutex<Duration>,
    timer: TimerSlot,
    /// Bumped on enter and leave; a queued callback from an older enter is stale.
    generation: StateVersion,
    on_enter: RwLock<Option<HoverCallback>>,
    attached: Mutex<Option<(Arc<dyn OverlayWidget>, SignalId)>>,
    this: Weak<HoverHandler>,
}

impl HoverHandler {
    pub fn new(pane_id: PaneId, scheduler: Arc<dyn UiScheduler>, delay: Duration) -> Arc<Self> {
        log::debug!("creating hover handler for pane {pane_id}");
        Arc::new_cyclic(|this| HoverHandler {
            pane_id,
            scheduler,
            delay: Mutex::new(delay),
            timer: TimerSlot::new(),
            generation: StateVersion::new(),
            on_enter: RwLock::new(None),
            attached: Mutex::new(None),
            this: this.clone(),
        })
    }

    pub fn pane_id(&self) -> &PaneId {
        &self.pane_id
    }

    pub fn set_on_enter(&self, callback: Option<HoverCallback>) {
        *self.on_enter.write().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn delay(&self) -> Duration {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Listen for pointer crossings on `overlay`. Replaces any previous attachment.
    pub fn attach_to(&self, overlay: &Arc<dyn OverlayWidget>) {
        self.disconnect();
        let weak = self.this.clone();
        let signal = overlay.connect_pointer(Arc::new(move |event: PointerEvent| {
            let Some(handler) = weak.upgrade() else { return };
            match event {
                PointerEvent::Enter => handler.handle_enter(),
                PointerEvent::Leave => handler.handle_leave(),
            }
        }));
        *self.attached.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((Arc::clone(overlay), signal));
        log::debug!("hover handler attached for pane {}", self.pane_id);
    }

    pub fn handle_enter(&self) {
        let token = self.generation.bump();
        let weak = self.this.clone();
        self.timer.schedule(
            self.scheduler.as_ref(),
            self.delay(),
            Box::new(move || {
                let Some(handler) = weak.upgrade() else { return };
                if !handler.generation.is_current(token) {
                    return;
                }
                let callback = handler
                    .on_enter
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                if let Some(callback) = callback {
                    callback(&handler.pane_id);
                }
            }),
        );
    }

    pub fn handle_leave(&self) {
        self.cancel_pending();
    }

    /// Drop a scheduled activation, if any.
    pub fn cancel_pending(&self) {
        self.generation.bump();
        self.timer.cancel(self.scheduler.as_ref());
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending(self.scheduler.as_ref())
    }

    /// Stop listening and forget the callback.
    pub fn detach(&self) {
        self.cancel_pending();
        self.disconnect();
        self.set_on_enter(None);
    }

    fn disconnect(&self) {
        let attached = self
            .attached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((overlay, signal)) = attached {
            overlay.disconnect(signal);
        }
    }
}

impl Drop for HoverHandler {
    fn drop(&mut self) {
        self.timer.cancel(self.scheduler.as_ref());
        let attached = self
            .attached
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((overlay, signal)) = attached {
            overlay.disconnect(signal);
        }
    }
}

impl std::fmt::Debug for HoverHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoverHandler")
            .field("pane_id", &self.pane_id)
            .field("delay", &self.delay())
            .finish()
    }
}
