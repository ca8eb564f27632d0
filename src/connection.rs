//! Connection Tracker - owns the single active peer link.
//!
//! States: Idle (no handle) and Connected (handle held). The handle is
//! acquired on a successful connect event and released exactly once on the
//! matching disconnect. A second connect while one is tracked is a stack
//! anomaly: the new handle is dropped and the original kept.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::store::SensorStore;

/// HCI status code for a successful connection.
pub const HCI_SUCCESS: u8 = 0x00;

/// Tracker state, derived from whether a handle is held.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Idle,
    Connected,
}

pub struct ConnectionTracker<'a, H> {
    store: &'a SensorStore,
    current: Mutex<CriticalSectionRawMutex, RefCell<Option<H>>>,
}

impl<'a, H: Clone> ConnectionTracker<'a, H> {
    pub const fn new(store: &'a SensorStore) -> Self {
        Self {
            store,
            current: Mutex::new(RefCell::new(None)),
        }
    }

    /// Handle a connect event from the host stack.
    pub fn on_connected(&self, handle: H, status: u8) {
        if status != HCI_SUCCESS {
            error!("Connection failed (err {})", status);
            return;
        }

        let accepted = self.current.lock(|current| {
            let mut current = current.borrow_mut();
            if current.is_some() {
                false
            } else {
                *current = Some(handle);
                true
            }
        });

        if accepted {
            info!("Connected");
        } else {
            // The rejected handle was moved into the closure and is dropped
            // there; the tracked one stays valid.
            error!("Connect event while already connected - keeping original link");
        }
    }

    /// Handle a disconnect event. Safe to call with no tracked link.
    pub fn on_disconnected(&self, reason: u8) {
        let released = self.current.lock(|current| current.borrow_mut().take());

        match released {
            Some(handle) => {
                info!("Disconnected (reason {})", reason);
                drop(handle);
            }
            None => warn!("Disconnect event with no tracked link (reason {})", reason),
        }

        self.store.reset_subscriptions();
    }

    /// The tracked handle, if any.
    pub fn current(&self) -> Option<H> {
        self.current.lock(|current| current.borrow().clone())
    }

    pub fn state(&self) -> LinkState {
        let connected = self.current.lock(|current| current.borrow().is_some());
        if connected {
            LinkState::Connected
        } else {
            LinkState::Idle
        }
    }
}
