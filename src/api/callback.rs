//! Closure-based routing of hardware callbacks.
//!
//! Radio stacks usually deliver advertisements through a callback. Instead of
//! parking a global pointer to the localizer for that callback, the adapter
//! owns a [`ReadingSink`] and the control loop drains the matching
//! [`CallbackScanner`] once per tick.

use crate::core::BeaconReading;
use crate::hardware::{BeaconScanner, SensorResult};
use log::trace;
use std::cell::RefCell;
use std::rc::Rc;

type PendingReadings = Rc<RefCell<Vec<BeaconReading>>>;

/// Registration handle returned when attaching a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u32);

impl CallbackHandle {
    pub(crate) fn new(id: u32) -> Self {
        CallbackHandle(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Cloneable handle a hardware callback pushes readings into
#[derive(Clone)]
pub struct ReadingSink {
    pending: PendingReadings,
}

impl ReadingSink {
    pub fn push(&self, beacon_id: u16, rssi: f64) {
        trace!("[ReadingSink] beacon {} RSSI {:.1}", beacon_id, rssi);
        self.pending.borrow_mut().push(BeaconReading::new(beacon_id, rssi));
    }

    /// Closure form for adapters that take `FnMut(id, rssi)`
    pub fn into_callback(self) -> impl FnMut(u16, f64) {
        move |beacon_id, rssi| self.push(beacon_id, rssi)
    }
}

/// [`BeaconScanner`] fed by one or more [`ReadingSink`]s
#[derive(Default)]
pub struct CallbackScanner {
    pending: PendingReadings,
    cycles: u64,
}

impl CallbackScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> ReadingSink {
        ReadingSink {
            pending: Rc::clone(&self.pending),
        }
    }

    /// Readings delivered since the last scan
    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

impl BeaconScanner for CallbackScanner {
    fn scan(&mut self) -> SensorResult<Vec<BeaconReading>> {
        self.cycles += 1;
        Ok(std::mem::take(&mut *self.pending.borrow_mut()))
    }
}
