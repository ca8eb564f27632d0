//! GATT Sensor Service.
//!
//! Answers attribute reads from the [`SensorStore`], turns CCC writes into
//! subscription flags, and pushes notifications for new readings when the
//! peer is connected and subscribed.
//!
//! Host-stack callbacks arrive as [`HostEvent`] messages through
//! [`SensorService::dispatch`]; read requests are answered synchronously
//! through [`SensorService::on_read_request`].

use heapless::Vec;

use crate::connection::ConnectionTracker;
use crate::error::{AttError, NotifyError};
use crate::store::{RawValue, SensorStore};
use crate::topology::{self, AttributeKind, SensorKind, CCC_NOTIFY};

/// Largest characteristic value in this service.
pub const MAX_VALUE_LEN: usize = 4;

/// Outbound half of the host BLE stack.
pub trait GattTransport {
    /// Reference to a live link, as handed out by the stack.
    type Handle: Clone;

    /// Send a notification for the attribute at `attribute` (index into
    /// [`topology::SERVICE_TOPOLOGY`]). Returns the stack's raw error code
    /// on failure.
    fn notify(&self, conn: &Self::Handle, attribute: usize, payload: &[u8]) -> Result<(), u32>;
}

/// Inbound host-stack events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostEvent<H> {
    Connected { handle: H, status: u8 },
    Disconnected { reason: u8 },
    CccWrite { attribute: usize, value: u16 },
}

pub struct SensorService<'a, T: GattTransport> {
    store: &'a SensorStore,
    tracker: ConnectionTracker<'a, T::Handle>,
    transport: T,
}

impl<'a, T: GattTransport> SensorService<'a, T> {
    pub const fn new(store: &'a SensorStore, transport: T) -> Self {
        Self {
            store,
            tracker: ConnectionTracker::new(store),
            transport,
        }
    }

    pub fn store(&self) -> &SensorStore {
        self.store
    }

    pub fn tracker(&self) -> &ConnectionTracker<'a, T::Handle> {
        &self.tracker
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Route a host-stack event.
    pub fn dispatch(&self, event: HostEvent<T::Handle>) {
        match event {
            HostEvent::Connected { handle, status } => self.tracker.on_connected(handle, status),
            HostEvent::Disconnected { reason } => self.tracker.on_disconnected(reason),
            HostEvent::CccWrite { attribute, value } => match topology::attribute(attribute) {
                Some(AttributeKind::ClientConfig(kind)) => self.handle_ccc_write(kind, value),
                _ => warn!("CCC write to non-CCC attribute {}", attribute),
            },
        }
    }

    /// Read request addressed by attribute index.
    pub fn on_read_request(
        &self,
        attribute: usize,
        offset: usize,
        max_len: usize,
    ) -> Result<Vec<u8, MAX_VALUE_LEN>, AttError> {
        match topology::attribute(attribute) {
            Some(AttributeKind::Value(kind)) => self.handle_read(kind, offset, max_len),
            Some(_) => Err(AttError::ReadNotPermitted),
            None => Err(AttError::AttributeNotFound),
        }
    }

    /// Serialize the current value of `kind` starting at `offset`.
    pub fn handle_read(
        &self,
        kind: SensorKind,
        offset: usize,
        max_len: usize,
    ) -> Result<Vec<u8, MAX_VALUE_LEN>, AttError> {
        let (bytes, len) = self.store.read(kind).to_le_bytes();
        if offset > len {
            return Err(AttError::InvalidOffset);
        }

        let end = len.min(offset.saturating_add(max_len));
        Vec::from_slice(&bytes[offset..end]).map_err(|_| AttError::InvalidOffset)
    }

    /// CCC descriptor write for `kind`. Anything but exactly "notify" disables.
    pub fn handle_ccc_write(&self, kind: SensorKind, value: u16) {
        let enabled = value == CCC_NOTIFY;
        debug!("{} CCC write {}", kind.name(), value);
        self.store.set_subscription(kind, enabled);
    }

    /// Store a new reading and notify the peer if it is connected and subscribed.
    pub fn push_update(&self, value: RawValue) -> Result<(), NotifyError> {
        let kind = value.kind();
        self.store.update(value);

        if !self.store.is_subscribed(kind) {
            return Ok(());
        }
        let Some(conn) = self.tracker.current() else {
            return Ok(());
        };

        let (bytes, len) = value.to_le_bytes();
        self.transport
            .notify(&conn, kind.value_index(), &bytes[..len])
            .map_err(|code| NotifyError { kind, code })?;

        debug!("{} notification sent: {:?}", kind.name(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::HCI_SUCCESS;
    use core::cell::RefCell;
    use std::vec::Vec as StdVec;

    #[derive(Default)]
    struct Recorder {
        sent: RefCell<StdVec<(u16, usize, StdVec<u8>)>>,
        fail_with: Option<u32>,
    }

    impl GattTransport for Recorder {
        type Handle = u16;

        fn notify(&self, conn: &u16, attribute: usize, payload: &[u8]) -> Result<(), u32> {
            if let Some(code) = self.fail_with {
                return Err(code);
            }
            self.sent.borrow_mut().push((*conn, attribute, payload.to_vec()));
            Ok(())
        }
    }

    fn connect(service: &SensorService<'_, Recorder>) {
        service.dispatch(HostEvent::Connected { handle: 0x10, status: HCI_SUCCESS });
    }

    fn subscribe(service: &SensorService<'_, Recorder>, kind: SensorKind) {
        service.dispatch(HostEvent::CccWrite { attribute: kind.ccc_index(), value: CCC_NOTIFY });
    }

    #[test]
    fn no_notification_without_subscription() {
        let store = SensorStore::new();
        let service = SensorService::new(&store, Recorder::default());
        connect(&service);

        assert_eq!(service.push_update(RawValue::Temperature(2500)), Ok(()));
        assert!(service.transport().sent.borrow().is_empty());
        assert_eq!(store.read(SensorKind::Temperature), RawValue::Temperature(2500));
    }

    #[test]
    fn no_notification_without_connection() {
        let store = SensorStore::new();
        let service = SensorService::new(&store, Recorder::default());
        store.set_subscription(SensorKind::Pressure, true);

        assert_eq!(service.push_update(RawValue::Pressure(101_325)), Ok(()));
        assert!(service.transport().sent.borrow().is_empty());
    }

    #[test]
    fn notifies_subscribed_characteristic_only() {
        let store = SensorStore::new();
        let service = SensorService::new(&store, Recorder::default());
        connect(&service);
        subscribe(&service, SensorKind::Pressure);

        service.push_update(RawValue::Temperature(2500)).unwrap();
        service.push_update(RawValue::Pressure(101_325)).unwrap();

        let sent = service.transport().sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 0x10);
        assert_eq!(sent[0].1, SensorKind::Pressure.value_index());
        assert_eq!(sent[0].2, 101_325u32.to_le_bytes());
    }

    #[test]
    fn transport_failure_is_reported_and_value_still_stored() {
        let store = SensorStore::new();
        let transport = Recorder { fail_with: Some(0x3004), ..Default::default() };
        let service = SensorService::new(&store, transport);
        connect(&service);
        subscribe(&service, SensorKind::Temperature);

        let err = service.push_update(RawValue::Temperature(-40)).unwrap_err();
        assert_eq!(err, NotifyError { kind: SensorKind::Temperature, code: 0x3004 });
        assert_eq!(store.read(SensorKind::Temperature), RawValue::Temperature(-40));
        // Link and subscription survive a failed send.
        assert_eq!(service.tracker().current(), Some(0x10));
        assert!(store.is_subscribed(SensorKind::Temperature));
    }

    #[test]
    fn ccc_only_exact_notify_enables() {
        let store = SensorStore::new();
        let service = SensorService::new(&store, Recorder::default());

        for value in [0x0000, crate::topology::CCC_INDICATE, 0x0003, 0xFFFF] {
            service.handle_ccc_write(SensorKind::Temperature, CCC_NOTIFY);
            service.handle_ccc_write(SensorKind::Temperature, value);
            assert!(!store.is_subscribed(SensorKind::Temperature), "value {value:#06x}");
        }

        service.handle_ccc_write(SensorKind::Temperature, CCC_NOTIFY);
        assert!(store.is_subscribed(SensorKind::Temperature));
    }

    #[test]
    fn ccc_write_to_value_attribute_is_ignored() {
        let store = SensorStore::new();
        let service = SensorService::new(&store, Recorder::default());
        service.dispatch(HostEvent::CccWrite {
            attribute: SensorKind::Temperature.value_index(),
            value: CCC_NOTIFY,
        });
        service.dispatch(HostEvent::CccWrite { attribute: 42, value: CCC_NOTIFY });
        assert!(!store.is_subscribed(SensorKind::Temperature));
        assert!(!store.is_subscribed(SensorKind::Pressure));
    }

    #[test]
    fn read_honours_offset_and_max_len() {
        let store = SensorStore::new();
        let service = SensorService::new(&store, Recorder::default());
        store.update(RawValue::Pressure(0x0403_0201));

        assert_eq!(service.handle_read(SensorKind::Pressure, 0, 4).unwrap(), [1, 2, 3, 4]);
        assert_eq!(service.handle_read(SensorKind::Pressure, 1, 4).unwrap(), [2, 3, 4]);
        assert_eq!(service.handle_read(SensorKind::Pressure, 0, 2).unwrap(), [1, 2]);
        assert!(service.handle_read(SensorKind::Pressure, 4, 4).unwrap().is_empty());
        assert_eq!(
            service.handle_read(SensorKind::Pressure, 5, 4),
            Err(AttError::InvalidOffset)
        );
        assert_eq!(
            service.handle_read(SensorKind::Temperature, 3, 4),
            Err(AttError::InvalidOffset)
        );
    }

    #[test]
    fn read_reflects_latest_value() {
        let store = SensorStore::new();
        let service = SensorService::new(&store, Recorder::default());
        store.update(RawValue::Temperature(100));
        assert_eq!(service.handle_read(SensorKind::Temperature, 0, 2).unwrap(), [100, 0]);
        store.update(RawValue::Temperature(-2));
        assert_eq!(service.handle_read(SensorKind::Temperature, 0, 2).unwrap(), [0xFE, 0xFF]);
    }

    #[test]
    fn read_request_by_attribute_index() {
        let store = SensorStore::new();
        let service = SensorService::new(&store, Recorder::default());
        store.update(RawValue::Temperature(2500));

        assert_eq!(
            service.on_read_request(SensorKind::Temperature.value_index(), 0, 23).unwrap(),
            [0xC4, 0x09]
        );
        assert_eq!(service.on_read_request(0, 0, 23), Err(AttError::ReadNotPermitted));
        assert_eq!(
            service.on_read_request(SensorKind::Pressure.ccc_index(), 0, 23),
            Err(AttError::ReadNotPermitted)
        );
        assert_eq!(service.on_read_request(99, 0, 23), Err(AttError::AttributeNotFound));
    }
}
