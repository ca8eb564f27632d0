//! Nordic SoftDevice S140 adapter.
//!
//! Binds the host-independent core to `nrf-softdevice`:
//!
//! 1. **Host** - enables the SoftDevice and arms the advertising payloads
//!    built by the Advertising Controller.
//! 2. **Registration** - registers the sensor service in
//!    [`SERVICE_TOPOLOGY`] order and records the SoftDevice handle of every
//!    entry, so attribute indices map to handles without a second table.
//! 3. **Transport** - notifications addressed by attribute index.
//! 4. **Server** - CCC writes and deferred reads from the SoftDevice,
//!    forwarded to the sensor service.

use core::mem;

use defmt::{debug, warn};
use heapless::Vec;
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{
    self, notify_value, CharacteristicHandles, DeferredReadReply, NotifyValueError, RegisterError,
    WriteOp,
};
use nrf_softdevice::ble::{Connection, GattError, Uuid};
use nrf_softdevice::{raw, Softdevice};

use sensor_beacon::advertising::{BleHost, MAX_ADV_LEN};
use sensor_beacon::config::{ATT_MTU, DEVICE_NAME};
use sensor_beacon::service::MAX_VALUE_LEN;
use sensor_beacon::topology::{uuid_le_bytes, AttributeKind, ATTRIBUTE_COUNT, SENSOR_SERVICE_UUID, SERVICE_TOPOLOGY};
use sensor_beacon::{AttError, Error, GattTransport, HostEvent, SensorService};

/// `gatt_server::run` does not report the HCI reason of a disconnect.
pub const REASON_UNREPORTED: u8 = 0xFF;

/// Handle value the SoftDevice never assigns.
const INVALID_HANDLE: u16 = 0;

pub type BeaconService = SensorService<'static, SoftdeviceTransport>;

/// Advertising payloads handed over by the Advertising Controller.
pub struct ArmedAdvertising {
    pub adv_data: Vec<u8, MAX_ADV_LEN>,
    pub scan_data: Vec<u8, MAX_ADV_LEN>,
}

/// [`BleHost`] backed by the SoftDevice.
///
/// Connectable advertising with nrf-softdevice only completes when a
/// central connects, so `start_advertising` arms the payloads and the
/// BLE task runs the actual advertise/accept loop.
pub struct SoftdeviceHost {
    sd: Option<&'static mut Softdevice>,
    armed: Option<ArmedAdvertising>,
}

impl SoftdeviceHost {
    pub const fn new() -> Self {
        Self { sd: None, armed: None }
    }

    pub fn into_parts(self) -> Option<(&'static mut Softdevice, ArmedAdvertising)> {
        Some((self.sd?, self.armed?))
    }
}

impl BleHost for SoftdeviceHost {
    fn enable(&mut self) -> Result<(), u32> {
        let config = nrf_softdevice::Config {
            clock: Some(raw::nrf_clock_lf_cfg_t {
                source: raw::NRF_CLOCK_LF_SRC_XTAL as u8,
                rc_ctiv: 0,
                rc_temp_ctiv: 0,
                accuracy: raw::NRF_CLOCK_LF_ACCURACY_20_PPM as u8,
            }),
            conn_gap: Some(raw::ble_gap_conn_cfg_t {
                conn_count: 1,
                event_length: 24,
            }),
            conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: ATT_MTU }),
            gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
                attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
            }),
            gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
                adv_set_count: 1,
                periph_role_count: 1,
                central_role_count: 0,
                central_sec_count: 0,
                _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
            }),
            gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
                p_value: DEVICE_NAME.as_ptr() as _,
                current_len: DEVICE_NAME.len() as u16,
                max_len: DEVICE_NAME.len() as u16,
                write_perm: unsafe { mem::zeroed() },
                _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(raw::BLE_GATTS_VLOC_STACK as u8),
            }),
            conn_gatts: Some(raw::ble_gatts_conn_cfg_t { hvn_tx_queue_size: 3 }),
            ..Default::default()
        };

        // Panics inside nrf-softdevice if the stack refuses the config.
        self.sd = Some(Softdevice::enable(&config));
        Ok(())
    }

    fn start_advertising(&mut self, adv_data: &[u8], scan_data: &[u8]) -> Result<(), u32> {
        if self.sd.is_none() {
            return Err(raw::NRF_ERROR_INVALID_STATE);
        }
        let adv_data = Vec::from_slice(adv_data).map_err(|_| raw::NRF_ERROR_INVALID_LENGTH)?;
        let scan_data = Vec::from_slice(scan_data).map_err(|_| raw::NRF_ERROR_INVALID_LENGTH)?;
        self.armed = Some(ArmedAdvertising { adv_data, scan_data });
        Ok(())
    }
}

/// Register the sensor service. Returns the handle of every topology entry.
///
/// The service declaration has no value handle and maps to `INVALID_HANDLE`.
pub fn register(sd: &mut Softdevice) -> Result<[u16; ATTRIBUTE_COUNT], Error> {
    let mut sb = ServiceBuilder::new(sd, Uuid::new_128(&uuid_le_bytes(SENSOR_SERVICE_UUID)))
        .map_err(registration_error)?;
    let mut handles = [INVALID_HANDLE; ATTRIBUTE_COUNT];
    let mut last: Option<CharacteristicHandles> = None;

    for (index, entry) in SERVICE_TOPOLOGY.iter().enumerate() {
        match *entry {
            AttributeKind::PrimaryService => {}
            AttributeKind::Value(kind) => {
                let initial = [0u8; MAX_VALUE_LEN];
                let attr = Attribute::new(&initial[..kind.value_size()]).deferred_read();
                let md = Metadata::new(Properties::new().read().notify());
                let chr = sb
                    .add_characteristic(Uuid::new_128(&uuid_le_bytes(kind.uuid())), attr, md)
                    .map_err(registration_error)?
                    .build();
                handles[index] = chr.value_handle;
                last = Some(chr);
            }
            // The SoftDevice adds the CCC right after the value it belongs to.
            AttributeKind::ClientConfig(_) => {
                handles[index] = last.as_ref().map_or(INVALID_HANDLE, |c| c.cccd_handle);
            }
        }
    }

    let _service_handle = sb.build();
    debug!("Sensor service handles: {}", handles);
    Ok(handles)
}

fn registration_error(e: RegisterError) -> Error {
    match e {
        RegisterError::Raw(raw) => Error::Registration(raw as u32),
    }
}

/// Notification transport addressed by attribute index.
pub struct SoftdeviceTransport {
    handles: [u16; ATTRIBUTE_COUNT],
}

impl SoftdeviceTransport {
    pub const fn new(handles: [u16; ATTRIBUTE_COUNT]) -> Self {
        Self { handles }
    }

    /// Attribute index of a SoftDevice handle.
    pub fn attribute_for(&self, handle: u16) -> Option<usize> {
        if handle == INVALID_HANDLE {
            return None;
        }
        self.handles.iter().position(|h| *h == handle)
    }
}

impl GattTransport for SoftdeviceTransport {
    type Handle = Connection;

    fn notify(&self, conn: &Connection, attribute: usize, payload: &[u8]) -> Result<(), u32> {
        let handle = match self.handles.get(attribute) {
            Some(h) if *h != INVALID_HANDLE => *h,
            _ => return Err(raw::NRF_ERROR_INVALID_PARAM),
        };

        notify_value(conn, handle, payload).map_err(|e| match e {
            NotifyValueError::Disconnected => raw::BLE_ERROR_INVALID_CONN_HANDLE,
            NotifyValueError::Raw(raw) => raw as u32,
        })
    }
}

/// GATT server event bridge into the sensor service.
pub struct BeaconServer {
    service: &'static BeaconService,
}

impl BeaconServer {
    pub const fn new(service: &'static BeaconService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &'static BeaconService {
        self.service
    }
}

impl gatt_server::Server for BeaconServer {
    type Event = ();

    fn on_write(
        &self,
        _conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        let Some(attribute) = self.service.transport().attribute_for(handle) else {
            warn!("Write to unknown handle {}", handle);
            return None;
        };

        match data {
            [lo, hi, ..] => self.service.dispatch(HostEvent::CccWrite {
                attribute,
                value: u16::from_le_bytes([*lo, *hi]),
            }),
            _ => warn!("Short CCC write on handle {} ({} bytes)", handle, data.len()),
        }
        None
    }

    fn on_deferred_read(
        &self,
        handle: u16,
        offset: usize,
        reply: DeferredReadReply,
    ) -> Option<Self::Event> {
        let max_len = ATT_MTU as usize - 1;
        let result = match self.service.transport().attribute_for(handle) {
            Some(attribute) => self.service.on_read_request(attribute, offset, max_len),
            None => Err(AttError::InvalidHandle),
        };

        let sent = match &result {
            Ok(bytes) => reply.reply(Ok(Some(bytes.as_slice()))),
            Err(e) => reply.reply(Err(GattError::from_att_error(e.code()))),
        };
        if sent.is_err() {
            warn!("Read reply on handle {} failed", handle);
        }
        None
    }
}
