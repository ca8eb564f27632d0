//! Sensor service attribute table.
//!
//! The table below is the single source for both registration order and
//! notification targeting. Clients cache attribute positions, so entries
//! must never be reordered.
//!
//! ```text
//! 0: Primary service      59E2FBF4-592A-45F6-AC84-BB3DCDB33F56
//! 1: Temperature value    57DF5C86-7899-42B3-ADF0-BE2EFFE11E7E  read|notify  i16 LE, centi-°C
//! 2: Temperature CCC      0x2902                                 read|write   u16 LE
//! 3: Pressure value       02CDC712-C8E2-4130-A9E8-2C10EE820BFC  read|notify  u32 LE, Pa
//! 4: Pressure CCC         0x2902                                 read|write   u16 LE
//! ```

/// Custom sensor service UUID.
pub const SENSOR_SERVICE_UUID: u128 = 0x59E2FBF4_592A_45F6_AC84_BB3DCDB33F56;

/// Temperature characteristic UUID.
pub const TEMPERATURE_CHAR_UUID: u128 = 0x57DF5C86_7899_42B3_ADF0_BE2EFFE11E7E;

/// Pressure characteristic UUID.
pub const PRESSURE_CHAR_UUID: u128 = 0x02CDC712_C8E2_4130_A9E8_2C10EE820BFC;

/// Client Characteristic Configuration descriptor (16-bit SIG UUID).
pub const CCC_DESCRIPTOR_UUID: u16 = 0x2902;

/// CCC bit 0: notifications enabled.
pub const CCC_NOTIFY: u16 = 0x0001;

/// CCC bit 1: indications enabled. Not supported, treated as disabled.
pub const CCC_INDICATE: u16 = 0x0002;

/// One of the two exposed physical quantities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorKind {
    Temperature,
    Pressure,
}

impl SensorKind {
    pub const ALL: [SensorKind; 2] = [SensorKind::Temperature, SensorKind::Pressure];

    /// Human-readable name for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            SensorKind::Temperature => "Temperature",
            SensorKind::Pressure => "Pressure",
        }
    }

    /// Characteristic UUID.
    pub const fn uuid(self) -> u128 {
        match self {
            SensorKind::Temperature => TEMPERATURE_CHAR_UUID,
            SensorKind::Pressure => PRESSURE_CHAR_UUID,
        }
    }

    /// Declared attribute size in bytes.
    pub const fn value_size(self) -> usize {
        match self {
            SensorKind::Temperature => 2,
            SensorKind::Pressure => 4,
        }
    }

    /// Index of this characteristic's value in [`SERVICE_TOPOLOGY`].
    pub const fn value_index(self) -> usize {
        match find(AttributeKind::Value(self)) {
            Some(i) => i,
            None => panic!("characteristic missing from topology"),
        }
    }

    /// Index of this characteristic's CCC descriptor in [`SERVICE_TOPOLOGY`].
    pub const fn ccc_index(self) -> usize {
        match find(AttributeKind::ClientConfig(self)) {
            Some(i) => i,
            None => panic!("CCC descriptor missing from topology"),
        }
    }
}

/// Role of one entry in the attribute table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttributeKind {
    /// Primary service declaration.
    PrimaryService,
    /// Characteristic value (read + notify).
    Value(SensorKind),
    /// Client Characteristic Configuration descriptor of a characteristic.
    ClientConfig(SensorKind),
}

/// Number of attributes in the sensor service.
pub const ATTRIBUTE_COUNT: usize = 5;

/// Static, ordered attribute table of the sensor service.
pub type ServiceTopology = [AttributeKind; ATTRIBUTE_COUNT];

/// The sensor service, in registration order.
pub const SERVICE_TOPOLOGY: ServiceTopology = [
    AttributeKind::PrimaryService,
    AttributeKind::Value(SensorKind::Temperature),
    AttributeKind::ClientConfig(SensorKind::Temperature),
    AttributeKind::Value(SensorKind::Pressure),
    AttributeKind::ClientConfig(SensorKind::Pressure),
];

/// Look up the role of an attribute index.
pub fn attribute(index: usize) -> Option<AttributeKind> {
    SERVICE_TOPOLOGY.get(index).copied()
}

const fn find(target: AttributeKind) -> Option<usize> {
    let mut i = 0;
    while i < ATTRIBUTE_COUNT {
        if same(SERVICE_TOPOLOGY[i], target) {
            return Some(i);
        }
        i += 1;
    }
    None
}

// `PartialEq` is not usable in const context.
const fn same(a: AttributeKind, b: AttributeKind) -> bool {
    match (a, b) {
        (AttributeKind::PrimaryService, AttributeKind::PrimaryService) => true,
        (AttributeKind::Value(x), AttributeKind::Value(y))
        | (AttributeKind::ClientConfig(x), AttributeKind::ClientConfig(y)) => {
            x as u8 == y as u8
        }
        _ => false,
    }
}

/// 128-bit UUID in over-the-air (little-endian) byte order.
pub const fn uuid_le_bytes(uuid: u128) -> [u8; 16] {
    uuid.to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_targets_follow_registration_order() {
        assert_eq!(SensorKind::Temperature.value_index(), 1);
        assert_eq!(SensorKind::Temperature.ccc_index(), 2);
        assert_eq!(SensorKind::Pressure.value_index(), 3);
        assert_eq!(SensorKind::Pressure.ccc_index(), 4);
    }

    #[test]
    fn every_value_is_followed_by_its_ccc() {
        for kind in SensorKind::ALL {
            let value = kind.value_index();
            assert_eq!(attribute(value), Some(AttributeKind::Value(kind)));
            assert_eq!(
                attribute(value + 1),
                Some(AttributeKind::ClientConfig(kind))
            );
        }
    }

    #[test]
    fn service_declaration_comes_first() {
        assert_eq!(attribute(0), Some(AttributeKind::PrimaryService));
        assert_eq!(attribute(ATTRIBUTE_COUNT), None);
    }

    #[test]
    fn uuid_is_sent_little_endian() {
        let bytes = uuid_le_bytes(SENSOR_SERVICE_UUID);
        assert_eq!(bytes[0], 0x56);
        assert_eq!(bytes[1], 0x3F);
        assert_eq!(bytes[15], 0x59);
        assert_eq!(bytes[14], 0xE2);
    }

    #[test]
    fn value_sizes_match_wire_contract() {
        assert_eq!(SensorKind::Temperature.value_size(), 2);
        assert_eq!(SensorKind::Pressure.value_size(), 4);
    }
}
