use std::collections::BTreeMap;
use std::fmt;

use btleplug::api::{CentralState, PeripheralProperties};
use serde::Serializer;
use serde_derive::Serialize;
use uuid::Uuid;

/// Printed in place of a missing name or signal strength.
pub const UNKNOWN: &str = "Unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterState {
    PoweredOn,
    PoweredOff,
    Unknown,
}

impl AdapterState {
    pub fn is_ready(self) -> bool {
        self == AdapterState::PoweredOn
    }
}

impl From<CentralState> for AdapterState {
    fn from(state: CentralState) -> Self {
        match state {
            CentralState::PoweredOn => AdapterState::PoweredOn,
            CentralState::PoweredOff => AdapterState::PoweredOff,
            CentralState::Unknown => AdapterState::Unknown,
        }
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdapterState::PoweredOn => "poweredOn",
            AdapterState::PoweredOff => "poweredOff",
            AdapterState::Unknown => "unknown",
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl fmt::Display for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl serde::Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn company_id(company: u16) -> String {
    format!("0x{company:04x}")
}

fn serialize_manufacturer_data<S: Serializer>(
    data: &BTreeMap<u16, HexBytes>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(data.iter().map(|(company, bytes)| (company_id(*company), bytes)))
}

/// Advertisement payload as reported by the platform. Nothing is decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AdvertisementData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_power_level: Option<i16>,
    #[serde(
        skip_serializing_if = "BTreeMap::is_empty",
        serialize_with = "serialize_manufacturer_data"
    )]
    pub manufacturer_data: BTreeMap<u16, HexBytes>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub service_data: BTreeMap<Uuid, HexBytes>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Uuid>,
}

impl From<PeripheralProperties> for AdvertisementData {
    fn from(properties: PeripheralProperties) -> Self {
        AdvertisementData {
            local_name: properties.local_name,
            tx_power_level: properties.tx_power_level,
            manufacturer_data: properties
                .manufacturer_data
                .into_iter()
                .map(|(company, data)| (company, HexBytes(data)))
                .collect(),
            service_data: properties
                .service_data
                .into_iter()
                .map(|(uuid, data)| (uuid, HexBytes(data)))
                .collect(),
            services: properties.services,
        }
    }
}

impl fmt::Display for AdvertisementData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries = Vec::new();
        if let Some(name) = &self.local_name {
            entries.push(format!("local_name: {name:?}"));
        }
        if let Some(level) = self.tx_power_level {
            entries.push(format!("tx_power_level: {level}"));
        }
        if !self.manufacturer_data.is_empty() {
            let data = self
                .manufacturer_data
                .iter()
                .map(|(company, data)| format!("{}: {data}", company_id(*company)))
                .collect::<Vec<_>>();
            entries.push(format!("manufacturer_data: {{{}}}", data.join(", ")));
        }
        if !self.service_data.is_empty() {
            let data = self
                .service_data
                .iter()
                .map(|(uuid, data)| format!("{uuid}: {data}"))
                .collect::<Vec<_>>();
            entries.push(format!("service_data: {{{}}}", data.join(", ")));
        }
        if !self.services.is_empty() {
            let services = self.services.iter().map(Uuid::to_string).collect::<Vec<_>>();
            entries.push(format!("services: [{}]", services.join(", ")));
        }
        write!(f, "{{{}}}", entries.join(", "))
    }
}

/// One discovery event, printed once and dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Discovery {
    pub id: String,
    pub name: Option<String>,
    /// Hardware address. CoreBluetooth hides it and reports all zeroes.
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,
    pub rssi: Option<i16>,
    /// Class of device, only set for classic (BR/EDR) devices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<u32>,
    pub advertisement: AdvertisementData,
}

impl Discovery {
    pub fn new(id: impl fmt::Display, properties: PeripheralProperties) -> Self {
        Discovery {
            id: id.to_string(),
            name: properties.local_name.clone(),
            address: properties.address.to_string(),
            address_type: properties
                .address_type
                .as_ref()
                .map(|kind| format!("{kind:?}").to_lowercase()),
            rssi: properties.rssi,
            class: properties.class,
            advertisement: properties.into(),
        }
    }
}

impl fmt::Display for Discovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Discovered peripheral:")?;
        writeln!(f, "  Name: {}", self.name.as_deref().unwrap_or(UNKNOWN))?;
        writeln!(f, "  Identifier: {}", self.id)?;
        match &self.address_type {
            Some(kind) => writeln!(f, "  Address: {} ({kind})", self.address)?,
            None => writeln!(f, "  Address: {}", self.address)?,
        }
        match self.rssi {
            Some(rssi) => writeln!(f, "  RSSI: {rssi}")?,
            None => writeln!(f, "  RSSI: {UNKNOWN}")?,
        }
        if let Some(class) = self.class {
            writeln!(f, "  Class: 0x{class:06x}")?;
        }
        writeln!(f, "  Advertisement data: {}", self.advertisement)?;
        write!(f, "-----")
    }
}

/// Notifications the scan controller reacts to.
#[derive(Clone, Debug)]
pub enum ScanEvent {
    StateChanged(AdapterState),
    Discovered(Discovery),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use btleplug::api::{AddressType, BDAddr};

    use super::*;

    fn properties() -> PeripheralProperties {
        let mut properties = PeripheralProperties::default();
        properties.local_name = Some("Thermo".to_string());
        properties.rssi = Some(-61);
        properties.tx_power_level = Some(4);
        properties.address = BDAddr::from([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        properties.address_type = Some(AddressType::Random);
        properties
            .manufacturer_data
            .insert(0x004C, vec![0x02, 0x15, 0xAB]);
        properties.services = vec![Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb)];
        properties
    }

    #[test]
    fn test_adapter_state() {
        assert!(AdapterState::from(CentralState::PoweredOn).is_ready());
        assert!(!AdapterState::from(CentralState::PoweredOff).is_ready());
        assert!(!AdapterState::from(CentralState::Unknown).is_ready());
        assert_eq!(AdapterState::PoweredOff.to_string(), "poweredOff");
    }

    #[test]
    fn test_hex_bytes() {
        assert_eq!(HexBytes(vec![0x00, 0x0f, 0xff]).to_string(), "000fff");
        assert_eq!(HexBytes(vec![]).to_string(), "");
    }

    #[test]
    fn test_discovery_text() {
        let discovery = Discovery::new("AA:BB:CC:DD:EE:FF", properties());
        assert_eq!(
            discovery.to_string(),
            "Discovered peripheral:\n\
             \x20 Name: Thermo\n\
             \x20 Identifier: AA:BB:CC:DD:EE:FF\n\
             \x20 Address: 11:22:33:44:55:66 (random)\n\
             \x20 RSSI: -61\n\
             \x20 Advertisement data: {local_name: \"Thermo\", tx_power_level: 4, \
             manufacturer_data: {0x004c: 0215ab}, \
             services: [0000180f-0000-1000-8000-00805f9b34fb]}\n\
             -----"
        );
    }

    #[test]
    fn test_discovery_text_unknown() {
        let discovery = Discovery::new("peripheral-1", PeripheralProperties::default());
        let text = discovery.to_string();
        assert!(text.contains("  Name: Unknown\n"));
        assert!(text.contains("  Address: 00:00:00:00:00:00\n"));
        assert!(text.contains("  RSSI: Unknown\n"));
        assert!(!text.contains("Class:"));
        assert!(text.contains("  Advertisement data: {}\n"));
    }

    #[test]
    fn test_discovery_class() {
        let mut properties = properties();
        properties.class = Some(0x240404);
        let discovery = Discovery::new("peripheral-2", properties);
        assert!(discovery.to_string().contains("  RSSI: -61\n  Class: 0x240404\n"));
        let value = serde_json::to_value(&discovery).unwrap();
        assert_eq!(value["class"], 0x240404);
    }

    #[test]
    fn test_discovery_json() {
        let discovery = Discovery::new("AA:BB:CC:DD:EE:FF", properties());
        let value = serde_json::to_value(&discovery).unwrap();
        assert_eq!(value["id"], "AA:BB:CC:DD:EE:FF");
        assert_eq!(value["name"], "Thermo");
        assert_eq!(value["rssi"], -61);
        assert_eq!(value["address"], "11:22:33:44:55:66");
        assert_eq!(value["address_type"], "random");
        assert!(value.get("class").is_none());
        // same company id spelling as the text form
        assert_eq!(value["advertisement"]["manufacturer_data"]["0x004c"], "0215ab");
        assert!(value["advertisement"].get("service_data").is_none());
    }
}
