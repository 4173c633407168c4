use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Ruuvi Innovations Ltd. manufacturer ID
pub const RUUVITAG_MANUFACTURER_ID: u16 = 0x0499;

/// Namespace token used for device identities and state topics
pub const DEVICE_NAMESPACE: &str = "ruuvi";

/// Scanner-assigned slot for a discovered device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DevicePath(String);

impl DevicePath {
    pub fn new(path: impl Into<String>) -> Self {
        DevicePath(path.into())
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier used in topic names and discovery unique ids
///
/// Derived from the hardware address, so `AA:BB:CC:DD:EE:FF` and
/// `aa-bb-cc-dd-ee-ff` map to the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    pub fn from_address(address: &str) -> Self {
        let normalized: String = address
            .chars()
            .filter(|c| !matches!(c, ':' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        DeviceIdentity(format!("{}_{}", DEVICE_NAMESPACE, normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One scanner event; any subset of fields may be present
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawObservation {
    pub name: Option<String>,
    pub address: Option<String>,
    pub signal_strength: Option<i16>,
    pub manufacturer_payload: Option<Vec<u8>>,
}

impl RawObservation {
    /// Keep only the RuuviTag entry of an advertised manufacturer-data map
    pub fn with_manufacturer_data(mut self, data: &HashMap<u16, Vec<u8>>) -> Self {
        self.manufacturer_payload = data.get(&RUUVITAG_MANUFACTURER_ID).cloned();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.signal_strength.is_none()
            && self.manufacturer_payload.is_none()
    }
}

/// Last observed attributes of one device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    pub name: Option<String>,
    pub address: Option<String>,
    pub signal_strength: Option<i16>,
    pub last_payload: Option<Vec<u8>>,
    pub ever_published: bool,
}

impl DeviceState {
    /// Apply every present field of `observation`, returning whether anything changed.
    /// Absent fields never erase what is already stored.
    pub fn merge(&mut self, observation: RawObservation) -> bool {
        // Non-short-circuit `|` so every field is applied
        merge_field(&mut self.name, observation.name)
            | merge_field(&mut self.address, observation.address)
            | merge_field(&mut self.signal_strength, observation.signal_strength)
            | merge_field(&mut self.last_payload, observation.manufacturer_payload)
    }

    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.address.as_deref().map(DeviceIdentity::from_address)
    }
}

fn merge_field<T: PartialEq>(slot: &mut Option<T>, incoming: Option<T>) -> bool {
    match incoming {
        Some(value) if slot.as_ref() != Some(&value) => {
            *slot = Some(value);
            true
        }
        _ => false,
    }
}

/// Decoded RAWv2 reading, serialized as the state topic payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    #[serde(rename = "temp")]
    pub temperature: f64,
    #[serde(rename = "hum")]
    pub humidity: f64,
    #[serde(rename = "press")]
    pub pressure: f64,
    #[serde(rename = "ax")]
    pub acceleration_x: f64,
    #[serde(rename = "ay")]
    pub acceleration_y: f64,
    #[serde(rename = "az")]
    pub acceleration_z: f64,
    #[serde(rename = "voltage")]
    pub battery_voltage: f64,
    #[serde(rename = "tx")]
    pub tx_power: i16,
    #[serde(rename = "move")]
    pub movement_counter: u8,
    #[serde(rename = "seq")]
    pub sequence_number: u16,
    #[serde(rename = "rssi")]
    pub signal_strength: Option<i16>,
    #[serde(skip)]
    pub mac: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_case_and_separators() {
        let upper = DeviceIdentity::from_address("AA:BB:CC:DD:EE:FF");
        let lower = DeviceIdentity::from_address("aa:bb:cc:dd:ee:ff");
        let dashed = DeviceIdentity::from_address("aa-bb-cc-dd-ee-ff");

        assert_eq!(upper, lower);
        assert_eq!(upper, dashed);
        assert_eq!(upper.as_str(), "ruuvi_aabbccddeeff");
    }

    #[test]
    fn identity_differs_for_distinct_addresses() {
        assert_ne!(
            DeviceIdentity::from_address("AA:BB:CC:DD:EE:FF"),
            DeviceIdentity::from_address("AA:BB:CC:DD:EE:FE")
        );
    }

    #[test]
    fn merge_never_erases_present_fields() {
        let mut state = DeviceState::default();
        assert!(state.merge(RawObservation {
            name: Some("Ruuvi 1234".into()),
            signal_strength: Some(-70),
            ..Default::default()
        }));

        let changed = state.merge(RawObservation {
            address: Some("AA:BB:CC:DD:EE:FF".into()),
            ..Default::default()
        });

        assert!(changed);
        assert_eq!(state.name.as_deref(), Some("Ruuvi 1234"));
        assert_eq!(state.signal_strength, Some(-70));
        assert_eq!(state.address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn merge_of_equal_fields_is_not_a_change() {
        let mut state = DeviceState {
            name: Some("Ruuvi 1234".into()),
            last_payload: Some(vec![5, 1, 2]),
            ..Default::default()
        };

        assert!(!state.merge(RawObservation {
            name: Some("Ruuvi 1234".into()),
            manufacturer_payload: Some(vec![5, 1, 2]),
            ..Default::default()
        }));
        assert!(!state.merge(RawObservation::default()));
    }

    #[test]
    fn manufacturer_map_keeps_only_ruuvi_entry() {
        let mut data = HashMap::new();
        data.insert(0x004c, vec![1, 2, 3]);
        let observation = RawObservation::default().with_manufacturer_data(&data);
        assert!(observation.manufacturer_payload.is_none());
        assert!(observation.is_empty());

        data.insert(RUUVITAG_MANUFACTURER_ID, vec![5, 0, 1]);
        let observation = RawObservation::default().with_manufacturer_data(&data);
        assert_eq!(observation.manufacturer_payload, Some(vec![5, 0, 1]));
    }

    #[test]
    fn measurement_json_omits_mac() {
        let measurement = Measurement {
            temperature: 24.3,
            humidity: 53.49,
            pressure: 1000.44,
            acceleration_x: 0.004,
            acceleration_y: -0.004,
            acceleration_z: 1.036,
            battery_voltage: 2.977,
            tx_power: 4,
            movement_counter: 66,
            sequence_number: 205,
            signal_strength: None,
            mac: "cbb8334c884f".into(),
        };

        let json = serde_json::to_value(&measurement).unwrap();
        assert_eq!(json["temp"], 24.3);
        assert_eq!(json["move"], 66);
        assert!(json["rssi"].is_null());
        assert!(json.get("mac").is_none());
        assert_eq!(json.as_object().unwrap().len(), 11);
    }
}
