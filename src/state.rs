/// In-memory device table with change detection
use std::collections::HashMap;

use crate::models::{DevicePath, DeviceState, RawObservation};

/// Result of merging one observation into the store
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    /// Device state after the merge
    pub state: DeviceState,
    /// True only for the call that created the entry
    pub is_new_device: bool,
    /// True if any present field differed from the stored value
    pub changed: bool,
}

/// Last observed state per device path
///
/// Mutations take `&mut self`, so every merge for a device is serialized
/// by whoever owns the store.
#[derive(Debug, Default)]
pub struct DeviceStore {
    devices: HashMap<DevicePath, DeviceState>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an observation into the state for `path`, creating it if needed
    ///
    /// Manufacturer payloads are compared byte for byte, so a rebroadcast of
    /// identical bytes is not a change while any differing byte is, even when
    /// both decode to the same rounded measurement.
    pub fn merge(&mut self, path: &DevicePath, observation: RawObservation) -> Merge {
        let is_new_device = !self.devices.contains_key(path);
        let state = self.devices.entry(path.clone()).or_default();
        let changed = state.merge(observation);

        Merge {
            state: state.clone(),
            is_new_device,
            changed,
        }
    }

    /// Record that discovery and availability have been announced for `path`
    pub fn mark_published(&mut self, path: &DevicePath) {
        if let Some(state) = self.devices.get_mut(path) {
            state.ever_published = true;
        }
    }

    #[cfg(test)]
    pub fn get(&self, path: &DevicePath) -> Option<&DeviceState> {
        self.devices.get(path)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> DevicePath {
        DevicePath::new("hci0/dev_AA_BB_CC_DD_EE_FF")
    }

    fn observation(payload: Vec<u8>) -> RawObservation {
        RawObservation {
            name: Some("RuuviWeather".into()),
            address: Some("AA:BB:CC:DD:EE:FF".into()),
            signal_strength: Some(-72),
            manufacturer_payload: Some(payload),
        }
    }

    #[test]
    fn identical_observation_is_unchanged() {
        let mut store = DeviceStore::new();

        let first = store.merge(&path(), observation(vec![5; 24]));
        assert!(first.changed);

        let second = store.merge(&path(), observation(vec![5; 24]));
        assert!(!second.changed);
        assert_eq!(second.state, first.state);
    }

    #[test]
    fn new_device_reported_exactly_once() {
        let mut store = DeviceStore::new();

        assert!(store.merge(&path(), RawObservation::default()).is_new_device);
        assert!(!store.merge(&path(), observation(vec![5; 24])).is_new_device);
        assert!(!store.merge(&path(), RawObservation::default()).is_new_device);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn single_byte_difference_is_a_change() {
        let mut store = DeviceStore::new();
        let mut payload = vec![5; 24];
        store.merge(&path(), observation(payload.clone()));

        // Last MAC byte: decodes to the same measurement
        payload[23] ^= 0x01;
        let merge = store.merge(&path(), observation(payload.clone()));

        assert!(merge.changed);
        assert_eq!(merge.state.last_payload, Some(payload));
    }

    #[test]
    fn signal_strength_change_is_a_change() {
        let mut store = DeviceStore::new();
        store.merge(&path(), observation(vec![5; 24]));

        let merge = store.merge(
            &path(),
            RawObservation {
                signal_strength: Some(-60),
                ..Default::default()
            },
        );

        assert!(merge.changed);
        assert_eq!(merge.state.signal_strength, Some(-60));
        assert_eq!(merge.state.last_payload, Some(vec![5; 24]));
    }

    #[test]
    fn devices_are_tracked_independently() {
        let mut store = DeviceStore::new();
        let other = DevicePath::new("hci0/dev_11_22_33_44_55_66");

        store.merge(&path(), observation(vec![5; 24]));
        let merge = store.merge(&other, observation(vec![5; 24]));

        assert!(merge.is_new_device);
        assert!(merge.changed);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn mark_published_sticks() {
        let mut store = DeviceStore::new();
        store.merge(&path(), observation(vec![5; 24]));
        store.mark_published(&path());

        let merge = store.merge(&path(), observation(vec![6; 24]));
        assert!(merge.state.ever_published);
        assert!(store.get(&path()).unwrap().ever_published);

        // Unknown paths are ignored
        store.mark_published(&DevicePath::new("hci0/dev_00"));
        assert_eq!(store.len(), 1);
    }
}
