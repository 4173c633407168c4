/// Bluetooth Low Energy scanning for RuuviTag advertisements
use bluer::{
    Adapter, AdapterEvent, Address, Device, DeviceEvent, DeviceProperty, DiscoveryFilter,
    DiscoveryTransport,
};
use futures_util::{pin_mut, StreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use tokio::sync::mpsc::Sender;
use tokio::task::{JoinHandle, JoinSet};

use crate::models::{DevicePath, RawObservation, RUUVITAG_MANUFACTURER_ID};

const RUUVITAG_NAME_PREFIX: &str = "Ruuvi";

/// An observation tagged with the device it belongs to
pub type ScanEvent = (DevicePath, RawObservation);

/// Decide at first contact whether a device is a RuuviTag worth tracking
///
/// Both the advertised name prefix and a manufacturer-data entry under the
/// Ruuvi manufacturer ID are required.
pub fn is_ruuvitag(name: Option<&str>, manufacturer_data: Option<&HashMap<u16, Vec<u8>>>) -> bool {
    name.is_some_and(|n| n.starts_with(RUUVITAG_NAME_PREFIX))
        && manufacturer_data.is_some_and(|md| md.contains_key(&RUUVITAG_MANUFACTURER_ID))
}

/// Slot identifier in the BlueZ object path style, e.g. `hci0/dev_AA_BB_CC_DD_EE_FF`
pub fn device_path(adapter_name: &str, address: Address) -> DevicePath {
    DevicePath::new(format!(
        "{}/dev_{}",
        adapter_name,
        address.to_string().replace(':', "_")
    ))
}

/// Turn a changed device property into an observation, if it is one we track
pub fn observation_from_property(property: DeviceProperty) -> Option<RawObservation> {
    let observation = match property {
        DeviceProperty::Name(name) => RawObservation {
            name: Some(name),
            ..Default::default()
        },
        DeviceProperty::RemoteAddress(address) => RawObservation {
            address: Some(address.to_string()),
            ..Default::default()
        },
        DeviceProperty::Rssi(rssi) => RawObservation {
            signal_strength: Some(rssi),
            ..Default::default()
        },
        DeviceProperty::ManufacturerData(data) => {
            RawObservation::default().with_manufacturer_data(&data)
        }
        _ => return None,
    };

    (!observation.is_empty()).then_some(observation)
}

/// Scan for RuuviTags on every Bluetooth adapter until the receiver closes
///
/// Each adapter runs its own discovery, and every relevant device gets its own
/// watcher task; all of them feed the same channel so the consumer sees a
/// single ordered stream.
///
/// # Arguments
/// * `tx` - Channel receiving `(path, observation)` pairs
///
/// # Returns
/// Ok when discovery ends on all adapters or the receiver is dropped, or the
/// Bluetooth error that prevented scanning
pub async fn scan_for_ruuvitags(tx: Sender<ScanEvent>) -> bluer::Result<()> {
    let session = bluer::Session::new().await?;
    let adapter_names = session.adapter_names().await?;
    if adapter_names.is_empty() {
        // Surfaces the "no adapter" error from BlueZ
        session.default_adapter().await?;
    }

    let mut scans = JoinSet::new();
    for name in adapter_names {
        let adapter = session.adapter(&name)?;
        let tx = tx.clone();
        scans.spawn(async move { (name, scan_adapter(adapter, tx).await) });
    }
    drop(tx);

    while let Some(result) = scans.join_next().await {
        match result {
            Ok((_, Ok(()))) => {}
            Ok((name, Err(e))) => warn!("Bluetooth scan failed on {}: {}", name, e),
            Err(e) => warn!("Bluetooth scan task failed: {}", e),
        }
    }

    Ok(())
}

async fn scan_adapter(adapter: Adapter, tx: Sender<ScanEvent>) -> bluer::Result<()> {
    adapter.set_powered(true).await?;

    // Low Energy devices only
    let filter = DiscoveryFilter {
        transport: DiscoveryTransport::Le,
        duplicate_data: false,
        ..Default::default()
    };
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    info!("Scanning for RuuviTags on {}", adapter.name());
    let events = adapter.discover_devices().await?;
    pin_mut!(events);

    let mut watchers: HashMap<Address, JoinHandle<()>> = HashMap::new();

    while let Some(event) = events.next().await {
        match event {
            AdapterEvent::DeviceAdded(addr) => {
                if watchers.get(&addr).is_some_and(|w| !w.is_finished()) {
                    continue;
                }
                if let Some(handle) = start_watching(&adapter, addr, &tx).await {
                    watchers.insert(addr, handle);
                }
            }
            AdapterEvent::DeviceRemoved(addr) => {
                if let Some(handle) = watchers.remove(&addr) {
                    debug!("Device {} removed, stopped watching", addr);
                    handle.abort();
                }
            }
            _ => {}
        }

        if tx.is_closed() {
            break;
        }
    }

    for handle in watchers.into_values() {
        handle.abort();
    }

    Ok(())
}

/// Forward the first observation of a RuuviTag and spawn a watcher for its changes
async fn start_watching(
    adapter: &Adapter,
    addr: Address,
    tx: &Sender<ScanEvent>,
) -> Option<JoinHandle<()>> {
    let device = match adapter.device(addr) {
        Ok(device) => device,
        Err(e) => {
            debug!("Failed to access device {}: {}", addr, e);
            return None;
        }
    };

    let observation = match first_contact(&device).await {
        Ok(Some(observation)) => observation,
        Ok(None) => {
            debug!("Ignoring non-RuuviTag device {}", addr);
            return None;
        }
        Err(e) => {
            debug!("Failed to read properties of {}: {}", addr, e);
            return None;
        }
    };

    let path = device_path(adapter.name(), addr);
    info!("Found RuuviTag {} at {}", addr, path);
    if tx.send((path.clone(), observation)).await.is_err() {
        return None;
    }

    Some(tokio::spawn(watch_device(device, path, tx.clone())))
}

/// Read the current properties of a device, or None if it is not a RuuviTag
async fn first_contact(device: &Device) -> bluer::Result<Option<RawObservation>> {
    let name = device.name().await?;
    let manufacturer_data = device.manufacturer_data().await?;
    if !is_ruuvitag(name.as_deref(), manufacturer_data.as_ref()) {
        return Ok(None);
    }

    let observation = RawObservation {
        name,
        address: Some(device.address().to_string()),
        signal_strength: device.rssi().await?,
        manufacturer_payload: None,
    };

    Ok(Some(match manufacturer_data {
        Some(data) => observation.with_manufacturer_data(&data),
        None => observation,
    }))
}

async fn watch_device(device: Device, path: DevicePath, tx: Sender<ScanEvent>) {
    let events = match device.events().await {
        Ok(events) => events,
        Err(e) => {
            warn!("Failed to watch {}: {}", path, e);
            return;
        }
    };
    pin_mut!(events);

    while let Some(event) = events.next().await {
        #[allow(irrefutable_let_patterns)]
        let DeviceEvent::PropertyChanged(property) = event else {
            continue;
        };
        if let Some(observation) = observation_from_property(property) {
            if tx.send((path.clone(), observation)).await.is_err() {
                break;
            }
        }
    }
}
