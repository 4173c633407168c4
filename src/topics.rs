/// MQTT topic names and payloads for state, availability and discovery
use serde::Serialize;

use crate::models::{DeviceIdentity, Measurement, DEVICE_NAMESPACE};

pub const DISCOVERY_NAMESPACE: &str = "homeassistant";
pub const PLATFORM_KIND: &str = "sensor";
pub const PAYLOAD_AVAILABLE: &str = "online";
pub const PAYLOAD_NOT_AVAILABLE: &str = "offline";
pub const EXPIRE_AFTER_SECS: u32 = 300; // Consumers mark the sensor stale after this
const STATE_CLASS: &str = "measurement";
const MANUFACTURER: &str = "Ruuvi Innovations";
const MODEL: &str = "RuuviTag";

/// A message ready to hand to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub retained: bool,
}

/// Sensor channels announced through discovery, one per state payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Temperature,
    Humidity,
    Pressure,
    AccelerationX,
    AccelerationY,
    AccelerationZ,
    Voltage,
    TxPower,
    MovementCounter,
    SequenceNumber,
    SignalStrength,
}

impl Channel {
    pub const ALL: [Channel; 11] = [
        Channel::Temperature,
        Channel::Humidity,
        Channel::Pressure,
        Channel::AccelerationX,
        Channel::AccelerationY,
        Channel::AccelerationZ,
        Channel::Voltage,
        Channel::TxPower,
        Channel::MovementCounter,
        Channel::SequenceNumber,
        Channel::SignalStrength,
    ];

    /// Field name in the state payload
    pub fn key(self) -> &'static str {
        match self {
            Channel::Temperature => "temp",
            Channel::Humidity => "hum",
            Channel::Pressure => "press",
            Channel::AccelerationX => "ax",
            Channel::AccelerationY => "ay",
            Channel::AccelerationZ => "az",
            Channel::Voltage => "voltage",
            Channel::TxPower => "tx",
            Channel::MovementCounter => "move",
            Channel::SequenceNumber => "seq",
            Channel::SignalStrength => "rssi",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Pressure => "pressure",
            Channel::AccelerationX => "acceleration x",
            Channel::AccelerationY => "acceleration y",
            Channel::AccelerationZ => "acceleration z",
            Channel::Voltage => "voltage",
            Channel::TxPower => "tx power",
            Channel::MovementCounter => "move counter",
            Channel::SequenceNumber => "sequence",
            Channel::SignalStrength => "rssi",
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Channel::Temperature => "°C",
            Channel::Humidity => "%",
            Channel::Pressure => "hPa",
            Channel::AccelerationX | Channel::AccelerationY | Channel::AccelerationZ => "g",
            Channel::Voltage => "V",
            Channel::TxPower | Channel::SignalStrength => "dBm",
            Channel::MovementCounter | Channel::SequenceNumber => "",
        }
    }

    fn device_class(self) -> Option<&'static str> {
        match self {
            Channel::Temperature => Some("temperature"),
            Channel::Humidity => Some("humidity"),
            Channel::Pressure => Some("pressure"),
            Channel::Voltage => Some("voltage"),
            Channel::SignalStrength => Some("signal_strength"),
            _ => None,
        }
    }
}

// Abbreviated keys as accepted by Home Assistant MQTT discovery
#[derive(Debug, Serialize)]
struct DiscoveryConfig<'a> {
    name: String,
    stat_t: &'a str,
    avty_t: &'a str,
    pl_avail: &'static str,
    pl_not_avail: &'static str,
    unit_of_meas: &'static str,
    val_tpl: String,
    uniq_id: &'a str,
    obj_id: &'a str,
    exp_aft: u32,
    stat_cla: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dev_cla: Option<&'static str>,
    dev: &'a DeviceDescriptor<'a>,
}

#[derive(Debug, Serialize)]
struct DeviceDescriptor<'a> {
    ids: [&'a str; 1],
    name: &'a str,
    manufacturer: &'static str,
    model: &'static str,
}

pub fn state_topic(id: &DeviceIdentity) -> String {
    format!("{}/{}/stat", DEVICE_NAMESPACE, id)
}

pub fn availability_topic(id: &DeviceIdentity) -> String {
    format!("{}/{}/avty", DEVICE_NAMESPACE, id)
}

pub fn discovery_topic(id: &DeviceIdentity, channel: Channel) -> String {
    format!(
        "{}/{}/{}_{}/config",
        DISCOVERY_NAMESPACE,
        PLATFORM_KIND,
        id,
        channel.key()
    )
}

pub fn state_message(
    id: &DeviceIdentity,
    measurement: &Measurement,
) -> Result<Message, serde_json::Error> {
    Ok(Message {
        topic: state_topic(id),
        payload: serde_json::to_string(measurement)?,
        retained: true,
    })
}

pub fn availability_message(id: &DeviceIdentity) -> Message {
    Message {
        topic: availability_topic(id),
        payload: PAYLOAD_AVAILABLE.to_string(),
        retained: true,
    }
}

/// Build the retained discovery config for every channel of one device
///
/// # Arguments
/// * `id` - Identity of the device
/// * `device_name` - Display name, also used as prefix of each sensor name
///
/// # Returns
/// One message per entry of [`Channel::ALL`], in that order
pub fn discovery_messages(
    id: &DeviceIdentity,
    device_name: &str,
) -> Result<Vec<Message>, serde_json::Error> {
    let state_topic = state_topic(id);
    let availability_topic = availability_topic(id);
    let device = DeviceDescriptor {
        ids: [id.as_str()],
        name: device_name,
        manufacturer: MANUFACTURER,
        model: MODEL,
    };

    Channel::ALL
        .iter()
        .map(|&channel| -> Result<Message, serde_json::Error> {
            let object_id = format!("{}_{}", id, channel.key());
            let config = DiscoveryConfig {
                name: format!("{} {}", device_name, channel.label()),
                stat_t: &state_topic,
                avty_t: &availability_topic,
                pl_avail: PAYLOAD_AVAILABLE,
                pl_not_avail: PAYLOAD_NOT_AVAILABLE,
                unit_of_meas: channel.unit(),
                val_tpl: format!("{{{{ value_json.{} }}}}", channel.key()),
                uniq_id: &object_id,
                obj_id: &object_id,
                exp_aft: EXPIRE_AFTER_SECS,
                stat_cla: STATE_CLASS,
                dev_cla: channel.device_class(),
                dev: &device,
            };

            Ok(Message {
                topic: discovery_topic(id, channel),
                payload: serde_json::to_string(&config)?,
                retained: true,
            })
        })
        .collect()
}
