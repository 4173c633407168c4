use std::env;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub mqtt_url: String,
    pub mqtt_client_id: String,
    pub pressure_offset: f64,
}

impl BridgeConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let mqtt_url = env::var("MQTT_URL").map_err(|_| "MQTT_URL environment variable not set")?;
        let pressure_offset = parse_pressure_offset(env::var("PRESSURE_OFFSET").ok().as_deref())?;
        let mqtt_client_id = env::var("MQTT_CLIENT_ID")
            .ok()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("ruuvi-mqtt-{}", std::process::id()));

        Ok(BridgeConfig {
            mqtt_url,
            mqtt_client_id,
            pressure_offset,
        })
    }
}

/// Parse the pressure calibration offset in hPa; unset or blank means 0.0
fn parse_pressure_offset(value: Option<&str>) -> Result<f64, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|offset| offset.is_finite())
            .ok_or_else(|| format!("Invalid PRESSURE_OFFSET '{}': expected a decimal number", raw)),
    }
}
