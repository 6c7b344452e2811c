//! Output device enumeration.

use serde::{Deserialize, Serialize};

/// Metadata about an audio output device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default output device.
    pub is_default: bool,
    /// Default output rate, when the device reports one.
    pub sample_rate: Option<u32>,
    /// Default output channel count, when the device reports one.
    pub channels: Option<u16>,
}

/// Default device first, then alphabetical.
pub fn order_devices(list: &mut [DeviceInfo]) {
    list.sort_by_key(|d| (!d.is_default, d.name.to_ascii_lowercase()));
}

/// List all available audio output devices on the system.
///
/// Returns an empty `Vec` if cpal is not available or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    match host.output_devices() {
        Ok(devices) => {
            let mut list = devices
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Output Device {}", idx + 1));
                    let config = device.default_output_config().ok();
                    DeviceInfo {
                        is_default: default_name.as_deref() == Some(name.as_str()),
                        sample_rate: config.as_ref().map(|c| c.sample_rate().0),
                        channels: config.as_ref().map(|c| c.channels()),
                        name,
                    }
                })
                .collect::<Vec<_>>();
            order_devices(&mut list);
            list
        }
        Err(e) => {
            tracing::warn!("failed to enumerate output devices: {e}");
            host.default_output_device()
                .map(|default| {
                    let config = default.default_output_config().ok();
                    DeviceInfo {
                        name: default
                            .name()
                            .unwrap_or_else(|_| "Default Output Device".to_string()),
                        is_default: true,
                        sample_rate: config.as_ref().map(|c| c.sample_rate().0),
                        channels: config.as_ref().map(|c| c.channels()),
                    }
                })
                .into_iter()
                .collect()
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    vec![]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, is_default: bool) -> DeviceInfo {
        DeviceInfo {
            name: name.into(),
            is_default,
            sample_rate: Some(48_000),
            channels: Some(2),
        }
    }

    #[test]
    fn default_device_sorts_first() {
        let mut list = vec![
            device("USB Interface", false),
            device("speakers", false),
            device("Built-in Output", true),
        ];
        order_devices(&mut list);
        let names: Vec<_> = list.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Built-in Output", "speakers", "USB Interface"]);
    }

    #[test]
    fn device_info_serializes_camel_case() {
        let json = serde_json::to_value(device("Out", true)).expect("serialize device");
        assert_eq!(json["isDefault"], true);
        assert_eq!(json["sampleRate"], 48_000);
    }
}
