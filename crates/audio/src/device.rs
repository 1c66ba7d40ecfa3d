use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no default {0} device")]
    NoDefault(&'static str),
    #[error("no {kind} device named '{name}'")]
    NotFound { kind: &'static str, name: String },
    #[error("failed to enumerate devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),
    #[error("failed to read device name: {0}")]
    Name(#[from] cpal::DeviceNameError),
}

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the input device named `device_name`, or the host's default input.
pub fn get_or_default_input(device_name: Option<&str>) -> Result<Device, DeviceError> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    match device_name {
        None => host.default_input_device().ok_or(DeviceError::NoDefault("input")),
        Some(target) => {
            for device in host.input_devices()? {
                if device.name().is_ok_and(|name| name == target) {
                    return Ok(device);
                }
            }
            Err(DeviceError::NotFound {
                kind: "input",
                name: target.to_string(),
            })
        }
    }
}

/// Finds the output device named `device_name`, or the host's default output.
pub fn get_or_default_output(device_name: Option<&str>) -> Result<Device, DeviceError> {
    let host = get_host();
    match device_name {
        None => host.default_output_device().ok_or(DeviceError::NoDefault("output")),
        Some(target) => {
            for device in host.output_devices()? {
                if device.name().is_ok_and(|name| name == target) {
                    return Ok(device);
                }
            }
            Err(DeviceError::NotFound {
                kind: "output",
                name: target.to_string(),
            })
        }
    }
}

/// One line per input device: name, channel count and default rate.
pub fn describe_inputs() -> Result<String, DeviceError> {
    let host = get_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let mut lines = Vec::new();
    for device in host.input_devices()? {
        let name = device.name()?;
        let mut line = match device.default_input_config() {
            Ok(cfg) => format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0),
            Err(_) => format!(" * {}(no default config)", name),
        };
        if default_name.as_deref() == Some(name.as_str()) {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// One line per output device: name, channel count and default rate.
pub fn describe_outputs() -> Result<String, DeviceError> {
    let host = get_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let mut lines = Vec::new();
    for device in host.output_devices()? {
        let name = device.name()?;
        let mut line = match device.default_output_config() {
            Ok(cfg) => format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0),
            Err(_) => format!(" * {}(no default config)", name),
        };
        if default_name.as_deref() == Some(name.as_str()) {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
