use anyhow::{Context, anyhow};
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the input device called `device_name`, or the host's default input
/// device when no name is given.
pub fn get_or_default_input(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_input_device()
            .ok_or_else(|| anyhow!("No default input device"));
    };

    let input_devices = host
        .input_devices()
        .context("Failed to enumerate input devices")?;
    for in_device in input_devices {
        if in_device.name().is_ok_and(|name| name == target) {
            return Ok(in_device);
        }
    }
    Err(anyhow!("No input device named {:?}", target))
}

/// One line per input device with its default channel count and rate.
pub fn get_available_inputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host
        .default_input_device()
        .and_then(|device| device.name().ok());

    let mut device_names: Vec<String> = Vec::new();
    let input_devices = host
        .input_devices()
        .context("Failed to enumerate input devices")?;
    for in_device in input_devices {
        let Ok(d_name) = in_device.name() else {
            continue;
        };
        let d_cfg = match in_device.default_input_config() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", d_name, e);
                continue;
            }
        };

        let mut d = format!(
            " * {}({}ch, {}hz)",
            d_name,
            d_cfg.channels(),
            d_cfg.sample_rate().0
        );
        if default_device.as_deref() == Some(d_name.as_str()) {
            d.push_str(" [default]");
        }
        device_names.push(d);
    }
    Ok(device_names.join("\n"))
}
