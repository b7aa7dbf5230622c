//! One `lkrsend` invocation, from settings to a pushed image.

use log::info;

use crate::boot_protocol::{self as bp, Transfer};
use crate::error::Error;
use crate::image::ImagePayload;
use crate::monitor::Monitor;
use crate::transport::{open_and_setup_port, SerialTransport};
use crate::Settings;

/// Load the image, open the serial port and push the image through it.
///
/// The image is read completely before the port is opened, so an unreadable
/// image never touches the device.
pub fn run(settings: &Settings, monitor: &mut dyn Monitor) -> Result<Transfer, Error> {
    let payload = load_image(settings)?;
    push(settings, &payload, monitor)
}

/// Read the image named in `settings`.
pub fn load_image(settings: &Settings) -> Result<ImagePayload, Error> {
    let path = settings.kernel_image.as_deref().ok_or(Error::MissingImage)?;
    let payload = ImagePayload::load(path)?;
    info!("{} size = {}", path, payload.len());
    Ok(payload)
}

/// Open the serial port and push an already loaded image through it.
pub fn push(
    settings: &Settings,
    payload: &ImagePayload,
    monitor: &mut dyn Monitor,
) -> Result<Transfer, Error> {
    let port = open_and_setup_port(settings)?;
    let mut transport = SerialTransport::new(port);

    bp::factory(settings).run_transfer(&mut transport, payload, monitor)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::RecordingMonitor;
    use crate::SettingsBuilder;

    #[test]
    fn missing_image_is_rejected_before_io() {
        let settings = SettingsBuilder::new().path("/dev/does-not-exist").finalize();
        let result = run(&settings, &mut RecordingMonitor::default());
        assert!(matches!(result, Err(Error::MissingImage)));
    }

    #[test]
    fn unreadable_image_is_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("missing.img");
        let settings = SettingsBuilder::new()
            .path("/dev/does-not-exist")
            .kernel_image(image.to_str().unwrap())
            .finalize();

        let result = run(&settings, &mut RecordingMonitor::default());
        assert!(matches!(result, Err(Error::Image { .. })));
    }
}
