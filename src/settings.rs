//! Settings for the serial link and the image transfer.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::time::Duration;

pub use serialport::{DataBits, FlowControl, Parity, StopBits};

// =============================================================================
// Public Interface
// =============================================================================

/// Serial port used when none is given on the command line.
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM36";
/// Serial port used when none is given on the command line.
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Baud rate the bootloader configures its mini UART with.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// How long a single line read may block before it is considered empty.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Time given to the device to restart and re-arm its bootloader listener
/// after a `reboot` command.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Groups all settings of one `lkrsend` invocation: the serial port, its line
/// discipline, the protocol timings and the image to push.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The port name, usually the device path.
    pub path: String,
    /// The baud rate in symbols-per-second.
    pub baud_rate: u32,
    /// Number of bits used to represent a character sent on the line.
    pub data_bits: DataBits,
    /// The type of signalling to use for controlling data transfer.
    pub flow_control: FlowControl,
    /// The type of parity to use for error checking.
    pub parity: Parity,
    /// Number of bits to use to signal the end of a character.
    pub stop_bits: StopBits,

    /// Upper bound on a single line read. A read that sees no data within
    /// this time ends the current response scan.
    pub read_timeout: Duration,
    /// Unconditional wait after the `reboot` command, before the handshake
    /// is retried.
    pub settle_delay: Duration,

    /// Path to the kernel image to be pushed. There is no fallback: a
    /// transfer without an image is rejected before the port is opened.
    pub kernel_image: Option<String>,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set.
///
/// **Example**
///
/// ```
/// use lkrsend::SettingsBuilder;
///
/// let settings = SettingsBuilder::new()
///     .path("/dev/ttyUSB1")
///     .kernel_image("kernel8.img")
///     .finalize();
/// assert_eq!(settings.baud_rate, 115_200);
/// ```
#[derive(Debug)]
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using default values and no image.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                path: DEFAULT_PORT.into(),
                baud_rate: DEFAULT_BAUD_RATE,
                data_bits: DataBits::Eight,
                flow_control: FlowControl::None,
                parity: Parity::None,
                stop_bits: StopBits::One,
                read_timeout: DEFAULT_READ_TIMEOUT,
                settle_delay: DEFAULT_SETTLE_DELAY,
                kernel_image: None,
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the serial port
    pub fn path<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.path = path.into().into_owned();
        self
    }

    /// Set the baud rate in symbols-per-second
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the number of bits used to represent a character sent on the line
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.settings.data_bits = data_bits;
        self
    }

    /// Set the type of signalling to use for controlling data transfer
    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.settings.flow_control = flow_control;
        self
    }

    /// Set the type of parity to use for error checking
    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    /// Set the number of bits to use to signal the end of a character
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.settings.stop_bits = stop_bits;
        self
    }

    /// Set the per-line read timeout
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.settings.read_timeout = read_timeout;
        self
    }

    /// Set the wait after a `reboot` command
    pub fn settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settings.settle_delay = settle_delay;
        self
    }

    /// Set the path to the kernel image
    pub fn kernel_image<'a>(mut self, kernel_image: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.kernel_image = Some(kernel_image.into().into_owned());
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}
impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            path: DEFAULT_PORT.into(),
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Duration::from_secs(3),
            settle_delay: DEFAULT_SETTLE_DELAY,
            kernel_image: None,
            _private_use_builder: (),
        }
    )
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
    assert_eq!(settings.path, "/dev/ttyUSB0");
}

#[test]
fn baud_rate() {
    let baud_rate = 230_400;
    let settings = SettingsBuilder::new().baud_rate(baud_rate).finalize();
    assert_eq!(settings.baud_rate, baud_rate);
}

#[test]
fn data_bits() {
    let data_bits = DataBits::Seven;
    let settings = SettingsBuilder::new().data_bits(data_bits).finalize();
    assert_eq!(settings.data_bits, data_bits);
}

#[test]
fn flow_control() {
    let flow_control = FlowControl::Hardware;
    let settings = SettingsBuilder::new().flow_control(flow_control).finalize();
    assert_eq!(settings.flow_control, flow_control);
}

#[test]
fn stop_bits() {
    let stop_bits = StopBits::Two;
    let settings = SettingsBuilder::new().stop_bits(stop_bits).finalize();
    assert_eq!(settings.stop_bits, stop_bits);
}

#[test]
fn parity() {
    let parity = Parity::Even;
    let settings = SettingsBuilder::new().parity(parity).finalize();
    assert_eq!(settings.parity, parity);
}

#[test]
fn read_timeout() {
    let timeout = Duration::from_millis(500);
    let settings = SettingsBuilder::new().read_timeout(timeout).finalize();
    assert_eq!(settings.read_timeout, timeout);
}

#[test]
fn settle_delay() {
    let delay = Duration::from_secs(10);
    let settings = SettingsBuilder::new().settle_delay(delay).finalize();
    assert_eq!(settings.settle_delay, delay);
}

#[test]
fn kernel_image() {
    let settings = SettingsBuilder::new()
        .kernel_image("build/kernel8.img")
        .finalize();
    assert_eq!(settings.kernel_image.unwrap(), "build/kernel8.img");
}
