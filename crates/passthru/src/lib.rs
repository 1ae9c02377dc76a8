//! SAE J2534 Pass-Thru driver binding.
//!
//! Loads a vendor-supplied Pass-Thru library at runtime, resolves the
//! standard entry points once, and exposes one safe, typed operation per
//! entry point. Wire structures mirror the standard's layouts exactly;
//! every non-success status code is classified into [`Status`] and
//! surfaced as a [`PassThruError`].
//!
//! ```no_run
//! use passthru::{ConnectFlags, PassThruDriver, ProtocolId};
//!
//! # fn main() -> passthru::Result<()> {
//! let driver = PassThruDriver::load("C:\\WINDOWS\\system32\\op20pt32.dll")?;
//! let device = driver.open()?;
//! let channel = driver.connect(device, ProtocolId::ISO15765, ConnectFlags::empty(), 500_000)?;
//! for msg in driver.read_messages(channel, 16, None)? {
//!     println!("{:02X?}", msg.data());
//! }
//! driver.disconnect(channel)?;
//! driver.close(device)?;
//! # Ok(())
//! # }
//! ```

mod driver;
mod error;
mod ffi;
mod ioctl;
mod message;
mod protocol;

#[cfg(windows)]
pub mod discovery;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use driver::{
    ChannelId, DeviceId, FilterId, PassThruDriver, PeriodicMsgId, VersionInfo,
};
pub use error::{PassThruError, Result, Status, StatusError};
pub use ioctl::{
    partition_config_params, ConfigParam, DataBits, FiveBaudMod, IoctlId, NetworkLine, Parity,
};
pub use message::{PassThruMsg, SByteArray, SConfig, SConfigList, MAX_MSG_DATA};
pub use protocol::{
    is_settable_voltage, ConnectFlags, FilterType, ProgrammingPin, ProtocolId, RxStatus, TxFlags,
    MAX_PROGRAMMING_VOLTAGE_MV, MIN_PROGRAMMING_VOLTAGE_MV, SHORT_TO_GROUND, VOLTAGE_OFF,
};
