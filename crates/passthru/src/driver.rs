//! Safe operations over a loaded Pass-Thru library.
//!
//! One method per native entry point, plus the conveniences layered over
//! the generic ioctl. Every buffer handed to the native layer is
//! allocated in the calling method's scope immediately before the call
//! and read back only after it returns; the native library may write
//! through the pointers during the call but must not retain them.

use std::collections::BTreeMap;
use std::path::Path;
use std::ptr;

use libc::{c_char, c_void};
use libloading::Library;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{check_status, PassThruError, Result, Status};
use crate::ffi::ApiTable;
use crate::ioctl::{partition_config_params, ConfigParam, IoctlId};
use crate::message::{PassThruMsg, SByteArray, SConfig, SConfigList};
use crate::protocol::{is_settable_voltage, ConnectFlags, FilterType, ProgrammingPin, ProtocolId};

/// Size of the text buffers used by ReadVersion and GetLastError.
const TEXT_BUFFER_LEN: usize = 80;

/// Handle to an open Pass-Thru device.
///
/// Handles are opaque: the native driver owns the underlying resource
/// and the binding performs no lifecycle tracking of its own. Using a
/// stale handle is reported by the driver as a status failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(u32);

/// Handle to a connected protocol channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u32);

/// Handle to an installed message filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(u32);

/// Handle to a running periodic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeriodicMsgId(u32);

impl DeviceId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl ChannelId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl FilterId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl PeriodicMsgId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Version strings reported by ReadVersion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Device firmware version.
    pub firmware: String,
    /// Vendor library version.
    pub library: String,
    /// J2534 API version the library implements.
    pub api: String,
}

/// A loaded Pass-Thru library with its entry points resolved.
///
/// Every operation is a single blocking call into the vendor library;
/// the binding adds no threading or queueing of its own. The resolved
/// table is immutable after load, so a driver can be shared across
/// threads for invocation. Serializing access per device or channel is
/// the application's job, mirroring the native contract.
pub struct PassThruDriver {
    api: ApiTable,
    // Keeps the resolved symbols valid; `None` only for the mock table.
    _library: Option<Library>,
}

impl PassThruDriver {
    /// Load the vendor library at `path` and resolve every entry point.
    ///
    /// Fails with [`PassThruError::LibraryLoad`] if the library cannot
    /// be loaded or lacks one of the standard symbols.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PassThruDriver> {
        let path = path.as_ref();
        // Safety: loading a vendor library executes its initialization
        // routines; there is no way around that for a runtime-selected
        // driver.
        let library = unsafe { Library::new(path) }?;
        let api = ApiTable::resolve(&library)?;
        info!("loaded Pass-Thru library from {}", path.display());
        Ok(PassThruDriver {
            api,
            _library: Some(library),
        })
    }

    /// Driver backed by the in-process fake library. State is reset on
    /// every call.
    #[cfg(any(test, feature = "mock"))]
    pub fn mock() -> PassThruDriver {
        crate::mock::reset();
        PassThruDriver {
            api: crate::mock::table(),
            _library: None,
        }
    }

    /// Open the Pass-Thru device.
    ///
    /// The standard's open-by-name capability is unused; a null name
    /// selects the single attached device.
    pub fn open(&self) -> Result<DeviceId> {
        let mut device_id = 0u32;
        check_status(unsafe { (self.api.open)(ptr::null(), &mut device_id) })?;
        debug!("opened Pass-Thru device {device_id}");
        Ok(DeviceId(device_id))
    }

    /// Close a previously opened device.
    pub fn close(&self, device: DeviceId) -> Result<()> {
        check_status(unsafe { (self.api.close)(device.0) })?;
        debug!("closed Pass-Thru device {}", device.0);
        Ok(())
    }

    /// Connect a protocol channel on an open device.
    ///
    /// The baud rate is forwarded as supplied; a rate the interface
    /// cannot achieve comes back as `ERR_INVALID_BAUDRATE`.
    pub fn connect(
        &self,
        device: DeviceId,
        protocol: ProtocolId,
        flags: ConnectFlags,
        baud_rate: u32,
    ) -> Result<ChannelId> {
        let mut channel_id = 0u32;
        check_status(unsafe {
            (self.api.connect)(device.0, protocol.0, flags.bits(), baud_rate, &mut channel_id)
        })?;
        debug!(
            "connected channel {channel_id} on device {} (protocol 0x{:X}, {baud_rate} baud)",
            device.0, protocol.0
        );
        Ok(ChannelId(channel_id))
    }

    /// Disconnect a channel.
    pub fn disconnect(&self, channel: ChannelId) -> Result<()> {
        check_status(unsafe { (self.api.disconnect)(channel.0) })?;
        debug!("disconnected channel {}", channel.0);
        Ok(())
    }

    /// Read up to `count` messages from a channel, in receipt order.
    ///
    /// With `timeout_ms` of `None` the call does not block: whatever the
    /// receive buffer holds (possibly nothing) is returned immediately,
    /// and the driver's empty-buffer status is an empty result, not an
    /// error. With a timeout the call waits up to that many milliseconds
    /// for `count` messages and a lapse is surfaced as `ERR_TIMEOUT`,
    /// since the caller explicitly asked to wait.
    pub fn read_messages(
        &self,
        channel: ChannelId,
        count: usize,
        timeout_ms: Option<u32>,
    ) -> Result<Vec<PassThruMsg>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut msgs = vec![PassThruMsg::default(); count];
        let mut num_msgs = count as u32;
        let code = unsafe {
            (self.api.read_msgs)(
                channel.0,
                msgs.as_mut_ptr(),
                &mut num_msgs,
                timeout_ms.unwrap_or(0),
            )
        };
        if timeout_ms.is_none() && Status::classify(code as u32) == Status::BufferEmpty {
            return Ok(Vec::new());
        }
        check_status(code)?;
        msgs.truncate(num_msgs as usize);
        Ok(msgs)
    }

    /// Write messages to a channel in the given order.
    ///
    /// Returns how many messages were handled: queued when `timeout_ms`
    /// is `None` (the call does not block), transmitted on the network
    /// when a timeout is supplied. A lapse before all messages went out
    /// is surfaced as `ERR_TIMEOUT`.
    pub fn write_messages(
        &self,
        channel: ChannelId,
        messages: &[PassThruMsg],
        timeout_ms: Option<u32>,
    ) -> Result<u32> {
        if messages.is_empty() {
            return Ok(0);
        }
        let mut buffer = messages.to_vec();
        let mut num_msgs = buffer.len() as u32;
        check_status(unsafe {
            (self.api.write_msgs)(
                channel.0,
                buffer.as_mut_ptr(),
                &mut num_msgs,
                timeout_ms.unwrap_or(0),
            )
        })?;
        Ok(num_msgs)
    }

    /// Queue `message` for automatic retransmission every `interval_ms`
    /// milliseconds until stopped.
    ///
    /// The standard defines intervals of 5 through 65535 ms; anything
    /// else is rejected locally before the native layer sees it, since
    /// driver behavior outside that range is unspecified.
    pub fn start_periodic_message(
        &self,
        channel: ChannelId,
        message: &PassThruMsg,
        interval_ms: u32,
    ) -> Result<PeriodicMsgId> {
        if !(5..=65_535).contains(&interval_ms) {
            return Err(PassThruError::InvalidInterval(interval_ms));
        }
        let mut msg_id = 0u32;
        check_status(unsafe {
            (self.api.start_periodic_msg)(channel.0, message, &mut msg_id, interval_ms)
        })?;
        Ok(PeriodicMsgId(msg_id))
    }

    /// Stop a periodic message.
    pub fn stop_periodic_message(&self, channel: ChannelId, msg: PeriodicMsgId) -> Result<()> {
        check_status(unsafe { (self.api.stop_periodic_msg)(channel.0, msg.0) })?;
        Ok(())
    }

    /// Install a receive filter on a channel.
    ///
    /// `flow_control` is forwarded only for
    /// [`FilterType::FLOW_CONTROL_FILTER`]; pass and block filters take
    /// no flow-control message, so one supplied by mistake is dropped
    /// rather than forwarded. Conversely a missing flow-control message
    /// for a flow-control filter goes to the driver as a null pointer
    /// (the binding never substitutes a default) and comes back as
    /// `ERR_NULL_PARAMETER`.
    pub fn start_message_filter(
        &self,
        channel: ChannelId,
        filter_type: FilterType,
        mask: &PassThruMsg,
        pattern: &PassThruMsg,
        flow_control: Option<&PassThruMsg>,
    ) -> Result<FilterId> {
        let flow_ptr = if filter_type.is_flow_control() {
            flow_control.map_or(ptr::null(), |msg| msg as *const PassThruMsg)
        } else {
            ptr::null()
        };
        let mut filter_id = 0u32;
        check_status(unsafe {
            (self.api.start_msg_filter)(
                channel.0,
                filter_type.0,
                mask,
                pattern,
                flow_ptr,
                &mut filter_id,
            )
        })?;
        Ok(FilterId(filter_id))
    }

    /// Remove a message filter.
    pub fn stop_message_filter(&self, channel: ChannelId, filter: FilterId) -> Result<()> {
        check_status(unsafe { (self.api.stop_msg_filter)(channel.0, filter.0) })?;
        Ok(())
    }

    /// Apply a programming voltage to a J1962 connector pin.
    ///
    /// `voltage_mv` must be [`crate::protocol::SHORT_TO_GROUND`],
    /// [`crate::protocol::VOLTAGE_OFF`] or a value in 5000..=20000
    /// millivolts; anything else is rejected locally before the native
    /// call.
    pub fn set_programming_voltage(
        &self,
        device: DeviceId,
        pin: ProgrammingPin,
        voltage_mv: u32,
    ) -> Result<()> {
        if !is_settable_voltage(voltage_mv) {
            return Err(PassThruError::InvalidVoltage(voltage_mv));
        }
        check_status(unsafe {
            (self.api.set_programming_voltage)(device.0, pin as u32, voltage_mv)
        })?;
        Ok(())
    }

    /// Read the firmware, vendor-library and API version strings.
    pub fn read_version(&self, device: DeviceId) -> Result<VersionInfo> {
        let mut firmware = [0u8; TEXT_BUFFER_LEN];
        let mut library = [0u8; TEXT_BUFFER_LEN];
        let mut api = [0u8; TEXT_BUFFER_LEN];
        check_status(unsafe {
            (self.api.read_version)(
                device.0,
                firmware.as_mut_ptr() as *mut c_char,
                library.as_mut_ptr() as *mut c_char,
                api.as_mut_ptr() as *mut c_char,
            )
        })?;
        Ok(VersionInfo {
            firmware: text_buffer_to_string(&firmware),
            library: text_buffer_to_string(&library),
            api: text_buffer_to_string(&api),
        })
    }

    /// Fetch the driver's free-text description of its last failure.
    ///
    /// This is the one operation exempt from status-code translation:
    /// its whole purpose is to run after some other call failed, so the
    /// return code is ignored and the text delivered regardless.
    pub fn get_last_error(&self) -> String {
        let mut text = [0u8; TEXT_BUFFER_LEN];
        let _ = unsafe { (self.api.get_last_error)(text.as_mut_ptr() as *mut c_char) };
        text_buffer_to_string(&text)
    }

    /// Read channel configuration parameters.
    ///
    /// Driver-internal parameters in the request are dropped with a
    /// warning rather than forwarded; the returned map covers exactly
    /// the parameters that were actually queried, with the values the
    /// driver reported.
    pub fn get_config(
        &self,
        channel: ChannelId,
        params: &[ConfigParam],
    ) -> Result<BTreeMap<ConfigParam, u32>> {
        let (kept, dropped) = partition_config_params(params);
        for param in &dropped {
            warn!("configuration parameter {param} is driver internal, ignoring");
        }
        if kept.is_empty() {
            return Ok(BTreeMap::new());
        }
        let mut entries: Vec<SConfig> = kept
            .iter()
            .map(|param| SConfig {
                parameter: param.0,
                value: 0,
            })
            .collect();
        let mut list = SConfigList::new(&mut entries);
        self.ioctl_raw(
            channel.0,
            IoctlId::GET_CONFIG,
            &mut list as *mut SConfigList as *mut c_void,
            ptr::null_mut(),
        )?;
        Ok(entries
            .iter()
            .map(|entry| (ConfigParam(entry.parameter), entry.value))
            .collect())
    }

    /// Set channel configuration parameters.
    ///
    /// Values are forwarded as supplied, without the driver-internal
    /// filtering that [`PassThruDriver::get_config`] applies; callers
    /// are trusted to pass settable parameters only.
    pub fn set_config(&self, channel: ChannelId, values: &BTreeMap<ConfigParam, u32>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut entries: Vec<SConfig> = values
            .iter()
            .map(|(param, value)| SConfig {
                parameter: param.0,
                value: *value,
            })
            .collect();
        let mut list = SConfigList::new(&mut entries);
        self.ioctl_raw(
            channel.0,
            IoctlId::SET_CONFIG,
            &mut list as *mut SConfigList as *mut c_void,
            ptr::null_mut(),
        )
    }

    /// Read the vehicle battery voltage at pin 16, in millivolts.
    pub fn read_battery_voltage(&self, device: DeviceId) -> Result<u32> {
        self.read_voltage_ioctl(device, IoctlId::READ_VBATT)
    }

    /// Read the currently applied programming voltage, in millivolts.
    pub fn read_programming_voltage(&self, device: DeviceId) -> Result<u32> {
        self.read_voltage_ioctl(device, IoctlId::READ_PROG_VOLTAGE)
    }

    /// Run a five-baud initialization toward `address` and return the
    /// two key bytes the ECU answered with.
    pub fn five_baud_init(&self, channel: ChannelId, address: u8) -> Result<[u8; 2]> {
        let mut request = [address];
        let mut input = SByteArray::new(&mut request);
        // Seeded with the sentinel so an unfilled response is visible.
        let mut keywords = [0xFFu8, 0xFF];
        let mut output = SByteArray::new(&mut keywords);
        self.ioctl_raw(
            channel.0,
            IoctlId::FIVE_BAUD_INIT,
            &mut input as *mut SByteArray as *mut c_void,
            &mut output as *mut SByteArray as *mut c_void,
        )?;
        Ok(keywords)
    }

    /// Run a fast initialization, optionally transmitting `message`,
    /// and return the ECU's response message.
    pub fn fast_init(
        &self,
        channel: ChannelId,
        message: Option<&PassThruMsg>,
    ) -> Result<PassThruMsg> {
        let mut request = message.copied().unwrap_or_default();
        let mut response = PassThruMsg::default();
        self.ioctl_raw(
            channel.0,
            IoctlId::FAST_INIT,
            &mut request as *mut PassThruMsg as *mut c_void,
            &mut response as *mut PassThruMsg as *mut c_void,
        )?;
        Ok(response)
    }

    /// Discard all messages queued for transmission.
    pub fn clear_tx_buffer(&self, channel: ChannelId) -> Result<()> {
        self.clear_ioctl(channel, IoctlId::CLEAR_TX_BUFFER)
    }

    /// Discard all received messages not yet read.
    pub fn clear_rx_buffer(&self, channel: ChannelId) -> Result<()> {
        self.clear_ioctl(channel, IoctlId::CLEAR_RX_BUFFER)
    }

    /// Stop and remove every periodic message on the channel.
    pub fn clear_periodic_messages(&self, channel: ChannelId) -> Result<()> {
        self.clear_ioctl(channel, IoctlId::CLEAR_PERIODIC_MSGS)
    }

    /// Remove every message filter on the channel.
    pub fn clear_message_filters(&self, channel: ChannelId) -> Result<()> {
        self.clear_ioctl(channel, IoctlId::CLEAR_MSG_FILTERS)
    }

    /// Empty the functional-address lookup table.
    pub fn clear_functional_lookup_table(&self, channel: ChannelId) -> Result<()> {
        self.clear_ioctl(channel, IoctlId::CLEAR_FUNCT_MSG_LOOKUP_TABLE)
    }

    /// Add functional addresses to the lookup table.
    pub fn add_to_functional_lookup_table(
        &self,
        channel: ChannelId,
        addresses: &[u8],
    ) -> Result<()> {
        self.lookup_table_ioctl(channel, IoctlId::ADD_TO_FUNCT_MSG_LOOKUP_TABLE, addresses)
    }

    /// Remove functional addresses from the lookup table.
    pub fn delete_from_functional_lookup_table(
        &self,
        channel: ChannelId,
        addresses: &[u8],
    ) -> Result<()> {
        self.lookup_table_ioctl(
            channel,
            IoctlId::DELETE_FROM_FUNCT_MSG_LOOKUP_TABLE,
            addresses,
        )
    }

    fn read_voltage_ioctl(&self, device: DeviceId, ioctl_id: IoctlId) -> Result<u32> {
        let mut millivolts = 0u32;
        self.ioctl_raw(
            device.0,
            ioctl_id,
            ptr::null_mut(),
            &mut millivolts as *mut u32 as *mut c_void,
        )?;
        Ok(millivolts)
    }

    fn clear_ioctl(&self, channel: ChannelId, ioctl_id: IoctlId) -> Result<()> {
        self.ioctl_raw(channel.0, ioctl_id, ptr::null_mut(), ptr::null_mut())
    }

    fn lookup_table_ioctl(
        &self,
        channel: ChannelId,
        ioctl_id: IoctlId,
        addresses: &[u8],
    ) -> Result<()> {
        let mut buffer = addresses.to_vec();
        let mut input = SByteArray::new(&mut buffer);
        self.ioctl_raw(
            channel.0,
            ioctl_id,
            &mut input as *mut SByteArray as *mut c_void,
            ptr::null_mut(),
        )
    }

    fn ioctl_raw(
        &self,
        handle: u32,
        ioctl_id: IoctlId,
        input: *mut c_void,
        output: *mut c_void,
    ) -> Result<()> {
        check_status(unsafe { (self.api.ioctl)(handle, ioctl_id.0, input, output) })?;
        Ok(())
    }
}

fn text_buffer_to_string(buffer: &[u8]) -> String {
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::mock;
    use crate::protocol::{TxFlags, SHORT_TO_GROUND, VOLTAGE_OFF};

    fn connected_driver() -> (PassThruDriver, DeviceId, ChannelId) {
        let driver = PassThruDriver::mock();
        let device = driver.open().unwrap();
        let channel = driver
            .connect(device, ProtocolId::ISO15765, ConnectFlags::CAN_29BIT_ID, 500_000)
            .unwrap();
        (driver, device, channel)
    }

    fn status_of(err: PassThruError) -> Status {
        err.status().expect("expected a native status failure")
    }

    #[test]
    #[serial]
    fn device_lifecycle() {
        let driver = PassThruDriver::mock();
        let device = driver.open().unwrap();
        let channel = driver
            .connect(device, ProtocolId::CAN, ConnectFlags::empty(), 500_000)
            .unwrap();
        driver.disconnect(channel).unwrap();
        driver.close(device).unwrap();

        // The driver owns handle validity; a second close is its error.
        let err = driver.close(device).unwrap_err();
        assert_eq!(status_of(err), Status::InvalidDeviceId);
    }

    #[test]
    #[serial]
    fn connect_surfaces_bad_baudrate() {
        let driver = PassThruDriver::mock();
        let device = driver.open().unwrap();
        let err = driver
            .connect(device, ProtocolId::CAN, ConnectFlags::empty(), 0)
            .unwrap_err();
        assert_eq!(status_of(err), Status::InvalidBaudrate);
    }

    #[test]
    #[serial]
    fn nonblocking_read_of_empty_buffer_is_not_an_error() {
        let (driver, _, channel) = connected_driver();
        let msgs = driver.read_messages(channel, 4, None).unwrap();
        assert!(msgs.is_empty());
    }

    #[test]
    #[serial]
    fn blocking_read_surfaces_timeout() {
        let (driver, _, channel) = connected_driver();
        mock::push_rx_message(PassThruMsg::transmit(
            ProtocolId::ISO15765,
            TxFlags::NORMAL_TRANSMIT,
            &[0x01],
        ));
        let err = driver.read_messages(channel, 2, Some(50)).unwrap_err();
        assert_eq!(status_of(err), Status::Timeout);
    }

    #[test]
    #[serial]
    fn read_returns_messages_in_receipt_order() {
        let (driver, _, channel) = connected_driver();
        for byte in [0x11u8, 0x22, 0x33] {
            mock::push_rx_message(PassThruMsg::transmit(
                ProtocolId::ISO15765,
                TxFlags::NORMAL_TRANSMIT,
                &[byte],
            ));
        }
        let msgs = driver.read_messages(channel, 2, None).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].data(), &[0x11]);
        assert_eq!(msgs[1].data(), &[0x22]);

        // The third is still queued and satisfies a blocking read.
        let rest = driver.read_messages(channel, 1, Some(100)).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].data(), &[0x33]);
    }

    #[test]
    #[serial]
    fn write_reports_count_and_preserves_order() {
        let (driver, _, channel) = connected_driver();
        let messages = [
            PassThruMsg::transmit(ProtocolId::ISO15765, TxFlags::NORMAL_TRANSMIT, &[0xAA]),
            PassThruMsg::transmit(ProtocolId::ISO15765, TxFlags::NORMAL_TRANSMIT, &[0xBB]),
        ];
        let written = driver.write_messages(channel, &messages, None).unwrap();
        assert_eq!(written, 2);
        let seen = mock::written_messages();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].data(), &[0xAA]);
        assert_eq!(seen[1].data(), &[0xBB]);

        assert_eq!(driver.write_messages(channel, &[], None).unwrap(), 0);
    }

    #[test]
    #[serial]
    fn periodic_interval_is_validated_locally() {
        let (driver, _, channel) = connected_driver();
        let msg = PassThruMsg::transmit(ProtocolId::ISO15765, TxFlags::NORMAL_TRANSMIT, &[0x3E]);

        let calls_before = mock::native_call_count();
        for bad in [0u32, 4, 65_536] {
            let err = driver.start_periodic_message(channel, &msg, bad).unwrap_err();
            assert!(matches!(err, PassThruError::InvalidInterval(v) if v == bad));
        }
        // Rejected before the native layer was ever involved.
        assert_eq!(mock::native_call_count(), calls_before);

        driver.start_periodic_message(channel, &msg, 5).unwrap();
        let id = driver.start_periodic_message(channel, &msg, 65_535).unwrap();
        assert_eq!(mock::last_periodic_interval(), Some(65_535));
        driver.stop_periodic_message(channel, id).unwrap();
    }

    #[test]
    #[serial]
    fn programming_voltage_is_validated_locally() {
        let (driver, device, _) = connected_driver();

        let calls_before = mock::native_call_count();
        for bad in [0u32, 4_999, 20_001] {
            let err = driver
                .set_programming_voltage(device, ProgrammingPin::Pin6, bad)
                .unwrap_err();
            assert!(matches!(err, PassThruError::InvalidVoltage(v) if v == bad));
        }
        assert_eq!(mock::native_call_count(), calls_before);

        for ok in [5_000, 20_000, SHORT_TO_GROUND, VOLTAGE_OFF] {
            driver
                .set_programming_voltage(device, ProgrammingPin::Pin15, ok)
                .unwrap();
        }
        assert_eq!(mock::last_voltage(), Some((15, VOLTAGE_OFF)));
    }

    #[test]
    #[serial]
    fn flow_control_message_is_forwarded_only_for_flow_filters() {
        let (driver, _, channel) = connected_driver();
        let mask = PassThruMsg::transmit(ProtocolId::ISO15765, TxFlags::NORMAL_TRANSMIT, &[0xFF; 4]);
        let pattern =
            PassThruMsg::transmit(ProtocolId::ISO15765, TxFlags::NORMAL_TRANSMIT, &[0x00; 4]);
        let flow = PassThruMsg::transmit(ProtocolId::ISO15765, TxFlags::NORMAL_TRANSMIT, &[0x07; 4]);

        // Pass filter: a supplied flow-control message must be dropped.
        driver
            .start_message_filter(channel, FilterType::PASS_FILTER, &mask, &pattern, Some(&flow))
            .unwrap();
        let seen = mock::last_filter().unwrap();
        assert!(seen.flow_control_was_null);
        assert!(!seen.mask_was_null);
        assert!(!seen.pattern_was_null);

        // Flow-control filter with a message: forwarded.
        driver
            .start_message_filter(
                channel,
                FilterType::FLOW_CONTROL_FILTER,
                &mask,
                &pattern,
                Some(&flow),
            )
            .unwrap();
        assert!(!mock::last_filter().unwrap().flow_control_was_null);

        // Flow-control filter without one: null goes through and the
        // driver reports it; nothing is substituted.
        let err = driver
            .start_message_filter(channel, FilterType::FLOW_CONTROL_FILTER, &mask, &pattern, None)
            .unwrap_err();
        assert_eq!(status_of(err), Status::NullParameter);
        assert!(mock::last_filter().unwrap().flow_control_was_null);
    }

    #[test]
    #[serial]
    fn stop_message_filter_round_trip() {
        let (driver, _, channel) = connected_driver();
        let mask = PassThruMsg::transmit(ProtocolId::CAN, TxFlags::NORMAL_TRANSMIT, &[0xFF; 4]);
        let pattern = PassThruMsg::transmit(ProtocolId::CAN, TxFlags::NORMAL_TRANSMIT, &[0x00; 4]);
        let filter = driver
            .start_message_filter(channel, FilterType::BLOCK_FILTER, &mask, &pattern, None)
            .unwrap();
        driver.stop_message_filter(channel, filter).unwrap();
    }

    #[test]
    #[serial]
    fn get_config_drops_driver_internal_params() {
        let (driver, _, channel) = connected_driver();
        let values = driver
            .get_config(channel, &[ConfigParam::P1_MIN, ConfigParam::DATA_RATE])
            .unwrap();
        assert_eq!(values.len(), 1);
        assert!(values.contains_key(&ConfigParam::DATA_RATE));
        assert!(!values.contains_key(&ConfigParam::P1_MIN));
    }

    #[test]
    #[serial]
    fn get_config_warns_once_for_each_dropped_param() {
        use std::io::{self, Write};
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Capture(Arc<Mutex<Vec<u8>>>);

        impl Write for Capture {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Capture {
            type Writer = Capture;

            fn make_writer(&'a self) -> Capture {
                self.clone()
            }
        }

        let (driver, _, channel) = connected_driver();
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            driver
                .get_config(channel, &[ConfigParam::P1_MIN, ConfigParam::DATA_RATE])
                .unwrap();
        });

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("P1_MIN").count(), 1);
        assert!(output.contains("WARN"));
        assert!(!output.contains("DATA_RATE"));
    }

    #[test]
    #[serial]
    fn get_config_with_only_internal_params_skips_the_native_call() {
        let (driver, _, channel) = connected_driver();
        let calls_before = mock::native_call_count();
        let values = driver.get_config(channel, &[ConfigParam::P2_MAX]).unwrap();
        assert!(values.is_empty());
        assert_eq!(mock::native_call_count(), calls_before);
    }

    #[test]
    #[serial]
    fn set_then_get_config_round_trips() {
        let (driver, _, channel) = connected_driver();
        let mut wanted = BTreeMap::new();
        wanted.insert(ConfigParam::DATA_RATE, 10_400);
        wanted.insert(ConfigParam::LOOPBACK, 1);
        driver.set_config(channel, &wanted).unwrap();

        let read_back = driver
            .get_config(channel, &[ConfigParam::DATA_RATE, ConfigParam::LOOPBACK])
            .unwrap();
        assert_eq!(read_back, wanted);
    }

    #[test]
    #[serial]
    fn voltage_reads_report_millivolts() {
        let (driver, device, _) = connected_driver();
        assert_eq!(driver.read_battery_voltage(device).unwrap(), 12_600);
        mock::set_battery_voltage(14_200);
        assert_eq!(driver.read_battery_voltage(device).unwrap(), 14_200);
        assert_eq!(driver.read_programming_voltage(device).unwrap(), 5_000);
    }

    #[test]
    #[serial]
    fn five_baud_init_returns_key_bytes() {
        let (driver, _, channel) = connected_driver();
        let keywords = driver.five_baud_init(channel, 0x33).unwrap();
        assert_eq!(keywords, [0xE9, 0x8F]);
        assert_eq!(mock::five_baud_target(), Some(0x33));
    }

    #[test]
    #[serial]
    fn fast_init_returns_the_response_message() {
        let (driver, _, channel) = connected_driver();
        let request = PassThruMsg::transmit(
            ProtocolId::ISO14230,
            TxFlags::NORMAL_TRANSMIT,
            &[0xC1, 0x33, 0xF1, 0x81],
        );
        let response = driver.fast_init(channel, Some(&request)).unwrap();
        assert_eq!(response.protocol(), ProtocolId::ISO14230);
        assert_eq!(response.data(), &[0xC1, 0x8F, 0xE9]);

        // An absent message still runs the sequence with an empty one.
        let response = driver.fast_init(channel, None).unwrap();
        assert_eq!(response.data_size, 3);
    }

    #[test]
    #[serial]
    fn clear_operations_reach_their_sub_codes() {
        let (driver, _, channel) = connected_driver();
        driver.clear_tx_buffer(channel).unwrap();
        driver.clear_rx_buffer(channel).unwrap();
        driver.clear_periodic_messages(channel).unwrap();
        driver.clear_message_filters(channel).unwrap();
        driver.clear_functional_lookup_table(channel).unwrap();
        assert_eq!(mock::cleared_ioctls(), vec![0x07, 0x08, 0x09, 0x0A, 0x0B]);
    }

    #[test]
    #[serial]
    fn functional_lookup_table_add_and_delete() {
        let (driver, _, channel) = connected_driver();
        driver
            .add_to_functional_lookup_table(channel, &[0x6A, 0x6B, 0x6C])
            .unwrap();
        driver
            .delete_from_functional_lookup_table(channel, &[0x6B])
            .unwrap();
        assert_eq!(mock::functional_addresses(), vec![0x6A, 0x6C]);
    }

    #[test]
    #[serial]
    fn read_version_fills_all_three_strings() {
        let (driver, device, _) = connected_driver();
        let version = driver.read_version(device).unwrap();
        assert_eq!(version.firmware, "1.17.4");
        assert_eq!(version.library, "0.1.0");
        assert_eq!(version.api, "04.04");
    }

    #[test]
    #[serial]
    fn get_last_error_is_exempt_from_status_translation() {
        let (driver, _, _) = connected_driver();
        mock::set_last_error_text("bus initialization failed");
        // The mock returns ERR_FAILED from this entry point; the text
        // must come back anyway.
        assert_eq!(driver.get_last_error(), "bus initialization failed");
    }

    #[test]
    #[serial]
    fn operations_against_stale_channels_surface_native_codes() {
        let (driver, _, channel) = connected_driver();
        driver.disconnect(channel).unwrap();
        let err = driver.read_messages(channel, 1, None).unwrap_err();
        assert_eq!(status_of(err), Status::InvalidChannelId);
    }

    #[test]
    #[serial]
    fn zero_count_read_is_a_no_op() {
        let (driver, _, channel) = connected_driver();
        let calls_before = mock::native_call_count();
        assert!(driver.read_messages(channel, 0, None).unwrap().is_empty());
        assert_eq!(mock::native_call_count(), calls_before);
    }
}
