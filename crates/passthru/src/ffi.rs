//! Native entry-point signatures and symbol resolution.
//!
//! The J2534-1 API is fourteen `extern "system"` functions exported by a
//! vendor library. Every signature here must match the standard exactly:
//! handles and counts are unsigned 32-bit, the return value is the
//! status code, and structures cross by pointer.

use libc::{c_char, c_void};
use libloading::Library;

use crate::message::PassThruMsg;

pub(crate) type PassThruOpenFn =
    unsafe extern "system" fn(name: *const c_void, device_id: *mut u32) -> i32;

pub(crate) type PassThruCloseFn = unsafe extern "system" fn(device_id: u32) -> i32;

pub(crate) type PassThruConnectFn = unsafe extern "system" fn(
    device_id: u32,
    protocol_id: u32,
    flags: u32,
    baud_rate: u32,
    channel_id: *mut u32,
) -> i32;

pub(crate) type PassThruDisconnectFn = unsafe extern "system" fn(channel_id: u32) -> i32;

pub(crate) type PassThruReadMsgsFn = unsafe extern "system" fn(
    channel_id: u32,
    msgs: *mut PassThruMsg,
    num_msgs: *mut u32,
    timeout: u32,
) -> i32;

pub(crate) type PassThruWriteMsgsFn = unsafe extern "system" fn(
    channel_id: u32,
    msgs: *mut PassThruMsg,
    num_msgs: *mut u32,
    timeout: u32,
) -> i32;

pub(crate) type PassThruStartPeriodicMsgFn = unsafe extern "system" fn(
    channel_id: u32,
    msg: *const PassThruMsg,
    msg_id: *mut u32,
    time_interval: u32,
) -> i32;

pub(crate) type PassThruStopPeriodicMsgFn =
    unsafe extern "system" fn(channel_id: u32, msg_id: u32) -> i32;

pub(crate) type PassThruStartMsgFilterFn = unsafe extern "system" fn(
    channel_id: u32,
    filter_type: u32,
    mask_msg: *const PassThruMsg,
    pattern_msg: *const PassThruMsg,
    flow_control_msg: *const PassThruMsg,
    filter_id: *mut u32,
) -> i32;

pub(crate) type PassThruStopMsgFilterFn =
    unsafe extern "system" fn(channel_id: u32, filter_id: u32) -> i32;

pub(crate) type PassThruSetProgrammingVoltageFn =
    unsafe extern "system" fn(device_id: u32, pin_number: u32, voltage: u32) -> i32;

pub(crate) type PassThruReadVersionFn = unsafe extern "system" fn(
    device_id: u32,
    firmware_version: *mut c_char,
    dll_version: *mut c_char,
    api_version: *mut c_char,
) -> i32;

pub(crate) type PassThruGetLastErrorFn =
    unsafe extern "system" fn(error_description: *mut c_char) -> i32;

pub(crate) type PassThruIoctlFn = unsafe extern "system" fn(
    handle_id: u32,
    ioctl_id: u32,
    input: *mut c_void,
    output: *mut c_void,
) -> i32;

/// The resolved entry points of one loaded library.
///
/// Built once at load time and read-only afterwards, so sharing across
/// threads for invocation is sound as long as the owning [`Library`]
/// outlives it.
#[derive(Clone, Copy)]
pub(crate) struct ApiTable {
    pub open: PassThruOpenFn,
    pub close: PassThruCloseFn,
    pub connect: PassThruConnectFn,
    pub disconnect: PassThruDisconnectFn,
    pub read_msgs: PassThruReadMsgsFn,
    pub write_msgs: PassThruWriteMsgsFn,
    pub start_periodic_msg: PassThruStartPeriodicMsgFn,
    pub stop_periodic_msg: PassThruStopPeriodicMsgFn,
    pub start_msg_filter: PassThruStartMsgFilterFn,
    pub stop_msg_filter: PassThruStopMsgFilterFn,
    pub set_programming_voltage: PassThruSetProgrammingVoltageFn,
    pub read_version: PassThruReadVersionFn,
    pub get_last_error: PassThruGetLastErrorFn,
    pub ioctl: PassThruIoctlFn,
}

impl ApiTable {
    /// Resolve all fourteen entry points from `library`. Fails on the
    /// first missing symbol, which in practice means the library is not
    /// a J2534 interface at all.
    pub fn resolve(library: &Library) -> Result<ApiTable, libloading::Error> {
        unsafe {
            Ok(ApiTable {
                open: *library.get::<PassThruOpenFn>(b"PassThruOpen\0")?,
                close: *library.get::<PassThruCloseFn>(b"PassThruClose\0")?,
                connect: *library.get::<PassThruConnectFn>(b"PassThruConnect\0")?,
                disconnect: *library.get::<PassThruDisconnectFn>(b"PassThruDisconnect\0")?,
                read_msgs: *library.get::<PassThruReadMsgsFn>(b"PassThruReadMsgs\0")?,
                write_msgs: *library.get::<PassThruWriteMsgsFn>(b"PassThruWriteMsgs\0")?,
                start_periodic_msg: *library
                    .get::<PassThruStartPeriodicMsgFn>(b"PassThruStartPeriodicMsg\0")?,
                stop_periodic_msg: *library
                    .get::<PassThruStopPeriodicMsgFn>(b"PassThruStopPeriodicMsg\0")?,
                start_msg_filter: *library
                    .get::<PassThruStartMsgFilterFn>(b"PassThruStartMsgFilter\0")?,
                stop_msg_filter: *library
                    .get::<PassThruStopMsgFilterFn>(b"PassThruStopMsgFilter\0")?,
                set_programming_voltage: *library
                    .get::<PassThruSetProgrammingVoltageFn>(b"PassThruSetProgrammingVoltage\0")?,
                read_version: *library.get::<PassThruReadVersionFn>(b"PassThruReadVersion\0")?,
                get_last_error: *library
                    .get::<PassThruGetLastErrorFn>(b"PassThruGetLastError\0")?,
                ioctl: *library.get::<PassThruIoctlFn>(b"PassThruIoctl\0")?,
            })
        }
    }
}
