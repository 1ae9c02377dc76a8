//! In-process stand-in for a vendor Pass-Thru library.
//!
//! Backs the `mock` feature and the crate's own tests: every entry point
//! of the native API is implemented over shared in-memory state, so
//! applications can exercise the full binding without vendor hardware.
//! The state is process-global, exactly like a real driver's; tests that
//! touch it should serialize themselves and call [`reset`] first.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard, OnceLock};

use libc::{c_char, c_void};

use crate::ffi::ApiTable;
use crate::message::{PassThruMsg, SByteArray, SConfigList};

const ERR_INVALID_CHANNEL_ID: i32 = 0x02;
const ERR_NULL_PARAMETER: i32 = 0x04;
const ERR_FAILED: i32 = 0x07;
const ERR_TIMEOUT: i32 = 0x09;
const ERR_INVALID_IOCTL_ID: i32 = 0x0F;
const ERR_BUFFER_EMPTY: i32 = 0x10;
const ERR_INVALID_BAUDRATE: i32 = 0x19;
const ERR_INVALID_DEVICE_ID: i32 = 0x1A;

const FIRMWARE_VERSION: &str = "1.17.4";
const LIBRARY_VERSION: &str = "0.1.0";
const API_VERSION: &str = "04.04";

/// What the fake driver observed on the last StartMsgFilter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterObservation {
    pub filter_type: u32,
    pub mask_was_null: bool,
    pub pattern_was_null: bool,
    pub flow_control_was_null: bool,
}

#[derive(Default)]
struct MockState {
    next_device: u32,
    next_channel: u32,
    next_filter: u32,
    next_periodic: u32,
    open_devices: BTreeSet<u32>,
    connected_channels: BTreeSet<u32>,
    native_calls: u64,
    rx_queue: VecDeque<PassThruMsg>,
    written: Vec<PassThruMsg>,
    config: Vec<(u32, u32)>,
    last_filter: Option<FilterObservation>,
    last_periodic_interval: Option<u32>,
    last_voltage: Option<(u32, u32)>,
    cleared: Vec<u32>,
    functional_addresses: Vec<u8>,
    five_baud_target: Option<u8>,
    last_error_text: String,
    battery_mv: u32,
    programming_mv: u32,
}

fn state() -> MutexGuard<'static, MockState> {
    static STATE: OnceLock<Mutex<MockState>> = OnceLock::new();
    STATE
        .get_or_init(|| Mutex::new(MockState::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reset the fake driver to its power-on state.
pub fn reset() {
    let mut s = state();
    *s = MockState {
        last_error_text: "mock: no failure recorded".to_string(),
        battery_mv: 12_600,
        programming_mv: 5_000,
        ..MockState::default()
    };
}

/// Queue a message for the next read call to deliver.
pub fn push_rx_message(msg: PassThruMsg) {
    state().rx_queue.push_back(msg);
}

/// Number of entry-point invocations since the last [`reset`].
pub fn native_call_count() -> u64 {
    state().native_calls
}

/// Pointer shapes seen by the last StartMsgFilter call.
pub fn last_filter() -> Option<FilterObservation> {
    state().last_filter
}

/// Interval forwarded by the last StartPeriodicMsg call.
pub fn last_periodic_interval() -> Option<u32> {
    state().last_periodic_interval
}

/// (pin, millivolts) forwarded by the last SetProgrammingVoltage call.
pub fn last_voltage() -> Option<(u32, u32)> {
    state().last_voltage
}

/// Copies of every message written so far.
pub fn written_messages() -> Vec<PassThruMsg> {
    state().written.clone()
}

/// Ioctl sub-codes of the clear operations issued so far.
pub fn cleared_ioctls() -> Vec<u32> {
    state().cleared.clone()
}

/// Current functional-address lookup table contents.
pub fn functional_addresses() -> Vec<u8> {
    state().functional_addresses.clone()
}

/// Target address of the last five-baud initialization.
pub fn five_baud_target() -> Option<u8> {
    state().five_baud_target
}

/// Override the battery voltage reported by READ_VBATT.
pub fn set_battery_voltage(millivolts: u32) {
    state().battery_mv = millivolts;
}

/// Override the text returned by GetLastError.
pub fn set_last_error_text(text: &str) {
    state().last_error_text = text.to_string();
}

fn stored_config(s: &MockState, parameter: u32) -> u32 {
    s.config
        .iter()
        .rev()
        .find(|(p, _)| *p == parameter)
        .map(|(_, v)| *v)
        // Unset parameters still read back a deterministic nonzero value.
        .unwrap_or_else(|| parameter.wrapping_mul(0x101))
}

fn write_text(dst: *mut c_char, text: &str) {
    let bytes = text.as_bytes();
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst as *mut u8, bytes.len());
        *dst.add(bytes.len()) = 0;
    }
}

unsafe extern "system" fn open(_name: *const c_void, device_id: *mut u32) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    s.next_device += 1;
    let id = s.next_device;
    s.open_devices.insert(id);
    *device_id = id;
    0
}

unsafe extern "system" fn close(device_id: u32) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    if s.open_devices.remove(&device_id) {
        0
    } else {
        ERR_INVALID_DEVICE_ID
    }
}

unsafe extern "system" fn connect(
    device_id: u32,
    _protocol_id: u32,
    _flags: u32,
    baud_rate: u32,
    channel_id: *mut u32,
) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    if !s.open_devices.contains(&device_id) {
        return ERR_INVALID_DEVICE_ID;
    }
    if baud_rate == 0 {
        return ERR_INVALID_BAUDRATE;
    }
    s.next_channel += 1;
    let id = s.next_channel;
    s.connected_channels.insert(id);
    *channel_id = id;
    0
}

unsafe extern "system" fn disconnect(channel_id: u32) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    if s.connected_channels.remove(&channel_id) {
        0
    } else {
        ERR_INVALID_CHANNEL_ID
    }
}

unsafe extern "system" fn read_msgs(
    channel_id: u32,
    msgs: *mut PassThruMsg,
    num_msgs: *mut u32,
    timeout: u32,
) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    if !s.connected_channels.contains(&channel_id) {
        return ERR_INVALID_CHANNEL_ID;
    }
    let requested = *num_msgs as usize;
    let mut delivered = 0;
    while delivered < requested {
        match s.rx_queue.pop_front() {
            Some(msg) => {
                *msgs.add(delivered) = msg;
                delivered += 1;
            }
            None => break,
        }
    }
    *num_msgs = delivered as u32;
    if timeout == 0 && delivered == 0 {
        ERR_BUFFER_EMPTY
    } else if timeout > 0 && delivered < requested {
        // A blocking driver would wait here; the fake one times out
        // immediately once the queue runs dry.
        ERR_TIMEOUT
    } else {
        0
    }
}

unsafe extern "system" fn write_msgs(
    channel_id: u32,
    msgs: *mut PassThruMsg,
    num_msgs: *mut u32,
    _timeout: u32,
) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    if !s.connected_channels.contains(&channel_id) {
        return ERR_INVALID_CHANNEL_ID;
    }
    for i in 0..*num_msgs as usize {
        let msg = *msgs.add(i);
        s.written.push(msg);
    }
    0
}

unsafe extern "system" fn start_periodic_msg(
    channel_id: u32,
    _msg: *const PassThruMsg,
    msg_id: *mut u32,
    time_interval: u32,
) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    if !s.connected_channels.contains(&channel_id) {
        return ERR_INVALID_CHANNEL_ID;
    }
    s.last_periodic_interval = Some(time_interval);
    s.next_periodic += 1;
    *msg_id = s.next_periodic;
    0
}

unsafe extern "system" fn stop_periodic_msg(channel_id: u32, _msg_id: u32) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    if !s.connected_channels.contains(&channel_id) {
        return ERR_INVALID_CHANNEL_ID;
    }
    0
}

unsafe extern "system" fn start_msg_filter(
    channel_id: u32,
    filter_type: u32,
    mask_msg: *const PassThruMsg,
    pattern_msg: *const PassThruMsg,
    flow_control_msg: *const PassThruMsg,
    filter_id: *mut u32,
) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    if !s.connected_channels.contains(&channel_id) {
        return ERR_INVALID_CHANNEL_ID;
    }
    s.last_filter = Some(FilterObservation {
        filter_type,
        mask_was_null: mask_msg.is_null(),
        pattern_was_null: pattern_msg.is_null(),
        flow_control_was_null: flow_control_msg.is_null(),
    });
    // A flow-control filter needs all three messages.
    if filter_type == 0x3 && flow_control_msg.is_null() {
        return ERR_NULL_PARAMETER;
    }
    s.next_filter += 1;
    *filter_id = s.next_filter;
    0
}

unsafe extern "system" fn stop_msg_filter(channel_id: u32, _filter_id: u32) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    if !s.connected_channels.contains(&channel_id) {
        return ERR_INVALID_CHANNEL_ID;
    }
    0
}

unsafe extern "system" fn set_programming_voltage(
    device_id: u32,
    pin_number: u32,
    voltage: u32,
) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    if !s.open_devices.contains(&device_id) {
        return ERR_INVALID_DEVICE_ID;
    }
    s.last_voltage = Some((pin_number, voltage));
    0
}

unsafe extern "system" fn read_version(
    device_id: u32,
    firmware_version: *mut c_char,
    dll_version: *mut c_char,
    api_version: *mut c_char,
) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    if !s.open_devices.contains(&device_id) {
        return ERR_INVALID_DEVICE_ID;
    }
    write_text(firmware_version, FIRMWARE_VERSION);
    write_text(dll_version, LIBRARY_VERSION);
    write_text(api_version, API_VERSION);
    0
}

unsafe extern "system" fn get_last_error(error_description: *mut c_char) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    let text = s.last_error_text.clone();
    write_text(error_description, &text);
    // Some drivers return their previous status here; the binding must
    // deliver the text regardless.
    ERR_FAILED
}

unsafe extern "system" fn ioctl(
    handle_id: u32,
    ioctl_id: u32,
    input: *mut c_void,
    output: *mut c_void,
) -> i32 {
    let mut s = state();
    s.native_calls += 1;
    match ioctl_id {
        // GET_CONFIG: fill each entry's value in place.
        0x01 => {
            let list = &*(input as *const SConfigList);
            for i in 0..list.num_of_params as usize {
                let entry = &mut *list.config_ptr.add(i);
                entry.value = stored_config(&s, entry.parameter);
            }
            0
        }
        // SET_CONFIG: remember each (parameter, value) pair.
        0x02 => {
            let list = &*(input as *const SConfigList);
            for i in 0..list.num_of_params as usize {
                let entry = *list.config_ptr.add(i);
                s.config.push((entry.parameter, entry.value));
            }
            0
        }
        // READ_VBATT
        0x03 => {
            *(output as *mut u32) = s.battery_mv;
            0
        }
        // FIVE_BAUD_INIT: consume the address, report the two key bytes.
        0x04 => {
            let addr = &*(input as *const SByteArray);
            if addr.num_of_bytes < 1 {
                return ERR_NULL_PARAMETER;
            }
            s.five_baud_target = Some(*addr.byte_ptr);
            let keywords = &*(output as *const SByteArray);
            if keywords.num_of_bytes < 2 {
                return ERR_NULL_PARAMETER;
            }
            *keywords.byte_ptr = 0xE9;
            *keywords.byte_ptr.add(1) = 0x8F;
            0
        }
        // FAST_INIT: echo the request protocol with a wake-up response.
        0x05 => {
            let request = &*(input as *const PassThruMsg);
            let response = &mut *(output as *mut PassThruMsg);
            *response = PassThruMsg {
                protocol_id: request.protocol_id,
                data_size: 3,
                extra_data_index: 3,
                ..PassThruMsg::default()
            };
            response.data[..3].copy_from_slice(&[0xC1, 0x8F, 0xE9]);
            0
        }
        // CLEAR_TX_BUFFER / CLEAR_RX_BUFFER / CLEAR_PERIODIC_MSGS /
        // CLEAR_MSG_FILTERS / CLEAR_FUNCT_MSG_LOOKUP_TABLE
        0x07..=0x0B => {
            if !s.connected_channels.contains(&handle_id) {
                return ERR_INVALID_CHANNEL_ID;
            }
            s.cleared.push(ioctl_id);
            match ioctl_id {
                0x08 => s.rx_queue.clear(),
                0x0B => s.functional_addresses.clear(),
                _ => {}
            }
            0
        }
        // ADD_TO_FUNCT_MSG_LOOKUP_TABLE
        0x0C => {
            let addrs = &*(input as *const SByteArray);
            for i in 0..addrs.num_of_bytes as usize {
                let byte = *addrs.byte_ptr.add(i);
                s.functional_addresses.push(byte);
            }
            0
        }
        // DELETE_FROM_FUNCT_MSG_LOOKUP_TABLE
        0x0D => {
            let addrs = &*(input as *const SByteArray);
            for i in 0..addrs.num_of_bytes as usize {
                let byte = *addrs.byte_ptr.add(i);
                s.functional_addresses.retain(|a| *a != byte);
            }
            0
        }
        // READ_PROG_VOLTAGE
        0x0E => {
            *(output as *mut u32) = s.programming_mv;
            0
        }
        _ => ERR_INVALID_IOCTL_ID,
    }
}

/// Entry-point table backed by the fake driver above.
pub(crate) fn table() -> ApiTable {
    ApiTable {
        open,
        close,
        connect,
        disconnect,
        read_msgs,
        write_msgs,
        start_periodic_msg,
        stop_periodic_msg,
        start_msg_filter,
        stop_msg_filter,
        set_programming_voltage,
        read_version,
        get_last_error,
        ioctl,
    }
}
