//! Fixed-layout structures shared with the native library.
//!
//! Layouts mirror the J2534-1 structure definitions field for field; all
//! of them cross the FFI boundary by pointer, so field order and width
//! must not change.

use std::fmt;

use crate::protocol::{ProtocolId, RxStatus, TxFlags};

/// Payload capacity of a single Pass-Thru message, in bytes.
pub const MAX_MSG_DATA: usize = 4128;

/// One vehicle-network message.
///
/// For transmission, build with [`PassThruMsg::transmit`]. For receive
/// calls the binding hands zeroed buffers ([`PassThruMsg::default`]) to
/// the driver, which fills every field including the timestamp.
///
/// The driver may append data of its own past the caller-visible payload
/// (a checksum it verified, for instance). `extra_data_index` marks the
/// boundary: [`PassThruMsg::data`] is the payload proper and
/// [`PassThruMsg::extra_data`] whatever the driver appended.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PassThruMsg {
    pub protocol_id: u32,
    pub rx_status: u32,
    pub tx_flags: u32,
    /// Driver-assigned receive timestamp, microseconds. Read-only to the
    /// caller.
    pub timestamp: u32,
    pub data_size: u32,
    pub extra_data_index: u32,
    pub data: [u8; MAX_MSG_DATA],
}

impl PassThruMsg {
    /// Build a message for transmission. `data_size` and
    /// `extra_data_index` both start at the payload length: nothing has
    /// been appended by a driver yet.
    ///
    /// # Panics
    ///
    /// Panics if `payload` exceeds [`MAX_MSG_DATA`] bytes.
    pub fn transmit(protocol: ProtocolId, tx_flags: TxFlags, payload: &[u8]) -> PassThruMsg {
        assert!(
            payload.len() <= MAX_MSG_DATA,
            "payload of {} bytes exceeds the {} byte message capacity",
            payload.len(),
            MAX_MSG_DATA
        );
        let mut data = [0u8; MAX_MSG_DATA];
        data[..payload.len()].copy_from_slice(payload);
        PassThruMsg {
            protocol_id: protocol.0,
            rx_status: 0,
            tx_flags: tx_flags.bits(),
            timestamp: 0,
            data_size: payload.len() as u32,
            extra_data_index: payload.len() as u32,
            data,
        }
    }

    pub fn protocol(&self) -> ProtocolId {
        ProtocolId(self.protocol_id)
    }

    /// Receive-status flags, unknown bits preserved.
    pub fn rx_status(&self) -> RxStatus {
        RxStatus::from_bits_retain(self.rx_status)
    }

    /// Transmit flags, unknown bits preserved.
    pub fn tx_flags(&self) -> TxFlags {
        TxFlags::from_bits_retain(self.tx_flags)
    }

    /// Caller-visible payload: bytes up to `extra_data_index`.
    pub fn data(&self) -> &[u8] {
        let (split, _) = self.bounds();
        &self.data[..split]
    }

    /// Driver-appended bytes: from `extra_data_index` to `data_size`.
    /// Empty unless the driver reported extra data.
    pub fn extra_data(&self) -> &[u8] {
        let (split, size) = self.bounds();
        &self.data[split..size]
    }

    // Clamp the driver-reported lengths so a misbehaving driver cannot
    // make the accessors index out of bounds.
    fn bounds(&self) -> (usize, usize) {
        let size = (self.data_size as usize).min(MAX_MSG_DATA);
        let split = (self.extra_data_index as usize).min(size);
        (split, size)
    }
}

impl Default for PassThruMsg {
    /// Zeroed receive buffer for the driver to fill.
    fn default() -> PassThruMsg {
        PassThruMsg {
            protocol_id: 0,
            rx_status: 0,
            tx_flags: 0,
            timestamp: 0,
            data_size: 0,
            extra_data_index: 0,
            data: [0; MAX_MSG_DATA],
        }
    }
}

impl fmt::Debug for PassThruMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (_, size) = self.bounds();
        f.debug_struct("PassThruMsg")
            .field("protocol_id", &self.protocol_id)
            .field("rx_status", &self.rx_status)
            .field("tx_flags", &self.tx_flags)
            .field("timestamp", &self.timestamp)
            .field("data_size", &self.data_size)
            .field("extra_data_index", &self.extra_data_index)
            .field("data", &&self.data[..size])
            .finish()
    }
}

/// One (parameter, value) configuration pair.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SConfig {
    pub parameter: u32,
    pub value: u32,
}

/// Counted list of [`SConfig`] entries passed to GET_CONFIG/SET_CONFIG.
///
/// Holds a raw pointer into a caller-owned buffer: the buffer must stay
/// alive, and at its address, for the whole native call.
#[repr(C)]
#[derive(Debug)]
pub struct SConfigList {
    pub num_of_params: u32,
    pub config_ptr: *mut SConfig,
}

impl SConfigList {
    /// List over `entries`; the count always matches the slice length.
    pub fn new(entries: &mut [SConfig]) -> SConfigList {
        SConfigList {
            num_of_params: entries.len() as u32,
            config_ptr: entries.as_mut_ptr(),
        }
    }
}

/// Counted byte buffer used by the variable-length ioctl payloads.
///
/// Same pointer discipline as [`SConfigList`].
#[repr(C)]
#[derive(Debug)]
pub struct SByteArray {
    pub num_of_bytes: u32,
    pub byte_ptr: *mut u8,
}

impl SByteArray {
    /// Array over `bytes`; the count always matches the slice length.
    pub fn new(bytes: &mut [u8]) -> SByteArray {
        SByteArray {
            num_of_bytes: bytes.len() as u32,
            byte_ptr: bytes.as_mut_ptr(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn layout_matches_the_standard() {
        // 6 u32 header fields plus the 4128 byte payload.
        assert_eq!(mem::size_of::<PassThruMsg>(), 24 + MAX_MSG_DATA);
        assert_eq!(mem::size_of::<SConfig>(), 8);
    }

    #[test]
    fn transmit_message_has_no_extra_data() {
        let payload = [0x00, 0x00, 0x07, 0xE0, 0x01, 0x0C];
        let msg = PassThruMsg::transmit(ProtocolId::ISO15765, TxFlags::ISO15765_CAN_ID_11, &payload);
        assert_eq!(msg.data(), &payload);
        assert_eq!(msg.extra_data(), &[] as &[u8]);
        assert_eq!(msg.data_size, payload.len() as u32);
        assert_eq!(msg.extra_data_index, payload.len() as u32);
        assert_eq!(msg.tx_flags(), TxFlags::ISO15765_CAN_ID_11);
    }

    #[test]
    fn empty_payload_is_allowed() {
        let msg = PassThruMsg::transmit(ProtocolId::CAN, TxFlags::NORMAL_TRANSMIT, &[]);
        assert_eq!(msg.data(), &[] as &[u8]);
        assert_eq!(msg.data_size, 0);
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn oversized_payload_panics() {
        let payload = vec![0u8; MAX_MSG_DATA + 1];
        PassThruMsg::transmit(ProtocolId::CAN, TxFlags::NORMAL_TRANSMIT, &payload);
    }

    #[test]
    fn received_extra_data_is_split_out() {
        // Simulate a driver report: payload plus a two-byte checksum.
        let payload = [0x48, 0x6B, 0x10, 0x41, 0x00];
        let mut msg = PassThruMsg::transmit(ProtocolId::ISO9141, TxFlags::NORMAL_TRANSMIT, &payload);
        msg.data[payload.len()] = 0xAA;
        msg.data[payload.len() + 1] = 0x55;
        msg.data_size = payload.len() as u32 + 2;
        msg.extra_data_index = payload.len() as u32;
        assert_eq!(msg.data(), &payload);
        assert_eq!(msg.extra_data(), &[0xAA, 0x55]);
    }

    #[test]
    fn corrupt_lengths_are_clamped() {
        let mut msg = PassThruMsg::default();
        msg.data_size = u32::MAX;
        msg.extra_data_index = u32::MAX;
        assert_eq!(msg.data().len(), MAX_MSG_DATA);
        assert!(msg.extra_data().is_empty());
    }

    #[test]
    fn sconfig_list_count_matches_buffer() {
        let mut entries = [
            SConfig { parameter: 0x01, value: 500_000 },
            SConfig { parameter: 0x03, value: 1 },
        ];
        let list = SConfigList::new(&mut entries);
        assert_eq!(list.num_of_params, 2);
        assert!(!list.config_ptr.is_null());

        let mut bytes = [0x6A, 0x6B];
        let arr = SByteArray::new(&mut bytes);
        assert_eq!(arr.num_of_bytes, 2);
    }

    proptest! {
        #[test]
        fn any_payload_round_trips(payload in proptest::collection::vec(any::<u8>(), 0..MAX_MSG_DATA)) {
            let msg = PassThruMsg::transmit(ProtocolId::CAN, TxFlags::NORMAL_TRANSMIT, &payload);
            prop_assert_eq!(msg.data(), payload.as_slice());
            prop_assert!(msg.extra_data().is_empty());
        }
    }
}
