//! Protocol identifiers and flag sets for Pass-Thru channels.
//!
//! The SAE J2534-1 standard names only a handful of protocol and filter
//! values; wide bands above them are reserved for future revisions, the
//! J2534-2 extension and manufacturer-specific use. Identifier types here
//! are therefore transparent `u32` newtypes with associated constants
//! rather than closed enums, so any wire value round-trips unchanged.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Vehicle-network protocol selector passed to `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(pub u32);

impl ProtocolId {
    pub const J1850VPW: ProtocolId = ProtocolId(0x01);
    pub const J1850PWM: ProtocolId = ProtocolId(0x02);
    pub const ISO9141: ProtocolId = ProtocolId(0x03);
    pub const ISO14230: ProtocolId = ProtocolId(0x04);
    pub const CAN: ProtocolId = ProtocolId(0x05);
    pub const ISO15765: ProtocolId = ProtocolId(0x06);
    pub const SCI_A_ENGINE: ProtocolId = ProtocolId(0x07);
    pub const SCI_A_TRANS: ProtocolId = ProtocolId(0x08);
    pub const SCI_B_ENGINE: ProtocolId = ProtocolId(0x09);
    pub const SCI_B_TRANS: ProtocolId = ProtocolId(0x0A);

    /// One of the ten protocols named by J2534-1.
    pub const fn is_standard(self) -> bool {
        self.0 >= 0x01 && self.0 <= 0x0A
    }

    /// Values from 0x10000 up belong to the device manufacturer.
    pub const fn is_manufacturer_specific(self) -> bool {
        self.0 >= 0x10000
    }
}

bitflags! {
    /// Connection flags layered onto a protocol ID at `connect` time.
    ///
    /// Bits outside the named set are legal (reserved and manufacturer
    /// bands); construct with [`ConnectFlags::from_bits_retain`] to keep
    /// them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConnectFlags: u32 {
        const CAN_29BIT_ID = 0x100;
        const ISO9141_NO_CHECKSUM = 0x200;
        const CAN_ID_BOTH = 0x800;
        const ISO9141_K_LINE_ONLY = 0x1000;
    }
}

bitflags! {
    /// Receive-status flags reported by the driver on every message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RxStatus: u32 {
        const TX_MSG_TYPE = 0x001;
        const START_OF_MESSAGE = 0x002;
        const RX_BREAK = 0x004;
        const TX_INDICATION = 0x008;
        const ISO15765_PADDING_ERROR = 0x010;
        const ISO15765_ADDR_TYPE = 0x080;
        const CAN_29BIT_ID = 0x100;
    }
}

impl RxStatus {
    /// Confirmation that a previously queued transmit completed.
    pub const TX_DONE: RxStatus = RxStatus::TX_INDICATION.union(RxStatus::TX_MSG_TYPE);
    /// Loopback copy of a message this host transmitted.
    pub const LOOPBACK: RxStatus = RxStatus::TX_MSG_TYPE;
}

bitflags! {
    /// Transmit flags supplied by the caller on outgoing messages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxFlags: u32 {
        const ISO15765_FRAME_PAD = 0x0000_0040;
        const ISO15765_ADDR_TYPE = 0x0000_0080;
        const CAN_29BIT_ID = 0x0000_0100;
        const WAIT_P3_MIN_ONLY = 0x0000_0200;
        const SWCAN_HV_TX = 0x0000_0400;
        const SCI_MODE = 0x0040_0000;
        const SCI_TX_VOLTAGE = 0x0080_0000;
    }
}

impl TxFlags {
    /// No special transmit handling.
    pub const NORMAL_TRANSMIT: TxFlags = TxFlags::empty();
    /// Padded ISO 15765 frame with an 11-bit CAN identifier.
    pub const ISO15765_CAN_ID_11: TxFlags = TxFlags::ISO15765_FRAME_PAD;
    /// Padded ISO 15765 frame with a 29-bit CAN identifier.
    pub const ISO15765_CAN_ID_29: TxFlags =
        TxFlags::CAN_29BIT_ID.union(TxFlags::ISO15765_FRAME_PAD);
}

/// Message filter kind passed to `start_message_filter`.
///
/// Like [`ProtocolId`], values above the named set are reserved or
/// manufacturer specific and must survive unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterType(pub u32);

impl FilterType {
    /// Admit matching messages into the receive queue.
    pub const PASS_FILTER: FilterType = FilterType(0x1);
    /// Keep matching messages out of the receive queue.
    pub const BLOCK_FILTER: FilterType = FilterType(0x2);
    /// Pass filter with an outgoing ISO 15765 flow-control message.
    pub const FLOW_CONTROL_FILTER: FilterType = FilterType(0x3);

    /// Whether this filter kind carries a flow-control message.
    pub const fn is_flow_control(self) -> bool {
        self.0 == Self::FLOW_CONTROL_FILTER.0
    }
}

/// J1962 connector pin that can carry a programming voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ProgrammingPin {
    AuxOutput = 0,
    Pin6 = 6,
    Pin9 = 9,
    Pin11 = 11,
    Pin12 = 12,
    Pin13 = 13,
    Pin14 = 14,
    Pin15 = 15,
}

/// Sentinel voltage: short the selected pin to ground.
pub const SHORT_TO_GROUND: u32 = 0xFFFF_FFFE;
/// Sentinel voltage: remove any voltage from the selected pin.
pub const VOLTAGE_OFF: u32 = 0xFFFF_FFFF;
/// Lowest programmable pin voltage, in millivolts.
pub const MIN_PROGRAMMING_VOLTAGE_MV: u32 = 5_000;
/// Highest programmable pin voltage, in millivolts.
pub const MAX_PROGRAMMING_VOLTAGE_MV: u32 = 20_000;

/// Whether `voltage_mv` may be forwarded to the native layer: either one
/// of the two sentinels or a value within the programmable range.
pub const fn is_settable_voltage(voltage_mv: u32) -> bool {
    voltage_mv == SHORT_TO_GROUND
        || voltage_mv == VOLTAGE_OFF
        || (voltage_mv >= MIN_PROGRAMMING_VOLTAGE_MV && voltage_mv <= MAX_PROGRAMMING_VOLTAGE_MV)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_protocol_values() {
        assert_eq!(ProtocolId::CAN.0, 0x05);
        assert_eq!(ProtocolId::ISO15765.0, 0x06);
        assert!(ProtocolId::SCI_B_TRANS.is_standard());
        assert!(!ProtocolId(0x0B).is_standard());
    }

    #[test]
    fn manufacturer_protocol_round_trips() {
        let vendor = ProtocolId(0x2_0001);
        assert!(vendor.is_manufacturer_specific());
        assert_eq!(vendor.0, 0x2_0001);
    }

    #[test]
    fn unknown_flag_bits_are_retained() {
        let flags = ConnectFlags::from_bits_retain(0x8000_0100);
        assert!(flags.contains(ConnectFlags::CAN_29BIT_ID));
        assert_eq!(flags.bits(), 0x8000_0100);
    }

    #[test]
    fn tx_done_combines_indication_and_msg_type() {
        assert_eq!(RxStatus::TX_DONE.bits(), 0x009);
        assert_eq!(TxFlags::ISO15765_CAN_ID_29.bits(), 0x140);
    }

    #[test]
    fn flow_control_predicate() {
        assert!(FilterType::FLOW_CONTROL_FILTER.is_flow_control());
        assert!(!FilterType::PASS_FILTER.is_flow_control());
        assert!(!FilterType(0x10000).is_flow_control());
    }

    #[test]
    fn voltage_bounds() {
        assert!(!is_settable_voltage(4_999));
        assert!(is_settable_voltage(5_000));
        assert!(is_settable_voltage(20_000));
        assert!(!is_settable_voltage(20_001));
        assert!(is_settable_voltage(SHORT_TO_GROUND));
        assert!(is_settable_voltage(VOLTAGE_OFF));
    }
}
