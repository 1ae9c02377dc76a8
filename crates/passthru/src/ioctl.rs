//! Ioctl sub-codes and channel configuration parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sub-code selecting the operation performed by the generic ioctl entry
/// point. 0x06 is unused by the standard; 0x0F and up are reserved or
/// manufacturer specific, so the type accepts any `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IoctlId(pub u32);

impl IoctlId {
    pub const GET_CONFIG: IoctlId = IoctlId(0x01);
    pub const SET_CONFIG: IoctlId = IoctlId(0x02);
    pub const READ_VBATT: IoctlId = IoctlId(0x03);
    pub const FIVE_BAUD_INIT: IoctlId = IoctlId(0x04);
    pub const FAST_INIT: IoctlId = IoctlId(0x05);
    pub const CLEAR_TX_BUFFER: IoctlId = IoctlId(0x07);
    pub const CLEAR_RX_BUFFER: IoctlId = IoctlId(0x08);
    pub const CLEAR_PERIODIC_MSGS: IoctlId = IoctlId(0x09);
    pub const CLEAR_MSG_FILTERS: IoctlId = IoctlId(0x0A);
    pub const CLEAR_FUNCT_MSG_LOOKUP_TABLE: IoctlId = IoctlId(0x0B);
    pub const ADD_TO_FUNCT_MSG_LOOKUP_TABLE: IoctlId = IoctlId(0x0C);
    pub const DELETE_FROM_FUNCT_MSG_LOOKUP_TABLE: IoctlId = IoctlId(0x0D);
    pub const READ_PROG_VOLTAGE: IoctlId = IoctlId(0x0E);
}

/// Channel configuration parameter used with GET_CONFIG / SET_CONFIG.
///
/// The standard's numbering is non-contiguous (note W0 at 0x19 but
/// W1..W5 at 0x0E..0x12). A handful of timing parameters are managed by
/// the driver itself and must not be read or written by applications;
/// [`ConfigParam::is_driver_internal`] identifies those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigParam(pub u32);

impl ConfigParam {
    pub const DATA_RATE: ConfigParam = ConfigParam(0x01);
    pub const LOOPBACK: ConfigParam = ConfigParam(0x03);
    pub const NODE_ADDRESS: ConfigParam = ConfigParam(0x04);
    pub const NETWORK_LINE: ConfigParam = ConfigParam(0x05);
    pub const P1_MIN: ConfigParam = ConfigParam(0x06);
    pub const P1_MAX: ConfigParam = ConfigParam(0x07);
    pub const P2_MIN: ConfigParam = ConfigParam(0x08);
    pub const P2_MAX: ConfigParam = ConfigParam(0x09);
    pub const P3_MIN: ConfigParam = ConfigParam(0x0A);
    pub const P3_MAX: ConfigParam = ConfigParam(0x0B);
    pub const P4_MIN: ConfigParam = ConfigParam(0x0C);
    pub const P4_MAX: ConfigParam = ConfigParam(0x0D);
    pub const W1: ConfigParam = ConfigParam(0x0E);
    pub const W2: ConfigParam = ConfigParam(0x0F);
    pub const W3: ConfigParam = ConfigParam(0x10);
    pub const W4: ConfigParam = ConfigParam(0x11);
    pub const W5: ConfigParam = ConfigParam(0x12);
    pub const TIDLE: ConfigParam = ConfigParam(0x13);
    pub const TINIL: ConfigParam = ConfigParam(0x14);
    pub const TWUP: ConfigParam = ConfigParam(0x15);
    pub const PARITY: ConfigParam = ConfigParam(0x16);
    pub const BIT_SAMPLE_POINT: ConfigParam = ConfigParam(0x17);
    pub const SYNC_JUMP_WIDTH: ConfigParam = ConfigParam(0x18);
    pub const W0: ConfigParam = ConfigParam(0x19);
    pub const T1_MAX: ConfigParam = ConfigParam(0x1A);
    pub const T2_MAX: ConfigParam = ConfigParam(0x1B);
    pub const T4_MAX: ConfigParam = ConfigParam(0x1C);
    pub const T5_MAX: ConfigParam = ConfigParam(0x1D);
    pub const ISO15765_BS: ConfigParam = ConfigParam(0x1E);
    pub const ISO15765_STMIN: ConfigParam = ConfigParam(0x1F);
    pub const DATA_BITS: ConfigParam = ConfigParam(0x20);
    pub const FIVE_BAUD_MOD: ConfigParam = ConfigParam(0x21);
    pub const BS_TX: ConfigParam = ConfigParam(0x22);
    pub const STMIN_TX: ConfigParam = ConfigParam(0x23);
    pub const T3_MAX: ConfigParam = ConfigParam(0x24);
    pub const ISO15765_WFT_MAX: ConfigParam = ConfigParam(0x25);

    /// Timing parameters owned by the driver. Get/set requests must not
    /// forward these; the binding drops them with a warning instead.
    pub const fn is_driver_internal(self) -> bool {
        matches!(
            self.0,
            0x06 // P1_MIN
            | 0x08 // P2_MIN
            | 0x09 // P2_MAX
            | 0x0B // P3_MAX
            | 0x0D // P4_MAX
        )
    }

    /// The standard's name for this parameter, if it is a named one.
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0x01 => "DATA_RATE",
            0x03 => "LOOPBACK",
            0x04 => "NODE_ADDRESS",
            0x05 => "NETWORK_LINE",
            0x06 => "P1_MIN",
            0x07 => "P1_MAX",
            0x08 => "P2_MIN",
            0x09 => "P2_MAX",
            0x0A => "P3_MIN",
            0x0B => "P3_MAX",
            0x0C => "P4_MIN",
            0x0D => "P4_MAX",
            0x0E => "W1",
            0x0F => "W2",
            0x10 => "W3",
            0x11 => "W4",
            0x12 => "W5",
            0x13 => "TIDLE",
            0x14 => "TINIL",
            0x15 => "TWUP",
            0x16 => "PARITY",
            0x17 => "BIT_SAMPLE_POINT",
            0x18 => "SYNC_JUMP_WIDTH",
            0x19 => "W0",
            0x1A => "T1_MAX",
            0x1B => "T2_MAX",
            0x1C => "T4_MAX",
            0x1D => "T5_MAX",
            0x1E => "ISO15765_BS",
            0x1F => "ISO15765_STMIN",
            0x20 => "DATA_BITS",
            0x21 => "FIVE_BAUD_MOD",
            0x22 => "BS_TX",
            0x23 => "STMIN_TX",
            0x24 => "T3_MAX",
            0x25 => "ISO15765_WFT_MAX",
            _ => return None,
        })
    }
}

impl fmt::Display for ConfigParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:02X}", self.0),
        }
    }
}

/// Split a configuration parameter request into the parameters that may
/// be forwarded to the driver and the driver-internal ones that must be
/// dropped. Caller order is preserved in both halves.
pub fn partition_config_params(params: &[ConfigParam]) -> (Vec<ConfigParam>, Vec<ConfigParam>) {
    params
        .iter()
        .copied()
        .partition(|param| !param.is_driver_internal())
}

/// NETWORK_LINE parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum NetworkLine {
    BusNormal = 0,
    BusPlus = 1,
    BusMinus = 2,
}

/// PARITY parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum Parity {
    None = 0,
    Odd = 1,
    Even = 2,
}

/// DATA_BITS parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum DataBits {
    Eight = 0,
    Seven = 1,
}

/// FIVE_BAUD_MOD parameter values, selecting the handshake variant used
/// by the five-baud initialization sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum FiveBaudMod {
    Iso9141_2AndIso14230_4 = 0,
    Iso9141InvertKey2 = 1,
    Iso9141InvertAddress = 2,
    Iso9141 = 3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_internal_set_is_exact() {
        let internal = [
            ConfigParam::P1_MIN,
            ConfigParam::P2_MIN,
            ConfigParam::P2_MAX,
            ConfigParam::P3_MAX,
            ConfigParam::P4_MAX,
        ];
        for param in internal {
            assert!(param.is_driver_internal(), "{param} should be internal");
        }
        // The matching MIN/MAX counterparts stay settable.
        assert!(!ConfigParam::P1_MAX.is_driver_internal());
        assert!(!ConfigParam::P3_MIN.is_driver_internal());
        assert!(!ConfigParam::P4_MIN.is_driver_internal());
        assert!(!ConfigParam::DATA_RATE.is_driver_internal());
    }

    #[test]
    fn partition_drops_only_internal_params() {
        let (kept, dropped) =
            partition_config_params(&[ConfigParam::P1_MIN, ConfigParam::DATA_RATE]);
        assert_eq!(kept, vec![ConfigParam::DATA_RATE]);
        assert_eq!(dropped, vec![ConfigParam::P1_MIN]);
    }

    #[test]
    fn partition_preserves_request_order() {
        let (kept, dropped) = partition_config_params(&[
            ConfigParam::LOOPBACK,
            ConfigParam::P2_MAX,
            ConfigParam::DATA_RATE,
            ConfigParam::P3_MAX,
        ]);
        assert_eq!(kept, vec![ConfigParam::LOOPBACK, ConfigParam::DATA_RATE]);
        assert_eq!(dropped, vec![ConfigParam::P2_MAX, ConfigParam::P3_MAX]);
    }

    #[test]
    fn display_uses_standard_names() {
        assert_eq!(ConfigParam::ISO15765_STMIN.to_string(), "ISO15765_STMIN");
        assert_eq!(ConfigParam(0x2_0000).to_string(), "0x20000");
    }

    #[test]
    fn non_contiguous_numbering() {
        assert_eq!(ConfigParam::W0.0, 0x19);
        assert_eq!(ConfigParam::W1.0, 0x0E);
        assert_eq!(ConfigParam::T3_MAX.0, 0x24);
        assert_eq!(IoctlId::READ_PROG_VOLTAGE.0, 0x0E);
    }
}
