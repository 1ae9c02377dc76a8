//! Native status-code taxonomy and the binding's failure type.

use std::fmt;

use thiserror::Error;

/// Classification of a native status code.
///
/// Codes 0x00 through 0x1A are defined by J2534-1. Everything above falls
/// into one of two reserved bands, so [`Status::classify`] is total over
/// `u32`: every possible code maps to a kind and a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    NoError,
    NotSupported,
    InvalidChannelId,
    InvalidProtocolId,
    NullParameter,
    InvalidIoctlValue,
    InvalidFlags,
    Failed,
    DeviceNotConnected,
    Timeout,
    InvalidMsg,
    InvalidTimeInterval,
    ExceededLimit,
    InvalidMsgId,
    DeviceInUse,
    InvalidIoctlId,
    BufferEmpty,
    BufferFull,
    BufferOverflow,
    PinInvalid,
    ChannelInUse,
    MsgProtocolId,
    InvalidFilterId,
    NoFlowControl,
    NotUnique,
    InvalidBaudrate,
    InvalidDeviceId,
    /// 0x1B through 0xFFFF, reserved for SAE J2534-1.
    ReservedStandard,
    /// 0x10000 and above, reserved for SAE J2534-2.
    ReservedExtension,
}

impl Status {
    /// Classify a raw status code. Never fails: reserved and
    /// manufacturer codes map to the reserved kinds.
    pub const fn classify(code: u32) -> Status {
        match code {
            0x00 => Status::NoError,
            0x01 => Status::NotSupported,
            0x02 => Status::InvalidChannelId,
            0x03 => Status::InvalidProtocolId,
            0x04 => Status::NullParameter,
            0x05 => Status::InvalidIoctlValue,
            0x06 => Status::InvalidFlags,
            0x07 => Status::Failed,
            0x08 => Status::DeviceNotConnected,
            0x09 => Status::Timeout,
            0x0A => Status::InvalidMsg,
            0x0B => Status::InvalidTimeInterval,
            0x0C => Status::ExceededLimit,
            0x0D => Status::InvalidMsgId,
            0x0E => Status::DeviceInUse,
            0x0F => Status::InvalidIoctlId,
            0x10 => Status::BufferEmpty,
            0x11 => Status::BufferFull,
            0x12 => Status::BufferOverflow,
            0x13 => Status::PinInvalid,
            0x14 => Status::ChannelInUse,
            0x15 => Status::MsgProtocolId,
            0x16 => Status::InvalidFilterId,
            0x17 => Status::NoFlowControl,
            0x18 => Status::NotUnique,
            0x19 => Status::InvalidBaudrate,
            0x1A => Status::InvalidDeviceId,
            0x1B..=0xFFFF => Status::ReservedStandard,
            _ => Status::ReservedExtension,
        }
    }

    /// The SAE constant name for this kind, e.g. `ERR_TIMEOUT`.
    pub const fn name(self) -> &'static str {
        match self {
            Status::NoError => "STATUS_NOERROR",
            Status::NotSupported => "ERR_NOT_SUPPORTED",
            Status::InvalidChannelId => "ERR_INVALID_CHANNEL_ID",
            Status::InvalidProtocolId => "ERR_INVALID_PROTOCOL_ID",
            Status::NullParameter => "ERR_NULL_PARAMETER",
            Status::InvalidIoctlValue => "ERR_INVALID_IOCTL_VALUE",
            Status::InvalidFlags => "ERR_INVALID_FLAGS",
            Status::Failed => "ERR_FAILED",
            Status::DeviceNotConnected => "ERR_DEVICE_NOT_CONNECTED",
            Status::Timeout => "ERR_TIMEOUT",
            Status::InvalidMsg => "ERR_INVALID_MSG",
            Status::InvalidTimeInterval => "ERR_INVALID_TIME_INTERVAL",
            Status::ExceededLimit => "ERR_EXCEEDED_LIMIT",
            Status::InvalidMsgId => "ERR_INVALID_MSG_ID",
            Status::DeviceInUse => "ERR_DEVICE_IN_USE",
            Status::InvalidIoctlId => "ERR_INVALID_IOCTL_ID",
            Status::BufferEmpty => "ERR_BUFFER_EMPTY",
            Status::BufferFull => "ERR_BUFFER_FULL",
            Status::BufferOverflow => "ERR_BUFFER_OVERFLOW",
            Status::PinInvalid => "ERR_PIN_INVALID",
            Status::ChannelInUse => "ERR_CHANNEL_IN_USE",
            Status::MsgProtocolId => "ERR_MSG_PROTOCOL_ID",
            Status::InvalidFilterId => "ERR_INVALID_FILTER_ID",
            Status::NoFlowControl => "ERR_NO_FLOW_CONTROL",
            Status::NotUnique => "ERR_NOT_UNIQUE",
            Status::InvalidBaudrate => "ERR_INVALID_BAUDRATE",
            Status::InvalidDeviceId => "ERR_INVALID_DEVICE_ID",
            Status::ReservedStandard => "RESERVED_J2534_1",
            Status::ReservedExtension => "RESERVED_J2534_2",
        }
    }

    /// The canonical J2534-1 description for this kind.
    pub const fn description(self) -> &'static str {
        match self {
            Status::NoError => "Function call successful",
            Status::NotSupported => {
                "Device cannot support requested functionality mandated in this document. \
                 Device is not fully SAE J2534 compliant"
            }
            Status::InvalidChannelId => "Invalid ChannelID value",
            Status::InvalidProtocolId => {
                "Invalid ProtocolID value, unsupported ProtocolID, or there is a resource \
                 conflict (i.e. trying to connect to multiple protocols that are mutually \
                 exclusive such as J1850PWM and J1850VPW, or CAN and SCI A, etc.)"
            }
            Status::NullParameter => "NULL pointer supplied where a valid pointer is required",
            Status::InvalidIoctlValue => "Invalid value for Ioctl parameter",
            Status::InvalidFlags => "Invalid flag values",
            Status::Failed => "Undefined error, use PassThruGetLastError for text description",
            Status::DeviceNotConnected => "Device ID invalid",
            Status::Timeout => {
                "Timeout. PassThruReadMsg: No message available to read or could not read \
                 the specified number of messages. The actual number of messages read is \
                 placed in <NumMsgs> PassThruWriteMsg: Device could not write the specified \
                 number of messages. The actual number of messages sent on the vehicle \
                 network is placed in <NumMsgs>."
            }
            Status::InvalidMsg => {
                "Invalid message structure pointed to by pMsg (Reference Section 8 - \
                 Message Structure)"
            }
            Status::InvalidTimeInterval => "Invalid TimeInterval value",
            Status::ExceededLimit => "Exceeded maximum number of message IDs or allocated space",
            Status::InvalidMsgId => "Invalid MsgID value",
            Status::DeviceInUse => "Device is currently open",
            Status::InvalidIoctlId => "Invalid IoctlID value",
            Status::BufferEmpty => "Protocol message buffer empty, no messages available to read",
            Status::BufferFull => {
                "Protocol message buffer full. All the messages specified may not have been \
                 transmitted"
            }
            Status::BufferOverflow => "Indicates a buffer overflow occurred and messages were lost",
            Status::PinInvalid => {
                "Invalid pin number, pin number already in use, or voltage already applied \
                 to a different pin"
            }
            Status::ChannelInUse => "Channel number is currently connected",
            Status::MsgProtocolId => {
                "Protocol type in the message does not match the protocol associated with \
                 the Channel ID"
            }
            Status::InvalidFilterId => "Invalid Filter ID value",
            Status::NoFlowControl => {
                "No flow control filter set or matched (for protocolID ISO15765 only)."
            }
            Status::NotUnique => {
                "A CAN ID in pPatternMsg or pFlowControlMsg matches either ID in an \
                 existing FLOW_CONTROL_FILTER"
            }
            Status::InvalidBaudrate => {
                "The desired baud rate cannot be achieved within the tolerance specified \
                 in Section 6.5"
            }
            Status::InvalidDeviceId => "Unable to communicate with device",
            Status::ReservedStandard => "Reserved for SAE J2534-1",
            Status::ReservedExtension => "Reserved for SAE J2534-2",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A non-success status code reported by the native library.
///
/// Keeps the raw code alongside the classified kind so reserved and
/// manufacturer-specific codes stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusError {
    pub status: Status,
    pub code: u32,
}

impl StatusError {
    pub fn from_code(code: u32) -> StatusError {
        StatusError {
            status: Status::classify(code),
            code,
        }
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status.name(), self.status.description())
    }
}

impl std::error::Error for StatusError {}

/// Failures surfaced by the binding.
#[derive(Debug, Error)]
pub enum PassThruError {
    /// The native library could not be loaded or an entry point was
    /// missing. Raised only while initializing the binding.
    #[error("failed to load Pass-Thru library: {0}")]
    LibraryLoad(#[from] libloading::Error),

    /// The native layer reported a non-success status code.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// Periodic message interval outside the 5-65535 ms range the
    /// standard defines; rejected before any native call.
    #[error("periodic message interval of {0} ms is outside the supported 5-65535 ms range")]
    InvalidInterval(u32),

    /// Programming voltage outside 5000-20000 mV and not one of the two
    /// sentinels; rejected before any native call.
    #[error("programming voltage of {0} mV is outside the supported 5000-20000 mV range")]
    InvalidVoltage(u32),
}

impl PassThruError {
    /// The classified status kind, when the failure came from the native
    /// layer.
    pub fn status(&self) -> Option<Status> {
        match self {
            PassThruError::Status(err) => Some(err.status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PassThruError>;

/// Map a raw native return code onto the taxonomy.
pub(crate) fn check_status(code: i32) -> std::result::Result<(), StatusError> {
    if code == 0 {
        Ok(())
    } else {
        Err(StatusError::from_code(code as u32))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn defined_codes_classify_exactly() {
        let expected = [
            (0x00, Status::NoError),
            (0x01, Status::NotSupported),
            (0x02, Status::InvalidChannelId),
            (0x03, Status::InvalidProtocolId),
            (0x04, Status::NullParameter),
            (0x05, Status::InvalidIoctlValue),
            (0x06, Status::InvalidFlags),
            (0x07, Status::Failed),
            (0x08, Status::DeviceNotConnected),
            (0x09, Status::Timeout),
            (0x0A, Status::InvalidMsg),
            (0x0B, Status::InvalidTimeInterval),
            (0x0C, Status::ExceededLimit),
            (0x0D, Status::InvalidMsgId),
            (0x0E, Status::DeviceInUse),
            (0x0F, Status::InvalidIoctlId),
            (0x10, Status::BufferEmpty),
            (0x11, Status::BufferFull),
            (0x12, Status::BufferOverflow),
            (0x13, Status::PinInvalid),
            (0x14, Status::ChannelInUse),
            (0x15, Status::MsgProtocolId),
            (0x16, Status::InvalidFilterId),
            (0x17, Status::NoFlowControl),
            (0x18, Status::NotUnique),
            (0x19, Status::InvalidBaudrate),
            (0x1A, Status::InvalidDeviceId),
        ];
        for (code, status) in expected {
            assert_eq!(Status::classify(code), status, "code 0x{code:02X}");
        }
    }

    #[test]
    fn reserved_bands() {
        assert_eq!(Status::classify(0x1B), Status::ReservedStandard);
        assert_eq!(Status::classify(0xFFFF), Status::ReservedStandard);
        assert_eq!(Status::classify(0x10000), Status::ReservedExtension);
        assert_eq!(Status::classify(u32::MAX), Status::ReservedExtension);
    }

    #[test]
    fn display_renders_name_then_description() {
        let err = StatusError::from_code(0x02);
        assert_eq!(
            err.to_string(),
            "[ERR_INVALID_CHANNEL_ID] Invalid ChannelID value"
        );
        let reserved = StatusError::from_code(0x1234);
        assert_eq!(reserved.code, 0x1234);
        assert_eq!(
            reserved.to_string(),
            "[RESERVED_J2534_1] Reserved for SAE J2534-1"
        );
    }

    #[test]
    fn precondition_errors_render_the_offending_value() {
        assert!(PassThruError::InvalidInterval(4).to_string().contains("4 ms"));
        assert!(PassThruError::InvalidVoltage(4_999)
            .to_string()
            .contains("4999 mV"));
    }

    #[test]
    fn check_status_passes_success_through() {
        assert!(check_status(0).is_ok());
        let err = check_status(0x09).unwrap_err();
        assert_eq!(err.status, Status::Timeout);
    }

    proptest! {
        #[test]
        fn classification_is_total(code in any::<u32>()) {
            let status = Status::classify(code);
            prop_assert!(!status.name().is_empty());
            prop_assert!(!status.description().is_empty());
            // The rendered form always follows the same shape.
            let rendered = StatusError { status, code }.to_string();
            prop_assert!(rendered.starts_with('['));
        }
    }
}
