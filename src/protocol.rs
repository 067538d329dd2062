//! DFU protocol constants, states, status codes and the `DFU_GETSTATUS`
//! reply format.

/// `bInterfaceClass` of a DFU interface (Application Specific).
pub const USB_CLASS_APPLICATION_SPECIFIC: u8 = 0xFE;
/// `bInterfaceSubClass` of a DFU interface.
pub const USB_SUBCLASS_DFU: u8 = 0x01;

/// `bInterfaceProtocol` of a run-time DFU interface.
pub const USB_PROTOCOL_RUN_TIME: u8 = 0x01;
/// `bInterfaceProtocol` of a DFU mode interface.
pub const USB_PROTOCOL_DFU_MODE: u8 = 0x02;

/// `bDescriptorType` of the DFU functional descriptor.
pub const DESC_DESCTYPE_DFU: u8 = 0x21;

pub(crate) const DFU_DETACH: u8 = 0x00;
pub(crate) const DFU_DNLOAD: u8 = 0x01;
pub(crate) const DFU_UPLOAD: u8 = 0x02;
pub(crate) const DFU_GETSTATUS: u8 = 0x03;
pub(crate) const DFU_CLRSTATUS: u8 = 0x04;
pub(crate) const DFU_GETSTATE: u8 = 0x05;
pub(crate) const DFU_ABORT: u8 = 0x06;

/// Size of the `DFU_GETSTATUS` reply.
pub const STATUS_RESPONSE_LEN: usize = 6;

/// DFU device state, as reported in `bState`.
///
/// The run-time states and `dfuUPLOAD-IDLE` are part of the numbering but are
/// never entered by [`DFUFunction`](crate::DFUFunction).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DFUState {
    /// `appIDLE`, run-time mode.
    AppIdle = 0,
    /// `appDETACH`, run-time mode after `DFU_DETACH`, waiting for a reset.
    AppDetach = 1,
    /// `dfuIDLE`, waiting for the first `DFU_DNLOAD`.
    DfuIdle = 2,
    /// `dfuDNLOAD-SYNC`, a block is staged, waiting for `DFU_GETSTATUS`.
    DfuDnloadSync = 3,
    /// `dfuDNBUSY`, the staged block is being programmed.
    DfuDnBusy = 4,
    /// `dfuDNLOAD-IDLE`, the block is programmed, waiting for the next `DFU_DNLOAD`.
    DfuDnloadIdle = 5,
    /// `dfuMANIFEST-SYNC`, waiting for `DFU_GETSTATUS` to start manifestation,
    /// or to report it complete.
    DfuManifestSync = 6,
    /// `dfuMANIFEST`, manifestation in progress.
    DfuManifest = 7,
    /// `dfuMANIFEST-WAIT-RESET`, new firmware is in place, waiting for a USB reset.
    DfuManifestWaitReset = 8,
    /// `dfuUPLOAD-IDLE`
    DfuUploadIdle = 9,
    /// `dfuERROR`, waiting for `DFU_CLRSTATUS`.
    DfuError = 10,
}

/// DFU status code, as reported in `bStatus`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DFUStatusCode {
    /// `OK`
    OK = 0x00,
    /// `errTARGET`, the image is for another device.
    ErrTarget = 0x01,
    /// `errFILE`, the image failed a vendor-specific check.
    ErrFile = 0x02,
    /// `errWRITE`, memory could not be written.
    ErrWrite = 0x03,
    /// `errERASE`, erase failed.
    ErrErase = 0x04,
    /// `errCHECK_ERASED`, erase check failed.
    ErrCheckErased = 0x05,
    /// `errPROG`, programming failed.
    ///
    /// Also reported when the host issues `DFU_DNLOAD` out of sequence.
    ErrProg = 0x06,
    /// `errVERIFY`, verification after programming failed.
    ErrVerify = 0x07,
    /// `errADDRESS`, block offset is out of range.
    ErrAddress = 0x08,
    /// `errNOTDONE`, the download ended before the whole image arrived.
    ErrNotdone = 0x09,
    /// `errFIRMWARE`, firmware is corrupt and can not be started.
    ErrFirmware = 0x0A,
    /// `errVENDOR`
    ErrVendor = 0x0B,
    /// `errUSBR`, unexpected USB reset.
    ErrUsbr = 0x0C,
    /// `errPOR`, unexpected power on reset.
    ErrPOR = 0x0D,
    /// `errUNKNOWN`
    ErrUnknown = 0x0E,
    /// `errSTALLEDPKT`, an unexpected request was stalled.
    ErrStalledPkt = 0x0F,
}

/// State the device moves to after it has answered a `DFU_GETSTATUS` poll.
///
/// `DFU_GETSTATUS` is not a pure read: it is the host's acknowledgement that
/// moves a synchronization state forward.
///
/// * `dfuDNLOAD-SYNC` becomes `dfuDNBUSY`, the staged block may be programmed now.
/// * `dfuMANIFEST-SYNC` becomes `dfuMANIFEST` while manifestation is not complete.
///   Once it is, the device returns to `dfuIDLE` when it is manifestation tolerant,
///   or parks in `dfuMANIFEST-WAIT-RESET` otherwise.
///
/// All other states are returned unchanged.
pub fn advance_on_status_poll(
    state: DFUState,
    manifestation_complete: bool,
    manifestation_tolerant: bool,
) -> DFUState {
    match state {
        DFUState::DfuDnloadSync => DFUState::DfuDnBusy,
        DFUState::DfuManifestSync => {
            if !manifestation_complete {
                DFUState::DfuManifest
            } else if manifestation_tolerant {
                DFUState::DfuIdle
            } else {
                DFUState::DfuManifestWaitReset
            }
        }
        s => s,
    }
}

/// Reply to `DFU_GETSTATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusResponse {
    /// `bStatus`
    pub status: DFUStatusCode,
    /// `bwPollTimeout`, only the lower 24 bits are transmitted.
    pub poll_timeout: u32,
    /// `bState`
    pub state: DFUState,
}

impl From<StatusResponse> for [u8; STATUS_RESPONSE_LEN] {
    fn from(rsp: StatusResponse) -> Self {
        [
            // bStatus
            rsp.status as u8,
            // bwPollTimeout
            (rsp.poll_timeout & 0xff) as u8,
            ((rsp.poll_timeout >> 8) & 0xff) as u8,
            ((rsp.poll_timeout >> 16) & 0xff) as u8,
            // bState
            rsp.state as u8,
            // iString: Index of status description in string table.
            0,
        ]
    }
}
