use crate::protocol::DFUStatusCode;

/// Failure to program a block, reported to the host as the `bStatus`
/// of the same name.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DFUMemError {
    /// `errTARGET`
    Target = DFUStatusCode::ErrTarget as u8,
    /// `errFILE`
    File = DFUStatusCode::ErrFile as u8,
    /// `errWRITE`
    Write = DFUStatusCode::ErrWrite as u8,
    /// `errERASE`
    Erase = DFUStatusCode::ErrErase as u8,
    /// `errCHECK_ERASED`
    CheckErased = DFUStatusCode::ErrCheckErased as u8,
    /// `errPROG`
    Prog = DFUStatusCode::ErrProg as u8,
    /// `errVERIFY`
    Verify = DFUStatusCode::ErrVerify as u8,
    /// `errUNKNOWN`
    Unknown = DFUStatusCode::ErrUnknown as u8,
    /// `errADDRESS`, the block does not fit into the target region.
    Address = DFUStatusCode::ErrAddress as u8,
    /// `errVENDOR`. `iString` of the `DFU_GETSTATUS` reply is always 0.
    ErrVendor = DFUStatusCode::ErrVendor as u8,
}

/// Failure to manifest the downloaded image.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DFUManifestationError {
    /// `errTARGET`
    Target = DFUStatusCode::ErrTarget as u8,
    /// `errFILE`
    File = DFUStatusCode::ErrFile as u8,
    /// `errNOTDONE`, the image is incomplete.
    NotDone = DFUStatusCode::ErrNotdone as u8,
    /// `errFIRMWARE`
    Firmware = DFUStatusCode::ErrFirmware as u8,
    /// `errVENDOR`. `iString` of the `DFU_GETSTATUS` reply is always 0.
    ErrVendor = DFUStatusCode::ErrVendor as u8,
    /// `errUNKNOWN`
    Unknown = DFUStatusCode::ErrUnknown as u8,
}

impl From<DFUMemError> for DFUStatusCode {
    fn from(e: DFUMemError) -> Self {
        match e {
            DFUMemError::File => DFUStatusCode::ErrFile,
            DFUMemError::Target => DFUStatusCode::ErrTarget,
            DFUMemError::Address => DFUStatusCode::ErrAddress,
            DFUMemError::CheckErased => DFUStatusCode::ErrCheckErased,
            DFUMemError::Erase => DFUStatusCode::ErrErase,
            DFUMemError::Write => DFUStatusCode::ErrWrite,
            DFUMemError::Prog => DFUStatusCode::ErrProg,
            DFUMemError::Verify => DFUStatusCode::ErrVerify,
            DFUMemError::Unknown => DFUStatusCode::ErrUnknown,
            DFUMemError::ErrVendor => DFUStatusCode::ErrVendor,
        }
    }
}

impl From<DFUManifestationError> for DFUStatusCode {
    fn from(e: DFUManifestationError) -> Self {
        match e {
            DFUManifestationError::NotDone => DFUStatusCode::ErrNotdone,
            DFUManifestationError::Firmware => DFUStatusCode::ErrFirmware,
            DFUManifestationError::Unknown => DFUStatusCode::ErrUnknown,
            DFUManifestationError::ErrVendor => DFUStatusCode::ErrVendor,
            DFUManifestationError::File => DFUStatusCode::ErrFile,
            DFUManifestationError::Target => DFUStatusCode::ErrTarget,
        }
    }
}

/// Memory access used by [`DFUFunction::update()`](crate::DFUFunction::update)
/// to consume downloaded firmware.
///
/// Unlike the USB side, these functions are not called from the USB
/// interrupt context. They run wherever `update()` is called from, usually
/// a main loop or a background task, so they may take as long as flash
/// programming takes.
pub trait DFUMemIO {
    /// Write a downloaded block to non-volatile memory.
    ///
    /// `offset` is the byte offset of `data` in the firmware image: the block
    /// number multiplied by [`DOWNLOAD_BUFFER_SIZE`](crate::DOWNLOAD_BUFFER_SIZE).
    ///
    /// Implementation must check that the whole block fits into the target
    /// region.
    fn program_block(&mut self, offset: u32, data: &[u8]) -> Result<(), DFUMemError>;

    /// Finish writing firmware to a persistent storage, and optionally activate it.
    ///
    /// Called once after the host has signalled the end of the download and
    /// polled the status.
    fn manifestation(&mut self) -> Result<(), DFUManifestationError>;

    /// Start the new firmware.
    ///
    /// Called once after the host has reset a device that is not manifestation
    /// tolerant and is waiting in `dfuMANIFEST-WAIT-RESET`. Usually resets the
    /// MCU and does not return. If it does, the device reports `errFIRMWARE`.
    fn usb_reset(&mut self) {}
}
