use crate::protocol::{USB_CLASS_APPLICATION_SPECIFIC, USB_PROTOCOL_DFU_MODE, USB_SUBCLASS_DFU};

const DESC_DESCTYPE_INTERFACE: u8 = 0x04;
const INTERFACE_DESC_LEN: usize = 9;

/// The fields of a standard interface descriptor DFU cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfaceDescriptor {
    /// `bInterfaceNumber`
    pub number: u8,
    /// `bInterfaceClass`
    pub class: u8,
    /// `bInterfaceSubClass`
    pub subclass: u8,
    /// `bInterfaceProtocol`
    pub protocol: u8,
}

impl InterfaceDescriptor {
    /// DFU mode interface descriptor for interface `number`.
    pub const fn dfu_mode(number: u8) -> Self {
        Self {
            number,
            class: USB_CLASS_APPLICATION_SPECIFIC,
            subclass: USB_SUBCLASS_DFU,
            protocol: USB_PROTOCOL_DFU_MODE,
        }
    }

    /// Parses a raw interface descriptor, starting at its `bLength` byte.
    ///
    /// Returns `None` if `raw` is too short or is not an interface descriptor.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() < INTERFACE_DESC_LEN || raw[1] != DESC_DESCTYPE_INTERFACE {
            return None;
        }
        if (raw[0] as usize) < INTERFACE_DESC_LEN {
            return None;
        }

        Some(Self {
            number: raw[2],
            class: raw[5],
            subclass: raw[6],
            protocol: raw[7],
        })
    }

    /// `true` if `bInterfaceClass` is the DFU class.
    pub fn is_dfu(&self) -> bool {
        self.class == USB_CLASS_APPLICATION_SPECIFIC
    }
}

/// DFU functional descriptor.
///
/// Attributes are baked into the device's descriptor set, the protocol
/// handler only reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FunctionalDescriptor {
    attributes: u8,
    detach_timeout: u16,
    transfer_size: u16,
}

impl FunctionalDescriptor {
    /// Bit 0: `bitCanDnload`
    pub const BIT_CAN_DNLOAD: u8 = 1 << 0;
    /// Bit 1: `bitCanUpload`
    pub const BIT_CAN_UPLOAD: u8 = 1 << 1;
    /// Bit 2: `bitManifestationTolerant`
    pub const BIT_MANIFESTATION_TOLERANT: u8 = 1 << 2;
    /// Bit 3: `bitWillDetach`
    pub const BIT_WILL_DETACH: u8 = 1 << 3;

    /// `bcdDFUVersion`, 1.1
    pub const DFU_VERSION: u16 = 0x0110;

    /// Default `wTransferSize`, the size of `usb-device`'s control buffer.
    pub const DEFAULT_TRANSFER_SIZE: u16 = 128;

    /// Descriptor with the given `bmAttributes`, a 250 ms detach timeout,
    /// and a [`DEFAULT_TRANSFER_SIZE`](Self::DEFAULT_TRANSFER_SIZE) transfer size.
    pub const fn new(attributes: u8) -> Self {
        Self {
            attributes,
            detach_timeout: 250,
            transfer_size: Self::DEFAULT_TRANSFER_SIZE,
        }
    }

    /// Sets `wDetachTimeOut`, in milliseconds.
    pub const fn detach_timeout(mut self, ms: u16) -> Self {
        self.detach_timeout = ms;
        self
    }

    /// Sets `wTransferSize`.
    ///
    /// **Warning**: must be less or equal of `usb-device`'s control endpoint buffer size
    /// (`128` bytes unless its `control-buffer-256` feature is enabled),
    /// otherwise data transfers will fail for no obvious reason.
    ///
    /// Values above [`DOWNLOAD_BUFFER_SIZE`](crate::DOWNLOAD_BUFFER_SIZE) are never useful, such blocks
    /// are rejected.
    pub const fn transfer_size(mut self, size: u16) -> Self {
        self.transfer_size = size;
        self
    }

    /// `bmAttributes`
    pub fn attributes(&self) -> u8 {
        self.attributes
    }

    /// Download capable (`bitCanDnload`)
    #[doc(alias = "bitCanDnload")]
    pub fn can_download(&self) -> bool {
        self.attributes & Self::BIT_CAN_DNLOAD != 0
    }

    /// Device is able to communicate via USB after
    /// Manifestation phase (`bitManifestationTolerant`)
    #[doc(alias = "bitManifestationTolerant")]
    pub fn manifestation_tolerant(&self) -> bool {
        self.attributes & Self::BIT_MANIFESTATION_TOLERANT != 0
    }

    /// Device will perform a bus detach-attach sequence when it receives
    /// a `DFU_DETACH` request (`bitWillDetach`).
    #[doc(alias = "bitWillDetach")]
    pub fn will_detach(&self) -> bool {
        self.attributes & Self::BIT_WILL_DETACH != 0
    }

    /// `wDetachTimeOut`
    pub fn get_detach_timeout(&self) -> u16 {
        self.detach_timeout
    }

    /// `wTransferSize`
    pub fn get_transfer_size(&self) -> u16 {
        self.transfer_size
    }

    /// Descriptor body, everything after `bLength` and `bDescriptorType`.
    ///
    /// Upload is not implemented, so `bitCanUpload` is never set.
    pub fn body(&self) -> [u8; 7] {
        let dt = self.detach_timeout.to_le_bytes();
        let ts = self.transfer_size.to_le_bytes();
        let ver = Self::DFU_VERSION.to_le_bytes();
        [
            // bmAttributes
            self.attributes & !Self::BIT_CAN_UPLOAD,
            // wDetachTimeOut
            dt[0],
            dt[1],
            // wTransferSize
            ts[0],
            ts[1],
            // bcdDFUVersion
            ver[0],
            ver[1],
        ]
    }
}

impl Default for FunctionalDescriptor {
    fn default() -> Self {
        Self::new(Self::BIT_CAN_DNLOAD | Self::BIT_MANIFESTATION_TOLERANT)
    }
}
