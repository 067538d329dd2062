#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
//!
//! Implements the device side of the DFU (Device Firmware Upgrade) protocol,
//! DFU mode only, for a `usb-device` device.
//!
//! ## About
//!
//! DFU protocol aims to provide a standard how USB device's firmware
//! can be upgraded. The host transfers a firmware image in blocks using
//! class requests on the control endpoint, polls the device status between
//! blocks, and finally triggers a "manifestation" phase during which the
//! device validates and activates the new image.
//!
//! This library is a protocol implementation only. [`DFUFunction`] interprets
//! DFU class requests and keeps the DFU state machine, and stages one
//! downloaded block at a time in a [`DOWNLOAD_BUFFER_SIZE`]-byte buffer.
//! Writing that block to flash is up to the library user, and is expected to
//! happen outside of the USB interrupt context, while the host waits for the
//! poll timeout reported by `DFU_GETSTATUS`.
//!
//! ### Supported requests
//!
//! * `DFU_DNLOAD` - write (host to device), up to [`DOWNLOAD_BUFFER_SIZE`] bytes per block
//! * `DFU_GETSTATUS`, `DFU_GETSTATE`
//! * `DFU_CLRSTATUS`, `DFU_ABORT`
//!
//! ### Not supported requests
//!
//! * `DFU_UPLOAD` - read (device to host).
//! * `DFU_DETACH` - only meaningful for a run-time DFU interface.
//!
//! Both stall the control pipe and put the device into `dfuERROR`.
//!
//! ### Limitations
//!
//! * Block offset is `wValue * 512`, independently of the transfer size
//! advertised in the functional descriptor.
//!
//! * Maximum USB transfer size is limited to what `usb-device` supports
//! for control endpoint transfers, which is `128` bytes by default.
//!
//! * iString field in `DFU_GETSTATUS` is always `0`.
//!
//! * A USB reset after manifestation is passed to [`DFUMemIO::usb_reset()`],
//! which is expected to start the new firmware.
//!
//! ## Features
//!
//! | Feature | Description |
//! | ------- | ----------- |
//! | `defmt` | Enable logging via [defmt](https://crates.io/crates/defmt) crate |
//! | `log`   | Enable logging via [log](https://crates.io/crates/log) crate |
//!
//! ## Example
//!
//! [`DFUFunction`] does not depend on a particular USB stack. The transport
//! passes every control request to [`DFUFunction::request()`] and completes,
//! stalls, or passes the transfer on according to the result.
//!
//! ```
//! use usb_device::control::{Recipient, Request, RequestType};
//! use usb_device::endpoint::EndpointAddress;
//! use usb_device::UsbDirection;
//! use usbd_dfu_device::*;
//!
//! struct MyMem {
//!     flash_memory: [u8; 1024],
//! }
//!
//! impl DFUMemIO for MyMem {
//!     fn program_block(&mut self, offset: u32, data: &[u8]) -> Result<(), DFUMemError> {
//!         let offset = offset as usize;
//!         let dst = self
//!             .flash_memory
//!             .get_mut(offset..offset + data.len())
//!             .ok_or(DFUMemError::Address)?;
//!         dst.copy_from_slice(data);
//!         Ok(())
//!     }
//!
//!     fn manifestation(&mut self) -> Result<(), DFUManifestationError> {
//!         Ok(())
//!     }
//! }
//!
//! let mut dfu = DFUFunction::new(FunctionalDescriptor::default());
//! dfu.init(DeviceStage::Powered).unwrap();
//! dfu.control(FunctionControl::Enable(&InterfaceDescriptor::dfu_mode(0))).unwrap();
//!
//! let ep0 = EndpointAddress::from_parts(0, UsbDirection::Out);
//! let dnload = Request {
//!     direction: UsbDirection::Out,
//!     request_type: RequestType::Class,
//!     recipient: Recipient::Interface,
//!     request: 0x01,
//!     value: 1,
//!     index: 0,
//!     length: 4,
//! };
//!
//! // SETUP: the function arms its staging buffer, the transport fills it
//! if let Ok(Reply::Receive(buf)) = dfu.request(ep0, &dnload, ControlStage::Setup) {
//!     buf.copy_from_slice(&[1, 2, 3, 4]);
//! }
//! // DATA: the block is staged
//! assert_eq!(dfu.request(ep0, &dnload, ControlStage::Data), Ok(Reply::Ack));
//! assert_eq!(dfu.state(), DFUState::DfuDnloadSync);
//!
//! let getstatus = Request {
//!     direction: UsbDirection::In,
//!     request: 0x03,
//!     length: 6,
//!     ..dnload
//! };
//! let ep0in = EndpointAddress::from_parts(0, UsbDirection::In);
//! assert!(dfu.request(ep0in, &getstatus, ControlStage::Setup).is_ok());
//! assert_eq!(dfu.state(), DFUState::DfuDnBusy);
//!
//! // Outside of USB interrupt: program the block.
//! let mut mem = MyMem { flash_memory: [0xff; 1024] };
//! dfu.update(&mut mem);
//! assert_eq!(&mem.flash_memory[512..516], &[1, 2, 3, 4]);
//! assert_eq!(dfu.state(), DFUState::DfuDnloadIdle);
//! ```
//!
//! With `usb-device`, [`DFUClass`] does the above. Construct it before the
//! `UsbDevice`, poll it from the USB interrupt, and call
//! [`DFUClass::update()`] from the main loop:
//!
//! ```ignore
//! let mut dfu = DFUClass::new(&usb_bus_alloc, FunctionalDescriptor::default(), "DFU");
//! let mut usb_dev = UsbDeviceBuilder::new(&usb_bus_alloc, UsbVidPid(0x1209, 0x0001)).build();
//!
//! // usb_dev.poll() must be called periodically, usually from USB interrupt handlers.
//! usb_dev.poll(&mut [&mut dfu]);
//!
//! // Elsewhere, with `dfu` shared through a mutex:
//! dfu.update(&mut my_mem);
//! ```

#[macro_use]
mod fmt;

/// Download staging buffer
pub mod buffer;
/// usb-device class
pub mod class;
/// Interface and DFU functional descriptors
pub mod descriptor;
/// Error codes
pub mod error;
/// DFU function driver
pub mod function;
/// Flash access for the consumer side
pub mod mem;
/// DFU protocol module
pub mod protocol;

#[doc(inline)]
pub use crate::buffer::{DownloadBlock, DownloadBuffer, DOWNLOAD_BUFFER_SIZE};
#[doc(inline)]
pub use crate::class::DFUClass;
#[doc(inline)]
pub use crate::descriptor::{FunctionalDescriptor, InterfaceDescriptor};
#[doc(inline)]
pub use crate::error::DfuError;
#[doc(inline)]
pub use crate::function::{
    ControlStage, DFUFunction, DeviceStage, FunctionControl, FunctionState, Reply,
};
#[doc(inline)]
pub use crate::mem::{DFUManifestationError, DFUMemError, DFUMemIO};
#[doc(inline)]
pub use crate::protocol::{
    advance_on_status_poll, DFUState, DFUStatusCode, StatusResponse, STATUS_RESPONSE_LEN,
};
