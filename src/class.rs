use core::marker::PhantomData;
use usb_device::class_prelude::*;
use usb_device::{LangID, UsbDirection};

use crate::descriptor::{FunctionalDescriptor, InterfaceDescriptor};
use crate::error::DfuError;
use crate::function::{ControlStage, DFUFunction, DeviceStage, FunctionControl, Reply};
use crate::mem::DFUMemIO;
use crate::protocol::*;

/// DFU protocol USB class implementation for usb-device library.
///
/// Owns a [`DFUFunction`] and feeds it the control requests `usb-device`
/// receives on the control endpoint.
pub struct DFUClass<B: UsbBus> {
    if_num: InterfaceNumber,
    interface_string: StringIndex,
    name: &'static str,
    function: DFUFunction,
    _bus: PhantomData<B>,
}

impl<B: UsbBus> UsbClass<B> for DFUClass<B> {
    fn get_configuration_descriptors(
        &self,
        writer: &mut DescriptorWriter,
    ) -> usb_device::Result<()> {
        writer.interface_alt(
            self.if_num,
            0,
            USB_CLASS_APPLICATION_SPECIFIC,
            USB_SUBCLASS_DFU,
            USB_PROTOCOL_DFU_MODE,
            Some(self.interface_string),
        )?;

        // DFU Functional descriptor
        writer.write(DESC_DESCTYPE_DFU, &self.function.descriptor().body())?;

        Ok(())
    }

    fn get_string(&self, index: StringIndex, _lang_id: LangID) -> Option<&str> {
        if index == self.interface_string {
            return Some(self.name);
        }
        None
    }

    fn reset(&mut self) {
        self.function.usb_reset();
    }

    // Handle control requests to the host.
    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();
        let ep = EndpointAddress::from_parts(0, UsbDirection::In);

        match self.function.request(ep, &req, ControlStage::Setup) {
            Ok(Reply::Data(data)) => {
                xfer.accept_with(data).ok();
            }
            Ok(Reply::Ack) => {
                xfer.accept_with(&[]).ok();
            }
            Ok(Reply::Receive(_)) => {
                xfer.reject().ok();
            }
            Err(DfuError::NotFound) => {}
            Err(_) => {
                xfer.reject().ok();
            }
        }
    }

    // Handle a control request from the host.
    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();
        let ep = EndpointAddress::from_parts(0, UsbDirection::Out);

        // usb-device has already collected the data stage, hand it over
        // to the buffer the function arms in the setup stage
        let received = match self.function.request(ep, &req, ControlStage::Setup) {
            Ok(Reply::Receive(buf)) => {
                let data = xfer.data();
                if data.len() == buf.len() {
                    buf.copy_from_slice(data);
                    true
                } else {
                    false
                }
            }
            Ok(_) => {
                xfer.accept().ok();
                return;
            }
            Err(DfuError::NotFound) => return,
            Err(_) => {
                xfer.reject().ok();
                return;
            }
        };

        if !received {
            warn!(
                "dfu: expected {} bytes, got {}",
                req.length,
                xfer.data().len()
            );
            xfer.reject().ok();
            return;
        }

        match self.function.request(ep, &req, ControlStage::Data) {
            Ok(_) => {
                xfer.accept().ok();
            }
            Err(DfuError::NotFound) => {}
            Err(_) => {
                xfer.reject().ok();
            }
        }
    }
}

impl<B: UsbBus> DFUClass<B> {
    /// Creates a new DFUClass with the provided UsbBus, functional
    /// descriptor, and interface name.
    ///
    /// Must be called before the `UsbDevice` is built.
    pub fn new(
        alloc: &UsbBusAllocator<B>,
        descriptor: FunctionalDescriptor,
        name: &'static str,
    ) -> Self {
        Self::with_function(alloc, DFUFunction::new(descriptor), name)
    }

    /// Same as [`new()`](DFUClass::new), for a preconfigured [`DFUFunction`].
    pub fn with_function(
        alloc: &UsbBusAllocator<B>,
        mut function: DFUFunction,
        name: &'static str,
    ) -> Self {
        let if_num = alloc.interface();
        let iface = InterfaceDescriptor::dfu_mode(u8::from(if_num));

        // usb-device builds classes before the device, it is always powered here
        if let Err(e) = function
            .init(DeviceStage::Powered)
            .and_then(|_| function.control(FunctionControl::Enable(&iface)))
        {
            error!("dfu: failed to enable interface {}: {:?}", iface.number, e);
        }

        Self {
            if_num,
            interface_string: alloc.string(),
            name,
            function,
            _bus: PhantomData,
        }
    }

    /// Protocol handler.
    pub fn function(&self) -> &DFUFunction {
        &self.function
    }

    /// Protocol handler, for the flashing side.
    pub fn function_mut(&mut self) -> &mut DFUFunction {
        &mut self.function
    }

    /// See [`DFUFunction::update()`].
    pub fn update<M: DFUMemIO>(&mut self, mem: &mut M) {
        self.function.update(mem)
    }

    /// Interface number allocated for DFU.
    pub fn interface_number(&self) -> InterfaceNumber {
        self.if_num
    }
}
