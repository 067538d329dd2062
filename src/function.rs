use usb_device::control::{Request, RequestType};
use usb_device::endpoint::EndpointAddress;
use usb_device::UsbDirection;

use crate::buffer::{DownloadBlock, DownloadBuffer, DOWNLOAD_BUFFER_SIZE};
use crate::descriptor::{FunctionalDescriptor, InterfaceDescriptor};
use crate::error::DfuError;
use crate::mem::{DFUManifestationError, DFUMemError, DFUMemIO};
use crate::protocol::*;

/// Enumeration stage of the USB device the function is installed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceStage {
    /// Not attached.
    Off,
    /// Attached and powered, not yet reset by the host.
    Powered,
    /// Reset by the host, using the default address.
    Default,
    /// Address assigned.
    Addressed,
    /// Configuration selected.
    Configured,
    /// Suspended by the host.
    Suspended,
}

/// Which interface, if any, the function has claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FunctionState {
    interface: Option<u8>,
    enabled: bool,
}

impl FunctionState {
    /// Unclaimed, disabled.
    pub const fn new() -> Self {
        Self {
            interface: None,
            enabled: false,
        }
    }

    /// Claimed interface number.
    pub fn interface(&self) -> Option<u8> {
        self.interface
    }

    /// `true` once an interface is claimed.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for FunctionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Operations the host framework performs on the function when the
/// device configuration changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FunctionControl<'a> {
    /// Configuration with this interface was installed.
    Enable(&'a InterfaceDescriptor),
    /// Configuration was removed.
    Disable(Option<&'a InterfaceDescriptor>),
    /// Query the active alternate setting. Not supported.
    QueryInterface,
}

/// Phase of the control transfer a request is processed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlStage {
    /// SETUP packet received.
    Setup,
    /// Data stage completed.
    Data,
    /// Status stage.
    Status,
}

/// What the transport must do to complete a control transfer.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply<'a> {
    /// Complete the transfer with a zero-length status stage.
    Ack,
    /// Send these bytes in the IN data stage.
    Data(&'a [u8]),
    /// Receive the OUT data stage into this buffer, filling it completely,
    /// then call [`DFUFunction::request()`] again with [`ControlStage::Data`].
    Receive(&'a mut [u8]),
}

/// DFU mode function driver.
///
/// Holds the protocol state machine, the download staging buffer and the
/// interface claim. Every control request for the claimed interface goes
/// through [`request()`](DFUFunction::request).
///
/// Received blocks are not written by the function itself: a flashing
/// consumer outside of the USB interrupt context picks them up with
/// [`pending_block()`](DFUFunction::pending_block) or
/// [`update()`](DFUFunction::update).
pub struct DFUFunction {
    function: FunctionState,
    registered: bool,
    state: DFUState,
    status: DFUStatusCode,
    buffer: DownloadBuffer,
    manifestation_complete: bool,
    reset_pending: bool,
    descriptor: FunctionalDescriptor,
    poll_timeout_ms: u32,
    response: [u8; STATUS_RESPONSE_LEN],
}

impl DFUFunction {
    /// `bwPollTimeout` reported by `DFU_GETSTATUS` unless changed with
    /// [`with_poll_timeout()`](DFUFunction::with_poll_timeout).
    pub const DEFAULT_POLL_TIMEOUT_MS: u32 = 10;

    /// Creates an unregistered function in `dfuIDLE` state.
    pub const fn new(descriptor: FunctionalDescriptor) -> Self {
        Self {
            function: FunctionState::new(),
            registered: false,
            state: DFUState::DfuIdle,
            status: DFUStatusCode::OK,
            buffer: DownloadBuffer::new(),
            manifestation_complete: false,
            reset_pending: false,
            descriptor,
            poll_timeout_ms: Self::DEFAULT_POLL_TIMEOUT_MS,
            response: [0; STATUS_RESPONSE_LEN],
        }
    }

    /// Sets the time in milliseconds the host is asked to wait between
    /// `DFU_GETSTATUS` polls.
    ///
    /// The value is a hint to the host, the function does not measure it.
    pub const fn with_poll_timeout(mut self, ms: u32) -> Self {
        self.poll_timeout_ms = ms;
        self
    }

    /// Registers the function with the host framework.
    ///
    /// Must happen before the device is reset by the host, fails with
    /// [`DfuError::Denied`] otherwise.
    pub fn init(&mut self, stage: DeviceStage) -> Result<(), DfuError> {
        if stage > DeviceStage::Powered {
            error!("dfu: init denied, device stage {:?}", stage);
            return Err(DfuError::Denied);
        }
        self.registered = true;
        Ok(())
    }

    /// Unregisters the function and releases its interface.
    pub fn deinit(&mut self) {
        self.disable(None).ok();
        self.registered = false;
    }

    /// `true` while the function has an interface claimed.
    pub fn is_enabled(&self) -> bool {
        self.function.is_enabled()
    }

    /// Interface claim.
    pub fn function_state(&self) -> FunctionState {
        self.function
    }

    /// Handle a configuration change. Unregistered functions do not
    /// participate and return [`DfuError::NotFound`].
    pub fn control(&mut self, op: FunctionControl<'_>) -> Result<(), DfuError> {
        if !self.registered {
            return Err(DfuError::NotFound);
        }
        match op {
            FunctionControl::Enable(desc) => self.enable(desc),
            FunctionControl::Disable(desc) => self.disable(desc),
            FunctionControl::QueryInterface => Err(DfuError::UnsupportedOp),
        }
    }

    fn enable(&mut self, desc: &InterfaceDescriptor) -> Result<(), DfuError> {
        if !desc.is_dfu() {
            return Err(DfuError::NotFound);
        }

        match self.function.interface {
            Some(n) if n == desc.number => Err(DfuError::AlreadyClaimed),
            Some(_) => Err(DfuError::NoResource),
            None => {
                // DFU uses only the control endpoint, nothing else to install
                self.function = FunctionState {
                    interface: Some(desc.number),
                    enabled: true,
                };
                info!("dfu: claimed interface {}", desc.number);
                Ok(())
            }
        }
    }

    fn disable(&mut self, desc: Option<&InterfaceDescriptor>) -> Result<(), DfuError> {
        if let Some(desc) = desc {
            if !desc.is_dfu() {
                return Err(DfuError::NotFound);
            }
        }

        if let Some(n) = self.function.interface {
            info!("dfu: released interface {}", n);
        }
        self.function = FunctionState::new();
        self.state = DFUState::DfuIdle;
        self.status = DFUStatusCode::OK;
        self.manifestation_complete = false;
        self.reset_pending = false;
        self.buffer.reset_offset();
        Ok(())
    }

    /// Process a control request.
    ///
    /// Returns [`DfuError::NotFound`] without touching any state if the
    /// request is not a class request for the claimed interface, so the
    /// transport can offer it to other handlers. Any other error means the
    /// control pipe must be stalled.
    pub fn request(
        &mut self,
        ep: EndpointAddress,
        req: &Request,
        stage: ControlStage,
    ) -> Result<Reply<'_>, DfuError> {
        if req.request_type != RequestType::Class {
            return Err(DfuError::NotFound);
        }

        match self.function.interface {
            Some(n) if self.registered && req.index == n as u16 => {}
            _ => return Err(DfuError::NotFound),
        }

        trace!(
            "dfu: ep {} request {} value {} length {} {:?}",
            u8::from(ep),
            req.request,
            req.value,
            req.length,
            stage
        );

        if req.direction == UsbDirection::In {
            self.control_in(req, stage)
        } else {
            self.control_out(req, stage)
        }
    }

    // Handle control requests to the host.
    fn control_in(&mut self, req: &Request, stage: ControlStage) -> Result<Reply<'_>, DfuError> {
        if stage == ControlStage::Data {
            // data stage of a reply already handed out
            return Ok(Reply::Ack);
        }

        match req.request {
            DFU_UPLOAD => Err(self.stall(DfuError::UnsupportedOp)),
            DFU_GETSTATUS => Ok(self.get_status()),
            DFU_GETSTATE => Ok(self.get_state()),
            _ => Err(self.stall(DfuError::InvalidArgument)),
        }
    }

    // Handle a control request from the host.
    fn control_out(&mut self, req: &Request, stage: ControlStage) -> Result<Reply<'_>, DfuError> {
        match req.request {
            // only meaningful in run-time mode
            DFU_DETACH => Err(self.stall(DfuError::UnsupportedOp)),
            DFU_CLRSTATUS => {
                self.clear_status();
                Ok(Reply::Ack)
            }
            DFU_ABORT => {
                self.abort();
                Ok(Reply::Ack)
            }
            DFU_DNLOAD => self.download(req, stage),
            _ => Err(self.stall(DfuError::InvalidArgument)),
        }
    }

    fn get_status(&mut self) -> Reply<'_> {
        self.response = StatusResponse {
            status: self.status,
            poll_timeout: self.poll_timeout_ms,
            state: self.state,
        }
        .into();

        let next = advance_on_status_poll(
            self.state,
            self.manifestation_complete,
            self.descriptor.manifestation_tolerant(),
        );
        self.new_state(next);

        Reply::Data(&self.response)
    }

    fn get_state(&mut self) -> Reply<'_> {
        // return current state, without any state transition
        self.response[0] = self.state as u8;
        Reply::Data(&self.response[..1])
    }

    fn clear_status(&mut self) {
        if self.state == DFUState::DfuError || self.status != DFUStatusCode::OK {
            debug!("dfu: clear status {:?}", self.status);
            self.status = DFUStatusCode::OK;
            self.new_state(DFUState::DfuIdle);
        }
    }

    /// `DFU_ABORT`: back to `dfuIDLE` from any state.
    ///
    /// The status is left as is, so after an abort in `dfuERROR` the device
    /// reports `dfuIDLE` with a non-OK status until `DFU_CLRSTATUS`.
    fn abort(&mut self) {
        self.reset_pending = false;
        self.buffer.reset_offset();
        self.new_state(DFUState::DfuIdle);
    }

    fn download(&mut self, req: &Request, stage: ControlStage) -> Result<Reply<'_>, DfuError> {
        let length = req.length as usize;

        if !self.descriptor.can_download() {
            return Err(self.stall(DfuError::UnsupportedOp));
        }

        let initial_state = self.state;

        if initial_state != DFUState::DfuIdle && initial_state != DFUState::DfuDnloadIdle {
            return Err(self.stall_status(DFUStatusCode::ErrProg, DfuError::InvalidArgument));
        }

        if length == 0 {
            if initial_state == DFUState::DfuIdle {
                // a download must not start empty
                return Err(self.stall_status(DFUStatusCode::ErrProg, DfuError::InvalidArgument));
            }

            // end of transfer
            self.manifestation_complete = false;
            self.new_state(DFUState::DfuManifestSync);
            return Ok(Reply::Ack);
        }

        if length > DOWNLOAD_BUFFER_SIZE {
            return Err(self.stall_status(DFUStatusCode::ErrProg, DfuError::InvalidArgument));
        }

        match stage {
            ControlStage::Setup => Ok(Reply::Receive(self.buffer.arm(length))),
            ControlStage::Data | ControlStage::Status => {
                self.buffer.commit(req.value, length);
                debug!(
                    "dfu: block {} staged, offset {} length {}",
                    req.value,
                    self.buffer.offset(),
                    length
                );
                self.new_state(DFUState::DfuDnloadSync);
                Ok(Reply::Ack)
            }
        }
    }

    fn new_state(&mut self, state: DFUState) {
        if state != self.state {
            trace!("dfu: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn stall(&mut self, err: DfuError) -> DfuError {
        warn!("dfu: {:?} in {:?}, stalling", err, self.state);
        self.new_state(DFUState::DfuError);
        err
    }

    fn stall_status(&mut self, status: DFUStatusCode, err: DfuError) -> DfuError {
        self.status = status;
        self.stall(err)
    }

    /// Current protocol state.
    pub fn state(&self) -> DFUState {
        self.state
    }

    /// Current protocol status.
    pub fn status(&self) -> DFUStatusCode {
        self.status
    }

    /// `true` once the flashing side has finished manifestation.
    pub fn manifestation_complete(&self) -> bool {
        self.manifestation_complete
    }

    /// Functional descriptor the function was created with.
    pub fn descriptor(&self) -> &FunctionalDescriptor {
        &self.descriptor
    }

    /// Download staging buffer.
    pub fn buffer(&self) -> &DownloadBuffer {
        &self.buffer
    }

    /// The block waiting to be programmed, if any.
    ///
    /// A block is pending only in `dfuDNBUSY`, that is after the host has
    /// acknowledged the download with `DFU_GETSTATUS`.
    pub fn pending_block(&self) -> Option<DownloadBlock<'_>> {
        if self.state == DFUState::DfuDnBusy {
            Some(self.buffer.block())
        } else {
            None
        }
    }

    /// Report the result of programming the pending block.
    ///
    /// The host will see `dfuDNLOAD-IDLE` on success, or `dfuERROR` with the
    /// corresponding status. Ignored if no block is pending, for example when
    /// the host aborted the download in the meantime.
    pub fn block_done(&mut self, result: Result<(), DFUMemError>) {
        if self.state != DFUState::DfuDnBusy {
            return;
        }
        match result {
            Ok(()) => self.new_state(DFUState::DfuDnloadIdle),
            Err(e) => {
                warn!("dfu: programming failed: {:?}", e);
                self.status = e.into();
                self.new_state(DFUState::DfuError);
            }
        }
    }

    /// Report the result of manifestation.
    ///
    /// On success the next `DFU_GETSTATUS` finishes the sequence. Ignored
    /// outside of `dfuMANIFEST`.
    pub fn manifestation_done(&mut self, result: Result<(), DFUManifestationError>) {
        if self.state != DFUState::DfuManifest {
            return;
        }
        match result {
            Ok(()) => {
                info!("dfu: manifestation complete");
                self.manifestation_complete = true;
                self.new_state(DFUState::DfuManifestSync);
            }
            Err(e) => {
                warn!("dfu: manifestation failed: {:?}", e);
                self.status = e.into();
                self.new_state(DFUState::DfuError);
            }
        }
    }

    /// Handle USB bus reset signaling.
    ///
    /// A reset in `dfuMANIFEST-WAIT-RESET` is what the host sends to start
    /// the new firmware, it is reported by [`reset_requested()`](DFUFunction::reset_requested)
    /// and handed to [`DFUMemIO::usb_reset()`] by [`update()`](DFUFunction::update).
    /// A reset in the middle of a download or manifestation moves the device
    /// to `dfuERROR` with `errUSBR`. Nothing happens in `dfuIDLE`.
    pub fn usb_reset(&mut self) {
        match self.state {
            DFUState::DfuManifestWaitReset => {
                info!("dfu: usb reset after manifestation");
                self.reset_pending = true;
            }
            DFUState::DfuIdle | DFUState::AppIdle | DFUState::AppDetach => {}
            _ => {
                warn!("dfu: usb reset in {:?}", self.state);
                self.status = DFUStatusCode::ErrUsbr;
                self.new_state(DFUState::DfuError);
            }
        }
    }

    /// `true` once the host has reset the device after a completed
    /// manifestation, the new firmware may be started.
    pub fn reset_requested(&self) -> bool {
        self.reset_pending && self.state == DFUState::DfuManifestWaitReset
    }

    /// Program the pending block, run manifestation, or pass a post-manifestation
    /// reset on, whichever the state machine is waiting for.
    ///
    /// Must not be called from the USB interrupt context: `mem` may take
    /// as long as flash programming takes. Does nothing in other states.
    pub fn update<M: DFUMemIO>(&mut self, mem: &mut M) {
        if self.reset_requested() {
            self.reset_pending = false;
            mem.usb_reset();
            // still here, new firmware can not be started
            warn!("dfu: firmware did not start");
            self.status = DFUStatusCode::ErrFirmware;
            self.new_state(DFUState::DfuError);
            return;
        }

        match self.state {
            DFUState::DfuDnBusy => {
                let block = self.buffer.block();
                let result = mem.program_block(block.offset, block.data);
                self.block_done(result);
            }
            DFUState::DfuManifest => {
                let result = mem.manifestation();
                self.manifestation_done(result);
            }
            _ => {}
        }
    }
}

impl Default for DFUFunction {
    fn default() -> Self {
        Self::new(FunctionalDescriptor::default())
    }
}
