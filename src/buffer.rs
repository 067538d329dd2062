/// Capacity of the download staging buffer, in bytes.
///
/// This is also the largest `wLength` accepted by `DFU_DNLOAD`, and the
/// distance between two consecutive block numbers in the firmware image.
pub const DOWNLOAD_BUFFER_SIZE: usize = 512;

/// Holds one `DFU_DNLOAD` block between its reception in the control
/// transfer and its consumption by the flashing side.
pub struct DownloadBuffer {
    data: [u8; DOWNLOAD_BUFFER_SIZE],
    length: usize,
    offset: u32,
}

/// Read-only view of a staged firmware block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DownloadBlock<'a> {
    /// Destination byte offset in the firmware image.
    pub offset: u32,
    /// Block payload.
    pub data: &'a [u8],
}

impl DownloadBuffer {
    /// Creates an empty buffer.
    pub const fn new() -> Self {
        Self {
            data: [0; DOWNLOAD_BUFFER_SIZE],
            length: 0,
            offset: 0,
        }
    }

    /// Returns the storage for the next `length` received bytes.
    ///
    /// `length` must not exceed [`DOWNLOAD_BUFFER_SIZE`].
    pub(crate) fn arm(&mut self, length: usize) -> &mut [u8] {
        &mut self.data[..length]
    }

    /// Records block number and size of the data written into the armed buffer.
    pub(crate) fn commit(&mut self, block_num: u16, length: usize) {
        self.offset = block_offset(block_num);
        self.length = length;
    }

    pub(crate) fn reset_offset(&mut self) {
        self.offset = 0;
    }

    /// Number of bytes received for the current block.
    pub fn len(&self) -> usize {
        self.length
    }

    /// `true` if no data was received for the current block.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Destination offset of the current block.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The current block.
    pub fn block(&self) -> DownloadBlock<'_> {
        DownloadBlock {
            offset: self.offset,
            data: &self.data[..self.length],
        }
    }
}

impl Default for DownloadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte offset of block `block_num` in the firmware image.
pub fn block_offset(block_num: u16) -> u32 {
    block_num as u32 * DOWNLOAD_BUFFER_SIZE as u32
}
