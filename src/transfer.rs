// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Takashi Sakamoto

//! Open/close/read protocol for descriptor and the content loaded from it.
//!
//! The module includes the state machine to open a descriptor in remote unit or subunit, to
//! read its content by the chunked sequence of READ DESCRIPTOR commands, and the structure to
//! own the loaded content with total, bounds-clamped accessors.

use {
    super::{specifier::*, TransactionChannel},
    std::convert::TryFrom,
    ta1394_avc_general::*,
    tracing::debug,
};

/// The maximum count of attempts for each blocking phase of the protocol.
pub const MAX_RETRIES: usize = 10;

const OPEN_DESCRIPTOR: u8 = 0x08;
const READ_DESCRIPTOR: u8 = 0x09;

const SUBFUNCTION_CLOSE: u8 = 0x00;
const SUBFUNCTION_READ_OPEN: u8 = 0x01;
const SUBFUNCTION_WRITE_OPEN: u8 = 0x03;
const SUBFUNCTION_STATUS: u8 = 0xff;

// The rest bits of the first byte in response frame express Command/transaction set (CTS).
const RESP_CODE_MASK: u8 = 0x0f;

// The descriptor_length field ahead of the content in the address space of descriptor.
const LENGTH_PREFIX: usize = 2;

const LENGTH_PROBE_SIZE: usize = 8;
const MIN_CHUNK_SIZE: usize = 4;

fn quadlet_count(bytes: usize) -> usize {
    (bytes + 3) / 4
}

fn frame_bytes(quadlets: &[u32]) -> Vec<u8> {
    quadlets.iter().flat_map(|q| q.to_be_bytes()).collect()
}

fn byte_at(frame: &[u8], pos: usize) -> u8 {
    frame.get(pos).copied().unwrap_or(0)
}

fn word_at(frame: &[u8], pos: usize) -> u16 {
    ((byte_at(frame, pos) as u16) << 8) | (byte_at(frame, pos + 1) as u16)
}

fn compose_frame(ctype: AvcCmdType, addr: &AvcAddr, opcode: u8, operands: &[u8]) -> (Vec<u32>, usize) {
    let mut stream = FieldStream::new();
    stream.push_byte(ctype.into());
    stream.push_byte(u8::from(addr));
    stream.push_byte(opcode);
    stream.extend_from_slice(operands);
    stream.to_quadlets()
}

fn open_operands(specifier: &[u8], subfunction: u8) -> Vec<u8> {
    let mut operands = specifier.to_vec();
    operands.push(subfunction);
    operands.push(0x00);
    operands
}

/// The byte positions of fields in response frame for READ DESCRIPTOR command, decided once by
/// the byte length of encoded specifier.
///
/// The payload of each response begins at `payload + boundary`; the first `boundary` bytes of
/// the payload are dropped so that the remainder is aligned to the quadlet array of the frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ResponseLayout {
    /// The position of read result status field.
    pub status: usize,
    /// The position of data length field, expressing the count of payload bytes the response
    /// carries.
    pub data_length: usize,
    /// The position of address field.
    pub address: usize,
    /// The position at which the payload begins.
    pub payload: usize,
    /// The count of payload bytes to drop for quadlet alignment.
    pub boundary: usize,
}

impl ResponseLayout {
    const RESPONSE_HEADER_LENGTH: usize = 3;

    pub fn new(specifier_length: usize) -> Self {
        let status = Self::RESPONSE_HEADER_LENGTH + specifier_length;
        // status(1) + reserved(1) + data length(2) + address(2).
        let payload = status + 6;
        ResponseLayout {
            status,
            data_length: status + 2,
            address: status + 4,
            payload,
            boundary: (4 - payload % 4) % 4,
        }
    }

    /// The amount to back up the address of the first chunk, so that the bytes dropped for
    /// alignment are exactly the bytes of descriptor_length field already consumed by the
    /// length probe. No amount exists when the specifier length is a multiple of quadlet.
    pub fn first_chunk_skip(&self) -> Option<usize> {
        LENGTH_PREFIX.checked_sub(self.boundary)
    }
}

/// The error to read loaded content out of range.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ContentReadError {
    OutOfRange {
        /// The requested position.
        pos: usize,
        /// The meaningful length of the content.
        length: usize,
    },
}

impl std::fmt::Display for ContentReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { pos, length } => {
                write!(f, "position {} out of content length {}", pos, length)
            }
        }
    }
}

/// The content of loaded descriptor.
///
/// The `read_byte`, `read_word` and `read_buffer` methods are total; any byte out of the
/// meaningful range reads as zero and any buffer is clamped to it, instead of returning error.
/// The policy keeps parsers of malformed firmware data free of failure paths, while it hides
/// range mistakes from callers; the `try_read_byte`, `try_read_word` and `try_read_buffer`
/// methods report the range error explicitly for call sites which need it.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct DescriptorContent {
    raw: Vec<u8>,
    declared_length: usize,
}

impl DescriptorContent {
    /// The count of meaningful bytes.
    pub fn len(&self) -> usize {
        self.declared_length
    }

    pub fn is_empty(&self) -> bool {
        self.declared_length == 0
    }

    pub fn read_byte(&self, pos: usize) -> u8 {
        if pos < self.declared_length {
            self.raw.get(pos).copied().unwrap_or(0)
        } else {
            0
        }
    }

    /// Read two consecutive bytes as big-endian word.
    pub fn read_word(&self, pos: usize) -> u16 {
        ((self.read_byte(pos) as u16) << 8) | (self.read_byte(pos + 1) as u16)
    }

    /// Read up to the given count of bytes, clamped to the meaningful range.
    pub fn read_buffer(&self, pos: usize, count: usize) -> &[u8] {
        if pos < self.declared_length {
            let end = (pos + count).min(self.declared_length);
            &self.raw[pos..end]
        } else {
            &[]
        }
    }

    pub fn try_read_byte(&self, pos: usize) -> Result<u8, ContentReadError> {
        if pos < self.declared_length {
            Ok(self.raw[pos])
        } else {
            Err(ContentReadError::OutOfRange {
                pos,
                length: self.declared_length,
            })
        }
    }

    pub fn try_read_word(&self, pos: usize) -> Result<u16, ContentReadError> {
        if pos + 2 <= self.declared_length {
            Ok(((self.raw[pos] as u16) << 8) | (self.raw[pos + 1] as u16))
        } else {
            Err(ContentReadError::OutOfRange {
                pos,
                length: self.declared_length,
            })
        }
    }

    pub fn try_read_buffer(&self, pos: usize, count: usize) -> Result<&[u8], ContentReadError> {
        if pos + count <= self.declared_length {
            Ok(&self.raw[pos..(pos + count)])
        } else {
            Err(ContentReadError::OutOfRange {
                pos,
                length: self.declared_length,
            })
        }
    }
}

impl From<&[u8]> for DescriptorContent {
    fn from(raw: &[u8]) -> Self {
        let mut data = raw.to_vec();
        data.resize(4 * quadlet_count(raw.len()), 0);
        DescriptorContent {
            raw: data,
            declared_length: raw.len(),
        }
    }
}

/// The mode of access to opened descriptor.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    fn subfunction(&self) -> u8 {
        match self {
            Self::ReadOnly => SUBFUNCTION_READ_OPEN,
            Self::ReadWrite => SUBFUNCTION_WRITE_OPEN,
        }
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// The state of descriptor against open and close operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DescriptorState {
    Closed,
    Opening,
    Opened(AccessMode),
}

impl std::fmt::Display for DescriptorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Opening => write!(f, "opening"),
            Self::Opened(mode) => write!(f, "opened {}", mode),
        }
    }
}

/// The state of descriptor against load operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    LoadFailed,
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unloaded => write!(f, "unloaded"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded => write!(f, "loaded"),
            Self::LoadFailed => write!(f, "load failed"),
        }
    }
}

/// The error to open or close descriptor.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OpenError {
    /// The specifier configuration is unusable.
    Specifier(SpecifierError),
    /// The target refused the command with the status code.
    Rejected(u8),
    /// No response received within the count of attempts.
    RetryExhausted(usize),
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Specifier(cause) => write!(f, "specifier error: {}", cause),
            Self::Rejected(status) => write!(f, "rejected with status 0x{:02x}", status),
            Self::RetryExhausted(attempts) => write!(f, "no response in {} attempts", attempts),
        }
    }
}

/// The error to load content of descriptor.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadError {
    /// The specifier configuration is unusable.
    Specifier(SpecifierError),
    /// The byte length of encoded specifier leaves no usable alignment for chunked read.
    UnsupportedSpecifierLength(usize),
    /// A read phase received no acceptable response within the count of attempts.
    RetryExhausted(usize),
    /// An accepted response carried no usable payload.
    ShortResponse(usize),
    /// The address of the next chunk does not fit in the 16-bit address field.
    AddressOverflow(usize),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Specifier(cause) => write!(f, "specifier error: {}", cause),
            Self::UnsupportedSpecifierLength(length) => {
                write!(f, "unsupported specifier length {}", length)
            }
            Self::RetryExhausted(attempts) => {
                write!(f, "no acceptable response in {} attempts", attempts)
            }
            Self::ShortResponse(data_length) => {
                write!(f, "response carried no payload, data length {}", data_length)
            }
            Self::AddressOverflow(address) => {
                write!(f, "chunk address {} beyond 16-bit address field", address)
            }
        }
    }
}

/// The descriptor exposed by unit or subunit in remote node.
///
/// The structure keeps the address of the target, the specifier to identify the descriptor,
/// the protocol state, and the content once loaded. The transaction layer is passed to each
/// operation as implementation of `TransactionChannel`.
#[derive(Debug)]
pub struct Descriptor {
    node_id: u32,
    addr: AvcAddr,
    specifier: DescriptorSpecifier,
    state: DescriptorState,
    load_state: LoadState,
    content: Option<DescriptorContent>,
}

impl Descriptor {
    pub fn new(node_id: u32, addr: AvcAddr, specifier: DescriptorSpecifier) -> Self {
        Descriptor {
            node_id,
            addr,
            specifier,
            state: DescriptorState::Closed,
            load_state: LoadState::Unloaded,
            content: None,
        }
    }

    /// The identifier descriptor of the unit.
    pub fn unit_identifier(node_id: u32) -> Self {
        Self::new(node_id, AvcAddr::Unit, DescriptorSpecifier::Identifier)
    }

    /// The identifier descriptor of the subunit.
    pub fn subunit_identifier(node_id: u32, subunit: AvcAddrSubunit) -> Self {
        Self::new(
            node_id,
            AvcAddr::Subunit(subunit),
            DescriptorSpecifier::Identifier,
        )
    }

    /// The status descriptor of the first music subunit, addressed as list.
    pub fn music_subunit_status(node_id: u32, list_id: u32, widths: &SpecifierWidths) -> Self {
        Self::new(
            node_id,
            AvcAddr::Subunit(MUSIC_SUBUNIT_0),
            DescriptorSpecifier::ListById {
                list_id,
                list_id_width: widths.list_id,
            },
        )
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn specifier(&self) -> &DescriptorSpecifier {
        &self.specifier
    }

    pub fn state(&self) -> DescriptorState {
        self.state
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, DescriptorState::Opened(_))
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }

    pub fn is_valid(&self) -> bool {
        self.load_state != LoadState::LoadFailed
    }

    pub fn content(&self) -> Option<&DescriptorContent> {
        self.content.as_ref()
    }

    pub fn read_byte(&self, pos: usize) -> u8 {
        self.content.as_ref().map_or(0, |c| c.read_byte(pos))
    }

    pub fn read_word(&self, pos: usize) -> u16 {
        self.content.as_ref().map_or(0, |c| c.read_word(pos))
    }

    pub fn read_buffer(&self, pos: usize, count: usize) -> &[u8] {
        self.content
            .as_ref()
            .map_or(&[] as &[u8], |c| c.read_buffer(pos, count))
    }

    pub fn open_read_only(&mut self, channel: &impl TransactionChannel) -> Result<(), OpenError> {
        self.open(channel, AccessMode::ReadOnly)
    }

    pub fn open_read_write(&mut self, channel: &impl TransactionChannel) -> Result<(), OpenError> {
        self.open(channel, AccessMode::ReadWrite)
    }

    pub fn open(
        &mut self,
        channel: &impl TransactionChannel,
        mode: AccessMode,
    ) -> Result<(), OpenError> {
        let specifier = self.specifier.to_raw().map_err(OpenError::Specifier)?;
        self.state = DescriptorState::Opening;

        let operands = open_operands(&specifier, mode.subfunction());
        let (request, length) =
            compose_frame(AvcCmdType::Control, &self.addr, OPEN_DESCRIPTOR, &operands);
        for _ in 0..MAX_RETRIES {
            if let Some(response) = channel.execute(self.node_id, &request, quadlet_count(length))
            {
                let frame = frame_bytes(&response);
                let status = byte_at(&frame, 0);
                return if AvcRespCode::from(status & RESP_CODE_MASK) == AvcRespCode::Accepted {
                    self.state = DescriptorState::Opened(mode);
                    Ok(())
                } else {
                    debug!(status, %mode, "OPEN DESCRIPTOR command rejected");
                    self.probe_open_status(channel, &specifier);
                    self.state = DescriptorState::Closed;
                    Err(OpenError::Rejected(status))
                };
            }
        }
        self.state = DescriptorState::Closed;
        Err(OpenError::RetryExhausted(MAX_RETRIES))
    }

    // Best-effort diagnostics after a rejected open; the result has no effect on the state.
    fn probe_open_status(&self, channel: &impl TransactionChannel, specifier: &[u8]) {
        let operands = open_operands(specifier, SUBFUNCTION_STATUS);
        let (request, length) =
            compose_frame(AvcCmdType::Status, &self.addr, OPEN_DESCRIPTOR, &operands);
        if let Some(response) = channel.execute(self.node_id, &request, quadlet_count(length)) {
            let frame = frame_bytes(&response);
            debug!(
                status = byte_at(&frame, 0),
                subfunction = byte_at(&frame, ResponseLayout::RESPONSE_HEADER_LENGTH + specifier.len()),
                "current open state of descriptor"
            );
        }
    }

    /// Request to close the descriptor. The close is not guaranteed; the state is left
    /// unchanged unless the target accepts the command.
    pub fn close(&mut self, channel: &impl TransactionChannel) -> Result<(), OpenError> {
        let specifier = self.specifier.to_raw().map_err(OpenError::Specifier)?;

        let operands = open_operands(&specifier, SUBFUNCTION_CLOSE);
        let (request, length) =
            compose_frame(AvcCmdType::Control, &self.addr, OPEN_DESCRIPTOR, &operands);
        for _ in 0..MAX_RETRIES {
            if let Some(response) = channel.execute(self.node_id, &request, quadlet_count(length))
            {
                let frame = frame_bytes(&response);
                let status = byte_at(&frame, 0);
                return if AvcRespCode::from(status & RESP_CODE_MASK) == AvcRespCode::Accepted {
                    self.state = DescriptorState::Closed;
                    Ok(())
                } else {
                    debug!(status, "CLOSE subfunction rejected, state left unchanged");
                    Err(OpenError::Rejected(status))
                };
            }
        }
        Err(OpenError::RetryExhausted(MAX_RETRIES))
    }

    /// Load the whole content of the descriptor by the chunked sequence of READ DESCRIPTOR
    /// commands, with bounded retry for each chunk.
    pub fn load(&mut self, channel: &impl TransactionChannel) -> Result<(), LoadError> {
        self.content = None;
        self.load_state = LoadState::Loading;
        match self.load_content(channel) {
            Ok(content) => {
                self.content = Some(content);
                self.load_state = LoadState::Loaded;
                Ok(())
            }
            Err(err) => {
                self.load_state = LoadState::LoadFailed;
                Err(err)
            }
        }
    }

    fn load_content(
        &self,
        channel: &impl TransactionChannel,
    ) -> Result<DescriptorContent, LoadError> {
        let specifier = self.specifier.to_raw().map_err(LoadError::Specifier)?;
        let layout = ResponseLayout::new(specifier.len());
        let skip = layout
            .first_chunk_skip()
            .ok_or(LoadError::UnsupportedSpecifierLength(specifier.len()))?;

        // The first two bytes of the address space hold the length of the content.
        let frame =
            self.read_with_retry(channel, &specifier, &layout, 0, LENGTH_PROBE_SIZE as u16)?;
        let declared_length = word_at(&frame, layout.payload) as usize;

        let mut raw = vec![0; 4 * quadlet_count(declared_length)];
        let mut bytes_read = 0;

        while bytes_read < declared_length {
            let (address, length) = if bytes_read == 0 {
                (skip, declared_length.max(MIN_CHUNK_SIZE))
            } else {
                (
                    bytes_read + skip,
                    (declared_length - bytes_read + layout.boundary).max(MIN_CHUNK_SIZE),
                )
            };
            // The wire fields are 16 bit. The skip can push the address of the last chunks of
            // a maximum-length descriptor past the field; a shorter request is merely served
            // with fewer bytes.
            let address =
                u16::try_from(address).map_err(|_| LoadError::AddressOverflow(address))?;
            let length = length.min(u16::MAX as usize) as u16;
            let frame = self.read_with_retry(channel, &specifier, &layout, address, length)?;
            let data_length = word_at(&frame, layout.data_length) as usize;

            let begin = layout.payload + layout.boundary;
            let avail = frame
                .len()
                .saturating_sub(begin)
                .min(data_length.saturating_sub(layout.boundary));
            let count = avail.min(declared_length - bytes_read);
            if count == 0 {
                Err(LoadError::ShortResponse(data_length))?;
            }
            raw[bytes_read..(bytes_read + count)].copy_from_slice(&frame[begin..(begin + count)]);
            bytes_read += count;
        }

        Ok(DescriptorContent {
            raw,
            declared_length,
        })
    }

    fn read_with_retry(
        &self,
        channel: &impl TransactionChannel,
        specifier: &[u8],
        layout: &ResponseLayout,
        address: u16,
        length: u16,
    ) -> Result<Vec<u8>, LoadError> {
        let mut operands = specifier.to_vec();
        operands.push(0xff);
        operands.push(0x00);
        operands.extend_from_slice(&length.to_be_bytes());
        operands.extend_from_slice(&address.to_be_bytes());
        let (request, _) =
            compose_frame(AvcCmdType::Control, &self.addr, READ_DESCRIPTOR, &operands);
        let response_quadlets = quadlet_count(layout.payload + length as usize);

        for _ in 0..MAX_RETRIES {
            if let Some(response) = channel.execute(self.node_id, &request, response_quadlets) {
                let frame = frame_bytes(&response);
                let status = byte_at(&frame, 0);
                if AvcRespCode::from(status & RESP_CODE_MASK) == AvcRespCode::Accepted {
                    return Ok(frame);
                }
                debug!(status, address, "READ DESCRIPTOR command not accepted");
            }
        }
        debug!(attempts = MAX_RETRIES, address, "READ DESCRIPTOR retry exhausted");
        Err(LoadError::RetryExhausted(MAX_RETRIES))
    }
}
