// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Takashi Sakamoto

//! View of info block in loaded descriptor content.
//!
//! An info block begins with compound length, type, and primary fields length, each two bytes
//! in big-endian order. The compound length excludes its own two bytes, thus the block spans
//! `compound_length + 2` bytes from its base. Primary fields begin at offset 6; secondary
//! info blocks, if any, follow the primary fields inside the same span.
//!
//! The structures here are lightweight views into [`DescriptorContent`]; they keep a base
//! address and borrow the content instead of copying it. Reads out of range yield zero, so a
//! view at a bogus address is harmless and reports itself as invalid.

use super::transfer::DescriptorContent;

/// The position of type field relative to the base of info block.
const TYPE_OFFSET: usize = 2;
/// The position of primary fields length field relative to the base of info block.
const PRIMARY_FIELDS_LENGTH_OFFSET: usize = 4;
/// The position of primary fields relative to the base of info block.
pub const PRIMARY_FIELDS_OFFSET: usize = 6;

/// The type of info block found in descriptors of music subunit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InfoBlockKind {
    /// The capability of the whole music subunit (0x8100).
    GeneralMusic,
    /// The status of isochronous output plugs (0x8101).
    OutputPlugStatus,
    /// The status of single source plug (0x8102).
    SourcePlug,
    /// The audio stream capability of plug (0x8103).
    Audio,
    /// The MIDI stream capability of plug (0x8104).
    Midi,
    /// The SMPTE time code capability of plug (0x8105).
    Smpte,
    /// The sample count capability of plug (0x8106).
    SampleCount,
    /// The sampling clock capability of plug (0x8107).
    AudioSync,
    /// The current routing between plugs of the subunit (0x8108).
    RoutingStatus,
    /// The configuration of single subunit plug (0x8109).
    Plug,
    /// The cluster of signals in plug (0x810a).
    Cluster,
    /// The single music plug of the subunit (0x810b).
    MusicPlug,
    /// The textual name (0x000b).
    Name,
    Reserved(u16),
}

impl InfoBlockKind {
    const GENERAL_MUSIC: u16 = 0x8100;
    const OUTPUT_PLUG_STATUS: u16 = 0x8101;
    const SOURCE_PLUG: u16 = 0x8102;
    const AUDIO: u16 = 0x8103;
    const MIDI: u16 = 0x8104;
    const SMPTE: u16 = 0x8105;
    const SAMPLE_COUNT: u16 = 0x8106;
    const AUDIO_SYNC: u16 = 0x8107;
    const ROUTING_STATUS: u16 = 0x8108;
    const PLUG: u16 = 0x8109;
    const CLUSTER: u16 = 0x810a;
    const MUSIC_PLUG: u16 = 0x810b;
    const NAME: u16 = 0x000b;
}

impl From<u16> for InfoBlockKind {
    fn from(val: u16) -> Self {
        match val {
            Self::GENERAL_MUSIC => Self::GeneralMusic,
            Self::OUTPUT_PLUG_STATUS => Self::OutputPlugStatus,
            Self::SOURCE_PLUG => Self::SourcePlug,
            Self::AUDIO => Self::Audio,
            Self::MIDI => Self::Midi,
            Self::SMPTE => Self::Smpte,
            Self::SAMPLE_COUNT => Self::SampleCount,
            Self::AUDIO_SYNC => Self::AudioSync,
            Self::ROUTING_STATUS => Self::RoutingStatus,
            Self::PLUG => Self::Plug,
            Self::CLUSTER => Self::Cluster,
            Self::MUSIC_PLUG => Self::MusicPlug,
            Self::NAME => Self::Name,
            _ => Self::Reserved(val),
        }
    }
}

impl From<&InfoBlockKind> for u16 {
    fn from(kind: &InfoBlockKind) -> Self {
        match kind {
            InfoBlockKind::GeneralMusic => InfoBlockKind::GENERAL_MUSIC,
            InfoBlockKind::OutputPlugStatus => InfoBlockKind::OUTPUT_PLUG_STATUS,
            InfoBlockKind::SourcePlug => InfoBlockKind::SOURCE_PLUG,
            InfoBlockKind::Audio => InfoBlockKind::AUDIO,
            InfoBlockKind::Midi => InfoBlockKind::MIDI,
            InfoBlockKind::Smpte => InfoBlockKind::SMPTE,
            InfoBlockKind::SampleCount => InfoBlockKind::SAMPLE_COUNT,
            InfoBlockKind::AudioSync => InfoBlockKind::AUDIO_SYNC,
            InfoBlockKind::RoutingStatus => InfoBlockKind::ROUTING_STATUS,
            InfoBlockKind::Plug => InfoBlockKind::PLUG,
            InfoBlockKind::Cluster => InfoBlockKind::CLUSTER,
            InfoBlockKind::MusicPlug => InfoBlockKind::MUSIC_PLUG,
            InfoBlockKind::Name => InfoBlockKind::NAME,
            InfoBlockKind::Reserved(val) => *val,
        }
    }
}

/// The untyped view of info block at the given address of content.
#[derive(Debug, Copy, Clone)]
pub struct InfoBlock<'a> {
    content: &'a DescriptorContent,
    base: usize,
}

impl<'a> InfoBlock<'a> {
    pub fn new(content: &'a DescriptorContent, base: usize) -> Self {
        InfoBlock { content, base }
    }

    pub fn content(&self) -> &'a DescriptorContent {
        self.content
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// The length of the block excluding the two bytes of the field itself.
    pub fn compound_length(&self) -> u16 {
        self.content.read_word(self.base)
    }

    pub fn block_type(&self) -> u16 {
        self.content.read_word(self.base + TYPE_OFFSET)
    }

    pub fn kind(&self) -> InfoBlockKind {
        InfoBlockKind::from(self.block_type())
    }

    pub fn primary_fields_length(&self) -> u16 {
        self.content.read_word(self.base + PRIMARY_FIELDS_LENGTH_OFFSET)
    }

    /// A zero compound length can never describe a block and marks the view as a read out of
    /// range or into garbage.
    pub fn is_valid(&self) -> bool {
        self.compound_length() > 0
    }

    /// The address just past the block.
    pub fn end(&self) -> usize {
        self.base + 2 + self.compound_length() as usize
    }

    /// The address at which the next sibling block would begin.
    pub fn next_address(&self) -> usize {
        self.end()
    }

    pub fn read_byte(&self, offset: usize) -> u8 {
        self.content.read_byte(self.base + offset)
    }

    pub fn read_word(&self, offset: usize) -> u16 {
        self.content.read_word(self.base + offset)
    }

    pub fn read_buffer(&self, offset: usize, count: usize) -> &'a [u8] {
        self.content.read_buffer(self.base + offset, count)
    }
}

/// The iterator over sibling info blocks in the range of content.
///
/// Iteration stops at the end of the range, or at the first position with no room for a block
/// header, or at an invalid block.
pub struct InfoBlockRange<'a> {
    content: &'a DescriptorContent,
    pos: usize,
    end: usize,
}

impl<'a> InfoBlockRange<'a> {
    pub fn new(content: &'a DescriptorContent, pos: usize, end: usize) -> Self {
        InfoBlockRange { content, pos, end }
    }
}

impl<'a> Iterator for InfoBlockRange<'a> {
    type Item = InfoBlock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + 4 > self.end {
            return None;
        }
        let block = InfoBlock::new(self.content, self.pos);
        if !block.is_valid() {
            return None;
        }
        self.pos = block.next_address();
        Some(block)
    }
}

/// The view of info block with fixed type and typed accessors for its primary fields.
pub trait TypedInfoBlock<'a>: Sized {
    const BLOCK_TYPE: u16;

    /// Build the view at the given address. The view is always built; check
    /// [`TypedInfoBlock::is_valid`] before trusting its fields.
    fn at(content: &'a DescriptorContent, base: usize) -> Self;

    fn node(&self) -> &InfoBlock<'a>;

    fn is_valid(&self) -> bool {
        self.node().is_valid() && self.node().block_type() == Self::BLOCK_TYPE
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn content_of(raw: &[u8]) -> DescriptorContent {
        DescriptorContent::from(raw)
    }

    #[test]
    fn kind_from_type_value() {
        assert_eq!(InfoBlockKind::from(0x8100), InfoBlockKind::GeneralMusic);
        assert_eq!(InfoBlockKind::from(0x810b), InfoBlockKind::MusicPlug);
        assert_eq!(InfoBlockKind::from(0x000b), InfoBlockKind::Name);
        assert_eq!(InfoBlockKind::from(0x4242), InfoBlockKind::Reserved(0x4242));
        assert_eq!(u16::from(&InfoBlockKind::RoutingStatus), 0x8108);
        assert_eq!(u16::from(&InfoBlockKind::Reserved(0x4242)), 0x4242);
    }

    #[test]
    fn header_fields() {
        let content = content_of(&[
            0x00, 0x08, 0x81, 0x07, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00,
        ]);
        let block = InfoBlock::new(&content, 0);
        assert!(block.is_valid());
        assert_eq!(block.compound_length(), 8);
        assert_eq!(block.block_type(), 0x8107);
        assert_eq!(block.kind(), InfoBlockKind::AudioSync);
        assert_eq!(block.primary_fields_length(), 1);
        assert_eq!(block.read_byte(PRIMARY_FIELDS_OFFSET), 0x02);
        assert_eq!(block.end(), 10);
    }

    #[test]
    fn view_out_of_range_is_invalid() {
        let content = content_of(&[0x00, 0x04, 0x81, 0x07, 0x00, 0x00]);
        let block = InfoBlock::new(&content, 100);
        assert!(!block.is_valid());
        assert_eq!(block.compound_length(), 0);
        assert_eq!(block.kind(), InfoBlockKind::Reserved(0));
    }

    #[test]
    fn range_iterates_siblings() {
        let mut raw = Vec::new();
        // Three sibling blocks, each with one primary byte.
        for (block_type, field) in
            [(0x8104u16, 0x01u8), (0x8104, 0x02), (0x000b, 0x41)].iter()
        {
            raw.extend_from_slice(&5u16.to_be_bytes());
            raw.extend_from_slice(&block_type.to_be_bytes());
            raw.extend_from_slice(&1u16.to_be_bytes());
            raw.push(*field);
        }
        let content = content_of(&raw);
        let blocks: Vec<_> = InfoBlockRange::new(&content, 0, raw.len()).collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].base(), 0);
        assert_eq!(blocks[1].base(), 7);
        assert_eq!(blocks[2].base(), 14);
        assert_eq!(blocks[2].kind(), InfoBlockKind::Name);
    }

    #[test]
    fn range_stops_at_invalid_block() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&[0x00, 0x05, 0x81, 0x04, 0x00, 0x01, 0x7f]);
        // The rest is zero padding, no block.
        raw.extend_from_slice(&[0x00; 8]);
        let content = content_of(&raw);
        let blocks: Vec<_> = InfoBlockRange::new(&content, 0, raw.len()).collect();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn range_stops_without_room_for_header() {
        let content = content_of(&[0x00, 0x05, 0x81, 0x04, 0x00, 0x01, 0x7f, 0x00, 0x09]);
        let blocks: Vec<_> = InfoBlockRange::new(&content, 0, 9).collect();
        assert_eq!(blocks.len(), 1);
    }
}
