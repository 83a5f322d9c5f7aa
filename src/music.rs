// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Takashi Sakamoto

//! Typed views for info blocks in status descriptor of music subunit.
//!
//! The status descriptor of music subunit is a tree of info blocks; general music capability,
//! output plug status, and routing status at the top level, with source plugs, subunit plugs,
//! clusters, music plugs and textual names nested below them. Each structure here is built
//! over the untyped [`InfoBlock`] view and parses its secondary info blocks eagerly at
//! construction. A view over a block of different type, or over garbage, reports itself as
//! invalid and yields zero or empty values from every accessor.

use super::{
    block::{InfoBlock, InfoBlockKind, InfoBlockRange, TypedInfoBlock, PRIMARY_FIELDS_OFFSET},
    transfer::{Descriptor, DescriptorContent},
};

fn typed_valid(node: &InfoBlock<'_>, block_type: u16) -> bool {
    node.is_valid() && node.block_type() == block_type
}

/// The textual name attached to plug, cluster, or music plug.
#[derive(Debug, Clone)]
pub struct NameBlock<'a> {
    node: InfoBlock<'a>,
}

impl<'a> TypedInfoBlock<'a> for NameBlock<'a> {
    const BLOCK_TYPE: u16 = 0x000b;

    fn at(content: &'a DescriptorContent, base: usize) -> Self {
        NameBlock {
            node: InfoBlock::new(content, base),
        }
    }

    fn node(&self) -> &InfoBlock<'a> {
        &self.node
    }
}

impl<'a> NameBlock<'a> {
    pub fn text(&self) -> String {
        if self.is_valid() {
            let raw = self
                .node
                .read_buffer(PRIMARY_FIELDS_OFFSET, self.node.primary_fields_length() as usize);
            String::from_utf8_lossy(raw).to_string()
        } else {
            String::new()
        }
    }
}

/// The capability of the whole music subunit.
#[derive(Debug, Clone)]
pub struct GeneralMusicBlock<'a> {
    node: InfoBlock<'a>,
}

impl<'a> TypedInfoBlock<'a> for GeneralMusicBlock<'a> {
    const BLOCK_TYPE: u16 = 0x8100;

    fn at(content: &'a DescriptorContent, base: usize) -> Self {
        GeneralMusicBlock {
            node: InfoBlock::new(content, base),
        }
    }

    fn node(&self) -> &InfoBlock<'a> {
        &self.node
    }
}

impl<'a> GeneralMusicBlock<'a> {
    pub fn transmit_capability(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET)
        } else {
            0
        }
    }

    pub fn receive_capability(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET + 1)
        } else {
            0
        }
    }

    pub fn latency(&self) -> u32 {
        if self.is_valid() {
            ((self.node.read_word(PRIMARY_FIELDS_OFFSET + 2) as u32) << 16)
                | (self.node.read_word(PRIMARY_FIELDS_OFFSET + 4) as u32)
        } else {
            0
        }
    }
}

/// The sampling clock capability of plug.
#[derive(Debug, Clone)]
pub struct AudioSyncBlock<'a> {
    node: InfoBlock<'a>,
}

impl<'a> TypedInfoBlock<'a> for AudioSyncBlock<'a> {
    const BLOCK_TYPE: u16 = 0x8107;

    fn at(content: &'a DescriptorContent, base: usize) -> Self {
        AudioSyncBlock {
            node: InfoBlock::new(content, base),
        }
    }

    fn node(&self) -> &InfoBlock<'a> {
        &self.node
    }
}

impl<'a> AudioSyncBlock<'a> {
    pub fn capability(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET)
        } else {
            0
        }
    }
}

/// The audio stream capability of plug.
#[derive(Debug, Clone)]
pub struct AudioBlock<'a> {
    node: InfoBlock<'a>,
    name: Option<NameBlock<'a>>,
}

impl<'a> TypedInfoBlock<'a> for AudioBlock<'a> {
    const BLOCK_TYPE: u16 = 0x8103;

    fn at(content: &'a DescriptorContent, base: usize) -> Self {
        let node = InfoBlock::new(content, base);
        let mut name = None;
        if typed_valid(&node, Self::BLOCK_TYPE) {
            for child in InfoBlockRange::new(content, base + PRIMARY_FIELDS_OFFSET + 2, node.end())
            {
                if child.kind() == InfoBlockKind::Name && name.is_none() {
                    name = Some(NameBlock::at(content, child.base()));
                }
            }
        }
        AudioBlock { node, name }
    }

    fn node(&self) -> &InfoBlock<'a> {
        &self.node
    }
}

impl<'a> AudioBlock<'a> {
    pub fn nb_streams(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET)
        } else {
            0
        }
    }

    pub fn stream_format(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET + 1)
        } else {
            0
        }
    }

    pub fn name(&self) -> Option<&NameBlock<'a>> {
        self.name.as_ref()
    }
}

/// The MIDI stream capability of plug, with a name per MIDI stream when available.
#[derive(Debug, Clone)]
pub struct MidiBlock<'a> {
    node: InfoBlock<'a>,
    names: Vec<NameBlock<'a>>,
}

impl<'a> TypedInfoBlock<'a> for MidiBlock<'a> {
    const BLOCK_TYPE: u16 = 0x8104;

    fn at(content: &'a DescriptorContent, base: usize) -> Self {
        let node = InfoBlock::new(content, base);
        let mut names = Vec::new();
        if typed_valid(&node, Self::BLOCK_TYPE) {
            for child in InfoBlockRange::new(content, base + PRIMARY_FIELDS_OFFSET + 1, node.end())
            {
                if child.kind() == InfoBlockKind::Name {
                    names.push(NameBlock::at(content, child.base()));
                }
            }
        }
        MidiBlock { node, names }
    }

    fn node(&self) -> &InfoBlock<'a> {
        &self.node
    }
}

impl<'a> MidiBlock<'a> {
    pub fn nb_streams(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET)
        } else {
            0
        }
    }

    pub fn names(&self) -> &[NameBlock<'a>] {
        &self.names
    }
}

/// The status of single source plug behind isochronous output plug.
///
/// SMPTE time code and sample count capabilities are not parsed; their blocks are passed over
/// during the walk of secondary info blocks.
#[derive(Debug, Clone)]
pub struct SourcePlugBlock<'a> {
    node: InfoBlock<'a>,
    audio: Option<AudioBlock<'a>>,
    midi: Option<MidiBlock<'a>>,
    audio_sync: Option<AudioSyncBlock<'a>>,
}

impl<'a> TypedInfoBlock<'a> for SourcePlugBlock<'a> {
    const BLOCK_TYPE: u16 = 0x8102;

    fn at(content: &'a DescriptorContent, base: usize) -> Self {
        let node = InfoBlock::new(content, base);
        let mut audio = None;
        let mut midi = None;
        let mut audio_sync = None;
        if typed_valid(&node, Self::BLOCK_TYPE) {
            for child in InfoBlockRange::new(content, base + PRIMARY_FIELDS_OFFSET + 1, node.end())
            {
                match child.kind() {
                    InfoBlockKind::Audio if audio.is_none() => {
                        audio = Some(AudioBlock::at(content, child.base()));
                    }
                    InfoBlockKind::Midi if midi.is_none() => {
                        midi = Some(MidiBlock::at(content, child.base()));
                    }
                    InfoBlockKind::AudioSync if audio_sync.is_none() => {
                        audio_sync = Some(AudioSyncBlock::at(content, child.base()));
                    }
                    _ => (),
                }
            }
        }
        SourcePlugBlock {
            node,
            audio,
            midi,
            audio_sync,
        }
    }

    fn node(&self) -> &InfoBlock<'a> {
        &self.node
    }
}

impl<'a> SourcePlugBlock<'a> {
    pub fn source_plug_number(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET)
        } else {
            0
        }
    }

    pub fn audio(&self) -> Option<&AudioBlock<'a>> {
        self.audio.as_ref()
    }

    pub fn midi(&self) -> Option<&MidiBlock<'a>> {
        self.midi.as_ref()
    }

    pub fn audio_sync(&self) -> Option<&AudioSyncBlock<'a>> {
        self.audio_sync.as_ref()
    }
}

/// The status of isochronous output plugs of the subunit.
#[derive(Debug, Clone)]
pub struct OutputPlugStatusBlock<'a> {
    node: InfoBlock<'a>,
    source_plugs: Vec<SourcePlugBlock<'a>>,
}

impl<'a> TypedInfoBlock<'a> for OutputPlugStatusBlock<'a> {
    const BLOCK_TYPE: u16 = 0x8101;

    fn at(content: &'a DescriptorContent, base: usize) -> Self {
        let node = InfoBlock::new(content, base);
        let mut source_plugs = Vec::new();
        if typed_valid(&node, Self::BLOCK_TYPE) {
            for child in InfoBlockRange::new(content, base + PRIMARY_FIELDS_OFFSET + 1, node.end())
            {
                if child.kind() == InfoBlockKind::SourcePlug {
                    source_plugs.push(SourcePlugBlock::at(content, child.base()));
                }
            }
        }
        OutputPlugStatusBlock { node, source_plugs }
    }

    fn node(&self) -> &InfoBlock<'a> {
        &self.node
    }
}

impl<'a> OutputPlugStatusBlock<'a> {
    pub fn nb_source_plugs(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET)
        } else {
            0
        }
    }

    pub fn source_plugs(&self) -> &[SourcePlugBlock<'a>] {
        &self.source_plugs
    }
}

/// The single signal routed into cluster.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct ClusterSignal {
    pub music_plug_id: u16,
    pub stream_position: u8,
    pub stream_location: u8,
}

/// The cluster of signals carried together in one stream of plug.
#[derive(Debug, Clone)]
pub struct ClusterBlock<'a> {
    node: InfoBlock<'a>,
    name: Option<NameBlock<'a>>,
}

impl<'a> ClusterBlock<'a> {
    const SIGNALS_OFFSET: usize = PRIMARY_FIELDS_OFFSET + 3;
    const SIGNAL_SIZE: usize = 4;
}

impl<'a> TypedInfoBlock<'a> for ClusterBlock<'a> {
    const BLOCK_TYPE: u16 = 0x810a;

    fn at(content: &'a DescriptorContent, base: usize) -> Self {
        let node = InfoBlock::new(content, base);
        let mut name = None;
        if typed_valid(&node, Self::BLOCK_TYPE) {
            let children = base
                + Self::SIGNALS_OFFSET
                + Self::SIGNAL_SIZE * node.read_byte(PRIMARY_FIELDS_OFFSET + 2) as usize;
            for child in InfoBlockRange::new(content, children, node.end()) {
                if child.kind() == InfoBlockKind::Name && name.is_none() {
                    name = Some(NameBlock::at(content, child.base()));
                }
            }
        }
        ClusterBlock { node, name }
    }

    fn node(&self) -> &InfoBlock<'a> {
        &self.node
    }
}

impl<'a> ClusterBlock<'a> {
    pub fn stream_format(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET)
        } else {
            0
        }
    }

    pub fn port_type(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET + 1)
        } else {
            0
        }
    }

    pub fn nb_signals(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET + 2)
        } else {
            0
        }
    }

    /// The signal at the given index, between 0 and the count of signals.
    pub fn signal(&self, index: usize) -> Option<ClusterSignal> {
        if !self.is_valid() || index >= self.nb_signals() as usize {
            return None;
        }
        let pos = Self::SIGNALS_OFFSET + Self::SIGNAL_SIZE * index;
        Some(ClusterSignal {
            music_plug_id: self.node.read_word(pos),
            stream_position: self.node.read_byte(pos + 2),
            stream_location: self.node.read_byte(pos + 3),
        })
    }

    pub fn name(&self) -> Option<&NameBlock<'a>> {
        self.name.as_ref()
    }
}

/// The configuration of single subunit plug.
#[derive(Debug, Clone)]
pub struct PlugBlock<'a> {
    node: InfoBlock<'a>,
    clusters: Vec<ClusterBlock<'a>>,
    name: Option<NameBlock<'a>>,
}

impl<'a> TypedInfoBlock<'a> for PlugBlock<'a> {
    const BLOCK_TYPE: u16 = 0x8109;

    fn at(content: &'a DescriptorContent, base: usize) -> Self {
        let node = InfoBlock::new(content, base);
        let mut clusters = Vec::new();
        let mut name = None;
        if typed_valid(&node, Self::BLOCK_TYPE) {
            for child in InfoBlockRange::new(content, base + PRIMARY_FIELDS_OFFSET + 8, node.end())
            {
                match child.kind() {
                    InfoBlockKind::Cluster => {
                        clusters.push(ClusterBlock::at(content, child.base()));
                    }
                    InfoBlockKind::Name if name.is_none() => {
                        name = Some(NameBlock::at(content, child.base()));
                    }
                    _ => (),
                }
            }
        }
        PlugBlock {
            node,
            clusters,
            name,
        }
    }

    fn node(&self) -> &InfoBlock<'a> {
        &self.node
    }
}

impl<'a> PlugBlock<'a> {
    pub fn plug_id(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET)
        } else {
            0
        }
    }

    pub fn signal_format(&self) -> u16 {
        if self.is_valid() {
            self.node.read_word(PRIMARY_FIELDS_OFFSET + 1)
        } else {
            0
        }
    }

    pub fn plug_type(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET + 3)
        } else {
            0
        }
    }

    pub fn nb_clusters(&self) -> u16 {
        if self.is_valid() {
            self.node.read_word(PRIMARY_FIELDS_OFFSET + 4)
        } else {
            0
        }
    }

    pub fn nb_channels(&self) -> u16 {
        if self.is_valid() {
            self.node.read_word(PRIMARY_FIELDS_OFFSET + 6)
        } else {
            0
        }
    }

    /// The clusters actually parsed, which may be fewer than the count the block announces
    /// when the content is truncated or malformed.
    pub fn clusters(&self) -> &[ClusterBlock<'a>] {
        &self.clusters
    }

    pub fn name(&self) -> Option<&NameBlock<'a>> {
        self.name.as_ref()
    }
}

/// One end of route expressed by music plug.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct MusicPlugEndpoint {
    pub plug_function_type: u8,
    pub plug_id: u8,
    pub plug_function_block_id: u8,
    pub stream_position: u8,
    pub stream_location: u8,
}

/// The single music plug of the subunit with its source and destination endpoints.
#[derive(Debug, Clone)]
pub struct MusicPlugBlock<'a> {
    node: InfoBlock<'a>,
    name: Option<NameBlock<'a>>,
}

impl<'a> MusicPlugBlock<'a> {
    const SOURCE_OFFSET: usize = PRIMARY_FIELDS_OFFSET + 4;
    const DESTINATION_OFFSET: usize = PRIMARY_FIELDS_OFFSET + 9;
    const ENDPOINT_SIZE: usize = 5;
}

impl<'a> TypedInfoBlock<'a> for MusicPlugBlock<'a> {
    const BLOCK_TYPE: u16 = 0x810b;

    fn at(content: &'a DescriptorContent, base: usize) -> Self {
        let node = InfoBlock::new(content, base);
        let mut name = None;
        if typed_valid(&node, Self::BLOCK_TYPE) {
            let children = base + Self::DESTINATION_OFFSET + Self::ENDPOINT_SIZE;
            for child in InfoBlockRange::new(content, children, node.end()) {
                if child.kind() == InfoBlockKind::Name && name.is_none() {
                    name = Some(NameBlock::at(content, child.base()));
                }
            }
        }
        MusicPlugBlock { node, name }
    }

    fn node(&self) -> &InfoBlock<'a> {
        &self.node
    }
}

impl<'a> MusicPlugBlock<'a> {
    pub fn music_plug_type(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET)
        } else {
            0
        }
    }

    pub fn music_plug_id(&self) -> u16 {
        if self.is_valid() {
            self.node.read_word(PRIMARY_FIELDS_OFFSET + 1)
        } else {
            0
        }
    }

    pub fn routing_support(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET + 3)
        } else {
            0
        }
    }

    fn endpoint(&self, pos: usize) -> MusicPlugEndpoint {
        if self.is_valid() {
            MusicPlugEndpoint {
                plug_function_type: self.node.read_byte(pos),
                plug_id: self.node.read_byte(pos + 1),
                plug_function_block_id: self.node.read_byte(pos + 2),
                stream_position: self.node.read_byte(pos + 3),
                stream_location: self.node.read_byte(pos + 4),
            }
        } else {
            Default::default()
        }
    }

    pub fn source(&self) -> MusicPlugEndpoint {
        self.endpoint(Self::SOURCE_OFFSET)
    }

    pub fn destination(&self) -> MusicPlugEndpoint {
        self.endpoint(Self::DESTINATION_OFFSET)
    }

    pub fn name(&self) -> Option<&NameBlock<'a>> {
        self.name.as_ref()
    }
}

/// The current routing between plugs of the subunit.
///
/// The secondary info blocks carry one subunit plug block per destination plug first, then
/// one per source plug, then the music plugs. The blocks carry no marker of the split; the
/// count of destination plugs in the primary fields decides it.
#[derive(Debug, Clone)]
pub struct RoutingStatusBlock<'a> {
    node: InfoBlock<'a>,
    dest_plugs: Vec<PlugBlock<'a>>,
    source_plugs: Vec<PlugBlock<'a>>,
    music_plugs: Vec<MusicPlugBlock<'a>>,
}

impl<'a> TypedInfoBlock<'a> for RoutingStatusBlock<'a> {
    const BLOCK_TYPE: u16 = 0x8108;

    fn at(content: &'a DescriptorContent, base: usize) -> Self {
        let node = InfoBlock::new(content, base);
        let mut dest_plugs = Vec::new();
        let mut source_plugs = Vec::new();
        let mut music_plugs = Vec::new();
        if typed_valid(&node, Self::BLOCK_TYPE) {
            let nb_dest = node.read_byte(PRIMARY_FIELDS_OFFSET) as usize;
            for child in InfoBlockRange::new(content, base + PRIMARY_FIELDS_OFFSET + 4, node.end())
            {
                match child.kind() {
                    InfoBlockKind::Plug => {
                        let plug = PlugBlock::at(content, child.base());
                        if dest_plugs.len() < nb_dest {
                            dest_plugs.push(plug);
                        } else {
                            source_plugs.push(plug);
                        }
                    }
                    InfoBlockKind::MusicPlug => {
                        music_plugs.push(MusicPlugBlock::at(content, child.base()));
                    }
                    _ => (),
                }
            }
        }
        RoutingStatusBlock {
            node,
            dest_plugs,
            source_plugs,
            music_plugs,
        }
    }

    fn node(&self) -> &InfoBlock<'a> {
        &self.node
    }
}

impl<'a> RoutingStatusBlock<'a> {
    pub fn nb_dest_plugs(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET)
        } else {
            0
        }
    }

    pub fn nb_source_plugs(&self) -> u8 {
        if self.is_valid() {
            self.node.read_byte(PRIMARY_FIELDS_OFFSET + 1)
        } else {
            0
        }
    }

    pub fn nb_music_plugs(&self) -> u16 {
        if self.is_valid() {
            self.node.read_word(PRIMARY_FIELDS_OFFSET + 2)
        } else {
            0
        }
    }

    pub fn dest_plugs(&self) -> &[PlugBlock<'a>] {
        &self.dest_plugs
    }

    pub fn source_plugs(&self) -> &[PlugBlock<'a>] {
        &self.source_plugs
    }

    pub fn music_plugs(&self) -> &[MusicPlugBlock<'a>] {
        &self.music_plugs
    }
}

/// The top level of status descriptor of music subunit.
#[derive(Debug, Clone)]
pub struct MusicSubunitStatusArea<'a> {
    pub general: Option<GeneralMusicBlock<'a>>,
    pub output_plug_status: Option<OutputPlugStatusBlock<'a>>,
    pub routing_status: Option<RoutingStatusBlock<'a>>,
}

impl<'a> MusicSubunitStatusArea<'a> {
    /// Walk the top level of the content and pick the first occurrence of each area.
    pub fn parse(content: &'a DescriptorContent) -> Self {
        let mut general = None;
        let mut output_plug_status = None;
        let mut routing_status = None;
        for block in InfoBlockRange::new(content, 0, content.len()) {
            match block.kind() {
                InfoBlockKind::GeneralMusic if general.is_none() => {
                    general = Some(GeneralMusicBlock::at(content, block.base()));
                }
                InfoBlockKind::OutputPlugStatus if output_plug_status.is_none() => {
                    output_plug_status = Some(OutputPlugStatusBlock::at(content, block.base()));
                }
                InfoBlockKind::RoutingStatus if routing_status.is_none() => {
                    routing_status = Some(RoutingStatusBlock::at(content, block.base()));
                }
                _ => (),
            }
        }
        MusicSubunitStatusArea {
            general,
            output_plug_status,
            routing_status,
        }
    }

    /// Parse the content of the descriptor once loaded.
    pub fn from_descriptor(descriptor: &'a Descriptor) -> Option<Self> {
        descriptor.content().map(Self::parse)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn block(block_type: u16, primary: &[u8], children: &[Vec<u8>]) -> Vec<u8> {
        let secondary: Vec<u8> = children.iter().flatten().copied().collect();
        let compound = 4 + primary.len() + secondary.len();
        let mut raw = (compound as u16).to_be_bytes().to_vec();
        raw.extend_from_slice(&block_type.to_be_bytes());
        raw.extend_from_slice(&(primary.len() as u16).to_be_bytes());
        raw.extend_from_slice(primary);
        raw.extend_from_slice(&secondary);
        raw
    }

    fn name_block(text: &str) -> Vec<u8> {
        block(0x000b, text.as_bytes(), &[])
    }

    #[test]
    fn general_music_fields() {
        let raw = block(0x8100, &[0x01, 0x02, 0x00, 0x00, 0x01, 0x00], &[]);
        let content = DescriptorContent::from(&raw[..]);
        let general = GeneralMusicBlock::at(&content, 0);
        assert!(general.is_valid());
        assert_eq!(general.transmit_capability(), 0x01);
        assert_eq!(general.receive_capability(), 0x02);
        assert_eq!(general.latency(), 0x00000100);
    }

    #[test]
    fn wrong_type_view_reads_zero() {
        let raw = block(0x8104, &[0x02], &[]);
        let content = DescriptorContent::from(&raw[..]);
        let general = GeneralMusicBlock::at(&content, 0);
        assert!(!general.is_valid());
        assert_eq!(general.transmit_capability(), 0);
        assert_eq!(general.latency(), 0);
    }

    #[test]
    fn name_text() {
        let raw = name_block("Analog In");
        let content = DescriptorContent::from(&raw[..]);
        let name = NameBlock::at(&content, 0);
        assert!(name.is_valid());
        assert_eq!(name.text(), "Analog In");
    }

    #[test]
    fn plug_with_clusters() {
        let cluster_a = block(
            0x810a,
            &[
                0x06, 0x03, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x01, 0x00,
            ],
            &[name_block("Main")],
        );
        let cluster_b = block(0x810a, &[0x06, 0x03, 0x01, 0x00, 0x03, 0x02, 0x01], &[]);
        let raw = block(
            0x8109,
            &[0x00, 0x90, 0x40, 0x00, 0x00, 0x02, 0x00, 0x03],
            &[cluster_a, cluster_b, name_block("Out 1/2")],
        );
        let content = DescriptorContent::from(&raw[..]);
        let plug = PlugBlock::at(&content, 0);
        assert!(plug.is_valid());
        assert_eq!(plug.plug_id(), 0x00);
        assert_eq!(plug.signal_format(), 0x9040);
        assert_eq!(plug.plug_type(), 0x00);
        assert_eq!(plug.nb_clusters(), 2);
        assert_eq!(plug.nb_channels(), 3);
        assert_eq!(plug.name().unwrap().text(), "Out 1/2");

        let clusters = plug.clusters();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].nb_signals(), 2);
        assert_eq!(
            clusters[0].signal(0),
            Some(ClusterSignal {
                music_plug_id: 0x0001,
                stream_position: 0x00,
                stream_location: 0x00,
            })
        );
        assert_eq!(
            clusters[0].signal(1),
            Some(ClusterSignal {
                music_plug_id: 0x0002,
                stream_position: 0x01,
                stream_location: 0x00,
            })
        );
        assert_eq!(clusters[0].signal(2), None);
        assert_eq!(clusters[0].name().unwrap().text(), "Main");
        assert_eq!(clusters[1].nb_signals(), 1);
        assert_eq!(
            clusters[1].signal(0),
            Some(ClusterSignal {
                music_plug_id: 0x0003,
                stream_position: 0x02,
                stream_location: 0x01,
            })
        );
        assert!(clusters[1].name().is_none());
    }

    #[test]
    fn plug_keeps_clusters_before_invalid_one() {
        let cluster_a = block(0x810a, &[0x06, 0x03, 0x01, 0x00, 0x01, 0x00, 0x00], &[]);
        // The second cluster announces zero compound length.
        let cluster_b = vec![0x00, 0x00, 0x81, 0x0a, 0x00, 0x00];
        let raw = block(
            0x8109,
            &[0x01, 0x90, 0x40, 0x00, 0x00, 0x02, 0x00, 0x02],
            &[cluster_a, cluster_b],
        );
        let content = DescriptorContent::from(&raw[..]);
        let plug = PlugBlock::at(&content, 0);
        assert!(plug.is_valid());
        assert_eq!(plug.nb_clusters(), 2);
        assert_eq!(plug.clusters().len(), 1);
    }

    #[test]
    fn plug_tolerates_unrecognized_child_type() {
        let cluster_a = block(0x810a, &[0x06, 0x03, 0x01, 0x00, 0x01, 0x00, 0x00], &[]);
        // A vendor-specific block between the two clusters.
        let vendor = block(0xffff, &[0xde, 0xad], &[]);
        let cluster_b = block(0x810a, &[0x06, 0x03, 0x01, 0x00, 0x02, 0x01, 0x00], &[]);
        let raw = block(
            0x8109,
            &[0x00, 0x90, 0x40, 0x00, 0x00, 0x02, 0x00, 0x02],
            &[cluster_a, vendor, cluster_b],
        );
        let content = DescriptorContent::from(&raw[..]);
        let plug = PlugBlock::at(&content, 0);
        assert!(plug.is_valid());
        assert_eq!(plug.clusters().len(), 2);
        assert_eq!(
            plug.clusters()[1].signal(0),
            Some(ClusterSignal {
                music_plug_id: 0x0002,
                stream_position: 0x01,
                stream_location: 0x00,
            })
        );
    }

    #[test]
    fn source_plug_passes_over_unhandled_blocks() {
        let smpte = block(0x8105, &[0x00], &[]);
        let audio = block(0x8103, &[0x02, 0x06], &[name_block("Stream")]);
        let midi = block(0x8104, &[0x01], &[name_block("MIDI A")]);
        let sync = block(0x8107, &[0x02], &[]);
        let raw = block(0x8102, &[0x03], &[smpte, audio, midi, sync]);
        let content = DescriptorContent::from(&raw[..]);
        let plug = SourcePlugBlock::at(&content, 0);
        assert!(plug.is_valid());
        assert_eq!(plug.source_plug_number(), 3);

        let audio = plug.audio().unwrap();
        assert_eq!(audio.nb_streams(), 2);
        assert_eq!(audio.stream_format(), 6);
        assert_eq!(audio.name().unwrap().text(), "Stream");

        let midi = plug.midi().unwrap();
        assert_eq!(midi.nb_streams(), 1);
        assert_eq!(midi.names().len(), 1);
        assert_eq!(midi.names()[0].text(), "MIDI A");

        assert_eq!(plug.audio_sync().unwrap().capability(), 2);
    }

    #[test]
    fn music_plug_endpoints() {
        let raw = block(
            0x810b,
            &[
                0x01, 0x00, 0x05, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04, 0x01, 0x02, 0x03, 0x04,
                0x05,
            ],
            &[name_block("Left")],
        );
        let content = DescriptorContent::from(&raw[..]);
        let plug = MusicPlugBlock::at(&content, 0);
        assert!(plug.is_valid());
        assert_eq!(plug.music_plug_type(), 0x01);
        assert_eq!(plug.music_plug_id(), 0x0005);
        assert_eq!(plug.routing_support(), 0x00);
        assert_eq!(
            plug.source(),
            MusicPlugEndpoint {
                plug_function_type: 0x00,
                plug_id: 0x01,
                plug_function_block_id: 0x02,
                stream_position: 0x03,
                stream_location: 0x04,
            }
        );
        assert_eq!(
            plug.destination(),
            MusicPlugEndpoint {
                plug_function_type: 0x01,
                plug_id: 0x02,
                plug_function_block_id: 0x03,
                stream_position: 0x04,
                stream_location: 0x05,
            }
        );
        assert_eq!(plug.name().unwrap().text(), "Left");
    }

    #[test]
    fn routing_status_splits_plugs() {
        let plug_fields = |id: u8| vec![id, 0x90, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00];
        let dest = block(0x8109, &plug_fields(0x00), &[]);
        let src_a = block(0x8109, &plug_fields(0x01), &[]);
        let src_b = block(0x8109, &plug_fields(0x02), &[]);
        let music_fields = |id: u8| {
            vec![
                0x01, 0x00, id, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00,
            ]
        };
        let mp_a = block(0x810b, &music_fields(0x01), &[]);
        let mp_b = block(0x810b, &music_fields(0x02), &[]);
        let raw = block(
            0x8108,
            &[0x01, 0x02, 0x00, 0x02],
            &[dest, src_a, src_b, mp_a, mp_b],
        );
        let content = DescriptorContent::from(&raw[..]);
        let routing = RoutingStatusBlock::at(&content, 0);
        assert!(routing.is_valid());
        assert_eq!(routing.nb_dest_plugs(), 1);
        assert_eq!(routing.nb_source_plugs(), 2);
        assert_eq!(routing.nb_music_plugs(), 2);
        assert_eq!(routing.dest_plugs().len(), 1);
        assert_eq!(routing.dest_plugs()[0].plug_id(), 0x00);
        assert_eq!(routing.source_plugs().len(), 2);
        assert_eq!(routing.source_plugs()[1].plug_id(), 0x02);
        assert_eq!(routing.music_plugs().len(), 2);
        assert_eq!(routing.music_plugs()[1].music_plug_id(), 0x0002);
    }

    #[test]
    fn status_area_walk() {
        let general = block(0x8100, &[0x01, 0x01, 0x00, 0x00, 0x00, 0x40], &[]);
        let source_plug = block(0x8102, &[0x00], &[block(0x8103, &[0x02, 0x06], &[])]);
        let opst = block(0x8101, &[0x01], &[source_plug]);
        let routing = block(0x8108, &[0x00, 0x00, 0x00, 0x00], &[]);
        let raw: Vec<u8> = [general, opst, routing].iter().flatten().copied().collect();
        let content = DescriptorContent::from(&raw[..]);

        let area = MusicSubunitStatusArea::parse(&content);
        let general = area.general.as_ref().unwrap();
        assert_eq!(general.latency(), 0x40);
        let opst = area.output_plug_status.as_ref().unwrap();
        assert_eq!(opst.nb_source_plugs(), 1);
        assert_eq!(opst.source_plugs().len(), 1);
        assert_eq!(
            opst.source_plugs()[0].audio().unwrap().stream_format(),
            0x06
        );
        assert!(area.routing_status.is_some());
    }

    #[test]
    fn status_area_from_unloaded_descriptor() {
        let desc = Descriptor::unit_identifier(0);
        assert!(MusicSubunitStatusArea::from_descriptor(&desc).is_none());
    }
}
