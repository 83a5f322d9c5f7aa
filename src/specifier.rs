// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Takashi Sakamoto

//! Serializer for variable-width fields and encoder/decoder of descriptor specifier.
//!
//! The specifier is the address structure to identify descriptor, list, or entry in the
//! addressing scheme of target unit or subunit. The width of its identifier fields is not
//! fixed by the specification; it is configured per device from the capability of the unit,
//! between 1 and 3 bytes.

/// The error to encode or decode descriptor specifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SpecifierError {
    /// The width of field is not between 1 and 3 bytes.
    InvalidFieldWidth(usize),
    /// The configured width of identifier in specifier is not between 1 and 3 bytes.
    InvalidSpecifierWidth(usize),
    /// The raw data is shorter than expected.
    TooShort(
        /// The expected length at least.
        usize,
    ),
    /// The leading type byte of raw data expresses no supported specifier.
    UnexpectedType(u8),
}

impl std::fmt::Display for SpecifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFieldWidth(width) => write!(f, "invalid field width {}", width),
            Self::InvalidSpecifierWidth(width) => {
                write!(f, "invalid specifier identifier width {}", width)
            }
            Self::TooShort(expected) => write!(f, "raw data too short, expected {}", expected),
            Self::UnexpectedType(val) => write!(f, "unexpected specifier type 0x{:02x}", val),
        }
    }
}

/// The serializer to accumulate variable-width fields into a flat byte stream viewed as
/// big-endian quadlets for transmission.
///
/// Fields are concatenated MSB first. A value wider than the declared width of its field is
/// truncated to the low-order bytes, which is the wire behavior of the command set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldStream(Vec<u8>);

impl FieldStream {
    const MAX_FIELD_WIDTH: usize = 3;

    pub fn new() -> Self {
        Default::default()
    }

    /// Append a single byte.
    pub fn push_byte(&mut self, val: u8) {
        self.0.push(val);
    }

    /// Append a field of the given width in byte, between 1 and 3.
    pub fn push_field(&mut self, val: u32, width: usize) -> Result<(), SpecifierError> {
        if width < 1 || width > Self::MAX_FIELD_WIDTH {
            Err(SpecifierError::InvalidFieldWidth(width))
        } else {
            (0..width)
                .rev()
                .for_each(|i| self.0.push((val >> (i * 8)) as u8));
            Ok(())
        }
    }

    pub fn extend_from_slice(&mut self, vals: &[u8]) {
        self.0.extend_from_slice(vals);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// View the byte stream as big-endian quadlets with zero padding in the tail, returning
    /// the quadlets and the count of meaningful bytes.
    pub fn to_quadlets(&self) -> (Vec<u32>, usize) {
        let quadlets = self
            .0
            .chunks(4)
            .map(|chunk| {
                let mut quadlet = [0; 4];
                quadlet[..chunk.len()].copy_from_slice(chunk);
                u32::from_be_bytes(quadlet)
            })
            .collect();
        (quadlets, self.0.len())
    }
}

/// The configured widths of identifier fields in descriptor specifier, from the capability of
/// target unit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SpecifierWidths {
    /// The width of list identifier in byte.
    pub list_id: usize,
    /// The width of object identifier in byte.
    pub object_id: usize,
    /// The width of entry position in byte.
    pub position: usize,
}

impl Default for SpecifierWidths {
    fn default() -> Self {
        Self {
            list_id: 2,
            object_id: 2,
            position: 2,
        }
    }
}

/// The address structure to identify descriptor, list, or entry in list.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DescriptorSpecifier {
    /// The identifier descriptor of the addressed unit or subunit.
    Identifier,
    /// The list with the given identifier.
    ListById { list_id: u32, list_id_width: usize },
    /// The entry at the given position in the list.
    EntryByPositionInList {
        list_id: u32,
        list_id_width: usize,
        position: u32,
        position_width: usize,
    },
    /// The entry with the given object identifier.
    EntryById {
        object_id: u32,
        object_id_width: usize,
    },
}

impl DescriptorSpecifier {
    const IDENTIFIER: u8 = 0xff;
    const LIST_BY_ID: u8 = 0x10;
    const ENTRY_BY_POSITION_IN_LIST: u8 = 0x20;
    const ENTRY_BY_OBJECT_ID: u8 = 0x23;

    /// Encode to raw data. The length of the data is the specifier byte length which decides
    /// the position of any later field in command and response frames.
    pub fn to_raw(&self) -> Result<Vec<u8>, SpecifierError> {
        let mut stream = FieldStream::new();
        match self {
            Self::Identifier => stream.push_byte(Self::IDENTIFIER),
            Self::ListById {
                list_id,
                list_id_width,
            } => {
                stream.push_byte(Self::LIST_BY_ID);
                stream
                    .push_field(*list_id, *list_id_width)
                    .map_err(|_| SpecifierError::InvalidSpecifierWidth(*list_id_width))?;
            }
            Self::EntryByPositionInList {
                list_id,
                list_id_width,
                position,
                position_width,
            } => {
                stream.push_byte(Self::ENTRY_BY_POSITION_IN_LIST);
                stream
                    .push_field(*list_id, *list_id_width)
                    .map_err(|_| SpecifierError::InvalidSpecifierWidth(*list_id_width))?;
                stream
                    .push_field(*position, *position_width)
                    .map_err(|_| SpecifierError::InvalidSpecifierWidth(*position_width))?;
            }
            Self::EntryById {
                object_id,
                object_id_width,
            } => {
                stream.push_byte(Self::ENTRY_BY_OBJECT_ID);
                stream
                    .push_field(*object_id, *object_id_width)
                    .map_err(|_| SpecifierError::InvalidSpecifierWidth(*object_id_width))?;
            }
        }
        Ok(stream.bytes().to_vec())
    }

    /// Decode from raw data with the given width configuration.
    pub fn from_raw(raw: &[u8], widths: &SpecifierWidths) -> Result<Self, SpecifierError> {
        let type_byte = *raw.get(0).ok_or(SpecifierError::TooShort(1))?;
        match type_byte {
            Self::IDENTIFIER => Ok(Self::Identifier),
            Self::LIST_BY_ID => {
                let list_id = read_field(&raw[1..], widths.list_id)?;
                Ok(Self::ListById {
                    list_id,
                    list_id_width: widths.list_id,
                })
            }
            Self::ENTRY_BY_POSITION_IN_LIST => {
                let list_id = read_field(&raw[1..], widths.list_id)?;
                let position = read_field(
                    raw.get((1 + widths.list_id)..).unwrap_or(&[]),
                    widths.position,
                )?;
                Ok(Self::EntryByPositionInList {
                    list_id,
                    list_id_width: widths.list_id,
                    position,
                    position_width: widths.position,
                })
            }
            Self::ENTRY_BY_OBJECT_ID => {
                let object_id = read_field(&raw[1..], widths.object_id)?;
                Ok(Self::EntryById {
                    object_id,
                    object_id_width: widths.object_id,
                })
            }
            _ => Err(SpecifierError::UnexpectedType(type_byte)),
        }
    }
}

fn read_field(raw: &[u8], width: usize) -> Result<u32, SpecifierError> {
    if width < 1 || width > FieldStream::MAX_FIELD_WIDTH {
        Err(SpecifierError::InvalidSpecifierWidth(width))
    } else if raw.len() < width {
        Err(SpecifierError::TooShort(width))
    } else {
        Ok(raw[..width].iter().fold(0, |val, &b| (val << 8) | b as u32))
    }
}
