//! Quality-layer schemas.
//!
//! Landsat Collection 2 packs independent bit fields into `QA_PIXEL`;
//! Sentinel-2 L2A stores one scene-classification category per pixel in
//! `SCL`. Both are queried by name so configuration never carries raw bit
//! positions.

use std::collections::BTreeMap;

use ndarray::{Array2, Zip};

use crate::error::{NdviError, Result};

/// A named bit field inside a packed quality word.
#[derive(Clone, Copy, Debug)]
pub struct BitField {
    pub name: &'static str,
    pub shift: u8,
    pub width: u8,
    /// Named values of the field.
    pub values: &'static [(u16, &'static str)],
}

impl BitField {
    fn mask(&self) -> u16 {
        (((1u32 << self.width) - 1) as u16) << self.shift
    }
}

const BINARY_CONFIDENCE: &[(u16, &str)] = &[(0, "not_high_confidence"), (1, "high_confidence")];
const CONFIDENCE_LEVELS: &[(u16, &str)] = &[(0, "none"), (1, "low"), (2, "medium"), (3, "high")];
const RESERVED_CONFIDENCE: &[(u16, &str)] = &[(0, "none"), (1, "low"), (2, "reserved"), (3, "high")];

/// Landsat Collection 2 `QA_PIXEL` bit layout.
pub const QA_PIXEL_FIELDS: &[BitField] = &[
    BitField { name: "nodata", shift: 0, width: 1, values: &[(0, "false"), (1, "true")] },
    BitField { name: "dilated_cloud", shift: 1, width: 1, values: &[(0, "not_dilated"), (1, "dilated")] },
    BitField { name: "cirrus", shift: 2, width: 1, values: BINARY_CONFIDENCE },
    BitField { name: "cloud", shift: 3, width: 1, values: BINARY_CONFIDENCE },
    BitField { name: "cloud_shadow", shift: 4, width: 1, values: BINARY_CONFIDENCE },
    BitField { name: "snow", shift: 5, width: 1, values: BINARY_CONFIDENCE },
    BitField { name: "clear", shift: 6, width: 1, values: &[(0, "not_clear"), (1, "clear")] },
    BitField { name: "water", shift: 7, width: 1, values: &[(0, "land_or_cloud"), (1, "water")] },
    BitField { name: "cloud_confidence", shift: 8, width: 2, values: CONFIDENCE_LEVELS },
    BitField { name: "cloud_shadow_confidence", shift: 10, width: 2, values: RESERVED_CONFIDENCE },
    BitField { name: "snow_ice_confidence", shift: 12, width: 2, values: RESERVED_CONFIDENCE },
    BitField { name: "cirrus_confidence", shift: 14, width: 2, values: RESERVED_CONFIDENCE },
];

/// Sentinel-2 L2A `SCL` scene classification.
pub const SCL_CATEGORIES: &[(u16, &str)] = &[
    (0, "no data"),
    (1, "saturated or defective"),
    (2, "dark area pixels"),
    (3, "cloud shadows"),
    (4, "vegetation"),
    (5, "bare soils"),
    (6, "water"),
    (7, "unclassified"),
    (8, "cloud medium probability"),
    (9, "cloud high probability"),
    (10, "thin cirrus"),
    (11, "snow or ice"),
];

/// One compiled `(flag, value)` query: matches where `qa & mask == value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitMatch {
    pub mask: u16,
    pub value: u16,
}

/// Compiled set of flag queries; a pixel matches if any query matches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitQuery {
    matches: Vec<BitMatch>,
}

impl BitQuery {
    /// Resolve `flag name -> value name` pairs against a bit-field schema.
    pub fn compile(schema: &[BitField], flags: &BTreeMap<String, String>) -> Result<Self> {
        let matches = flags
            .iter()
            .map(|(flag, value)| {
                let unknown = || NdviError::UnknownFlag {
                    flag: flag.clone(),
                    value: value.clone(),
                };
                let field = schema.iter().find(|f| f.name == flag.as_str()).ok_or_else(unknown)?;
                let code = field
                    .values
                    .iter()
                    .find(|(_, name)| name.eq_ignore_ascii_case(value))
                    .map(|(code, _)| *code)
                    .ok_or_else(unknown)?;
                Ok(BitMatch {
                    mask: field.mask(),
                    value: code << field.shift,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { matches })
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn matches(&self, qa: u16) -> bool {
        self.matches.iter().any(|m| qa & m.mask == m.value)
    }

    pub fn apply(&self, qa: &Array2<u16>) -> Array2<bool> {
        let mut out = Array2::from_elem(qa.dim(), false);
        Zip::from(&mut out).and(qa).for_each(|o, &q| *o = self.matches(q));
        out
    }
}

/// Compiled set of categorical codes; a pixel matches if its code is listed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryQuery {
    codes: Vec<u16>,
}

impl CategoryQuery {
    pub fn compile(schema: &[(u16, &str)], names: &[String]) -> Result<Self> {
        let codes = names
            .iter()
            .map(|name| {
                schema
                    .iter()
                    .find(|(_, n)| n.eq_ignore_ascii_case(name))
                    .map(|(code, _)| *code)
                    .ok_or_else(|| NdviError::UnknownCategory(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { codes })
    }

    pub fn matches(&self, code: u16) -> bool {
        self.codes.contains(&code)
    }

    pub fn apply(&self, layer: &Array2<u16>) -> Array2<bool> {
        let mut out = Array2::from_elem(layer.dim(), false);
        Zip::from(&mut out).and(layer).for_each(|o, &c| *o = self.matches(c));
        out
    }
}
