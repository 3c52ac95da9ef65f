//! Ordnance Survey grid reference utilities.
//!
//! Tiles are addressed by a 4-character grid reference: two letters naming the
//! 100km square followed by two digits naming the 10km square inside it.
//!
//! # Case Convention
//!
//! Input is case-insensitive. Storage keys use lowercase (`nt27`), display
//! uses uppercase (`NT27`).
//!
//! # Archive Naming
//!
//! Source archives are named `{reference}_{product}_{date}.zip`, for example
//! `nt27_OST50GRID_20170713.zip`. The reference is the text before the first
//! underscore.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TerrainError};

/// A validated, normalized grid reference.
///
/// # Examples
///
/// ```
/// use sceptred::GridReference;
///
/// let reference: GridReference = "nt27".parse().unwrap();
/// assert_eq!(reference.key(), "nt27");
/// assert_eq!(reference.to_string(), "NT27");
/// assert!("nt277".parse::<GridReference>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridReference {
    /// Lowercase ASCII bytes, e.g. `b"nt27"`.
    bytes: [u8; 4],
}

impl GridReference {
    /// Parse and normalize a grid reference.
    ///
    /// # Errors
    ///
    /// Returns [`TerrainError::InvalidReference`] unless the input is exactly
    /// two ASCII letters followed by two ASCII digits.
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.as_bytes();
        let valid = raw.len() == 4
            && raw[0].is_ascii_alphabetic()
            && raw[1].is_ascii_alphabetic()
            && raw[2].is_ascii_digit()
            && raw[3].is_ascii_digit();

        if !valid {
            return Err(TerrainError::InvalidReference {
                input: input.to_string(),
            });
        }

        Ok(Self {
            bytes: [
                raw[0].to_ascii_lowercase(),
                raw[1].to_ascii_lowercase(),
                raw[2],
                raw[3],
            ],
        })
    }

    /// Storage key form (lowercase), e.g. `"nt27"`.
    pub fn key(&self) -> &str {
        // Only ASCII bytes are ever stored.
        std::str::from_utf8(&self.bytes).unwrap_or_default()
    }

    /// The two-letter 100km square prefix in storage form, e.g. `"nt"`.
    pub fn prefix(&self) -> &str {
        &self.key()[..2]
    }

    /// Display form (uppercase), e.g. `"NT27"`.
    pub fn display(&self) -> String {
        self.key().to_ascii_uppercase()
    }
}

impl FromStr for GridReference {
    type Err = TerrainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for GridReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Derive a grid reference from an archive filename.
///
/// Accepts a bare filename or a path. The reference is everything before the
/// first underscore; a name without an underscore is taken whole minus its
/// extension.
///
/// # Examples
///
/// ```
/// use sceptred::reference::reference_from_filename;
///
/// let r = reference_from_filename("nt27_OST50GRID_20170713.zip").unwrap();
/// assert_eq!(r.key(), "nt27");
/// assert!(reference_from_filename("readme.txt").is_err());
/// ```
pub fn reference_from_filename(filename: &str) -> Result<GridReference> {
    // Extract just the filename if a path is given
    let name = filename
        .rsplit('/')
        .next()
        .unwrap_or(filename)
        .rsplit('\\')
        .next()
        .unwrap_or(filename);

    let stem = match name.split_once('_') {
        Some((head, _)) => head,
        None => name.split('.').next().unwrap_or(name),
    };

    GridReference::parse(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_references() {
        let lower = GridReference::parse("nt27").unwrap();
        let upper = GridReference::parse("NT27").unwrap();
        let mixed = GridReference::parse("Nt27").unwrap();

        assert_eq!(lower, upper);
        assert_eq!(lower, mixed);
        assert_eq!(lower.key(), "nt27");
        assert_eq!(upper.key(), "nt27");
    }

    #[test]
    fn test_display_is_uppercase() {
        let reference = GridReference::parse("sv80").unwrap();
        assert_eq!(reference.display(), "SV80");
        assert_eq!(reference.to_string(), "SV80");
        assert_eq!(reference.prefix(), "sv");
    }

    #[test]
    fn test_invalid_references() {
        for input in ["xxxx", "nt2", "nt277", "", "27nt", "n t2", "nt2a", "ñt27", " nt27"] {
            match GridReference::parse(input) {
                Err(TerrainError::InvalidReference { input: echoed }) => {
                    assert_eq!(echoed, input)
                }
                other => panic!("expected InvalidReference for {:?}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_from_str() {
        let reference: GridReference = "HP40".parse().unwrap();
        assert_eq!(reference.key(), "hp40");
        assert!("hp4".parse::<GridReference>().is_err());
    }

    #[test]
    fn test_reference_from_filename() {
        assert_eq!(
            reference_from_filename("nt27_OST50GRID_20170713.zip")
                .unwrap()
                .key(),
            "nt27"
        );
        assert_eq!(
            reference_from_filename("NT27_OST50GRID.zip").unwrap().key(),
            "nt27"
        );
        assert_eq!(reference_from_filename("sk12.zip").unwrap().key(), "sk12");
    }

    #[test]
    fn test_reference_from_filename_with_path() {
        assert_eq!(
            reference_from_filename("/data/asc/nt/nt27_OST50GRID_20170713.zip")
                .unwrap()
                .key(),
            "nt27"
        );
        assert_eq!(
            reference_from_filename("C:\\data\\sk\\SK12_OST50GRID.zip")
                .unwrap()
                .key(),
            "sk12"
        );
    }

    #[test]
    fn test_reference_from_filename_invalid() {
        assert!(reference_from_filename("invalid").is_err());
        assert!(reference_from_filename("nt2_OST50GRID.zip").is_err());
        assert!(reference_from_filename("_nt27.zip").is_err());
    }
}
