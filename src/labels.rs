//! Leaf identifier parsing.
//!
//! Gene tree leaves are named `<species><sep><locus><sep><individual>` or
//! `<species><sep><individual><sep><locus>`, with `-` or `_` as separator.
//! The four combinations are addressed by short mapping strings:
//!
//! | mapping | field order                   | separator |
//! |---------|-------------------------------|-----------|
//! | `sli`   | species, locus, individual    | `-`       |
//! | `sil`   | species, individual, locus    | `-`       |
//! | `sli_`  | species, locus, individual    | `_`       |
//! | `sil_`  | species, individual, locus    | `_`       |

use std::fmt;
use std::str::FromStr;

use crate::error::{LegError, Result};

/// Number of fields a leaf identifier must split into.
const FIELD_COUNT: usize = 3;

/// Leaf naming scheme: field order crossed with separator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Mapping {
    /// `species-locus-individual`
    Sli,
    /// `species-individual-locus`
    Sil,
    /// `species_locus_individual`
    #[default]
    SliUnderscore,
    /// `species_individual_locus`
    SilUnderscore,
}

impl Mapping {
    pub const ALL: [Mapping; 4] = [
        Mapping::Sli,
        Mapping::Sil,
        Mapping::SliUnderscore,
        Mapping::SilUnderscore,
    ];

    pub fn separator(self) -> char {
        match self {
            Mapping::Sli | Mapping::Sil => '-',
            Mapping::SliUnderscore | Mapping::SilUnderscore => '_',
        }
    }

    /// True when the locus is the middle field.
    fn locus_first(self) -> bool {
        matches!(self, Mapping::Sli | Mapping::SliUnderscore)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mapping::Sli => "sli",
            Mapping::Sil => "sil",
            Mapping::SliUnderscore => "sli_",
            Mapping::SilUnderscore => "sil_",
        }
    }
}

impl FromStr for Mapping {
    type Err = LegError;

    fn from_str(s: &str) -> Result<Self> {
        Mapping::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| LegError::Configuration(s.to_string()))
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One occurrence of a gene family locus within a species.
///
/// Ordered by species then locus, so sets and maps of keys iterate
/// deterministically.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocusKey {
    pub species: String,
    pub locus: String,
}

impl LocusKey {
    pub fn new(species: impl Into<String>, locus: impl Into<String>) -> Self {
        LocusKey {
            species: species.into(),
            locus: locus.into(),
        }
    }
}

impl fmt::Display for LocusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.species, self.locus)
    }
}

/// The three fields of a parsed leaf identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafLabel {
    pub species: String,
    pub locus: String,
    pub individual: String,
}

impl LeafLabel {
    pub fn locus_key(&self) -> LocusKey {
        LocusKey::new(self.species.clone(), self.locus.clone())
    }
}

/// Split a leaf identifier into `(species, locus, individual)`.
///
/// # Errors
/// `LegError::Format` if the identifier does not split into exactly three
/// fields on the mapping's separator.
pub fn parse(identifier: &str, mapping: Mapping) -> Result<LeafLabel> {
    let sep = mapping.separator();
    let fields: Vec<&str> = identifier.split(sep).collect();
    let [species, second, third] = fields.as_slice() else {
        return Err(LegError::Format {
            identifier: identifier.to_string(),
            separator: sep,
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    };

    let (locus, individual) = if mapping.locus_first() {
        (second, third)
    } else {
        (third, second)
    };

    Ok(LeafLabel {
        species: species.to_string(),
        locus: locus.to_string(),
        individual: individual.to_string(),
    })
}

/// Convenience for callers holding the mapping as a string.
pub fn parse_str(identifier: &str, mapping: &str) -> Result<LeafLabel> {
    parse(identifier, mapping.parse()?)
}

pub fn locus_key(identifier: &str, mapping: Mapping) -> Result<LocusKey> {
    Ok(parse(identifier, mapping)?.locus_key())
}

pub fn locus_key_str(identifier: &str, mapping: &str) -> Result<LocusKey> {
    locus_key(identifier, mapping.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sli_underscore_locus_key() {
        let key = locus_key_str("sp1_locA_ind1", "sli_").unwrap();
        assert_eq!(key, LocusKey::new("sp1", "locA"));
    }

    #[test]
    fn test_all_field_orders() {
        let cases = [
            ("sp1-locA-ind1", Mapping::Sli),
            ("sp1-ind1-locA", Mapping::Sil),
            ("sp1_locA_ind1", Mapping::SliUnderscore),
            ("sp1_ind1_locA", Mapping::SilUnderscore),
        ];
        for (identifier, mapping) in cases {
            let label = parse(identifier, mapping).unwrap();
            assert_eq!(label.species, "sp1", "{mapping}");
            assert_eq!(label.locus, "locA", "{mapping}");
            assert_eq!(label.individual, "ind1", "{mapping}");
        }
    }

    #[test]
    fn test_unsupported_mapping() {
        assert!(matches!("xyz".parse::<Mapping>(), Err(LegError::Configuration(m)) if m == "xyz"));
        assert!(matches!(parse_str("sp1_locA_ind1", "xyz"), Err(LegError::Configuration(_))));
        assert!(matches!(locus_key_str("sp1_locA_ind1", "xyz"), Err(LegError::Configuration(_))));
    }

    #[test]
    fn test_wrong_field_count() {
        // right separator, too few fields
        assert!(matches!(
            parse("sp1_locA", Mapping::SliUnderscore),
            Err(LegError::Format { found: 2, expected: 3, .. })
        ));
        // too many
        assert!(matches!(
            parse("sp1_locA_ind1_x", Mapping::SliUnderscore),
            Err(LegError::Format { found: 4, .. })
        ));
        // separator does not occur at all
        assert!(matches!(
            parse("sp1_locA_ind1", Mapping::Sli),
            Err(LegError::Format { found: 1, separator: '-', .. })
        ));
    }

    #[test]
    fn test_mapping_roundtrip_strings() {
        for m in Mapping::ALL {
            assert_eq!(m.as_str().parse::<Mapping>().unwrap(), m);
        }
        assert_eq!(Mapping::default(), Mapping::SliUnderscore);
    }
}
