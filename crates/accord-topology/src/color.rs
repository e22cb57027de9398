//! Color domain.
//!
//! A [`Color`] is an index into a small, fixed, ordered [`Domain`]. The
//! derived ordering of `Color` is the domain order, which every search in
//! the workspace uses as its tie-break key.

use serde::{Deserialize, Serialize};

use crate::error::TopologyError;

/// Largest domain a [`Color`] index can address.
pub const MAX_COLORS: usize = u8::MAX as usize;

/// One value from the color domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u8);

impl Color {
    /// Position of this color in the domain order.
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// The ordered set of colors shared by every participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    names: Vec<String>,
}

impl Domain {
    /// Build a domain from color names, in tie-break order.
    pub fn new<I, S>(names: I) -> Result<Self, TopologyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(TopologyError::EmptyDomain);
        }
        if names.len() > MAX_COLORS {
            return Err(TopologyError::DomainTooLarge(names.len()));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(TopologyError::DuplicateColor(name.clone()));
            }
        }
        Ok(Self { names })
    }

    /// The classic three-color domain `[Red, Green, Blue]`.
    pub fn rgb() -> Self {
        Self {
            names: vec!["Red".into(), "Green".into(), "Blue".into()],
        }
    }

    /// Number of colors.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a constructed domain.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All colors in domain order.
    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        (0..self.names.len()).map(|i| Color(i as u8))
    }

    /// Look up a color by name.
    pub fn parse(&self, name: &str) -> Option<Color> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| Color(i as u8))
    }

    /// Name of a color, or `"?"` if it is outside this domain.
    pub fn name(&self, color: Color) -> &str {
        self.names.get(color.index()).map(String::as_str).unwrap_or("?")
    }

    /// Check that a color belongs to this domain.
    pub fn contains(&self, color: Color) -> bool {
        color.index() < self.names.len()
    }
}

impl Default for Domain {
    fn default() -> Self {
        Self::rgb()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_order_is_tie_break_order() {
        let domain = Domain::rgb();
        let colors: Vec<_> = domain.colors().collect();
        assert_eq!(colors, vec![Color(0), Color(1), Color(2)]);
        assert!(domain.parse("Red") < domain.parse("Green"));
        assert!(domain.parse("Green") < domain.parse("Blue"));
        assert_eq!(domain.name(Color(2)), "Blue");
    }

    #[test]
    fn rejects_bad_domains() {
        assert!(matches!(
            Domain::new(Vec::<String>::new()),
            Err(TopologyError::EmptyDomain)
        ));
        assert!(matches!(
            Domain::new(["Red", "Red"]),
            Err(TopologyError::DuplicateColor(_))
        ));
    }

    #[test]
    fn unknown_color_name() {
        let domain = Domain::rgb();
        assert_eq!(domain.parse("Purple"), None);
        assert_eq!(domain.name(Color(9)), "?");
        assert!(!domain.contains(Color(3)));
    }
}
