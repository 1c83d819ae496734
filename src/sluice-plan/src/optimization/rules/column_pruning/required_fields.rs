use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result},
};

use common_error::{SluiceError, SluiceResult};
use itertools::Itertools;

/// Output positions some consumer needs. Only ever grows during a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RequiredFields {
    /// Every field, including ones the requester cannot name.
    All,
    Positions(BTreeSet<usize>),
    #[default]
    None,
}

impl RequiredFields {
    pub fn none() -> Self {
        Self::None
    }

    pub fn all() -> Self {
        Self::All
    }

    pub fn from_positions<I: IntoIterator<Item = usize>>(positions: I) -> Self {
        let positions: BTreeSet<usize> = positions.into_iter().collect();
        if positions.is_empty() {
            Self::None
        } else {
            Self::Positions(positions)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn contains(&self, position: usize) -> bool {
        match self {
            Self::All => true,
            Self::Positions(positions) => positions.contains(&position),
            Self::None => false,
        }
    }

    /// Adds one position. Returns whether anything changed.
    pub fn insert(&mut self, position: usize) -> bool {
        match self {
            Self::All => false,
            Self::Positions(positions) => positions.insert(position),
            Self::None => {
                *self = Self::Positions(BTreeSet::from([position]));
                true
            }
        }
    }

    pub fn set_all(&mut self) -> bool {
        let changed = !self.is_all();
        *self = Self::All;
        changed
    }

    /// Least upper bound. Returns whether `self` grew.
    pub fn merge(&mut self, other: &Self) -> bool {
        match other {
            Self::None => false,
            Self::All => self.set_all(),
            Self::Positions(positions) => positions
                .iter()
                .fold(false, |changed, p| self.insert(*p) | changed),
        }
    }

    /// Concrete sorted positions for a schema of `arity` fields.
    pub fn resolve(&self, arity: usize) -> SluiceResult<Vec<usize>> {
        match self {
            Self::All => Ok((0..arity).collect()),
            Self::None => Ok(vec![]),
            Self::Positions(positions) => {
                if let Some(p) = positions.iter().find(|p| **p >= arity) {
                    return Err(SluiceError::InternalError(format!(
                        "Required position ${p} is out of range for {arity} fields"
                    )));
                }
                Ok(positions.iter().copied().collect())
            }
        }
    }
}

impl Display for RequiredFields {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::All => write!(f, "ALL"),
            Self::Positions(positions) => write!(
                f,
                "{{{}}}",
                positions.iter().map(|p| format!("${p}")).join(", ")
            ),
            Self::None => write!(f, "{{}}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use common_error::SluiceResult;

    use super::*;

    #[test]
    fn merge_reports_growth_only() {
        let mut required = RequiredFields::from_positions([2]);
        assert!(required.merge(&RequiredFields::from_positions([0, 2])));
        assert!(!required.merge(&RequiredFields::from_positions([0])));
        assert!(!required.merge(&RequiredFields::none()));
        assert_eq!(required.to_string(), "{$0, $2}");
        assert!(required.merge(&RequiredFields::all()));
        assert!(!required.merge(&RequiredFields::from_positions([7])));
        assert_eq!(required.to_string(), "ALL");
    }

    #[test]
    fn empty_positions_are_none() {
        assert!(RequiredFields::from_positions([]).is_empty());
        assert_eq!(RequiredFields::none().to_string(), "{}");
    }

    #[test]
    fn resolve_checks_bounds() -> SluiceResult<()> {
        assert_eq!(RequiredFields::all().resolve(3)?, vec![0, 1, 2]);
        assert_eq!(RequiredFields::from_positions([2, 0]).resolve(3)?, vec![0, 2]);
        assert!(matches!(
            RequiredFields::from_positions([3]).resolve(3),
            Err(SluiceError::InternalError(_))
        ));
        Ok(())
    }
}
