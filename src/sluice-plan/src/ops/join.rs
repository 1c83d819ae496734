use std::fmt::{Display, Formatter, Result};

use common_error::SluiceError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sluice_dsl::ExprRef;
use sluice_schema::schema::SchemaRef;
use snafu::ResultExt;

use crate::logical_plan::{self, CreationSnafu};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
}

impl Display for JoinType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let name = match self {
            Self::Inner => "inner",
            Self::LeftOuter => "left outer",
            Self::RightOuter => "right outer",
            Self::FullOuter => "full outer",
        };
        write!(f, "{name}")
    }
}

/// Physical strategy hint. Does not change which fields a join reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinStrategy {
    Hash,
    Replicated,
    Skewed,
    Merge,
}

impl Display for JoinStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let name = match self {
            Self::Hash => "hash",
            Self::Replicated => "replicated",
            Self::Skewed => "skewed",
            Self::Merge => "merge",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    /// Join keys of each input, evaluated against that input's schema.
    pub keys: Vec<Vec<ExprRef>>,
    pub join_type: JoinType,
    pub strategy: JoinStrategy,
}

impl Join {
    pub(crate) fn try_new(
        keys: Vec<Vec<ExprRef>>,
        join_type: JoinType,
        strategy: JoinStrategy,
        input_schemas: &[SchemaRef],
    ) -> logical_plan::Result<Self> {
        if keys.len() < 2 {
            return Err(SluiceError::ValueError(
                "Join needs at least two inputs".to_string(),
            ))
            .context(CreationSnafu);
        }
        if join_type != JoinType::Inner && keys.len() != 2 {
            return Err(SluiceError::ValueError(format!(
                "A {join_type} join takes exactly two inputs, got {}",
                keys.len()
            )))
            .context(CreationSnafu);
        }
        let arity = keys[0].len();
        for (side, schema) in keys.iter().zip(input_schemas.iter()) {
            if side.len() != arity || arity == 0 {
                return Err(SluiceError::ValueError(
                    "Every join input needs the same non-zero number of keys".to_string(),
                ))
                .context(CreationSnafu);
            }
            for key in side {
                key.get_type(schema).context(CreationSnafu)?;
            }
        }
        Ok(Self {
            keys,
            join_type,
            strategy,
        })
    }

    pub fn multiline_display(&self) -> Vec<String> {
        vec![
            format!("Join: Type = {}, Strategy = {}", self.join_type, self.strategy),
            format!(
                "On = {}",
                self.keys
                    .iter()
                    .map(|side| format!("({})", side.iter().join(", ")))
                    .join(", ")
            ),
        ]
    }
}
