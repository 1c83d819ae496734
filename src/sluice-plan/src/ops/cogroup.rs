use std::sync::Arc;

use common_error::{SluiceError, SluiceResult};
use itertools::Itertools;
use sluice_dsl::ExprRef;
use sluice_schema::{
    dtype::DataType,
    field::{Field, FieldUid, UidGenerator},
    schema::{Schema, SchemaRef},
};
use snafu::ResultExt;

use crate::logical_plan::{self, CreationSnafu};

/// Groups each input by its keys. The output is the group value followed by
/// one bag per input holding that input's rows for the group.
#[derive(Clone, Debug, PartialEq)]
pub struct CoGroup {
    /// Group keys of each input. Empty keys group the whole input together.
    pub keys: Vec<Vec<ExprRef>>,
    /// Drop groups for which this input has no rows.
    pub inner: Vec<bool>,
    pub group_field: Field,
    /// Name and identity of each input's bag field.
    pub bags: Vec<(Arc<str>, FieldUid)>,
}

impl CoGroup {
    pub(crate) fn try_new(
        keys: Vec<Vec<ExprRef>>,
        inner: Vec<bool>,
        bag_names: Vec<Arc<str>>,
        input_schemas: &[SchemaRef],
        uids: &mut UidGenerator,
    ) -> logical_plan::Result<Self> {
        if keys.is_empty()
            || keys.len() != inner.len()
            || keys.len() != bag_names.len()
            || keys.len() != input_schemas.len()
        {
            return Err(SluiceError::ValueError(
                "CoGroup needs keys, an inner flag and a bag for every input".to_string(),
            ))
            .context(CreationSnafu);
        }
        let arity = keys[0].len();
        if keys.iter().any(|side| side.len() != arity) {
            return Err(SluiceError::ValueError(
                "Every CoGroup input needs the same number of keys".to_string(),
            ))
            .context(CreationSnafu);
        }
        for (side, schema) in keys.iter().zip(input_schemas.iter()) {
            for key in side {
                key.get_type(schema).context(CreationSnafu)?;
            }
        }
        let first_schema = &input_schemas[0];
        let group_dtype = match keys[0].as_slice() {
            [] => DataType::Chararray,
            [key] => key.get_type(first_schema).context(CreationSnafu)?,
            many => {
                let fields = many
                    .iter()
                    .map(|key| {
                        Ok(Field::new(
                            key.name(first_schema)?,
                            key.get_type(first_schema)?,
                            uids.next_uid(),
                        ))
                    })
                    .collect::<SluiceResult<Vec<_>>>()
                    .context(CreationSnafu)?;
                DataType::Tuple(Arc::new(Schema::new(fields)))
            }
        };
        let group_field = Field::new("group", group_dtype, uids.next_uid());
        let bags = bag_names
            .into_iter()
            .map(|name| (name, uids.next_uid()))
            .collect();
        Ok(Self {
            keys,
            inner,
            group_field,
            bags,
        })
    }

    pub fn output_schema(&self, inputs: &[SchemaRef]) -> Schema {
        let mut fields = vec![self.group_field.clone()];
        fields.extend(
            self.bags
                .iter()
                .zip(inputs.iter())
                .map(|((name, uid), schema)| {
                    Field::new(name.clone(), DataType::Bag(schema.clone()), *uid)
                }),
        );
        Schema::new(fields)
    }

    /// Output position of the bag holding rows of input `index`.
    pub fn bag_position(index: usize) -> usize {
        index + 1
    }

    pub fn multiline_display(&self) -> Vec<String> {
        vec![format!(
            "CoGroup: By = {}",
            self.keys
                .iter()
                .zip(self.inner.iter())
                .map(|(side, inner)| {
                    let keys = if side.is_empty() {
                        "all".to_string()
                    } else {
                        format!("({})", side.iter().join(", "))
                    };
                    if *inner {
                        format!("{keys} inner")
                    } else {
                        keys
                    }
                })
                .join(", ")
        )]
    }
}
