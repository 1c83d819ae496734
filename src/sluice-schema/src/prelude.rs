pub use crate::{
    dtype::DataType,
    field::{Field, FieldUid, UidGenerator},
    schema::{Schema, SchemaRef},
};
