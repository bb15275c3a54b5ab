//! Columnar value representation: logical types, scalars, columns,
//! frames, and groupings.

pub mod column;
pub mod compute;
pub mod datatype;
pub mod frame;
pub mod groupby;
pub mod ordkey;
pub mod scalar;
