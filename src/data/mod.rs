//! Data structures: dynamic values, tables, datasets and result matrices.

mod dataset;
mod matrix;
mod table;
mod value;

pub use dataset::Dataset;
pub use matrix::ResultMatrix;
pub use table::Table;
pub use value::Value;
