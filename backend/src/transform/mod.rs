//! Transformation module.
//!
//! - Cleaning: type conversion, missing values, duplicates, outliers
//! - Features: column arithmetic, encodings, scaling, date parts
//! - Operations: the tagged DSL naming every transformation
//! - Pipeline: recipes of operations applied to a session

pub mod cleaning;
pub mod features;
pub mod operations;
pub mod pipeline;

pub use cleaning::{
    clip_outliers_iqr, convert_type, drop_duplicates, drop_missing, fill_missing,
    remove_outliers_sigma, Axis, FillMethod, TargetKind,
};
pub use features::{
    combine_columns, extract_date_features, label_encode, label_mapping, one_hot_encode, scale,
    CombineOp, ScaleMethod,
};
pub use operations::{operations_description, Operation};
pub use pipeline::{example_recipe, process_file, run_recipe, Recipe, RunReport};
