//! Expectation registry, parameter handling and check compilation.
//!
//! Every stored `expectation_type` resolves to one [`ExpectationType`]
//! variant. Compilation turns the free-form kwargs into a typed
//! [`CheckSpec`] that engines evaluate, reporting malformed parameters with
//! the offending field path.

pub mod check;
pub mod kwargs;
pub mod registry;

pub use check::{
    compile, compile_options, Aggregate, CheckOptions, CheckSpec, RowCondition, SetComparison,
    ValueRange,
};
pub use kwargs::{to_engine, to_public, PARAMETER_RENAMES};
pub use registry::{
    supported_unsupported_expectations, ExpectationCategory, ExpectationType,
    SupportedExpectations, UNSUPPORTED_EXPECTATIONS,
};
