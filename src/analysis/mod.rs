//! Concrete detectors built on the path-sensitive framework.
//!
//! Each detector is a thin [`crate::flow::FlowAnalysis`] instantiation: an
//! abstract state, two transfer hooks and a findings collection. The
//! special-type detector is the canonical instance; further detectors
//! (callback error checks, argument-order repairs) follow the same shape.

pub mod special_type;

pub use special_type::{
    find_special_type_repairs, SpecialType, SpecialTypeAnalysis, SpecialTypeFinding,
    SpecialTypeState,
};
