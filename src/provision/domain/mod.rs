pub mod action;
pub mod observation;
pub mod plan;
pub mod report;
