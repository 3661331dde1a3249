//! Clinical Intake - conversation core for structured patient interviews.
//!
//! This crate drives a clinical-intake dialogue: identity capture, an
//! interview drawn from a bank of clinician questions, and a rubric-based
//! scoring pass triggered on request.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
