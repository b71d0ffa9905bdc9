// crates/substrate-policy/src/lib.rs
// ============================================================================
// Module: Substrate Policy Engine
// Description: Sandboxed policy programs and the reaction-cycle evaluator.
// Purpose: Implement C5 per spec.md §4.5: select, compile, and run a node's
//          policies against a triggering observation, threading prior
//          effects and honoring purity/suppression semantics.
// Dependencies: substrate-core, substrate-context, substrate-config
// ============================================================================

//! ## Overview
//! A `Policy` (`substrate-core`) pairs trigger patterns with a sandboxed
//! program. [`lang`] is the restricted expression language and its fuel-
//! metered interpreter; [`engine`] is everything that turns a triggering
//! observation plus a node's policy set into an ordered, purity-isolated
//! run of those programs and the effect list they produce.
//!
//! Policies never perform I/O themselves — they read the frozen
//! `substrate_context::PolicyContext` and return a JSON array of effect
//! objects, which this crate parses into `substrate_core::Effect` and hands
//! to the caller (`substrate-effects`) to execute. This crate stops at
//! "what effects did this observation produce"; it never constructs a
//! Prism operation itself.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod engine;
pub mod lang;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use engine::EvaluationOutcome;
pub use engine::PolicyCache;
pub use engine::PolicyEngineError;
pub use engine::PolicyEvaluation;
pub use engine::evaluate_policies;
pub use engine::matches_trigger;
pub use engine::select_policies;
pub use lang::LangError;
pub use lang::Program;
