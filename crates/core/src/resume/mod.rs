//! Resume-or-restart decisions for resumable steps.
//!
//! This module provides:
//! - The `ResumeDecision` gate consulted before a resumable step starts
//! - The `Confirmer` trait and its implementations for asking the human

pub mod confirm;
pub mod gate;

pub use confirm::{prompt_channel, AutoConfirm, Confirmer, Prompt, PromptChannel};
pub use gate::{decide, DecisionReason, ResumeDecision};
