//! Services layer
//!
//! Evaluation, diagnosis and repair built on the domain ports:
//! - Evaluator: predict once per question and score with every judge
//! - FailureClusterer: group failing verdicts by root cause
//! - PatchProposer / PatchValidator / Applier: turn clusters into safe,
//!   reversible metadata edits
//! - Repeatability: query stability within and across iterations
//! - Orchestrator: the evaluate, diagnose and repair loop

pub mod applier;
pub mod evaluator;
pub mod failure_clusterer;
pub mod judges;
pub mod orchestrator;
pub mod patch_proposer;
pub mod patch_validator;
pub mod query_text;
pub mod repeatability;
pub mod result_comparator;

pub use applier::{ApplyError, Applier};
pub use evaluator::Evaluator;
pub use orchestrator::{Collaborators, Orchestrator, RunOptions};
pub use patch_proposer::{PatchProposer, ProposalContext, Proposals};
pub use patch_validator::{PatchValidator, ValidatedPatchSet};
