pub mod chapter;
pub mod cleaner;
pub mod context;
pub mod events;
pub mod inputs;
pub mod orchestrator;
pub mod outlet;
pub mod planner;
pub mod prompts;
pub mod rewriter;
pub mod worker;
pub mod workflow;
