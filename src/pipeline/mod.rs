//! Dispatch pipeline.
//!
//! Every payload a listener delivers flows through:
//! 1. `Processor::can_process()`: each flow decides whether it is interested
//! 2. `Processor::process()`: the matching flows turn it into a result
//! 3. `Formatter::format()`: the result is reshaped, in chain order
//! 4. `Action::execute()`: all actions of the flow run concurrently
//!
//! Faults and unclaimed payloads loop back into the orchestrator as error and
//! unknown-command payloads.

pub mod flow;
pub mod orchestrator;
pub mod types;
