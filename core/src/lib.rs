// orderflow/src/lib.rs

//! orderflow: small async step pipelines for order workflows.
//!
//! A workflow is a `Pipeline<TData, Err>`: an ordered list of named steps, each
//! with `before`, `on` and `after` handlers that share one `ContextData<TData>`.
//! Handlers decide whether the run continues or stops, and the first handler
//! error aborts the run. Pipelines are registered in a `Registry<Err>` keyed by
//! their context type, so a caller only needs to build the context and call
//! `Registry::run`.
//!
//! ```ignore
//! let mut p = Pipeline::<PlaceOrderCtx, AppError>::new(&[
//!   ("validate_cart", false, None),
//!   ("debit_wallet", false, None),
//! ]);
//! p.on_root("validate_cart", |ctx| Box::pin(async move { /* ... */ Ok(PipelineControl::Continue) }));
//! registry.register_pipeline(p);
//! registry.run(ContextData::new(ctx)).await?;
//! ```

pub mod context;
pub mod control;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod step;

pub use crate::context::{ContextData, Handler};
pub use crate::control::{PipelineControl, PipelineResult};
pub use crate::error::{FlowError, FlowResult};
pub use crate::pipeline::Pipeline;
pub use crate::registry::Registry;
pub use crate::step::{SkipCondition, StepDef};
