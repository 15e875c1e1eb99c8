// orderflow/src/pipeline/execution.rs

//! `Pipeline::run`.

use crate::context::{ContextData, Handler};
use crate::control::{PipelineControl, PipelineResult};
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, Instrument, Level};

/// What a phase asked the run loop to do.
enum PhaseOutcome {
  Proceed,
  Halt,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  async fn run_phase(
    handlers: Option<&Vec<Handler<TData, Err>>>,
    phase: &'static str,
    ctx_data: &ContextData<TData>,
  ) -> Result<PhaseOutcome, Err> {
    let Some(handlers) = handlers else {
      return Ok(PhaseOutcome::Proceed);
    };
    for (handler_idx, handler_fn) in handlers.iter().enumerate() {
      let span = tracing::debug_span!("handler", phase, handler_index = handler_idx);
      match handler_fn(ctx_data.clone()).instrument(span).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => {
          event!(Level::INFO, phase, "Pipeline stopped by handler.");
          return Ok(PhaseOutcome::Halt);
        }
        Err(e) => {
          event!(Level::WARN, phase, error = %e, "Handler failed.");
          return Err(e);
        }
      }
    }
    Ok(PhaseOutcome::Proceed)
  }

  /// Runs every step in order against `ctx_data`.
  ///
  /// Returns `Stopped` as soon as a handler returns `PipelineControl::Stop`,
  /// and the handler's error as soon as one fails.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();

      if let Some(skip_if) = &step_def.skip_if {
        if skip_if(ctx_data.clone()) {
          event!(Level::DEBUG, step_name, step_idx, "Step skipped.");
          continue;
        }
      }

      let before = self.before.get(step_name).filter(|v| !v.is_empty());
      let on = self.on.get(step_name).filter(|v| !v.is_empty());
      let after = self.after.get(step_name).filter(|v| !v.is_empty());

      if before.is_none() && on.is_none() && after.is_none() {
        if step_def.optional {
          event!(Level::DEBUG, step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(Level::ERROR, step_name, "Non-optional step has no handlers.");
        return Err(Err::from(FlowError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }

      let step_span = tracing::info_span!("step", step_name, step_idx);
      let outcome = async {
        for (phase, handlers) in [("before", before), ("on", on), ("after", after)] {
          if let PhaseOutcome::Halt = Self::run_phase(handlers, phase, &ctx_data).await? {
            return Ok::<_, Err>(PhaseOutcome::Halt);
          }
        }
        Ok(PhaseOutcome::Proceed)
      }
      .instrument(step_span)
      .await?;

      if let PhaseOutcome::Halt = outcome {
        return Ok(PipelineResult::Stopped);
      }
    }

    event!(Level::DEBUG, "Pipeline completed.");
    Ok(PipelineResult::Completed)
  }
}
