// crates.io
use tracing::{Instrument, Span, instrument::Instrumented, span::EnteredSpan};
// self
use crate::{_prelude::*, auth::ProviderId, obs::FlowKind};

/// The `lifeops.flow` span of one flow run, tagged with its kind, stage, and provider.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: Span,
}
impl FlowSpan {
	/// Opens the span for `provider`.
	pub fn new(kind: FlowKind, stage: &'static str, provider: &ProviderId) -> Self {
		let span = tracing::info_span!(
			"lifeops.flow",
			flow = kind.as_str(),
			stage,
			provider = provider.as_str()
		);

		Self { span }
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> EnteredSpan {
		self.span.entered()
	}

	/// Runs `fut` inside the span without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
