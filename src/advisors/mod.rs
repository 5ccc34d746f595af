//! Advisor subsystem: panel coordination, transports, and safety nets
//!
//! The coordinator fans one query out to a panel of persona-driven advisors,
//! validates their opinions, weights them by learned calibration, and
//! aggregates the result. Cost guard and circuit breaker sit between the
//! panel and the wire so a misbehaving backend degrades the panel instead
//! of the decision.

pub mod circuit_breaker;
pub mod coordinator;
pub mod cost_guard;
pub mod persona;
pub mod telemetry;
pub mod transport;
pub mod validation;
pub mod weighting;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerState};
pub use coordinator::{AdvisorCoordinator, QueryOptions};
pub use cost_guard::{CostGuard, CostGuardState, CostGuardTrip};
pub use persona::builtin_personas;
pub use transport::{
    AdvisorTransport, CostEstimate, MockReply, MockTransport, TransportError, TransportRequest,
    TransportResponse,
};
pub use validation::{parse_opinion, ParsedOpinion, ValidationError};
pub use weighting::{load_snapshot, save_snapshot, WeightEntry, WeightSnapshot};
