//! Natural-language questions answered over a property graph.
//!
//! The flow is synthesize, guard, execute, answer. Only queries that pass
//! [`guard::check`] become a [`ReadOnlyQuery`], and a [`GraphStore`] accepts
//! nothing else.

mod answer;
mod chain;
mod executor;
pub mod guard;
mod schema;
mod synthesizer;

pub use answer::{GraphAnswerSynthesizer, DEFAULT_MAX_ROWS};
pub use chain::{GraphQaChain, GraphQaConfig, GraphQaOutput};
pub use executor::{CypherExecutor, GraphStore, GraphStoreError, QueryOutcome, Row};
pub use guard::{GuardViolation, ReadOnlyQuery};
pub use schema::{CypherExample, GraphSchema, NodeLabel, RelationshipType, SchemaError};
pub use synthesizer::{CypherSynthesizer, NoQueryReason, SynthesizedQuery, NO_QUERY_SENTINEL};
