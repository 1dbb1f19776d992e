pub mod classify;
pub mod config;
pub mod decision;
pub mod decomposition;
pub mod error;
pub mod manual;
pub mod metrics;
pub mod mixing;
pub mod naming;
pub mod overrides;
pub mod persist;
pub mod reclassify;
pub mod registry;
pub mod runlog;
pub mod trees;
pub mod types;

pub use config::{Convention, DecompositionConfig, EngineConfig, IcaMethod, OutputOptions};
pub use decision::{DecisionEngine, DecisionOutcome, DecisionTree, NO_ACCEPTED_WARNING};
pub use decomposition::{Decomposer, Decomposition};
pub use error::{ErrorKind, Result, TedanaError};
pub use manual::{parse_manual_list, ManualInput};
pub use metrics::{Component, MetricsTable, TableSchema};
pub use mixing::MixingMatrix;
pub use overrides::ManualOverrides;
pub use persist::PersistedRun;
pub use reclassify::{ica_reclassify, LoadedRun, ReappliedRun, ValidatedRun};
pub use registry::{LogEvent, Registry, RegistryEntry};
pub use types::*;
