//! Request routing: mode selection, the legacy bridge, and the smart
//! router that ties the two execution paths together.

pub mod legacy_adapter;
pub mod mode_selector;
pub mod smart_router;

pub use legacy_adapter::{LegacyAdapter, SummarizationLegacyAdapter};
pub use mode_selector::{
    ComplexityPreference, ModePerformance, ProcessingMode, ProcessingModeRequest,
    ProcessingModeResponse, ProcessingModeService, SelectedMode,
};
pub use smart_router::{RouterHealth, RoutingResult, RoutingStats, SmartRouter};
