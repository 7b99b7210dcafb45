pub mod cache;
pub mod error;
pub mod fhir;
pub mod field;
pub mod key;
pub mod module;
pub mod mutation;
pub mod notify;
pub mod query;
pub mod reconcile;
pub mod response;
pub mod store;
#[cfg(feature = "http")]
pub mod zambda;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use cache::{CachedSlice, ChartCache, InMemoryChartCache, SliceUpdater};
pub use error::{ChartError, Result};
pub use field::{
    ChartEntity, ChartField, ChartFieldValue, CodeableDto, DiagnosisDto, FreeTextNoteDto, NoteDto,
    NoteType,
};
pub use key::{CacheKey, SearchParams};
pub use module::{ServiceModule, Tagged, is_behavioral_health_resource, is_in_person_appointment};
pub use mutation::{EditableNote, MutationDispatcher, NoteApiConfig};
pub use notify::{
    ChannelNotifier, Notification, NotificationVariant, Notifier, NoteLocales, Operation,
    TracingNotifier,
};
pub use query::ChartDataQuery;
pub use reconcile::{CacheReconciler, Reconciliation};
pub use response::{
    ChartDataDeletion, ChartDataRequest, ChartDataResponse, ResourceRef, SaveChartDataRequest,
};
pub use store::{ChartDataStore, InMemoryChartDataStore};
#[cfg(feature = "http")]
pub use zambda::ZambdaChartDataStore;
