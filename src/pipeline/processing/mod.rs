// Pipeline processing: cleaning, feature derivation, aggregation and insights

pub mod aggregate;
pub mod clean;
pub mod enrich;
pub mod insights;
pub mod stats;

pub use aggregate::{aggregate, AggregateBundle, AggregateSeries};
pub use clean::{clean, Cleaner, CleanRecord, CleaningSettings, DefaultCleaner};
pub use enrich::{enrich, AgeGroup, EnrichedRecord};
pub use insights::{derive_insights, InsightEngine, InsightFact};
