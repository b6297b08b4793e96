pub mod config;
pub mod error;
pub mod model;
pub mod connection;
pub mod repository;
pub mod table;
pub mod headers;
pub mod provider;
pub mod pipeline;


pub use config::Settings;
pub use error::{IngestError, Result};
pub use model::{CanonicalColumn, NormalizedBatch, PriceBar, Security, SecurityRecord};
pub use connection::{ConnectionManager, ScopedConnection};
pub use repository::{read_reference_file, PriceRepository, SecurityRepository};
pub use table::{FileFormat, RawTable};
pub use provider::EodProvider;
pub use pipeline::{ingest_directory, ingest_file, IngestSummary};
