//! xtid: fetch x.com landing material, drive a client-transaction generator,
//! and snapshot its serialisable state as JSON.

pub mod config;
pub mod export;
pub mod external;
pub mod generator;
pub mod http_client;
pub mod landing;
pub mod locator;
pub mod pipeline;
pub mod snapshot;
pub mod types;

pub use config::DumpConfig;
pub use export::{render, Exporter, EXPORT_HEADER};
pub use external::{ExternalGenerator, ExternalGeneratorFactory};
pub use generator::{AttributeValue, GeneratorFactory, TransactionGenerator};
pub use http_client::{default_headers, HttpClient, HttpResponse};
pub use landing::{fetch_landing_page, LandingStrategy};
pub use locator::{AssetLocator, AssetMatcher, ChunkMapMatcher, ScriptSrcMatcher};
pub use pipeline::{DumpPipeline, DumpReport, Sources, TID_REPORT_PREFIX};
pub use snapshot::{extract_state, ExportRecord};
pub use types::*;
