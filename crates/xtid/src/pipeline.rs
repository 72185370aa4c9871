//! The dump run: fetch, locate, build, sample, extract, export.
//!
//! Every step consumes the previous step's output, so the run is a straight
//! line of awaits. Any error ends the run; nothing is retried.

use std::io::Write;
use std::path::PathBuf;

use crate::config::DumpConfig;
use crate::export::Exporter;
use crate::generator::{GeneratorFactory, TransactionGenerator};
use crate::http_client::HttpClient;
use crate::landing::fetch_landing_page;
use crate::locator::AssetLocator;
use crate::snapshot::{extract_state, ExportRecord};
use crate::types::{Document, TidResult};

/// Prefix of the stdout line reporting the example transaction ID.
pub const TID_REPORT_PREFIX: &str = "Example X-Client-Transaction-Id:";

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct DumpReport {
    pub asset_url: String,
    pub transaction_id: String,
    pub record: ExportRecord,
    pub output: PathBuf,
}

/// Landing page plus the located asset, ready for the generator.
#[derive(Debug)]
pub struct Sources {
    pub document: Document,
    pub asset_url: String,
    pub ondemand_js: String,
}

pub struct DumpPipeline<F> {
    config: DumpConfig,
    client: HttpClient,
    locator: AssetLocator,
    factory: F,
}

impl<F: GeneratorFactory> DumpPipeline<F> {
    /// Validate `config` and open the HTTP session.
    pub fn new(config: DumpConfig, factory: F) -> TidResult<Self> {
        config.validate()?;
        let client = HttpClient::new(config.timeout)?;
        Ok(Self {
            config,
            client,
            locator: AssetLocator::default(),
            factory,
        })
    }

    /// Replace the asset discovery rules.
    pub fn with_locator(mut self, locator: AssetLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn config(&self) -> &DumpConfig {
        &self.config
    }

    /// Fetch the landing page and the on-demand asset it references.
    pub async fn fetch_sources(&self) -> TidResult<Sources> {
        tracing::info!("Fetching landing page {}", self.config.home_url);
        let document =
            fetch_landing_page(&self.client, &self.config.home_url, self.config.landing).await?;

        let asset_url = self.locator.require(&document)?;
        tracing::info!("Fetching on-demand asset {asset_url}");
        let ondemand_js = self.client.get(&asset_url).await?.body;

        Ok(Sources {
            document,
            asset_url,
            ondemand_js,
        })
    }

    /// Run end to end, writing the report to `out` and the record to the output file.
    pub async fn run<W: Write>(&self, out: &mut W) -> TidResult<DumpReport> {
        let Sources {
            document,
            asset_url,
            ondemand_js,
        } = self.fetch_sources().await?;

        tracing::info!("Building transaction generator");
        let generator = self.factory.build(document, ondemand_js).await?;

        let path = self.config.sample_path()?;
        let transaction_id = generator
            .compute_transaction_id(&self.config.sample_method, &path)
            .await?;
        writeln!(out, "{TID_REPORT_PREFIX} {transaction_id}")?;

        let record = extract_state(generator.attributes());

        let exporter = Exporter::new(&self.config.output);
        exporter.export(&record, out)?;

        Ok(DumpReport {
            asset_url,
            transaction_id,
            record,
            output: self.config.output.clone(),
        })
    }
}
