use super::{
    clone::ClonerDataProcessor, reindex::ReindexerDataProcessor, snapshot::SnapshotDataProcessor,
    AccountsProcessor, DataProcessor,
};
use crate::{
    client::{
        elastic::{ElasticClient, SearchIndexClient},
        rest::{HttpApiClient, RestClient},
        storage::{DirectoryStorage, HttpObjectStorage, ObjectStorageClient},
    },
    config::{Config, ConfigError, ElasticConfig, ProcessorKind},
    getter::AccountsGetter,
    reindex::{cloner::Cloner, indexer::AccountsIndexer, Reindexer},
    snapshot::SnapshotBalances,
};
use std::{path::Path, sync::Arc};
use tracing::info;

/// Builds the processor of `kind`, validating every setting it depends on
pub fn create_data_processor(
    config: &Config,
    kind: ProcessorKind,
    indices_path: &Path,
) -> anyhow::Result<Box<dyn DataProcessor>> {
    config.validate(kind)?;
    info!(kind = ?kind, "creating data processor");

    let api: Arc<dyn HttpApiClient> = Arc::new(RestClient::new(&config.api.url, config.api.timeout())?);
    let credentials = config.api.credentials();
    let converter = config.address_pubkey_converter.converter();

    match kind {
        ProcessorKind::Reindex => {
            let source: Arc<dyn SearchIndexClient> = Arc::new(elastic_client(&config.source_elastic)?);
            let destinations = config
                .destinations
                .iter()
                .map(|destination| Ok(Arc::new(elastic_client(destination)?) as Arc<dyn SearchIndexClient>))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let getter = AccountsGetter::new(
                Arc::clone(&api),
                Arc::clone(&source),
                credentials.clone(),
                config.general.clone(),
                converter,
            );
            let accounts_processor = AccountsProcessor::new(api, credentials, Arc::new(getter));
            let reindexer = Reindexer::new(source, destinations, indices_path)?;
            Ok(Box::new(ReindexerDataProcessor::new(accounts_processor, reindexer)))
        }
        ProcessorKind::Clone => {
            let elastic = Arc::new(elastic_client(&config.source_elastic)?);

            let getter = AccountsGetter::new(
                Arc::clone(&api),
                elastic.clone(),
                credentials.clone(),
                config.general.clone(),
                converter,
            );
            let accounts_processor = AccountsProcessor::new(api, credentials, Arc::new(getter));
            let accounts_indexer = AccountsIndexer::new(elastic.clone());
            let cloner = Cloner::new(elastic);
            Ok(Box::new(ClonerDataProcessor::new(
                accounts_processor,
                accounts_indexer,
                cloner,
            )))
        }
        ProcessorKind::Snapshot => {
            let snapshot = config.snapshot.as_ref().ok_or(ConfigError::Missing("snapshot"))?;
            let storage: Arc<dyn ObjectStorageClient> = match (&snapshot.local_dir, &snapshot.url, &snapshot.bucket) {
                (Some(dir), _, _) => Arc::new(DirectoryStorage::new(dir)),
                (None, Some(url), Some(bucket)) => Arc::new(HttpObjectStorage::new(url, bucket)),
                _ => return Err(ConfigError::Missing("snapshot.local_dir").into()),
            };

            let destinations = config
                .destinations
                .iter()
                .map(|destination| Ok(Arc::new(elastic_client(destination)?) as Arc<dyn SearchIndexClient>))
                .collect::<anyhow::Result<Vec<_>>>()?;
            // nothing is scrolled from the source in this mode
            let source = destinations
                .first()
                .cloned()
                .ok_or(ConfigError::EmptyDestinations)?;
            let reindexer = Reindexer::new(source, destinations, indices_path)?;

            Ok(Box::new(SnapshotDataProcessor::new(
                api,
                credentials,
                SnapshotBalances::new(storage, converter),
                reindexer,
                snapshot.epoch,
            )))
        }
    }
}

fn elastic_client(config: &ElasticConfig) -> anyhow::Result<ElasticClient> {
    Ok(ElasticClient::new(&config.url, config.credentials())?)
}
