use std::fs;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::archive::ArchiveClient;
use crate::catalog::CatalogClient;
use crate::domain::{ArchiveSlug, CatalogSpec, DatasetDescriptor, SourceKind};
use crate::error::AcqError;
use crate::fs_util;
use crate::store::Store;

/// Fetch and freshness capability for one dataset.
pub trait RemoteSource {
    /// Fetches the dataset into the storage root. `targets` names the files
    /// the caller needs; adapters that can only deliver whole bundles fetch
    /// everything regardless.
    fn download(&self, targets: Option<&[String]>) -> Result<bool, AcqError>;

    /// One freshness signal for the whole dataset.
    fn last_modified(&self) -> Result<DateTime<Utc>, AcqError>;
}

/// Picks the adapter for a descriptor's source kind.
pub trait SourceResolver {
    fn resolve<'a>(&'a self, descriptor: &'a DatasetDescriptor) -> Box<dyn RemoteSource + 'a>;
}

/// Single-file export from a catalog portal.
pub struct CatalogSource<'a, C: CatalogClient> {
    descriptor: &'a DatasetDescriptor,
    spec: &'a CatalogSpec,
    store: &'a Store,
    client: &'a C,
}

impl<'a, C: CatalogClient> CatalogSource<'a, C> {
    pub fn new(
        descriptor: &'a DatasetDescriptor,
        spec: &'a CatalogSpec,
        store: &'a Store,
        client: &'a C,
    ) -> Self {
        Self {
            descriptor,
            spec,
            store,
            client,
        }
    }
}

impl<C: CatalogClient> RemoteSource for CatalogSource<'_, C> {
    fn download(&self, targets: Option<&[String]>) -> Result<bool, AcqError> {
        if let Some(targets) = targets {
            debug!(
                dataset = self.descriptor.name(),
                ?targets,
                "catalog exports a single file; fetching it in full"
            );
        }
        let file = self.descriptor.primary_file();
        let mut staged = self.store.staging_file(file)?;
        self.client.fetch(&self.spec.url, staged.as_file_mut())?;
        let path = self.store.persist(staged, file)?;
        info!(dataset = self.descriptor.name(), path = %path, "catalog file stored");
        Ok(true)
    }

    fn last_modified(&self) -> Result<DateTime<Utc>, AcqError> {
        self.client
            .last_modified(&self.spec.domain, &self.spec.dataset_id)
    }
}

/// Multi-file bundle from an archive provider.
pub struct ArchiveSource<'a, A: ArchiveClient> {
    descriptor: &'a DatasetDescriptor,
    slug: &'a ArchiveSlug,
    store: &'a Store,
    client: &'a A,
}

impl<'a, A: ArchiveClient> ArchiveSource<'a, A> {
    pub fn new(
        descriptor: &'a DatasetDescriptor,
        slug: &'a ArchiveSlug,
        store: &'a Store,
        client: &'a A,
    ) -> Self {
        Self {
            descriptor,
            slug,
            store,
            client,
        }
    }

    pub fn artifact_name(&self) -> String {
        format!("{}.zip", self.slug.dataset())
    }
}

impl<A: ArchiveClient> RemoteSource for ArchiveSource<'_, A> {
    fn download(&self, targets: Option<&[String]>) -> Result<bool, AcqError> {
        if let Some(targets) = targets {
            debug!(
                dataset = self.descriptor.name(),
                ?targets,
                "provider only serves whole bundles; re-fetching all members"
            );
        }
        self.store.ensure_root()?;
        let artifact = self.store.file_path(&self.artifact_name());
        let fetched = fs::File::create(artifact.as_std_path())
            .map_err(|err| AcqError::Filesystem(err.to_string()))
            .and_then(|mut file| self.client.download_bundle(self.slug, &mut file));
        if let Err(err) = fetched {
            if let Err(cleanup) = fs_util::remove_artifact(artifact.as_std_path()) {
                warn!(archive = %artifact, error = %cleanup, "failed to remove partial archive");
            }
            return Err(err);
        }

        let members =
            fs_util::unpack_and_remove(artifact.as_std_path(), self.store.root().as_std_path())?;
        let undeclared = members
            .iter()
            .filter(|member| !self.descriptor.files().contains(member))
            .count();
        info!(
            dataset = self.descriptor.name(),
            members = members.len(),
            undeclared,
            "archive bundle unpacked"
        );
        Ok(true)
    }

    fn last_modified(&self) -> Result<DateTime<Utc>, AcqError> {
        self.client.last_updated(self.slug)
    }
}

/// Resolver backed by one client per provider kind.
pub struct Providers<C: CatalogClient, A: ArchiveClient> {
    store: Store,
    catalog: C,
    archive: A,
}

impl<C: CatalogClient, A: ArchiveClient> Providers<C, A> {
    pub fn new(store: Store, catalog: C, archive: A) -> Self {
        Self {
            store,
            catalog,
            archive,
        }
    }
}

impl<C: CatalogClient, A: ArchiveClient> SourceResolver for Providers<C, A> {
    fn resolve<'a>(&'a self, descriptor: &'a DatasetDescriptor) -> Box<dyn RemoteSource + 'a> {
        match descriptor.source() {
            SourceKind::Catalog(spec) => Box::new(CatalogSource::new(
                descriptor,
                spec,
                &self.store,
                &self.catalog,
            )),
            SourceKind::Archive(slug) => Box::new(ArchiveSource::new(
                descriptor,
                slug,
                &self.store,
                &self.archive,
            )),
        }
    }
}
