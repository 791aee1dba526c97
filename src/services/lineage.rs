//! Provenance queries over `source_version_id` pointers.

use crate::model::{ModelResult, Repository, Version, VersionId, DEFAULT_LINEAGE_DEPTH};

/// Walks derivation chains in both directions.
pub struct LineageService<'a> {
    repo: &'a dyn Repository,
    default_depth: usize,
}

impl<'a> LineageService<'a> {
    pub fn new(repo: &'a dyn Repository) -> Self {
        Self {
            repo,
            default_depth: DEFAULT_LINEAGE_DEPTH,
        }
    }

    /// Depth used when a query does not give one.
    pub fn with_default_depth(mut self, depth: usize) -> Self {
        self.default_depth = depth;
        self
    }

    pub fn default_depth(&self) -> usize {
        self.default_depth
    }

    /// The version and its ancestors, newest first.
    ///
    /// An unknown id gives an empty chain rather than an error.
    pub fn lineage(&self, version_id: &VersionId, max_depth: Option<usize>) -> ModelResult<Vec<Version>> {
        self.repo
            .query_lineage(version_id, max_depth.unwrap_or(self.default_depth))
    }

    /// Versions of the same file that were derived directly from
    /// `version_id`, deleted ones included.
    pub fn descendants(&self, version_id: &VersionId) -> ModelResult<Vec<Version>> {
        let Some(target) = self.repo.get_version(version_id)? else {
            return Ok(Vec::new());
        };
        Ok(self
            .repo
            .list_versions(&target.file_id, true)?
            .into_iter()
            .filter(|v| v.source_version_id.as_ref() == Some(version_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use crate::model::{Collection, ContentHash, LogicalFile, NewVersion};
    use crate::store::SqliteRepository;

    struct Chain {
        repo: SqliteRepository,
        file: LogicalFile,
        versions: Vec<Version>,
    }

    /// v1 <- v2 <- v3 in one file.
    fn setup() -> Chain {
        let repo = SqliteRepository::in_memory();
        let gateway = MemoryGateway::new();
        let collection = Collection::new("cifar");
        repo.add_collection(&collection).unwrap();
        let file = collection.add_child(&repo, "train.csv", "", "").unwrap();

        let mut versions: Vec<Version> = Vec::new();
        for hash in ["a", "b", "c"] {
            let mut new = NewVersion::from_hash(ContentHash::md5(hash));
            if let Some(prev) = versions.last() {
                new = new.derived_from(prev.id.clone());
            }
            versions.push(file.add_version(&repo, &gateway, new).unwrap());
        }
        Chain { repo, file, versions }
    }

    fn numbers(chain: &[Version]) -> Vec<u32> {
        chain.iter().map(|v| v.version_number.get()).collect()
    }

    #[test]
    fn test_lineage_newest_first() {
        let chain = setup();
        let service = LineageService::new(&chain.repo);
        let v3 = &chain.versions[2];

        assert_eq!(numbers(&service.lineage(&v3.id, None).unwrap()), vec![3, 2, 1]);
        assert_eq!(numbers(&service.lineage(&v3.id, Some(2)).unwrap()), vec![3, 2]);
        assert!(service.lineage(&VersionId::new("ghost"), None).unwrap().is_empty());
    }

    #[test]
    fn test_default_depth_applies() {
        let chain = setup();
        let service = LineageService::new(&chain.repo).with_default_depth(1);
        let v3 = &chain.versions[2];
        assert_eq!(numbers(&service.lineage(&v3.id, None).unwrap()), vec![3]);
    }

    #[test]
    fn test_descendants() {
        let chain = setup();
        let service = LineageService::new(&chain.repo);
        let [v1, _, v3] = [&chain.versions[0], &chain.versions[1], &chain.versions[2]];

        assert_eq!(numbers(&service.descendants(&v1.id).unwrap()), vec![2]);
        assert!(service.descendants(&v3.id).unwrap().is_empty());
        assert!(service.descendants(&VersionId::new("ghost")).unwrap().is_empty());
    }

    #[test]
    fn test_descendants_include_deleted() {
        let chain = setup();
        chain.file.delete_all_versions(&chain.repo).unwrap();

        let service = LineageService::new(&chain.repo);
        let found = service.descendants(&chain.versions[0].id).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].is_deleted());
    }
}
