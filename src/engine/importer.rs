//! engine::importer
//!
//! Commit a built version into a repository.
//!
//! # Steps
//!
//! 1. Test the metadata against the source directory; abort on any issue
//! 2. Resolve the target id (explicit, auto-increment, or from metadata)
//! 3. Refuse ids that already exist anywhere in the home
//! 4. Copy or move the listed files, write the metadata, register the
//!    version in the target repository
//! 5. Record reverse dependencies and invalidate the finder
//!
//! # Invariants
//!
//! - Nothing is written before the test passes and the id is known to be new
//! - A failed commit is rolled back: copies and metadata are removed, moved
//!   files go back to the source, and directories the commit created are
//!   pruned, so a retry does not see an existing version
//!
//! The "id is new" check and the commit are not atomic with respect to other
//! processes importing the same id.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::core::errors::{RepoError, Result};
use crate::core::finder::RepositoryFinder;
use crate::core::hash::HashRegistry;
use crate::core::metadata::VersionMetadata;
use crate::core::model::Version;
use crate::core::paths::join_relative;
use crate::core::repository::KiHome;
use crate::core::types::{ComponentId, VersionId};

use super::tester::{load_detached, TestIssue, VersionTester};

/// How files reach the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    #[default]
    Copy,
    Move,
}

/// Options for one import.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Repository that receives the version.
    pub repository: String,
    /// Use this id instead of the one in the metadata.
    pub version_id: Option<VersionId>,
    /// Allocate the next integer version of this component.
    pub create_new_version: Option<ComponentId>,
    pub mode: ImportMode,
    /// Test dependencies as well before importing.
    pub test_recursive: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            repository: "local".to_string(),
            version_id: None,
            create_new_version: None,
            mode: ImportMode::Copy,
            test_recursive: false,
        }
    }
}

/// Imports versions into a ki home.
pub struct VersionImporter<'a> {
    home: &'a KiHome,
    finder: &'a RepositoryFinder,
    registry: &'a HashRegistry,
}

impl<'a> VersionImporter<'a> {
    pub fn new(home: &'a KiHome, finder: &'a RepositoryFinder, registry: &'a HashRegistry) -> Self {
        Self {
            home,
            finder,
            registry,
        }
    }

    /// Import the version described by `metadata_file` whose files are
    /// under `source_root`.
    ///
    /// # Errors
    ///
    /// - `IntegrityMismatch` if the files do not match the metadata
    /// - `Configuration` for conflicting or missing id options
    /// - `AlreadyExists` if the target id is already committed
    pub fn import(
        &self,
        metadata_file: &Path,
        source_root: &Path,
        options: &ImportOptions,
        on_issue: &mut dyn FnMut(&TestIssue),
    ) -> Result<Rc<Version>> {
        let detached = load_detached(metadata_file, source_root)?;
        let report = VersionTester::new(self.finder, self.registry)
            .recursive(options.test_recursive)
            .test(Rc::new(detached.clone()), on_issue)?;
        if !report.all_ok() {
            return Err(RepoError::IntegrityMismatch(format!(
                "{} issue(s) in '{}'",
                report.issues().len(),
                metadata_file.display()
            )));
        }

        let mut metadata = detached.metadata()?.clone();
        let id = self.target_id(metadata.version_id.as_ref(), options)?;
        let repo = self.home.ensure_repository(&options.repository)?;
        if self.finder.version_by_id(&id)?.exists()
            || repo.metadata(&id)?.is_some()
            || repo.binaries(&id).is_some()
        {
            return Err(RepoError::AlreadyExists(id.to_string()));
        }
        info!(version = %id, repository = repo.name(), "importing version");

        let target = repo.paths().version_dir(&id);
        let mut placed = Vec::new();
        let committed = place_files(&metadata, source_root, &target, options.mode, &mut placed)
            .and_then(|()| {
                metadata.version_id = Some(id.clone());
                repo.write_metadata(&id, &metadata)?;
                repo.add_version(&id)
            });
        if let Err(e) = committed {
            warn!(version = %id, error = %e, "import failed, rolling back");
            roll_back(&target, &repo.paths().metadata_path(&id), &placed, options.mode);
            return Err(e);
        }

        if options.mode == ImportMode::Move {
            let sources = placed.iter().filter_map(|(from, _)| from.parent());
            remove_empty_dirs(source_root, sources.map(Path::to_path_buf).collect());
        }

        for dependency in &metadata.dependencies {
            self.record_reverse_dependency(&dependency.version_id, &id)?;
        }

        self.finder.invalidate()?;
        let committed = self.finder.version_by_id(&id)?;
        info!(version = %id, files = metadata.files.len(), "import committed");
        Ok(committed)
    }

    fn target_id(
        &self,
        from_metadata: Option<&VersionId>,
        options: &ImportOptions,
    ) -> Result<VersionId> {
        match (&options.version_id, &options.create_new_version) {
            (Some(_), Some(_)) => Err(RepoError::Configuration(
                "Can't define both specific_version_id and create_new_version".to_string(),
            )),
            (Some(id), None) => Ok(id.clone()),
            (None, Some(component)) => self.next_version(component),
            (None, None) => from_metadata.cloned().ok_or_else(|| {
                RepoError::Configuration(
                    "version_id is not defined in metadata or options".to_string(),
                )
            }),
        }
    }

    /// The integer after the component's newest version, or 1.
    fn next_version(&self, component: &ComponentId) -> Result<VersionId> {
        let latest = match self.finder.component(component.as_str())? {
            Some(c) => c.latest()?,
            None => None,
        };
        let next = match latest {
            None => 1,
            Some(id) => {
                let n: u64 = id.name().parse().map_err(|_| {
                    RepoError::Configuration(format!(
                        "version name of '{id}' is not an integer, can't create a new version"
                    ))
                })?;
                n + 1
            }
        };
        Ok(component.version(&next.to_string())?)
    }

    /// Append to the reverse dependency list where the dependency's
    /// metadata lives. Dependencies missing from the home are skipped.
    fn record_reverse_dependency(&self, dependency: &VersionId, dependent: &VersionId) -> Result<()> {
        let version = self.finder.version_by_id(dependency)?;
        let location = version
            .locations()
            .iter()
            .find(|l| l.has_metadata)
            .or_else(|| version.locations().first());
        match location {
            Some(location) => self
                .home
                .repository(&location.repository)
                .add_reverse_dependency(dependency, dependent),
            None => {
                debug!(%dependency, "dependency not in any repository, skipping reverse link");
                Ok(())
            }
        }
    }
}

/// Copy or move every listed file below `target`, recording each
/// `(source, destination)` pair once it is in place.
fn place_files(
    metadata: &VersionMetadata,
    source_root: &Path,
    target: &Path,
    mode: ImportMode,
    placed: &mut Vec<(PathBuf, PathBuf)>,
) -> Result<()> {
    fs::create_dir_all(target).map_err(|e| RepoError::io(target, e))?;
    for file in &metadata.files {
        let from = join_relative(source_root, &file.path);
        let to = join_relative(target, &file.path);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| RepoError::io(parent, e))?;
        }
        match mode {
            ImportMode::Copy => {
                fs::copy(&from, &to).map_err(|e| RepoError::io(&from, e))?;
            }
            ImportMode::Move => move_file(&from, &to)?,
        }
        placed.push((from, to));
        debug!(file = %file.path, "imported file");
    }
    Ok(())
}

/// Undo a failed commit. Documents already in `target` (statuses written
/// before the import) are kept.
fn roll_back(target: &Path, metadata_path: &Path, placed: &[(PathBuf, PathBuf)], mode: ImportMode) {
    for (from, to) in placed.iter().rev() {
        let undone = match mode {
            ImportMode::Copy => fs::remove_file(to).map_err(|e| RepoError::io(to, e)),
            ImportMode::Move => move_file(to, from),
        };
        if let Err(e) = undone {
            warn!(file = %to.display(), error = %e, "could not roll back imported file");
        }
    }
    if metadata_path.is_file() {
        if let Err(e) = fs::remove_file(metadata_path) {
            warn!(file = %metadata_path.display(), error = %e, "could not remove metadata");
        }
    }

    let Some(component_dir) = target.parent() else {
        return;
    };
    let created = placed
        .iter()
        .filter_map(|(_, to)| to.parent())
        .chain([target])
        .map(Path::to_path_buf)
        .collect();
    remove_empty_dirs(component_dir, created);
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Different file systems
    fs::copy(from, to).map_err(|e| RepoError::io(from, e))?;
    fs::remove_file(from).map_err(|e| RepoError::io(from, e))?;
    Ok(())
}

/// Remove emptied directories below `root`, deepest first.
fn remove_empty_dirs(root: &Path, dirs: Vec<PathBuf>) {
    let mut candidates: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        let mut current = Some(dir.as_path());
        while let Some(d) = current {
            if d == root || !d.starts_with(root) {
                break;
            }
            if !candidates.iter().any(|c| c == d) {
                candidates.push(d.to_path_buf());
            }
            current = d.parent();
        }
    }
    candidates.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    for dir in candidates {
        // Fails harmlessly on directories that still have content
        if fs::remove_dir(&dir).is_ok() {
            debug!(dir = %dir.display(), "removed empty directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{add_files, DependencyEdge, FileDefaults, FileEntry};
    use crate::core::store::JsonDocument;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        home: KiHome,
        registry: HashRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let home = KiHome::new(temp.path().join("home"));
            Self {
                temp,
                home,
                registry: HashRegistry::with_defaults(),
            }
        }

        /// Build `id` from files under `<temp>/<name>`; returns (metadata, input).
        fn build(&self, name: &str, id: &str, deps: &[&str]) -> (PathBuf, PathBuf) {
            let input = self.temp.path().join(name);
            fs::create_dir_all(input.join("dir/sub")).unwrap();
            fs::write(input.join("dir/sub/test.txt"), "aa").unwrap();
            fs::write(input.join("foo.txt"), "f").unwrap();

            let mut meta = VersionMetadata::new(VersionId::new(id).unwrap());
            for dep in deps {
                meta.add_dependency(DependencyEdge::parse(dep).unwrap());
            }
            let defaults = FileDefaults {
                tags: Vec::new(),
                hashes: vec!["sha1".into()],
            };
            add_files(&mut meta, &input, &["*".into()], &defaults, &self.registry, None).unwrap();
            let file = self.temp.path().join(format!("{name}.json"));
            JsonDocument::new(&file).write(&meta).unwrap();
            (file, input)
        }

        fn import(&self, file: &Path, input: &Path, options: &ImportOptions) -> Result<Rc<Version>> {
            let finder = RepositoryFinder::new(&self.home)?;
            VersionImporter::new(&self.home, &finder, &self.registry)
                .import(file, input, options, &mut |_: &TestIssue| {})
        }
    }

    #[test]
    fn import_commits_files_and_lists_version() {
        let fx = Fixture::new();
        let (file, input) = fx.build("a", "my/component/23", &[]);

        let version = fx.import(&file, &input, &ImportOptions::default()).unwrap();
        assert_eq!(version.id().as_str(), "my/component/23");
        assert!(version.binaries().unwrap().join("dir/sub/test.txt").is_file());
        assert!(input.join("foo.txt").is_file(), "copy keeps sources");

        let finder = RepositoryFinder::new(&fx.home).unwrap();
        assert_eq!(
            finder.require("my/component").unwrap().id().as_str(),
            "my/component/23"
        );
    }

    #[test]
    fn importing_twice_is_rejected() {
        let fx = Fixture::new();
        let (file, input) = fx.build("a", "my/component/23", &[]);
        fx.import(&file, &input, &ImportOptions::default()).unwrap();

        let err = fx
            .import(&file, &input, &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, RepoError::AlreadyExists(_)));
        assert_eq!(err.to_string(), "'my/component/23' exists in repository already");
    }

    #[test]
    fn broken_files_are_not_imported() {
        let fx = Fixture::new();
        let (file, input) = fx.build("a", "my/component/23", &[]);
        fs::write(input.join("foo.txt"), "g").unwrap();

        let err = fx
            .import(&file, &input, &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, RepoError::IntegrityMismatch(_)));
        let finder = RepositoryFinder::new(&fx.home).unwrap();
        assert!(finder.version("my/component/23").unwrap().is_none());
    }

    #[test]
    fn id_options() {
        let fx = Fixture::new();
        let (file, input) = fx.build("a", "my/component/23", &[]);
        let component = ComponentId::new("my/component").unwrap();

        let both = ImportOptions {
            version_id: Some(VersionId::new("my/component/1").unwrap()),
            create_new_version: Some(component.clone()),
            ..Default::default()
        };
        let err = fx.import(&file, &input, &both).unwrap_err();
        assert!(err.to_string().contains("Can't define both"));

        let explicit = ImportOptions {
            version_id: Some(VersionId::new("other/name/7").unwrap()),
            ..Default::default()
        };
        let version = fx.import(&file, &input, &explicit).unwrap();
        assert_eq!(version.id().as_str(), "other/name/7");
        assert_eq!(
            version.metadata().unwrap().version_id.as_ref().unwrap().as_str(),
            "other/name/7"
        );

        let auto = ImportOptions {
            create_new_version: Some(component.clone()),
            ..Default::default()
        };
        assert_eq!(
            fx.import(&file, &input, &auto).unwrap().id().as_str(),
            "my/component/1"
        );
        assert_eq!(
            fx.import(&file, &input, &auto).unwrap().id().as_str(),
            "my/component/2"
        );
    }

    #[test]
    fn auto_increment_needs_integer_versions() {
        let fx = Fixture::new();
        let (file, input) = fx.build("a", "my/component/beta", &[]);
        fx.import(&file, &input, &ImportOptions::default()).unwrap();

        let auto = ImportOptions {
            create_new_version: Some(ComponentId::new("my/component").unwrap()),
            ..Default::default()
        };
        let err = fx.import(&file, &input, &auto).unwrap_err();
        assert!(matches!(err, RepoError::Configuration(_)));
    }

    #[test]
    fn move_removes_emptied_directories() {
        let fx = Fixture::new();
        let (file, input) = fx.build("a", "my/component/23", &[]);

        let options = ImportOptions {
            mode: ImportMode::Move,
            ..Default::default()
        };
        fx.import(&file, &input, &options).unwrap();
        assert!(!input.join("foo.txt").exists());
        assert!(!input.join("dir").exists());
        assert!(input.exists(), "source root is kept");
    }

    #[test]
    fn reverse_dependencies_are_recorded() {
        let fx = Fixture::new();
        let (lib_file, lib_input) = fx.build("lib", "my/lib/1", &[]);
        fx.import(&lib_file, &lib_input, &ImportOptions::default())
            .unwrap();
        let (app_file, app_input) = fx.build("app", "my/app/1", &["my/lib/1,name=lib"]);
        fx.import(&app_file, &app_input, &ImportOptions::default())
            .unwrap();

        let finder = RepositoryFinder::new(&fx.home).unwrap();
        let lib = finder.require("my/lib/1").unwrap();
        assert_eq!(
            lib.reverse_dependencies(),
            [VersionId::new("my/app/1").unwrap()]
        );
    }

    #[test]
    fn file_paths_leaving_the_version_are_refused() {
        let fx = Fixture::new();
        let input = fx.temp.path().join("in");
        fs::create_dir_all(&input).unwrap();
        fs::write(fx.temp.path().join("evil.txt"), "e").unwrap();

        let id = VersionId::new("my/comp/1").unwrap();
        let mut meta = VersionMetadata::new(id.clone());
        meta.add_file(FileEntry::new("../evil.txt", 1)).unwrap();
        let file = fx.temp.path().join("evil.json");
        JsonDocument::new(&file).write(&meta).unwrap();

        let err = fx
            .import(&file, &input, &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, RepoError::Configuration(_)), "{err}");
        let version_dir = fx.home.repository("local").paths().version_dir(&id);
        assert!(!version_dir.exists());
        assert!(!version_dir.parent().unwrap().join("evil.txt").exists());
    }

    #[test]
    fn failed_commit_is_rolled_back() {
        let fx = Fixture::new();
        // A listed file occupies the metadata document's place, so writing
        // the metadata fails after every file is already in the repository
        let input = fx.temp.path().join("blocked");
        fs::create_dir_all(input.join("ki-version.json")).unwrap();
        fs::write(input.join("ki-version.json/x"), "x").unwrap();
        fs::write(input.join("a.txt"), "a").unwrap();

        let id = VersionId::new("my/component/5").unwrap();
        let mut meta = VersionMetadata::new(id.clone());
        let defaults = FileDefaults {
            tags: Vec::new(),
            hashes: vec!["sha1".into()],
        };
        add_files(&mut meta, &input, &["*".into()], &defaults, &fx.registry, None).unwrap();
        assert_eq!(meta.files.len(), 2);
        let file = fx.temp.path().join("blocked.json");
        JsonDocument::new(&file).write(&meta).unwrap();

        let local = fx.home.ensure_repository("local").unwrap();
        local
            .add_status(&id, crate::core::metadata::StatusEntry::new("Smoke", "green"))
            .unwrap();

        let options = ImportOptions {
            mode: ImportMode::Move,
            ..Default::default()
        };
        let err = fx.import(&file, &input, &options).unwrap_err();
        assert!(matches!(err, RepoError::Store(_)), "{err}");

        // Moved files are back and nothing but the earlier status remains
        assert_eq!(fs::read_to_string(input.join("a.txt")).unwrap(), "a");
        assert!(input.join("ki-version.json/x").is_file());
        let version_dir = local.paths().version_dir(&id);
        assert!(!version_dir.join("a.txt").exists());
        assert!(!version_dir.join("ki-version.json").exists());
        assert!(local.binaries(&id).is_none());
        assert_eq!(local.statuses(&id).unwrap().len(), 1);

        // The id is still free
        let (good, good_input) = fx.build("good", "my/component/5", &[]);
        let version = fx.import(&good, &good_input, &ImportOptions::default()).unwrap();
        assert_eq!(version.id(), &id);
        assert_eq!(version.statuses().len(), 1);
    }
}
