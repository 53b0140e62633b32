//! Integration tests for resolution, manifests, import and export.
//!
//! These tests drive the library against real ki homes in temporary
//! directories, the same way the `ki` binary does.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;

use ki_repo::core::errors::RepoError;
use ki_repo::core::files::FileFinder;
use ki_repo::core::finder::{QueryArg, RepositoryFinder};
use ki_repo::core::hash::HashRegistry;
use ki_repo::core::metadata::{
    add_files, DependencyEdge, FileDefaults, StatusEntry, VersionMetadata,
};
use ki_repo::core::model::Version;
use ki_repo::core::repository::KiHome;
use ki_repo::core::store::JsonDocument;
use ki_repo::core::types::{ComponentId, VersionId};
use ki_repo::engine::exporter::{ExportOptions, VersionExporter};
use ki_repo::engine::importer::{ImportOptions, VersionImporter};
use ki_repo::engine::tester::{TestIssue, VersionTester};

// =============================================================================
// Test Fixtures
// =============================================================================

/// A ki home plus a scratch area for build directories.
struct TestHome {
    dir: TempDir,
    home: KiHome,
    registry: HashRegistry,
}

impl TestHome {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let home = KiHome::new(dir.path().join("home"));
        home.ensure_repository("local").unwrap();
        Self {
            dir,
            home,
            registry: HashRegistry::with_defaults(),
        }
    }

    fn finder(&self) -> RepositoryFinder {
        RepositoryFinder::new(&self.home).expect("open finder")
    }

    /// Write a build directory with `files` and a metadata file describing
    /// them; returns the metadata file and the build directory.
    fn build(
        &self,
        id: &str,
        files: &[(&str, &str)],
        tags: &[&str],
        edit: impl FnOnce(&mut VersionMetadata),
    ) -> (PathBuf, PathBuf) {
        let input = self.dir.path().join("build").join(id);
        fs::create_dir_all(&input).unwrap();
        for (path, content) in files {
            let full = input.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let mut meta = VersionMetadata::new(VersionId::new(id).unwrap());
        let defaults = FileDefaults {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            hashes: vec!["sha1".into(), "sha2".into()],
        };
        add_files(&mut meta, &input, &["*".into()], &defaults, &self.registry, None).unwrap();
        edit(&mut meta);

        let file = self.dir.path().join("build").join(format!("{}.json", id.replace('/', "_")));
        JsonDocument::new(&file).write(&meta).unwrap();
        (file, input)
    }

    fn import(&self, file: &Path, input: &Path, options: &ImportOptions) -> Result<Rc<Version>, RepoError> {
        let finder = self.finder();
        VersionImporter::new(&self.home, &finder, &self.registry).import(
            file,
            input,
            options,
            &mut |_: &TestIssue| {},
        )
    }

    /// Build and import in one step.
    fn commit(
        &self,
        id: &str,
        files: &[(&str, &str)],
        tags: &[&str],
        edit: impl FnOnce(&mut VersionMetadata),
    ) {
        let (file, input) = self.build(id, files, tags, edit);
        self.import(&file, &input, &ImportOptions::default())
            .expect("import");
    }

    fn status(&self, id: &str, key: &str, value: &str) {
        self.home
            .repository("local")
            .add_status(&VersionId::new(id).unwrap(), StatusEntry::new(key, value))
            .unwrap();
    }
}

fn keys(map: &ki_repo::core::ops::FileMap) -> Vec<&str> {
    map.keys().map(String::as_str).collect()
}

// =============================================================================
// Finder
// =============================================================================

#[test]
fn maturity_scenario() {
    let t = TestHome::new();
    t.commit("test/comp/1", &[("a.txt", "1")], &[], |_| {});
    t.commit("test/comp/2", &[("a.txt", "2")], &[], |_| {});
    t.status("test/comp/1", "maturity", "alpha");
    t.status("test/comp/2", "maturity", "beta");
    t.home
        .repository("local")
        .set_status_order(
            &ComponentId::new("test/comp").unwrap(),
            "maturity",
            vec!["alpha".into(), "beta".into(), "gamma".into()],
        )
        .unwrap();

    let finder = t.finder();
    let resolve = |q: &str| finder.version(q).unwrap().map(|v| v.id().to_string());
    assert_eq!(resolve("test/comp:maturity>=alpha").as_deref(), Some("test/comp/2"));
    assert_eq!(resolve("test/comp:maturity>beta"), None);
    assert_eq!(resolve("test/comp:maturity<beta").as_deref(), Some("test/comp/1"));
    assert_eq!(resolve("test/comp:maturity=alpha").as_deref(), Some("test/comp/1"));
    assert_eq!(resolve("test/comp:maturity!=beta").as_deref(), Some("test/comp/1"));
    assert_eq!(resolve("test/comp/1:maturity=beta"), None);
}

#[test]
fn relational_rules_need_an_ordering() {
    let t = TestHome::new();
    t.commit("test/comp/1", &[("a.txt", "1")], &[], |_| {});
    t.status("test/comp/1", "Smoke", "green");

    let finder = t.finder();
    assert!(finder.version("test/comp:Smoke>red").unwrap().is_none());
    assert!(finder.version("test/comp:Smoke=green").unwrap().is_some());
    assert!(finder.version("test/comp:Smoke!=red").unwrap().is_some());
}

#[test]
fn newer_status_overrides_older() {
    let t = TestHome::new();
    t.commit("test/comp/1", &[("a.txt", "1")], &[], |_| {});
    t.status("test/comp/1", "Smoke", "green");
    t.status("test/comp/1", "Smoke", "red");

    let finder = t.finder();
    assert!(finder.version("test/comp:Smoke=green").unwrap().is_none());
    let statuses = QueryArg::Statuses(vec![("Smoke".into(), "red".into())]);
    let found = finder
        .resolve(&[QueryArg::from("test/comp"), statuses], None)
        .unwrap()
        .unwrap();
    assert_eq!(found.id().as_str(), "test/comp/1");
}

#[test]
fn navigation_follows_named_dependencies() {
    let t = TestHome::new();
    t.commit("my/lib/1", &[("lib.so", "l")], &[], |_| {});
    t.commit("my/app/1", &[("app", "a")], &[], |m| {
        m.add_dependency(DependencyEdge::parse("my/lib/1,name=lib").unwrap());
    });

    let finder = t.finder();
    assert_eq!(
        finder.require("my/app->lib").unwrap().id().as_str(),
        "my/lib/1"
    );
    let err = finder.version("my/app->nope").unwrap_err();
    assert_eq!(
        err.to_string(),
        "not found: Could not locate dependency 'nope' from 'my/app/1'"
    );
}

#[test]
fn later_repository_fills_gaps_of_earlier_one() {
    let t = TestHome::new();
    t.commit("my/lib/1", &[("lib.so", "l")], &[], |_| {});
    let site = t.home.ensure_repository("site").unwrap();
    site.add_status(&VersionId::new("my/lib/1").unwrap(), StatusEntry::new("qa", "ok"))
        .unwrap();

    let finder = t.finder();
    let lib = finder.require("my/lib:qa=ok").unwrap();
    assert_eq!(lib.locations().len(), 1);
    assert_eq!(lib.locations()[0].repository, "local");
}

#[test]
fn annotations_in_another_repository_keep_the_binaries_root() {
    let t = TestHome::new();
    t.home.ensure_repository("site").unwrap();
    let (file, input) = t.build("my/lib/1", &[("lib.so", "l")], &[], |_| {});
    let site_options = ImportOptions {
        repository: "site".into(),
        ..Default::default()
    };
    t.import(&file, &input, &site_options).unwrap();

    // Status and reverse links land in "local", which is searched first
    let lib_id = VersionId::new("my/lib/1").unwrap();
    t.status("my/lib/1", "qa", "ok");
    t.home
        .repository("local")
        .add_reverse_dependency(&lib_id, &VersionId::new("other/app/1").unwrap())
        .unwrap();
    t.commit("my/app/1", &[("app", "a")], &[], |m| {
        m.add_dependency(DependencyEdge::parse("my/lib/1,path=lib").unwrap());
    });

    let finder = t.finder();
    let lib = finder.require("my/lib:qa=ok").unwrap();
    assert!(lib.binaries().unwrap().ends_with("site/my/lib/1"));
    assert_eq!(lib.reverse_dependencies().len(), 2);

    let report = VersionTester::new(&finder, &t.registry)
        .test(Rc::clone(&lib), &mut |_: &TestIssue| {})
        .unwrap();
    assert!(report.all_ok());

    let out = t.dir.path().join("deploy");
    let summary = VersionExporter::new(&finder, &t.registry)
        .export(
            &[QueryArg::from("my/app")],
            &out,
            &ExportOptions {
                test_first: true,
                copy: true,
                ..Default::default()
            },
            &mut |_: &TestIssue| {},
        )
        .unwrap();
    assert_eq!(summary.files, 2);
    assert_eq!(fs::read_to_string(out.join("lib/lib.so")).unwrap(), "l");
}

#[test]
fn status_written_before_import_does_not_block_it() {
    let t = TestHome::new();
    t.home.ensure_repository("site").unwrap();
    t.status("my/lib/2", "qa", "pending");

    let (file, input) = t.build("my/lib/2", &[("lib.so", "l2")], &[], |_| {});
    let options = ImportOptions {
        repository: "site".into(),
        ..Default::default()
    };
    let version = t.import(&file, &input, &options).unwrap();
    assert!(version.binaries().unwrap().ends_with("site/my/lib/2"));
    assert_eq!(version.statuses().len(), 1);

    let err = t.import(&file, &input, &options).unwrap_err();
    assert!(matches!(err, RepoError::AlreadyExists(_)));
}

// =============================================================================
// File manifests
// =============================================================================

/// `test/product/1` includes `test/comp/1` under `comp/`; comp includes
/// `test/sub/1` under `sub/`.
fn product_fixture() -> TestHome {
    let t = TestHome::new();
    t.commit("test/sub/1", &[("sub.txt", "s")], &["doc"], |_| {});
    t.commit("test/comp/1", &[("test.sh", "echo"), ("bin/tool", "t")], &["bin"], |m| {
        m.add_dependency(DependencyEdge::parse("test/sub/1,name=sub,path=sub").unwrap());
    });
    t.commit("test/product/1", &[("product.txt", "p")], &["doc"], |m| {
        m.add_dependency(DependencyEdge::parse("test/comp/1,name=comp,path=comp").unwrap());
    });
    t
}

#[test]
fn dependency_files_land_under_their_path() {
    let t = product_fixture();
    let finder = t.finder();
    let product = finder.require("test/product").unwrap();

    let map = FileFinder::new(&finder, product).file_map().unwrap();
    assert_eq!(
        keys(&map),
        vec!["comp/bin/tool", "comp/sub/sub.txt", "comp/test.sh", "product.txt"]
    );
    assert!(map["comp/test.sh"].ends_with("test/comp/1/test.sh"));
}

#[test]
fn excluding_a_dependency_removes_its_subtree() {
    let t = product_fixture();
    let finder = t.finder();
    let product = finder.require("test/product").unwrap();

    let by_name = FileFinder::new(&finder, product.clone())
        .exclude_dependencies(&["comp/sub"])
        .unwrap()
        .file_map()
        .unwrap();
    assert_eq!(keys(&by_name), vec!["comp/bin/tool", "comp/test.sh", "product.txt"]);

    let by_id = FileFinder::new(&finder, product)
        .exclude_dependencies(&["test/comp/.*"])
        .unwrap()
        .file_map()
        .unwrap();
    assert_eq!(keys(&by_id), vec!["product.txt"]);
}

#[test]
fn dep_rm_prunes_deeper_branches() {
    let t = TestHome::new();
    t.commit("test/sub/1", &[("sub.txt", "s")], &[], |_| {});
    t.commit("test/comp/1", &[("test.sh", "echo")], &[], |m| {
        m.add_dependency(DependencyEdge::parse("test/sub/1,path=sub").unwrap());
    });
    t.commit("test/product/1", &[("product.txt", "p")], &[], |m| {
        m.add_dependency(DependencyEdge::parse("test/comp/1,path=comp").unwrap())
            .add_operation(["dep-rm", "test/sub"]);
    });

    let finder = t.finder();
    let product = finder.require("test/product").unwrap();
    let map = FileFinder::new(&finder, product).file_map().unwrap();
    assert_eq!(keys(&map), vec!["comp/test.sh", "product.txt"]);
}

#[test]
fn tags_and_patterns_filter_every_level() {
    let t = product_fixture();
    let finder = t.finder();
    let product = finder.require("test/product").unwrap();

    let docs = FileFinder::new(&finder, product.clone())
        .tags(&["doc"])
        .file_map()
        .unwrap();
    assert_eq!(keys(&docs), vec!["comp/sub/sub.txt", "product.txt"]);

    let no_docs = FileFinder::new(&finder, product.clone())
        .exclude_tags(&["doc"])
        .file_map()
        .unwrap();
    assert_eq!(keys(&no_docs), vec!["comp/bin/tool", "comp/test.sh"]);

    let shell = FileFinder::new(&finder, product)
        .files(&["comp/*.sh"])
        .unwrap()
        .file_map()
        .unwrap();
    assert_eq!(keys(&shell), vec!["comp/test.sh"]);
}

#[test]
fn last_dependency_wins_on_collision() {
    let t = TestHome::new();
    t.commit("my/a/1", &[("same.txt", "a")], &[], |_| {});
    t.commit("my/b/1", &[("same.txt", "b")], &[], |_| {});
    t.commit("my/top/1", &[], &[], |m| {
        m.add_dependency(DependencyEdge::parse("my/a/1").unwrap());
        m.add_dependency(DependencyEdge::parse("my/b/1").unwrap());
    });

    let finder = t.finder();
    let top = finder.require("my/top").unwrap();
    let map = FileFinder::new(&finder, top).file_map().unwrap();
    assert_eq!(fs::read_to_string(&map["same.txt"]).unwrap(), "b");
}

#[test]
fn internal_dependencies_only_from_the_root() {
    let t = TestHome::new();
    t.commit("my/tests/1", &[("t.txt", "t")], &[], |_| {});
    t.commit("my/lib/1", &[("lib.so", "l")], &[], |m| {
        m.add_dependency(DependencyEdge::parse("my/tests/1,path=tests,internal").unwrap());
    });
    t.commit("my/app/1", &[("app", "a")], &[], |m| {
        m.add_dependency(DependencyEdge::parse("my/lib/1,path=lib").unwrap());
    });

    let finder = t.finder();
    let lib = FileFinder::new(&finder, finder.require("my/lib").unwrap())
        .file_map()
        .unwrap();
    assert_eq!(keys(&lib), vec!["lib.so", "tests/t.txt"]);

    let app = FileFinder::new(&finder, finder.require("my/app").unwrap())
        .file_map()
        .unwrap();
    assert_eq!(keys(&app), vec!["app", "lib/lib.so"]);
}

// =============================================================================
// Import and export
// =============================================================================

#[test]
fn second_import_fails_and_leaves_first_commit_alone() {
    let t = TestHome::new();
    let (file, input) = t.build("my/component/23", &[("a.txt", "first")], &[], |_| {});
    t.import(&file, &input, &ImportOptions::default()).unwrap();

    let committed = t
        .home
        .repository("local")
        .paths()
        .version_dir(&VersionId::new("my/component/23").unwrap());
    let before = fs::read_to_string(committed.join("ki-version.json")).unwrap();

    let (file, input) = t.build("my/component/23", &[("a.txt", "second")], &[], |_| {});
    let err = t.import(&file, &input, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, RepoError::AlreadyExists(_)));

    assert_eq!(fs::read_to_string(committed.join("a.txt")).unwrap(), "first");
    assert_eq!(
        fs::read_to_string(committed.join("ki-version.json")).unwrap(),
        before
    );
}

#[test]
fn imported_files_reproduce_recorded_hashes() {
    let t = product_fixture();
    let finder = t.finder();
    let product = finder.require("test/product").unwrap();
    let map = FileFinder::new(&finder, product).file_map().unwrap();

    // Every manifest entry hashes to what its version's metadata recorded.
    for name in ["test/sub/1", "test/comp/1", "test/product/1"] {
        let version = finder.require(name).unwrap();
        for entry in &version.metadata().unwrap().files {
            let physical = version.binaries().unwrap().join(&entry.path);
            assert!(map.values().any(|p| *p == physical), "{} missing", entry.path);
            let digests = t.registry.calculate(&physical, &["sha1", "sha2"]).unwrap();
            assert_eq!(entry.hash("sha1"), Some(digests["sha1"].as_str()));
            assert_eq!(entry.hash("sha2"), Some(digests["sha2"].as_str()));
        }
    }
}

#[test]
fn auto_increment_continues_after_latest() {
    let t = TestHome::new();
    t.commit("my/component/7", &[("a.txt", "a")], &[], |_| {});
    let (file, input) = t.build("my/component/7", &[("a.txt", "b")], &[], |_| {});

    let options = ImportOptions {
        create_new_version: Some(ComponentId::new("my/component").unwrap()),
        ..Default::default()
    };
    let version = t.import(&file, &input, &options).unwrap();
    assert_eq!(version.id().as_str(), "my/component/8");
    assert_eq!(
        t.finder().require("my/component").unwrap().id().as_str(),
        "my/component/8"
    );
}

#[test]
fn export_materializes_the_manifest() {
    let t = product_fixture();
    let finder = t.finder();
    let out = t.dir.path().join("deploy");
    let options = ExportOptions {
        test_first: true,
        copy: true,
        ..Default::default()
    };

    let summary = VersionExporter::new(&finder, &t.registry)
        .export(
            &[QueryArg::from("test/product")],
            &out,
            &options,
            &mut |_: &TestIssue| {},
        )
        .unwrap();
    assert_eq!(summary.files, 4);
    assert_eq!(fs::read_to_string(out.join("comp/test.sh")).unwrap(), "echo");
    assert_eq!(fs::read_to_string(out.join("comp/sub/sub.txt")).unwrap(), "s");
}

#[test]
fn export_test_covers_dependencies() {
    let t = product_fixture();
    let sub = t
        .home
        .repository("local")
        .paths()
        .version_dir(&VersionId::new("test/sub/1").unwrap());
    fs::remove_file(sub.join("sub.txt")).unwrap();

    let finder = t.finder();
    let mut issues = Vec::new();
    let err = VersionExporter::new(&finder, &t.registry)
        .export(
            &[QueryArg::from("test/product")],
            &t.dir.path().join("deploy"),
            &ExportOptions {
                test_first: true,
                ..Default::default()
            },
            &mut |issue: &TestIssue| issues.push(issue.to_string()),
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::IntegrityMismatch(_)));
    assert_eq!(issues.len(), 1);
    assert!(issues[0].contains("'sub.txt' missing"));
}

// =============================================================================
// Path containment
// =============================================================================

#[test]
fn import_refuses_files_outside_the_version() {
    let t = TestHome::new();
    let (file, input) = t.build("my/component/1", &[("a.txt", "a")], &[], |m| {
        m.files[0].path = "../evil.txt".into();
    });

    let err = t.import(&file, &input, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));
    let component = t
        .home
        .repository("local")
        .paths()
        .component_dir(&ComponentId::new("my/component").unwrap());
    assert!(!component.join("1").exists());
    assert!(!component.join("evil.txt").exists());
}

#[test]
fn export_refuses_paths_outside_the_output() {
    let t = TestHome::new();
    t.commit("my/lib/1", &[("lib.so", "l")], &[], |_| {});
    t.commit("my/up/1", &[("a.txt", "a")], &[], |m| {
        m.add_dependency(DependencyEdge::parse("my/lib/1,path=../..").unwrap());
    });
    t.commit("my/moved/1", &[("a.txt", "a")], &[], |m| {
        m.add_operation(["cp", "a.txt", "../b.txt"]);
    });

    let finder = t.finder();
    let out = t.dir.path().join("deploy/nested");
    for query in ["my/up", "my/moved"] {
        let err = VersionExporter::new(&finder, &t.registry)
            .export(
                &[QueryArg::from(query)],
                &out,
                &ExportOptions {
                    copy: true,
                    ..Default::default()
                },
                &mut |_: &TestIssue| {},
            )
            .unwrap_err();
        assert!(matches!(err, RepoError::Configuration(_)), "{query}: {err}");
    }
    assert!(!t.dir.path().join("deploy/b.txt").exists());
    assert!(!t.dir.path().join("lib.so").exists());
    assert!(!out.exists());
}
