//! core::finder
//!
//! Resolve version queries against the overlaid repositories.
//!
//! # Architecture
//!
//! A [`RepositoryFinder`] is one query session. It snapshots the component
//! lists of every repository at construction and caches merged
//! [`Component`]s and [`Version`]s as they are requested. The caches are
//! process-local and must be dropped with [`RepositoryFinder::invalidate`]
//! after anything is imported.
//!
//! # Resolution
//!
//! 1. If the target names a known component:
//!    - no rules and no filter: the newest version
//!    - otherwise the newest version satisfying every rule and the filter
//! 2. Otherwise the target is a full version id; it resolves only if the
//!    version exists and satisfies the rules and filter.
//! 3. Each `->name` step follows the dependency with that name.
//!
//! A rule holds when the newest status entry with its key satisfies it. A
//! version without any entry for the key fails the rule.
//!
//! # Example
//!
//! ```no_run
//! use ki_repo::core::finder::RepositoryFinder;
//! use ki_repo::core::repository::KiHome;
//!
//! let finder = RepositoryFinder::new(&KiHome::new("/srv/ki"))?;
//! if let Some(version) = finder.version("test/comp:maturity>=beta")? {
//!     println!("{}", version.id());
//! }
//! # Ok::<(), ki_repo::core::errors::RepoError>(())
//! ```

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use tracing::debug;

use super::errors::{RepoError, Result};
use super::model::{Component, Version};
use super::query::{StatusOp, StatusRule, VersionQuery};
use super::repository::{KiHome, Repository};
use super::types::{ComponentId, VersionId};

/// Caller-supplied predicate on candidate versions.
pub type VersionFilter<'a> = &'a dyn Fn(&Version) -> bool;

/// One argument of [`RepositoryFinder::resolve`].
#[derive(Debug, Clone)]
pub enum QueryArg {
    /// A query string, see [`crate::core::query`].
    Query(String),
    /// An already known component.
    Component(ComponentId),
    /// An already resolved version; returned as is.
    Version(Rc<Version>),
    /// Implicit `key=value` rules.
    Statuses(Vec<(String, String)>),
}

impl From<&str> for QueryArg {
    fn from(s: &str) -> Self {
        QueryArg::Query(s.to_string())
    }
}

impl From<String> for QueryArg {
    fn from(s: String) -> Self {
        QueryArg::Query(s)
    }
}

/// A query session over a set of repositories.
#[derive(Debug)]
pub struct RepositoryFinder {
    home: KiHome,
    repositories: RefCell<Vec<Repository>>,
    component_ids: RefCell<BTreeSet<ComponentId>>,
    components: RefCell<HashMap<ComponentId, Rc<Component>>>,
    versions: RefCell<HashMap<VersionId, Rc<Version>>>,
}

impl RepositoryFinder {
    /// Open a session over every repository of a ki home.
    ///
    /// The repository list is re-read from the home on
    /// [`invalidate`](Self::invalidate).
    pub fn new(home: &KiHome) -> Result<Self> {
        let finder = Self {
            home: home.clone(),
            repositories: RefCell::new(home.repositories()?),
            component_ids: RefCell::new(BTreeSet::new()),
            components: RefCell::new(HashMap::new()),
            versions: RefCell::new(HashMap::new()),
        };
        finder.load_component_ids()?;
        Ok(finder)
    }

    fn load_component_ids(&self) -> Result<()> {
        let mut ids = BTreeSet::new();
        for repo in self.repositories.borrow().iter() {
            ids.extend(repo.component_ids()?);
        }
        debug!(count = ids.len(), "loaded component lists");
        *self.component_ids.borrow_mut() = ids;
        Ok(())
    }

    /// The overlaid repositories, in overlay order.
    pub fn repositories(&self) -> Vec<Repository> {
        self.repositories.borrow().clone()
    }

    /// Drop every cached component and version and reload the repository
    /// and component lists.
    pub fn invalidate(&self) -> Result<()> {
        self.components.borrow_mut().clear();
        self.versions.borrow_mut().clear();
        *self.repositories.borrow_mut() = self.home.repositories()?;
        self.load_component_ids()
    }

    /// All known component ids, sorted.
    pub fn components(&self) -> Vec<ComponentId> {
        self.component_ids.borrow().iter().cloned().collect()
    }

    /// The merged component, if any repository lists it.
    pub fn component(&self, id: &str) -> Result<Option<Rc<Component>>> {
        let Ok(id) = ComponentId::new(id) else {
            return Ok(None);
        };
        if !self.component_ids.borrow().contains(&id) {
            return Ok(None);
        }
        if let Some(component) = self.components.borrow().get(&id) {
            return Ok(Some(Rc::clone(component)));
        }
        let component = Rc::new(Component::load(id.clone(), &self.repositories.borrow())?);
        self.components
            .borrow_mut()
            .insert(id, Rc::clone(&component));
        Ok(Some(component))
    }

    /// The merged version for an id. The version may not exist.
    pub fn version_by_id(&self, id: &VersionId) -> Result<Rc<Version>> {
        if let Some(version) = self.versions.borrow().get(id) {
            return Ok(Rc::clone(version));
        }
        let version = Rc::new(Version::load(id.clone(), &self.repositories.borrow())?);
        self.versions
            .borrow_mut()
            .insert(id.clone(), Rc::clone(&version));
        Ok(version)
    }

    /// Resolve a single query string.
    pub fn version(&self, query: &str) -> Result<Option<Rc<Version>>> {
        self.resolve(&[QueryArg::from(query)], None)
    }

    /// Resolve a single query string, failing when nothing matches.
    pub fn require(&self, query: &str) -> Result<Rc<Version>> {
        self.version(query)?
            .ok_or_else(|| RepoError::NotFound(format!("version '{query}'")))
    }

    /// Resolve query arguments to a version.
    ///
    /// # Errors
    ///
    /// - `Configuration` for an empty argument list, a missing target or a
    ///   malformed rule
    /// - `NotFound` when a `->name` step has no matching dependency
    pub fn resolve(
        &self,
        args: &[QueryArg],
        filter: Option<VersionFilter<'_>>,
    ) -> Result<Option<Rc<Version>>> {
        if args.is_empty() {
            return Err(RepoError::Configuration(
                "no version query given".to_string(),
            ));
        }

        let mut target: Option<String> = None;
        let mut rules = Vec::new();
        let mut navigation = Vec::new();
        for arg in args {
            match arg {
                QueryArg::Query(s) => {
                    let query = VersionQuery::parse(s)?;
                    if target.is_none() && !query.target.is_empty() {
                        target = Some(query.target);
                    }
                    rules.extend(query.rules);
                    navigation.extend(query.navigation);
                }
                QueryArg::Component(id) => {
                    if target.is_none() {
                        target = Some(id.to_string());
                    }
                }
                QueryArg::Statuses(pairs) => {
                    rules.extend(
                        pairs
                            .iter()
                            .map(|(k, v)| StatusRule::new(k.as_str(), StatusOp::Eq, v.as_str())),
                    );
                }
                QueryArg::Version(version) => return Ok(Some(Rc::clone(version))),
            }
        }

        let target = target.ok_or_else(|| {
            RepoError::Configuration("no component or version in query".to_string())
        })?;
        debug!(%target, rules = rules.len(), "resolving version query");

        let Some(mut version) = self.find_target(&target, &rules, filter)? else {
            return Ok(None);
        };

        for name in &navigation {
            let dependency = version
                .metadata()?
                .dependency_by_name(name)
                .map(|d| d.version_id.clone())
                .ok_or_else(|| {
                    RepoError::NotFound(format!(
                        "Could not locate dependency '{}' from '{}'",
                        name,
                        version.id()
                    ))
                })?;
            version = self
                .resolve(&[QueryArg::Query(dependency.to_string())], None)?
                .ok_or_else(|| RepoError::NotFound(format!("version '{dependency}'")))?;
        }
        Ok(Some(version))
    }

    fn find_target(
        &self,
        target: &str,
        rules: &[StatusRule],
        filter: Option<VersionFilter<'_>>,
    ) -> Result<Option<Rc<Version>>> {
        if let Some(component) = self.component(target)? {
            if rules.is_empty() && filter.is_none() {
                return match component.latest()? {
                    Some(id) => Ok(Some(self.version_by_id(&id)?)),
                    None => Ok(None),
                };
            }
            for id in component.version_ids()? {
                let version = self.version_by_id(&id)?;
                if accepts(&version, rules, Some(&component), filter) {
                    return Ok(Some(version));
                }
            }
            return Ok(None);
        }

        // A full version id
        let Ok(id) = VersionId::new(target) else {
            return Ok(None);
        };
        let version = self.version_by_id(&id)?;
        if !version.exists() {
            return Ok(None);
        }
        if rules.is_empty() && filter.is_none() {
            return Ok(Some(version));
        }
        let component = self.component(id.component().as_str())?;
        if accepts(&version, rules, component.as_deref(), filter) {
            Ok(Some(version))
        } else {
            Ok(None)
        }
    }
}

fn accepts(
    version: &Version,
    rules: &[StatusRule],
    component: Option<&Component>,
    filter: Option<VersionFilter<'_>>,
) -> bool {
    let rules_hold = rules.iter().all(|rule| {
        let order = component.and_then(|c| c.status_order(&rule.key));
        version
            .latest_status(&rule.key)
            .is_some_and(|value| rule.matches(value, order))
    });
    rules_hold && filter.map_or(true, |f| f(version))
}
