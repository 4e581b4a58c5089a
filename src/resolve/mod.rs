//! Candidate groups → defining files.
//!
//! For each group the first candidate the host can place in a real file wins;
//! later candidates in that group are never tried. Class-valued results can
//! additionally pull in their ancestor chain; a class's files are walked once
//! and then memoized, so every referencing file sees the same set.

mod expansion;

pub use expansion::{ExpansionSettings, ReferenceExpander};

use crate::cache::{Implicated, ResolutionCache};
use crate::extraction::CandidateGroup;
use crate::host::{guarded, resolve_location, ClassHandle, RuntimeHost};
use crate::observability::{set_phase, CoveragePhase};
use dashmap::DashSet;
use std::collections::BTreeSet;
use std::path::PathBuf;

pub struct ConstantResolver<'a> {
    host: &'a dyn RuntimeHost,
    cache: &'a ResolutionCache,
    ancestor_resolution: bool,
    /// Names that already failed during this resolver's lifetime.
    misses: DashSet<String>,
}

impl<'a> ConstantResolver<'a> {
    pub fn new(host: &'a dyn RuntimeHost, cache: &'a ResolutionCache, ancestor_resolution: bool) -> Self {
        Self {
            host,
            cache,
            ancestor_resolution,
            misses: DashSet::new(),
        }
    }

    /// Defining file of a fully-qualified name.
    ///
    /// Successes are cached process-wide. Failures are only remembered by this
    /// resolver, since the name may become resolvable once its file loads.
    pub fn resolve_name(&self, name: &str) -> Option<PathBuf> {
        if self.misses.contains(name) {
            return None;
        }
        let _phase = set_phase(CoveragePhase::Resolution);
        let resolved = self
            .cache
            .get_or_resolve(name, || resolve_location(self.host, name));
        if resolved.is_none() {
            self.misses.insert(name.to_string());
        }
        resolved
    }

    /// Files implicated by `groups`: one per group at most, plus ancestors.
    pub fn resolve_candidates(&self, groups: &[CandidateGroup]) -> BTreeSet<PathBuf> {
        self.resolve_implicated(groups).files
    }

    /// Like [`resolve_candidates`](Self::resolve_candidates), also keeping the
    /// groups none of whose candidates resolved.
    pub fn resolve_implicated(&self, groups: &[CandidateGroup]) -> Implicated {
        let mut files = BTreeSet::new();
        let mut unresolved = Vec::new();
        for group in groups {
            let Some((name, file)) = group
                .iter()
                .find_map(|name| self.resolve_name(name).map(|file| (name, file)))
            else {
                unresolved.push(group.clone());
                continue;
            };
            files.insert(file);

            if self.ancestor_resolution {
                let _phase = set_phase(CoveragePhase::Resolution);
                if let Ok(Some(class)) =
                    guarded("constant_class", || self.host.constant_class(name))
                {
                    files.extend(self.class_files(class).unwrap_or_default());
                }
            }
        }
        Implicated { files, unresolved }
    }

    /// Defining file of `class` plus, when enabled, those of its ancestors.
    ///
    /// The full set is memoized per class name, so repeated references never
    /// re-walk the chain. `None` for anonymous or unplaceable classes.
    pub fn class_files(&self, class: ClassHandle) -> Option<BTreeSet<PathBuf>> {
        let name = self.class_name(class)?;
        if !self.ancestor_resolution {
            return self.resolve_name(&name).map(|file| BTreeSet::from([file]));
        }
        self.cache.get_or_resolve_class(&name, || {
            let mut files = BTreeSet::from([self.resolve_name(&name)?]);
            self.resolve_ancestors(class, &mut files);
            Some(files)
        })
    }

    /// Emit the files of `class` unless an earlier caller in the process
    /// already claimed it.
    ///
    /// Returns false when the class is anonymous or already claimed.
    pub fn claim_and_resolve_class(&self, class: ClassHandle, files: &mut BTreeSet<PathBuf>) -> bool {
        let Some(name) = self.class_name(class) else {
            return false;
        };
        if !self.cache.claim(&name) {
            return false;
        }
        files.extend(self.class_files(class).unwrap_or_default());
        true
    }

    fn resolve_ancestors(&self, class: ClassHandle, files: &mut BTreeSet<PathBuf>) {
        let ancestors = match guarded("ancestors", || self.host.ancestors(class)) {
            Ok(ancestors) => ancestors,
            Err(_) => return,
        };
        for ancestor in ancestors.into_iter().filter(|a| *a != class) {
            if let Some(file) = self
                .class_name(ancestor)
                .and_then(|name| self.resolve_name(&name))
            {
                files.insert(file);
            }
        }
    }

    fn class_name(&self, class: ClassHandle) -> Option<String> {
        guarded("class_name", || self.host.class_name(class))
            .ok()
            .flatten()
            .filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::SyntheticHost;
    use pretty_assertions::assert_eq;

    fn files(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_first_resolvable_candidate_wins() {
        let host = SyntheticHost::builder()
            .with_constant("A::D", "/app/a/d.rb")
            .with_constant("D", "/app/d.rb")
            .build();
        let cache = ResolutionCache::new();
        let resolver = ConstantResolver::new(&host, &cache, false);

        let groups = vec![CandidateGroup::from(vec!["A::B::D", "A::D", "D"])];
        assert_eq!(resolver.resolve_candidates(&groups), files(&["/app/a/d.rb"]));
        assert_eq!(host.lookups("D"), 0);
    }

    #[test]
    fn test_unresolvable_group_contributes_nothing() {
        let host = SyntheticHost::builder().build();
        let cache = ResolutionCache::new();
        let resolver = ConstantResolver::new(&host, &cache, false);

        let groups = vec![CandidateGroup::from(vec!["Missing"])];
        let implicated = resolver.resolve_implicated(&groups);
        assert!(implicated.files.is_empty());
        assert_eq!(implicated.unresolved, groups);
        assert_eq!(cache.cached_location("Missing"), None);
    }

    #[test]
    fn test_misses_not_retried_by_same_resolver() {
        let host = SyntheticHost::builder().build();
        let cache = ResolutionCache::new();
        let resolver = ConstantResolver::new(&host, &cache, false);

        resolver.resolve_name("Missing");
        resolver.resolve_name("Missing");
        assert_eq!(host.lookups("Missing"), 1);

        ConstantResolver::new(&host, &cache, false).resolve_name("Missing");
        assert_eq!(host.lookups("Missing"), 2);
    }

    #[test]
    fn test_ancestor_chain_is_identical_cold_and_warm() {
        let host = SyntheticHost::builder()
            .with_class("Admin", "/app/admin.rb", &["User", "Base"])
            .with_class("User", "/app/user.rb", &["Base"])
            .with_class("Base", "/app/base.rb", &[])
            .build();
        let cache = ResolutionCache::new();
        let groups = vec![CandidateGroup::from(vec!["Admin"])];
        let expected = files(&["/app/admin.rb", "/app/user.rb", "/app/base.rb"]);

        let cold = ConstantResolver::new(&host, &cache, true).resolve_candidates(&groups);
        assert_eq!(cold, expected);
        let lookups = host.total_lookups();

        let warm = ConstantResolver::new(&host, &cache, true).resolve_candidates(&groups);
        assert_eq!(warm, cold);
        assert_eq!(host.total_lookups(), lookups);
    }

    #[test]
    fn test_claimed_class_still_contributes_ancestors() {
        let host = SyntheticHost::builder()
            .with_class("Model", "/app/model.rb", &["Mixin"])
            .with_class("Mixin", "/app/mixin.rb", &[])
            .build();
        let cache = ResolutionCache::new();
        let resolver = ConstantResolver::new(&host, &cache, true);

        let mut emitted = BTreeSet::new();
        assert!(resolver.claim_and_resolve_class(host.class_handle("Model"), &mut emitted));
        assert_eq!(emitted, files(&["/app/model.rb", "/app/mixin.rb"]));

        let mut again = BTreeSet::new();
        assert!(!resolver.claim_and_resolve_class(host.class_handle("Model"), &mut again));
        assert!(again.is_empty());

        let groups = vec![CandidateGroup::from(vec!["Model"])];
        assert_eq!(
            resolver.resolve_candidates(&groups),
            files(&["/app/model.rb", "/app/mixin.rb"])
        );
    }

    #[test]
    fn test_reference_does_not_claim_class() {
        let host = SyntheticHost::builder()
            .with_class("Model", "/app/model.rb", &[])
            .build();
        let cache = ResolutionCache::new();
        let resolver = ConstantResolver::new(&host, &cache, true);

        resolver.resolve_candidates(&[CandidateGroup::from(vec!["Model"])]);
        assert!(!cache.is_claimed("Model"));
    }

    #[test]
    fn test_ancestors_skipped_when_disabled() {
        let host = SyntheticHost::builder()
            .with_class("Admin", "/app/admin.rb", &["User"])
            .with_class("User", "/app/user.rb", &[])
            .build();
        let cache = ResolutionCache::new();
        let resolver = ConstantResolver::new(&host, &cache, false);

        let groups = vec![CandidateGroup::from(vec!["Admin"])];
        assert_eq!(resolver.resolve_candidates(&groups), files(&["/app/admin.rb"]));
        assert!(!cache.is_claimed("Admin"));
    }

    #[test]
    fn test_misbehaving_host_degrades_to_miss() {
        let host = SyntheticHost::builder()
            .with_panicking("Boom")
            .with_failing("Broken")
            .with_constant("Fine", "/app/fine.rb")
            .build();
        let cache = ResolutionCache::new();
        let resolver = ConstantResolver::new(&host, &cache, true);

        let groups = vec![
            CandidateGroup::from(vec!["Boom"]),
            CandidateGroup::from(vec!["Broken", "Fine"]),
        ];
        assert_eq!(resolver.resolve_candidates(&groups), files(&["/app/fine.rb"]));
    }

    #[test]
    fn test_anonymous_class_is_not_claimed() {
        let host = SyntheticHost::builder().build();
        let cache = ResolutionCache::new();
        let resolver = ConstantResolver::new(&host, &cache, true);

        let mut out = BTreeSet::new();
        assert!(!resolver.claim_and_resolve_class(host.anonymous_class(), &mut out));
        assert!(out.is_empty());
        assert!(cache.is_empty());
    }
}
