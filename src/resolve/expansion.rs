//! Stop-time transitive reference expansion.
//!
//! Every recorded in-scope file is parsed for constant references; files those
//! references resolve to are added, and their own references are followed in
//! the next round. Rounds stop when nothing new is found or the round limit is
//! reached.

use super::ConstantResolver;
use crate::cache::{ResolutionCache, SourceSnapshot};
use crate::extraction::{extract_source, ExtractionMode, SourceParser};
use crate::host::RuntimeHost;
use crate::scope::PathScope;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug_span;

/// Knobs for one expansion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionSettings {
    pub mode: ExtractionMode,
    pub ancestor_resolution: bool,
    pub max_rounds: usize,
}

impl ExpansionSettings {
    /// Tag mixed into file digests so cached entries are only replayed under
    /// the settings that produced them.
    fn digest_tag(&self) -> String {
        format!("{:?}/ancestors={}", self.mode, self.ancestor_resolution)
    }
}

pub struct ReferenceExpander<'a> {
    parser: &'a dyn SourceParser,
    cache: &'a ResolutionCache,
    resolver: ConstantResolver<'a>,
    settings: ExpansionSettings,
}

impl<'a> ReferenceExpander<'a> {
    pub fn new(
        host: &'a dyn RuntimeHost,
        parser: &'a dyn SourceParser,
        cache: &'a ResolutionCache,
        settings: ExpansionSettings,
    ) -> Self {
        Self {
            parser,
            cache,
            resolver: ConstantResolver::new(host, cache, settings.ancestor_resolution),
            settings,
        }
    }

    /// Files implicated by `file`, replayed from cache while its content is unchanged.
    pub fn implicated_by(&self, file: &Path) -> Option<BTreeSet<PathBuf>> {
        let snapshot = match SourceSnapshot::read(file) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::debug!("Cannot read {} for reference expansion: {}", file.display(), err);
                self.cache.forget_file(file);
                return None;
            }
        };
        let digest = snapshot.digest.scoped(&self.settings.digest_tag());

        let mut implicated = self.cache.get_or_replay_implicated(file, &digest, || {
            let groups = self.cache.get_or_extract(file, &digest, || {
                extract_source(self.parser, &snapshot.text(), self.settings.mode)
            })?;
            Some(self.resolver.resolve_implicated(&groups))
        })?;

        if !implicated.unresolved.is_empty() {
            let retried = self.resolver.resolve_implicated(&implicated.unresolved);
            if retried.unresolved.len() < implicated.unresolved.len() {
                implicated.files.extend(retried.files);
                implicated.unresolved = retried.unresolved;
                self.cache
                    .update_implicated(file, &digest, implicated.clone());
            }
        }
        Some(implicated.files)
    }

    /// In-scope files reachable from `recorded`, excluding `recorded` itself.
    pub fn expand(&self, recorded: &HashSet<PathBuf>, scope: &PathScope) -> HashSet<PathBuf> {
        let mut added = HashSet::new();
        if self.settings.mode == ExtractionMode::Off {
            return added;
        }

        let _span = debug_span!(
            "expand_references",
            files = recorded.len(),
            max_rounds = self.settings.max_rounds
        )
        .entered();

        let mut known: HashSet<PathBuf> = recorded.clone();
        let mut frontier: Vec<PathBuf> = recorded
            .iter()
            .filter(|file| scope.includes(file))
            .cloned()
            .collect();

        let mut rounds = 0;
        while rounds < self.settings.max_rounds && !frontier.is_empty() {
            rounds += 1;
            let discovered: Vec<BTreeSet<PathBuf>> = frontier
                .par_iter()
                .filter_map(|file| self.implicated_by(file))
                .collect();

            frontier = discovered
                .into_iter()
                .flatten()
                .filter(|file| scope.includes(file))
                .filter(|file| known.insert(file.clone()))
                .collect();
            added.extend(frontier.iter().cloned());
        }

        tracing::debug!(rounds, added = added.len(), "reference expansion finished");
        added
    }
}
