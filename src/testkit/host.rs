//! In-memory [`RuntimeHost`] with a fluent builder.

use crate::host::{ClassHandle, HostError, HostLocation, HostResult, RuntimeHost};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

const ANONYMOUS: ClassHandle = ClassHandle(u64::MAX);

#[derive(Debug, Clone)]
struct ClassEntry {
    name: String,
    ancestors: Vec<String>,
}

/// Synthetic host answering reflective queries from tables.
///
/// Every `const_source_location` call is counted per name, so tests can
/// assert that cached paths never reach the host.
///
/// ```rust,ignore
/// let host = SyntheticHost::builder()
///     .with_class("Admin", "/app/models/admin.rb", &["User"])
///     .with_class("User", "/app/models/user.rb", &[])
///     .with_panicking("Exploding")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct SyntheticHost {
    locations: RwLock<HashMap<String, PathBuf>>,
    blank: HashSet<String>,
    classes: Vec<ClassEntry>,
    class_ids: HashMap<String, u64>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    lookups: RwLock<HashMap<String, usize>>,
}

#[derive(Debug, Default)]
pub struct SyntheticHostBuilder {
    host: SyntheticHost,
}

impl SyntheticHostBuilder {
    /// A constant defined in `file`.
    pub fn with_constant(mut self, name: &str, file: impl Into<PathBuf>) -> Self {
        self.host.locations.get_mut().insert(name.to_string(), file.into());
        self
    }

    /// A named class defined in `file`. `ancestors` excludes the class itself
    /// and may name classes registered later.
    pub fn with_class(self, name: &str, file: impl Into<PathBuf>, ancestors: &[&str]) -> Self {
        self.with_constant(name, file).with_native_class(name, ancestors)
    }

    /// A named class without a source location (builtin or native).
    pub fn with_native_class(mut self, name: &str, ancestors: &[&str]) -> Self {
        let id = self.host.classes.len() as u64;
        self.host.classes.push(ClassEntry {
            name: name.to_string(),
            ancestors: ancestors.iter().map(|a| a.to_string()).collect(),
        });
        self.host.class_ids.insert(name.to_string(), id);
        self
    }

    /// Lookups of `name` return an error.
    pub fn with_failing(mut self, name: &str) -> Self {
        self.host.failing.insert(name.to_string());
        self
    }

    /// Lookups of `name` panic.
    pub fn with_panicking(mut self, name: &str) -> Self {
        self.host.panicking.insert(name.to_string());
        self
    }

    /// Lookups of `name` succeed with an empty file, as for eval'd code.
    pub fn with_blank_location(mut self, name: &str) -> Self {
        self.host.blank.insert(name.to_string());
        self
    }

    pub fn build(self) -> SyntheticHost {
        self.host
    }
}

impl SyntheticHost {
    pub fn builder() -> SyntheticHostBuilder {
        SyntheticHostBuilder::default()
    }

    /// Define a constant after construction, e.g. to model a file loading late.
    pub fn define(&self, name: &str, file: impl Into<PathBuf>) {
        self.locations.write().insert(name.to_string(), file.into());
    }

    /// Handle of a registered class. Panics for unknown names.
    pub fn class_handle(&self, name: &str) -> ClassHandle {
        match self.class_ids.get(name) {
            Some(id) => ClassHandle(*id),
            None => panic!("class {name} not registered with SyntheticHost"),
        }
    }

    /// A class without a name.
    pub fn anonymous_class(&self) -> ClassHandle {
        ANONYMOUS
    }

    /// Number of `const_source_location` calls for `name`.
    pub fn lookups(&self, name: &str) -> usize {
        self.lookups.read().get(name).copied().unwrap_or(0)
    }

    pub fn total_lookups(&self) -> usize {
        self.lookups.read().values().sum()
    }

    fn misbehave(&self, name: &str) -> HostResult<()> {
        if self.panicking.contains(name) {
            panic!("synthetic host panic for {name}");
        }
        if self.failing.contains(name) {
            return Err(HostError::LookupFailed(name.to_string()));
        }
        Ok(())
    }

    fn entry(&self, class: ClassHandle) -> Option<&ClassEntry> {
        usize::try_from(class.0)
            .ok()
            .and_then(|index| self.classes.get(index))
    }
}

impl RuntimeHost for SyntheticHost {
    fn const_source_location(&self, name: &str) -> HostResult<Option<HostLocation>> {
        *self.lookups.write().entry(name.to_string()).or_default() += 1;
        self.misbehave(name)?;
        if self.blank.contains(name) {
            return Ok(Some(HostLocation::new("", None)));
        }
        Ok(self
            .locations
            .read()
            .get(name)
            .map(|file| HostLocation::new(file.clone(), Some(1))))
    }

    fn constant_class(&self, name: &str) -> HostResult<Option<ClassHandle>> {
        self.misbehave(name)?;
        Ok(self.class_ids.get(name).map(|id| ClassHandle(*id)))
    }

    fn class_name(&self, class: ClassHandle) -> HostResult<Option<String>> {
        Ok(self.entry(class).map(|entry| entry.name.clone()))
    }

    fn ancestors(&self, class: ClassHandle) -> HostResult<Vec<ClassHandle>> {
        let Some(entry) = self.entry(class) else {
            return Ok(Vec::new());
        };
        let mut chain = vec![class];
        chain.extend(
            entry
                .ancestors
                .iter()
                .filter_map(|name| self.class_ids.get(name))
                .map(|id| ClassHandle(*id)),
        );
        Ok(chain)
    }
}
