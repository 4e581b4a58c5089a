#![allow(dead_code)]

use impactcov::config::CoverageConfigBuilder;
use impactcov::testkit::{SyntheticEventSource, SyntheticHost, SyntheticHostBuilder};
use impactcov::{Coordinator, CoverageConfig, CoverageReport, CoverageRuntime};
use indoc::indoc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// Serializes tests that touch process environment variables. Take it
/// before creating any [`EnvGuard`].
pub fn lock_env() -> parking_lot::MutexGuard<'static, ()> {
    ENV_LOCK.lock()
}

/// Sets an environment variable for the guard's lifetime, restoring the
/// previous value on drop.
pub struct EnvGuard {
    key: String,
    original: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &str, value: &str) -> Self {
        let original = std::env::var(key).ok();
        std::env::set_var(key, value);
        Self {
            key: key.to_string(),
            original,
        }
    }

    pub fn remove(key: &str) -> Self {
        let original = std::env::var(key).ok();
        std::env::remove_var(key);
        Self {
            key: key.to_string(),
            original,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(value) => std::env::set_var(&self.key, value),
            None => std::env::remove_var(&self.key),
        }
    }
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn create_test_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Build a report from root-relative paths.
pub fn report(paths: &[&str]) -> CoverageReport {
    paths.iter().map(PathBuf::from).collect()
}

/// A project on disk plus a synthetic host describing its constants.
pub struct Project {
    pub dir: TempDir,
    pub host: Arc<SyntheticHost>,
    pub source: Arc<SyntheticEventSource>,
    pub runtime: CoverageRuntime,
}

impl Project {
    /// Lay out `files` under a fresh temp root and describe them to a host.
    pub fn new<F>(files: &[(&str, &str)], describe: F) -> Self
    where
        F: FnOnce(&Path, SyntheticHostBuilder) -> SyntheticHostBuilder,
    {
        let dir = TempDir::new().unwrap();
        for (relative, content) in files {
            create_test_file(dir.path(), relative, content);
        }
        let host = Arc::new(describe(dir.path(), SyntheticHost::builder()).build());
        let (source, runtime) = runtime_for(host.clone());
        Self {
            dir,
            host,
            source,
            runtime,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn config(&self) -> CoverageConfigBuilder {
        CoverageConfig::builder(self.root())
    }

    pub fn coordinator(&self, config: CoverageConfig) -> Coordinator {
        let mut coordinator = Coordinator::new(self.runtime.clone());
        coordinator.configure(config);
        coordinator
    }

    /// A second runtime over the same files with a fresh cache and a fresh host.
    pub fn restarted<F>(
        &self,
        describe: F,
    ) -> (Arc<SyntheticHost>, Arc<SyntheticEventSource>, CoverageRuntime)
    where
        F: FnOnce(&Path, SyntheticHostBuilder) -> SyntheticHostBuilder,
    {
        let host = Arc::new(describe(self.root(), SyntheticHost::builder()).build());
        let (source, runtime) = runtime_for(host.clone());
        (host, source, runtime)
    }
}

fn runtime_for(host: Arc<SyntheticHost>) -> (Arc<SyntheticEventSource>, CoverageRuntime) {
    let source = Arc::new(SyntheticEventSource::new());
    let runtime = CoverageRuntime::builder(host)
        .event_source(source.clone())
        .build();
    (source, runtime)
}

/// A small billing app: a spec touching `Invoice`, which inherits from
/// `BaseRecord` and calls into `Pricing`, plus a vendored gem.
pub const BILLING_FILES: &[(&str, &str)] = &[
    (
        "app/models/base_record.rb",
        indoc! {"
            class BaseRecord
            end
        "},
    ),
    (
        "app/models/invoice.rb",
        indoc! {"
            class Invoice < BaseRecord
              def total
                Pricing::Calculator.new.call
              end
            end
        "},
    ),
    (
        "app/pricing/calculator.rb",
        indoc! {"
            module Pricing
              class Calculator
                def call
                  TaxTable.rate
                end
              end
            end
        "},
    ),
    (
        "app/pricing/tax_table.rb",
        indoc! {"
            module Pricing
              class TaxTable
              end
            end
        "},
    ),
    ("spec/invoice_spec.rb", "Invoice.new.total\n"),
    ("vendor/money/money.rb", "class Money\nend\n"),
];

pub fn describe_billing(root: &Path, host: SyntheticHostBuilder) -> SyntheticHostBuilder {
    host.with_class("BaseRecord", root.join("app/models/base_record.rb"), &[])
        .with_class("Invoice", root.join("app/models/invoice.rb"), &["BaseRecord"])
        .with_constant("Pricing", root.join("app/pricing/calculator.rb"))
        .with_class("Pricing::Calculator", root.join("app/pricing/calculator.rb"), &[])
        .with_class("Pricing::TaxTable", root.join("app/pricing/tax_table.rb"), &[])
        .with_class("Money", root.join("vendor/money/money.rb"), &[])
}

pub fn billing() -> Project {
    Project::new(BILLING_FILES, describe_billing)
}

/// Everything reachable from the invoice spec.
pub fn billing_report() -> CoverageReport {
    report(&[
        "app/models/base_record.rb",
        "app/models/invoice.rb",
        "app/pricing/calculator.rb",
        "app/pricing/tax_table.rb",
        "spec/invoice_spec.rb",
    ])
}
