mod common;

use common::{billing, report, Project};
use impactcov::{ExtractionMode, ThreadAffinity};
use pretty_assertions::assert_eq;

fn allocation_only(project: &Project) -> impactcov::CoverageConfig {
    project
        .config()
        .constant_resolution(ExtractionMode::Off)
        .build()
        .unwrap()
}

#[test]
fn test_allocation_records_class_and_ancestors() {
    let project = billing();
    let coordinator = project.coordinator(allocation_only(&project));
    let invoice = project.host.class_handle("Invoice");

    let (_, report) = coordinator
        .run(|| {
            project.source.allocate(Some(invoice));
            project.source.allocate(Some(invoice));
        })
        .unwrap();

    assert_eq!(
        report,
        common::report(&["app/models/base_record.rb", "app/models/invoice.rb"])
    );
}

#[test]
fn test_class_is_reported_once_per_process() {
    let project = billing();
    let coordinator = project.coordinator(allocation_only(&project));
    let invoice = project.host.class_handle("Invoice");

    let (_, first) = coordinator
        .run(|| project.source.allocate(Some(invoice)))
        .unwrap();
    let (_, second) = coordinator
        .run(|| project.source.allocate(Some(invoice)))
        .unwrap();

    assert_eq!(first.len(), 2);
    assert!(second.is_empty());
}

#[test]
fn test_clearing_cache_resets_dedup() {
    let project = billing();
    let coordinator = project.coordinator(allocation_only(&project));
    let invoice = project.host.class_handle("Invoice");

    coordinator
        .run(|| project.source.allocate(Some(invoice)))
        .unwrap();
    coordinator.clear_cache();
    let (_, again) = coordinator
        .run(|| project.source.allocate(Some(invoice)))
        .unwrap();

    assert_eq!(again.len(), 2);
}

#[test]
fn test_anonymous_and_unknown_classes_are_ignored() {
    let project = billing();
    let coordinator = project.coordinator(allocation_only(&project));
    let anonymous = project.host.anonymous_class();

    let (_, report) = coordinator
        .run(|| {
            project.source.allocate(Some(anonymous));
            project.source.allocate(None);
        })
        .unwrap();

    assert!(report.is_empty());
    assert!(project.runtime.cache().is_empty());
}

#[test]
fn test_out_of_scope_class_is_claimed_but_not_reported() {
    let project = billing();
    let config = project
        .config()
        .excluded_path("vendor")
        .constant_resolution(ExtractionMode::Off)
        .build()
        .unwrap();
    let coordinator = project.coordinator(config);
    let money = project.host.class_handle("Money");

    let (_, report) = coordinator
        .run(|| project.source.allocate(Some(money)))
        .unwrap();

    assert!(report.is_empty());
    assert!(project.runtime.cache().is_claimed("Money"));
}

#[test]
fn test_disabled_tracing_leaves_dedup_untouched() {
    let project = billing();
    let config = project
        .config()
        .constant_resolution(ExtractionMode::Off)
        .allocation_tracing(false)
        .build()
        .unwrap();
    let coordinator = project.coordinator(config);
    let invoice = project.host.class_handle("Invoice");

    let (_, report) = coordinator
        .run(|| project.source.allocate(Some(invoice)))
        .unwrap();

    assert!(report.is_empty());
    assert!(!project.runtime.cache().is_claimed("Invoice"));
}

#[test]
fn test_allocation_on_foreign_thread_is_ignored() {
    let project = billing();
    let config = project
        .config()
        .constant_resolution(ExtractionMode::Off)
        .thread_affinity(ThreadAffinity::OwnerThreadOnly)
        .build()
        .unwrap();
    let coordinator = project.coordinator(config);
    let invoice = project.host.class_handle("Invoice");

    coordinator.start().unwrap();
    std::thread::scope(|scope| {
        scope.spawn(|| project.source.allocate(Some(invoice)));
    });
    let foreign = coordinator.stop().unwrap();

    assert!(foreign.is_empty());
    assert!(!project.runtime.cache().is_claimed("Invoice"));

    let (_, owner) = coordinator
        .run(|| project.source.allocate(Some(invoice)))
        .unwrap();
    assert_eq!(
        owner,
        report(&["app/models/base_record.rb", "app/models/invoice.rb"])
    );
}
