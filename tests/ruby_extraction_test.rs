use impactcov::extraction::extract_source;
use impactcov::{CandidateGroup, ExtractionMode, RubyParser};
use indoc::indoc;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn groups(source: &str, mode: ExtractionMode) -> Vec<CandidateGroup> {
    extract_source(&RubyParser, source, mode).unwrap()
}

#[test]
fn test_references_across_a_service_object() {
    let source = indoc! {"
        module Billing
          module Jobs
            class ChargeJob < ApplicationJob
              def perform(id)
                invoice = Invoice.find(id)
                Gateway::Client.new.charge(invoice)
                ::Rails.logger.info(\"charged\")
              end
            end
          end
        end
    "};

    assert_eq!(
        groups(source, ExtractionMode::Expanded),
        vec![
            CandidateGroup::from(vec![
                "Billing::Jobs::ApplicationJob",
                "Billing::ApplicationJob",
                "ApplicationJob",
            ]),
            CandidateGroup::from(vec![
                "Billing::Jobs::ChargeJob::Invoice",
                "Billing::Jobs::Invoice",
                "Billing::Invoice",
                "Invoice",
            ]),
            CandidateGroup::from(vec![
                "Billing::Jobs::ChargeJob::Gateway::Client",
                "Billing::Jobs::Gateway::Client",
                "Billing::Gateway::Client",
                "Gateway::Client",
            ]),
            CandidateGroup::from(vec!["Rails"]),
        ]
    );
}

#[test]
fn test_repeated_references_collapse() {
    let source = indoc! {"
        class Ledger
          def a; Entry.new; end
          def b; Entry.new; end
        end
    "};
    assert_eq!(
        groups(source, ExtractionMode::Expanded),
        vec![CandidateGroup::from(vec!["Ledger::Entry", "Entry"])]
    );
}

#[test]
fn test_off_mode_yields_nothing() {
    assert!(groups("Invoice.new\n", ExtractionMode::Off).is_empty());
}

#[test]
fn test_source_without_constants_yields_nothing() {
    let source = indoc! {"
        def helper(x)
          x * 2
        end
    "};
    assert!(groups(source, ExtractionMode::Expanded).is_empty());
}

fn constant_name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{1,8}"
}

proptest! {
    /// A bare reference under N nested modules expands to N + 1 candidates,
    /// innermost scope first and the bare name last.
    #[test]
    fn prop_nesting_expands_innermost_first(
        modules in prop::collection::vec(constant_name(), 1..4),
        reference in constant_name(),
    ) {
        prop_assume!(!modules.contains(&reference));
        let mut source = String::new();
        for module in &modules {
            source.push_str(&format!("module {}\n", module));
        }
        source.push_str(&format!("{}.call\n", reference));
        for _ in &modules {
            source.push_str("end\n");
        }

        let extracted = groups(&source, ExtractionMode::Expanded);
        prop_assert_eq!(extracted.len(), 1);
        let names = extracted[0].names();
        prop_assert_eq!(names.len(), modules.len() + 1);
        prop_assert_eq!(names.last().unwrap(), &reference);
        prop_assert_eq!(&names[0], &format!("{}::{}", modules.join("::"), reference));
    }
}
