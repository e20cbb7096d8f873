//! Completeness evaluation driving the escalation decision.
//!
//! Six binary checks over the fields a usable fiscal record cannot do
//! without. The missing-field ratio is compared against a configurable
//! threshold; crossing it sends the document to vision enhancement.

use crate::models::FiscalDocument;

pub const TOTAL_CHECKS: usize = 6;

/// Escalation policy. Threshold comes from `Settings`, default 0.3.
#[derive(Debug, Clone, Copy)]
pub struct CompletenessPolicy {
    pub threshold: f64,
}

impl Default for CompletenessPolicy {
    fn default() -> Self {
        Self { threshold: 0.3 }
    }
}

/// Outcome of one evaluation: which checks failed and the verdict.
#[derive(Debug, Clone)]
pub struct CompletenessReport {
    /// Wire names of the missing fields, in check order. Feeds the
    /// enhancement prompt.
    pub missing: Vec<String>,
    pub ratio: f64,
    pub incomplete: bool,
}

impl CompletenessPolicy {
    pub fn evaluate(&self, doc: &FiscalDocument) -> CompletenessReport {
        let mut missing = Vec::new();
        if doc.total_value == 0.0 {
            missing.push("valor_total".to_string());
        }
        if doc.document_number.is_empty() {
            missing.push("numero_documento".to_string());
        }
        if doc.issue_date.is_empty() {
            missing.push("data_emissao".to_string());
        }
        if doc.operation_code.is_empty() {
            missing.push("cfop".to_string());
        }
        if doc.issuer_id.is_empty() {
            missing.push("emitente".to_string());
        }
        if doc.line_items.is_empty() {
            missing.push("itens".to_string());
        }

        let ratio = missing.len() as f64 / TOTAL_CHECKS as f64;
        CompletenessReport {
            incomplete: ratio > self.threshold,
            ratio,
            missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineItem;

    fn filled_doc() -> FiscalDocument {
        FiscalDocument {
            total_value: 100.0,
            document_number: "123".into(),
            issue_date: "2024-03-15".into(),
            operation_code: "5102".into(),
            issuer_id: "12345678000190".into(),
            line_items: vec![LineItem {
                description: "Produto".into(),
                quantity: 1.0,
                unit_price: 100.0,
                operation_code: String::new(),
                tariff_code: String::new(),
                tax_situation_code: String::new(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn fully_populated_document_is_complete() {
        let report = CompletenessPolicy::default().evaluate(&filled_doc());
        assert!(report.missing.is_empty());
        assert_eq!(report.ratio, 0.0);
        assert!(!report.incomplete);
    }

    #[test]
    fn one_missing_field_stays_under_the_default_threshold() {
        let mut doc = filled_doc();
        doc.document_number.clear();
        let report = CompletenessPolicy::default().evaluate(&doc);
        assert_eq!(report.missing, vec!["numero_documento"]);
        assert!(!report.incomplete);
    }

    #[test]
    fn two_missing_fields_cross_the_default_threshold() {
        let mut doc = filled_doc();
        doc.total_value = 0.0;
        doc.line_items.clear();
        let report = CompletenessPolicy::default().evaluate(&doc);
        assert_eq!(report.missing, vec!["valor_total", "itens"]);
        assert!(report.ratio > 0.3);
        assert!(report.incomplete);
    }

    #[test]
    fn empty_document_misses_every_check() {
        let report = CompletenessPolicy::default().evaluate(&FiscalDocument::default());
        assert_eq!(report.missing.len(), TOTAL_CHECKS);
        assert_eq!(report.ratio, 1.0);
        assert!(report.incomplete);
    }

    #[test]
    fn threshold_is_policy_not_law() {
        let mut doc = filled_doc();
        doc.total_value = 0.0;
        doc.line_items.clear();
        // A permissive policy tolerates the same two gaps.
        let permissive = CompletenessPolicy { threshold: 0.5 };
        assert!(!permissive.evaluate(&doc).incomplete);
        // A strict one escalates on a single gap.
        let strict = CompletenessPolicy { threshold: 0.1 };
        let mut one_gap = filled_doc();
        one_gap.issue_date.clear();
        assert!(strict.evaluate(&one_gap).incomplete);
    }
}
