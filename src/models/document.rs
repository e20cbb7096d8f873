//! Canonical structured model of one fiscal transaction.
//!
//! Every extractor (XML, text-pattern, vision) builds one of these; the
//! merge engine combines two of them into a brand-new instance. Instances
//! are immutable once returned from an extractor — the pipeline never
//! mutates a document across extractor boundaries.
//!
//! Field names follow the crate's English vocabulary; serde renames keep
//! the original Brazilian NF-e wire contract (`valor_total`, `itens`,
//! `impostos.icms_valor`, …) stable for downstream consumers.
//!
//! Convention: the empty string is the "unknown" sentinel for identifier
//! fields. Never `Option<String>` — this keeps field-level merge logic a
//! plain truthiness test.

use serde::{Deserialize, Serialize};

/// Closed set of supported fiscal document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Nota Fiscal Eletrônica — goods invoice (the primary format).
    #[default]
    Nfe,
    /// Nota Fiscal de Serviços Eletrônica — service invoice.
    Nfse,
    /// Nota Fiscal de Consumidor Eletrônica — consumer invoice.
    Nfce,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nfe => "nfe",
            Self::Nfse => "nfse",
            Self::Nfce => "nfce",
        }
    }
}

/// Tax figures for the document: base amount + computed amount per kind.
///
/// ICMS (state VAT), PIS and COFINS (federal contributions) are standard on
/// NF-e; ISS (municipal service tax) is optional since it only appears on
/// service invoices. Bases default to the document total when the source
/// did not carry them separately.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Taxes {
    #[serde(default)]
    pub icms_base: f64,
    #[serde(default)]
    pub icms_valor: f64,
    #[serde(default)]
    pub pis_base: f64,
    #[serde(default)]
    pub pis_valor: f64,
    #[serde(default)]
    pub cofins_base: f64,
    #[serde(default)]
    pub cofins_valor: f64,
    #[serde(default)]
    pub iss_valor: Option<f64>,
}

/// One line item of the transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Trimmed, non-empty product/service description.
    #[serde(rename = "descricao", default)]
    pub description: String,
    /// Strictly positive quantity.
    #[serde(rename = "quantidade", default)]
    pub quantity: f64,
    #[serde(rename = "valor_unitario", default)]
    pub unit_price: f64,
    /// Fiscal operation code of this item (CFOP).
    #[serde(rename = "cfop_item", default)]
    pub operation_code: String,
    /// Mercosur tariff code (NCM).
    #[serde(rename = "ncm", default)]
    pub tariff_code: String,
    /// Tax situation code (CST).
    #[serde(rename = "cst", default)]
    pub tax_situation_code: String,
}

/// The canonical output of every extraction path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalDocument {
    #[serde(rename = "documento", default)]
    pub kind: DocumentKind,
    /// Document-level CFOP — defaults to the first line item's code.
    #[serde(rename = "cfop", default)]
    pub operation_code: String,
    /// Document-level CST — defaults to the first line item's code.
    #[serde(rename = "cst", default)]
    pub tax_situation_code: String,
    #[serde(rename = "forma_pagamento", default = "default_payment")]
    pub payment_method: String,
    /// Document-level NCM — defaults to the first line item's code.
    #[serde(rename = "ncm", default)]
    pub tariff_code: String,
    /// Authoritative monetary total. Never negative.
    #[serde(rename = "valor_total", default)]
    pub total_value: f64,
    /// ISO-8601 `YYYY-MM-DD`, or the raw source text when unparseable
    /// (never blanked on parse failure), or empty when absent.
    #[serde(rename = "data_emissao", default)]
    pub issue_date: String,
    /// Issuer tax id (CNPJ), preserved as extracted.
    #[serde(rename = "emitente", default)]
    pub issuer_id: String,
    /// Recipient tax id (CNPJ), preserved as extracted.
    #[serde(rename = "destinatario", default)]
    pub recipient_id: String,
    /// ISO 4217 code, default BRL.
    #[serde(rename = "moeda", default = "default_currency")]
    pub currency: String,
    #[serde(rename = "numero_documento", default)]
    pub document_number: String,
    #[serde(rename = "serie", default)]
    pub series: String,
    /// 44-digit access key, preserved verbatim (may carry masking chars).
    #[serde(rename = "chave_nfe", default)]
    pub access_key: String,
    #[serde(rename = "impostos", default)]
    pub taxes: Taxes,
    /// Ordered line items. May be empty — this pipeline never fabricates
    /// a placeholder item when nothing could be extracted.
    #[serde(rename = "itens", default)]
    pub line_items: Vec<LineItem>,
}

fn default_currency() -> String {
    "BRL".to_string()
}

fn default_payment() -> String {
    "a_vista".to_string()
}

impl Default for FiscalDocument {
    fn default() -> Self {
        Self {
            kind: DocumentKind::Nfe,
            operation_code: String::new(),
            tax_situation_code: String::new(),
            payment_method: default_payment(),
            tariff_code: String::new(),
            total_value: 0.0,
            issue_date: String::new(),
            issuer_id: String::new(),
            recipient_id: String::new(),
            currency: default_currency(),
            document_number: String::new(),
            series: String::new(),
            access_key: String::new(),
            taxes: Taxes::default(),
            line_items: Vec::new(),
        }
    }
}

impl FiscalDocument {
    /// Check the model invariants, returning every violation found.
    ///
    /// An empty vector means the document is structurally valid (which is
    /// weaker than "complete" — see the completeness evaluator).
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.total_value < 0.0 {
            violations.push(format!("valor_total must be >= 0, got {}", self.total_value));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            violations.push(format!("moeda must match ^[A-Z]{{3}}$, got '{}'", self.currency));
        }

        let t = &self.taxes;
        for (name, value) in [
            ("icms_base", t.icms_base),
            ("icms_valor", t.icms_valor),
            ("pis_base", t.pis_base),
            ("pis_valor", t.pis_valor),
            ("cofins_base", t.cofins_base),
            ("cofins_valor", t.cofins_valor),
            ("iss_valor", t.iss_valor.unwrap_or(0.0)),
        ] {
            if value < 0.0 {
                violations.push(format!("impostos.{name} must be >= 0, got {value}"));
            }
        }

        for (idx, item) in self.line_items.iter().enumerate() {
            if item.description.trim().is_empty() {
                violations.push(format!("item {idx}: descricao must be non-empty"));
            }
            if item.quantity <= 0.0 {
                violations.push(format!(
                    "item {idx}: quantidade must be > 0, got {}",
                    item.quantity
                ));
            }
            if item.unit_price < 0.0 {
                violations.push(format!(
                    "item {idx}: valor_unitario must be >= 0, got {}",
                    item.unit_price
                ));
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_doc() -> FiscalDocument {
        FiscalDocument {
            document_number: "12345".into(),
            series: "1".into(),
            total_value: 100.0,
            line_items: vec![LineItem {
                description: "Produto Teste".into(),
                quantity: 2.0,
                unit_price: 50.0,
                operation_code: "5102".into(),
                tariff_code: "12345678".into(),
                tax_situation_code: "00".into(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn default_document_is_valid() {
        assert!(FiscalDocument::default().validate().is_empty());
    }

    #[test]
    fn default_currency_is_brl() {
        let doc = FiscalDocument::default();
        assert_eq!(doc.currency, "BRL");
        assert_eq!(doc.payment_method, "a_vista");
    }

    #[test]
    fn negative_total_is_a_violation() {
        let mut doc = valid_doc();
        doc.total_value = -1.0;
        let violations = doc.validate();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("valor_total"));
    }

    #[test]
    fn malformed_currency_is_a_violation() {
        let mut doc = valid_doc();
        doc.currency = "brl".into();
        assert!(!doc.validate().is_empty());
        doc.currency = "BRLX".into();
        assert!(!doc.validate().is_empty());
        doc.currency = "USD".into();
        assert!(doc.validate().is_empty());
    }

    #[test]
    fn zero_quantity_item_is_a_violation() {
        let mut doc = valid_doc();
        doc.line_items[0].quantity = 0.0;
        assert!(doc.validate().iter().any(|v| v.contains("quantidade")));
    }

    #[test]
    fn negative_tax_is_a_violation() {
        let mut doc = valid_doc();
        doc.taxes.icms_valor = -5.0;
        assert!(doc.validate().iter().any(|v| v.contains("icms_valor")));
    }

    #[test]
    fn serializes_with_wire_names() {
        let doc = valid_doc();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["documento"], "nfe");
        assert_eq!(json["valor_total"], 100.0);
        assert_eq!(json["numero_documento"], "12345");
        assert_eq!(json["itens"][0]["descricao"], "Produto Teste");
        assert_eq!(json["itens"][0]["cfop_item"], "5102");
        assert_eq!(json["impostos"]["icms_valor"], 0.0);
    }

    #[test]
    fn deserializes_sparse_json_with_defaults() {
        let doc: FiscalDocument =
            serde_json::from_str(r#"{"documento": "nfce", "valor_total": 9.9}"#).unwrap();
        assert_eq!(doc.kind, DocumentKind::Nfce);
        assert_eq!(doc.currency, "BRL");
        assert_eq!(doc.document_number, "");
        assert!(doc.line_items.is_empty());
    }

    #[test]
    fn document_kind_round_trips() {
        for kind in [DocumentKind::Nfe, DocumentKind::Nfse, DocumentKind::Nfce] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            let back: DocumentKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }
}
