//! Field-level reconciliation of two extraction passes.
//!
//! `base` is the cheap result (OCR + patterns), `enhancement` the vision
//! result. Precedence is field-level: the enhancement wins wherever it
//! actually carries a value, the base survives everywhere else, so the
//! merge never loses information either side had.

use crate::models::{FiscalDocument, Taxes};

/// Pure merge — inputs are borrowed untouched, output is a new document.
pub fn merge(base: &FiscalDocument, enhancement: &FiscalDocument) -> FiscalDocument {
    let mut out = base.clone();

    // Identity fields carry non-empty serde defaults (`nfe`, `BRL`,
    // `a_vista`), so "enhancement wins if truthy" cannot distinguish a
    // real answer from an omitted one. They stay with the base.
    pick_string(&mut out.operation_code, &enhancement.operation_code);
    pick_string(&mut out.tax_situation_code, &enhancement.tax_situation_code);
    pick_string(&mut out.tariff_code, &enhancement.tariff_code);
    pick_string(&mut out.issue_date, &enhancement.issue_date);
    pick_string(&mut out.issuer_id, &enhancement.issuer_id);
    pick_string(&mut out.recipient_id, &enhancement.recipient_id);
    pick_string(&mut out.document_number, &enhancement.document_number);
    pick_string(&mut out.series, &enhancement.series);
    pick_string(&mut out.access_key, &enhancement.access_key);

    if enhancement.total_value > 0.0 {
        out.total_value = enhancement.total_value;
    }

    // Items are replaced wholesale, never interleaved: matching entries
    // across two noisy extractions item-by-item is not reliable.
    if !enhancement.line_items.is_empty() {
        out.line_items = enhancement.line_items.clone();
    }

    out.taxes = merge_taxes(&base.taxes, &enhancement.taxes, out.total_value);
    out
}

fn pick_string(target: &mut String, candidate: &str) {
    if !candidate.is_empty() {
        *target = candidate.to_string();
    }
}

fn pick_amount(base: f64, candidate: f64) -> f64 {
    if candidate > 0.0 {
        candidate
    } else {
        base
    }
}

fn merge_taxes(base: &Taxes, enhancement: &Taxes, merged_total: f64) -> Taxes {
    let mut out = Taxes {
        icms_base: pick_amount(base.icms_base, enhancement.icms_base),
        icms_valor: pick_amount(base.icms_valor, enhancement.icms_valor),
        pis_base: pick_amount(base.pis_base, enhancement.pis_base),
        pis_valor: pick_amount(base.pis_valor, enhancement.pis_valor),
        cofins_base: pick_amount(base.cofins_base, enhancement.cofins_base),
        cofins_valor: pick_amount(base.cofins_valor, enhancement.cofins_valor),
        iss_valor: enhancement.iss_valor.or(base.iss_valor),
    };

    // Re-anchor bases the sources never carried to the merged total.
    if out.icms_valor > 0.0 && out.icms_base == 0.0 {
        out.icms_base = merged_total;
    }
    if out.pis_valor > 0.0 && out.pis_base == 0.0 {
        out.pis_base = merged_total;
    }
    if out.cofins_valor > 0.0 && out.cofins_base == 0.0 {
        out.cofins_base = merged_total;
    }
    out
}
