//! Regex-based field recovery from OCR'd fiscal document text.
//!
//! This is the cheap extraction tier for scanned PDFs: a bank of
//! patterns per field, tried in order, first capture wins. Layout noise
//! from OCR means misses are normal — the completeness evaluator decides
//! downstream whether the result is good enough or needs vision
//! enhancement.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{FiscalDocument, LineItem, Taxes};
use crate::pipeline::normalize::{normalize_date, parse_currency};

// ═══════════════════════════════════════════════════════════
// Pattern banks
// ═══════════════════════════════════════════════════════════

static DOCUMENT_NUMBER: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)nota\s+fiscal\s+(?:eletr[oô]nica\s+)?n[º°o]?\.?\s*:?\s*(\d{1,9})")
            .unwrap(),
        Regex::new(r"(?i)NF-?e\s*n[º°o]?\.?\s*:?\s*(\d{1,9})").unwrap(),
        Regex::new(r"(?i)n[uú]mero\s*:?\s*(\d{1,9})").unwrap(),
        Regex::new(r"(?i)n[º°]\s*:?\s*(\d{1,9})").unwrap(),
    ]
});

static SERIES: LazyLock<Vec<Regex>> =
    LazyLock::new(|| vec![Regex::new(r"(?i)s[ée]rie\s*:?\s*(\d{1,3})").unwrap()]);

static ISSUE_DATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)data\s+(?:de\s+)?emiss[ãa]o\s*:?\s*(\d{2}/\d{2}/\d{4})").unwrap(),
        Regex::new(r"(?i)emiss[ãa]o\s*:?\s*(\d{2}/\d{2}/\d{4})").unwrap(),
        Regex::new(r"(\d{2}/\d{2}/\d{4})").unwrap(),
    ]
});

static TOTAL_VALUE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)valor\s+total\s+da\s+nota\s*:?\s*R?\$?\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)valor\s+total\s*:?\s*R?\$?\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)total\s+da\s+nota\s*:?\s*R?\$?\s*([\d.,]+)").unwrap(),
    ]
});

static ACCESS_KEY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)chave\s+de\s+acesso\s*:?\s*([\d\s.]{44,70})").unwrap(),
        Regex::new(r"\b(\d{44})\b").unwrap(),
    ]
});

/// CNPJs are positional: first occurrence belongs to the issuer, second
/// to the recipient.
static CNPJ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CNPJ\s*:?\s*(\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2})").unwrap());

static CFOP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)CFOP\s*:?\s*(\d{4})").unwrap());
static NCM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)NCM\s*:?\s*(\d{8})").unwrap());
static CST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)CST\s*:?\s*(\d{2,3})").unwrap());

/// Structural item line: optional ordinal, description, quantity,
/// unit price, line total (both amounts in Brazilian decimal-comma form).
static ITEM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:\d{1,3}\s+)?([A-Za-zÀ-ÿ][\wÀ-ÿ .,/()-]{3,60}?)\s+(\d{1,6}(?:[.,]\d{1,4})?)\s+(?:UN|PC|KG|CX|LT|UND|M)?\s*([\d.]{0,12}\d,\d{2})\s+([\d.]{0,12}\d,\d{2})\s*$",
    )
    .unwrap()
});

/// Labelled item block, the fallback when nothing tabular matches
/// (service invoices often print one field per line).
static ITEM_LABELLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)descri[çc][ãa]o\s*:?\s*([^\n]+)\n\s*quantidade\s*:?\s*([\d.,]+)\s*\n\s*valor\s+unit[áa]rio\s*:?\s*R?\$?\s*([\d.,]+)",
    )
    .unwrap()
});

static ICMS_VALUE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)valor\s+(?:do\s+)?ICMS\s*:?\s*R?\$?\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)ICMS\s*:?\s*R?\$?\s*([\d.,]+)").unwrap(),
    ]
});

static PIS_VALUE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)valor\s+(?:do\s+)?PIS\s*:?\s*R?\$?\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)PIS\s*:?\s*R?\$?\s*([\d.,]+)").unwrap(),
    ]
});

static COFINS_VALUE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)valor\s+(?:do\s+)?COFINS\s*:?\s*R?\$?\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)COFINS\s*:?\s*R?\$?\s*([\d.,]+)").unwrap(),
    ]
});

static ISS_VALUE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)valor\s+(?:do\s+)?ISS(?:QN)?\s*:?\s*R?\$?\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)ISS\s*:?\s*R?\$?\s*([\d.,]+)").unwrap(),
    ]
});

// ═══════════════════════════════════════════════════════════
// Extraction
// ═══════════════════════════════════════════════════════════

fn first_capture(bank: &[Regex], text: &str) -> Option<String> {
    bank.iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Recover a document from raw OCR text. Every field that no pattern
/// matches stays at its default — nothing here invents values.
pub fn extract_document(text: &str) -> FiscalDocument {
    let mut doc = FiscalDocument::default();

    if let Some(number) = first_capture(&DOCUMENT_NUMBER, text) {
        doc.document_number = number;
    }
    if let Some(series) = first_capture(&SERIES, text) {
        doc.series = series;
    }
    if let Some(date) = first_capture(&ISSUE_DATE, text) {
        doc.issue_date = normalize_date(&date);
    }
    if let Some(total) = first_capture(&TOTAL_VALUE, text) {
        doc.total_value = parse_currency(&total);
    }
    if let Some(key) = first_capture(&ACCESS_KEY, text) {
        let key = digits_only(&key);
        if key.len() == 44 {
            doc.access_key = key;
        }
    }

    let mut cnpjs = CNPJ.captures_iter(text);
    if let Some(caps) = cnpjs.next() {
        doc.issuer_id = digits_only(&caps[1]);
    }
    if let Some(caps) = cnpjs.next() {
        doc.recipient_id = digits_only(&caps[1]);
    }

    if let Some(caps) = CFOP.captures(text) {
        doc.operation_code = caps[1].to_string();
    }
    if let Some(caps) = NCM.captures(text) {
        doc.tariff_code = caps[1].to_string();
    }
    if let Some(caps) = CST.captures(text) {
        doc.tax_situation_code = caps[1].to_string();
    }

    doc.line_items = extract_items(text);
    doc.taxes = extract_taxes(text, doc.total_value);
    doc
}

/// Structural line-item scan: tabular lines first, labelled blocks as
/// fallback. Empty output is a legitimate answer for noisy scans and
/// triggers LLM escalation upstream.
pub fn extract_items(text: &str) -> Vec<LineItem> {
    let tabular: Vec<LineItem> = ITEM_LINE
        .captures_iter(text)
        .filter_map(|caps| {
            let description = caps[1].trim().to_string();
            let quantity = parse_currency(&caps[2]);
            let mut unit_price = parse_currency(&caps[3]);
            let line_total = parse_currency(&caps[4]);
            if description.is_empty() || quantity <= 0.0 {
                return None;
            }
            // OCR sometimes mangles the unit column; recover it from
            // the line total.
            if unit_price == 0.0 && line_total > 0.0 {
                unit_price = line_total / quantity;
            }
            Some(plain_item(description, quantity, unit_price))
        })
        .collect();
    if !tabular.is_empty() {
        return tabular;
    }

    ITEM_LABELLED
        .captures_iter(text)
        .filter_map(|caps| {
            let description = caps[1].trim().to_string();
            let quantity = parse_currency(&caps[2]);
            let unit_price = parse_currency(&caps[3]);
            if description.is_empty() || quantity <= 0.0 {
                return None;
            }
            Some(plain_item(description, quantity, unit_price))
        })
        .collect()
}

fn plain_item(description: String, quantity: f64, unit_price: f64) -> LineItem {
    LineItem {
        description,
        quantity,
        unit_price,
        operation_code: String::new(),
        tariff_code: String::new(),
        tax_situation_code: String::new(),
    }
}

/// Recover tax amounts from text. Bases fall back to the document total
/// when the source prints only the computed amounts (common on DANFEs);
/// no amount is ever estimated from rates.
pub fn extract_taxes(text: &str, total_value: f64) -> Taxes {
    let icms = first_capture(&ICMS_VALUE, text).map(|v| parse_currency(&v));
    let pis = first_capture(&PIS_VALUE, text).map(|v| parse_currency(&v));
    let cofins = first_capture(&COFINS_VALUE, text).map(|v| parse_currency(&v));
    let iss = first_capture(&ISS_VALUE, text).map(|v| parse_currency(&v));

    Taxes {
        icms_base: if icms.is_some() { total_value } else { 0.0 },
        icms_valor: icms.unwrap_or(0.0),
        pis_base: if pis.is_some() { total_value } else { 0.0 },
        pis_valor: pis.unwrap_or(0.0),
        cofins_base: if cofins.is_some() { total_value } else { 0.0 },
        cofins_valor: cofins.unwrap_or(0.0),
        iss_valor: iss,
    }
}
