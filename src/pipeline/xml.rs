//! Deterministic NF-e XML extraction.
//!
//! Walks the document with a streaming reader and a path stack of local
//! element names, so both bare `<NFe>` documents and `<nfeProc>`-wrapped
//! ones parse identically regardless of namespace prefixes.
//!
//! Only a missing `<infNFe>` is fatal — any other absent element leaves
//! its field at the model default. This path never calls the LLM.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::models::{FiscalDocument, LineItem};
use crate::pipeline::normalize::datetime_to_date;
use crate::pipeline::ExtractError;

/// Parse NF-e XML bytes into a canonical document.
pub fn extract_document(bytes: &[u8]) -> Result<FiscalDocument, ExtractError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut doc = FiscalDocument::default();
    let mut path: Vec<String> = Vec::new();
    let mut found_inf_nfe = false;
    let mut current_item: Option<LineItem> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "infNFe" {
                    found_inf_nfe = true;
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"Id" {
                            let value = attr.unescape_value().unwrap_or_default();
                            doc.access_key =
                                value.trim().trim_start_matches("NFe").to_string();
                        }
                    }
                } else if name == "det" {
                    current_item = Some(LineItem {
                        description: String::new(),
                        quantity: 0.0,
                        unit_price: 0.0,
                        operation_code: String::new(),
                        tariff_code: String::new(),
                        tax_situation_code: String::new(),
                    });
                }
                path.push(name);
            }
            Ok(Event::Empty(_)) => {}
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "det" {
                    // Drop structurally unusable entries instead of
                    // inventing quantities for them.
                    if let Some(item) = current_item.take() {
                        if !item.description.is_empty() && item.quantity > 0.0 {
                            doc.line_items.push(item);
                        }
                    }
                }
                path.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractError::XmlParsing(e.to_string()))?
                    .trim()
                    .to_string();
                if !text.is_empty() {
                    apply_text(&mut doc, &mut current_item, &path, &text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ExtractError::XmlParsing(e.to_string())),
        }
        buf.clear();
    }

    if !found_inf_nfe {
        return Err(ExtractError::XmlParsing(
            "elemento infNFe não encontrado".into(),
        ));
    }

    if doc.line_items.is_empty() {
        tracing::warn!(
            document_number = %doc.document_number,
            "NF-e sem itens utilizáveis no XML"
        );
    }

    // Document-level fiscal codes default to the first item's.
    if let Some(first) = doc.line_items.first() {
        if doc.operation_code.is_empty() {
            doc.operation_code = first.operation_code.clone();
        }
        if doc.tariff_code.is_empty() {
            doc.tariff_code = first.tariff_code.clone();
        }
        if doc.tax_situation_code.is_empty() {
            doc.tax_situation_code = first.tax_situation_code.clone();
        }
    }

    // ICMSTot carries a base only for ICMS; PIS/COFINS bases fall back
    // to the document total when their amounts are present.
    if doc.taxes.pis_valor > 0.0 && doc.taxes.pis_base == 0.0 {
        doc.taxes.pis_base = doc.total_value;
    }
    if doc.taxes.cofins_valor > 0.0 && doc.taxes.cofins_base == 0.0 {
        doc.taxes.cofins_base = doc.total_value;
    }

    Ok(doc)
}

fn apply_text(
    doc: &mut FiscalDocument,
    current_item: &mut Option<LineItem>,
    path: &[String],
    text: &str,
) {
    let Some(leaf) = path.last().map(String::as_str) else {
        return;
    };
    let parent = path
        .len()
        .checked_sub(2)
        .and_then(|i| path.get(i))
        .map(String::as_str)
        .unwrap_or("");
    let in_det = path.iter().any(|p| p == "det");
    let in_icms_tot = path.iter().any(|p| p == "ICMSTot");

    match (parent, leaf) {
        ("ide", "nNF") => doc.document_number = text.to_string(),
        ("ide", "serie") => doc.series = text.to_string(),
        ("ide", "dhEmi") | ("ide", "dEmi") => doc.issue_date = datetime_to_date(text),
        ("emit", "CNPJ") => doc.issuer_id = digits_only(text),
        ("dest", "CNPJ") => doc.recipient_id = digits_only(text),
        _ if in_det => {
            if let Some(item) = current_item.as_mut() {
                match (parent, leaf) {
                    ("prod", "xProd") => item.description = text.to_string(),
                    ("prod", "qCom") => item.quantity = parse_decimal(text),
                    ("prod", "vUnCom") => item.unit_price = parse_decimal(text),
                    ("prod", "CFOP") => item.operation_code = text.to_string(),
                    ("prod", "NCM") => item.tariff_code = text.to_string(),
                    (_, "CST") if item.tax_situation_code.is_empty() => {
                        item.tax_situation_code = text.to_string();
                    }
                    _ => {}
                }
            }
        }
        _ if in_icms_tot => match leaf {
            "vNF" => doc.total_value = parse_decimal(text),
            "vBC" => doc.taxes.icms_base = parse_decimal(text),
            "vICMS" => doc.taxes.icms_valor = parse_decimal(text),
            "vPIS" => doc.taxes.pis_valor = parse_decimal(text),
            "vCOFINS" => doc.taxes.cofins_valor = parse_decimal(text),
            _ => {}
        },
        _ => {}
    }
}

/// NF-e numeric fields are plain dot-decimal; anything else is 0.0.
fn parse_decimal(text: &str) -> f64 {
    text.trim().parse::<f64>().unwrap_or(0.0)
}

fn digits_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NFE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe35240312345678000190550010000123451000123456" versao="4.00">
      <ide>
        <nNF>12345</nNF>
        <serie>1</serie>
        <dhEmi>2024-03-15T10:30:00-03:00</dhEmi>
      </ide>
      <emit><CNPJ>12.345.678/0001-90</CNPJ><xNome>Empresa Emitente LTDA</xNome></emit>
      <dest><CNPJ>98765432000110</CNPJ></dest>
      <det nItem="1">
        <prod>
          <xProd>Produto Exemplo</xProd>
          <NCM>12345678</NCM>
          <CFOP>5102</CFOP>
          <qCom>2.0000</qCom>
          <vUnCom>50.00</vUnCom>
        </prod>
        <imposto>
          <ICMS><ICMS00><CST>00</CST><vBC>100.00</vBC><vICMS>18.00</vICMS></ICMS00></ICMS>
        </imposto>
      </det>
      <total>
        <ICMSTot>
          <vBC>100.00</vBC>
          <vICMS>18.00</vICMS>
          <vPIS>1.65</vPIS>
          <vCOFINS>7.60</vCOFINS>
          <vNF>100.00</vNF>
        </ICMSTot>
      </total>
    </infNFe>
  </NFe>
</nfeProc>"#;

    #[test]
    fn extracts_complete_nfe() {
        let doc = extract_document(NFE_XML.as_bytes()).unwrap();
        assert_eq!(doc.document_number, "12345");
        assert_eq!(doc.series, "1");
        assert_eq!(doc.issue_date, "2024-03-15");
        assert_eq!(doc.total_value, 100.0);
        assert_eq!(doc.taxes.icms_valor, 18.0);
        assert_eq!(doc.taxes.icms_base, 100.0);
        assert_eq!(doc.taxes.pis_valor, 1.65);
        assert_eq!(doc.taxes.pis_base, 100.0);
        assert_eq!(doc.taxes.cofins_valor, 7.6);
    }

    #[test]
    fn amounts_survive_wire_serialization_exactly() {
        let doc = extract_document(NFE_XML.as_bytes()).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["valor_total"], 100.0);
        assert_eq!(json["numero_documento"], "12345");
        assert_eq!(json["impostos"]["icms_valor"], 18.0);
        assert_eq!(json["impostos"]["pis_valor"], 1.65);
        assert_eq!(json["impostos"]["cofins_valor"], 7.6);
        assert_eq!(json["impostos"]["iss_valor"], serde_json::Value::Null);
        assert_eq!(json["documento"], "nfe");
    }

    #[test]
    fn extraction_is_idempotent() {
        let a = extract_document(NFE_XML.as_bytes()).unwrap();
        let b = extract_document(NFE_XML.as_bytes()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn access_key_strips_the_nfe_prefix() {
        let doc = extract_document(NFE_XML.as_bytes()).unwrap();
        assert_eq!(doc.access_key, "35240312345678000190550010000123451000123456");
        assert_eq!(doc.access_key.len(), 44);
    }

    #[test]
    fn cnpjs_are_normalized_to_digits() {
        let doc = extract_document(NFE_XML.as_bytes()).unwrap();
        assert_eq!(doc.issuer_id, "12345678000190");
        assert_eq!(doc.recipient_id, "98765432000110");
    }

    #[test]
    fn items_carry_codes_and_seed_document_level_defaults() {
        let doc = extract_document(NFE_XML.as_bytes()).unwrap();
        assert_eq!(doc.line_items.len(), 1);
        let item = &doc.line_items[0];
        assert_eq!(item.description, "Produto Exemplo");
        assert_eq!(item.quantity, 2.0);
        assert_eq!(item.unit_price, 50.0);
        assert_eq!(item.operation_code, "5102");
        assert_eq!(item.tax_situation_code, "00");
        // Document level inherits from the first item.
        assert_eq!(doc.operation_code, "5102");
        assert_eq!(doc.tariff_code, "12345678");
        assert_eq!(doc.tax_situation_code, "00");
    }

    #[test]
    fn missing_inf_nfe_is_fatal() {
        let xml = r#"<root><other>conteudo</other></root>"#;
        let err = extract_document(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, ExtractError::XmlParsing(_)));
        assert!(err.to_string().contains("infNFe"));
    }

    #[test]
    fn sparse_nfe_falls_back_to_defaults() {
        let xml = r#"<NFe><infNFe Id="NFe123"><ide><nNF>77</nNF></ide></infNFe></NFe>"#;
        let doc = extract_document(xml.as_bytes()).unwrap();
        assert_eq!(doc.document_number, "77");
        assert_eq!(doc.access_key, "123");
        assert_eq!(doc.total_value, 0.0);
        assert_eq!(doc.issue_date, "");
        assert!(doc.line_items.is_empty());
        assert_eq!(doc.currency, "BRL");
    }

    #[test]
    fn item_without_positive_quantity_is_dropped() {
        let xml = r#"<NFe><infNFe Id="NFe1">
            <det><prod><xProd>Sem quantidade</xProd><vUnCom>10.00</vUnCom></prod></det>
        </infNFe></NFe>"#;
        let doc = extract_document(xml.as_bytes()).unwrap();
        assert!(doc.line_items.is_empty());
    }

    #[test]
    fn malformed_xml_reports_parse_error() {
        // Truncated mid-tag, so the reader itself must fail.
        let err = extract_document(b"<NFe><infNFe").unwrap_err();
        assert!(matches!(err, ExtractError::XmlParsing(_)));
    }

    #[test]
    fn date_only_demi_is_accepted() {
        let xml = r#"<NFe><infNFe Id="NFe1"><ide><dEmi>2023-01-10</dEmi></ide></infNFe></NFe>"#;
        let doc = extract_document(xml.as_bytes()).unwrap();
        assert_eq!(doc.issue_date, "2023-01-10");
    }
}
