//! Prompt builders for the vision extraction paths.
//!
//! Prompts are Portuguese and pin the exact JSON shape the parser in
//! `vision` expects. All three share the same anti-fabrication ground
//! rule: absent information comes back as `""`/`0`/`[]`, never invented.

use crate::models::FiscalDocument;

/// OCR text beyond this adds tokens without adding grounding.
const OCR_EXCERPT_CHARS: usize = 500;

const JSON_SHAPE: &str = r#"{
  "documento": "nfe",
  "numero_documento": "",
  "serie": "",
  "data_emissao": "",
  "emitente": "",
  "destinatario": "",
  "chave_nfe": "",
  "cfop": "",
  "ncm": "",
  "cst": "",
  "forma_pagamento": "a_vista",
  "moeda": "BRL",
  "valor_total": 0.0,
  "impostos": {
    "icms_base": 0.0,
    "icms_valor": 0.0,
    "pis_base": 0.0,
    "pis_valor": 0.0,
    "cofins_base": 0.0,
    "cofins_valor": 0.0
  },
  "itens": [
    {
      "descricao": "",
      "quantidade": 0.0,
      "valor_unitario": 0.0,
      "cfop_item": "",
      "ncm": "",
      "cst": ""
    }
  ]
}"#;

const GROUND_RULES: &str = "\
Regras obrigatórias:
- Responda APENAS com o JSON, sem texto adicional.
- Use \"\" para campos de texto ausentes e 0.0 para valores ausentes. NUNCA invente dados.
- Se nenhum item for legível, retorne \"itens\": [] — jamais crie um item fictício.
- Valores monetários como números com ponto decimal (ex.: 1234.56).
- Datas no formato ISO YYYY-MM-DD.
- CNPJs apenas com dígitos, sem pontuação.
- \"documento\" deve ser \"nfe\", \"nfse\" ou \"nfce\".";

/// Full-document extraction over an attached image.
pub fn extraction_prompt() -> String {
    format!(
        "Você é um extrator de dados de documentos fiscais brasileiros. \
Analise a imagem desta nota fiscal e extraia os dados no seguinte formato JSON:\n\n\
{JSON_SHAPE}\n\n{GROUND_RULES}"
    )
}

/// Item-only recovery over OCR text, used when pattern extraction found
/// header fields but no line items.
pub fn items_prompt(ocr_text: &str) -> String {
    format!(
        "O texto abaixo foi extraído por OCR de uma nota fiscal brasileira. \
Extraia SOMENTE os itens (produtos ou serviços) no formato JSON:\n\n\
{{\"itens\": [{{\"descricao\": \"\", \"quantidade\": 0.0, \"valor_unitario\": 0.0, \
\"cfop_item\": \"\", \"ncm\": \"\", \"cst\": \"\"}}]}}\n\n\
{GROUND_RULES}\n\nTexto OCR:\n{ocr_text}"
    )
}

/// Full extraction over the first page image, focused on the fields the
/// cheap path failed to recover. Grounded with what was already
/// extracted and an excerpt of the OCR text.
pub fn enhancement_prompt(
    base: &FiscalDocument,
    ocr_text: &str,
    missing_fields: &[String],
) -> String {
    let extracted =
        serde_json::to_string_pretty(base).unwrap_or_else(|_| "{}".to_string());
    format!(
        "{}\n\nDados já extraídos automaticamente (confirme-os e complete o que falta):\n\
{extracted}\n\n\
A extração automática não conseguiu recuperar os seguintes campos, \
dê atenção especial a eles: {}.\n\n\
Trecho do texto OCR para referência:\n{}",
        extraction_prompt(),
        missing_fields.join(", "),
        excerpt(ocr_text, OCR_EXCERPT_CHARS)
    )
}

fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_pins_the_wire_shape() {
        let prompt = extraction_prompt();
        assert!(prompt.contains("\"numero_documento\""));
        assert!(prompt.contains("\"impostos\""));
        assert!(prompt.contains("\"itens\""));
        assert!(prompt.contains("NUNCA invente dados"));
    }

    #[test]
    fn items_prompt_embeds_the_ocr_text_and_empty_list_rule() {
        let prompt = items_prompt("Caneta 10 UN 2,50");
        assert!(prompt.contains("Caneta 10 UN 2,50"));
        assert!(prompt.contains("\"itens\": []"));
        assert!(prompt.contains("SOMENTE os itens"));
    }

    #[test]
    fn enhancement_prompt_embeds_base_data_missing_fields_and_ocr_text() {
        let base = FiscalDocument {
            document_number: "123".into(),
            total_value: 57.5,
            ..Default::default()
        };
        let prompt = enhancement_prompt(
            &base,
            "Valor Total da Nota: R$ 57,50",
            &["valor_total".into(), "data_emissao".into()],
        );
        assert!(prompt.contains("\"numero_documento\": \"123\""));
        assert!(prompt.contains("valor_total, data_emissao"));
        assert!(prompt.contains("atenção especial"));
        assert!(prompt.contains("Valor Total da Nota: R$ 57,50"));
    }

    #[test]
    fn enhancement_prompt_caps_the_ocr_excerpt() {
        let long = "x".repeat(2000);
        let prompt = enhancement_prompt(&FiscalDocument::default(), &long, &[]);
        assert!(prompt.contains(&"x".repeat(500)));
        assert!(!prompt.contains(&"x".repeat(501)));
    }
}
