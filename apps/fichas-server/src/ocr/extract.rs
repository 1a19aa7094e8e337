//! Field extraction from recognized text

use std::sync::OnceLock;

use regex::Regex;

use super::types::ExtractedFields;

fn nome_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)Nome[:\s]*([^\n]+)").unwrap())
}

fn registro_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)Registro[:\s]*([^\n]+)").unwrap())
}

/// First match of `pattern`, trimmed; blank captures count as absent
fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Pull `nome` and `registro` out of OCR text
pub fn extract_fields(text: &str) -> ExtractedFields {
    ExtractedFields {
        nome: capture(nome_pattern(), text),
        registro: capture(registro_pattern(), text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_both_fields() {
        let fields = extract_fields("Nome: JOAO SILVA\nRegistro: 12345\n");
        assert_eq!(fields.nome.as_deref(), Some("JOAO SILVA"));
        assert_eq!(fields.registro.as_deref(), Some("12345"));
    }

    #[test]
    fn test_case_insensitive_and_loose_separator() {
        let fields = extract_fields("FICHA\nNOME   Maria de Souza  \nregistro:987\r\n");
        assert_eq!(fields.nome.as_deref(), Some("Maria de Souza"));
        assert_eq!(fields.registro.as_deref(), Some("987"));
    }

    #[test]
    fn test_missing_label_is_none() {
        let fields = extract_fields("Registro: 55\nsem outros dados");
        assert_eq!(fields.nome, None);
        assert_eq!(fields.registro.as_deref(), Some("55"));

        assert_eq!(extract_fields(""), ExtractedFields::default());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let text = "Nome: ANA\nRegistro: 7\n";
        assert_eq!(extract_fields(text), extract_fields(text));
    }
}
