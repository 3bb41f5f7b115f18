//! Parser tolerante para o JSON embutido nas colunas do CSV.
//!
//! O arquivo de origem não traz JSON estrito: os valores foram gravados como literais
//! Python (`[{'id': 16, 'name': 'Animation'}]`, `None`, `True`). Este parser aceita
//! JSON estrito e esse dialeto, e devolve `serde_json::Value`.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Aninhamento máximo de objetos/arrays aceito.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("posição {offset}: {message}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Converte o texto inteiro num `Value`. Conteúdo após o valor é erro.
pub fn parse(text: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        chars: text.char_indices().collect(),
        pos: 0,
        len: text.len(),
        depth: 0,
    };
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("conteúdo após o valor"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
    len: usize,
    depth: usize,
}

impl Parser {
    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.len, |(i, _)| *i)
    }

    fn error(&self, message: &str) -> LiteralError {
        LiteralError {
            offset: self.offset(),
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(&format!("esperado '{}'", expected)))
            }
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            Some('{') => self.nested(Self::object),
            Some('[') => self.nested(Self::array),
            Some(q @ ('\'' | '"')) => self.string(q).map(Value::String),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.keyword(),
            Some(_) => Err(self.error("caractere inesperado")),
            None => Err(self.error("fim inesperado")),
        }
    }

    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("profundidade máxima excedida"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn object(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(Value::Object(map));
        }
        loop {
            self.skip_ws();
            let key = match self.peek() {
                Some(q @ ('\'' | '"')) => self.string(q)?,
                _ => return Err(self.error("chave de objeto deve ser string")),
            };
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("esperado ',' ou '}'"));
                }
            }
        }
    }

    fn array(&mut self) -> Result<Value, LiteralError> {
        self.expect('[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(']') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }
        loop {
            self.skip_ws();
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::Array(items)),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("esperado ',' ou ']'"));
                }
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<String, LiteralError> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("string não terminada")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = self.bump().ok_or_else(|| self.error("escape incompleto"))?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        '0' => out.push('\0'),
                        'x' => out.push(self.hex_char(2)?),
                        'u' => out.push(self.hex_char(4)?),
                        other => out.push(other),
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn hex_char(&mut self, digits: usize) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("escape hexadecimal inválido"))?;
            code = code * 16 + digit;
        }
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' | 'e' | 'E' => is_float = true,
                '+' | '-' if is_float => {}
                _ => break,
            }
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().map(|(_, c)| c).collect();

        let number = if is_float {
            text.parse::<f64>().ok().and_then(Number::from_f64)
        } else {
            text.parse::<i64>()
                .map(Number::from)
                .or_else(|_| text.parse::<u64>().map(Number::from))
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64))
        };
        number.map(Value::Number).ok_or(LiteralError {
            offset: self.chars.get(start).map_or(self.len, |(i, _)| *i),
            message: format!("número inválido '{}'", text),
        })
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().map(|(_, c)| c).collect();
        match word.as_str() {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "null" | "None" => Ok(Value::Null),
            _ => {
                self.pos = start;
                Err(self.error(&format!("palavra desconhecida '{}'", word)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_strict_json() {
        let value = parse(r#"[{"id": 3, "name": "Pixar"}]"#).unwrap();
        assert_eq!(value, json!([{"id": 3, "name": "Pixar"}]));
    }

    #[test]
    fn parses_python_literal_dialect() {
        let value = parse(
            "{'id': 10194, 'name': 'Toy Story Collection', 'poster_path': None, 'adult': False}",
        )
        .unwrap();
        assert_eq!(
            value,
            json!({"id": 10194, "name": "Toy Story Collection", "poster_path": null, "adult": false})
        );
    }

    #[test]
    fn double_quoted_names_may_contain_apostrophes() {
        let value = parse(r#"[{'name': "Dreamworks' Pictures", 'id': 7}]"#).unwrap();
        assert_eq!(value[0]["name"], "Dreamworks' Pictures");
    }

    #[test]
    fn handles_escapes_and_floats() {
        assert_eq!(parse(r"'it\'s'").unwrap(), json!("it's"));
        assert_eq!(parse(r"'caf\xe9'").unwrap(), json!("café"));
        assert_eq!(parse("-1.5e2").unwrap(), json!(-150.0));
        assert_eq!(parse("  [ ]  ").unwrap(), json!([]));
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(parse("[{'id': 1, 'name': 'x'").is_err());
        assert!(parse("{'id' 1}").is_err());
        assert!(parse("[1] trailing").is_err());
        assert!(parse("").is_err());
        assert!(parse("nope").is_err());
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let err = parse(&"[".repeat(200_000)).unwrap_err();
        assert_eq!(err.message, "profundidade máxima excedida");
        assert_eq!(err.offset, MAX_DEPTH);

        let limit = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse(&limit).is_ok());
        let over = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        assert!(parse(&over).is_err());
    }

    #[test]
    fn integers_beyond_i64_fall_back_to_u64_then_f64() {
        assert_eq!(parse("18446744073709551615").unwrap(), json!(u64::MAX));
        assert_eq!(parse("99999999999999999999").unwrap(), json!(1e20));
        assert_eq!(parse("-9223372036854775808").unwrap(), json!(i64::MIN));
    }

    #[test]
    fn error_reports_byte_offset() {
        let err = parse("[1, ?]").unwrap_err();
        assert_eq!(err.offset, 4);
    }
}
