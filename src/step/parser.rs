//! Recursive-descent parser over the token stream.

use super::lexer::{tokenize, Spanned, Token};
use super::{InstancePart, Parameter, RawInstance, StepFile, StepHeader};
use crate::error::{IfcGraphError, Result};

/// Parse the full text of a STEP physical file.
pub fn parse_step(input: &str) -> Result<StepFile> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };

    parser.expect_keyword("ISO-10303-21")?;
    parser.expect(&Token::Semicolon)?;

    parser.expect_keyword("HEADER")?;
    parser.expect(&Token::Semicolon)?;
    let mut header = StepHeader::default();
    while !parser.at_keyword("ENDSEC") {
        let part = parser.part()?;
        parser.expect(&Token::Semicolon)?;
        header.entries.push(part);
    }
    parser.expect_keyword("ENDSEC")?;
    parser.expect(&Token::Semicolon)?;

    let mut instances = Vec::new();
    while parser.at_keyword("DATA") {
        parser.advance();
        // Edition 3 allows `DATA('name',('schema'));`
        if parser.peek() == Some(&Token::LParen) {
            parser.list()?;
        }
        parser.expect(&Token::Semicolon)?;
        while !parser.at_keyword("ENDSEC") {
            instances.push(parser.instance()?);
        }
        parser.expect_keyword("ENDSEC")?;
        parser.expect(&Token::Semicolon)?;
    }

    parser.expect_keyword("END-ISO-10303-21")?;
    if parser.peek() == Some(&Token::Semicolon) {
        parser.advance();
    }

    log::debug!(
        "Parsed STEP file: {} header entries, {} instances",
        header.entries.len(),
        instances.len()
    );
    StepFile::from_parts(header, instances)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        token
    }

    fn error(&self, expected: &str) -> IfcGraphError {
        let found = self
            .peek()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "end of input".to_string());
        IfcGraphError::Parse(format!("line {}: expected {}, found {}", self.line(), expected, found))
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Keyword(k)) if k == keyword)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.at_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(keyword))
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.peek() == Some(token) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&token.to_string()))
        }
    }

    fn instance(&mut self) -> Result<RawInstance> {
        let line = self.line();
        let id = match self.peek() {
            Some(Token::InstanceName(id)) => *id,
            _ => return Err(self.error("instance name")),
        };
        self.advance();
        self.expect(&Token::Equals)?;

        let parts = if self.peek() == Some(&Token::LParen) {
            self.advance();
            let mut parts = Vec::new();
            while self.peek() != Some(&Token::RParen) {
                parts.push(self.part()?);
            }
            self.advance();
            if parts.is_empty() {
                return Err(IfcGraphError::Parse(format!(
                    "line {}: complex instance #{} has no parts",
                    line, id
                )));
            }
            parts
        } else {
            vec![self.part()?]
        };
        self.expect(&Token::Semicolon)?;

        Ok(RawInstance { id, parts, line })
    }

    fn part(&mut self) -> Result<InstancePart> {
        let type_name = match self.peek() {
            Some(Token::Keyword(k)) => k.clone(),
            _ => return Err(self.error("entity keyword")),
        };
        self.advance();
        let params = self.list()?;
        Ok(InstancePart { type_name, params })
    }

    fn list(&mut self) -> Result<Vec<Parameter>> {
        self.expect(&Token::LParen)?;
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.parameter()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::RParen) => {
                    self.advance();
                    return Ok(items);
                }
                _ => return Err(self.error("',' or ')'")),
            }
        }
    }

    fn parameter(&mut self) -> Result<Parameter> {
        let param = match self.peek() {
            Some(Token::LParen) => return Ok(Parameter::List(self.list()?)),
            Some(Token::Keyword(name)) => {
                let name = name.clone();
                self.advance();
                let params = self.list()?;
                return Ok(Parameter::Typed { name, params });
            }
            Some(Token::Dollar) => Parameter::Null,
            Some(Token::Star) => Parameter::Derived,
            Some(Token::Integer(i)) => Parameter::Integer(*i),
            Some(Token::Real(r)) => Parameter::Real(*r),
            Some(Token::String(s)) => Parameter::String(s.clone()),
            Some(Token::Enum(e)) => Parameter::Enum(e.clone()),
            Some(Token::Binary(b)) => Parameter::Binary(b.clone()),
            Some(Token::InstanceName(id)) => Parameter::Ref(*id),
            _ => return Err(self.error("parameter")),
        };
        self.advance();
        Ok(param)
    }
}
