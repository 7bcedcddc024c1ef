//! Selector Parser
//!
//! Hand-written recursive descent parser for selector lists.

use crate::SelectorError;
use crate::selectors::{
    AttributeMatcher, AttributeSelector, Combinator, ComplexSelector, Compound, NthExpression,
    PseudoClass, SelectorComponent, SelectorList,
};

/// Parse a comma separated selector list
pub fn parse_selector_list(input: &str) -> Result<SelectorList, SelectorError> {
    if input.trim().is_empty() {
        return Err(SelectorError::Empty);
    }

    let mut parser = SelectorParser::new(input);
    let selectors = parser.parse_list(false)?;
    if let Some(c) = parser.peek() {
        return Err(parser.unexpected(c));
    }

    tracing::trace!(selector = input, count = selectors.len(), "parsed selector list");
    Ok(SelectorList::new(selectors, input))
}

struct SelectorParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> SelectorParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.input[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SelectorError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(self.unexpected(c)),
            None => Err(SelectorError::UnexpectedEnd),
        }
    }

    /// Skip whitespace, reporting whether any was skipped
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
        self.pos != start
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            found,
            offset: self.pos,
        }
    }

    /// selector-list := complex ( ',' complex )*
    ///
    /// In nested mode the list ends at a closing parenthesis, which is left
    /// for the caller.
    fn parse_list(&mut self, nested: bool) -> Result<Vec<ComplexSelector>, SelectorError> {
        let mut selectors = vec![self.parse_complex()?];
        loop {
            match self.peek() {
                Some(',') => {
                    self.bump();
                    selectors.push(self.parse_complex()?);
                }
                Some(')') if nested => break,
                None => break,
                Some(c) => return Err(self.unexpected(c)),
            }
        }
        Ok(selectors)
    }

    /// complex := compound ( combinator compound )*
    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        self.skip_whitespace();
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                Some('>') => Combinator::Child,
                Some('+') => Combinator::NextSibling,
                Some('~') => Combinator::SubsequentSibling,
                None | Some(',') | Some(')') => break,
                Some(_) if had_space => Combinator::Descendant,
                Some(c) => return Err(self.unexpected(c)),
            };
            if combinator != Combinator::Descendant {
                self.bump();
                self.skip_whitespace();
            }
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    /// compound := ( type | '*' )? ( id | class | attribute | pseudo )*
    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut components = Vec::new();

        if self.eat('*') {
            components.push(SelectorComponent::Universal);
        } else if self.peek().is_some_and(is_ident_start) {
            let tag = self.parse_ident()?;
            components.push(SelectorComponent::Type(tag.to_ascii_lowercase()));
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    components.push(SelectorComponent::Id(self.parse_ident()?));
                }
                Some('.') => {
                    self.bump();
                    components.push(SelectorComponent::Class(self.parse_ident()?));
                }
                Some('[') => {
                    self.bump();
                    components.push(SelectorComponent::Attribute(self.parse_attribute()?));
                }
                Some(':') => {
                    self.bump();
                    components.push(SelectorComponent::PseudoClass(self.parse_pseudo()?));
                }
                _ => break,
            }
        }

        if components.is_empty() {
            return match self.peek() {
                Some(c) => Err(self.unexpected(c)),
                None => Err(SelectorError::UnexpectedEnd),
            };
        }
        Ok(Compound { components })
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let mut ident = String::new();

        // A leading hyphen must be followed by a name character
        if self.peek() == Some('-') && self.peek_second().is_some_and(is_ident_start) {
            self.bump();
            ident.push('-');
        }

        match self.peek() {
            Some(c) if is_ident_start(c) || c == '\\' => {}
            Some(c) => return Err(self.unexpected(c)),
            None => return Err(SelectorError::UnexpectedEnd),
        }

        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                let escaped = self.bump().ok_or(SelectorError::UnexpectedEnd)?;
                ident.push(escaped);
            } else if is_ident_char(c) {
                self.bump();
                ident.push(c);
            } else {
                break;
            }
        }
        Ok(ident)
    }

    /// attribute := '[' name ( op value ( 'i' | 's' )? )? ']'
    fn parse_attribute(&mut self) -> Result<AttributeSelector, SelectorError> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        if self.eat(']') {
            return Ok(AttributeSelector {
                name,
                matcher: None,
                case_insensitive: false,
            });
        }

        let op = match self.bump() {
            Some('=') => None,
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.expect('=')?;
                Some(c)
            }
            Some(c) => {
                self.pos -= c.len_utf8();
                return Err(self.unexpected(c));
            }
            None => return Err(SelectorError::UnexpectedEnd),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                self.parse_quoted(q)?
            }
            _ => self.parse_ident()?,
        };
        self.skip_whitespace();

        let mut case_insensitive = false;
        match self.peek() {
            Some('i' | 'I') => {
                self.bump();
                case_insensitive = true;
            }
            Some('s' | 'S') => {
                self.bump();
            }
            _ => {}
        }
        self.skip_whitespace();
        self.expect(']')?;

        let matcher = match op {
            None => AttributeMatcher::Exact(value),
            Some('~') => AttributeMatcher::Contains(value),
            Some('|') => AttributeMatcher::DashMatch(value),
            Some('^') => AttributeMatcher::Prefix(value),
            Some('$') => AttributeMatcher::Suffix(value),
            _ => AttributeMatcher::Substring(value),
        };

        Ok(AttributeSelector {
            name,
            matcher: Some(matcher),
            case_insensitive,
        })
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') => {
                    let escaped = self.bump().ok_or(SelectorError::UnexpectedEnd)?;
                    value.push(escaped);
                }
                Some(c) => value.push(c),
                None => return Err(SelectorError::UnexpectedEnd),
            }
        }
    }

    /// pseudo := ':' name ( '(' argument ')' )?
    fn parse_pseudo(&mut self) -> Result<PseudoClass, SelectorError> {
        if self.peek() == Some(':') {
            self.bump();
            let name = self.parse_ident()?;
            return Err(SelectorError::PseudoElement(name));
        }

        let name = self.parse_ident()?.to_ascii_lowercase();
        if !self.eat('(') {
            return PseudoClass::from_name(&name).ok_or(SelectorError::UnknownPseudoClass(name));
        }

        let pseudo = match name.as_str() {
            "not" => {
                self.skip_whitespace();
                let start = self.pos;
                let selectors = self.parse_list(true)?;
                let text = &self.input[start..self.pos];
                PseudoClass::Not(Box::new(SelectorList::new(selectors, text)))
            }
            "nth-child" | "nth-last-child" | "nth-of-type" | "nth-last-of-type" => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ')') {
                    self.bump();
                }
                let arg = &self.input[start..self.pos];
                let expr = NthExpression::parse(arg)
                    .ok_or_else(|| SelectorError::InvalidNth(arg.trim().to_string()))?;
                match name.as_str() {
                    "nth-child" => PseudoClass::NthChild(expr),
                    "nth-last-child" => PseudoClass::NthLastChild(expr),
                    "nth-of-type" => PseudoClass::NthOfType(expr),
                    _ => PseudoClass::NthLastOfType(expr),
                }
            }
            _ => return Err(SelectorError::UnknownPseudoClass(name)),
        };

        self.expect(')')?;
        Ok(pseudo)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || c == '-'
}
