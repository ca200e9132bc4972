//! Parsing token streams into raw module syntax.
//!
//! A recursive-descent parser with one token of lookahead (plus bounded
//! backtracking for the brace-value ambiguity X.680 bakes into value
//! notation). Any deviation fails with a [`SyntaxError`] carrying the line
//! and column of the offending token.

use crate::ast;
use crate::error::SyntaxError;
use crate::lexer::{line_column, tokenize, Token, TokenKind};
use crate::types::{Class, StringKind, TimeKind};

use num_traits::ToPrimitive;

/// Parses every module definition in `source`. `label` is used only in
/// diagnostics.
pub(crate) fn parse(label: &str, source: &str) -> Result<Vec<ast::Module>, SyntaxError> {
    let tokens = tokenize(source).map_err(|(offset, message)| {
        let (line, column) = line_column(source, offset);
        SyntaxError::new(label, line, column, message)
    })?;

    let mut parser = Parser {
        label,
        source,
        tokens,
        position: 0,
    };

    let mut modules = Vec::new();
    while parser.peek().is_some() {
        modules.push(parser.module_definition()?);
    }
    if modules.is_empty() {
        return Err(parser.expected("a module definition"));
    }
    Ok(modules)
}

struct Parser<'src> {
    label: &'src str,
    source: &'src str,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.position).map(|token| &token.kind)
    }

    fn peek_at(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.position + n).map(|token| &token.kind)
    }

    fn bump(&mut self) -> Option<TokenKind> {
        let token = self.tokens.get(self.position).map(|token| token.kind.clone());
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn take(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), SyntaxError> {
        if self.take(&kind) {
            Ok(())
        } else {
            Err(self.expected(what))
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::TypeReference(word)) if word == keyword)
    }

    fn take_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), SyntaxError> {
        if self.take_keyword(keyword) {
            Ok(())
        } else {
            Err(self.expected(&format!("`{keyword}`")))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.peek() {
            Some(TokenKind::Identifier(name)) => {
                let name = name.clone();
                self.position += 1;
                Ok(name)
            }
            _ => Err(self.expected(what)),
        }
    }

    fn expect_type_reference(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.peek() {
            Some(TokenKind::TypeReference(name)) => {
                let name = name.clone();
                self.position += 1;
                Ok(name)
            }
            _ => Err(self.expected(what)),
        }
    }

    /// An identifier or type reference, as import/export symbol lists and
    /// formal parameter names allow both.
    fn expect_word(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.peek() {
            Some(TokenKind::Identifier(name)) | Some(TokenKind::TypeReference(name)) => {
                let name = name.clone();
                self.position += 1;
                Ok(name)
            }
            _ => Err(self.expected(what)),
        }
    }

    fn error_at_current(&self, message: String) -> SyntaxError {
        let offset = self
            .tokens
            .get(self.position)
            .map_or(self.source.len(), |token| token.offset);
        let (line, column) = line_column(self.source, offset);
        SyntaxError::new(self.label, line, column, message)
    }

    fn expected(&self, what: &str) -> SyntaxError {
        let found = self
            .tokens
            .get(self.position)
            .map_or("end of input".to_owned(), |token| token.kind.describe());
        self.error_at_current(format!("expected {what}, found {found}"))
    }

    // ModuleDefinition

    fn module_definition(&mut self) -> Result<ast::Module, SyntaxError> {
        let name = self.expect_type_reference("a module reference")?;
        let oid = if self.at(&TokenKind::LBrace) {
            Some(self.oid_value()?)
        } else {
            None
        };
        self.expect_keyword("DEFINITIONS")?;

        let tagging = if self.take_keyword("EXPLICIT") {
            self.expect_keyword("TAGS")?;
            ast::TagMode::Explicit
        } else if self.take_keyword("IMPLICIT") {
            self.expect_keyword("TAGS")?;
            ast::TagMode::Implicit
        } else if self.take_keyword("AUTOMATIC") {
            self.expect_keyword("TAGS")?;
            ast::TagMode::Automatic
        } else {
            ast::TagMode::Explicit
        };

        let extensibility_implied = if self.take_keyword("EXTENSIBILITY") {
            self.expect_keyword("IMPLIED")?;
            true
        } else {
            false
        };

        self.expect(TokenKind::Assign, "`::=`")?;
        self.expect_keyword("BEGIN")?;

        let exports = self.exports()?;
        let imports = self.imports()?;

        let mut assignments = Vec::new();
        loop {
            if self.take_keyword("END") {
                break;
            }
            match self.peek() {
                Some(TokenKind::TypeReference(_)) => {
                    assignments.push(ast::Assignment::Type(self.type_assignment()?));
                }
                Some(TokenKind::Identifier(_)) => {
                    assignments.push(ast::Assignment::Value(self.value_assignment()?));
                }
                _ => return Err(self.expected("an assignment or `END`")),
            }
        }

        Ok(ast::Module {
            name,
            oid,
            tagging,
            extensibility_implied,
            exports,
            imports,
            assignments,
        })
    }

    fn exports(&mut self) -> Result<Option<Vec<String>>, SyntaxError> {
        if !self.take_keyword("EXPORTS") {
            return Ok(None);
        }
        if self.take_keyword("ALL") {
            self.expect(TokenKind::SemiColon, "`;`")?;
            return Ok(None);
        }
        let mut symbols = Vec::new();
        loop {
            symbols.push(self.symbol()?);
            if !self.take(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::SemiColon, "`;`")?;
        Ok(Some(symbols))
    }

    fn imports(&mut self) -> Result<Vec<ast::Import>, SyntaxError> {
        let mut imports = Vec::new();
        if !self.take_keyword("IMPORTS") {
            return Ok(imports);
        }
        while !self.take(&TokenKind::SemiColon) {
            let mut symbols = Vec::new();
            loop {
                symbols.push(self.symbol()?);
                if !self.take(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_keyword("FROM")?;
            let module = self.expect_type_reference("a module reference")?;
            if self.at(&TokenKind::LBrace) {
                // the source module's object identifier; recorded nowhere
                self.oid_value()?;
            }
            imports.push(ast::Import { symbols, module });
        }
        Ok(imports)
    }

    /// A symbol in an import/export list; a trailing `{}` marks a
    /// parameterized reference and is skipped.
    fn symbol(&mut self) -> Result<String, SyntaxError> {
        let name = self.expect_word("a symbol")?;
        if self.take(&TokenKind::LBrace) {
            self.expect(TokenKind::RBrace, "`}`")?;
        }
        Ok(name)
    }

    fn type_assignment(&mut self) -> Result<ast::TypeAssignment, SyntaxError> {
        let name = self.expect_type_reference("a type reference")?;
        let parameters = if self.at(&TokenKind::LBrace) {
            self.formal_parameter_list()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::Assign, "`::=`")?;
        let ty = self.parse_type()?;
        Ok(ast::TypeAssignment { name, parameters, ty })
    }

    fn value_assignment(&mut self) -> Result<ast::ValueAssignment, SyntaxError> {
        let name = self.expect_identifier("a value reference")?;
        let ty = self.parse_type()?;
        self.expect(TokenKind::Assign, "`::=`")?;
        let value = self.parse_value()?;
        Ok(ast::ValueAssignment { name, ty, value })
    }

    fn formal_parameter_list(&mut self) -> Result<Vec<ast::Parameter>, SyntaxError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut parameters = Vec::new();
        loop {
            parameters.push(self.formal_parameter()?);
            if !self.take(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(parameters)
    }

    fn formal_parameter(&mut self) -> Result<ast::Parameter, SyntaxError> {
        // A governor is present when a `:` appears before the parameter's
        // closing `,` or `}`.
        let mut lookahead = self.position;
        let mut depth = 0usize;
        let mut governed = false;
        while let Some(token) = self.tokens.get(lookahead) {
            match token.kind {
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket if depth > 0 => {
                    depth -= 1
                }
                TokenKind::Colon if depth == 0 => {
                    governed = true;
                    break;
                }
                TokenKind::Comma | TokenKind::RBrace if depth == 0 => break,
                _ => {}
            }
            lookahead += 1;
        }

        let governor = if governed {
            let governor = self.parse_type()?;
            self.expect(TokenKind::Colon, "`:`")?;
            Some(governor)
        } else {
            None
        };
        let name = self.expect_word("a parameter name")?;
        Ok(ast::Parameter { governor, name })
    }

    // Types

    fn parse_type(&mut self) -> Result<ast::Type, SyntaxError> {
        let tag = self.tag_prefix()?;
        if tag.is_some() && self.at(&TokenKind::LBracket) {
            let inner = self.parse_type()?;
            return Ok(ast::Type {
                tag,
                kind: ast::TypeKind::Prefixed(Box::new(inner)),
                constraints: Vec::new(),
            });
        }
        let (kind, mut constraints) = self.type_body()?;
        while self.at(&TokenKind::LParen) {
            constraints.push(self.parse_constraint()?);
        }
        Ok(ast::Type {
            tag,
            kind,
            constraints,
        })
    }

    fn tag_prefix(&mut self) -> Result<Option<ast::TagPrefix>, SyntaxError> {
        if !self.take(&TokenKind::LBracket) {
            return Ok(None);
        }
        let class = if self.take_keyword("UNIVERSAL") {
            Class::Universal
        } else if self.take_keyword("APPLICATION") {
            Class::Application
        } else if self.take_keyword("PRIVATE") {
            Class::Private
        } else {
            Class::Context
        };
        let number = match self.peek().cloned() {
            Some(TokenKind::Number(value)) => {
                self.position += 1;
                ast::Value::Integer(value)
            }
            Some(TokenKind::Identifier(name)) => {
                self.position += 1;
                ast::Value::Reference(name)
            }
            _ => return Err(self.expected("a tag number")),
        };
        self.expect(TokenKind::RBracket, "`]`")?;
        let kind = if self.take_keyword("IMPLICIT") {
            Some(ast::TagKind::Implicit)
        } else if self.take_keyword("EXPLICIT") {
            Some(ast::TagKind::Explicit)
        } else {
            None
        };
        Ok(Some(ast::TagPrefix {
            class,
            number,
            kind,
        }))
    }

    fn type_body(&mut self) -> Result<(ast::TypeKind, Vec<ast::ElementSet>), SyntaxError> {
        use ast::TypeKind as K;

        let Some(kind) = self.peek().cloned() else {
            return Err(self.expected("a type"));
        };
        let none = Vec::new;
        match kind {
            TokenKind::Identifier(alternative) => {
                self.position += 1;
                self.expect(TokenKind::LessThan, "`<`")?;
                let inner = self.parse_type()?;
                Ok((
                    K::Selection {
                        alternative,
                        inner: Box::new(inner),
                    },
                    none(),
                ))
            }
            TokenKind::TypeReference(word) => match word.as_str() {
                "BOOLEAN" => {
                    self.position += 1;
                    Ok((K::Boolean, none()))
                }
                "INTEGER" => {
                    self.position += 1;
                    let named = self.optional_named_number_list();
                    Ok((K::Integer { named }, none()))
                }
                "REAL" => {
                    self.position += 1;
                    Ok((K::Real, none()))
                }
                "NULL" => {
                    self.position += 1;
                    Ok((K::Null, none()))
                }
                "OBJECT" => {
                    self.position += 1;
                    self.expect_keyword("IDENTIFIER")?;
                    Ok((K::ObjectIdentifier, none()))
                }
                "RELATIVE-OID" => {
                    self.position += 1;
                    Ok((K::RelativeOid, none()))
                }
                "ObjectDescriptor" => {
                    self.position += 1;
                    Ok((K::ObjectDescriptor, none()))
                }
                "EXTERNAL" => {
                    self.position += 1;
                    Ok((K::External, none()))
                }
                "EMBEDDED" => {
                    self.position += 1;
                    self.expect_keyword("PDV")?;
                    Ok((K::EmbeddedPdv, none()))
                }
                "ANY" => {
                    self.position += 1;
                    if self.take_keyword("DEFINED") {
                        self.expect_keyword("BY")?;
                        self.expect_identifier("a value reference")?;
                    }
                    Ok((K::Any, none()))
                }
                "ENUMERATED" => {
                    self.position += 1;
                    Ok((self.enumeration()?, none()))
                }
                "BIT" => {
                    self.position += 1;
                    self.expect_keyword("STRING")?;
                    let named = self.optional_named_number_list();
                    Ok((K::BitString { named }, none()))
                }
                "OCTET" => {
                    self.position += 1;
                    self.expect_keyword("STRING")?;
                    Ok((K::OctetString, none()))
                }
                "UTF8String" => self.character_string(StringKind::Utf8),
                "IA5String" => self.character_string(StringKind::Ia5),
                "PrintableString" => self.character_string(StringKind::Printable),
                "NumericString" => self.character_string(StringKind::Numeric),
                "VisibleString" | "ISO646String" => self.character_string(StringKind::Visible),
                "GeneralString" => self.character_string(StringKind::General),
                "UniversalString" => self.character_string(StringKind::Universal),
                "BMPString" => self.character_string(StringKind::Bmp),
                "TeletexString" | "T61String" => self.character_string(StringKind::Teletex),
                "GraphicString" => self.character_string(StringKind::Graphic),
                "UTCTime" => self.time(TimeKind::UtcTime),
                "GeneralizedTime" => self.time(TimeKind::GeneralizedTime),
                "DATE" => self.time(TimeKind::Date),
                "TIME-OF-DAY" => self.time(TimeKind::TimeOfDay),
                "DATE-TIME" => self.time(TimeKind::DateTime),
                "SEQUENCE" => self.constructed_or_of(false),
                "SET" => self.constructed_or_of(true),
                "CHOICE" => {
                    self.position += 1;
                    let list = self.component_list(true)?;
                    Ok((K::Choice(list), none()))
                }
                _ => self.reference(word),
            },
            _ => Err(self.expected("a type")),
        }
    }

    fn character_string(
        &mut self,
        kind: StringKind,
    ) -> Result<(ast::TypeKind, Vec<ast::ElementSet>), SyntaxError> {
        self.position += 1;
        Ok((ast::TypeKind::CharacterString(kind), Vec::new()))
    }

    fn time(
        &mut self,
        kind: TimeKind,
    ) -> Result<(ast::TypeKind, Vec<ast::ElementSet>), SyntaxError> {
        self.position += 1;
        Ok((ast::TypeKind::Time(kind), Vec::new()))
    }

    fn reference(
        &mut self,
        name: String,
    ) -> Result<(ast::TypeKind, Vec<ast::ElementSet>), SyntaxError> {
        self.position += 1;
        let (module, name) = if self.take(&TokenKind::Dot) {
            (Some(name), self.expect_type_reference("a type reference")?)
        } else {
            (None, name)
        };
        // `v Pair ::= { a 5 }` puts a brace right after a type reference
        // without it being an actual parameter list; backtrack if the braces
        // do not parse as one
        let arguments = if self.at(&TokenKind::LBrace) {
            let save = self.position;
            match self.actual_parameter_list() {
                Ok(arguments) => arguments,
                Err(_) => {
                    self.position = save;
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        Ok((
            ast::TypeKind::Reference {
                module,
                name,
                arguments,
            },
            Vec::new(),
        ))
    }

    fn actual_parameter_list(&mut self) -> Result<Vec<ast::Argument>, SyntaxError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut arguments = Vec::new();
        loop {
            arguments.push(self.actual_parameter()?);
            if !self.take(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(arguments)
    }

    fn actual_parameter(&mut self) -> Result<ast::Argument, SyntaxError> {
        match self.peek() {
            Some(TokenKind::Number(_))
            | Some(TokenKind::Real(_))
            | Some(TokenKind::CString(_))
            | Some(TokenKind::BString(_))
            | Some(TokenKind::HString(..))
            | Some(TokenKind::LBrace) => Ok(ast::Argument::Value(self.parse_value()?)),
            Some(TokenKind::TypeReference(word)) => match word.as_str() {
                "TRUE" | "FALSE" | "PLUS-INFINITY" | "MINUS-INFINITY" | "NOT-A-NUMBER" => {
                    Ok(ast::Argument::Value(self.parse_value()?))
                }
                _ => Ok(ast::Argument::Type(self.parse_type()?)),
            },
            Some(TokenKind::Identifier(_)) => {
                if self.peek_at(1) == Some(&TokenKind::LessThan) {
                    Ok(ast::Argument::Type(self.parse_type()?))
                } else {
                    Ok(ast::Argument::Value(self.parse_value()?))
                }
            }
            Some(TokenKind::LBracket) => Ok(ast::Argument::Type(self.parse_type()?)),
            _ => Err(self.expected("an actual parameter")),
        }
    }

    fn enumeration(&mut self) -> Result<ast::TypeKind, SyntaxError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut root = Vec::new();
        let mut extensions = Vec::new();
        let mut extensible = false;
        loop {
            if self.take(&TokenKind::Ellipsis) {
                if extensible {
                    return Err(self.error_at_current(
                        "an ENUMERATED may carry a single extension marker".to_owned(),
                    ));
                }
                extensible = true;
            } else {
                let name = self.expect_identifier("an enumeration item")?;
                let value = if self.take(&TokenKind::LParen) {
                    let value = self.parse_value()?;
                    self.expect(TokenKind::RParen, "`)`")?;
                    Some(value)
                } else {
                    None
                };
                let item = ast::EnumerationItem { name, value };
                if extensible {
                    extensions.push(item);
                } else {
                    root.push(item);
                }
            }
            if !self.take(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(ast::TypeKind::Enumerated {
            root,
            extensible,
            extensions,
        })
    }

    /// Braces after `INTEGER`/`BIT STRING` are a named number list in type
    /// notation but belong to the value in `v BIT STRING ::= { ... }`;
    /// backtrack when they do not parse as named numbers.
    fn optional_named_number_list(&mut self) -> Vec<(String, ast::Value)> {
        if !self.at(&TokenKind::LBrace) {
            return Vec::new();
        }
        let save = self.position;
        match self.named_number_list() {
            Ok(named) => named,
            Err(_) => {
                self.position = save;
                Vec::new()
            }
        }
    }

    /// `{ a(1), b(two) }` lists on `INTEGER` and `BIT STRING`.
    fn named_number_list(&mut self) -> Result<Vec<(String, ast::Value)>, SyntaxError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut named = Vec::new();
        loop {
            let name = self.expect_identifier("a named number")?;
            self.expect(TokenKind::LParen, "`(`")?;
            let value = self.parse_value()?;
            self.expect(TokenKind::RParen, "`)`")?;
            named.push((name, value));
            if !self.take(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(named)
    }

    fn constructed_or_of(
        &mut self,
        is_set: bool,
    ) -> Result<(ast::TypeKind, Vec<ast::ElementSet>), SyntaxError> {
        use ast::TypeKind as K;
        self.position += 1; // SEQUENCE / SET

        if self.at(&TokenKind::LBrace) {
            let list = self.component_list(false)?;
            return Ok((if is_set { K::Set(list) } else { K::Sequence(list) }, Vec::new()));
        }

        // `SEQUENCE (SIZE (...)) OF T` attaches its constraints to the
        // aggregate, not the element.
        let mut constraints = Vec::new();
        while self.at(&TokenKind::LParen) {
            constraints.push(self.parse_constraint()?);
        }
        self.expect_keyword("OF")?;

        // `SEQUENCE OF name Type` names the element; the name carries no
        // meaning for encoding and is dropped.
        if matches!(self.peek(), Some(TokenKind::Identifier(_)))
            && self.peek_at(1) != Some(&TokenKind::LessThan)
        {
            self.position += 1;
        }

        let element = Box::new(self.parse_type()?);
        Ok((
            if is_set {
                K::SetOf(element)
            } else {
                K::SequenceOf(element)
            },
            constraints,
        ))
    }

    fn component_list(&mut self, is_choice: bool) -> Result<ast::ComponentList, SyntaxError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut list = ast::ComponentList::default();
        let mut zone = 0usize;

        if self.take(&TokenKind::RBrace) {
            return Ok(list);
        }

        loop {
            if self.take(&TokenKind::Ellipsis) {
                zone += 1;
                match zone {
                    1 => list.extensible = true,
                    2 => {}
                    _ => {
                        return Err(self
                            .error_at_current("too many extension markers".to_owned()))
                    }
                }
            } else if self.at(&TokenKind::LVersionBrackets) {
                if zone != 1 {
                    return Err(self.error_at_current(
                        "extension addition groups must follow the extension marker".to_owned(),
                    ));
                }
                list.additions.push(self.addition_group(is_choice)?);
            } else if !is_choice && self.at_keyword("COMPONENTS") {
                self.position += 1;
                self.expect_keyword("OF")?;
                let ty = self.parse_type()?;
                let component = ast::Component::ComponentsOf(ty);
                match zone {
                    0 => list.root.push(component),
                    2 => list.trailing.push(component),
                    _ => {
                        return Err(self.error_at_current(
                            "COMPONENTS OF cannot appear among extension additions".to_owned(),
                        ))
                    }
                }
            } else {
                let member = self.member(is_choice)?;
                match zone {
                    0 => list.root.push(ast::Component::Member(member)),
                    1 => list.additions.push(ast::Addition::Member(member)),
                    _ => list.trailing.push(ast::Component::Member(member)),
                }
            }
            if !self.take(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(list)
    }

    fn addition_group(&mut self, is_choice: bool) -> Result<ast::Addition, SyntaxError> {
        self.expect(TokenKind::LVersionBrackets, "`[[`")?;
        let version = match (self.peek().cloned(), self.peek_at(1)) {
            (Some(TokenKind::Number(value)), Some(TokenKind::Colon)) => {
                self.position += 2;
                value.to_u64()
            }
            _ => None,
        };
        let mut members = Vec::new();
        loop {
            members.push(self.member(is_choice)?);
            if !self.take(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RVersionBrackets, "`]]`")?;
        Ok(ast::Addition::Group { version, members })
    }

    fn member(&mut self, is_choice: bool) -> Result<ast::Member, SyntaxError> {
        let name = self.expect_identifier("a member name")?;
        let ty = self.parse_type()?;
        let mut optional = false;
        let mut default = None;
        if self.take_keyword("OPTIONAL") {
            optional = true;
        } else if self.take_keyword("DEFAULT") {
            default = Some(self.parse_value()?);
        }
        if is_choice && (optional || default.is_some()) {
            return Err(self.error_at_current(
                "CHOICE alternatives cannot be OPTIONAL or DEFAULT".to_owned(),
            ));
        }
        Ok(ast::Member {
            name,
            ty,
            optional,
            default,
        })
    }

    // Constraints

    fn parse_constraint(&mut self) -> Result<ast::ElementSet, SyntaxError> {
        self.expect(TokenKind::LParen, "`(`")?;
        let set = self.element_set_specs()?;
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(set)
    }

    fn element_set_specs(&mut self) -> Result<ast::ElementSet, SyntaxError> {
        let mut root = None;
        let mut extensible = false;
        let mut extension = None;

        if self.take(&TokenKind::Ellipsis) {
            extensible = true;
        } else {
            root = Some(self.element_set_spec()?);
            if self.take(&TokenKind::Comma) {
                self.expect(TokenKind::Ellipsis, "`...`")?;
                extensible = true;
            }
        }
        if extensible && self.take(&TokenKind::Comma) {
            extension = Some(self.element_set_spec()?);
        }

        Ok(ast::ElementSet {
            root,
            extensible,
            extension,
        })
    }

    fn element_set_spec(&mut self) -> Result<ast::Element, SyntaxError> {
        if self.take_keyword("ALL") {
            self.expect_keyword("EXCEPT")?;
            let excluded = self.elements()?;
            return Ok(ast::Element::Except {
                base: Box::new(ast::Element::All),
                excluded: Box::new(excluded),
            });
        }
        self.unions()
    }

    fn unions(&mut self) -> Result<ast::Element, SyntaxError> {
        let first = self.intersections()?;
        if !(self.at(&TokenKind::Pipe) || self.at_keyword("UNION")) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.take(&TokenKind::Pipe) || self.take_keyword("UNION") {
            items.push(self.intersections()?);
        }
        Ok(ast::Element::Union(items))
    }

    fn intersections(&mut self) -> Result<ast::Element, SyntaxError> {
        let first = self.intersection_elements()?;
        if !(self.at(&TokenKind::Caret) || self.at_keyword("INTERSECTION")) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.take(&TokenKind::Caret) || self.take_keyword("INTERSECTION") {
            items.push(self.intersection_elements()?);
        }
        Ok(ast::Element::Intersection(items))
    }

    fn intersection_elements(&mut self) -> Result<ast::Element, SyntaxError> {
        let base = self.elements()?;
        if self.take_keyword("EXCEPT") {
            let excluded = self.elements()?;
            return Ok(ast::Element::Except {
                base: Box::new(base),
                excluded: Box::new(excluded),
            });
        }
        Ok(base)
    }

    fn elements(&mut self) -> Result<ast::Element, SyntaxError> {
        if self.take(&TokenKind::LParen) {
            let inner = self.element_set_spec()?;
            self.expect(TokenKind::RParen, "`)`")?;
            return Ok(inner);
        }
        if self.at_keyword("SIZE") {
            self.position += 1;
            let inner = self.parse_constraint()?;
            return Ok(ast::Element::Size(Box::new(inner)));
        }
        if self.at_keyword("FROM") {
            self.position += 1;
            let inner = self.parse_constraint()?;
            return Ok(ast::Element::From(Box::new(inner)));
        }
        if self.at_keyword("CONTAINING") {
            self.position += 1;
            let ty = self.parse_type()?;
            if self.take_keyword("ENCODED") {
                self.expect_keyword("BY")?;
                self.parse_value()?;
            }
            return Ok(ast::Element::Containing(Box::new(ty)));
        }
        if self.at_keyword("ENCODED") {
            self.position += 1;
            self.expect_keyword("BY")?;
            self.parse_value()?;
            // an encoding prescription alone constrains nothing we model
            return Ok(ast::Element::All);
        }
        if self.at_keyword("WITH") {
            self.position += 1;
            if self.take_keyword("COMPONENT") {
                let inner = self.parse_constraint()?;
                return Ok(ast::Element::WithComponent(Box::new(inner)));
            }
            self.expect_keyword("COMPONENTS")?;
            return self.with_components();
        }
        if self.at_keyword("INCLUDES") {
            self.position += 1;
            let ty = self.parse_type()?;
            return Ok(ast::Element::TypeConstraint(Box::new(ty)));
        }
        if self.at_keyword("PATTERN") {
            self.position += 1;
            // the pattern itself is not modeled
            self.parse_value()?;
            return Ok(ast::Element::All);
        }

        // Value endpoints and contained subtypes.
        match self.peek() {
            Some(TokenKind::TypeReference(word)) => match word.as_str() {
                "MIN" | "TRUE" | "FALSE" | "NULL" | "PLUS-INFINITY" | "MINUS-INFINITY"
                | "NOT-A-NUMBER" => self.value_or_range(),
                _ => {
                    let ty = self.parse_type()?;
                    Ok(ast::Element::TypeConstraint(Box::new(ty)))
                }
            },
            _ => self.value_or_range(),
        }
    }

    fn value_or_range(&mut self) -> Result<ast::Element, SyntaxError> {
        let start = if self.take_keyword("MIN") {
            ast::RangeEndpoint::Min
        } else {
            ast::RangeEndpoint::Closed(self.parse_value()?)
        };
        let start = if self.take(&TokenKind::LessThan) {
            match start {
                ast::RangeEndpoint::Closed(value) => ast::RangeEndpoint::Open(value),
                other => other,
            }
        } else {
            start
        };

        if self.take(&TokenKind::Range) {
            let open = self.take(&TokenKind::LessThan);
            let end = if self.take_keyword("MAX") {
                ast::RangeEndpoint::Max
            } else {
                let value = self.parse_value()?;
                if open {
                    ast::RangeEndpoint::Open(value)
                } else {
                    ast::RangeEndpoint::Closed(value)
                }
            };
            return Ok(ast::Element::Range { start, end });
        }

        match start {
            ast::RangeEndpoint::Closed(value) => Ok(ast::Element::SingleValue(value)),
            _ => Err(self.expected("`..`")),
        }
    }

    fn with_components(&mut self) -> Result<ast::Element, SyntaxError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut partial = false;
        if self.take(&TokenKind::Ellipsis) {
            partial = true;
            if !self.take(&TokenKind::Comma) {
                self.expect(TokenKind::RBrace, "`}`")?;
                return Ok(ast::Element::WithComponents {
                    partial,
                    components: Vec::new(),
                });
            }
        }
        let mut components = Vec::new();
        loop {
            let name = self.expect_identifier("a component name")?;
            let constraint = if self.at(&TokenKind::LParen) {
                Some(self.parse_constraint()?)
            } else {
                None
            };
            let presence = if self.take_keyword("PRESENT") {
                Some(ast::Presence::Present)
            } else if self.take_keyword("ABSENT") {
                Some(ast::Presence::Absent)
            } else if self.take_keyword("OPTIONAL") {
                Some(ast::Presence::Optional)
            } else {
                None
            };
            components.push((name, ast::ComponentConstraint { constraint, presence }));
            if !self.take(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(ast::Element::WithComponents {
            partial,
            components,
        })
    }

    // Values

    fn parse_value(&mut self) -> Result<ast::Value, SyntaxError> {
        let Some(kind) = self.peek().cloned() else {
            return Err(self.expected("a value"));
        };
        match kind {
            TokenKind::Number(value) => {
                self.position += 1;
                Ok(ast::Value::Integer(value))
            }
            TokenKind::Real(value) => {
                self.position += 1;
                Ok(ast::Value::Real(value))
            }
            TokenKind::CString(text) => {
                self.position += 1;
                Ok(ast::Value::Text(text))
            }
            TokenKind::BString(bits) => {
                self.position += 1;
                Ok(ast::Value::BitsLiteral(bits))
            }
            TokenKind::HString(bytes, bits) => {
                self.position += 1;
                Ok(ast::Value::HexLiteral(bytes, bits))
            }
            TokenKind::TypeReference(word) => match word.as_str() {
                "TRUE" => {
                    self.position += 1;
                    Ok(ast::Value::Boolean(true))
                }
                "FALSE" => {
                    self.position += 1;
                    Ok(ast::Value::Boolean(false))
                }
                "NULL" => {
                    self.position += 1;
                    Ok(ast::Value::Null)
                }
                "PLUS-INFINITY" => {
                    self.position += 1;
                    Ok(ast::Value::PlusInfinity)
                }
                "MINUS-INFINITY" => {
                    self.position += 1;
                    Ok(ast::Value::MinusInfinity)
                }
                "NOT-A-NUMBER" => {
                    self.position += 1;
                    Ok(ast::Value::NotANumber)
                }
                _ => Err(self.expected("a value")),
            },
            TokenKind::Identifier(name) => {
                self.position += 1;
                if self.take(&TokenKind::Colon) {
                    let inner = self.parse_value()?;
                    Ok(ast::Value::Choice(name, Box::new(inner)))
                } else {
                    Ok(ast::Value::Reference(name))
                }
            }
            TokenKind::LBrace => self.braced_value(),
            _ => Err(self.expected("a value")),
        }
    }

    /// Braces are ambiguous in value notation: `{ a 5, b TRUE }` is a
    /// sequence value, `{ 1, 2 }` a list, `{ iso(1) 2 }` an object
    /// identifier. Try each in turn with backtracking; the resolver
    /// re-interprets against the expected type.
    fn braced_value(&mut self) -> Result<ast::Value, SyntaxError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        if self.take(&TokenKind::RBrace) {
            return Ok(ast::Value::EmptyBraces);
        }
        let save = self.position;

        let named_candidate = matches!(self.peek(), Some(TokenKind::Identifier(_)))
            && !matches!(
                self.peek_at(1),
                Some(TokenKind::LParen)
                    | Some(TokenKind::Comma)
                    | Some(TokenKind::RBrace)
                    | None
            );
        if named_candidate {
            if let Some(named) = self.try_named_list() {
                return Ok(ast::Value::NamedList(named));
            }
            self.position = save;
        }

        if let Some(values) = self.try_value_list() {
            return Ok(ast::Value::List(values));
        }
        self.position = save;

        let arcs = self.oid_arcs()?;
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(ast::Value::OidComponents(arcs))
    }

    fn try_named_list(&mut self) -> Option<Vec<(String, ast::Value)>> {
        let mut named = Vec::new();
        loop {
            let name = match self.peek() {
                Some(TokenKind::Identifier(name)) => name.clone(),
                _ => return None,
            };
            self.position += 1;
            let value = self.parse_value().ok()?;
            named.push((name, value));
            if self.take(&TokenKind::Comma) {
                continue;
            }
            if self.take(&TokenKind::RBrace) {
                return Some(named);
            }
            return None;
        }
    }

    fn try_value_list(&mut self) -> Option<Vec<ast::Value>> {
        let mut values = Vec::new();
        loop {
            values.push(self.parse_value().ok()?);
            if self.take(&TokenKind::Comma) {
                continue;
            }
            if self.take(&TokenKind::RBrace) {
                return Some(values);
            }
            return None;
        }
    }

    fn oid_value(&mut self) -> Result<Vec<ast::OidArc>, SyntaxError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let arcs = self.oid_arcs()?;
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(arcs)
    }

    fn oid_arcs(&mut self) -> Result<Vec<ast::OidArc>, SyntaxError> {
        let mut arcs = Vec::new();
        loop {
            match self.peek().cloned() {
                Some(TokenKind::Number(value)) => {
                    self.position += 1;
                    let number = value
                        .to_u32()
                        .ok_or_else(|| self.error_at_current("arc out of range".to_owned()))?;
                    arcs.push(ast::OidArc {
                        name: None,
                        number: Some(number),
                    });
                }
                Some(TokenKind::Identifier(name)) => {
                    self.position += 1;
                    let number = if self.take(&TokenKind::LParen) {
                        let number = match self.bump() {
                            Some(TokenKind::Number(value)) => value.to_u32().ok_or_else(|| {
                                self.error_at_current("arc out of range".to_owned())
                            })?,
                            _ => return Err(self.expected("an arc number")),
                        };
                        self.expect(TokenKind::RParen, "`)`")?;
                        Some(number)
                    } else {
                        None
                    };
                    arcs.push(ast::OidArc {
                        name: Some(name),
                        number,
                    });
                }
                _ => break,
            }
        }
        if arcs.is_empty() {
            return Err(self.expected("an object identifier component"));
        }
        Ok(arcs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn parse_one(source: &str) -> ast::Module {
        let mut modules = parse("test", source).unwrap();
        assert_eq!(modules.len(), 1);
        modules.remove(0)
    }

    #[test]
    fn minimal_module() {
        let module = parse_one("M DEFINITIONS ::= BEGIN A ::= BOOLEAN END");
        assert_eq!(module.name, "M");
        assert_eq!(module.tagging, ast::TagMode::Explicit);
        assert_eq!(module.assignments.len(), 1);
        match &module.assignments[0] {
            ast::Assignment::Type(assignment) => {
                assert_eq!(assignment.name, "A");
                assert_eq!(assignment.ty.kind, ast::TypeKind::Boolean);
            }
            other => panic!("expected type assignment, got {other:?}"),
        }
    }

    #[test]
    fn automatic_tags_and_extensibility() {
        let module = parse_one(
            "M DEFINITIONS AUTOMATIC TAGS EXTENSIBILITY IMPLIED ::= BEGIN END",
        );
        assert_eq!(module.tagging, ast::TagMode::Automatic);
        assert!(module.extensibility_implied);
    }

    #[test]
    fn imports_and_exports() {
        let module = parse_one(
            "M DEFINITIONS ::= BEGIN \
             EXPORTS A, b; \
             IMPORTS C, d FROM Other E FROM Third; \
             A ::= BOOLEAN \
             END",
        );
        assert_eq!(module.exports, Some(vec!["A".to_owned(), "b".to_owned()]));
        assert_eq!(module.imports.len(), 2);
        assert_eq!(module.imports[0].module, "Other");
        assert_eq!(module.imports[0].symbols, vec!["C", "d"]);
        assert_eq!(module.imports[1].module, "Third");
    }

    #[test]
    fn sequence_with_markers() {
        let module = parse_one(
            "M DEFINITIONS ::= BEGIN \
             S ::= SEQUENCE { a INTEGER, b BOOLEAN OPTIONAL, ..., c IA5String, \
             [[ d NULL, e INTEGER DEFAULT 5 ]] } \
             END",
        );
        let ast::Assignment::Type(assignment) = &module.assignments[0] else {
            panic!()
        };
        let ast::TypeKind::Sequence(list) = &assignment.ty.kind else {
            panic!()
        };
        assert_eq!(list.root.len(), 2);
        assert!(list.extensible);
        assert_eq!(list.additions.len(), 2);
        match &list.additions[1] {
            ast::Addition::Group { members, .. } => {
                assert_eq!(members.len(), 2);
                assert_eq!(members[1].default, Some(ast::Value::Integer(BigInt::from(5))));
            }
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[test]
    fn sequence_of_with_size() {
        let module = parse_one(
            "M DEFINITIONS ::= BEGIN L ::= SEQUENCE (SIZE (1..10)) OF INTEGER END",
        );
        let ast::Assignment::Type(assignment) = &module.assignments[0] else {
            panic!()
        };
        assert!(matches!(
            assignment.ty.kind,
            ast::TypeKind::SequenceOf(_)
        ));
        assert_eq!(assignment.ty.constraints.len(), 1);
    }

    #[test]
    fn constraints_with_extension() {
        let module = parse_one("M DEFINITIONS ::= BEGIN I ::= INTEGER (0..7, ..., 8..15) END");
        let ast::Assignment::Type(assignment) = &module.assignments[0] else {
            panic!()
        };
        let set = &assignment.ty.constraints[0];
        assert!(set.extensible);
        assert!(set.root.is_some());
        assert!(set.extension.is_some());
    }

    #[test]
    fn union_and_intersection_precedence() {
        let module = parse_one("M DEFINITIONS ::= BEGIN I ::= INTEGER (0 | 5..9 ^ 7..20) END");
        let ast::Assignment::Type(assignment) = &module.assignments[0] else {
            panic!()
        };
        match assignment.ty.constraints[0].root.as_ref().unwrap() {
            ast::Element::Union(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1], ast::Element::Intersection(_)));
            }
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn parameterized_assignment_and_reference() {
        let module = parse_one(
            "M DEFINITIONS ::= BEGIN \
             A { B, INTEGER : max } ::= SEQUENCE { a B, n INTEGER (0..max) } \
             C ::= A { IA5String, 10 } \
             END",
        );
        let ast::Assignment::Type(template) = &module.assignments[0] else {
            panic!()
        };
        assert_eq!(template.parameters.len(), 2);
        assert!(template.parameters[0].governor.is_none());
        assert!(template.parameters[1].governor.is_some());

        let ast::Assignment::Type(usage) = &module.assignments[1] else {
            panic!()
        };
        let ast::TypeKind::Reference { name, arguments, .. } = &usage.ty.kind else {
            panic!()
        };
        assert_eq!(name, "A");
        assert_eq!(arguments.len(), 2);
        assert!(matches!(arguments[0], ast::Argument::Type(_)));
        assert!(matches!(arguments[1], ast::Argument::Value(_)));
    }

    #[test]
    fn value_assignments() {
        let module = parse_one(
            "M DEFINITIONS ::= BEGIN \
             max INTEGER ::= 42 \
             oid OBJECT IDENTIFIER ::= { iso(1) standard(0) 8571 } \
             pair Pair ::= { a 5, b TRUE } \
             list List ::= { 1, 2, 3 } \
             END",
        );
        assert_eq!(module.assignments.len(), 4);
        let ast::Assignment::Value(oid) = &module.assignments[1] else {
            panic!()
        };
        match &oid.value {
            ast::Value::OidComponents(arcs) => assert_eq!(arcs.len(), 3),
            other => panic!("expected oid, got {other:?}"),
        }
        let ast::Assignment::Value(pair) = &module.assignments[2] else {
            panic!()
        };
        assert!(matches!(&pair.value, ast::Value::NamedList(items) if items.len() == 2));
        let ast::Assignment::Value(list) = &module.assignments[3] else {
            panic!()
        };
        assert!(matches!(&list.value, ast::Value::List(items) if items.len() == 3));
    }

    #[test]
    fn tagged_types() {
        let module = parse_one(
            "M DEFINITIONS ::= BEGIN \
             A ::= [5] EXPLICIT INTEGER \
             B ::= [APPLICATION 2] IMPLICIT OCTET STRING \
             END",
        );
        let ast::Assignment::Type(a) = &module.assignments[0] else {
            panic!()
        };
        let tag = a.ty.tag.as_ref().unwrap();
        assert_eq!(tag.class, Class::Context);
        assert_eq!(tag.kind, Some(ast::TagKind::Explicit));

        let ast::Assignment::Type(b) = &module.assignments[1] else {
            panic!()
        };
        let tag = b.ty.tag.as_ref().unwrap();
        assert_eq!(tag.class, Class::Application);
        assert_eq!(tag.kind, Some(ast::TagKind::Implicit));
    }

    #[test]
    fn choice_values_and_selection() {
        let module = parse_one(
            "M DEFINITIONS ::= BEGIN \
             C ::= CHOICE { a INTEGER, b BOOLEAN } \
             v C ::= b : TRUE \
             S ::= a < C \
             END",
        );
        let ast::Assignment::Value(v) = &module.assignments[1] else {
            panic!()
        };
        assert!(matches!(&v.value, ast::Value::Choice(name, _) if name == "b"));
        let ast::Assignment::Type(s) = &module.assignments[2] else {
            panic!()
        };
        assert!(matches!(&s.ty.kind, ast::TypeKind::Selection { .. }));
    }

    #[test]
    fn syntax_error_carries_position() {
        let error = parse("test", "M DEFINITIONS ::= BEGIN\nA ::= SEQUENCE { a }\nEND")
            .unwrap_err();
        assert_eq!(error.line, 2);
        assert!(error.message.contains("expected"));
    }

    #[test]
    fn with_components_constraint() {
        let module = parse_one(
            "M DEFINITIONS ::= BEGIN \
             S ::= SEQUENCE { a INTEGER, b BOOLEAN OPTIONAL } \
             T ::= S (WITH COMPONENTS { ..., b PRESENT }) \
             END",
        );
        let ast::Assignment::Type(t) = &module.assignments[1] else {
            panic!()
        };
        match t.ty.constraints[0].root.as_ref().unwrap() {
            ast::Element::WithComponents { partial, components } => {
                assert!(partial);
                assert_eq!(components.len(), 1);
                assert_eq!(components[0].1.presence, Some(ast::Presence::Present));
            }
            other => panic!("expected WITH COMPONENTS, got {other:?}"),
        }
    }
}
