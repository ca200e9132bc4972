//! Reducing parsed modules to the finalized type model.
//!
//! The resolver performs, in order: import binding, automatic tag
//! assignment, parameter instantiation, reference resolution, constraint
//! merging, default-value folding, and the structural checks (tag
//! uniqueness, recursion legality). Types land in the [`TypeModel`] arena;
//! recursion is supported by reserving a node's slot before its body is
//! resolved, so cyclic edges hold indices into slots that are filled by the
//! time resolution returns.

use std::collections::{BTreeMap, BTreeSet};

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::ast;
use crate::error::{ResolveError, ResolveErrorKind};
use crate::module::ModuleTable;
use crate::types::{
    constraints, date, Bounded, ChoiceType, Class, Constraint, ConstructedType, Constraints,
    EnumItem, Enumeration, Extensible, Hints, IntegerWidth, Member, PermittedAlphabet, StringKind,
    Tag, TimeKind, TypeIndex, TypeKind, TypeModel, TypeNode, Variant,
};
use crate::value::Value;

const MAX_INSTANTIATION_DEPTH: usize = 64;
const MAX_VALUE_CHAIN: usize = 32;

/// Resolves every non-parameterized type assignment of every module and
/// returns the frozen model. The first error aborts.
pub(crate) fn resolve(table: &ModuleTable) -> Result<TypeModel, ResolveError> {
    run(table, false).map(|(model, _)| model)
}

/// Lint mode: keeps resolving past per-assignment errors and returns every
/// diagnostic collected.
pub(crate) fn lint(table: &ModuleTable) -> Vec<ResolveError> {
    match run(table, true) {
        Ok((_, diagnostics)) => diagnostics,
        Err(error) => vec![error],
    }
}

fn run(
    table: &ModuleTable,
    lenient: bool,
) -> Result<(TypeModel, Vec<ResolveError>), ResolveError> {
    let mut resolver = Resolver::new(table);

    for module in table.modules() {
        for assignment in &module.assignments {
            let ast::Assignment::Type(assignment) = assignment else {
                continue;
            };
            if !assignment.parameters.is_empty() {
                // templates are instantiated at their points of use
                continue;
            }
            resolver.scope = (module.name.clone(), assignment.name.clone());
            let resolved =
                resolver.resolve_symbol(module, &Env::default(), None, &assignment.name, &[]);
            let resolved = resolved.and_then(|index| {
                resolver.apply_pending()?;
                Ok(index)
            });
            match resolved {
                Ok(index) => {
                    resolver.model.export(assignment.name.clone(), index);
                    resolver
                        .model
                        .export(format!("{}.{}", module.name, assignment.name), index);
                }
                Err(error) if lenient => resolver.diagnostics.push(error),
                Err(error) => return Err(error),
            }
        }
    }

    let checks = resolver.check_structure();
    if lenient {
        resolver.diagnostics.extend(checks);
    } else if let Some(error) = checks.into_iter().next() {
        return Err(error);
    }

    Ok((resolver.model, resolver.diagnostics))
}

/// The substitution environment of a parameterized-type instantiation.
/// Formal type parameters map to already-resolved nodes of the caller, which
/// keeps substitution hygienic; value parameters map to literal values.
#[derive(Debug, Clone, Default)]
struct Env {
    types: BTreeMap<String, TypeIndex>,
    values: BTreeMap<String, ast::Value>,
}

#[derive(Debug, Clone, Copy)]
enum MemoState {
    Resolving(TypeIndex),
    Done(TypeIndex),
}

/// A resolved `[class number]` prefix with its effective explicit/implicit
/// kind.
#[derive(Debug, Clone, Copy)]
struct Prefix {
    class: Class,
    number: u32,
    kind: ast::TagKind,
}

/// A tag/constraint application deferred because its target was still being
/// resolved (recursion); applied once the target's slot is filled.
#[derive(Debug)]
struct Pending {
    index: TypeIndex,
    target: TypeIndex,
    prefix: Option<Prefix>,
    constraints: Constraints,
    name: String,
    scope: (String, String),
}

/// Constraint channels gathered from one element set.
#[derive(Debug, Default)]
struct Collected {
    value: Option<Bounded<i128>>,
    size: Option<Bounded<usize>>,
    size_extensible: bool,
    size_extension: Option<Bounded<usize>>,
    alphabet: Option<Vec<u32>>,
    alphabet_extensible: bool,
    alphabet_extension: Option<Vec<u32>>,
}

struct Resolver<'table> {
    table: &'table ModuleTable,
    model: TypeModel,
    memo: BTreeMap<(String, String, String), MemoState>,
    unfilled: BTreeSet<TypeIndex>,
    pending: Vec<Pending>,
    /// (module, assignment) scope per arena slot, for structural check
    /// diagnostics.
    scopes: Vec<(String, String)>,
    scope: (String, String),
    instantiation_depth: usize,
    diagnostics: Vec<ResolveError>,
}

impl<'table> Resolver<'table> {
    fn new(table: &'table ModuleTable) -> Self {
        Self {
            table,
            model: TypeModel::default(),
            memo: BTreeMap::new(),
            unfilled: BTreeSet::new(),
            pending: Vec::new(),
            scopes: Vec::new(),
            scope: (String::new(), String::new()),
            instantiation_depth: 0,
            diagnostics: Vec::new(),
        }
    }

    fn err(&self, kind: ResolveErrorKind) -> ResolveError {
        ResolveError::new(kind, &self.scope.0, &self.scope.1)
    }

    fn reserve(&mut self, name: &str) -> TypeIndex {
        let index = self.model.reserve(name);
        self.scopes.push(self.scope.clone());
        self.unfilled.insert(index);
        index
    }

    fn fill(&mut self, index: TypeIndex, node: TypeNode) {
        self.model.fill(index, node);
        self.unfilled.remove(&index);
    }

    fn push_node(&mut self, node: TypeNode) -> TypeIndex {
        let index = self.model.reserve(&node.name);
        self.scopes.push(self.scope.clone());
        self.model.fill(index, node);
        index
    }

    // Symbol resolution and instantiation

    fn resolve_symbol(
        &mut self,
        module: &ast::Module,
        env: &Env,
        qualifier: Option<&str>,
        name: &str,
        arguments: &[ast::Argument],
    ) -> Result<TypeIndex, ResolveError> {
        if qualifier.is_none() && arguments.is_empty() {
            if let Some(&index) = env.types.get(name) {
                return Ok(index);
            }
        }

        let search_in = qualifier.unwrap_or(&module.name);
        let (definition, assignment) = self
            .table
            .lookup(search_in, name)
            .map_err(|kind| self.err(kind))?;

        let assignment = match assignment {
            ast::Assignment::Type(assignment) => assignment,
            ast::Assignment::Value(_) => {
                return Err(self.err(ResolveErrorKind::TypeMismatch {
                    expected: "a type reference".to_owned(),
                    found: format!("the value `{name}`"),
                }))
            }
        };

        if assignment.parameters.len() != arguments.len() {
            return Err(self.err(ResolveErrorKind::ParameterCount {
                template: name.to_owned(),
                expected: assignment.parameters.len(),
                actual: arguments.len(),
            }));
        }

        let (body_env, signature) = if arguments.is_empty() {
            (Env::default(), String::new())
        } else {
            self.bind_parameters(module, env, assignment, arguments)?
        };

        let key = (
            definition.name.clone(),
            assignment.name.clone(),
            signature,
        );
        match self.memo.get(&key) {
            Some(MemoState::Done(index)) | Some(MemoState::Resolving(index)) => {
                return Ok(*index)
            }
            None => {}
        }

        if !arguments.is_empty() {
            self.instantiation_depth += 1;
            if self.instantiation_depth > MAX_INSTANTIATION_DEPTH {
                self.instantiation_depth -= 1;
                return Err(self.err(ResolveErrorKind::CyclicInstantiation {
                    template: name.to_owned(),
                }));
            }
        }

        let placeholder = self.reserve(&assignment.name);
        self.memo.insert(key.clone(), MemoState::Resolving(placeholder));

        let saved_scope = std::mem::replace(
            &mut self.scope,
            (definition.name.clone(), assignment.name.clone()),
        );
        let body = self.resolve_type(&assignment.ty, definition, &body_env, &assignment.name);
        self.scope = saved_scope;
        if !arguments.is_empty() {
            self.instantiation_depth -= 1;
        }

        let body = match body {
            Ok(body) => body,
            Err(error) => {
                // leave a hollow slot behind so lint mode can continue
                let node = TypeNode {
                    name: assignment.name.clone(),
                    tags: Vec::new(),
                    kind: TypeKind::Null,
                    constraints: Constraints::none(),
                    hints: Hints::default(),
                };
                self.fill(placeholder, node);
                self.memo.insert(key, MemoState::Done(placeholder));
                return Err(error);
            }
        };

        if body == placeholder {
            return Err(self.err(ResolveErrorKind::RecursiveType {
                reference: assignment.name.clone(),
            }));
        }

        if self.unfilled.contains(&body) {
            // the body is an alias of something still being resolved higher
            // on the stack; alias it directly and retire the placeholder
            self.fill(
                placeholder,
                TypeNode {
                    name: assignment.name.clone(),
                    tags: Vec::new(),
                    kind: TypeKind::Null,
                    constraints: Constraints::none(),
                    hints: Hints::default(),
                },
            );
            self.memo.insert(key, MemoState::Done(body));
            Ok(body)
        } else {
            let node = self.model.node(body).clone();
            self.fill(placeholder, node);
            self.memo.insert(key, MemoState::Done(placeholder));
            Ok(placeholder)
        }
    }

    fn bind_parameters(
        &mut self,
        module: &ast::Module,
        env: &Env,
        template: &ast::TypeAssignment,
        arguments: &[ast::Argument],
    ) -> Result<(Env, String), ResolveError> {
        let mut bound = Env::default();
        let mut signature = String::new();

        for (parameter, argument) in template.parameters.iter().zip(arguments) {
            if parameter.governor.is_none() {
                // a type parameter
                let index = match argument {
                    ast::Argument::Type(ty) => {
                        self.resolve_type(ty, module, env, &parameter.name)?
                    }
                    ast::Argument::Value(_) => {
                        return Err(self.err(ResolveErrorKind::TypeMismatch {
                            expected: format!("a type for parameter `{}`", parameter.name),
                            found: "a value".to_owned(),
                        }))
                    }
                };
                signature.push_str(&format!("T{};", index.0));
                bound.types.insert(parameter.name.clone(), index);
            } else {
                let value = match argument {
                    ast::Argument::Value(value) => self
                        .literalize(value, module, env, 0)
                        .map_err(|reason| {
                            self.err(ResolveErrorKind::UnknownReference { symbol: reason })
                        })?,
                    ast::Argument::Type(_) => {
                        return Err(self.err(ResolveErrorKind::TypeMismatch {
                            expected: format!("a value for parameter `{}`", parameter.name),
                            found: "a type".to_owned(),
                        }))
                    }
                };
                signature.push_str(&format!("{value:?};"));
                bound.values.insert(parameter.name.clone(), value);
            }
        }

        Ok((bound, signature))
    }

    // Type resolution

    fn resolve_type(
        &mut self,
        ty: &ast::Type,
        module: &ast::Module,
        env: &Env,
        name: &str,
    ) -> Result<TypeIndex, ResolveError> {
        let constraints = self.resolve_constraints(&ty.constraints, module, env)?;
        let prefix = match &ty.tag {
            Some(prefix) => Some(self.resolve_prefix(prefix, module, env)?),
            None => None,
        };

        match &ty.kind {
            ast::TypeKind::Reference {
                module: qualifier,
                name: symbol,
                arguments,
            } => {
                let target =
                    self.resolve_symbol(module, env, qualifier.as_deref(), symbol, arguments)?;
                self.derive(target, prefix, constraints, name)
            }
            ast::TypeKind::Prefixed(inner) => {
                let target = self.resolve_type(inner, module, env, name)?;
                self.derive(target, prefix, constraints, name)
            }
            ast::TypeKind::Selection { alternative, inner } => {
                let target = self.resolve_type(inner, module, env, name)?;
                if self.unfilled.contains(&target) {
                    return Err(self.err(ResolveErrorKind::RecursiveType {
                        reference: name.to_owned(),
                    }));
                }
                let TypeKind::Choice(choice) = &self.model.node(target).kind else {
                    return Err(self.err(ResolveErrorKind::TypeMismatch {
                        expected: "a CHOICE for the selection type".to_owned(),
                        found: describe_kind(&self.model.node(target).kind).to_owned(),
                    }));
                };
                let variant = choice.variant(alternative).ok_or_else(|| {
                    self.err(ResolveErrorKind::UnknownAlternative {
                        alternative: alternative.clone(),
                    })
                })?;
                let target = variant.ty;
                self.derive(target, prefix, constraints, name)
            }
            _ => {
                let (kind, tags) = self.lower_builtin(&ty.kind, module, env, name)?;
                let mut node = TypeNode {
                    name: name.to_owned(),
                    tags,
                    kind,
                    constraints,
                    hints: Hints::default(),
                };
                if let Some(prefix) = prefix {
                    node.tags = apply_prefix(&node, prefix);
                }
                node.hints = hints_for(&node);
                Ok(self.push_node(node))
            }
        }
    }

    /// Produces a node for `target` with a tag prefix and/or extra
    /// constraints applied, deferring when the target is mid-resolution.
    fn derive(
        &mut self,
        target: TypeIndex,
        prefix: Option<Prefix>,
        constraints: Constraints,
        name: &str,
    ) -> Result<TypeIndex, ResolveError> {
        if prefix.is_none() && constraints.is_empty() {
            return Ok(target);
        }
        if self.unfilled.contains(&target) {
            let index = self.reserve(name);
            self.pending.push(Pending {
                index,
                target,
                prefix,
                constraints,
                name: name.to_owned(),
                scope: self.scope.clone(),
            });
            return Ok(index);
        }

        let mut node = self.model.node(target).clone();
        node.name = name.to_owned();
        if let Some(prefix) = prefix {
            node.tags = apply_prefix(&node, prefix);
        }
        node.constraints = self
            .merge_constraints(node.constraints, constraints)
            .map_err(|kind| self.err(kind))?;
        node.hints = hints_for(&node);
        Ok(self.push_node(node))
    }

    fn apply_pending(&mut self) -> Result<(), ResolveError> {
        while !self.pending.is_empty() {
            let mut remaining = Vec::new();
            let mut progressed = false;
            for pending in std::mem::take(&mut self.pending) {
                if self.unfilled.contains(&pending.target) {
                    remaining.push(pending);
                    continue;
                }
                let mut node = self.model.node(pending.target).clone();
                node.name = pending.name.clone();
                if let Some(prefix) = pending.prefix {
                    node.tags = apply_prefix(&node, prefix);
                }
                node.constraints = self
                    .merge_constraints(node.constraints, pending.constraints)
                    .map_err(|kind| {
                        ResolveError::new(kind, &pending.scope.0, &pending.scope.1)
                    })?;
                node.hints = hints_for(&node);
                self.fill(pending.index, node);
                progressed = true;
            }
            self.pending = remaining;
            if !self.pending.is_empty() && !progressed {
                let stuck = &self.pending[0];
                return Err(ResolveError::new(
                    ResolveErrorKind::RecursiveType {
                        reference: stuck.name.clone(),
                    },
                    &stuck.scope.0,
                    &stuck.scope.1,
                ));
            }
        }
        Ok(())
    }

    fn resolve_prefix(
        &mut self,
        prefix: &ast::TagPrefix,
        module: &ast::Module,
        env: &Env,
    ) -> Result<Prefix, ResolveError> {
        let number = self
            .integer_value(&prefix.number, module, env, 0)
            .map_err(|reason| self.err(ResolveErrorKind::UnknownReference { symbol: reason }))?;
        let number = u32::try_from(number).map_err(|_| {
            self.err(ResolveErrorKind::InvalidConstraint {
                reason: format!("tag number {number} out of range"),
            })
        })?;
        let kind = match prefix.kind {
            Some(ast::TagKind::Explicit) => ast::TagKind::Explicit,
            Some(ast::TagKind::Implicit) => ast::TagKind::Implicit,
            None => match module.tagging {
                ast::TagMode::Explicit => ast::TagKind::Explicit,
                ast::TagMode::Implicit | ast::TagMode::Automatic => ast::TagKind::Implicit,
            },
        };
        Ok(Prefix {
            class: prefix.class,
            number,
            kind,
        })
    }

    // Builtin lowering

    fn lower_builtin(
        &mut self,
        kind: &ast::TypeKind,
        module: &ast::Module,
        env: &Env,
        name: &str,
    ) -> Result<(TypeKind, Vec<Tag>), ResolveError> {
        use ast::TypeKind as K;
        Ok(match kind {
            K::Boolean => (TypeKind::Boolean, vec![Tag::BOOL]),
            K::Integer { named } => {
                let mut resolved = Vec::new();
                for (item, value) in named {
                    let value = self
                        .integer_value(value, module, env, 0)
                        .map_err(|reason| {
                            self.err(ResolveErrorKind::UnknownReference { symbol: reason })
                        })?;
                    if resolved.iter().any(|(existing, _)| existing == item) {
                        return Err(self.err(ResolveErrorKind::DuplicateName {
                            duplicate: item.clone(),
                        }));
                    }
                    resolved.push((item.clone(), value));
                }
                (TypeKind::Integer(resolved), vec![Tag::INTEGER])
            }
            K::Real => (TypeKind::Real, vec![Tag::REAL]),
            K::Null => (TypeKind::Null, vec![Tag::NULL]),
            K::ObjectIdentifier => (TypeKind::ObjectIdentifier, vec![Tag::OBJECT_IDENTIFIER]),
            K::RelativeOid => (TypeKind::RelativeOid, vec![Tag::RELATIVE_OID]),
            K::ObjectDescriptor => (TypeKind::ObjectDescriptor, vec![Tag::OBJECT_DESCRIPTOR]),
            K::External => (self.build_external(), vec![Tag::EXTERNAL]),
            K::EmbeddedPdv => (self.build_embedded_pdv(), vec![Tag::EMBEDDED_PDV]),
            K::Any => (TypeKind::Any, Vec::new()),
            K::Enumerated {
                root,
                extensible,
                extensions,
            } => {
                let extensible = *extensible || module.extensibility_implied;
                let enumeration =
                    self.lower_enumeration(root, extensible, extensions, module, env)?;
                (TypeKind::Enumerated(enumeration), vec![Tag::ENUMERATED])
            }
            K::BitString { named } => {
                let mut resolved = Vec::new();
                for (item, value) in named {
                    let value = self
                        .integer_value(value, module, env, 0)
                        .map_err(|reason| {
                            self.err(ResolveErrorKind::UnknownReference { symbol: reason })
                        })?;
                    let position = u64::try_from(value).map_err(|_| {
                        self.err(ResolveErrorKind::InvalidConstraint {
                            reason: format!("named bit `{item}` has a negative position"),
                        })
                    })?;
                    resolved.push((item.clone(), position));
                }
                (TypeKind::BitString(resolved), vec![Tag::BIT_STRING])
            }
            K::OctetString => (TypeKind::OctetString, vec![Tag::OCTET_STRING]),
            K::CharacterString(kind) => (TypeKind::CharacterString(*kind), vec![kind.tag()]),
            K::Time(kind) => (TypeKind::Time(*kind), vec![kind.tag()]),
            K::Sequence(list) => {
                let constructed = self.lower_constructed(list, module, env, name)?;
                (TypeKind::Sequence(constructed), vec![Tag::SEQUENCE])
            }
            K::Set(list) => {
                let constructed = self.lower_constructed(list, module, env, name)?;
                (TypeKind::Set(constructed), vec![Tag::SET])
            }
            K::Choice(list) => {
                let choice = self.lower_choice(list, module, env, name)?;
                (TypeKind::Choice(choice), Vec::new())
            }
            K::SequenceOf(element) => {
                let element = self.resolve_type(element, module, env, &format!("{name}.element"))?;
                (TypeKind::SequenceOf(element), vec![Tag::SEQUENCE])
            }
            K::SetOf(element) => {
                let element = self.resolve_type(element, module, env, &format!("{name}.element"))?;
                (TypeKind::SetOf(element), vec![Tag::SET])
            }
            K::Reference { .. } | K::Selection { .. } | K::Prefixed(_) => {
                unreachable!("handled in resolve_type")
            }
        })
    }

    fn lower_enumeration(
        &mut self,
        root: &[ast::EnumerationItem],
        extensible: bool,
        extensions: &[ast::EnumerationItem],
        module: &ast::Module,
        env: &Env,
    ) -> Result<Enumeration, ResolveError> {
        let mut names = BTreeSet::new();
        let mut used = BTreeSet::new();

        // explicit numbers bind first, in both zones
        let mut explicit = BTreeMap::new();
        for item in root.iter().chain(extensions) {
            if !names.insert(item.name.clone()) {
                return Err(self.err(ResolveErrorKind::DuplicateName {
                    duplicate: item.name.clone(),
                }));
            }
            if let Some(value) = &item.value {
                let value = self
                    .integer_value(value, module, env, 0)
                    .map_err(|reason| {
                        self.err(ResolveErrorKind::UnknownReference { symbol: reason })
                    })?;
                let value = i64::try_from(value).map_err(|_| {
                    self.err(ResolveErrorKind::InvalidConstraint {
                        reason: format!("enumeration value for `{}` out of range", item.name),
                    })
                })?;
                if !used.insert(value) {
                    return Err(self.err(ResolveErrorKind::InvalidConstraint {
                        reason: format!("duplicate enumeration value {value}"),
                    }));
                }
                explicit.insert(item.name.clone(), value);
            }
        }

        // unnumbered root items take the smallest unused non-negative
        // number; unnumbered extension items must exceed every previous one
        let mut root_items: Vec<EnumItem> = root
            .iter()
            .map(|item| {
                let value = match explicit.get(&item.name) {
                    Some(&value) => value,
                    None => {
                        let mut candidate = 0i64;
                        while used.contains(&candidate) {
                            candidate += 1;
                        }
                        used.insert(candidate);
                        candidate
                    }
                };
                EnumItem {
                    name: item.name.clone(),
                    value,
                }
            })
            .collect();
        let extension_items: Vec<EnumItem> = extensions
            .iter()
            .map(|item| {
                let value = match explicit.get(&item.name) {
                    Some(&value) => value,
                    None => {
                        let candidate = used.iter().max().map_or(0, |max| max + 1);
                        used.insert(candidate);
                        candidate
                    }
                };
                EnumItem {
                    name: item.name.clone(),
                    value,
                }
            })
            .collect();

        // canonical order: PER indexes root items by value
        root_items.sort_by_key(|item| item.value);

        Ok(Enumeration {
            root: root_items,
            extensible,
            extensions: extension_items,
        })
    }

    fn lower_constructed(
        &mut self,
        list: &ast::ComponentList,
        module: &ast::Module,
        env: &Env,
        name: &str,
    ) -> Result<ConstructedType, ResolveError> {
        let extensible = list.extensible || module.extensibility_implied;
        let automatic = module.tagging == ast::TagMode::Automatic && !component_list_tagged(list);

        let mut members = Vec::new();
        for component in list.root.iter().chain(&list.trailing) {
            match component {
                ast::Component::Member(member) => {
                    members.push(self.lower_member(member, None, module, env, name)?);
                }
                ast::Component::ComponentsOf(ty) => {
                    self.splice_components_of(ty, module, env, name, &mut members)?;
                }
            }
        }

        let mut group = 0usize;
        for addition in &list.additions {
            match addition {
                ast::Addition::Member(member) => {
                    members.push(self.lower_member(member, Some(group), module, env, name)?);
                    group += 1;
                }
                ast::Addition::Group { members: items, .. } => {
                    for member in items {
                        members.push(self.lower_member(member, Some(group), module, env, name)?);
                    }
                    group += 1;
                }
            }
        }

        let mut seen = BTreeSet::new();
        for member in &members {
            if !seen.insert(member.name.clone()) {
                return Err(self.err(ResolveErrorKind::DuplicateName {
                    duplicate: member.name.clone(),
                }));
            }
        }

        if automatic {
            for (ordinal, member) in members.iter_mut().enumerate() {
                let prefix = Prefix {
                    class: Class::Context,
                    number: ordinal as u32,
                    kind: ast::TagKind::Implicit,
                };
                member.ty = self.derive(
                    member.ty,
                    Some(prefix),
                    Constraints::none(),
                    &format!("{name}.{}", member.name),
                )?;
            }
        }

        Ok(ConstructedType {
            members,
            extensible,
        })
    }

    fn splice_components_of(
        &mut self,
        ty: &ast::Type,
        module: &ast::Module,
        env: &Env,
        name: &str,
        members: &mut Vec<Member>,
    ) -> Result<(), ResolveError> {
        let source = self.resolve_type(ty, module, env, &format!("{name}.components"))?;
        if self.unfilled.contains(&source) {
            return Err(self.err(ResolveErrorKind::InvalidComponentsOf {
                found: "a recursive reference".to_owned(),
            }));
        }
        match &self.model.node(source).kind {
            TypeKind::Sequence(constructed) | TypeKind::Set(constructed) => {
                // only the extension root is copied
                let copied: Vec<Member> = constructed
                    .root_members()
                    .map(|member| Member {
                        extension_group: None,
                        ..member.clone()
                    })
                    .collect();
                members.extend(copied);
                Ok(())
            }
            other => Err(self.err(ResolveErrorKind::InvalidComponentsOf {
                found: describe_kind(other).to_owned(),
            })),
        }
    }

    fn lower_member(
        &mut self,
        member: &ast::Member,
        extension_group: Option<usize>,
        module: &ast::Module,
        env: &Env,
        parent: &str,
    ) -> Result<Member, ResolveError> {
        let hint = format!("{parent}.{}", member.name);
        let ty = self.resolve_type(&member.ty, module, env, &hint)?;
        let default = match &member.default {
            Some(value) => Some(self.resolve_value(value, ty, module, env, 0).map_err(
                |reason| {
                    self.err(ResolveErrorKind::InvalidDefault {
                        member: member.name.clone(),
                        reason,
                    })
                },
            )?),
            None => None,
        };
        Ok(Member {
            name: member.name.clone(),
            ty,
            optional: member.optional,
            default,
            extension_group,
        })
    }

    fn lower_choice(
        &mut self,
        list: &ast::ComponentList,
        module: &ast::Module,
        env: &Env,
        name: &str,
    ) -> Result<ChoiceType, ResolveError> {
        let extensible = list.extensible || module.extensibility_implied;
        let automatic = module.tagging == ast::TagMode::Automatic && !component_list_tagged(list);

        let mut variants = Vec::new();
        for component in list.root.iter().chain(&list.trailing) {
            let ast::Component::Member(member) = component else {
                return Err(self.err(ResolveErrorKind::InvalidComponentsOf {
                    found: "a CHOICE".to_owned(),
                }));
            };
            let ty = self.resolve_type(&member.ty, module, env, &format!("{name}.{}", member.name))?;
            variants.push(Variant {
                name: member.name.clone(),
                ty,
                extension: false,
            });
        }
        for addition in &list.additions {
            let members: Vec<&ast::Member> = match addition {
                ast::Addition::Member(member) => vec![member],
                ast::Addition::Group { members, .. } => members.iter().collect(),
            };
            for member in members {
                let ty =
                    self.resolve_type(&member.ty, module, env, &format!("{name}.{}", member.name))?;
                variants.push(Variant {
                    name: member.name.clone(),
                    ty,
                    extension: true,
                });
            }
        }

        let mut seen = BTreeSet::new();
        for variant in &variants {
            if !seen.insert(variant.name.clone()) {
                return Err(self.err(ResolveErrorKind::DuplicateName {
                    duplicate: variant.name.clone(),
                }));
            }
        }

        if automatic {
            for (ordinal, variant) in variants.iter_mut().enumerate() {
                let prefix = Prefix {
                    class: Class::Context,
                    number: ordinal as u32,
                    kind: ast::TagKind::Implicit,
                };
                variant.ty = self.derive(
                    variant.ty,
                    Some(prefix),
                    Constraints::none(),
                    &format!("{name}.{}", variant.name),
                )?;
            }
        }

        Ok(ChoiceType {
            variants,
            extensible,
        })
    }

    fn build_external(&mut self) -> TypeKind {
        let oid = self.push_simple("EXTERNAL.direct-reference", TypeKind::ObjectIdentifier);
        let indirect = self.push_simple("EXTERNAL.indirect-reference", TypeKind::Integer(Vec::new()));
        let descriptor =
            self.push_simple("EXTERNAL.data-value-descriptor", TypeKind::ObjectDescriptor);

        let single = self.push_tagged("EXTERNAL.single-ASN1-type", TypeKind::Any, 0);
        let octet = self.push_tagged("EXTERNAL.octet-aligned", TypeKind::OctetString, 1);
        let arbitrary = self.push_tagged("EXTERNAL.arbitrary", TypeKind::BitString(Vec::new()), 2);
        let encoding = self.push_node(TypeNode {
            name: "EXTERNAL.encoding".to_owned(),
            tags: Vec::new(),
            kind: TypeKind::Choice(ChoiceType {
                variants: vec![
                    Variant { name: "single-ASN1-type".to_owned(), ty: single, extension: false },
                    Variant { name: "octet-aligned".to_owned(), ty: octet, extension: false },
                    Variant { name: "arbitrary".to_owned(), ty: arbitrary, extension: false },
                ],
                extensible: false,
            }),
            constraints: Constraints::none(),
            hints: Hints::default(),
        });

        TypeKind::Sequence(ConstructedType {
            members: vec![
                Member {
                    name: "direct-reference".to_owned(),
                    ty: oid,
                    optional: true,
                    default: None,
                    extension_group: None,
                },
                Member {
                    name: "indirect-reference".to_owned(),
                    ty: indirect,
                    optional: true,
                    default: None,
                    extension_group: None,
                },
                Member {
                    name: "data-value-descriptor".to_owned(),
                    ty: descriptor,
                    optional: true,
                    default: None,
                    extension_group: None,
                },
                Member {
                    name: "encoding".to_owned(),
                    ty: encoding,
                    optional: false,
                    default: None,
                    extension_group: None,
                },
            ],
            extensible: false,
        })
    }

    fn build_embedded_pdv(&mut self) -> TypeKind {
        let abstract_oid = self.push_tagged("EMBEDDED PDV.abstract", TypeKind::ObjectIdentifier, 0);
        let transfer_oid = self.push_tagged("EMBEDDED PDV.transfer", TypeKind::ObjectIdentifier, 1);
        let syntaxes_seq = TypeKind::Sequence(ConstructedType {
            members: vec![
                Member {
                    name: "abstract".to_owned(),
                    ty: abstract_oid,
                    optional: false,
                    default: None,
                    extension_group: None,
                },
                Member {
                    name: "transfer".to_owned(),
                    ty: transfer_oid,
                    optional: false,
                    default: None,
                    extension_group: None,
                },
            ],
            extensible: false,
        });
        let syntaxes = self.push_tagged("EMBEDDED PDV.syntaxes", syntaxes_seq, 0);
        let syntax = self.push_tagged("EMBEDDED PDV.syntax", TypeKind::ObjectIdentifier, 1);
        let context_id =
            self.push_tagged("EMBEDDED PDV.presentation-context-id", TypeKind::Integer(Vec::new()), 2);

        let negotiation_id = self.push_tagged(
            "EMBEDDED PDV.context-negotiation.presentation-context-id",
            TypeKind::Integer(Vec::new()),
            0,
        );
        let negotiation_syntax = self.push_tagged(
            "EMBEDDED PDV.context-negotiation.transfer-syntax",
            TypeKind::ObjectIdentifier,
            1,
        );
        let negotiation_seq = TypeKind::Sequence(ConstructedType {
            members: vec![
                Member {
                    name: "presentation-context-id".to_owned(),
                    ty: negotiation_id,
                    optional: false,
                    default: None,
                    extension_group: None,
                },
                Member {
                    name: "transfer-syntax".to_owned(),
                    ty: negotiation_syntax,
                    optional: false,
                    default: None,
                    extension_group: None,
                },
            ],
            extensible: false,
        });
        let negotiation = self.push_tagged("EMBEDDED PDV.context-negotiation", negotiation_seq, 3);
        let transfer = self.push_tagged("EMBEDDED PDV.transfer-syntax", TypeKind::ObjectIdentifier, 4);
        let fixed = self.push_tagged("EMBEDDED PDV.fixed", TypeKind::Null, 5);

        let identification_choice = TypeKind::Choice(ChoiceType {
            variants: vec![
                Variant { name: "syntaxes".to_owned(), ty: syntaxes, extension: false },
                Variant { name: "syntax".to_owned(), ty: syntax, extension: false },
                Variant {
                    name: "presentation-context-id".to_owned(),
                    ty: context_id,
                    extension: false,
                },
                Variant {
                    name: "context-negotiation".to_owned(),
                    ty: negotiation,
                    extension: false,
                },
                Variant { name: "transfer-syntax".to_owned(), ty: transfer, extension: false },
                Variant { name: "fixed".to_owned(), ty: fixed, extension: false },
            ],
            extensible: false,
        });
        let identification = self.push_node(TypeNode {
            name: "EMBEDDED PDV.identification".to_owned(),
            // an implicit tag on an untagged CHOICE degrades to explicit
            tags: vec![Tag::new_context(0)],
            kind: identification_choice,
            constraints: Constraints::none(),
            hints: Hints::default(),
        });
        let data_value = self.push_tagged("EMBEDDED PDV.data-value", TypeKind::OctetString, 2);

        TypeKind::Sequence(ConstructedType {
            members: vec![
                Member {
                    name: "identification".to_owned(),
                    ty: identification,
                    optional: false,
                    default: None,
                    extension_group: None,
                },
                Member {
                    name: "data-value".to_owned(),
                    ty: data_value,
                    optional: false,
                    default: None,
                    extension_group: None,
                },
            ],
            extensible: false,
        })
    }

    fn push_simple(&mut self, name: &str, kind: TypeKind) -> TypeIndex {
        let tags = universal_tags(&kind);
        let mut node = TypeNode {
            name: name.to_owned(),
            tags,
            kind,
            constraints: Constraints::none(),
            hints: Hints::default(),
        };
        node.hints = hints_for(&node);
        self.push_node(node)
    }

    fn push_tagged(&mut self, name: &str, kind: TypeKind, context: u32) -> TypeIndex {
        let index = self.push_simple(name, kind);
        self.derive(
            index,
            Some(Prefix {
                class: Class::Context,
                number: context,
                kind: ast::TagKind::Implicit,
            }),
            Constraints::none(),
            name,
        )
        .expect("tagging a fresh builtin cannot fail")
    }

    // Constraints

    fn resolve_constraints(
        &mut self,
        sets: &[ast::ElementSet],
        module: &ast::Module,
        env: &Env,
    ) -> Result<Constraints, ResolveError> {
        let mut result = Constraints::none();
        for set in sets {
            let built = self.resolve_element_set(set, module, env)?;
            result = self
                .merge_constraints(result, built)
                .map_err(|kind| self.err(kind))?;
        }
        Ok(result)
    }

    fn resolve_element_set(
        &mut self,
        set: &ast::ElementSet,
        module: &ast::Module,
        env: &Env,
    ) -> Result<Constraints, ResolveError> {
        let Some(root) = &set.root else {
            return Err(self.err(ResolveErrorKind::ExtensionWithoutRoot));
        };

        let mut collected = Collected::default();
        self.collect(root, module, env, &mut collected)?;

        let mut extension = Collected::default();
        if let Some(element) = &set.extension {
            self.collect(element, module, env, &mut extension)?;
        }

        let mut constraints = Constraints::none();
        if let Some(value) = collected.value {
            constraints.push(Constraint::Value(Extensible {
                constraint: constraints::Value::new(value),
                extensible: set.extensible,
                extension: extension.value.map(constraints::Value::new),
            }));
        }
        if let Some(size) = collected.size {
            constraints.push(Constraint::Size(Extensible {
                constraint: constraints::Size::new(size),
                extensible: set.extensible || collected.size_extensible,
                extension: collected
                    .size_extension
                    .or(extension.size)
                    .map(constraints::Size::new),
            }));
        }
        if let Some(alphabet) = collected.alphabet {
            constraints.push(Constraint::PermittedAlphabet(Extensible {
                constraint: PermittedAlphabet::new(alphabet),
                extensible: set.extensible || collected.alphabet_extensible,
                extension: collected
                    .alphabet_extension
                    .or(extension.alphabet)
                    .map(PermittedAlphabet::new),
            }));
        }
        Ok(constraints)
    }

    fn collect(
        &mut self,
        element: &ast::Element,
        module: &ast::Module,
        env: &Env,
        out: &mut Collected,
    ) -> Result<(), ResolveError> {
        use ast::Element as E;
        match element {
            E::Intersection(items) => {
                for item in items {
                    self.collect(item, module, env, out)?;
                }
                Ok(())
            }
            E::Union(_) | E::SingleValue(_) | E::Range { .. } => {
                if let Some(bound) = self.eval_numeric(element, module, env)? {
                    out.value = Some(match out.value.take() {
                        Some(existing) => intersect_bounded(existing, bound).map_err(|()| {
                            self.err(ResolveErrorKind::InvalidConstraint {
                                reason: "empty value range".to_owned(),
                            })
                        })?,
                        None => bound,
                    });
                }
                Ok(())
            }
            E::Except { base, .. } => self.collect(base, module, env, out),
            E::All => Ok(()),
            E::Size(inner) => {
                let (bound, extensible, extension) = self.eval_size_set(inner, module, env)?;
                if let Some(bound) = bound {
                    out.size = Some(match out.size.take() {
                        Some(existing) => intersect_bounded(existing, bound).map_err(|()| {
                            self.err(ResolveErrorKind::InvalidConstraint {
                                reason: "empty size range".to_owned(),
                            })
                        })?,
                        None => bound,
                    });
                }
                out.size_extensible |= extensible;
                if extension.is_some() {
                    out.size_extension = extension;
                }
                Ok(())
            }
            E::From(inner) => {
                let (alphabet, extensible, extension) =
                    self.eval_alphabet_set(inner, module, env)?;
                if let Some(alphabet) = alphabet {
                    out.alphabet = Some(match out.alphabet.take() {
                        Some(existing) => intersect_sets(&existing, &alphabet),
                        None => alphabet,
                    });
                }
                out.alphabet_extensible |= extensible;
                if extension.is_some() {
                    out.alphabet_extension = extension;
                }
                Ok(())
            }
            E::TypeConstraint(ty) => {
                let index = self.resolve_type(ty, module, env, "subtype")?;
                if self.unfilled.contains(&index) {
                    return Ok(());
                }
                let node = self.model.node(index).clone();
                if let Some(value) = node.constraints.value() {
                    if let Some(bound) = match value.constraint.0 {
                        Bounded::None => None,
                        other => Some(other),
                    } {
                        out.value = Some(match out.value.take() {
                            Some(existing) => {
                                intersect_bounded(existing, bound).map_err(|()| {
                                    self.err(ResolveErrorKind::InvalidConstraint {
                                        reason: "empty value range".to_owned(),
                                    })
                                })?
                            }
                            None => bound,
                        });
                    }
                }
                if let Some(size) = node.constraints.size() {
                    out.size = Some(match out.size.take() {
                        Some(existing) => {
                            intersect_bounded(existing, size.constraint.0).map_err(|()| {
                                self.err(ResolveErrorKind::InvalidConstraint {
                                    reason: "empty size range".to_owned(),
                                })
                            })?
                        }
                        None => size.constraint.0,
                    });
                }
                if let Some(alphabet) = node.constraints.permitted_alphabet() {
                    let set = alphabet.constraint.as_slice().to_vec();
                    out.alphabet = Some(match out.alphabet.take() {
                        Some(existing) => intersect_sets(&existing, &set),
                        None => set,
                    });
                }
                Ok(())
            }
            E::Containing(_) | E::WithComponent(_) | E::WithComponents { .. } => Ok(()),
        }
    }

    fn eval_size_set(
        &mut self,
        set: &ast::ElementSet,
        module: &ast::Module,
        env: &Env,
    ) -> Result<(Option<Bounded<usize>>, bool, Option<Bounded<usize>>), ResolveError> {
        let Some(root) = &set.root else {
            return Err(self.err(ResolveErrorKind::ExtensionWithoutRoot));
        };
        let root = self
            .eval_numeric(root, module, env)?
            .map(|bound| self.to_size_bound(bound))
            .transpose()?;
        let extension = match &set.extension {
            Some(element) => self
                .eval_numeric(element, module, env)?
                .map(|bound| self.to_size_bound(bound))
                .transpose()?,
            None => None,
        };
        Ok((root, set.extensible, extension))
    }

    fn to_size_bound(&self, bound: Bounded<i128>) -> Result<Bounded<usize>, ResolveError> {
        let convert = |value: i128| -> Result<usize, ResolveError> {
            usize::try_from(value).map_err(|_| {
                self.err(ResolveErrorKind::InvalidConstraint {
                    reason: format!("negative size {value}"),
                })
            })
        };
        Ok(match bound {
            Bounded::None => Bounded::None,
            Bounded::Single(value) => Bounded::Single(convert(value)?),
            Bounded::Range { start, end } => Bounded::Range {
                start: start.map(convert).transpose()?,
                end: end.map(convert).transpose()?,
            },
        })
    }

    fn eval_alphabet_set(
        &mut self,
        set: &ast::ElementSet,
        module: &ast::Module,
        env: &Env,
    ) -> Result<(Option<Vec<u32>>, bool, Option<Vec<u32>>), ResolveError> {
        let Some(root) = &set.root else {
            return Err(self.err(ResolveErrorKind::ExtensionWithoutRoot));
        };
        let root = self.eval_alphabet(root, module, env)?;
        let extension = match &set.extension {
            Some(element) => self.eval_alphabet(element, module, env)?,
            None => None,
        };
        Ok((root, set.extensible, extension))
    }

    fn eval_numeric(
        &mut self,
        element: &ast::Element,
        module: &ast::Module,
        env: &Env,
    ) -> Result<Option<Bounded<i128>>, ResolveError> {
        use ast::Element as E;
        match element {
            E::SingleValue(value) => Ok(self
                .numeric_endpoint(value, module, env)?
                .map(Bounded::Single)),
            E::Range { start, end } => {
                let start = match start {
                    ast::RangeEndpoint::Min => None,
                    ast::RangeEndpoint::Closed(value) => {
                        self.numeric_endpoint(value, module, env)?
                    }
                    ast::RangeEndpoint::Open(value) => self
                        .numeric_endpoint(value, module, env)?
                        .and_then(|v| v.checked_add(1)),
                    ast::RangeEndpoint::Max => {
                        return Err(self.err(ResolveErrorKind::InvalidConstraint {
                            reason: "MAX as a lower endpoint".to_owned(),
                        }))
                    }
                };
                let end = match end {
                    ast::RangeEndpoint::Max => None,
                    ast::RangeEndpoint::Closed(value) => {
                        self.numeric_endpoint(value, module, env)?
                    }
                    ast::RangeEndpoint::Open(value) => self
                        .numeric_endpoint(value, module, env)?
                        .and_then(|v| v.checked_sub(1)),
                    ast::RangeEndpoint::Min => {
                        return Err(self.err(ResolveErrorKind::InvalidConstraint {
                            reason: "MIN as an upper endpoint".to_owned(),
                        }))
                    }
                };
                if let (Some(start), Some(end)) = (start, end) {
                    if start > end {
                        return Err(self.err(ResolveErrorKind::InvalidConstraint {
                            reason: format!("empty range {start}..{end}"),
                        }));
                    }
                    if start == end {
                        return Ok(Some(Bounded::Single(start)));
                    }
                }
                Ok(Some(Bounded::Range { start, end }))
            }
            E::Union(items) => {
                let mut hull: Option<Bounded<i128>> = None;
                for item in items {
                    let Some(bound) = self.eval_numeric(item, module, env)? else {
                        return Ok(None);
                    };
                    hull = Some(match hull {
                        Some(existing) => hull_bounded(existing, bound),
                        None => bound,
                    });
                }
                Ok(hull)
            }
            E::Intersection(items) => {
                let mut result: Option<Bounded<i128>> = None;
                for item in items {
                    if let Some(bound) = self.eval_numeric(item, module, env)? {
                        result = Some(match result {
                            Some(existing) => {
                                intersect_bounded(existing, bound).map_err(|()| {
                                    self.err(ResolveErrorKind::InvalidConstraint {
                                        reason: "empty value range".to_owned(),
                                    })
                                })?
                            }
                            None => bound,
                        });
                    }
                }
                Ok(result)
            }
            E::Except { base, .. } => self.eval_numeric(base, module, env),
            _ => Ok(None),
        }
    }

    /// A numeric endpoint folds to `Some(i128)`, degrades to `None` when it
    /// overflows `i128` or names a non-numeric value (which other channels
    /// handle), and errs on unresolvable references.
    fn numeric_endpoint(
        &mut self,
        value: &ast::Value,
        module: &ast::Module,
        env: &Env,
    ) -> Result<Option<i128>, ResolveError> {
        match value {
            ast::Value::Integer(value) => Ok(value.to_i128()),
            ast::Value::Reference(_) => {
                let literal = self
                    .literalize(value, module, env, 0)
                    .map_err(|reason| {
                        self.err(ResolveErrorKind::UnknownReference { symbol: reason })
                    })?;
                match literal {
                    ast::Value::Reference(_) => Ok(None),
                    other => self.numeric_endpoint(&other, module, env),
                }
            }
            _ => Ok(None),
        }
    }

    fn eval_alphabet(
        &mut self,
        element: &ast::Element,
        module: &ast::Module,
        env: &Env,
    ) -> Result<Option<Vec<u32>>, ResolveError> {
        use ast::Element as E;
        match element {
            E::SingleValue(value) => {
                let literal = self.literalize(value, module, env, 0).map_err(|reason| {
                    self.err(ResolveErrorKind::UnknownReference { symbol: reason })
                })?;
                match literal {
                    ast::Value::Text(text) => Ok(Some(text.chars().map(u32::from).collect())),
                    _ => Ok(None),
                }
            }
            E::Range { start, end } => {
                let lo = self.alphabet_endpoint(start, module, env)?;
                let hi = self.alphabet_endpoint(end, module, env)?;
                let (Some(lo), Some(hi)) = (lo, hi) else {
                    return Err(self.err(ResolveErrorKind::InvalidConstraint {
                        reason: "open-ended alphabet range".to_owned(),
                    }));
                };
                if lo > hi {
                    return Err(self.err(ResolveErrorKind::InvalidConstraint {
                        reason: "empty alphabet range".to_owned(),
                    }));
                }
                Ok(Some((lo..=hi).collect()))
            }
            E::Union(items) => {
                let mut set: Vec<u32> = Vec::new();
                for item in items {
                    match self.eval_alphabet(item, module, env)? {
                        Some(mut chars) => set.append(&mut chars),
                        None => return Ok(None),
                    }
                }
                set.sort_unstable();
                set.dedup();
                Ok(Some(set))
            }
            E::Intersection(items) => {
                let mut result: Option<Vec<u32>> = None;
                for item in items {
                    if let Some(chars) = self.eval_alphabet(item, module, env)? {
                        result = Some(match result {
                            Some(existing) => intersect_sets(&existing, &chars),
                            None => chars,
                        });
                    }
                }
                Ok(result)
            }
            E::Except { base, excluded } => {
                let base = self.eval_alphabet(base, module, env)?;
                let excluded = self.eval_alphabet(excluded, module, env)?;
                Ok(match (base, excluded) {
                    (Some(base), Some(excluded)) => {
                        Some(base.into_iter().filter(|c| !excluded.contains(c)).collect())
                    }
                    (base, _) => base,
                })
            }
            E::All => Ok(None),
            _ => Ok(None),
        }
    }

    fn alphabet_endpoint(
        &mut self,
        endpoint: &ast::RangeEndpoint,
        module: &ast::Module,
        env: &Env,
    ) -> Result<Option<u32>, ResolveError> {
        // open alphabet endpoints are treated as closed; `FROM ("a"<.."z")`
        // is not seen in practice
        let value = match endpoint {
            ast::RangeEndpoint::Min | ast::RangeEndpoint::Max => return Ok(None),
            ast::RangeEndpoint::Closed(value) | ast::RangeEndpoint::Open(value) => value,
        };
        let literal = self.literalize(value, module, env, 0).map_err(|reason| {
            self.err(ResolveErrorKind::UnknownReference { symbol: reason })
        })?;
        match literal {
            ast::Value::Text(text) if text.chars().count() == 1 => {
                Ok(Some(u32::from(text.chars().next().expect("one char"))))
            }
            _ => Err(self.err(ResolveErrorKind::InvalidConstraint {
                reason: "alphabet endpoints must be single characters".to_owned(),
            })),
        }
    }

    fn merge_constraints(
        &self,
        existing: Constraints,
        new: Constraints,
    ) -> Result<Constraints, ResolveErrorKind> {
        if existing.is_empty() {
            return Ok(new);
        }
        if new.is_empty() {
            return Ok(existing);
        }

        let mut merged = Constraints::none();

        match (existing.value(), new.value()) {
            (Some(old), Some(recent)) => {
                let intersected = intersect_bounded(old.constraint.0, recent.constraint.0)
                    .map_err(|()| ResolveErrorKind::InvalidConstraint {
                        reason: "empty value range".to_owned(),
                    })?;
                merged.push(Constraint::Value(Extensible {
                    constraint: constraints::Value::new(intersected),
                    extensible: recent.extensible,
                    extension: recent.extension.clone(),
                }));
            }
            (Some(only), None) | (None, Some(only)) => {
                merged.push(Constraint::Value(only.clone()));
            }
            (None, None) => {}
        }

        match (existing.size(), new.size()) {
            (Some(old), Some(recent)) => {
                let intersected = intersect_bounded(old.constraint.0, recent.constraint.0)
                    .map_err(|()| ResolveErrorKind::InvalidConstraint {
                        reason: "empty size range".to_owned(),
                    })?;
                merged.push(Constraint::Size(Extensible {
                    constraint: constraints::Size::new(intersected),
                    extensible: recent.extensible,
                    extension: recent.extension.clone(),
                }));
            }
            (Some(only), None) | (None, Some(only)) => {
                merged.push(Constraint::Size(only.clone()));
            }
            (None, None) => {}
        }

        match (existing.permitted_alphabet(), new.permitted_alphabet()) {
            (Some(old), Some(recent)) => {
                let intersected =
                    intersect_sets(old.constraint.as_slice(), recent.constraint.as_slice());
                if intersected.is_empty() {
                    return Err(ResolveErrorKind::InvalidConstraint {
                        reason: "empty permitted alphabet".to_owned(),
                    });
                }
                merged.push(Constraint::PermittedAlphabet(Extensible {
                    constraint: PermittedAlphabet::new(intersected),
                    extensible: recent.extensible,
                    extension: recent.extension.clone(),
                }));
            }
            (Some(only), None) | (None, Some(only)) => {
                merged.push(Constraint::PermittedAlphabet(only.clone()));
            }
            (None, None) => {}
        }

        Ok(merged)
    }

    // Values

    /// Follows a chain of value references to a literal.
    fn literalize(
        &self,
        value: &ast::Value,
        module: &ast::Module,
        env: &Env,
        depth: usize,
    ) -> Result<ast::Value, String> {
        if depth > MAX_VALUE_CHAIN {
            return Err("value reference chain too deep".to_owned());
        }
        let ast::Value::Reference(name) = value else {
            return Ok(value.clone());
        };
        if let Some(bound) = env.values.get(name) {
            return Ok(bound.clone());
        }
        match self.table.lookup(&module.name, name) {
            Ok((definition, ast::Assignment::Value(assignment))) => {
                self.literalize(&assignment.value, definition, &Env::default(), depth + 1)
            }
            Ok((_, ast::Assignment::Type(_))) => {
                Err(format!("`{name}` names a type, not a value"))
            }
            Err(_) => Err(format!("unknown value reference `{name}`")),
        }
    }

    fn integer_value(
        &self,
        value: &ast::Value,
        module: &ast::Module,
        env: &Env,
        depth: usize,
    ) -> Result<i128, String> {
        match value {
            ast::Value::Integer(value) => value
                .to_i128()
                .ok_or_else(|| "integer too large".to_owned()),
            ast::Value::Reference(_) => {
                let literal = self.literalize(value, module, env, depth)?;
                match literal {
                    ast::Value::Reference(name) => {
                        Err(format!("unknown value reference `{name}`"))
                    }
                    other => self.integer_value(&other, module, env, depth + 1),
                }
            }
            _ => Err("expected an integer value".to_owned()),
        }
    }

    /// Interprets a raw value against a resolved type, producing the runtime
    /// [`Value`] shape the codecs consume. Used for `DEFAULT` folding.
    fn resolve_value(
        &self,
        value: &ast::Value,
        ty: TypeIndex,
        module: &ast::Module,
        env: &Env,
        depth: usize,
    ) -> Result<Value, String> {
        if depth > MAX_VALUE_CHAIN {
            return Err("value nesting too deep".to_owned());
        }
        if self.unfilled.contains(&ty) {
            return Err("the member's type is recursive".to_owned());
        }
        let node = self.model.node(ty);

        if let ast::Value::Reference(name) = value {
            match &node.kind {
                TypeKind::Enumerated(enumeration) if enumeration.value_of(name).is_some() => {
                    return Ok(Value::Enumerated(name.clone()));
                }
                TypeKind::Integer(named) => {
                    if let Some((_, number)) = named.iter().find(|(item, _)| item == name) {
                        return Ok(Value::Integer(BigInt::from(*number)));
                    }
                }
                _ => {}
            }
            let literal = self.literalize(value, module, env, depth)?;
            if matches!(literal, ast::Value::Reference(_)) {
                return Err(format!("unknown value reference `{name}`"));
            }
            return self.resolve_value(&literal, ty, module, env, depth + 1);
        }

        match (&node.kind, value) {
            (TypeKind::Boolean, ast::Value::Boolean(value)) => Ok(Value::Boolean(*value)),
            (TypeKind::Integer(_), ast::Value::Integer(value)) => {
                Ok(Value::Integer(value.clone()))
            }
            (TypeKind::Real, ast::Value::Real(value)) => Ok(Value::Real(*value)),
            (TypeKind::Real, ast::Value::Integer(value)) => Ok(Value::Real(
                value.to_f64().ok_or("integer out of REAL range")?,
            )),
            (TypeKind::Real, ast::Value::PlusInfinity) => Ok(Value::Real(f64::INFINITY)),
            (TypeKind::Real, ast::Value::MinusInfinity) => Ok(Value::Real(f64::NEG_INFINITY)),
            (TypeKind::Real, ast::Value::NotANumber) => Ok(Value::Real(f64::NAN)),
            (TypeKind::Real, ast::Value::NamedList(items)) => {
                let field = |name: &str| -> Result<i128, String> {
                    items
                        .iter()
                        .find(|(item, _)| item == name)
                        .map(|(_, value)| self.integer_value(value, module, env, depth))
                        .ok_or_else(|| format!("missing `{name}` in REAL value"))?
                };
                let mantissa = field("mantissa")? as f64;
                let base = field("base")?;
                let exponent = field("exponent")? as i32;
                if base != 2 && base != 10 {
                    return Err("REAL base must be 2 or 10".to_owned());
                }
                Ok(Value::Real(mantissa * (base as f64).powi(exponent)))
            }
            (TypeKind::Null, ast::Value::Null) => Ok(Value::Null),
            (TypeKind::BitString(_), ast::Value::BitsLiteral(bits)) => {
                Ok(Value::BitString(bits.clone()))
            }
            (TypeKind::BitString(_), ast::Value::HexLiteral(bytes, bits)) => {
                let mut bitstring = crate::types::BitString::from_vec(bytes.clone());
                bitstring.truncate(*bits);
                Ok(Value::BitString(bitstring))
            }
            (TypeKind::BitString(named), ast::Value::List(items)) if items.is_empty() => {
                let _ = named;
                Ok(Value::BitString(crate::types::BitString::new()))
            }
            (TypeKind::BitString(named), ast::Value::NamedList(items)) if items.is_empty() => {
                let _ = named;
                Ok(Value::BitString(crate::types::BitString::new()))
            }
            (TypeKind::BitString(named), ast::Value::List(items)) => {
                let mut positions = Vec::new();
                for item in items {
                    let ast::Value::Reference(name) = item else {
                        return Err("named bit lists may only contain identifiers".to_owned());
                    };
                    let (_, position) = named
                        .iter()
                        .find(|(bit, _)| bit == name)
                        .ok_or_else(|| format!("unknown named bit `{name}`"))?;
                    positions.push(*position);
                }
                let width = positions.iter().map(|p| p + 1).max().unwrap_or(0) as usize;
                let mut bits = crate::types::BitString::new();
                bits.resize(width, false);
                for position in positions {
                    bits.set(position as usize, true);
                }
                Ok(Value::BitString(bits))
            }
            (TypeKind::BitString(_), ast::Value::EmptyBraces) => {
                Ok(Value::BitString(crate::types::BitString::new()))
            }
            (TypeKind::OctetString, ast::Value::HexLiteral(bytes, _)) => {
                Ok(Value::OctetString(bytes.clone()))
            }
            (TypeKind::OctetString, ast::Value::BitsLiteral(bits)) => {
                let mut bits = bits.clone();
                while bits.len() % 8 != 0 {
                    bits.push(false);
                }
                Ok(Value::OctetString(bits.into_vec()))
            }
            (TypeKind::CharacterString(_), ast::Value::Text(text))
            | (TypeKind::ObjectDescriptor, ast::Value::Text(text)) => {
                Ok(Value::Text(text.clone()))
            }
            (TypeKind::Time(kind), ast::Value::Text(text)) => parse_time_value(*kind, text),
            (TypeKind::ObjectIdentifier, _) | (TypeKind::RelativeOid, _) => {
                self.resolve_oid_value(value, matches!(node.kind, TypeKind::RelativeOid))
            }
            (TypeKind::Enumerated(_), _) => {
                Err("an ENUMERATED value must be one of its items".to_owned())
            }
            (TypeKind::Sequence(constructed), ast::Value::NamedList(items))
            | (TypeKind::Set(constructed), ast::Value::NamedList(items)) => {
                let mut members = std::collections::BTreeMap::new();
                for (name, item) in items {
                    let member = constructed
                        .members
                        .iter()
                        .find(|member| &member.name == name)
                        .ok_or_else(|| format!("unknown member `{name}`"))?;
                    let resolved =
                        self.resolve_value(item, member.ty, module, env, depth + 1)?;
                    members.insert(name.clone(), resolved);
                }
                for member in &constructed.members {
                    if !member.is_optional_or_default()
                        && member.extension_group.is_none()
                        && !members.contains_key(&member.name)
                    {
                        return Err(format!("missing mandatory member `{}`", member.name));
                    }
                }
                Ok(Value::Sequence(members))
            }
            (TypeKind::Sequence(_), ast::Value::EmptyBraces)
            | (TypeKind::Set(_), ast::Value::EmptyBraces) => {
                Ok(Value::Sequence(std::collections::BTreeMap::new()))
            }
            (TypeKind::SequenceOf(element), ast::Value::List(items))
            | (TypeKind::SetOf(element), ast::Value::List(items)) => {
                let element = *element;
                let mut values = Vec::new();
                for item in items {
                    values.push(self.resolve_value(item, element, module, env, depth + 1)?);
                }
                Ok(Value::List(values))
            }
            (TypeKind::SequenceOf(_), ast::Value::EmptyBraces)
            | (TypeKind::SetOf(_), ast::Value::EmptyBraces) => Ok(Value::List(Vec::new())),
            (TypeKind::Choice(choice), ast::Value::Choice(selector, inner)) => {
                let variant = choice
                    .variant(selector)
                    .ok_or_else(|| format!("`{selector}` is not an alternative"))?;
                let resolved = self.resolve_value(inner, variant.ty, module, env, depth + 1)?;
                Ok(Value::Choice(selector.clone(), Box::new(resolved)))
            }
            (TypeKind::Any, ast::Value::HexLiteral(bytes, _)) => Ok(Value::Any(bytes.clone())),
            (kind, value) => Err(format!(
                "a {} cannot take this value shape ({value:?})",
                describe_kind(kind)
            )),
        }
    }

    fn resolve_oid_value(&self, value: &ast::Value, relative: bool) -> Result<Value, String> {
        let arcs = match value {
            ast::Value::OidComponents(arcs) => arcs.clone(),
            ast::Value::List(items) => items
                .iter()
                .map(|item| match item {
                    ast::Value::Integer(value) => Ok(ast::OidArc {
                        name: None,
                        number: value.to_u32(),
                    }),
                    ast::Value::Reference(name) => Ok(ast::OidArc {
                        name: Some(name.clone()),
                        number: None,
                    }),
                    _ => Err("invalid object identifier component".to_owned()),
                })
                .collect::<Result<_, _>>()?,
            _ => return Err("expected an object identifier value".to_owned()),
        };

        let mut numbers = Vec::new();
        for (position, arc) in arcs.iter().enumerate() {
            let number = match (arc.number, &arc.name) {
                (Some(number), _) => number,
                (None, Some(name)) if !relative => {
                    well_known_arc(position, name).ok_or_else(|| {
                        format!("unknown object identifier arc `{name}`")
                    })?
                }
                (None, Some(name)) => {
                    return Err(format!("unknown object identifier arc `{name}`"))
                }
                (None, None) => return Err("invalid object identifier component".to_owned()),
            };
            numbers.push(number);
        }
        Ok(Value::ObjectIdentifier(numbers))
    }

    // Structural checks

    fn check_structure(&self) -> Vec<ResolveError> {
        let mut errors = Vec::new();
        for position in 0..self.model.len() {
            let index = TypeIndex(position as u32);
            let node = self.model.node(index);
            let scope = &self.scopes[position];
            match &node.kind {
                TypeKind::Sequence(constructed) => {
                    if let Some(kind) = self.check_sequence_tags(constructed) {
                        errors.push(ResolveError::new(kind, &scope.0, &scope.1));
                    }
                }
                TypeKind::Set(constructed) => {
                    let members: Vec<(String, TypeIndex)> = constructed
                        .members
                        .iter()
                        .map(|member| (member.name.clone(), member.ty))
                        .collect();
                    if let Some(kind) = self.check_distinct_tags(&members) {
                        errors.push(ResolveError::new(kind, &scope.0, &scope.1));
                    }
                }
                TypeKind::Choice(choice) => {
                    let variants: Vec<(String, TypeIndex)> = choice
                        .variants
                        .iter()
                        .map(|variant| (variant.name.clone(), variant.ty))
                        .collect();
                    if let Some(kind) = self.check_distinct_tags(&variants) {
                        errors.push(ResolveError::new(kind, &scope.0, &scope.1));
                    }
                }
                _ => {}
            }
        }
        if let Some(error) = self.check_recursion() {
            errors.push(error);
        }
        errors
    }

    /// In a `SEQUENCE`, each `OPTIONAL`/`DEFAULT` member's tags must be
    /// distinct from every following member's up to and including the next
    /// mandatory one.
    fn check_sequence_tags(&self, constructed: &ConstructedType) -> Option<ResolveErrorKind> {
        let members: Vec<&Member> = constructed.root_members().collect();
        for (position, member) in members.iter().enumerate() {
            if !member.is_optional_or_default() {
                continue;
            }
            let mut seen: BTreeSet<Tag> =
                self.model.leading_tags(member.ty).into_iter().collect();
            for follower in &members[position + 1..] {
                for tag in self.model.leading_tags(follower.ty) {
                    if !seen.insert(tag) {
                        return Some(ResolveErrorKind::DuplicateTag {
                            tag,
                            member: follower.name.clone(),
                        });
                    }
                }
                if !follower.is_optional_or_default() {
                    break;
                }
            }
        }
        None
    }

    fn check_distinct_tags(&self, members: &[(String, TypeIndex)]) -> Option<ResolveErrorKind> {
        let mut seen = BTreeSet::new();
        for (name, ty) in members {
            for tag in self.model.leading_tags(*ty) {
                if !seen.insert(tag) {
                    return Some(ResolveErrorKind::DuplicateTag {
                        tag,
                        member: name.clone(),
                    });
                }
            }
        }
        None
    }

    /// A type may reach itself only through an `OPTIONAL`/`DEFAULT` member
    /// or a `SEQUENCE OF`/`SET OF` element.
    fn check_recursion(&self) -> Option<ResolveError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut colors = vec![Color::White; self.model.len()];

        fn visit(
            model: &TypeModel,
            colors: &mut [Color],
            index: TypeIndex,
        ) -> Option<TypeIndex> {
            match colors[index.as_usize()] {
                Color::Black => return None,
                Color::Gray => return Some(index),
                Color::White => {}
            }
            colors[index.as_usize()] = Color::Gray;
            let node = model.node(index);
            let mut children: Vec<TypeIndex> = Vec::new();
            match &node.kind {
                TypeKind::Sequence(constructed) | TypeKind::Set(constructed) => {
                    children.extend(
                        constructed
                            .members
                            .iter()
                            .filter(|member| {
                                !member.is_optional_or_default()
                                    && member.extension_group.is_none()
                            })
                            .map(|member| member.ty),
                    );
                }
                TypeKind::Choice(choice) => {
                    children.extend(choice.variants.iter().map(|variant| variant.ty));
                }
                // SEQUENCE OF / SET OF break cycles: zero elements suffice
                _ => {}
            }
            for child in children {
                if let Some(found) = visit(model, colors, child) {
                    return Some(found);
                }
            }
            colors[index.as_usize()] = Color::Black;
            None
        }

        for position in 0..self.model.len() {
            if let Some(cyclic) = visit(&self.model, &mut colors, TypeIndex(position as u32)) {
                let scope = &self.scopes[cyclic.as_usize()];
                return Some(ResolveError::new(
                    ResolveErrorKind::RecursiveType {
                        reference: self.model.node(cyclic).name.clone(),
                    },
                    &scope.0,
                    &scope.1,
                ));
            }
        }
        None
    }
}

fn component_list_tagged(list: &ast::ComponentList) -> bool {
    let member_tagged = |member: &ast::Member| member.ty.tag.is_some();
    let component_tagged = |component: &ast::Component| match component {
        ast::Component::Member(member) => member_tagged(member),
        ast::Component::ComponentsOf(_) => false,
    };
    list.root.iter().any(component_tagged)
        || list.trailing.iter().any(component_tagged)
        || list.additions.iter().any(|addition| match addition {
            ast::Addition::Member(member) => member_tagged(member),
            ast::Addition::Group { members, .. } => members.iter().any(member_tagged),
        })
}

fn apply_prefix(node: &TypeNode, prefix: Prefix) -> Vec<Tag> {
    let tag = Tag::new(prefix.class, prefix.number);
    let explicit = match prefix.kind {
        ast::TagKind::Explicit => true,
        // IMPLICIT over an untagged CHOICE or open type degrades to EXPLICIT
        ast::TagKind::Implicit => {
            matches!(node.kind, TypeKind::Choice(_) | TypeKind::Any) || node.tags.is_empty()
        }
    };
    let mut tags = vec![tag];
    if explicit {
        tags.extend(node.tags.iter().copied());
    } else {
        tags.extend(node.tags.iter().skip(1).copied());
    }
    tags
}

fn universal_tags(kind: &TypeKind) -> Vec<Tag> {
    match kind {
        TypeKind::Boolean => vec![Tag::BOOL],
        TypeKind::Integer(_) => vec![Tag::INTEGER],
        TypeKind::Real => vec![Tag::REAL],
        TypeKind::Null => vec![Tag::NULL],
        TypeKind::ObjectIdentifier => vec![Tag::OBJECT_IDENTIFIER],
        TypeKind::RelativeOid => vec![Tag::RELATIVE_OID],
        TypeKind::ObjectDescriptor => vec![Tag::OBJECT_DESCRIPTOR],
        TypeKind::Enumerated(_) => vec![Tag::ENUMERATED],
        TypeKind::BitString(_) => vec![Tag::BIT_STRING],
        TypeKind::OctetString => vec![Tag::OCTET_STRING],
        TypeKind::CharacterString(kind) => vec![kind.tag()],
        TypeKind::Time(kind) => vec![kind.tag()],
        TypeKind::Any | TypeKind::Choice(_) => Vec::new(),
        TypeKind::Sequence(_) | TypeKind::SequenceOf(_) => vec![Tag::SEQUENCE],
        TypeKind::Set(_) | TypeKind::SetOf(_) => vec![Tag::SET],
    }
}

fn describe_kind(kind: &TypeKind) -> &'static str {
    kind.name()
}

fn parse_time_value(kind: TimeKind, text: &str) -> Result<Value, String> {
    let bad = || format!("invalid {kind:?} value {text:?}");
    match kind {
        TimeKind::UtcTime => date::parse_utc_time(text)
            .map(Value::UtcTime)
            .ok_or_else(bad),
        TimeKind::GeneralizedTime => date::parse_generalized_time(text)
            .map(Value::GeneralizedTime)
            .ok_or_else(bad),
        TimeKind::Date => date::parse_date(text).map(Value::Date).ok_or_else(bad),
        TimeKind::TimeOfDay => date::parse_time_of_day(text)
            .map(Value::TimeOfDay)
            .ok_or_else(bad),
        TimeKind::DateTime => date::parse_date_time(text)
            .map(Value::DateTime)
            .ok_or_else(bad),
    }
}

/// The arc names X.660 assigns at the first two levels.
fn well_known_arc(position: usize, name: &str) -> Option<u32> {
    match (position, name) {
        (0, "itu-t") | (0, "ccitt") => Some(0),
        (0, "iso") => Some(1),
        (0, "joint-iso-itu-t") | (0, "joint-iso-ccitt") => Some(2),
        (1, "recommendation") => Some(0),
        (1, "question") => Some(1),
        (1, "administration") => Some(2),
        (1, "network-operator") => Some(3),
        (1, "identified-organization") => Some(3),
        (1, "standard") => Some(0),
        (1, "member-body") => Some(2),
        _ => None,
    }
}

fn intersect_bounded<T: Ord + Copy>(a: Bounded<T>, b: Bounded<T>) -> Result<Bounded<T>, ()> {
    let start = match (a.as_start(), b.as_start()) {
        (Some(&x), Some(&y)) => Some(x.max(y)),
        (Some(&x), None) | (None, Some(&x)) => Some(x),
        (None, None) => None,
    };
    let end = match (a.as_end(), b.as_end()) {
        (Some(&x), Some(&y)) => Some(x.min(y)),
        (Some(&x), None) | (None, Some(&x)) => Some(x),
        (None, None) => None,
    };
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(()),
        (Some(start), Some(end)) if start == end => Ok(Bounded::Single(start)),
        (None, None) => Ok(Bounded::None),
        _ => Ok(Bounded::Range { start, end }),
    }
}

fn hull_bounded<T: Ord + Copy>(a: Bounded<T>, b: Bounded<T>) -> Bounded<T> {
    let start = match (a.as_start(), b.as_start()) {
        (Some(&x), Some(&y)) => Some(x.min(y)),
        _ => None,
    };
    let end = match (a.as_end(), b.as_end()) {
        (Some(&x), Some(&y)) => Some(x.max(y)),
        _ => None,
    };
    match (start, end) {
        (Some(start), Some(end)) if start == end => Bounded::Single(start),
        (None, None) => Bounded::None,
        _ => Bounded::Range { start, end },
    }
}

fn intersect_sets(a: &[u32], b: &[u32]) -> Vec<u32> {
    a.iter().copied().filter(|item| b.contains(item)).collect()
}

/// Derived encoding accelerators (X.691 constrained whole numbers, X.696
/// fixed-width forms); recomputed whenever a node's constraints change.
fn hints_for(node: &TypeNode) -> Hints {
    let mut hints = Hints::default();

    if let Some(value) = node.constraints.value() {
        if !value.extensible {
            if let Some(range) = value.constraint.0.range() {
                hints.per_width = Some(if range == 0 {
                    0
                } else {
                    crate::num::log2(range.saturating_add(1))
                });
            }
            if matches!(node.kind, TypeKind::Integer(_)) {
                hints.oer_int = oer_integer_width(&value.constraint.0);
            }
        }
    }

    if let Some(size) = node.constraints.size() {
        if !size.extensible {
            if let Bounded::Single(fixed) = *size.constraint {
                hints.fixed_size = Some(fixed);
            }
        }
    }

    if let TypeKind::CharacterString(kind) = node.kind {
        if kind.is_known_multiplier() {
            let width = match node.constraints.permitted_alphabet() {
                Some(alphabet) if !alphabet.extensible => {
                    let len = alphabet.constraint.len() as i128;
                    if len <= 1 {
                        0
                    } else {
                        crate::num::log2(len)
                    }
                }
                _ => kind.canonical_width().unwrap_or(8),
            };
            hints.char_width = Some(width);
        }
    }

    hints
}

fn oer_integer_width(bound: &Bounded<i128>) -> Option<IntegerWidth> {
    let start = *bound.as_start()?;
    let end = *bound.as_end()?;
    if start >= 0 {
        let octets = match end {
            e if e <= u8::MAX as i128 => 1,
            e if e <= u16::MAX as i128 => 2,
            e if e <= u32::MAX as i128 => 4,
            e if e <= u64::MAX as i128 => 8,
            _ => return None,
        };
        Some(IntegerWidth::Unsigned(octets))
    } else {
        let octets = match (start, end) {
            (s, e) if s >= i8::MIN as i128 && e <= i8::MAX as i128 => 1,
            (s, e) if s >= i16::MIN as i128 && e <= i16::MAX as i128 => 2,
            (s, e) if s >= i32::MIN as i128 && e <= i32::MAX as i128 => 4,
            (s, e) if s >= i64::MIN as i128 && e <= i64::MAX as i128 => 8,
            _ => return None,
        };
        Some(IntegerWidth::Signed(octets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn model(source: &str) -> TypeModel {
        let table = ModuleTable::new(parse("test", source).unwrap()).unwrap();
        resolve(&table).unwrap()
    }

    fn model_err(source: &str) -> ResolveError {
        let table = ModuleTable::new(parse("test", source).unwrap()).unwrap();
        resolve(&table).unwrap_err()
    }

    #[test]
    fn resolves_simple_assignments() {
        let model = model("M DEFINITIONS ::= BEGIN A ::= INTEGER (0..255) END");
        let index = model.lookup("A").unwrap();
        let node = model.node(index);
        assert!(matches!(node.kind, TypeKind::Integer(_)));
        assert_eq!(node.tags, vec![Tag::INTEGER]);
        assert_eq!(
            node.constraints.value().unwrap().constraint.0,
            Bounded::new(0, 255)
        );
        assert_eq!(node.hints.per_width, Some(8));
        assert_eq!(node.hints.oer_int, Some(IntegerWidth::Unsigned(1)));
    }

    #[test]
    fn automatic_tags_assign_ordinals() {
        let model = model(
            "M DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
             S ::= SEQUENCE { a INTEGER, b BOOLEAN OPTIONAL, c IA5String } \
             END",
        );
        let index = model.lookup("S").unwrap();
        let TypeKind::Sequence(constructed) = &model.node(index).kind else {
            panic!()
        };
        for (i, member) in constructed.members.iter().enumerate() {
            assert_eq!(
                model.node(member.ty).tags,
                vec![Tag::new_context(i as u32)],
                "member {}",
                member.name
            );
        }
    }

    #[test]
    fn automatic_tags_skip_manually_tagged_types() {
        let model = model(
            "M DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
             S ::= SEQUENCE { a [5] INTEGER, b BOOLEAN } \
             END",
        );
        let index = model.lookup("S").unwrap();
        let TypeKind::Sequence(constructed) = &model.node(index).kind else {
            panic!()
        };
        assert_eq!(
            model.node(constructed.members[0].ty).tags,
            vec![Tag::new_context(5)]
        );
        assert_eq!(model.node(constructed.members[1].ty).tags, vec![Tag::BOOL]);
    }

    #[test]
    fn automatic_tag_on_choice_is_explicit() {
        let model = model(
            "M DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
             S ::= SEQUENCE { a CHOICE { x INTEGER, y BOOLEAN } } \
             END",
        );
        let index = model.lookup("S").unwrap();
        let TypeKind::Sequence(constructed) = &model.node(index).kind else {
            panic!()
        };
        let member = model.node(constructed.members[0].ty);
        // the context tag wraps the choice rather than replacing its tag
        assert_eq!(member.tags, vec![Tag::new_context(0)]);
        assert!(matches!(member.kind, TypeKind::Choice(_)));
        assert!(member.own_tag().is_none());
    }

    #[test]
    fn explicit_and_implicit_prefixes() {
        let model = model(
            "M DEFINITIONS ::= BEGIN \
             A ::= [5] EXPLICIT INTEGER \
             B ::= [5] IMPLICIT INTEGER \
             END",
        );
        let a = model.node(model.lookup("A").unwrap());
        assert_eq!(a.tags, vec![Tag::new_context(5), Tag::INTEGER]);
        let b = model.node(model.lookup("B").unwrap());
        assert_eq!(b.tags, vec![Tag::new_context(5)]);
    }

    #[test]
    fn parameterized_instantiation() {
        let model = model(
            "M DEFINITIONS ::= BEGIN \
             Wrapper { T } ::= SEQUENCE { inner T } \
             A ::= Wrapper { INTEGER } \
             B ::= Wrapper { IA5String } \
             END",
        );
        let a = model.node(model.lookup("A").unwrap());
        let TypeKind::Sequence(constructed) = &a.kind else { panic!() };
        assert!(matches!(
            model.node(constructed.members[0].ty).kind,
            TypeKind::Integer(_)
        ));
        let b = model.node(model.lookup("B").unwrap());
        let TypeKind::Sequence(constructed) = &b.kind else { panic!() };
        assert!(matches!(
            model.node(constructed.members[0].ty).kind,
            TypeKind::CharacterString(StringKind::Ia5)
        ));
    }

    #[test]
    fn value_parameters_reach_constraints() {
        let model = model(
            "M DEFINITIONS ::= BEGIN \
             Bounded { INTEGER : max } ::= INTEGER (0..max) \
             A ::= Bounded { 7 } \
             END",
        );
        let a = model.node(model.lookup("A").unwrap());
        assert_eq!(a.constraints.value().unwrap().constraint.0, Bounded::new(0, 7));
        assert_eq!(a.hints.per_width, Some(3));
    }

    #[test]
    fn recursion_through_optional_is_legal() {
        let model = model(
            "M DEFINITIONS ::= BEGIN \
             Node ::= SEQUENCE { next Node OPTIONAL } \
             List ::= SEQUENCE { items SEQUENCE OF List } \
             END",
        );
        let node = model.node(model.lookup("Node").unwrap());
        let TypeKind::Sequence(constructed) = &node.kind else { panic!() };
        assert_eq!(constructed.members[0].ty, model.lookup("Node").unwrap());
    }

    #[test]
    fn recursion_without_escape_is_rejected() {
        let error = model_err(
            "M DEFINITIONS ::= BEGIN \
             Bad ::= SEQUENCE { self Bad } \
             END",
        );
        assert!(matches!(
            *error.kind,
            ResolveErrorKind::RecursiveType { .. }
        ));
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let error = model_err(
            "M DEFINITIONS ::= BEGIN \
             C ::= CHOICE { a [0] INTEGER, b [0] BOOLEAN } \
             END",
        );
        assert!(matches!(*error.kind, ResolveErrorKind::DuplicateTag { .. }));
    }

    #[test]
    fn optional_run_with_equal_tags_is_rejected() {
        let error = model_err(
            "M DEFINITIONS ::= BEGIN \
             S ::= SEQUENCE { a INTEGER OPTIONAL, b INTEGER } \
             END",
        );
        assert!(matches!(*error.kind, ResolveErrorKind::DuplicateTag { .. }));
    }

    #[test]
    fn unknown_reference_errors() {
        let error = model_err("M DEFINITIONS ::= BEGIN A ::= Missing END");
        assert!(matches!(
            *error.kind,
            ResolveErrorKind::UnknownReference { .. }
        ));
    }

    #[test]
    fn defaults_fold_and_type_check() {
        let model = model(
            "M DEFINITIONS ::= BEGIN \
             S ::= SEQUENCE { a INTEGER DEFAULT 5, b BOOLEAN DEFAULT TRUE, \
                              c ENUMERATED { x(0), y(1) } DEFAULT y } \
             END",
        );
        let index = model.lookup("S").unwrap();
        let TypeKind::Sequence(constructed) = &model.node(index).kind else {
            panic!()
        };
        assert_eq!(
            constructed.members[0].default,
            Some(Value::Integer(BigInt::from(5)))
        );
        assert_eq!(constructed.members[1].default, Some(Value::Boolean(true)));
        assert_eq!(
            constructed.members[2].default,
            Some(Value::Enumerated("y".to_owned()))
        );
    }

    #[test]
    fn bad_default_is_rejected() {
        let error = model_err(
            "M DEFINITIONS ::= BEGIN \
             S ::= SEQUENCE { a INTEGER DEFAULT TRUE } \
             END",
        );
        assert!(matches!(
            *error.kind,
            ResolveErrorKind::InvalidDefault { .. }
        ));
    }

    #[test]
    fn components_of_splices_root_members() {
        let model = model(
            "M DEFINITIONS ::= BEGIN \
             Base ::= SEQUENCE { a INTEGER, b BOOLEAN OPTIONAL } \
             Extended ::= SEQUENCE { COMPONENTS OF Base, c IA5String } \
             END",
        );
        let index = model.lookup("Extended").unwrap();
        let TypeKind::Sequence(constructed) = &model.node(index).kind else {
            panic!()
        };
        let names: Vec<&str> = constructed
            .members
            .iter()
            .map(|member| member.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(constructed.members[1].optional);
    }

    #[test]
    fn enumeration_numbering() {
        let model = model(
            "M DEFINITIONS ::= BEGIN \
             E ::= ENUMERATED { a, b(5), c, ..., d } \
             END",
        );
        let TypeKind::Enumerated(enumeration) = &model.node(model.lookup("E").unwrap()).kind
        else {
            panic!()
        };
        // a=0, c=1 (next free), b=5; root sorted by value
        assert_eq!(
            enumeration
                .root
                .iter()
                .map(|item| (item.name.as_str(), item.value))
                .collect::<Vec<_>>(),
            vec![("a", 0), ("c", 1), ("b", 5)]
        );
        assert!(enumeration.extensible);
        assert_eq!(enumeration.extensions[0].value, 6);
    }

    #[test]
    fn permitted_alphabet_and_size() {
        let model = model(
            "M DEFINITIONS ::= BEGIN \
             S ::= IA5String (SIZE (1..4)) (FROM (\"ab\" | \"c\")) \
             END",
        );
        let node = model.node(model.lookup("S").unwrap());
        let size = node.constraints.size().unwrap();
        assert_eq!(size.constraint.0, Bounded::new(1, 4));
        let alphabet = node.constraints.permitted_alphabet().unwrap();
        assert_eq!(
            alphabet.constraint.as_slice(),
            &['a' as u32, 'b' as u32, 'c' as u32]
        );
        assert_eq!(node.hints.char_width, Some(2));
    }

    #[test]
    fn extension_marker_splits_constraints() {
        let model = model("M DEFINITIONS ::= BEGIN I ::= INTEGER (0..7, ..., 8..15) END");
        let node = model.node(model.lookup("I").unwrap());
        let value = node.constraints.value().unwrap();
        assert!(value.extensible);
        assert_eq!(value.constraint.0, Bounded::new(0, 7));
        assert_eq!(value.extension.as_ref().unwrap().0, Bounded::new(8, 15));
        // extensible root ranges contribute no fixed-width hints
        assert_eq!(node.hints.per_width, None);
    }

    #[test]
    fn empty_intersection_is_rejected() {
        let error = model_err("M DEFINITIONS ::= BEGIN I ::= INTEGER (0..5 ^ 10..20) END");
        assert!(matches!(
            *error.kind,
            ResolveErrorKind::InvalidConstraint { .. }
        ));
    }

    #[test]
    fn imports_resolve_across_modules() {
        let model = model(
            "A DEFINITIONS ::= BEGIN \
             IMPORTS Inner FROM B; \
             Outer ::= SEQUENCE { x Inner } \
             END \
             B DEFINITIONS ::= BEGIN \
             Inner ::= INTEGER (0..63) \
             END",
        );
        let index = model.lookup("Outer").unwrap();
        let TypeKind::Sequence(constructed) = &model.node(index).kind else {
            panic!()
        };
        let inner = model.node(constructed.members[0].ty);
        assert_eq!(
            inner.constraints.value().unwrap().constraint.0,
            Bounded::new(0, 63)
        );
    }

    #[test]
    fn selection_types_pick_alternatives() {
        let model = model(
            "M DEFINITIONS ::= BEGIN \
             C ::= CHOICE { a INTEGER, b BOOLEAN } \
             S ::= b < C \
             END",
        );
        let node = model.node(model.lookup("S").unwrap());
        assert!(matches!(node.kind, TypeKind::Boolean));
    }

    #[test]
    fn extensibility_implied_extends_constructed_types() {
        let model = model(
            "M DEFINITIONS EXTENSIBILITY IMPLIED ::= BEGIN \
             S ::= SEQUENCE { a INTEGER } \
             END",
        );
        let TypeKind::Sequence(constructed) = &model.node(model.lookup("S").unwrap()).kind
        else {
            panic!()
        };
        assert!(constructed.extensible);
    }

    #[test]
    fn lint_collects_multiple_errors() {
        let table = ModuleTable::new(
            parse(
                "test",
                "M DEFINITIONS ::= BEGIN A ::= Missing B ::= AlsoMissing END",
            )
            .unwrap(),
        )
        .unwrap();
        let diagnostics = lint(&table);
        assert_eq!(diagnostics.len(), 2);
    }
}
