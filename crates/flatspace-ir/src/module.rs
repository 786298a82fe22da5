//! Modules: the ordered top-level entities of a program plus their symbol table.

use std::collections::{BTreeMap, HashMap};

use crate::context::IrContext;
use crate::global::{ComdatSelection, GlobalData, GlobalKind};
use crate::mapper::{ValueMap, ValueMapper};
use crate::refs::{GlobalRef, MdRef};
use crate::symbol::Symbol;

/// A named list of metadata nodes at module level, e.g. `!llvm.ident`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedMetadata {
    pub name: Symbol,
    pub operands: Vec<MdRef>,
}

/// A program module.
///
/// Entity data lives in the `IrContext`; the module records which globals
/// belong to it, in order, and keeps their names unique.
pub struct Module {
    pub name: Symbol,
    globals: Vec<GlobalRef>,
    functions: Vec<GlobalRef>,
    aliases: Vec<GlobalRef>,
    pub named_metadata: Vec<NamedMetadata>,
    comdats: BTreeMap<Symbol, ComdatSelection>,
    symbols: HashMap<Symbol, GlobalRef>,
}

impl Module {
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            globals: Vec::new(),
            functions: Vec::new(),
            aliases: Vec::new(),
            named_metadata: Vec::new(),
            comdats: BTreeMap::new(),
            symbols: HashMap::default(),
        }
    }

    /// Global variables in declaration order.
    pub fn globals(&self) -> &[GlobalRef] {
        &self.globals
    }

    pub fn functions(&self) -> &[GlobalRef] {
        &self.functions
    }

    pub fn aliases(&self) -> &[GlobalRef] {
        &self.aliases
    }

    /// Look up a global by name.
    pub fn get(&self, name: Symbol) -> Option<GlobalRef> {
        self.symbols.get(&name).copied()
    }

    /// Add a global to the module. A name already in use gets a numeric
    /// suffix; the name actually assigned is stored in the global.
    pub fn add_global(&mut self, ctx: &mut IrContext, mut data: GlobalData) -> GlobalRef {
        data.name = self.unique_name(data.name);
        let name = data.name;
        let list = match data.kind {
            GlobalKind::Variable(_) => &mut self.globals,
            GlobalKind::Function(_) => &mut self.functions,
            GlobalKind::Alias(_) => &mut self.aliases,
        };
        let g = ctx.create_global(data);
        list.push(g);
        self.symbols.insert(name, g);
        g
    }

    /// Rename a global, returning the name actually assigned.
    pub fn set_name(&mut self, ctx: &mut IrContext, g: GlobalRef, name: Symbol) -> Symbol {
        let old = ctx.global(g).name;
        if old == name {
            return name;
        }
        if self.symbols.get(&old) == Some(&g) {
            self.symbols.remove(&old);
        }
        let name = self.unique_name(name);
        self.symbols.insert(name, g);
        ctx.global_mut(g).name = name;
        name
    }

    fn unique_name(&self, base: Symbol) -> Symbol {
        if !self.symbols.contains_key(&base) {
            return base;
        }
        (0u32..)
            .map(|n| base.with_suffix(&format!(".{n}")))
            .find(|candidate| !self.symbols.contains_key(candidate))
            .expect("unbounded suffix search")
    }

    /// Unlink a global from the module and destroy it.
    ///
    /// Callers must have redirected every use of `g` beforehand.
    pub fn erase(&mut self, ctx: &mut IrContext, g: GlobalRef) {
        self.globals.retain(|&x| x != g);
        self.functions.retain(|&x| x != g);
        self.aliases.retain(|&x| x != g);
        let name = ctx.global(g).name;
        if self.symbols.get(&name) == Some(&g) {
            self.symbols.remove(&name);
        }
        ctx.erase_global(g);
    }

    // ========================================================================
    // Comdats and named metadata
    // ========================================================================

    /// Get the comdat called `name`, creating it with `selection` if absent.
    pub fn get_or_insert_comdat(&mut self, name: Symbol, selection: ComdatSelection) -> Symbol {
        self.comdats.entry(name).or_insert(selection);
        name
    }

    pub fn comdat_selection(&self, name: Symbol) -> Option<ComdatSelection> {
        self.comdats.get(&name).copied()
    }

    /// All comdats, ordered by name.
    pub fn comdats(&self) -> impl Iterator<Item = (Symbol, ComdatSelection)> + '_ {
        self.comdats.iter().map(|(&name, &sel)| (name, sel))
    }

    /// Append operands to the named metadata list `name`, creating it if needed.
    pub fn add_named_metadata(&mut self, name: Symbol, operands: impl IntoIterator<Item = MdRef>) {
        match self.named_metadata.iter_mut().find(|nmd| nmd.name == name) {
            Some(nmd) => nmd.operands.extend(operands),
            None => self.named_metadata.push(NamedMetadata {
                name,
                operands: operands.into_iter().collect(),
            }),
        }
    }

    // ========================================================================
    // Use replacement
    // ========================================================================

    /// Redirect every reference to `old` (in initializers, aliasees, metadata
    /// and instruction operands, including through constant expressions) to
    /// `new`.
    ///
    /// Distinct metadata nodes are updated in place.
    pub fn replace_all_uses_of_global(&mut self, ctx: &mut IrContext, old: GlobalRef, new: GlobalRef) {
        let mut vmap = ValueMap::default();
        vmap.globals.insert(old, new);
        let mut mapper = ValueMapper::new(&mut vmap).reuse_distinct_metadata();

        for &g in &self.globals {
            if let Some(init) = ctx.global_var(g).initializer {
                let mapped = mapper.map_constant(ctx, init);
                ctx.global_var_mut(g).initializer = Some(mapped);
            }
            let attached = ctx.global_var(g).metadata.clone();
            let remapped = attached
                .into_iter()
                .map(|(kind, md)| (kind, mapper.map_metadata(ctx, md)))
                .collect();
            ctx.global_var_mut(g).metadata = remapped;
        }
        for &a in &self.aliases {
            if let Some(aliasee) = ctx.alias(a).aliasee {
                let mapped = mapper.map_constant(ctx, aliasee);
                ctx.alias_mut(a).aliasee = Some(mapped);
            }
        }
        for &f in &self.functions {
            for inst in ctx.function_insts(f) {
                mapper.remap_instruction(ctx, inst);
            }
        }
        for nmd in &mut self.named_metadata {
            for md in &mut nmd.operands {
                *md = mapper.map_metadata(ctx, *md);
            }
        }
    }
}
