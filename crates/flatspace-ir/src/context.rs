//! IrContext: arena-based mutable IR storage.
//!
//! All IR entities (globals, instructions, values, blocks) are stored in
//! `PrimaryMap`s owned by `IrContext`, together with the type, constant and
//! metadata interners. Operand lists use `EntityList + ListPool`, and every
//! operand is registered in a use-chain so uses can be replaced in bulk.
//!
//! Entities are never freed. Removing an instruction detaches it and clears
//! its use-chain entries; erasing a global marks it `erased`.

use std::collections::HashMap;

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::constants::{ConstData, ConstKind, ConstantPool};
use crate::global::{AliasData, FunctionData, GlobalData, GlobalKind, GlobalVarData};
use crate::inst::{InstData, Opcode};
use crate::metadata::MetadataArena;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::TypeInterner;

// ============================================================================
// Use-chain
// ============================================================================

/// A single use of a value: which instruction uses it, at which operand index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: InstRef,
    pub operand_index: u32,
}

// ============================================================================
// Entity data types
// ============================================================================

/// Data for a single SSA value.
pub struct ValueData {
    pub def: ValueDef,
    pub ty: TypeRef,
    pub name: Option<Symbol>,
}

/// Data for a basic block.
pub struct BlockData {
    pub name: Option<Symbol>,
    pub insts: SmallVec<[InstRef; 8]>,
    pub parent: Option<GlobalRef>,
}

// ============================================================================
// IrContext
// ============================================================================

/// Arena-based mutable IR context.
pub struct IrContext {
    pub types: TypeInterner,
    pub constants: ConstantPool,
    pub metadata: MetadataArena,

    globals: PrimaryMap<GlobalRef, GlobalData>,
    insts: PrimaryMap<InstRef, InstData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,

    /// Use-chain: for each value, the instructions that use it.
    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,
    /// Backing pool for operand lists.
    value_pool: ListPool<ValueRef>,
    /// The operand value standing for each constant.
    const_values: HashMap<ConstRef, ValueRef>,
}

impl IrContext {
    pub fn new() -> Self {
        Self {
            types: TypeInterner::new(),
            constants: ConstantPool::new(),
            metadata: MetadataArena::new(),
            globals: PrimaryMap::new(),
            insts: PrimaryMap::new(),
            values: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            value_pool: ListPool::new(),
            const_values: HashMap::default(),
        }
    }

    // ========================================================================
    // Globals
    // ========================================================================

    /// Allocate a global. Functions get one argument value per parameter.
    ///
    /// Modules call this; it does not register a name anywhere.
    pub(crate) fn create_global(&mut self, mut data: GlobalData) -> GlobalRef {
        let g = self.globals.next_key();
        if let GlobalKind::Function(func) = &mut data.kind {
            let params: SmallVec<[TypeRef; 4]> = match self.types.as_function(func.ty) {
                Some((_, params, _)) => params.into(),
                None => panic!("create_global: function type expected, got {}", func.ty),
            };
            func.args = params
                .iter()
                .enumerate()
                .map(|(idx, &ty)| {
                    self.values.push(ValueData {
                        def: ValueDef::Arg(g, idx as u32),
                        ty,
                        name: None,
                    })
                })
                .collect();
        }
        let pushed = self.globals.push(data);
        debug_assert_eq!(pushed, g);
        g
    }

    pub fn global(&self, g: GlobalRef) -> &GlobalData {
        &self.globals[g]
    }

    pub fn global_mut(&mut self, g: GlobalRef) -> &mut GlobalData {
        &mut self.globals[g]
    }

    /// # Panics
    ///
    /// Panics if `g` is not a global variable.
    pub fn global_var(&self, g: GlobalRef) -> &GlobalVarData {
        match &self.globals[g].kind {
            GlobalKind::Variable(var) => var,
            _ => panic!("global_var: {g} is not a global variable"),
        }
    }

    pub fn global_var_mut(&mut self, g: GlobalRef) -> &mut GlobalVarData {
        match &mut self.globals[g].kind {
            GlobalKind::Variable(var) => var,
            _ => panic!("global_var_mut: {g} is not a global variable"),
        }
    }

    /// # Panics
    ///
    /// Panics if `g` is not a function.
    pub fn function(&self, g: GlobalRef) -> &FunctionData {
        match &self.globals[g].kind {
            GlobalKind::Function(func) => func,
            _ => panic!("function: {g} is not a function"),
        }
    }

    pub fn function_mut(&mut self, g: GlobalRef) -> &mut FunctionData {
        match &mut self.globals[g].kind {
            GlobalKind::Function(func) => func,
            _ => panic!("function_mut: {g} is not a function"),
        }
    }

    /// # Panics
    ///
    /// Panics if `g` is not an alias.
    pub fn alias(&self, g: GlobalRef) -> &AliasData {
        match &self.globals[g].kind {
            GlobalKind::Alias(alias) => alias,
            _ => panic!("alias: {g} is not an alias"),
        }
    }

    pub fn alias_mut(&mut self, g: GlobalRef) -> &mut AliasData {
        match &mut self.globals[g].kind {
            GlobalKind::Alias(alias) => alias,
            _ => panic!("alias_mut: {g} is not an alias"),
        }
    }

    /// The type a global's contents have: the variable's value type, the
    /// function type, or the alias's value type.
    pub fn global_value_type(&self, g: GlobalRef) -> TypeRef {
        match &self.globals[g].kind {
            GlobalKind::Variable(var) => var.value_ty,
            GlobalKind::Function(func) => func.ty,
            GlobalKind::Alias(alias) => alias.value_ty,
        }
    }

    /// The pointer type through which the global is addressed.
    pub fn global_ptr_type(&mut self, g: GlobalRef) -> TypeRef {
        let addrspace = self.globals[g].addrspace;
        self.types.ptr(addrspace)
    }

    /// The constant holding the address of `g`.
    pub fn global_const(&mut self, g: GlobalRef) -> ConstRef {
        let ty = self.global_ptr_type(g);
        self.constants.intern(ConstData {
            ty,
            kind: ConstKind::Global(g),
        })
    }

    /// Mark a global as erased, deleting a function body and dropping
    /// initializers so nothing hangs off the dead entity.
    pub(crate) fn erase_global(&mut self, g: GlobalRef) {
        if self.globals[g].is_function() {
            self.delete_body(g);
        }
        match &mut self.globals[g].kind {
            GlobalKind::Variable(var) => {
                var.initializer = None;
                var.metadata.clear();
            }
            GlobalKind::Alias(alias) => alias.aliasee = None,
            GlobalKind::Function(_) => {}
        }
        self.globals[g].erased = true;
    }

    // ========================================================================
    // Values
    // ========================================================================

    pub fn value(&self, v: ValueRef) -> &ValueData {
        &self.values[v]
    }

    pub fn value_ty(&self, v: ValueRef) -> TypeRef {
        self.values[v].ty
    }

    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    pub fn value_name(&self, v: ValueRef) -> Option<Symbol> {
        self.values[v].name
    }

    pub fn set_value_name(&mut self, v: ValueRef, name: Option<Symbol>) {
        self.values[v].name = name;
    }

    /// The operand value standing for constant `c`.
    pub fn const_value(&mut self, c: ConstRef) -> ValueRef {
        if let Some(&v) = self.const_values.get(&c) {
            return v;
        }
        let v = self.values.push(ValueData {
            def: ValueDef::Const(c),
            ty: self.constants.ty(c),
            name: None,
        });
        self.const_values.insert(c, v);
        v
    }

    /// The constant behind `v`, if it is one.
    pub fn value_const(&self, v: ValueRef) -> Option<ConstRef> {
        match self.values[v].def {
            ValueDef::Const(c) => Some(c),
            _ => None,
        }
    }

    /// The function that defines a local value.
    pub fn value_function(&self, v: ValueRef) -> Option<GlobalRef> {
        match self.values[v].def {
            ValueDef::Arg(func, _) => Some(func),
            ValueDef::Inst(inst) => self.inst_function(inst),
            ValueDef::Const(_) => None,
        }
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// Create a block and append it to `func`'s body.
    pub fn append_block(&mut self, func: GlobalRef, name: Option<Symbol>) -> BlockRef {
        let block = self.blocks.push(BlockData {
            name,
            insts: SmallVec::new(),
            parent: Some(func),
        });
        self.function_mut(func).blocks.push(block);
        block
    }

    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    pub fn block_mut(&mut self, b: BlockRef) -> &mut BlockData {
        &mut self.blocks[b]
    }

    /// Every instruction of `func`, in block order.
    pub fn function_insts(&self, func: GlobalRef) -> Vec<InstRef> {
        self.function(func)
            .blocks
            .iter()
            .flat_map(|&b| self.blocks[b].insts.iter().copied())
            .collect()
    }

    /// Delete a function's body, turning it into a declaration.
    ///
    /// All references are dropped first so that instructions using each
    /// other (including across blocks) can be torn down in any order.
    pub fn delete_body(&mut self, func: GlobalRef) {
        let blocks = std::mem::take(&mut self.function_mut(func).blocks);
        for &block in &blocks {
            let insts = self.blocks[block].insts.clone();
            for inst in insts {
                self.drop_operands(inst);
            }
        }
        for &block in &blocks {
            let insts = std::mem::take(&mut self.blocks[block].insts);
            for inst in insts {
                self.insts[inst].parent = None;
            }
            self.blocks[block].parent = None;
        }
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    /// Create a detached instruction and register its operand uses.
    pub fn create_inst(&mut self, builder: InstBuilder) -> InstRef {
        let inst = self.insts.next_key();
        let result = self.values.push(ValueData {
            def: ValueDef::Inst(inst),
            ty: builder.ty,
            name: builder.name,
        });
        let operands = EntityList::from_slice(&builder.operands, &mut self.value_pool);
        let pushed = self.insts.push(InstData {
            opcode: builder.opcode,
            operands,
            ty: builder.ty,
            type_arg: builder.type_arg,
            blocks: builder.blocks,
            result,
            parent: None,
        });
        debug_assert_eq!(pushed, inst);
        for (idx, &v) in builder.operands.iter().enumerate() {
            self.uses[v].push(Use {
                user: inst,
                operand_index: idx as u32,
            });
        }
        inst
    }

    pub fn inst(&self, inst: InstRef) -> &InstData {
        &self.insts[inst]
    }

    pub fn inst_operands(&self, inst: InstRef) -> &[ValueRef] {
        self.insts[inst].operands.as_slice(&self.value_pool)
    }

    pub fn inst_result(&self, inst: InstRef) -> ValueRef {
        self.insts[inst].result
    }

    /// The function whose body currently contains `inst`.
    pub fn inst_function(&self, inst: InstRef) -> Option<GlobalRef> {
        self.insts[inst]
            .parent
            .and_then(|block| self.blocks[block].parent)
    }

    /// Append an instruction to the end of a block.
    ///
    /// # Panics
    ///
    /// Panics if the instruction already belongs to a block.
    pub fn push_inst(&mut self, block: BlockRef, inst: InstRef) {
        if let Some(existing) = self.insts[inst].parent {
            panic!(
                "push_inst: {inst} already belongs to {existing}; \
                 remove it from the old block first"
            );
        }
        self.insts[inst].parent = Some(block);
        self.blocks[block].insts.push(inst);
    }

    /// Remove an instruction from its block (does not destroy it).
    pub fn remove_inst_from_block(&mut self, inst: InstRef) {
        if let Some(block) = self.insts[inst].parent.take() {
            self.blocks[block].insts.retain(|i| *i != inst);
        }
    }

    /// Destroy a detached instruction, clearing its use-chain entries.
    ///
    /// # Panics
    ///
    /// Panics if the instruction is still in a block or its result still
    /// has uses, as that would leave dangling references.
    pub fn remove_inst(&mut self, inst: InstRef) {
        assert!(
            self.insts[inst].parent.is_none(),
            "remove_inst: {inst} is still attached to a block; \
             call remove_inst_from_block first"
        );
        let result = self.insts[inst].result;
        assert!(
            self.uses[result].is_empty(),
            "remove_inst: result {result} of {inst} still has {} use(s); \
             replace all uses before removing the instruction",
            self.uses[result].len()
        );
        self.drop_operands(inst);
    }

    fn drop_operands(&mut self, inst: InstRef) {
        let operands: SmallVec<[ValueRef; 8]> = self.inst_operands(inst).into();
        for (idx, &v) in operands.iter().enumerate() {
            self.uses[v].retain(|u| !(u.user == inst && u.operand_index == idx as u32));
        }
        self.insts[inst].operands.clear(&mut self.value_pool);
    }

    /// Replace a single operand, keeping the use-chain in sync.
    pub fn set_operand(&mut self, inst: InstRef, index: usize, new: ValueRef) {
        let slice = self.insts[inst].operands.as_mut_slice(&mut self.value_pool);
        let old = slice[index];
        if old == new {
            return;
        }
        slice[index] = new;
        self.uses[old].retain(|u| !(u.user == inst && u.operand_index == index as u32));
        self.uses[new].push(Use {
            user: inst,
            operand_index: index as u32,
        });
    }

    /// Replace the branch targets or phi incoming blocks of an instruction.
    pub fn set_inst_blocks(&mut self, inst: InstRef, blocks: SmallVec<[BlockRef; 2]>) {
        self.insts[inst].blocks = blocks;
    }

    pub fn is_addrspace_cast(&self, inst: InstRef) -> bool {
        matches!(
            self.insts[inst].opcode,
            Opcode::Cast(crate::inst::CastOp::AddrSpaceCast)
        )
    }

    // ========================================================================
    // Use-chain
    // ========================================================================

    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    /// Replace all uses of `old` with `new` in all instructions.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        let old_uses = std::mem::take(&mut self.uses[old]);
        for u in &old_uses {
            let slice = self.insts[u.user]
                .operands
                .as_mut_slice(&mut self.value_pool);
            debug_assert_eq!(slice[u.operand_index as usize], old);
            slice[u.operand_index as usize] = new;
            self.uses[new].push(*u);
        }
    }
}

impl Default for IrContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// InstBuilder
// ============================================================================

/// Builder for constructing instructions with a fluent API.
pub struct InstBuilder {
    opcode: Opcode,
    operands: SmallVec<[ValueRef; 4]>,
    ty: TypeRef,
    type_arg: Option<TypeRef>,
    blocks: SmallVec<[BlockRef; 2]>,
    name: Option<Symbol>,
}

impl InstBuilder {
    /// `ty` is the result type; pass `void` for instructions without a result.
    pub fn new(opcode: Opcode, ty: TypeRef) -> Self {
        Self {
            opcode,
            operands: SmallVec::new(),
            ty,
            type_arg: None,
            blocks: SmallVec::new(),
            name: None,
        }
    }

    pub fn operand(mut self, v: ValueRef) -> Self {
        self.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn type_arg(mut self, ty: TypeRef) -> Self {
        self.type_arg = Some(ty);
        self
    }

    pub fn block(mut self, b: BlockRef) -> Self {
        self.blocks.push(b);
        self
    }

    pub fn name(mut self, name: Symbol) -> Self {
        self.name = Some(name);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::BinaryOp;

    fn test_function(ctx: &mut IrContext) -> GlobalRef {
        let i32_ty = ctx.types.int(32);
        let fn_ty = ctx.types.function(i32_ty, [i32_ty, i32_ty], false);
        ctx.create_global(GlobalData::function(Symbol::new("f"), fn_ty, 0))
    }

    #[test]
    fn function_args_follow_signature() {
        let mut ctx = IrContext::new();
        let f = test_function(&mut ctx);
        let args = ctx.function(f).args.clone();
        assert_eq!(args.len(), 2);
        assert_eq!(ctx.value_def(args[1]), ValueDef::Arg(f, 1));
        assert_eq!(ctx.value_ty(args[0]), ctx.types.int(32));
        assert_eq!(ctx.value_function(args[0]), Some(f));
    }

    #[test]
    fn use_chain_tracking_and_rauw() {
        let mut ctx = IrContext::new();
        let f = test_function(&mut ctx);
        let i32_ty = ctx.types.int(32);
        let [a, b] = [ctx.function(f).args[0], ctx.function(f).args[1]];
        let entry = ctx.append_block(f, Some(Symbol::new("entry")));

        let add = ctx.create_inst(
            InstBuilder::new(Opcode::Binary(BinaryOp::Add), i32_ty)
                .operand(a)
                .operand(a),
        );
        ctx.push_inst(entry, add);
        assert_eq!(ctx.uses(a).len(), 2);
        assert!(!ctx.has_uses(b));
        assert_eq!(ctx.inst_function(add), Some(f));

        ctx.replace_all_uses(a, b);
        assert!(!ctx.has_uses(a));
        assert_eq!(ctx.uses(b).len(), 2);
        assert_eq!(ctx.inst_operands(add), &[b, b]);

        ctx.set_operand(add, 1, a);
        assert_eq!(ctx.inst_operands(add), &[b, a]);
        assert_eq!(
            ctx.uses(a),
            &[Use {
                user: add,
                operand_index: 1
            }]
        );
        assert_eq!(ctx.uses(b).len(), 1);
    }

    #[test]
    fn constants_have_one_operand_value() {
        let mut ctx = IrContext::new();
        let i8_ty = ctx.types.int(8);
        let c = ctx.constants.int(i8_ty, 7);
        let v1 = ctx.const_value(c);
        let v2 = ctx.const_value(c);
        assert_eq!(v1, v2);
        assert_eq!(ctx.value_const(v1), Some(c));
        assert_eq!(ctx.value_ty(v1), i8_ty);
        assert_eq!(ctx.value_function(v1), None);
    }

    #[test]
    fn delete_body_drops_cross_references() {
        let mut ctx = IrContext::new();
        let f = test_function(&mut ctx);
        let i32_ty = ctx.types.int(32);
        let a = ctx.function(f).args[0];
        let entry = ctx.append_block(f, None);
        let first = ctx.create_inst(
            InstBuilder::new(Opcode::Binary(BinaryOp::Mul), i32_ty)
                .operand(a)
                .operand(a),
        );
        ctx.push_inst(entry, first);
        let first_v = ctx.inst_result(first);
        let second = ctx.create_inst(
            InstBuilder::new(Opcode::Binary(BinaryOp::Add), i32_ty)
                .operand(first_v)
                .operand(a),
        );
        ctx.push_inst(entry, second);

        ctx.delete_body(f);
        assert!(ctx.function(f).is_declaration());
        assert!(!ctx.has_uses(a));
        assert!(!ctx.has_uses(first_v));
        assert_eq!(ctx.inst(second).parent, None);
        assert_eq!(ctx.block(entry).parent, None);
    }

    #[test]
    #[should_panic(expected = "still has")]
    fn remove_inst_panics_when_result_has_uses() {
        let mut ctx = IrContext::new();
        let f = test_function(&mut ctx);
        let i32_ty = ctx.types.int(32);
        let a = ctx.function(f).args[0];
        let first = ctx.create_inst(
            InstBuilder::new(Opcode::Binary(BinaryOp::Add), i32_ty)
                .operand(a)
                .operand(a),
        );
        let first_v = ctx.inst_result(first);
        let _second = ctx.create_inst(
            InstBuilder::new(Opcode::Binary(BinaryOp::Add), i32_ty)
                .operand(first_v)
                .operand(a),
        );
        ctx.remove_inst(first);
    }

    #[test]
    fn entity_ref_display() {
        use cranelift_entity::EntityRef;

        assert_eq!(format!("{}", InstRef::new(0)), "inst0");
        assert_eq!(format!("{}", ValueRef::new(5)), "v5");
        assert_eq!(format!("{}", BlockRef::new(2)), "bb2");
        assert_eq!(format!("{}", GlobalRef::new(1)), "g1");
        assert_eq!(format!("{}", TypeRef::new(3)), "ty3");
        assert_eq!(format!("{}", ValueDef::Arg(GlobalRef::new(1), 0)), "g1#0");
    }
}
