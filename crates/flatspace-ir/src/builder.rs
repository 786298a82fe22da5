//! Convenience builder for function bodies.

use crate::context::{InstBuilder, IrContext};
use crate::inst::{BinaryOp, CastOp, IntPredicate, Opcode};
use crate::refs::{BlockRef, ConstRef, GlobalRef, InstRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::TypeData;

/// Appends instructions to the end of a block of one function.
pub struct FunctionBuilder<'a> {
    ctx: &'a mut IrContext,
    func: GlobalRef,
    block: Option<BlockRef>,
}

impl<'a> FunctionBuilder<'a> {
    pub fn new(ctx: &'a mut IrContext, func: GlobalRef) -> Self {
        Self {
            ctx,
            func,
            block: None,
        }
    }

    pub fn ctx(&mut self) -> &mut IrContext {
        self.ctx
    }

    /// The `index`-th argument of the function being built.
    pub fn arg(&self, index: usize) -> ValueRef {
        self.ctx.function(self.func).args[index]
    }

    pub fn append_block(&mut self, name: Option<Symbol>) -> BlockRef {
        self.ctx.append_block(self.func, name)
    }

    pub fn position_at_end(&mut self, block: BlockRef) {
        self.block = Some(block);
    }

    pub fn const_value(&mut self, c: ConstRef) -> ValueRef {
        self.ctx.const_value(c)
    }

    /// Create an instruction and append it to the current block.
    ///
    /// # Panics
    ///
    /// Panics if no block has been selected with `position_at_end`.
    pub fn insert(&mut self, builder: InstBuilder) -> InstRef {
        let Some(block) = self.block else {
            panic!("FunctionBuilder::insert: no insertion block selected");
        };
        let inst = self.ctx.create_inst(builder);
        self.ctx.push_inst(block, inst);
        inst
    }

    fn insert_value(&mut self, builder: InstBuilder) -> ValueRef {
        let inst = self.insert(builder);
        self.ctx.inst_result(inst)
    }

    fn void(&mut self) -> TypeRef {
        self.ctx.types.void()
    }

    // ========================================================================
    // Memory
    // ========================================================================

    pub fn alloca(&mut self, allocated: TypeRef, addrspace: u32) -> ValueRef {
        let ptr = self.ctx.types.ptr(addrspace);
        self.insert_value(InstBuilder::new(Opcode::Alloca, ptr).type_arg(allocated))
    }

    pub fn load(&mut self, ty: TypeRef, ptr: ValueRef) -> ValueRef {
        self.insert_value(InstBuilder::new(Opcode::Load, ty).operand(ptr))
    }

    pub fn store(&mut self, value: ValueRef, ptr: ValueRef) -> InstRef {
        let void = self.void();
        self.insert(InstBuilder::new(Opcode::Store, void).operand(value).operand(ptr))
    }

    /// Pointer offset; the result has the base's pointer type.
    pub fn gep(
        &mut self,
        source_ty: TypeRef,
        base: ValueRef,
        indices: impl IntoIterator<Item = ValueRef>,
        inbounds: bool,
    ) -> ValueRef {
        let ty = self.ctx.value_ty(base);
        self.insert_value(
            InstBuilder::new(Opcode::GetElementPtr { inbounds }, ty)
                .type_arg(source_ty)
                .operand(base)
                .operands(indices),
        )
    }

    // ========================================================================
    // Arithmetic and conversions
    // ========================================================================

    pub fn cast(&mut self, op: CastOp, value: ValueRef, to: TypeRef) -> ValueRef {
        self.insert_value(InstBuilder::new(Opcode::Cast(op), to).operand(value))
    }

    /// Cast a pointer (or vector of pointers) into `addrspace`.
    pub fn addrspace_cast(&mut self, value: ValueRef, addrspace: u32) -> ValueRef {
        let from = self.ctx.value_ty(value);
        let to = match self.ctx.types.get(from).clone() {
            TypeData::Vector { len, scalable, .. } => {
                let elem = self.ctx.types.ptr(addrspace);
                self.ctx.types.vector(elem, len, scalable)
            }
            TypeData::Pointer { .. } => self.ctx.types.ptr(addrspace),
            other => panic!("addrspace_cast: operand type is not a pointer: {other:?}"),
        };
        self.cast(CastOp::AddrSpaceCast, value, to)
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ValueRef, rhs: ValueRef) -> ValueRef {
        let ty = self.ctx.value_ty(lhs);
        self.insert_value(
            InstBuilder::new(Opcode::Binary(op), ty)
                .operand(lhs)
                .operand(rhs),
        )
    }

    pub fn icmp(&mut self, pred: IntPredicate, lhs: ValueRef, rhs: ValueRef) -> ValueRef {
        let i1 = self.ctx.types.int(1);
        self.insert_value(
            InstBuilder::new(Opcode::ICmp(pred), i1)
                .operand(lhs)
                .operand(rhs),
        )
    }

    pub fn select(&mut self, cond: ValueRef, then: ValueRef, otherwise: ValueRef) -> ValueRef {
        let ty = self.ctx.value_ty(then);
        self.insert_value(
            InstBuilder::new(Opcode::Select, ty)
                .operand(cond)
                .operand(then)
                .operand(otherwise),
        )
    }

    /// A phi over `(value, predecessor)` pairs.
    pub fn phi(
        &mut self,
        ty: TypeRef,
        incoming: impl IntoIterator<Item = (ValueRef, BlockRef)>,
    ) -> ValueRef {
        let mut builder = InstBuilder::new(Opcode::Phi, ty);
        for (value, block) in incoming {
            builder = builder.operand(value).block(block);
        }
        self.insert_value(builder)
    }

    // ========================================================================
    // Calls and control flow
    // ========================================================================

    /// Call `callee` with the function type `fn_ty`; returns the call's result.
    pub fn call(
        &mut self,
        fn_ty: TypeRef,
        callee: ValueRef,
        args: impl IntoIterator<Item = ValueRef>,
    ) -> ValueRef {
        let ret = match self.ctx.types.as_function(fn_ty) {
            Some((ret, _, _)) => ret,
            None => panic!("call: {fn_ty} is not a function type"),
        };
        self.insert_value(
            InstBuilder::new(Opcode::Call, ret)
                .type_arg(fn_ty)
                .operand(callee)
                .operands(args),
        )
    }

    pub fn ret(&mut self, value: Option<ValueRef>) -> InstRef {
        let void = self.void();
        self.insert(InstBuilder::new(Opcode::Ret, void).operands(value))
    }

    pub fn br(&mut self, dest: BlockRef) -> InstRef {
        let void = self.void();
        self.insert(InstBuilder::new(Opcode::Br, void).block(dest))
    }

    pub fn cond_br(&mut self, cond: ValueRef, then: BlockRef, otherwise: BlockRef) -> InstRef {
        let void = self.void();
        self.insert(
            InstBuilder::new(Opcode::CondBr, void)
                .operand(cond)
                .block(then)
                .block(otherwise),
        )
    }

    pub fn unreachable(&mut self) -> InstRef {
        let void = self.void();
        self.insert(InstBuilder::new(Opcode::Unreachable, void))
    }
}
